//! Copyright © 2025-2026 Wenze Wei. All Rights Reserved.
//!
//! This file is part of Zirun.
//! The Zirun project belongs to the Dunimd Team.
//!
//! Licensed under the Apache License, Version 2.0 (the "License");
//! You may not use this file except in compliance with the License.
//! You may obtain a copy of the License at
//!
//!     http://www.apache.org/licenses/LICENSE-2.0
//!
//! Unless required by applicable law or agreed to in writing, software
//! distributed under the License is distributed on an "AS IS" BASIS,
//! WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//! See the License for the specific language governing permissions and
//! limitations under the License.

//! Instrument adapter boundary.
//!
//! Adapters describe the acquisition format of an instrument. The resolver
//! uses them to infer a small whitelist of options when the caller did not
//! set them explicitly.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::value::ZiConfigValue;
use crate::errors::{Result, ZiError};

/// Global config key that selects the active adapter by name.
pub const ADAPTER_CONFIG_KEY: &str = "instrument_adapter";

/// Options that may be inferred from the active adapter.
pub const INFERABLE_OPTIONS: [&str; 4] = [
    "sample_rate",
    "sample_interval",
    "timestamp_unit",
    "expected_sample_count",
];

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ZiAdapterFormat {
    pub sample_rate_hz: Option<f64>,
    pub sample_interval_ns: Option<i64>,
    pub timestamp_unit: Option<String>,
    pub expected_sample_count: Option<i64>,
}

impl ZiAdapterFormat {
    /// Value the adapter supplies for a whitelisted option.
    pub fn inferred(&self, option: &str) -> Option<ZiConfigValue> {
        match option {
            "sample_rate" => self.sample_rate_hz.map(ZiConfigValue::Float),
            "sample_interval" => self.sample_interval_ns.map(ZiConfigValue::Int),
            "timestamp_unit" => self.timestamp_unit.clone().map(ZiConfigValue::Str),
            "expected_sample_count" => self.expected_sample_count.map(ZiConfigValue::Int),
            _ => None,
        }
    }
}

pub trait ZiInstrumentAdapter: Send + Sync {
    fn name(&self) -> &str;

    fn format(&self) -> ZiAdapterFormat;
}

/// Adapter with a fixed format, enough for most instruments.
#[derive(Clone, Debug)]
pub struct ZiStaticAdapter {
    name: String,
    format: ZiAdapterFormat,
}

impl ZiStaticAdapter {
    pub fn new(name: impl Into<String>, format: ZiAdapterFormat) -> Self {
        ZiStaticAdapter {
            name: name.into(),
            format,
        }
    }
}

impl ZiInstrumentAdapter for ZiStaticAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn format(&self) -> ZiAdapterFormat {
        self.format.clone()
    }
}

#[derive(Clone, Default)]
pub struct ZiAdapterRegistry {
    adapters: BTreeMap<String, Arc<dyn ZiInstrumentAdapter>>,
}

impl ZiAdapterRegistry {
    pub fn new() -> Self {
        ZiAdapterRegistry::default()
    }

    pub fn register(&mut self, adapter: Arc<dyn ZiInstrumentAdapter>) -> Result<()> {
        let name = adapter.name().to_string();
        if name.is_empty() {
            return Err(ZiError::validation("adapter name must be non-empty"));
        }
        if self.adapters.contains_key(&name) {
            return Err(ZiError::validation(format!(
                "adapter '{name}' is already registered"
            )));
        }
        log::debug!("adapter.register: adapter registered - adapter={}", name);
        self.adapters.insert(name, adapter);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn ZiInstrumentAdapter>> {
        self.adapters.get(name)
    }

    /// Adapter selected by name, or the only one registered.
    pub fn select(&self, selected: Option<&str>) -> Result<Option<&Arc<dyn ZiInstrumentAdapter>>> {
        match selected {
            Some(name) => self
                .adapters
                .get(name)
                .map(Some)
                .ok_or_else(|| ZiError::validation(format!("unknown instrument adapter '{name}'"))),
            None if self.adapters.len() == 1 => Ok(self.adapters.values().next()),
            None => Ok(None),
        }
    }

    pub fn names(&self) -> Vec<&str> {
        self.adapters.keys().map(String::as_str).collect()
    }
}

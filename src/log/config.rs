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

use std::collections::HashMap;
use std::path::PathBuf;

use log::LevelFilter;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{Result, ZiError};

/// Configuration for [`crate::log::ZiLogger`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZiLogConfig {
    /// `trace`, `debug`, `info`, `warn`, `error` or `off`.
    pub level: String,
    pub console_enabled: bool,
    /// One JSON object per line instead of plain text.
    pub json_format: bool,
    pub file_path: Option<PathBuf>,
    /// Rotate the log file once it grows past this size.
    pub max_bytes: Option<u64>,
    /// Number of rotated files to keep.
    pub backup_count: u32,
    /// Per-event sampling rates in [0.0, 1.0].
    pub sampling_rates: HashMap<String, f64>,
}

impl Default for ZiLogConfig {
    fn default() -> Self {
        ZiLogConfig {
            level: "info".to_string(),
            console_enabled: true,
            json_format: true,
            file_path: None,
            max_bytes: Some(10 * 1024 * 1024),
            backup_count: 7,
            sampling_rates: HashMap::new(),
        }
    }
}

impl ZiLogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn level(mut self, level: &str) -> Self {
        self.level = level.to_string();
        self
    }

    pub fn console_enabled(mut self, enabled: bool) -> Self {
        self.console_enabled = enabled;
        self
    }

    pub fn json_format(mut self, json: bool) -> Self {
        self.json_format = json;
        self
    }

    pub fn file_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    pub fn sampling_rate(mut self, event: &str, rate: f64) -> Self {
        self.sampling_rates
            .insert(event.to_string(), rate.clamp(0.0, 1.0));
        self
    }

    pub fn from_json(value: &Value) -> Result<Self> {
        Ok(serde_json::from_value(value.clone())?)
    }

    pub fn level_filter(&self) -> Result<LevelFilter> {
        self.level
            .parse::<LevelFilter>()
            .map_err(|_| ZiError::validation(format!("unknown log level '{}'", self.level)))
    }

    /// Sampling rate for an event; 1.0 when not configured.
    pub fn event_sampling_rate(&self, event: &str) -> f64 {
        self.sampling_rates.get(event).copied().unwrap_or(1.0)
    }
}

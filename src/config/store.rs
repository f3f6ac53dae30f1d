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

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::value::ZiConfigValue;
use crate::errors::{Result, ZiError};

/// Level at which an explicit value was supplied, highest priority first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ZiExplicitLevel {
    Namespaced,
    Dotted,
    Global,
}

/// Explicit configuration exactly as the caller supplied it.
///
/// Keys are stored verbatim; alias canonicalisation happens at resolution
/// time because it depends on the plugin asking.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ZiConfigStore {
    global: BTreeMap<String, ZiConfigValue>,
    dotted: BTreeMap<String, BTreeMap<String, ZiConfigValue>>,
    namespaced: BTreeMap<String, BTreeMap<String, ZiConfigValue>>,
}

impl ZiConfigStore {
    pub fn new() -> Self {
        ZiConfigStore::default()
    }

    /// Merges a JSON object into the store.
    ///
    /// `{"k": v}` sets a global key, `{"plugin.k": v}` a dotted key and
    /// `{"plugin": {"k": v}}` a namespaced key.
    pub fn apply(&mut self, config: &Value) -> Result<()> {
        let object = config
            .as_object()
            .ok_or_else(|| ZiError::validation("configuration must be a JSON object"))?;
        for (key, value) in object {
            match value {
                Value::Object(inner) => self.apply_namespace(key, inner)?,
                other => self.set(key, other)?,
            }
        }
        Ok(())
    }

    /// Sets one key, splitting `plugin.option` forms on the first dot.
    pub fn set(&mut self, key: &str, value: &Value) -> Result<()> {
        let typed = ZiConfigValue::from_json(value)
            .map_err(|err| ZiError::validation(format!("config key '{key}': {err}")))?;
        match key.split_once('.') {
            Some((plugin, option)) if !plugin.is_empty() && !option.is_empty() => {
                self.dotted
                    .entry(plugin.to_string())
                    .or_default()
                    .insert(option.to_string(), typed);
            }
            Some(_) => {
                return Err(ZiError::validation(format!("malformed dotted key '{key}'")));
            }
            None if key.is_empty() => {
                return Err(ZiError::validation("config keys must be non-empty"));
            }
            None => {
                self.global.insert(key.to_string(), typed);
            }
        }
        Ok(())
    }

    fn apply_namespace(&mut self, plugin: &str, entries: &Map<String, Value>) -> Result<()> {
        let namespace = self.namespaced.entry(plugin.to_string()).or_default();
        for (key, value) in entries {
            let typed = ZiConfigValue::from_json(value).map_err(|err| {
                ZiError::validation(format!("config key '{plugin}.{key}': {err}"))
            })?;
            namespace.insert(key.clone(), typed);
        }
        Ok(())
    }

    pub fn global(&self, key: &str) -> Option<&ZiConfigValue> {
        self.global.get(key)
    }

    /// Explicit entries visible to `plugin`, grouped by priority level.
    pub fn entries_for<'a>(
        &'a self,
        plugin: &str,
    ) -> Vec<(ZiExplicitLevel, &'a str, &'a ZiConfigValue)> {
        let mut entries = Vec::new();
        if let Some(namespace) = self.namespaced.get(plugin) {
            entries.extend(
                namespace
                    .iter()
                    .map(|(k, v)| (ZiExplicitLevel::Namespaced, k.as_str(), v)),
            );
        }
        if let Some(dotted) = self.dotted.get(plugin) {
            entries.extend(
                dotted
                    .iter()
                    .map(|(k, v)| (ZiExplicitLevel::Dotted, k.as_str(), v)),
            );
        }
        entries.extend(
            self.global
                .iter()
                .map(|(k, v)| (ZiExplicitLevel::Global, k.as_str(), v)),
        );
        entries
    }

    pub fn clear(&mut self) {
        self.global.clear();
        self.dotted.clear();
        self.namespaced.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.global.is_empty() && self.dotted.is_empty() && self.namespaced.is_empty()
    }
}

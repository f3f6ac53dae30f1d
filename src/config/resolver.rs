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

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::adapter::{ZiInstrumentAdapter, ADAPTER_CONFIG_KEY, INFERABLE_OPTIONS};
use crate::config::compat::ZiCompatRegistry;
use crate::config::option::ZiOption;
use crate::config::store::{ZiConfigStore, ZiExplicitLevel};
use crate::config::value::ZiConfigValue;
use crate::errors::{Result, ZiError};
use crate::version::ZiVersion;

/// Where a resolved value came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZiProvenance {
    Explicit,
    AdapterInferred,
    PluginDefault,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ZiResolvedEntry {
    pub value: ZiConfigValue,
    pub provenance: ZiProvenance,
    pub tracked: bool,
}

/// Fully resolved, validated configuration of one plugin.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ZiResolvedConfig {
    plugin: String,
    entries: BTreeMap<String, ZiResolvedEntry>,
}

impl ZiResolvedConfig {
    pub fn plugin(&self) -> &str {
        &self.plugin
    }

    pub fn entry(&self, option: &str) -> Option<&ZiResolvedEntry> {
        self.entries.get(option)
    }

    pub fn get(&self, option: &str) -> Result<&ZiConfigValue> {
        self.entries
            .get(option)
            .map(|entry| &entry.value)
            .ok_or_else(|| ZiError::config(&self.plugin, option, "option is not declared"))
    }

    pub fn get_i64(&self, option: &str) -> Result<i64> {
        let value = self.get(option)?;
        value
            .as_i64()
            .ok_or_else(|| ZiError::config(&self.plugin, option, format!("{value} is not an int")))
    }

    pub fn get_f64(&self, option: &str) -> Result<f64> {
        let value = self.get(option)?;
        value
            .as_f64()
            .ok_or_else(|| ZiError::config(&self.plugin, option, format!("{value} is not a number")))
    }

    pub fn get_bool(&self, option: &str) -> Result<bool> {
        let value = self.get(option)?;
        value
            .as_bool()
            .ok_or_else(|| ZiError::config(&self.plugin, option, format!("{value} is not a bool")))
    }

    pub fn get_str(&self, option: &str) -> Result<&str> {
        let value = self.get(option)?;
        value
            .as_str()
            .ok_or_else(|| ZiError::config(&self.plugin, option, format!("{value} is not a string")))
    }

    pub fn provenance(&self, option: &str) -> Option<ZiProvenance> {
        self.entries.get(option).map(|entry| entry.provenance)
    }

    /// Values that feed the lineage hash: tracked and not defaulted.
    pub fn lineage_values(&self) -> BTreeMap<String, ZiConfigValue> {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.tracked && entry.provenance != ZiProvenance::PluginDefault)
            .map(|(name, entry)| (name.clone(), entry.value.clone()))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ZiResolvedEntry)> {
        self.entries.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Resolves declared options against explicit config, the active adapter
/// and defaults.
pub struct ZiConfigResolver<'a> {
    store: &'a ZiConfigStore,
    compat: &'a ZiCompatRegistry,
    adapter: Option<&'a dyn ZiInstrumentAdapter>,
    engine_version: &'a ZiVersion,
}

impl<'a> ZiConfigResolver<'a> {
    pub fn new(
        store: &'a ZiConfigStore,
        compat: &'a ZiCompatRegistry,
        engine_version: &'a ZiVersion,
    ) -> Self {
        ZiConfigResolver {
            store,
            compat,
            adapter: None,
            engine_version,
        }
    }

    pub fn with_adapter(mut self, adapter: Option<&'a dyn ZiInstrumentAdapter>) -> Self {
        self.adapter = adapter;
        self
    }

    pub fn resolve(&self, plugin: &str, options: &[ZiOption]) -> Result<ZiResolvedConfig> {
        let explicit = self.explicit_values(plugin, options)?;
        let format = self.adapter.map(|adapter| adapter.format());

        let mut entries = BTreeMap::new();
        for option in options {
            let (value, provenance) = if let Some(value) = explicit.get(option.name.as_str()) {
                (option.validate(plugin, value)?, ZiProvenance::Explicit)
            } else if let Some(value) = format
                .as_ref()
                .filter(|_| INFERABLE_OPTIONS.contains(&option.name.as_str()))
                .and_then(|format| format.inferred(&option.name))
            {
                (option.validate(plugin, &value)?, ZiProvenance::AdapterInferred)
            } else if option.is_required() {
                return Err(ZiError::config(
                    plugin,
                    &option.name,
                    "required option has no value",
                ));
            } else {
                (option.default.clone(), ZiProvenance::PluginDefault)
            };

            entries.insert(
                option.name.clone(),
                ZiResolvedEntry {
                    value,
                    provenance,
                    tracked: option.track,
                },
            );
        }

        log::debug!(
            "config.resolve: plugin configuration resolved - plugin={}, options={}, explicit={}",
            plugin,
            entries.len(),
            entries
                .values()
                .filter(|entry: &&ZiResolvedEntry| entry.provenance == ZiProvenance::Explicit)
                .count()
        );

        Ok(ZiResolvedConfig {
            plugin: plugin.to_string(),
            entries,
        })
    }

    /// Highest-priority explicit value per canonical option name.
    ///
    /// Within one level a canonical key beats an alias of it. Global keys are
    /// only canonicalised when the alias targets an option of this plugin.
    fn explicit_values(
        &self,
        plugin: &str,
        options: &[ZiOption],
    ) -> Result<HashMap<String, ZiConfigValue>> {
        let declared: HashSet<&str> = options.iter().map(|o| o.name.as_str()).collect();
        let mut best: HashMap<String, ((ZiExplicitLevel, bool), &ZiConfigValue)> = HashMap::new();

        for (level, key, value) in self.store.entries_for(plugin) {
            if level == ZiExplicitLevel::Global && key == ADAPTER_CONFIG_KEY {
                continue;
            }
            let relevant_alias = self.compat.lookup(plugin, key).filter(|alias| {
                level != ZiExplicitLevel::Global || declared.contains(alias.canonical.as_str())
            });
            let (canonical, via_alias) = match relevant_alias {
                Some(_) => (
                    self.compat.canonicalize(plugin, key, self.engine_version)?,
                    true,
                ),
                None => (key.to_string(), false),
            };

            if !declared.contains(canonical.as_str()) {
                if level != ZiExplicitLevel::Global {
                    log::debug!(
                        "config.resolve: ignoring undeclared option - plugin={}, option={}",
                        plugin,
                        canonical
                    );
                }
                continue;
            }

            let rank = (level, via_alias);
            let replace = best
                .get(&canonical)
                .map_or(true, |(existing, _)| rank < *existing);
            if replace {
                best.insert(canonical, (rank, value));
            }
        }

        Ok(best
            .into_iter()
            .map(|(name, (_, value))| (name, value.clone()))
            .collect())
    }
}

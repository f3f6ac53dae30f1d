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

//! Option aliases and their deprecation lifecycle.
//!
//! An alias maps an old option name to its canonical name. Aliases can be
//! registered globally or for a single plugin; a plugin-specific alias
//! overrides a global one with the same name. Using an alias logs a warning
//! once per (plugin, alias) pair until the engine version reaches the alias's
//! removal version, after which it is rejected.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, ZiError};
use crate::version::ZiVersion;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ZiAlias {
    pub alias: String,
    pub canonical: String,
    pub deprecated_in: Option<String>,
    pub removed_in: Option<String>,
}

impl ZiAlias {
    pub fn new(alias: impl Into<String>, canonical: impl Into<String>) -> Self {
        ZiAlias {
            alias: alias.into(),
            canonical: canonical.into(),
            deprecated_in: None,
            removed_in: None,
        }
    }

    pub fn deprecated_in(mut self, version: impl Into<String>) -> Self {
        self.deprecated_in = Some(version.into());
        self
    }

    pub fn removed_in(mut self, version: impl Into<String>) -> Self {
        self.removed_in = Some(version.into());
        self
    }

    /// Whether using the alias warrants a warning under `engine`.
    ///
    /// Aliases without a `deprecated_in` version are deprecated from the start.
    pub fn is_deprecated(&self, engine: &ZiVersion) -> Result<bool> {
        match &self.deprecated_in {
            Some(version) => Ok(engine >= &ZiVersion::parse(version)?),
            None => Ok(true),
        }
    }
}

#[derive(Debug, Default)]
pub struct ZiCompatRegistry {
    global: HashMap<String, ZiAlias>,
    per_plugin: HashMap<String, HashMap<String, ZiAlias>>,
    warned: Mutex<HashSet<(String, String)>>,
}

impl ZiCompatRegistry {
    pub fn new() -> Self {
        ZiCompatRegistry::default()
    }

    pub fn register_global(&mut self, alias: ZiAlias) -> Result<()> {
        Self::check_alias(&alias)?;
        self.global.insert(alias.alias.clone(), alias);
        Ok(())
    }

    pub fn register_for_plugin(&mut self, plugin: &str, alias: ZiAlias) -> Result<()> {
        Self::check_alias(&alias)?;
        self.per_plugin
            .entry(plugin.to_string())
            .or_default()
            .insert(alias.alias.clone(), alias);
        Ok(())
    }

    pub fn unregister_global(&mut self, alias: &str) -> Option<ZiAlias> {
        self.global.remove(alias)
    }

    pub fn unregister_for_plugin(&mut self, plugin: &str, alias: &str) -> Option<ZiAlias> {
        let removed = self.per_plugin.get_mut(plugin)?.remove(alias);
        if self.per_plugin.get(plugin).map_or(false, HashMap::is_empty) {
            self.per_plugin.remove(plugin);
        }
        removed
    }

    /// Alias entry for `key` as seen by `plugin`, if `key` is an alias.
    pub fn lookup(&self, plugin: &str, key: &str) -> Option<&ZiAlias> {
        self.per_plugin
            .get(plugin)
            .and_then(|aliases| aliases.get(key))
            .or_else(|| self.global.get(key))
    }

    /// Maps `key` to its canonical option name for `plugin`.
    ///
    /// Returns the key unchanged when it is not an alias.
    pub fn canonicalize(&self, plugin: &str, key: &str, engine: &ZiVersion) -> Result<String> {
        let Some(alias) = self.lookup(plugin, key) else {
            return Ok(key.to_string());
        };

        if let Some(removed_in) = &alias.removed_in {
            if engine >= &ZiVersion::parse(removed_in)? {
                return Err(ZiError::DeprecationRejected {
                    alias: alias.alias.clone(),
                    canonical: alias.canonical.clone(),
                    removed_in: removed_in.clone(),
                });
            }
        }

        if !alias.is_deprecated(engine)? {
            return Ok(alias.canonical.clone());
        }
        let first_use = self
            .warned
            .lock()
            .map(|mut warned| warned.insert((plugin.to_string(), key.to_string())))
            .unwrap_or(true);
        if first_use {
            log::warn!(
                "compat.alias: deprecated option used - plugin={}, alias={}, canonical={}, removed_in={}",
                plugin,
                alias.alias,
                alias.canonical,
                alias.removed_in.as_deref().unwrap_or("unscheduled")
            );
        }
        Ok(alias.canonical.clone())
    }

    pub fn len(&self) -> usize {
        self.global.len() + self.per_plugin.values().map(HashMap::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_alias(alias: &ZiAlias) -> Result<()> {
        if alias.alias.is_empty() || alias.canonical.is_empty() {
            return Err(ZiError::validation("alias and canonical names must be non-empty"));
        }
        if alias.alias == alias.canonical {
            return Err(ZiError::validation(format!(
                "alias '{}' maps onto itself",
                alias.alias
            )));
        }
        for version in alias.deprecated_in.iter().chain(alias.removed_in.iter()) {
            ZiVersion::parse(version)?;
        }
        Ok(())
    }
}

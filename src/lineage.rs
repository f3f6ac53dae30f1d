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

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::value::ZiConfigValue;
use crate::errors::{Result, ZiError};

/// Run-independent description of how a data product is derived.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ZiLineage {
    pub plugin: String,
    pub version: String,
    /// Tracked, non-default configuration.
    pub config: BTreeMap<String, ZiConfigValue>,
    pub dependencies: BTreeMap<String, ZiLineage>,
}

impl ZiLineage {
    /// Every plugin that contributes to this product, itself included.
    pub fn plugins(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        self.collect_plugins(&mut names);
        names
    }

    fn collect_plugins(&self, names: &mut BTreeSet<String>) {
        names.insert(self.plugin.clone());
        for dependency in self.dependencies.values() {
            dependency.collect_plugins(names);
        }
    }

    pub fn depth(&self) -> usize {
        1 + self
            .dependencies
            .values()
            .map(ZiLineage::depth)
            .max()
            .unwrap_or(0)
    }

    pub fn to_json(&self) -> Value {
        json!({
            "plugin": self.plugin,
            "version": self.version,
            "config": self.config,
            "depends_on": self.dependencies.iter()
                .map(|(name, lineage)| (name.clone(), lineage.to_json()))
                .collect::<serde_json::Map<_, _>>(),
        })
    }
}

/// Names currently being resolved, outermost first.
///
/// Entering a name already on the stack is a dependency cycle.
#[derive(Debug, Default)]
pub struct ZiResolutionStack {
    active: RefCell<Vec<String>>,
}

impl ZiResolutionStack {
    pub fn new() -> Self {
        ZiResolutionStack::default()
    }

    pub fn enter(&self, name: &str) -> Result<ZiStackGuard<'_>> {
        let mut active = self.active.borrow_mut();
        if let Some(position) = active.iter().position(|n| n == name) {
            let mut chain: Vec<String> = active[position..].to_vec();
            chain.push(name.to_string());
            return Err(ZiError::CircularDependency { chain });
        }
        active.push(name.to_string());
        Ok(ZiStackGuard { stack: self })
    }

    pub fn is_empty(&self) -> bool {
        self.active.borrow().is_empty()
    }

    pub fn depth(&self) -> usize {
        self.active.borrow().len()
    }
}

/// Pops its entry when dropped, including on early error returns.
pub struct ZiStackGuard<'a> {
    stack: &'a ZiResolutionStack,
}

impl Drop for ZiStackGuard<'_> {
    fn drop(&mut self) {
        self.stack.active.borrow_mut().pop();
    }
}

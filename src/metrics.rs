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

use serde::Serialize;
use serde_json::Value;

/// Counters describing what an orchestrator did.
#[derive(Clone, Debug, Serialize, Default, PartialEq)]
pub struct ZiEngineStats {
    pub computations: u64,
    pub memory_hits: u64,
    pub store_hits: u64,
    pub persisted: u64,
    pub failures: u64,
    pub timeouts: u64,
    pub watch_invalidations: u64,
    /// Successful computations per plugin.
    pub per_plugin: BTreeMap<String, u64>,
}

impl ZiEngineStats {
    pub fn new() -> Self {
        ZiEngineStats::default()
    }

    pub fn record_compute(&mut self, plugin: &str) {
        self.computations += 1;
        *self.per_plugin.entry(plugin.to_string()).or_insert(0) += 1;
    }

    pub fn computed(&self, plugin: &str) -> u64 {
        self.per_plugin.get(plugin).copied().unwrap_or(0)
    }

    /// Fraction of requests served from a cache, or 0 when nothing ran.
    pub fn hit_rate(&self) -> f64 {
        let hits = self.memory_hits + self.store_hits;
        let total = hits + self.computations;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }

    /// Folds another set of counters into this one.
    pub fn merge(&mut self, other: &ZiEngineStats) {
        self.computations += other.computations;
        self.memory_hits += other.memory_hits;
        self.store_hits += other.store_hits;
        self.persisted += other.persisted;
        self.failures += other.failures;
        self.timeouts += other.timeouts;
        self.watch_invalidations += other.watch_invalidations;
        for (plugin, count) in &other.per_plugin {
            *self.per_plugin.entry(plugin.clone()).or_insert(0) += count;
        }
    }

    pub fn as_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

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

//! Failure reports for plugin computations.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::resolver::ZiResolvedConfig;
use crate::data::ZiData;

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct ZiInputSummary {
    pub kind: String,
    pub shape: String,
    pub size_bytes: Option<usize>,
}

impl ZiInputSummary {
    pub fn of(data: &ZiData) -> Self {
        ZiInputSummary {
            kind: data.kind_name().to_string(),
            shape: data.shape(),
            size_bytes: data.size_bytes(),
        }
    }
}

/// What was known about a computation when it failed.
#[derive(Clone, Debug, Serialize)]
pub struct ZiDiagnostics {
    pub run_id: String,
    pub plugin: String,
    pub plugin_type: String,
    pub config: ZiResolvedConfig,
    pub inputs: BTreeMap<String, ZiInputSummary>,
    pub resident_memory_kb: Option<u64>,
    pub error: String,
}

impl ZiDiagnostics {
    /// One-line summary for the error log.
    pub fn summary(&self) -> String {
        let inputs = self
            .inputs
            .iter()
            .map(|(name, input)| format!("{name}={}", input.shape))
            .collect::<Vec<_>>()
            .join("; ");
        format!(
            "run={}, plugin={}, type={}, inputs=[{}], rss_kb={}, error={}",
            self.run_id,
            self.plugin,
            self.plugin_type,
            inputs,
            self.resident_memory_kb
                .map_or_else(|| "n/a".to_string(), |kb| kb.to_string()),
            self.error
        )
    }

    pub fn log(&self) {
        log::error!("context.compute.failed: computation failed - {}", self.summary());
        match serde_json::to_string(self) {
            Ok(bundle) => log::debug!("context.compute.diagnostics: {}", bundle),
            Err(err) => log::debug!(
                "context.compute.diagnostics: bundle not serialisable - error={}",
                err
            ),
        }
    }
}

/// Resident set size of this process, where the platform reports it.
pub fn resident_memory_kb() -> Option<u64> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    status
        .lines()
        .find(|line| line.starts_with("VmRSS:"))
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|kb| kb.parse().ok())
}

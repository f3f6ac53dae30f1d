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

//! Driving many runs at once.
//!
//! Each run gets its own forked [`ZiContext`] on a worker of a bounded
//! executor. The runner's cancellation token is polled before a run starts:
//! runs already in progress finish, the others are reported as skipped and
//! touch nothing.

use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde::Serialize;

use crate::context::{ZiContext, ZiContextSeed};
use crate::errors::Result;
use crate::exec::cancel::ZiCancelToken;
use crate::exec::pool::{ZiExecutorKind, ZiExecutorRegistry};
use crate::metrics::ZiEngineStats;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", content = "error", rename_all = "snake_case")]
pub enum ZiRunStatus {
    Completed,
    Failed(String),
    Skipped,
}

#[derive(Clone, Debug, Serialize)]
pub struct ZiRunReport {
    pub run_id: String,
    pub status: ZiRunStatus,
    pub elapsed: Duration,
    pub stats: ZiEngineStats,
}

pub struct ZiBatchRunner {
    name: String,
    workers: Option<usize>,
    stop_on_error: bool,
    cancel: ZiCancelToken,
    registry: ZiExecutorRegistry,
}

impl Default for ZiBatchRunner {
    fn default() -> Self {
        ZiBatchRunner {
            name: "batch".to_string(),
            workers: None,
            stop_on_error: false,
            cancel: ZiCancelToken::new(),
            registry: ZiExecutorRegistry::global().clone(),
        }
    }
}

impl ZiBatchRunner {
    pub fn new() -> Self {
        ZiBatchRunner::default()
    }

    /// Executor name, shared with other runners of the same name and size.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Worker count; defaults to the number of CPUs.
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    /// Cancel the remaining runs after the first failure.
    pub fn stop_on_error(mut self, stop: bool) -> Self {
        self.stop_on_error = stop;
        self
    }

    pub fn registry(mut self, registry: ZiExecutorRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Token that stops runs which have not started yet.
    pub fn cancel_token(&self) -> ZiCancelToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Computes `targets` for every run, one forked context per run.
    ///
    /// Reports come back in the order of `runs`. The runner's executor
    /// handle is released when the batch ends; the pool itself lives on
    /// while other handles to it exist.
    pub fn run(
        &self,
        context: &ZiContext,
        runs: &[String],
        targets: &[String],
    ) -> Result<Vec<ZiRunReport>> {
        let seed = context.seed();
        let executor = self
            .registry
            .acquire(&self.name, ZiExecutorKind::Thread, self.workers)?;
        log::info!(
            "batch.start: batch started - runs={}, targets={}, workers={}",
            runs.len(),
            targets.len(),
            executor.workers()
        );

        let started = Instant::now();
        let reports: Vec<ZiRunReport> = executor.install(|| {
            runs.par_iter()
                .map(|run_id| self.run_one(&seed, run_id, targets))
                .collect()
        });
        drop(executor);

        let failed = reports
            .iter()
            .filter(|report| matches!(report.status, ZiRunStatus::Failed(_)))
            .count();
        let skipped = reports
            .iter()
            .filter(|report| report.status == ZiRunStatus::Skipped)
            .count();
        log::info!(
            "batch.done: batch finished - runs={}, failed={}, skipped={}, elapsed_ms={}",
            reports.len(),
            failed,
            skipped,
            started.elapsed().as_millis()
        );
        Ok(reports)
    }

    fn run_one(&self, seed: &ZiContextSeed, run_id: &str, targets: &[String]) -> ZiRunReport {
        if self.cancel.is_cancelled() {
            log::debug!("batch.skip: run skipped after cancellation - run={}", run_id);
            return ZiRunReport {
                run_id: run_id.to_string(),
                status: ZiRunStatus::Skipped,
                elapsed: Duration::ZERO,
                stats: ZiEngineStats::new(),
            };
        }

        let started = Instant::now();
        let context = seed.context();
        let failure = targets
            .iter()
            .find_map(|target| context.get_data(run_id, target).err());

        let status = match failure {
            Some(err) => {
                log::warn!("batch.run.failed: run failed - run={}, error={}", run_id, err);
                if self.stop_on_error {
                    self.cancel.cancel();
                }
                ZiRunStatus::Failed(err.to_string())
            }
            None => ZiRunStatus::Completed,
        };

        ZiRunReport {
            run_id: run_id.to_string(),
            status,
            elapsed: started.elapsed(),
            stats: context.stats(),
        }
    }
}

/// Counters of all reports folded together.
pub fn total_stats(reports: &[ZiRunReport]) -> ZiEngineStats {
    let mut total = ZiEngineStats::new();
    for report in reports {
        total.merge(&report.stats);
    }
    total
}

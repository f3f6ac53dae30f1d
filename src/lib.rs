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

//! # Zirun Core Library
//!
//! Zirun is a pluggable, incrementally cached processing engine for batch
//! analysis of instrument runs. Computation is a DAG of named data products
//! ("plugins"); every product is cached under a lineage key derived from its
//! code version, its tracked configuration and the keys of everything it
//! depends on. The crate also ships the records store: a fixed-width,
//! globally time-ordered event index over one contiguous sample pool.
//!
//! ## Module Overview
//!
//! - **plugin**: the plugin contract, closure-backed plugins and the engine view
//! - **context**: the orchestrator answering `get_data(run, name)`
//! - **config**: option model, compatibility aliases and config resolution
//! - **adapter**: instrument adapters that infer acquisition options
//! - **data**: values, tables, per-channel arrays, records and sequences
//! - **storage**: lineage keys, storage backends and committed artifacts
//! - **records**: records + sample-pool builder, sharded build and merge
//! - **cache**: run-scoped in-memory cache with stale-key eviction
//! - **exec**: pooled executors, deadlines, cancellation and batch runs
//! - **lineage**: run-independent derivation trees and cycle detection
//! - **diagnostics**: failure bundles for plugin computations
//! - **metrics**: engine counters
//! - **log**: JSON-lines backend for the `log` facade
//! - **version**: dotted versions and version constraints
//!
//! ## Feature Flags
//!
//! - `parallel`: build record shards concurrently with Rayon
//! - `compression`: Zstandard compression of stored artifact parts
//! - `full`: enables all features
//!
//! ## Quick Start
//!
//! ```rust
//! use serde_json::json;
//! use zirun::{ZiContext, ZiData, ZiFnPlugin, ZiOption};
//!
//! let ctx = ZiContext::in_memory().unwrap();
//! ctx.register(ZiFnPlugin::new("a", |_| Ok(ZiData::from(10i64)))).unwrap();
//! ctx.register(
//!     ZiFnPlugin::new("b", |input| {
//!         let a = input.input("a")?.as_i64().unwrap_or(0);
//!         Ok(ZiData::from(a + input.config.get_i64("offset")?))
//!     })
//!     .depends("a")
//!     .option(ZiOption::new("offset", 1i64)),
//! )
//! .unwrap();
//! ctx.set_config(&json!({"b": {"offset": 1}})).unwrap();
//!
//! assert_eq!(ctx.get_data("run_001", "b").unwrap().as_i64(), Some(11));
//! ```
//!
//! ## Error Handling
//!
//! All operations return `Result<T, ZiError>`. Failures inside a plugin are
//! reported as `ZiError::Compute` naming the plugin; `ZiError::root_cause`
//! reaches the underlying error.

pub mod adapter;
pub mod cache;
pub mod config;
pub mod context;
pub mod data;
pub mod diagnostics;
pub mod errors;
pub mod exec;
pub mod lineage;
pub mod log;
pub mod metrics;
pub mod plugin;
pub mod records;
pub mod storage;
pub mod version;

pub use adapter::{ZiAdapterFormat, ZiAdapterRegistry, ZiInstrumentAdapter, ZiStaticAdapter};
pub use config::{ZiAlias, ZiCompatRegistry, ZiConfigValue, ZiOption, ZiOptionType, ZiProvenance, ZiResolvedConfig};
pub use context::{ZiContext, ZiContextConfig, ZiContextSeed};
pub use data::{ZiArray, ZiDType, ZiData, ZiOutputSchema, ZiSequence, ZiTable, ZiTableSchema};
pub use errors::{Result, ZiError};
pub use exec::{ZiBatchRunner, ZiCancelToken, ZiExecutorKind, ZiExecutorRegistry, ZiRunReport, ZiRunStatus};
pub use lineage::ZiLineage;
pub use metrics::ZiEngineStats;
pub use plugin::{
    ZiComputeInput, ZiDependency, ZiEngine, ZiFnPlugin, ZiOutputKind, ZiPlugin, ZiPluginSpec,
    ZiSaveWhen,
};
pub use records::{ZiChannelInput, ZiRawEvent, ZiRecord, ZiRecordsBuilder, ZiRecordsBundle, ZiSamplePool};
pub use storage::{ZiArtifactStore, ZiFileStorage, ZiLineageKey, ZiMemoryStorage, ZiStorage};
pub use version::{ZiVersion, ZiVersionReq};

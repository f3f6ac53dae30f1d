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

//! Execution manager: pooled executors, deadlines, cancellation and batch
//! driving.

pub mod batch;
pub mod cancel;
pub mod pool;
pub mod timeout;

pub use batch::{total_stats, ZiBatchRunner, ZiRunReport, ZiRunStatus};
pub use cancel::ZiCancelToken;
pub use pool::{ZiExecutor, ZiExecutorHandle, ZiExecutorKind, ZiExecutorRegistry};
pub use timeout::{catch_panics, run_with_timeout, timeout_count};

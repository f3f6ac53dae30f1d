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

//! Structured logging backend for the `log` facade.
//!
//! Library code logs through `log::info!` and friends with messages of the
//! form `"area.event: message - key=value, ..."`. Applications that want
//! JSON lines install [`ZiLogger`] once at startup:
//!
//! ```rust
//! use zirun::log::{ZiLogConfig, ZiLogger};
//!
//! ZiLogger::init(ZiLogConfig::new().level("debug")).unwrap();
//! ```

pub mod config;
pub mod core;
pub mod handlers;

pub use self::config::ZiLogConfig;
pub use self::core::{ZiLogRecord, ZiLogger};
pub use self::handlers::{ZiFileHandler, ZiLogHandler, ZiStdoutHandler};

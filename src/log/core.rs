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

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

use log::{Level, LevelFilter, Log, Metadata, Record};
use serde_json::{json, Value};

use crate::errors::{Result, ZiError};
use crate::log::config::ZiLogConfig;
use crate::log::handlers::{ZiFileHandler, ZiLogHandler, ZiStdoutHandler};

/// One log line, split into event and message.
///
/// Messages written as `"area.event: text"` carry their event name in the
/// prefix; anything else is filed under the record target.
#[derive(Clone, Debug, PartialEq)]
pub struct ZiLogRecord {
    pub level: Level,
    pub event: String,
    pub message: String,
    pub target: String,
    pub timestamp_ms: u128,
}

impl ZiLogRecord {
    pub fn parse(level: Level, target: &str, text: &str, timestamp: SystemTime) -> Self {
        let (event, message) = match text.split_once(": ") {
            Some((prefix, rest))
                if prefix.contains('.') && !prefix.contains(char::is_whitespace) =>
            {
                (prefix.to_string(), rest.to_string())
            }
            _ => (target.to_string(), text.to_string()),
        };
        ZiLogRecord {
            level,
            event,
            message,
            target: target.to_string(),
            timestamp_ms: timestamp
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis(),
        }
    }

    pub fn to_json(&self) -> Value {
        json!({
            "level": self.level.as_str(),
            "event": self.event,
            "message": self.message,
            "target": self.target,
            "timestamp_ms": self.timestamp_ms,
        })
    }

    pub fn to_text(&self) -> String {
        format!(
            "{} {:<5} {}: {}",
            self.timestamp_ms, self.level, self.event, self.message
        )
    }
}

/// `log` backend writing to stdout and/or a rotating file.
pub struct ZiLogger {
    config: ZiLogConfig,
    filter: LevelFilter,
    handlers: Vec<Box<dyn ZiLogHandler>>,
}

static LOGGER: OnceLock<ZiLogger> = OnceLock::new();

impl ZiLogger {
    pub fn new(config: ZiLogConfig) -> Result<Self> {
        let filter = config.level_filter()?;
        let mut handlers: Vec<Box<dyn ZiLogHandler>> = Vec::new();
        if config.console_enabled {
            handlers.push(Box::new(ZiStdoutHandler));
        }
        if let Some(path) = &config.file_path {
            handlers.push(Box::new(ZiFileHandler::new(
                path.clone(),
                config.max_bytes,
                config.backup_count,
            )));
        }
        Ok(ZiLogger {
            config,
            filter,
            handlers,
        })
    }

    /// Installs the global logger. The first call wins; later calls return
    /// `Ok(false)` and leave the installed logger in place.
    pub fn init(config: ZiLogConfig) -> Result<bool> {
        if LOGGER.get().is_some() {
            return Ok(false);
        }
        let logger = ZiLogger::new(config)?;
        let filter = logger.filter;
        let installed = LOGGER.get_or_init(|| logger);
        match log::set_logger(installed) {
            Ok(()) => {
                log::set_max_level(filter);
                Ok(true)
            }
            Err(_) => Err(ZiError::internal(
                "another logger is already installed for this process",
            )),
        }
    }

    pub fn format(&self, record: &ZiLogRecord) -> String {
        if self.config.json_format {
            record.to_json().to_string()
        } else {
            record.to_text()
        }
    }

    /// Deterministic per-event sampling keyed on event and timestamp.
    fn sampled(&self, record: &ZiLogRecord) -> bool {
        let rate = self.config.event_sampling_rate(&record.event);
        if rate >= 1.0 {
            return true;
        }
        if rate <= 0.0 {
            return false;
        }
        let mut hasher = DefaultHasher::new();
        record.event.hash(&mut hasher);
        record.timestamp_ms.hash(&mut hasher);
        (hasher.finish() as f64 / u64::MAX as f64) <= rate
    }

    pub fn emit(&self, record: &ZiLogRecord) {
        if !self.sampled(record) {
            return;
        }
        let line = self.format(record);
        for handler in &self.handlers {
            handler.handle(&line);
        }
    }
}

impl Log for ZiLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.filter
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let parsed = ZiLogRecord::parse(
            record.level(),
            record.target(),
            &record.args().to_string(),
            SystemTime::now(),
        );
        self.emit(&parsed);
    }

    fn flush(&self) {}
}

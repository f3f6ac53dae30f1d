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

//! # Zirun Error Module
//!
//! This module defines the error types used throughout Zirun for consistent
//! error handling and reporting.
//!
//! ## Error Categories
//!
//! - **Resolution**: `MissingPlugin`, `MissingDependency`, `CircularDependency`
//! - **Configuration**: `ConfigValidation`, `DeprecationRejected`, `Validation`
//! - **Contracts**: `InputContract`, `OutputContract`
//! - **Execution**: `Compute`, `Timeout`
//! - **Infrastructure**: `Storage`, `Io`, `Serde`, `Internal`
//!
//! Failures raised while a plugin computes are wrapped into
//! [`ZiError::Compute`], which renders as `Plugin '<name>' failed: <message>`
//! and keeps the original error reachable through [`ZiError::root_cause`].
//! Errors coming up from dependencies are never re-wrapped, so the plugin
//! named in the message is always the one that actually failed.
//!
//! ## Usage
//!
//! ```rust
//! use zirun::errors::{Result, ZiError};
//!
//! fn threshold(value: i64) -> Result<i64> {
//!     if value < 0 {
//!         return Err(ZiError::validation("threshold must be non-negative"));
//!     }
//!     Ok(value)
//! }
//! ```

use std::io;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Convenience result type used throughout Zirun.
pub type Result<T> = std::result::Result<T, ZiError>;

/// Canonical error enumeration for Zirun.
#[derive(Debug, Error, Serialize, Deserialize)]
pub enum ZiError {
    /// No registered plugin provides the requested data product.
    #[error("no plugin provides '{name}'")]
    MissingPlugin { name: String },

    /// A dependency names an unregistered product or an incompatible version.
    #[error("plugin '{plugin}' depends on '{dependency}': {message}")]
    MissingDependency {
        plugin: String,
        dependency: String,
        message: String,
    },

    /// The dependency graph re-entered a product that is still being resolved.
    #[error("circular dependency detected: {}", chain.join(" -> "))]
    CircularDependency { chain: Vec<String> },

    /// A configuration value failed type checking, coercion or validation.
    #[error("invalid value for option '{option}' of plugin '{plugin}': {message}")]
    ConfigValidation {
        plugin: String,
        option: String,
        message: String,
    },

    /// A deprecated option alias was used at or after its removal version.
    #[error("option '{alias}' was removed in version {removed_in}; use '{canonical}' instead")]
    DeprecationRejected {
        alias: String,
        canonical: String,
        removed_in: String,
    },

    /// Data handed to a plugin does not match its dependency's declared shape.
    #[error("plugin '{plugin}' received malformed input from '{dependency}': {message}")]
    InputContract {
        plugin: String,
        dependency: String,
        message: String,
    },

    /// A plugin returned a result that violates its declared output shape.
    #[error("plugin '{plugin}' violated its output contract: {message}")]
    OutputContract { plugin: String, message: String },

    /// Any failure raised while a plugin was computing.
    #[error("Plugin '{plugin}' failed: {cause}")]
    Compute { plugin: String, cause: Box<ZiError> },

    /// A callable overran its deadline.
    #[error("'{callable}' exceeded its time limit of {limit_ms} ms")]
    Timeout { callable: String, limit_ms: u64 },

    /// Validation errors triggered by invalid parameters or inputs.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Failures while reading or writing persisted artifacts.
    #[error("storage error for '{key}': {message}")]
    Storage { key: String, message: String },

    /// Errors originating from filesystem IO.
    #[error("io error: {0}")]
    Io(String),

    /// Wrapper for serde-style serialization issues.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Catch-all variant for unexpected situations.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<io::Error> for ZiError {
    fn from(err: io::Error) -> Self {
        ZiError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for ZiError {
    fn from(err: serde_json::Error) -> Self {
        ZiError::Serde(err.to_string())
    }
}

impl From<serde_yaml::Error> for ZiError {
    fn from(err: serde_yaml::Error) -> Self {
        ZiError::Serde(err.to_string())
    }
}

impl From<anyhow::Error> for ZiError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<ZiError>() {
            Ok(inner) => inner,
            Err(other) => ZiError::Internal(format!("{other:#}")),
        }
    }
}

impl ZiError {
    /// Helper to construct simple validation errors.
    pub fn validation<T: Into<String>>(message: T) -> Self {
        ZiError::Validation {
            message: message.into(),
        }
    }

    /// Helper to construct configuration validation errors.
    pub fn config(
        plugin: impl Into<String>,
        option: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        ZiError::ConfigValidation {
            plugin: plugin.into(),
            option: option.into(),
            message: message.into(),
        }
    }

    pub fn output_contract(plugin: impl Into<String>, message: impl Into<String>) -> Self {
        ZiError::OutputContract {
            plugin: plugin.into(),
            message: message.into(),
        }
    }

    pub fn storage(key: impl Into<String>, message: impl Into<String>) -> Self {
        ZiError::Storage {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Wraps `cause` as the failure of `plugin`.
    pub fn compute(plugin: impl Into<String>, cause: ZiError) -> Self {
        ZiError::Compute {
            plugin: plugin.into(),
            cause: Box::new(cause),
        }
    }

    /// Helper to construct internal errors.
    pub fn internal<T: Into<String>>(message: T) -> Self {
        ZiError::Internal(message.into())
    }

    /// Returns the innermost error beneath any compute wrappers.
    pub fn root_cause(&self) -> &ZiError {
        match self {
            ZiError::Compute { cause, .. } => cause.root_cause(),
            other => other,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self.root_cause(), ZiError::Timeout { .. })
    }

    /// Name of the plugin a compute failure is attributed to.
    pub fn failed_plugin(&self) -> Option<&str> {
        match self {
            ZiError::Compute { plugin, .. } => Some(plugin),
            _ => None,
        }
    }
}

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

use std::fmt;
use std::sync::{Arc, OnceLock};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::value::ZiConfigValue;
use crate::errors::{Result, ZiError};

static IDENTIFIER: OnceLock<Regex> = OnceLock::new();

/// Checks that `name` is usable as a plugin or option identifier.
pub(crate) fn validate_identifier(what: &str, name: &str) -> Result<()> {
    let pattern = IDENTIFIER
        .get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_\-]*$").expect("static identifier pattern"));
    if pattern.is_match(name) {
        Ok(())
    } else {
        Err(ZiError::validation(format!(
            "{what} '{name}' is not a valid identifier"
        )))
    }
}

/// Declared type of an option.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZiOptionType {
    Any,
    Bool,
    Int,
    Float,
    Str,
    List,
}

impl ZiOptionType {
    /// Type implied by a default value; `Null` admits anything.
    pub fn of(value: &ZiConfigValue) -> Self {
        match value {
            ZiConfigValue::Null => ZiOptionType::Any,
            ZiConfigValue::Bool(_) => ZiOptionType::Bool,
            ZiConfigValue::Int(_) => ZiOptionType::Int,
            ZiConfigValue::Float(_) => ZiOptionType::Float,
            ZiConfigValue::Str(_) => ZiOptionType::Str,
            ZiConfigValue::List(_) => ZiOptionType::List,
        }
    }

    pub fn matches(&self, value: &ZiConfigValue) -> bool {
        match self {
            ZiOptionType::Any => true,
            other => *other == ZiOptionType::of(value),
        }
    }

    /// Best-effort coercion of a value that does not already match.
    pub fn coerce(&self, value: &ZiConfigValue) -> Option<ZiConfigValue> {
        match (self, value) {
            (ZiOptionType::Float, ZiConfigValue::Int(i)) => Some(ZiConfigValue::Float(*i as f64)),
            (ZiOptionType::Int, ZiConfigValue::Float(f))
                if f.fract() == 0.0 && f.is_finite() && f.abs() < i64::MAX as f64 =>
            {
                Some(ZiConfigValue::Int(*f as i64))
            }
            (ZiOptionType::Int, ZiConfigValue::Str(s)) => {
                s.trim().parse::<i64>().ok().map(ZiConfigValue::Int)
            }
            (ZiOptionType::Float, ZiConfigValue::Str(s)) => {
                s.trim().parse::<f64>().ok().map(ZiConfigValue::Float)
            }
            (ZiOptionType::Bool, ZiConfigValue::Str(s)) => {
                match s.trim().to_ascii_lowercase().as_str() {
                    "true" | "yes" | "on" | "1" => Some(ZiConfigValue::Bool(true)),
                    "false" | "no" | "off" | "0" => Some(ZiConfigValue::Bool(false)),
                    _ => None,
                }
            }
            (ZiOptionType::Bool, ZiConfigValue::Int(i)) if *i == 0 || *i == 1 => {
                Some(ZiConfigValue::Bool(*i == 1))
            }
            _ => None,
        }
    }
}

pub type ZiValidatorFn = Arc<dyn Fn(&ZiConfigValue) -> bool + Send + Sync>;

/// A named, typed, validated configuration parameter of a plugin.
#[derive(Clone)]
pub struct ZiOption {
    pub name: String,
    pub default: ZiConfigValue,
    pub kind: ZiOptionType,
    /// Whether the value participates in lineage hashing.
    pub track: bool,
    pub help: String,
    validator: Option<(String, ZiValidatorFn)>,
}

impl fmt::Debug for ZiOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZiOption")
            .field("name", &self.name)
            .field("default", &self.default)
            .field("kind", &self.kind)
            .field("track", &self.track)
            .field("validator", &self.validator.as_ref().map(|(desc, _)| desc))
            .finish()
    }
}

impl ZiOption {
    /// Creates a tracked option whose type follows its default.
    pub fn new(name: impl Into<String>, default: impl Into<ZiConfigValue>) -> Self {
        let default = default.into();
        ZiOption {
            name: name.into(),
            kind: ZiOptionType::of(&default),
            default,
            track: true,
            help: String::new(),
            validator: None,
        }
    }

    /// Creates an option without a default that must be supplied.
    pub fn required(name: impl Into<String>, kind: ZiOptionType) -> Self {
        ZiOption {
            name: name.into(),
            default: ZiConfigValue::Null,
            kind,
            track: true,
            help: String::new(),
            validator: None,
        }
    }

    pub fn kind(mut self, kind: ZiOptionType) -> Self {
        self.kind = kind;
        self
    }

    pub fn untracked(mut self) -> Self {
        self.track = false;
        self
    }

    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = help.into();
        self
    }

    pub fn validator<F>(mut self, description: impl Into<String>, check: F) -> Self
    where
        F: Fn(&ZiConfigValue) -> bool + Send + Sync + 'static,
    {
        self.validator = Some((description.into(), Arc::new(check)));
        self
    }

    /// A `Null` default on a typed option means the caller must supply it.
    pub fn is_required(&self) -> bool {
        self.default.is_null() && self.kind != ZiOptionType::Any
    }

    /// Type-checks, coerces and validates `value` for `plugin`.
    pub fn validate(&self, plugin: &str, value: &ZiConfigValue) -> Result<ZiConfigValue> {
        let value = if self.kind.matches(value) {
            value.clone()
        } else {
            self.kind.coerce(value).ok_or_else(|| {
                ZiError::config(
                    plugin,
                    &self.name,
                    format!(
                        "expected {:?}, got {} {}",
                        self.kind,
                        value.type_name(),
                        value
                    ),
                )
            })?
        };

        if let Some((description, check)) = &self.validator {
            if !check(&value) {
                return Err(ZiError::config(
                    plugin,
                    &self.name,
                    format!("value {value} rejected: {description}"),
                ));
            }
        }
        Ok(value)
    }

    /// Registration-time check of the declaration itself.
    pub fn check_well_formed(&self, plugin: &str) -> Result<()> {
        validate_identifier("option name", &self.name)?;
        if self.is_required() {
            return Ok(());
        }
        self.validate(plugin, &self.default).map(|_| ()).map_err(|err| {
            ZiError::validation(format!(
                "default of option '{}' on plugin '{plugin}' is invalid: {err}",
                self.name
            ))
        })
    }
}

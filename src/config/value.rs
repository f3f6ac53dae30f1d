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

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{Result, ZiError};

/// Typed configuration value. Maps are deliberately absent: nested objects
/// only exist at the `set_config` boundary, where they denote namespaces.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ZiConfigValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<ZiConfigValue>),
}

impl ZiConfigValue {
    pub fn from_json(value: &Value) -> Result<Self> {
        Ok(match value {
            Value::Null => ZiConfigValue::Null,
            Value::Bool(b) => ZiConfigValue::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => ZiConfigValue::Int(i),
                None => ZiConfigValue::Float(n.as_f64().ok_or_else(|| {
                    ZiError::validation(format!("number {n} is out of range"))
                })?),
            },
            Value::String(s) => ZiConfigValue::Str(s.clone()),
            Value::Array(items) => ZiConfigValue::List(
                items
                    .iter()
                    .map(ZiConfigValue::from_json)
                    .collect::<Result<Vec<_>>>()?,
            ),
            Value::Object(_) => {
                return Err(ZiError::validation(
                    "nested objects are not valid option values",
                ))
            }
        })
    }

    pub fn to_json(&self) -> Value {
        match self {
            ZiConfigValue::Null => Value::Null,
            ZiConfigValue::Bool(b) => Value::Bool(*b),
            ZiConfigValue::Int(i) => Value::from(*i),
            ZiConfigValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            ZiConfigValue::Str(s) => Value::String(s.clone()),
            ZiConfigValue::List(items) => {
                Value::Array(items.iter().map(ZiConfigValue::to_json).collect())
            }
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ZiConfigValue::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ZiConfigValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ZiConfigValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Integers widen to floats here.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ZiConfigValue::Float(f) => Some(*f),
            ZiConfigValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ZiConfigValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[ZiConfigValue]> {
        match self {
            ZiConfigValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            ZiConfigValue::Null => "null",
            ZiConfigValue::Bool(_) => "bool",
            ZiConfigValue::Int(_) => "int",
            ZiConfigValue::Float(_) => "float",
            ZiConfigValue::Str(_) => "string",
            ZiConfigValue::List(_) => "list",
        }
    }
}

impl fmt::Display for ZiConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

impl From<bool> for ZiConfigValue {
    fn from(value: bool) -> Self {
        ZiConfigValue::Bool(value)
    }
}

impl From<i64> for ZiConfigValue {
    fn from(value: i64) -> Self {
        ZiConfigValue::Int(value)
    }
}

impl From<i32> for ZiConfigValue {
    fn from(value: i32) -> Self {
        ZiConfigValue::Int(value as i64)
    }
}

impl From<f64> for ZiConfigValue {
    fn from(value: f64) -> Self {
        ZiConfigValue::Float(value)
    }
}

impl From<&str> for ZiConfigValue {
    fn from(value: &str) -> Self {
        ZiConfigValue::Str(value.to_string())
    }
}

impl From<String> for ZiConfigValue {
    fn from(value: String) -> Self {
        ZiConfigValue::Str(value)
    }
}

impl<T: Into<ZiConfigValue>> From<Vec<T>> for ZiConfigValue {
    fn from(values: Vec<T>) -> Self {
        ZiConfigValue::List(values.into_iter().map(Into::into).collect())
    }
}

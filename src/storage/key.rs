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
use serde_json::{json, Map, Value};

use crate::errors::{Result, ZiError};

/// Length of a lineage key in hex characters.
pub const KEY_HEX_LEN: usize = 40;

/// Content-addressed identity of one data product for one run.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ZiLineageKey(String);

impl ZiLineageKey {
    pub fn parse(key: &str) -> Result<Self> {
        let valid = key.len() == KEY_HEX_LEN
            && key
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if valid {
            Ok(ZiLineageKey(key.to_string()))
        } else {
            Err(ZiError::validation(format!(
                "'{key}' is not a {KEY_HEX_LEN}-character lowercase hex key"
            )))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Storage name of the per-channel part `index`.
    pub fn channel(&self, index: usize) -> String {
        format!("{}_ch{index}", self.0)
    }

    /// Storage name of sequence chunk `index`.
    pub fn chunk(&self, index: usize) -> String {
        format!("{}_chunk{index}", self.0)
    }

    /// Storage name of a single-part payload.
    pub fn data(&self) -> String {
        format!("{}_data", self.0)
    }
}

impl fmt::Display for ZiLineageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Rebuilds `value` with every object's keys in sorted order.
fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::new();
            for key in keys {
                sorted.insert(key.clone(), canonicalize(&map[key]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Canonical text hashed into a lineage key.
pub fn canonical_encoding(plugin: &str, run_id: &str, tracked: &Value) -> String {
    let document = canonicalize(&json!({
        "plugin": plugin,
        "run": run_id,
        "kwargs": tracked,
    }));
    document.to_string()
}

/// Lineage key over plugin name, run id and tracked parameters.
///
/// The digest is BLAKE3 truncated to 20 bytes, so keys are 40 lowercase hex
/// characters. Object key order in `tracked` does not matter.
pub fn lineage_key(plugin: &str, run_id: &str, tracked: &Value) -> ZiLineageKey {
    let encoded = canonical_encoding(plugin, run_id, tracked);
    let mut hasher = blake3::Hasher::new();
    hasher.update(encoded.as_bytes());
    let mut digest = [0u8; KEY_HEX_LEN / 2];
    hasher.finalize_xof().fill(&mut digest);
    ZiLineageKey(hex::encode(digest))
}

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

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, ZiError};

/// Dotted numeric version such as `1.4` or `0.12.3-rc1`.
///
/// Missing trailing components compare as zero, so `1.2 == 1.2.0`. A
/// pre-release suffix sorts before the plain release.
#[derive(Clone, Debug, Eq, Serialize, Deserialize)]
pub struct ZiVersion {
    parts: Vec<u64>,
    pre_release: Option<String>,
}

impl ZiVersion {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        ZiVersion {
            parts: vec![major, minor, patch],
            pre_release: None,
        }
    }

    pub fn parse(version_str: &str) -> Result<Self> {
        let trimmed = version_str.trim();
        if trimmed.is_empty() {
            return Err(ZiError::validation("version string is empty"));
        }

        let (numeric, pre_release) = match trimmed.find('-') {
            Some(dash) => (&trimmed[..dash], Some(trimmed[dash + 1..].to_string())),
            None => (trimmed, None),
        };

        let parts = numeric
            .split('.')
            .map(|part| {
                part.parse::<u64>().map_err(|_| {
                    ZiError::validation(format!(
                        "invalid version '{version_str}': '{part}' is not a number"
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(ZiVersion { parts, pre_release })
    }

    fn component(&self, index: usize) -> u64 {
        self.parts.get(index).copied().unwrap_or(0)
    }
}

impl PartialEq for ZiVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Ord for ZiVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let width = self.parts.len().max(other.parts.len());
        for index in 0..width {
            match self.component(index).cmp(&other.component(index)) {
                Ordering::Equal => continue,
                unequal => return unequal,
            }
        }
        match (&self.pre_release, &other.pre_release) {
            (None, None) => Ordering::Equal,
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (Some(left), Some(right)) => left.cmp(right),
        }
    }
}

impl PartialOrd for ZiVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ZiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let numeric = self
            .parts
            .iter()
            .map(|part| part.to_string())
            .collect::<Vec<_>>()
            .join(".");
        match &self.pre_release {
            Some(pre) => write!(f, "{numeric}-{pre}"),
            None => write!(f, "{numeric}"),
        }
    }
}

impl FromStr for ZiVersion {
    type Err = ZiError;

    fn from_str(s: &str) -> Result<Self> {
        ZiVersion::parse(s)
    }
}

/// Constraint a dependency places on the version of the plugin it consumes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ZiVersionReq {
    Any,
    Exact(ZiVersion),
    Greater(ZiVersion),
    AtLeast(ZiVersion),
    Below(ZiVersion),
    AtMost(ZiVersion),
    /// Same leading component, at least the given version.
    Compatible(ZiVersion),
}

impl ZiVersionReq {
    pub fn parse(req: &str) -> Result<Self> {
        let req = req.trim();
        if req.is_empty() || req == "*" {
            return Ok(ZiVersionReq::Any);
        }

        let operators: [(&str, fn(ZiVersion) -> ZiVersionReq); 6] = [
            ("==", ZiVersionReq::Exact),
            (">=", ZiVersionReq::AtLeast),
            ("<=", ZiVersionReq::AtMost),
            (">", ZiVersionReq::Greater),
            ("<", ZiVersionReq::Below),
            ("^", ZiVersionReq::Compatible),
        ];
        for (prefix, build) in operators {
            if let Some(rest) = req.strip_prefix(prefix) {
                return Ok(build(ZiVersion::parse(rest)?));
            }
        }
        Ok(ZiVersionReq::Exact(ZiVersion::parse(req)?))
    }

    pub fn matches(&self, version: &ZiVersion) -> bool {
        match self {
            ZiVersionReq::Any => true,
            ZiVersionReq::Exact(v) => version == v,
            ZiVersionReq::Greater(v) => version > v,
            ZiVersionReq::AtLeast(v) => version >= v,
            ZiVersionReq::Below(v) => version < v,
            ZiVersionReq::AtMost(v) => version <= v,
            ZiVersionReq::Compatible(v) => version >= v && version.component(0) == v.component(0),
        }
    }
}

impl fmt::Display for ZiVersionReq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ZiVersionReq::Any => write!(f, "*"),
            ZiVersionReq::Exact(v) => write!(f, "=={v}"),
            ZiVersionReq::Greater(v) => write!(f, ">{v}"),
            ZiVersionReq::AtLeast(v) => write!(f, ">={v}"),
            ZiVersionReq::Below(v) => write!(f, "<{v}"),
            ZiVersionReq::AtMost(v) => write!(f, "<={v}"),
            ZiVersionReq::Compatible(v) => write!(f, "^{v}"),
        }
    }
}

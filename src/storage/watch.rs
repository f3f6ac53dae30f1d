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

use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use serde::{Deserialize, Serialize};
use xxhash_rust::xxh3::xxh3_64;

use crate::errors::Result;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZiWatchedFile {
    pub path: String,
    pub exists: bool,
    pub modified_ns: u64,
    pub size: u64,
}

impl ZiWatchedFile {
    fn stat(path: &Path) -> Result<Self> {
        let display = path.to_string_lossy().into_owned();
        match fs::metadata(path) {
            Ok(meta) => {
                let modified_ns = meta
                    .modified()?
                    .duration_since(UNIX_EPOCH)
                    .unwrap_or_default()
                    .as_nanos() as u64;
                Ok(ZiWatchedFile {
                    path: display,
                    exists: true,
                    modified_ns,
                    size: meta.len(),
                })
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(ZiWatchedFile {
                path: display,
                exists: false,
                modified_ns: 0,
                size: 0,
            }),
            Err(err) => Err(err.into()),
        }
    }
}

/// Modification-time and size fingerprint of external input files.
///
/// Stored with an artifact; if it differs on load the artifact is stale.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZiWatchSignature {
    pub files: Vec<ZiWatchedFile>,
    pub digest: String,
}

impl ZiWatchSignature {
    pub fn compute(paths: &[PathBuf]) -> Result<Self> {
        let mut sorted: Vec<&PathBuf> = paths.iter().collect();
        sorted.sort();
        sorted.dedup();

        let files = sorted
            .into_iter()
            .map(|path| ZiWatchedFile::stat(path))
            .collect::<Result<Vec<_>>>()?;

        let mut material = String::new();
        for file in &files {
            material.push_str(&format!(
                "{}\u{0}{}\u{0}{}\u{0}{}\n",
                file.path, file.exists, file.modified_ns, file.size
            ));
        }
        Ok(ZiWatchSignature {
            digest: format!("{:016x}", xxh3_64(material.as_bytes())),
            files,
        })
    }

    /// Whether the watched files still match this signature.
    pub fn is_current(&self) -> Result<bool> {
        let paths: Vec<PathBuf> = self.files.iter().map(|f| PathBuf::from(&f.path)).collect();
        Ok(ZiWatchSignature::compute(&paths)?.digest == self.digest)
    }
}

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

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::errors::{Result, ZiError};

const FILE_EXTENSION: &str = "zi";

/// Byte-level key/value persistence.
pub trait ZiStorage: Send + Sync {
    fn exists(&self, key: &str) -> Result<bool>;

    fn load(&self, key: &str) -> Result<Vec<u8>>;

    /// Writes `bytes` under `key`, replacing any previous value atomically.
    fn save(&self, key: &str, bytes: &[u8]) -> Result<()>;

    /// Removes `key`; removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<()>;

    fn keys(&self) -> Result<Vec<String>>;
}

fn check_key(key: &str) -> Result<()> {
    let valid = !key.is_empty()
        && key
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
    if valid {
        Ok(())
    } else {
        Err(ZiError::storage(key, "keys may only contain [A-Za-z0-9_-]"))
    }
}

/// One file per key inside a directory.
#[derive(Clone, Debug)]
pub struct ZiFileStorage {
    root: PathBuf,
}

impl ZiFileStorage {
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        log::debug!("storage.open: file storage opened - root={}", root.display());
        Ok(ZiFileStorage { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        check_key(key)?;
        Ok(self.root.join(format!("{key}.{FILE_EXTENSION}")))
    }
}

impl ZiStorage for ZiFileStorage {
    fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.path_for(key)?.is_file())
    }

    fn load(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.path_for(key)?;
        fs::read(&path).map_err(|err| ZiError::storage(key, format!("read failed: {err}")))
    }

    fn save(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path_for(key)?;
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let tmp_path = self
            .root
            .join(format!(".{key}.tmp.{}.{timestamp}", std::process::id()));

        let write = || -> std::io::Result<()> {
            let mut file = File::create(&tmp_path)?;
            {
                let mut writer = BufWriter::new(&mut file);
                writer.write_all(bytes)?;
                writer.flush()?;
            }
            file.sync_all()?;
            fs::rename(&tmp_path, &path)
        };

        write().map_err(|err| {
            let _ = fs::remove_file(&tmp_path);
            ZiError::storage(key, format!("write failed: {err}"))
        })
    }

    fn remove(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.path_for(key)?) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(ZiError::storage(key, format!("remove failed: {err}"))),
        }
    }

    fn keys(&self) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(FILE_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if !stem.starts_with('.') {
                    keys.push(stem.to_string());
                }
            }
        }
        keys.sort();
        Ok(keys)
    }
}

/// Process-local storage, mostly for tests and scratch runs.
#[derive(Debug, Default)]
pub struct ZiMemoryStorage {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl ZiMemoryStorage {
    pub fn new() -> Self {
        ZiMemoryStorage::default()
    }

    fn poisoned(key: &str) -> ZiError {
        ZiError::storage(key, "memory storage lock poisoned")
    }
}

impl ZiStorage for ZiMemoryStorage {
    fn exists(&self, key: &str) -> Result<bool> {
        check_key(key)?;
        let entries = self.entries.read().map_err(|_| Self::poisoned(key))?;
        Ok(entries.contains_key(key))
    }

    fn load(&self, key: &str) -> Result<Vec<u8>> {
        check_key(key)?;
        let entries = self.entries.read().map_err(|_| Self::poisoned(key))?;
        entries
            .get(key)
            .cloned()
            .ok_or_else(|| ZiError::storage(key, "no such key"))
    }

    fn save(&self, key: &str, bytes: &[u8]) -> Result<()> {
        check_key(key)?;
        let mut entries = self.entries.write().map_err(|_| Self::poisoned(key))?;
        entries.insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        check_key(key)?;
        let mut entries = self.entries.write().map_err(|_| Self::poisoned(key))?;
        entries.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        let entries = self.entries.read().map_err(|_| Self::poisoned("*"))?;
        let mut keys: Vec<String> = entries.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

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

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub trait ZiLogHandler: Send + Sync {
    fn handle(&self, line: &str);
}

pub struct ZiStdoutHandler;

impl ZiLogHandler for ZiStdoutHandler {
    fn handle(&self, line: &str) {
        println!("{}", line);
    }
}

/// Appends lines to a file, rotating by size.
pub struct ZiFileHandler {
    path: PathBuf,
    max_bytes: Option<u64>,
    backup_count: u32,
    lock: Mutex<()>,
}

impl ZiFileHandler {
    pub fn new(path: impl Into<PathBuf>, max_bytes: Option<u64>, backup_count: u32) -> Self {
        ZiFileHandler {
            path: path.into(),
            max_bytes,
            backup_count,
            lock: Mutex::new(()),
        }
    }

    fn backup(path: &Path, index: u32) -> PathBuf {
        let mut name = path.as_os_str().to_owned();
        name.push(format!(".{index}"));
        PathBuf::from(name)
    }

    fn rotate_if_needed(&self) {
        let Some(max_bytes) = self.max_bytes else {
            return;
        };
        match fs::metadata(&self.path) {
            Ok(meta) if meta.len() > max_bytes => {}
            _ => return,
        }
        if self.backup_count == 0 {
            let _ = fs::remove_file(&self.path);
            return;
        }

        // path.N-1 -> path.N, ..., path -> path.1
        for index in (1..=self.backup_count).rev() {
            let from = if index == 1 {
                self.path.clone()
            } else {
                Self::backup(&self.path, index - 1)
            };
            if from.exists() {
                let _ = fs::rename(&from, Self::backup(&self.path, index));
            }
        }
    }
}

impl ZiLogHandler for ZiFileHandler {
    fn handle(&self, line: &str) {
        let Ok(_guard) = self.lock.lock() else {
            return;
        };
        self.rotate_if_needed();
        if let Ok(mut file) = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
        {
            let _ = writeln!(file, "{}", line);
        }
    }
}

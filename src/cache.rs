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
use std::sync::Arc;

use crate::data::{ZiData, ZiSequence};
use crate::storage::key::ZiLineageKey;

/// In-memory form of a computed product.
#[derive(Debug)]
pub enum ZiMemoEntry {
    Single(ZiData),
    Chunks(Arc<Vec<ZiData>>),
}

impl ZiMemoEntry {
    /// Fresh handle on the cached product.
    pub fn materialize(&self) -> Option<ZiData> {
        match self {
            ZiMemoEntry::Single(data) => data.try_clone(),
            ZiMemoEntry::Chunks(chunks) => {
                Some(ZiData::Sequence(ZiSequence::from_shared(Arc::clone(chunks))))
            }
        }
    }
}

/// One cached value per (run, owner), remembered with the lineage key it was
/// produced under.
///
/// Inserting under a new key evicts the stale value for the same
/// (run, owner), so reconfiguration does not accumulate dead entries.
#[derive(Debug)]
pub struct ZiRunCache<V> {
    entries: HashMap<(String, String), (ZiLineageKey, V)>,
}

impl<V> Default for ZiRunCache<V> {
    fn default() -> Self {
        ZiRunCache {
            entries: HashMap::new(),
        }
    }
}

impl<V> ZiRunCache<V> {
    pub fn new() -> Self {
        ZiRunCache::default()
    }

    /// Value for (run, owner) if it was produced under `key`.
    pub fn get(&self, run_id: &str, owner: &str, key: &ZiLineageKey) -> Option<&V> {
        self.entries
            .get(&(run_id.to_string(), owner.to_string()))
            .filter(|(cached_key, _)| cached_key == key)
            .map(|(_, value)| value)
    }

    /// Stores a value and returns the stale key it replaced, if any.
    pub fn insert(
        &mut self,
        run_id: &str,
        owner: &str,
        key: ZiLineageKey,
        value: V,
    ) -> Option<ZiLineageKey> {
        let previous = self
            .entries
            .insert((run_id.to_string(), owner.to_string()), (key.clone(), value));
        match previous {
            Some((old_key, _)) if old_key != key => {
                log::debug!(
                    "cache.evict: stale entry replaced - run={}, owner={}, stale_key={}, key={}",
                    run_id,
                    owner,
                    old_key,
                    key
                );
                Some(old_key)
            }
            _ => None,
        }
    }

    pub fn remove_run(&mut self, run_id: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|(run, _), _| run != run_id);
        before - self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

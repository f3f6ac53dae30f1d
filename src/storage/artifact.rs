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

//! Artifacts: data products persisted under their lineage key.
//!
//! Payload parts are written first and the metadata document last. The
//! metadata is the commit marker: an artifact exists only once its metadata
//! is present, so an interrupted save never looks complete.
//!
//! | output | part names |
//! |---|---|
//! | per-channel arrays | `{key}_ch{index}` |
//! | sequence | `{key}_chunk{index}` |
//! | anything else | `{key}_data` |

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::data::{ZiData, ZiSequence};
use crate::errors::{Result, ZiError};
use crate::lineage::ZiLineage;
use crate::storage::backend::ZiStorage;
use crate::storage::codec::{decode_array, decode_part, encode_array, encode_part, ZiPartKind};
use crate::storage::key::ZiLineageKey;
use crate::storage::watch::ZiWatchSignature;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZiArtifactLayout {
    Single,
    Channels,
    Sequence,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ZiArtifactMeta {
    pub key: ZiLineageKey,
    pub plugin: String,
    pub run_id: String,
    pub layout: ZiArtifactLayout,
    /// Kind of each part in storage order.
    pub parts: Vec<ZiPartKind>,
    pub watch: Option<ZiWatchSignature>,
    pub lineage: Option<ZiLineage>,
    pub engine_version: String,
    pub created_at: DateTime<Utc>,
}

/// Descriptive fields supplied by the caller of a save.
#[derive(Clone, Debug)]
pub struct ZiArtifactHeader {
    pub plugin: String,
    pub run_id: String,
    pub watch: Option<ZiWatchSignature>,
    pub lineage: Option<ZiLineage>,
    pub engine_version: String,
}

#[derive(Clone)]
pub struct ZiArtifactStore {
    backend: Arc<dyn ZiStorage>,
}

impl ZiArtifactStore {
    pub fn new(backend: Arc<dyn ZiStorage>) -> Self {
        ZiArtifactStore { backend }
    }

    pub fn backend(&self) -> &Arc<dyn ZiStorage> {
        &self.backend
    }

    pub fn exists(&self, key: &ZiLineageKey) -> Result<bool> {
        self.backend.exists(key.as_str())
    }

    pub fn meta(&self, key: &ZiLineageKey) -> Result<ZiArtifactMeta> {
        let bytes = self.backend.load(key.as_str())?;
        serde_json::from_slice(&bytes)
            .map_err(|err| ZiError::storage(key.as_str(), format!("corrupt metadata: {err}")))
    }

    /// Persists a single (non-sequence) value.
    pub fn save(
        &self,
        key: &ZiLineageKey,
        header: ZiArtifactHeader,
        data: &ZiData,
    ) -> Result<ZiArtifactMeta> {
        let mut written = Vec::new();
        let outcome = self.write_single(key, data, &mut written);
        self.commit(key, header, outcome, written)
    }

    /// Persists materialised sequence chunks.
    pub fn save_chunks(
        &self,
        key: &ZiLineageKey,
        header: ZiArtifactHeader,
        chunks: &[ZiData],
    ) -> Result<ZiArtifactMeta> {
        let mut written = Vec::new();
        let outcome = self.write_chunks(key, chunks, &mut written);
        self.commit(key, header, outcome, written)
    }

    /// Loads an artifact. Sequences are read chunk by chunk as consumed.
    pub fn load(&self, key: &ZiLineageKey) -> Result<ZiData> {
        let meta = self.meta(key)?;
        match meta.layout {
            ZiArtifactLayout::Single => {
                let kind = meta.parts.first().copied().ok_or_else(|| {
                    ZiError::storage(key.as_str(), "single artifact has no parts")
                })?;
                decode_part(kind, &self.backend.load(&key.data())?)
            }
            ZiArtifactLayout::Channels => {
                let arrays = (0..meta.parts.len())
                    .map(|index| decode_array(&self.backend.load(&key.channel(index))?))
                    .collect::<Result<Vec<_>>>()?;
                Ok(ZiData::Arrays(arrays))
            }
            ZiArtifactLayout::Sequence => {
                let backend = Arc::clone(&self.backend);
                let key = key.clone();
                let parts = meta.parts;
                Ok(ZiData::Sequence(ZiSequence::new(
                    (0..parts.len()).map(move |index| {
                        decode_part(parts[index], &backend.load(&key.chunk(index))?)
                    }),
                )))
            }
        }
    }

    /// Removes an artifact, metadata first so it stops being visible.
    pub fn remove(&self, key: &ZiLineageKey) -> Result<()> {
        if !self.exists(key)? {
            return Ok(());
        }
        let meta = self.meta(key)?;
        self.backend.remove(key.as_str())?;
        for name in part_names(key, meta.layout, meta.parts.len()) {
            self.backend.remove(&name)?;
        }
        Ok(())
    }

    fn write_single(
        &self,
        key: &ZiLineageKey,
        data: &ZiData,
        written: &mut Vec<String>,
    ) -> Result<(ZiArtifactLayout, Vec<ZiPartKind>)> {
        match data {
            ZiData::Arrays(arrays) => {
                for (index, array) in arrays.iter().enumerate() {
                    let name = key.channel(index);
                    self.backend.save(&name, &encode_array(array)?)?;
                    written.push(name);
                }
                Ok((ZiArtifactLayout::Channels, vec![ZiPartKind::Array; arrays.len()]))
            }
            ZiData::Sequence(_) => Err(ZiError::internal(
                "sequences must be materialised before saving",
            )),
            single => {
                let (kind, bytes) = encode_part(single)?;
                let name = key.data();
                self.backend.save(&name, &bytes)?;
                written.push(name);
                Ok((ZiArtifactLayout::Single, vec![kind]))
            }
        }
    }

    fn write_chunks(
        &self,
        key: &ZiLineageKey,
        chunks: &[ZiData],
        written: &mut Vec<String>,
    ) -> Result<(ZiArtifactLayout, Vec<ZiPartKind>)> {
        let mut kinds = Vec::with_capacity(chunks.len());
        for (index, chunk) in chunks.iter().enumerate() {
            let (kind, bytes) = encode_part(chunk)?;
            let name = key.chunk(index);
            self.backend.save(&name, &bytes)?;
            written.push(name);
            kinds.push(kind);
        }
        Ok((ZiArtifactLayout::Sequence, kinds))
    }

    fn commit(
        &self,
        key: &ZiLineageKey,
        header: ZiArtifactHeader,
        outcome: Result<(ZiArtifactLayout, Vec<ZiPartKind>)>,
        written: Vec<String>,
    ) -> Result<ZiArtifactMeta> {
        let committed = outcome.and_then(|(layout, parts)| {
            let meta = ZiArtifactMeta {
                key: key.clone(),
                plugin: header.plugin,
                run_id: header.run_id,
                layout,
                parts,
                watch: header.watch,
                lineage: header.lineage,
                engine_version: header.engine_version,
                created_at: Utc::now(),
            };
            self.backend
                .save(key.as_str(), &serde_json::to_vec_pretty(&meta)?)?;
            Ok(meta)
        });

        match committed {
            Ok(meta) => {
                log::debug!(
                    "storage.save: artifact committed - key={}, plugin={}, run={}, parts={}",
                    key,
                    meta.plugin,
                    meta.run_id,
                    meta.parts.len()
                );
                Ok(meta)
            }
            Err(err) => {
                for name in &written {
                    if let Err(cleanup) = self.backend.remove(name) {
                        log::warn!(
                            "storage.save: failed to remove partial part - part={}, error={}",
                            name,
                            cleanup
                        );
                    }
                }
                log::error!("storage.save: artifact not committed - key={}, error={}", key, err);
                Err(err)
            }
        }
    }
}

fn part_names(key: &ZiLineageKey, layout: ZiArtifactLayout, count: usize) -> Vec<String> {
    match layout {
        ZiArtifactLayout::Single => vec![key.data()],
        ZiArtifactLayout::Channels => (0..count).map(|i| key.channel(i)).collect(),
        ZiArtifactLayout::Sequence => (0..count).map(|i| key.chunk(i)).collect(),
    }
}

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

use std::sync::Arc;

use serde_json::json;
use zirun::storage::{
    lineage_key, ZiArtifactHeader, ZiArtifactLayout, ZiWatchSignature, KEY_HEX_LEN,
};
use zirun::{
    ZiArtifactStore, ZiArray, ZiChannelInput, ZiData, ZiError, ZiFileStorage, ZiLineageKey,
    ZiMemoryStorage, ZiRawEvent, ZiRecordsBuilder, ZiStorage, ZiTable,
};

fn header(plugin: &str) -> ZiArtifactHeader {
    ZiArtifactHeader {
        plugin: plugin.to_string(),
        run_id: "run_001".to_string(),
        watch: None,
        lineage: None,
        engine_version: "0.1.0".to_string(),
    }
}

/// Backend that refuses to write metadata documents.
struct ZiNoCommitStorage {
    inner: ZiMemoryStorage,
}

impl ZiStorage for ZiNoCommitStorage {
    fn exists(&self, key: &str) -> zirun::Result<bool> {
        self.inner.exists(key)
    }

    fn load(&self, key: &str) -> zirun::Result<Vec<u8>> {
        self.inner.load(key)
    }

    fn save(&self, key: &str, bytes: &[u8]) -> zirun::Result<()> {
        if key.len() == KEY_HEX_LEN {
            return Err(ZiError::storage(key, "disk full"));
        }
        self.inner.save(key, bytes)
    }

    fn remove(&self, key: &str) -> zirun::Result<()> {
        self.inner.remove(key)
    }

    fn keys(&self) -> zirun::Result<Vec<String>> {
        self.inner.keys()
    }
}

#[test]
fn test_lineage_key_is_stable_hex() {
    let key = lineage_key("p", "r", &json!({"threshold": 10}));
    assert_eq!(key, lineage_key("p", "r", &json!({"threshold": 10})));
    assert_eq!(key.as_str().len(), 40);
    assert!(key
        .as_str()
        .chars()
        .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));

    assert_ne!(key, lineage_key("p", "r2", &json!({"threshold": 10})));
    assert_ne!(key, lineage_key("q", "r", &json!({"threshold": 10})));
    assert_ne!(key, lineage_key("p", "r", &json!({"threshold": 11})));
    assert_eq!(ZiLineageKey::parse(key.as_str()).unwrap(), key);
}

#[test]
fn test_nested_key_order_is_irrelevant() {
    let a = lineage_key(
        "p",
        "r",
        &json!({"config": {"a": 1, "b": [1, {"y": 2, "x": 1}]}, "version": "1"}),
    );
    let b = lineage_key(
        "p",
        "r",
        &json!({"version": "1", "config": {"b": [1, {"x": 1, "y": 2}], "a": 1}}),
    );
    assert_eq!(a, b);
}

#[test]
fn test_file_storage_round_trip_and_keys() {
    let dir = tempfile::tempdir().unwrap();
    let storage = ZiFileStorage::open(dir.path().join("store")).unwrap();
    storage.save("alpha", b"one").unwrap();
    storage.save("beta_data", b"two").unwrap();
    storage.save("alpha", b"three").unwrap();

    assert_eq!(storage.load("alpha").unwrap(), b"three");
    assert_eq!(storage.keys().unwrap(), vec!["alpha", "beta_data"]);
    storage.remove("alpha").unwrap();
    storage.remove("alpha").unwrap();
    assert!(!storage.exists("alpha").unwrap());
    assert!(storage.load("alpha").is_err());
    assert!(storage.save("../escape", b"x").is_err());
}

#[test]
fn test_artifact_metadata_describes_payload() {
    let store = ZiArtifactStore::new(Arc::new(ZiMemoryStorage::new()));
    let key = lineage_key("hits", "run_001", &json!({}));
    let table = ZiTable::new(vec![
        ("time", ZiArray::I64(vec![1, 2, 3])),
        ("area", ZiArray::F32(vec![0.5, 1.5, 2.5])),
    ])
    .unwrap();

    let meta = store.save(&key, header("hits"), &ZiData::from(table)).unwrap();
    assert_eq!(meta.layout, ZiArtifactLayout::Single);
    assert_eq!(meta.plugin, "hits");

    let reread = store.meta(&key).unwrap();
    assert_eq!(reread.key, key);
    assert_eq!(reread.run_id, "run_001");
    let loaded = store.load(&key).unwrap();
    assert_eq!(loaded.as_table().unwrap().num_rows(), 3);
    assert_eq!(
        loaded.as_table().unwrap().column("area"),
        Some(&ZiArray::F32(vec![0.5, 1.5, 2.5]))
    );
}

#[test]
fn test_records_bundle_is_stored_in_wire_format() {
    let bundle = ZiRecordsBuilder::new()
        .build(&[ZiChannelInput::new(
            2,
            vec![ZiRawEvent::new(20, vec![1, 2]), ZiRawEvent::new(10, vec![3])],
        )])
        .unwrap();
    let dir = tempfile::tempdir().unwrap();
    let store = ZiArtifactStore::new(Arc::new(ZiFileStorage::open(dir.path()).unwrap()));
    let key = lineage_key("records", "run_001", &json!({}));
    store.save(&key, header("records"), &ZiData::from(bundle)).unwrap();

    let loaded = store.load(&key).unwrap();
    let records = loaded.as_records().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records.records()[0].timestamp, 10);
    assert_eq!(records.waveform(1), Some(&[1i16, 2][..]));
}

#[test]
fn test_failed_commit_leaves_nothing_behind() {
    let backend = Arc::new(ZiNoCommitStorage {
        inner: ZiMemoryStorage::new(),
    });
    let store = ZiArtifactStore::new(backend.clone());
    let key = lineage_key("p", "r", &json!({}));
    let chunks = vec![ZiData::from(1i64), ZiData::from(2i64)];

    assert!(store.save_chunks(&key, header("p"), &chunks).is_err());
    assert!(!store.exists(&key).unwrap());
    assert!(backend.keys().unwrap().is_empty());
}

#[test]
fn test_resave_replaces_previous_parts() {
    let backend = Arc::new(ZiMemoryStorage::new());
    let store = ZiArtifactStore::new(backend.clone());
    let key = lineage_key("p", "r", &json!({}));

    store
        .save(
            &key,
            header("p"),
            &ZiData::Arrays(vec![ZiArray::I16(vec![1]), ZiArray::I16(vec![2])]),
        )
        .unwrap();
    store.remove(&key).unwrap();
    store.save(&key, header("p"), &ZiData::from(5i64)).unwrap();

    let mut expected = vec![key.to_string(), key.data()];
    expected.sort();
    assert_eq!(backend.keys().unwrap(), expected);
    assert_eq!(store.load(&key).unwrap().as_i64(), Some(5));
}

#[test]
fn test_watch_signature_tracks_edits() {
    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("a.cfg");
    let second = dir.path().join("b.cfg");
    std::fs::write(&first, "gain=1").unwrap();

    let signature = ZiWatchSignature::compute(&[second.clone(), first.clone()]).unwrap();
    assert_eq!(signature.files.len(), 2);
    assert!(signature.is_current().unwrap());

    std::fs::write(&second, "created").unwrap();
    assert!(!signature.is_current().unwrap());

    let refreshed = ZiWatchSignature::compute(&[first.clone(), second]).unwrap();
    std::fs::write(&first, "gain=12").unwrap();
    assert!(!refreshed.is_current().unwrap());
}

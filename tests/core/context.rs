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

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use zirun::{
    ZiAdapterFormat, ZiAlias, ZiArray, ZiConfigValue, ZiContext, ZiContextConfig, ZiData,
    ZiDependency, ZiError, ZiFileStorage, ZiFnPlugin, ZiMemoryStorage, ZiOption, ZiOutputKind,
    ZiSaveWhen, ZiSequence, ZiStaticAdapter,
};

fn counted(name: &str, value: i64, calls: &Arc<AtomicUsize>) -> ZiFnPlugin {
    let calls = Arc::clone(calls);
    ZiFnPlugin::new(name, move |_| {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(ZiData::from(value))
    })
}

fn plus_offset(calls: &Arc<AtomicUsize>) -> ZiFnPlugin {
    let calls = Arc::clone(calls);
    ZiFnPlugin::new("b", move |input| {
        calls.fetch_add(1, Ordering::SeqCst);
        let a = input.input("a")?.as_i64().unwrap_or_default();
        Ok(ZiData::from(a + input.config.get_i64("offset")?))
    })
    .depends("a")
    .option(ZiOption::new("offset", 0i64))
}

#[test]
fn test_dependency_chain_and_store_reuse() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = ZiContext::new(ZiContextConfig::new().storage_dir(dir.path())).unwrap();
    let a_calls = Arc::new(AtomicUsize::new(0));
    let b_calls = Arc::new(AtomicUsize::new(0));
    ctx.register(counted("a", 10, &a_calls)).unwrap();
    ctx.register(plus_offset(&b_calls)).unwrap();
    ctx.set_config(&json!({"b": {"offset": 1}})).unwrap();

    assert_eq!(ctx.get_data("run_001", "b").unwrap().as_i64(), Some(11));
    assert!(ctx.is_stored("run_001", "a").unwrap());
    assert!(ctx.is_stored("run_001", "b").unwrap());

    ctx.clear_memory_cache();
    assert_eq!(ctx.get_data("run_001", "a").unwrap().as_i64(), Some(10));
    assert_eq!(ctx.get_data("run_001", "b").unwrap().as_i64(), Some(11));
    assert_eq!(a_calls.load(Ordering::SeqCst), 1);
    assert_eq!(b_calls.load(Ordering::SeqCst), 1);
    assert_eq!(ctx.stats().store_hits, 2);

    // A fresh context over the same directory sees the stored products.
    let reopened = ZiContext::new(ZiContextConfig::new().storage_dir(dir.path())).unwrap();
    reopened.register(counted("a", 10, &a_calls)).unwrap();
    reopened.register(plus_offset(&b_calls)).unwrap();
    reopened.set_config(&json!({"b": {"offset": 1}})).unwrap();
    assert_eq!(reopened.get_data("run_001", "b").unwrap().as_i64(), Some(11));
    assert_eq!(b_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_memory_cache_serves_repeated_requests() {
    let ctx = ZiContext::in_memory().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    ctx.register(counted("a", 3, &calls)).unwrap();

    ctx.get_data("r", "a").unwrap();
    ctx.get_data("r", "a").unwrap();
    ctx.get_data("other", "a").unwrap();

    let stats = ctx.stats();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(stats.memory_hits, 1);
    assert_eq!(stats.computations, 2);
}

#[test]
fn test_config_change_recomputes_downstream_only() {
    let ctx = ZiContext::in_memory().unwrap();
    let a_calls = Arc::new(AtomicUsize::new(0));
    let b_calls = Arc::new(AtomicUsize::new(0));
    ctx.register(counted("a", 10, &a_calls)).unwrap();
    ctx.register(plus_offset(&b_calls)).unwrap();

    let key_a = ctx.key_for("r", "a").unwrap();
    let key_b = ctx.key_for("r", "b").unwrap();
    assert_eq!(ctx.get_data("r", "b").unwrap().as_i64(), Some(10));

    ctx.set_option("b.offset", json!(5)).unwrap();
    assert_eq!(ctx.key_for("r", "a").unwrap(), key_a);
    assert_ne!(ctx.key_for("r", "b").unwrap(), key_b);
    assert_eq!(ctx.get_data("r", "b").unwrap().as_i64(), Some(15));
    assert_eq!(a_calls.load(Ordering::SeqCst), 1);
    assert_eq!(b_calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_upstream_key_change_propagates() {
    let ctx = ZiContext::in_memory().unwrap();
    ctx.register(
        ZiFnPlugin::new("a", |input| Ok(ZiData::from(input.config.get_i64("gain")?)))
            .option(ZiOption::new("gain", 1i64)),
    )
    .unwrap();
    ctx.register(plus_offset(&Arc::new(AtomicUsize::new(0))))
        .unwrap();

    let before = ctx.key_for("r", "b").unwrap();
    ctx.set_option("a.gain", json!(4)).unwrap();
    assert_ne!(ctx.key_for("r", "b").unwrap(), before);
    assert_eq!(ctx.get_data("r", "b").unwrap().as_i64(), Some(4));
}

#[test]
fn test_untracked_option_does_not_change_key() {
    let ctx = ZiContext::in_memory().unwrap();
    ctx.register(
        ZiFnPlugin::new("a", |_| Ok(ZiData::from(1i64)))
            .option(ZiOption::new("label", "x").untracked())
            .option(ZiOption::new("threshold", 10i64)),
    )
    .unwrap();

    let base = ctx.key_for("r", "a").unwrap();
    ctx.set_option("a.label", json!("renamed")).unwrap();
    assert_eq!(ctx.key_for("r", "a").unwrap(), base);
    assert_eq!(
        ctx.get_config("a", "label").unwrap(),
        ZiConfigValue::from("renamed")
    );

    ctx.set_option("a.threshold", json!(12)).unwrap();
    assert_ne!(ctx.key_for("r", "a").unwrap(), base);
    assert_ne!(ctx.key_for("other", "a").unwrap(), ctx.key_for("r", "a").unwrap());
}

#[test]
fn test_invalid_option_value_is_rejected() {
    let ctx = ZiContext::in_memory().unwrap();
    ctx.register(
        ZiFnPlugin::new("a", |_| Ok(ZiData::from(1i64))).option(ZiOption::new("threshold", 10i64)),
    )
    .unwrap();
    ctx.set_option("a.threshold", json!("high")).unwrap();

    let err = ctx.get_data("r", "a").unwrap_err();
    assert!(matches!(err, ZiError::ConfigValidation { .. }));
}

#[test]
fn test_circular_dependency_is_detected() {
    let ctx = ZiContext::in_memory().unwrap();
    ctx.register(ZiFnPlugin::new("a", |_| Ok(ZiData::from(1i64))).depends("b"))
        .unwrap();
    ctx.register(ZiFnPlugin::new("b", |_| Ok(ZiData::from(2i64))).depends("a"))
        .unwrap();

    let err = ctx.get_data("r", "a").unwrap_err();
    match err {
        ZiError::CircularDependency { chain } => {
            assert_eq!(chain.first().map(String::as_str), Some("a"));
            assert_eq!(chain.last().map(String::as_str), Some("a"));
        }
        other => panic!("expected a cycle, got {other}"),
    }
    assert!(matches!(
        ctx.get_lineage("b"),
        Err(ZiError::CircularDependency { .. })
    ));
}

#[test]
fn test_missing_plugin_and_dependency() {
    let ctx = ZiContext::in_memory().unwrap();
    assert!(matches!(
        ctx.get_data("r", "nothing"),
        Err(ZiError::MissingPlugin { .. })
    ));

    ctx.register(ZiFnPlugin::new("a", |_| Ok(ZiData::from(1i64))).version("1.4.0"))
        .unwrap();
    ctx.register(ZiFnPlugin::new("b", |_| Ok(ZiData::from(1i64))).depends("ghost"))
        .unwrap();
    ctx.register(
        ZiFnPlugin::new("c", |_| Ok(ZiData::from(1i64)))
            .dependency(ZiDependency::with_version("a", ">=2.0").unwrap()),
    )
    .unwrap();

    assert!(matches!(
        ctx.get_data("r", "b"),
        Err(ZiError::MissingDependency { .. })
    ));
    assert!(matches!(
        ctx.get_data("r", "c"),
        Err(ZiError::MissingDependency { .. })
    ));
}

#[test]
fn test_partial_failure_keeps_upstream_persisted() {
    let ctx = ZiContext::in_memory().unwrap();
    let downstream_calls = Arc::new(AtomicUsize::new(0));
    ctx.register(ZiFnPlugin::new("a", |_| Ok(ZiData::from(1i64))))
        .unwrap();
    ctx.register(
        ZiFnPlugin::new("b", |_| -> anyhow::Result<ZiData> { anyhow::bail!("detector offline") })
            .depends("a"),
    )
    .unwrap();
    ctx.register(counted("c", 3, &downstream_calls).depends("b"))
        .unwrap();

    let err = ctx.get_data("r", "c").unwrap_err();
    assert_eq!(err.failed_plugin(), Some("b"));
    assert!(err.to_string().contains("detector offline"));
    assert!(ctx.is_stored("r", "a").unwrap());
    assert!(!ctx.is_stored("r", "b").unwrap());
    assert!(!ctx.is_stored("r", "c").unwrap());
    assert_eq!(downstream_calls.load(Ordering::SeqCst), 0);
    assert_eq!(ctx.stats().failures, 1);

    let err = ctx.get_data("r", "b").unwrap_err();
    assert_eq!(err.failed_plugin(), Some("b"));
}

#[test]
fn test_panicking_plugin_is_reported() {
    let ctx = ZiContext::in_memory().unwrap();
    ctx.register(ZiFnPlugin::new("a", |_| -> anyhow::Result<ZiData> {
        panic!("index out of range")
    }))
    .unwrap();

    let err = ctx.get_data("r", "a").unwrap_err();
    assert_eq!(err.failed_plugin(), Some("a"));
    assert!(matches!(err.root_cause(), ZiError::Internal(_)));
}

#[test]
fn test_timeout_is_wrapped_as_compute_failure() {
    let ctx = ZiContext::in_memory().unwrap();
    ctx.register(
        ZiFnPlugin::new("slow", |input| {
            for _ in 0..50 {
                if input.cancel.is_cancelled() {
                    break;
                }
                std::thread::sleep(Duration::from_millis(20));
            }
            Ok(ZiData::from(0i64))
        })
        .timeout(Duration::from_millis(50)),
    )
    .unwrap();

    let err = ctx.get_data("r", "slow").unwrap_err();
    assert!(matches!(err, ZiError::Compute { .. }));
    assert!(err.is_timeout());
    assert_eq!(err.failed_plugin(), Some("slow"));
    assert_eq!(ctx.stats().timeouts, 1);
    assert!(!ctx.is_stored("r", "slow").unwrap());
}

#[test]
fn test_default_timeout_applies_to_plugins_without_one() {
    let ctx = ZiContext::with_storage(
        ZiContextConfig::new().default_timeout_ms(30),
        Arc::new(ZiMemoryStorage::new()),
    )
    .unwrap();
    ctx.register(ZiFnPlugin::new("slow", |_| {
        std::thread::sleep(Duration::from_millis(300));
        Ok(ZiData::from(0i64))
    }))
    .unwrap();
    ctx.register(ZiFnPlugin::new("fast", |_| Ok(ZiData::from(1i64))))
        .unwrap();

    assert!(ctx.get_data("r", "slow").unwrap_err().is_timeout());
    assert_eq!(ctx.get_data("r", "fast").unwrap().as_i64(), Some(1));
}

#[test]
fn test_on_target_persists_only_the_requested_product() {
    let ctx = ZiContext::in_memory().unwrap();
    ctx.register(ZiFnPlugin::new("a", |_| Ok(ZiData::from(1i64))).save_when(ZiSaveWhen::OnTarget))
        .unwrap();
    ctx.register(ZiFnPlugin::new("b", |_| Ok(ZiData::from(2i64))).depends("a"))
        .unwrap();
    ctx.register(ZiFnPlugin::new("c", |_| Ok(ZiData::from(3i64))).save_when(ZiSaveWhen::Never))
        .unwrap();

    ctx.get_data("r", "b").unwrap();
    assert!(!ctx.is_stored("r", "a").unwrap());
    assert!(ctx.is_stored("r", "b").unwrap());

    let fork = ctx.fork();
    fork.get_data("r", "a").unwrap();
    assert!(fork.is_stored("r", "a").unwrap());

    ctx.get_data("r", "c").unwrap();
    assert!(!ctx.is_stored("r", "c").unwrap());
}

#[test]
fn test_on_target_product_cached_as_intermediate_is_persisted_when_requested() {
    let ctx = ZiContext::in_memory().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    ctx.register(counted("a", 1, &calls).save_when(ZiSaveWhen::OnTarget))
        .unwrap();
    ctx.register(ZiFnPlugin::new("b", |_| Ok(ZiData::from(2i64))).depends("a"))
        .unwrap();

    ctx.get_data("r", "b").unwrap();
    assert!(!ctx.is_stored("r", "a").unwrap());

    assert_eq!(ctx.get_data("r", "a").unwrap().as_i64(), Some(1));
    assert!(ctx.is_stored("r", "a").unwrap());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(ctx.stats().memory_hits, 1);

    ctx.clear_memory_cache();
    assert_eq!(ctx.get_data("r", "a").unwrap().as_i64(), Some(1));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_dynamic_dependency_lookups_keep_the_requested_target() {
    let ctx = ZiContext::in_memory().unwrap();
    ctx.register(ZiFnPlugin::new("mode", |_| Ok(ZiData::from(json!("fast")))))
        .unwrap();
    ctx.register(ZiFnPlugin::new("raw", |_| Ok(ZiData::from(5i64))))
        .unwrap();
    ctx.register(
        ZiFnPlugin::new("summary", |input| {
            Ok(ZiData::from(input.input("raw")?.as_i64().unwrap_or_default() + 1))
        })
        .save_when(ZiSaveWhen::OnTarget)
        .dynamic_dependencies(|engine| {
            engine.get_data("calibration", "mode")?;
            Ok(vec![ZiDependency::new("raw")])
        }),
    )
    .unwrap();

    assert_eq!(ctx.get_data("r", "summary").unwrap().as_i64(), Some(6));
    assert!(ctx.is_stored("r", "summary").unwrap());
    assert!(ctx.is_stored("calibration", "mode").unwrap());
}

#[test]
fn test_non_finite_arrays_are_served_from_storage() {
    let ctx = ZiContext::in_memory().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    ctx.register(ZiFnPlugin::new("baselines", move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(ZiData::Arrays(vec![ZiArray::F64(vec![
            1.0,
            f64::NAN,
            f64::NEG_INFINITY,
        ])]))
    }))
    .unwrap();

    ctx.get_data("r", "baselines").unwrap();
    assert!(ctx.is_stored("r", "baselines").unwrap());
    ctx.clear_memory_cache();

    let data = ctx.get_data("r", "baselines").unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(ctx.stats().store_hits, 1);
    match &data.as_arrays().unwrap()[0] {
        ZiArray::F64(values) => {
            assert_eq!(values[0], 1.0);
            assert!(values[1].is_nan());
            assert_eq!(values[2], f64::NEG_INFINITY);
        }
        other => panic!("unexpected array {other:?}"),
    }
}

#[test]
fn test_sequence_output_is_persisted_chunk_by_chunk() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(ZiFileStorage::open(dir.path()).unwrap());
    let ctx = ZiContext::with_storage(ZiContextConfig::new(), backend).unwrap();
    ctx.register(
        ZiFnPlugin::new("chunks", |_| {
            Ok(ZiData::Sequence(ZiSequence::from_chunks(vec![
                ZiData::Arrays(vec![ZiArray::I32(vec![1, 2])]),
                ZiData::Arrays(vec![ZiArray::I32(vec![3])]),
            ])))
        })
        .output_kind(ZiOutputKind::Sequence),
    )
    .unwrap();

    let first = ctx
        .get_data("r", "chunks")
        .unwrap()
        .into_sequence()
        .unwrap()
        .collect_chunks()
        .unwrap();
    assert_eq!(first.len(), 2);

    let fork = ctx.fork();
    let loaded = fork
        .get_data("r", "chunks")
        .unwrap()
        .into_sequence()
        .unwrap()
        .collect_chunks()
        .unwrap();
    assert_eq!(fork.stats().store_hits, 1);
    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded[1].as_arrays(), Some(&[ZiArray::I32(vec![3])][..]));
}

#[test]
fn test_sequence_declaration_widens_single_values() {
    let ctx = ZiContext::in_memory().unwrap();
    ctx.register(
        ZiFnPlugin::new("one", |_| Ok(ZiData::from(7i64))).output_kind(ZiOutputKind::Sequence),
    )
    .unwrap();
    ctx.register(ZiFnPlugin::new("bad", |_| {
        Ok(ZiData::Sequence(ZiSequence::from_chunks(vec![ZiData::from(1i64)])))
    }))
    .unwrap();

    let chunks = ctx
        .get_data("r", "one")
        .unwrap()
        .into_sequence()
        .unwrap()
        .collect_chunks()
        .unwrap();
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].as_i64(), Some(7));

    let err = ctx.get_data("r", "bad").unwrap_err();
    assert!(matches!(err.root_cause(), ZiError::OutputContract { .. }));
}

#[test]
fn test_watched_file_change_forces_recompute() {
    let dir = tempfile::tempdir().unwrap();
    let watched = dir.path().join("gains.json");
    std::fs::write(&watched, "{\"gain\": 1}").unwrap();

    let ctx = ZiContext::in_memory().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    ctx.register(counted("calibrated", 1, &calls).watch_file(&watched))
        .unwrap();

    ctx.get_data("r", "calibrated").unwrap();
    let fork = ctx.fork();
    fork.get_data("r", "calibrated").unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    std::fs::write(&watched, "{\"gain\": 1.25, \"note\": \"recalibrated\"}").unwrap();
    let fork = ctx.fork();
    fork.get_data("r", "calibrated").unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(fork.stats().watch_invalidations, 1);
}

#[test]
fn test_removed_alias_is_rejected() {
    let ctx = ZiContext::with_storage(
        ZiContextConfig::new().engine_version("2.0.0"),
        Arc::new(ZiMemoryStorage::new()),
    )
    .unwrap();
    ctx.register(
        ZiFnPlugin::new("peaks", |input| Ok(ZiData::from(input.config.get_i64("threshold")?)))
            .option(ZiOption::new("threshold", 10i64)),
    )
    .unwrap();
    ctx.register_alias(ZiAlias::new("thresh", "threshold").removed_in("2.0"))
        .unwrap();
    ctx.set_config(&json!({"thresh": 5})).unwrap();

    let err = ctx.get_data("r", "peaks").unwrap_err();
    assert!(matches!(err, ZiError::DeprecationRejected { .. }));
}

#[test]
fn test_deprecated_alias_still_resolves() {
    let ctx = ZiContext::with_storage(
        ZiContextConfig::new().engine_version("1.5.0"),
        Arc::new(ZiMemoryStorage::new()),
    )
    .unwrap();
    ctx.register(
        ZiFnPlugin::new("peaks", |input| Ok(ZiData::from(input.config.get_i64("threshold")?)))
            .option(ZiOption::new("threshold", 10i64)),
    )
    .unwrap();
    ctx.register_plugin_alias(
        "peaks",
        ZiAlias::new("thresh", "threshold")
            .deprecated_in("1.2")
            .removed_in("2.0"),
    )
    .unwrap();
    ctx.set_config(&json!({"peaks": {"thresh": 5}})).unwrap();

    assert_eq!(ctx.get_data("r", "peaks").unwrap().as_i64(), Some(5));
}

#[test]
fn test_adapter_fills_inferable_options() {
    let ctx = ZiContext::in_memory().unwrap();
    ctx.register_adapter(ZiStaticAdapter::new(
        "digitizer",
        ZiAdapterFormat {
            sample_interval_ns: Some(4),
            ..ZiAdapterFormat::default()
        },
    ))
    .unwrap();
    ctx.register(
        ZiFnPlugin::new("hits", |_| Ok(ZiData::from(1i64)))
            .option(ZiOption::new("sample_interval", 10i64)),
    )
    .unwrap();

    assert_eq!(
        ctx.get_config("hits", "sample_interval").unwrap(),
        ZiConfigValue::Int(4)
    );
    let lineage = ctx.get_lineage("hits").unwrap();
    assert_eq!(lineage.config.get("sample_interval"), Some(&ZiConfigValue::Int(4)));

    ctx.set_option("hits.sample_interval", json!(2)).unwrap();
    assert_eq!(
        ctx.get_config("hits", "sample_interval").unwrap(),
        ZiConfigValue::Int(2)
    );
}

#[test]
fn test_dynamic_dependencies_follow_configuration() {
    let ctx = ZiContext::in_memory().unwrap();
    ctx.register(ZiFnPlugin::new("raw", |_| Ok(ZiData::from(1i64))))
        .unwrap();
    ctx.register(ZiFnPlugin::new("filtered", |_| Ok(ZiData::from(2i64))))
        .unwrap();
    ctx.register(
        ZiFnPlugin::new("summary", |input| {
            let source = input.config.get_str("source")?.to_string();
            Ok(ZiData::from(input.input(&source)?.as_i64().unwrap_or_default() * 100))
        })
        .option(ZiOption::new("source", "raw"))
        .dynamic_dependencies(|engine| {
            let source = engine.get_config("summary", "source")?;
            Ok(vec![ZiDependency::new(source.as_str().unwrap_or("raw"))])
        }),
    )
    .unwrap();

    assert_eq!(ctx.get_data("r", "summary").unwrap().as_i64(), Some(100));
    assert!(ctx
        .get_lineage("summary")
        .unwrap()
        .dependencies
        .contains_key("raw"));

    ctx.set_option("summary.source", json!("filtered")).unwrap();
    assert_eq!(ctx.get_data("r", "summary").unwrap().as_i64(), Some(200));
    assert!(ctx
        .get_lineage("summary")
        .unwrap()
        .dependencies
        .contains_key("filtered"));
}

#[test]
fn test_lineage_is_run_independent() {
    let ctx = ZiContext::in_memory().unwrap();
    ctx.register(ZiFnPlugin::new("a", |_| Ok(ZiData::from(10i64))).version("1.2.0"))
        .unwrap();
    ctx.register(plus_offset(&Arc::new(AtomicUsize::new(0))))
        .unwrap();
    ctx.set_config(&json!({"b.offset": 3})).unwrap();

    let lineage = ctx.get_lineage("b").unwrap();
    assert_eq!(lineage.plugin, "b");
    assert_eq!(lineage.config.get("offset"), Some(&ZiConfigValue::Int(3)));
    assert_eq!(lineage.dependencies["a"].version, "1.2.0");
    assert!(lineage.plugins().contains("a"));
    assert_eq!(lineage.depth(), 2);
}

#[test]
fn test_storage_can_be_disabled() {
    let ctx = ZiContext::with_storage(
        ZiContextConfig::new().storage_enabled(false),
        Arc::new(ZiMemoryStorage::new()),
    )
    .unwrap();
    ctx.register(ZiFnPlugin::new("a", |_| Ok(ZiData::from(1i64))))
        .unwrap();

    ctx.get_data("r", "a").unwrap();
    assert!(ctx.store().is_none());
    assert!(!ctx.is_stored("r", "a").unwrap());
    assert_eq!(ctx.stats().persisted, 0);
}

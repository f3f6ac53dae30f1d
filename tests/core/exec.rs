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

use std::time::Duration;

use zirun::exec::{catch_panics, run_with_timeout, timeout_count, total_stats};
use zirun::{
    ZiBatchRunner, ZiCancelToken, ZiContext, ZiData, ZiError, ZiExecutorKind,
    ZiExecutorRegistry, ZiFnPlugin, ZiRunStatus,
};

fn runs(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|id| id.to_string()).collect()
}

fn pipeline() -> ZiContext {
    let ctx = ZiContext::in_memory().unwrap();
    ctx.register(ZiFnPlugin::new("raw", |input| {
        Ok(ZiData::from(input.run_id.len() as i64))
    }))
    .unwrap();
    ctx.register(
        ZiFnPlugin::new("peaks", |input| {
            if input.run_id == "bad_run" {
                anyhow::bail!("corrupt file");
            }
            Ok(ZiData::from(input.input("raw")?.as_i64().unwrap_or_default() * 2))
        })
        .depends("raw"),
    )
    .unwrap();
    ctx
}

#[test]
fn test_executor_reference_counting() {
    let registry = ZiExecutorRegistry::new();
    let a = registry
        .acquire("decode", ZiExecutorKind::Process, Some(2))
        .unwrap();
    let b = registry
        .acquire("decode", ZiExecutorKind::Process, Some(2))
        .unwrap();
    assert_eq!(a.kind(), ZiExecutorKind::Process);
    assert_eq!(a.name(), "decode");
    assert_eq!(registry.ref_count("decode", ZiExecutorKind::Process, 2), 2);
    assert_eq!(registry.ref_count("decode", ZiExecutorKind::Thread, 2), 0);

    drop(a);
    assert_eq!(registry.active(), 1);
    assert_eq!(b.install(|| 40 + 2), 42);
    drop(b);
    assert_eq!(registry.active(), 0);
}

#[test]
fn test_executor_spawn_runs_tasks() {
    let registry = ZiExecutorRegistry::new();
    let executor = registry
        .acquire("spawn", ZiExecutorKind::Thread, Some(1))
        .unwrap();
    let (tx, rx) = std::sync::mpsc::channel();
    executor.spawn(move || {
        let _ = tx.send(std::thread::current().name().map(str::to_string));
    });
    let thread_name = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(thread_name.as_deref(), Some("zi-thread-spawn-0"));
}

#[test]
fn test_timeout_reports_and_cancels() {
    let cancel = ZiCancelToken::new();
    let observed = cancel.clone();
    let err = run_with_timeout(
        "exec_test_sleeper",
        Duration::from_millis(20),
        &cancel,
        |token| {
            while !token.is_cancelled() {
                std::thread::sleep(Duration::from_millis(5));
            }
            Ok(())
        },
    )
    .unwrap_err();

    assert!(matches!(err, ZiError::Timeout { limit_ms: 20, .. }));
    assert!(observed.is_cancelled());
    assert_eq!(timeout_count("exec_test_sleeper"), 1);
}

#[test]
fn test_fast_task_beats_deadline() {
    let cancel = ZiCancelToken::new();
    let value = run_with_timeout(
        "exec_test_fast",
        Duration::from_secs(5),
        &cancel,
        |_| Ok(7),
    )
    .unwrap();
    assert_eq!(value, 7);
    assert!(!cancel.is_cancelled());
    assert_eq!(timeout_count("exec_test_fast"), 0);
}

#[test]
fn test_panics_become_errors() {
    let err = catch_panics::<(), _>("exec_test_panic", || panic!("bad sample")).unwrap_err();
    assert!(err.to_string().contains("bad sample"));

    let cancel = ZiCancelToken::new();
    let err = run_with_timeout::<(), _>(
        "exec_test_panic_deadline",
        Duration::from_secs(5),
        &cancel,
        |_| panic!("worker died"),
    )
    .unwrap_err();
    assert!(err.to_string().contains("worker died"));
}

#[test]
fn test_batch_reports_each_run_in_order() {
    let ctx = pipeline();
    let registry = ZiExecutorRegistry::new();
    let runner = ZiBatchRunner::new()
        .name("batch_order")
        .workers(2)
        .registry(registry.clone());

    let ids = runs(&["run_a", "run_bb", "bad_run", "run_dddd"]);
    let reports = runner.run(&ctx, &ids, &runs(&["peaks"])).unwrap();

    let order: Vec<&str> = reports.iter().map(|r| r.run_id.as_str()).collect();
    assert_eq!(order, vec!["run_a", "run_bb", "bad_run", "run_dddd"]);
    assert_eq!(reports[0].status, ZiRunStatus::Completed);
    assert!(matches!(&reports[2].status, ZiRunStatus::Failed(message) if message.contains("corrupt file")));
    assert_eq!(reports[3].status, ZiRunStatus::Completed);
    assert_eq!(registry.active(), 0);

    let totals = total_stats(&reports);
    assert_eq!(totals.computed("raw"), 4);
    assert_eq!(totals.computed("peaks"), 3);
    assert_eq!(totals.failures, 1);

    assert_eq!(ctx.get_data("run_bb", "peaks").unwrap().as_i64(), Some(12));
    assert_eq!(ctx.stats().store_hits, 1);
}

#[test]
fn test_batch_reuses_stored_products() {
    let ctx = pipeline();
    let runner = ZiBatchRunner::new()
        .name("batch_reuse")
        .workers(2)
        .registry(ZiExecutorRegistry::new());
    let ids = runs(&["r1", "r2"]);
    let targets = runs(&["peaks"]);

    runner.run(&ctx, &ids, &targets).unwrap();
    let again = runner.run(&ctx, &ids, &targets).unwrap();
    let totals = total_stats(&again);
    assert_eq!(totals.computations, 0);
    assert_eq!(totals.store_hits, 2);
}

#[test]
fn test_cancelled_batch_skips_runs() {
    let ctx = pipeline();
    let runner = ZiBatchRunner::new()
        .name("batch_cancel")
        .workers(1)
        .registry(ZiExecutorRegistry::new());
    runner.cancel_token().cancel();

    let reports = runner.run(&ctx, &runs(&["r1", "r2"]), &runs(&["peaks"])).unwrap();
    assert!(reports
        .iter()
        .all(|report| report.status == ZiRunStatus::Skipped));
    assert_eq!(total_stats(&reports).computations, 0);
}

#[test]
fn test_stop_on_error_cancels_remaining_runs() {
    let ctx = pipeline();
    let runner = ZiBatchRunner::new()
        .name("batch_stop")
        .workers(1)
        .stop_on_error(true)
        .registry(ZiExecutorRegistry::new());

    let reports = runner
        .run(&ctx, &runs(&["bad_run", "r2", "r3"]), &runs(&["peaks"]))
        .unwrap();
    assert!(matches!(reports[0].status, ZiRunStatus::Failed(_)));
    assert!(runner.cancel_token().is_cancelled());
    assert_eq!(reports[1].status, ZiRunStatus::Skipped);
    assert_eq!(reports[2].status, ZiRunStatus::Skipped);
}

#[test]
fn test_batch_leaves_shared_executors_alive() {
    let global = ZiExecutorRegistry::global();
    let held = global
        .acquire("batch_shared_decode", ZiExecutorKind::Thread, Some(2))
        .unwrap();

    let ctx = pipeline();
    let runner = ZiBatchRunner::new().name("batch_shared_decode").workers(2);
    let reports = runner.run(&ctx, &runs(&["r1"]), &runs(&["peaks"])).unwrap();
    assert_eq!(reports[0].status, ZiRunStatus::Completed);
    assert_eq!(
        global.ref_count("batch_shared_decode", ZiExecutorKind::Thread, 2),
        1
    );

    let again = global
        .acquire("batch_shared_decode", ZiExecutorKind::Thread, Some(2))
        .unwrap();
    assert!(again.shares_pool_with(&held));
    assert_eq!(
        global.ref_count("batch_shared_decode", ZiExecutorKind::Thread, 2),
        2
    );
}

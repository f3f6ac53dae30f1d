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

//! Deadlines for single computations.
//!
//! A guarded computation runs on its own thread while the caller waits with
//! a deadline. On overrun the caller stops waiting, cancels the task's
//! [`ZiCancelToken`], bumps the per-callable timeout counter and returns
//! [`ZiError::Timeout`]. Code that never polls its token keeps running in
//! the background until it finishes; its result is dropped.

use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Mutex, OnceLock};
use std::thread;
use std::time::Duration;

use crate::errors::{Result, ZiError};
use crate::exec::cancel::ZiCancelToken;

static TIMEOUT_COUNTS: OnceLock<Mutex<HashMap<String, u64>>> = OnceLock::new();

fn counts() -> &'static Mutex<HashMap<String, u64>> {
    TIMEOUT_COUNTS.get_or_init(|| Mutex::new(HashMap::new()))
}

fn record_timeout(callable: &str) -> u64 {
    match counts().lock() {
        Ok(mut counts) => {
            let count = counts.entry(callable.to_string()).or_insert(0);
            *count += 1;
            *count
        }
        Err(_) => 0,
    }
}

/// Number of times `callable` has overrun its deadline in this process.
pub fn timeout_count(callable: &str) -> u64 {
    counts()
        .lock()
        .map(|counts| counts.get(callable).copied().unwrap_or(0))
        .unwrap_or(0)
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Runs `task` on the current thread, turning a panic into an error.
pub fn catch_panics<T, F>(callable: &str, task: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    panic::catch_unwind(AssertUnwindSafe(task)).unwrap_or_else(|payload| {
        Err(ZiError::internal(format!(
            "'{callable}' panicked: {}",
            panic_message(payload.as_ref())
        )))
    })
}

/// Runs `task` with a deadline of `limit`.
pub fn run_with_timeout<T, F>(
    callable: &str,
    limit: Duration,
    cancel: &ZiCancelToken,
    task: F,
) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(ZiCancelToken) -> Result<T> + Send + 'static,
{
    let (tx, rx) = mpsc::sync_channel(1);
    let token = cancel.clone();
    let name = callable.to_string();

    thread::Builder::new()
        .name(format!("zi-deadline-{callable}"))
        .spawn(move || {
            let outcome = catch_panics(&name, move || task(token));
            let _ = tx.send(outcome);
        })?;

    match rx.recv_timeout(limit) {
        Ok(outcome) => outcome,
        Err(RecvTimeoutError::Timeout) => {
            cancel.cancel();
            let count = record_timeout(callable);
            log::warn!(
                "exec.timeout: deadline exceeded - callable={}, limit_ms={}, timeouts={}",
                callable,
                limit.as_millis(),
                count
            );
            Err(ZiError::Timeout {
                callable: callable.to_string(),
                limit_ms: limit.as_millis() as u64,
            })
        }
        Err(RecvTimeoutError::Disconnected) => Err(ZiError::internal(format!(
            "'{callable}' worker exited without a result"
        ))),
    }
}

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

//! Named, reference-counted worker pools.
//!
//! Executors are keyed by `(name, kind, workers)`. Acquiring an existing key
//! shares the pool and bumps its reference count; dropping the last
//! [`ZiExecutorHandle`] tears the pool down. [`ZiExecutorRegistry::shutdown_all`]
//! forgets every pool at once, e.g. at application exit.
//!
//! Both kinds are backed by rayon thread pools. `Process` pools are kept
//! apart from `Thread` pools of the same name and size so that isolated
//! workloads never share workers.

use std::collections::HashMap;
use std::ops::Deref;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use serde::{Deserialize, Serialize};

use crate::errors::{Result, ZiError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZiExecutorKind {
    Thread,
    Process,
}

impl ZiExecutorKind {
    fn prefix(&self) -> &'static str {
        match self {
            ZiExecutorKind::Thread => "thread",
            ZiExecutorKind::Process => "proc",
        }
    }
}

pub struct ZiExecutor {
    name: String,
    kind: ZiExecutorKind,
    workers: usize,
    pool: rayon::ThreadPool,
}

impl ZiExecutor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ZiExecutorKind {
        self.kind
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Runs `op` inside the pool, so rayon parallelism inside it uses
    /// this pool's workers.
    pub fn install<R, OP>(&self, op: OP) -> R
    where
        OP: FnOnce() -> R + Send,
        R: Send,
    {
        self.pool.install(op)
    }

    pub fn spawn<OP>(&self, op: OP)
    where
        OP: FnOnce() + Send + 'static,
    {
        self.pool.spawn(op)
    }
}

type ZiExecutorKey = (String, ZiExecutorKind, usize);

struct ZiExecutorSlot {
    executor: Arc<ZiExecutor>,
    refs: usize,
    generation: u64,
}

#[derive(Default)]
struct ZiRegistryState {
    slots: HashMap<ZiExecutorKey, ZiExecutorSlot>,
    next_generation: u64,
}

#[derive(Clone, Default)]
pub struct ZiExecutorRegistry {
    state: Arc<Mutex<ZiRegistryState>>,
}

static GLOBAL_REGISTRY: OnceLock<ZiExecutorRegistry> = OnceLock::new();

impl ZiExecutorRegistry {
    pub fn new() -> Self {
        ZiExecutorRegistry::default()
    }

    /// Process-wide registry.
    pub fn global() -> &'static ZiExecutorRegistry {
        GLOBAL_REGISTRY.get_or_init(ZiExecutorRegistry::new)
    }

    fn lock(&self) -> Result<MutexGuard<'_, ZiRegistryState>> {
        self.state
            .lock()
            .map_err(|_| ZiError::internal("executor registry lock poisoned"))
    }

    /// Shares or creates the executor for `(name, kind, workers)`.
    ///
    /// `workers` defaults to the number of CPUs.
    pub fn acquire(
        &self,
        name: &str,
        kind: ZiExecutorKind,
        workers: Option<usize>,
    ) -> Result<ZiExecutorHandle> {
        let workers = workers.unwrap_or_else(num_cpus::get).max(1);
        let key: ZiExecutorKey = (name.to_string(), kind, workers);
        let mut state = self.lock()?;

        if let Some(slot) = state.slots.get_mut(&key) {
            slot.refs += 1;
            return Ok(ZiExecutorHandle {
                registry: self.clone(),
                key,
                generation: slot.generation,
                executor: Arc::clone(&slot.executor),
            });
        }

        let thread_prefix = format!("zi-{}-{name}", kind.prefix());
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(move |index| format!("{thread_prefix}-{index}"))
            .build()
            .map_err(|err| ZiError::internal(format!("failed to start executor '{name}': {err}")))?;
        let executor = Arc::new(ZiExecutor {
            name: name.to_string(),
            kind,
            workers,
            pool,
        });

        let generation = state.next_generation;
        state.next_generation += 1;
        state.slots.insert(
            key.clone(),
            ZiExecutorSlot {
                executor: Arc::clone(&executor),
                refs: 1,
                generation,
            },
        );
        log::info!(
            "exec.pool.start: executor created - name={}, kind={:?}, workers={}",
            name,
            kind,
            workers
        );

        Ok(ZiExecutorHandle {
            registry: self.clone(),
            key,
            generation,
            executor,
        })
    }

    fn release(&self, key: &ZiExecutorKey, generation: u64) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        let drop_slot = match state.slots.get_mut(key) {
            Some(slot) if slot.generation == generation => {
                slot.refs = slot.refs.saturating_sub(1);
                slot.refs == 0
            }
            _ => false,
        };
        if drop_slot {
            state.slots.remove(key);
            log::info!(
                "exec.pool.stop: executor released - name={}, kind={:?}, workers={}",
                key.0,
                key.1,
                key.2
            );
        }
    }

    /// Forgets every executor; outstanding handles keep their pool alive
    /// until dropped but no longer count towards the registry.
    pub fn shutdown_all(&self) -> usize {
        let Ok(mut state) = self.state.lock() else {
            return 0;
        };
        let count = state.slots.len();
        state.slots.clear();
        if count > 0 {
            log::info!("exec.pool.shutdown: executors shut down - count={}", count);
        }
        count
    }

    pub fn active(&self) -> usize {
        self.state.lock().map(|state| state.slots.len()).unwrap_or(0)
    }

    pub fn ref_count(&self, name: &str, kind: ZiExecutorKind, workers: usize) -> usize {
        self.state
            .lock()
            .ok()
            .and_then(|state| {
                state
                    .slots
                    .get(&(name.to_string(), kind, workers))
                    .map(|slot| slot.refs)
            })
            .unwrap_or(0)
    }
}

/// Counted reference to a pooled executor.
pub struct ZiExecutorHandle {
    registry: ZiExecutorRegistry,
    key: ZiExecutorKey,
    generation: u64,
    executor: Arc<ZiExecutor>,
}

impl ZiExecutorHandle {
    /// True when both handles drive the same pool.
    pub fn shares_pool_with(&self, other: &ZiExecutorHandle) -> bool {
        Arc::ptr_eq(&self.executor, &other.executor)
    }
}

impl Deref for ZiExecutorHandle {
    type Target = ZiExecutor;

    fn deref(&self) -> &ZiExecutor {
        &self.executor
    }
}

impl Drop for ZiExecutorHandle {
    fn drop(&mut self) {
        self.registry.release(&self.key, self.generation);
    }
}

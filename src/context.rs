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

//! # Zirun Context Module
//!
//! [`ZiContext`] is the orchestrator. It owns the plugin registry, the
//! explicit configuration, the adapter and compatibility registries, the
//! artifact store and the run-scoped in-memory cache, and it answers
//! `get_data(run, name)` requests:
//!
//! 1. find the producing plugin and its memoised, validated configuration;
//! 2. resolve and check its dependencies;
//! 3. derive the lineage key (recursively over dependency keys);
//! 4. serve from memory, then from storage, else compute, validate,
//!    persist according to the save policy and cache.
//!
//! A traversal is single threaded and depth first. Forked contexts share
//! plugins, configuration, registries and storage, but each has its own
//! caches, so one context per worker is the unit of parallelism.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::adapter::{ZiAdapterRegistry, ZiInstrumentAdapter, ADAPTER_CONFIG_KEY};
use crate::cache::{ZiMemoEntry, ZiRunCache};
use crate::config::compat::{ZiAlias, ZiCompatRegistry};
use crate::config::resolver::{ZiConfigResolver, ZiResolvedConfig};
use crate::config::store::ZiConfigStore;
use crate::config::value::ZiConfigValue;
use crate::data::{ZiData, ZiSequence};
use crate::diagnostics::{resident_memory_kb, ZiDiagnostics, ZiInputSummary};
use crate::errors::{Result, ZiError};
use crate::exec::cancel::ZiCancelToken;
use crate::exec::timeout::{catch_panics, run_with_timeout};
use crate::lineage::{ZiLineage, ZiResolutionStack};
use crate::metrics::ZiEngineStats;
use crate::plugin::{
    ZiComputeInput, ZiDependency, ZiEngine, ZiOutputKind, ZiPlugin, ZiRegisteredPlugin, ZiSaveWhen,
};
use crate::storage::artifact::{ZiArtifactHeader, ZiArtifactStore};
use crate::storage::backend::{ZiFileStorage, ZiMemoryStorage, ZiStorage};
use crate::storage::key::{lineage_key, ZiLineageKey};
use crate::storage::watch::ZiWatchSignature;
use crate::version::ZiVersion;

/// Orchestrator settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZiContextConfig {
    /// Directory of the file-backed artifact store.
    pub storage_dir: Option<PathBuf>,
    /// Engine version compared against alias removal versions.
    pub engine_version: String,
    pub memory_cache: bool,
    pub storage_enabled: bool,
    /// Deadline for plugins that do not declare their own.
    pub default_timeout_ms: Option<u64>,
    /// Log a full diagnostics bundle when a computation fails.
    pub log_diagnostics: bool,
}

impl Default for ZiContextConfig {
    fn default() -> Self {
        Self {
            storage_dir: None,
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            memory_cache: true,
            storage_enabled: true,
            default_timeout_ms: None,
            log_diagnostics: true,
        }
    }
}

impl ZiContextConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn storage_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.storage_dir = Some(dir.into());
        self
    }

    pub fn engine_version(mut self, version: &str) -> Self {
        self.engine_version = version.to_string();
        self
    }

    pub fn memory_cache(mut self, enabled: bool) -> Self {
        self.memory_cache = enabled;
        self
    }

    pub fn storage_enabled(mut self, enabled: bool) -> Self {
        self.storage_enabled = enabled;
        self
    }

    pub fn default_timeout_ms(mut self, limit_ms: u64) -> Self {
        self.default_timeout_ms = Some(limit_ms);
        self
    }

    pub fn log_diagnostics(mut self, enabled: bool) -> Self {
        self.log_diagnostics = enabled;
        self
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Loads settings from a `.yaml`/`.yml` or JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml_str(&text),
            _ => Self::from_json_str(&text),
        }
    }
}

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>> {
    lock.read()
        .map_err(|_| ZiError::internal("context lock poisoned"))
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>> {
    lock.write()
        .map_err(|_| ZiError::internal("context lock poisoned"))
}

/// State shared by a context and all of its forks.
#[derive(Clone)]
struct ZiShared {
    plugins: Arc<RwLock<BTreeMap<String, Arc<ZiRegisteredPlugin>>>>,
    config: Arc<RwLock<ZiConfigStore>>,
    adapters: Arc<RwLock<ZiAdapterRegistry>>,
    compat: Arc<RwLock<ZiCompatRegistry>>,
    /// Bumped on every change that can alter configs, dependencies or keys.
    generation: Arc<AtomicU64>,
}

/// Thread-safe handle from which contexts over the same state are made.
#[derive(Clone)]
pub struct ZiContextSeed {
    settings: ZiContextConfig,
    engine_version: ZiVersion,
    shared: ZiShared,
    store: Option<ZiArtifactStore>,
}

impl ZiContextSeed {
    /// A new context with empty caches over the shared state.
    pub fn context(&self) -> ZiContext {
        ZiContext {
            seed: self.clone(),
            memo: RefCell::new(ZiMemo::default()),
            memory: RefCell::new(ZiRunCache::new()),
            data_stack: ZiResolutionStack::new(),
            key_stack: ZiResolutionStack::new(),
            lineage_stack: ZiResolutionStack::new(),
            target: RefCell::new(None),
            stats: RefCell::new(ZiEngineStats::new()),
        }
    }
}

/// Derived facts, valid for one generation of the shared state.
#[derive(Default)]
struct ZiMemo {
    generation: u64,
    configs: HashMap<String, Arc<ZiResolvedConfig>>,
    dependencies: HashMap<String, Arc<Vec<ZiDependency>>>,
    keys: HashMap<(String, String), ZiLineageKey>,
    lineages: HashMap<String, ZiLineage>,
}

pub struct ZiContext {
    seed: ZiContextSeed,
    memo: RefCell<ZiMemo>,
    memory: RefCell<ZiRunCache<ZiMemoEntry>>,
    data_stack: ZiResolutionStack,
    key_stack: ZiResolutionStack,
    lineage_stack: ZiResolutionStack,
    /// Product requested by the outermost `get_data` call in flight.
    target: RefCell<Option<String>>,
    stats: RefCell<ZiEngineStats>,
}

impl ZiContext {
    /// Creates a context, opening a file store when `storage_dir` is set.
    pub fn new(settings: ZiContextConfig) -> Result<Self> {
        let backend: Option<Arc<dyn ZiStorage>> = match &settings.storage_dir {
            Some(dir) if settings.storage_enabled => Some(Arc::new(ZiFileStorage::open(dir)?)),
            _ => None,
        };
        Self::build(settings, backend)
    }

    /// Creates a context over an explicit storage backend.
    pub fn with_storage(settings: ZiContextConfig, backend: Arc<dyn ZiStorage>) -> Result<Self> {
        let backend = settings.storage_enabled.then_some(backend);
        Self::build(settings, backend)
    }

    /// Default settings over a fresh in-memory store.
    pub fn in_memory() -> Result<Self> {
        Self::with_storage(ZiContextConfig::default(), Arc::new(ZiMemoryStorage::new()))
    }

    fn build(settings: ZiContextConfig, backend: Option<Arc<dyn ZiStorage>>) -> Result<Self> {
        let engine_version = ZiVersion::parse(&settings.engine_version)?;
        log::info!(
            "context.init: context created - engine_version={}, storage={}, memory_cache={}",
            engine_version,
            backend.is_some(),
            settings.memory_cache
        );
        let seed = ZiContextSeed {
            settings,
            engine_version,
            shared: ZiShared {
                plugins: Arc::new(RwLock::new(BTreeMap::new())),
                config: Arc::new(RwLock::new(ZiConfigStore::new())),
                adapters: Arc::new(RwLock::new(ZiAdapterRegistry::new())),
                compat: Arc::new(RwLock::new(ZiCompatRegistry::new())),
                generation: Arc::new(AtomicU64::new(0)),
            },
            store: backend.map(ZiArtifactStore::new),
        };
        Ok(seed.context())
    }

    /// Uses a compatibility registry shared with other contexts.
    pub fn with_compat(mut self, compat: Arc<RwLock<ZiCompatRegistry>>) -> Self {
        self.seed.shared.compat = compat;
        self.invalidate();
        self
    }

    pub fn settings(&self) -> &ZiContextConfig {
        &self.seed.settings
    }

    pub fn engine_version(&self) -> &ZiVersion {
        &self.seed.engine_version
    }

    pub fn store(&self) -> Option<&ZiArtifactStore> {
        self.seed.store.as_ref()
    }

    pub fn seed(&self) -> ZiContextSeed {
        self.seed.clone()
    }

    /// Independent context over the same plugins, configuration and storage.
    pub fn fork(&self) -> ZiContext {
        self.seed.context()
    }

    pub fn register<P: ZiPlugin + 'static>(&self, plugin: P) -> Result<()> {
        self.register_arc(Arc::new(plugin))
    }

    pub fn register_arc(&self, plugin: Arc<dyn ZiPlugin>) -> Result<()> {
        let registered = ZiRegisteredPlugin::new(plugin)?;
        {
            let mut plugins = write(&self.seed.shared.plugins)?;
            if plugins.contains_key(registered.name()) {
                return Err(ZiError::validation(format!(
                    "plugin '{}' is already registered",
                    registered.name()
                )));
            }
            log::info!(
                "context.register: plugin registered - plugin={}, version={}, type={}",
                registered.name(),
                registered.version_text(),
                registered.plugin().type_name()
            );
            plugins.insert(registered.name().to_string(), Arc::new(registered));
        }
        self.invalidate();
        Ok(())
    }

    pub fn register_adapter<A: ZiInstrumentAdapter + 'static>(&self, adapter: A) -> Result<()> {
        write(&self.seed.shared.adapters)?.register(Arc::new(adapter))?;
        self.invalidate();
        Ok(())
    }

    pub fn register_alias(&self, alias: ZiAlias) -> Result<()> {
        write(&self.seed.shared.compat)?.register_global(alias)?;
        self.invalidate();
        Ok(())
    }

    pub fn register_plugin_alias(&self, plugin: &str, alias: ZiAlias) -> Result<()> {
        write(&self.seed.shared.compat)?.register_for_plugin(plugin, alias)?;
        self.invalidate();
        Ok(())
    }

    /// The shared compatibility registry. Call [`ZiContext::invalidate`]
    /// after changing it directly.
    pub fn compat(&self) -> Arc<RwLock<ZiCompatRegistry>> {
        Arc::clone(&self.seed.shared.compat)
    }

    /// Merges global, dotted (`plugin.option`) and namespaced
    /// (`{"plugin": {...}}`) keys into the configuration.
    pub fn set_config(&self, config: &Value) -> Result<()> {
        write(&self.seed.shared.config)?.apply(config)?;
        log::debug!(
            "context.config: configuration updated - keys={}",
            config.as_object().map_or(0, |object| object.len())
        );
        self.invalidate();
        Ok(())
    }

    pub fn set_option(&self, key: &str, value: Value) -> Result<()> {
        write(&self.seed.shared.config)?.set(key, &value)?;
        self.invalidate();
        Ok(())
    }

    /// Drops memoised configs, dependencies and keys in every context
    /// sharing this state.
    pub fn invalidate(&self) {
        self.seed.shared.generation.fetch_add(1, Ordering::SeqCst);
    }

    fn sync_generation(&self) {
        let current = self.seed.shared.generation.load(Ordering::SeqCst);
        let mut memo = self.memo.borrow_mut();
        if memo.generation != current {
            *memo = ZiMemo {
                generation: current,
                ..ZiMemo::default()
            };
        }
    }

    pub fn plugin_names(&self) -> Result<Vec<String>> {
        Ok(read(&self.seed.shared.plugins)?.keys().cloned().collect())
    }

    fn plugin(&self, name: &str) -> Result<Arc<ZiRegisteredPlugin>> {
        read(&self.seed.shared.plugins)?
            .get(name)
            .cloned()
            .ok_or_else(|| ZiError::MissingPlugin {
                name: name.to_string(),
            })
    }

    pub fn stats(&self) -> ZiEngineStats {
        self.stats.borrow().clone()
    }

    pub fn clear_memory_cache(&self) {
        let mut memory = self.memory.borrow_mut();
        log::debug!("context.memory.clear: in-memory cache cleared - entries={}", memory.len());
        memory.clear();
    }

    /// Whether the product for `run_id` is present in persistent storage.
    pub fn is_stored(&self, run_id: &str, name: &str) -> Result<bool> {
        self.sync_generation();
        let key = self.key_for_inner(run_id, name)?;
        match &self.seed.store {
            Some(store) => store.exists(&key),
            None => Ok(false),
        }
    }

    pub fn get_config(&self, plugin: &str, option: &str) -> Result<ZiConfigValue> {
        self.sync_generation();
        let registered = self.plugin(plugin)?;
        let config = self.config_for(&registered)?;
        config.get(option).cloned()
    }

    pub fn key_for(&self, run_id: &str, name: &str) -> Result<ZiLineageKey> {
        self.sync_generation();
        self.key_for_inner(run_id, name)
    }

    /// Run-independent derivation of `name`.
    pub fn get_lineage(&self, name: &str) -> Result<ZiLineage> {
        self.sync_generation();
        self.lineage_inner(name)
    }

    /// Returns the product `name` for `run_id`, computing what is missing.
    pub fn get_data(&self, run_id: &str, name: &str) -> Result<ZiData> {
        self.sync_generation();
        let outermost = self.data_stack.is_empty();
        if outermost {
            *self.target.borrow_mut() = Some(name.to_string());
        }
        let result = self.resolve_data(run_id, name);
        if outermost {
            self.target.borrow_mut().take();
        }
        result
    }

    fn config_for(&self, plugin: &ZiRegisteredPlugin) -> Result<Arc<ZiResolvedConfig>> {
        let cached = self.memo.borrow().configs.get(plugin.name()).cloned();
        if let Some(config) = cached {
            return Ok(config);
        }

        let resolved = {
            let store = read(&self.seed.shared.config)?;
            let compat = read(&self.seed.shared.compat)?;
            let adapters = read(&self.seed.shared.adapters)?;
            let selected = store.global(ADAPTER_CONFIG_KEY).and_then(ZiConfigValue::as_str);
            let adapter = adapters.select(selected)?;
            ZiConfigResolver::new(&store, &compat, &self.seed.engine_version)
                .with_adapter(adapter.map(|adapter| &**adapter))
                .resolve(plugin.name(), plugin.options())?
        };

        let config = Arc::new(resolved);
        self.memo
            .borrow_mut()
            .configs
            .insert(plugin.name().to_string(), Arc::clone(&config));
        Ok(config)
    }

    fn dependencies_for(&self, plugin: &ZiRegisteredPlugin) -> Result<Arc<Vec<ZiDependency>>> {
        let cached = self.memo.borrow().dependencies.get(plugin.name()).cloned();
        if let Some(dependencies) = cached {
            return Ok(dependencies);
        }

        let declared = plugin.plugin().depends_on(self)?;
        {
            let plugins = read(&self.seed.shared.plugins)?;
            for dependency in &declared {
                dependency.check_well_formed(plugin.name())?;
                let upstream = plugins.get(&dependency.name).ok_or_else(|| {
                    ZiError::MissingDependency {
                        plugin: plugin.name().to_string(),
                        dependency: dependency.name.clone(),
                        message: "no registered plugin provides it".to_string(),
                    }
                })?;
                if !dependency.accepts(upstream.version()) {
                    return Err(ZiError::MissingDependency {
                        plugin: plugin.name().to_string(),
                        dependency: dependency.name.clone(),
                        message: format!(
                            "requires version {}, registered version is {}",
                            dependency
                                .version
                                .as_ref()
                                .map_or_else(|| "*".to_string(), |req| req.to_string()),
                            upstream.version_text()
                        ),
                    });
                }
            }
        }

        let dependencies = Arc::new(declared);
        self.memo
            .borrow_mut()
            .dependencies
            .insert(plugin.name().to_string(), Arc::clone(&dependencies));
        Ok(dependencies)
    }

    fn key_for_inner(&self, run_id: &str, name: &str) -> Result<ZiLineageKey> {
        let memo_key = (run_id.to_string(), name.to_string());
        let cached = self.memo.borrow().keys.get(&memo_key).cloned();
        if let Some(key) = cached {
            return Ok(key);
        }

        let plugin = self.plugin(name)?;
        let _guard = self.key_stack.enter(name)?;
        let config = self.config_for(&plugin)?;
        let dependencies = self.dependencies_for(&plugin)?;

        let mut upstream = serde_json::Map::new();
        for dependency in dependencies.iter() {
            let key = self.key_for_inner(run_id, &dependency.name)?;
            upstream.insert(dependency.name.clone(), Value::String(key.to_string()));
        }
        let tracked = json!({
            "version": plugin.version_text(),
            "config": config.lineage_values(),
            "depends_on": upstream,
        });
        let key = lineage_key(name, run_id, &tracked);

        self.memo.borrow_mut().keys.insert(memo_key, key.clone());
        Ok(key)
    }

    fn lineage_inner(&self, name: &str) -> Result<ZiLineage> {
        let cached = self.memo.borrow().lineages.get(name).cloned();
        if let Some(lineage) = cached {
            return Ok(lineage);
        }

        let plugin = self.plugin(name)?;
        let _guard = self.lineage_stack.enter(name)?;
        let config = self.config_for(&plugin)?;
        let dependencies = self.dependencies_for(&plugin)?;

        let mut upstream = BTreeMap::new();
        for dependency in dependencies.iter() {
            upstream.insert(dependency.name.clone(), self.lineage_inner(&dependency.name)?);
        }
        let lineage = ZiLineage {
            plugin: name.to_string(),
            version: plugin.version_text().to_string(),
            config: config.lineage_values(),
            dependencies: upstream,
        };

        self.memo
            .borrow_mut()
            .lineages
            .insert(name.to_string(), lineage.clone());
        Ok(lineage)
    }

    fn resolve_data(&self, run_id: &str, name: &str) -> Result<ZiData> {
        let plugin = self.plugin(name)?;
        // Dynamic dependency lists may call `get_data`; they must see this frame.
        let _guard = self.data_stack.enter(name)?;
        let config = self.config_for(&plugin)?;
        let dependencies = self.dependencies_for(&plugin)?;
        let key = self.key_for_inner(run_id, name)?;

        if let Some(data) = self.memory_hit(run_id, name, &key) {
            self.persist_requested_target(run_id, &plugin, &config, &key)?;
            return Ok(data);
        }
        if let Some(data) = self.load_stored(run_id, &plugin, &key)? {
            return Ok(data);
        }
        self.compute(run_id, &plugin, &config, &dependencies, &key)
    }

    fn memory_hit(&self, run_id: &str, name: &str, key: &ZiLineageKey) -> Option<ZiData> {
        if !self.seed.settings.memory_cache {
            return None;
        }
        let hit = self
            .memory
            .borrow()
            .get(run_id, name, key)
            .and_then(ZiMemoEntry::materialize)?;
        self.stats.borrow_mut().memory_hits += 1;
        log::debug!(
            "context.memory.hit: served from memory - plugin={}, run={}, key={}",
            name,
            run_id,
            key
        );
        Some(hit)
    }

    /// Persists an `OnTarget` product that was first computed as an
    /// intermediate and is now served from memory to an outermost request.
    fn persist_requested_target(
        &self,
        run_id: &str,
        plugin: &ZiRegisteredPlugin,
        config: &ZiResolvedConfig,
        key: &ZiLineageKey,
    ) -> Result<()> {
        if plugin.save_when() != ZiSaveWhen::OnTarget {
            return Ok(());
        }
        let Some(store) = self.persist_to(plugin) else {
            return Ok(());
        };
        if store.exists(key)? {
            return Ok(());
        }
        let entry = match self.memory.borrow().get(run_id, plugin.name(), key) {
            Some(ZiMemoEntry::Single(data)) => data.try_clone().map(ZiMemoEntry::Single),
            Some(ZiMemoEntry::Chunks(chunks)) => Some(ZiMemoEntry::Chunks(Arc::clone(chunks))),
            None => None,
        };
        let Some(entry) = entry else {
            return Ok(());
        };

        let header = self.header(run_id, plugin, self.watch_signature(plugin, config)?)?;
        match &entry {
            ZiMemoEntry::Single(data) => {
                store.save(key, header, data)?;
            }
            ZiMemoEntry::Chunks(chunks) => {
                store.save_chunks(key, header, chunks)?;
            }
        }
        self.stats.borrow_mut().persisted += 1;
        log::debug!(
            "context.persist.target: cached product persisted for its request - plugin={}, run={}, key={}",
            plugin.name(),
            run_id,
            key
        );
        Ok(())
    }

    fn load_stored(
        &self,
        run_id: &str,
        plugin: &ZiRegisteredPlugin,
        key: &ZiLineageKey,
    ) -> Result<Option<ZiData>> {
        let Some(store) = &self.seed.store else {
            return Ok(None);
        };
        if !store.exists(key)? {
            return Ok(None);
        }

        let meta = store.meta(key)?;
        if let Some(watch) = &meta.watch {
            if !watch.is_current()? {
                self.stats.borrow_mut().watch_invalidations += 1;
                log::info!(
                    "context.watch: watched files changed, recomputing - plugin={}, run={}, key={}",
                    plugin.name(),
                    run_id,
                    key
                );
                return Ok(None);
            }
        }

        let data = match store.load(key) {
            Ok(data) => data,
            Err(err) => {
                log::warn!(
                    "context.store.unreadable: stored artifact ignored - plugin={}, key={}, error={}",
                    plugin.name(),
                    key,
                    err
                );
                return Ok(None);
            }
        };

        self.stats.borrow_mut().store_hits += 1;
        if self.seed.settings.memory_cache {
            if let Some(copy) = data.try_clone() {
                self.memory
                    .borrow_mut()
                    .insert(run_id, plugin.name(), key.clone(), ZiMemoEntry::Single(copy));
            }
        }
        log::debug!(
            "context.store.hit: served from storage - plugin={}, run={}, key={}",
            plugin.name(),
            run_id,
            key
        );
        Ok(Some(data))
    }

    fn compute(
        &self,
        run_id: &str,
        plugin: &Arc<ZiRegisteredPlugin>,
        config: &Arc<ZiResolvedConfig>,
        dependencies: &[ZiDependency],
        key: &ZiLineageKey,
    ) -> Result<ZiData> {
        let name = plugin.name();

        let mut inputs = BTreeMap::new();
        for dependency in dependencies {
            let data = self.resolve_data(run_id, &dependency.name)?;
            let upstream = self.plugin(&dependency.name)?;
            upstream
                .output_schema()
                .check_shape(&data)
                .map_err(|message| ZiError::InputContract {
                    plugin: name.to_string(),
                    dependency: dependency.name.clone(),
                    message,
                })?;
            inputs.insert(dependency.name.clone(), data);
        }

        let summaries: BTreeMap<String, ZiInputSummary> = if self.seed.settings.log_diagnostics {
            inputs
                .iter()
                .map(|(input, data)| (input.clone(), ZiInputSummary::of(data)))
                .collect()
        } else {
            BTreeMap::new()
        };

        log::debug!(
            "context.compute.start: computing product - plugin={}, run={}, key={}",
            name,
            run_id,
            key
        );
        let started = Instant::now();
        let result = self.watch_signature(plugin, config).and_then(|watch| {
            let output = self.invoke(run_id, plugin, config, inputs)?;
            let output = self.check_output(plugin, output)?;
            self.commit(run_id, plugin, key, watch, output)
        });

        match result {
            Ok(data) => {
                self.stats.borrow_mut().record_compute(name);
                log::info!(
                    "context.compute.done: product computed - plugin={}, run={}, elapsed_ms={}",
                    name,
                    run_id,
                    started.elapsed().as_millis()
                );
                Ok(data)
            }
            Err(err) => {
                let err = if matches!(err, ZiError::Compute { .. }) {
                    err
                } else {
                    ZiError::compute(name, err)
                };
                {
                    let mut stats = self.stats.borrow_mut();
                    stats.failures += 1;
                    if err.is_timeout() {
                        stats.timeouts += 1;
                    }
                }
                if self.seed.settings.log_diagnostics {
                    ZiDiagnostics {
                        run_id: run_id.to_string(),
                        plugin: name.to_string(),
                        plugin_type: plugin.plugin().type_name().to_string(),
                        config: (**config).clone(),
                        inputs: summaries,
                        resident_memory_kb: resident_memory_kb(),
                        error: err.to_string(),
                    }
                    .log();
                } else {
                    log::error!(
                        "context.compute.failed: computation failed - plugin={}, run={}, error={}",
                        name,
                        run_id,
                        err
                    );
                }
                Err(err)
            }
        }
    }

    fn watch_signature(
        &self,
        plugin: &ZiRegisteredPlugin,
        config: &ZiResolvedConfig,
    ) -> Result<Option<ZiWatchSignature>> {
        let paths = plugin.plugin().watch_files(config);
        if paths.is_empty() {
            return Ok(None);
        }
        ZiWatchSignature::compute(&paths).map(Some)
    }

    fn invoke(
        &self,
        run_id: &str,
        plugin: &Arc<ZiRegisteredPlugin>,
        config: &ZiResolvedConfig,
        inputs: BTreeMap<String, ZiData>,
    ) -> Result<ZiData> {
        let cancel = ZiCancelToken::new();
        let input = ZiComputeInput {
            run_id: run_id.to_string(),
            config: config.clone(),
            inputs,
            cancel: cancel.clone(),
        };
        let limit = plugin.timeout().or_else(|| {
            self.seed
                .settings
                .default_timeout_ms
                .map(Duration::from_millis)
        });

        match limit {
            Some(limit) => {
                let worker = Arc::clone(plugin.plugin());
                run_with_timeout(plugin.name(), limit, &cancel, move |_| {
                    worker.compute(input).map_err(ZiError::from)
                })
            }
            None => catch_panics(plugin.name(), || {
                plugin.plugin().compute(input).map_err(ZiError::from)
            }),
        }
    }

    /// Applies the output contract and the declared schema cast.
    fn check_output(&self, plugin: &ZiRegisteredPlugin, output: ZiData) -> Result<ZiData> {
        let name = plugin.name();
        match (plugin.output_kind(), output) {
            (ZiOutputKind::Single, ZiData::Sequence(_)) => Err(ZiError::output_contract(
                name,
                "declared a single output but returned a sequence",
            )),
            (ZiOutputKind::Single, single) => plugin
                .output_schema()
                .cast(single)
                .map_err(|message| ZiError::output_contract(name, message)),
            (ZiOutputKind::Sequence, ZiData::Sequence(sequence)) => Ok(ZiData::Sequence(sequence)),
            (ZiOutputKind::Sequence, single) => {
                log::debug!(
                    "context.compute.widen: single value returned for a sequence output - plugin={}",
                    name
                );
                Ok(ZiData::Sequence(ZiSequence::from_chunks(vec![single])))
            }
        }
    }

    fn persist_to(&self, plugin: &ZiRegisteredPlugin) -> Option<&ZiArtifactStore> {
        let store = self.seed.store.as_ref()?;
        let wanted = match plugin.save_when() {
            ZiSaveWhen::Never => false,
            ZiSaveWhen::Always => true,
            ZiSaveWhen::OnTarget => self.target.borrow().as_deref() == Some(plugin.name()),
        };
        wanted.then_some(store)
    }

    fn header(
        &self,
        run_id: &str,
        plugin: &ZiRegisteredPlugin,
        watch: Option<ZiWatchSignature>,
    ) -> Result<ZiArtifactHeader> {
        Ok(ZiArtifactHeader {
            plugin: plugin.name().to_string(),
            run_id: run_id.to_string(),
            watch,
            lineage: Some(self.lineage_inner(plugin.name())?),
            engine_version: self.seed.engine_version.to_string(),
        })
    }

    /// Materialises sequences, persists per the save policy and caches.
    fn commit(
        &self,
        run_id: &str,
        plugin: &ZiRegisteredPlugin,
        key: &ZiLineageKey,
        watch: Option<ZiWatchSignature>,
        output: ZiData,
    ) -> Result<ZiData> {
        let name = plugin.name();
        let store = self.persist_to(plugin);
        if let Some(store) = store {
            if store.exists(key)? {
                store.remove(key)?;
            }
        }

        let (result, entry) = match output {
            ZiData::Sequence(sequence) => {
                let chunks = sequence
                    .map(|chunk| {
                        let chunk = chunk?;
                        if chunk.is_sequence() {
                            return Err(ZiError::output_contract(
                                name,
                                "sequence chunks cannot themselves be sequences",
                            ));
                        }
                        plugin
                            .output_schema()
                            .cast(chunk)
                            .map_err(|message| ZiError::output_contract(name, message))
                    })
                    .collect::<Result<Vec<_>>>()?;
                if let Some(store) = store {
                    store.save_chunks(key, self.header(run_id, plugin, watch)?, &chunks)?;
                }
                let chunks = Arc::new(chunks);
                (
                    ZiData::Sequence(ZiSequence::from_shared(Arc::clone(&chunks))),
                    Some(ZiMemoEntry::Chunks(chunks)),
                )
            }
            single => {
                if let Some(store) = store {
                    store.save(key, self.header(run_id, plugin, watch)?, &single)?;
                }
                let entry = single.try_clone().map(ZiMemoEntry::Single);
                (single, entry)
            }
        };

        if store.is_some() {
            self.stats.borrow_mut().persisted += 1;
            log::debug!(
                "context.persist: product persisted - plugin={}, run={}, key={}",
                name,
                run_id,
                key
            );
        }
        if let (true, Some(entry)) = (self.seed.settings.memory_cache, entry) {
            self.memory
                .borrow_mut()
                .insert(run_id, name, key.clone(), entry);
        }
        Ok(result)
    }
}

impl ZiEngine for ZiContext {
    fn get_data(&self, run_id: &str, name: &str) -> Result<ZiData> {
        ZiContext::get_data(self, run_id, name)
    }

    fn get_config(&self, plugin: &str, option: &str) -> Result<ZiConfigValue> {
        ZiContext::get_config(self, plugin, option)
    }

    fn key_for(&self, run_id: &str, name: &str) -> Result<ZiLineageKey> {
        ZiContext::key_for(self, run_id, name)
    }

    fn get_lineage(&self, name: &str) -> Result<ZiLineage> {
        ZiContext::get_lineage(self, name)
    }
}

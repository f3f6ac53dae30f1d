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

//! # Zirun Plugin Module
//!
//! A plugin produces exactly one named data product per run. It declares
//! what it depends on, which options it reads, what shape its output has and
//! when that output should be persisted; the orchestrator does the rest.
//!
//! ## Implementing Plugins
//!
//! Any type implementing [`ZiPlugin`] can be registered with a
//! [`crate::context::ZiContext`]. Only `provides()` and `compute()` are
//! mandatory:
//!
//! ```rust
//! use zirun::plugin::{ZiComputeInput, ZiDependency, ZiPlugin};
//! use zirun::data::ZiData;
//! use zirun::config::ZiOption;
//!
//! struct Threshold;
//!
//! impl ZiPlugin for Threshold {
//!     fn provides(&self) -> &str {
//!         "above_threshold"
//!     }
//!
//!     fn dependencies(&self) -> Vec<ZiDependency> {
//!         vec![ZiDependency::new("raw_sum")]
//!     }
//!
//!     fn options(&self) -> Vec<ZiOption> {
//!         vec![ZiOption::new("threshold", 10i64)]
//!     }
//!
//!     fn compute(&self, input: ZiComputeInput) -> anyhow::Result<ZiData> {
//!         let total = input.input("raw_sum")?.as_i64().unwrap_or(0);
//!         let threshold = input.config.get_i64("threshold")?;
//!         Ok(ZiData::from(i64::from(total > threshold)))
//!     }
//! }
//! ```
//!
//! Closure-backed plugins can be assembled with [`ZiFnPlugin`], optionally
//! from a declarative [`ZiPluginSpec`].
//!
//! ## Registration Checks
//!
//! [`ZiRegisteredPlugin::new`] validates a plugin once, up front: the
//! product name and every option name must be identifiers, options must be
//! unique and their defaults valid, the version must be dotted numeric and
//! static dependencies must be well formed.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::option::{validate_identifier, ZiOption};
use crate::config::resolver::ZiResolvedConfig;
use crate::config::value::ZiConfigValue;
use crate::data::{ZiData, ZiOutputSchema};
use crate::errors::{Result, ZiError};
use crate::exec::cancel::ZiCancelToken;
use crate::lineage::ZiLineage;
use crate::storage::key::ZiLineageKey;
use crate::version::{ZiVersion, ZiVersionReq};

/// Whether a plugin returns one value or a lazy sequence of chunks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZiOutputKind {
    #[default]
    Single,
    Sequence,
}

impl FromStr for ZiOutputKind {
    type Err = ZiError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "single" => Ok(ZiOutputKind::Single),
            "sequence" | "chunked" => Ok(ZiOutputKind::Sequence),
            other => Err(ZiError::validation(format!(
                "unrecognised output kind '{other}' (expected 'single' or 'sequence')"
            ))),
        }
    }
}

/// When a computed product is written to persistent storage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZiSaveWhen {
    Never,
    #[default]
    Always,
    /// Only when it is the product the outermost request asked for.
    OnTarget,
}

impl FromStr for ZiSaveWhen {
    type Err = ZiError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "never" => Ok(ZiSaveWhen::Never),
            "always" => Ok(ZiSaveWhen::Always),
            "target" | "on_target" => Ok(ZiSaveWhen::OnTarget),
            other => Err(ZiError::validation(format!(
                "unrecognised save policy '{other}' (expected 'never', 'always' or 'target')"
            ))),
        }
    }
}

/// A named upstream product, optionally constrained to compatible versions.
#[derive(Clone, Debug, PartialEq)]
pub struct ZiDependency {
    pub name: String,
    pub version: Option<ZiVersionReq>,
}

impl ZiDependency {
    pub fn new(name: impl Into<String>) -> Self {
        ZiDependency {
            name: name.into(),
            version: None,
        }
    }

    pub fn with_version(name: impl Into<String>, requirement: &str) -> Result<Self> {
        Ok(ZiDependency {
            name: name.into(),
            version: Some(ZiVersionReq::parse(requirement)?),
        })
    }

    /// Parses `name` or `name<requirement>`, e.g. `raw_records>=1.2`.
    pub fn parse(spec: &str) -> Result<Self> {
        let spec = spec.trim();
        match spec.find(|c: char| matches!(c, '=' | '<' | '>' | '^' | '*')) {
            Some(split) => {
                let name = spec[..split].trim();
                ZiDependency::with_version(name, spec[split..].trim()).map_err(|err| {
                    ZiError::validation(format!("malformed dependency '{spec}': {err}"))
                })
            }
            None => Ok(ZiDependency::new(spec)),
        }
    }

    /// Structural check of the declaration made by `plugin`.
    pub fn check_well_formed(&self, plugin: &str) -> Result<()> {
        if self.name.is_empty() {
            return Err(ZiError::validation(format!(
                "plugin '{plugin}' declares a dependency with an empty name"
            )));
        }
        validate_identifier("dependency name", &self.name)?;
        if self.name == plugin {
            return Err(ZiError::validation(format!(
                "plugin '{plugin}' cannot depend on itself"
            )));
        }
        Ok(())
    }

    pub fn accepts(&self, version: &ZiVersion) -> bool {
        self.version.as_ref().map_or(true, |req| req.matches(version))
    }
}

impl fmt::Display for ZiDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(req) => write!(f, "{}{}", self.name, req),
            None => f.write_str(&self.name),
        }
    }
}

/// Narrow view of the orchestrator available to plugins.
pub trait ZiEngine {
    fn get_data(&self, run_id: &str, name: &str) -> Result<ZiData>;

    fn get_config(&self, plugin: &str, option: &str) -> Result<ZiConfigValue>;

    fn key_for(&self, run_id: &str, name: &str) -> Result<ZiLineageKey>;

    fn get_lineage(&self, name: &str) -> Result<ZiLineage>;
}

/// Everything a plugin receives for one computation.
pub struct ZiComputeInput {
    pub run_id: String,
    pub config: ZiResolvedConfig,
    /// Dependency outputs keyed by product name.
    pub inputs: BTreeMap<String, ZiData>,
    /// Set when the computation overran its deadline.
    pub cancel: ZiCancelToken,
}

impl ZiComputeInput {
    pub fn input(&self, name: &str) -> Result<&ZiData> {
        self.inputs
            .get(name)
            .ok_or_else(|| ZiError::validation(format!("no input named '{name}'")))
    }

    /// Moves an input out, e.g. to consume a sequence.
    pub fn take(&mut self, name: &str) -> Result<ZiData> {
        self.inputs
            .remove(name)
            .ok_or_else(|| ZiError::validation(format!("no input named '{name}'")))
    }
}

pub trait ZiPlugin: Send + Sync {
    /// Name of the data product this plugin computes.
    fn provides(&self) -> &str;

    /// Dotted numeric code version; part of every lineage key.
    fn version(&self) -> &str {
        "0.0.0"
    }

    fn dependencies(&self) -> Vec<ZiDependency> {
        Vec::new()
    }

    /// Dependencies under the current configuration. Defaults to the static
    /// list; override to depend on configuration read through `engine`.
    fn depends_on(&self, engine: &dyn ZiEngine) -> Result<Vec<ZiDependency>> {
        let _ = engine;
        Ok(self.dependencies())
    }

    fn options(&self) -> Vec<ZiOption> {
        Vec::new()
    }

    fn output_kind(&self) -> ZiOutputKind {
        ZiOutputKind::Single
    }

    fn output_schema(&self) -> ZiOutputSchema {
        ZiOutputSchema::Untyped
    }

    fn save_when(&self) -> ZiSaveWhen {
        ZiSaveWhen::Always
    }

    fn timeout(&self) -> Option<Duration> {
        None
    }

    /// External files whose modification invalidates stored output.
    fn watch_files(&self, config: &ZiResolvedConfig) -> Vec<PathBuf> {
        let _ = config;
        Vec::new()
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    fn compute(&self, input: ZiComputeInput) -> anyhow::Result<ZiData>;
}

/// A plugin that passed registration checks, with its declarations cached.
pub struct ZiRegisteredPlugin {
    plugin: Arc<dyn ZiPlugin>,
    name: String,
    version_text: String,
    version: ZiVersion,
    options: Vec<ZiOption>,
    output_kind: ZiOutputKind,
    output_schema: ZiOutputSchema,
    save_when: ZiSaveWhen,
    timeout: Option<Duration>,
}

impl ZiRegisteredPlugin {
    pub fn new(plugin: Arc<dyn ZiPlugin>) -> Result<Self> {
        let name = plugin.provides().to_string();
        if name.is_empty() {
            return Err(ZiError::validation(format!(
                "plugin {} provides an empty name",
                plugin.type_name()
            )));
        }
        validate_identifier("plugin name", &name)?;

        let version_text = plugin.version().to_string();
        let version = ZiVersion::parse(&version_text).map_err(|err| {
            ZiError::validation(format!("plugin '{name}' has an invalid version: {err}"))
        })?;

        let options = plugin.options();
        let mut seen = HashSet::new();
        for option in &options {
            option.check_well_formed(&name)?;
            if !seen.insert(option.name.as_str()) {
                return Err(ZiError::validation(format!(
                    "plugin '{name}' declares option '{}' twice",
                    option.name
                )));
            }
        }

        for dependency in plugin.dependencies() {
            dependency.check_well_formed(&name)?;
        }

        Ok(ZiRegisteredPlugin {
            name,
            version_text,
            version,
            options,
            output_kind: plugin.output_kind(),
            output_schema: plugin.output_schema(),
            save_when: plugin.save_when(),
            timeout: plugin.timeout(),
            plugin,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn plugin(&self) -> &Arc<dyn ZiPlugin> {
        &self.plugin
    }

    pub fn version(&self) -> &ZiVersion {
        &self.version
    }

    /// Version exactly as declared.
    pub fn version_text(&self) -> &str {
        &self.version_text
    }

    pub fn options(&self) -> &[ZiOption] {
        &self.options
    }

    pub fn output_kind(&self) -> ZiOutputKind {
        self.output_kind
    }

    pub fn output_schema(&self) -> &ZiOutputSchema {
        &self.output_schema
    }

    pub fn save_when(&self) -> ZiSaveWhen {
        self.save_when
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

impl fmt::Debug for ZiRegisteredPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZiRegisteredPlugin")
            .field("name", &self.name)
            .field("version", &self.version_text)
            .field("type", &self.plugin.type_name())
            .finish()
    }
}

/// Declarative description of a closure-backed plugin.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZiPluginSpec {
    pub provides: String,
    pub version: String,
    /// Dependency specs such as `raw` or `raw>=1.2`.
    pub depends_on: Vec<String>,
    pub save_when: String,
    pub output_kind: String,
    pub timeout_ms: Option<u64>,
}

impl Default for ZiPluginSpec {
    fn default() -> Self {
        ZiPluginSpec {
            provides: String::new(),
            version: "0.0.0".to_string(),
            depends_on: Vec::new(),
            save_when: "always".to_string(),
            output_kind: "single".to_string(),
            timeout_ms: None,
        }
    }
}

impl ZiPluginSpec {
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

pub type ZiComputeFn = Arc<dyn Fn(ZiComputeInput) -> anyhow::Result<ZiData> + Send + Sync>;
pub type ZiDependsFn =
    Arc<dyn Fn(&dyn ZiEngine) -> Result<Vec<ZiDependency>> + Send + Sync>;

/// Plugin assembled from closures.
#[derive(Clone)]
pub struct ZiFnPlugin {
    provides: String,
    version: String,
    dependencies: Vec<ZiDependency>,
    dynamic_dependencies: Option<ZiDependsFn>,
    options: Vec<ZiOption>,
    output_kind: ZiOutputKind,
    output_schema: ZiOutputSchema,
    save_when: ZiSaveWhen,
    timeout: Option<Duration>,
    watch: Vec<PathBuf>,
    compute: ZiComputeFn,
}

impl ZiFnPlugin {
    pub fn new<F>(provides: impl Into<String>, compute: F) -> Self
    where
        F: Fn(ZiComputeInput) -> anyhow::Result<ZiData> + Send + Sync + 'static,
    {
        ZiFnPlugin {
            provides: provides.into(),
            version: "0.0.0".to_string(),
            dependencies: Vec::new(),
            dynamic_dependencies: None,
            options: Vec::new(),
            output_kind: ZiOutputKind::Single,
            output_schema: ZiOutputSchema::Untyped,
            save_when: ZiSaveWhen::Always,
            timeout: None,
            watch: Vec::new(),
            compute: Arc::new(compute),
        }
    }

    /// Builds a plugin from a declarative spec, rejecting unknown policies.
    pub fn from_spec<F>(spec: ZiPluginSpec, compute: F) -> Result<Self>
    where
        F: Fn(ZiComputeInput) -> anyhow::Result<ZiData> + Send + Sync + 'static,
    {
        let context = |err: ZiError| {
            ZiError::validation(format!("plugin spec '{}': {err}", spec.provides))
        };
        let save_when = spec.save_when.parse::<ZiSaveWhen>().map_err(context)?;
        let output_kind = spec.output_kind.parse::<ZiOutputKind>().map_err(context)?;
        let dependencies = spec
            .depends_on
            .iter()
            .map(|dep| ZiDependency::parse(dep))
            .collect::<Result<Vec<_>>>()
            .map_err(context)?;

        let mut plugin = ZiFnPlugin::new(spec.provides.clone(), compute)
            .version(spec.version.clone())
            .save_when(save_when)
            .output_kind(output_kind);
        plugin.dependencies = dependencies;
        plugin.timeout = spec.timeout_ms.map(Duration::from_millis);
        Ok(plugin)
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn depends(mut self, name: impl Into<String>) -> Self {
        self.dependencies.push(ZiDependency::new(name));
        self
    }

    pub fn dependency(mut self, dependency: ZiDependency) -> Self {
        self.dependencies.push(dependency);
        self
    }

    /// Replaces the static dependency list with one computed at resolution.
    pub fn dynamic_dependencies<F>(mut self, resolve: F) -> Self
    where
        F: Fn(&dyn ZiEngine) -> Result<Vec<ZiDependency>> + Send + Sync + 'static,
    {
        self.dynamic_dependencies = Some(Arc::new(resolve));
        self
    }

    pub fn option(mut self, option: ZiOption) -> Self {
        self.options.push(option);
        self
    }

    pub fn output_kind(mut self, kind: ZiOutputKind) -> Self {
        self.output_kind = kind;
        self
    }

    pub fn output_schema(mut self, schema: ZiOutputSchema) -> Self {
        self.output_schema = schema;
        self
    }

    pub fn save_when(mut self, policy: ZiSaveWhen) -> Self {
        self.save_when = policy;
        self
    }

    pub fn timeout(mut self, limit: Duration) -> Self {
        self.timeout = Some(limit);
        self
    }

    pub fn watch_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.watch.push(path.into());
        self
    }
}

impl ZiPlugin for ZiFnPlugin {
    fn provides(&self) -> &str {
        &self.provides
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn dependencies(&self) -> Vec<ZiDependency> {
        self.dependencies.clone()
    }

    fn depends_on(&self, engine: &dyn ZiEngine) -> Result<Vec<ZiDependency>> {
        match &self.dynamic_dependencies {
            Some(resolve) => resolve(engine),
            None => Ok(self.dependencies.clone()),
        }
    }

    fn options(&self) -> Vec<ZiOption> {
        self.options.clone()
    }

    fn output_kind(&self) -> ZiOutputKind {
        self.output_kind
    }

    fn output_schema(&self) -> ZiOutputSchema {
        self.output_schema.clone()
    }

    fn save_when(&self) -> ZiSaveWhen {
        self.save_when
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    fn watch_files(&self, _config: &ZiResolvedConfig) -> Vec<PathBuf> {
        self.watch.clone()
    }

    fn compute(&self, input: ZiComputeInput) -> anyhow::Result<ZiData> {
        (self.compute)(input)
    }
}

//! Pluggable algorithmers and actioners
//!
//! An [`Algorithmer`] judges a check's measured inputs, an [`Actioner`]
//! performs a remediation step when a check fails. Both are selected by a
//! type string from the configuration. Backends are listed in the factory
//! tables below; adding one means adding a row there, nothing in the
//! scheduler changes.

pub mod python;

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::check::{ActionOutput, CheckOutput, MeasurementResult};
use crate::config::PluginConfig;

/// Measured inputs of a check run, keyed by measurement name
pub type Inputs = BTreeMap<String, MeasurementResult>;

/// Judges measured inputs and reports a pass/fail outcome
///
/// Implementations are shared by every check using the same type and may be
/// invoked concurrently; each call gets its own working directory. A call
/// must return promptly once `cancel` fires.
#[async_trait]
pub trait Algorithmer: Send + Sync {
    /// Run `algorithm` and return its outcome
    ///
    /// The returned output carries timestamp, combined output and return
    /// code; the caller fills in the check name and action keys.
    async fn apply(
        &self,
        cancel: &CancellationToken,
        algorithm: &str,
        params: &HashMap<String, String>,
        inputs: &Inputs,
        working_dir: &Path,
    ) -> anyhow::Result<CheckOutput>;
}

/// Performs a remediation step for a failed check
#[async_trait]
pub trait Actioner: Send + Sync {
    /// Run `action`, handing it the failing run's diagnostic text
    async fn act(
        &self,
        cancel: &CancellationToken,
        action: &str,
        diagnostic: &str,
        params: &HashMap<String, String>,
        working_dir: &Path,
    ) -> anyhow::Result<ActionOutput>;
}

/// Plugins of one kind, keyed by type name
pub struct PluginRegistry<T: ?Sized> {
    plugins: HashMap<String, Arc<T>>,
}

impl<T: ?Sized> Default for PluginRegistry<T> {
    fn default() -> Self {
        Self {
            plugins: HashMap::new(),
        }
    }
}

impl<T: ?Sized> PluginRegistry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, kind: impl Into<String>, plugin: Arc<T>) {
        self.plugins.insert(kind.into(), plugin);
    }

    pub fn get(&self, kind: &str) -> Option<Arc<T>> {
        self.plugins.get(kind).cloned()
    }
}

pub type AlgorithmerRegistry = PluginRegistry<dyn Algorithmer>;
pub type ActionerRegistry = PluginRegistry<dyn Actioner>;

type AlgorithmerFactory = fn(&PluginConfig) -> Arc<dyn Algorithmer>;
type ActionerFactory = fn(&PluginConfig) -> Arc<dyn Actioner>;

const ALGORITHMER_FACTORIES: &[(&str, AlgorithmerFactory)] =
    &[("python", python::build_algorithmer as AlgorithmerFactory)];

const ACTIONER_FACTORIES: &[(&str, ActionerFactory)] =
    &[("python", python::build_actioner as ActionerFactory)];

pub fn is_supported_algorithmer(kind: &str) -> bool {
    ALGORITHMER_FACTORIES.iter().any(|(name, _)| *name == kind)
}

pub fn is_supported_actioner(kind: &str) -> bool {
    ACTIONER_FACTORIES.iter().any(|(name, _)| *name == kind)
}

/// Build one algorithmer per declared type
///
/// Unknown types are skipped; configuration validation rejects them first.
pub fn build_algorithmers(configs: &[PluginConfig]) -> AlgorithmerRegistry {
    let mut registry = AlgorithmerRegistry::new();
    for config in configs {
        if let Some((_, factory)) = ALGORITHMER_FACTORIES
            .iter()
            .find(|(name, _)| *name == config.kind)
        {
            debug!("registering algorithmer '{}'", config.kind);
            registry.register(config.kind.clone(), factory(config));
        }
    }
    registry
}

/// Build one actioner per declared type
pub fn build_actioners(configs: &[PluginConfig]) -> ActionerRegistry {
    let mut registry = ActionerRegistry::new();
    for config in configs {
        if let Some((_, factory)) = ACTIONER_FACTORIES
            .iter()
            .find(|(name, _)| *name == config.kind)
        {
            debug!("registering actioner '{}'", config.kind);
            registry.register(config.kind.clone(), factory(config));
        }
    }
    registry
}

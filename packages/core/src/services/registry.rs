//! Strategy Dispatcher
//!
//! Resolves a strategy identifier to an implementation, checks that it covers
//! the whole operation catalogue, lets it normalize the registration options,
//! and binds the result to a record type.
//!
//! # Binding Semantics
//!
//! A [`Binding`] is immutable and shared behind an `Arc`. Re-registering a
//! record type replaces the table entry, so new [`Forest`] handles see the new
//! configuration while handles obtained earlier keep the binding they started
//! with.
//!
//! # Examples
//!
//! ```rust
//! use hierarchy_core::db::MemoryStore;
//! use hierarchy_core::services::Registry;
//! use serde_json::json;
//!
//! let registry = Registry::new();
//! registry
//!     .register_json("Page", json!({"strategy": "path", "scope": "site_id"}))
//!     .unwrap();
//!
//! let store = MemoryStore::new();
//! let pages = registry.forest("Page", &store).unwrap();
//! assert_eq!(pages.config().strategy, "materialized_path");
//! ```

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use super::error::ConfigurationError;
use super::forest::Forest;
use crate::db::RecordStore;
use crate::models::{HierarchyConfig, HierarchyOptions};
use crate::strategies::{HierarchyStrategy, StrategyKind};

/// Strategy used when the options don't name one
pub const DEFAULT_STRATEGY: &str = "tree";

static GLOBAL: Lazy<Registry> = Lazy::new(Registry::new);

/// A strategy given by name or as an implementation object
#[derive(Clone)]
pub enum StrategyRef {
    Named(String),
    Object(Arc<dyn HierarchyStrategy>),
}

impl fmt::Debug for StrategyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyRef::Named(name) => f.debug_tuple("Named").field(name).finish(),
            StrategyRef::Object(strategy) => f.debug_tuple("Object").field(&strategy.name()).finish(),
        }
    }
}

impl From<&str> for StrategyRef {
    fn from(name: &str) -> Self {
        StrategyRef::Named(name.to_string())
    }
}

impl From<String> for StrategyRef {
    fn from(name: String) -> Self {
        StrategyRef::Named(name)
    }
}

impl From<StrategyKind> for StrategyRef {
    fn from(kind: StrategyKind) -> Self {
        StrategyRef::Named(kind.name().to_string())
    }
}

impl From<Arc<dyn HierarchyStrategy>> for StrategyRef {
    fn from(strategy: Arc<dyn HierarchyStrategy>) -> Self {
        StrategyRef::Object(strategy)
    }
}

/// Named custom strategies, consulted before the built-in tags
#[derive(Default)]
pub struct StrategyRegistry {
    custom: HashMap<String, Arc<dyn HierarchyStrategy>>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `strategy` resolvable as `name` (normalized like the built-in names)
    pub fn register(&mut self, name: &str, strategy: Arc<dyn HierarchyStrategy>) -> Option<Arc<dyn HierarchyStrategy>> {
        self.custom.insert(StrategyKind::normalize(name), strategy)
    }

    pub fn resolve(&self, strategy: &StrategyRef) -> Result<Arc<dyn HierarchyStrategy>, ConfigurationError> {
        match strategy {
            StrategyRef::Object(object) => Ok(Arc::clone(object)),
            StrategyRef::Named(name) => match self.custom.get(&StrategyKind::normalize(name)) {
                Some(custom) => Ok(Arc::clone(custom)),
                None => Ok(StrategyKind::from_str(name)?.instantiate()),
            },
        }
    }
}

/// Resolved configuration and behavior for one record type
#[derive(Debug)]
pub struct Binding {
    pub record_type: String,
    pub config: Arc<HierarchyConfig>,
    pub strategy: Arc<dyn HierarchyStrategy>,
}

/// Record type → binding table
pub struct Registry {
    strategies: RwLock<StrategyRegistry>,
    bindings: RwLock<HashMap<String, Arc<Binding>>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Isolated registry (tests, embedded use)
    pub fn new() -> Self {
        Self {
            strategies: RwLock::new(StrategyRegistry::new()),
            bindings: RwLock::new(HashMap::new()),
        }
    }

    /// The process-wide registry
    pub fn global() -> &'static Registry {
        &GLOBAL
    }

    /// Make a custom strategy resolvable by name
    pub fn register_strategy(&self, name: &str, strategy: Arc<dyn HierarchyStrategy>) {
        if self.strategies.write().register(name, strategy).is_some() {
            tracing::info!("Replaced custom hierarchy strategy {}", name);
        }
    }

    /// Bind `record_type` using the strategy named in `options` (default `tree`)
    pub fn register(&self, record_type: &str, options: HierarchyOptions) -> Result<Arc<Binding>, ConfigurationError> {
        let strategy = options
            .strategy
            .clone()
            .unwrap_or_else(|| DEFAULT_STRATEGY.to_string());
        self.register_with(record_type, strategy, options)
    }

    /// Bind `record_type` from free-form JSON options
    pub fn register_json(&self, record_type: &str, options: Value) -> Result<Arc<Binding>, ConfigurationError> {
        let options = HierarchyOptions::from_value(options)
            .map_err(|e| ConfigurationError::InvalidOptions(e.to_string()))?;
        self.register(record_type, options)
    }

    /// Bind `record_type` to an explicit strategy
    ///
    /// # Errors
    ///
    /// - `UnknownStrategy` when a name resolves to nothing
    /// - `MissingOperations` when the strategy's declared operations have gaps
    /// - `InvalidColumn` / `InvalidOptions` from the strategy's option processing
    pub fn register_with(
        &self,
        record_type: &str,
        strategy: impl Into<StrategyRef>,
        options: HierarchyOptions,
    ) -> Result<Arc<Binding>, ConfigurationError> {
        let strategy = self.strategies.read().resolve(&strategy.into())?;

        let missing = strategy.operations().missing();
        if !missing.is_empty() {
            return Err(ConfigurationError::missing_operations(strategy.name(), missing));
        }

        let config = strategy.process_options(record_type, &options)?;
        let binding = Arc::new(Binding {
            record_type: record_type.to_string(),
            config: Arc::new(config),
            strategy,
        });

        let previous = self
            .bindings
            .write()
            .insert(record_type.to_string(), Arc::clone(&binding));
        match previous {
            Some(old) => tracing::info!(
                "Rebound {} from {} to {}",
                record_type,
                old.strategy.name(),
                binding.strategy.name()
            ),
            None => tracing::info!("Registered {} as {}", record_type, binding.strategy.name()),
        }

        Ok(binding)
    }

    /// Current binding for `record_type`
    pub fn binding(&self, record_type: &str) -> Result<Arc<Binding>, ConfigurationError> {
        self.bindings
            .read()
            .get(record_type)
            .cloned()
            .ok_or_else(|| ConfigurationError::unregistered(record_type))
    }

    /// Hierarchy handle over `store` using the current binding
    pub fn forest<'s>(&self, record_type: &str, store: &'s dyn RecordStore) -> Result<Forest<'s>, ConfigurationError> {
        Ok(Forest::new(self.binding(record_type)?, store))
    }

    /// Registered record types, sorted
    pub fn record_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.bindings.read().keys().cloned().collect();
        types.sort();
        types
    }

    /// Remove a binding; existing handles keep working
    pub fn unregister(&self, record_type: &str) -> bool {
        self.bindings.write().remove(record_type).is_some()
    }
}

#[cfg(test)]
#[path = "registry_test.rs"]
mod registry_test;

//! Hierarchy Core
//!
//! Interchangeable strategies for storing and querying tree-structured records
//! inside a single flat table.
//!
//! # Architecture
//!
//! - **Strategy per record type**: adjacency list, materialized path or nested
//!   set, chosen at registration and swappable without touching query code
//! - **Uniform interface**: every strategy answers the same operation catalogue
//!   (ancestors, descendants, siblings, leaves, level, ...)
//! - **Store-agnostic**: all persistence goes through the [`db::RecordStore`]
//!   trait; [`db::MemoryStore`] is the in-process reference backend
//! - **Cycle-safe writes**: parent changes are validated before anything is
//!   written, and structural cascades run inside one store transaction
//!
//! # Modules
//!
//! - [`models`] - nodes, rows, options and query primitives
//! - [`strategies`] - the hierarchy contract and the three built-in encodings
//! - [`services`] - registry, bound `Forest` handles and validation
//! - [`db`] - record store contract, in-memory store and metrics
//!
//! # Examples
//!
//! ```rust
//! use hierarchy_core::db::MemoryStore;
//! use hierarchy_core::models::{HierarchyOptions, Node};
//! use hierarchy_core::services::Registry;
//!
//! let registry = Registry::new();
//! registry
//!     .register("Category", HierarchyOptions::new().with_strategy("path"))
//!     .unwrap();
//!
//! let store = MemoryStore::new();
//! let categories = registry.forest("Category", &store).unwrap();
//!
//! let root = categories.create(Node::new().with("name", "root")).unwrap();
//! let child = categories
//!     .create(Node::new().with("name", "child").with("parent_id", root.id("id").unwrap()))
//!     .unwrap();
//!
//! assert_eq!(categories.ancestor_ids(&child).unwrap(), vec![1]);
//! assert_eq!(categories.descendant_ids(&root).unwrap(), vec![2]);
//! assert_eq!(categories.level(&child).unwrap(), 1);
//! ```

pub mod db;
pub mod models;
pub mod services;
pub mod strategies;

// Re-export commonly used types
pub use db::{MemoryStore, RecordStore, StoreError};
pub use models::{HierarchyOptions, Node, NodeId, Row};
pub use services::{ConfigurationError, Forest, HierarchyError, Registry, SaveResult};
pub use strategies::{HierarchyStrategy, Operation, OperationSet, StrategyKind};

//! Data Models
//!
//! - [`node`] - `Node`, rows, transient flags and validation errors
//! - [`query`] - predicates, sort expressions and batch assignments
//! - [`config`] - registration options and the resolved `HierarchyConfig`

pub mod config;
pub mod node;
pub mod query;

pub use config::{
    BoundColumns, ColumnToggle, DeletePolicy, HierarchyConfig, HierarchyOptions, OneOrMany,
    PathColumns,
};
pub use node::{FieldError, Node, NodeId, Row, TransientFlags, ValidationErrors};
pub use query::{Assignment, CompareOp, Expr, OrderKey, Predicate};

//! Service Layer Error Types
//!
//! This module defines the registration-time [`ConfigurationError`] and the
//! top-level [`HierarchyError`] returned by hierarchy operations.
//!
//! Validation failures are not errors here: a rejected save is the
//! [`SaveResult::Invalid`](super::SaveResult::Invalid) value. Only
//! [`Forest::save_or_fail`](super::Forest::save_or_fail) turns one into
//! [`HierarchyError::Validation`].

use crate::db::StoreError;
use crate::models::{NodeId, ValidationErrors};
use crate::strategies::Operation;
use thiserror::Error;

/// Registration failures; fatal to the registration, nothing is bound
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// Strategy name matches neither a built-in nor a registered strategy
    #[error("Unknown hierarchy strategy: {name}")]
    UnknownStrategy { name: String },

    /// Strategy declares an incomplete operation set
    #[error("{strategy} must implement the following hierarchy operations: {}", to_sentence(.missing))]
    MissingOperations {
        strategy: String,
        missing: Vec<Operation>,
    },

    /// Column option is not a plain identifier
    #[error("Invalid column name for {option}: {value:?}")]
    InvalidColumn { option: String, value: String },

    /// Options that can't be applied to the chosen strategy
    #[error("Invalid hierarchy options: {0}")]
    InvalidOptions(String),

    /// Lookup of a record type that was never registered
    #[error("No hierarchy registered for {record_type}")]
    UnregisteredRecordType { record_type: String },
}

impl ConfigurationError {
    /// Create an unknown strategy error
    pub fn unknown_strategy(name: impl Into<String>) -> Self {
        Self::UnknownStrategy { name: name.into() }
    }

    /// Create a missing operations error; the list is reported in name order
    pub fn missing_operations(strategy: impl Into<String>, mut missing: Vec<Operation>) -> Self {
        missing.sort();
        missing.dedup();
        Self::MissingOperations {
            strategy: strategy.into(),
            missing,
        }
    }

    /// Create an invalid column error
    pub fn invalid_column(option: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidColumn {
            option: option.into(),
            value: value.into(),
        }
    }

    /// Create an unregistered record type error
    pub fn unregistered(record_type: impl Into<String>) -> Self {
        Self::UnregisteredRecordType {
            record_type: record_type.into(),
        }
    }
}

/// `"a"`, `"a and b"`, `"a, b and c"`
fn to_sentence(operations: &[Operation]) -> String {
    let names: Vec<&str> = operations.iter().map(|op| op.name()).collect();
    match names.as_slice() {
        [] => String::new(),
        [only] => only.to_string(),
        [init @ .., last] => format!("{} and {}", init.join(", "), last),
    }
}

/// Hierarchy operation errors
#[derive(Error, Debug)]
pub enum HierarchyError {
    /// Registration or binding problem
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// Save rejected by validation (only from `save_or_fail`)
    #[error("{0}")]
    Validation(#[from] ValidationErrors),

    /// Record store failure, propagated unchanged
    #[error("Store operation failed: {0}")]
    Store(#[from] StoreError),

    /// Operation needs a saved node
    #[error("Cannot {operation} a node that has not been saved")]
    NotPersisted { operation: &'static str },

    /// Node lookup by id failed
    #[error("Node not found: {id}")]
    NodeNotFound { id: NodeId },

    /// Stored parent references form a loop or an impossible chain
    #[error("Corrupt hierarchy: {0}")]
    CorruptHierarchy(String),
}

impl HierarchyError {
    /// Create a node not found error
    pub fn node_not_found(id: NodeId) -> Self {
        Self::NodeNotFound { id }
    }

    /// Create a not persisted error
    pub fn not_persisted(operation: &'static str) -> Self {
        Self::NotPersisted { operation }
    }

    /// Create a corrupt hierarchy error
    pub fn corrupt(msg: impl Into<String>) -> Self {
        Self::CorruptHierarchy(msg.into())
    }
}

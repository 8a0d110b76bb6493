//! Store Error Types
//!
//! This module defines the error type returned by every [`RecordStore`](super::RecordStore)
//! operation. The hierarchy core propagates these unchanged; retry policy belongs
//! to the backend.

use crate::models::NodeId;
use thiserror::Error;

/// Record store operation errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// Update targeted a row that does not exist
    #[error("Record not found: {id}")]
    NotFound { id: NodeId },

    /// Insert reused an existing primary key
    #[error("Duplicate primary key: {id}")]
    DuplicateKey { id: NodeId },

    /// Commit or rollback without a matching begin
    #[error("No active transaction to {action}")]
    NoActiveTransaction { action: &'static str },

    /// Row could not be stored as given
    #[error("Invalid row: {0}")]
    InvalidRow(String),

    /// Backend-specific failure
    #[error("Store backend failed: {0}")]
    Backend(#[from] anyhow::Error),
}

impl StoreError {
    /// Create a not found error
    pub fn not_found(id: NodeId) -> Self {
        Self::NotFound { id }
    }

    /// Create a duplicate key error
    pub fn duplicate_key(id: NodeId) -> Self {
        Self::DuplicateKey { id }
    }

    /// Create an invalid row error
    pub fn invalid_row(msg: impl Into<String>) -> Self {
        Self::InvalidRow(msg.into())
    }
}

//! RecordStore Trait - Persistence Abstraction Layer
//!
//! This module defines the `RecordStore` trait: the relational surface the
//! hierarchy strategies need from whatever actually holds the rows. Column
//! mapping, SQL generation and schema management stay on the far side of it.
//!
//! # Design Decisions
//!
//! 1. **Blocking**: every call completes or fails; there are no suspension points
//! 2. **Ownership Semantics**: inserts and updates take owned rows, reads return
//!    owned rows
//! 3. **Lazy range queries**: `range_query` hands back an iterator so backends can
//!    stream cursors
//! 4. **Scoped transactions**: callers acquire a [`TransactionGuard`], which rolls
//!    back on drop unless committed
//!
//! # Examples
//!
//! ```rust
//! use hierarchy_core::db::{MemoryStore, RecordStore, TransactionGuard};
//! use hierarchy_core::models::{OrderKey, Predicate};
//! use serde_json::json;
//!
//! # fn main() -> Result<(), hierarchy_core::db::StoreError> {
//! let store = MemoryStore::new();
//! let guard = TransactionGuard::begin(&store)?;
//! let root = store.create(json!({"parent_id": null}).as_object().unwrap().clone())?;
//! store.create(json!({"parent_id": root}).as_object().unwrap().clone())?;
//! guard.commit()?;
//!
//! let children: Vec<_> = store
//!     .range_query(&Predicate::eq("parent_id", root), &[OrderKey::asc("id")])?
//!     .collect::<Result<_, _>>()?;
//! assert_eq!(children.len(), 1);
//! # Ok(())
//! # }
//! ```

use super::error::StoreError;
use crate::models::{Assignment, NodeId, OrderKey, Predicate, Row};

/// Lazy sequence of rows produced by a range query
pub type RowIter<'a> = Box<dyn Iterator<Item = Result<Row, StoreError>> + 'a>;

/// Abstraction over the relational table holding one row per node
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; all methods take `&self` and use
/// interior mutability.
///
/// # Method Categories
///
/// - **Core CRUD**: `create`, `read`, `update`, `delete`
/// - **Set operations**: `range_query`, `batch_update`, `delete_where`
/// - **Transactions**: `begin_transaction`, `commit_transaction`, `rollback_transaction`
pub trait RecordStore: Send + Sync {
    /// Insert a row, assigning the primary key when it is absent or null
    ///
    /// # Errors
    ///
    /// Returns `DuplicateKey` when the row carries a primary key already in use.
    fn create(&self, row: Row) -> Result<NodeId, StoreError>;

    /// Read a row by primary key (`Ok(None)` when it doesn't exist)
    fn read(&self, id: NodeId) -> Result<Option<Row>, StoreError>;

    /// Sparse update: only the given columns are written
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when no row has this primary key.
    fn update(&self, id: NodeId, changes: Row) -> Result<(), StoreError>;

    /// Delete a row by primary key; returns whether it existed
    fn delete(&self, id: NodeId) -> Result<bool, StoreError>;

    /// Delete every row matching `predicate`; returns the number removed
    fn delete_where(&self, predicate: &Predicate) -> Result<usize, StoreError>;

    /// Rows matching `predicate`, sorted by `order` then by primary key
    fn range_query(&self, predicate: &Predicate, order: &[OrderKey])
        -> Result<RowIter<'_>, StoreError>;

    /// Apply `changes` to every row matching `predicate`; returns the number updated
    fn batch_update(&self, predicate: &Predicate, changes: &[Assignment])
        -> Result<usize, StoreError>;

    /// Open a transaction (nested calls open savepoints)
    fn begin_transaction(&self) -> Result<(), StoreError>;

    /// Commit the innermost open transaction
    fn commit_transaction(&self) -> Result<(), StoreError>;

    /// Roll back the innermost open transaction
    fn rollback_transaction(&self) -> Result<(), StoreError>;
}

/// Scoped transaction: rolls back on drop unless [`commit`](Self::commit) was called
#[must_use = "dropping the guard rolls the transaction back"]
pub struct TransactionGuard<'s> {
    store: &'s dyn RecordStore,
    finished: bool,
}

impl<'s> TransactionGuard<'s> {
    /// Begin a transaction on `store`
    pub fn begin(store: &'s dyn RecordStore) -> Result<Self, StoreError> {
        store.begin_transaction()?;
        Ok(Self {
            store,
            finished: false,
        })
    }

    /// Commit and release the guard
    pub fn commit(mut self) -> Result<(), StoreError> {
        self.finished = true;
        self.store.commit_transaction()
    }

    /// Roll back explicitly and release the guard
    pub fn rollback(mut self) -> Result<(), StoreError> {
        self.finished = true;
        self.store.rollback_transaction()
    }
}

impl Drop for TransactionGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(e) = self.store.rollback_transaction() {
                tracing::warn!("Failed to roll back abandoned transaction: {}", e);
            }
        }
    }
}

//! Persistence Layer
//!
//! The hierarchy core never talks to a database directly; every read and write
//! goes through the [`RecordStore`] trait:
//!
//! - [`record_store`] - the trait and the scoped [`TransactionGuard`]
//! - [`memory_store`] - in-memory reference backend
//! - [`metrics`] - per-operation call counters
//!
//! # Architecture
//!
//! A store owns one table of rows for one record type. Hierarchy columns are
//! plain columns to it; strategies express their reads and writes as
//! [`Predicate`](crate::models::Predicate), [`OrderKey`](crate::models::OrderKey)
//! and [`Assignment`](crate::models::Assignment) values that a SQL backend
//! translates one-to-one.

mod error;
pub mod memory_store;
pub mod metrics;
pub mod record_store;

pub use error::StoreError;
pub use memory_store::MemoryStore;
pub use metrics::{OperationStats, StoreMetrics, StoreOperation};
pub use record_store::{RecordStore, RowIter, TransactionGuard};

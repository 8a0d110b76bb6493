//! Hierarchy Services
//!
//! This module contains the layer callers work with:
//!
//! - `Registry` - resolves strategies and binds them to record types
//! - `Forest` - one record type's hierarchy over one store (save pipeline, queries)
//! - `validator` - parent-reference checks shared by every strategy
//!
//! Services coordinate between the strategies and the record store, wrapping
//! every structural write in a store transaction.

pub mod validator;

mod error;
mod forest;
mod registry;

pub use error::{ConfigurationError, HierarchyError};
pub use forest::{Forest, SaveResult};
pub use registry::{Binding, Registry, StrategyRef, StrategyRegistry, DEFAULT_STRATEGY};

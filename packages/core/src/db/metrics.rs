//! Store Operation Metrics
//!
//! Counters for every call a hierarchy strategy makes against a
//! [`RecordStore`](super::RecordStore). Tests use them to pin query counts
//! (e.g. one batch update per level of a path cascade); benches use the report.
//!
//! # Usage
//!
//! ```rust
//! use hierarchy_core::db::metrics::{StoreMetrics, StoreOperation};
//! use std::time::Duration;
//!
//! let metrics = StoreMetrics::new();
//! metrics.record(StoreOperation::RangeQuery, Duration::from_micros(40));
//! metrics.record(StoreOperation::BatchUpdate, Duration::from_micros(90));
//!
//! assert_eq!(metrics.count(StoreOperation::RangeQuery), 1);
//! println!("{}", metrics.generate_report("memory"));
//! ```

use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Store calls tracked by [`StoreMetrics`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreOperation {
    Create,
    Read,
    Update,
    Delete,
    DeleteWhere,
    RangeQuery,
    BatchUpdate,
    Begin,
    Commit,
    Rollback,
}

impl StoreOperation {
    pub const ALL: [StoreOperation; 10] = [
        StoreOperation::Create,
        StoreOperation::Read,
        StoreOperation::Update,
        StoreOperation::Delete,
        StoreOperation::DeleteWhere,
        StoreOperation::RangeQuery,
        StoreOperation::BatchUpdate,
        StoreOperation::Begin,
        StoreOperation::Commit,
        StoreOperation::Rollback,
    ];

    pub fn name(self) -> &'static str {
        match self {
            StoreOperation::Create => "create",
            StoreOperation::Read => "read",
            StoreOperation::Update => "update",
            StoreOperation::Delete => "delete",
            StoreOperation::DeleteWhere => "delete_where",
            StoreOperation::RangeQuery => "range_query",
            StoreOperation::BatchUpdate => "batch_update",
            StoreOperation::Begin => "begin_transaction",
            StoreOperation::Commit => "commit_transaction",
            StoreOperation::Rollback => "rollback_transaction",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for StoreOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Aggregated statistics for one operation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationStats {
    /// Operation name
    pub operation: StoreOperation,
    /// Number of calls
    pub count: u64,
    /// Total time spent in the store
    pub total: Duration,
    /// Average duration per call
    pub average: Duration,
}

/// Lock-free per-operation counters
#[derive(Debug, Default)]
pub struct StoreMetrics {
    counts: [AtomicU64; 10],
    nanos: [AtomicU64; 10],
}

impl StoreMetrics {
    /// Create a collector with every counter at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one call and its duration
    pub fn record(&self, operation: StoreOperation, elapsed: Duration) {
        let index = operation.index();
        self.counts[index].fetch_add(1, Ordering::Relaxed);
        self.nanos[index].fetch_add(elapsed.as_nanos() as u64, Ordering::Relaxed);
    }

    /// Number of recorded calls of `operation`
    pub fn count(&self, operation: StoreOperation) -> u64 {
        self.counts[operation.index()].load(Ordering::Relaxed)
    }

    /// Calls across every operation
    pub fn total_calls(&self) -> u64 {
        StoreOperation::ALL.iter().map(|op| self.count(*op)).sum()
    }

    /// Statistics for one operation
    ///
    /// Returns None if the operation was never recorded
    pub fn stats_for(&self, operation: StoreOperation) -> Option<OperationStats> {
        let count = self.count(operation);
        if count == 0 {
            return None;
        }

        let total = Duration::from_nanos(self.nanos[operation.index()].load(Ordering::Relaxed));
        Some(OperationStats {
            operation,
            count,
            total,
            average: total / count as u32,
        })
    }

    /// Statistics for every recorded operation
    pub fn snapshot(&self) -> Vec<OperationStats> {
        StoreOperation::ALL
            .iter()
            .filter_map(|op| self.stats_for(*op))
            .collect()
    }

    /// Generate a formatted report
    pub fn generate_report(&self, backend_name: &str) -> String {
        let mut report = String::new();
        report.push_str("=== Store Operation Report ===\n");
        report.push_str(&format!("Backend: {}\n", backend_name));
        report.push_str(&format!("Total calls recorded: {}\n\n", self.total_calls()));

        for stats in self.snapshot() {
            report.push_str(&format!(
                "{:<22} {:>8} calls | avg {:.3}ms | total {:.2}ms\n",
                stats.operation.name(),
                stats.count,
                stats.average.as_secs_f64() * 1000.0,
                stats.total.as_secs_f64() * 1000.0
            ));
        }

        report
    }

    /// Zero every counter
    pub fn reset(&self) {
        for index in 0..StoreOperation::ALL.len() {
            self.counts[index].store(0, Ordering::Relaxed);
            self.nanos[index].store(0, Ordering::Relaxed);
        }
    }
}

//! In-Memory RecordStore
//!
//! A `BTreeMap`-backed [`RecordStore`] that interprets [`Predicate`],
//! [`OrderKey`] and [`Assignment`] directly. It backs the test suite and
//! benches, and doubles as the reference for what a SQL backend must do.
//!
//! Transactions are snapshot-based: `begin_transaction` pushes a copy of the
//! table, `rollback_transaction` restores it, so nested transactions behave as
//! savepoints.

use parking_lot::RwLock;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Instant;

use super::error::StoreError;
use super::metrics::{StoreMetrics, StoreOperation};
use super::record_store::{RecordStore, RowIter};
use crate::models::query::{compare_values, values_equal};
use crate::models::{Assignment, NodeId, OrderKey, Predicate, Row};

#[derive(Debug, Clone)]
struct TableState {
    rows: BTreeMap<NodeId, Row>,
    next_id: NodeId,
}

impl Default for TableState {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
            next_id: 1,
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    table: TableState,
    snapshots: Vec<TableState>,
}

/// Thread-safe in-memory table
#[derive(Debug)]
pub struct MemoryStore {
    primary_key: String,
    inner: RwLock<Inner>,
    metrics: StoreMetrics,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Empty store keyed by `id`
    pub fn new() -> Self {
        Self::with_primary_key("id")
    }

    /// Empty store keyed by a custom primary key column
    pub fn with_primary_key(primary_key: impl Into<String>) -> Self {
        Self {
            primary_key: primary_key.into(),
            inner: RwLock::new(Inner::default()),
            metrics: StoreMetrics::new(),
        }
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    /// Call counters for every store operation
    pub fn metrics(&self) -> &StoreMetrics {
        &self.metrics
    }

    /// Number of stored rows
    pub fn len(&self) -> usize {
        self.inner.read().table.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of open (possibly nested) transactions
    pub fn transaction_depth(&self) -> usize {
        self.inner.read().snapshots.len()
    }

    /// Copy of every row in primary key order
    pub fn rows(&self) -> Vec<Row> {
        self.inner.read().table.rows.values().cloned().collect()
    }

    fn timed<T>(&self, operation: StoreOperation, f: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let result = f();
        self.metrics.record(operation, start.elapsed());
        result
    }

    fn primary_key_of(&self, row: &Row) -> Result<Option<NodeId>, StoreError> {
        match row.get(&self.primary_key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => value.as_i64().map(Some).ok_or_else(|| {
                StoreError::invalid_row(format!(
                    "primary key {} must be an integer, got {}",
                    self.primary_key, value
                ))
            }),
        }
    }
}

/// Predicate interpreter over one table state
struct Evaluator<'a> {
    primary_key: &'a str,
    referenced: HashMap<&'a str, HashSet<NodeId>>,
}

impl<'a> Evaluator<'a> {
    fn new(primary_key: &'a str, predicate: &'a Predicate, table: &TableState) -> Self {
        let mut foreign_keys = Vec::new();
        collect_foreign_keys(predicate, &mut foreign_keys);

        let referenced = foreign_keys
            .into_iter()
            .map(|foreign_key| {
                let ids = table
                    .rows
                    .values()
                    .filter_map(|row| row.get(foreign_key).and_then(Value::as_i64))
                    .collect();
                (foreign_key, ids)
            })
            .collect();

        Self {
            primary_key,
            referenced,
        }
    }

    fn matches(&self, predicate: &Predicate, row: &Row) -> bool {
        let column = |name: &str| column_value(row, name);
        match predicate {
            Predicate::All => true,
            Predicate::Eq(name, Value::Null) => column(name).is_null(),
            Predicate::Eq(name, value) => values_equal(column(name), value),
            Predicate::Ne(name, Value::Null) => !column(name).is_null(),
            Predicate::Ne(name, value) => {
                let current = column(name);
                !current.is_null() && !values_equal(current, value)
            }
            Predicate::In(name, values) => {
                let current = column(name);
                !current.is_null() && values.iter().any(|v| values_equal(current, v))
            }
            Predicate::Compare(name, op, value) => {
                let current = column(name);
                !current.is_null() && !value.is_null() && op.holds(compare_values(current, value))
            }
            Predicate::Prefix(name, prefix) => column(name)
                .as_str()
                .is_some_and(|text| text.starts_with(prefix.as_str())),
            Predicate::NoReferencingRows { foreign_key } => {
                match column(self.primary_key).as_i64() {
                    Some(id) => !self
                        .referenced
                        .get(foreign_key.as_str())
                        .is_some_and(|ids| ids.contains(&id)),
                    None => true,
                }
            }
            Predicate::And(parts) => parts.iter().all(|p| self.matches(p, row)),
            Predicate::Or(parts) => parts.iter().any(|p| self.matches(p, row)),
            Predicate::Not(inner) => !self.matches(inner, row),
        }
    }

    fn matching_ids(&self, predicate: &Predicate, table: &TableState) -> Vec<NodeId> {
        table
            .rows
            .iter()
            .filter(|(_, row)| self.matches(predicate, row))
            .map(|(id, _)| *id)
            .collect()
    }
}

static NULL: Value = Value::Null;

fn column_value<'r>(row: &'r Row, name: &str) -> &'r Value {
    row.get(name).unwrap_or(&NULL)
}

fn collect_foreign_keys<'a>(predicate: &'a Predicate, out: &mut Vec<&'a str>) {
    match predicate {
        Predicate::NoReferencingRows { foreign_key } => out.push(foreign_key),
        Predicate::And(parts) | Predicate::Or(parts) => {
            for part in parts {
                collect_foreign_keys(part, out);
            }
        }
        Predicate::Not(inner) => collect_foreign_keys(inner, out),
        _ => {}
    }
}

impl RecordStore for MemoryStore {
    fn create(&self, mut row: Row) -> Result<NodeId, StoreError> {
        self.timed(StoreOperation::Create, || {
            let requested = self.primary_key_of(&row)?;
            let mut inner = self.inner.write();
            let table = &mut inner.table;

            let id = match requested {
                Some(id) if table.rows.contains_key(&id) => {
                    return Err(StoreError::duplicate_key(id));
                }
                Some(id) => id,
                None => table.next_id,
            };
            table.next_id = table.next_id.max(id + 1);

            row.insert(self.primary_key.clone(), Value::from(id));
            table.rows.insert(id, row);
            Ok(id)
        })
    }

    fn read(&self, id: NodeId) -> Result<Option<Row>, StoreError> {
        self.timed(StoreOperation::Read, || {
            Ok(self.inner.read().table.rows.get(&id).cloned())
        })
    }

    fn update(&self, id: NodeId, changes: Row) -> Result<(), StoreError> {
        self.timed(StoreOperation::Update, || {
            if let Some(new_id) = self.primary_key_of(&changes)? {
                if new_id != id {
                    return Err(StoreError::invalid_row(format!(
                        "cannot change primary key {} to {}",
                        id, new_id
                    )));
                }
            }

            let mut inner = self.inner.write();
            let row = inner
                .table
                .rows
                .get_mut(&id)
                .ok_or_else(|| StoreError::not_found(id))?;
            row.extend(changes);
            Ok(())
        })
    }

    fn delete(&self, id: NodeId) -> Result<bool, StoreError> {
        self.timed(StoreOperation::Delete, || {
            Ok(self.inner.write().table.rows.remove(&id).is_some())
        })
    }

    fn delete_where(&self, predicate: &Predicate) -> Result<usize, StoreError> {
        self.timed(StoreOperation::DeleteWhere, || {
            let mut inner = self.inner.write();
            let evaluator = Evaluator::new(&self.primary_key, predicate, &inner.table);
            let ids = evaluator.matching_ids(predicate, &inner.table);
            for id in &ids {
                inner.table.rows.remove(id);
            }
            tracing::trace!("delete_where removed {} rows", ids.len());
            Ok(ids.len())
        })
    }

    fn range_query(
        &self,
        predicate: &Predicate,
        order: &[OrderKey],
    ) -> Result<RowIter<'_>, StoreError> {
        self.timed(StoreOperation::RangeQuery, || {
            let inner = self.inner.read();
            let evaluator = Evaluator::new(&self.primary_key, predicate, &inner.table);
            let mut rows: Vec<(NodeId, Row)> = inner
                .table
                .rows
                .iter()
                .filter(|(_, row)| evaluator.matches(predicate, row))
                .map(|(id, row)| (*id, row.clone()))
                .collect();

            rows.sort_by(|(a_id, a), (b_id, b)| {
                order
                    .iter()
                    .map(|key| key.compare(a, b))
                    .find(|ordering| ordering.is_ne())
                    .unwrap_or_else(|| a_id.cmp(b_id))
            });

            let iter: RowIter<'_> = Box::new(rows.into_iter().map(|(_, row)| Ok(row)));
            Ok(iter)
        })
    }

    fn batch_update(
        &self,
        predicate: &Predicate,
        changes: &[Assignment],
    ) -> Result<usize, StoreError> {
        self.timed(StoreOperation::BatchUpdate, || {
            let mut inner = self.inner.write();
            let evaluator = Evaluator::new(&self.primary_key, predicate, &inner.table);
            let ids = evaluator.matching_ids(predicate, &inner.table);
            for id in &ids {
                if let Some(row) = inner.table.rows.get_mut(id) {
                    for assignment in changes {
                        assignment.apply(row);
                    }
                }
            }
            tracing::trace!("batch_update touched {} rows", ids.len());
            Ok(ids.len())
        })
    }

    fn begin_transaction(&self) -> Result<(), StoreError> {
        self.timed(StoreOperation::Begin, || {
            let mut inner = self.inner.write();
            let snapshot = inner.table.clone();
            inner.snapshots.push(snapshot);
            Ok(())
        })
    }

    fn commit_transaction(&self) -> Result<(), StoreError> {
        self.timed(StoreOperation::Commit, || {
            self.inner
                .write()
                .snapshots
                .pop()
                .map(|_| ())
                .ok_or(StoreError::NoActiveTransaction { action: "commit" })
        })
    }

    fn rollback_transaction(&self) -> Result<(), StoreError> {
        self.timed(StoreOperation::Rollback, || {
            let mut inner = self.inner.write();
            let snapshot = inner
                .snapshots
                .pop()
                .ok_or(StoreError::NoActiveTransaction { action: "roll back" })?;
            inner.table = snapshot;
            Ok(())
        })
    }
}

#[cfg(test)]
#[path = "memory_store_test.rs"]
mod memory_store_test;

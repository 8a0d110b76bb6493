//! Store failures in the middle of structural writes
//!
//! A wrapper store injects a backend error into one chosen operation. Every
//! test checks that the stored rows are exactly as before the call, that no
//! transaction is left open, and that the in-memory node was restored.

mod common;

use anyhow::{anyhow, Result};
use common::{id, row, Fixture};
use hierarchy_core::db::{MemoryStore, RecordStore, RowIter, StoreError, StoreOperation};
use hierarchy_core::models::{Assignment, Node, NodeId, OrderKey, Predicate, Row};
use hierarchy_core::services::{HierarchyError, Registry};
use hierarchy_core::Forest;
use parking_lot::Mutex;
use serde_json::{json, Value};

/// MemoryStore that fails the n-th call of one operation
struct FailingStore {
    inner: MemoryStore,
    plan: Mutex<Option<(StoreOperation, usize)>>,
}

impl FailingStore {
    fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            plan: Mutex::new(None),
        }
    }

    /// Let `successes` calls of `operation` through, then fail the next one
    fn fail_after(&self, operation: StoreOperation, successes: usize) {
        *self.plan.lock() = Some((operation, successes));
    }

    fn trip(&self, operation: StoreOperation) -> Result<(), StoreError> {
        let mut plan = self.plan.lock();
        if let Some((target, remaining)) = plan.as_mut() {
            if *target == operation {
                if *remaining == 0 {
                    *plan = None;
                    return Err(StoreError::Backend(anyhow!("injected {} failure", operation)));
                }
                *remaining -= 1;
            }
        }
        Ok(())
    }
}

impl RecordStore for FailingStore {
    fn create(&self, row: Row) -> Result<NodeId, StoreError> {
        self.trip(StoreOperation::Create)?;
        self.inner.create(row)
    }

    fn read(&self, id: NodeId) -> Result<Option<Row>, StoreError> {
        self.trip(StoreOperation::Read)?;
        self.inner.read(id)
    }

    fn update(&self, id: NodeId, changes: Row) -> Result<(), StoreError> {
        self.trip(StoreOperation::Update)?;
        self.inner.update(id, changes)
    }

    fn delete(&self, id: NodeId) -> Result<bool, StoreError> {
        self.trip(StoreOperation::Delete)?;
        self.inner.delete(id)
    }

    fn delete_where(&self, predicate: &Predicate) -> Result<usize, StoreError> {
        self.trip(StoreOperation::DeleteWhere)?;
        self.inner.delete_where(predicate)
    }

    fn range_query(&self, predicate: &Predicate, order: &[OrderKey]) -> Result<RowIter<'_>, StoreError> {
        self.trip(StoreOperation::RangeQuery)?;
        self.inner.range_query(predicate, order)
    }

    fn batch_update(&self, predicate: &Predicate, changes: &[Assignment]) -> Result<usize, StoreError> {
        self.trip(StoreOperation::BatchUpdate)?;
        self.inner.batch_update(predicate, changes)
    }

    fn begin_transaction(&self) -> Result<(), StoreError> {
        self.inner.begin_transaction()
    }

    fn commit_transaction(&self) -> Result<(), StoreError> {
        self.inner.commit_transaction()
    }

    fn rollback_transaction(&self) -> Result<(), StoreError> {
        self.inner.rollback_transaction()
    }
}

fn bind<'s>(store: &'s FailingStore, options: Value) -> Result<Forest<'s>> {
    common::init_tracing();
    let registry = Registry::new();
    registry.register_json("Node", options)?;
    Ok(registry.forest("Node", store)?)
}

fn is_injected(err: &HierarchyError) -> bool {
    matches!(err, HierarchyError::Store(StoreError::Backend(_)))
}

#[test]
fn test_failed_path_cascade_rolls_back_move() -> Result<()> {
    let store = FailingStore::new();
    let forest = bind(&store, json!({"strategy": "path", "scope": "site_id"}))?;
    let mut f = Fixture::build(&forest)?;
    let before = store.inner.rows();

    store.fail_after(StoreOperation::BatchUpdate, 0);
    let root_2 = f.root_2.clone();
    let err = forest.move_to(&mut f.child, Some(&root_2)).unwrap_err();
    assert!(is_injected(&err));

    assert_eq!(store.inner.rows(), before);
    assert_eq!(store.inner.transaction_depth(), 0);

    // the attempted parent stays as an unsaved edit, nothing the save computed does
    assert_eq!(f.child.value("parent_id"), &json!(2));
    assert_eq!(f.child.was("parent_id"), &json!(1));
    assert_eq!(f.child.value("path"), &json!("1/"));
    assert!(!f.child.flags().path_updated);
    assert_eq!(f.child.changes().len(), 1);
    Ok(())
}

#[test]
fn test_failed_insert_closes_nested_set_gap() -> Result<()> {
    let store = FailingStore::new();
    let forest = bind(&store, json!({"strategy": "set"}))?;
    let f = Fixture::build(&forest)?;
    let before = store.inner.rows();

    store.fail_after(StoreOperation::Create, 0);
    let mut node = Node::new().with("parent_id", id(&f.child_2));
    let err = forest.save(&mut node).unwrap_err();
    assert!(is_injected(&err));

    assert_eq!(store.inner.rows(), before);
    assert_eq!(store.inner.transaction_depth(), 0);
    assert!(node.is_new_record());
    assert_eq!(node.get("lft"), None);
    Ok(())
}

#[test]
fn test_failed_renumbering_rolls_back_nested_set_move() -> Result<()> {
    let store = FailingStore::new();
    let forest = bind(&store, json!({"strategy": "set"}))?;
    let mut f = Fixture::build(&forest)?;
    let before = store.inner.rows();

    // first update writes the parent column, the second comes from the renumbering
    store.fail_after(StoreOperation::Update, 1);
    let root_2 = f.root_2.clone();
    let err = forest.move_to(&mut f.child, Some(&root_2)).unwrap_err();
    assert!(is_injected(&err));

    assert_eq!(store.inner.rows(), before);
    assert_eq!(store.inner.transaction_depth(), 0);
    assert_eq!(f.child.was("parent_id"), &json!(1));
    assert_eq!(f.child.value("lft"), &json!(2));
    assert_eq!(f.child.value("rgt"), &json!(5));
    Ok(())
}

#[test]
fn test_failed_destroy_restores_subtree() -> Result<()> {
    let store = FailingStore::new();
    let forest = bind(&store, json!({}))?;
    let f = Fixture::build(&forest)?;

    store.fail_after(StoreOperation::Delete, 0);
    let err = forest.destroy(&f.child).unwrap_err();
    assert!(is_injected(&err));

    assert_eq!(store.inner.len(), 7);
    assert_eq!(store.inner.read(7)?.map(|r| r["parent_id"].clone()), Some(json!(4)));
    assert_eq!(store.inner.transaction_depth(), 0);
    Ok(())
}

#[test]
fn test_failed_flatten_is_all_or_nothing() -> Result<()> {
    let store = FailingStore::new();
    let forest = bind(&store, json!({"level_column": "level"}))?;
    let f = Fixture::build(&forest)?;
    let before = store.inner.rows();

    store.fail_after(StoreOperation::Update, 1);
    let err = forest.flatten(&f.root).unwrap_err();
    assert!(is_injected(&err));

    assert_eq!(store.inner.rows(), before);
    assert_eq!(store.inner.transaction_depth(), 0);
    assert_eq!(forest.descendant_ids(&f.root)?, vec![4, 7, 5]);
    Ok(())
}

#[test]
fn test_store_errors_pass_through_reads() -> Result<()> {
    let store = FailingStore::new();
    let forest = bind(&store, json!({}))?;
    store.inner.create(row(json!({"id": 1})))?;
    let root = forest.find(1)?;

    store.fail_after(StoreOperation::RangeQuery, 0);
    let err = forest.children(&root).unwrap_err();
    assert!(is_injected(&err));
    assert!(err.to_string().contains("injected range_query failure"));
    Ok(())
}

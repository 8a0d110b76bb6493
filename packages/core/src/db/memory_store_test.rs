use super::*;
use crate::db::TransactionGuard;
use crate::models::{CompareOp, Expr};
use serde_json::json;

fn row(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        _ => unreachable!("fixture must be an object"),
    }
}

fn ids(store: &MemoryStore, predicate: &Predicate, order: &[OrderKey]) -> Vec<NodeId> {
    store
        .range_query(predicate, order)
        .unwrap()
        .map(|r| r.unwrap()["id"].as_i64().unwrap())
        .collect()
}

fn seeded() -> MemoryStore {
    let store = MemoryStore::new();
    store.create(row(json!({"parent_id": null, "name": "root"}))).unwrap();
    store.create(row(json!({"parent_id": 1, "name": "b"}))).unwrap();
    store.create(row(json!({"parent_id": 1, "name": "a"}))).unwrap();
    store.create(row(json!({"parent_id": 2, "name": "c"}))).unwrap();
    store
}

#[test]
fn test_create_assigns_sequential_ids() {
    let store = seeded();
    assert_eq!(store.len(), 4);
    assert_eq!(store.read(3).unwrap().unwrap()["name"], json!("a"));
    assert!(store.read(99).unwrap().is_none());
}

#[test]
fn test_create_with_explicit_id() {
    let store = MemoryStore::new();
    assert_eq!(store.create(row(json!({"id": 10}))).unwrap(), 10);
    assert_eq!(store.create(row(json!({}))).unwrap(), 11);

    let err = store.create(row(json!({"id": 10}))).unwrap_err();
    assert!(matches!(err, StoreError::DuplicateKey { id: 10 }));

    let err = store.create(row(json!({"id": "ten"}))).unwrap_err();
    assert!(matches!(err, StoreError::InvalidRow(_)));
}

#[test]
fn test_update_is_sparse() {
    let store = seeded();
    store.update(2, row(json!({"name": "renamed"}))).unwrap();

    let updated = store.read(2).unwrap().unwrap();
    assert_eq!(updated["name"], json!("renamed"));
    assert_eq!(updated["parent_id"], json!(1));

    let err = store.update(42, row(json!({"name": "x"}))).unwrap_err();
    assert!(matches!(err, StoreError::NotFound { id: 42 }));
}

#[test]
fn test_null_semantics() {
    let store = seeded();
    assert_eq!(ids(&store, &Predicate::is_null("parent_id"), &[]), vec![1]);
    assert_eq!(ids(&store, &Predicate::ne("parent_id", 1), &[]), vec![4]);
    assert_eq!(
        ids(&store, &Predicate::ne("parent_id", Value::Null), &[]),
        vec![2, 3, 4]
    );
    assert_eq!(
        ids(&store, &Predicate::compare("parent_id", CompareOp::Ge, 1), &[]),
        vec![2, 3, 4]
    );
}

#[test]
fn test_range_query_ordering_falls_back_to_primary_key() {
    let store = seeded();
    let children = Predicate::eq("parent_id", 1);
    assert_eq!(ids(&store, &children, &[OrderKey::asc("name")]), vec![3, 2]);
    assert_eq!(ids(&store, &children, &[OrderKey::desc("name")]), vec![2, 3]);
    assert_eq!(ids(&store, &children, &[]), vec![2, 3]);

    let constant = OrderKey::expr(Expr::Literal(json!("x")));
    assert_eq!(ids(&store, &children, &[constant]), vec![2, 3]);
}

#[test]
fn test_no_referencing_rows() {
    let store = seeded();
    let leaves = Predicate::NoReferencingRows {
        foreign_key: "parent_id".to_string(),
    };
    assert_eq!(ids(&store, &leaves, &[]), vec![3, 4]);
}

#[test]
fn test_prefix_and_batch_update() {
    let store = MemoryStore::new();
    store.create(row(json!({"path": "", "level": 0}))).unwrap();
    store.create(row(json!({"path": "1/", "level": 1}))).unwrap();
    store.create(row(json!({"path": "1/2/", "level": 2}))).unwrap();
    store.create(row(json!({"path": "10/", "level": 1}))).unwrap();

    assert_eq!(ids(&store, &Predicate::prefix("path", "1/"), &[]), vec![2, 3]);

    let touched = store
        .batch_update(
            &Predicate::prefix("path", "1/"),
            &[
                Assignment::ReplacePrefix {
                    column: "path".into(),
                    from: "1/".into(),
                    to: "10/1/".into(),
                },
                Assignment::Add("level".into(), 1),
            ],
        )
        .unwrap();
    assert_eq!(touched, 2);

    let moved = store.read(3).unwrap().unwrap();
    assert_eq!(moved["path"], json!("10/1/2/"));
    assert_eq!(moved["level"], json!(3));
    assert_eq!(store.read(4).unwrap().unwrap()["path"], json!("10/"));
}

#[test]
fn test_delete_where() {
    let store = seeded();
    assert!(store.delete(4).unwrap());
    assert!(!store.delete(4).unwrap());

    let removed = store.delete_where(&Predicate::eq("parent_id", 1)).unwrap();
    assert_eq!(removed, 2);
    assert_eq!(store.len(), 1);
}

#[test]
fn test_rollback_restores_snapshot() {
    let store = seeded();
    store.begin_transaction().unwrap();
    store.delete(2).unwrap();
    store.create(row(json!({"name": "temp"}))).unwrap();
    store.rollback_transaction().unwrap();

    assert_eq!(store.len(), 4);
    assert!(store.read(2).unwrap().is_some());
    assert_eq!(store.create(row(json!({}))).unwrap(), 5);
}

#[test]
fn test_nested_transactions_act_as_savepoints() {
    let store = seeded();
    store.begin_transaction().unwrap();
    store.update(2, row(json!({"name": "outer"}))).unwrap();

    store.begin_transaction().unwrap();
    store.update(2, row(json!({"name": "inner"}))).unwrap();
    store.rollback_transaction().unwrap();

    assert_eq!(store.read(2).unwrap().unwrap()["name"], json!("outer"));
    store.commit_transaction().unwrap();
    assert_eq!(store.transaction_depth(), 0);
    assert_eq!(store.read(2).unwrap().unwrap()["name"], json!("outer"));
}

#[test]
fn test_unbalanced_commit_fails() {
    let store = MemoryStore::new();
    let err = store.commit_transaction().unwrap_err();
    assert!(matches!(err, StoreError::NoActiveTransaction { .. }));
}

#[test]
fn test_transaction_guard_rolls_back_on_drop() {
    let store = seeded();
    {
        let _guard = TransactionGuard::begin(&store).unwrap();
        store.delete(1).unwrap();
    }
    assert!(store.read(1).unwrap().is_some());
    assert_eq!(store.transaction_depth(), 0);

    let guard = TransactionGuard::begin(&store).unwrap();
    store.delete(1).unwrap();
    guard.commit().unwrap();
    assert!(store.read(1).unwrap().is_none());
}

#[test]
fn test_metrics_count_calls() {
    let store = seeded();
    store.metrics().reset();

    let _ = ids(&store, &Predicate::All, &[]);
    store.read(1).unwrap();

    assert_eq!(store.metrics().count(StoreOperation::RangeQuery), 1);
    assert_eq!(store.metrics().count(StoreOperation::Read), 1);
    assert_eq!(store.metrics().count(StoreOperation::Create), 0);
}

//! Generated-tree properties, checked for every built-in strategy
//!
//! Each case builds a random forest, applies a few random moves (rejected ones
//! included), then compares every operation against a model computed from the
//! stored parent references alone.

mod common;

use anyhow::Result;
use hierarchy_core::db::MemoryStore;
use hierarchy_core::models::{Node, NodeId};
use proptest::prelude::*;
use proptest::sample::Index;
use serde_json::{json, Value};
use std::collections::{BTreeSet, HashMap};

type ParentMap = HashMap<NodeId, Option<NodeId>>;

/// Parent index per node, always pointing at an earlier node
fn shapes() -> impl Strategy<Value = Vec<Option<usize>>> {
    prop::collection::vec((prop::bool::weighted(0.2), any::<Index>()), 1..14).prop_map(|picks| {
        picks
            .iter()
            .enumerate()
            .map(|(i, (is_root, pick))| {
                if i == 0 || *is_root {
                    None
                } else {
                    Some(pick.index(i))
                }
            })
            .collect()
    })
}

fn moves() -> impl Strategy<Value = Vec<(Index, Option<Index>)>> {
    prop::collection::vec((any::<Index>(), any::<Option<Index>>()), 0..6)
}

fn parent_map(store: &MemoryStore) -> ParentMap {
    store
        .rows()
        .iter()
        .filter_map(|row| {
            let id = row.get("id").and_then(Value::as_i64)?;
            Some((id, row.get("parent_id").and_then(Value::as_i64)))
        })
        .collect()
}

fn model_ancestors(parents: &ParentMap, id: NodeId) -> Vec<NodeId> {
    let mut found = Vec::new();
    let mut next = parents.get(&id).copied().flatten();
    while let Some(parent) = next {
        found.push(parent);
        next = parents.get(&parent).copied().flatten();
    }
    found
}

fn model_descendants(parents: &ParentMap, id: NodeId) -> BTreeSet<NodeId> {
    parents
        .keys()
        .copied()
        .filter(|other| model_ancestors(parents, *other).contains(&id))
        .collect()
}

fn check(strategy: &str, shape: &[Option<usize>], moves: &[(Index, Option<Index>)]) -> Result<()> {
    let store = MemoryStore::new();
    let forest = common::forest(&store, "Node", json!({"strategy": strategy}))?;

    let mut ids: Vec<NodeId> = Vec::with_capacity(shape.len());
    for parent in shape {
        let mut node = Node::new();
        if let Some(parent) = parent {
            node.set("parent_id", ids[*parent]);
        }
        ids.push(common::id(&forest.create(node)?));
    }

    for (target, parent) in moves {
        let mut node = forest.find(ids[target.index(ids.len())])?;
        let parent = match parent {
            Some(parent) => Some(forest.find(ids[parent.index(ids.len())])?),
            None => None,
        };
        let _ = forest.move_to(&mut node, parent.as_ref())?;
    }

    let parents = parent_map(&store);
    for id in &ids {
        let node = forest.find(*id)?;
        let ancestors = model_ancestors(&parents, *id);

        assert_eq!(forest.ancestor_ids(&node)?, ancestors, "{} ancestors of {}", strategy, id);
        assert_eq!(forest.level(&node)?, ancestors.len() as i64);

        let descendants: BTreeSet<NodeId> = forest.descendant_ids(&node)?.into_iter().collect();
        assert_eq!(descendants, model_descendants(&parents, *id), "{} descendants of {}", strategy, id);

        let with_self: BTreeSet<NodeId> = forest.self_and_descendant_ids(&node)?.into_iter().collect();
        assert_eq!(with_self.difference(&descendants).copied().collect::<Vec<_>>(), vec![*id]);

        let siblings: BTreeSet<NodeId> = forest.sibling_ids(&node)?.into_iter().collect();
        let expected: BTreeSet<NodeId> = parents
            .iter()
            .filter(|(other, parent)| *other != id && **parent == parents[id])
            .map(|(other, _)| *other)
            .collect();
        assert_eq!(siblings, expected, "{} siblings of {}", strategy, id);

        let leaves: BTreeSet<NodeId> = forest.leaf_ids(&node)?.into_iter().collect();
        let childless: BTreeSet<NodeId> = descendants
            .iter()
            .copied()
            .filter(|d| !parents.values().any(|parent| *parent == Some(*d)))
            .collect();
        assert_eq!(leaves, childless, "{} leaves of {}", strategy, id);
        for leaf in &leaves {
            assert!(forest.leaf_ids(&forest.find(*leaf)?)?.is_empty());
        }

        if let Some(descendant) = descendants.iter().next() {
            let mut looped = node.clone();
            looped.set("parent_id", *descendant);
            assert!(!forest.validate(&looped)?.is_empty());
        }
    }

    if strategy == "set" {
        let mut bounds = Vec::new();
        for row in store.rows() {
            let left = row.get("lft").and_then(Value::as_i64).unwrap_or_default();
            let right = row.get("rgt").and_then(Value::as_i64).unwrap_or_default();
            assert!(left < right, "bounds ({}, {})", left, right);
            bounds.extend([left, right]);
        }
        bounds.sort_unstable();
        assert_eq!(bounds, (1..=2 * ids.len() as i64).collect::<Vec<_>>());
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_adjacency_list(shape in shapes(), moves in moves()) {
        check("tree", &shape, &moves).unwrap();
    }

    #[test]
    fn prop_materialized_path(shape in shapes(), moves in moves()) {
        check("path", &shape, &moves).unwrap();
    }

    #[test]
    fn prop_nested_set(shape in shapes(), moves in moves()) {
        check("set", &shape, &moves).unwrap();
    }
}

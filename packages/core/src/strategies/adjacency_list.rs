//! Adjacency-List Strategy
//!
//! Every row stores only a reference to its parent:
//!
//! ```text
//! +------+---------+-------------+--------------------+
//! |  id  |  name   |  parent_id  |  level [optional]  |
//! +------+---------+-------------+--------------------+
//! |  1   |  food   |     NULL    |         0          |
//! |  2   |  fruit  |      1      |         1          |
//! |  3   |  sour   |      2      |         2          |
//! |  4   |  meat   |      1      |         1          |
//! +------+---------+-------------+--------------------+
//! ```
//!
//! Inserts and moves write a single foreign key. Reads recurse: `ancestors`
//! costs one read per level above the node, `descendants` one children query
//! per node below it.
//!
//! The free functions in this module are the building blocks the other
//! strategies reuse for whatever their own encoding doesn't cover.

use serde_json::Value;
use std::collections::HashSet;

use super::{shift, walk_partition, write_changed, Context, HierarchyStrategy, OperationSet};
use crate::models::{
    Assignment, DeletePolicy, HierarchyConfig, HierarchyOptions, Node, NodeId, Predicate, Row,
};
use crate::services::validator::scope_predicate;
use crate::services::{ConfigurationError, HierarchyError};

/// Longest ancestor chain walked before the data is declared corrupt
pub const MAX_ANCESTOR_DEPTH: usize = 10_000;

/// Parent-pointer hierarchy
#[derive(Debug, Clone, Copy, Default)]
pub struct AdjacencyList;

impl HierarchyStrategy for AdjacencyList {
    fn name(&self) -> &str {
        "adjacency_list"
    }

    fn operations(&self) -> OperationSet {
        OperationSet::all()
    }

    fn process_options(
        &self,
        record_type: &str,
        options: &HierarchyOptions,
    ) -> Result<HierarchyConfig, ConfigurationError> {
        super::reject_options(
            self.name(),
            &[
                ("path_column", options.path_column.is_some()),
                ("segment_column", options.segment_column.is_some()),
                ("segment_delimiter", options.segment_delimiter.is_some()),
                ("left_column", options.left_column.is_some()),
                ("right_column", options.right_column.is_some()),
            ],
        )?;
        HierarchyConfig::base(record_type, self.name(), options, None)
    }

    fn ancestors(&self, cx: &Context<'_>, node: &Node) -> Result<Vec<Node>, HierarchyError> {
        ancestors(cx, node)
    }

    fn children(&self, cx: &Context<'_>, node: &Node) -> Result<Vec<Node>, HierarchyError> {
        children(cx, node)
    }

    fn descendants(&self, cx: &Context<'_>, node: &Node) -> Result<Vec<Node>, HierarchyError> {
        descendants(self, cx, node)
    }

    fn self_and_siblings(&self, cx: &Context<'_>, node: &Node) -> Result<Vec<Node>, HierarchyError> {
        self_and_siblings(cx, node)
    }

    fn roots(&self, cx: &Context<'_>, node: &Node) -> Result<Vec<Node>, HierarchyError> {
        roots(cx, node)
    }

    fn leaves(&self, cx: &Context<'_>, node: &Node) -> Result<Vec<Node>, HierarchyError> {
        leaves(self, cx, node)
    }

    fn after_update(&self, cx: &Context<'_>, node: &mut Node, previous: &Row) -> Result<(), HierarchyError> {
        shift_descendant_levels(self, cx, node, previous)
    }
}

/// Follow parent references up to a root
///
/// A dangling reference ends the walk; a revisited node or a chain longer than
/// [`MAX_ANCESTOR_DEPTH`] is reported as [`HierarchyError::CorruptHierarchy`].
pub(crate) fn ancestors(cx: &Context<'_>, node: &Node) -> Result<Vec<Node>, HierarchyError> {
    let mut ancestors = Vec::new();
    let mut seen: HashSet<NodeId> = cx.id(node).into_iter().collect();
    let mut next = cx.parent_id(node);

    while let Some(parent_id) = next {
        if !seen.insert(parent_id) || ancestors.len() >= MAX_ANCESTOR_DEPTH {
            tracing::warn!(
                "Parent chain of {} {:?} loops through {}",
                cx.config.record_type,
                cx.id(node),
                parent_id
            );
            return Err(HierarchyError::corrupt(format!(
                "parent chain of {} {:?} revisits {}",
                cx.config.record_type,
                cx.id(node),
                parent_id
            )));
        }

        let Some(parent) = cx.find(parent_id)? else {
            break;
        };
        next = cx.parent_id(&parent);
        ancestors.push(parent);
    }

    Ok(ancestors)
}

/// Rows in `node`'s partition whose parent is `node`
pub(crate) fn children(cx: &Context<'_>, node: &Node) -> Result<Vec<Node>, HierarchyError> {
    let Some(id) = cx.id(node) else {
        return Ok(Vec::new());
    };
    let predicate = cx
        .scope(node)
        .and(Predicate::eq(cx.config.parent_column.clone(), id));
    cx.query(predicate, cx.order())
}

/// Depth-first pre-order over `strategy.children`, one children query per node
pub(crate) fn descendants<S: HierarchyStrategy + ?Sized>(
    strategy: &S,
    cx: &Context<'_>,
    node: &Node,
) -> Result<Vec<Node>, HierarchyError> {
    let mut found = Vec::new();
    let mut seen: HashSet<NodeId> = cx.id(node).into_iter().collect();
    let mut stack: Vec<Node> = strategy.children(cx, node)?.into_iter().rev().collect();
    let mut queries = 1;

    while let Some(next) = stack.pop() {
        if let Some(id) = cx.id(&next) {
            if !seen.insert(id) {
                return Err(HierarchyError::corrupt(format!(
                    "{} {} is reachable twice below {:?}",
                    cx.config.record_type,
                    id,
                    cx.id(node)
                )));
            }
        }
        stack.extend(strategy.children(cx, &next)?.into_iter().rev());
        queries += 1;
        found.push(next);
    }

    tracing::debug!(
        "descendants of {} {:?}: {} rows over {} queries",
        cx.config.record_type,
        cx.id(node),
        found.len(),
        queries
    );
    Ok(found)
}

/// Nodes in the partition sharing `node`'s parent reference (null matches the roots)
pub(crate) fn self_and_siblings(cx: &Context<'_>, node: &Node) -> Result<Vec<Node>, HierarchyError> {
    let parent = node.value(&cx.config.parent_column).clone();
    let predicate = cx
        .scope(node)
        .and(Predicate::Eq(cx.config.parent_column.clone(), parent));
    cx.query(predicate, cx.order())
}

pub(crate) fn roots(cx: &Context<'_>, node: &Node) -> Result<Vec<Node>, HierarchyError> {
    let predicate = cx
        .scope(node)
        .and(Predicate::is_null(cx.config.parent_column.clone()));
    cx.query(predicate, cx.order())
}

/// Depth-first walk that keeps children nobody references as parent
pub(crate) fn leaves<S: HierarchyStrategy + ?Sized>(
    strategy: &S,
    cx: &Context<'_>,
    node: &Node,
) -> Result<Vec<Node>, HierarchyError> {
    enum Entry {
        Expand(Node),
        Emit(Node),
    }

    let mut found = Vec::new();
    let mut seen: HashSet<NodeId> = HashSet::new();
    let mut stack = vec![Entry::Expand(node.clone())];

    while let Some(entry) = stack.pop() {
        let next = match entry {
            Entry::Emit(leaf) => {
                found.push(leaf);
                continue;
            }
            Entry::Expand(next) => next,
        };
        let Some(id) = cx.id(&next) else {
            continue;
        };
        if !seen.insert(id) {
            return Err(HierarchyError::corrupt(format!(
                "{} {} is reachable twice below {:?}",
                cx.config.record_type,
                id,
                cx.id(node)
            )));
        }

        let childless: HashSet<NodeId> = cx
            .ids(&cx.query(
                cx.scope(&next)
                    .and(Predicate::eq(cx.config.parent_column.clone(), id))
                    .and(Predicate::NoReferencingRows {
                        foreign_key: cx.config.parent_column.clone(),
                    }),
                &[],
            )?)
            .into_iter()
            .collect();

        for child in strategy.children(cx, &next)?.into_iter().rev() {
            let is_leaf = cx.id(&child).is_some_and(|child_id| childless.contains(&child_id));
            stack.push(if is_leaf {
                Entry::Emit(child)
            } else {
                Entry::Expand(child)
            });
        }
    }

    Ok(found)
}

/// Recompute the cached level from the parent row, for new nodes and re-parented nodes
pub(crate) fn maintain_level(cx: &Context<'_>, node: &mut Node) -> Result<(), HierarchyError> {
    let Some(column) = cx.config.level_column.clone() else {
        return Ok(());
    };
    if !node.is_new_record() && !node.changed(&cx.config.parent_column) {
        return Ok(());
    }

    let level = match cx.parent_id(node) {
        None => 0,
        Some(parent_id) => match cx.find(parent_id)? {
            Some(parent) => match parent.value(&column).as_i64() {
                Some(level) => level + 1,
                None => ancestors(cx, &parent)?.len() as i64 + 1,
            },
            None => 0,
        },
    };
    node.set(column, level);
    Ok(())
}

/// Shift every descendant's cached level by the node's own level change
pub(crate) fn shift_descendant_levels<S: HierarchyStrategy + ?Sized>(
    strategy: &S,
    cx: &Context<'_>,
    node: &Node,
    previous: &Row,
) -> Result<(), HierarchyError> {
    let Some(column) = &cx.config.level_column else {
        return Ok(());
    };
    let before = previous.get(column).and_then(Value::as_i64);
    let after = node.value(column).as_i64();
    let (Some(before), Some(after)) = (before, after) else {
        return Ok(());
    };
    if before == after {
        return Ok(());
    }

    let ids = strategy.descendant_ids(cx, node)?;
    if !ids.is_empty() {
        let shifted = shift(cx, cx.id_in(&ids), column, after - before)?;
        tracing::debug!("shifted {} descendant levels by {}", shifted, after - before);
    }
    Ok(())
}

/// Subtree delete or orphan-detach, per the configured delete policy
pub(crate) fn destroy_dependents<S: HierarchyStrategy + ?Sized>(
    strategy: &S,
    cx: &Context<'_>,
    node: &Node,
) -> Result<(), HierarchyError> {
    let Some(id) = cx.id(node) else {
        return Ok(());
    };

    match cx.config.dependent {
        DeletePolicy::Destroy => {
            let ids = strategy.descendant_ids(cx, node)?;
            if !ids.is_empty() {
                let removed = cx.store.delete_where(&cx.id_in(&ids))?;
                tracing::debug!("destroyed {} descendants of {}", removed, id);
            }
        }
        DeletePolicy::Detach => {
            if let Some(column) = &cx.config.level_column {
                let ids = strategy.descendant_ids(cx, node)?;
                let delta = -(strategy.level(cx, node)? + 1);
                if !ids.is_empty() {
                    shift(cx, cx.id_in(&ids), column, delta)?;
                }
            }
            detach_children(cx, node, id)?;
        }
    }
    Ok(())
}

/// Null out the parent reference of `node`'s direct children
pub(crate) fn detach_children(cx: &Context<'_>, node: &Node, id: NodeId) -> Result<usize, HierarchyError> {
    let parent_column = cx.config.parent_column.clone();
    let detached = cx.store.batch_update(
        &cx.scope(node).and(Predicate::eq(parent_column.clone(), id)),
        &[Assignment::Set(parent_column, Value::Null)],
    )?;
    tracing::debug!("detached {} children of {}", detached, id);
    Ok(detached)
}

/// Recompute cached levels across one partition
pub(crate) fn rebuild_levels(cx: &Context<'_>, scope: &Row) -> Result<usize, HierarchyError> {
    let Some(column) = &cx.config.level_column else {
        return Ok(0);
    };

    let visits = walk_partition(cx, scope_predicate(cx.config, scope), cx.order())?;
    write_changed(
        cx,
        visits.into_iter().map(|visit| {
            let mut changes = Row::new();
            changes.insert(column.clone(), Value::from(visit.depth));
            (visit.node, changes)
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{MemoryStore, RecordStore};
    use serde_json::json;

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => unreachable!("fixture must be an object"),
        }
    }

    fn config() -> HierarchyConfig {
        AdjacencyList
            .process_options("Category", &HierarchyOptions::new())
            .unwrap()
    }

    #[test]
    fn test_ancestor_walk_detects_cycles() {
        let store = MemoryStore::new();
        store.create(row(json!({"id": 1, "parent_id": 2}))).unwrap();
        store.create(row(json!({"id": 2, "parent_id": 1}))).unwrap();
        store.create(row(json!({"id": 3, "parent_id": 1}))).unwrap();

        let config = config();
        let cx = Context::new(&store, &config);
        let node = cx.find(3).unwrap().unwrap();

        let err = AdjacencyList.ancestors(&cx, &node).unwrap_err();
        assert!(matches!(err, HierarchyError::CorruptHierarchy(_)));
    }

    #[test]
    fn test_dangling_parent_ends_walk() {
        let store = MemoryStore::new();
        store.create(row(json!({"id": 1, "parent_id": 99}))).unwrap();

        let config = config();
        let cx = Context::new(&store, &config);
        let node = cx.find(1).unwrap().unwrap();

        assert!(AdjacencyList.ancestors(&cx, &node).unwrap().is_empty());
        assert!(AdjacencyList.parent(&cx, &node).unwrap().is_none());
        assert!(!AdjacencyList.is_root(&cx, &node));
    }

    #[test]
    fn test_process_options_rejects_foreign_columns() {
        let options = HierarchyOptions::new().with_segment_column("slug");
        let err = AdjacencyList.process_options("Category", &options).unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidOptions(_)));
    }

    #[test]
    fn test_unsaved_node_has_no_children() {
        let store = MemoryStore::new();
        store.create(row(json!({"id": 1, "parent_id": null}))).unwrap();

        let config = config();
        let cx = Context::new(&store, &config);
        let unsaved = Node::new().with("parent_id", json!(null));

        assert!(AdjacencyList.children(&cx, &unsaved).unwrap().is_empty());
        assert!(AdjacencyList.leaves(&cx, &unsaved).unwrap().is_empty());
        assert_eq!(AdjacencyList.self_and_sibling_ids(&cx, &unsaved).unwrap(), vec![1]);
    }
}

//! Nested-Set Strategy
//!
//! Every row stores left/right bounds such that a node's descendants are exactly
//! the rows whose bounds fall strictly inside its own:
//!
//! ```text
//!  1 food 12
//!  ├─ 2 fruit 7
//!  │  ├─ 3 sour 4
//!  │  └─ 5 sweet 6
//!  └─ 8 meat 11
//!     └─ 9 beef 10
//! ```
//!
//! Reads are single range scans. Writes renumber:
//!
//! - **insert** opens a gap of two at the parent's right bound (roots are
//!   appended after the partition's largest right bound)
//! - **move** re-parents through the parent column, then rebuilds the partition
//!   with one depth-first walk
//! - **subtree delete** removes the interior and closes the gap
//! - **orphan-detach delete** rebuilds the partition
//!
//! Bounds are maintained per partition; roots of one partition share a single
//! left-to-right numbering.

use serde_json::Value;

use super::adjacency_list;
use super::{shift, walk_partition, write_changed, Context, HierarchyStrategy, OperationSet};
use crate::models::config::column;
use crate::models::{
    BoundColumns, CompareOp, DeletePolicy, HierarchyConfig, HierarchyOptions, Node, OrderKey,
    Predicate, Row,
};
use crate::services::validator::scope_predicate;
use crate::services::{ConfigurationError, HierarchyError};

/// Boundary-encoded hierarchy
#[derive(Debug, Clone, Copy, Default)]
pub struct NestedSet;

fn bound_columns<'a>(cx: &Context<'a>) -> Result<&'a BoundColumns, HierarchyError> {
    cx.config.bounds.as_ref().ok_or_else(|| {
        HierarchyError::Configuration(ConfigurationError::InvalidOptions(format!(
            "{} is not configured with bound columns",
            cx.config.record_type
        )))
    })
}

/// `(left, right)` held by a persisted node, when both are set
///
/// Reads pass the [`Context::fresh`] row; the delete hooks pass the row
/// `destroy` just fetched, which may already be gone from the store.
fn bounds(cx: &Context<'_>, node: &Node) -> Result<Option<(i64, i64)>, HierarchyError> {
    if node.is_new_record() {
        return Ok(None);
    }
    let columns = bound_columns(cx)?;
    Ok(node
        .value(&columns.left)
        .as_i64()
        .zip(node.value(&columns.right).as_i64()))
}

/// `scope AND left > l AND right < r`
fn inside(cx: &Context<'_>, node: &Node, columns: &BoundColumns, (left, right): (i64, i64)) -> Predicate {
    cx.scope(node)
        .and(Predicate::compare(columns.left.clone(), CompareOp::Gt, left))
        .and(Predicate::compare(columns.right.clone(), CompareOp::Lt, right))
}

/// `scope AND left < l AND right > r`
fn enclosing(cx: &Context<'_>, node: &Node, columns: &BoundColumns, (left, right): (i64, i64)) -> Predicate {
    cx.scope(node)
        .and(Predicate::compare(columns.left.clone(), CompareOp::Lt, left))
        .and(Predicate::compare(columns.right.clone(), CompareOp::Gt, right))
}

impl NestedSet {
    /// Largest right bound in the partition, via the first row of a descending scan
    fn max_right(cx: &Context<'_>, node: &Node, columns: &BoundColumns) -> Result<i64, HierarchyError> {
        let predicate = cx
            .scope(node)
            .and(Predicate::ne(columns.right.clone(), Value::Null));
        let first = cx
            .store
            .range_query(&predicate, &[OrderKey::desc(columns.right.clone())])?
            .next()
            .transpose()?;
        Ok(first
            .and_then(|row| row.get(&columns.right).and_then(Value::as_i64))
            .unwrap_or(0))
    }

    /// Re-read the node's own bounds (and level) after a renumbering
    fn sync_bounds(cx: &Context<'_>, node: &mut Node) -> Result<(), HierarchyError> {
        let columns = bound_columns(cx)?;
        let Some(id) = cx.id(node) else {
            return Ok(());
        };
        if let Some(row) = cx.store.read(id)? {
            let mut synced = vec![columns.left.as_str(), columns.right.as_str()];
            if let Some(level) = &cx.config.level_column {
                synced.push(level.as_str());
            }
            node.sync_columns(&row, &synced);
        }
        Ok(())
    }
}

impl HierarchyStrategy for NestedSet {
    fn name(&self) -> &str {
        "nested_set"
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
            ],
        )?;

        let mut config = HierarchyConfig::base(record_type, self.name(), options, None)?;
        let bounds = BoundColumns {
            left: column("left_column", options.left_column.as_deref(), "lft")?,
            right: column("right_column", options.right_column.as_deref(), "rgt")?,
        };
        if bounds.left == bounds.right {
            return Err(ConfigurationError::InvalidOptions(format!(
                "left_column and right_column must differ, both are {}",
                bounds.left
            )));
        }

        config.order.push(OrderKey::asc(bounds.left.clone()));
        config.bounds = Some(bounds);
        Ok(config)
    }

    /// Rows strictly enclosing the stored node, nearest first
    fn ancestors(&self, cx: &Context<'_>, node: &Node) -> Result<Vec<Node>, HierarchyError> {
        let columns = bound_columns(cx)?;
        let node = cx.fresh(node)?;
        match bounds(cx, &node)? {
            Some(range) => cx.query(
                enclosing(cx, &node, columns, range),
                &[OrderKey::desc(columns.left.clone())],
            ),
            None => adjacency_list::ancestors(cx, &node),
        }
    }

    fn children(&self, cx: &Context<'_>, node: &Node) -> Result<Vec<Node>, HierarchyError> {
        adjacency_list::children(cx, node)
    }

    /// Rows strictly inside the stored node, in left-bound (pre-) order
    fn descendants(&self, cx: &Context<'_>, node: &Node) -> Result<Vec<Node>, HierarchyError> {
        let columns = bound_columns(cx)?;
        let node = cx.fresh(node)?;
        match bounds(cx, &node)? {
            Some(range) => cx.query(
                inside(cx, &node, columns, range),
                &[OrderKey::asc(columns.left.clone())],
            ),
            None => Ok(Vec::new()),
        }
    }

    fn self_and_siblings(&self, cx: &Context<'_>, node: &Node) -> Result<Vec<Node>, HierarchyError> {
        adjacency_list::self_and_siblings(cx, node)
    }

    fn roots(&self, cx: &Context<'_>, node: &Node) -> Result<Vec<Node>, HierarchyError> {
        adjacency_list::roots(cx, node)
    }

    /// Descendants whose bounds are adjacent (`right == left + 1`)
    fn leaves(&self, cx: &Context<'_>, node: &Node) -> Result<Vec<Node>, HierarchyError> {
        let columns = bound_columns(cx)?;
        Ok(self
            .descendants(cx, node)?
            .into_iter()
            .filter(|descendant| {
                let left = descendant.value(&columns.left).as_i64();
                let right = descendant.value(&columns.right).as_i64();
                matches!((left, right), (Some(l), Some(r)) if r == l + 1)
            })
            .collect())
    }

    /// The enclosing row without a parent
    fn root(&self, cx: &Context<'_>, node: &Node) -> Result<Option<Node>, HierarchyError> {
        if self.is_root(cx, node) {
            return Ok(Some(node.clone()));
        }
        let columns = bound_columns(cx)?;
        let node = cx.fresh(node)?;
        match bounds(cx, &node)? {
            Some(range) => Ok(cx
                .query(
                    enclosing(cx, &node, columns, range)
                        .and(Predicate::is_null(cx.config.parent_column.clone())),
                    &[OrderKey::asc(columns.left.clone())],
                )?
                .into_iter()
                .next()),
            None => Ok(adjacency_list::ancestors(cx, &node)?.pop()),
        }
    }

    /// Open a gap at the parent's right bound for new rows
    fn before_save(&self, cx: &Context<'_>, node: &mut Node) -> Result<(), HierarchyError> {
        adjacency_list::maintain_level(cx, node)?;
        if !node.is_new_record() {
            return Ok(());
        }

        let columns = bound_columns(cx)?;
        let parent_right = match cx.parent_id(node) {
            Some(parent_id) => cx
                .find(parent_id)?
                .and_then(|parent| parent.value(&columns.right).as_i64()),
            None => None,
        };

        let left = match parent_right {
            Some(right) => {
                let scope = cx.scope(node);
                shift(
                    cx,
                    scope
                        .clone()
                        .and(Predicate::compare(columns.right.clone(), CompareOp::Ge, right)),
                    &columns.right,
                    2,
                )?;
                shift(
                    cx,
                    scope.and(Predicate::compare(columns.left.clone(), CompareOp::Gt, right)),
                    &columns.left,
                    2,
                )?;
                right
            }
            None => NestedSet::max_right(cx, node, columns)? + 1,
        };

        node.set(columns.left.clone(), left);
        node.set(columns.right.clone(), left + 1);
        Ok(())
    }

    /// A parent or partition change renumbers the partition(s) involved
    fn after_update(&self, cx: &Context<'_>, node: &mut Node, previous: &Row) -> Result<(), HierarchyError> {
        let parent_column = &cx.config.parent_column;
        let previous_parent = previous.get(parent_column).cloned().unwrap_or(Value::Null);
        let scope_changed = scope_predicate(cx.config, previous) != cx.scope(node);
        if &previous_parent == node.value(parent_column) && !scope_changed {
            return Ok(());
        }

        let rebuilt = self.rebuild(cx, node.attributes())?;
        let rebuilt_previous = if scope_changed {
            self.rebuild(cx, previous)?
        } else {
            0
        };
        tracing::debug!(
            "renumbered {} rows after moving {} {:?}",
            rebuilt + rebuilt_previous,
            cx.config.record_type,
            cx.id(node)
        );

        NestedSet::sync_bounds(cx, node)
    }

    fn destroy_dependents(&self, cx: &Context<'_>, node: &Node) -> Result<(), HierarchyError> {
        let Some(id) = cx.id(node) else {
            return Ok(());
        };
        match cx.config.dependent {
            DeletePolicy::Destroy => {
                let columns = bound_columns(cx)?;
                if let Some(range) = bounds(cx, node)? {
                    let removed = cx.store.delete_where(&inside(cx, node, columns, range))?;
                    tracing::debug!("destroyed {} descendants of {}", removed, id);
                }
            }
            DeletePolicy::Detach => {
                adjacency_list::detach_children(cx, node, id)?;
            }
        }
        Ok(())
    }

    /// Close the gap left by a subtree delete, or renumber after a detach
    fn after_destroy(&self, cx: &Context<'_>, node: &Node) -> Result<(), HierarchyError> {
        if cx.config.dependent == DeletePolicy::Detach {
            self.rebuild(cx, node.attributes())?;
            return Ok(());
        }

        let columns = bound_columns(cx)?;
        let Some((left, right)) = bounds(cx, node)? else {
            return Ok(());
        };
        let width = right - left + 1;
        let scope = cx.scope(node);
        shift(
            cx,
            scope
                .clone()
                .and(Predicate::compare(columns.left.clone(), CompareOp::Gt, right)),
            &columns.left,
            -width,
        )?;
        shift(
            cx,
            scope.and(Predicate::compare(columns.right.clone(), CompareOp::Gt, right)),
            &columns.right,
            -width,
        )?;
        Ok(())
    }

    /// Renumber one partition depth-first: configured order, then previous left bound
    fn rebuild(&self, cx: &Context<'_>, scope: &Row) -> Result<usize, HierarchyError> {
        let columns = bound_columns(cx)?;
        let visits = walk_partition(cx, scope_predicate(cx.config, scope), cx.order())?;

        write_changed(
            cx,
            visits.into_iter().map(|visit| {
                let mut changes = Row::new();
                changes.insert(columns.left.clone(), Value::from(visit.left));
                changes.insert(columns.right.clone(), Value::from(visit.right));
                if let Some(level) = &cx.config.level_column {
                    changes.insert(level.clone(), Value::from(visit.depth));
                }
                (visit.node, changes)
            }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{MemoryStore, RecordStore};
    use serde_json::json;

    fn config() -> HierarchyConfig {
        NestedSet
            .process_options("Category", &HierarchyOptions::new())
            .unwrap()
    }

    fn insert(cx: &Context<'_>, parent: Option<i64>) -> Node {
        let mut node = Node::new().with("parent_id", json!(parent));
        NestedSet.before_save(cx, &mut node).unwrap();
        let id = cx.store.create(node.attributes().clone()).unwrap();
        cx.find(id).unwrap().unwrap()
    }

    fn bounds_of(store: &MemoryStore, id: i64) -> (i64, i64) {
        let row = store.read(id).unwrap().unwrap();
        (row["lft"].as_i64().unwrap(), row["rgt"].as_i64().unwrap())
    }

    #[test]
    fn test_process_options_defaults() {
        let config = config();
        let bounds = config.bounds.as_ref().unwrap();
        assert_eq!(bounds.left, "lft");
        assert_eq!(bounds.right, "rgt");
        assert_eq!(config.level_column, None);
        assert_eq!(config.order, vec![OrderKey::asc("lft")]);

        let same = HierarchyOptions::from_value(json!({"left_column": "b", "right_column": "b"})).unwrap();
        assert!(NestedSet.process_options("Category", &same).is_err());
    }

    #[test]
    fn test_insert_opens_gap_at_parent_right_bound() {
        let store = MemoryStore::new();
        let config = config();
        let cx = Context::new(&store, &config);

        let food = insert(&cx, None);
        let fruit = insert(&cx, cx.id(&food));
        insert(&cx, cx.id(&fruit));
        insert(&cx, cx.id(&food));
        let other_root = insert(&cx, None);

        assert_eq!(bounds_of(&store, 1), (1, 8));
        assert_eq!(bounds_of(&store, 2), (2, 5));
        assert_eq!(bounds_of(&store, 3), (3, 4));
        assert_eq!(bounds_of(&store, 4), (6, 7));
        assert_eq!(bounds_of(&store, cx.id(&other_root).unwrap()), (9, 10));
    }

    #[test]
    fn test_range_queries() {
        let store = MemoryStore::new();
        let config = config();
        let cx = Context::new(&store, &config);

        let food = insert(&cx, None);
        let fruit = insert(&cx, cx.id(&food));
        let sour = insert(&cx, cx.id(&fruit));
        insert(&cx, cx.id(&food));

        let food = cx.find(1).unwrap().unwrap();
        let fruit = cx.find(cx.id(&fruit).unwrap()).unwrap().unwrap();

        assert_eq!(NestedSet.descendant_ids(&cx, &food).unwrap(), vec![2, 3, 4]);
        assert_eq!(NestedSet.leaf_ids(&cx, &food).unwrap(), vec![3, 4]);
        assert_eq!(NestedSet.ancestor_ids(&cx, &sour).unwrap(), vec![2, 1]);
        assert_eq!(NestedSet.root(&cx, &sour).unwrap().and_then(|r| cx.id(&r)), Some(1));
        assert_eq!(NestedSet.level(&cx, &sour).unwrap(), 2);
        assert!(NestedSet.is_ancestor_of(&cx, &fruit, &sour).unwrap());
    }
}

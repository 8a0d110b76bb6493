//! Materialized-Path Strategy
//!
//! Builds on [`AdjacencyList`](super::AdjacencyList): the parent column stays
//! authoritative, and every row additionally caches the concatenation of its
//! ancestors' segments.
//!
//! ```text
//! +------+---------+-------------+--------+---------+
//! |  id  |  name   |  parent_id  |  path  |  level  |
//! +------+---------+-------------+--------+---------+
//! |  1   |  food   |     NULL    |        |    0    |
//! |  2   |  fruit  |      1      |  1/    |    1    |
//! |  3   |  sour   |      2      |  1/2/  |    2    |
//! |  4   |  meat   |      1      |  1/    |    1    |
//! +------+---------+-------------+--------+---------+
//! ```
//!
//! A node's own segment is not part of its stored path. The *full path*
//! (`path || segment || delimiter`) is the prefix shared by its whole subtree, so
//! `self_and_descendants` is a single range query.
//!
//! Moving a node (or renaming its segment) rewrites that prefix for every
//! descendant, one `batch_update` per level beneath it.

use serde_json::Value;
use std::collections::HashMap;
use std::collections::HashSet;

use super::adjacency_list;
use super::{walk_partition, write_changed, Context, HierarchyStrategy, OperationSet};
use crate::models::config::column;
use crate::models::query::value_text;
use crate::models::{
    Assignment, DeletePolicy, Expr, HierarchyConfig, HierarchyOptions, Node, NodeId, OrderKey,
    PathColumns, Predicate, Row,
};
use crate::services::validator::scope_predicate;
use crate::services::{ConfigurationError, HierarchyError};

/// Ancestry-path hierarchy
#[derive(Debug, Clone, Copy, Default)]
pub struct MaterializedPath;

impl MaterializedPath {
    /// Write the path column, flagging the node when the value actually changes
    pub fn assign_path(config: &HierarchyConfig, node: &mut Node, path: impl Into<String>) {
        let Some(columns) = &config.path else {
            return;
        };
        let path = Value::String(path.into());
        if node.value(&columns.column) != &path {
            node.flags_mut().path_updated = true;
        }
        node.set(columns.column.clone(), path);
    }

    /// Write the segment column, flagging the node when the value actually changes
    pub fn assign_segment(config: &HierarchyConfig, node: &mut Node, segment: impl Into<Value>) {
        let Some(columns) = &config.path else {
            return;
        };
        let segment = segment.into();
        if node.value(&columns.segment_column) != &segment {
            node.flags_mut().segment_updated = true;
        }
        node.set(columns.segment_column.clone(), segment);
    }

    /// `path || segment || delimiter` for a row; null parts render as empty
    pub fn full_path(columns: &PathColumns, row: &Row) -> String {
        let part = |name: &str| {
            row.get(name)
                .and_then(value_text)
                .unwrap_or_default()
        };
        format!(
            "{}{}{}",
            part(&columns.column),
            part(&columns.segment_column),
            columns.delimiter
        )
    }
}

fn path_columns<'a>(cx: &Context<'a>) -> Result<&'a PathColumns, HierarchyError> {
    cx.config.path.as_ref().ok_or_else(|| {
        HierarchyError::Configuration(ConfigurationError::InvalidOptions(format!(
            "{} is not configured with path columns",
            cx.config.record_type
        )))
    })
}

impl HierarchyStrategy for MaterializedPath {
    fn name(&self) -> &str {
        "materialized_path"
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
                ("left_column", options.left_column.is_some()),
                ("right_column", options.right_column.is_some()),
            ],
        )?;

        let mut config = HierarchyConfig::base(record_type, self.name(), options, Some("level"))?;

        let delimiter = options.segment_delimiter.clone().unwrap_or_else(|| "/".to_string());
        if delimiter.is_empty() {
            return Err(ConfigurationError::InvalidOptions(
                "segment_delimiter can't be blank".to_string(),
            ));
        }
        let columns = PathColumns {
            column: column("path_column", options.path_column.as_deref(), "path")?,
            segment_column: column("segment_column", options.segment_column.as_deref(), "id")?,
            delimiter,
        };

        // Full path sorts each subtree into one contiguous block, i.e. pre-order.
        // Siblings compare by segment text ("1/10/" before "1/2/"), and full
        // paths are distinct, so a configured order never gets to break a tie.
        let mut order = vec![OrderKey::expr(Expr::Concat(vec![
            Expr::column(columns.column.clone()),
            Expr::column(columns.segment_column.clone()),
            Expr::Literal(Value::String(columns.delimiter.clone())),
        ]))];
        if let Some(level) = &config.level_column {
            order.push(OrderKey::asc(level.clone()));
        }
        order.append(&mut config.order);

        config.order = order;
        config.path = Some(columns);
        Ok(config)
    }

    fn ancestors(&self, cx: &Context<'_>, node: &Node) -> Result<Vec<Node>, HierarchyError> {
        adjacency_list::ancestors(cx, node)
    }

    fn children(&self, cx: &Context<'_>, node: &Node) -> Result<Vec<Node>, HierarchyError> {
        adjacency_list::children(cx, node)
    }

    fn descendants(&self, cx: &Context<'_>, node: &Node) -> Result<Vec<Node>, HierarchyError> {
        let id = cx.id(node);
        Ok(self
            .self_and_descendants(cx, node)?
            .into_iter()
            .filter(|descendant| cx.id(descendant) != id)
            .collect())
    }

    /// `scope AND (path LIKE full_path% OR id = n)` in a single query, from the stored path
    fn self_and_descendants(&self, cx: &Context<'_>, node: &Node) -> Result<Vec<Node>, HierarchyError> {
        let Some(id) = cx.id(node) else {
            return Ok(vec![node.clone()]);
        };
        let columns = path_columns(cx)?;
        let node = cx.fresh(node)?;
        let full = MaterializedPath::full_path(columns, node.attributes());

        let predicate = cx.scope(&node).and(
            Predicate::prefix(columns.column.clone(), full)
                .or(Predicate::eq(cx.config.primary_key.clone(), id)),
        );
        cx.query(predicate, cx.order())
    }

    fn self_and_siblings(&self, cx: &Context<'_>, node: &Node) -> Result<Vec<Node>, HierarchyError> {
        adjacency_list::self_and_siblings(cx, node)
    }

    fn roots(&self, cx: &Context<'_>, node: &Node) -> Result<Vec<Node>, HierarchyError> {
        adjacency_list::roots(cx, node)
    }

    /// Descendants nobody references as parent; the path only narrows the scan
    fn leaves(&self, cx: &Context<'_>, node: &Node) -> Result<Vec<Node>, HierarchyError> {
        if cx.id(node).is_none() {
            return Ok(Vec::new());
        }
        let columns = path_columns(cx)?;
        let node = cx.fresh(node)?;
        let full = MaterializedPath::full_path(columns, node.attributes());

        let predicate = cx
            .scope(&node)
            .and(Predicate::prefix(columns.column.clone(), full))
            .and(Predicate::NoReferencingRows {
                foreign_key: cx.config.parent_column.clone(),
            });
        cx.query(predicate, cx.order())
    }

    fn before_save(&self, cx: &Context<'_>, node: &mut Node) -> Result<(), HierarchyError> {
        adjacency_list::maintain_level(cx, node)?;
        let columns = path_columns(cx)?;

        if node.is_new_record() || node.changed(&cx.config.parent_column) {
            let path = match cx.parent_id(node) {
                Some(parent_id) => cx
                    .find(parent_id)?
                    .map(|parent| MaterializedPath::full_path(columns, parent.attributes()))
                    .unwrap_or_default(),
                None => String::new(),
            };
            MaterializedPath::assign_path(cx.config, node, path);
        }

        if !node.is_new_record() && node.changed(&columns.segment_column) {
            node.flags_mut().segment_updated = true;
        }
        Ok(())
    }

    /// Rewrite the moved prefix level by level beneath the node
    fn after_update(&self, cx: &Context<'_>, node: &mut Node, previous: &Row) -> Result<(), HierarchyError> {
        let flags = node.flags();
        if !flags.path_updated && !flags.segment_updated {
            return Ok(());
        }
        let Some(id) = cx.id(node) else {
            return Ok(());
        };

        let columns = path_columns(cx)?;
        let old_full = MaterializedPath::full_path(columns, previous);
        let new_full = MaterializedPath::full_path(columns, node.attributes());
        if old_full == new_full {
            return Ok(());
        }

        let mut assignments = vec![Assignment::ReplacePrefix {
            column: columns.column.clone(),
            from: old_full.clone(),
            to: new_full.clone(),
        }];
        if let Some(level) = &cx.config.level_column {
            let before = previous.get(level).and_then(Value::as_i64);
            let after = node.value(level).as_i64();
            if let (Some(before), Some(after)) = (before, after) {
                if before != after {
                    assignments.push(Assignment::Add(level.clone(), after - before));
                }
            }
        }

        // Descendants still carry the partition values they had before the save.
        let scope = scope_predicate(cx.config, previous);
        let mut seen: HashSet<NodeId> = HashSet::from([id]);
        let mut frontier = vec![id];
        let mut levels = 0;
        let mut rewritten = 0;

        loop {
            let under_frontier = scope.clone().and(Predicate::one_of(
                cx.config.parent_column.clone(),
                frontier.iter().copied(),
            ));
            let next = cx.ids(&cx.query(under_frontier.clone(), &[])?);
            if next.is_empty() {
                break;
            }
            if let Some(repeat) = next.iter().find(|child| !seen.insert(**child)) {
                return Err(HierarchyError::corrupt(format!(
                    "{} {} is reachable twice below {}",
                    cx.config.record_type, repeat, id
                )));
            }

            let updated = cx.store.batch_update(&under_frontier, &assignments)?;
            if updated == 0 {
                break;
            }
            rewritten += updated;
            levels += 1;
            frontier = next;
        }

        tracing::debug!(
            "path cascade for {} {}: {:?} -> {:?}, {} rows over {} levels",
            cx.config.record_type,
            id,
            old_full,
            new_full,
            rewritten,
            levels
        );
        Ok(())
    }

    /// Detached children become roots, so every descendant loses the node's full path prefix
    fn destroy_dependents(&self, cx: &Context<'_>, node: &Node) -> Result<(), HierarchyError> {
        let Some(id) = cx.id(node) else {
            return Ok(());
        };
        if cx.config.dependent == DeletePolicy::Destroy {
            return adjacency_list::destroy_dependents(self, cx, node);
        }

        let columns = path_columns(cx)?;
        let full = MaterializedPath::full_path(columns, node.attributes());
        let mut assignments = vec![Assignment::ReplacePrefix {
            column: columns.column.clone(),
            from: full.clone(),
            to: String::new(),
        }];
        if let Some(level) = &cx.config.level_column {
            assignments.push(Assignment::Add(level.clone(), -(self.level(cx, node)? + 1)));
        }

        let rewritten = cx.store.batch_update(
            &cx.scope(node).and(Predicate::prefix(columns.column.clone(), full)),
            &assignments,
        )?;
        tracing::debug!("stripped detached prefix from {} descendants of {}", rewritten, id);

        adjacency_list::detach_children(cx, node, id)?;
        Ok(())
    }

    /// Recompute paths and levels across one partition from the parent column
    fn rebuild(&self, cx: &Context<'_>, scope: &Row) -> Result<usize, HierarchyError> {
        let columns = path_columns(cx)?;
        let visits = walk_partition(cx, scope_predicate(cx.config, scope), cx.order())?;

        let mut full_paths: HashMap<NodeId, String> = HashMap::new();
        let mut updates = Vec::with_capacity(visits.len());
        for visit in visits {
            let path = cx
                .parent_id(&visit.node)
                .and_then(|parent| full_paths.get(&parent).cloned())
                .unwrap_or_default();

            let mut changes = Row::new();
            changes.insert(columns.column.clone(), Value::String(path));
            if let Some(level) = &cx.config.level_column {
                changes.insert(level.clone(), Value::from(visit.depth));
            }

            let mut rebuilt = visit.node.attributes().clone();
            rebuilt.extend(changes.clone());
            if let Some(id) = cx.id(&visit.node) {
                full_paths.insert(id, MaterializedPath::full_path(columns, &rebuilt));
            }
            updates.push((visit.node, changes));
        }

        write_changed(cx, updates)
    }
}

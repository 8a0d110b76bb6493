//! Parent-Reference Validation
//!
//! Structural checks run before any save that changes a node's parent
//! reference:
//!
//! 1. **Parent exists**: a non-null parent must resolve to a row in the node's
//!    partition
//! 2. **No cycle**: on update, the parent may be neither the node itself nor any
//!    node in its descendant set *as stored*, since once the new reference is
//!    written the cycle can no longer be found by walking the tree. The set is
//!    computed from the row read back by id, never from the caller's copy,
//!    whose bounds or path may predate other writes
//!
//! Failures are attached to the parent column and returned as
//! [`ValidationErrors`]; nothing is written.

use serde_json::Value;

use crate::models::{HierarchyConfig, Node, Predicate, Row, ValidationErrors};
use crate::services::HierarchyError;
use crate::strategies::{Context, HierarchyStrategy};

pub const NON_EXISTENT_PARENT: &str = "does not exist";
pub const SELF_OR_DESCENDANT_PARENT: &str = "can't reference the current node or any of its descendants";

/// `scope_field = value` for every configured partition field (`IS NULL` for nulls)
pub fn scope_predicate(config: &HierarchyConfig, row: &Row) -> Predicate {
    config.scope.iter().fold(Predicate::All, |predicate, field| {
        let value = row.get(field).cloned().unwrap_or(Value::Null);
        predicate.and(Predicate::Eq(field.clone(), value))
    })
}

/// Run both checks; an empty result means the save may proceed
pub fn validate(
    cx: &Context<'_>,
    strategy: &dyn HierarchyStrategy,
    node: &Node,
) -> Result<ValidationErrors, HierarchyError> {
    let mut errors = ValidationErrors::new();
    let parent_column = &cx.config.parent_column;

    if !node.changed(parent_column) {
        return Ok(errors);
    }
    let parent = node.value(parent_column);
    if parent.is_null() {
        return Ok(errors);
    }

    if !parent_exists(cx, node, parent)? {
        errors.add(parent_column.clone(), NON_EXISTENT_PARENT);
    }

    if let Some(id) = cx.id(node).filter(|_| !node.is_new_record()) {
        let own_subtree = match cx.find(id)? {
            Some(stored) => strategy.self_and_descendant_ids(cx, &stored)?,
            None => vec![id],
        };
        let references_subtree = parent
            .as_i64()
            .is_some_and(|parent_id| own_subtree.contains(&parent_id));
        if references_subtree {
            errors.add(parent_column.clone(), SELF_OR_DESCENDANT_PARENT);
        }
    }

    if !errors.is_empty() {
        tracing::debug!(
            "rejected {} {:?}: {}",
            cx.config.record_type,
            cx.id(node),
            errors
        );
    }
    Ok(errors)
}

fn parent_exists(cx: &Context<'_>, node: &Node, parent: &Value) -> Result<bool, HierarchyError> {
    let predicate = cx
        .scope(node)
        .and(Predicate::Eq(cx.config.primary_key.clone(), parent.clone()));
    Ok(cx.store.range_query(&predicate, &[])?.next().transpose()?.is_some())
}

//! Bound Hierarchy Handle
//!
//! A [`Forest`] pairs one record type's [`Binding`] with a [`RecordStore`] and
//! exposes the full hierarchy interface plus the persistence pipeline.
//!
//! # Save Pipeline
//!
//! 1. Validate the parent reference (rejections write nothing)
//! 2. Open a store transaction
//! 3. For an update, re-read the stored row and apply the node's edits on top
//!    of it (cached columns on the caller's copy may be stale)
//! 4. `before_save` hook (level, path, bounds)
//! 5. Insert or update the row
//! 6. `after_create` / `after_update` hook (cascades), given the stored row
//!    from step 3 as the previous state
//! 7. Commit
//!
//! Any failure after step 2 rolls the transaction back and restores the
//! in-memory node to its state before the call.

use std::sync::Arc;

use serde_json::Value;

use super::error::HierarchyError;
use super::registry::Binding;
use super::validator;
use crate::db::{RecordStore, TransactionGuard};
use crate::models::{HierarchyConfig, Node, NodeId, Row, ValidationErrors};
use crate::strategies::{Context, HierarchyStrategy};

/// Outcome of a save that did not fail at the store
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveResult {
    Saved,
    Invalid(ValidationErrors),
}

impl SaveResult {
    pub fn is_saved(&self) -> bool {
        matches!(self, SaveResult::Saved)
    }

    /// Validation errors of a rejected save
    pub fn errors(&self) -> Option<&ValidationErrors> {
        match self {
            SaveResult::Saved => None,
            SaveResult::Invalid(errors) => Some(errors),
        }
    }
}

/// One record type's hierarchy over one store
#[derive(Clone)]
pub struct Forest<'s> {
    binding: Arc<Binding>,
    store: &'s dyn RecordStore,
}

impl<'s> Forest<'s> {
    pub fn new(binding: Arc<Binding>, store: &'s dyn RecordStore) -> Self {
        Self { binding, store }
    }

    pub fn binding(&self) -> &Arc<Binding> {
        &self.binding
    }

    pub fn config(&self) -> &HierarchyConfig {
        &self.binding.config
    }

    pub fn strategy(&self) -> &dyn HierarchyStrategy {
        self.binding.strategy.as_ref()
    }

    pub fn store(&self) -> &'s dyn RecordStore {
        self.store
    }

    fn cx(&self) -> Context<'_> {
        Context::new(self.store, &self.binding.config)
    }

    // ===== Persistence =====

    /// Validate and persist `node`, running the strategy's maintenance hooks
    ///
    /// Returns [`SaveResult::Invalid`] when validation rejects the parent
    /// reference; the node keeps its attempted values and nothing is written.
    pub fn save(&self, node: &mut Node) -> Result<SaveResult, HierarchyError> {
        let cx = self.cx();
        let errors = validator::validate(&cx, self.strategy(), node)?;
        if !errors.is_empty() {
            return Ok(SaveResult::Invalid(errors));
        }

        let backup = node.clone();
        match self.write(&cx, node) {
            Ok(()) => Ok(SaveResult::Saved),
            Err(e) => {
                *node = backup;
                Err(e)
            }
        }
    }

    fn write(&self, cx: &Context<'_>, node: &mut Node) -> Result<(), HierarchyError> {
        let strategy = self.strategy();
        let guard = TransactionGuard::begin(self.store)?;

        // Hooks see the stored row with the caller's edits applied.
        if !node.is_new_record() {
            let id = cx
                .id(node)
                .ok_or(HierarchyError::not_persisted("update"))?;
            let stored = self
                .store
                .read(id)?
                .ok_or(HierarchyError::node_not_found(id))?;
            node.rebase(stored);
        }

        strategy.before_save(cx, node)?;

        if node.is_new_record() {
            let id = self.store.create(node.attributes().clone())?;
            node.set(cx.config.primary_key.clone(), id);
            node.mark_persisted();
            strategy.after_create(cx, node)?;
            tracing::debug!("created {} {}", cx.config.record_type, id);
        } else {
            let id = cx
                .id(node)
                .ok_or(HierarchyError::not_persisted("update"))?;
            // the stored row, as rebased above
            let previous = node.persisted().cloned().unwrap_or_default();
            let changes = node.changes();
            if !changes.is_empty() {
                self.store.update(id, changes)?;
            }
            node.mark_persisted();
            strategy.after_update(cx, node, &previous)?;
        }

        guard.commit()?;
        Ok(())
    }

    /// [`save`](Self::save), with a rejection turned into [`HierarchyError::Validation`]
    pub fn save_or_fail(&self, node: &mut Node) -> Result<(), HierarchyError> {
        match self.save(node)? {
            SaveResult::Saved => Ok(()),
            SaveResult::Invalid(errors) => Err(HierarchyError::Validation(errors)),
        }
    }

    /// Save a new node built from `node`, returning it persisted
    pub fn create(&self, mut node: Node) -> Result<Node, HierarchyError> {
        self.save_or_fail(&mut node)?;
        Ok(node)
    }

    /// Run the validator without saving
    pub fn validate(&self, node: &Node) -> Result<ValidationErrors, HierarchyError> {
        validator::validate(&self.cx(), self.strategy(), node)
    }

    /// Re-read `node` from the store, discarding edits and transient flags
    pub fn reload(&self, node: &mut Node) -> Result<(), HierarchyError> {
        let id = self.cx().id(node).ok_or(HierarchyError::not_persisted("reload"))?;
        let row = self
            .store
            .read(id)?
            .ok_or(HierarchyError::node_not_found(id))?;
        node.reload_from(row);
        Ok(())
    }

    pub fn find(&self, id: NodeId) -> Result<Node, HierarchyError> {
        self.try_find(id)?.ok_or(HierarchyError::node_not_found(id))
    }

    pub fn try_find(&self, id: NodeId) -> Result<Option<Node>, HierarchyError> {
        self.cx().find(id)
    }

    /// Point `node` at `parent` (a root when `None`) and save
    ///
    /// The new parent is compared with the stored one, not with the parent the
    /// caller's copy was loaded with, so moving a stale copy back to where it
    /// was loaded from still moves it.
    pub fn move_to(&self, node: &mut Node, parent: Option<&Node>) -> Result<SaveResult, HierarchyError> {
        let cx = self.cx();
        let parent_id = match parent {
            Some(parent) => Value::from(cx.id(parent).ok_or(HierarchyError::not_persisted("move under"))?),
            None => Value::Null,
        };
        if let Some(id) = cx.id(node).filter(|_| !node.is_new_record()) {
            let stored = self.store.read(id)?.ok_or(HierarchyError::node_not_found(id))?;
            node.rebase(stored);
        }
        node.set(cx.config.parent_column.clone(), parent_id);
        self.save(node)
    }

    /// Delete `node` and apply the delete policy to its subtree
    ///
    /// The policy runs against the stored row, not the in-memory copy. Returns
    /// false when the row was already gone.
    pub fn destroy(&self, node: &Node) -> Result<bool, HierarchyError> {
        let cx = self.cx();
        let id = cx.id(node).ok_or(HierarchyError::not_persisted("destroy"))?;
        let Some(stored) = cx.find(id)? else {
            return Ok(false);
        };

        let strategy = self.strategy();
        let guard = TransactionGuard::begin(self.store)?;
        strategy.destroy_dependents(&cx, &stored)?;
        self.store.delete(id)?;
        strategy.after_destroy(&cx, &stored)?;
        guard.commit()?;

        tracing::debug!(
            "destroyed {} {} ({:?})",
            cx.config.record_type,
            id,
            cx.config.dependent
        );
        Ok(true)
    }

    /// Move every descendant of `node` under `node`'s parent; returns the number moved
    ///
    /// Each move goes through [`save`](Self::save). The whole operation is one
    /// transaction.
    pub fn flatten(&self, node: &Node) -> Result<usize, HierarchyError> {
        let cx = self.cx();
        if cx.id(node).is_none() {
            return Err(HierarchyError::not_persisted("flatten"));
        }
        let parent = node.value(&cx.config.parent_column).clone();

        let guard = TransactionGuard::begin(self.store)?;
        let descendant_ids = self.strategy().descendant_ids(&cx, node)?;
        for id in &descendant_ids {
            let mut descendant = self.find(*id)?;
            descendant.set(cx.config.parent_column.clone(), parent.clone());
            self.save_or_fail(&mut descendant)?;
        }
        guard.commit()?;

        tracing::debug!(
            "flattened {} descendants of {} {:?}",
            descendant_ids.len(),
            cx.config.record_type,
            cx.id(node)
        );
        Ok(descendant_ids.len())
    }

    /// Recompute cached columns for the partition described by `scope`
    pub fn rebuild(&self, scope: &Row) -> Result<usize, HierarchyError> {
        let guard = TransactionGuard::begin(self.store)?;
        let written = self.strategy().rebuild(&self.cx(), scope)?;
        guard.commit()?;
        Ok(written)
    }

    // ===== Hierarchy interface =====

    pub fn parent(&self, node: &Node) -> Result<Option<Node>, HierarchyError> {
        self.strategy().parent(&self.cx(), node)
    }

    pub fn ancestors(&self, node: &Node) -> Result<Vec<Node>, HierarchyError> {
        self.strategy().ancestors(&self.cx(), node)
    }

    pub fn ancestor_ids(&self, node: &Node) -> Result<Vec<NodeId>, HierarchyError> {
        self.strategy().ancestor_ids(&self.cx(), node)
    }

    pub fn self_and_ancestors(&self, node: &Node) -> Result<Vec<Node>, HierarchyError> {
        self.strategy().self_and_ancestors(&self.cx(), node)
    }

    pub fn self_and_ancestor_ids(&self, node: &Node) -> Result<Vec<NodeId>, HierarchyError> {
        self.strategy().self_and_ancestor_ids(&self.cx(), node)
    }

    pub fn children(&self, node: &Node) -> Result<Vec<Node>, HierarchyError> {
        self.strategy().children(&self.cx(), node)
    }

    pub fn children_ids(&self, node: &Node) -> Result<Vec<NodeId>, HierarchyError> {
        self.strategy().children_ids(&self.cx(), node)
    }

    pub fn self_and_children(&self, node: &Node) -> Result<Vec<Node>, HierarchyError> {
        self.strategy().self_and_children(&self.cx(), node)
    }

    pub fn self_and_children_ids(&self, node: &Node) -> Result<Vec<NodeId>, HierarchyError> {
        self.strategy().self_and_children_ids(&self.cx(), node)
    }

    pub fn descendants(&self, node: &Node) -> Result<Vec<Node>, HierarchyError> {
        self.strategy().descendants(&self.cx(), node)
    }

    pub fn descendant_ids(&self, node: &Node) -> Result<Vec<NodeId>, HierarchyError> {
        self.strategy().descendant_ids(&self.cx(), node)
    }

    pub fn self_and_descendants(&self, node: &Node) -> Result<Vec<Node>, HierarchyError> {
        self.strategy().self_and_descendants(&self.cx(), node)
    }

    pub fn self_and_descendant_ids(&self, node: &Node) -> Result<Vec<NodeId>, HierarchyError> {
        self.strategy().self_and_descendant_ids(&self.cx(), node)
    }

    pub fn siblings(&self, node: &Node) -> Result<Vec<Node>, HierarchyError> {
        self.strategy().siblings(&self.cx(), node)
    }

    pub fn sibling_ids(&self, node: &Node) -> Result<Vec<NodeId>, HierarchyError> {
        self.strategy().sibling_ids(&self.cx(), node)
    }

    pub fn self_and_siblings(&self, node: &Node) -> Result<Vec<Node>, HierarchyError> {
        self.strategy().self_and_siblings(&self.cx(), node)
    }

    pub fn self_and_sibling_ids(&self, node: &Node) -> Result<Vec<NodeId>, HierarchyError> {
        self.strategy().self_and_sibling_ids(&self.cx(), node)
    }

    /// Roots of `node`'s partition
    pub fn roots(&self, node: &Node) -> Result<Vec<Node>, HierarchyError> {
        self.strategy().roots(&self.cx(), node)
    }

    pub fn root_ids(&self, node: &Node) -> Result<Vec<NodeId>, HierarchyError> {
        self.strategy().root_ids(&self.cx(), node)
    }

    /// Roots of the partition described by `scope` (empty row when unscoped)
    pub fn roots_in(&self, scope: &Row) -> Result<Vec<Node>, HierarchyError> {
        self.roots(&Node::from_attributes(scope.clone()))
    }

    pub fn root(&self, node: &Node) -> Result<Option<Node>, HierarchyError> {
        self.strategy().root(&self.cx(), node)
    }

    pub fn leaves(&self, node: &Node) -> Result<Vec<Node>, HierarchyError> {
        self.strategy().leaves(&self.cx(), node)
    }

    pub fn leaf_ids(&self, node: &Node) -> Result<Vec<NodeId>, HierarchyError> {
        self.strategy().leaf_ids(&self.cx(), node)
    }

    pub fn level(&self, node: &Node) -> Result<i64, HierarchyError> {
        self.strategy().level(&self.cx(), node)
    }

    pub fn is_root(&self, node: &Node) -> bool {
        self.strategy().is_root(&self.cx(), node)
    }

    pub fn is_ancestor_of(&self, node: &Node, other: &Node) -> Result<bool, HierarchyError> {
        self.strategy().is_ancestor_of(&self.cx(), node, other)
    }

    pub fn is_descendant_of(&self, node: &Node, other: &Node) -> Result<bool, HierarchyError> {
        self.strategy().is_descendant_of(&self.cx(), node, other)
    }

    pub fn is_sibling_of(&self, node: &Node, other: &Node) -> Result<bool, HierarchyError> {
        self.strategy().is_sibling_of(&self.cx(), node, other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::services::Registry;
    use serde_json::json;

    fn forest<'s>(registry: &Registry, store: &'s MemoryStore) -> Forest<'s> {
        registry.register_json("Category", json!({})).unwrap();
        registry.forest("Category", store).unwrap()
    }

    #[test]
    fn test_save_assigns_id_and_snapshot() {
        let registry = Registry::new();
        let store = MemoryStore::new();
        let categories = forest(&registry, &store);

        let mut node = Node::new().with("name", "root");
        assert!(categories.save(&mut node).unwrap().is_saved());
        assert!(!node.is_new_record());
        assert_eq!(node.id("id"), Some(1));
        assert!(node.changes().is_empty());
    }

    #[test]
    fn test_invalid_save_writes_nothing() {
        let registry = Registry::new();
        let store = MemoryStore::new();
        let categories = forest(&registry, &store);

        let mut node = Node::new().with("parent_id", 42);
        let result = categories.save(&mut node).unwrap();
        assert_eq!(
            result.errors().unwrap().on("parent_id"),
            vec![validator::NON_EXISTENT_PARENT]
        );
        assert!(node.is_new_record());
        assert_eq!(node.value("parent_id"), &json!(42));
        assert!(store.is_empty());
    }

    #[test]
    fn test_unsaved_node_operations() {
        let registry = Registry::new();
        let store = MemoryStore::new();
        let categories = forest(&registry, &store);

        let node = Node::new();
        assert!(!categories.is_root(&node));
        assert!(categories.children(&node).unwrap().is_empty());
        assert!(matches!(
            categories.destroy(&node),
            Err(HierarchyError::NotPersisted { .. })
        ));
        assert!(matches!(
            categories.flatten(&node),
            Err(HierarchyError::NotPersisted { .. })
        ));
    }

    #[test]
    fn test_destroy_missing_row_is_noop() {
        let registry = Registry::new();
        let store = MemoryStore::new();
        let categories = forest(&registry, &store);

        let node = categories.create(Node::new()).unwrap();
        assert!(categories.destroy(&node).unwrap());
        assert!(!categories.destroy(&node).unwrap());
        assert!(matches!(
            categories.find(1),
            Err(HierarchyError::NodeNotFound { id: 1 })
        ));
    }
}

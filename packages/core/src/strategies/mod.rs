//! Hierarchy Strategies
//!
//! A strategy is one encoding of parent/child relationships inside a flat table.
//! Every strategy satisfies the same [`HierarchyStrategy`] contract, so callers
//! can swap encodings per record type without touching query code.
//!
//! - [`AdjacencyList`] - parent pointer only; cheap writes, one query per level on reads
//! - [`MaterializedPath`] - adds an ancestry path column; single-query subtree reads,
//!   cascading rewrites on move
//! - [`NestedSet`] - left/right bounds; range-scan reads, renumbering on writes
//!
//! # Operation Catalogue
//!
//! [`Operation`] enumerates the full interface. A strategy declares what it
//! implements through [`HierarchyStrategy::operations`]; the registry rejects any
//! strategy whose declaration has gaps before it is ever bound.
//!
//! # Examples
//!
//! ```rust
//! use hierarchy_core::strategies::{Operation, OperationSet, StrategyKind};
//!
//! let kind: StrategyKind = "Materialized-Path".parse().unwrap();
//! assert_eq!(kind, StrategyKind::MaterializedPath);
//!
//! let partial = OperationSet::all().without(Operation::Flatten);
//! assert_eq!(partial.missing(), vec![Operation::Flatten]);
//! ```

pub mod adjacency_list;
pub mod materialized_path;
pub mod nested_set;

pub use adjacency_list::AdjacencyList;
pub use materialized_path::MaterializedPath;
pub use nested_set::NestedSet;

use serde::Serialize;
use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::db::RecordStore;
use crate::models::{
    Assignment, HierarchyConfig, HierarchyOptions, Node, NodeId, OrderKey, Predicate, Row,
};
use crate::services::validator::scope_predicate;
use crate::services::{ConfigurationError, HierarchyError};

/// Every operation of the hierarchy interface, in name order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    AncestorIds,
    Ancestors,
    Children,
    ChildrenIds,
    DescendantIds,
    Descendants,
    Flatten,
    IsAncestorOf,
    IsDescendantOf,
    IsRoot,
    IsSiblingOf,
    LeafIds,
    Leaves,
    Level,
    Parent,
    Root,
    RootIds,
    Roots,
    SelfAndAncestorIds,
    SelfAndAncestors,
    SelfAndChildren,
    SelfAndChildrenIds,
    SelfAndDescendantIds,
    SelfAndDescendants,
    SelfAndSiblingIds,
    SelfAndSiblings,
    SiblingIds,
    Siblings,
}

impl Operation {
    pub const ALL: [Operation; 28] = [
        Operation::AncestorIds,
        Operation::Ancestors,
        Operation::Children,
        Operation::ChildrenIds,
        Operation::DescendantIds,
        Operation::Descendants,
        Operation::Flatten,
        Operation::IsAncestorOf,
        Operation::IsDescendantOf,
        Operation::IsRoot,
        Operation::IsSiblingOf,
        Operation::LeafIds,
        Operation::Leaves,
        Operation::Level,
        Operation::Parent,
        Operation::Root,
        Operation::RootIds,
        Operation::Roots,
        Operation::SelfAndAncestorIds,
        Operation::SelfAndAncestors,
        Operation::SelfAndChildren,
        Operation::SelfAndChildrenIds,
        Operation::SelfAndDescendantIds,
        Operation::SelfAndDescendants,
        Operation::SelfAndSiblingIds,
        Operation::SelfAndSiblings,
        Operation::SiblingIds,
        Operation::Siblings,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Operation::AncestorIds => "ancestor_ids",
            Operation::Ancestors => "ancestors",
            Operation::Children => "children",
            Operation::ChildrenIds => "children_ids",
            Operation::DescendantIds => "descendant_ids",
            Operation::Descendants => "descendants",
            Operation::Flatten => "flatten",
            Operation::IsAncestorOf => "is_ancestor_of",
            Operation::IsDescendantOf => "is_descendant_of",
            Operation::IsRoot => "is_root",
            Operation::IsSiblingOf => "is_sibling_of",
            Operation::LeafIds => "leaf_ids",
            Operation::Leaves => "leaves",
            Operation::Level => "level",
            Operation::Parent => "parent",
            Operation::Root => "root",
            Operation::RootIds => "root_ids",
            Operation::Roots => "roots",
            Operation::SelfAndAncestorIds => "self_and_ancestor_ids",
            Operation::SelfAndAncestors => "self_and_ancestors",
            Operation::SelfAndChildren => "self_and_children",
            Operation::SelfAndChildrenIds => "self_and_children_ids",
            Operation::SelfAndDescendantIds => "self_and_descendant_ids",
            Operation::SelfAndDescendants => "self_and_descendants",
            Operation::SelfAndSiblingIds => "self_and_sibling_ids",
            Operation::SelfAndSiblings => "self_and_siblings",
            Operation::SiblingIds => "sibling_ids",
            Operation::Siblings => "siblings",
        }
    }

    fn bit(self) -> u32 {
        1 << (self as u32)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Set of operations a strategy implements
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct OperationSet(u32);

impl OperationSet {
    pub const fn empty() -> Self {
        Self(0)
    }

    /// The whole catalogue
    pub fn all() -> Self {
        Operation::ALL.iter().copied().collect()
    }

    pub fn with(self, operation: Operation) -> Self {
        Self(self.0 | operation.bit())
    }

    pub fn without(self, operation: Operation) -> Self {
        Self(self.0 & !operation.bit())
    }

    pub fn contains(&self, operation: Operation) -> bool {
        self.0 & operation.bit() != 0
    }

    /// Declared operations, in name order
    pub fn iter(&self) -> impl Iterator<Item = Operation> + '_ {
        Operation::ALL.iter().copied().filter(|op| self.contains(*op))
    }

    /// Catalogue entries not in this set, in name order
    pub fn missing(&self) -> Vec<Operation> {
        Operation::ALL
            .iter()
            .copied()
            .filter(|op| !self.contains(*op))
            .collect()
    }
}

impl FromIterator<Operation> for OperationSet {
    fn from_iter<I: IntoIterator<Item = Operation>>(iter: I) -> Self {
        iter.into_iter().fold(Self::empty(), OperationSet::with)
    }
}

impl fmt::Debug for OperationSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter().map(Operation::name)).finish()
    }
}

/// Built-in strategy tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    AdjacencyList,
    MaterializedPath,
    NestedSet,
}

impl StrategyKind {
    pub fn name(self) -> &'static str {
        match self {
            StrategyKind::AdjacencyList => "adjacency_list",
            StrategyKind::MaterializedPath => "materialized_path",
            StrategyKind::NestedSet => "nested_set",
        }
    }

    /// Normalize a user-supplied name: lowercase, `-` → `_`, surrounding space trimmed
    pub fn normalize(name: &str) -> String {
        name.trim().to_ascii_lowercase().replace('-', "_")
    }

    pub fn instantiate(self) -> Arc<dyn HierarchyStrategy> {
        match self {
            StrategyKind::AdjacencyList => Arc::new(AdjacencyList),
            StrategyKind::MaterializedPath => Arc::new(MaterializedPath),
            StrategyKind::NestedSet => Arc::new(NestedSet),
        }
    }
}

impl FromStr for StrategyKind {
    type Err = ConfigurationError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match Self::normalize(name).as_str() {
            "tree" | "adjacency_list" => Ok(StrategyKind::AdjacencyList),
            "path" | "materialized_path" => Ok(StrategyKind::MaterializedPath),
            "set" | "nested_set" => Ok(StrategyKind::NestedSet),
            _ => Err(ConfigurationError::unknown_strategy(name)),
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A store and the bound configuration, handed to every strategy call
#[derive(Clone, Copy)]
pub struct Context<'a> {
    pub store: &'a dyn RecordStore,
    pub config: &'a HierarchyConfig,
}

impl<'a> Context<'a> {
    pub fn new(store: &'a dyn RecordStore, config: &'a HierarchyConfig) -> Self {
        Self { store, config }
    }

    /// Run a range query and wrap each row as a persisted node
    pub fn query(&self, predicate: Predicate, order: &[OrderKey]) -> Result<Vec<Node>, HierarchyError> {
        self.store
            .range_query(&predicate, order)?
            .map(|row| row.map(Node::from_persisted).map_err(HierarchyError::from))
            .collect()
    }

    /// Read a node by primary key
    pub fn find(&self, id: NodeId) -> Result<Option<Node>, HierarchyError> {
        Ok(self.store.read(id)?.map(Node::from_persisted))
    }

    /// The stored version of a persisted node
    ///
    /// Falls back to `node` itself when it is new or its row is gone. Cached
    /// columns on a caller's copy go stale as soon as another write renumbers or
    /// re-paths its subtree; reads that depend on them start from this.
    pub fn fresh<'n>(&self, node: &'n Node) -> Result<Cow<'n, Node>, HierarchyError> {
        if node.is_new_record() {
            return Ok(Cow::Borrowed(node));
        }
        let Some(id) = self.id(node) else {
            return Ok(Cow::Borrowed(node));
        };
        Ok(self.find(id)?.map_or(Cow::Borrowed(node), Cow::Owned))
    }

    /// Primary key of `node`, `None` for unsaved nodes
    pub fn id(&self, node: &Node) -> Option<NodeId> {
        node.id(&self.config.primary_key)
    }

    /// Parent reference of `node`
    pub fn parent_id(&self, node: &Node) -> Option<NodeId> {
        node.value(&self.config.parent_column).as_i64()
    }

    /// Partition filter for `node`
    pub fn scope(&self, node: &Node) -> Predicate {
        scope_predicate(self.config, node.attributes())
    }

    /// Children ordering as configured (the store appends the primary key)
    pub fn order(&self) -> &[OrderKey] {
        &self.config.order
    }

    pub fn ids(&self, nodes: &[Node]) -> Vec<NodeId> {
        nodes.iter().filter_map(|node| self.id(node)).collect()
    }

    /// `pk IN (ids)`
    pub fn id_in(&self, ids: &[NodeId]) -> Predicate {
        Predicate::one_of(self.config.primary_key.clone(), ids.iter().copied())
    }
}

/// Uniform hierarchy contract implemented by every strategy
///
/// Strategies are stateless: all per-record-type state lives in the
/// [`HierarchyConfig`] carried by the [`Context`]. Required methods are the
/// primitives that differ between encodings; the remaining operations are
/// derived from them and may be overridden when an encoding can answer faster.
///
/// Node-returning operations on an unsaved node return what can be derived from
/// its in-memory attributes (no children, no descendants).
pub trait HierarchyStrategy: Send + Sync + fmt::Debug {
    /// Name reported in configuration errors and log lines
    fn name(&self) -> &str;

    /// Operations this strategy implements
    fn operations(&self) -> OperationSet;

    /// Merge strategy defaults into the free-form options
    fn process_options(
        &self,
        record_type: &str,
        options: &HierarchyOptions,
    ) -> Result<HierarchyConfig, ConfigurationError>;

    // ===== Primitives =====

    /// Parents, nearest first
    fn ancestors(&self, cx: &Context<'_>, node: &Node) -> Result<Vec<Node>, HierarchyError>;

    /// Direct children in child order
    fn children(&self, cx: &Context<'_>, node: &Node) -> Result<Vec<Node>, HierarchyError>;

    /// Every transitive child, depth-first in child order
    fn descendants(&self, cx: &Context<'_>, node: &Node) -> Result<Vec<Node>, HierarchyError>;

    /// Nodes in the same partition with the same parent reference, `node` included
    fn self_and_siblings(&self, cx: &Context<'_>, node: &Node) -> Result<Vec<Node>, HierarchyError>;

    /// Top-level nodes in `node`'s partition
    fn roots(&self, cx: &Context<'_>, node: &Node) -> Result<Vec<Node>, HierarchyError>;

    /// Descendants without children
    fn leaves(&self, cx: &Context<'_>, node: &Node) -> Result<Vec<Node>, HierarchyError>;

    // ===== Derived operations =====

    fn parent(&self, cx: &Context<'_>, node: &Node) -> Result<Option<Node>, HierarchyError> {
        match cx.parent_id(node) {
            Some(id) => cx.find(id),
            None => Ok(None),
        }
    }

    fn ancestor_ids(&self, cx: &Context<'_>, node: &Node) -> Result<Vec<NodeId>, HierarchyError> {
        Ok(cx.ids(&self.ancestors(cx, node)?))
    }

    fn children_ids(&self, cx: &Context<'_>, node: &Node) -> Result<Vec<NodeId>, HierarchyError> {
        Ok(cx.ids(&self.children(cx, node)?))
    }

    fn descendant_ids(&self, cx: &Context<'_>, node: &Node) -> Result<Vec<NodeId>, HierarchyError> {
        Ok(cx.ids(&self.descendants(cx, node)?))
    }

    fn leaf_ids(&self, cx: &Context<'_>, node: &Node) -> Result<Vec<NodeId>, HierarchyError> {
        Ok(cx.ids(&self.leaves(cx, node)?))
    }

    fn root_ids(&self, cx: &Context<'_>, node: &Node) -> Result<Vec<NodeId>, HierarchyError> {
        Ok(cx.ids(&self.roots(cx, node)?))
    }

    fn self_and_ancestors(&self, cx: &Context<'_>, node: &Node) -> Result<Vec<Node>, HierarchyError> {
        let mut nodes = vec![node.clone()];
        nodes.extend(self.ancestors(cx, node)?);
        Ok(nodes)
    }

    fn self_and_ancestor_ids(&self, cx: &Context<'_>, node: &Node) -> Result<Vec<NodeId>, HierarchyError> {
        Ok(cx.ids(&self.self_and_ancestors(cx, node)?))
    }

    fn self_and_children(&self, cx: &Context<'_>, node: &Node) -> Result<Vec<Node>, HierarchyError> {
        let mut nodes = vec![node.clone()];
        nodes.extend(self.children(cx, node)?);
        Ok(nodes)
    }

    fn self_and_children_ids(&self, cx: &Context<'_>, node: &Node) -> Result<Vec<NodeId>, HierarchyError> {
        Ok(cx.ids(&self.self_and_children(cx, node)?))
    }

    fn self_and_descendants(&self, cx: &Context<'_>, node: &Node) -> Result<Vec<Node>, HierarchyError> {
        let mut nodes = vec![node.clone()];
        nodes.extend(self.descendants(cx, node)?);
        Ok(nodes)
    }

    fn self_and_descendant_ids(&self, cx: &Context<'_>, node: &Node) -> Result<Vec<NodeId>, HierarchyError> {
        Ok(cx.ids(&self.self_and_descendants(cx, node)?))
    }

    fn self_and_sibling_ids(&self, cx: &Context<'_>, node: &Node) -> Result<Vec<NodeId>, HierarchyError> {
        Ok(cx.ids(&self.self_and_siblings(cx, node)?))
    }

    fn siblings(&self, cx: &Context<'_>, node: &Node) -> Result<Vec<Node>, HierarchyError> {
        let id = cx.id(node);
        Ok(self
            .self_and_siblings(cx, node)?
            .into_iter()
            .filter(|sibling| id.is_none() || cx.id(sibling) != id)
            .collect())
    }

    fn sibling_ids(&self, cx: &Context<'_>, node: &Node) -> Result<Vec<NodeId>, HierarchyError> {
        Ok(cx.ids(&self.siblings(cx, node)?))
    }

    /// The top of `node`'s tree: itself for a root, otherwise its last ancestor
    fn root(&self, cx: &Context<'_>, node: &Node) -> Result<Option<Node>, HierarchyError> {
        if self.is_root(cx, node) {
            return Ok(Some(node.clone()));
        }
        Ok(self.ancestors(cx, node)?.pop())
    }

    /// Distance from the root: the stored cached column when configured, else the ancestor count
    fn level(&self, cx: &Context<'_>, node: &Node) -> Result<i64, HierarchyError> {
        if let Some(column) = &cx.config.level_column {
            if let Some(level) = cx.fresh(node)?.value(column).as_i64() {
                return Ok(level);
            }
        }
        Ok(self.ancestors(cx, node)?.len() as i64)
    }

    /// Persisted and without a parent reference
    fn is_root(&self, cx: &Context<'_>, node: &Node) -> bool {
        !node.is_new_record() && cx.parent_id(node).is_none()
    }

    /// Whether `node` appears among `other`'s ancestors
    fn is_ancestor_of(&self, cx: &Context<'_>, node: &Node, other: &Node) -> Result<bool, HierarchyError> {
        match cx.id(node) {
            Some(id) => Ok(self.ancestor_ids(cx, other)?.contains(&id)),
            None => Ok(false),
        }
    }

    fn is_descendant_of(&self, cx: &Context<'_>, node: &Node, other: &Node) -> Result<bool, HierarchyError> {
        self.is_ancestor_of(cx, other, node)
    }

    /// Whether `node` appears among `other`'s siblings
    fn is_sibling_of(&self, cx: &Context<'_>, node: &Node, other: &Node) -> Result<bool, HierarchyError> {
        match cx.id(node) {
            Some(id) => Ok(self.sibling_ids(cx, other)?.contains(&id)),
            None => Ok(false),
        }
    }

    // ===== Lifecycle hooks =====

    /// Recompute cached columns before the row is written
    fn before_save(&self, cx: &Context<'_>, node: &mut Node) -> Result<(), HierarchyError> {
        adjacency_list::maintain_level(cx, node)
    }

    /// Runs inside the save transaction after an insert
    fn after_create(&self, _cx: &Context<'_>, _node: &Node) -> Result<(), HierarchyError> {
        Ok(())
    }

    /// Runs inside the save transaction after an update; `previous` is the row before it
    ///
    /// Columns the hook rewrites on the node's own row must be synced back into `node`.
    fn after_update(&self, _cx: &Context<'_>, _node: &mut Node, _previous: &Row) -> Result<(), HierarchyError> {
        Ok(())
    }

    /// Apply the delete policy to `node`'s subtree before `node` itself is removed
    fn destroy_dependents(&self, cx: &Context<'_>, node: &Node) -> Result<(), HierarchyError> {
        adjacency_list::destroy_dependents(self, cx, node)
    }

    /// Runs inside the destroy transaction after `node` was removed
    fn after_destroy(&self, _cx: &Context<'_>, _node: &Node) -> Result<(), HierarchyError> {
        Ok(())
    }

    /// Recompute every cached column in one partition; returns rows rewritten
    fn rebuild(&self, cx: &Context<'_>, scope: &Row) -> Result<usize, HierarchyError> {
        adjacency_list::rebuild_levels(cx, scope)
    }
}

/// One node reached by [`walk_partition`]
#[derive(Debug, Clone)]
pub(crate) struct Visit {
    pub node: Node,
    pub depth: i64,
    pub left: i64,
    pub right: i64,
}

/// Depth-first walk over a whole partition, loaded with a single range query
///
/// Siblings are visited in `order`. Rows whose parent is missing from the
/// partition are treated as roots. Left/right counters run across all roots, so
/// the result is a valid nested-set numbering of the partition.
pub(crate) fn walk_partition(
    cx: &Context<'_>,
    scope: Predicate,
    order: &[OrderKey],
) -> Result<Vec<Visit>, HierarchyError> {
    enum Step {
        Enter(usize, i64),
        Exit(usize),
    }

    let mut nodes: Vec<Option<Node>> = cx.query(scope, order)?.into_iter().map(Some).collect();
    let present: HashSet<NodeId> = nodes.iter().flatten().filter_map(|n| cx.id(n)).collect();

    let mut children: HashMap<NodeId, Vec<usize>> = HashMap::new();
    let mut roots = Vec::new();
    for (index, node) in nodes.iter().enumerate() {
        let Some(node) = node else { continue };
        match cx.parent_id(node).filter(|parent| present.contains(parent)) {
            Some(parent) => children.entry(parent).or_default().push(index),
            None => roots.push(index),
        }
    }

    let mut visits: Vec<Visit> = Vec::with_capacity(nodes.len());
    let mut counter = 0;
    let mut stack: Vec<Step> = roots.iter().rev().map(|index| Step::Enter(*index, 0)).collect();

    while let Some(step) = stack.pop() {
        match step {
            Step::Enter(index, depth) => {
                let Some(node) = nodes[index].take() else {
                    continue;
                };
                counter += 1;
                let position = visits.len();
                stack.push(Step::Exit(position));
                if let Some(kids) = cx.id(&node).and_then(|id| children.get(&id)) {
                    stack.extend(kids.iter().rev().map(|kid| Step::Enter(*kid, depth + 1)));
                }
                visits.push(Visit {
                    node,
                    depth,
                    left: counter,
                    right: 0,
                });
            }
            Step::Exit(position) => {
                counter += 1;
                visits[position].right = counter;
            }
        }
    }

    let unreachable = nodes.iter().flatten().count();
    if unreachable > 0 {
        tracing::warn!(
            "{} rows of {} are unreachable from any root (parent cycle)",
            unreachable,
            cx.config.record_type
        );
    }

    Ok(visits)
}

/// Write `changes` to every visit where they differ from the stored row
pub(crate) fn write_changed(
    cx: &Context<'_>,
    updates: impl IntoIterator<Item = (Node, Row)>,
) -> Result<usize, HierarchyError> {
    let mut written = 0;
    for (node, changes) in updates {
        let changes: Row = changes
            .into_iter()
            .filter(|(column, value)| node.value(column) != value)
            .collect();
        if changes.is_empty() {
            continue;
        }
        if let Some(id) = cx.id(&node) {
            cx.store.update(id, changes)?;
            written += 1;
        }
    }
    Ok(written)
}

/// `column = column + delta` for every row matching `predicate`
pub(crate) fn shift(
    cx: &Context<'_>,
    predicate: Predicate,
    column: &str,
    delta: i64,
) -> Result<usize, HierarchyError> {
    if delta == 0 {
        return Ok(0);
    }
    Ok(cx
        .store
        .batch_update(&predicate, &[Assignment::Add(column.to_string(), delta)])?)
}

/// Reject options that only apply to other strategies
pub(crate) fn reject_options(
    strategy: &str,
    unused: &[(&str, bool)],
) -> Result<(), ConfigurationError> {
    match unused.iter().find(|(_, present)| *present) {
        Some((option, _)) => Err(ConfigurationError::InvalidOptions(format!(
            "{} does not use the {} option",
            strategy, option
        ))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalogue_is_sorted_and_complete() {
        let names: Vec<_> = Operation::ALL.iter().map(|op| op.name()).collect();
        let mut sorted = names.clone();
        sorted.sort_unstable();
        assert_eq!(names, sorted);
        assert_eq!(OperationSet::all().iter().count(), 28);
        assert!(OperationSet::all().missing().is_empty());
    }

    #[test]
    fn test_operation_set_missing() {
        let set = OperationSet::all()
            .without(Operation::Siblings)
            .without(Operation::Ancestors);
        assert!(!set.contains(Operation::Siblings));
        assert!(set.contains(Operation::Leaves));
        assert_eq!(set.missing(), vec![Operation::Ancestors, Operation::Siblings]);
        assert_eq!(OperationSet::empty().missing().len(), 28);
    }

    #[test]
    fn test_strategy_kind_aliases() {
        for (name, kind) in [
            ("tree", StrategyKind::AdjacencyList),
            ("adjacency_list", StrategyKind::AdjacencyList),
            ("Adjacency-List", StrategyKind::AdjacencyList),
            ("path", StrategyKind::MaterializedPath),
            ("MATERIALIZED_PATH", StrategyKind::MaterializedPath),
            ("set", StrategyKind::NestedSet),
            (" nested-set ", StrategyKind::NestedSet),
        ] {
            assert_eq!(name.parse::<StrategyKind>().unwrap(), kind, "{}", name);
        }

        let err = "closure_table".parse::<StrategyKind>().unwrap_err();
        assert!(matches!(err, ConfigurationError::UnknownStrategy { .. }));
    }

    #[test]
    fn test_builtin_strategies_cover_catalogue() {
        for kind in [
            StrategyKind::AdjacencyList,
            StrategyKind::MaterializedPath,
            StrategyKind::NestedSet,
        ] {
            let strategy = kind.instantiate();
            assert_eq!(strategy.name(), kind.name());
            assert!(strategy.operations().missing().is_empty(), "{}", kind);
        }
    }
}

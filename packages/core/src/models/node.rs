//! Node Data Structures
//!
//! This module defines the `Node` struct, the in-memory view of one persisted
//! record participating in a hierarchy, together with the validation error
//! collection returned by rejected saves.
//!
//! # Architecture
//!
//! - **Column-keyed rows**: a node's attributes are a JSON object keyed by column
//!   name, so every hierarchy column (parent, level, path, bounds, partition) is
//!   whatever the record type's configuration says it is
//! - **Dirty tracking**: a column has changed when it differs from the persisted
//!   snapshot; a successful save refreshes the snapshot
//! - **Transient flags**: `path_updated` / `segment_updated` are never persisted,
//!   survive saves, and are only cleared by an explicit reload
//!
//! # Examples
//!
//! ```rust
//! use hierarchy_core::models::Node;
//! use serde_json::json;
//!
//! let mut node = Node::new().with("site_id", json!(1)).with("parent_id", json!(7));
//! assert!(node.is_new_record());
//! assert!(node.changed("parent_id"));
//!
//! node.set("name", "fruit");
//! assert_eq!(node.value("name"), &json!("fruit"));
//! ```

use serde_json::{Map, Value};
use std::fmt;

/// Primary key of a persisted record
pub type NodeId = i64;

/// One record as stored: column name → value
pub type Row = Map<String, Value>;

static NULL: Value = Value::Null;

/// Non-persisted state that outlives the save boundary
///
/// Distinct from dirty tracking: dirty columns are reset by every save, these
/// flags are only reset by [`Node::reload_from`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransientFlags {
    /// The materialized path column was rewritten since the last reload
    pub path_updated: bool,

    /// The segment column was rewritten since the last reload
    pub segment_updated: bool,
}

/// In-memory view of a hierarchy record
///
/// # Fields
///
/// - `attributes`: current column values, including unsaved edits
/// - `persisted`: snapshot of the row as last read from or written to the store
///   (`None` for a record that has never been saved)
/// - `flags`: transient materialized-path flags
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Node {
    attributes: Row,
    persisted: Option<Row>,
    flags: TransientFlags,
}

impl Node {
    /// Create an empty, unsaved node
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an unsaved node from a set of attributes
    pub fn from_attributes(attributes: Row) -> Self {
        Self {
            attributes,
            persisted: None,
            flags: TransientFlags::default(),
        }
    }

    /// Wrap a row that was read from the store
    pub fn from_persisted(row: Row) -> Self {
        Self {
            attributes: row.clone(),
            persisted: Some(row),
            flags: TransientFlags::default(),
        }
    }

    /// Builder-style attribute assignment
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(column, value);
        self
    }

    /// Raw attribute lookup
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.attributes.get(column)
    }

    /// Attribute value, `Null` when the column is absent
    pub fn value(&self, column: &str) -> &Value {
        self.attributes.get(column).unwrap_or(&NULL)
    }

    /// Assign an attribute in memory (persisted on the next save)
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        self.attributes.insert(column.into(), value.into());
    }

    /// Current attributes
    pub fn attributes(&self) -> &Row {
        &self.attributes
    }

    /// Snapshot of the last persisted state
    pub fn persisted(&self) -> Option<&Row> {
        self.persisted.as_ref()
    }

    /// True until the node has been saved once
    pub fn is_new_record(&self) -> bool {
        self.persisted.is_none()
    }

    /// Integer primary key read from `primary_key`
    pub fn id(&self, primary_key: &str) -> Option<NodeId> {
        self.value(primary_key).as_i64()
    }

    /// Value of `column` in the persisted snapshot (`Null` for new records)
    pub fn was(&self, column: &str) -> &Value {
        self.persisted
            .as_ref()
            .and_then(|row| row.get(column))
            .unwrap_or(&NULL)
    }

    /// Whether `column` differs from the persisted snapshot
    ///
    /// For a new record a column counts as changed once it holds a non-null value.
    pub fn changed(&self, column: &str) -> bool {
        match &self.persisted {
            None => !self.value(column).is_null(),
            Some(row) => row.get(column).unwrap_or(&NULL) != self.value(column),
        }
    }

    /// Every column whose value differs from the persisted snapshot
    pub fn changes(&self) -> Row {
        self.attributes
            .iter()
            .filter(|(column, _)| self.changed(column))
            .map(|(column, value)| (column.clone(), value.clone()))
            .collect()
    }

    /// Node built from the persisted snapshot, ignoring unsaved edits
    pub fn persisted_view(&self) -> Option<Node> {
        self.persisted.clone().map(Node::from_persisted)
    }

    /// Transient materialized-path flags
    pub fn flags(&self) -> TransientFlags {
        self.flags
    }

    pub(crate) fn flags_mut(&mut self) -> &mut TransientFlags {
        &mut self.flags
    }

    /// Refresh the persisted snapshot after a successful write
    pub(crate) fn mark_persisted(&mut self) {
        self.persisted = Some(self.attributes.clone());
    }

    /// Re-anchor on the stored row, keeping unsaved edits on top of it
    ///
    /// Columns the caller never edited take the stored values, so a copy that
    /// went stale while other writes renumbered or re-pathed it saves against
    /// the current row.
    pub(crate) fn rebase(&mut self, stored: Row) {
        let edits = self.changes();
        let mut attributes = stored.clone();
        attributes.extend(edits);
        self.attributes = attributes;
        self.persisted = Some(stored);
    }

    /// Copy `columns` from a row the store rewrote, into both the attributes and the snapshot
    pub(crate) fn sync_columns(&mut self, row: &Row, columns: &[&str]) {
        for column in columns {
            let value = row.get(*column).cloned().unwrap_or(Value::Null);
            self.attributes.insert(column.to_string(), value.clone());
            if let Some(persisted) = self.persisted.as_mut() {
                persisted.insert(column.to_string(), value);
            }
        }
    }

    /// Replace the in-memory state with a freshly read row
    ///
    /// This is the only operation that clears the transient flags.
    pub fn reload_from(&mut self, row: Row) {
        self.attributes = row.clone();
        self.persisted = Some(row);
        self.flags = TransientFlags::default();
    }
}

/// A single validation failure attached to a field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Validation errors collected for a rejected save
///
/// A rejected save leaves the in-memory node untouched and writes nothing, so
/// the caller can correct the offending field and retry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `message` to `field`
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(FieldError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Messages attached to `field`
    pub fn on(&self, field: &str) -> Vec<&str> {
        self.errors
            .iter()
            .filter(|error| error.field == field)
            .map(|error| error.message.as_str())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.errors.iter()
    }

    /// `"<field> <message>"` for every error, in insertion order
    pub fn full_messages(&self) -> Vec<String> {
        self.errors
            .iter()
            .map(|error| format!("{} {}", error.field, error.message))
            .collect()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Validation failed: {}", self.full_messages().join(", "))
    }
}

impl std::error::Error for ValidationErrors {}

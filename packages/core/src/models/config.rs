//! Hierarchy Configuration
//!
//! Registration takes free-form [`HierarchyOptions`] (typed, or any JSON object
//! with the same keys). Each strategy's option-normalization hook merges its
//! defaults into an immutable [`HierarchyConfig`], which is then bound to the
//! record type for the lifetime of the registration.
//!
//! # Examples
//!
//! ```rust
//! use hierarchy_core::models::HierarchyOptions;
//! use serde_json::json;
//!
//! let options = HierarchyOptions::from_value(json!({
//!     "strategy": "path",
//!     "scope": "site_id",
//!     "order": ["name", "created_at desc"],
//!     "dependent": "detach"
//! }))
//! .unwrap();
//!
//! assert_eq!(options.strategy.as_deref(), Some("path"));
//! assert_eq!(options.scope.unwrap().into_vec(), vec!["site_id".to_string()]);
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::query::OrderKey;
use crate::services::ConfigurationError;

static COLUMN_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("column name pattern is valid")
});

/// What happens to a node's descendants when the node is destroyed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletePolicy {
    /// Delete the whole subtree
    #[default]
    Destroy,
    /// Detach direct children, turning them into roots
    #[serde(alias = "nullify", alias = "orphan")]
    Detach,
}

/// A single name or a list of names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            OneOrMany::One(name) => vec![name],
            OneOrMany::Many(names) => names,
        }
    }
}

/// `level_column` accepts a column name, `true` (strategy default name) or `false` (disabled)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnToggle {
    Enabled(bool),
    Named(String),
}

/// Free-form registration options; unset keys take the strategy's defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HierarchyOptions {
    /// Strategy name (`tree`, `path`, `set`, or a custom registered name)
    pub strategy: Option<String>,

    /// Primary key column
    pub primary_key: Option<String>,

    /// Foreign key referencing the parent row
    pub parent_column: Option<String>,

    /// Cached depth column
    pub level_column: Option<ColumnToggle>,

    /// Partition field(s)
    pub scope: Option<OneOrMany>,

    /// Child ordering, e.g. `"name"` or `["position", "name desc"]`
    pub order: Option<OneOrMany>,

    /// Delete cascade policy
    pub dependent: Option<DeletePolicy>,

    /// Materialized path column
    pub path_column: Option<String>,

    /// Column whose value each node contributes to its children's paths
    pub segment_column: Option<String>,

    /// Separator written after every path segment
    pub segment_delimiter: Option<String>,

    /// Nested-set left bound column
    pub left_column: Option<String>,

    /// Nested-set right bound column
    pub right_column: Option<String>,
}

impl HierarchyOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse options from an arbitrary JSON object, rejecting unknown keys
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    pub fn with_strategy(mut self, strategy: impl Into<String>) -> Self {
        self.strategy = Some(strategy.into());
        self
    }

    pub fn with_scope(mut self, field: impl Into<String>) -> Self {
        let mut fields = self.scope.take().map(OneOrMany::into_vec).unwrap_or_default();
        fields.push(field.into());
        self.scope = Some(OneOrMany::Many(fields));
        self
    }

    pub fn with_order(mut self, order: impl Into<String>) -> Self {
        let mut keys = self.order.take().map(OneOrMany::into_vec).unwrap_or_default();
        keys.push(order.into());
        self.order = Some(OneOrMany::Many(keys));
        self
    }

    pub fn with_level_column(mut self, column: impl Into<String>) -> Self {
        self.level_column = Some(ColumnToggle::Named(column.into()));
        self
    }

    pub fn without_level_column(mut self) -> Self {
        self.level_column = Some(ColumnToggle::Enabled(false));
        self
    }

    pub fn with_dependent(mut self, policy: DeletePolicy) -> Self {
        self.dependent = Some(policy);
        self
    }

    pub fn with_segment_column(mut self, column: impl Into<String>) -> Self {
        self.segment_column = Some(column.into());
        self
    }
}

/// Materialized-path column bindings
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathColumns {
    pub column: String,
    pub segment_column: String,
    pub delimiter: String,
}

/// Nested-set column bindings
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoundColumns {
    pub left: String,
    pub right: String,
}

/// Resolved per-record-type configuration
///
/// Built once by a strategy's `process_options` and shared behind an `Arc`;
/// never mutated after registration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HierarchyConfig {
    pub record_type: String,
    pub strategy: String,
    pub primary_key: String,
    pub parent_column: String,
    pub level_column: Option<String>,
    pub scope: Vec<String>,
    pub order: Vec<OrderKey>,
    pub dependent: DeletePolicy,
    pub path: Option<PathColumns>,
    pub bounds: Option<BoundColumns>,
}

impl HierarchyConfig {
    /// Merge the options every strategy shares
    ///
    /// `default_level` is the level column used when the options don't mention one.
    pub fn base(
        record_type: &str,
        strategy: &str,
        options: &HierarchyOptions,
        default_level: Option<&str>,
    ) -> Result<Self, ConfigurationError> {
        let primary_key = column("primary_key", options.primary_key.as_deref(), "id")?;
        let parent_column = column("parent_column", options.parent_column.as_deref(), "parent_id")?;

        let level_column = match &options.level_column {
            None => default_level.map(str::to_string),
            Some(ColumnToggle::Enabled(false)) => None,
            Some(ColumnToggle::Enabled(true)) => Some(default_level.unwrap_or("level").to_string()),
            Some(ColumnToggle::Named(name)) => Some(column("level_column", Some(name.as_str()), name)?),
        };

        let scope = options
            .scope
            .clone()
            .map(OneOrMany::into_vec)
            .unwrap_or_default()
            .into_iter()
            .map(|field| column("scope", Some(field.as_str()), &field))
            .collect::<Result<Vec<_>, _>>()?;

        let order = options
            .order
            .clone()
            .map(OneOrMany::into_vec)
            .unwrap_or_default()
            .iter()
            .map(|entry| parse_order(entry))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            record_type: record_type.to_string(),
            strategy: strategy.to_string(),
            primary_key,
            parent_column,
            level_column,
            scope,
            order,
            dependent: options.dependent.unwrap_or_default(),
            path: None,
            bounds: None,
        })
    }
}

/// Resolve an optional column option against its default, validating the name
pub fn column(option: &str, value: Option<&str>, default: &str) -> Result<String, ConfigurationError> {
    let name = value.unwrap_or(default);
    if COLUMN_NAME.is_match(name) {
        Ok(name.to_string())
    } else {
        Err(ConfigurationError::invalid_column(option, name))
    }
}

/// Parse `"column"`, `"column asc"` or `"column desc"`
pub fn parse_order(entry: &str) -> Result<OrderKey, ConfigurationError> {
    let mut parts = entry.split_whitespace();
    let name = parts.next().unwrap_or_default();
    let descending = match parts.next().map(str::to_ascii_lowercase).as_deref() {
        None | Some("asc") => false,
        Some("desc") => true,
        Some(_) => return Err(ConfigurationError::invalid_column("order", entry)),
    };
    if parts.next().is_some() {
        return Err(ConfigurationError::invalid_column("order", entry));
    }

    let name = column("order", Some(name), name)?;
    Ok(if descending {
        OrderKey::desc(name)
    } else {
        OrderKey::asc(name)
    })
}

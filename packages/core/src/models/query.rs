//! Store Query Types
//!
//! Backend-neutral descriptions of the reads and writes the hierarchy strategies
//! issue against a [`RecordStore`](crate::db::RecordStore):
//!
//! - [`Predicate`] - row filters (`WHERE` clauses)
//! - [`Expr`] / [`OrderKey`] - sort expressions (`ORDER BY`)
//! - [`Assignment`] - column rewrites for batch updates (`SET`)
//!
//! A SQL backend translates these one-to-one; [`MemoryStore`](crate::db::MemoryStore)
//! interprets them directly.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

use super::node::Row;

/// Ordering comparison used by [`Predicate::Compare`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    /// Less than (<)
    Lt,
    /// Less than or equal (<=)
    Le,
    /// Greater than (>)
    Gt,
    /// Greater than or equal (>=)
    Ge,
}

impl CompareOp {
    pub fn holds(self, ordering: Ordering) -> bool {
        match self {
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::Le => ordering != Ordering::Greater,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::Ge => ordering != Ordering::Less,
        }
    }
}

/// Row filter
///
/// Null handling follows SQL: `Eq(column, Null)` is `IS NULL`, every other
/// comparison against a null column is false.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Predicate {
    /// Every row
    All,
    /// `column = value` (`IS NULL` when value is null)
    Eq(String, Value),
    /// `column <> value`
    Ne(String, Value),
    /// `column IN (values)`
    In(String, Vec<Value>),
    /// `column <op> value`
    Compare(String, CompareOp, Value),
    /// `column LIKE 'prefix%'` with the prefix matched literally
    Prefix(String, String),
    /// `NOT EXISTS (SELECT * FROM t AS c WHERE c.<foreign_key> = t.<primary key>)`
    NoReferencingRows { foreign_key: String },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::Eq(column.into(), value.into())
    }

    pub fn ne(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::Ne(column.into(), value.into())
    }

    pub fn is_null(column: impl Into<String>) -> Self {
        Predicate::Eq(column.into(), Value::Null)
    }

    pub fn one_of<V: Into<Value>>(
        column: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Predicate::In(column.into(), values.into_iter().map(Into::into).collect())
    }

    pub fn compare(column: impl Into<String>, op: CompareOp, value: impl Into<Value>) -> Self {
        Predicate::Compare(column.into(), op, value.into())
    }

    pub fn prefix(column: impl Into<String>, prefix: impl Into<String>) -> Self {
        Predicate::Prefix(column.into(), prefix.into())
    }

    /// Conjunction, flattening nested `And`s and dropping `All`
    pub fn and(self, other: Predicate) -> Predicate {
        let mut parts = Vec::new();
        for predicate in [self, other] {
            match predicate {
                Predicate::All => {}
                Predicate::And(inner) => parts.extend(inner),
                other => parts.push(other),
            }
        }
        match parts.len() {
            0 => Predicate::All,
            1 => parts.remove(0),
            _ => Predicate::And(parts),
        }
    }

    pub fn or(self, other: Predicate) -> Predicate {
        match self {
            Predicate::Or(mut parts) => {
                parts.push(other);
                Predicate::Or(parts)
            }
            first => Predicate::Or(vec![first, other]),
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Predicate {
        Predicate::Not(Box::new(self))
    }
}

/// Sort expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Column(String),
    Literal(Value),
    /// String concatenation (`a || b || c`); null if any part is null
    Concat(Vec<Expr>),
}

impl Expr {
    pub fn column(name: impl Into<String>) -> Self {
        Expr::Column(name.into())
    }

    /// Evaluate against a row
    pub fn evaluate(&self, row: &Row) -> Value {
        match self {
            Expr::Column(name) => row.get(name).cloned().unwrap_or(Value::Null),
            Expr::Literal(value) => value.clone(),
            Expr::Concat(parts) => {
                let mut out = String::new();
                for part in parts {
                    match value_text(&part.evaluate(row)) {
                        Some(text) => out.push_str(&text),
                        None => return Value::Null,
                    }
                }
                Value::String(out)
            }
        }
    }
}

/// One `ORDER BY` term
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderKey {
    pub expr: Expr,
    pub descending: bool,
}

impl OrderKey {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            expr: Expr::column(column),
            descending: false,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            expr: Expr::column(column),
            descending: true,
        }
    }

    pub fn expr(expr: Expr) -> Self {
        Self {
            expr,
            descending: false,
        }
    }

    /// Compare two rows under this key
    pub fn compare(&self, a: &Row, b: &Row) -> Ordering {
        let ordering = compare_values(&self.expr.evaluate(a), &self.expr.evaluate(b));
        if self.descending {
            ordering.reverse()
        } else {
            ordering
        }
    }
}

/// Column rewrite applied by [`RecordStore::batch_update`](crate::db::RecordStore::batch_update)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Assignment {
    /// `column = value`
    Set(String, Value),
    /// `column = column + delta` (null stays null)
    Add(String, i64),
    /// `column = to || substr(column, len(from) + 1)` for values starting with `from`
    ReplacePrefix {
        column: String,
        from: String,
        to: String,
    },
}

impl Assignment {
    /// Apply to a row in place
    pub fn apply(&self, row: &mut Row) {
        match self {
            Assignment::Set(column, value) => {
                row.insert(column.clone(), value.clone());
            }
            Assignment::Add(column, delta) => {
                if let Some(current) = row.get(column).and_then(Value::as_i64) {
                    row.insert(column.clone(), Value::from(current + delta));
                }
            }
            Assignment::ReplacePrefix { column, from, to } => {
                let rewritten = row
                    .get(column)
                    .and_then(Value::as_str)
                    .and_then(|current| current.strip_prefix(from.as_str()))
                    .map(|rest| format!("{}{}", to, rest));
                if let Some(value) = rewritten {
                    row.insert(column.clone(), Value::String(value));
                }
            }
        }
    }
}

/// Textual form of a scalar, as SQL string concatenation renders it
pub fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

/// Equality with numeric coercion (`1 == 1.0`)
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x == y,
            _ => x.as_f64() == y.as_f64(),
        },
        _ => a == b,
    }
}

/// Total order used for sorting: null < bool < number < string < array < object
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    fn rank(value: &Value) -> u8 {
        match value {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }

    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => x
                .as_f64()
                .partial_cmp(&y.as_f64())
                .unwrap_or(Ordering::Equal),
        },
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

//! Aggregation result model.
//!
//! A search response carries one or more named aggregation trees. Each level
//! groups documents into buckets; a bucket either nests further groupings
//! (internal) or carries scalar metrics (leaf). The shape is decided once,
//! when the response is parsed.

use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// A loosely-typed payload did not have the expected structure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unrecognized {context} shape: {reason}")]
pub struct UnrecognizedShape {
    pub context: String,
    pub reason: String,
}

impl UnrecognizedShape {
    pub fn new(context: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            reason: reason.into(),
        }
    }
}

/// A scalar value placed in one table cell.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
}

impl CellValue {
    /// Converts a JSON scalar. Null, arrays and objects yield `None`.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(CellValue::Text(s.clone())),
            Value::Bool(b) => Some(CellValue::Bool(*b)),
            Value::Number(n) => n
                .as_i64()
                .map(CellValue::Integer)
                .or_else(|| n.as_f64().map(CellValue::Float)),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Text(s) => f.write_str(s),
            CellValue::Integer(n) => write!(f, "{}", n),
            CellValue::Float(n) => write!(f, "{}", n),
            CellValue::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<i64> for CellValue {
    fn from(n: i64) -> Self {
        CellValue::Integer(n)
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Float(n)
    }
}

/// One named grouping level.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Aggregation {
    pub buckets: Vec<Bucket>,
}

/// Top-level aggregations of a response, in the order the engine returned them.
pub type AggregationSet = Vec<(String, Aggregation)>;

/// One grouping value and everything nested beneath it.
#[derive(Debug, Clone, PartialEq)]
pub struct Bucket {
    pub key: CellValue,
    pub node: AggregationNode,
}

/// What a bucket carries below its key.
#[derive(Debug, Clone, PartialEq)]
pub enum AggregationNode {
    /// Deeper grouping levels, by sub-aggregation name.
    Internal(Vec<(String, Aggregation)>),
    /// Terminal metrics, by metric name.
    Leaf(Vec<(String, CellValue)>),
}

/// One flattened leaf path: grouping keys first, then the leaf's metrics.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FlatRow {
    fields: Vec<(String, CellValue)>,
}

impl FlatRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: impl Into<String>, value: CellValue) {
        self.fields.push((key.into(), value));
    }

    /// First value recorded under `key`.
    pub fn get(&self, key: &str) -> Option<&CellValue> {
        self.fields
            .iter()
            .find(|(field, _)| field == key)
            .map(|(_, value)| value)
    }

    pub fn fields(&self) -> &[(String, CellValue)] {
        &self.fields
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(key, _)| key.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl From<Vec<(String, CellValue)>> for FlatRow {
    fn from(fields: Vec<(String, CellValue)>) -> Self {
        Self { fields }
    }
}

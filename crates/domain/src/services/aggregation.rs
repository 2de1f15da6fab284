//! Aggregation parsing and flattening.
//!
//! Search engines answer a multi-level grouping query with a tree:
//!
//! ```text
//! { "region": { "buckets": [
//!     { "key": "north", "doc_count": 10,
//!       "status": { "buckets": [
//!           { "key": "open", "doc_count": 4, "count": { "value": 4 } } ] } } ] } }
//! ```
//!
//! Parsing classifies each bucket once: sibling objects carrying `buckets`
//! are deeper groupings, sibling objects carrying a scalar `value` are
//! metrics. Flattening then emits one row per leaf path.

use serde_json::{Map, Value};
use tracing::debug;

use crate::models::{
    Aggregation, AggregationNode, AggregationSet, Bucket, CellValue, FlatRow, UnrecognizedShape,
};

const CONTEXT: &str = "aggregation";

/// Parses the `aggregations` object of a search response.
///
/// Top-level entries without buckets (plain metrics) produce no rows and are
/// skipped.
pub fn parse_aggregations(value: &Value) -> Result<AggregationSet, UnrecognizedShape> {
    let entries = value
        .as_object()
        .ok_or_else(|| UnrecognizedShape::new(CONTEXT, "aggregations must be an object"))?;

    let mut aggregations = Vec::with_capacity(entries.len());
    for (name, entry) in entries {
        match parse_aggregation(name, entry)? {
            Some(aggregation) => aggregations.push((name.clone(), aggregation)),
            None => debug!(aggregation = %name, "Skipping top-level aggregation without buckets"),
        }
    }
    Ok(aggregations)
}

fn parse_aggregation(name: &str, value: &Value) -> Result<Option<Aggregation>, UnrecognizedShape> {
    let Some(buckets) = value.get("buckets") else {
        return Ok(None);
    };

    let buckets = match buckets {
        Value::Array(items) => items
            .iter()
            .map(|bucket| parse_bucket(name, bucket, None))
            .collect::<Result<Vec<_>, _>>()?,
        // keyed buckets (filters, keyed terms/ranges)
        Value::Object(items) => items
            .iter()
            .map(|(key, bucket)| parse_bucket(name, bucket, Some(key.as_str())))
            .collect::<Result<Vec<_>, _>>()?,
        _ => {
            return Err(UnrecognizedShape::new(
                CONTEXT,
                format!("buckets of '{}' must be an array or an object", name),
            ))
        }
    };

    Ok(Some(Aggregation { buckets }))
}

fn parse_bucket(
    name: &str,
    value: &Value,
    keyed_as: Option<&str>,
) -> Result<Bucket, UnrecognizedShape> {
    let fields = value.as_object().ok_or_else(|| {
        UnrecognizedShape::new(CONTEXT, format!("bucket of '{}' must be an object", name))
    })?;

    let key = fields
        .get("key")
        .and_then(CellValue::from_json)
        .or_else(|| keyed_as.map(CellValue::from))
        .ok_or_else(|| {
            UnrecognizedShape::new(CONTEXT, format!("bucket of '{}' has no scalar key", name))
        })?;

    Ok(Bucket {
        key,
        node: parse_node(fields)?,
    })
}

fn parse_node(fields: &Map<String, Value>) -> Result<AggregationNode, UnrecognizedShape> {
    let mut children = Vec::new();
    let mut metrics = Vec::new();

    for (field, value) in fields {
        if value.get("buckets").is_some() {
            if let Some(child) = parse_aggregation(field, value)? {
                children.push((field.clone(), child));
            }
        } else if let Some(metric) = value.get("value").and_then(CellValue::from_json) {
            metrics.push((field.clone(), metric));
        }
    }

    // A bucket with any deeper grouping is internal; its own metrics are not emitted.
    if children.is_empty() {
        Ok(AggregationNode::Leaf(metrics))
    } else {
        Ok(AggregationNode::Internal(children))
    }
}

/// Flattens aggregation trees into one row per leaf path.
///
/// Each row holds one `(aggregation name, bucket key)` pair per grouping
/// level followed by the leaf's metrics. Rows keep the engine's bucket order.
pub fn flatten(aggregations: &[(String, Aggregation)]) -> Vec<FlatRow> {
    let mut rows = Vec::new();
    for (name, aggregation) in aggregations {
        walk(name, aggregation, &FlatRow::new(), &mut rows);
    }
    rows
}

fn walk(name: &str, aggregation: &Aggregation, prefix: &FlatRow, rows: &mut Vec<FlatRow>) {
    for bucket in &aggregation.buckets {
        let mut row = prefix.clone();
        row.push(name, bucket.key.clone());

        match &bucket.node {
            AggregationNode::Internal(children) => {
                for (child_name, child) in children {
                    walk(child_name, child, &row, rows);
                }
            }
            AggregationNode::Leaf(metrics) => {
                for (metric, value) in metrics {
                    row.push(metric.as_str(), value.clone());
                }
                rows.push(row);
            }
        }
    }
}

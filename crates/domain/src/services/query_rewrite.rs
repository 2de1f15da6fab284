//! Time window injection into stored search queries.
//!
//! Stored queries carry a placeholder range filter on a time field. Before
//! every run the bounds are replaced with the report's look-back window.

use chrono::SecondsFormat;
use serde_json::{json, Map, Value};

use crate::models::TimeWindow;

/// Time fields a range filter may target, in lookup order.
pub const TIME_FIELD_ALIASES: [&str; 3] = ["timestamp", "messageTime", "fireTime"];

const FILTER_POINTER: &str = "/query/bool/filter";

/// Result of rewriting a query's time window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewriteOutcome {
    /// The range on `field` was updated. `filter_index` is `None` when the
    /// filter is a single object rather than an array.
    Applied {
        field: &'static str,
        filter_index: Option<usize>,
    },
    /// No recognized range filter; the document was left unchanged.
    Skipped,
}

impl RewriteOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, RewriteOutcome::Applied { .. })
    }
}

/// Sets `gte`/`lte` of the first `range` filter on a known time field.
pub fn rewrite_time_window(query: &mut Value, window: &TimeWindow) -> RewriteOutcome {
    let Some(filter) = query.pointer_mut(FILTER_POINTER) else {
        return RewriteOutcome::Skipped;
    };

    if let Some(entries) = filter.as_array_mut() {
        for (index, entry) in entries.iter_mut().enumerate() {
            if let Some(field) = apply_to_entry(entry, window) {
                return RewriteOutcome::Applied {
                    field,
                    filter_index: Some(index),
                };
            }
        }
        return RewriteOutcome::Skipped;
    }

    match apply_to_entry(filter, window) {
        Some(field) => RewriteOutcome::Applied {
            field,
            filter_index: None,
        },
        None => RewriteOutcome::Skipped,
    }
}

fn apply_to_entry(entry: &mut Value, window: &TimeWindow) -> Option<&'static str> {
    let range = entry.get_mut("range")?.as_object_mut()?;

    for field in TIME_FIELD_ALIASES {
        if let Some(Value::Object(clause)) = range.get_mut(field) {
            set_bounds(clause, window);
            return Some(field);
        }
    }
    None
}

fn set_bounds(clause: &mut Map<String, Value>, window: &TimeWindow) {
    let epoch_millis = clause.get("format").and_then(Value::as_str) == Some("epoch_millis");

    let (gte, lte) = if epoch_millis {
        (
            json!(window.start.timestamp_millis()),
            json!(window.end.timestamp_millis()),
        )
    } else {
        (
            json!(window.start.to_rfc3339_opts(SecondsFormat::Millis, true)),
            json!(window.end.to_rfc3339_opts(SecondsFormat::Millis, true)),
        )
    };

    clause.insert("gte".to_string(), gte);
    clause.insert("lte".to_string(), lte);
}

//! Tabular report model.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use super::aggregation::CellValue;

/// A declared report column: display header and the row key it reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Header shown in the exported sheet.
    pub name: String,
    /// Aggregation or metric name the column is filled from.
    pub key: String,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key: key.into(),
        }
    }
}

/// Trailing rows appended after the data rectangle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportSummary {
    pub title: String,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl ReportSummary {
    /// `(label, value)` pairs in export order.
    pub fn lines(&self) -> [(&'static str, String); 3] {
        [
            ("Title", self.title.clone()),
            ("From", self.from.to_rfc3339_opts(SecondsFormat::Secs, true)),
            ("To", self.to.to_rfc3339_opts(SecondsFormat::Secs, true)),
        ]
    }
}

/// Rectangular report table ready for export.
///
/// Every entry of `rows` has exactly `columns.len()` cells.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportTable {
    pub columns: Vec<ColumnSpec>,
    pub rows: Vec<Vec<CellValue>>,
    pub summary: ReportSummary,
    /// Flattened rows dropped because they lacked a declared column.
    pub omitted_rows: usize,
}

impl ReportTable {
    pub fn headers(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }
}

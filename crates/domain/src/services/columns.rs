//! Column reconciliation.
//!
//! Flattened rows carry their fields in tree order. The exported table needs
//! them in the report's declared column order, one cell per column.

use tracing::debug;

use crate::models::{CellValue, ColumnSpec, FlatRow, ReportSummary, ReportTable, UnrecognizedShape};

/// Parses a stored `[{"name": .., "key": ..}]` column list.
pub fn parse_columns(serialized: &str) -> Result<Vec<ColumnSpec>, UnrecognizedShape> {
    serde_json::from_str(serialized).map_err(|e| UnrecognizedShape::new("columns", e.to_string()))
}

/// Orders row fields by the declared columns.
///
/// A row that lacks any declared key is omitted, never padded, so every
/// emitted row has exactly `columns.len()` cells.
pub fn reconcile(columns: &[ColumnSpec], rows: &[FlatRow], summary: ReportSummary) -> ReportTable {
    let mut cells = Vec::with_capacity(rows.len());
    let mut omitted_rows = 0;

    for row in rows {
        match select_cells(columns, row) {
            Some(selected) => cells.push(selected),
            None => {
                debug!(
                    row_keys = ?row.keys().collect::<Vec<_>>(),
                    "Row does not supply every declared column, omitting"
                );
                omitted_rows += 1;
            }
        }
    }

    ReportTable {
        columns: columns.to_vec(),
        rows: cells,
        summary,
        omitted_rows,
    }
}

fn select_cells(columns: &[ColumnSpec], row: &FlatRow) -> Option<Vec<CellValue>> {
    if columns.is_empty() {
        return None;
    }
    columns
        .iter()
        .map(|column| row.get(&column.key).cloned())
        .collect()
}

//! Spreadsheet export of report tables.

use async_trait::async_trait;
use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};
use std::path::{Path, PathBuf};
use tracing::debug;

use domain::models::{CellValue, ReportTable};
use domain::services::{ExportError, TableExporter};

pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

const WORKSHEET_NAME: &str = "report";

/// Blank rows between the data and the summary.
const SUMMARY_GAP: u32 = 2;

/// Writes report tables as `.xlsx` workbooks.
///
/// Layout: bold header row, one row per table row, two blank rows, then the
/// `Title`/`From`/`To` summary as label/value pairs.
#[derive(Debug, Clone, Default)]
pub struct XlsxTableExporter;

impl XlsxTableExporter {
    pub fn new() -> Self {
        Self
    }
}

/// First row of the summary block (0-based).
fn summary_start_row(table: &ReportTable) -> u32 {
    1 + table.rows.len() as u32 + SUMMARY_GAP
}

fn write_cell(sheet: &mut Worksheet, row: u32, col: u16, cell: &CellValue) -> Result<(), XlsxError> {
    match cell {
        CellValue::Text(s) => sheet.write_string(row, col, s.as_str())?,
        CellValue::Integer(n) => sheet.write_number(row, col, *n as f64)?,
        CellValue::Float(n) => sheet.write_number(row, col, *n)?,
        CellValue::Bool(b) => sheet.write_boolean(row, col, *b)?,
    };
    Ok(())
}

fn write_workbook(table: &ReportTable, path: &Path) -> Result<(), XlsxError> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(WORKSHEET_NAME)?;

    let bold = Format::new().set_bold();
    for (col, header) in table.headers().enumerate() {
        sheet.write_string_with_format(0, col as u16, header, &bold)?;
    }

    for (index, cells) in table.rows.iter().enumerate() {
        let row = index as u32 + 1;
        for (col, cell) in cells.iter().enumerate() {
            write_cell(sheet, row, col as u16, cell)?;
        }
    }

    let start = summary_start_row(table);
    for (offset, (label, value)) in table.summary.lines().into_iter().enumerate() {
        let row = start + offset as u32;
        sheet.write_string_with_format(row, 0, label, &bold)?;
        sheet.write_string(row, 1, value.as_str())?;
    }

    workbook.save(path)
}

#[async_trait]
impl TableExporter for XlsxTableExporter {
    async fn export(&self, table: &ReportTable, path: &Path) -> Result<(), ExportError> {
        let table = table.clone();
        let path: PathBuf = path.to_path_buf();

        tokio::task::spawn_blocking(move || {
            write_workbook(&table, &path).map_err(|e| ExportError::Writer(e.to_string()))?;
            debug!(path = %path.display(), rows = table.rows.len(), "Report workbook written");
            Ok::<(), ExportError>(())
        })
        .await
        .map_err(|e| ExportError::Task(e.to_string()))?
    }

    fn file_extension(&self) -> &'static str {
        "xlsx"
    }

    fn content_type(&self) -> &'static str {
        XLSX_CONTENT_TYPE
    }
}

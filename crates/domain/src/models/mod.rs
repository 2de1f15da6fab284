//! Domain models for scheduled reports.

pub mod aggregation;
pub mod recurrence;
pub mod report;
pub mod table;
pub mod time_window;

pub use aggregation::{
    Aggregation, AggregationNode, AggregationSet, Bucket, CellValue, FlatRow, UnrecognizedShape,
};
pub use recurrence::{InvalidRecurrence, RecurrenceSchedule, RecurrenceUnit};
pub use report::{
    tenant_of_index, CreateReportRequest, ListSchedulesResponse, ReportDefinition,
    ReportDefinitionError, ScheduleRow,
};
pub use table::{ColumnSpec, ReportSummary, ReportTable};
pub use time_window::{InvalidTimeFilter, TimeFilterUnit, TimeWindow};

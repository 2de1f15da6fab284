//! Database entity definitions (row mappings).

pub mod scheduled_report;

pub use scheduled_report::ScheduledReportEntity;

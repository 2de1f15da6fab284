//! Repository implementations for database operations.

pub mod scheduled_report;

pub use scheduled_report::ScheduledReportRepository;

//! Collaborator implementations and the report pipeline.

pub mod email;
pub mod query_executor;
pub mod report_runner;
pub mod table_exporter;

pub use email::EmailService;
pub use query_executor::SearchQueryExecutor;
pub use report_runner::{ReportRunner, RunError, RunSummary};
pub use table_exporter::XlsxTableExporter;

//! Domain services for scheduled reports.
//!
//! Pure transformations over the domain models plus the seams to the
//! outside world (store, search engine, exporter, mailer).

pub mod aggregation;
pub mod collaborators;
pub mod columns;
pub mod query_rewrite;
pub mod report_store;

pub use aggregation::{flatten, parse_aggregations};
pub use collaborators::{
    DeliveryError, ExportError, MailAttachment, Mailer, OutgoingMail, QueryError, QueryExecutor,
    TableExporter,
};
pub use columns::{parse_columns, reconcile};
pub use query_rewrite::{rewrite_time_window, RewriteOutcome, TIME_FIELD_ALIASES};
pub use report_store::{InMemoryReportStore, ReportStore, StoreError};

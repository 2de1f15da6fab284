//! Collaborators a report run depends on.
//!
//! Implementations live in the api crate; the traits let the pipeline be
//! exercised with in-memory fakes.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::models::{AggregationSet, ReportTable, UnrecognizedShape};

/// Errors raised while executing a search query.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Search transport error: {0}")]
    Transport(String),

    #[error("Search engine returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error(transparent)]
    UnrecognizedShape(#[from] UnrecognizedShape),

    #[error("Invalid query document: {0}")]
    InvalidDocument(String),
}

/// Errors raised while writing the report file.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Report file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Spreadsheet writer error: {0}")]
    Writer(String),

    #[error("Export task failed: {0}")]
    Task(String),
}

/// Errors raised while delivering the report mail.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Mail delivery is not configured")]
    NotConfigured,

    #[error("Invalid mail address: {0}")]
    InvalidAddress(String),

    #[error("Failed to send mail: {0}")]
    SendFailed(String),

    #[error("Mail provider error: {0}")]
    ProviderError(String),

    #[error("Failed to read attachment: {0}")]
    Attachment(#[from] std::io::Error),
}

/// Runs an aggregation query against one index.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn execute(&self, index: &str, query: &Value) -> Result<AggregationSet, QueryError>;
}

/// Writes a report table to a file.
#[async_trait]
pub trait TableExporter: Send + Sync {
    async fn export(&self, table: &ReportTable, path: &Path) -> Result<(), ExportError>;

    /// Extension of the files this exporter writes.
    fn file_extension(&self) -> &'static str;

    /// MIME type of the files this exporter writes.
    fn content_type(&self) -> &'static str;
}

/// Sends report mails.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), DeliveryError>;
}

/// A file attached to an outgoing mail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailAttachment {
    pub path: PathBuf,
    /// Name shown to the recipient.
    pub file_name: String,
    pub content_type: String,
}

/// A mail ready to be sent. The sender comes from the mailer's configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub body_html: String,
    pub body_text: String,
    pub attachment: Option<MailAttachment>,
}

//! Report run pipeline.
//!
//! One run per fire: apply the look-back window to the stored query, execute
//! it, flatten and reconcile the aggregations, export the table, mail it.
//! A failing step aborts only the current run.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use domain::models::{ReportDefinition, ReportSummary, ReportTable, TimeWindow, UnrecognizedShape};
use domain::services::{
    flatten, reconcile, rewrite_time_window, DeliveryError, ExportError, MailAttachment, Mailer,
    OutgoingMail, QueryError, QueryExecutor, RewriteOutcome, TableExporter,
};

use crate::jobs::ReportExecutor;
use crate::middleware::metrics::record_report_run;

/// Errors that abort a single report run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("Stored query is not valid JSON: {0}")]
    InvalidQuery(String),

    #[error("Stored columns are invalid: {0}")]
    InvalidColumns(#[from] UnrecognizedShape),

    #[error("Time window is out of range")]
    WindowOutOfRange,

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error("Failed to prepare report directory: {0}")]
    TmpDir(std::io::Error),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}

impl RunError {
    /// Short label used for logs and the `outcome` metric.
    pub fn kind(&self) -> &'static str {
        match self {
            RunError::InvalidQuery(_) | RunError::InvalidColumns(_) | RunError::WindowOutOfRange => {
                "invalid_definition"
            }
            RunError::Query(_) => "query_error",
            RunError::TmpDir(_) | RunError::Export(_) => "export_error",
            RunError::Delivery(_) => "delivery_error",
        }
    }
}

/// What a successful run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub window: TimeWindow,
    pub rewrite: RewriteOutcome,
    pub rows: usize,
    pub omitted_rows: usize,
}

/// Executes report runs against the configured collaborators.
pub struct ReportRunner {
    query: Arc<dyn QueryExecutor>,
    exporter: Arc<dyn TableExporter>,
    mailer: Arc<dyn Mailer>,
    tmp_dir: PathBuf,
}

impl ReportRunner {
    pub fn new(
        query: Arc<dyn QueryExecutor>,
        exporter: Arc<dyn TableExporter>,
        mailer: Arc<dyn Mailer>,
        tmp_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            query,
            exporter,
            mailer,
            tmp_dir: tmp_dir.into(),
        }
    }

    /// Runs the pipeline for `report` with the window ending at `now`.
    pub async fn run(
        &self,
        report: &ReportDefinition,
        now: DateTime<Utc>,
    ) -> Result<RunSummary, RunError> {
        let window = TimeWindow::last(report.time_filter, report.time_filter_unit, now)
            .ok_or(RunError::WindowOutOfRange)?;

        let mut query: Value = serde_json::from_str(&report.request)
            .map_err(|e| RunError::InvalidQuery(e.to_string()))?;
        let rewrite = rewrite_time_window(&mut query, &window);
        if !rewrite.is_applied() {
            warn!(
                report_id = %report.id,
                "RewriteSkipped: no time range filter found, running query without a window"
            );
        }

        let columns = report.column_specs()?;
        let aggregations = self.query.execute(&report.index, &query).await?;
        let rows = flatten(&aggregations);

        let table = reconcile(
            &columns,
            &rows,
            ReportSummary {
                title: report.title.clone(),
                from: window.start,
                to: window.end,
            },
        );
        if table.omitted_rows > 0 {
            warn!(
                report_id = %report.id,
                omitted = table.omitted_rows,
                "Rows without every declared column were omitted"
            );
        }

        tokio::fs::create_dir_all(&self.tmp_dir)
            .await
            .map_err(RunError::TmpDir)?;
        let path = self
            .tmp_dir
            .join(format!("{}.{}", Uuid::new_v4(), self.exporter.file_extension()));
        self.exporter.export(&table, &path).await?;

        let mail = self.compose_mail(report, &path);
        if let Err(e) = self.mailer.send(&mail).await {
            warn!(
                report_id = %report.id,
                path = %path.display(),
                "Delivery failed, keeping report file"
            );
            return Err(e.into());
        }

        if let Err(e) = tokio::fs::remove_file(&path).await {
            warn!(path = %path.display(), error = %e, "Failed to remove delivered report file");
        }

        Ok(summarize(window, rewrite, &table))
    }

    fn compose_mail(&self, report: &ReportDefinition, path: &Path) -> OutgoingMail {
        OutgoingMail {
            to: report.receiver.clone(),
            subject: format!("Scheduled Report - {}", report.title),
            body_html: mail_html(&report.title),
            body_text: format!(
                "This email has been sent automatically, please do not reply.\n\
                 You can find the report \"{}\" attached.",
                report.title
            ),
            attachment: Some(MailAttachment {
                path: path.to_path_buf(),
                file_name: format!("{}.{}", report.title, self.exporter.file_extension()),
                content_type: self.exporter.content_type().to_string(),
            }),
        }
    }
}

fn summarize(window: TimeWindow, rewrite: RewriteOutcome, table: &ReportTable) -> RunSummary {
    RunSummary {
        window,
        rewrite,
        rows: table.rows.len(),
        omitted_rows: table.omitted_rows,
    }
}

fn mail_html(title: &str) -> String {
    let title = escape_html(title);
    format!(
        "<!DOCTYPE html>\n\
         <html>\n\
         <head>\n\
         <meta http-equiv=\"Content-Type\" content=\"text/html; charset=utf-8\" />\n\
         <title>Scheduled Report - {title}</title>\n\
         </head>\n\
         <body>\n\
         <p>This email has been sent automatically (you don't have to reply).</p>\n\
         <p style=\"margin: 5px;\">You can find your report as an attached file.</p>\n\
         <p><strong>Thanks!</strong></p>\n\
         </body>\n\
         </html>"
    )
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[async_trait]
impl ReportExecutor for ReportRunner {
    async fn execute(&self, report: Arc<ReportDefinition>) -> Result<(), String> {
        let start = Instant::now();

        match self.run(&report, Utc::now()).await {
            Ok(summary) => {
                record_report_run("success", start.elapsed());
                info!(
                    report_id = %report.id,
                    rows = summary.rows,
                    omitted = summary.omitted_rows,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Report delivered"
                );
                Ok(())
            }
            Err(e) => {
                record_report_run(e.kind(), start.elapsed());
                Err(format!("{}: {}", e.kind(), e))
            }
        }
    }
}

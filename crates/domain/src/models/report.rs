//! Scheduled report domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use validator::Validate;

use shared::validation::{validate_index_name, validate_not_blank};

use super::aggregation::UnrecognizedShape;
use super::recurrence::{InvalidRecurrence, RecurrenceSchedule, RecurrenceUnit};
use super::table::ColumnSpec;
use super::time_window::{InvalidTimeFilter, TimeFilterUnit, TimeWindow};
use crate::services::columns::parse_columns;

/// Errors raised while turning a creation request into a definition.
#[derive(Debug, Error)]
pub enum ReportDefinitionError {
    #[error(transparent)]
    InvalidRecurrence(#[from] InvalidRecurrence),

    #[error(transparent)]
    InvalidTimeFilter(#[from] InvalidTimeFilter),

    #[error("Invalid query document: {0}")]
    InvalidQuery(String),

    #[error(transparent)]
    InvalidColumns(#[from] UnrecognizedShape),

    #[error("Index name does not carry a tenant prefix: {0}")]
    MissingTenant(String),
}

/// A stored scheduled report.
///
/// Definitions are immutable once created; an edit is a replacement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportDefinition {
    pub id: String,
    pub company_id: String,
    /// Cron form of the recurrence, kept for display.
    pub cron_schedule: String,
    pub visualization_id: String,
    pub receiver: String,
    pub index: String,
    /// Serialized search request.
    pub request: String,
    pub title: String,
    pub duration: u32,
    pub duration_unit: RecurrenceUnit,
    pub time_filter: u32,
    pub time_filter_unit: TimeFilterUnit,
    /// Serialized `[{name, key}]` column list.
    pub columns: String,
    pub created_at: DateTime<Utc>,
}

impl ReportDefinition {
    /// Builds a definition from a validated creation request.
    pub fn from_request(
        request: CreateReportRequest,
        id: String,
        created_at: DateTime<Utc>,
    ) -> Result<Self, ReportDefinitionError> {
        let duration_unit: RecurrenceUnit = request.duration_unit.parse()?;
        let schedule = RecurrenceSchedule::new(request.duration, duration_unit)?;
        let time_filter_unit: TimeFilterUnit = request.time_filter_unit.parse()?;
        if TimeWindow::last(request.time_filter, time_filter_unit, created_at).is_none() {
            return Err(InvalidTimeFilter(format!(
                "last {} {} reaches before the earliest supported date",
                request.time_filter, time_filter_unit
            ))
            .into());
        }

        let company_id = tenant_of_index(&request.index)
            .ok_or_else(|| ReportDefinitionError::MissingTenant(request.index.clone()))?
            .to_string();

        let query = stored_document(request.request);
        match serde_json::from_str::<Value>(&query) {
            Ok(Value::Object(_)) => {}
            Ok(_) => {
                return Err(ReportDefinitionError::InvalidQuery(
                    "expected a JSON object".to_string(),
                ))
            }
            Err(e) => return Err(ReportDefinitionError::InvalidQuery(e.to_string())),
        }

        let columns = stored_document(request.columns);
        let parsed = parse_columns(&columns)?;
        if parsed.is_empty() {
            return Err(UnrecognizedShape::new("columns", "at least one column is required").into());
        }

        Ok(Self {
            id,
            company_id,
            cron_schedule: schedule.cron_expression(),
            visualization_id: request.visualization_id,
            receiver: request.receiver,
            index: request.index,
            request: query,
            title: request.title,
            duration: request.duration,
            duration_unit,
            time_filter: request.time_filter,
            time_filter_unit,
            columns,
            created_at,
        })
    }

    /// Recurrence derived from the stored `(duration, unit)` pair.
    pub fn recurrence(&self) -> Result<RecurrenceSchedule, InvalidRecurrence> {
        RecurrenceSchedule::new(self.duration, self.duration_unit)
    }

    /// Declared columns, parsed from the stored list.
    pub fn column_specs(&self) -> Result<Vec<ColumnSpec>, UnrecognizedShape> {
        parse_columns(&self.columns)
    }

    /// Human readable recurrence, e.g. `3 hour`.
    pub fn report_every(&self) -> String {
        format!("{} {}", self.duration, self.duration_unit)
    }

    /// Human readable look-back window, e.g. `Last 7 day`.
    pub fn time_filter_label(&self) -> String {
        format!("Last {} {}", self.time_filter, self.time_filter_unit)
    }
}

/// Tenant identifier encoded in an index name (the prefix before the first `-`).
pub fn tenant_of_index(index: &str) -> Option<&str> {
    index.split('-').next().filter(|tenant| !tenant.is_empty())
}

/// Documents may arrive either as JSON text or as inline JSON.
fn stored_document(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

/// Request payload for creating a scheduled report.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateReportRequest {
    #[validate(custom(function = "validate_index_name"))]
    pub index: String,

    #[serde(default)]
    pub visualization_id: String,

    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    #[validate(custom(function = "validate_not_blank"))]
    pub title: String,

    /// Search request, as JSON text or inline JSON.
    pub request: Value,

    #[validate(range(
        min = 1,
        max = 2_147_483_647,
        message = "Duration must be a positive integer"
    ))]
    pub duration: u32,

    pub duration_unit: String,

    #[validate(email(message = "Receiver must be a valid email address"))]
    pub receiver: String,

    #[validate(range(
        min = 1,
        max = 2_147_483_647,
        message = "Time filter must be a positive integer"
    ))]
    pub time_filter: u32,

    pub time_filter_unit: String,

    /// Column list, as JSON text or inline JSON.
    pub columns: Value,
}

/// One row of the schedules listing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRow {
    pub id: usize,
    pub vis_id: String,
    pub vis_name: String,
    pub index: String,
    pub report_every: String,
    pub time_filter: String,
}

impl ScheduleRow {
    /// Builds a 1-based listing row for a definition.
    pub fn from_definition(position: usize, report: &ReportDefinition) -> Self {
        Self {
            id: position + 1,
            vis_id: report.id.clone(),
            vis_name: report.title.clone(),
            index: report.index.clone(),
            report_every: report.report_every(),
            time_filter: report.time_filter_label(),
        }
    }
}

/// Response for listing a tenant's schedules.
#[derive(Debug, Clone, Serialize)]
pub struct ListSchedulesResponse {
    pub rows: Vec<ScheduleRow>,
}

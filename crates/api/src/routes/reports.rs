//! Scheduled report endpoint handlers.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::jobs::SchedulerError;
use domain::models::{
    CreateReportRequest, ListSchedulesResponse, RecurrenceSchedule, ReportDefinition, ScheduleRow,
};
use domain::services::ReportStore;

/// Query parameters for schedule listing.
#[derive(Debug, Deserialize)]
pub struct ListSchedulesQuery {
    pub tenant: Option<String>,
}

/// Confirmation returned by create and delete.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    fn new(message: &str) -> Json<Self> {
        Json(Self {
            message: message.to_string(),
        })
    }
}

/// Create and schedule a report.
///
/// PUT /api/scheduled_reports/create
pub async fn create_report(
    State(state): State<AppState>,
    Json(request): Json<CreateReportRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    request.validate()?;

    // Reject unknown units before anything is stored.
    RecurrenceSchedule::parse(request.duration, &request.duration_unit)?;

    let report = ReportDefinition::from_request(request, Uuid::new_v4().to_string(), Utc::now())?;
    let id = report.id.clone();
    let tenant = report.company_id.clone();

    if state.scheduler.is_shutting_down() {
        return Err(SchedulerError::ShuttingDown.into());
    }

    state.store.put(&report).await?;

    if let Err(e) = state.scheduler.schedule(report) {
        warn!(report_id = %id, error = %e, "Report stored but not scheduled, removing it");
        if let Err(delete_err) = state.store.delete(&id).await {
            error!(report_id = %id, error = %delete_err, "Failed to remove unscheduled report");
        }
        return Err(e.into());
    }

    info!(report_id = %id, tenant = %tenant, "Scheduled report created");

    Ok(MessageResponse::new(
        "Your scheduled report has been created successfully.",
    ))
}

/// List a tenant's scheduled reports, oldest first.
///
/// GET /api/scheduled_reports/get_schedules?tenant=<id>
pub async fn list_schedules(
    State(state): State<AppState>,
    Query(query): Query<ListSchedulesQuery>,
) -> Result<Json<ListSchedulesResponse>, ApiError> {
    let tenant = query
        .tenant
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| ApiError::Validation("tenant query parameter is required".to_string()))?;

    let reports = state.store.list_by_tenant(&tenant).await?;
    let rows = reports
        .iter()
        .enumerate()
        .map(|(position, report)| ScheduleRow::from_definition(position, report))
        .collect();

    Ok(Json(ListSchedulesResponse { rows }))
}

/// Stop and delete a scheduled report.
///
/// DELETE /api/scheduled_reports/delete/:id
pub async fn delete_report(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    if state.store.get(&id).await?.is_none() {
        // drop any stray timer for the id
        state.scheduler.cancel(&id);
        return Err(ApiError::NotFound("Scheduled report not found".to_string()));
    }

    if !state.scheduler.cancel(&id) {
        warn!(report_id = %id, "Deleting report without a live schedule");
    }

    if !state.store.delete(&id).await? {
        return Err(ApiError::NotFound("Scheduled report not found".to_string()));
    }

    info!(report_id = %id, "Scheduled report deleted");

    Ok(MessageResponse::new(
        "Your scheduled report has been deleted successfully.",
    ))
}

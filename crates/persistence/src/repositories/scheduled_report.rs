//! Scheduled report repository for database operations.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::error;

use domain::models::ReportDefinition;
use domain::services::{ReportStore, StoreError};

use crate::entities::ScheduledReportEntity;
use crate::metrics::QueryTimer;

/// Postgres-backed report store.
#[derive(Clone)]
pub struct ScheduledReportRepository {
    pool: PgPool,
}

impl ScheduledReportRepository {
    /// Creates a new ScheduledReportRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Converts an unsigned count to its `INTEGER` column value.
fn int_column(id: &str, field: &str, value: u32) -> Result<i32, StoreError> {
    i32::try_from(value).map_err(|_| StoreError::Invalid {
        id: id.to_string(),
        reason: format!("{field} {value} exceeds the column range"),
    })
}

fn unavailable(operation: &str, err: sqlx::Error) -> StoreError {
    error!(operation = %operation, error = %err, "Report store query failed");
    StoreError::Unavailable(err.to_string())
}

#[async_trait]
impl ReportStore for ScheduledReportRepository {
    async fn get(&self, id: &str) -> Result<Option<ReportDefinition>, StoreError> {
        let timer = QueryTimer::new("find_scheduled_report_by_id");
        let result = sqlx::query_as::<_, ScheduledReportEntity>(
            r#"
            SELECT * FROM scheduled_reports WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();

        result
            .map_err(|e| unavailable("get", e))?
            .map(ReportDefinition::try_from)
            .transpose()
    }

    async fn put(&self, report: &ReportDefinition) -> Result<(), StoreError> {
        let duration = int_column(&report.id, "duration", report.duration)?;
        let time_filter = int_column(&report.id, "time_filter", report.time_filter)?;

        let timer = QueryTimer::new("upsert_scheduled_report");
        let result = sqlx::query(
            r#"
            INSERT INTO scheduled_reports (
                id, company_id, cron_schedule, visualization_id, receiver, index_name,
                request, title, duration, duration_unit, time_filter, time_filter_unit,
                column_specs, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            ON CONFLICT (id) DO UPDATE SET
                company_id = EXCLUDED.company_id,
                cron_schedule = EXCLUDED.cron_schedule,
                visualization_id = EXCLUDED.visualization_id,
                receiver = EXCLUDED.receiver,
                index_name = EXCLUDED.index_name,
                request = EXCLUDED.request,
                title = EXCLUDED.title,
                duration = EXCLUDED.duration,
                duration_unit = EXCLUDED.duration_unit,
                time_filter = EXCLUDED.time_filter,
                time_filter_unit = EXCLUDED.time_filter_unit,
                column_specs = EXCLUDED.column_specs,
                updated_at = NOW()
            "#,
        )
        .bind(&report.id)
        .bind(&report.company_id)
        .bind(&report.cron_schedule)
        .bind(&report.visualization_id)
        .bind(&report.receiver)
        .bind(&report.index)
        .bind(&report.request)
        .bind(&report.title)
        .bind(duration)
        .bind(report.duration_unit.as_str())
        .bind(time_filter)
        .bind(report.time_filter_unit.as_str())
        .bind(&report.columns)
        .bind(report.created_at)
        .execute(&self.pool)
        .await;
        timer.record();

        result.map(|_| ()).map_err(|e| unavailable("put", e))
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let timer = QueryTimer::new("delete_scheduled_report");
        let result = sqlx::query(
            r#"
            DELETE FROM scheduled_reports WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await;
        timer.record();

        result
            .map(|r| r.rows_affected() > 0)
            .map_err(|e| unavailable("delete", e))
    }

    async fn list_by_tenant(&self, tenant: &str) -> Result<Vec<ReportDefinition>, StoreError> {
        let timer = QueryTimer::new("list_scheduled_reports_by_tenant");
        let result = sqlx::query_as::<_, ScheduledReportEntity>(
            r#"
            SELECT * FROM scheduled_reports
            WHERE company_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(tenant)
        .fetch_all(&self.pool)
        .await;
        timer.record();

        result
            .map_err(|e| unavailable("list_by_tenant", e))?
            .into_iter()
            .map(ReportDefinition::try_from)
            .collect()
    }

    async fn list_tenants(&self) -> Result<Vec<String>, StoreError> {
        let timer = QueryTimer::new("list_scheduled_report_tenants");
        let result = sqlx::query_scalar::<_, String>(
            r#"
            SELECT DISTINCT company_id FROM scheduled_reports ORDER BY company_id
            "#,
        )
        .fetch_all(&self.pool)
        .await;
        timer.record();

        result.map_err(|e| unavailable("list_tenants", e))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(|e| unavailable("ping", e))
    }
}

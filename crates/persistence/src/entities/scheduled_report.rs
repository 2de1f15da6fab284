//! Scheduled report entity (database row mapping).

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use domain::models::{RecurrenceUnit, ReportDefinition, TimeFilterUnit};
use domain::services::StoreError;

/// Database row mapping for the scheduled_reports table.
#[derive(Debug, Clone, FromRow)]
pub struct ScheduledReportEntity {
    pub id: String,
    pub company_id: String,
    pub cron_schedule: String,
    pub visualization_id: String,
    pub receiver: String,
    pub index_name: String,
    pub request: String,
    pub title: String,
    pub duration: i32,
    pub duration_unit: String,
    pub time_filter: i32,
    pub time_filter_unit: String,
    pub column_specs: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<ScheduledReportEntity> for ReportDefinition {
    type Error = StoreError;

    fn try_from(entity: ScheduledReportEntity) -> Result<Self, Self::Error> {
        let corrupt = |reason: String| StoreError::Corrupt {
            id: entity.id.clone(),
            reason,
        };

        let duration_unit: RecurrenceUnit = entity
            .duration_unit
            .parse()
            .map_err(|e: domain::models::InvalidRecurrence| corrupt(e.to_string()))?;
        let time_filter_unit: TimeFilterUnit = entity
            .time_filter_unit
            .parse()
            .map_err(|e: domain::models::InvalidTimeFilter| corrupt(e.to_string()))?;
        let duration = u32::try_from(entity.duration)
            .map_err(|_| corrupt(format!("negative duration {}", entity.duration)))?;
        let time_filter = u32::try_from(entity.time_filter)
            .map_err(|_| corrupt(format!("negative time filter {}", entity.time_filter)))?;

        Ok(Self {
            id: entity.id,
            company_id: entity.company_id,
            cron_schedule: entity.cron_schedule,
            visualization_id: entity.visualization_id,
            receiver: entity.receiver,
            index: entity.index_name,
            request: entity.request,
            title: entity.title,
            duration,
            duration_unit,
            time_filter,
            time_filter_unit,
            columns: entity.column_specs,
            created_at: entity.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_entity() -> ScheduledReportEntity {
        ScheduledReportEntity {
            id: "r-1".to_string(),
            company_id: "acme".to_string(),
            cron_schedule: "0 0 0/3 1/1 * *".to_string(),
            visualization_id: "vis-1".to_string(),
            receiver: "ops@example.com".to_string(),
            index_name: "acme-alarms".to_string(),
            request: r#"{"size":0}"#.to_string(),
            title: "Alarms".to_string(),
            duration: 3,
            duration_unit: "hour".to_string(),
            time_filter: 7,
            time_filter_unit: "day".to_string(),
            column_specs: r#"[{"name":"Region","key":"region"}]"#.to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_entity_to_domain() {
        let entity = create_test_entity();
        let report = ReportDefinition::try_from(entity.clone()).unwrap();

        assert_eq!(report.id, entity.id);
        assert_eq!(report.index, "acme-alarms");
        assert_eq!(report.duration, 3);
        assert_eq!(report.duration_unit, RecurrenceUnit::Hour);
        assert_eq!(report.time_filter_unit, TimeFilterUnit::Day);
        assert_eq!(report.columns, entity.column_specs);
    }

    #[test]
    fn test_entity_with_unknown_unit_is_corrupt() {
        let mut entity = create_test_entity();
        entity.duration_unit = "week".to_string();

        let err = ReportDefinition::try_from(entity).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { ref id, .. } if id == "r-1"));
    }

    #[test]
    fn test_entity_with_negative_duration_is_corrupt() {
        let mut entity = create_test_entity();
        entity.time_filter = -1;

        assert!(ReportDefinition::try_from(entity).is_err());
    }
}

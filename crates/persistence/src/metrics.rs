//! Report store query metrics.

use metrics::{gauge, histogram};
use sqlx::PgPool;
use std::time::Instant;

/// Histogram of report store query durations, labelled by query name.
pub const QUERY_DURATION_METRIC: &str = "database_query_duration_seconds";

fn record_query_duration(query_name: &str, duration_secs: f64) {
    histogram!(QUERY_DURATION_METRIC, "query" => query_name.to_string()).record(duration_secs);
}

/// Publishes connection pool occupancy gauges.
pub fn record_pool_metrics(pool: &PgPool) {
    let size = pool.size() as usize;
    let idle = pool.num_idle();

    gauge!("database_connections_total").set(size as f64);
    gauge!("database_connections_idle").set(idle as f64);
    gauge!("database_connections_active").set(size.saturating_sub(idle) as f64);
}

/// Times one repository query.
///
/// ```ignore
/// let timer = QueryTimer::new("list_scheduled_report_tenants");
/// let result = sqlx::query_scalar::<_, String>(..).fetch_all(&pool).await;
/// timer.record();
/// ```
pub struct QueryTimer {
    query_name: &'static str,
    start: Instant,
}

impl QueryTimer {
    pub fn new(query_name: &'static str) -> Self {
        Self {
            query_name,
            start: Instant::now(),
        }
    }

    /// Records the elapsed time and consumes the timer.
    pub fn record(self) {
        record_query_duration(self.query_name, self.start.elapsed().as_secs_f64());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_timer_keeps_name() {
        let timer = QueryTimer::new("delete_scheduled_report");
        assert_eq!(timer.query_name, "delete_scheduled_report");
    }

    #[test]
    fn test_record_without_recorder_is_noop() {
        QueryTimer::new("list_scheduled_report_tenants").record();
    }
}

//! Periodic connection pool metrics.

use sqlx::PgPool;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Pool metrics are recorded every 10 seconds for real-time monitoring.
pub const POOL_METRICS_INTERVAL: Duration = Duration::from_secs(10);

/// Records pool gauges every `POOL_METRICS_INTERVAL` until `token` is cancelled.
pub fn spawn_pool_metrics(pool: PgPool, token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(POOL_METRICS_INTERVAL);

        loop {
            tokio::select! {
                _ = interval.tick() => persistence::metrics::record_pool_metrics(&pool),
                _ = token.cancelled() => {
                    debug!("Pool metrics task stopped");
                    break;
                }
            }
        }
    })
}

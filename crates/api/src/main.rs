use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use domain::services::ReportStore;
use persistence::repositories::ScheduledReportRepository;
use scheduled_reports_api::{
    app,
    config::Config,
    jobs::{spawn_pool_metrics, ReportScheduler},
    middleware,
    services::{EmailService, ReportRunner, SearchQueryExecutor, XlsxTableExporter},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let config = Config::load()?;

    middleware::logging::init_logging(&config.logging)?;
    middleware::init_metrics()?;

    info!("Starting Scheduled Reports API v{}", env!("CARGO_PKG_VERSION"));

    let pool = persistence::db::create_pool(&(&config.database).into()).await?;

    persistence::db::run_migrations(&pool).await?;

    let store: Arc<dyn ReportStore> = Arc::new(ScheduledReportRepository::new(pool.clone()));

    let mailer = EmailService::new(config.email.clone());
    if !mailer.is_enabled() {
        warn!("Email delivery is disabled; report files will be kept in the tmp directory");
    }

    let runner = ReportRunner::new(
        Arc::new(SearchQueryExecutor::new(&config.search)?),
        Arc::new(XlsxTableExporter::new()),
        Arc::new(mailer),
        config.reports.tmp_dir.clone(),
    );
    let scheduler = Arc::new(ReportScheduler::new(Arc::new(runner)));

    if config.reports.warm_start {
        scheduler.warm_start(store.as_ref()).await?;
    }

    let background = CancellationToken::new();
    let pool_metrics = spawn_pool_metrics(pool.clone(), background.clone());

    let app = app::create_app(config.clone(), store, scheduler.clone());

    let addr = config.socket_addr()?;
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.shutdown();
    scheduler
        .wait_for_shutdown(Duration::from_secs(config.reports.shutdown_timeout_secs))
        .await;

    background.cancel();
    if let Err(e) = pool_metrics.await {
        warn!("Pool metrics task panicked: {}", e);
    }
    pool.close().await;

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

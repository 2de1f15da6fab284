use axum::{
    middleware,
    routing::{delete, get, put},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use domain::services::ReportStore;

use crate::config::Config;
use crate::jobs::ReportScheduler;
use crate::middleware::{metrics_handler, metrics_middleware, trace_id};
use crate::routes::{health, reports};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn ReportStore>,
    pub scheduler: Arc<ReportScheduler>,
}

pub fn create_app(
    config: Config,
    store: Arc<dyn ReportStore>,
    scheduler: Arc<ReportScheduler>,
) -> Router {
    let config = Arc::new(config);

    let state = AppState {
        config: config.clone(),
        store,
        scheduler,
    };

    // Build CORS layer based on configuration
    let cors = if config.server.cors_origins.is_empty() {
        // Default: allow any origin (for development)
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = config
            .server
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    let report_routes = Router::new()
        .route("/api/scheduled_reports/create", put(reports::create_report))
        .route(
            "/api/scheduled_reports/get_schedules",
            get(reports::list_schedules),
        )
        .route(
            "/api/scheduled_reports/delete/:id",
            delete(reports::delete_report),
        );

    let public_routes = Router::new()
        .route("/api/health", get(health::health_check))
        .route("/api/health/live", get(health::live))
        .route("/api/health/ready", get(health::ready))
        .route("/metrics", get(metrics_handler));

    Router::new()
        .merge(public_routes)
        .merge(report_routes)
        // Global middleware (order matters: bottom layers run first)
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_id))
        .layer(cors)
        .with_state(state)
}

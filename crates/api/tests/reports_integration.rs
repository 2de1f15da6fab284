//! Integration tests for the scheduled report endpoints.

mod common;

use axum::http::{Method, StatusCode};
use common::{create_payload, create_test_app, empty_request, json_request, parse_response_body};
use domain::services::ReportStore;
use tower::ServiceExt;

// ============================================================================
// Create
// ============================================================================

#[tokio::test]
async fn test_create_report_stores_and_schedules() {
    let app = create_test_app();

    let response = app
        .router
        .clone()
        .oneshot(json_request(
            Method::PUT,
            "/api/scheduled_reports/create",
            &create_payload("Alarms"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = parse_response_body(response).await;
    assert_eq!(
        body["message"],
        "Your scheduled report has been created successfully."
    );

    let stored = app.store.list_by_tenant("acme").await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].company_id, "acme");
    assert_eq!(stored[0].cron_schedule, "0 0 0/3 1/1 * *");
    assert!(app.scheduler.is_scheduled(&stored[0].id));

    app.scheduler.shutdown();
}

#[tokio::test]
async fn test_create_report_unknown_unit_is_rejected() {
    let app = create_test_app();
    let mut payload = create_payload("Alarms");
    payload["durationUnit"] = "week".into();

    let response = app
        .router
        .clone()
        .oneshot(json_request(
            Method::PUT,
            "/api/scheduled_reports/create",
            &payload,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = parse_response_body(response).await;
    assert_eq!(body["message"], "Failed to create scheduled report");
    assert!(app.store.list_tenants().await.unwrap().is_empty());
    assert!(app.scheduler.active_jobs().is_empty());
}

#[tokio::test]
async fn test_create_report_invalid_receiver() {
    let app = create_test_app();
    let mut payload = create_payload("Alarms");
    payload["receiver"] = "not-an-email".into();

    let response = app
        .router
        .clone()
        .oneshot(json_request(
            Method::PUT,
            "/api/scheduled_reports/create",
            &payload,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = parse_response_body(response).await;
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn test_create_report_accepts_text_documents() {
    let app = create_test_app();
    let mut payload = create_payload("Alarms");
    payload["request"] = payload["request"].to_string().into();
    payload["columns"] = payload["columns"].to_string().into();

    let response = app
        .router
        .clone()
        .oneshot(json_request(
            Method::PUT,
            "/api/scheduled_reports/create",
            &payload,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    app.scheduler.shutdown();
}

#[tokio::test]
async fn test_create_report_accepts_wildcard_index() {
    let app = create_test_app();
    let mut payload = create_payload("Alarms");
    payload["index"] = "acme-alarms-*".into();

    let response = app
        .router
        .clone()
        .oneshot(json_request(
            Method::PUT,
            "/api/scheduled_reports/create",
            &payload,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let stored = app.store.list_by_tenant("acme").await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].index, "acme-alarms-*");

    app.scheduler.shutdown();
}

#[tokio::test]
async fn test_create_report_oversized_duration_is_rejected() {
    let app = create_test_app();
    let mut payload = create_payload("Alarms");
    payload["duration"] = 3_000_000_000u32.into();

    let response = app
        .router
        .clone()
        .oneshot(json_request(
            Method::PUT,
            "/api/scheduled_reports/create",
            &payload,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(app.store.list_tenants().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_create_report_during_shutdown_stores_nothing() {
    let app = create_test_app();
    app.scheduler.shutdown();

    let response = app
        .router
        .clone()
        .oneshot(json_request(
            Method::PUT,
            "/api/scheduled_reports/create",
            &create_payload("Alarms"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(app.store.list_tenants().await.unwrap().is_empty());
}

// ============================================================================
// List
// ============================================================================

#[tokio::test]
async fn test_list_schedules_for_tenant() {
    let app = create_test_app();

    for title in ["Alarms", "Trips"] {
        let response = app
            .router
            .clone()
            .oneshot(json_request(
                Method::PUT,
                "/api/scheduled_reports/create",
                &create_payload(title),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .router
        .clone()
        .oneshot(empty_request(
            Method::GET,
            "/api/scheduled_reports/get_schedules?tenant=acme",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = parse_response_body(response).await;
    let rows = body["rows"].as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["id"], 1);
    assert_eq!(rows[1]["id"], 2);
    assert_eq!(rows[0]["reportEvery"], "3 hour");
    assert_eq!(rows[0]["timeFilter"], "Last 7 day");
    assert_eq!(rows[0]["index"], "acme-alarms");

    app.scheduler.shutdown();
}

#[tokio::test]
async fn test_list_schedules_other_tenant_is_empty() {
    let app = create_test_app();

    let response = app
        .router
        .clone()
        .oneshot(empty_request(
            Method::GET,
            "/api/scheduled_reports/get_schedules?tenant=globex",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = parse_response_body(response).await;
    assert!(body["rows"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_list_schedules_requires_tenant() {
    let app = create_test_app();

    let response = app
        .router
        .clone()
        .oneshot(empty_request(
            Method::GET,
            "/api/scheduled_reports/get_schedules",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ============================================================================
// Delete
// ============================================================================

#[tokio::test]
async fn test_delete_report_cancels_and_removes() {
    let app = create_test_app();

    app.router
        .clone()
        .oneshot(json_request(
            Method::PUT,
            "/api/scheduled_reports/create",
            &create_payload("Alarms"),
        ))
        .await
        .unwrap();
    let id = app.store.list_by_tenant("acme").await.unwrap()[0].id.clone();

    let response = app
        .router
        .clone()
        .oneshot(empty_request(
            Method::DELETE,
            &format!("/api/scheduled_reports/delete/{}", id),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = parse_response_body(response).await;
    assert_eq!(
        body["message"],
        "Your scheduled report has been deleted successfully."
    );
    assert!(!app.scheduler.is_scheduled(&id));
    assert!(app.store.get(&id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_delete_unknown_report() {
    let app = create_test_app();

    let response = app
        .router
        .clone()
        .oneshot(empty_request(
            Method::DELETE,
            "/api/scheduled_reports/delete/missing",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn test_health_endpoints() {
    let app = create_test_app();

    for uri in ["/api/health", "/api/health/live", "/api/health/ready"] {
        let response = app
            .router
            .clone()
            .oneshot(empty_request(Method::GET, uri))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK, "{}", uri);
    }
}

#[tokio::test]
async fn test_response_carries_request_id() {
    let app = create_test_app();

    let response = app
        .router
        .clone()
        .oneshot(empty_request(Method::GET, "/api/health/live"))
        .await
        .unwrap();

    assert!(response.headers().contains_key("x-request-id"));
}

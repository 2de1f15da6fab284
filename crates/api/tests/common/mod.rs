//! Common test utilities for integration tests.
//!
//! The app runs against the in-memory report store and a recording
//! executor, so no database, search engine or mail server is needed.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Method, Request, Response},
    Router,
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

use domain::models::ReportDefinition;
use domain::services::{InMemoryReportStore, ReportStore};
use scheduled_reports_api::{
    app::create_app,
    config::Config,
    jobs::{ReportExecutor, ReportScheduler},
};

/// Records the ids of every report it is asked to run.
#[derive(Default)]
pub struct RecordingExecutor {
    pub runs: Mutex<Vec<String>>,
}

#[async_trait]
impl ReportExecutor for RecordingExecutor {
    async fn execute(&self, report: Arc<ReportDefinition>) -> Result<(), String> {
        self.runs.lock().unwrap().push(report.id.clone());
        Ok(())
    }
}

/// Application under test plus handles on its collaborators.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<InMemoryReportStore>,
    pub scheduler: Arc<ReportScheduler>,
}

pub fn test_config() -> Config {
    Config::load_for_test(&[]).expect("Failed to load test config")
}

pub fn create_test_app() -> TestApp {
    let store = Arc::new(InMemoryReportStore::new());
    let scheduler = Arc::new(ReportScheduler::new(Arc::new(RecordingExecutor::default())));
    let router = create_app(
        test_config(),
        store.clone() as Arc<dyn ReportStore>,
        scheduler.clone(),
    );

    TestApp {
        router,
        store,
        scheduler,
    }
}

/// A valid creation payload for the `acme` tenant.
pub fn create_payload(title: &str) -> Value {
    json!({
        "index": "acme-alarms",
        "visualizationId": "vis-1",
        "title": title,
        "request": {
            "size": 0,
            "query": { "bool": { "filter": [
                { "range": { "timestamp": { "gte": "now-7d" } } }
            ]}},
            "aggs": { "region": { "terms": { "field": "region" } } }
        },
        "duration": 3,
        "durationUnit": "hour",
        "receiver": "ops@example.com",
        "timeFilter": 7,
        "timeFilterUnit": "day",
        "columns": [
            { "name": "Region", "key": "region" },
            { "name": "Count", "key": "count" }
        ]
    })
}

pub fn json_request(method: Method, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn empty_request(method: Method, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub async fn parse_response_body(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap_or(Value::Null)
}

//! Search engine query executor.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, error};

use domain::models::{AggregationSet, UnrecognizedShape};
use domain::services::{parse_aggregations, QueryError, QueryExecutor};

use crate::config::SearchConfig;

/// Runs report queries through the engine's `_search` endpoint.
#[derive(Clone)]
pub struct SearchQueryExecutor {
    client: reqwest::Client,
    base_url: String,
    credentials: Option<(String, String)>,
}

impl SearchQueryExecutor {
    pub fn new(config: &SearchConfig) -> Result<Self, reqwest::Error> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            credentials: config
                .credentials()
                .map(|(user, pass)| (user.to_string(), pass.to_string())),
        })
    }

    fn search_url(&self, index: &str) -> String {
        format!("{}/{}/_search", self.base_url, index)
    }
}

#[async_trait]
impl QueryExecutor for SearchQueryExecutor {
    async fn execute(&self, index: &str, query: &Value) -> Result<AggregationSet, QueryError> {
        if !query.is_object() {
            return Err(QueryError::InvalidDocument(
                "query must be a JSON object".to_string(),
            ));
        }

        let mut request = self.client.post(self.search_url(index)).json(query);
        if let Some((user, pass)) = &self.credentials {
            request = request.basic_auth(user, Some(pass));
        }

        let response = request
            .send()
            .await
            .map_err(|e| QueryError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(index = %index, status = %status, "Search request rejected");
            return Err(QueryError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| QueryError::Transport(e.to_string()))?;

        let aggregations = body.get("aggregations").ok_or_else(|| {
            UnrecognizedShape::new("search response", "response carries no aggregations")
        })?;

        let parsed = parse_aggregations(aggregations)?;
        debug!(index = %index, aggregations = parsed.len(), "Search query executed");
        Ok(parsed)
    }
}

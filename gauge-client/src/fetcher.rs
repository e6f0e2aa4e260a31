//! The data-fetch collaborator and its HTTP implementation.

use async_trait::async_trait;
use gauge_cache::QueryKey;
use gauge_core::{ErrorKind, GaugeError, GaugeResult};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Source of raw analytics results.
///
/// Every error must carry an [`ErrorKind`] so the retry layer can decide
/// without inspecting messages.
#[async_trait]
pub trait DataFetcher: Send + Sync {
    /// Fetch the result of a named query.
    async fn fetch(&self, query: &QueryKey) -> GaugeResult<Value>;

    /// Send a mutation for a named resource.
    async fn submit(&self, query: &QueryKey, body: &Value) -> GaugeResult<Value>;
}

/// Fetches `GET {base}/api/analytics/{name}?{params}` over HTTP.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    base_url: String,
}

impl HttpFetcher {
    pub fn new(base_url: &str, timeout: Duration) -> GaugeResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GaugeError::operation(ErrorKind::Internal, e.to_string()))?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn endpoint(&self, name: &str) -> String {
        format!("{}/api/analytics/{}", self.base_url, name)
    }

    async fn parse_response(&self, name: &str, response: reqwest::Response) -> GaugeResult<Value> {
        let status = response.status();
        if status.is_success() {
            let text = response
                .text()
                .await
                .map_err(|e| transport_error(name, e))?;
            if text.trim().is_empty() {
                return Ok(Value::Null);
            }
            return Ok(serde_json::from_str(&text)?);
        }

        let text = response.text().await.unwrap_or_default();
        Err(status_error(name, status.as_u16(), &text))
    }
}

#[async_trait]
impl DataFetcher for HttpFetcher {
    async fn fetch(&self, query: &QueryKey) -> GaugeResult<Value> {
        let url = self.endpoint(&query.name);
        debug!(url = %url, query = %query, "fetching");
        let response = self
            .client
            .get(url)
            .query(&query.query_pairs())
            .send()
            .await
            .map_err(|e| transport_error(&query.name, e))?;
        self.parse_response(&query.name, response).await
    }

    async fn submit(&self, query: &QueryKey, body: &Value) -> GaugeResult<Value> {
        let url = self.endpoint(&query.name);
        debug!(url = %url, "submitting");
        let response = self
            .client
            .post(url)
            .query(&query.query_pairs())
            .json(body)
            .send()
            .await
            .map_err(|e| transport_error(&query.name, e))?;
        self.parse_response(&query.name, response).await
    }
}

/// Map a non-2xx response to an error, preferring the server's
/// `{"error": "..."}` message.
pub fn status_error(name: &str, status: u16, body: &str) -> GaugeError {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| format!("Failed to fetch {}", name));
    GaugeError::operation(ErrorKind::from_status(status), message)
}

fn transport_error(name: &str, err: reqwest::Error) -> GaugeError {
    let kind = if err.is_timeout() {
        ErrorKind::Timeout
    } else if err.is_decode() {
        ErrorKind::Serialization
    } else {
        ErrorKind::Network
    };
    GaugeError::operation(kind, format!("Network error fetching {}: {}", name, err))
}

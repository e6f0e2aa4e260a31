//! Liveness probing.

use async_trait::async_trait;
use gauge_core::{ErrorKind, GaugeError, GaugeResult};
use std::time::Duration;

/// A minimal reachability check. Only success or failure matters.
#[async_trait]
pub trait LivenessProbe: Send + Sync {
    async fn probe(&self) -> GaugeResult<()>;
}

/// Issues `HEAD {base}{health_path}`; any 2xx counts as reachable.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: reqwest::Client,
    url: String,
}

impl HttpProbe {
    pub fn new(base_url: &str, health_path: &str, timeout: Duration) -> GaugeResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GaugeError::operation(ErrorKind::Internal, e.to_string()))?;
        Ok(Self {
            client,
            url: format!("{}{}", base_url.trim_end_matches('/'), health_path),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl LivenessProbe for HttpProbe {
    async fn probe(&self) -> GaugeResult<()> {
        let response = self.client.head(&self.url).send().await.map_err(|e| {
            let kind = if e.is_timeout() {
                ErrorKind::Timeout
            } else {
                ErrorKind::Network
            };
            GaugeError::operation(kind, format!("Health check failed: {}", e))
        })?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(GaugeError::operation(
                ErrorKind::from_status(status.as_u16()),
                format!("Health check returned {}", status.as_u16()),
            ))
        }
    }
}

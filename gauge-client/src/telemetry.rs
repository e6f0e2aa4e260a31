//! Tracing subscriber setup.

use gauge_core::{ErrorKind, GaugeError, GaugeResult};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "gauge_client=debug,gauge_cache=debug,info";

/// Telemetry configuration from environment variables.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to the startup event
    pub service_name: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: std::env::var("GAUGE_SERVICE_NAME")
                .unwrap_or_else(|_| "gauge-watch".to_string()),
            json: std::env::var("GAUGE_LOG_JSON")
                .map(|s| s == "true" || s == "1")
                .unwrap_or(false),
        }
    }
}

/// Install the global tracing subscriber.
///
/// Call once at startup. A second call fails because a global subscriber
/// is already set.
pub fn init_tracing(config: &TelemetryConfig) -> GaugeResult<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = if config.json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };
    result.map_err(|e| {
        GaugeError::operation(
            ErrorKind::Internal,
            format!("Failed to init subscriber: {}", e),
        )
    })?;

    tracing::info!(
        service_name = config.service_name,
        json = config.json,
        "Telemetry initialized"
    );
    Ok(())
}

//! Configuration loading for the Gauge client.
//!
//! `api_base_url` is required. Every other field falls back to the
//! documented default when omitted.

use crate::polling::PollingConfig;
use crate::retry::RetryPolicy;
use gauge_cache::CacheConfig;
use gauge_core::{BudgetThresholds, ConfigError};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the config file.
pub const CONFIG_ENV_VAR: &str = "GAUGE_CONFIG";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GaugeConfig {
    pub api_base_url: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default)]
    pub cache: CacheSection,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub budget: BudgetSection,
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct CacheSection {
    pub default_ttl_ms: u64,
    pub max_entries: usize,
    pub storage_key: String,
    /// Directory for file-backed snapshots. Memory-only when absent.
    pub snapshot_dir: Option<PathBuf>,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            default_ttl_ms: 300_000,
            max_entries: 100,
            storage_key: "analytics-query-cache".to_string(),
            snapshot_dir: None,
        }
    }
}

impl CacheSection {
    pub fn to_cache_config(&self) -> CacheConfig {
        CacheConfig::new()
            .with_ttl_ms(self.default_ttl_ms)
            .with_max_entries(self.max_entries)
            .with_storage_key(self.storage_key.clone())
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct BudgetSection {
    pub warning_threshold: f64,
    pub critical_threshold: f64,
}

impl Default for BudgetSection {
    fn default() -> Self {
        let defaults = BudgetThresholds::default();
        Self {
            warning_threshold: defaults.warning,
            critical_threshold: defaults.critical,
        }
    }
}

impl BudgetSection {
    pub fn thresholds(&self) -> BudgetThresholds {
        BudgetThresholds {
            warning: self.warning_threshold,
            critical: self.critical_threshold,
        }
    }
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

impl GaugeConfig {
    /// Load from `--config <path>` or `GAUGE_CONFIG`, then validate.
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_path_from_args().or_else(config_path_from_env);
        let path = path.ok_or(ConfigError::MissingConfigPath)?;
        Self::from_path(&path)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            reason: format!("{}: {}", path.display(), e),
        })?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: GaugeConfig = toml::from_str(contents).map_err(|e| ConfigError::Parse {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let base = self.api_base_url.trim();
        if base.is_empty() {
            return Err(invalid("api_base_url", "must not be empty"));
        }
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(invalid("api_base_url", "must start with http:// or https://"));
        }
        if self.request_timeout_ms == 0 {
            return Err(invalid("request_timeout_ms", "must be > 0"));
        }
        if self.cache.default_ttl_ms == 0 {
            return Err(invalid("cache.default_ttl_ms", "must be > 0"));
        }
        if self.cache.max_entries == 0 {
            return Err(invalid("cache.max_entries", "must be > 0"));
        }
        if self.cache.storage_key.trim().is_empty() {
            return Err(invalid("cache.storage_key", "must not be empty"));
        }
        if self.retry.max_attempts == 0 {
            return Err(invalid("retry.max_attempts", "must be > 0"));
        }
        if self.retry.backoff_multiplier < 1.0 {
            return Err(invalid("retry.backoff_multiplier", "must be >= 1.0"));
        }
        if self.polling.interval_ms == 0 {
            return Err(invalid("polling.interval_ms", "must be > 0"));
        }
        if self.polling.quiet_period_ms == 0 {
            return Err(invalid("polling.quiet_period_ms", "must be > 0"));
        }
        if !self.polling.health_path.starts_with('/') {
            return Err(invalid("polling.health_path", "must start with '/'"));
        }
        if self.budget.warning_threshold <= 0.0 {
            return Err(invalid("budget.warning_threshold", "must be > 0"));
        }
        if self.budget.critical_threshold < self.budget.warning_threshold {
            return Err(invalid(
                "budget.critical_threshold",
                "must be >= warning_threshold",
            ));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

fn config_path_from_env() -> Option<PathBuf> {
    std::env::var(CONFIG_ENV_VAR).ok().map(PathBuf::from)
}

fn config_path_from_args() -> Option<PathBuf> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return args.next().map(PathBuf::from);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = GaugeConfig::from_toml(r#"api_base_url = "http://localhost:3001""#).unwrap();
        assert_eq!(config.request_timeout_ms, 10_000);
        assert_eq!(config.cache.default_ttl_ms, 300_000);
        assert_eq!(config.cache.max_entries, 100);
        assert_eq!(config.cache.storage_key, "analytics-query-cache");
        assert!(config.cache.snapshot_dir.is_none());
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.delay_ms, 1_000);
        assert_eq!(config.retry.backoff_multiplier, 2.0);
        assert_eq!(config.polling.interval_ms, 30_000);
        assert_eq!(config.polling.quiet_period_ms, 2_000);
        assert!(config.polling.pause_on_interaction);
        assert_eq!(config.budget.thresholds(), BudgetThresholds::default());
    }

    #[test]
    fn test_full_config() {
        let toml = r#"
            api_base_url = "https://analytics.example.com"
            request_timeout_ms = 5000

            [cache]
            default_ttl_ms = 60000
            max_entries = 20
            storage_key = "qc"
            snapshot_dir = "/var/lib/gauge"

            [retry]
            max_attempts = 5
            delay_ms = 250
            backoff_multiplier = 1.5

            [polling]
            interval_ms = 10000
            quiet_period_ms = 500
            pause_on_interaction = false
            health_path = "/healthz"

            [budget]
            warning_threshold = 75.0
            critical_threshold = 95.0
        "#;
        let config = GaugeConfig::from_toml(toml).unwrap();
        assert_eq!(config.request_timeout(), Duration::from_millis(5000));

        let cache = config.cache.to_cache_config();
        assert_eq!(cache.default_ttl, chrono::Duration::minutes(1));
        assert_eq!(cache.max_entries, 20);
        assert_eq!(cache.storage_key, "qc");
        assert_eq!(config.cache.snapshot_dir, Some(PathBuf::from("/var/lib/gauge")));

        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.polling.health_path, "/healthz");
        assert!(!config.polling.pause_on_interaction);
        assert_eq!(config.budget.thresholds().warning, 75.0);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = GaugeConfig::from_toml(
            r#"
            api_base_url = "http://localhost"
            colour = "blue"
        "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_validation_failures() {
        let cases = [
            (r#"api_base_url = """#, "api_base_url"),
            (r#"api_base_url = "localhost""#, "api_base_url"),
            (
                "api_base_url = \"http://x\"\nrequest_timeout_ms = 0",
                "request_timeout_ms",
            ),
            (
                "api_base_url = \"http://x\"\n[retry]\nmax_attempts = 0",
                "retry.max_attempts",
            ),
            (
                "api_base_url = \"http://x\"\n[retry]\nbackoff_multiplier = 0.5",
                "retry.backoff_multiplier",
            ),
            (
                "api_base_url = \"http://x\"\n[polling]\nhealth_path = \"health\"",
                "polling.health_path",
            ),
            (
                "api_base_url = \"http://x\"\n[budget]\nwarning_threshold = 90.0\ncritical_threshold = 80.0",
                "budget.critical_threshold",
            ),
        ];

        for (toml, expected_field) in cases {
            match GaugeConfig::from_toml(toml) {
                Err(ConfigError::InvalidValue { field, .. }) => {
                    assert_eq!(field, expected_field, "config: {toml}")
                }
                other => panic!("expected InvalidValue for {expected_field}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gauge.toml");
        std::fs::write(&path, "api_base_url = \"http://localhost:3001\"\n").unwrap();
        let config = GaugeConfig::from_path(&path).unwrap();
        assert_eq!(config.api_base_url, "http://localhost:3001");

        let missing = GaugeConfig::from_path(&dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(missing, ConfigError::Io { .. }));
    }
}

//! GAUGE Client - Resilient Analytics Queries
//!
//! Everything here performs or schedules I/O:
//!
//! - [`retry`]: bounded retry with exponential backoff
//! - [`fetcher`] / [`probe`]: the HTTP collaborators
//! - [`polling`]: interval-driven liveness polling with interaction pause
//! - [`facade`]: cache-aware query API in front of the fetcher
//! - [`pages`]: options and progress for paginated list walks
//! - [`config`] / [`telemetry`]: process setup

pub mod config;
pub mod facade;
pub mod fetcher;
pub mod models;
pub mod pages;
pub mod polling;
pub mod probe;
pub mod retry;
pub mod telemetry;

pub use config::{BudgetSection, CacheSection, GaugeConfig, CONFIG_ENV_VAR};
pub use facade::{AnalyticsQueries, OVERVIEW_TTL_MS};
pub use fetcher::{status_error, DataFetcher, HttpFetcher};
pub use models::{AttributionSort, AuditLogQuery, BudgetConfig, CostTracking, SortOrder, AUDIT_LOGS};
pub use pages::{PageOptions, PageProgress, DEFAULT_MAX_RECORDS, DEFAULT_PAGE_SIZE};
pub use polling::{PollingConfig, PollingController, UpdateCallback};
pub use probe::{HttpProbe, LivenessProbe};
pub use retry::{retry, retry_with, RetryPolicy};
pub use telemetry::{init_tracing, TelemetryConfig};

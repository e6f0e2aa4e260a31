//! GAUGE Core - Domain Types
//!
//! Pure data structures and pure functions for the usage-analytics engine.
//! No I/O lives here: the cache, batcher and network layers build on top of
//! these types in `gauge-cache` and `gauge-client`.

pub mod clock;
pub mod error;
pub mod filter;
pub mod health;
pub mod metrics;
pub mod paging;
pub mod record;

use chrono::{DateTime, Utc};

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Duration in milliseconds for TTL and interval values.
pub type DurationMs = u64;

pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use error::{
    ConfigError, ErrorKind, GaugeError, GaugeResult, Retryable, StorageError, ValidationError,
};
pub use filter::{
    by_category, by_date_range, by_status, combine, default_filters, format_date_for_api,
    format_month_for_api, parse_date, validate_range, validate_range_str, CategoryFilter,
    DateRange, FilterState, StatusFilter,
};
pub use health::{PollState, PollStatus};
pub use metrics::{
    anomaly_threshold, format_change, mark_anomalies, percentage_change, success_rate,
    AlertLevel, BudgetSnapshot, BudgetStatus, BudgetThresholds, CostBreakdown, CostRates,
    FlaggedUsage, PeerUsage,
};
pub use paging::Pagination;
pub use record::{normalize_all, Outcome, RawUsageRecord, UsageRecord};

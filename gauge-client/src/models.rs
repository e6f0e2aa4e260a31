//! Typed views over the analytics API responses.
//!
//! The backend reports budget thresholds as fractions and uses `"none"` for
//! the lowest alert level; these types normalise both to the dashboard's
//! conventions (percentages, [`AlertLevel::Normal`]).

use chrono::SecondsFormat;
use gauge_cache::QueryKey;
use gauge_core::{AlertLevel, BudgetSnapshot, BudgetThresholds, DateRange, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

const DEFAULT_MONTHLY_BUDGET: f64 = 100_000.0;
const DEFAULT_DAYS_IN_MONTH: u32 = 30;

/// Treat missing, null and zero the same way: fall back to `default`.
fn or_default(value: Option<f64>, default: f64) -> f64 {
    value.filter(|v| *v != 0.0).unwrap_or(default)
}

/// Sort key for user attribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AttributionSort {
    Calls,
    Cost,
    SuccessRate,
    Role,
}

impl AttributionSort {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttributionSort::Calls => "calls",
            AttributionSort::Cost => "cost",
            AttributionSort::SuccessRate => "successRate",
            AttributionSort::Role => "role",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

/// Budget settings with thresholds expressed as percentages.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetConfig {
    pub monthly_limit: f64,
    pub warning_threshold: f64,
    pub critical_threshold: f64,
    pub notification_enabled: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireBudgetConfig {
    monthly_budget: Option<f64>,
    warning_threshold: Option<f64>,
    critical_threshold: Option<f64>,
    notification_enabled: Option<bool>,
}

impl BudgetConfig {
    /// Decode the backend shape (`monthlyBudget`, fractional thresholds).
    pub fn from_wire(value: &Value) -> Self {
        let wire: WireBudgetConfig = serde_json::from_value(value.clone()).unwrap_or_default();
        Self {
            monthly_limit: or_default(wire.monthly_budget, DEFAULT_MONTHLY_BUDGET),
            warning_threshold: or_default(wire.warning_threshold, 0.8) * 100.0,
            critical_threshold: or_default(wire.critical_threshold, 0.95) * 100.0,
            notification_enabled: wire.notification_enabled != Some(false),
        }
    }

    /// Encode in the backend shape.
    pub fn to_wire(&self) -> Value {
        json!({
            "monthlyBudget": self.monthly_limit,
            "warningThreshold": self.warning_threshold / 100.0,
            "criticalThreshold": self.critical_threshold / 100.0,
        })
    }

    pub fn thresholds(&self) -> BudgetThresholds {
        BudgetThresholds {
            warning: self.warning_threshold,
            critical: self.critical_threshold,
        }
    }
}

/// Month-to-date spend as reported by the cost-tracking endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostTracking {
    pub current_spending: f64,
    pub budget_limit: f64,
    pub utilization: f64,
    pub projected_cost: f64,
    pub alert_level: AlertLevel,
    pub days_elapsed: u32,
    pub days_in_month: u32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireCostTracking {
    current_spend: Option<f64>,
    budget: Option<f64>,
    projected_spend: Option<f64>,
    alert_level: Option<String>,
    #[serde(default)]
    metadata: WireCostMetadata,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireCostMetadata {
    utilization_percent: Option<f64>,
    days_elapsed: Option<u32>,
    days_in_month: Option<u32>,
}

fn parse_alert_level(level: Option<&str>) -> AlertLevel {
    match level.map(str::to_ascii_lowercase).as_deref() {
        Some("warning") => AlertLevel::Warning,
        Some("critical") => AlertLevel::Critical,
        _ => AlertLevel::Normal,
    }
}

impl CostTracking {
    pub fn from_wire(value: &Value) -> Self {
        let wire: WireCostTracking = serde_json::from_value(value.clone()).unwrap_or_default();
        Self {
            current_spending: wire.current_spend.unwrap_or(0.0),
            budget_limit: or_default(wire.budget, DEFAULT_MONTHLY_BUDGET),
            utilization: wire.metadata.utilization_percent.unwrap_or(0.0),
            projected_cost: wire.projected_spend.unwrap_or(0.0),
            alert_level: parse_alert_level(wire.alert_level.as_deref()),
            days_elapsed: wire.metadata.days_elapsed.unwrap_or(0),
            days_in_month: wire
                .metadata
                .days_in_month
                .filter(|d| *d > 0)
                .unwrap_or(DEFAULT_DAYS_IN_MONTH),
        }
    }

    /// Inputs for recomputing derived budget values locally.
    pub fn snapshot(&self) -> BudgetSnapshot {
        BudgetSnapshot::new(self.current_spending, self.budget_limit)
            .with_days(self.days_elapsed, self.days_in_month)
    }
}

/// Query name of the audit log endpoint.
pub const AUDIT_LOGS: &str = "audit-logs";

/// Full RFC 3339 timestamp, as the list endpoints expect.
pub(crate) fn format_instant_for_api(ts: Timestamp) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Filters for a single audit log request. Unset fields are not sent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuditLogQuery {
    pub range: Option<DateRange>,
    pub provider: Option<String>,
    pub status: Option<String>,
    pub event_type: Option<String>,
    pub limit: Option<usize>,
}

impl AuditLogQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_range(mut self, range: DateRange) -> Self {
        self.range = Some(range);
        self
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn with_event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn to_query(&self) -> QueryKey {
        QueryKey::new(AUDIT_LOGS)
            .param_opt("startDate", self.range.map(|r| format_instant_for_api(r.start)))
            .param_opt("endDate", self.range.map(|r| format_instant_for_api(r.end)))
            .param_opt("provider", self.provider.as_deref().filter(|p| !p.is_empty()))
            .param_opt("status", self.status.as_deref().filter(|s| !s.is_empty()))
            .param_opt("eventType", self.event_type.as_deref().filter(|e| !e.is_empty()))
            .param_opt("limit", self.limit.filter(|l| *l > 0).map(|l| l as u64))
    }
}

//! Derived metrics: budget alerts, cost, anomalies and period comparison.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Three-valued budget alert classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Normal,
    Warning,
    Critical,
}

/// Utilization percentages at which alerts escalate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BudgetThresholds {
    pub warning: f64,
    pub critical: f64,
}

impl Default for BudgetThresholds {
    fn default() -> Self {
        Self {
            warning: 80.0,
            critical: 100.0,
        }
    }
}

impl BudgetThresholds {
    /// Ties round up to the higher severity.
    pub fn classify(&self, utilization: f64) -> AlertLevel {
        if utilization >= self.critical {
            AlertLevel::Critical
        } else if utilization >= self.warning {
            AlertLevel::Warning
        } else {
            AlertLevel::Normal
        }
    }
}

/// Month-to-date spend against a limit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetSnapshot {
    pub current_spend: f64,
    pub limit: f64,
    pub days_elapsed: u32,
    pub days_in_month: u32,
}

/// Values derived from a [`BudgetSnapshot`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetStatus {
    pub utilization: f64,
    pub alert_level: AlertLevel,
    pub projected_spend: f64,
    pub remaining: f64,
    pub projected_overage: f64,
}

impl BudgetSnapshot {
    pub fn new(current_spend: f64, limit: f64) -> Self {
        Self {
            current_spend,
            limit,
            days_elapsed: 0,
            days_in_month: 0,
        }
    }

    pub fn with_days(mut self, days_elapsed: u32, days_in_month: u32) -> Self {
        self.days_elapsed = days_elapsed;
        self.days_in_month = days_in_month;
        self
    }

    /// Spend as a percentage of the limit. Zero when no limit is set.
    pub fn utilization(&self) -> f64 {
        if self.limit <= 0.0 {
            return 0.0;
        }
        self.current_spend / self.limit * 100.0
    }

    /// Linear projection of month-end spend. Zero before the first day ends.
    pub fn projected_spend(&self) -> f64 {
        if self.days_elapsed == 0 {
            return 0.0;
        }
        self.current_spend / f64::from(self.days_elapsed) * f64::from(self.days_in_month)
    }

    pub fn remaining(&self) -> f64 {
        (self.limit - self.current_spend).max(0.0)
    }

    pub fn projected_overage(&self) -> f64 {
        (self.projected_spend() - self.limit).max(0.0)
    }

    pub fn status(&self, thresholds: &BudgetThresholds) -> BudgetStatus {
        let utilization = self.utilization();
        BudgetStatus {
            utilization,
            alert_level: thresholds.classify(utilization),
            projected_spend: self.projected_spend(),
            remaining: self.remaining(),
            projected_overage: self.projected_overage(),
        }
    }
}

/// Unit cost per call, keyed by category.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CostRates {
    rates: BTreeMap<String, f64>,
}

/// Total cost with its per-category breakdown.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub total: f64,
    pub by_category: BTreeMap<String, f64>,
}

impl CostRates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rate(mut self, category: impl Into<String>, unit_cost: f64) -> Self {
        self.rates.insert(category.into(), unit_cost);
        self
    }

    pub fn rate(&self, category: &str) -> Option<f64> {
        self.rates.get(category).copied()
    }

    /// Price call counts. Categories without a rate cost nothing.
    pub fn cost<'a>(&self, calls: impl IntoIterator<Item = (&'a str, u64)>) -> CostBreakdown {
        let mut breakdown = CostBreakdown::default();
        for (category, count) in calls {
            let cost = self.rate(category).unwrap_or(0.0) * count as f64;
            *breakdown
                .by_category
                .entry(category.to_string())
                .or_insert(0.0) += cost;
            breakdown.total += cost;
        }
        breakdown
    }
}

/// Share of successful calls as a percentage. Zero when there were none.
pub fn success_rate(successful: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    successful as f64 / total as f64 * 100.0
}

/// Period-over-period change in percent.
///
/// A non-positive previous period reports 100% growth when there is any
/// current activity and 0% otherwise.
pub fn percentage_change(current: f64, previous: f64) -> f64 {
    if previous <= 0.0 {
        return if current > 0.0 { 100.0 } else { 0.0 };
    }
    (current - previous) / previous * 100.0
}

/// Render a change with an explicit sign: `+0.0%`, `+12.5%`, `-5.2%`.
pub fn format_change(change: f64) -> String {
    // Round before the sign check so tiny negatives print as "+0.0%".
    let rounded = (change * 10.0).round() / 10.0;
    let rounded = if rounded == 0.0 { 0.0 } else { rounded };
    format!("{:+.1}%", rounded)
}

/// A peer-group member's usage metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerUsage {
    pub id: String,
    pub metric_value: f64,
}

impl PeerUsage {
    pub fn new(id: impl Into<String>, metric_value: f64) -> Self {
        Self {
            id: id.into(),
            metric_value,
        }
    }
}

/// A peer usage record with its anomaly flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlaggedUsage {
    #[serde(flatten)]
    pub usage: PeerUsage,
    pub anomalous: bool,
}

/// Twice the mean of the given set, or `None` for an empty set.
///
/// Always computed over the set as currently filtered.
pub fn anomaly_threshold(records: &[PeerUsage]) -> Option<f64> {
    if records.is_empty() {
        return None;
    }
    let sum: f64 = records.iter().map(|r| r.metric_value).sum();
    Some(2.0 * sum / records.len() as f64)
}

/// Flag every record whose metric strictly exceeds twice the mean.
pub fn mark_anomalies(records: &[PeerUsage]) -> Vec<FlaggedUsage> {
    let Some(threshold) = anomaly_threshold(records) else {
        return Vec::new();
    };
    records
        .iter()
        .map(|usage| FlaggedUsage {
            usage: usage.clone(),
            anomalous: usage.metric_value > threshold,
        })
        .collect()
}

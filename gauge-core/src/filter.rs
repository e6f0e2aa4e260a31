//! Filter pipeline for usage records.
//!
//! Every function here is pure: inputs are borrowed and a new vector is
//! returned. Filters compose with AND semantics.

use crate::error::ValidationError;
use crate::record::{Outcome, UsageRecord};
use crate::Timestamp;
use chrono::{Duration, Months, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Longest range a dashboard query may span.
const MAX_RANGE_DAYS: i64 = 365;

/// Span covered by the default filter state.
const DEFAULT_LOOKBACK_DAYS: i64 = 30;

/// Inclusive date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Timestamp,
    pub end: Timestamp,
}

impl DateRange {
    pub fn new(start: Timestamp, end: Timestamp) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, ts: Timestamp) -> bool {
        ts >= self.start && ts <= self.end
    }
}

/// Category selector. `All` is the identity filter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CategoryFilter {
    #[default]
    All,
    Only(String),
}

impl From<String> for CategoryFilter {
    fn from(value: String) -> Self {
        if value == "all" {
            CategoryFilter::All
        } else {
            CategoryFilter::Only(value)
        }
    }
}

impl From<&str> for CategoryFilter {
    fn from(value: &str) -> Self {
        CategoryFilter::from(value.to_string())
    }
}

impl From<CategoryFilter> for String {
    fn from(value: CategoryFilter) -> Self {
        match value {
            CategoryFilter::All => "all".to_string(),
            CategoryFilter::Only(category) => category,
        }
    }
}

/// Status selector. `All` is the identity filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    #[default]
    All,
    Success,
    Failure,
}

impl StatusFilter {
    fn outcome(&self) -> Option<Outcome> {
        match self {
            StatusFilter::All => None,
            StatusFilter::Success => Some(Outcome::Success),
            StatusFilter::Failure => Some(Outcome::Failure),
        }
    }
}

/// The full set of dashboard filters. Treated as an immutable value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterState {
    pub date_range: DateRange,
    #[serde(default)]
    pub category: CategoryFilter,
    #[serde(default)]
    pub status: StatusFilter,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
}

impl FilterState {
    pub fn new(date_range: DateRange) -> Self {
        Self {
            date_range,
            category: CategoryFilter::All,
            status: StatusFilter::All,
            entity_id: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<CategoryFilter>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_status(mut self, status: StatusFilter) -> Self {
        self.status = status;
        self
    }

    pub fn with_entity(mut self, entity_id: impl Into<String>) -> Self {
        self.entity_id = Some(entity_id.into());
        self
    }
}

/// Keep records whose timestamp lies in `[start, end]`.
///
/// Records without a usable timestamp are dropped.
pub fn by_date_range(records: &[UsageRecord], start: Timestamp, end: Timestamp) -> Vec<UsageRecord> {
    let range = DateRange::new(start, end);
    records
        .iter()
        .filter(|r| r.timestamp.is_some_and(|ts| range.contains(ts)))
        .cloned()
        .collect()
}

pub fn by_category(records: &[UsageRecord], category: &CategoryFilter) -> Vec<UsageRecord> {
    match category {
        CategoryFilter::All => records.to_vec(),
        CategoryFilter::Only(wanted) => records
            .iter()
            .filter(|r| r.category.as_deref() == Some(wanted.as_str()))
            .cloned()
            .collect(),
    }
}

pub fn by_status(records: &[UsageRecord], status: StatusFilter) -> Vec<UsageRecord> {
    match status.outcome() {
        None => records.to_vec(),
        Some(wanted) => records
            .iter()
            .filter(|r| r.status == Some(wanted))
            .cloned()
            .collect(),
    }
}

/// Apply date range, category, status and entity filters in that order.
///
/// The entity filter matches either the user or the broker of a record.
pub fn combine(records: &[UsageRecord], filters: &FilterState) -> Vec<UsageRecord> {
    let filtered = by_date_range(records, filters.date_range.start, filters.date_range.end);
    let filtered = by_category(&filtered, &filters.category);
    let filtered = by_status(&filtered, filters.status);

    match &filters.entity_id {
        Some(entity_id) => filtered
            .into_iter()
            .filter(|r| r.matches_entity(entity_id))
            .collect(),
        None => filtered,
    }
}

/// Validate a date range against `now`.
///
/// A range of exactly 365 days is accepted.
pub fn validate_range(
    start: Timestamp,
    end: Timestamp,
    now: Timestamp,
) -> Result<(), ValidationError> {
    if start > end {
        return Err(ValidationError::StartAfterEnd);
    }

    if let Some(limit) = one_year_from(now) {
        if start > limit {
            return Err(ValidationError::StartTooFarInFuture);
        }
    }

    if end - start > Duration::days(MAX_RANGE_DAYS) {
        return Err(ValidationError::RangeTooLarge);
    }

    Ok(())
}

/// Parse and validate a range given as strings.
pub fn validate_range_str(
    start: &str,
    end: &str,
    now: Timestamp,
) -> Result<DateRange, ValidationError> {
    let start = parse_date(start).map_err(|_| ValidationError::InvalidStartDate)?;
    let end = parse_date(end).map_err(|_| ValidationError::InvalidEndDate)?;
    validate_range(start, end, now)?;
    Ok(DateRange::new(start, end))
}

/// Midnight on the same calendar day one year after `now`.
fn one_year_from(now: Timestamp) -> Option<Timestamp> {
    now.date_naive()
        .checked_add_months(Months::new(12))
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Parse `YYYY-MM-DD`, `YYYY-MM-DDTHH:MM:SS` or RFC 3339 into UTC.
pub fn parse_date(input: &str) -> Result<Timestamp, ValidationError> {
    let input = input.trim();

    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(input) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(input, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(Utc.from_utc_datetime(&naive));
    }
    if let Some(naive) = NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
    {
        return Ok(Utc.from_utc_datetime(&naive));
    }

    Err(ValidationError::InvalidValue {
        field: "date".to_string(),
        reason: format!("unrecognised date '{}'", input),
    })
}

/// Last 30 days, every category, every status.
pub fn default_filters(now: Timestamp) -> FilterState {
    FilterState::new(DateRange::new(
        now - Duration::days(DEFAULT_LOOKBACK_DAYS),
        now,
    ))
}

/// Format as `YYYY-MM-DD` for query parameters.
pub fn format_date_for_api(date: Timestamp) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Format as `YYYY-MM` for query parameters.
pub fn format_month_for_api(date: Timestamp) -> String {
    date.format("%Y-%m").to_string()
}

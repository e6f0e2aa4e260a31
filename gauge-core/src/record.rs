//! Usage records.
//!
//! Backends report usage events with a loose set of field aliases. They are
//! normalized into [`UsageRecord`] once at ingestion so the filter pipeline
//! only ever sees one shape.

use crate::filter::parse_date;
use crate::Timestamp;
use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Outcome of a recorded call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Failure,
}

impl Outcome {
    /// Parse a status string. Unknown statuses yield `None`.
    pub fn parse(status: &str) -> Option<Self> {
        match status {
            "success" => Some(Outcome::Success),
            "failure" => Some(Outcome::Failure),
            _ => None,
        }
    }

    pub fn from_success(success: bool) -> Self {
        if success {
            Outcome::Success
        } else {
            Outcome::Failure
        }
    }
}

/// A usage event as delivered by the backend, with every legacy alias.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawUsageRecord {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    /// ISO-8601 string or epoch milliseconds.
    #[serde(default)]
    pub timestamp: Option<Value>,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub api_provider: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub broker_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RawUsageRecord {
    /// Collapse aliases into the normalized record.
    pub fn normalize(self) -> UsageRecord {
        let timestamp = match (&self.timestamp, &self.date) {
            (Some(ts), _) => timestamp_from_value(ts),
            (None, Some(date)) => parse_date(date).ok(),
            (None, None) => None,
        };

        // An explicit status string wins over the boolean flag, even when
        // the string is not one we recognise.
        let status = match (&self.status, self.success) {
            (Some(status), _) => Outcome::parse(status),
            (None, Some(success)) => Some(Outcome::from_success(success)),
            (None, None) => None,
        };

        UsageRecord {
            id: self.id,
            timestamp,
            category: self.provider.or(self.api_provider),
            status,
            entity_id: self.user_id.or_else(|| self.broker_id.clone()),
            broker_id: self.broker_id,
            attributes: self.extra,
        }
    }
}

fn timestamp_from_value(value: &Value) -> Option<Timestamp> {
    match value {
        Value::String(s) => parse_date(s).ok(),
        Value::Number(n) => n
            .as_i64()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        _ => None,
    }
}

/// Normalized usage record consumed by the filter pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageRecord {
    pub id: Option<String>,
    /// `None` when the source timestamp was missing or unparseable.
    pub timestamp: Option<Timestamp>,
    pub category: Option<String>,
    pub status: Option<Outcome>,
    /// User id, or the broker id when no user is recorded.
    pub entity_id: Option<String>,
    /// Broker the call was made through. Kept even when `entity_id` holds
    /// a user id, so an entity filter on the broker still matches.
    #[serde(default)]
    pub broker_id: Option<String>,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl UsageRecord {
    pub fn new(timestamp: Timestamp) -> Self {
        Self {
            id: None,
            timestamp: Some(timestamp),
            category: None,
            status: None,
            entity_id: None,
            broker_id: None,
            attributes: Map::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_status(mut self, status: Outcome) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_entity(mut self, entity_id: impl Into<String>) -> Self {
        self.entity_id = Some(entity_id.into());
        self
    }

    pub fn with_broker(mut self, broker_id: impl Into<String>) -> Self {
        self.broker_id = Some(broker_id.into());
        self
    }

    /// True when `id` is this record's user or broker.
    pub fn matches_entity(&self, id: &str) -> bool {
        self.entity_id.as_deref() == Some(id) || self.broker_id.as_deref() == Some(id)
    }
}

/// Normalize a batch of raw records.
pub fn normalize_all(raw: Vec<RawUsageRecord>) -> Vec<UsageRecord> {
    raw.into_iter().map(RawUsageRecord::normalize).collect()
}

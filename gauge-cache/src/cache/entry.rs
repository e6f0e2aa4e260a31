//! A single cached value and its lifetime.

use chrono::Duration;
use gauge_core::Timestamp;
use serde::{Deserialize, Serialize};

/// Cached value with creation and expiry times.
///
/// Serialized as `{ "data": ..., "createdAt": <ms>, "expiresAt": <ms> }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry<T> {
    pub data: T,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: Timestamp,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub expires_at: Timestamp,
}

impl<T> CacheEntry<T> {
    /// Create an entry living for `ttl` from `now`. `ttl` must be positive.
    pub fn new(data: T, now: Timestamp, ttl: Duration) -> Self {
        Self {
            data,
            created_at: now,
            expires_at: now + ttl,
        }
    }

    /// An entry is usable up to and including its expiry instant.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        now > self.expires_at
    }
}

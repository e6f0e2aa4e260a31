//! GAUGE Test Utilities
//!
//! Shared test infrastructure for the Gauge workspace:
//! - Scripted fetcher and probe doubles
//! - Proptest generators for the domain types
//! - Fixtures for common scenarios
//! - Assertions over `GaugeResult`
//!
//! Only integration tests (`tests/`) may depend on this crate; unit tests
//! inside the crates it re-exports would see duplicate types.

pub use gauge_cache::{MemoryStore, QueryKey, ResultCache};
pub use gauge_client::{DataFetcher, LivenessProbe, RetryPolicy};
pub use gauge_core::{
    ErrorKind, GaugeError, GaugeResult, ManualClock, Outcome, SharedClock, Timestamp,
    UsageRecord,
};

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

// ============================================================================
// SCRIPTED DOUBLES
// ============================================================================

/// A [`DataFetcher`] that replays scripted responses per query name.
///
/// Queued responses are consumed first, in order; after that the name's
/// standing response (if any) is returned on every call. A name with
/// neither fails with [`ErrorKind::NotFound`].
#[derive(Debug, Default)]
pub struct ScriptedFetcher {
    queued: Mutex<HashMap<String, VecDeque<GaugeResult<Value>>>>,
    standing: Mutex<HashMap<String, GaugeResult<Value>>>,
    fetches: Mutex<Vec<QueryKey>>,
    submits: Mutex<Vec<(QueryKey, Value)>>,
    submit_error: Mutex<Option<GaugeError>>,
    latency: Option<Duration>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every fetch by `latency` (tokio time, so pausable).
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Answer every `name` fetch with `value` once the queue is drained.
    pub fn respond(self, name: &str, value: Value) -> Self {
        self.standing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), Ok(value));
        self
    }

    /// Queue a one-shot result for `name`.
    pub fn push(self, name: &str, result: GaugeResult<Value>) -> Self {
        self.queued
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(name.to_string())
            .or_default()
            .push_back(result);
        self
    }

    /// Queue a one-shot failure of `kind` for `name`.
    pub fn fail_once(self, name: &str, kind: ErrorKind, message: &str) -> Self {
        self.push(name, Err(GaugeError::operation(kind, message)))
    }

    /// Make every subsequent `submit` fail with `error`.
    pub fn fail_submits(self, error: GaugeError) -> Self {
        *self.submit_error.lock().unwrap_or_else(PoisonError::into_inner) = Some(error);
        self
    }

    pub fn fetch_count(&self, name: &str) -> usize {
        self.fetches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|q| q.name == name)
            .count()
    }

    pub fn total_fetches(&self) -> usize {
        self.fetches.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Every query received so far, in arrival order.
    pub fn fetches(&self) -> Vec<QueryKey> {
        self.fetches.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn submits(&self) -> Vec<(QueryKey, Value)> {
        self.submits.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn next_response(&self, name: &str) -> GaugeResult<Value> {
        let queued = self
            .queued
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(name)
            .and_then(VecDeque::pop_front);
        if let Some(result) = queued {
            return result;
        }
        self.standing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .unwrap_or_else(|| {
                Err(GaugeError::operation(
                    ErrorKind::NotFound,
                    format!("no scripted response for {name}"),
                ))
            })
    }
}

#[async_trait]
impl DataFetcher for ScriptedFetcher {
    async fn fetch(&self, query: &QueryKey) -> GaugeResult<Value> {
        self.fetches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(query.clone());
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.next_response(&query.name)
    }

    async fn submit(&self, query: &QueryKey, body: &Value) -> GaugeResult<Value> {
        self.submits
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((query.clone(), body.clone()));
        match self
            .submit_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
        {
            Some(err) => Err(err),
            None => Ok(body.clone()),
        }
    }
}

/// A [`LivenessProbe`] whose reachability is flipped by the test.
#[derive(Debug)]
pub struct ScriptedProbe {
    reachable: Mutex<bool>,
    calls: AtomicUsize,
}

impl Default for ScriptedProbe {
    fn default() -> Self {
        Self::reachable()
    }
}

impl ScriptedProbe {
    pub fn reachable() -> Self {
        Self {
            reachable: Mutex::new(true),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn unreachable() -> Self {
        let probe = Self::reachable();
        probe.set_reachable(false);
        probe
    }

    pub fn set_reachable(&self, reachable: bool) {
        *self.reachable.lock().unwrap_or_else(PoisonError::into_inner) = reachable;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LivenessProbe for ScriptedProbe {
    async fn probe(&self) -> GaugeResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if *self.reachable.lock().unwrap_or_else(PoisonError::into_inner) {
            Ok(())
        } else {
            Err(GaugeError::network("Failed to fetch"))
        }
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for Gauge domain types.

    use super::*;
    use chrono::{DateTime, Utc};
    use gauge_core::{CategoryFilter, DateRange, FilterState, PeerUsage, StatusFilter};
    use proptest::prelude::*;

    /// Categories used across generated records and filters.
    pub const CATEGORIES: &[&str] = &["alpaca", "polygon", "openai", "anthropic"];

    /// Query names used by generated descriptors.
    pub const QUERY_NAMES: &[&str] = &["overview", "cost-tracking", "user-attribution"];

    /// Generate a Timestamp between 2020 and 2030 at millisecond precision.
    pub fn arb_timestamp() -> impl Strategy<Value = Timestamp> {
        (1_577_836_800_000i64..1_893_456_000_000i64).prop_map(|ms| {
            DateTime::from_timestamp_millis(ms).unwrap_or_else(Utc::now)
        })
    }

    pub fn arb_outcome() -> impl Strategy<Value = Outcome> {
        prop_oneof![Just(Outcome::Success), Just(Outcome::Failure)]
    }

    pub fn arb_category() -> impl Strategy<Value = String> {
        prop::sample::select(CATEGORIES).prop_map(str::to_string)
    }

    pub fn arb_entity_id() -> impl Strategy<Value = String> {
        "user-[a-e]"
    }

    pub fn arb_broker_id() -> impl Strategy<Value = String> {
        "broker-[1-3]"
    }

    /// Normalized records; every optional field is sometimes absent.
    pub fn arb_usage_record() -> impl Strategy<Value = UsageRecord> {
        (
            prop::option::weighted(0.9, arb_timestamp()),
            prop::option::weighted(0.9, arb_category()),
            prop::option::weighted(0.9, arb_outcome()),
            prop::option::weighted(0.8, arb_entity_id()),
            prop::option::weighted(0.3, arb_broker_id()),
        )
            .prop_map(|(timestamp, category, status, entity_id, broker_id)| UsageRecord {
                id: None,
                timestamp,
                category,
                status,
                entity_id,
                broker_id,
                attributes: Default::default(),
            })
    }

    pub fn arb_usage_records(max: usize) -> impl Strategy<Value = Vec<UsageRecord>> {
        prop::collection::vec(arb_usage_record(), 0..max)
    }

    /// A range whose start never exceeds its end.
    pub fn arb_date_range() -> impl Strategy<Value = DateRange> {
        (arb_timestamp(), arb_timestamp()).prop_map(|(a, b)| {
            if a <= b {
                DateRange::new(a, b)
            } else {
                DateRange::new(b, a)
            }
        })
    }

    pub fn arb_category_filter() -> impl Strategy<Value = CategoryFilter> {
        prop_oneof![
            Just(CategoryFilter::All),
            arb_category().prop_map(CategoryFilter::Only),
        ]
    }

    pub fn arb_status_filter() -> impl Strategy<Value = StatusFilter> {
        prop_oneof![
            Just(StatusFilter::All),
            Just(StatusFilter::Success),
            Just(StatusFilter::Failure),
        ]
    }

    pub fn arb_filter_state() -> impl Strategy<Value = FilterState> {
        (
            arb_date_range(),
            arb_category_filter(),
            arb_status_filter(),
            prop::option::of(prop_oneof![arb_entity_id(), arb_broker_id()]),
        )
            .prop_map(|(range, category, status, entity_id)| FilterState {
                date_range: range,
                category,
                status,
                entity_id,
            })
    }

    pub fn arb_peer_usage() -> impl Strategy<Value = PeerUsage> {
        (arb_entity_id(), 0.0f64..1_000_000.0)
            .prop_map(|(id, value)| PeerUsage::new(id, value))
    }

    pub fn arb_retry_policy() -> impl Strategy<Value = RetryPolicy> {
        (1u32..6, 0u64..5_000, 1.0f64..4.0).prop_map(|(attempts, delay, multiplier)| {
            RetryPolicy::new()
                .with_max_attempts(attempts)
                .with_delay_ms(delay)
                .with_backoff_multiplier(multiplier)
        })
    }

    /// Query descriptors with a small set of names and scalar parameters.
    pub fn arb_query_key() -> impl Strategy<Value = QueryKey> {
        (
            prop::sample::select(QUERY_NAMES),
            prop::collection::btree_map("[a-z]{1,8}", any::<i32>(), 0..4),
        )
            .prop_map(|(name, params)| {
                params
                    .into_iter()
                    .fold(QueryKey::new(name), |key, (k, v)| key.param(k, v))
            })
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built values for common test scenarios.

    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use std::sync::Arc;

    /// Fixed "now" used by fixtures: 2026-03-15T12:00:00Z.
    pub fn fixed_now() -> Timestamp {
        Utc.with_ymd_and_hms(2026, 3, 15, 12, 0, 0)
            .single()
            .unwrap_or_else(Utc::now)
    }

    /// A manual clock starting at [`fixed_now`], plus the same clock as a
    /// [`SharedClock`] for injection.
    pub fn manual_clock() -> (Arc<ManualClock>, SharedClock) {
        let clock = Arc::new(ManualClock::new(fixed_now()));
        let shared: SharedClock = clock.clone();
        (clock, shared)
    }

    /// A retry policy with no backoff delay.
    pub fn fast_retry(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new()
            .with_max_attempts(max_attempts)
            .with_delay_ms(0)
    }

    /// The smallest config file that loads.
    pub fn minimal_config_toml() -> &'static str {
        r#"api_base_url = "http://localhost:3001""#
    }

    /// Five records spread over early March 2026.
    pub fn sample_records() -> Vec<UsageRecord> {
        let at = |day: u32, hour: u32| {
            Utc.with_ymd_and_hms(2026, 3, day, hour, 0, 0)
                .single()
                .unwrap_or_else(fixed_now)
        };
        vec![
            UsageRecord::new(at(1, 9))
                .with_id("r1")
                .with_category("alpaca")
                .with_status(Outcome::Success)
                .with_entity("user-a"),
            UsageRecord::new(at(2, 10))
                .with_id("r2")
                .with_category("polygon")
                .with_status(Outcome::Failure)
                .with_entity("user-b"),
            UsageRecord::new(at(3, 11))
                .with_id("r3")
                .with_category("alpaca")
                .with_status(Outcome::Failure)
                .with_entity("user-a"),
            UsageRecord::new(at(5, 12))
                .with_id("r4")
                .with_category("openai")
                .with_status(Outcome::Success)
                .with_entity("user-c"),
            UsageRecord::new(at(8, 13))
                .with_id("r5")
                .with_category("alpaca")
                .with_status(Outcome::Success)
                .with_entity("user-b"),
        ]
    }

    pub fn overview_body() -> Value {
        json!({
            "totalCalls": 1200,
            "successRate": 98.5,
            "totalCost": 4321.5,
        })
    }

    pub fn cost_tracking_body() -> Value {
        json!({
            "currentSpend": 85000,
            "budget": 100000,
            "projectedSpend": 120000,
            "alertLevel": "warning",
            "metadata": {"utilizationPercent": 85, "daysElapsed": 15, "daysInMonth": 31},
        })
    }

    pub fn budget_config_body() -> Value {
        json!({
            "monthlyBudget": 50000,
            "warningThreshold": 0.75,
            "criticalThreshold": 0.9,
            "notificationEnabled": true,
        })
    }

    pub fn user_attribution_body() -> Value {
        json!({
            "users": [
                {"userId": "user-a", "calls": 40, "cost": 12.5},
                {"userId": "user-b", "calls": 15, "cost": 3.0},
            ]
        })
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions over `GaugeResult`.

    use super::*;
    use gauge_core::ValidationError;

    #[track_caller]
    pub fn assert_ok<T: std::fmt::Debug>(result: &GaugeResult<T>) {
        assert!(result.is_ok(), "Expected Ok, got Err: {:?}", result);
    }

    #[track_caller]
    pub fn assert_err<T: std::fmt::Debug>(result: &GaugeResult<T>) {
        assert!(result.is_err(), "Expected Err, got Ok: {:?}", result);
    }

    /// Assert that a GaugeResult failed with the given kind.
    #[track_caller]
    pub fn assert_kind<T: std::fmt::Debug>(result: &GaugeResult<T>, kind: ErrorKind) {
        match result {
            Err(e) => assert_eq!(e.kind(), kind, "Wrong error kind for {:?}", e),
            Ok(v) => panic!("Expected {:?} error, got Ok({:?})", kind, v),
        }
    }

    /// Assert that a GaugeResult is the given validation error.
    #[track_caller]
    pub fn assert_validation_error<T: std::fmt::Debug>(
        result: &GaugeResult<T>,
        expected: ValidationError,
    ) {
        match result {
            Err(GaugeError::Validation(e)) => assert_eq!(*e, expected),
            other => panic!("Expected validation error {:?}, got: {:?}", expected, other),
        }
    }

    /// Assert that every record satisfies `predicate`.
    #[track_caller]
    pub fn assert_all<F>(records: &[UsageRecord], predicate: F, what: &str)
    where
        F: Fn(&UsageRecord) -> bool,
    {
        for record in records {
            assert!(predicate(record), "record does not satisfy {what}: {:?}", record);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_scripted_fetcher_queue_then_standing() {
        let fetcher = ScriptedFetcher::new()
            .fail_once("overview", ErrorKind::Network, "Failed to fetch")
            .respond("overview", json!({"ok": true}));
        let query = QueryKey::new("overview");

        assert!(fetcher.fetch(&query).await.is_err());
        assert_eq!(fetcher.fetch(&query).await.unwrap(), json!({"ok": true}));
        assert_eq!(fetcher.fetch(&query).await.unwrap(), json!({"ok": true}));
        assert_eq!(fetcher.fetch_count("overview"), 3);

        let missing = fetcher.fetch(&QueryKey::new("nope")).await;
        assert_eq!(missing.unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_scripted_probe_toggle() {
        let probe = ScriptedProbe::reachable();
        assert!(probe.probe().await.is_ok());
        probe.set_reachable(false);
        assert!(probe.probe().await.is_err());
        assert_eq!(probe.calls(), 2);
    }
}

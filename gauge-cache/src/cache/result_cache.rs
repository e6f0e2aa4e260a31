//! Bounded TTL cache with snapshot persistence.
//!
//! Every mutation serializes the whole map to the configured
//! [`SnapshotStore`]. Storage is best-effort: read and write failures are
//! logged and the cache keeps working from memory.

use super::entry::CacheEntry;
use super::store::MemoryStore;
use super::traits::{CacheStats, SnapshotStore};
use chrono::Duration;
use gauge_core::{DurationMs, SharedClock, SystemClock};
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

/// Configuration for [`ResultCache`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// TTL applied when `set` is called without one.
    pub default_ttl: Duration,
    /// Maximum number of live entries.
    pub max_entries: usize,
    /// Key the snapshot is stored under.
    pub storage_key: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::minutes(5),
            max_entries: 100,
            storage_key: "analytics-query-cache".to_string(),
        }
    }
}

impl CacheConfig {
    /// Create a new cache config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default entry TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Set the default entry TTL in milliseconds.
    pub fn with_ttl_ms(self, ttl_ms: DurationMs) -> Self {
        self.with_ttl(Duration::milliseconds(ttl_ms as i64))
    }

    /// Set the max entry count. Zero is treated as one.
    pub fn with_max_entries(mut self, max: usize) -> Self {
        self.max_entries = max.max(1);
        self
    }

    /// Set the snapshot storage key.
    pub fn with_storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = key.into();
        self
    }
}

/// An entry plus its insertion sequence, used to break `createdAt` ties.
#[derive(Debug, Clone)]
struct Slot<T> {
    entry: CacheEntry<T>,
    seq: u64,
}

#[derive(Debug)]
struct Inner<T> {
    slots: HashMap<String, Slot<T>>,
    next_seq: u64,
    stats: CacheStats,
}

impl<T> Inner<T> {
    fn insert(&mut self, key: String, entry: CacheEntry<T>) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.slots.insert(key, Slot { entry, seq });
    }

    /// Key of the earliest-created entry.
    fn oldest_key(&self) -> Option<String> {
        self.slots
            .iter()
            .min_by_key(|(_, slot)| (slot.entry.created_at, slot.seq))
            .map(|(key, _)| key.clone())
    }
}

/// Process-wide query result cache.
///
/// Entries expire `ttl` after insertion. When full, inserting a new key
/// evicts the entry with the oldest creation time; reads do not refresh an
/// entry's position.
pub struct ResultCache<T> {
    inner: Mutex<Inner<T>>,
    store: Arc<dyn SnapshotStore>,
    clock: SharedClock,
    config: CacheConfig,
}

impl<T> std::fmt::Debug for ResultCache<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultCache")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<T> ResultCache<T>
where
    T: Clone + Serialize + DeserializeOwned,
{
    /// Create a cache and hydrate it from `store`.
    pub fn new(config: CacheConfig, store: Arc<dyn SnapshotStore>, clock: SharedClock) -> Self {
        let cache = Self {
            inner: Mutex::new(Inner {
                slots: HashMap::new(),
                next_seq: 0,
                stats: CacheStats::default(),
            }),
            store,
            clock,
            config,
        };
        cache.hydrate();
        cache
    }

    /// Memory-only cache on the system clock.
    pub fn in_memory(config: CacheConfig) -> Self {
        Self::new(config, Arc::new(MemoryStore::new()), Arc::new(SystemClock))
    }

    /// Get the cache configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return the value for `key` if present and not expired.
    ///
    /// An expired entry is removed as a side effect.
    pub fn get(&self, key: &str) -> Option<T> {
        let now = self.clock.now();
        let mut inner = self.lock();

        let lookup = inner
            .slots
            .get(key)
            .map(|slot| (!slot.entry.is_expired(now)).then(|| slot.entry.data.clone()));

        match lookup {
            Some(Some(data)) => {
                inner.stats.hits += 1;
                debug!(key, "cache hit");
                Some(data)
            }
            Some(None) => {
                inner.slots.remove(key);
                inner.stats.misses += 1;
                debug!(key, "cache entry expired");
                self.persist(&inner);
                None
            }
            None => {
                inner.stats.misses += 1;
                debug!(key, "cache miss");
                None
            }
        }
    }

    /// Insert with the default TTL.
    pub fn set(&self, key: impl Into<String>, value: T) {
        self.set_with_ttl(key, value, self.config.default_ttl);
    }

    /// Insert or overwrite `key`. A non-positive `ttl` falls back to the
    /// default TTL.
    pub fn set_with_ttl(&self, key: impl Into<String>, value: T, ttl: Duration) {
        let key = key.into();
        let ttl = if ttl > Duration::zero() {
            ttl
        } else {
            self.config.default_ttl
        };
        let now = self.clock.now();
        let mut inner = self.lock();

        if !inner.slots.contains_key(&key) && inner.slots.len() >= self.config.max_entries {
            if let Some(oldest) = inner.oldest_key() {
                inner.slots.remove(&oldest);
                inner.stats.evictions += 1;
                debug!(key = %oldest, "cache evicted oldest entry");
            }
        }

        inner.insert(key, CacheEntry::new(value, now, ttl));
        self.persist(&inner);
    }

    /// Remove one entry.
    pub fn invalidate(&self, key: &str) {
        let mut inner = self.lock();
        if inner.slots.remove(key).is_some() {
            debug!(key, "cache entry invalidated");
        }
        self.persist(&inner);
    }

    /// Remove every entry whose key matches `pattern`. Returns the number
    /// removed.
    pub fn invalidate_pattern(&self, pattern: &Regex) -> usize {
        let mut inner = self.lock();
        let before = inner.slots.len();
        inner.slots.retain(|key, _| !pattern.is_match(key));
        let removed = before - inner.slots.len();
        debug!(pattern = pattern.as_str(), removed, "cache pattern invalidated");
        self.persist(&inner);
        removed
    }

    /// Remove every entry.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.slots.clear();
        self.persist(&inner);
    }

    /// Number of stored entries, expired or not.
    pub fn len(&self) -> usize {
        self.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `key` is stored, without touching stats or expiry.
    pub fn contains_key(&self, key: &str) -> bool {
        self.lock().slots.contains_key(key)
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        CacheStats {
            entry_count: inner.slots.len() as u64,
            max_entries: self.config.max_entries as u64,
            ..inner.stats.clone()
        }
    }

    fn hydrate(&self) {
        let key = &self.config.storage_key;
        let raw = match self.store.get_item(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return,
            Err(e) => {
                warn!(error = %e, "failed to read cache snapshot");
                return;
            }
        };

        let snapshot: HashMap<String, CacheEntry<T>> = match serde_json::from_str(&raw) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, storage_key = %key, "discarding corrupted cache snapshot");
                if let Err(e) = self.store.remove_item(key) {
                    warn!(error = %e, "failed to remove corrupted cache snapshot");
                }
                return;
            }
        };

        let now = self.clock.now();
        let mut live: Vec<(String, CacheEntry<T>)> = snapshot
            .into_iter()
            .filter(|(_, entry)| !entry.is_expired(now))
            .collect();
        live.sort_by(|a, b| a.1.created_at.cmp(&b.1.created_at).then_with(|| a.0.cmp(&b.0)));

        // Keep the newest entries if the snapshot holds more than fit.
        let skip = live.len().saturating_sub(self.config.max_entries);

        let mut inner = self.lock();
        for (key, entry) in live.into_iter().skip(skip) {
            inner.insert(key, entry);
        }
        debug!(entries = inner.slots.len(), "cache hydrated from snapshot");
    }

    fn persist(&self, inner: &Inner<T>) {
        let snapshot: BTreeMap<&str, &CacheEntry<T>> = inner
            .slots
            .iter()
            .map(|(key, slot)| (key.as_str(), &slot.entry))
            .collect();

        let json = match serde_json::to_string(&snapshot) {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "failed to serialize cache snapshot");
                return;
            }
        };

        if let Err(e) = self.store.set_item(&self.config.storage_key, &json) {
            warn!(error = %e, "failed to persist cache snapshot");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use gauge_core::{ManualClock, StorageError, Timestamp};
    use proptest::prelude::*;
    use serde_json::{json, Value};

    fn start() -> Timestamp {
        Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap()
    }

    fn cache_with(
        config: CacheConfig,
        store: Arc<dyn SnapshotStore>,
    ) -> (ResultCache<Value>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(start()));
        let cache = ResultCache::new(config, store, clock.clone());
        (cache, clock)
    }

    fn memory_cache(config: CacheConfig) -> (ResultCache<Value>, Arc<ManualClock>) {
        cache_with(config, Arc::new(MemoryStore::new()))
    }

    fn created_at(cache: &ResultCache<Value>, key: &str) -> Option<Timestamp> {
        cache.lock().slots.get(key).map(|slot| slot.entry.created_at)
    }

    /// A store where every operation fails.
    struct BrokenStore;

    impl SnapshotStore for BrokenStore {
        fn get_item(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Err(StorageError::Unavailable {
                reason: "disabled".to_string(),
            })
        }
        fn set_item(&self, key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::QuotaExceeded {
                key: key.to_string(),
            })
        }
        fn remove_item(&self, _key: &str) -> Result<(), StorageError> {
            Err(StorageError::Unavailable {
                reason: "disabled".to_string(),
            })
        }
    }

    #[test]
    fn test_cache_config_builder() {
        let config = CacheConfig::new()
            .with_ttl_ms(120_000)
            .with_max_entries(0)
            .with_storage_key("other");
        assert_eq!(config.default_ttl, Duration::minutes(2));
        assert_eq!(config.max_entries, 1);
        assert_eq!(config.storage_key, "other");

        let default = CacheConfig::default();
        assert_eq!(default.default_ttl, Duration::milliseconds(300_000));
        assert_eq!(default.max_entries, 100);
        assert_eq!(default.storage_key, "analytics-query-cache");
    }

    #[test]
    fn test_round_trip_and_expiry() {
        let (cache, clock) = memory_cache(CacheConfig::default());
        cache.set_with_ttl(
            "overview:2024-01",
            json!({"totalCalls": 1500}),
            Duration::milliseconds(120_000),
        );

        clock.advance_ms(119_999);
        assert_eq!(cache.get("overview:2024-01"), Some(json!({"totalCalls": 1500})));

        clock.advance_ms(1);
        assert_eq!(
            cache.get("overview:2024-01"),
            Some(json!({"totalCalls": 1500})),
            "usable at exactly expiresAt"
        );

        clock.advance_ms(1);
        assert_eq!(cache.get("overview:2024-01"), None);
        assert!(!cache.contains_key("overview:2024-01"), "expired entry removed");
    }

    #[test]
    fn test_zero_ttl_uses_default() {
        let (cache, clock) = memory_cache(CacheConfig::new().with_ttl_ms(1_000));
        cache.set_with_ttl("k", json!(1), Duration::zero());
        clock.advance_ms(1_000);
        assert_eq!(cache.get("k"), Some(json!(1)));
        clock.advance_ms(1);
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn test_fifo_eviction_ignores_access() {
        let (cache, clock) = memory_cache(CacheConfig::new().with_max_entries(3));
        for key in ["a", "b", "c"] {
            cache.set(key, json!(key));
            clock.advance_ms(10);
        }

        // Reading "a" does not protect it.
        assert!(cache.get("a").is_some());
        cache.set("d", json!("d"));

        assert_eq!(cache.len(), 3);
        assert!(!cache.contains_key("a"));
        assert!(cache.contains_key("b"));
        assert!(cache.contains_key("d"));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_eviction_tie_breaks_on_insertion_order() {
        let (cache, _clock) = memory_cache(CacheConfig::new().with_max_entries(2));
        cache.set("first", json!(1));
        cache.set("second", json!(2));
        cache.set("third", json!(3));
        assert!(!cache.contains_key("first"));
        assert!(cache.contains_key("second"));
        assert!(cache.contains_key("third"));
    }

    #[test]
    fn test_overwrite_at_capacity_does_not_evict() {
        let (cache, clock) = memory_cache(CacheConfig::new().with_max_entries(2));
        cache.set("a", json!(1));
        clock.advance_ms(1);
        cache.set("b", json!(2));
        clock.advance_ms(1);
        cache.set("a", json!(3));

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a"), Some(json!(3)));
        assert_eq!(cache.get("b"), Some(json!(2)));
        assert_eq!(created_at(&cache, "a"), Some(start() + Duration::milliseconds(2)));
        assert_eq!(cache.stats().evictions, 0);
    }

    #[test]
    fn test_invalidate_and_pattern() {
        let (cache, _clock) = memory_cache(CacheConfig::default());
        cache.set("budget-config:", json!({}));
        cache.set("budget-history:month:\"2024-01\"", json!([]));
        cache.set("cost-tracking:month:\"current\"", json!({}));
        cache.set("overview:month:\"current\"", json!({}));

        cache.invalidate("overview:month:\"current\"");
        assert!(!cache.contains_key("overview:month:\"current\""));

        let removed = cache.invalidate_pattern(&Regex::new("^budget").unwrap());
        assert_eq!(removed, 2);
        assert_eq!(cache.len(), 1);
        assert!(cache.contains_key("cost-tracking:month:\"current\""));

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_stats() {
        let (cache, _clock) = memory_cache(CacheConfig::new().with_max_entries(10));
        cache.set("a", json!(1));
        cache.get("a");
        cache.get("a");
        cache.get("missing");

        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entry_count, 1);
        assert_eq!(stats.max_entries, 10);
    }

    #[test]
    fn test_persists_and_hydrates() {
        let store: Arc<dyn SnapshotStore> = Arc::new(MemoryStore::new());
        let (cache, clock) = cache_with(CacheConfig::default(), store.clone());
        cache.set_with_ttl("short", json!("s"), Duration::seconds(10));
        cache.set_with_ttl("long", json!("l"), Duration::minutes(10));

        let raw = store.get_item("analytics-query-cache").unwrap().unwrap();
        let parsed: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed["long"]["data"], json!("l"));
        assert!(parsed["long"]["expiresAt"].is_i64());

        clock.advance_ms(30_000);
        let reloaded: ResultCache<Value> =
            ResultCache::new(CacheConfig::default(), store, clock.clone());
        assert_eq!(reloaded.len(), 1, "expired entries dropped on hydrate");
        assert_eq!(reloaded.get("long"), Some(json!("l")));
    }

    #[test]
    fn test_hydrate_respects_capacity() {
        let store: Arc<dyn SnapshotStore> = Arc::new(MemoryStore::new());
        let (cache, clock) = cache_with(CacheConfig::new().with_max_entries(5), store.clone());
        for i in 0..5 {
            cache.set(format!("k{i}"), json!(i));
            clock.advance_ms(1);
        }

        let smaller: ResultCache<Value> =
            ResultCache::new(CacheConfig::new().with_max_entries(2), store, clock.clone());
        assert_eq!(smaller.len(), 2);
        assert!(smaller.contains_key("k3"));
        assert!(smaller.contains_key("k4"));
    }

    #[test]
    fn test_corrupted_snapshot_discarded() {
        let store = Arc::new(MemoryStore::new());
        store
            .set_item("analytics-query-cache", "{not json")
            .unwrap();

        let (cache, _clock) = cache_with(CacheConfig::default(), store.clone());
        assert!(cache.is_empty());
        assert_eq!(store.get_item("analytics-query-cache").unwrap(), None);

        cache.set("k", json!(1));
        assert_eq!(cache.get("k"), Some(json!(1)));
    }

    #[test]
    fn test_storage_failures_are_not_fatal() {
        let (cache, _clock) = cache_with(CacheConfig::default(), Arc::new(BrokenStore));
        cache.set("k", json!(1));
        assert_eq!(cache.get("k"), Some(json!(1)));
        cache.invalidate("k");
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_quota_exceeded_keeps_memory_state() {
        let store = Arc::new(MemoryStore::with_quota(64));
        let (cache, _clock) = cache_with(CacheConfig::default(), store.clone());
        cache.set("big", json!("x".repeat(256)));
        assert!(cache.get("big").is_some());
        assert_eq!(store.get_item("analytics-query-cache").unwrap(), None);
    }

    proptest! {
        #[test]
        fn prop_size_bounded_and_oldest_evicted(max in 1usize..8, extra in 1usize..8) {
            let (cache, clock) = memory_cache(CacheConfig::new().with_max_entries(max));
            let total = max + extra;
            for i in 0..total {
                cache.set(format!("k{i}"), json!(i));
                clock.advance_ms(1);
                prop_assert!(cache.len() <= max);
            }
            prop_assert_eq!(cache.len(), max);
            for i in 0..extra {
                let evicted = format!("k{}", i);
                prop_assert!(!cache.contains_key(&evicted));
            }
            for i in extra..total {
                let kept = format!("k{}", i);
                prop_assert!(cache.contains_key(&kept));
            }
        }

        #[test]
        fn prop_get_after_set_until_ttl(ttl_ms in 1i64..1_000_000, value in any::<i64>()) {
            let (cache, clock) = memory_cache(CacheConfig::default());
            cache.set_with_ttl("k", json!(value), Duration::milliseconds(ttl_ms));
            prop_assert_eq!(cache.get("k"), Some(json!(value)));
            clock.advance_ms(ttl_ms + 1);
            prop_assert_eq!(cache.get("k"), None);
        }
    }
}

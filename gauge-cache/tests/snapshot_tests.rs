//! File-backed snapshot persistence across cache instances.

use chrono::{Duration, TimeZone, Utc};
use gauge_cache::{CacheConfig, FileStore, ResultCache, SnapshotStore};
use gauge_core::{ManualClock, SharedClock};
use serde_json::{json, Value};
use std::sync::Arc;

fn open(dir: &std::path::Path, clock: &SharedClock) -> ResultCache<Value> {
    let store = FileStore::open(dir).unwrap();
    ResultCache::new(
        CacheConfig::new().with_max_entries(3),
        Arc::new(store),
        Arc::clone(clock),
    )
}

#[test]
fn test_snapshot_wire_format() {
    let dir = tempfile::tempdir().unwrap();
    let start = Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap();
    let clock: SharedClock = Arc::new(ManualClock::new(start));

    let cache = open(dir.path(), &clock);
    cache.set_with_ttl("overview:2024-01", json!({"totalCalls": 1500}), Duration::seconds(120));

    let raw = FileStore::open(dir.path())
        .unwrap()
        .get_item("analytics-query-cache")
        .unwrap()
        .unwrap();
    let snapshot: Value = serde_json::from_str(&raw).unwrap();
    let entry = &snapshot["overview:2024-01"];
    assert_eq!(entry["data"], json!({"totalCalls": 1500}));
    assert_eq!(entry["createdAt"], json!(start.timestamp_millis()));
    assert_eq!(entry["expiresAt"], json!(start.timestamp_millis() + 120_000));
}

#[test]
fn test_restart_keeps_live_entries_and_drops_expired() {
    let dir = tempfile::tempdir().unwrap();
    let manual = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap()));
    let clock: SharedClock = manual.clone();

    {
        let cache = open(dir.path(), &clock);
        cache.set_with_ttl("short", json!(1), Duration::seconds(10));
        cache.set_with_ttl("long", json!(2), Duration::minutes(10));
    }

    manual.advance_ms(60_000);
    let cache = open(dir.path(), &clock);
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.get("long"), Some(json!(2)));
    assert_eq!(cache.get("short"), None);
}

#[test]
fn test_eviction_order_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let manual = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap()));
    let clock: SharedClock = manual.clone();

    {
        let cache = open(dir.path(), &clock);
        for key in ["a", "b", "c"] {
            cache.set(key, json!(key));
            manual.advance_ms(1_000);
        }
    }

    let cache = open(dir.path(), &clock);
    cache.set("d", json!("d"));
    assert_eq!(cache.len(), 3);
    assert!(!cache.contains_key("a"));
    assert!(cache.contains_key("b"));
    assert!(cache.contains_key("d"));
}

#[test]
fn test_clear_persists_empty_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let clock: SharedClock = Arc::new(ManualClock::starting_now());

    let cache = open(dir.path(), &clock);
    cache.set("k", json!(true));
    cache.clear();

    let reopened = open(dir.path(), &clock);
    assert!(reopened.is_empty());
}

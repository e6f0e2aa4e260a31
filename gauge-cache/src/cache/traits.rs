//! Snapshot storage trait and cache statistics.

use gauge_core::StorageError;

/// A synchronous string key/value medium that cache snapshots persist to.
///
/// Implementations may fail for any reason (quota, permissions, missing
/// medium). Callers treat every failure as recoverable.
pub trait SnapshotStore: Send + Sync {
    /// Read an item. `Ok(None)` when the key has never been written.
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write an item, replacing any previous value.
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove an item. Removing a missing key is not an error.
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses, including expired entries.
    pub misses: u64,
    /// Number of entries currently in cache.
    pub entry_count: u64,
    /// Configured capacity.
    pub max_entries: u64,
    /// Number of evictions due to capacity.
    pub evictions: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_stats_hit_rate() {
        let stats = CacheStats {
            hits: 80,
            misses: 20,
            ..Default::default()
        };
        assert!((stats.hit_rate() - 0.8).abs() < 0.001);

        let empty_stats = CacheStats::default();
        assert!((empty_stats.hit_rate() - 0.0).abs() < 0.001);
    }
}

//! Result caching.
//!
//! - [`ResultCache`]: key → value map with per-entry TTL and FIFO eviction
//! - [`SnapshotStore`]: the string key/value medium snapshots are written to
//! - [`MemoryStore`] / [`FileStore`]: store implementations
//! - [`QueryKey`]: deterministic cache keys for parameterised queries

mod entry;
mod key;
mod result_cache;
mod store;
mod traits;

pub use entry::CacheEntry;
pub use key::QueryKey;
pub use result_cache::{CacheConfig, ResultCache};
pub use store::{FileStore, MemoryStore};
pub use traits::{CacheStats, SnapshotStore};

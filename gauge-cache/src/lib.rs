//! GAUGE Cache - Result Cache and Request De-duplication
//!
//! A bounded TTL cache whose contents survive restarts through a pluggable
//! snapshot store, plus a batcher that collapses concurrent identical
//! queries into a single fetch.

pub mod batcher;
pub mod cache;
pub mod filter_store;

pub use batcher::RequestBatcher;
pub use cache::{
    CacheConfig, CacheEntry, CacheStats, FileStore, MemoryStore, QueryKey, ResultCache,
    SnapshotStore,
};
pub use filter_store::{load_filters, save_filters, FILTER_STORAGE_KEY};

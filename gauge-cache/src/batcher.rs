//! In-flight request de-duplication.
//!
//! Concurrent calls that share a cache key are collapsed onto one shared
//! future. The registration is dropped as soon as that future settles, so
//! the next call after completion always starts a fresh fetch.

use futures_util::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

type PendingFuture<T, E> = Shared<BoxFuture<'static, Result<T, E>>>;

struct Pending<T, E> {
    id: u64,
    future: PendingFuture<T, E>,
}

type Registry<T, E> = Arc<Mutex<HashMap<String, Pending<T, E>>>>;

/// Shares one in-flight fetch between every caller asking for the same key.
///
/// Successes and failures are both shared: every waiter sees a clone of
/// the same `Result`. Nothing is retried or cached here.
pub struct RequestBatcher<T, E> {
    pending: Registry<T, E>,
    next_id: AtomicU64,
}

impl<T, E> Default for RequestBatcher<T, E> {
    fn default() -> Self {
        Self {
            pending: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(0),
        }
    }
}

impl<T, E> std::fmt::Debug for RequestBatcher<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestBatcher").finish_non_exhaustive()
    }
}

fn lock<T, E>(registry: &Registry<T, E>) -> MutexGuard<'_, HashMap<String, Pending<T, E>>> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<T, E> RequestBatcher<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `producer` for `key`, or join the fetch already running for it.
    ///
    /// `producer` is only invoked when nothing is pending under `key`, and
    /// never while the registry lock is held, so it may call back into the
    /// batcher.
    pub async fn execute<F, Fut>(&self, key: &str, producer: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        if let Some(existing) = self.in_flight(key) {
            debug!(key, "joining in-flight request");
            return existing.await;
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let fetch = producer();

        let future = {
            let mut pending = lock(&self.pending);
            match pending.get(key) {
                // Another caller registered while `producer` ran; ours is
                // dropped unpolled.
                Some(existing) => {
                    debug!(key, "joining request registered concurrently");
                    existing.future.clone()
                }
                None => {
                    let future = Self::register(Arc::clone(&self.pending), key, id, fetch);
                    pending.insert(
                        key.to_string(),
                        Pending {
                            id,
                            future: future.clone(),
                        },
                    );
                    future
                }
            }
        };
        future.await
    }

    fn in_flight(&self, key: &str) -> Option<PendingFuture<T, E>> {
        lock(&self.pending).get(key).map(|p| p.future.clone())
    }

    fn register<Fut>(
        registry: Registry<T, E>,
        key: &str,
        id: u64,
        fetch: Fut,
    ) -> PendingFuture<T, E>
    where
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let key = key.to_string();
        async move {
            let result = fetch.await;
            let mut pending = lock(&registry);
            // Only drop our own registration; `clear` may have let a newer
            // fetch take the key.
            if pending.get(&key).is_some_and(|p| p.id == id) {
                pending.remove(&key);
            }
            result
        }
        .boxed()
        .shared()
    }

    /// Whether a fetch is currently registered under `key`.
    pub fn is_pending(&self, key: &str) -> bool {
        lock(&self.pending).contains_key(key)
    }

    /// Number of keys with a fetch in flight.
    pub fn pending_count(&self) -> usize {
        lock(&self.pending).len()
    }

    /// Forget every registration. Fetches already running still complete
    /// for their current waiters; new calls start fresh.
    pub fn clear(&self) {
        lock(&self.pending).clear();
    }
}

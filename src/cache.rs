use crate::error::Res;
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// A time-windowed memo: each key holds a value and the instant it stops being served.
///
/// The lock is held across the fetch, so two callers missing the same key at once fetch once.
#[derive(Clone)]
pub struct TtlCache<K, V>
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    ttl: Duration,
    inner: Arc<Mutex<HashMap<K, (V, Instant)>>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + std::fmt::Debug,
    V: Clone + Send + Sync,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            inner: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the cached value for `key` if it has not expired, otherwise runs `fetch`, stores
    /// its value and returns it. A failed fetch stores nothing.
    pub async fn get_or_fetch<F, Fut>(&self, key: &K, fetch: F) -> Res<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Res<V>>,
    {
        let mut cache = self.inner.lock().await;
        if let Some((value, expires)) = cache.get(key) {
            if Instant::now() < *expires {
                debug!("Cache HIT for {key:?}");
                return Ok(value.clone());
            }
            debug!("Cache EXPIRED for {key:?}");
        } else {
            debug!("Cache MISS for {key:?}");
        }
        let value = fetch().await?;
        cache.insert(key.clone(), (value.clone(), Instant::now() + self.ttl));
        Ok(value)
    }

    /// Drops the entry for `key` so the next `get_or_fetch` fetches again.
    pub async fn invalidate(&self, key: &K) {
        let mut cache = self.inner.lock().await;
        if cache.remove(key).is_some() {
            debug!("Cache INVALIDATE for {key:?}");
        }
    }
}

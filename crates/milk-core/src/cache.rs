//! In-memory request cache keyed by query parameters.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::Result;

/// Entries older than this are refetched.
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(5 * 60);
/// Extra attempts after a failed fetch.
pub const DEFAULT_RETRIES: usize = 1;
pub const DEFAULT_MAX_ENTRIES: usize = 64;

struct CacheEntry<V> {
    value: V,
    fetched_at: Instant,
}

/// Bounded cache of fetched values with a staleness window and retry count.
pub struct QueryCache<V> {
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
    stale_after: Duration,
    retries: usize,
    max_entries: usize,
}

impl<V> std::fmt::Debug for QueryCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryCache")
            .field("entries", &self.len())
            .field("stale_after", &self.stale_after)
            .field("retries", &self.retries)
            .field("max_entries", &self.max_entries)
            .finish()
    }
}

impl<V: Clone> Default for QueryCache<V> {
    fn default() -> Self {
        Self::new(DEFAULT_STALE_AFTER, DEFAULT_RETRIES, DEFAULT_MAX_ENTRIES)
    }
}

impl<V: Clone> QueryCache<V> {
    pub fn new(stale_after: Duration, retries: usize, max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            stale_after,
            retries,
            max_entries: max_entries.max(1),
        }
    }

    /// Return the cached value for `key` while fresh, otherwise run `fetch`.
    ///
    /// A failed fetch is retried up to the configured retry count; the last
    /// error is returned and nothing is cached.
    pub async fn get_or_fetch<F, Fut>(&self, key: &str, mut fetch: F) -> Result<V>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        if let Some(value) = self.fresh(key) {
            tracing::debug!("cache hit {}", key);
            return Ok(value);
        }

        let mut attempt = 0;
        loop {
            match fetch().await {
                Ok(value) => {
                    self.store(key, value.clone());
                    return Ok(value);
                }
                Err(error) if attempt < self.retries => {
                    attempt += 1;
                    tracing::debug!("retrying {} after error: {}", key, error);
                }
                Err(error) => return Err(error),
            }
        }
    }

    pub fn invalidate(&self, key: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(key);
        }
    }

    /// Drop every entry whose key starts with `prefix` (e.g. a table name).
    pub fn invalidate_prefix(&self, prefix: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.retain(|key, _| !key.starts_with(prefix));
        }
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }

    fn fresh(&self, key: &str) -> Option<V> {
        let entries = self.entries.lock().ok()?;
        let entry = entries.get(key)?;
        (entry.fetched_at.elapsed() < self.stale_after).then(|| entry.value.clone())
    }

    fn store(&self, key: &str, value: V) {
        let Ok(mut entries) = self.entries.lock() else {
            return;
        };
        if !entries.contains_key(key) && entries.len() >= self.max_entries {
            let oldest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.fetched_at)
                .map(|(key, _)| key.clone());
            if let Some(oldest) = oldest {
                entries.remove(&oldest);
            }
        }
        entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                fetched_at: Instant::now(),
            },
        );
    }
}

impl<V> QueryCache<V> {
    pub fn len(&self) -> usize {
        self.entries.lock().map_or(0, |entries| entries.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::error::Error;

    #[tokio::test(start_paused = true)]
    async fn fresh_entries_skip_fetch_until_stale() {
        let cache = QueryCache::<u32>::default();
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let fetch = move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(7)
        };

        assert_eq!(cache.get_or_fetch("stats", fetch).await.unwrap(), 7);
        assert_eq!(cache.get_or_fetch("stats", fetch).await.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(DEFAULT_STALE_AFTER + Duration::from_secs(1)).await;
        assert_eq!(cache.get_or_fetch("stats", fetch).await.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_fetch_is_retried_once() {
        let cache = QueryCache::<u32>::default();
        let counter = AtomicUsize::new(0);
        let calls = &counter;

        let value = cache
            .get_or_fetch("flaky", move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(Error::api(503, None, "unavailable"))
                } else {
                    Ok(3)
                }
            })
            .await
            .unwrap();
        assert_eq!(value, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn persistent_failure_is_returned_and_not_cached() {
        let cache = QueryCache::<u32>::default();
        let counter = AtomicUsize::new(0);
        let calls = &counter;

        let result = cache
            .get_or_fetch("down", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Error::api(503, None, "unavailable"))
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1 + DEFAULT_RETRIES);
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn oldest_entry_is_evicted_when_full() {
        let cache = QueryCache::<u32>::new(DEFAULT_STALE_AFTER, 0, 2);
        cache.get_or_fetch("a", || async { Ok(1) }).await.unwrap();
        tokio::time::advance(Duration::from_secs(1)).await;
        cache.get_or_fetch("b", || async { Ok(2) }).await.unwrap();
        tokio::time::advance(Duration::from_secs(1)).await;
        cache.get_or_fetch("c", || async { Ok(3) }).await.unwrap();

        assert_eq!(cache.len(), 2);
        assert!(cache.fresh("a").is_none());
        assert_eq!(cache.fresh("c"), Some(3));
    }

    #[tokio::test]
    async fn invalidate_prefix_drops_matching_keys() {
        let cache = QueryCache::<u32>::default();
        cache.get_or_fetch("brands?x", || async { Ok(1) }).await.unwrap();
        cache.get_or_fetch("shops?x", || async { Ok(2) }).await.unwrap();

        cache.invalidate_prefix("brands");
        assert!(cache.fresh("brands?x").is_none());
        assert_eq!(cache.fresh("shops?x"), Some(2));
    }
}

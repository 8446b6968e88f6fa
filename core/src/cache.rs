//! Run-scoped memoization for probes keyed by registrable domain.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;

/// Caches one probe result per apex domain for the lifetime of an enumeration
/// run. Shared across workers behind an `Arc`; cardinality is bounded by the
/// number of distinct apex domains in the batch, so there is no eviction.
///
/// Population is first-writer-wins: two tasks that miss the same key at the
/// same time may both run the probe, but only the first insert is kept and
/// both callers observe that value.
pub struct ApexCache<T> {
    inner: Mutex<HashMap<String, T>>,
}

impl<T: Clone> ApexCache<T> {
    pub fn new() -> Self {
        ApexCache { inner: Mutex::new(HashMap::new()) }
    }

    /// Return the cached value for `apex`, running `compute` only on a miss.
    /// The lock is not held across the await point.
    pub async fn get_or_compute<F, Fut>(&self, apex: &str, compute: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        if let Some(hit) = self.inner.lock().unwrap().get(apex) {
            return hit.clone();
        }
        let value = compute().await;
        let mut map = self.inner.lock().unwrap();
        map.entry(apex.to_string()).or_insert(value).clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Clone> Default for ApexCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn computes_once_per_key() {
        let cache = ApexCache::new();
        let calls = AtomicUsize::new(0);
        for _ in 0..5 {
            let v = cache
                .get_or_compute("example.com", || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    "spf ok".to_string()
                })
                .await;
            assert_eq!(v, "spf ok");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn distinct_keys_compute_separately() {
        let cache = ApexCache::new();
        let a = cache.get_or_compute("a.com", || async { 1u32 }).await;
        let b = cache.get_or_compute("b.com", || async { 2u32 }).await;
        assert_eq!((a, b), (1, 2));
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn first_writer_wins() {
        let cache = ApexCache::new();
        let first = cache.get_or_compute("x.com", || async { "first" }).await;
        let second = cache.get_or_compute("x.com", || async { "second" }).await;
        assert_eq!(first, "first");
        assert_eq!(second, "first");
    }
}

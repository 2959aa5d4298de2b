//! Bounded analysis cache with FIFO eviction.

use std::collections::{HashMap, VecDeque};

use tokio::sync::Mutex;
use tracing::debug;

use fscan_models::{Fingerprint, FrameReport};

use crate::metrics::record_cache_lookup;

struct CacheInner {
    entries: HashMap<Fingerprint, FrameReport>,
    /// First-seen insertion order; the front is next to evict.
    order: VecDeque<Fingerprint>,
}

/// Bounded mapping from content fingerprint to analysis report.
///
/// Eviction is FIFO on first insertion: when an insert pushes the map past
/// capacity, the earliest-inserted surviving entry is dropped. Overwriting
/// an existing key does not refresh its position, and lookups never reorder
/// anything. This is deliberately not an LRU.
pub struct AnalysisCache {
    capacity: usize,
    inner: Mutex<CacheInner>,
}

impl AnalysisCache {
    /// Create a cache holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                order: VecDeque::new(),
            }),
        }
    }

    /// Look up a report. Never mutates cache state.
    pub async fn lookup(&self, fingerprint: &Fingerprint) -> Option<FrameReport> {
        let inner = self.inner.lock().await;
        let found = inner.entries.get(fingerprint).cloned();
        record_cache_lookup(found.is_some());
        found
    }

    /// Insert or overwrite a report.
    ///
    /// A new key joins the back of the eviction queue; an overwrite keeps
    /// the key's original position.
    pub async fn insert(&self, fingerprint: Fingerprint, report: FrameReport) {
        let mut inner = self.inner.lock().await;

        if inner.entries.insert(fingerprint.clone(), report).is_none() {
            inner.order.push_back(fingerprint);
        }

        while inner.entries.len() > self.capacity {
            if let Some(oldest) = inner.order.pop_front() {
                inner.entries.remove(&oldest);
                debug!(fingerprint = %oldest, "Evicted oldest cache entry");
            } else {
                break;
            }
        }
    }

    /// Current number of entries.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.entries.len()
    }

    /// Whether the cache holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// The configured capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fp(n: u32) -> Fingerprint {
        Fingerprint::of_bytes(&n.to_be_bytes())
    }

    fn report(n: u32) -> FrameReport {
        FrameReport::new(format!("report {}", n))
    }

    #[tokio::test]
    async fn test_lookup_miss_then_hit() {
        let cache = AnalysisCache::new(10);
        assert!(cache.lookup(&fp(1)).await.is_none());

        cache.insert(fp(1), report(1)).await;
        assert_eq!(cache.lookup(&fp(1)).await, Some(report(1)));
    }

    #[tokio::test]
    async fn test_capacity_never_exceeded() {
        let cache = AnalysisCache::new(5);
        for n in 0..50 {
            cache.insert(fp(n), report(n)).await;
            assert!(cache.len().await <= 5);
        }
    }

    #[tokio::test]
    async fn test_evicts_oldest_inserted() {
        let cache = AnalysisCache::new(3);
        for n in 1..=3 {
            cache.insert(fp(n), report(n)).await;
        }

        cache.insert(fp(4), report(4)).await;

        assert!(cache.lookup(&fp(1)).await.is_none(), "oldest entry evicted");
        assert!(cache.lookup(&fp(2)).await.is_some());
        assert!(cache.lookup(&fp(3)).await.is_some());
        assert!(cache.lookup(&fp(4)).await.is_some());
    }

    #[tokio::test]
    async fn test_overwrite_keeps_position() {
        let cache = AnalysisCache::new(2);
        cache.insert(fp(1), report(1)).await;
        cache.insert(fp(2), report(2)).await;

        // Overwriting entry 1 must not move it to the back of the queue.
        cache.insert(fp(1), report(100)).await;
        assert_eq!(cache.lookup(&fp(1)).await, Some(report(100)));

        cache.insert(fp(3), report(3)).await;

        assert!(cache.lookup(&fp(1)).await.is_none(), "overwritten entry still evicts first");
        assert!(cache.lookup(&fp(2)).await.is_some());
        assert!(cache.lookup(&fp(3)).await.is_some());
    }

    #[tokio::test]
    async fn test_lookup_does_not_refresh_position() {
        let cache = AnalysisCache::new(2);
        cache.insert(fp(1), report(1)).await;
        cache.insert(fp(2), report(2)).await;

        // Touching entry 1 repeatedly changes nothing about eviction order.
        for _ in 0..5 {
            cache.lookup(&fp(1)).await;
        }
        cache.insert(fp(3), report(3)).await;

        assert!(cache.lookup(&fp(1)).await.is_none());
        assert!(cache.lookup(&fp(2)).await.is_some());
    }
}

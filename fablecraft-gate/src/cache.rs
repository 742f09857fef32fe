//! Response Cache
//!
//! Process-lifetime cache of successful response payloads keyed by
//! request fingerprint. Entries carry their own validity window and are
//! evicted lazily on read plus opportunistically by the background
//! sweeper ([`crate::sweeper`]).
//!
//! The store never raises toward the caller: every failure mode is a
//! miss. Expiry arithmetic uses `Instant` so wall-clock adjustments
//! cannot resurrect stale entries.

use dashmap::DashMap;
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A single cached response payload.
///
/// Created on the first successful cacheable response for a key,
/// read-only afterwards, and replaced wholesale by a fresh write.
#[derive(Debug, Clone)]
struct CacheEntry {
    payload: Arc<Value>,
    stored_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    /// An entry is expired once its validity window has fully elapsed.
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.stored_at + self.ttl
    }
}

/// Counters for cache observability.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub expired_evictions: u64,
}

/// Time-bounded response cache.
#[derive(Debug, Default)]
pub struct CacheStore {
    entries: DashMap<String, CacheEntry>,
    hits: AtomicU64,
    misses: AtomicU64,
    expired_evictions: AtomicU64,
}

impl CacheStore {
    /// Create an empty cache store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a payload by fingerprint.
    ///
    /// Never returns an expired entry: an entry whose window has
    /// elapsed is removed on the spot and reported as a miss.
    pub fn get(&self, key: &str) -> Option<Arc<Value>> {
        let now = Instant::now();
        let expired = match self.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(Arc::clone(&entry.payload));
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            // Re-checks expiry under the shard lock so a concurrent
            // fresh write for the same key survives the eviction.
            if self
                .entries
                .remove_if(key, |_, entry| entry.is_expired(Instant::now()))
                .is_some()
            {
                self.expired_evictions.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(key = %key, "Evicted expired cache entry on read");
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Store a payload under a fingerprint, replacing any previous
    /// entry for the same key.
    ///
    /// A zero ttl is rejected as a no-op with a log entry; `Duration`
    /// cannot be negative, so zero is the only invalid value.
    pub fn put(&self, key: &str, payload: Arc<Value>, ttl: Duration) {
        if ttl.is_zero() {
            tracing::warn!(key = %key, "Rejected cache write with non-positive ttl");
            return;
        }

        self.entries.insert(
            key.to_string(),
            CacheEntry {
                payload,
                stored_at: Instant::now(),
                ttl,
            },
        );
        tracing::debug!(key = %key, ttl_ms = ttl.as_millis() as u64, "Cached response");
    }

    /// Remove every entry whose validity window has elapsed.
    ///
    /// Eviction is per-entry check-and-remove via the map's sharded
    /// `retain` - there is no global lock, and entries written during
    /// the sweep are unaffected (their window just opened). Returns the
    /// number of entries removed.
    pub fn sweep(&self) -> usize {
        let before = self.entries.len();
        let now = Instant::now();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        let removed = before.saturating_sub(self.entries.len());

        if removed > 0 {
            self.expired_evictions
                .fetch_add(removed as u64, Ordering::Relaxed);
            tracing::debug!(removed, "Swept expired cache entries");
        }
        removed
    }

    /// Number of live (not yet swept) entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache currently holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot of the cache counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            expired_evictions: self.expired_evictions.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn value(v: serde_json::Value) -> Arc<Value> {
        Arc::new(v)
    }

    #[test]
    fn test_put_then_get() {
        let cache = CacheStore::new();
        cache.put("k", value(json!("v")), Duration::from_secs(30));

        let hit = cache.get("k").expect("fresh entry should hit");
        assert_eq!(*hit, json!("v"));
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn test_get_absent_is_miss() {
        let cache = CacheStore::new();
        assert!(cache.get("nope").is_none());
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_expiry_boundary() {
        let cache = CacheStore::new();
        cache.put("k", value(json!("v")), Duration::from_millis(50));

        assert!(cache.get("k").is_some());
        std::thread::sleep(Duration::from_millis(60));
        assert!(cache.get("k").is_none(), "entry past stored_at+ttl must be absent");

        // The lazy eviction removed the entry outright
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.stats().expired_evictions, 1);
    }

    #[test]
    fn test_put_overwrites_wholesale() {
        let cache = CacheStore::new();
        cache.put("k", value(json!({"rev": 1})), Duration::from_secs(30));
        cache.put("k", value(json!({"rev": 2})), Duration::from_secs(30));

        assert_eq!(*cache.get("k").unwrap(), json!({"rev": 2}));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_zero_ttl_rejected() {
        let cache = CacheStore::new();
        cache.put("k", value(json!("v")), Duration::ZERO);
        assert!(cache.get("k").is_none());
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_sweep_removes_only_expired() {
        let cache = CacheStore::new();
        cache.put("old", value(json!(1)), Duration::from_millis(20));
        cache.put("fresh", value(json!(2)), Duration::from_secs(60));

        std::thread::sleep(Duration::from_millis(30));
        let removed = cache.sweep();

        assert_eq!(removed, 1);
        assert!(cache.get("old").is_none());
        assert!(cache.get("fresh").is_some());
    }

    #[test]
    fn test_sweep_empty_cache() {
        let cache = CacheStore::new();
        assert_eq!(cache.sweep(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_get_put_sweep() {
        let cache = Arc::new(CacheStore::new());
        let mut handles = Vec::new();

        for i in 0..8 {
            let cache = Arc::clone(&cache);
            handles.push(tokio::spawn(async move {
                for j in 0..50 {
                    let key = format!("k{}", (i + j) % 10);
                    cache.put(&key, Arc::new(json!(j)), Duration::from_millis(5));
                    let _ = cache.get(&key);
                    cache.sweep();
                }
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }
        // No panics/deadlocks and counters stayed coherent
        let stats = cache.stats();
        assert_eq!(stats.hits + stats.misses, 400);
    }
}

//! Bounded LRU cache with loader-based lookup
//!
//! Thread-safe wrapper around [`LruCache`]. A lookup that misses runs the
//! loader and stores its result while the cache lock is held, so two callers
//! racing on the same key never both load it.

use parking_lot::Mutex;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use super::monitor::{CacheCounters, CacheMonitor, MonitorRegistration};
use super::util::LruCache;

/// Capacity-limited cache evicting the least recently used entry
pub struct BoundedCache<K, V> {
    name: String,
    inner: Mutex<LruCache<K, V>>,
    counters: Arc<CacheCounters>,
    _registration: Option<MonitorRegistration>,
}

/// Point-in-time statistics of a [`BoundedCache`]
#[derive(Debug, Clone, PartialEq)]
pub struct BoundedCacheStats {
    pub entries: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

impl<K, V> BoundedCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create an unmonitored cache
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        Self::build(name.into(), capacity, None)
    }

    /// Create a cache tracked by `monitor` for as long as it lives
    pub fn with_monitor(name: impl Into<String>, capacity: usize, monitor: &CacheMonitor) -> Self {
        Self::build(name.into(), capacity, Some(monitor))
    }

    fn build(name: String, capacity: usize, monitor: Option<&CacheMonitor>) -> Self {
        let inner = LruCache::new(capacity);
        let counters = Arc::new(CacheCounters::new(inner.capacity()));
        let registration = monitor.map(|m| m.register(name.clone(), counters.clone()));
        Self {
            name,
            inner: Mutex::new(inner),
            counters,
            _registration: registration,
        }
    }

    /// Return the value for `key`, loading and inserting it on a miss
    pub fn get<F>(&self, key: K, loader: F) -> V
    where
        F: FnOnce(&K) -> V,
    {
        match self.try_get(key, |k| Ok::<V, std::convert::Infallible>(loader(k))) {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }

    /// Fallible variant of [`BoundedCache::get`]; a failed load inserts nothing
    pub fn try_get<F, E>(&self, key: K, loader: F) -> Result<V, E>
    where
        F: FnOnce(&K) -> Result<V, E>,
    {
        let mut inner = self.inner.lock();

        if let Some(value) = inner.get(&key) {
            self.counters.record_hit();
            return Ok(value.clone());
        }

        self.counters.record_miss();
        let value = loader(&key)?;
        if inner.insert(key, value.clone()).is_some() {
            self.counters.record_eviction();
            tracing::trace!("Evicted least recently used entry from {}", self.name);
        }
        self.counters.set_entries(inner.len());
        Ok(value)
    }

    /// Membership test that leaves recency untouched
    pub fn has(&self, key: &K) -> bool {
        self.inner.lock().contains(key)
    }

    /// Remove one entry
    pub fn invalidate(&self, key: &K) -> Option<V> {
        let mut inner = self.inner.lock();
        let removed = inner.remove(key);
        self.counters.set_entries(inner.len());
        removed
    }

    /// Remove every entry
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.clear();
        self.counters.set_entries(0);
    }

    /// Keys ordered from most to least recently used
    pub fn keys_by_recency(&self) -> Vec<K> {
        self.inner.lock().keys_by_recency().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.counters.capacity()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stats(&self) -> BoundedCacheStats {
        BoundedCacheStats {
            entries: self.counters.entries(),
            capacity: self.counters.capacity(),
            hits: self.counters.hits(),
            misses: self.counters.misses(),
            evictions: self.counters.evictions(),
        }
    }
}

impl<K, V> fmt::Debug for BoundedCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedCache")
            .field("name", &self.name)
            .field("entries", &self.counters.entries())
            .field("capacity", &self.counters.capacity())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_eviction_scenario() {
        let cache = BoundedCache::new("scenario", 2);
        let loads = AtomicUsize::new(0);
        let load = |k: &&str| {
            loads.fetch_add(1, Ordering::SeqCst);
            k.to_uppercase()
        };

        assert_eq!(cache.get("a", load), "A");
        assert_eq!(cache.get("b", load), "B");
        assert!(cache.has(&"a") && cache.has(&"b"));

        // Hit promotes "a"
        assert_eq!(cache.get("a", load), "A");
        assert_eq!(loads.load(Ordering::SeqCst), 2);

        assert_eq!(cache.get("c", load), "C");
        assert!(cache.has(&"a"));
        assert!(!cache.has(&"b"));
        assert!(cache.has(&"c"));
        assert_eq!(cache.keys_by_recency(), vec!["c", "a"]);

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 3);
        assert_eq!(stats.evictions, 1);
        assert_eq!(stats.entries, 2);
    }

    #[test]
    fn test_has_does_not_promote() {
        let cache = BoundedCache::new("peek", 2);
        cache.get(1, |k| *k * 10);
        cache.get(2, |k| *k * 10);

        assert!(cache.has(&1));
        cache.get(3, |k| *k * 10);

        assert!(!cache.has(&1));
        assert!(cache.has(&2));
    }

    #[test]
    fn test_failed_load_inserts_nothing() {
        let cache: BoundedCache<u32, u32> = BoundedCache::new("fallible", 4);

        let result: Result<u32, String> = cache.try_get(1, |_| Err("unreadable".to_string()));
        assert!(result.is_err());
        assert!(!cache.has(&1));

        let result: Result<u32, String> = cache.try_get(1, |k| Ok(k + 1));
        assert_eq!(result, Ok(2));
        assert!(cache.has(&1));
    }

    #[test]
    fn test_invalidate_and_clear() {
        let cache = BoundedCache::new("objects", 4);
        cache.get("x", |_| 1);
        cache.get("y", |_| 2);

        assert_eq!(cache.invalidate(&"x"), Some(1));
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.stats().entries, 0);
    }

    #[test]
    fn test_monitored_cache_deregisters_on_drop() {
        let monitor = CacheMonitor::new();
        {
            let cache = BoundedCache::with_monitor("rasters", 3, &monitor);
            cache.get(1, |_| "r1");
            let report = monitor.report();
            assert_eq!(report.len(), 1);
            assert_eq!(report[0].name, "rasters");
            assert_eq!(report[0].entries, 1);
            assert_eq!(report[0].misses, 1);
        }
        assert!(monitor.is_empty());
    }

    #[test]
    fn test_concurrent_loads_run_once_per_key() {
        let cache = BoundedCache::new("shared", 16);
        let loads = AtomicUsize::new(0);

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    for key in 0..4u32 {
                        cache.get(key, |k| {
                            loads.fetch_add(1, Ordering::SeqCst);
                            k * 2
                        });
                    }
                });
            }
        });

        assert_eq!(loads.load(Ordering::SeqCst), 4);
        assert_eq!(cache.len(), 4);
    }
}

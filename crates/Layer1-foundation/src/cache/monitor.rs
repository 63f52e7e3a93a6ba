//! Cache monitor registry
//!
//! Tracks the bounded caches that are alive for diagnostics. A monitor is
//! created by whoever owns a session and handed to the caches it should
//! watch; caches deregister themselves when dropped.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use uuid::Uuid;

/// Live counters shared between a bounded cache and its monitor
#[derive(Debug, Default)]
pub struct CacheCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    entries: AtomicUsize,
    capacity: AtomicUsize,
}

impl CacheCounters {
    pub fn new(capacity: usize) -> Self {
        let counters = Self::default();
        counters.capacity.store(capacity, Ordering::Relaxed);
        counters
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_entries(&self, entries: usize) {
        self.entries.store(entries, Ordering::Relaxed);
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    pub fn entries(&self) -> usize {
        self.entries.load(Ordering::Relaxed)
    }

    pub fn capacity(&self) -> usize {
        self.capacity.load(Ordering::Relaxed)
    }

    /// Fraction of lookups served from the cache
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits();
        let total = hits + self.misses();
        if total == 0 {
            return 0.0;
        }
        hits as f64 / total as f64
    }
}

/// One line of a monitor report
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheReport {
    pub id: Uuid,
    pub name: String,
    pub entries: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub registered_at: DateTime<Utc>,
}

#[derive(Debug)]
struct MonitoredCache {
    name: String,
    counters: Arc<CacheCounters>,
    registered_at: DateTime<Utc>,
}

type Registry = Mutex<HashMap<Uuid, MonitoredCache>>;

/// Registry of live bounded caches
#[derive(Debug, Clone, Default)]
pub struct CacheMonitor {
    caches: Arc<Registry>,
}

impl CacheMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a cache; tracking ends when the returned guard drops
    pub fn register(
        &self,
        name: impl Into<String>,
        counters: Arc<CacheCounters>,
    ) -> MonitorRegistration {
        let id = Uuid::new_v4();
        let name = name.into();
        tracing::debug!("Monitoring cache {} ({})", name, id);

        self.caches.lock().insert(
            id,
            MonitoredCache {
                name,
                counters,
                registered_at: Utc::now(),
            },
        );

        MonitorRegistration {
            id,
            registry: Arc::downgrade(&self.caches),
        }
    }

    /// Number of caches currently tracked
    pub fn len(&self) -> usize {
        self.caches.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.caches.lock().is_empty()
    }

    /// Snapshot of every tracked cache, oldest registration first
    pub fn report(&self) -> Vec<CacheReport> {
        let caches = self.caches.lock();
        let mut report: Vec<CacheReport> = caches
            .iter()
            .map(|(id, cache)| CacheReport {
                id: *id,
                name: cache.name.clone(),
                entries: cache.counters.entries(),
                capacity: cache.counters.capacity(),
                hits: cache.counters.hits(),
                misses: cache.counters.misses(),
                evictions: cache.counters.evictions(),
                registered_at: cache.registered_at,
            })
            .collect();
        report.sort_by(|a, b| {
            a.registered_at
                .cmp(&b.registered_at)
                .then_with(|| a.name.cmp(&b.name))
        });
        report
    }

    /// Total entries held across tracked caches
    pub fn total_entries(&self) -> usize {
        self.caches
            .lock()
            .values()
            .map(|cache| cache.counters.entries())
            .sum()
    }
}

/// Deregisters a cache from its monitor on drop
#[derive(Debug)]
pub struct MonitorRegistration {
    id: Uuid,
    registry: Weak<Registry>,
}

impl MonitorRegistration {
    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl Drop for MonitorRegistration {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            if let Some(cache) = registry.lock().remove(&self.id) {
                tracing::debug!("Stopped monitoring cache {} ({})", cache.name, self.id);
            }
        }
    }
}

//! # featcache Cache Primitives
//!
//! Building blocks the feature session caches are assembled from.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Cache Primitives                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                              │
//! │  ┌──────────────┐   single slot, compute once, reset,       │
//! │  │    Memo<T>   │   transplant from a sibling cell          │
//! │  └──────────────┘                                            │
//! │                                                              │
//! │  ┌──────────────┐   ┌──────────────┐                        │
//! │  │ BoundedCache │──▶│   LruCache   │  recency eviction      │
//! │  │  (locked)    │   │ (unlocked)   │                        │
//! │  └──────┬───────┘   └──────────────┘                        │
//! │         │ registers counters                                 │
//! │         ▼                                                    │
//! │  ┌──────────────┐                                            │
//! │  │ CacheMonitor │   explicit registry, no global state      │
//! │  └──────────────┘                                            │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use featcache_foundation::cache::{BoundedCache, CacheMonitor, Memo};
//!
//! let memo = Memo::new();
//! assert_eq!(memo.get_or_compute(|| 2 + 2), 4);
//!
//! let monitor = CacheMonitor::new();
//! let cache = BoundedCache::with_monitor("objects", 2, &monitor);
//! assert_eq!(cache.get(7, |id| id * 10), 70);
//! assert!(cache.has(&7));
//! assert_eq!(monitor.report().len(), 1);
//! ```

mod bounded;
mod memo;
mod monitor;
pub mod util;

pub use bounded::{BoundedCache, BoundedCacheStats};
pub use memo::Memo;
pub use monitor::{CacheCounters, CacheMonitor, CacheReport, MonitorRegistration};
pub use util::{compute_hash, LruCache};

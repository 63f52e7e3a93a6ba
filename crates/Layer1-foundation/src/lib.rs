//! # featcache-foundation
//!
//! Foundation layer for featcache:
//! - Error: error taxonomy shared by every layer
//! - Config: FeatureCacheConfig (TOML / JSON)
//! - Cache: Memo cells, LRU core, bounded caches, cache monitor registry
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  featcache-core (session caches, resolvers, features)   │
//! │                     │                                   │
//! │                     ▼                                   │
//! │  featcache-foundation                                   │
//! │  ├── Memo<T>          (calculation result cells)        │
//! │  ├── BoundedCache     (calculation maps, images, ...)   │
//! │  ├── CacheMonitor     (diagnostics)                     │
//! │  └── Error / Config                                     │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod cache;
pub mod config;
pub mod error;

// ============================================================================
// Error
// ============================================================================
pub use error::{Error, Result};

// ============================================================================
// Config
// ============================================================================
pub use config::{FeatureCacheConfig, StaleInputPolicy, FEATURE_CACHE_CONFIG_FILE};

// ============================================================================
// Cache
// ============================================================================
pub use cache::{
    // Utilities
    compute_hash,
    // Bounded
    BoundedCache,
    BoundedCacheStats,
    // Monitor
    CacheCounters,
    CacheMonitor,
    CacheReport,
    LruCache,
    // Memo
    Memo,
    MonitorRegistration,
};

//! Config - cache configuration
//!
//! - `feature_cache.rs` - FeatureCacheConfig (capacities, stale-input policy)

mod feature_cache;

pub use feature_cache::{FeatureCacheConfig, StaleInputPolicy, FEATURE_CACHE_CONFIG_FILE};

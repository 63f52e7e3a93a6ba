//! featcache-core: Feature calculation caching
//!
//! Layer2 - calculation deduplication and session scopes
//!
//! # Main modules
//!
//! - `feature`: features, their inputs and initialization parameters
//! - `calculation`: cacheable calculations and the per-scope resolver
//! - `session`: session caches, child caches, calculators
//!
//! # Example
//!
//! ```
//! use featcache_core::{
//!     Calculation, Feature, FeatureInitParams, FeatureInput, SessionCache, SessionInput,
//! };
//! use featcache_foundation::Result;
//! use std::sync::Arc;
//!
//! #[derive(PartialEq)]
//! struct Pixels(Vec<f64>);
//! impl FeatureInput for Pixels {}
//!
//! #[derive(PartialEq, Eq, Hash)]
//! struct Total;
//! impl Calculation<Pixels> for Total {
//!     type Output = f64;
//!     fn execute(&self, input: &Arc<Pixels>) -> Result<f64> {
//!         Ok(input.0.iter().sum())
//!     }
//! }
//!
//! struct Mean;
//! impl Feature<Pixels> for Mean {
//!     fn name(&self) -> &str {
//!         "mean"
//!     }
//!     fn calculate(&self, session: &SessionInput<Pixels>) -> Result<f64> {
//!         Ok(session.calculate(Total)? / session.input().0.len() as f64)
//!     }
//! }
//!
//! let cache = Arc::new(SessionCache::<Pixels>::builder("pixels").feature(Arc::new(Mean)).build());
//! cache.init(FeatureInitParams::new())?;
//!
//! let values = cache.calculator().calculate_all(Arc::new(Pixels(vec![1.0, 3.0])))?;
//! assert_eq!(values, vec![2.0]);
//! # Ok::<(), featcache_foundation::Error>(())
//! ```

pub mod calculation;
pub mod feature;
pub mod session;

// Re-exports: Feature
pub use feature::{
    Feature, FeatureInitParams, FeatureInput, FeatureList, FeatureRef, SharedFeatures,
    SharedObjects,
};

// Re-exports: Calculation
pub use calculation::{
    CacheableCalculation, CacheableCalculationMap, Calculation, CalculationResolver,
    KeyedCalculation, ResolvedCalculation, ResolvedCalculationMap, ResolverStats,
};

// Re-exports: Session
pub use session::{
    ChildCacheName, FeatureCalculator, ResolvedFeatureId, SessionCache, SessionCacheBuilder,
    SessionInput, SuppressErrors, SuppressedFailure, SuppressedResults, SHARED_FEATURES_CACHE,
};

// Re-exports: Foundation
pub use featcache_foundation::{
    CacheMonitor, CacheReport, Error, FeatureCacheConfig, Result, StaleInputPolicy,
};

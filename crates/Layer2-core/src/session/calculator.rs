//! Feature calculator bound to one session cache

use featcache_foundation::Result;
use std::sync::Arc;
use tracing::debug;

use super::cache::SessionCache;
use super::input::SessionInput;
use crate::feature::{Feature, FeatureInput, FeatureRef};

/// Evaluates features against inputs, all within one session cache
pub struct FeatureCalculator<I: FeatureInput> {
    cache: Arc<SessionCache<I>>,
}

impl<I: FeatureInput> FeatureCalculator<I> {
    pub fn new(cache: Arc<SessionCache<I>>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &Arc<SessionCache<I>> {
        &self.cache
    }

    /// Evaluate a single feature
    pub fn calculate(&self, feature: &dyn Feature<I>, input: Arc<I>) -> Result<f64> {
        SessionInput::for_cache(Arc::clone(&self.cache), input)?.calc(feature)
    }

    /// Evaluate `features` in order against one input.
    ///
    /// All of them share one session, so calculations they have in common
    /// run once. The first failure aborts the batch.
    pub fn calculate_list(&self, features: &[FeatureRef<I>], input: Arc<I>) -> Result<Vec<f64>> {
        let session = SessionInput::for_cache(Arc::clone(&self.cache), input)?;
        let values = session.calc_list(features)?;
        debug!(
            "Calculated {} features in {} ({} registrations)",
            values.len(),
            self.cache.name(),
            self.cache.resolver().len()
        );
        Ok(values)
    }

    /// Evaluate every feature registered with the cache
    pub fn calculate_all(&self, input: Arc<I>) -> Result<Vec<f64>> {
        self.calculate_list(self.cache.features(), input)
    }
}

impl<I: FeatureInput> Clone for FeatureCalculator<I> {
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
        }
    }
}

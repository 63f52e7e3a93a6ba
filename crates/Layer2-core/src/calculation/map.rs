//! Keyed calculation maps
//!
//! One logical calculation that serves a family of results, one per key
//! (e.g. per object id). Results live in a bounded LRU cache, so a map over
//! many keys holds at most `calculationMapCapacity` of them at once.

use featcache_foundation::{BoundedCache, CacheMonitor, Error, Result, StaleInputPolicy};
use parking_lot::Mutex;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::feature::FeatureInput;

const DEFAULT_MAP_CAPACITY: usize = 100;

/// Configuration of a keyed calculation.
///
/// As with [`super::Calculation`], `Eq + Hash` must cover every field that
/// influences a result.
pub trait KeyedCalculation<I: FeatureInput>: Eq + Hash + Send + Sync + 'static {
    type Key: Eq + Hash + Clone + Send + Sync + 'static;
    type Output: Clone + Send + Sync + 'static;

    /// Compute the result for one key.
    ///
    /// Runs while the map's result cache is locked: it must not request
    /// another key from the same map.
    fn execute(&self, key: &Self::Key, input: &Arc<I>) -> Result<Self::Output>;
}

/// A keyed calculation together with its cached per-key results
pub struct CacheableCalculationMap<M, I>
where
    M: KeyedCalculation<I>,
    I: FeatureInput,
{
    config: M,
    results: BoundedCache<M::Key, M::Output>,
    input: Mutex<Option<Arc<I>>>,
    stale_input: StaleInputPolicy,
}

impl<M, I> CacheableCalculationMap<M, I>
where
    M: KeyedCalculation<I>,
    I: FeatureInput,
{
    pub fn new(config: M) -> Self {
        Self::with_capacity(config, DEFAULT_MAP_CAPACITY)
    }

    pub fn with_capacity(config: M, capacity: usize) -> Self {
        Self {
            config,
            results: BoundedCache::new(std::any::type_name::<M>(), capacity),
            input: Mutex::new(None),
            stale_input: StaleInputPolicy::default(),
        }
    }

    /// Rebuild the result cache so that it reports to `monitor`.
    ///
    /// Any results computed so far are dropped.
    pub fn with_monitor(mut self, monitor: &CacheMonitor) -> Self {
        let capacity = self.results.capacity();
        self.results = BoundedCache::with_monitor(std::any::type_name::<M>(), capacity, monitor);
        self
    }

    pub fn with_stale_input(mut self, policy: StaleInputPolicy) -> Self {
        self.stale_input = policy;
        self
    }

    pub fn config(&self) -> &M {
        &self.config
    }

    pub fn capacity(&self) -> usize {
        self.results.capacity()
    }

    /// Whether a result for `key` is cached
    pub fn has(&self, key: &M::Key) -> bool {
        self.results.has(key)
    }

    /// Number of cached results
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Return the cached result for `key`, executing on a miss.
    ///
    /// The stale-input rule of [`super::CacheableCalculation`] applies to the
    /// map as a whole: every key is computed against the same input.
    pub fn get_or_calculate(&self, input: &Arc<I>, key: &M::Key) -> Result<M::Output> {
        let mut retained = self.input.lock();

        if self.stale_input == StaleInputPolicy::Reject {
            if let Some(previous) = retained.as_ref() {
                if !Arc::ptr_eq(previous, input) && **previous != **input {
                    return Err(Error::StaleInput(format!(
                        "{} already holds results for a different input",
                        std::any::type_name::<M>()
                    )));
                }
            }
        }

        let output = self
            .results
            .try_get(key.clone(), |k| self.config.execute(k, input))?;

        if retained.is_none() {
            *retained = Some(Arc::clone(input));
        }
        Ok(output)
    }

    /// Drop every cached result and release the retained input
    pub fn invalidate(&self) {
        let mut retained = self.input.lock();
        retained.take();
        self.results.clear();
    }
}

impl<M, I> PartialEq for CacheableCalculationMap<M, I>
where
    M: KeyedCalculation<I>,
    I: FeatureInput,
{
    fn eq(&self, other: &Self) -> bool {
        self.config == other.config
    }
}

impl<M, I> Eq for CacheableCalculationMap<M, I>
where
    M: KeyedCalculation<I>,
    I: FeatureInput,
{
}

impl<M, I> Hash for CacheableCalculationMap<M, I>
where
    M: KeyedCalculation<I>,
    I: FeatureInput,
{
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.config.hash(state);
    }
}

impl<M, I> fmt::Debug for CacheableCalculationMap<M, I>
where
    M: KeyedCalculation<I> + fmt::Debug,
    I: FeatureInput,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheableCalculationMap")
            .field("config", &self.config)
            .field("cached", &self.results.len())
            .field("capacity", &self.results.capacity())
            .finish()
    }
}

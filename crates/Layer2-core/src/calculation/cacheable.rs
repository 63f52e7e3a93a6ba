//! Memoized calculation with structural identity
//!
//! A calculation is split in two: the configuration `C`, an immutable value
//! whose `Eq + Hash` decide whether two calculations are the same, and the
//! mutable state (result cell and retained input) that never takes part in
//! that comparison.

use featcache_foundation::{Error, Memo, Result, StaleInputPolicy};
use parking_lot::Mutex;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::feature::FeatureInput;

/// Configuration of a cacheable calculation.
///
/// Every field that influences the result must take part in `Eq` and `Hash`.
pub trait Calculation<I: FeatureInput>: Eq + Hash + Send + Sync + 'static {
    type Output: Clone + Send + Sync + 'static;

    /// Compute the result for `input`
    fn execute(&self, input: &Arc<I>) -> Result<Self::Output>;
}

/// A calculation together with its cached result
pub struct CacheableCalculation<C, I>
where
    C: Calculation<I>,
    I: FeatureInput,
{
    config: C,
    result: Memo<C::Output>,
    input: Mutex<Option<Arc<I>>>,
    stale_input: StaleInputPolicy,
}

impl<C, I> CacheableCalculation<C, I>
where
    C: Calculation<I>,
    I: FeatureInput,
{
    pub fn new(config: C) -> Self {
        Self {
            config,
            result: Memo::new(),
            input: Mutex::new(None),
            stale_input: StaleInputPolicy::default(),
        }
    }

    pub fn with_stale_input(mut self, policy: StaleInputPolicy) -> Self {
        self.stale_input = policy;
        self
    }

    pub fn config(&self) -> &C {
        &self.config
    }

    pub fn is_evaluated(&self) -> bool {
        self.result.is_evaluated()
    }

    /// Whether an input is still held from the last evaluation
    pub fn retains_input(&self) -> bool {
        self.input.lock().is_some()
    }

    /// Take over the result and retained input of an equal calculation.
    ///
    /// The retained input travels with the result so the stale-input check
    /// keeps applying to the transplanted value.
    pub(crate) fn transplant_from(&self, other: &Self) {
        if std::ptr::eq(self, other) {
            return;
        }
        let mut retained = self.input.lock();
        let source_input = other.input.lock().clone();
        self.result.transplant_from(&other.result);
        *retained = source_input;
    }

    /// Return the cached result, executing the calculation on first use.
    ///
    /// Once evaluated, a call with an input that is neither the retained one
    /// nor equal to it fails with `Error::StaleInput` under
    /// `StaleInputPolicy::Reject`, and is served from the cache under
    /// `StaleInputPolicy::Ignore`.
    pub fn get_or_calculate(&self, input: &Arc<I>) -> Result<C::Output> {
        let mut retained = self.input.lock();

        if self.stale_input == StaleInputPolicy::Reject && self.result.is_evaluated() {
            if let Some(previous) = retained.as_ref() {
                if !Arc::ptr_eq(previous, input) && **previous != **input {
                    return Err(Error::StaleInput(format!(
                        "{} was already evaluated with a different input",
                        std::any::type_name::<C>()
                    )));
                }
            }
        }

        let output = self
            .result
            .get_or_try_compute(|| self.config.execute(input))?;

        if retained.is_none() {
            *retained = Some(Arc::clone(input));
        }
        Ok(output)
    }

    /// Clear the cached result and release the retained input
    pub fn invalidate(&self) {
        let mut retained = self.input.lock();
        retained.take();
        self.result.reset();
    }
}

impl<C, I> PartialEq for CacheableCalculation<C, I>
where
    C: Calculation<I>,
    I: FeatureInput,
{
    fn eq(&self, other: &Self) -> bool {
        self.config == other.config
    }
}

impl<C, I> Eq for CacheableCalculation<C, I>
where
    C: Calculation<I>,
    I: FeatureInput,
{
}

impl<C, I> Hash for CacheableCalculation<C, I>
where
    C: Calculation<I>,
    I: FeatureInput,
{
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.config.hash(state);
    }
}

impl<C, I> fmt::Debug for CacheableCalculation<C, I>
where
    C: Calculation<I> + fmt::Debug,
    I: FeatureInput,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheableCalculation")
            .field("config", &self.config)
            .field("evaluated", &self.is_evaluated())
            .finish()
    }
}

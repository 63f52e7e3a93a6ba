//! Error-suppressing calculator
//!
//! Batch evaluation in the core aborts on the first failing feature. Callers
//! that prefer a complete row wrap the calculator in `SuppressErrors`, which
//! records `f64::NAN` for each failing feature and keeps going. Wiring
//! mistakes (missing caches, uninitialized sessions) still abort.

use featcache_foundation::{Error, Result};
use std::sync::Arc;
use tracing::warn;

use super::calculator::FeatureCalculator;
use super::input::SessionInput;
use crate::feature::{FeatureInput, FeatureRef};

/// One feature that failed and was replaced by NaN
#[derive(Debug)]
pub struct SuppressedFailure {
    pub index: usize,
    pub feature: String,
    pub error: Error,
}

/// Values of a batch with failing features substituted
#[derive(Debug, Default)]
pub struct SuppressedResults {
    pub values: Vec<f64>,
    pub failures: Vec<SuppressedFailure>,
}

impl SuppressedResults {
    /// No feature failed
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct SuppressErrors<I: FeatureInput> {
    calculator: FeatureCalculator<I>,
}

impl<I: FeatureInput> SuppressErrors<I> {
    pub fn new(calculator: FeatureCalculator<I>) -> Self {
        Self { calculator }
    }

    pub fn calculator(&self) -> &FeatureCalculator<I> {
        &self.calculator
    }

    pub fn calculate_list(
        &self,
        features: &[FeatureRef<I>],
        input: Arc<I>,
    ) -> Result<SuppressedResults> {
        let session = SessionInput::for_cache(Arc::clone(self.calculator.cache()), input)?;
        let mut results = SuppressedResults::default();

        for (index, feature) in features.iter().enumerate() {
            match session.calc(feature.as_ref()) {
                Ok(value) => results.values.push(value),
                Err(e) if e.is_configuration() => return Err(Error::named(feature.name(), e)),
                Err(e) => {
                    warn!("Feature {} failed, substituting NaN: {}", feature.name(), e);
                    results.values.push(f64::NAN);
                    results.failures.push(SuppressedFailure {
                        index,
                        feature: feature.name().to_string(),
                        error: e,
                    });
                }
            }
        }

        Ok(results)
    }

    pub fn calculate_all(&self, input: Arc<I>) -> Result<SuppressedResults> {
        self.calculate_list(self.calculator.cache().features(), input)
    }
}

//! Feature - the computations the session caches serve
//!
//! - `FeatureInput`: marker for calculation parameters (one image, one object, ...)
//! - `Feature`: a named computation producing one `f64`
//! - `FeatureInitParams`: key/value settings plus shared objects, given once per session
//! - `SharedFeatures`: features other features may refer to by id

mod params;

pub use params::{FeatureInitParams, SharedObjects};

use featcache_foundation::Result;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::session::SessionInput;

/// Marker for types a feature is calculated over.
///
/// Equality is used to detect a calculation being asked about a different
/// input than the one it was evaluated with.
pub trait FeatureInput: PartialEq + Send + Sync + 'static {}

/// A named computation over an input producing a numeric result
pub trait Feature<I: FeatureInput>: Send + Sync {
    /// Display name, attached to errors raised while calculating
    fn name(&self) -> &str;

    /// Called when the owning session cache is initialized.
    ///
    /// If another feature's `init` fails, the cache stays uninitialized and a
    /// retry calls this again, so it must be safe to repeat.
    fn init(&self, _params: &FeatureInitParams) -> Result<()> {
        Ok(())
    }

    /// Calculate against the input bound to `session`
    fn calculate(&self, session: &SessionInput<I>) -> Result<f64>;
}

/// Shared handle to a feature
pub type FeatureRef<I> = Arc<dyn Feature<I>>;

/// Ordered list of features evaluated together
pub type FeatureList<I> = Vec<FeatureRef<I>>;

/// Features addressable by id from other features
pub struct SharedFeatures<I: FeatureInput> {
    features: BTreeMap<String, FeatureRef<I>>,
}

impl<I: FeatureInput> SharedFeatures<I> {
    pub fn new() -> Self {
        Self {
            features: BTreeMap::new(),
        }
    }

    /// Register a feature under `id`, replacing any earlier one
    pub fn insert(&mut self, id: impl Into<String>, feature: FeatureRef<I>) -> Option<FeatureRef<I>> {
        self.features.insert(id.into(), feature)
    }

    pub fn with(mut self, id: impl Into<String>, feature: FeatureRef<I>) -> Self {
        self.insert(id, feature);
        self
    }

    pub fn get(&self, id: &str) -> Option<&FeatureRef<I>> {
        self.features.get(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.features.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FeatureRef<I>)> {
        self.features.iter().map(|(id, f)| (id.as_str(), f))
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

impl<I: FeatureInput> Default for SharedFeatures<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: FeatureInput> Clone for SharedFeatures<I> {
    fn clone(&self) -> Self {
        Self {
            features: self.features.clone(),
        }
    }
}

impl<I: FeatureInput> fmt::Debug for SharedFeatures<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.features.keys()).finish()
    }
}

//! Session Input - an input bound to the cache it is evaluated in
//!
//! Features never see a raw input. They receive a `SessionInput`, which
//! carries the input together with its session cache, so every calculation a
//! feature asks for is deduplicated in the right scope and nested inputs are
//! routed to child caches.

use featcache_foundation::{Error, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

use super::cache::{SessionCache, SHARED_FEATURES_CACHE};
use super::name::ChildCacheName;
use crate::calculation::{
    CacheableCalculation, Calculation, CalculationResolver, KeyedCalculation, ResolvedCalculation,
    ResolvedCalculationMap,
};
use crate::feature::{Feature, FeatureInitParams, FeatureInput, FeatureRef};

/// A shared feature looked up by id
pub struct ResolvedFeatureId<I: FeatureInput> {
    id: String,
    feature: FeatureRef<I>,
}

impl<I: FeatureInput> ResolvedFeatureId<I> {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn feature(&self) -> &FeatureRef<I> {
        &self.feature
    }

    /// Whether both ids resolved to the same feature instance
    pub fn same_feature(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.feature, &other.feature)
    }
}

impl<I: FeatureInput> Clone for ResolvedFeatureId<I> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            feature: Arc::clone(&self.feature),
        }
    }
}

impl<I: FeatureInput> fmt::Debug for ResolvedFeatureId<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedFeatureId")
            .field("id", &self.id)
            .field("feature", &self.feature.name())
            .finish()
    }
}

/// An input paired with the session cache calculations on it run in
pub struct SessionInput<I: FeatureInput> {
    input: Arc<I>,
    cache: Arc<SessionCache<I>>,
    additional: HashMap<String, Arc<SessionCache<I>>>,
    resolved_ids: Mutex<HashMap<String, ResolvedFeatureId<I>>>,
}

impl<I: FeatureInput> SessionInput<I> {
    /// Bind `input` to `cache`, exposing only the named additional caches.
    ///
    /// Fails with `Error::MissingAdditionalCache` if `cache` does not declare
    /// one of them, and with `Error::Initialization` before `init`.
    pub fn new(cache: Arc<SessionCache<I>>, input: Arc<I>, additional: &[&str]) -> Result<Self> {
        cache.params()?;

        let additional = additional
            .iter()
            .map(|name| {
                cache
                    .additional_cache(name)
                    .map(|found| (name.to_string(), Arc::clone(found)))
            })
            .collect::<Result<HashMap<_, _>>>()?;

        Ok(Self {
            input,
            cache,
            additional,
            resolved_ids: Mutex::new(HashMap::new()),
        })
    }

    /// Bind `input` to `cache` with every additional cache it declares
    pub fn for_cache(cache: Arc<SessionCache<I>>, input: Arc<I>) -> Result<Self> {
        let names: Vec<String> = cache.additional_names().map(str::to_string).collect();
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        Self::new(cache, input, &names)
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn input(&self) -> &I {
        &self.input
    }

    /// Shared handle to the input, as calculations take it
    pub fn get(&self) -> &Arc<I> {
        &self.input
    }

    pub fn cache(&self) -> &Arc<SessionCache<I>> {
        &self.cache
    }

    pub fn resolver(&self) -> &CalculationResolver<I> {
        self.cache.resolver()
    }

    pub fn params(&self) -> Result<&Arc<FeatureInitParams>> {
        self.cache.params()
    }

    /// Additional cache named when this session was created
    pub fn additional(&self, name: &str) -> Result<&Arc<SessionCache<I>>> {
        self.additional
            .get(name)
            .ok_or_else(|| Error::MissingAdditionalCache(name.to_string()))
    }

    // ========================================================================
    // Calculations
    // ========================================================================

    /// Canonical registration of `calc` in this session's scope
    pub fn search<C>(&self, calc: CacheableCalculation<C, I>) -> ResolvedCalculation<C, I>
    where
        C: Calculation<I>,
    {
        self.cache.resolver().search(calc)
    }

    /// Resolve `config` in this session's scope and evaluate it on the input
    pub fn calculate<C>(&self, config: C) -> Result<C::Output>
    where
        C: Calculation<I>,
    {
        self.cache.resolver().resolve(config).get_or_calculate(&self.input)
    }

    pub fn search_map<M>(&self, config: M) -> ResolvedCalculationMap<M, I>
    where
        M: KeyedCalculation<I>,
    {
        self.cache.resolver().search_map(config)
    }

    // ========================================================================
    // Features
    // ========================================================================

    /// Evaluate `feature` on this session's input
    pub fn calc(&self, feature: &dyn Feature<I>) -> Result<f64> {
        trace!("Calculating {} in {}", feature.name(), self.cache.name());
        feature.calculate(self)
    }

    /// Evaluate `features` in order.
    ///
    /// Stops at the first failure, which is returned with the failing
    /// feature's name attached; values computed before it are discarded.
    pub fn calc_list(&self, features: &[FeatureRef<I>]) -> Result<Vec<f64>> {
        features
            .iter()
            .map(|feature| {
                self.calc(feature.as_ref())
                    .map_err(|e| Error::named(feature.name(), e))
            })
            .collect()
    }

    /// Evaluate `feature` on another input of the same type.
    ///
    /// The other input gets its own child scope called `name`, so its
    /// calculations never collide with the ones held for this input.
    pub fn calc_for(
        &self,
        feature: &dyn Feature<I>,
        input: Arc<I>,
        name: &ChildCacheName,
    ) -> Result<f64> {
        self.calc_child(feature, input, name)
    }

    /// Evaluate `feature` on `input` in the child cache called `name`
    pub fn calc_child<J: FeatureInput>(
        &self,
        feature: &dyn Feature<J>,
        input: Arc<J>,
        name: &ChildCacheName,
    ) -> Result<f64> {
        let child = self.cache.child_cache_for::<J>(name)?;
        SessionInput::for_cache(child, input)?.calc(feature)
    }

    /// Derive the child input with `calc`, then evaluate `feature` on it in
    /// the child cache called `name`
    pub fn calc_child_from<C, J>(
        &self,
        feature: &dyn Feature<J>,
        calc: &ResolvedCalculation<C, I>,
        name: &ChildCacheName,
    ) -> Result<f64>
    where
        C: Calculation<I, Output = Arc<J>>,
        J: FeatureInput,
    {
        let derived = calc.get_or_calculate(&self.input)?;
        self.calc_child(feature, derived, name)
    }

    // ========================================================================
    // Shared features
    // ========================================================================

    /// Look up a shared feature by id.
    ///
    /// Resolution is memoized per session, so asking twice for the same id
    /// yields the same feature.
    pub fn resolve_feature_id(&self, id: &str) -> Result<ResolvedFeatureId<I>> {
        let mut resolved = self.resolved_ids.lock();
        if let Some(found) = resolved.get(id) {
            return Ok(found.clone());
        }

        let feature = self
            .cache
            .shared_features()
            .get(id)
            .cloned()
            .ok_or_else(|| Error::FeatureNotFound(id.to_string()))?;
        let entry = ResolvedFeatureId {
            id: id.to_string(),
            feature,
        };
        resolved.insert(id.to_string(), entry.clone());
        Ok(entry)
    }

    /// Evaluate a shared feature on `input` in the shared-features cache
    pub fn calc_feature_by_id(&self, resolved: &ResolvedFeatureId<I>, input: Arc<I>) -> Result<f64> {
        let scope = if self.cache.is_shared_scope() {
            Arc::clone(&self.cache)
        } else {
            Arc::clone(self.additional(SHARED_FEATURES_CACHE)?)
        };

        SessionInput::for_cache(scope, input)?
            .calc(resolved.feature.as_ref())
            .map_err(|e| Error::named(resolved.id.clone(), e))
    }
}

impl<I: FeatureInput> fmt::Debug for SessionInput<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionInput")
            .field("cache", &self.cache.name())
            .field("additional", &self.additional.keys().collect::<Vec<_>>())
            .finish()
    }
}

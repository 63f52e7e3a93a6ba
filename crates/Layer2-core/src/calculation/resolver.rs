//! Calculation Resolver - deduplicates calculations within one scope
//!
//! Registrations are grouped per configuration type and indexed by the
//! configuration's structural hash. The first calculation registered for a
//! configuration stays canonical; every later equal one is redirected to it.

use featcache_foundation::{compute_hash, CacheMonitor, FeatureCacheConfig, Result};
use parking_lot::Mutex;
use std::any::{Any, TypeId};
use std::borrow::Borrow;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

use super::cacheable::{CacheableCalculation, Calculation};
use super::map::{CacheableCalculationMap, KeyedCalculation};
use crate::feature::FeatureInput;

// ============================================================================
// Resolved handles
// ============================================================================

/// Canonical handle to a calculation registered in a scope
pub struct ResolvedCalculation<C, I>
where
    C: Calculation<I>,
    I: FeatureInput,
{
    calculation: Arc<CacheableCalculation<C, I>>,
}

impl<C, I> ResolvedCalculation<C, I>
where
    C: Calculation<I>,
    I: FeatureInput,
{
    fn new(calculation: Arc<CacheableCalculation<C, I>>) -> Self {
        Self { calculation }
    }

    pub fn get_or_calculate(&self, input: &Arc<I>) -> Result<C::Output> {
        self.calculation.get_or_calculate(input)
    }

    pub fn config(&self) -> &C {
        self.calculation.config()
    }

    pub fn is_evaluated(&self) -> bool {
        self.calculation.is_evaluated()
    }

    /// Whether both handles point at the same registered calculation
    pub fn same_registration(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.calculation, &other.calculation)
    }
}

impl<C, I> Clone for ResolvedCalculation<C, I>
where
    C: Calculation<I>,
    I: FeatureInput,
{
    fn clone(&self) -> Self {
        Self {
            calculation: Arc::clone(&self.calculation),
        }
    }
}

impl<C, I> PartialEq for ResolvedCalculation<C, I>
where
    C: Calculation<I>,
    I: FeatureInput,
{
    fn eq(&self, other: &Self) -> bool {
        self.calculation == other.calculation
    }
}

impl<C, I> Eq for ResolvedCalculation<C, I>
where
    C: Calculation<I>,
    I: FeatureInput,
{
}

impl<C, I> Hash for ResolvedCalculation<C, I>
where
    C: Calculation<I>,
    I: FeatureInput,
{
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.calculation.hash(state);
    }
}

impl<C, I> fmt::Debug for ResolvedCalculation<C, I>
where
    C: Calculation<I> + fmt::Debug,
    I: FeatureInput,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ResolvedCalculation")
            .field(&self.calculation)
            .finish()
    }
}

/// Canonical handle to a keyed calculation map registered in a scope
pub struct ResolvedCalculationMap<M, I>
where
    M: KeyedCalculation<I>,
    I: FeatureInput,
{
    map: Arc<CacheableCalculationMap<M, I>>,
}

impl<M, I> ResolvedCalculationMap<M, I>
where
    M: KeyedCalculation<I>,
    I: FeatureInput,
{
    pub fn get_or_calculate(&self, input: &Arc<I>, key: &M::Key) -> Result<M::Output> {
        self.map.get_or_calculate(input, key)
    }

    pub fn config(&self) -> &M {
        self.map.config()
    }

    pub fn has(&self, key: &M::Key) -> bool {
        self.map.has(key)
    }

    pub fn same_registration(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.map, &other.map)
    }
}

impl<M, I> Clone for ResolvedCalculationMap<M, I>
where
    M: KeyedCalculation<I>,
    I: FeatureInput,
{
    fn clone(&self) -> Self {
        Self {
            map: Arc::clone(&self.map),
        }
    }
}

impl<M, I> PartialEq for ResolvedCalculationMap<M, I>
where
    M: KeyedCalculation<I>,
    I: FeatureInput,
{
    fn eq(&self, other: &Self) -> bool {
        self.map == other.map
    }
}

impl<M, I> Eq for ResolvedCalculationMap<M, I>
where
    M: KeyedCalculation<I>,
    I: FeatureInput,
{
}

impl<M, I> Hash for ResolvedCalculationMap<M, I>
where
    M: KeyedCalculation<I>,
    I: FeatureInput,
{
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.map.hash(state);
    }
}

impl<M, I> fmt::Debug for ResolvedCalculationMap<M, I>
where
    M: KeyedCalculation<I> + fmt::Debug,
    I: FeatureInput,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ResolvedCalculationMap").field(&self.map).finish()
    }
}

// ============================================================================
// Registration sets
// ============================================================================

/// Type-erased view of the registrations for one configuration type
trait RegistrationSet: Send + Sync {
    fn invalidate_all(&self);
    fn len(&self) -> usize;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Hash-set entry that compares and hashes by configuration only, so the
/// set can be probed with a bare `&C`.
struct Registered<T>(Arc<T>);

macro_rules! registered_by_config {
    ($holder:ident, $bound:ident) => {
        impl<C, I> PartialEq for Registered<$holder<C, I>>
        where
            C: $bound<I>,
            I: FeatureInput,
        {
            fn eq(&self, other: &Self) -> bool {
                self.0.config() == other.0.config()
            }
        }

        impl<C, I> Eq for Registered<$holder<C, I>>
        where
            C: $bound<I>,
            I: FeatureInput,
        {
        }

        impl<C, I> Hash for Registered<$holder<C, I>>
        where
            C: $bound<I>,
            I: FeatureInput,
        {
            fn hash<H: Hasher>(&self, state: &mut H) {
                self.0.config().hash(state);
            }
        }

        impl<C, I> Borrow<C> for Registered<$holder<C, I>>
        where
            C: $bound<I>,
            I: FeatureInput,
        {
            fn borrow(&self) -> &C {
                self.0.config()
            }
        }
    };
}

registered_by_config!(CacheableCalculation, Calculation);
registered_by_config!(CacheableCalculationMap, KeyedCalculation);

struct CalculationSet<C, I>
where
    C: Calculation<I>,
    I: FeatureInput,
{
    entries: HashSet<Registered<CacheableCalculation<C, I>>>,
}

impl<C, I> RegistrationSet for CalculationSet<C, I>
where
    C: Calculation<I>,
    I: FeatureInput,
{
    fn invalidate_all(&self) {
        for entry in &self.entries {
            entry.0.invalidate();
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

struct CalculationMapSet<M, I>
where
    M: KeyedCalculation<I>,
    I: FeatureInput,
{
    entries: HashSet<Registered<CacheableCalculationMap<M, I>>>,
}

impl<M, I> RegistrationSet for CalculationMapSet<M, I>
where
    M: KeyedCalculation<I>,
    I: FeatureInput,
{
    fn invalidate_all(&self) {
        for entry in &self.entries {
            entry.0.invalidate();
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[derive(Default)]
struct Registry {
    calculations: HashMap<TypeId, Box<dyn RegistrationSet>>,
    maps: HashMap<TypeId, Box<dyn RegistrationSet>>,
}

impl Registry {
    fn len(&self) -> usize {
        self.calculations
            .values()
            .chain(self.maps.values())
            .map(|set| set.len())
            .sum()
    }
}

// ============================================================================
// Resolver
// ============================================================================

/// Search statistics for one resolver
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolverStats {
    /// Calculations that became canonical
    pub registered: u64,
    /// Searches answered with an existing registration
    pub redirected: u64,
    /// Registrations currently held
    pub live: usize,
}

/// Deduplicates calculations registered within one cache scope
pub struct CalculationResolver<I: FeatureInput> {
    scope: String,
    config: FeatureCacheConfig,
    monitor: Option<CacheMonitor>,
    registry: Mutex<Registry>,
    registered: AtomicU64,
    redirected: AtomicU64,
    _input: PhantomData<fn() -> I>,
}

impl<I: FeatureInput> CalculationResolver<I> {
    pub fn new(scope: impl Into<String>, config: FeatureCacheConfig) -> Self {
        Self {
            scope: scope.into(),
            config,
            monitor: None,
            registry: Mutex::new(Registry::default()),
            registered: AtomicU64::new(0),
            redirected: AtomicU64::new(0),
            _input: PhantomData,
        }
    }

    /// Report calculation-map result caches to `monitor`
    pub fn with_monitor(mut self, monitor: CacheMonitor) -> Self {
        self.monitor = Some(monitor);
        self
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Return the canonical registration equal to `calc`, registering `calc`
    /// itself if none exists yet.
    ///
    /// When `calc` arrives already evaluated while the canonical
    /// registration is not, its result is transplanted onto the canonical
    /// one rather than discarded.
    pub fn search<C>(&self, calc: CacheableCalculation<C, I>) -> ResolvedCalculation<C, I>
    where
        C: Calculation<I>,
    {
        let mut registry = self.registry.lock();
        let set = registry
            .calculations
            .entry(TypeId::of::<C>())
            .or_insert_with(|| {
                Box::new(CalculationSet::<C, I> {
                    entries: HashSet::new(),
                })
            })
            .as_any_mut()
            // Sets are only ever inserted under their own config's TypeId
            .downcast_mut::<CalculationSet<C, I>>()
            .expect("calculation set is keyed by its configuration type");

        if let Some(existing) = set.entries.get(calc.config()) {
            if calc.is_evaluated() && !existing.0.is_evaluated() {
                existing.0.transplant_from(&calc);
            }
            self.redirected.fetch_add(1, Ordering::Relaxed);
            trace!(
                "Resolved {} in scope {} to existing registration",
                std::any::type_name::<C>(),
                self.scope
            );
            return ResolvedCalculation::new(Arc::clone(&existing.0));
        }

        let calculation = Arc::new(calc.with_stale_input(self.config.stale_input));
        set.entries.insert(Registered(Arc::clone(&calculation)));
        self.registered.fetch_add(1, Ordering::Relaxed);
        debug!(
            "Registered {} (hash {:016x}) in scope {}",
            std::any::type_name::<C>(),
            compute_hash(calculation.config()),
            self.scope
        );
        ResolvedCalculation::new(calculation)
    }

    /// Shortcut for searching a freshly constructed calculation
    pub fn resolve<C>(&self, config: C) -> ResolvedCalculation<C, I>
    where
        C: Calculation<I>,
    {
        self.search(CacheableCalculation::new(config))
    }

    /// Keyed variant of [`CalculationResolver::search`].
    ///
    /// The canonical map is sized with `calculationMapCapacity`; results are
    /// then shared per (configuration, key) pair.
    pub fn search_map<M>(&self, config: M) -> ResolvedCalculationMap<M, I>
    where
        M: KeyedCalculation<I>,
    {
        let mut registry = self.registry.lock();
        let set = registry
            .maps
            .entry(TypeId::of::<M>())
            .or_insert_with(|| {
                Box::new(CalculationMapSet::<M, I> {
                    entries: HashSet::new(),
                })
            })
            .as_any_mut()
            // Same TypeId invariant as in `search`
            .downcast_mut::<CalculationMapSet<M, I>>()
            .expect("calculation map set is keyed by its configuration type");

        if let Some(existing) = set.entries.get(&config) {
            self.redirected.fetch_add(1, Ordering::Relaxed);
            return ResolvedCalculationMap {
                map: Arc::clone(&existing.0),
            };
        }

        let mut map =
            CacheableCalculationMap::with_capacity(config, self.config.calculation_map_capacity)
                .with_stale_input(self.config.stale_input);
        if let Some(monitor) = &self.monitor {
            map = map.with_monitor(monitor);
        }
        let map = Arc::new(map);
        set.entries.insert(Registered(Arc::clone(&map)));
        self.registered.fetch_add(1, Ordering::Relaxed);
        debug!(
            "Registered calculation map {} in scope {}",
            std::any::type_name::<M>(),
            self.scope
        );
        ResolvedCalculationMap { map }
    }

    /// Reset every registered calculation and forget all registrations.
    ///
    /// Handles obtained earlier stay usable but recompute on next use.
    pub fn invalidate(&self) {
        let mut registry = self.registry.lock();
        for set in registry
            .calculations
            .values()
            .chain(registry.maps.values())
        {
            set.invalidate_all();
        }
        registry.calculations.clear();
        registry.maps.clear();
    }

    /// Number of live registrations
    pub fn len(&self) -> usize {
        self.registry.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> ResolverStats {
        ResolverStats {
            registered: self.registered.load(Ordering::Relaxed),
            redirected: self.redirected.load(Ordering::Relaxed),
            live: self.len(),
        }
    }
}

impl<I: FeatureInput> fmt::Debug for CalculationResolver<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CalculationResolver")
            .field("scope", &self.scope)
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use featcache_foundation::StaleInputPolicy;
    use std::sync::atomic::AtomicUsize;

    #[derive(Debug, PartialEq)]
    struct ObjectMask {
        intensities: Vec<f64>,
    }

    impl FeatureInput for ObjectMask {}

    static MEAN_CALLS: AtomicUsize = AtomicUsize::new(0);

    /// Mean intensity of one object; `object_id` is the whole configuration
    #[derive(Debug, PartialEq, Eq, Hash)]
    struct MeanIntensity {
        object_id: u32,
    }

    impl Calculation<ObjectMask> for MeanIntensity {
        type Output = f64;

        fn execute(&self, input: &Arc<ObjectMask>) -> Result<f64> {
            MEAN_CALLS.fetch_add(1, Ordering::SeqCst);
            let sum: f64 = input.intensities.iter().sum();
            Ok(sum / input.intensities.len() as f64)
        }
    }

    #[derive(Debug, PartialEq, Eq, Hash)]
    struct Threshold {
        level: u64,
    }

    impl Calculation<ObjectMask> for Threshold {
        type Output = usize;

        fn execute(&self, input: &Arc<ObjectMask>) -> Result<usize> {
            Ok(input
                .intensities
                .iter()
                .filter(|v| **v >= self.level as f64)
                .count())
        }
    }

    #[derive(Debug, PartialEq, Eq, Hash)]
    struct AboveLevel;

    impl KeyedCalculation<ObjectMask> for AboveLevel {
        type Key = u64;
        type Output = usize;

        fn execute(&self, level: &u64, input: &Arc<ObjectMask>) -> Result<usize> {
            Ok(input
                .intensities
                .iter()
                .filter(|v| **v >= *level as f64)
                .count())
        }
    }

    fn resolver() -> CalculationResolver<ObjectMask> {
        CalculationResolver::new("test", FeatureCacheConfig::default())
    }

    #[test]
    fn test_equal_calculations_share_one_computation() {
        let resolver = resolver();
        let input = Arc::new(ObjectMask {
            intensities: vec![2.0, 4.0],
        });

        let ca1 = CacheableCalculation::new(MeanIntensity { object_id: 5 });
        let ca2 = CacheableCalculation::new(MeanIntensity { object_id: 5 });

        let first = resolver.search(ca1);
        let second = resolver.search(ca2);
        assert!(first.same_registration(&second));
        assert_eq!(first, second);

        let before = MEAN_CALLS.load(Ordering::SeqCst);
        assert_eq!(second.get_or_calculate(&input).unwrap(), 3.0);
        assert_eq!(first.get_or_calculate(&input).unwrap(), 3.0);
        assert_eq!(MEAN_CALLS.load(Ordering::SeqCst) - before, 1);

        let stats = resolver.stats();
        assert_eq!(stats.registered, 1);
        assert_eq!(stats.redirected, 1);
        assert_eq!(stats.live, 1);
    }

    #[test]
    fn test_distinct_configs_register_separately() {
        let resolver = resolver();
        let a = resolver.resolve(Threshold { level: 1 });
        let b = resolver.resolve(Threshold { level: 2 });
        let _mean = resolver.resolve(MeanIntensity { object_id: 1 });

        assert!(!a.same_registration(&b));
        assert_ne!(a, b);
        assert_eq!(resolver.len(), 3);
    }

    #[test]
    fn test_evaluated_duplicate_transplants_result() {
        let resolver = resolver();
        let canonical = resolver.resolve(Threshold { level: 3 });

        let precomputed = CacheableCalculation::new(Threshold { level: 3 });
        precomputed
            .get_or_calculate(&Arc::new(ObjectMask {
                intensities: vec![1.0, 3.0, 5.0],
            }))
            .unwrap();

        let resolved = resolver.search(precomputed);
        assert!(resolved.same_registration(&canonical));
        assert!(canonical.is_evaluated());
    }

    #[test]
    fn test_transplanted_result_still_rejects_other_input() {
        let resolver = resolver();
        let canonical = resolver.resolve(Threshold { level: 2 });

        let precomputed = CacheableCalculation::new(Threshold { level: 2 });
        precomputed
            .get_or_calculate(&Arc::new(ObjectMask {
                intensities: vec![1.0, 3.0],
            }))
            .unwrap();
        resolver.search(precomputed);

        let same = canonical
            .get_or_calculate(&Arc::new(ObjectMask {
                intensities: vec![1.0, 3.0],
            }))
            .unwrap();
        assert_eq!(same, 1);

        let err = canonical
            .get_or_calculate(&Arc::new(ObjectMask {
                intensities: vec![100.0, 200.0],
            }))
            .unwrap_err();
        assert!(matches!(err, featcache_foundation::Error::StaleInput(_)));
    }

    static SHARED_SEARCH_CALLS: AtomicUsize = AtomicUsize::new(0);

    /// Only used by the concurrent search test
    #[derive(Debug, PartialEq, Eq, Hash)]
    struct PeakIntensity;

    impl Calculation<ObjectMask> for PeakIntensity {
        type Output = f64;

        fn execute(&self, input: &Arc<ObjectMask>) -> Result<f64> {
            SHARED_SEARCH_CALLS.fetch_add(1, Ordering::SeqCst);
            Ok(input.intensities.iter().copied().fold(f64::MIN, f64::max))
        }
    }

    #[test]
    fn test_concurrent_searches_share_one_registration() {
        const THREADS: usize = 8;
        let resolver = resolver();
        let input = Arc::new(ObjectMask {
            intensities: vec![0.5, 7.0, 2.0],
        });

        let handles: Vec<ResolvedCalculation<PeakIntensity, ObjectMask>> =
            std::thread::scope(|scope| {
                let workers: Vec<_> = (0..THREADS)
                    .map(|_| {
                        scope.spawn(|| {
                            let handle = resolver.search(CacheableCalculation::new(PeakIntensity));
                            assert_eq!(handle.get_or_calculate(&input).unwrap(), 7.0);
                            handle
                        })
                    })
                    .collect();
                workers
                    .into_iter()
                    .map(|worker| worker.join().unwrap())
                    .collect()
            });

        for handle in &handles[1..] {
            assert!(handle.same_registration(&handles[0]));
        }
        let stats = resolver.stats();
        assert_eq!(stats.registered, 1);
        assert_eq!(stats.redirected, (THREADS - 1) as u64);
        assert_eq!(SHARED_SEARCH_CALLS.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_invalidate_forgets_and_resets() {
        let resolver = resolver();
        let input = Arc::new(ObjectMask {
            intensities: vec![1.0],
        });
        let old = resolver.resolve(Threshold { level: 0 });
        old.get_or_calculate(&input).unwrap();

        resolver.invalidate();
        assert!(resolver.is_empty());
        assert!(!old.is_evaluated());

        let new = resolver.resolve(Threshold { level: 0 });
        assert!(!new.same_registration(&old));
    }

    #[test]
    fn test_maps_share_per_key_results() {
        let config = FeatureCacheConfig::default().calculation_map_capacity(4);
        let resolver = CalculationResolver::new("maps", config);
        let input = Arc::new(ObjectMask {
            intensities: vec![1.0, 2.0, 3.0],
        });

        let first = resolver.search_map(AboveLevel);
        let second = resolver.search_map(AboveLevel);
        assert!(first.same_registration(&second));

        assert_eq!(first.get_or_calculate(&input, &2).unwrap(), 2);
        assert!(second.has(&2));
        assert!(!second.has(&3));
    }

    #[test]
    fn test_scope_policy_applied_on_registration() {
        let config = FeatureCacheConfig::default().stale_input(StaleInputPolicy::Ignore);
        let resolver = CalculationResolver::new("lenient", config);

        let calc = resolver.resolve(Threshold { level: 1 });
        calc.get_or_calculate(&Arc::new(ObjectMask {
            intensities: vec![1.0],
        }))
        .unwrap();
        let cached = calc
            .get_or_calculate(&Arc::new(ObjectMask {
                intensities: vec![1.0, 1.0],
            }))
            .unwrap();
        assert_eq!(cached, 1);
    }

    #[test]
    fn test_monitor_tracks_map_caches() {
        let monitor = CacheMonitor::new();
        let resolver =
            CalculationResolver::<ObjectMask>::new("monitored", FeatureCacheConfig::default())
                .with_monitor(monitor.clone());

        let map = resolver.search_map(AboveLevel);
        assert_eq!(monitor.len(), 1);

        resolver.invalidate();
        drop(map);
        assert!(monitor.is_empty());
    }
}

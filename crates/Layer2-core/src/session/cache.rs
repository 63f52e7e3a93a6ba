//! Session Cache - hierarchical, invalidatable cache scopes
//!
//! A `SessionCache` is the scope calculations are deduplicated in. It owns
//! a resolver for its own registrations and a set of child caches, created
//! lazily by name, that isolate nested computations (often over a different
//! input type) from the parent scope.
//!
//! ```text
//! SessionCache<Image> "image"
//! ├── resolver            (calculations over Image)
//! ├── additional
//! │   └── shared_features (SessionCache<Image>, features referenced by id)
//! └── children
//!     ├── "object"        (SessionCache<Object>)
//!     └── "pair/first"    (SessionCache<Object>)
//! ```

use featcache_foundation::{BoundedCache, CacheMonitor, Error, FeatureCacheConfig, Result};
use parking_lot::Mutex;
use std::any::{type_name, Any};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, OnceLock};
use tracing::{debug, trace};
use uuid::Uuid;

use super::calculator::FeatureCalculator;
use super::name::ChildCacheName;
use crate::calculation::CalculationResolver;
use crate::feature::{FeatureInitParams, FeatureInput, FeatureList, FeatureRef, SharedFeatures};

/// Name of the additional cache that shared features are evaluated in
pub const SHARED_FEATURES_CACHE: &str = "shared_features";

/// Operations a parent performs on children regardless of their input type
trait ChildScope: Send + Sync {
    fn invalidate(&self);
    fn inherit_params(&self, params: &Arc<FeatureInitParams>) -> Result<()>;
}

struct ChildEntry {
    scope: Arc<dyn ChildScope>,
    any: Arc<dyn Any + Send + Sync>,
    input_type: &'static str,
}

// ============================================================================
// Session Cache
// ============================================================================

/// A named cache scope over inputs of type `I`
pub struct SessionCache<I: FeatureInput> {
    id: Uuid,
    name: String,
    config: FeatureCacheConfig,
    monitor: Option<CacheMonitor>,
    resolver: CalculationResolver<I>,
    features: FeatureList<I>,
    shared_features: SharedFeatures<I>,
    shared_scope: bool,
    additional: BTreeMap<String, Arc<SessionCache<I>>>,
    children: Mutex<HashMap<ChildCacheName, ChildEntry>>,
    params: OnceLock<Arc<FeatureInitParams>>,
}

impl<I: FeatureInput> SessionCache<I> {
    pub fn builder(name: impl Into<String>) -> SessionCacheBuilder<I> {
        SessionCacheBuilder::new(name)
    }

    /// Cache with default settings and no registered features
    pub fn new(name: impl Into<String>) -> Self {
        Self::builder(name).build()
    }

    // ========================================================================
    // Initialization
    // ========================================================================

    /// Prime the session once, before any calculation.
    ///
    /// Initializes every registered feature, every additional cache and every
    /// child created so far; children created later inherit `params`. A
    /// failure leaves the cache uninitialized; features that already ran
    /// `init` run it again on retry.
    pub fn init(&self, params: FeatureInitParams) -> Result<()> {
        self.init_shared(Arc::new(params))
    }

    fn init_shared(&self, params: Arc<FeatureInitParams>) -> Result<()> {
        if self.is_initialized() {
            return Err(Error::Initialization(format!(
                "session cache '{}' is already initialized",
                self.name
            )));
        }

        let shared = self
            .shared_scope
            .then(|| self.shared_features.iter().map(|(_, f)| f))
            .into_iter()
            .flatten();
        for feature in self.features.iter().chain(shared) {
            feature
                .init(&params)
                .map_err(|e| Error::named(feature.name(), e))?;
        }

        self.params.set(Arc::clone(&params)).map_err(|_| {
            Error::Initialization(format!(
                "session cache '{}' was initialized concurrently",
                self.name
            ))
        })?;

        for cache in self.additional.values() {
            if !cache.is_initialized() {
                cache.init_shared(Arc::clone(&params))?;
            }
        }

        let children: Vec<Arc<dyn ChildScope>> = self
            .children
            .lock()
            .values()
            .map(|entry| Arc::clone(&entry.scope))
            .collect();
        for child in children {
            child.inherit_params(&params)?;
        }

        debug!(
            "Initialized session cache {} ({} features, {} additional caches)",
            self.name,
            self.features.len(),
            self.additional.len()
        );
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.params.get().is_some()
    }

    /// Parameters given to `init`
    pub fn params(&self) -> Result<&Arc<FeatureInitParams>> {
        self.params.get().ok_or_else(|| {
            Error::Initialization(format!(
                "session cache '{}' used before init",
                self.name
            ))
        })
    }

    // ========================================================================
    // Invalidation
    // ========================================================================

    /// Forget every calculation in this scope, its additional caches and all
    /// of its children, recursively.
    pub fn invalidate(&self) {
        self.invalidate_except(&[]);
    }

    /// Like [`SessionCache::invalidate`], but children named in `keep` are
    /// left untouched.
    pub fn invalidate_except(&self, keep: &[ChildCacheName]) {
        self.resolver.invalidate();

        for cache in self.additional.values() {
            cache.invalidate();
        }

        let children: Vec<Arc<dyn ChildScope>> = self
            .children
            .lock()
            .iter()
            .filter(|(name, _)| !keep.contains(name))
            .map(|(_, entry)| Arc::clone(&entry.scope))
            .collect();
        for child in &children {
            child.invalidate();
        }

        if self.config.log_invalidations {
            debug!(
                "Invalidated session cache {} ({} children, {} kept)",
                self.name,
                children.len(),
                keep.len()
            );
        } else {
            trace!("Invalidated session cache {}", self.name);
        }
    }

    // ========================================================================
    // Child caches
    // ========================================================================

    /// Child cache for `name`, created with this cache's settings on first
    /// request.
    pub fn child_cache_for<J: FeatureInput>(
        &self,
        name: &ChildCacheName,
    ) -> Result<Arc<SessionCache<J>>> {
        self.child_cache_for_with(name, |name| {
            let mut builder =
                SessionCache::<J>::builder(format!("{}/{}", self.name, name)).config(self.config.clone());
            if let Some(monitor) = &self.monitor {
                builder = builder.monitor(monitor.clone());
            }
            Ok(builder.build())
        })
    }

    /// Child cache for `name`, built by `creator` on first request.
    ///
    /// The same name always yields the same instance. Asking for a name that
    /// already holds a cache over another input type fails with
    /// `Error::ChildCacheTypeMismatch`. `creator` runs while the child table
    /// is locked and must not request children from this cache.
    pub fn child_cache_for_with<J, F>(
        &self,
        name: &ChildCacheName,
        creator: F,
    ) -> Result<Arc<SessionCache<J>>>
    where
        J: FeatureInput,
        F: FnOnce(&ChildCacheName) -> Result<SessionCache<J>>,
    {
        let mut children = self.children.lock();

        if let Some(entry) = children.get(name) {
            return Arc::clone(&entry.any)
                .downcast::<SessionCache<J>>()
                .map_err(|_| Error::ChildCacheTypeMismatch {
                    name: name.to_string(),
                    existing: entry.input_type,
                    requested: type_name::<J>(),
                });
        }

        let child = Arc::new(creator(name)?);
        if let Some(params) = self.params.get() {
            if !child.is_initialized() {
                child.init_shared(Arc::clone(params))?;
            }
        }

        children.insert(
            name.clone(),
            ChildEntry {
                scope: child.clone(),
                any: child.clone(),
                input_type: type_name::<J>(),
            },
        );
        debug!(
            "Created child cache {} over {} under {}",
            name,
            type_name::<J>(),
            self.name
        );
        Ok(child)
    }

    pub fn child_count(&self) -> usize {
        self.children.lock().len()
    }

    pub fn child_names(&self) -> Vec<ChildCacheName> {
        let mut names: Vec<_> = self.children.lock().keys().cloned().collect();
        names.sort();
        names
    }

    // ========================================================================
    // Calculation
    // ========================================================================

    /// Calculator evaluating features against this scope
    pub fn calculator(self: &Arc<Self>) -> FeatureCalculator<I> {
        FeatureCalculator::new(Arc::clone(self))
    }

    pub fn resolver(&self) -> &CalculationResolver<I> {
        &self.resolver
    }

    /// Standalone bounded cache sized by `lruCapacity`, reporting to this
    /// scope's monitor. Features use these for derived data that outlives a
    /// single session input.
    pub fn bounded_cache<K, V>(&self, name: impl Into<String>) -> BoundedCache<K, V>
    where
        K: Eq + Hash + Clone,
        V: Clone,
    {
        let name = format!("{}/{}", self.name, name.into());
        match &self.monitor {
            Some(monitor) => BoundedCache::with_monitor(name, self.config.lru_capacity, monitor),
            None => BoundedCache::new(name, self.config.lru_capacity),
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &FeatureCacheConfig {
        &self.config
    }

    pub fn monitor(&self) -> Option<&CacheMonitor> {
        self.monitor.as_ref()
    }

    /// Features registered with this cache
    pub fn features(&self) -> &[FeatureRef<I>] {
        &self.features
    }

    pub fn shared_features(&self) -> &SharedFeatures<I> {
        &self.shared_features
    }

    /// Whether this cache is itself the scope shared features run in
    pub fn is_shared_scope(&self) -> bool {
        self.shared_scope
    }

    pub fn additional_cache(&self, name: &str) -> Result<&Arc<SessionCache<I>>> {
        self.additional
            .get(name)
            .ok_or_else(|| Error::MissingAdditionalCache(name.to_string()))
    }

    pub fn additional_names(&self) -> impl Iterator<Item = &str> {
        self.additional.keys().map(String::as_str)
    }
}

impl<I: FeatureInput> ChildScope for SessionCache<I> {
    fn invalidate(&self) {
        SessionCache::invalidate(self);
    }

    fn inherit_params(&self, params: &Arc<FeatureInitParams>) -> Result<()> {
        if self.is_initialized() {
            return Ok(());
        }
        self.init_shared(Arc::clone(params))
    }
}

impl<I: FeatureInput> fmt::Debug for SessionCache<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCache")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("input", &type_name::<I>())
            .field("initialized", &self.is_initialized())
            .field("features", &self.features.len())
            .field("additional", &self.additional.keys().collect::<Vec<_>>())
            .field("children", &self.child_names())
            .field("resolver", &self.resolver)
            .finish()
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`SessionCache`]
pub struct SessionCacheBuilder<I: FeatureInput> {
    name: String,
    config: FeatureCacheConfig,
    monitor: Option<CacheMonitor>,
    features: FeatureList<I>,
    shared_features: SharedFeatures<I>,
    additional: BTreeMap<String, Arc<SessionCache<I>>>,
}

impl<I: FeatureInput> SessionCacheBuilder<I> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: FeatureCacheConfig::default(),
            monitor: None,
            features: Vec::new(),
            shared_features: SharedFeatures::new(),
            additional: BTreeMap::new(),
        }
    }

    pub fn config(mut self, config: FeatureCacheConfig) -> Self {
        self.config = config;
        self
    }

    /// Report calculation-map caches of this scope and its children
    pub fn monitor(mut self, monitor: CacheMonitor) -> Self {
        self.monitor = Some(monitor);
        self
    }

    pub fn feature(mut self, feature: FeatureRef<I>) -> Self {
        self.features.push(feature);
        self
    }

    pub fn features(mut self, features: FeatureList<I>) -> Self {
        self.features.extend(features);
        self
    }

    /// Features other features may refer to by id.
    ///
    /// Unless an additional cache named [`SHARED_FEATURES_CACHE`] is supplied,
    /// one is created for them.
    pub fn shared_features(mut self, shared: SharedFeatures<I>) -> Self {
        self.shared_features = shared;
        self
    }

    /// Register a named cache that sessions over this cache can reach
    pub fn additional_cache(mut self, name: impl Into<String>, cache: Arc<SessionCache<I>>) -> Self {
        self.additional.insert(name.into(), cache);
        self
    }

    pub fn build(self) -> SessionCache<I> {
        let mut additional = self.additional;

        if !self.shared_features.is_empty() && !additional.contains_key(SHARED_FEATURES_CACHE) {
            let shared = SessionCache::assemble(
                format!("{}/{}", self.name, SHARED_FEATURES_CACHE),
                self.config.clone(),
                self.monitor.clone(),
                Vec::new(),
                self.shared_features.clone(),
                true,
                BTreeMap::new(),
            );
            additional.insert(SHARED_FEATURES_CACHE.to_string(), Arc::new(shared));
        }

        SessionCache::assemble(
            self.name,
            self.config,
            self.monitor,
            self.features,
            self.shared_features,
            false,
            additional,
        )
    }
}

impl<I: FeatureInput> SessionCache<I> {
    #[allow(clippy::too_many_arguments)]
    fn assemble(
        name: String,
        config: FeatureCacheConfig,
        monitor: Option<CacheMonitor>,
        features: FeatureList<I>,
        shared_features: SharedFeatures<I>,
        shared_scope: bool,
        additional: BTreeMap<String, Arc<SessionCache<I>>>,
    ) -> Self {
        let mut resolver = CalculationResolver::new(name.clone(), config.clone());
        if let Some(monitor) = &monitor {
            resolver = resolver.with_monitor(monitor.clone());
        }

        Self {
            id: Uuid::new_v4(),
            name,
            config,
            monitor,
            resolver,
            features,
            shared_features,
            shared_scope,
            additional,
            children: Mutex::new(HashMap::new()),
            params: OnceLock::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::Feature;
    use crate::session::SessionInput;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, PartialEq)]
    struct Image(u32);
    impl FeatureInput for Image {}

    #[derive(Debug, PartialEq)]
    struct Object(u32);
    impl FeatureInput for Object {}

    #[derive(Default)]
    struct CountingInit {
        inits: AtomicUsize,
    }

    impl Feature<Image> for CountingInit {
        fn name(&self) -> &str {
            "counting"
        }

        fn init(&self, _params: &FeatureInitParams) -> Result<()> {
            self.inits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn calculate(&self, session: &SessionInput<Image>) -> Result<f64> {
            Ok(session.input().0 as f64)
        }
    }

    #[test]
    fn test_init_once() {
        let feature = Arc::new(CountingInit::default());
        let cache = SessionCache::<Image>::builder("image").feature(feature.clone()).build();

        assert!(cache.params().is_err());
        cache.init(FeatureInitParams::new()).unwrap();
        assert!(cache.is_initialized());
        assert_eq!(feature.inits.load(Ordering::SeqCst), 1);

        let err = cache.init(FeatureInitParams::new()).unwrap_err();
        assert!(matches!(err, Error::Initialization(_)));
        assert_eq!(feature.inits.load(Ordering::SeqCst), 1);
    }

    struct NeedsChannel {
        inits: AtomicUsize,
    }

    impl Feature<Image> for NeedsChannel {
        fn name(&self) -> &str {
            "needs_channel"
        }

        fn init(&self, params: &FeatureInitParams) -> Result<()> {
            params
                .value("channel")
                .ok_or_else(|| Error::Initialization("missing 'channel'".into()))?;
            self.inits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn calculate(&self, _session: &SessionInput<Image>) -> Result<f64> {
            Ok(0.0)
        }
    }

    #[test]
    fn test_failed_init_can_be_retried() {
        let before = Arc::new(CountingInit::default());
        let needs_channel = Arc::new(NeedsChannel {
            inits: AtomicUsize::new(0),
        });
        let cache = SessionCache::<Image>::builder("image")
            .feature(before.clone())
            .feature(needs_channel.clone())
            .build();

        let err = cache.init(FeatureInitParams::new()).unwrap_err();
        assert_eq!(err.feature_name(), Some("needs_channel"));
        assert!(!cache.is_initialized());
        assert_eq!(needs_channel.inits.load(Ordering::SeqCst), 0);

        cache
            .init(FeatureInitParams::new().with_value("channel", "red"))
            .unwrap();
        assert!(cache.is_initialized());
        assert_eq!(needs_channel.inits.load(Ordering::SeqCst), 1);
        // Features ahead of the failure are initialized again
        assert_eq!(before.inits.load(Ordering::SeqCst), 2);
        assert_eq!(cache.params().unwrap().value("channel"), Some("red"));
    }

    #[test]
    fn test_child_reference_stable() {
        let cache: SessionCache<Image> = SessionCache::new("image");
        let name = ChildCacheName::new("object");

        let first = cache.child_cache_for::<Object>(&name).unwrap();
        let second = cache.child_cache_for::<Object>(&name).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.child_count(), 1);
        assert_eq!(first.name(), "image/object");
    }

    #[test]
    fn test_child_type_mismatch_fails() {
        let cache: SessionCache<Image> = SessionCache::new("image");
        let name = ChildCacheName::with_part("pair", "first");

        cache.child_cache_for::<Object>(&name).unwrap();
        let err = cache.child_cache_for::<Image>(&name).unwrap_err();
        match err {
            Error::ChildCacheTypeMismatch {
                name,
                existing,
                requested,
            } => {
                assert_eq!(name, "pair/first");
                assert!(existing.ends_with("Object"));
                assert!(requested.ends_with("Image"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_children_inherit_params() {
        let cache: SessionCache<Image> = SessionCache::new("image");
        let early = cache
            .child_cache_for::<Object>(&ChildCacheName::new("early"))
            .unwrap();
        assert!(!early.is_initialized());

        cache
            .init(FeatureInitParams::new().with_value("channel", "green"))
            .unwrap();
        assert!(early.is_initialized());

        let late = cache
            .child_cache_for::<Object>(&ChildCacheName::new("late"))
            .unwrap();
        assert_eq!(late.params().unwrap().value("channel"), Some("green"));
    }

    #[test]
    fn test_creator_used_once() {
        let cache: SessionCache<Image> = SessionCache::new("image");
        let name = ChildCacheName::new("custom");
        let created = AtomicUsize::new(0);

        for _ in 0..3 {
            cache
                .child_cache_for_with::<Object, _>(&name, |_| {
                    created.fetch_add(1, Ordering::SeqCst);
                    Ok(SessionCache::new("custom-object"))
                })
                .unwrap();
        }
        assert_eq!(created.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_bounded_cache_uses_scope_settings() {
        let monitor = CacheMonitor::new();
        let cache = SessionCache::<Image>::builder("image")
            .config(FeatureCacheConfig::default().lru_capacity(3))
            .monitor(monitor.clone())
            .build();

        let masks = cache.bounded_cache::<u32, Vec<u8>>("masks");
        assert_eq!(masks.capacity(), 3);
        assert_eq!(masks.name(), "image/masks");
        assert_eq!(monitor.len(), 1);

        drop(masks);
        assert!(monitor.is_empty());
    }

    #[test]
    fn test_missing_additional_cache() {
        let cache: SessionCache<Image> = SessionCache::new("image");
        let err = cache.additional_cache("nope").unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_shared_features_get_their_own_scope() {
        let shared = SharedFeatures::<Image>::new().with("counting", Arc::new(CountingInit::default()));
        let cache = SessionCache::<Image>::builder("image").shared_features(shared).build();

        let scope = cache.additional_cache(SHARED_FEATURES_CACHE).unwrap();
        assert!(scope.is_shared_scope());
        assert!(!cache.is_shared_scope());

        cache.init(FeatureInitParams::new()).unwrap();
        assert!(scope.is_initialized());
    }
}

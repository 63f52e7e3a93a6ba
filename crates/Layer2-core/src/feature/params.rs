//! Session initialization parameters

use featcache_foundation::{Error, Result};
use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Named objects shared by every feature of a session (models, lookup
/// tables, ...)
#[derive(Clone, Default)]
pub struct SharedObjects {
    objects: HashMap<String, Arc<dyn Any + Send + Sync>>,
}

impl SharedObjects {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<T: Any + Send + Sync>(&mut self, name: impl Into<String>, object: T) {
        self.objects.insert(name.into(), Arc::new(object));
    }

    pub fn with<T: Any + Send + Sync>(mut self, name: impl Into<String>, object: T) -> Self {
        self.insert(name, object);
        self
    }

    /// Look up an object by name and type
    pub fn get<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>> {
        let object = self.objects.get(name).ok_or_else(|| {
            Error::Initialization(format!("shared object '{}' is not registered", name))
        })?;
        object.clone().downcast::<T>().map_err(|_| {
            Error::Initialization(format!(
                "shared object '{}' is not a {}",
                name,
                std::any::type_name::<T>()
            ))
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.objects.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

impl fmt::Debug for SharedObjects {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.objects.keys().collect();
        names.sort();
        f.debug_struct("SharedObjects").field("names", &names).finish()
    }
}

/// Parameters supplied once when a session starts
#[derive(Debug, Clone, Default)]
pub struct FeatureInitParams {
    dictionary: BTreeMap<String, String>,
    shared: Option<Arc<SharedObjects>>,
}

impl FeatureInitParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.dictionary.insert(key.into(), value.into());
        self
    }

    pub fn with_shared(mut self, shared: SharedObjects) -> Self {
        self.shared = Some(Arc::new(shared));
        self
    }

    pub fn value(&self, key: &str) -> Option<&str> {
        self.dictionary.get(key).map(String::as_str)
    }

    /// Parse a dictionary value, `None` when the key is absent
    pub fn parse<T: FromStr>(&self, key: &str) -> Result<Option<T>> {
        match self.value(key) {
            None => Ok(None),
            Some(raw) => raw.parse::<T>().map(Some).map_err(|_| {
                Error::Initialization(format!(
                    "parameter '{}' = '{}' is not a valid {}",
                    key,
                    raw,
                    std::any::type_name::<T>()
                ))
            }),
        }
    }

    pub fn dictionary(&self) -> &BTreeMap<String, String> {
        &self.dictionary
    }

    pub fn shared(&self) -> Option<&SharedObjects> {
        self.shared.as_deref()
    }
}

//! Feature Cache Config - settings shared by every session cache
//!
//! Loadable from TOML or JSON; missing fields fall back to defaults.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default config file name
pub const FEATURE_CACHE_CONFIG_FILE: &str = "feature-cache.toml";

// ============================================================================
// Stale input policy
// ============================================================================

/// What a calculation does when asked again with a different input after it
/// has already been evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StaleInputPolicy {
    /// Fail with `Error::StaleInput`
    #[default]
    Reject,
    /// Return the cached result; input is immaterial after first use
    Ignore,
}

// ============================================================================
// Feature Cache Config
// ============================================================================

/// Settings for session caches, calculation maps and bounded caches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureCacheConfig {
    /// LRU capacity of each keyed calculation map
    #[serde(default = "default_calculation_map_capacity")]
    pub calculation_map_capacity: usize,

    /// Behavior on a repeated call with an unequal input
    #[serde(default)]
    pub stale_input: StaleInputPolicy,

    /// Default capacity for standalone bounded caches
    #[serde(default = "default_lru_capacity")]
    pub lru_capacity: usize,

    /// Emit a debug event for every scope invalidation
    #[serde(default)]
    pub log_invalidations: bool,
}

impl Default for FeatureCacheConfig {
    fn default() -> Self {
        Self {
            calculation_map_capacity: default_calculation_map_capacity(),
            stale_input: StaleInputPolicy::default(),
            lru_capacity: default_lru_capacity(),
            log_invalidations: false,
        }
    }
}

impl FeatureCacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Load
    // ========================================================================

    /// Parse from a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()
    }

    /// Parse from a JSON document
    pub fn from_json_str(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()
    }

    /// Load from a file; `.json` files are read as JSON, anything else as TOML
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let config = if is_json {
            Self::from_json_str(&content)?
        } else {
            Self::from_toml_str(&content)?
        };
        tracing::debug!("Loaded feature cache config from {}", path.display());
        Ok(config)
    }

    /// Load from a file if it exists, otherwise defaults
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Reject settings no cache can work with
    pub fn validate(self) -> Result<Self> {
        if self.calculation_map_capacity == 0 {
            return Err(Error::Config(
                "calculationMapCapacity must be at least 1".to_string(),
            ));
        }
        if self.lru_capacity == 0 {
            return Err(Error::Config("lruCapacity must be at least 1".to_string()));
        }
        Ok(self)
    }

    // ========================================================================
    // Builder
    // ========================================================================

    pub fn calculation_map_capacity(mut self, capacity: usize) -> Self {
        self.calculation_map_capacity = capacity;
        self
    }

    pub fn stale_input(mut self, policy: StaleInputPolicy) -> Self {
        self.stale_input = policy;
        self
    }

    pub fn lru_capacity(mut self, capacity: usize) -> Self {
        self.lru_capacity = capacity;
        self
    }

    pub fn log_invalidations(mut self, enabled: bool) -> Self {
        self.log_invalidations = enabled;
        self
    }
}

fn default_calculation_map_capacity() -> usize {
    100
}

fn default_lru_capacity() -> usize {
    1000
}

//! Error types for featcache
//!
//! Every failure the caching subsystem can raise is collected here.

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// featcache error type
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Calculation
    // ========================================================================
    #[error("Calculation error: {0}")]
    Calculation(#[source] anyhow::Error),

    #[error("Feature '{feature}' failed: {source}")]
    NamedFeature {
        feature: String,
        #[source]
        source: Box<Error>,
    },

    #[error("Stale input: {0}")]
    StaleInput(String),

    // ========================================================================
    // Cache configuration
    // ========================================================================
    #[error("Initialization error: {0}")]
    Initialization(String),

    #[error("Additional cache not found: {0}")]
    MissingAdditionalCache(String),

    #[error("Child cache '{name}' was created for input type {existing}, requested as {requested}")]
    ChildCacheTypeMismatch {
        name: String,
        existing: &'static str,
        requested: &'static str,
    },

    #[error("Feature not found: {0}")]
    FeatureNotFound(String),

    // ========================================================================
    // Config loading
    // ========================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Calculation failure from a plain message
    pub fn calculation(message: impl Into<String>) -> Self {
        Error::Calculation(anyhow::anyhow!(message.into()))
    }

    /// Attach the display name of the feature that failed
    pub fn named(feature: impl Into<String>, source: Error) -> Self {
        Error::NamedFeature {
            feature: feature.into(),
            source: Box::new(source),
        }
    }

    /// Whether this error is a structural mistake in how caches were wired
    /// rather than a failure of an individual calculation.
    pub fn is_configuration(&self) -> bool {
        match self {
            Error::NamedFeature { source, .. } => source.is_configuration(),
            Error::Initialization(_)
            | Error::MissingAdditionalCache(_)
            | Error::ChildCacheTypeMismatch { .. }
            | Error::Config(_) => true,
            _ => false,
        }
    }

    /// Name of the feature that failed, if one was attached
    pub fn feature_name(&self) -> Option<&str> {
        match self {
            Error::NamedFeature { feature, .. } => Some(feature),
            _ => None,
        }
    }

    /// Strip feature names, leaving the underlying failure.
    ///
    /// Used when crossing a boundary that does not track feature names.
    pub fn into_plain(self) -> Self {
        match self {
            Error::NamedFeature { source, .. } => source.into_plain(),
            other => other,
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Calculation(err)
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::calculation(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::calculation(s)
    }
}

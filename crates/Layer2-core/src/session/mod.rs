//! Session - cache scopes and the inputs bound to them
//!
//! ```text
//! FeatureCalculator ──▶ SessionInput ──▶ SessionCache ──▶ CalculationResolver
//!        │                   │                 │
//!        ▼                   │                 └── child caches (by ChildCacheName)
//!  SuppressErrors            └── additional caches (shared_features, ...)
//! ```

mod cache;
mod calculator;
mod input;
mod name;
mod suppress;

pub use cache::{SessionCache, SessionCacheBuilder, SHARED_FEATURES_CACHE};
pub use calculator::FeatureCalculator;
pub use input::{ResolvedFeatureId, SessionInput};
pub use name::ChildCacheName;
pub use suppress::{SuppressErrors, SuppressedFailure, SuppressedResults};

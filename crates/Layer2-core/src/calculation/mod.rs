//! Calculation - memoized, deduplicated sub-steps of features
//!
//! - `cacheable.rs` - `Calculation` + `CacheableCalculation`
//! - `map.rs` - `KeyedCalculation` + `CacheableCalculationMap`
//! - `resolver.rs` - `CalculationResolver` and its resolved handles

mod cacheable;
mod map;
mod resolver;

pub use cacheable::{CacheableCalculation, Calculation};
pub use map::{CacheableCalculationMap, KeyedCalculation};
pub use resolver::{CalculationResolver, ResolvedCalculation, ResolvedCalculationMap, ResolverStats};

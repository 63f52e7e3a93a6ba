//! Hashing utilities for cache keys

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Compute a hash for any hashable value
///
/// Stable within one process; used to tag log events for calculation
/// configurations, never persisted.
pub fn compute_hash<T: Hash + ?Sized>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equal_values_hash_equal() {
        assert_eq!(compute_hash(&("mean", 5u32)), compute_hash(&("mean", 5u32)));
        assert_ne!(compute_hash(&("mean", 5u32)), compute_hash(&("mean", 6u32)));
    }
}

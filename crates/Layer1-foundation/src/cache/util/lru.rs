//! Lightweight LRU Cache implementation
//!
//! Unsynchronized core used by [`crate::cache::BoundedCache`]. Recency is a
//! monotonically increasing access tick; a `BTreeMap` indexed by tick keeps
//! the access order so eviction does not scan every entry.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

/// A simple LRU (Least Recently Used) cache
///
/// `entries` and `order` always hold the same keys, and each key appears at
/// most once in `order`.
#[derive(Debug)]
pub struct LruCache<K, V> {
    /// Storage for cached items
    entries: HashMap<K, LruEntry<V>>,
    /// Access tick -> key, oldest first
    order: BTreeMap<u64, K>,
    /// Maximum number of entries
    capacity: usize,
    /// Access counter for LRU tracking
    access_counter: u64,
}

#[derive(Debug)]
struct LruEntry<V> {
    value: V,
    last_access: u64,
}

impl<K: Eq + Hash + Clone, V> LruCache<K, V> {
    /// Create a new LRU cache with the given capacity
    ///
    /// A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: HashMap::with_capacity(capacity),
            order: BTreeMap::new(),
            capacity,
            access_counter: 0,
        }
    }

    fn next_tick(&mut self) -> u64 {
        self.access_counter += 1;
        self.access_counter
    }

    /// Get a reference to a cached value
    ///
    /// Promotes the key to most recently used.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        let tick = self.next_tick();
        let entry = self.entries.get_mut(key)?;
        self.order.remove(&entry.last_access);
        self.order.insert(tick, key.clone());
        entry.last_access = tick;
        Some(&entry.value)
    }

    /// Check if a key exists without updating access time
    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Insert a value as the most recently used entry
    ///
    /// Replaces an existing value in place. Otherwise, if the cache is full,
    /// the least recently used entry is evicted and returned.
    pub fn insert(&mut self, key: K, value: V) -> Option<(K, V)> {
        let tick = self.next_tick();

        if let Some(entry) = self.entries.get_mut(&key) {
            self.order.remove(&entry.last_access);
            self.order.insert(tick, key);
            entry.value = value;
            entry.last_access = tick;
            return None;
        }

        let evicted = if self.entries.len() >= self.capacity {
            self.evict_lru()
        } else {
            None
        };

        self.order.insert(tick, key.clone());
        self.entries.insert(
            key,
            LruEntry {
                value,
                last_access: tick,
            },
        );

        evicted
    }

    /// Remove a specific key from the cache
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let entry = self.entries.remove(key)?;
        self.order.remove(&entry.last_access);
        Some(entry.value)
    }

    /// Clear all entries
    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    /// Get the number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get the capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Keys ordered from most to least recently used
    pub fn keys_by_recency(&self) -> impl Iterator<Item = &K> {
        self.order.values().rev()
    }

    /// Evict the least recently used entry
    fn evict_lru(&mut self) -> Option<(K, V)> {
        let (_, key) = self.order.pop_first()?;
        let entry = self.entries.remove(&key)?;
        Some((key, entry.value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lru_basic() {
        let mut cache = LruCache::new(3);

        cache.insert("a", 1);
        cache.insert("b", 2);
        cache.insert("c", 3);

        assert_eq!(cache.get(&"a"), Some(&1));
        assert_eq!(cache.get(&"b"), Some(&2));
        assert_eq!(cache.get(&"c"), Some(&3));
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn test_lru_eviction() {
        let mut cache = LruCache::new(2);

        cache.insert("a", 1);
        cache.insert("b", 2);

        // Access "a" to make it more recent
        cache.get(&"a");

        // Insert "c", should evict "b" (least recently used)
        let evicted = cache.insert("c", 3);
        assert_eq!(evicted, Some(("b", 2)));

        assert!(cache.contains(&"a"));
        assert!(!cache.contains(&"b"));
        assert!(cache.contains(&"c"));
    }

    #[test]
    fn test_lru_update_in_place() {
        let mut cache = LruCache::new(2);

        cache.insert("a", 1);
        assert_eq!(cache.insert("a", 10), None);

        assert_eq!(cache.get(&"a"), Some(&10));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.keys_by_recency().count(), 1);
    }

    #[test]
    fn test_contains_does_not_promote() {
        let mut cache = LruCache::new(2);
        cache.insert("a", 1);
        cache.insert("b", 2);

        assert!(cache.contains(&"a"));
        cache.insert("c", 3);

        // "a" was only checked, so it stayed least recent
        assert!(!cache.contains(&"a"));
    }

    #[test]
    fn test_recency_order() {
        let mut cache = LruCache::new(3);
        cache.insert(1, "one");
        cache.insert(2, "two");
        cache.insert(3, "three");
        cache.get(&1);

        let keys: Vec<_> = cache.keys_by_recency().copied().collect();
        assert_eq!(keys, vec![1, 3, 2]);
    }

    #[test]
    fn test_remove_and_clear() {
        let mut cache = LruCache::new(4);
        cache.insert(1, "one");
        cache.insert(2, "two");

        assert_eq!(cache.remove(&1), Some("one"));
        assert_eq!(cache.remove(&1), None);
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.keys_by_recency().count(), 0);
    }

    #[test]
    fn test_zero_capacity_holds_one() {
        let mut cache = LruCache::new(0);
        cache.insert("a", 1);
        cache.insert("b", 2);
        assert_eq!(cache.capacity(), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.contains(&"b"));
    }
}

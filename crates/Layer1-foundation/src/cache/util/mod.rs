//! Cache utilities
//!
//! - `LruCache`: unsynchronized LRU core
//! - `compute_hash`: structural hash of a key

mod hash;
mod lru;

pub use hash::compute_hash;
pub use lru::LruCache;

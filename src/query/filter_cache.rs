use crate::core::error::Result;
use crate::index::bitmap::CompressedBitmap;
use crate::query::predicate::Predicate;
use lru::LruCache;
use parking_lot::RwLock;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// LRU cache from a `Predicate` to the `CompressedBitmap` it evaluates to.
///
/// Adapted from the teacher's `QueryCache` (`src/query/cache.rs`): same
/// `lru::LruCache` + hit/miss counters shape, but the single `RwLock` only
/// ever guards the map itself — `get_or_build` runs the (potentially
/// index-I/O-bound) bitmap construction *outside* the lock and double-checks
/// before inserting, so a miss on one predicate never blocks a concurrent
/// lookup of an unrelated one.
pub struct FilterCache {
    cache: RwLock<LruCache<Predicate, Arc<CompressedBitmap>>>,
    hit_count: AtomicUsize,
    miss_count: AtomicUsize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

impl FilterCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(1).unwrap());
        FilterCache {
            cache: RwLock::new(LruCache::new(capacity)),
            hit_count: AtomicUsize::new(0),
            miss_count: AtomicUsize::new(0),
        }
    }

    pub fn get(&self, key: &Predicate) -> Option<Arc<CompressedBitmap>> {
        let mut cache = self.cache.write();
        if let Some(bitmap) = cache.get(key) {
            self.hit_count.fetch_add(1, Ordering::Relaxed);
            Some(bitmap.clone())
        } else {
            self.miss_count.fetch_add(1, Ordering::Relaxed);
            None
        }
    }

    /// Looks up `key`; on a miss, runs `build` with no lock held, then
    /// double-checks the cache before inserting — two concurrent misses on
    /// the same key both pay for a build, but only one result wins a slot
    /// (matching the value of whichever insert lands, since both are
    /// equivalent evaluations of the same predicate).
    pub fn get_or_build<F>(&self, key: &Predicate, build: F) -> Result<Arc<CompressedBitmap>>
    where
        F: FnOnce() -> Result<CompressedBitmap>,
    {
        if let Some(hit) = self.get(key) {
            return Ok(hit);
        }
        let built = Arc::new(build()?);
        let mut cache = self.cache.write();
        if let Some(existing) = cache.get(key) {
            return Ok(existing.clone());
        }
        cache.put(key.clone(), built.clone());
        Ok(built)
    }

    pub fn reset_cache(&self) {
        self.cache.write().clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hit_count.load(Ordering::Relaxed),
            misses: self.miss_count.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::PropertyValue;
    use crate::index::reader::FilteringOperation;

    #[test]
    fn miss_then_hit() {
        let cache = FilterCache::new(8);
        let key = Predicate::equal("price", PropertyValue::Integer(10));
        assert!(cache.get(&key).is_none());

        let built = cache
            .get_or_build(&key, || Ok(CompressedBitmap::identity_upto(3)))
            .unwrap();
        assert_eq!(built.len(), 3);

        let hit = cache.get(&key).unwrap();
        assert_eq!(hit.len(), 3);

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 2);
    }

    #[test]
    fn reset_clears_entries() {
        let cache = FilterCache::new(8);
        let key = Predicate::new(FilteringOperation::Equal, "p", vec![PropertyValue::Integer(1)]);
        cache.get_or_build(&key, || Ok(CompressedBitmap::new())).unwrap();
        cache.reset_cache();
        assert!(cache.get(&key).is_none());
    }
}

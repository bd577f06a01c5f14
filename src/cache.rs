//! Keyed read-through result cache.
//!
//! Analyses are deterministic functions of their inputs, so the cache is
//! purely an optimization: entries are immutable once written, and a race
//! between identical computations resolves to identical values. Keys
//! combine the analysis kind, a content hash of the inputs, and a hash of
//! the parameters.

use crate::errors::AnalyticsResult;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::time::Instant;

/// Cache key: analysis kind plus input and parameter hashes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Analysis kind discriminator
    pub kind: &'static str,
    /// Content hash of the input series
    pub input_hash: u64,
    /// Hash of the analysis parameters
    pub param_hash: u64,
}

/// Hit and miss counters.
#[derive(Debug, Default, Clone, Copy)]
pub struct CacheStats {
    /// Lookups answered from the cache
    pub hits: u64,
    /// Lookups that fell through to computation
    pub misses: u64,
}

impl CacheStats {
    /// Fraction of lookups answered from the cache.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct CacheEntry<V> {
    value: V,
    inserted: Instant,
}

/// Bounded read-through cache with oldest-entry eviction.
pub struct ResultCache<V: Clone> {
    entries: RwLock<HashMap<CacheKey, CacheEntry<V>>>,
    capacity: usize,
    stats: Mutex<CacheStats>,
}

impl<V: Clone> ResultCache<V> {
    /// Cache holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
            stats: Mutex::new(CacheStats::default()),
        }
    }

    /// Look up `key`, computing and storing on a miss.
    ///
    /// The computation runs outside the lock; failed computations are
    /// never cached. If a concurrent request stored the same key first,
    /// its (identical) value is kept.
    pub fn get_or_compute<F>(&self, key: CacheKey, compute: F) -> AnalyticsResult<V>
    where
        F: FnOnce() -> AnalyticsResult<V>,
    {
        if let Some(entry) = self.entries.read().get(&key) {
            self.stats.lock().hits += 1;
            return Ok(entry.value.clone());
        }
        self.stats.lock().misses += 1;

        let value = compute()?;

        let mut entries = self.entries.write();
        if let Some(existing) = entries.get(&key) {
            // Concurrent writer won the race; inputs determine outputs,
            // so its value equals ours
            return Ok(existing.value.clone());
        }
        if entries.len() >= self.capacity {
            if let Some(oldest) = entries
                .iter()
                .min_by_key(|(_, e)| e.inserted)
                .map(|(k, _)| *k)
            {
                log::debug!("result cache full, evicting {:?}", oldest);
                entries.remove(&oldest);
            }
        }
        entries.insert(
            key,
            CacheEntry {
                value: value.clone(),
                inserted: Instant::now(),
            },
        );
        Ok(value)
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Drop all entries, keeping the statistics.
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Snapshot of the hit/miss counters.
    pub fn stats(&self) -> CacheStats {
        *self.stats.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AnalyticsError;

    fn key(kind: &'static str, input: u64, params: u64) -> CacheKey {
        CacheKey {
            kind,
            input_hash: input,
            param_hash: params,
        }
    }

    #[test]
    fn test_miss_then_hit() {
        let cache: ResultCache<u64> = ResultCache::new(8);
        let mut calls = 0;

        let v = cache
            .get_or_compute(key("distribution", 1, 1), || {
                calls += 1;
                Ok(42)
            })
            .unwrap();
        assert_eq!(v, 42);
        assert_eq!(calls, 1);

        let v = cache
            .get_or_compute(key("distribution", 1, 1), || {
                calls += 1;
                Ok(42)
            })
            .unwrap();
        assert_eq!(v, 42);
        assert_eq!(calls, 1); // second lookup never recomputed

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hit_rate(), 0.5);
    }

    #[test]
    fn test_distinct_keys_compute_separately() {
        let cache: ResultCache<u64> = ResultCache::new(8);
        let a = cache.get_or_compute(key("risk", 1, 1), || Ok(1)).unwrap();
        let b = cache.get_or_compute(key("risk", 1, 2), || Ok(2)).unwrap();
        let c = cache.get_or_compute(key("risk", 2, 1), || Ok(3)).unwrap();
        assert_eq!((a, b, c), (1, 2, 3));
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn test_failures_are_not_cached() {
        let cache: ResultCache<u64> = ResultCache::new(8);
        let result = cache.get_or_compute(key("forecast", 1, 1), || {
            Err(AnalyticsError::InsufficientData {
                required: 10,
                actual: 2,
            })
        });
        assert!(result.is_err());
        assert!(cache.is_empty());

        // Same key computes again, successfully this time
        let v = cache.get_or_compute(key("forecast", 1, 1), || Ok(7)).unwrap();
        assert_eq!(v, 7);
    }

    #[test]
    fn test_capacity_eviction() {
        let cache: ResultCache<u64> = ResultCache::new(2);
        cache.get_or_compute(key("a", 1, 0), || Ok(1)).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(2));
        cache.get_or_compute(key("b", 2, 0), || Ok(2)).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(2));
        cache.get_or_compute(key("c", 3, 0), || Ok(3)).unwrap();

        assert_eq!(cache.len(), 2);
        // Oldest entry ("a") was evicted: recomputing it is a miss
        let mut recomputed = false;
        cache
            .get_or_compute(key("a", 1, 0), || {
                recomputed = true;
                Ok(1)
            })
            .unwrap();
        assert!(recomputed);
    }

    #[test]
    fn test_clear_keeps_stats() {
        let cache: ResultCache<u64> = ResultCache::new(4);
        cache.get_or_compute(key("a", 1, 0), || Ok(1)).unwrap();
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.stats().misses, 1);
    }
}

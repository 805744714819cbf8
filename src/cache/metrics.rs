//! Dictionary cache metrics.
//!
//! Counters are updated with relaxed atomics from every request thread and
//! read back as a serializable [`CacheReport`].

use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Counters for one [`DictionaryCache`](super::DictionaryCache).
#[derive(Debug, Default)]
pub struct CacheMetrics {
    /// Lookups answered from the cache
    hits: AtomicUsize,

    /// Lookups that found nothing, even after reloading
    misses: AtomicUsize,

    /// Full reloads actually performed (reused reloads are not counted)
    reloads: AtomicUsize,

    /// Repeated keys seen while reloading
    duplicate_keys: AtomicUsize,
}

impl CacheMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reload(&self) {
        self.reloads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_duplicates(&self, count: usize) {
        self.duplicate_keys.fetch_add(count, Ordering::Relaxed);
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> usize {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn reloads(&self) -> usize {
        self.reloads.load(Ordering::Relaxed)
    }

    pub fn duplicate_keys(&self) -> usize {
        self.duplicate_keys.load(Ordering::Relaxed)
    }

    /// Snapshot of the counters.
    pub fn report(&self) -> CacheReport {
        let hits = self.hits();
        let misses = self.misses();
        let lookups = hits + misses;
        let hit_rate = if lookups > 0 {
            (hits as f64 / lookups as f64) * 100.0
        } else {
            0.0
        };

        CacheReport {
            hits,
            misses,
            hit_rate,
            reloads: self.reloads(),
            duplicate_keys: self.duplicate_keys(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheReport {
    pub hits: usize,
    pub misses: usize,

    /// Hit rate as a percentage (0-100)
    pub hit_rate: f64,

    pub reloads: usize,
    pub duplicate_keys: usize,
}

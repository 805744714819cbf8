use lru::LruCache;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

use crate::logging::LOG_TARGET;

struct Records {
    entries: LruCache<String, String>,
    used_bytes: usize,
}

fn record_size(key: &str, value: &str) -> usize {
    key.len() + value.len()
}

/// Thread-safe string cache bounded by the total size of its records.
///
/// A record costs the byte length of its key plus its value. When the budget
/// is exceeded the least recently used records are evicted; a record that is
/// larger than the whole budget is not stored at all.
pub struct SizedCache {
    records: Mutex<Records>,
    max_bytes: usize,
}

impl SizedCache {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            records: Mutex::new(Records {
                entries: LruCache::unbounded(),
                used_bytes: 0,
            }),
            max_bytes,
        }
    }

    // Records are consistent between statements; a poisoned lock is still usable.
    fn records(&self) -> MutexGuard<'_, Records> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Value stored under `key`, marking it as recently used.
    pub fn get(&self, key: &str) -> Option<String> {
        self.records().entries.get(key).cloned()
    }

    /// Insert or replace the value stored under `key`.
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        let size = record_size(&key, &value);
        let mut records = self.records();

        if let Some(previous) = records.entries.pop(&key) {
            records.used_bytes -= record_size(&key, &previous);
        }

        if size > self.max_bytes {
            debug!(
                target: LOG_TARGET,
                "Cache record '{}' ({} bytes) exceeds the cache size of {} bytes, not cached", key, size, self.max_bytes
            );
            return;
        }

        records.entries.put(key, value);
        records.used_bytes += size;

        while records.used_bytes > self.max_bytes {
            match records.entries.pop_lru() {
                Some((evicted_key, evicted_value)) => {
                    records.used_bytes -= record_size(&evicted_key, &evicted_value);
                }
                None => break,
            }
        }
    }

    pub fn remove(&self, key: &str) -> Option<String> {
        let mut records = self.records();
        let removed = records.entries.pop(key);
        if let Some(value) = &removed {
            records.used_bytes -= record_size(key, value);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.records().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut records = self.records();
        records.entries.clear();
        records.used_bytes = 0;
    }

    pub fn used_bytes(&self) -> usize {
        self.records().used_bytes
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }
}

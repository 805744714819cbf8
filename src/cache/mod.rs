//! Caching of dictionary keys.
//!
//! [`DictionaryCache`] maps `(dictionary root, key)` to the id of the entry
//! holding the phrase. It sits on top of [`SizedCache`], a byte-bounded LRU
//! store, and reports its activity through [`CacheMetrics`].

mod dictionary;
mod metrics;
mod sized;

pub use dictionary::{DictionaryCache, DuplicateKey, ReloadSummary};
pub use metrics::{CacheMetrics, CacheReport};
pub use sized::SizedCache;

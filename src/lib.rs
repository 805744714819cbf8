//! Site-scoped dictionary for a hierarchical content store.
//!
//! Rendering code asks a [`Translator`] for the phrase behind a key. Each site
//! has its own dictionary root (or shares the global one); missing entries are
//! created on first use with a default phrase, and key lookups are served from
//! a size-bounded cache that reloads itself from the store on a miss.

pub mod cache;
pub mod config;
pub mod error;
pub mod format;
pub mod language;
pub mod logging;
pub mod naming;
pub mod publish;
pub mod site;
pub mod store;
pub mod translator;

pub use cache::{CacheReport, DictionaryCache};
pub use config::Config;
pub use error::LocalizationError;
pub use language::Language;
pub use site::{PageMode, RequestContext, SiteDescriptor, SiteResolver};
pub use store::{ContentStore, MemoryStore};
pub use translator::{Lookup, Translator};

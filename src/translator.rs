//! Key → phrase resolution.
//!
//! [`Translator`] is the entry point used by rendering code. A lookup resolves
//! the dictionary root for the request, finds the entry for the key through the
//! [`DictionaryCache`], and, when auto-creation is enabled, creates the entry
//! (and its folder chain) the first time a key is requested. Phrases with
//! placeholders are formatted outside editor contexts.
//!
//! Nothing on the `text*` surface fails: errors are logged with the key and
//! turn into an empty string.

use std::sync::{Arc, PoisonError};
use tracing::{error, info};

use crate::cache::DictionaryCache;
use crate::config::Config;
use crate::error::LocalizationError;
use crate::format::{format_positional, split_params};
use crate::language::Language;
use crate::logging::{extra_info, extra_warn, LOG_TARGET};
use crate::naming::item_name_for;
use crate::publish::Publisher;
use crate::site::{RequestContext, SiteResolver};
use crate::store::{ContentStore, EditScope, Field, InfraWrite, Item, StoreError, TemplateKind};

/// One phrase request.
#[derive(Debug, Clone)]
pub struct Lookup<'a> {
    key: &'a str,
    default_value: Option<&'a str>,
    language: Option<&'a Language>,
    params: Vec<String>,
}

impl<'a> Lookup<'a> {
    pub fn new(key: &'a str) -> Self {
        Self {
            key,
            default_value: None,
            language: None,
            params: Vec::new(),
        }
    }

    /// Phrase written to a newly created entry. Defaults to the key itself.
    pub fn default_value(mut self, default_value: &'a str) -> Self {
        self.default_value = Some(default_value);
        self
    }

    /// Resolve in `language` instead of the request's language.
    pub fn language(mut self, language: &'a Language) -> Self {
        self.language = Some(language);
        self
    }

    pub fn params<I, S>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.params = params.into_iter().map(|p| p.as_ref().to_string()).collect();
        self
    }

    pub fn key(&self) -> &str {
        self.key
    }
}

/// Split a key on its last `/` into folder path and leaf key.
fn split_key(key: &str) -> (&str, &str) {
    match key.rfind('/') {
        Some(index) => (&key[..index], &key[index + 1..]),
        None => ("", key),
    }
}

/// Resolves dictionary keys to phrases, creating missing entries on demand.
pub struct Translator {
    store: Arc<dyn ContentStore>,
    config: Arc<Config>,
    cache: Arc<DictionaryCache>,
    sites: SiteResolver,
    publisher: Publisher,
}

impl Translator {
    /// Create a translator with its own dictionary cache.
    pub fn new(store: Arc<dyn ContentStore>, config: Config) -> Self {
        let cache = Arc::new(DictionaryCache::new(
            store.clone(),
            config.max_cache_size,
            config.enable_extra_logging,
        ));
        Self::with_cache(store, config, cache)
    }

    /// Create a translator sharing an existing dictionary cache.
    pub fn with_cache(store: Arc<dyn ContentStore>, config: Config, cache: Arc<DictionaryCache>) -> Self {
        let config = Arc::new(config);
        let publisher = Publisher::new(store.clone(), &config);
        let sites = SiteResolver::new(store.clone(), config.clone());

        Self {
            store,
            config,
            cache,
            sites,
            publisher,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cache(&self) -> &Arc<DictionaryCache> {
        &self.cache
    }

    pub fn sites(&self) -> &SiteResolver {
        &self.sites
    }

    pub fn text(&self, ctx: &RequestContext, key: &str) -> String {
        self.resolve(ctx, &Lookup::new(key))
    }

    pub fn text_with_default(&self, ctx: &RequestContext, key: &str, default_value: &str) -> String {
        self.resolve(ctx, &Lookup::new(key).default_value(default_value))
    }

    /// Phrase for `key` with `params` substituted into its placeholders.
    pub fn text_f<P: AsRef<str>>(&self, ctx: &RequestContext, key: &str, params: &[P]) -> String {
        self.resolve(ctx, &Lookup::new(key).params(params))
    }

    pub fn text_df<P: AsRef<str>>(
        &self,
        ctx: &RequestContext,
        key: &str,
        default_value: &str,
        params: &[P],
    ) -> String {
        self.resolve(ctx, &Lookup::new(key).default_value(default_value).params(params))
    }

    /// Like [`Translator::text_df`] with the parameters joined by the configured
    /// delimiter (`|` by default).
    pub fn text_with_param_string(
        &self,
        ctx: &RequestContext,
        key: &str,
        default_value: &str,
        params: &str,
    ) -> String {
        let params = split_params(params, &self.config.format_params_delimiter);
        self.text_df(ctx, key, default_value, params.as_slice())
    }

    /// Resolve a lookup to its phrase. Never fails; errors yield `""`.
    pub fn resolve(&self, ctx: &RequestContext, lookup: &Lookup<'_>) -> String {
        if lookup.key.is_empty() {
            return String::new();
        }

        match self.try_resolve(ctx, lookup) {
            Ok(text) => text,
            Err(e) => {
                error!(target: LOG_TARGET, "Error resolving dictionary key '{}': {}", lookup.key, e);
                String::new()
            }
        }
    }

    fn try_resolve(&self, ctx: &RequestContext, lookup: &Lookup<'_>) -> Result<String, LocalizationError> {
        let language = lookup.language.unwrap_or(&ctx.language);
        let Some(item) = self.translation_item(ctx, lookup.key, lookup.default_value, language)? else {
            return Ok(String::new());
        };

        let phrase = item.field(Field::Phrase);
        if lookup.params.is_empty() || ctx.is_page_editor() {
            return Ok(phrase.to_string());
        }

        Ok(format_positional(phrase, lookup.params.as_slice())?)
    }

    /// The dictionary entry for `key`, read in `language`.
    ///
    /// An existing entry lacking a version in `language` gets one holding
    /// `default_value` (or the leaf key). With auto-creation enabled a missing
    /// entry is created the same way; otherwise it resolves to `None`.
    pub fn translation_item(
        &self,
        ctx: &RequestContext,
        key: &str,
        default_value: Option<&str>,
        language: &Language,
    ) -> Result<Option<Item>, LocalizationError> {
        if key.is_empty() {
            return Ok(None);
        }

        let (folder_path, leaf_key) = split_key(key);
        if leaf_key.is_empty() {
            extra_warn!(self.config.enable_extra_logging, "Dictionary key '{}' has no name after its last '/'", key);
            return Ok(None);
        }
        let default_value = default_value.filter(|v| !v.is_empty()).unwrap_or(leaf_key);

        let root = self.sites.dictionary_root(ctx)?;
        let existing = match self.cache.get(&root, leaf_key)? {
            Some(id) => self.store.item_by_id(id, Some(language))?,
            None => None,
        };

        match existing {
            Some(item) if item.has_versions() => Ok(Some(item)),
            Some(item) => self.backfill(&root, item, leaf_key, default_value, language),
            None if self.config.create_items_with_default_values => {
                self.create_entry(&root, leaf_key, default_value, language, folder_path)
            }
            None => Ok(None),
        }
    }

    /// Add a `language` version holding the default phrase to an entry that
    /// exists only in other languages.
    fn backfill(
        &self,
        root: &Item,
        entry: Item,
        key: &str,
        default_value: &str,
        language: &Language,
    ) -> Result<Option<Item>, LocalizationError> {
        let lock = self.cache.creation_lock(root.id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        // Another request may have added the version while this one waited
        if let Some(current) = self.store.item_by_id(entry.id, Some(language))? {
            if current.has_versions() {
                return Ok(Some(current));
            }
        }

        let grant = InfraWrite::acquire("dictionary version back-fill");
        self.store.add_version(entry.id, language, &grant)?;

        match self.write_entry_fields(&entry, key, default_value, language, &grant) {
            Ok(()) => info!(
                target: LOG_TARGET,
                "Added '{}' version with default value to dictionary entry '{}' ({})", language, key, entry.id
            ),
            Err(e) => error!(
                target: LOG_TARGET,
                "Error writing '{}' version of dictionary entry '{}' ({}): {}", language, key, entry.id, e
            ),
        }
        drop(grant);

        Ok(self.store.item_by_id(entry.id, Some(language))?)
    }

    fn create_entry(
        &self,
        root: &Item,
        key: &str,
        default_value: &str,
        language: &Language,
        folder_path: &str,
    ) -> Result<Option<Item>, LocalizationError> {
        let lock = self.cache.creation_lock(root.id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        // Another request may have created the entry while this one waited
        if let Some(id) = self.cache.peek(root, key) {
            if let Some(item) = self.store.item_by_id(id, Some(language))? {
                if item.has_versions() {
                    return Ok(Some(item));
                }
            }
        }

        let grant = InfraWrite::acquire("dictionary entry creation");
        let parent = self.ensure_folders(root, folder_path, language, &grant)?;

        let name = item_name_for(key);
        let path = format!("{}/{}", parent.path, name);
        extra_info!(
            self.config.enable_extra_logging,
            "Dictionary key '{}' is stored as item {}",
            key,
            path
        );

        // An item with the same name but another key is left alone; the new
        // entry becomes its sibling.
        let mut entry = match self.store.item_by_path(&path, Some(language))? {
            Some(item) if item.field(Field::Key).is_empty() || item.field(Field::Key) == key => item,
            _ => self
                .store
                .add_child(parent.id, &name, TemplateKind::DictionaryEntry, &grant)?,
        };
        if !entry.has_versions() {
            entry = self.store.add_version(entry.id, language, &grant)?;
        }

        match self.write_entry_fields(&entry, key, default_value, language, &grant) {
            Ok(()) => info!(
                target: LOG_TARGET,
                "Dictionary entry '{}' with ID {} created with default value.", key, entry.id
            ),
            Err(e) => error!(
                target: LOG_TARGET,
                "Error writing fields of dictionary entry '{}' ({}): {}", key, entry.id, e
            ),
        }
        drop(grant);

        self.cache.set(root, key, entry.id);
        self.publisher.publish(&entry, std::slice::from_ref(language), false);

        Ok(self.store.item_by_id(entry.id, Some(language))?)
    }

    /// Folder chain for `folder_path` under `root`, creating missing folders.
    fn ensure_folders(
        &self,
        root: &Item,
        folder_path: &str,
        language: &Language,
        grant: &InfraWrite,
    ) -> Result<Item, StoreError> {
        let mut current = root.clone();

        for segment in folder_path.split('/').filter(|s| !s.is_empty()) {
            let name = item_name_for(segment);
            let path = format!("{}/{}", current.path, name);

            current = match self.store.item_by_path(&path, None)? {
                Some(folder) => folder,
                None => {
                    let folder = self
                        .store
                        .add_child(current.id, &name, TemplateKind::DictionaryFolder, grant)?;
                    extra_info!(
                        self.config.enable_extra_logging,
                        "Created dictionary folder {}",
                        folder.path
                    );
                    self.publisher.publish(&folder, std::slice::from_ref(language), false);
                    folder
                }
            };
        }

        Ok(current)
    }

    fn write_entry_fields(
        &self,
        entry: &Item,
        key: &str,
        phrase: &str,
        language: &Language,
        grant: &InfraWrite,
    ) -> Result<(), StoreError> {
        let mut scope = EditScope::begin(self.store.as_ref(), entry.id, Some(language), grant)?;
        scope.set(Field::Key, key).set(Field::Phrase, phrase);
        scope.commit()
    }
}

//! Site (tenant) resolution and dictionary roots.
//!
//! Every request belongs to a site. Normally the caller knows which one; in
//! preview and editing modes the site has to be inferred from the item being
//! edited, by walking up to the closest configured site start item. Each site
//! may have its own dictionary folder, otherwise the shared global folder is
//! used.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::error::LocalizationError;
use crate::language::Language;
use crate::logging::{extra_info, LOG_TARGET};
use crate::publish::Publisher;
use crate::store::{
    ContentStore, EditScope, Field, InfraWrite, Item, ItemId, StoreError, TemplateKind,
};

/// Icon given to dictionary roots created by the resolver.
const DICTIONARY_ROOT_ICON: &str = "People/16x16/book_red.png";

/// A configured site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteDescriptor {
    pub name: String,
    pub root_path: String,
    pub start_item: String,
}

impl SiteDescriptor {
    pub fn new(name: impl Into<String>, root_path: impl Into<String>, start_item: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            root_path: root_path.into(),
            start_item: start_item.into(),
        }
    }

    /// Path of the site's start item: root path and start item joined, with
    /// doubled and trailing slashes removed.
    pub fn start_item_path(&self) -> String {
        let mut path = format!("{}/{}", self.root_path, self.start_item);
        while path.contains("//") {
            path = path.replace("//", "/");
        }
        path.trim_end_matches('/').to_string()
    }
}

/// How the current request is being rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageMode {
    #[default]
    Normal,
    Preview,
    Edit,
}

/// What the resolver knows about the current request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Site the request was routed to, when known
    pub site: Option<String>,
    pub language: Language,
    pub page_mode: PageMode,
    /// Raw id of the item open in preview or editing mode
    pub item_id: Option<String>,
}

impl RequestContext {
    pub fn new(language: Language) -> Self {
        Self {
            site: None,
            language,
            page_mode: PageMode::Normal,
            item_id: None,
        }
    }

    pub fn for_site(site: impl Into<String>, language: Language) -> Self {
        Self {
            site: Some(site.into()),
            ..Self::new(language)
        }
    }

    pub fn with_page_mode(mut self, page_mode: PageMode) -> Self {
        self.page_mode = page_mode;
        self
    }

    pub fn with_item_id(mut self, item_id: impl Into<String>) -> Self {
        self.item_id = Some(item_id.into());
        self
    }

    /// Preview and editing both count as editor contexts.
    pub fn is_page_editor(&self) -> bool {
        self.page_mode != PageMode::Normal
    }
}

/// Resolves the active site and its dictionary root.
pub struct SiteResolver {
    store: Arc<dyn ContentStore>,
    config: Arc<Config>,
    publisher: Publisher,
    /// Site start item id → site name, built on first use
    site_roots: OnceLock<HashMap<ItemId, String>>,
}

impl SiteResolver {
    pub fn new(store: Arc<dyn ContentStore>, config: Arc<Config>) -> Self {
        let publisher = Publisher::new(store.clone(), &config);
        Self {
            store,
            config,
            publisher,
            site_roots: OnceLock::new(),
        }
    }

    /// Configured sites keyed by the id of their start item.
    ///
    /// Built once per resolver. Ignored pseudo-sites and sites whose start item
    /// does not exist are left out; when two sites share a start item the first
    /// configured one wins.
    pub fn configured_sites(&self) -> &HashMap<ItemId, String> {
        self.site_roots.get_or_init(|| self.build_site_map())
    }

    fn build_site_map(&self) -> HashMap<ItemId, String> {
        let mut sites = HashMap::new();

        for site in &self.config.sites {
            if self.config.is_ignored_site(&site.name) {
                continue;
            }

            let path = site.start_item_path();
            match self.store.item_by_path(&path, None) {
                Ok(Some(item)) => {
                    sites.entry(item.id).or_insert_with(|| site.name.clone());
                }
                Ok(None) => extra_info!(
                    self.config.enable_extra_logging,
                    "Start item '{}' of site '{}' does not exist",
                    path,
                    site.name
                ),
                Err(e) => warn!(
                    target: LOG_TARGET,
                    "Could not read start item '{}' of site '{}': {}", path, site.name, e
                ),
            }
        }

        sites
    }

    /// Name of the site the request belongs to.
    pub fn site_name(&self, ctx: &RequestContext) -> Option<String> {
        if ctx.is_page_editor() {
            if let Some(item_id) = ctx.item_id.as_deref().and_then(|raw| Uuid::parse_str(raw.trim()).ok()) {
                return self.site_from_item(item_id, ctx);
            }
        }

        ctx.site.clone()
    }

    /// Site owning `item_id`: the item itself or its closest ancestor that is
    /// a configured start item. Falls back to the request's site.
    fn site_from_item(&self, item_id: ItemId, ctx: &RequestContext) -> Option<String> {
        let sites = self.configured_sites();

        let resolved = match self.owning_site(item_id, sites) {
            Ok(site) => site,
            Err(e) => {
                warn!(target: LOG_TARGET, "Could not resolve site from item {}: {}", item_id, e);
                None
            }
        };
        let site_name = resolved.or_else(|| ctx.site.clone());

        extra_info!(
            self.config.enable_extra_logging,
            "Site name was resolved as '{}'",
            site_name.as_deref().unwrap_or("")
        );

        site_name
    }

    fn owning_site(&self, item_id: ItemId, sites: &HashMap<ItemId, String>) -> Result<Option<String>, StoreError> {
        let Some(item) = self.store.item_by_id(item_id, None)? else {
            return Ok(None);
        };

        if let Some(name) = sites.get(&item.id) {
            return Ok(Some(name.clone()));
        }

        let ancestors = self.store.ancestors(item.id)?;
        Ok(ancestors
            .iter()
            .rev()
            .find_map(|ancestor| sites.get(&ancestor.id).cloned()))
    }

    /// Dictionary root for the request: the site's own folder when one is
    /// configured (created on demand), otherwise the global folder.
    pub fn dictionary_root(&self, ctx: &RequestContext) -> Result<Item, LocalizationError> {
        let site = self.site_name(ctx);

        if let Some(folder) = site.as_deref().and_then(|s| self.config.site_dictionary_folder(s)) {
            let existing = self.store.item_by_path(folder, None)?;
            match existing {
                Some(root) => return Ok(root),
                None => match self.create_dictionary_root(folder) {
                    Ok(root) => return Ok(root),
                    Err(e) => error!(
                        target: LOG_TARGET,
                        "Could not create dictionary root '{}' for site '{}', using the global dictionary: {}",
                        folder,
                        site.as_deref().unwrap_or(""),
                        e
                    ),
                },
            }
        }

        let global = &self.config.global_dictionary_folder;
        self.store
            .item_by_path(global, None)?
            .ok_or_else(|| LocalizationError::DictionaryRootNotFound(global.clone()))
    }

    fn create_dictionary_root(&self, path: &str) -> Result<Item, LocalizationError> {
        let grant = InfraWrite::acquire("dictionary root creation");
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        let (first, rest) = segments
            .split_first()
            .ok_or_else(|| LocalizationError::DictionaryRootNotFound(path.to_string()))?;
        let mut current = self
            .store
            .item_by_path(&format!("/{}", first), None)?
            .ok_or_else(|| LocalizationError::DictionaryRootNotFound(path.to_string()))?;

        for segment in rest {
            let target = format!("{}/{}", current.path, segment);
            current = match self.store.item_by_path(&target, None)? {
                Some(existing) => existing,
                None => {
                    let created =
                        self.store
                            .add_child(current.id, segment, TemplateKind::DictionaryRoot, &grant)?;
                    self.publisher.publish(&created, &[], true);
                    created
                }
            };
        }

        match self.apply_root_defaults(&current, &grant) {
            Ok(()) => info!(
                target: LOG_TARGET,
                "Dictionary root folder '{}' with ID {} has been created.", current.path, current.id
            ),
            Err(e) => error!(
                target: LOG_TARGET,
                "Error updating icon and insert options for item {}: {}", current.id, e
            ),
        }

        Ok(self.store.item_by_id(current.id, None)?.unwrap_or(current))
    }

    fn apply_root_defaults(&self, root: &Item, grant: &InfraWrite) -> Result<(), StoreError> {
        let mut scope = EditScope::begin(self.store.as_ref(), root.id, None, grant)?;
        if root.field(Field::Icon).is_empty() {
            scope.set(Field::Icon, DICTIONARY_ROOT_ICON);
        }
        scope.set(Field::InsertOptions, merge_insert_options(root.field(Field::InsertOptions)));
        scope.commit()
    }
}

/// Existing insert options (in their original order) followed by the
/// dictionary entry and folder templates, without duplicates. Unparseable ids
/// are dropped.
fn merge_insert_options(existing: &str) -> String {
    let required = [
        TemplateKind::DictionaryEntry.template_id(),
        TemplateKind::DictionaryFolder.template_id(),
    ];

    let mut merged: Vec<Uuid> = Vec::new();
    for id in existing
        .split('|')
        .filter_map(|raw| Uuid::parse_str(raw.trim()).ok())
    {
        if !required.contains(&id) && !merged.contains(&id) {
            merged.push(id);
        }
    }
    merged.extend(required);

    merged
        .iter()
        .map(Uuid::to_string)
        .collect::<Vec<_>>()
        .join("|")
}

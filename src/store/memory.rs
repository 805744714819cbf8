//! In-memory content store with JSON snapshot persistence.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, trace};
use uuid::Uuid;

use super::{ContentStore, Field, InfraWrite, Item, ItemId, StoreError, TemplateKind};
use crate::language::Language;
use crate::logging::LOG_TARGET;

/// Name of the item every path starts from.
const ROOT_NAME: &str = "sitecore";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredVersion {
    number: u32,
    created_at: DateTime<Utc>,
    #[serde(default)]
    fields: BTreeMap<Field, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredItem {
    id: ItemId,
    name: String,
    parent: Option<ItemId>,
    template: TemplateKind,
    #[serde(default)]
    shared: BTreeMap<Field, String>,
    #[serde(default)]
    versions: BTreeMap<Language, Vec<StoredVersion>>,
    #[serde(default)]
    children: Vec<ItemId>,
}

/// A publish request recorded by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishRecord {
    pub item: ItemId,
    pub path: String,
    pub languages: Vec<Language>,
    pub recursive: bool,
    pub requested_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    root: ItemId,
    languages: Vec<Language>,
    items: Vec<StoredItem>,
}

#[derive(Debug)]
struct State {
    root: ItemId,
    languages: Vec<Language>,
    items: HashMap<ItemId, StoredItem>,
    editing: HashSet<(ItemId, Option<Language>)>,
    published: Vec<PublishRecord>,
}

impl State {
    fn item(&self, id: ItemId) -> Result<&StoredItem, StoreError> {
        self.items.get(&id).ok_or(StoreError::ItemNotFound(id))
    }

    fn path_of(&self, id: ItemId) -> String {
        let mut names = Vec::new();
        let mut current = self.items.get(&id);
        while let Some(item) = current {
            names.push(item.name.as_str());
            current = item.parent.and_then(|parent| self.items.get(&parent));
        }
        names.reverse();
        format!("/{}", names.join("/"))
    }

    /// Resolve a path segment by segment. Paths are case-sensitive.
    fn find_by_path(&self, path: &str) -> Option<ItemId> {
        let mut segments = path.split('/').filter(|s| !s.is_empty());
        let root = self.items.get(&self.root)?;
        if segments.next()? != root.name {
            return None;
        }

        let mut current = root;
        for segment in segments {
            current = current
                .children
                .iter()
                .filter_map(|child| self.items.get(child))
                .find(|child| child.name == segment)?;
        }
        Some(current.id)
    }

    fn snapshot(&self, id: ItemId, language: Option<&Language>) -> Result<Item, StoreError> {
        let stored = self.item(id)?;
        let mut fields = stored.shared.clone();

        let version_count = match language {
            Some(language) => {
                let versions = stored.versions.get(language);
                if let Some(latest) = versions.and_then(|v| v.last()) {
                    fields.extend(latest.fields.iter().map(|(f, v)| (*f, v.clone())));
                }
                versions.map(Vec::len).unwrap_or(0)
            }
            None => stored.versions.values().map(Vec::len).sum(),
        };

        Ok(Item {
            id: stored.id,
            name: stored.name.clone(),
            path: self.path_of(id),
            template: stored.template,
            parent: stored.parent,
            language: language.cloned(),
            version_count,
            fields,
        })
    }

    fn insert_child(&mut self, parent: ItemId, name: &str, template: TemplateKind) -> Result<ItemId, StoreError> {
        if name.trim().is_empty() || name.contains('/') {
            return Err(StoreError::InvalidName(name.to_string()));
        }

        let id = Uuid::new_v4();
        self.items
            .get_mut(&parent)
            .ok_or(StoreError::ItemNotFound(parent))?
            .children
            .push(id);
        self.items.insert(
            id,
            StoredItem {
                id,
                name: name.to_string(),
                parent: Some(parent),
                template,
                shared: BTreeMap::new(),
                versions: BTreeMap::new(),
                children: Vec::new(),
            },
        );
        Ok(id)
    }

    /// Items in depth-first order from the root, so snapshots are stable.
    fn ordered_items(&self) -> Vec<StoredItem> {
        let mut ordered = Vec::with_capacity(self.items.len());
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            if let Some(item) = self.items.get(&id) {
                ordered.push(item.clone());
                stack.extend(item.children.iter().rev());
            }
        }
        ordered
    }
}

/// Thread-safe in-memory [`ContentStore`].
///
/// Every store starts with a `/sitecore` root item. Additional structure is
/// created with [`MemoryStore::create_path`] or through the trait methods.
/// Publish requests are recorded and can be inspected with
/// [`MemoryStore::published`].
#[derive(Debug)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    /// Create an empty store with English as its only language.
    pub fn new() -> Self {
        Self::with_languages(vec![Language::english()])
    }

    pub fn with_languages(languages: Vec<Language>) -> Self {
        let root = Uuid::new_v4();
        let mut items = HashMap::new();
        items.insert(
            root,
            StoredItem {
                id: root,
                name: ROOT_NAME.to_string(),
                parent: None,
                template: TemplateKind::Folder,
                shared: BTreeMap::new(),
                versions: BTreeMap::new(),
                children: Vec::new(),
            },
        );

        Self {
            state: Mutex::new(State {
                root,
                languages,
                items,
                editing: HashSet::new(),
                published: Vec::new(),
            }),
        }
    }

    fn state(&self) -> Result<MutexGuard<'_, State>, StoreError> {
        self.state.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Create every missing item along `path`. Intermediate items are plain
    /// folders; the last one gets `template`. Returns the existing item when
    /// the whole path is already there.
    pub fn create_path(&self, path: &str, template: TemplateKind) -> Result<Item, StoreError> {
        let mut state = self.state()?;
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        let root_name = state.item(state.root)?.name.clone();
        if segments.first() != Some(&root_name.as_str()) {
            return Err(StoreError::PathNotFound(path.to_string()));
        }

        let mut current = state.root;
        for (index, segment) in segments.iter().enumerate().skip(1) {
            let existing = state
                .item(current)?
                .children
                .iter()
                .copied()
                .find(|child| state.items.get(child).is_some_and(|c| c.name == *segment));

            current = match existing {
                Some(id) => id,
                None => {
                    let kind = if index == segments.len() - 1 {
                        template
                    } else {
                        TemplateKind::Folder
                    };
                    state.insert_child(current, segment, kind)?
                }
            };
        }

        state.snapshot(current, None)
    }

    pub fn add_language(&self, language: Language) -> Result<(), StoreError> {
        let mut state = self.state()?;
        if !state.languages.contains(&language) {
            state.languages.push(language);
        }
        Ok(())
    }

    /// Publish requests in the order they were made.
    pub fn published(&self) -> Vec<PublishRecord> {
        self.state
            .lock()
            .map(|state| state.published.clone())
            .unwrap_or_default()
    }

    pub fn is_editing(&self, id: ItemId, language: Option<&Language>) -> bool {
        self.state
            .lock()
            .map(|state| state.editing.contains(&(id, language.cloned())))
            .unwrap_or(false)
    }

    /// Number of items, including the root.
    pub fn item_count(&self) -> usize {
        self.state.lock().map(|state| state.items.len()).unwrap_or(0)
    }

    /// Ids of every item of the given template kind.
    pub fn items_of_kind(&self, template: TemplateKind) -> Vec<ItemId> {
        self.state
            .lock()
            .map(|state| {
                state
                    .ordered_items()
                    .into_iter()
                    .filter(|item| item.template == template)
                    .map(|item| item.id)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn to_json(&self) -> Result<String, StoreError> {
        let state = self.state()?;
        let snapshot = Snapshot {
            root: state.root,
            languages: state.languages.clone(),
            items: state.ordered_items(),
        };
        Ok(serde_json::to_string_pretty(&snapshot)?)
    }

    pub fn from_json(json: &str) -> Result<Self, StoreError> {
        let snapshot: Snapshot = serde_json::from_str(json)?;
        let items: HashMap<ItemId, StoredItem> =
            snapshot.items.into_iter().map(|item| (item.id, item)).collect();

        if !items.contains_key(&snapshot.root) {
            return Err(StoreError::ItemNotFound(snapshot.root));
        }

        Ok(Self {
            state: Mutex::new(State {
                root: snapshot.root,
                languages: snapshot.languages,
                items,
                editing: HashSet::new(),
                published: Vec::new(),
            }),
        })
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), StoreError> {
        std::fs::write(path.as_ref(), self.to_json()?)?;
        debug!(target: LOG_TARGET, "Content store snapshot written to {}", path.as_ref().display());
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let json = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&json)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentStore for MemoryStore {
    fn item_by_path(&self, path: &str, language: Option<&Language>) -> Result<Option<Item>, StoreError> {
        let state = self.state()?;
        state
            .find_by_path(path)
            .map(|id| state.snapshot(id, language))
            .transpose()
    }

    fn item_by_id(&self, id: ItemId, language: Option<&Language>) -> Result<Option<Item>, StoreError> {
        let state = self.state()?;
        if !state.items.contains_key(&id) {
            return Ok(None);
        }
        state.snapshot(id, language).map(Some)
    }

    fn children(&self, id: ItemId) -> Result<Vec<Item>, StoreError> {
        let state = self.state()?;
        state
            .item(id)?
            .children
            .iter()
            .map(|child| state.snapshot(*child, None))
            .collect()
    }

    fn ancestors(&self, id: ItemId) -> Result<Vec<Item>, StoreError> {
        let state = self.state()?;
        let mut ancestors = Vec::new();
        let mut parent = state.item(id)?.parent;
        while let Some(parent_id) = parent {
            ancestors.push(state.snapshot(parent_id, None)?);
            parent = state.item(parent_id)?.parent;
        }
        ancestors.reverse();
        Ok(ancestors)
    }

    fn add_child(
        &self,
        parent: ItemId,
        name: &str,
        template: TemplateKind,
        grant: &InfraWrite,
    ) -> Result<Item, StoreError> {
        let mut state = self.state()?;
        let id = state.insert_child(parent, name, template)?;
        trace!(target: LOG_TARGET, "Added item '{}' ({:?}) for {}", name, template, grant.purpose());
        state.snapshot(id, None)
    }

    fn add_version(&self, id: ItemId, language: &Language, _grant: &InfraWrite) -> Result<Item, StoreError> {
        let mut state = self.state()?;
        let item = state.items.get_mut(&id).ok_or(StoreError::ItemNotFound(id))?;
        let versions = item.versions.entry(language.clone()).or_default();

        let fields = versions.last().map(|v| v.fields.clone()).unwrap_or_default();
        let number = versions.last().map(|v| v.number + 1).unwrap_or(1);
        versions.push(StoredVersion {
            number,
            created_at: Utc::now(),
            fields,
        });

        state.snapshot(id, Some(language))
    }

    fn begin_edit(&self, id: ItemId, language: Option<&Language>, _grant: &InfraWrite) -> Result<(), StoreError> {
        let mut state = self.state()?;
        state.item(id)?;
        if !state.editing.insert((id, language.cloned())) {
            return Err(StoreError::EditInProgress(id));
        }
        Ok(())
    }

    fn commit_edit(
        &self,
        id: ItemId,
        language: Option<&Language>,
        changes: &[(Field, String)],
        _grant: &InfraWrite,
    ) -> Result<(), StoreError> {
        let mut state = self.state()?;
        let edit = (id, language.cloned());
        if !state.editing.contains(&edit) {
            return Err(StoreError::NotEditing(id));
        }

        let item = state.items.get_mut(&id).ok_or(StoreError::ItemNotFound(id))?;

        // Validate everything first so a failing commit changes nothing
        for (field, _) in changes.iter().filter(|(f, _)| !f.is_shared()) {
            let language = language.ok_or(StoreError::LanguageRequired { field: field.name() })?;
            if item.versions.get(language).map_or(true, Vec::is_empty) {
                return Err(StoreError::NoVersion {
                    item: id,
                    language: language.code().to_string(),
                });
            }
        }

        for (field, value) in changes {
            if field.is_shared() {
                item.shared.insert(*field, value.clone());
            } else if let Some(version) = language
                .and_then(|language| item.versions.get_mut(language))
                .and_then(|versions| versions.last_mut())
            {
                version.fields.insert(*field, value.clone());
            }
        }

        state.editing.remove(&edit);
        Ok(())
    }

    fn cancel_edit(&self, id: ItemId, language: Option<&Language>) {
        if let Ok(mut state) = self.state.lock() {
            state.editing.remove(&(id, language.cloned()));
        }
    }

    fn publish(&self, id: ItemId, languages: &[Language], recursive: bool) -> Result<(), StoreError> {
        let mut state = self.state()?;
        state.item(id)?;
        let path = state.path_of(id);
        let languages = if languages.is_empty() {
            state.languages.clone()
        } else {
            languages.to_vec()
        };

        state.published.push(PublishRecord {
            item: id,
            path,
            languages,
            recursive,
            requested_at: Utc::now(),
        });
        Ok(())
    }

    fn languages(&self) -> Result<Vec<Language>, StoreError> {
        Ok(self.state()?.languages.clone())
    }
}

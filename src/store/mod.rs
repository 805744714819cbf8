//! Content store interface.
//!
//! The dictionary lives in a hierarchical, versioned, language-aware item
//! repository that this crate does not own. [`ContentStore`] is the narrow
//! slice of that repository the resolver needs; [`MemoryStore`] is an in-memory
//! implementation used by the binary and the tests.
//!
//! # Mutations
//!
//! Every mutating call takes an [`InfraWrite`] capability. Dictionary roots,
//! folders and entries are infrastructure created on behalf of the system, not
//! by the requesting user, so callers acquire the capability for the smallest
//! span that performs those writes and let it drop afterwards.
//!
//! Field writes go through an [`EditScope`], which commits explicitly and
//! cancels the edit on every other exit path.

mod edit;
mod memory;

pub use edit::EditScope;
pub use memory::{MemoryStore, PublishRecord};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::trace;
use uuid::Uuid;

use crate::language::Language;
use crate::logging::LOG_TARGET;

/// Identity of an item in the content store.
pub type ItemId = Uuid;

/// Template kind of an item. Only the dictionary kinds carry meaning for the
/// resolver; everything else is plain structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TemplateKind {
    DictionaryRoot,
    DictionaryFolder,
    DictionaryEntry,
    Folder,
    Content,
}

impl TemplateKind {
    /// Stable template identity, used when listing allowed child templates
    /// (insert options) on a dictionary root.
    pub fn template_id(&self) -> ItemId {
        match self {
            TemplateKind::DictionaryFolder => Uuid::from_u128(0x267d9ac7_5d85_4e9d_af89_99ab296cc218),
            TemplateKind::DictionaryEntry => Uuid::from_u128(0x6d1cd897_1936_4a3a_a511_289a94c2a7b1),
            TemplateKind::DictionaryRoot => Uuid::from_u128(0x239f9cf4_e5a0_44e0_b342_0f32cd4c6d8b),
            TemplateKind::Folder => Uuid::from_u128(0xa87a00b1_e6db_45ab_8b54_636fec3b5523),
            TemplateKind::Content => Uuid::from_u128(0x76036f5e_cbce_46d1_af0a_4143f9b557aa),
        }
    }
}

/// Fields the resolver reads or writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Field {
    /// Lookup key of a dictionary entry (unsanitized)
    Key,
    /// Localized text of a dictionary entry
    Phrase,
    /// Icon shown for the item in editing tools
    Icon,
    /// `|`-separated template ids allowed as children
    InsertOptions,
}

impl Field {
    /// Shared fields have one value for all languages; the others are stored
    /// on language versions.
    pub fn is_shared(&self) -> bool {
        !matches!(self, Field::Phrase)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Field::Key => "Key",
            Field::Phrase => "Phrase",
            Field::Icon => "__Icon",
            Field::InsertOptions => "__Masters",
        }
    }
}

/// Snapshot of an item as seen in one language.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    /// Full `/`-separated path from the store root
    pub path: String,
    pub template: TemplateKind,
    pub parent: Option<ItemId>,
    /// Language the snapshot was read in (`None` = language-neutral read)
    pub language: Option<Language>,
    /// Versions in `language`, or across all languages for neutral reads
    pub version_count: usize,
    /// Shared fields plus the latest version's fields in `language`
    pub fields: BTreeMap<Field, String>,
}

impl Item {
    /// Value of a field, empty when unset.
    pub fn field(&self, field: Field) -> &str {
        self.fields.get(&field).map(String::as_str).unwrap_or("")
    }

    pub fn has_versions(&self) -> bool {
        self.version_count > 0
    }
}

/// Capability to perform infrastructure writes.
///
/// Holding one means the caller is creating dictionary structure on behalf of
/// the system rather than on behalf of the requesting user. It cannot be
/// cloned; acquire a fresh one for each block of writes.
#[derive(Debug)]
pub struct InfraWrite {
    purpose: &'static str,
}

impl InfraWrite {
    pub fn acquire(purpose: &'static str) -> Self {
        trace!(target: LOG_TARGET, "Infrastructure write scope opened: {}", purpose);
        Self { purpose }
    }

    pub fn purpose(&self) -> &'static str {
        self.purpose
    }
}

impl Drop for InfraWrite {
    fn drop(&mut self) {
        trace!(target: LOG_TARGET, "Infrastructure write scope released: {}", self.purpose);
    }
}

/// Errors reported by a content store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("item {0} not found")]
    ItemNotFound(ItemId),

    #[error("path '{0}' not found")]
    PathNotFound(String),

    #[error("invalid item name '{0}'")]
    InvalidName(String),

    #[error("item {item} has no version in language '{language}'")]
    NoVersion { item: ItemId, language: String },

    #[error("field {field} is versioned and needs a language")]
    LanguageRequired { field: &'static str },

    #[error("item {0} is already being edited")]
    EditInProgress(ItemId),

    #[error("item {0} is not being edited")]
    NotEditing(ItemId),

    #[error("content store lock poisoned")]
    Poisoned,

    #[error("snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot is not valid JSON: {0}")]
    Snapshot(#[from] serde_json::Error),

    #[error("{0}")]
    Backend(String),
}

/// The slice of a hierarchical content store the dictionary resolver uses.
///
/// Implementations must be safe to share between request threads. Reads never
/// need a capability; every mutation takes an [`InfraWrite`].
pub trait ContentStore: Send + Sync {
    /// Look up an item by full path. `language` selects the version whose
    /// fields are returned.
    fn item_by_path(&self, path: &str, language: Option<&Language>)
        -> Result<Option<Item>, StoreError>;

    /// Look up an item by id.
    fn item_by_id(&self, id: ItemId, language: Option<&Language>)
        -> Result<Option<Item>, StoreError>;

    /// Direct children in store order, read language-neutral.
    fn children(&self, id: ItemId) -> Result<Vec<Item>, StoreError>;

    /// Ancestors from the store root down to the item's parent.
    fn ancestors(&self, id: ItemId) -> Result<Vec<Item>, StoreError>;

    /// Create a child item without any versions.
    fn add_child(
        &self,
        parent: ItemId,
        name: &str,
        template: TemplateKind,
        grant: &InfraWrite,
    ) -> Result<Item, StoreError>;

    /// Add a version in `language`, returning the item read in that language.
    fn add_version(
        &self,
        id: ItemId,
        language: &Language,
        grant: &InfraWrite,
    ) -> Result<Item, StoreError>;

    /// Open an edit on the item (and language version, when given).
    fn begin_edit(
        &self,
        id: ItemId,
        language: Option<&Language>,
        grant: &InfraWrite,
    ) -> Result<(), StoreError>;

    /// Apply field changes atomically and close the edit.
    fn commit_edit(
        &self,
        id: ItemId,
        language: Option<&Language>,
        changes: &[(Field, String)],
        grant: &InfraWrite,
    ) -> Result<(), StoreError>;

    /// Discard an open edit. Cancelling an edit that is not open is a no-op.
    fn cancel_edit(&self, id: ItemId, language: Option<&Language>);

    /// Request publication of the item. An empty language list means all
    /// languages.
    fn publish(&self, id: ItemId, languages: &[Language], recursive: bool)
        -> Result<(), StoreError>;

    /// Languages defined in the store.
    fn languages(&self) -> Result<Vec<Language>, StoreError>;
}

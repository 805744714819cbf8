//! Integration tests for the site dictionary
//!
//! These tests drive the public `Translator` surface against an in-memory
//! content store and check what ends up in the store, the cache and the
//! publish log.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use tempfile::TempDir;

use site_dictionary::store::{
    EditScope, Field, InfraWrite, Item, ItemId, StoreError, TemplateKind,
};
use site_dictionary::{
    Config, ContentStore, DictionaryCache, Language, MemoryStore, PageMode, RequestContext,
    SiteDescriptor, Translator,
};

const GLOBAL_ROOT: &str = "/sitecore/system/Dictionary";
const SITE_ROOT: &str = "/sitecore/content/website/Dictionary";

// ==================== Test Helpers ====================

fn english() -> Language {
    Language::english()
}

fn danish() -> Language {
    Language::new("da").expect("valid language")
}

/// Store with the global dictionary root and a small site tree
fn create_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::with_languages(vec![english(), danish()]));
    store
        .create_path(GLOBAL_ROOT, TemplateKind::DictionaryRoot)
        .expect("Failed to create global root");
    store
        .create_path("/sitecore/content/website/news/article", TemplateKind::Content)
        .expect("Failed to create site content");
    store
}

fn site_config() -> Config {
    let mut folders = HashMap::new();
    folders.insert("website".to_string(), SITE_ROOT.to_string());

    Config {
        sites: vec![SiteDescriptor::new("website", "/sitecore/content", "/website")],
        site_dictionary_folders: folders,
        ..Config::default()
    }
}

fn ctx() -> RequestContext {
    RequestContext::for_site("website", english())
}

fn entries(store: &MemoryStore) -> Vec<ItemId> {
    store.items_of_kind(TemplateKind::DictionaryEntry)
}

/// Add an entry by hand, the way an editor would
fn add_entry(store: &MemoryStore, parent: &Item, name: &str, key: &str, phrase: &str) -> Item {
    let grant = InfraWrite::acquire("test");
    let entry = store
        .add_child(parent.id, name, TemplateKind::DictionaryEntry, &grant)
        .unwrap();
    store.add_version(entry.id, &english(), &grant).unwrap();
    let mut scope = EditScope::begin(store, entry.id, Some(&english()), &grant).unwrap();
    scope.set(Field::Key, key).set(Field::Phrase, phrase);
    scope.commit().unwrap();
    entry
}

/// Store whose commits can be made to fail
struct FailingStore {
    inner: MemoryStore,
    fail_commits: AtomicBool,
}

impl FailingStore {
    fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            fail_commits: AtomicBool::new(true),
        }
    }
}

impl ContentStore for FailingStore {
    fn item_by_path(&self, path: &str, language: Option<&Language>) -> Result<Option<Item>, StoreError> {
        self.inner.item_by_path(path, language)
    }

    fn item_by_id(&self, id: ItemId, language: Option<&Language>) -> Result<Option<Item>, StoreError> {
        self.inner.item_by_id(id, language)
    }

    fn children(&self, id: ItemId) -> Result<Vec<Item>, StoreError> {
        self.inner.children(id)
    }

    fn ancestors(&self, id: ItemId) -> Result<Vec<Item>, StoreError> {
        self.inner.ancestors(id)
    }

    fn add_child(
        &self,
        parent: ItemId,
        name: &str,
        template: TemplateKind,
        grant: &InfraWrite,
    ) -> Result<Item, StoreError> {
        self.inner.add_child(parent, name, template, grant)
    }

    fn add_version(&self, id: ItemId, language: &Language, grant: &InfraWrite) -> Result<Item, StoreError> {
        self.inner.add_version(id, language, grant)
    }

    fn begin_edit(&self, id: ItemId, language: Option<&Language>, grant: &InfraWrite) -> Result<(), StoreError> {
        self.inner.begin_edit(id, language, grant)
    }

    fn commit_edit(
        &self,
        id: ItemId,
        language: Option<&Language>,
        changes: &[(Field, String)],
        grant: &InfraWrite,
    ) -> Result<(), StoreError> {
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("write rejected".to_string()));
        }
        self.inner.commit_edit(id, language, changes, grant)
    }

    fn cancel_edit(&self, id: ItemId, language: Option<&Language>) {
        self.inner.cancel_edit(id, language)
    }

    fn publish(&self, id: ItemId, languages: &[Language], recursive: bool) -> Result<(), StoreError> {
        self.inner.publish(id, languages, recursive)
    }

    fn languages(&self) -> Result<Vec<Language>, StoreError> {
        self.inner.languages()
    }
}

// ==================== Auto-Creation Tests ====================

#[test]
fn test_resolve_is_idempotent() {
    let store = create_store();
    let translator = Translator::new(store.clone(), Config::default());

    let first = translator.text_with_default(&ctx(), "welcome", "Welcome!");
    let second = translator.text_with_default(&ctx(), "welcome", "Welcome!");

    assert_eq!(first, "Welcome!");
    assert_eq!(second, first);
    assert_eq!(entries(&store).len(), 1);
}

#[test]
fn test_nested_key_creates_folders_once() {
    let store = create_store();
    let translator = Translator::new(store.clone(), Config::default());
    let key = "Forms/Contact Us/submit";

    assert_eq!(translator.text_with_default(&ctx(), key, "Send"), "Send");
    assert_eq!(translator.text_with_default(&ctx(), key, "Send"), "Send");

    let forms = store.item_by_path(&format!("{}/Forms", GLOBAL_ROOT), None).unwrap().unwrap();
    let contact = store
        .item_by_path(&format!("{}/Forms/Contact-Us", GLOBAL_ROOT), None)
        .unwrap()
        .unwrap();
    let entry = store
        .item_by_path(&format!("{}/Forms/Contact-Us/submit", GLOBAL_ROOT), Some(&english()))
        .unwrap()
        .unwrap();

    assert_eq!(forms.template, TemplateKind::DictionaryFolder);
    assert_eq!(contact.template, TemplateKind::DictionaryFolder);
    assert_eq!(store.items_of_kind(TemplateKind::DictionaryFolder).len(), 2);
    assert_eq!(entry.field(Field::Key), "submit");
    assert_eq!(entry.field(Field::Phrase), "Send");

    // Both folders and the entry were published once, in the request language
    let published = store.published();
    let paths: Vec<_> = published.iter().map(|p| p.path.as_str()).collect();
    assert_eq!(paths, vec![forms.path.as_str(), contact.path.as_str(), entry.path.as_str()]);
    assert!(published.iter().all(|p| p.languages == vec![english()] && !p.recursive));
}

#[test]
fn test_symbol_only_key_gets_fallback_name() {
    let store = create_store();
    let translator = Translator::new(store.clone(), Config::default());

    assert_eq!(translator.text_with_default(&ctx(), "???", "Question"), "Question");
    assert_eq!(translator.text(&ctx(), "???"), "Question");

    let ids = entries(&store);
    assert_eq!(ids.len(), 1);
    let entry = store.item_by_id(ids[0], None).unwrap().unwrap();
    assert!(entry.name.starts_with("DictionaryEntry_"));
    assert_eq!(entry.field(Field::Key), "???");
}

#[test]
fn test_auto_create_disabled() {
    let store = create_store();
    let config = Config {
        create_items_with_default_values: false,
        ..Config::default()
    };
    let translator = Translator::new(store.clone(), config);
    let root = store.item_by_path(GLOBAL_ROOT, None).unwrap().unwrap();
    add_entry(&store, &root, "existing", "existing", "Already here");

    assert_eq!(translator.text_with_default(&ctx(), "missing", "Default"), "");
    assert_eq!(translator.text(&ctx(), "existing"), "Already here");

    // Existing entries still get the missing language
    let danish_ctx = RequestContext::for_site("website", danish());
    assert_eq!(translator.text_with_default(&danish_ctx, "existing", "Allerede her"), "Allerede her");
    assert_eq!(translator.text_with_default(&danish_ctx, "missing", "Mangler"), "");

    let path = format!("{}/existing", GLOBAL_ROOT);
    let da = store.item_by_path(&path, Some(&danish())).unwrap().unwrap();
    assert_eq!(da.version_count, 1);
    assert_eq!(da.field(Field::Key), "existing");
    assert_eq!(entries(&store).len(), 1);
    assert!(store.published().is_empty());
}

#[test]
fn test_auto_publish_disabled() {
    let store = create_store();
    let config = Config {
        auto_publish_created_items: false,
        ..Config::default()
    };
    let translator = Translator::new(store.clone(), config);

    assert_eq!(translator.text(&ctx(), "Forms/title"), "title");

    assert_eq!(entries(&store).len(), 1);
    assert!(store.published().is_empty());
}

#[test]
fn test_concurrent_first_lookups_create_one_entry() {
    let store = create_store();
    let translator = Arc::new(Translator::new(store.clone(), Config::default()));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let translator = Arc::clone(&translator);
            thread::spawn(move || translator.text_with_default(&ctx(), "Shared/greeting", "Hi"))
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), "Hi");
    }

    assert_eq!(entries(&store).len(), 1);
    assert_eq!(store.items_of_kind(TemplateKind::DictionaryFolder).len(), 1);
}

#[test]
fn test_translators_sharing_a_cache_create_one_entry() {
    let store = create_store();
    let cache = Arc::new(DictionaryCache::new(store.clone(), 1024 * 1024, false));
    let translators: Vec<_> = (0..2)
        .map(|_| Arc::new(Translator::with_cache(store.clone(), Config::default(), cache.clone())))
        .collect();
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let translator = Arc::clone(&translators[i % 2]);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                translator.text_with_default(&ctx(), "Shared/farewell", "Bye")
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), "Bye");
    }

    assert_eq!(entries(&store).len(), 1);
    assert_eq!(store.items_of_kind(TemplateKind::DictionaryFolder).len(), 1);
}

// ==================== Back-Fill Tests ====================

#[test]
fn test_missing_language_is_back_filled() {
    let store = create_store();
    let translator = Translator::new(store.clone(), Config::default());

    assert_eq!(translator.text_with_default(&ctx(), "close", "Close"), "Close");

    let danish_ctx = RequestContext::for_site("website", danish());
    assert_eq!(translator.text_with_default(&danish_ctx, "close", "Luk"), "Luk");
    assert_eq!(translator.text_with_default(&danish_ctx, "close", "ignored"), "Luk");

    let path = format!("{}/close", GLOBAL_ROOT);
    let en = store.item_by_path(&path, Some(&english())).unwrap().unwrap();
    let da = store.item_by_path(&path, Some(&danish())).unwrap().unwrap();
    assert_eq!(en.field(Field::Phrase), "Close");
    assert_eq!(en.version_count, 1);
    assert_eq!(da.field(Field::Phrase), "Luk");
    assert_eq!(da.version_count, 1);
    assert_eq!(entries(&store).len(), 1);
}

// ==================== Formatting Tests ====================

#[test]
fn test_formatting_outside_preview() {
    let store = create_store();
    let translator = Translator::new(store, Config::default());

    assert_eq!(translator.text_df(&ctx(), "greet", "Hello {0}", &["Ann"]), "Hello Ann");
    assert_eq!(translator.text_f(&ctx(), "greet", &["Bo"]), "Hello Bo");
    assert_eq!(translator.text_with_param_string(&ctx(), "greet", "", "Cy|"), "Hello Cy");
}

#[test]
fn test_preview_returns_raw_template() {
    let store = create_store();
    let translator = Translator::new(store, Config::default());

    let preview = ctx().with_page_mode(PageMode::Preview);
    let edit = ctx().with_page_mode(PageMode::Edit);

    assert_eq!(translator.text_df(&preview, "greet", "Hello {0}", &["Ann"]), "Hello {0}");
    assert_eq!(translator.text_df(&edit, "greet", "Hello {0}", &["Ann"]), "Hello {0}");
    assert_eq!(translator.text_df(&ctx(), "greet", "Hello {0}", &["Ann"]), "Hello Ann");
}

#[test]
fn test_oversized_alignment_degrades_to_empty() {
    let store = create_store();
    let translator = Translator::new(store.clone(), Config::default());

    assert_eq!(translator.text_df(&ctx(), "wide", "{0,70000}", &["a"]), "");

    // The entry is still created and editors see the raw template
    let preview = ctx().with_page_mode(PageMode::Preview);
    assert_eq!(translator.text_df(&preview, "wide", "{0,70000}", &["a"]), "{0,70000}");
    assert_eq!(entries(&store).len(), 1);
}

// ==================== Cache Tests ====================

#[test]
fn test_duplicate_keys_resolve_to_last_entry() {
    let store = create_store();
    let root = store.item_by_path(GLOBAL_ROOT, None).unwrap().unwrap();
    add_entry(&store, &root, "title-old", "title", "Old title");
    add_entry(&store, &root, "title-new", "title", "New title");
    let translator = Translator::new(store.clone(), Config::default());

    assert_eq!(translator.text(&ctx(), "title"), "New title");
    assert_eq!(translator.cache().report().duplicate_keys, 1);
    assert_eq!(entries(&store).len(), 2);
}

#[test]
fn test_clearing_cache_forces_one_reload() {
    let store = create_store();
    let translator = Translator::new(store.clone(), Config::default());
    translator.text_with_default(&ctx(), "title", "Title");
    let reloads = translator.cache().metrics().reloads();

    translator.cache().clear();

    assert_eq!(translator.text(&ctx(), "title"), "Title");
    assert_eq!(translator.cache().metrics().reloads(), reloads + 1);
    assert_eq!(entries(&store).len(), 1);
}

#[test]
fn test_reload_finds_every_entry() {
    let store = create_store();
    let translator = Translator::new(store.clone(), Config::default());
    for key in ["a", "Forms/b", "Forms/Nested/c"] {
        translator.text(&ctx(), key);
    }
    let cache = DictionaryCache::new(store.clone(), 1024 * 1024, false);
    let root = store.item_by_path(GLOBAL_ROOT, None).unwrap().unwrap();

    let summary = cache.reload_all(&root).unwrap();

    assert_eq!(summary.entries, 3);
    for key in ["a", "b", "c"] {
        assert!(cache.get(&root, key).unwrap().is_some(), "missing {}", key);
    }
}

#[test]
fn test_small_cache_still_resolves() {
    let store = create_store();
    let config = Config {
        max_cache_size: 200,
        ..Config::default()
    };
    let translator = Translator::new(store.clone(), config);
    let keys: Vec<String> = (0..10).map(|i| format!("key{}", i)).collect();

    for key in &keys {
        assert_eq!(translator.text(&ctx(), key), *key);
    }
    for key in &keys {
        assert_eq!(translator.text(&ctx(), key), *key);
    }

    assert!(translator.cache().len() <= 2);
    assert_eq!(entries(&store).len(), keys.len());
}

#[test]
fn test_shared_cache_between_translators() {
    let store = create_store();
    let cache = Arc::new(DictionaryCache::new(store.clone(), 1024 * 1024, false));
    let first = Translator::with_cache(store.clone(), Config::default(), cache.clone());
    let second = Translator::with_cache(store.clone(), Config::default(), cache.clone());

    first.text_with_default(&ctx(), "title", "Title");
    let reloads = cache.metrics().reloads();

    assert_eq!(second.text(&ctx(), "title"), "Title");
    assert_eq!(cache.metrics().reloads(), reloads);
}

// ==================== Failure Tests ====================

#[test]
fn test_failed_write_returns_empty_and_closes_edit() {
    let inner = MemoryStore::new();
    inner.create_path(GLOBAL_ROOT, TemplateKind::DictionaryRoot).unwrap();
    let store = Arc::new(FailingStore::new(inner));
    let translator = Translator::new(store.clone(), Config::default());

    assert_eq!(translator.text_with_default(&ctx(), "title", "Title"), "");

    let ids = store.inner.items_of_kind(TemplateKind::DictionaryEntry);
    assert_eq!(ids.len(), 1);
    let entry = store.inner.item_by_id(ids[0], Some(&english())).unwrap().unwrap();
    assert_eq!(entry.field(Field::Key), "");
    assert_eq!(entry.field(Field::Phrase), "");
    assert!(!store.inner.is_editing(ids[0], Some(&english())));

    // The empty entry is cached and reused rather than created again
    store.fail_commits.store(false, Ordering::SeqCst);
    assert_eq!(translator.text_with_default(&ctx(), "title", "Title"), "");
    assert_eq!(store.inner.items_of_kind(TemplateKind::DictionaryEntry).len(), 1);
}

#[test]
fn test_missing_global_root_returns_empty() {
    let store = Arc::new(MemoryStore::new());
    let translator = Translator::new(store.clone(), Config::default());

    assert_eq!(translator.text(&ctx(), "title"), "");
    assert_eq!(store.item_count(), 1);
}

// ==================== Site Tests ====================

#[test]
fn test_site_root_is_created_on_demand() {
    let store = create_store();
    let translator = Translator::new(store.clone(), site_config());

    assert_eq!(translator.text_with_default(&ctx(), "title", "Title"), "Title");

    let root = store.item_by_path(SITE_ROOT, None).unwrap().unwrap();
    assert_eq!(root.template, TemplateKind::DictionaryRoot);
    assert_eq!(root.field(Field::Icon), "People/16x16/book_red.png");
    let insert_options = root.field(Field::InsertOptions);
    assert!(insert_options.contains(&TemplateKind::DictionaryEntry.template_id().to_string()));
    assert!(insert_options.contains(&TemplateKind::DictionaryFolder.template_id().to_string()));

    let entry = store
        .item_by_path(&format!("{}/title", SITE_ROOT), Some(&english()))
        .unwrap()
        .unwrap();
    assert_eq!(entry.field(Field::Phrase), "Title");
    assert!(store
        .item_by_path(&format!("{}/title", GLOBAL_ROOT), None)
        .unwrap()
        .is_none());

    let root_publish = store.published().into_iter().find(|p| p.item == root.id).unwrap();
    assert!(root_publish.recursive);
    assert_eq!(root_publish.languages, vec![english(), danish()]);
}

#[test]
fn test_sites_have_separate_dictionaries() {
    let store = create_store();
    let translator = Translator::new(store.clone(), site_config());
    let other_site = RequestContext::for_site("intranet", english());

    assert_eq!(translator.text_with_default(&ctx(), "title", "Website"), "Website");
    assert_eq!(translator.text_with_default(&other_site, "title", "Intranet"), "Intranet");
    assert_eq!(translator.text(&ctx(), "title"), "Website");

    assert_eq!(entries(&store).len(), 2);
}

#[test]
fn test_preview_infers_site_from_item() {
    let store = create_store();
    let translator = Translator::new(store.clone(), site_config());
    let article = store
        .item_by_path("/sitecore/content/website/news/article", None)
        .unwrap()
        .unwrap();

    let preview = RequestContext::for_site("shell", english())
        .with_page_mode(PageMode::Preview)
        .with_item_id(article.id.to_string());

    assert_eq!(translator.text_df(&preview, "greet", "Hi {0}", &["Ann"]), "Hi {0}");
    assert!(store
        .item_by_path(&format!("{}/greet", SITE_ROOT), None)
        .unwrap()
        .is_some());
}

// ==================== Persistence Tests ====================

#[test]
fn test_entries_survive_snapshot() {
    let temp_dir = TempDir::new().unwrap();
    let file = temp_dir.path().join("dictionary.json");

    let store = create_store();
    let translator = Translator::new(store.clone(), Config::default());
    translator.text_with_default(&ctx(), "Forms/submit", "Send");
    store.save(&file).unwrap();

    let restored = Arc::new(MemoryStore::load(&file).unwrap());
    let translator = Translator::new(restored.clone(), Config::default());

    assert_eq!(translator.text_with_default(&ctx(), "Forms/submit", "Other"), "Send");
    assert_eq!(restored.items_of_kind(TemplateKind::DictionaryEntry).len(), 1);
    assert!(restored.published().is_empty());
}

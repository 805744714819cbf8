use tracing::debug;

use super::{ContentStore, Field, InfraWrite, ItemId, StoreError};
use crate::language::Language;
use crate::logging::LOG_TARGET;

/// An open edit on one item (and language version).
///
/// Field values are buffered until [`EditScope::commit`]. A scope that is
/// dropped without being committed, or whose commit fails, cancels the edit in
/// the store, so the item is never left in an open-edit state.
pub struct EditScope<'a> {
    store: &'a dyn ContentStore,
    grant: &'a InfraWrite,
    item: ItemId,
    language: Option<Language>,
    changes: Vec<(Field, String)>,
    finished: bool,
}

impl<'a> EditScope<'a> {
    pub fn begin(
        store: &'a dyn ContentStore,
        item: ItemId,
        language: Option<&Language>,
        grant: &'a InfraWrite,
    ) -> Result<Self, StoreError> {
        store.begin_edit(item, language, grant)?;

        Ok(Self {
            store,
            grant,
            item,
            language: language.cloned(),
            changes: Vec::new(),
            finished: false,
        })
    }

    /// Stage a field value. Later values for the same field win.
    pub fn set(&mut self, field: Field, value: impl Into<String>) -> &mut Self {
        let value = value.into();
        match self.changes.iter_mut().find(|(f, _)| *f == field) {
            Some(existing) => existing.1 = value,
            None => self.changes.push((field, value)),
        }
        self
    }

    pub fn commit(mut self) -> Result<(), StoreError> {
        self.finished = true;

        let result = self.store.commit_edit(
            self.item,
            self.language.as_ref(),
            &self.changes,
            self.grant,
        );

        if result.is_err() {
            self.store.cancel_edit(self.item, self.language.as_ref());
        }

        result
    }

    pub fn cancel(mut self) {
        self.finished = true;
        self.store.cancel_edit(self.item, self.language.as_ref());
    }
}

impl Drop for EditScope<'_> {
    fn drop(&mut self) {
        if !self.finished {
            debug!(target: LOG_TARGET, "Rolling back unfinished edit of item {}", self.item);
            self.store.cancel_edit(self.item, self.language.as_ref());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, TemplateKind};

    fn store_with_entry() -> (MemoryStore, ItemId, Language) {
        let store = MemoryStore::new();
        let language = Language::english();
        let grant = InfraWrite::acquire("test setup");
        let folder = store
            .create_path("/sitecore/system/Dictionary", TemplateKind::DictionaryRoot)
            .unwrap();
        let entry = store
            .add_child(folder.id, "hello", TemplateKind::DictionaryEntry, &grant)
            .unwrap();
        store.add_version(entry.id, &language, &grant).unwrap();
        (store, entry.id, language)
    }

    #[test]
    fn test_commit_applies_fields() {
        let (store, id, language) = store_with_entry();
        let grant = InfraWrite::acquire("test");

        let mut scope = EditScope::begin(&store, id, Some(&language), &grant).unwrap();
        scope.set(Field::Key, "hello").set(Field::Phrase, "Hello!");
        scope.commit().unwrap();

        let item = store.item_by_id(id, Some(&language)).unwrap().unwrap();
        assert_eq!(item.field(Field::Key), "hello");
        assert_eq!(item.field(Field::Phrase), "Hello!");
        assert!(!store.is_editing(id, Some(&language)));
    }

    #[test]
    fn test_set_same_field_twice_keeps_last() {
        let (store, id, language) = store_with_entry();
        let grant = InfraWrite::acquire("test");

        let mut scope = EditScope::begin(&store, id, Some(&language), &grant).unwrap();
        scope.set(Field::Phrase, "first").set(Field::Phrase, "second");
        scope.commit().unwrap();

        let item = store.item_by_id(id, Some(&language)).unwrap().unwrap();
        assert_eq!(item.field(Field::Phrase), "second");
    }

    #[test]
    fn test_drop_without_commit_rolls_back() {
        let (store, id, language) = store_with_entry();
        let grant = InfraWrite::acquire("test");

        {
            let mut scope = EditScope::begin(&store, id, Some(&language), &grant).unwrap();
            scope.set(Field::Phrase, "never written");
            assert!(store.is_editing(id, Some(&language)));
        }

        assert!(!store.is_editing(id, Some(&language)));
        let item = store.item_by_id(id, Some(&language)).unwrap().unwrap();
        assert_eq!(item.field(Field::Phrase), "");
    }

    #[test]
    fn test_explicit_cancel() {
        let (store, id, language) = store_with_entry();
        let grant = InfraWrite::acquire("test");

        let mut scope = EditScope::begin(&store, id, Some(&language), &grant).unwrap();
        scope.set(Field::Phrase, "discarded");
        scope.cancel();

        assert!(!store.is_editing(id, Some(&language)));
    }

    #[test]
    fn test_failed_commit_closes_edit() {
        let (store, id, _) = store_with_entry();
        let grant = InfraWrite::acquire("test");

        // Language-neutral edit cannot write a versioned field
        let mut scope = EditScope::begin(&store, id, None, &grant).unwrap();
        scope.set(Field::Phrase, "no language");
        let result = scope.commit();

        assert!(matches!(result, Err(StoreError::LanguageRequired { .. })));
        assert!(!store.is_editing(id, None));
    }

    #[test]
    fn test_begin_twice_is_rejected() {
        let (store, id, language) = store_with_entry();
        let grant = InfraWrite::acquire("test");

        let _first = EditScope::begin(&store, id, Some(&language), &grant).unwrap();
        let second = EditScope::begin(&store, id, Some(&language), &grant);

        assert!(matches!(second, Err(StoreError::EditInProgress(_))));
    }
}

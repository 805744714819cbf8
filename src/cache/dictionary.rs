use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{info, warn};
use uuid::Uuid;

use super::{CacheMetrics, CacheReport, SizedCache};
use crate::language::Language;
use crate::logging::{extra_info, LOG_TARGET};
use crate::store::{ContentStore, Field, Item, ItemId, StoreError, TemplateKind};

/// Two entries under one root carrying the same key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateKey {
    pub key: String,
    /// Entry the key maps to after the reload (the later one in walk order)
    pub kept: ItemId,
    pub kept_path: String,
    pub replaced: ItemId,
    pub replaced_path: String,
}

/// Outcome of a full reload of one dictionary root.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReloadSummary {
    /// Entries with a key that were recorded
    pub entries: usize,
    pub duplicates: Vec<DuplicateKey>,
}

/// Key → entry id cache over the dictionary roots of a content store.
///
/// Records are filled lazily: the first lookup against an empty cache and any
/// lookup that misses trigger a full reload of the root. Reloads are
/// single-flight per root. Every root has a gate holding a generation counter;
/// a caller that waited on the gate while another thread reloaded sees the
/// counter move and reuses that result instead of walking the tree again.
///
/// The cache also owns one creation lock per root, so every translator sharing
/// the cache serializes entry creation under that root.
pub struct DictionaryCache {
    store: Arc<dyn ContentStore>,
    records: SizedCache,
    gates: Mutex<HashMap<ItemId, Arc<Mutex<u64>>>>,
    creation_locks: Mutex<HashMap<ItemId, Arc<Mutex<()>>>>,
    metrics: CacheMetrics,
    extra_logging: bool,
}

impl DictionaryCache {
    pub fn new(store: Arc<dyn ContentStore>, max_bytes: usize, extra_logging: bool) -> Self {
        Self {
            store,
            records: SizedCache::new(max_bytes),
            gates: Mutex::new(HashMap::new()),
            creation_locks: Mutex::new(HashMap::new()),
            metrics: CacheMetrics::new(),
            extra_logging,
        }
    }

    fn record_key(root: &Item, key: &str) -> String {
        format!("{}:{}", root.id, key)
    }

    fn gate(&self, root: ItemId) -> Arc<Mutex<u64>> {
        let mut gates = self.gates.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(gates.entry(root).or_default())
    }

    fn lock_gate(gate: &Mutex<u64>) -> MutexGuard<'_, u64> {
        gate.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Lock held while entries under `root` are created or back-filled.
    pub fn creation_lock(&self, root: ItemId) -> Arc<Mutex<()>> {
        let mut locks = self.creation_locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(root).or_default())
    }

    /// Cached id for `key` under `root`, without reloading.
    pub fn peek(&self, root: &Item, key: &str) -> Option<ItemId> {
        self.records
            .get(&Self::record_key(root, key))
            .and_then(|id| Uuid::parse_str(&id).ok())
    }

    /// Id of the entry registered for `key` under `root`, reloading the root
    /// when the cache is empty or the key is not known yet.
    pub fn get(&self, root: &Item, key: &str) -> Result<Option<ItemId>, StoreError> {
        let gate = self.gate(root.id);
        let seen = *Self::lock_gate(&gate);
        let mut reloaded = false;

        if self.records.is_empty() {
            self.reload_if_stale(root, &gate, seen)?;
            reloaded = true;
        }

        if let Some(id) = self.peek(root, key) {
            self.metrics.record_hit();
            return Ok(Some(id));
        }

        if !reloaded {
            extra_info!(
                self.extra_logging,
                "Key '{}' not found in cache for root {}, reloading",
                key,
                root.path
            );
            self.reload_if_stale(root, &gate, seen)?;

            if let Some(id) = self.peek(root, key) {
                self.metrics.record_hit();
                return Ok(Some(id));
            }
        }

        self.metrics.record_miss();
        extra_info!(self.extra_logging, "Key '{}' is not in dictionary {}", key, root.path);
        Ok(None)
    }

    /// Register `id` for `key` under `root`. The last write wins.
    pub fn set(&self, root: &Item, key: &str, id: ItemId) {
        self.records.set(Self::record_key(root, key), id.to_string());
    }

    /// Reload `root` unless someone else completed a reload after the caller
    /// read generation `seen`.
    fn reload_if_stale(&self, root: &Item, gate: &Mutex<u64>, seen: u64) -> Result<(), StoreError> {
        let mut generation = Self::lock_gate(gate);
        if *generation != seen {
            extra_info!(
                self.extra_logging,
                "Dictionary {} was reloaded by another request, reusing it",
                root.path
            );
            return Ok(());
        }

        self.walk(root)?;
        *generation += 1;
        Ok(())
    }

    /// Walk the whole tree under `root` and register every entry with a key.
    pub fn reload_all(&self, root: &Item) -> Result<ReloadSummary, StoreError> {
        let gate = self.gate(root.id);
        let mut generation = Self::lock_gate(&gate);
        let summary = self.walk(root)?;
        *generation += 1;
        Ok(summary)
    }

    fn walk(&self, root: &Item) -> Result<ReloadSummary, StoreError> {
        let mut summary = ReloadSummary::default();
        let mut seen: HashMap<String, (ItemId, String)> = HashMap::new();

        self.walk_folder(root, root.id, &mut seen, &mut summary)?;

        self.metrics.record_reload();
        self.metrics.record_duplicates(summary.duplicates.len());
        info!(
            target: LOG_TARGET,
            "Loaded {} dictionary entries from {} ({} duplicate keys)",
            summary.entries,
            root.path,
            summary.duplicates.len()
        );
        Ok(summary)
    }

    fn walk_folder(
        &self,
        root: &Item,
        folder: ItemId,
        seen: &mut HashMap<String, (ItemId, String)>,
        summary: &mut ReloadSummary,
    ) -> Result<(), StoreError> {
        for child in self.store.children(folder)? {
            match child.template {
                TemplateKind::DictionaryFolder => {
                    self.walk_folder(root, child.id, seen, summary)?;
                }
                TemplateKind::DictionaryEntry => {
                    let key = child.field(Field::Key);
                    if key.is_empty() {
                        continue;
                    }

                    if let Some((previous_id, previous_path)) =
                        seen.insert(key.to_string(), (child.id, child.path.clone()))
                    {
                        warn!(
                            target: LOG_TARGET,
                            "Duplicate dictionary key '{}': {} ({}) replaces {} ({})",
                            key,
                            child.path,
                            child.id,
                            previous_path,
                            previous_id
                        );
                        summary.duplicates.push(DuplicateKey {
                            key: key.to_string(),
                            kept: child.id,
                            kept_path: child.path.clone(),
                            replaced: previous_id,
                            replaced_path: previous_path,
                        });
                    } else {
                        summary.entries += 1;
                    }

                    self.set(root, key, child.id);
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Whether `key` maps to an entry that has a version in `language`.
    pub fn entry_exists(&self, root: &Item, key: &str, language: &Language) -> Result<bool, StoreError> {
        let Some(id) = self.get(root, key)? else {
            return Ok(false);
        };

        Ok(self
            .store
            .item_by_id(id, Some(language))?
            .is_some_and(|item| item.has_versions()))
    }

    pub fn clear(&self) {
        self.records.clear();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn metrics(&self) -> &CacheMetrics {
        &self.metrics
    }

    pub fn report(&self) -> CacheReport {
        self.metrics.report()
    }
}

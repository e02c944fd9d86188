//! In-process record store
//!
//! Follows the same rules as the Zotero API: every successful write bumps the
//! record's version by one, a stale version is rejected, and deleting a parent
//! also removes its remaining children. Used for tests and offline runs.

use super::{ListScope, RecordStore};
use crate::error::{DedupeError, Result};
use crate::models::{Collection, Record};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// One accepted mutation, in the order it was applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreWrite {
    Update { key: String, version: u64 },
    Delete { key: String, version: u64 },
}

#[derive(Debug, Default)]
struct Inner {
    /// Insertion order of live keys
    order: Vec<String>,
    records: HashMap<String, Record>,
    collections: Vec<Collection>,
    writes: Vec<StoreWrite>,
    failing_children: HashSet<String>,
}

/// Version-checked in-memory library
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store holding `records` in the given order
    pub fn with_records(records: impl IntoIterator<Item = Record>) -> Self {
        let store = Self::new();
        for record in records {
            store.insert(record);
        }
        store
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A panic while holding the lock leaves plain data behind; keep going.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Insert or replace a record as-is (no version check, not logged as a write)
    pub fn insert(&self, record: Record) {
        let mut inner = self.lock();
        if !inner.records.contains_key(&record.key) {
            inner.order.push(record.key.clone());
        }
        inner.records.insert(record.key.clone(), record);
    }

    pub fn add_collection(&self, collection: Collection) {
        self.lock().collections.push(collection);
    }

    pub fn get(&self, key: &str) -> Option<Record> {
        self.lock().records.get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Children of `parent_key` currently in the store
    pub fn children_of(&self, parent_key: &str) -> Vec<Record> {
        let inner = self.lock();
        inner
            .order
            .iter()
            .filter_map(|k| inner.records.get(k))
            .filter(|r| r.parent_item.as_deref() == Some(parent_key))
            .cloned()
            .collect()
    }

    /// Simulate another client editing the record: bump its version
    pub fn touch(&self, key: &str) {
        if let Some(record) = self.lock().records.get_mut(key) {
            record.version += 1;
        }
    }

    /// Make `list_children(parent_key)` fail with a fetch error
    pub fn fail_children_of(&self, parent_key: &str) {
        self.lock().failing_children.insert(parent_key.to_string());
    }

    /// Every accepted write so far
    pub fn writes(&self) -> Vec<StoreWrite> {
        self.lock().writes.clone()
    }

    pub fn write_count(&self) -> usize {
        self.lock().writes.len()
    }

    fn check_version(inner: &Inner, key: &str, version: u64) -> Result<()> {
        let current = inner
            .records
            .get(key)
            .ok_or_else(|| DedupeError::NotFound(key.to_string()))?;
        if current.version != version {
            return Err(DedupeError::VersionConflict {
                key: key.to_string(),
                version,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn list_top_level(&self, scope: &ListScope) -> Result<Vec<Record>> {
        let inner = self.lock();
        let matches = inner
            .order
            .iter()
            .filter_map(|k| inner.records.get(k))
            .filter(|r| r.parent_item.is_none())
            .filter(|r| match &scope.collection {
                Some(c) => r.collections.iter().any(|rc| rc == c),
                None => true,
            })
            .filter(|r| match &scope.tag {
                Some(t) => r.tags.iter().any(|rt| &rt.tag == t),
                None => true,
            })
            .cloned();

        Ok(match scope.limit {
            Some(limit) => matches.take(limit).collect(),
            None => matches.collect(),
        })
    }

    async fn list_children(&self, parent_key: &str) -> Result<Vec<Record>> {
        if self.lock().failing_children.contains(parent_key) {
            return Err(DedupeError::TransientFetch(format!(
                "children of {} unavailable",
                parent_key
            )));
        }
        Ok(self.children_of(parent_key))
    }

    async fn update(&self, record: &Record) -> Result<()> {
        let mut inner = self.lock();
        Self::check_version(&inner, &record.key, record.version)?;

        let mut stored = record.clone();
        stored.version = record.version + 1;
        inner.records.insert(stored.key.clone(), stored);
        inner.writes.push(StoreWrite::Update {
            key: record.key.clone(),
            version: record.version,
        });
        Ok(())
    }

    async fn delete(&self, key: &str, version: u64) -> Result<()> {
        let mut inner = self.lock();
        Self::check_version(&inner, key, version)?;

        let orphaned: Vec<String> = inner
            .records
            .values()
            .filter(|r| r.parent_item.as_deref() == Some(key))
            .map(|r| r.key.clone())
            .collect();
        for gone in orphaned.iter().map(String::as_str).chain(std::iter::once(key)) {
            inner.records.remove(gone);
        }
        inner.order.retain(|k| k != key && !orphaned.contains(k));
        inner.writes.push(StoreWrite::Delete {
            key: key.to_string(),
            version,
        });
        Ok(())
    }

    async fn list_collections(&self) -> Result<Vec<Collection>> {
        Ok(self.lock().collections.clone())
    }
}

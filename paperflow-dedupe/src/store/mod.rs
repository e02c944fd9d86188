//! Record store seam
//!
//! The merge engine only ever talks to a [`RecordStore`]. Every mutation is
//! guarded by the record's version stamp; a stale stamp must be rejected with
//! [`DedupeError::VersionConflict`](crate::error::DedupeError::VersionConflict).

pub mod memory;
pub mod zotero_client;

pub use memory::{MemoryStore, StoreWrite};
pub use zotero_client::{parse_next_link, ZoteroClient, ZoteroSettings};

use crate::error::Result;
use crate::models::{Collection, Record};
use async_trait::async_trait;

/// Which top-level records to scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListScope {
    /// Restrict to one collection key
    pub collection: Option<String>,
    /// Restrict to records carrying this tag label
    pub tag: Option<String>,
    /// Stop after this many records
    pub limit: Option<usize>,
}

impl ListScope {
    pub fn all() -> Self {
        Self::default()
    }
}

/// Remote (or in-memory) library holding records and their children
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Top-level records in library order
    async fn list_top_level(&self, scope: &ListScope) -> Result<Vec<Record>>;

    /// Attachments and notes owned by `parent_key`
    async fn list_children(&self, parent_key: &str) -> Result<Vec<Record>>;

    /// Replace a record's fields, guarded by `record.version`
    async fn update(&self, record: &Record) -> Result<()>;

    /// Delete a record, guarded by `version`
    async fn delete(&self, key: &str, version: u64) -> Result<()>;

    /// All collections in the library
    async fn list_collections(&self) -> Result<Vec<Collection>>;
}

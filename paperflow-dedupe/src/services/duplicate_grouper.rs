//! Duplicate grouping
//!
//! Partitions scanned records by canonical key. Records without a key are
//! skipped, and keys seen only once are not duplicates.

use super::canonicalizer::{canonical_key, CanonicalKey, GroupingMode};
use crate::models::Record;
use std::collections::HashMap;

/// Records sharing one canonical key, in first-seen order
#[derive(Debug, Clone)]
pub struct DuplicateGroup {
    pub key: CanonicalKey,
    pub records: Vec<Record>,
}

impl DuplicateGroup {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Group `records` by canonical key, keeping only groups of two or more
///
/// Groups come back in the order their key was first seen.
pub fn group_records(records: Vec<Record>, mode: GroupingMode) -> Vec<DuplicateGroup> {
    let mut index: HashMap<CanonicalKey, usize> = HashMap::new();
    let mut groups: Vec<DuplicateGroup> = Vec::new();
    let mut skipped = 0usize;

    for record in records {
        let Some(key) = canonical_key(&record, mode) else {
            skipped += 1;
            continue;
        };
        match index.get(&key) {
            Some(&slot) => groups[slot].records.push(record),
            None => {
                index.insert(key.clone(), groups.len());
                groups.push(DuplicateGroup {
                    key,
                    records: vec![record],
                });
            }
        }
    }

    let distinct = groups.len();
    groups.retain(|g| g.len() > 1);

    tracing::debug!(
        mode = %mode,
        distinct_keys = distinct,
        duplicate_groups = groups.len(),
        skipped,
        "Grouped records"
    );

    groups
}

//! Merge run driver
//!
//! One run: list top-level records → group by canonical key → for each
//! duplicate group build bundles and merge. Groups are processed one after
//! another; nothing is carried from one run to the next.

use super::bundle_builder::build_bundles;
use super::canonicalizer::GroupingMode;
use super::duplicate_grouper::group_records;
use super::merge_engine::{MergeEngine, RecordFailure};
use crate::error::{DedupeError, Result};
use crate::store::{ListScope, RecordStore};
use tracing::info;

/// Parameters of one merge run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeRequest {
    pub scope: ListScope,
    pub grouping_mode: GroupingMode,
    pub dry_run: bool,
}

/// Totals across all groups of a run
///
/// In a dry run the counters describe the planned actions.
#[derive(Debug, Default)]
pub struct MergeSummary {
    pub dry_run: bool,
    /// Top-level records scanned
    pub scanned: usize,
    pub groups_merged: usize,
    pub items_removed: usize,
    pub attachments_moved: usize,
    pub notes_moved: usize,
    pub children_skipped: usize,
    pub failures: Vec<RecordFailure>,
}

impl MergeSummary {
    pub fn display_string(&self) -> String {
        format!(
            "{}Groups merged: {}, items removed: {}, attachments moved: {}, notes moved: {}, failures: {}",
            if self.dry_run { "[DRY] " } else { "" },
            self.groups_merged,
            self.items_removed,
            self.attachments_moved,
            self.notes_moved,
            self.failures.len()
        )
    }
}

/// Run one full merge pass against `store`
///
/// Listing or child-fetch failures abort the run. Write failures are
/// collected in [`MergeSummary::failures`] and the run carries on.
pub async fn run_merge<S>(store: &S, request: &MergeRequest) -> Result<MergeSummary>
where
    S: RecordStore + ?Sized,
{
    let records = store.list_top_level(&request.scope).await?;
    let mut summary = MergeSummary {
        dry_run: request.dry_run,
        scanned: records.len(),
        ..Default::default()
    };
    info!(scanned = summary.scanned, "Scanned top-level items");

    let groups = group_records(records, request.grouping_mode);
    if groups.is_empty() {
        info!(mode = %request.grouping_mode, "No duplicates detected with the current heuristic");
        return Ok(summary);
    }

    let engine = MergeEngine::new(store, request.dry_run);

    for group in groups {
        let bundles = build_bundles(store, group.records).await?;
        let Some(outcome) = engine.merge_group(&group.key, bundles).await else {
            continue;
        };

        summary.groups_merged += 1;
        summary.items_removed += outcome.losers_deleted;
        summary.attachments_moved += outcome.attachments_moved;
        summary.notes_moved += outcome.notes_moved;
        summary.children_skipped += outcome.children_skipped;
        summary.failures.extend(outcome.failures);
    }

    info!(
        dry_run = summary.dry_run,
        groups_merged = summary.groups_merged,
        items_removed = summary.items_removed,
        attachments_moved = summary.attachments_moved,
        notes_moved = summary.notes_moved,
        failures = summary.failures.len(),
        "Merge run completed"
    );

    Ok(summary)
}

/// Resolve a collection key from an explicit key or a collection name
///
/// Exact name matches win over case-insensitive ones. An unknown name is a
/// configuration error.
pub async fn resolve_collection_key<S>(
    store: &S,
    collection: Option<&str>,
    collection_name: Option<&str>,
) -> Result<Option<String>>
where
    S: RecordStore + ?Sized,
{
    if let Some(key) = collection {
        return Ok(Some(key.to_string()));
    }
    let Some(name) = collection_name else {
        return Ok(None);
    };

    let collections = store.list_collections().await?;
    let lowered = name.to_lowercase();
    let found = collections
        .iter()
        .find(|c| c.name == name)
        .or_else(|| collections.iter().find(|c| c.name.to_lowercase() == lowered));

    match found {
        Some(c) => {
            info!(name = %c.name, key = %c.key, "Resolved collection");
            Ok(Some(c.key.clone()))
        }
        None => Err(DedupeError::Config(format!(
            "Collection named '{}' not found.",
            name
        ))),
    }
}

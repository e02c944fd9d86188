//! Duplicate group merging
//!
//! **Algorithm (per group):**
//! 1. Rank bundles by (primary file, attachments, notes, modified, added),
//!    descending, stable. The first bundle survives.
//! 2. For each loser in rank order:
//!    - union its collections and tags into the survivor's pending sets
//!      (tag labels already present win)
//!    - re-parent every child whose signature the survivor does not hold yet
//!    - delete the loser, but only once all its re-parent writes went through
//! 3. Update the survivor once, and only if its collections or tags changed.
//!
//! Write failures are recorded per record and never stop the rest of the
//! group. A dry run goes through the same steps and records the actions
//! instead of sending them.

use super::canonicalizer::CanonicalKey;
use crate::error::DedupeError;
use crate::models::{Bundle, ItemType, Record, Tag};
use crate::store::RecordStore;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeSet, HashSet};

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Identity of a child for duplicate suppression
///
/// Notes: `(note, collapsed body, "")`.
/// Attachments: `(attachment, "filename|content-type", link mode)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChildSignature {
    pub kind: String,
    pub content: String,
    pub link_mode: String,
}

pub fn child_signature(child: &Record) -> ChildSignature {
    if child.item_type == ItemType::Note {
        let body = child.note.as_deref().unwrap_or_default();
        return ChildSignature {
            kind: child.item_type.to_string(),
            content: WHITESPACE.replace_all(body, " ").trim().to_string(),
            link_mode: String::new(),
        };
    }

    let filename = child
        .filename
        .as_deref()
        .or(child.title.as_deref())
        .unwrap_or_default()
        .trim()
        .to_lowercase();
    ChildSignature {
        kind: child.item_type.to_string(),
        content: format!(
            "{}|{}",
            filename,
            child.content_type.as_deref().unwrap_or_default()
        ),
        link_mode: child.link_mode.clone().unwrap_or_default(),
    }
}

/// Stable descending sort on the rank key; ties keep input order
pub fn rank_bundles(mut bundles: Vec<Bundle>) -> Vec<Bundle> {
    bundles.sort_by(|a, b| b.rank_key().cmp(&a.rank_key()));
    bundles
}

/// Kind of child moved to the survivor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildKind {
    Attachment,
    Note,
}

impl std::fmt::Display for ChildKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChildKind::Attachment => write!(f, "attachment"),
            ChildKind::Note => write!(f, "note"),
        }
    }
}

/// One write the engine performed (or, in a dry run, would perform)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeAction {
    Reparent {
        child_key: String,
        kind: ChildKind,
        from: String,
        to: String,
    },
    DeleteLoser {
        key: String,
        version: u64,
    },
    UpdateSurvivor {
        key: String,
        collections: usize,
        tags: usize,
    },
}

impl std::fmt::Display for MergeAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MergeAction::Reparent {
                child_key,
                kind,
                from,
                to,
            } => write!(f, "re-parent {} {} from {} to {}", kind, child_key, from, to),
            MergeAction::DeleteLoser { key, version } => {
                write!(f, "delete duplicate parent {} (version {})", key, version)
            }
            MergeAction::UpdateSurvivor {
                key,
                collections,
                tags,
            } => write!(
                f,
                "update survivor {} collections={} tags={}",
                key, collections, tags
            ),
        }
    }
}

/// Write that was attempted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOperation {
    Reparent,
    Delete,
    UpdateSurvivor,
}

/// A per-record failure inside a group
#[derive(Debug)]
pub struct RecordFailure {
    pub key: String,
    pub operation: WriteOperation,
    pub error: DedupeError,
}

/// Result of merging one group
#[derive(Debug)]
pub struct GroupOutcome {
    pub key: CanonicalKey,
    pub survivor_key: String,
    pub loser_keys: Vec<String>,
    pub attachments_moved: usize,
    pub notes_moved: usize,
    /// Loser children dropped as exact duplicates of survivor children
    pub children_skipped: usize,
    pub losers_deleted: usize,
    pub actions: Vec<MergeAction>,
    pub failures: Vec<RecordFailure>,
}

impl GroupOutcome {
    fn new(key: CanonicalKey, survivor_key: String, loser_keys: Vec<String>) -> Self {
        Self {
            key,
            survivor_key,
            loser_keys,
            attachments_moved: 0,
            notes_moved: 0,
            children_skipped: 0,
            losers_deleted: 0,
            actions: Vec::new(),
            failures: Vec::new(),
        }
    }

    fn fail(&mut self, key: &str, operation: WriteOperation, error: DedupeError) {
        tracing::warn!(
            key = %key,
            operation = ?operation,
            error = %error,
            "Merge write failed, continuing"
        );
        self.failures.push(RecordFailure {
            key: key.to_string(),
            operation,
            error,
        });
    }
}

/// Pending survivor metadata, seeded from the survivor and grown per loser
struct SurvivorState {
    original_collections: BTreeSet<String>,
    collections: BTreeSet<String>,
    original_tags: Vec<Tag>,
    tags: Vec<Tag>,
    labels: HashSet<String>,
    known_children: HashSet<ChildSignature>,
}

impl SurvivorState {
    fn new(survivor: &Bundle) -> Self {
        let collections: BTreeSet<String> =
            survivor.record.collections.iter().cloned().collect();
        Self {
            original_collections: collections.clone(),
            collections,
            original_tags: survivor.record.tags.clone(),
            // The survivor's own tags are kept verbatim
            tags: survivor.record.tags.clone(),
            labels: survivor.record.tags.iter().map(|t| t.tag.clone()).collect(),
            known_children: survivor.children.iter().map(child_signature).collect(),
        }
    }

    /// Add a loser tag unless its label is blank or already held
    fn absorb_tag(&mut self, tag: &Tag) {
        if tag.tag.is_empty() || self.labels.contains(&tag.tag) {
            return;
        }
        self.labels.insert(tag.tag.clone());
        self.tags.push(tag.clone());
    }

    fn absorb_metadata(&mut self, loser: &Record) {
        self.collections.extend(loser.collections.iter().cloned());
        for tag in &loser.tags {
            self.absorb_tag(tag);
        }
    }

    fn changed(&self) -> bool {
        self.collections != self.original_collections || self.tags != self.original_tags
    }
}

/// Merges duplicate groups against a record store
pub struct MergeEngine<'a, S: RecordStore + ?Sized> {
    store: &'a S,
    dry_run: bool,
}

impl<'a, S: RecordStore + ?Sized> MergeEngine<'a, S> {
    pub fn new(store: &'a S, dry_run: bool) -> Self {
        Self { store, dry_run }
    }

    /// Merge one duplicate group into its best-ranked bundle
    ///
    /// Returns `None` for an empty group.
    pub async fn merge_group(
        &self,
        key: &CanonicalKey,
        bundles: Vec<Bundle>,
    ) -> Option<GroupOutcome> {
        let mut ranked = rank_bundles(bundles).into_iter();
        let survivor = ranked.next()?;
        let losers: Vec<Bundle> = ranked.collect();

        let mut outcome = GroupOutcome::new(
            key.clone(),
            survivor.key().to_string(),
            losers.iter().map(|b| b.key().to_string()).collect(),
        );

        tracing::info!(
            group = %key,
            survivor = %survivor.record.label(),
            attachments = survivor.attachments.len(),
            notes = survivor.notes.len(),
            has_primary_file = survivor.has_primary_file,
            duplicates = losers.len(),
            dry_run = self.dry_run,
            "Merging duplicate group"
        );

        let mut state = SurvivorState::new(&survivor);

        for loser in &losers {
            state.absorb_metadata(&loser.record);
            let moved_all = self
                .move_children(&survivor, loser, &mut state, &mut outcome)
                .await;

            if moved_all {
                self.delete_loser(loser, &mut outcome).await;
            } else {
                tracing::warn!(
                    loser = %loser.key(),
                    survivor = %survivor.key(),
                    "Keeping duplicate: not all of its children were moved"
                );
            }
        }

        if state.changed() {
            self.update_survivor(&survivor.record, &state, &mut outcome)
                .await;
        }

        Some(outcome)
    }

    /// Re-parent the loser's novel children; false if any write failed
    async fn move_children(
        &self,
        survivor: &Bundle,
        loser: &Bundle,
        state: &mut SurvivorState,
        outcome: &mut GroupOutcome,
    ) -> bool {
        let mut all_moved = true;

        for child in loser.attachments.iter().chain(loser.notes.iter()) {
            let signature = child_signature(child);
            if state.known_children.contains(&signature) {
                tracing::debug!(
                    child = %child.key,
                    loser = %loser.key(),
                    "Skipping child already held by survivor"
                );
                outcome.children_skipped += 1;
                continue;
            }

            let kind = if child.item_type == ItemType::Note {
                ChildKind::Note
            } else {
                ChildKind::Attachment
            };
            let action = MergeAction::Reparent {
                child_key: child.key.clone(),
                kind,
                from: loser.key().to_string(),
                to: survivor.key().to_string(),
            };

            if !self.dry_run {
                let mut moved = child.clone();
                moved.parent_item = Some(survivor.key().to_string());
                if let Err(e) = self.store.update(&moved).await {
                    outcome.fail(&child.key, WriteOperation::Reparent, e);
                    all_moved = false;
                    continue;
                }
            }

            self.record(outcome, action);
            state.known_children.insert(signature);
            match kind {
                ChildKind::Note => outcome.notes_moved += 1,
                ChildKind::Attachment => outcome.attachments_moved += 1,
            }
        }

        all_moved
    }

    async fn delete_loser(&self, loser: &Bundle, outcome: &mut GroupOutcome) {
        let action = MergeAction::DeleteLoser {
            key: loser.key().to_string(),
            version: loser.record.version,
        };

        if !self.dry_run {
            if let Err(e) = self
                .store
                .delete(&loser.record.key, loser.record.version)
                .await
            {
                outcome.fail(loser.key(), WriteOperation::Delete, e);
                return;
            }
        }

        self.record(outcome, action);
        outcome.losers_deleted += 1;
    }

    async fn update_survivor(
        &self,
        survivor: &Record,
        state: &SurvivorState,
        outcome: &mut GroupOutcome,
    ) {
        let mut updated = survivor.clone();
        updated.collections = state.collections.iter().cloned().collect();
        updated.tags = state.tags.clone();

        let action = MergeAction::UpdateSurvivor {
            key: survivor.key.clone(),
            collections: updated.collections.len(),
            tags: updated.tags.len(),
        };

        if !self.dry_run {
            if let Err(e) = self.store.update(&updated).await {
                outcome.fail(&survivor.key, WriteOperation::UpdateSurvivor, e);
                return;
            }
        }

        self.record(outcome, action);
    }

    fn record(&self, outcome: &mut GroupOutcome, action: MergeAction) {
        if self.dry_run {
            tracing::info!(action = %action, "[DRY] Would perform");
        } else {
            tracing::debug!(action = %action, "Performed");
        }
        outcome.actions.push(action);
    }
}

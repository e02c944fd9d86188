//! End-to-end merge runs against the in-memory store
//!
//! Each test seeds a library, runs one or more full merge passes and
//! inspects the resulting store state and write log.

mod helpers;

use async_trait::async_trait;
use helpers::{attachment, note, paper, pdf, LibraryBuilder};
use paperflow_dedupe::error::{DedupeError, Result};
use paperflow_dedupe::models::{Collection, Record, Tag};
use paperflow_dedupe::services::{child_signature, ChildSignature, WriteOperation};
use paperflow_dedupe::store::{MemoryStore, StoreWrite};
use paperflow_dedupe::{run_merge, GroupingMode, ListScope, MergeRequest, RecordStore};
use std::collections::HashSet;

fn request(mode: GroupingMode, dry_run: bool) -> MergeRequest {
    MergeRequest {
        scope: ListScope::all(),
        grouping_mode: mode,
        dry_run,
    }
}

async fn top_level_keys(store: &MemoryStore) -> Vec<String> {
    store
        .list_top_level(&ListScope::all())
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.key)
        .collect()
}

fn signatures(children: &[Record]) -> HashSet<ChildSignature> {
    children.iter().map(child_signature).collect()
}

/// Primary file outranks attachment count; identifiers match after normalization
#[tokio::test]
async fn test_primary_file_survivor_absorbs_attachment() {
    // Given: A has a snapshot, B has the PDF, identifiers differ in case/whitespace
    let store = LibraryBuilder::new()
        .with_doi("A", "Learning to Walk", "10.1/X")
        .with(attachment("A1", "A", "snapshot.html", "text/html"))
        .with_doi("B", "Learning to walk (preprint)", "10.1/x ")
        .with(pdf("B1", "B"))
        .build();

    // When
    let summary = run_merge(&store, &request(GroupingMode::Auto, false))
        .await
        .unwrap();

    // Then: B survives with both attachments, A is gone
    assert_eq!(summary.scanned, 2);
    assert_eq!(summary.groups_merged, 1);
    assert_eq!(summary.items_removed, 1);
    assert_eq!(summary.attachments_moved, 1);
    assert_eq!(summary.notes_moved, 0);
    assert!(summary.failures.is_empty());

    assert_eq!(top_level_keys(&store).await, vec!["B"]);
    assert_eq!(store.get("A1").unwrap().parent_item.as_deref(), Some("B"));
    assert_eq!(store.children_of("B").len(), 2);

    // Re-parent happens before the delete
    assert_eq!(
        store.writes(),
        vec![
            StoreWrite::Update {
                key: "A1".into(),
                version: 1
            },
            StoreWrite::Delete {
                key: "A".into(),
                version: 1
            },
        ]
    );
}

#[tokio::test]
async fn test_three_title_duplicates_collapse_to_one() {
    let title = "Deep Reinforcement Learning for Robotics";
    let mut builder = LibraryBuilder::new();
    for (key, date) in [("P1", "2021"), ("P2", "2021-06-01"), ("P3", "June 2021")] {
        let mut record = paper(key, title);
        record.date = Some(date.to_string());
        builder = builder.with(record);
    }
    let store = builder.build();

    let summary = run_merge(&store, &request(GroupingMode::Auto, false))
        .await
        .unwrap();

    assert_eq!(summary.groups_merged, 1);
    assert_eq!(summary.items_removed, 2);
    assert_eq!(top_level_keys(&store).await, vec!["P1"]);
}

#[tokio::test]
async fn test_identical_note_is_not_duplicated() {
    let store = LibraryBuilder::new()
        .with_doi("S", "Survivor Paper Title", "10.9/abc")
        .with(pdf("S1", "S"))
        .with(note("SN", "S", "see section 4"))
        .with_doi("L", "Survivor Paper Title", "10.9/ABC")
        .with(note("LN", "L", "  see   section\n4 "))
        .build();

    let summary = run_merge(&store, &request(GroupingMode::Identifier, false))
        .await
        .unwrap();

    assert_eq!(summary.notes_moved, 0);
    assert_eq!(summary.children_skipped, 1);
    assert_eq!(summary.items_removed, 1);

    let notes: Vec<Record> = store
        .children_of("S")
        .into_iter()
        .filter(|c| c.note.is_some())
        .collect();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].key, "SN");
    // The skipped note went away with its parent
    assert!(store.get("LN").is_none());
}

#[tokio::test]
async fn test_metadata_union_and_idempotent_rerun() {
    // Given: the survivor (with PDF) and a loser carrying extra tags and collections
    let mut loser_tag = Tag::new("robotics");
    loser_tag.tag_type = Some(1);
    let mut loser = paper("L", "Sim to Real Transfer");
    loser.doi = Some("10.5/s2r".into());
    loser.tags = vec![loser_tag, Tag::new("rl")];
    loser.collections = vec!["COLB".into(), "COLA".into()];

    let mut survivor = paper("S", "Sim-to-Real Transfer");
    survivor.doi = Some("https://doi.org/10.5/S2R".into());
    survivor.tags = vec![Tag::new("robotics")];
    survivor.collections = vec!["COLC".into()];

    let store = LibraryBuilder::new()
        .with(survivor)
        .with(pdf("S1", "S"))
        .with(loser)
        .build();

    // When
    let first = run_merge(&store, &request(GroupingMode::Auto, false))
        .await
        .unwrap();

    // Then: one delete and one survivor update
    assert_eq!(first.items_removed, 1);
    assert_eq!(store.write_count(), 2);

    let survivor = store.get("S").unwrap();
    assert_eq!(survivor.version, 2);
    assert_eq!(survivor.collections, vec!["COLA", "COLB", "COLC"]);
    let labels: Vec<&str> = survivor.tags.iter().map(|t| t.tag.as_str()).collect();
    assert_eq!(labels, vec!["robotics", "rl"]);
    // The survivor's own tag won the label collision
    assert_eq!(survivor.tags[0].tag_type, None);

    // When: run again on the merged library
    let second = run_merge(&store, &request(GroupingMode::Auto, false))
        .await
        .unwrap();

    // Then: nothing left to do
    assert_eq!(second.groups_merged, 0);
    assert_eq!(store.write_count(), 2);
}

#[tokio::test]
async fn test_survivor_choice_ignores_input_order() {
    fn library(order: &[&str]) -> MemoryStore {
        let mut builder = LibraryBuilder::new();
        for key in order {
            let mut record = paper(key, "Order Independent Survivor");
            record.doi = Some("10.7/order".into());
            builder = builder.with(record);
            builder = match *key {
                "X" => builder.with(pdf("X1", "X")),
                "Y" => builder
                    .with(attachment("Y1", "Y", "a.html", "text/html"))
                    .with(attachment("Y2", "Y", "b.html", "text/html")),
                _ => builder.with(note("Z1", "Z", "remember this")),
            };
        }
        builder.build()
    }

    for order in [["X", "Y", "Z"], ["Z", "Y", "X"], ["Y", "Z", "X"], ["Z", "X", "Y"]] {
        let store = library(&order);
        run_merge(&store, &request(GroupingMode::Auto, false))
            .await
            .unwrap();
        assert_eq!(top_level_keys(&store).await, vec!["X"], "order {:?}", order);
    }
}

#[tokio::test]
async fn test_no_child_is_lost() {
    let store = LibraryBuilder::new()
        .with_doi("S", "Lossless Merge", "10.3/keep")
        .with(pdf("S1", "S"))
        .with(note("SN", "S", "shared note"))
        .with_doi("L1", "Lossless Merge", "10.3/keep")
        .with(note("L1N", "L1", "shared note"))
        .with(attachment("L1A", "L1", "data.csv", "text/csv"))
        .with_doi("L2", "Lossless Merge", "10.3/keep")
        .with(attachment("L2A", "L2", "DATA.csv", "text/csv"))
        .with(note("L2N", "L2", "only in L2"))
        .build();

    let mut before = HashSet::new();
    for key in ["S", "L1", "L2"] {
        before.extend(signatures(&store.children_of(key)));
    }

    let summary = run_merge(&store, &request(GroupingMode::Auto, false))
        .await
        .unwrap();

    let after = signatures(&store.children_of("S"));
    assert_eq!(after, before);
    assert_eq!(store.children_of("S").len(), before.len());
    assert_eq!(summary.attachments_moved, 1);
    assert_eq!(summary.notes_moved, 1);
    assert_eq!(summary.children_skipped, 2);
}

#[tokio::test]
async fn test_short_titles_never_group() {
    let store = LibraryBuilder::new()
        .with(paper("A", "Robot 1"))
        .with(paper("B", "Robot 1"))
        .build();

    let summary = run_merge(&store, &request(GroupingMode::Title, false))
        .await
        .unwrap();

    assert_eq!(summary.groups_merged, 0);
    assert_eq!(store.write_count(), 0);
}

#[tokio::test]
async fn test_dry_run_matches_live_run() {
    fn library() -> MemoryStore {
        LibraryBuilder::new()
            .with_tagged("S", "Dry Run Parity Check", &["a"], &[])
            .with(pdf("S1", "S"))
            .with_tagged("L1", "Dry Run Parity Check", &["b"], &["COL"])
            .with(note("L1N", "L1", "same note"))
            .with_tagged("L2", "Dry Run Parity Check", &[], &[])
            .with(note("L2N", "L2", "same note"))
            .with(attachment("L2A", "L2", "extra.zip", "application/zip"))
            .build()
    }

    let preview_store = library();
    let live_store = library();

    let preview = run_merge(&preview_store, &request(GroupingMode::Title, true))
        .await
        .unwrap();
    let live = run_merge(&live_store, &request(GroupingMode::Title, false))
        .await
        .unwrap();

    assert_eq!(preview_store.write_count(), 0);
    assert!(preview.dry_run);
    assert_eq!(preview.groups_merged, live.groups_merged);
    assert_eq!(preview.items_removed, live.items_removed);
    assert_eq!(preview.attachments_moved, live.attachments_moved);
    assert_eq!(preview.notes_moved, live.notes_moved);
    assert_eq!(preview.children_skipped, live.children_skipped);
    assert_eq!(live.items_removed, 2);
    assert_eq!(live.notes_moved, 1);
    assert_eq!(live.children_skipped, 1);
}

#[tokio::test]
async fn test_scope_filters_and_limit() {
    let mut builder = LibraryBuilder::new();
    for key in ["A", "B", "C"] {
        builder = builder.with_tagged(key, "Scoped Duplicate Title", &["inbox"], &["COL1"]);
    }
    builder = builder
        .with_tagged("D", "Scoped Duplicate Title", &["archive"], &["COL1"])
        .with_tagged("E", "Scoped Duplicate Title", &["inbox"], &["COL2"]);
    let store = builder.build();

    let summary = run_merge(
        &store,
        &MergeRequest {
            scope: ListScope {
                collection: Some("COL1".into()),
                tag: Some("inbox".into()),
                limit: Some(2),
            },
            grouping_mode: GroupingMode::Title,
            dry_run: false,
        },
    )
    .await
    .unwrap();

    assert_eq!(summary.scanned, 2);
    assert_eq!(summary.items_removed, 1);
    assert_eq!(top_level_keys(&store).await, vec!["A", "C", "D", "E"]);
}

#[tokio::test]
async fn test_child_fetch_failure_aborts_run() {
    let store = LibraryBuilder::new()
        .with(paper("A", "Unreachable Children"))
        .with(paper("B", "Unreachable Children"))
        .build();
    store.fail_children_of("B");

    let err = run_merge(&store, &request(GroupingMode::Title, false))
        .await
        .unwrap_err();

    assert!(matches!(err, DedupeError::TransientFetch(_)));
    assert_eq!(store.write_count(), 0);
}

/// Store that rejects writes to chosen keys as if another client edited them
struct ContendedStore {
    inner: MemoryStore,
    contended: HashSet<String>,
}

impl ContendedStore {
    fn conflict(&self, key: &str, version: u64) -> Result<()> {
        if self.contended.contains(key) {
            return Err(DedupeError::VersionConflict {
                key: key.to_string(),
                version,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for ContendedStore {
    async fn list_top_level(&self, scope: &ListScope) -> Result<Vec<Record>> {
        self.inner.list_top_level(scope).await
    }

    async fn list_children(&self, parent_key: &str) -> Result<Vec<Record>> {
        self.inner.list_children(parent_key).await
    }

    async fn update(&self, record: &Record) -> Result<()> {
        self.conflict(&record.key, record.version)?;
        self.inner.update(record).await
    }

    async fn delete(&self, key: &str, version: u64) -> Result<()> {
        self.conflict(key, version)?;
        self.inner.delete(key, version).await
    }

    async fn list_collections(&self) -> Result<Vec<Collection>> {
        self.inner.list_collections().await
    }
}

#[tokio::test]
async fn test_conflict_in_one_group_does_not_stop_the_next() {
    // Given: group 1 has a loser edited elsewhere; group 2 is clean
    let inner = LibraryBuilder::new()
        .with_doi("G1S", "First Group Paper", "10.1/one")
        .with(pdf("G1S1", "G1S"))
        .with_doi("G1L", "First Group Paper", "10.1/one")
        .with(note("G1LN", "G1L", "moved before the conflict"))
        .with_doi("G2S", "Second Group Paper", "10.1/two")
        .with(pdf("G2S1", "G2S"))
        .with_doi("G2L", "Second Group Paper", "10.1/two")
        .build();
    let store = ContendedStore {
        inner,
        contended: HashSet::from(["G1L".to_string()]),
    };

    // When
    let summary = run_merge(&store, &request(GroupingMode::Auto, false))
        .await
        .unwrap();

    // Then: group 1's note moved and its delete failed; group 2 completed
    assert_eq!(summary.groups_merged, 2);
    assert_eq!(summary.items_removed, 1);
    assert_eq!(summary.notes_moved, 1);
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].key, "G1L");
    assert_eq!(summary.failures[0].operation, WriteOperation::Delete);
    assert!(summary.failures[0].error.is_version_conflict());

    assert_eq!(top_level_keys(&store.inner).await, vec!["G1S", "G1L", "G2S"]);
    // No record points at a deleted parent
    assert_eq!(
        store.inner.get("G1LN").unwrap().parent_item.as_deref(),
        Some("G1S")
    );
}

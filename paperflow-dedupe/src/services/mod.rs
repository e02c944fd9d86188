//! Dedupe services: key derivation, grouping, bundling, merging

pub mod bundle_builder;
pub mod canonicalizer;
pub mod dedupe_runner;
pub mod duplicate_grouper;
pub mod merge_engine;

pub use bundle_builder::{build_bundle, build_bundles};
pub use canonicalizer::{canonical_key, CanonicalKey, GroupingMode, KeyKind};
pub use dedupe_runner::{resolve_collection_key, run_merge, MergeRequest, MergeSummary};
pub use duplicate_grouper::{group_records, DuplicateGroup};
pub use merge_engine::{
    child_signature, ChildKind, ChildSignature, GroupOutcome, MergeAction, MergeEngine,
    RecordFailure, WriteOperation,
};

//! paperflow-dedupe library interface
//!
//! Finds top-level records in a Zotero library that describe the same work
//! and folds each group into one survivor:
//! - canonical keys from DOI, URL or normalized title/year
//! - survivor ranking on attached files, notes and recency
//! - children re-parented and losers deleted under version guards
//!
//! Everything below [`store::RecordStore`] is replaceable; tests run the
//! engine against [`store::MemoryStore`].

pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod store;

pub use crate::error::{DedupeError, Result};
pub use crate::services::{run_merge, GroupingMode, MergeRequest, MergeSummary};
pub use crate::store::{ListScope, RecordStore};

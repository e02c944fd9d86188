//! Record bundles and their ranking facets

use super::record::{ItemType, Record};
use chrono::{DateTime, Utc};
use paperflow_common::time::parse_timestamp_or_epoch;

/// Content type of the primary document
pub const PRIMARY_CONTENT_TYPE: &str = "application/pdf";
/// File extension of the primary document
pub const PRIMARY_EXTENSION: &str = ".pdf";

/// A record plus its directly-owned children
///
/// Built fresh for every merge pass and never written anywhere.
#[derive(Debug, Clone)]
pub struct Bundle {
    pub record: Record,
    /// All children in fetch order
    pub children: Vec<Record>,
    pub attachments: Vec<Record>,
    pub notes: Vec<Record>,
    pub has_primary_file: bool,
    pub modified: DateTime<Utc>,
    pub added: DateTime<Utc>,
}

/// Survivor ranking tuple, compared field by field in declaration order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RankKey {
    pub has_primary_file: bool,
    pub attachment_count: usize,
    pub note_count: usize,
    pub modified: DateTime<Utc>,
    pub added: DateTime<Utc>,
}

impl Bundle {
    /// Assemble a bundle from an already-fetched child list
    pub fn from_parts(record: Record, children: Vec<Record>) -> Self {
        let attachments: Vec<Record> = children
            .iter()
            .filter(|c| c.item_type == ItemType::Attachment)
            .cloned()
            .collect();
        let notes: Vec<Record> = children
            .iter()
            .filter(|c| c.item_type == ItemType::Note)
            .cloned()
            .collect();
        let has_primary_file = attachments.iter().any(is_primary_file);
        let modified = parse_timestamp_or_epoch(record.date_modified.as_deref());
        let added = parse_timestamp_or_epoch(record.date_added.as_deref());

        Self {
            record,
            children,
            attachments,
            notes,
            has_primary_file,
            modified,
            added,
        }
    }

    pub fn rank_key(&self) -> RankKey {
        RankKey {
            has_primary_file: self.has_primary_file,
            attachment_count: self.attachments.len(),
            note_count: self.notes.len(),
            modified: self.modified,
            added: self.added,
        }
    }

    pub fn key(&self) -> &str {
        &self.record.key
    }
}

/// True for an attachment holding the primary document (PDF)
pub fn is_primary_file(attachment: &Record) -> bool {
    let by_type = attachment
        .content_type
        .as_deref()
        .is_some_and(|ct| ct.eq_ignore_ascii_case(PRIMARY_CONTENT_TYPE));
    let by_name = attachment
        .filename
        .as_deref()
        .is_some_and(|name| name.to_ascii_lowercase().ends_with(PRIMARY_EXTENSION));
    by_type || by_name
}

//! Error types for paperflow-dedupe
//!
//! Severity depends on the variant:
//! - `Config`, `TransientFetch`, `Parse` abort the run
//! - `VersionConflict`, `NotFound`, `Api` on a write are local to one record

use thiserror::Error;

/// Duplicate merge error type
#[derive(Debug, Error)]
pub enum DedupeError {
    /// Missing or invalid configuration, raised before any group is touched
    #[error("Configuration error: {0}")]
    Config(String),

    /// Write rejected because the record changed since it was read
    #[error("Version conflict on {key}: version {version} is stale")]
    VersionConflict { key: String, version: u64 },

    /// Network or service failure while listing records or children
    #[error("Fetch failed: {0}")]
    TransientFetch(String),

    /// Record vanished before the write
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Any other non-success API response
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// Response body could not be decoded
    #[error("Parse error: {0}")]
    Parse(String),

    /// paperflow-common error
    #[error("Common error: {0}")]
    Common(#[from] paperflow_common::Error),
}

impl DedupeError {
    pub fn is_version_conflict(&self) -> bool {
        matches!(self, DedupeError::VersionConflict { .. })
    }
}

/// Convenience Result type using DedupeError
pub type Result<T> = std::result::Result<T, DedupeError>;

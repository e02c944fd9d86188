//! Data models for the duplicate merge engine

pub mod bundle;
pub mod record;

pub use bundle::{is_primary_file, Bundle, RankKey};
pub use record::{Collection, Envelope, ItemType, Record, Tag};

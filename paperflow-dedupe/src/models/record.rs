//! Bibliographic record model
//!
//! Mirrors the `data` object of a Zotero item. Fields the merge engine reads
//! or rewrites are typed; everything else rides along in [`Record::extra`] so
//! that writing a record back never drops fields this crate does not know.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Item type tag
///
/// Notes and attachments are children; every other Zotero type
/// (`journalArticle`, `preprint`, `book`, ...) is a bibliographic entry kept
/// by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ItemType {
    Note,
    Attachment,
    Bibliographic(String),
}

impl ItemType {
    pub fn as_str(&self) -> &str {
        match self {
            ItemType::Note => "note",
            ItemType::Attachment => "attachment",
            ItemType::Bibliographic(name) => name,
        }
    }

    /// Notes and attachments never take part in duplicate grouping
    pub fn is_child_type(&self) -> bool {
        matches!(self, ItemType::Note | ItemType::Attachment)
    }
}

impl From<String> for ItemType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "note" => ItemType::Note,
            "attachment" => ItemType::Attachment,
            _ => ItemType::Bibliographic(value),
        }
    }
}

impl From<ItemType> for String {
    fn from(value: ItemType) -> Self {
        match value {
            ItemType::Bibliographic(name) => name,
            other => other.as_str().to_string(),
        }
    }
}

impl Default for ItemType {
    fn default() -> Self {
        ItemType::Bibliographic("journalArticle".to_string())
    }
}

impl std::fmt::Display for ItemType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tag attached to a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    /// Tag label, unique within one record after a merge
    pub tag: String,
    /// Zotero tag type (0 manual, 1 automatic)
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub tag_type: Option<i64>,
}

impl Tag {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            tag: label.into(),
            tag_type: None,
        }
    }
}

/// One library item (bibliographic entry, attachment or note)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// Stable library-unique key
    #[serde(default)]
    pub key: String,
    /// Optimistic concurrency stamp
    #[serde(default)]
    pub version: u64,
    #[serde(default)]
    pub item_type: ItemType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(rename = "DOI", default, skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Free-form publication date
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub collections: Vec<String>,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(
        default,
        deserialize_with = "key_or_false",
        skip_serializing_if = "Option::is_none"
    )]
    pub parent_item: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_mode: Option<String>,
    /// Note body (HTML)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_added: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_modified: Option<String>,
    /// Uninterpreted fields, written back verbatim
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Record {
    pub fn new(key: impl Into<String>, version: u64, item_type: ItemType) -> Self {
        Self {
            key: key.into(),
            version,
            item_type,
            ..Default::default()
        }
    }

    /// External identifier (DOI), also accepting a lower-case `doi` field
    pub fn identifier(&self) -> Option<&str> {
        self.doi
            .as_deref()
            .or_else(|| self.extra.get("doi").and_then(Value::as_str))
    }

    /// Publication year field, when the payload carries one
    ///
    /// Zotero itself only has `date`; some importers add a separate `year`,
    /// as a string or a number.
    pub fn year(&self) -> Option<String> {
        match self.extra.get("year")? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// `title [key]` for log lines
    pub fn label(&self) -> String {
        format!(
            "{} [{}]",
            self.title.as_deref().unwrap_or("(untitled)"),
            self.key
        )
    }
}

/// Zotero sends `parentItem: false` and `parentCollection: false` for top-level objects
fn key_or_false<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) if !s.is_empty() => Ok(Some(s)),
        _ => Ok(None),
    }
}

/// Library collection (folder)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    pub key: String,
    #[serde(default)]
    pub version: u64,
    pub name: String,
    #[serde(
        default,
        deserialize_with = "key_or_false",
        skip_serializing_if = "Option::is_none"
    )]
    pub parent_collection: Option<String>,
}

/// API envelope around a `data` object
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    pub key: String,
    pub version: u64,
    pub data: T,
}

impl Envelope<Record> {
    /// Envelope key/version are authoritative over the embedded copy
    pub fn into_record(self) -> Record {
        let mut record = self.data;
        record.key = self.key;
        record.version = self.version;
        record
    }
}

//! Record builders for library fixtures

use paperflow_dedupe::models::{ItemType, Record, Tag};
use paperflow_dedupe::store::MemoryStore;

/// Journal article with a title and a fixed modification stamp
pub fn paper(key: &str, title: &str) -> Record {
    let mut record = Record::new(key, 1, ItemType::Bibliographic("journalArticle".into()));
    record.title = Some(title.to_string());
    record.date_added = Some("2024-01-01T00:00:00Z".into());
    record.date_modified = Some("2024-01-01T00:00:00Z".into());
    record
}

pub fn attachment(key: &str, parent: &str, filename: &str, content_type: &str) -> Record {
    let mut record = Record::new(key, 1, ItemType::Attachment);
    record.parent_item = Some(parent.to_string());
    record.filename = Some(filename.to_string());
    record.content_type = Some(content_type.to_string());
    record.link_mode = Some("imported_file".into());
    record
}

pub fn pdf(key: &str, parent: &str) -> Record {
    attachment(key, parent, &format!("{}.pdf", key), "application/pdf")
}

pub fn note(key: &str, parent: &str, body: &str) -> Record {
    let mut record = Record::new(key, 1, ItemType::Note);
    record.parent_item = Some(parent.to_string());
    record.note = Some(body.to_string());
    record
}

/// Fluent builder over a [`MemoryStore`]
#[derive(Default)]
pub struct LibraryBuilder {
    records: Vec<Record>,
}

impl LibraryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, record: Record) -> Self {
        self.records.push(record);
        self
    }

    pub fn with_doi(self, key: &str, title: &str, doi: &str) -> Self {
        let mut record = paper(key, title);
        record.doi = Some(doi.to_string());
        self.with(record)
    }

    pub fn with_tagged(self, key: &str, title: &str, tags: &[&str], collections: &[&str]) -> Self {
        let mut record = paper(key, title);
        record.tags = tags.iter().map(|t| Tag::new(*t)).collect();
        record.collections = collections.iter().map(|c| c.to_string()).collect();
        self.with(record)
    }

    pub fn build(self) -> MemoryStore {
        MemoryStore::with_records(self.records)
    }
}

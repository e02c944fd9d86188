//! Bundle assembly
//!
//! Fetches a record's children and wraps both into a [`Bundle`] carrying the
//! facets the merge engine ranks on.

use crate::error::Result;
use crate::models::{Bundle, Record};
use crate::store::RecordStore;

/// Fetch children of `record` and build its bundle
///
/// A fetch failure is returned as is; the caller decides whether it is fatal.
pub async fn build_bundle<S>(store: &S, record: Record) -> Result<Bundle>
where
    S: RecordStore + ?Sized,
{
    let children = store.list_children(&record.key).await?;
    let bundle = Bundle::from_parts(record, children);

    tracing::debug!(
        key = %bundle.key(),
        attachments = bundle.attachments.len(),
        notes = bundle.notes.len(),
        has_primary_file = bundle.has_primary_file,
        "Built bundle"
    );

    Ok(bundle)
}

/// Build bundles for every record, in order, stopping at the first failure
pub async fn build_bundles<S>(store: &S, records: Vec<Record>) -> Result<Vec<Bundle>>
where
    S: RecordStore + ?Sized,
{
    let mut bundles = Vec::with_capacity(records.len());
    for record in records {
        bundles.push(build_bundle(store, record).await?);
    }
    Ok(bundles)
}

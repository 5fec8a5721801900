use crate::Library;
use crate::error::Result;
use crate::hash::digest_bounded;
use docshelf_metadata::{DocumentRecord, MetadataStore};
use std::sync::Arc;
use time::OffsetDateTime;

/// An existing record whose content matches incoming bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateInfo {
    /// Filename of the record that already holds this content.
    pub existing: String,
    pub content_hash: String,
    pub uploaded_at: OffsetDateTime,
    pub file_size: u64,
    /// The incoming filename is the one already holding this content.
    pub same_name: bool,
}
impl From<(&DocumentRecord, bool)> for DuplicateInfo {
    fn from((record, same_name): (&DocumentRecord, bool)) -> Self {
        Self {
            existing: record.filename.clone(),
            content_hash: record.content_hash.clone(),
            uploaded_at: record.uploaded_at,
            file_size: record.file_size,
            same_name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DuplicateCheck {
    Unique,
    Duplicate(DuplicateInfo),
}
impl DuplicateCheck {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate(_))
    }
}

/// Look for a record already holding `hash`.
///
/// When `filename` itself holds the hash it is reported (with `same_name`
/// set) in preference to any other record with the same content; otherwise
/// the first match in filename order is reported.
pub(crate) fn find_duplicate(store: &MetadataStore, filename: &str, hash: &str) -> Option<DuplicateInfo> {
    if let Some(record) = store.get(filename).filter(|record| record.content_hash == hash) {
        return Some((record, true).into());
    }
    store.find_by_hash(hash).map(|record| (record, false).into())
}

impl Library {
    /// Report whether `content` is already tracked, under `filename` or any
    /// other name.
    ///
    /// Read-only; the filename isn't validated since nothing is written.
    #[tracing::instrument(level = "debug", skip(self, content))]
    pub async fn check_duplicate(&self, filename: &str, content: impl Into<Arc<[u8]>>) -> Result<DuplicateCheck> {
        let hash = digest_bounded(content.into(), self.hash_timeout).await?;
        let store = self.store.lock().await;
        Ok(match find_duplicate(&store, filename, &hash) {
            Some(info) => DuplicateCheck::Duplicate(info),
            None => DuplicateCheck::Unique,
        })
    }
}

use crate::Library;
use crate::duplicate::{DuplicateInfo, find_duplicate};
use crate::error::{ErrorKind, Result};
use crate::hash::digest_bounded;
use docshelf_metadata::{DocumentRecord, MetadataStore};
use docshelf_storage::FileInfo;
use exn::ResultExt;
use std::cmp::Reverse;
use std::path::Path;
use std::sync::Arc;

/// Result of [`Library::add_document`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    /// The bytes were written and recorded.
    Added(DocumentRecord),
    /// Nothing was written because the content is already tracked.
    Duplicate(DuplicateInfo),
}

/// What [`Library::remove_document`] actually found to remove.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Removal {
    pub file_removed: bool,
    pub record_removed: bool,
}
impl Removal {
    /// Neither a file nor a record existed under that name.
    pub fn is_noop(&self) -> bool {
        !self.file_removed && !self.record_removed
    }
}

/// A record joined with the current state of its file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentListing {
    pub record: DocumentRecord,
    /// `None` when the file is no longer in the directory.
    pub current: Option<FileInfo>,
}
impl DocumentListing {
    pub fn exists(&self) -> bool {
        self.current.is_some()
    }
}

/// Result of [`Library::cleanup_orphaned_files`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cleanup {
    /// Recognized files with no record.
    pub orphaned: Vec<String>,
    /// How many of those were deleted.
    pub removed: usize,
}

impl Library {
    /// Store `content` under `filename` and record it.
    ///
    /// Unless `force` is set, content already tracked under any name is
    /// reported as [`AddOutcome::Duplicate`] and nothing is written. With
    /// `force`, an existing file of the same name is overwritten and its
    /// record replaced.
    ///
    /// The file is written before the record is committed. If the commit
    /// fails the in-memory records are left as they were and the write is
    /// undone where a record depends on it: an overwritten tracked file gets
    /// its previous bytes back. A brand new file stays on disk untracked and
    /// the next sync adopts it.
    #[tracing::instrument(skip(self, content))]
    pub async fn add_document(&self, filename: &str, content: impl Into<Arc<[u8]>>, force: bool) -> Result<AddOutcome> {
        let path = self.document_path(filename)?;
        if !self.is_recognized(filename) {
            exn::bail!(ErrorKind::UnsupportedExtension(filename.to_string()));
        }
        let content: Arc<[u8]> = content.into();
        let hash = digest_bounded(content.clone(), self.hash_timeout).await?;

        let mut store = self.store.lock().await;
        if !force && let Some(info) = find_duplicate(&store, filename, &hash) {
            tracing::info!(existing = %info.existing, same_name = info.same_name, "Duplicate content; not adding");
            return Ok(AddOutcome::Duplicate(info));
        }
        let previous = if store.contains(filename) {
            Some(self.read_existing(&path).await?)
        } else {
            None
        };
        self.backend.write(&path, &content).await.or_raise(|| ErrorKind::Storage)?;
        let record = DocumentRecord::uploaded(filename, hash, content.len() as u64, self.backend.location(&path));
        let replaced = match Self::commit(&mut store, |store| store.put(record.clone())).await {
            Ok(replaced) => replaced,
            Err(e) => {
                if let Some(previous) = previous {
                    self.revert_overwrite(&mut store, filename, &path, previous).await;
                }
                return Err(e);
            },
        };
        tracing::info!(hash = %record.content_hash, bytes = record.file_size, replaced = replaced.is_some(), "Added document");
        Ok(AddOutcome::Added(record))
    }

    /// Bytes currently stored for a tracked file; `None` if the file is
    /// already gone.
    async fn read_existing(&self, path: &Path) -> Result<Option<Vec<u8>>> {
        match self.backend.read(path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e).or_raise(|| ErrorKind::Storage),
        }
    }

    /// Put a tracked file back in step with its (unchanged) record after a
    /// failed commit: restore the old bytes, or remove the new file if the
    /// record had no file behind it. If that fails too, the record no longer
    /// describes the file, so it's dropped and the next sync re-adopts the
    /// file with its real hash.
    async fn revert_overwrite(&self, store: &mut MetadataStore, filename: &str, path: &Path, previous: Option<Vec<u8>>) {
        let reverted = match previous {
            Some(bytes) => self.backend.write(path, &bytes).await,
            None => self.backend.delete(path).await,
        };
        let Err(e) = reverted else {
            tracing::debug!(filename, "Reverted overwrite after failed commit");
            return;
        };
        tracing::warn!(filename, error = %*e, "Could not revert overwrite; dropping stale record");
        store.delete(filename);
        if let Err(e) = store.save().await {
            tracing::error!(filename, error = %*e, "Could not persist removal of stale record");
        }
    }

    /// Delete the file and the record for `filename`, whichever exist.
    ///
    /// A missing file is not an error. Any other failure to delete the file
    /// aborts before the record is touched.
    #[tracing::instrument(skip(self))]
    pub async fn remove_document(&self, filename: &str) -> Result<Removal> {
        let path = self.document_path(filename)?;
        let mut store = self.store.lock().await;
        let file_removed = match self.backend.delete(&path).await {
            Ok(()) => true,
            Err(e) if e.is_not_found() => false,
            Err(e) => return Err(e).or_raise(|| ErrorKind::Storage),
        };
        let record_removed = if store.contains(filename) {
            Self::commit(&mut store, |store| store.delete(filename)).await?.is_some()
        } else {
            false
        };
        let removal = Removal { file_removed, record_removed };
        if removal.is_noop() {
            tracing::debug!("Nothing to remove");
        } else {
            tracing::info!(file_removed, record_removed, "Removed document");
        }
        Ok(removal)
    }

    /// Every record, newest first, with its file's current size and
    /// modification time when the file still exists.
    pub async fn list_documents(&self) -> Vec<DocumentListing> {
        let store = self.store.lock().await;
        let mut listings = Vec::with_capacity(store.len());
        for (filename, record) in store.entries() {
            let current = match self.backend.stat(Path::new(filename)).await {
                Ok(info) => Some(info),
                Err(e) if e.is_not_found() => None,
                Err(e) => {
                    tracing::warn!(filename, error = %*e, "Could not stat document; listing it as missing");
                    None
                },
            };
            listings.push(DocumentListing { record: record.clone(), current });
        }
        listings.sort_by_key(|listing| Reverse(listing.record.uploaded_at));
        listings
    }

    /// Number of active records.
    pub async fn document_count(&self) -> usize {
        self.store.lock().await.records().values().filter(|record| record.is_active()).count()
    }

    /// Find recognized files that have no record and delete them.
    ///
    /// Individual delete failures are logged and leave the file in place.
    #[tracing::instrument(skip(self))]
    pub async fn cleanup_orphaned_files(&self) -> Result<Cleanup> {
        let store = self.store.lock().await;
        let files = self.backend.list().await.or_raise(|| ErrorKind::Storage)?;
        let mut cleanup = Cleanup::default();
        for info in &files {
            let Some(name) = self.candidate_name(info) else {
                continue;
            };
            if store.contains(name) {
                continue;
            }
            cleanup.orphaned.push(name.to_string());
            match self.backend.delete(&info.path).await {
                Ok(()) => cleanup.removed += 1,
                Err(e) => tracing::warn!(filename = name, error = %*e, "Could not delete orphaned file"),
            }
        }
        cleanup.orphaned.sort();
        tracing::info!(orphaned = cleanup.orphaned.len(), removed = cleanup.removed, "Cleaned up orphaned files");
        Ok(cleanup)
    }
}

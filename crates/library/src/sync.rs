use crate::Library;
use crate::error::{ErrorKind, Result};
use crate::hash::digest_bounded;
use docshelf_metadata::{DocumentRecord, MetadataStore};
use docshelf_storage::FileInfo;
use exn::ResultExt;
use futures::StreamExt;
use std::collections::HashSet;

/// What a reconciliation pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Recognized document files found in the directory.
    pub seen: usize,
    /// Files that gained a record, in filename order.
    pub new_files: Vec<String>,
    /// Records dropped because their file is gone, in filename order.
    pub removed_files: Vec<String>,
    /// Untracked files that couldn't be read or hashed this pass.
    pub skipped: Vec<String>,
    /// `false` when some directory entries couldn't be listed, in which case
    /// no records were dropped.
    pub complete: bool,
}
impl SyncReport {
    /// Whether anything downstream of the records (a search index, say)
    /// needs rebuilding.
    pub fn needs_reindex(&self) -> bool {
        !self.new_files.is_empty() || !self.removed_files.is_empty()
    }
}

impl Library {
    /// Make the records agree with the directory.
    ///
    /// Untracked files with a recognized extension are hashed and recorded
    /// using their modification time; records whose file has disappeared are
    /// dropped. Tracked files are never re-hashed.
    ///
    /// If the directory can't be listed at all the pass fails without
    /// touching anything. If only some entries fail, additions still happen
    /// but removals are skipped, since a file that failed to list isn't
    /// known to be gone.
    #[tracing::instrument(skip(self))]
    pub async fn sync_with_filesystem(&self) -> Result<SyncReport> {
        let mut store = self.store.lock().await;
        self.reconcile(&mut store).await
    }

    /// The body of [`sync_with_filesystem`](Self::sync_with_filesystem), for
    /// callers already holding the lock.
    pub(crate) async fn reconcile(&self, store: &mut MetadataStore) -> Result<SyncReport> {
        let (files, failures) = self.scan_directory().await?;
        let mut report = SyncReport {
            complete: failures == 0,
            ..SyncReport::default()
        };
        let present: HashSet<&str> = files.iter().filter_map(FileInfo::file_name).collect();

        let snapshot = store.snapshot();
        for info in &files {
            let Some(name) = self.candidate_name(info) else {
                continue;
            };
            report.seen += 1;
            if store.contains(name) {
                continue;
            }
            match self.adopt(info, name).await {
                Ok(record) => {
                    tracing::debug!(filename = name, hash = %record.content_hash, "Discovered untracked document");
                    store.put(record);
                    report.new_files.push(name.to_string());
                },
                Err(e) => {
                    tracing::warn!(filename = name, error = %*e, "Skipping file that could not be hashed");
                    report.skipped.push(name.to_string());
                },
            }
        }

        if report.complete {
            let missing: Vec<String> =
                store.entries().map(|(name, _)| name).filter(|name| !present.contains(name)).map(String::from).collect();
            for name in missing {
                store.delete(&name);
                report.removed_files.push(name);
            }
        } else {
            tracing::warn!(failures, "Directory listing was incomplete; not dropping any records");
        }

        // Saved even when nothing changed, which rewrites a sidecar that
        // failed to load into a clean one.
        if let Err(e) = store.save().await {
            store.restore(snapshot);
            return Err(e).or_raise(|| ErrorKind::Metadata);
        }
        report.new_files.sort();
        tracing::info!(
            seen = report.seen,
            added = report.new_files.len(),
            removed = report.removed_files.len(),
            skipped = report.skipped.len(),
            "Synchronized with directory",
        );
        Ok(report)
    }

    /// List the directory, tolerating individual entry failures. Fails only
    /// when nothing at all could be listed.
    async fn scan_directory(&self) -> Result<(Vec<FileInfo>, usize)> {
        let mut stream = self.backend.list_stream();
        let mut files = Vec::new();
        let mut failures = 0;
        let mut first_error = None;
        while let Some(item) = stream.next().await {
            match item {
                Ok(info) => files.push(info),
                Err(e) => {
                    tracing::warn!(error = %*e, "Could not list directory entry");
                    failures += 1;
                    first_error.get_or_insert(e);
                },
            }
        }
        match first_error {
            Some(e) if files.is_empty() => Err(e).or_raise(|| ErrorKind::Storage),
            _ => Ok((files, failures)),
        }
    }

    async fn adopt(&self, info: &FileInfo, name: &str) -> Result<DocumentRecord> {
        let content = self.backend.read(&info.path).await.or_raise(|| ErrorKind::Storage)?;
        let size = content.len() as u64;
        let hash = digest_bounded(content.into(), self.hash_timeout).await?;
        Ok(DocumentRecord::synced(name, hash, size, self.backend.location(&info.path), info.modified))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{SIDECAR, library};
    use crate::{AddOutcome, DuplicateCheck, Options, digest};
    use docshelf_metadata::Origin;
    use docshelf_storage::StorageBackend;
    use docshelf_storage::backend::LocalBackend;
    use std::path::Path;
    use std::sync::Arc;
    use time::macros::datetime;

    #[tokio::test]
    async fn test_sync_adopts_untracked_files() {
        let (backend, library) = library(&[("b.pdf", b"%PDF-1.7"), ("a.txt", b"hello"), ("photo.JPG", b"jpg")]).await;
        backend.set_modified("a.txt", datetime!(2021-06-01 12:00 UTC)).await;

        let report = library.sync_with_filesystem().await.unwrap();
        assert_eq!(report.seen, 2);
        assert_eq!(report.new_files, vec!["a.txt".to_string(), "b.pdf".to_string()]);
        assert!(report.removed_files.is_empty());
        assert!(report.complete);
        assert!(report.needs_reindex());

        let record = library.document("a.txt").await.unwrap();
        assert_eq!(record.content_hash, digest(b"hello"));
        assert_eq!(record.uploaded_at, datetime!(2021-06-01 12:00 UTC));
        assert_eq!(record.origin, Origin::Synced);
        assert!(library.document("photo.JPG").await.is_none());
    }

    #[tokio::test]
    async fn test_sync_is_idempotent() {
        let (_, library) = library(&[("a.txt", b"hello")]).await;
        library.sync_with_filesystem().await.unwrap();
        let report = library.sync_with_filesystem().await.unwrap();
        assert_eq!(report.seen, 1);
        assert!(!report.needs_reindex());
    }

    #[tokio::test]
    async fn test_sync_drops_records_for_missing_files() {
        let (backend, library) = library(&[]).await;
        library.add_document("gone.txt", b"bye".to_vec(), false).await.unwrap();
        library.add_document("kept.txt", b"hi".to_vec(), false).await.unwrap();
        backend.delete(Path::new("gone.txt")).await.unwrap();

        let report = library.sync_with_filesystem().await.unwrap();
        assert_eq!(report.removed_files, vec!["gone.txt".to_string()]);
        assert!(report.new_files.is_empty());
        assert!(library.document("gone.txt").await.is_none());
        assert!(library.document("kept.txt").await.is_some());
    }

    #[tokio::test]
    async fn test_sync_does_not_rehash_tracked_files() {
        let (backend, library) = library(&[]).await;
        library.add_document("notes.txt", b"hello".to_vec(), false).await.unwrap();
        backend.write(Path::new("notes.txt"), b"edited outside").await.unwrap();
        library.sync_with_filesystem().await.unwrap();
        assert_eq!(library.document("notes.txt").await.unwrap().content_hash, digest(b"hello"));
    }

    #[tokio::test]
    async fn test_sync_skips_unreadable_files() {
        let (backend, library) = library(&[("ok.txt", b"ok"), ("locked.pdf", b"%PDF")]).await;
        backend.poison("locked.pdf").await;

        let report = library.sync_with_filesystem().await.unwrap();
        assert_eq!(report.new_files, vec!["ok.txt".to_string()]);
        assert_eq!(report.skipped, vec!["locked.pdf".to_string()]);

        backend.cure("locked.pdf").await;
        let report = library.sync_with_filesystem().await.unwrap();
        assert_eq!(report.new_files, vec!["locked.pdf".to_string()]);
    }

    #[tokio::test]
    async fn test_sync_keeps_tracked_files_with_other_extensions() {
        let (backend, library) = library(&[]).await;
        library.add_document("notes.txt", b"hello".to_vec(), false).await.unwrap();
        // Reopen with a narrower set of extensions; the existing record stays.
        let narrowed = Options {
            extensions: vec!["pdf".to_string()],
            ..Options::default()
        };
        let library = Library::open(backend, SIDECAR, narrowed).await;
        let report = library.sync_with_filesystem().await.unwrap();
        assert_eq!(report.seen, 0);
        assert!(report.removed_files.is_empty());
        assert!(library.document("notes.txt").await.is_some());
    }

    #[tokio::test]
    async fn test_sync_save_failure_restores_records() {
        let (backend, library) = library(&[("a.txt", b"hello")]).await;
        backend.poison(format!("{SIDECAR}.tmp")).await;
        let err = library.sync_with_filesystem().await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Metadata));
        assert_eq!(library.document_count().await, 0);
    }

    #[tokio::test]
    async fn test_sync_heals_corrupt_sidecar() {
        let (backend, library) = library(&[(SIDECAR, b"{ not json"), ("a.txt", b"hello")]).await;
        library.sync_with_filesystem().await.unwrap();
        let saved = backend.read(Path::new(SIDECAR)).await.unwrap();
        assert_eq!(MetadataStore::parse(&saved).len(), 1);
    }

    #[tokio::test]
    async fn test_sync_fails_when_root_vanishes() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path().join("data");
        let backend = Arc::new(LocalBackend::new("local", &root).unwrap());
        let library = Library::open(backend, SIDECAR, Options::default()).await;
        library.add_document("notes.txt", b"hello".to_vec(), false).await.unwrap();

        std::fs::remove_dir_all(&root).unwrap();
        let err = library.sync_with_filesystem().await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Storage));
        assert!(library.document("notes.txt").await.is_some());
    }

    /// Full walk through a local directory: adopt, deduplicate, remove.
    #[tokio::test]
    async fn test_local_directory_lifecycle() {
        let temp_dir = tempfile::tempdir().unwrap();
        std::fs::write(temp_dir.path().join("notes.txt"), b"hello").unwrap();
        let backend = Arc::new(LocalBackend::new("local", temp_dir.path()).unwrap());
        let library = Library::open(backend.clone(), SIDECAR, Options::default()).await;

        let report = library.sync_with_filesystem().await.unwrap();
        assert_eq!(report.new_files, vec!["notes.txt".to_string()]);
        let record = library.document("notes.txt").await.unwrap();
        assert_eq!(record.content_hash, "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824");
        assert_eq!(record.file_path, temp_dir.path().join("notes.txt"));

        let check = library.check_duplicate("copy.txt", b"hello".to_vec()).await.unwrap();
        let DuplicateCheck::Duplicate(info) = check else {
            panic!("expected a duplicate");
        };
        assert_eq!(info.existing, "notes.txt");
        assert!(!info.same_name);

        let outcome = library.add_document("copy.txt", b"hello".to_vec(), false).await.unwrap();
        assert!(matches!(outcome, AddOutcome::Duplicate(_)));
        assert!(!temp_dir.path().join("copy.txt").exists());

        library.remove_document("notes.txt").await.unwrap();
        assert!(!temp_dir.path().join("notes.txt").exists());
        assert_eq!(library.document_count().await, 0);

        // A fresh library over the same directory sees the persisted state.
        let reopened = Library::open(backend, SIDECAR, Options::default()).await;
        assert_eq!(reopened.document_count().await, 0);
        assert!(temp_dir.path().join(SIDECAR).exists());
        assert!(!temp_dir.path().join(format!("{SIDECAR}.tmp")).exists());
    }

    /// notes.txt is adopted, copy.txt is refused as a duplicate, forced in,
    /// then deleted behind the library's back.
    #[tokio::test]
    async fn test_notes_and_copy_scenario() {
        let temp_dir = tempfile::tempdir().unwrap();
        std::fs::write(temp_dir.path().join("notes.txt"), b"hello").unwrap();
        let backend = Arc::new(LocalBackend::new("local", temp_dir.path()).unwrap());
        let library = Library::open(backend, SIDECAR, Options::default()).await;

        let report = library.sync_with_filesystem().await.unwrap();
        assert_eq!(report.new_files, vec!["notes.txt".to_string()]);
        let hello = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";
        assert_eq!(library.document("notes.txt").await.unwrap().content_hash, hello);

        let outcome = library.add_document("copy.txt", b"hello".to_vec(), false).await.unwrap();
        assert!(matches!(outcome, AddOutcome::Duplicate(ref info) if info.existing == "notes.txt" && !info.same_name));

        let outcome = library.add_document("copy.txt", b"hello".to_vec(), true).await.unwrap();
        assert!(matches!(outcome, AddOutcome::Added(_)));
        assert_eq!(library.document_count().await, 2);
        assert_eq!(library.document("copy.txt").await.unwrap().content_hash, hello);

        std::fs::remove_file(temp_dir.path().join("copy.txt")).unwrap();
        let report = library.sync_with_filesystem().await.unwrap();
        assert_eq!(report.removed_files, vec!["copy.txt".to_string()]);
        assert!(report.new_files.is_empty());

        let stats = library.storage_stats().await.unwrap();
        assert_eq!(stats.total_files, 1);
        assert_eq!(stats.total_size_bytes, 5);
    }

    #[tokio::test]
    async fn test_concurrent_syncs_adopt_once() {
        let (_, library) = library(&[("a.txt", b"hello")]).await;
        let (first, second) = tokio::join!(library.sync_with_filesystem(), library.sync_with_filesystem());
        let adopted = first.unwrap().new_files.len() + second.unwrap().new_files.len();
        assert_eq!(adopted, 1);
        assert_eq!(library.document_count().await, 1);
    }
}

//! A flat directory of documents with a content-hash index.
//!
//! The [`Library`] owns the directory (through a storage backend) and its
//! metadata sidecar, and is the only thing that should touch either: every
//! operation that reads or mutates the records runs under a single lock, so
//! overlapping calls from different tasks can't corrupt the sidecar.
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use docshelf_library::{Library, Options};
//! # use docshelf_storage::backend::LocalBackend;
//! # async fn example() -> docshelf_library::error::Result<()> {
//! let backend = Arc::new(LocalBackend::new("local", "/srv/documents").unwrap());
//! let library = Library::open(backend, "document_metadata.json", Options::default()).await;
//! let report = library.sync_with_filesystem().await?;
//! println!("{} new, {} gone", report.new_files.len(), report.removed_files.len());
//! # Ok(())
//! # }
//! ```

mod documents;
mod duplicate;
pub mod error;
mod hash;
mod stats;
mod sync;

pub use crate::documents::{AddOutcome, Cleanup, DocumentListing, Removal};
pub use crate::duplicate::{DuplicateCheck, DuplicateInfo};
pub use crate::hash::{digest, digest_bounded};
pub use crate::stats::StorageStats;
pub use crate::sync::SyncReport;
pub use docshelf_metadata::{DocumentRecord, Origin, Status};

use crate::error::{ErrorKind, Result};
use docshelf_metadata::MetadataStore;
use docshelf_storage::{BackendHandle, FileInfo};
use exn::ResultExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::Mutex;

/// Extensions accepted when nothing else is configured.
pub const DEFAULT_EXTENSIONS: [&str; 3] = ["pdf", "txt", "docx"];
/// How long hashing a single file may take.
pub const DEFAULT_HASH_TIMEOUT: Duration = Duration::from_secs(30);

/// Tunables for a [`Library`].
#[derive(Debug, Clone)]
pub struct Options {
    /// Recognized extensions, without the leading dot. Compared
    /// case-insensitively.
    pub extensions: Vec<String>,
    pub hash_timeout: Duration,
}
impl Default for Options {
    fn default() -> Self {
        Self {
            extensions: DEFAULT_EXTENSIONS.iter().map(ToString::to_string).collect(),
            hash_timeout: DEFAULT_HASH_TIMEOUT,
        }
    }
}

pub struct Library {
    backend: BackendHandle,
    store: Mutex<MetadataStore>,
    metadata_file: PathBuf,
    temp_file: PathBuf,
    extensions: Vec<String>,
    hash_timeout: Duration,
}

impl Library {
    /// Open the library over `backend`, loading the sidecar at
    /// `metadata_file` (relative to the backend root).
    ///
    /// Never fails; see [`MetadataStore::open`].
    pub async fn open(backend: BackendHandle, metadata_file: impl Into<PathBuf>, options: Options) -> Self {
        let store = MetadataStore::open(backend.clone(), metadata_file).await;
        tracing::debug!(
            backend = backend.name(),
            sidecar = %store.path().display(),
            records = store.len(),
            "Opened document library",
        );
        Self {
            metadata_file: store.path().to_path_buf(),
            temp_file: store.temp_path(),
            store: Mutex::new(store),
            backend,
            extensions: options
                .extensions
                .into_iter()
                .map(|ext| ext.trim_start_matches('.').to_lowercase())
                .collect(),
            hash_timeout: options.hash_timeout,
        }
    }

    /// Current record for `filename`, if tracked.
    pub async fn document(&self, filename: &str) -> Option<DocumentRecord> {
        self.store.lock().await.get(filename).cloned()
    }

    /// Whether `filename` carries one of the configured extensions.
    pub fn is_recognized(&self, filename: &str) -> bool {
        Path::new(filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|known| known.eq_ignore_ascii_case(ext)))
    }

    /// The sidecar and its temporary file share the directory with the
    /// documents but are never documents themselves.
    fn is_reserved(&self, filename: &str) -> bool {
        Path::new(filename) == self.metadata_file || Path::new(filename) == self.temp_file
    }

    /// Name of a listed file if it's a document this library manages.
    fn candidate_name<'a>(&self, info: &'a FileInfo) -> Option<&'a str> {
        info.file_name().filter(|name| !self.is_reserved(name) && self.is_recognized(name))
    }

    /// Validate a filename supplied by a caller, returning it as a storage
    /// path.
    fn document_path(&self, filename: &str) -> Result<PathBuf> {
        let path =
            docshelf_storage::validate_name(filename).or_raise(|| ErrorKind::InvalidFilename(filename.to_string()))?;
        if self.is_reserved(filename) {
            exn::bail!(ErrorKind::ReservedFilename(filename.to_string()));
        }
        Ok(path)
    }

    /// Apply `change` to the store and persist it. If persisting fails the
    /// in-memory records are put back the way they were, so memory never
    /// runs ahead of what's on disk.
    async fn commit<T>(store: &mut MetadataStore, change: impl FnOnce(&mut MetadataStore) -> T) -> Result<T> {
        let snapshot = store.snapshot();
        let changed = change(store);
        if let Err(e) = store.save().await {
            store.restore(snapshot);
            return Err(e).or_raise(|| ErrorKind::Metadata);
        }
        Ok(changed)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::library;
    use docshelf_storage::backend::MockBackend;
    use rstest::rstest;
    use std::sync::Arc;

    #[rstest]
    #[case("report.pdf", true)]
    #[case("REPORT.PDF", true)]
    #[case("notes.Txt", true)]
    #[case("letter.docx", true)]
    #[case("image.png", false)]
    #[case("README", false)]
    #[case(".pdf", false)]
    #[tokio::test]
    async fn test_is_recognized(#[case] filename: &str, #[case] expected: bool) {
        let (_, library) = library(&[]).await;
        assert_eq!(library.is_recognized(filename), expected);
    }

    #[tokio::test]
    async fn test_extensions_are_normalized() {
        let backend = Arc::new(MockBackend::default());
        let options = Options {
            extensions: vec![".MD".to_string()],
            ..Options::default()
        };
        let library = Library::open(backend, "meta.json", options).await;
        assert!(library.is_recognized("readme.md"));
        assert!(!library.is_recognized("notes.txt"));
    }

    #[rstest]
    #[case("../escape.txt")]
    #[case("nested/notes.txt")]
    #[case("/etc/passwd.txt")]
    #[case("")]
    #[tokio::test]
    async fn test_document_path_rejects_unsafe_names(#[case] filename: &str) {
        let (_, library) = library(&[]).await;
        let err = library.document_path(filename).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidFilename(_)));
    }

    #[rstest]
    #[case("document_metadata.json")]
    #[case("document_metadata.json.tmp")]
    #[tokio::test]
    async fn test_document_path_rejects_sidecar(#[case] filename: &str) {
        let (_, library) = library(&[]).await;
        let err = library.document_path(filename).unwrap_err();
        assert!(matches!(&*err, ErrorKind::ReservedFilename(_)));
    }
}

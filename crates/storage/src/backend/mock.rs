//! In-memory storage backend for testing.

use super::FileInfoStream;
use crate::error::{ErrorKind, Result};
use crate::models::FileInfo;
use crate::path::validate as validate_path;
use async_stream::stream;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use tokio::sync::RwLock;

use crate::StorageBackend;

#[derive(Clone)]
struct MockFile {
    modified: OffsetDateTime,
    data: Vec<u8>,
}

/// In-memory storage backend for testing.
///
/// Files are stored in a `HashMap` behind a [`RwLock`], so all trait methods
/// can operate on `&self` without external synchronisation. Paths can be
/// [poisoned](MockBackend::poison) to simulate I/O failures.
///
/// # Examples
///
/// ```
/// use docshelf_storage::backend::{MockBackend, StorageBackend};
/// use std::path::Path;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let backend = MockBackend::with_files([("notes.txt", b"hello")]);
/// assert!(backend.exists(Path::new("notes.txt")).await.unwrap());
///
/// backend.write(Path::new("report.pdf"), b"%PDF").await.unwrap();
/// assert!(backend.exists(Path::new("report.pdf")).await.unwrap());
/// # }
/// ```
pub struct MockBackend {
    name: String,
    storage: RwLock<HashMap<PathBuf, MockFile>>,
    poisoned: RwLock<HashSet<PathBuf>>,
}

impl MockBackend {
    /// Create a mock backend pre-populated with files.
    ///
    /// Panics if any path fails validation (e.g. path traversal). If test
    /// setup is wrong, then test should not pass.
    pub fn with_files(files: impl IntoIterator<Item = (impl Into<PathBuf>, impl Into<Vec<u8>>)>) -> Self {
        let mut map = HashMap::new();
        let now = OffsetDateTime::now_utc();
        for (path, data) in files {
            let path = path.into();
            let Ok(validated) = validate_path(&path) else {
                panic!("MockBackend::with_files: invalid path {}", path.display());
            };
            map.insert(validated, MockFile { modified: now, data: data.into() });
        }
        Self {
            name: "mock".to_string(),
            storage: RwLock::new(map),
            poisoned: RwLock::new(HashSet::new()),
        }
    }

    /// Override the modification time of an existing file.
    ///
    /// Panics if the file doesn't exist.
    pub async fn set_modified(&self, path: impl AsRef<Path>, modified: OffsetDateTime) {
        let path = path.as_ref();
        let mut guard = self.storage.write().await;
        let Some(file) = guard.get_mut(path) else {
            panic!("MockBackend::set_modified: no such file {}", path.display());
        };
        file.modified = modified;
    }

    /// Make every read, write, delete and rename touching `path` fail with
    /// an I/O error. Listing, `exists` and `stat` are unaffected.
    pub async fn poison(&self, path: impl Into<PathBuf>) {
        self.poisoned.write().await.insert(path.into());
    }

    /// Undo [`poison`](Self::poison).
    pub async fn cure(&self, path: impl AsRef<Path>) {
        self.poisoned.write().await.remove(path.as_ref());
    }

    async fn check_poison(&self, path: &Path) -> Result<()> {
        if self.poisoned.read().await.contains(path) {
            exn::bail!(ErrorKind::Io(std::io::Error::other(format!("poisoned path: {}", path.display()))));
        }
        Ok(())
    }

    fn file_info(path: &Path, file: &MockFile) -> FileInfo {
        FileInfo::new(path, file.data.len() as u64, file.modified)
    }
}
impl Default for MockBackend {
    fn default() -> Self {
        let files: [(&str, &str); 0] = [];
        Self::with_files(files)
    }
}

#[async_trait]
impl StorageBackend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_stream(&self) -> FileInfoStream<'_> {
        Box::pin(stream! {
            // Snapshot under the read lock, then drop it before yielding to
            // avoid holding the lock across yield points.
            let entries: Vec<FileInfo> = {
                let guard = self.storage.read().await;
                guard
                    .iter()
                    // Mirror the local backend: only files directly in the root.
                    .filter(|(path, _)| path.components().count() == 1)
                    .map(|(path, file)| Self::file_info(path, file))
                    .collect()
            };
            for info in entries {
                yield Ok(info);
            }
        })
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        let path = validate_path(path)?;
        Ok(self.storage.read().await.contains_key(&path))
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let path = validate_path(path)?;
        self.check_poison(&path).await?;
        let file = self.storage.read().await.get(&path).cloned().ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(path)))?;
        Ok(file.data)
    }

    async fn write(&self, path: &Path, data: &[u8]) -> Result<()> {
        let path = validate_path(path)?;
        self.check_poison(&path).await?;
        let file = MockFile { modified: OffsetDateTime::now_utc(), data: data.to_vec() };
        self.storage.write().await.insert(path, file);
        Ok(())
    }

    async fn delete(&self, path: &Path) -> Result<()> {
        let path = validate_path(path)?;
        self.check_poison(&path).await?;
        self.storage.write().await.remove(&path).map(|_| ()).ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(path)))
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let from = validate_path(from)?;
        let to = validate_path(to)?;
        self.check_poison(&from).await?;
        self.check_poison(&to).await?;
        let mut guard = self.storage.write().await;
        let file = guard.remove(&from).ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(from)))?;
        guard.insert(to, file);
        Ok(())
    }

    async fn stat(&self, path: &Path) -> Result<FileInfo> {
        let path = validate_path(path)?;
        let guard = self.storage.read().await;
        let file = guard.get(&path).ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(path.clone())))?;
        Ok(Self::file_info(&path, file))
    }
}

//! Local filesystem storage backend.
//!
//! Files are stored in a configured directory and accessed using standard
//! filesystem operations via `tokio::fs` for async I/O.

use crate::backend::FileInfoStream;
use crate::error::ErrorKind;
use crate::{FileInfo, StorageBackend, error::Result, path::validate as validate_path};
use async_stream::stream;
use async_trait::async_trait;
use exn::ResultExt;
use std::ffi::OsString;
use std::fs::{Metadata, create_dir_all as sync_create_dir};
use std::path::{Path, PathBuf};
use tokio::fs::{self, DirEntry};
use tokio::io::AsyncWriteExt;

/// Local filesystem storage backend.
///
/// Stores files in a directory on the local filesystem. All paths are relative
/// to the configured root directory.
///
/// # Examples
///
/// ```no_run
/// use docshelf_storage::backend::LocalBackend;
///
/// let backend = LocalBackend::new("local", "/srv/documents");
/// assert!(backend.is_ok());
/// ```
#[derive(Clone)]
pub struct LocalBackend {
    name: String,
    /// Root directory holding the documents
    root: PathBuf,
}
impl LocalBackend {
    /// Create a new local filesystem backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is not absolute, or if it exists but is
    /// not a directory.
    pub fn new(name: impl Into<String>, root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_absolute() {
            exn::bail!(ErrorKind::InvalidPath(root));
        }

        if root.exists() {
            if !root.is_dir() {
                exn::bail!(ErrorKind::InvalidPath(root));
            }
        } else {
            // Use non-async here; it'll only happen once on startup and it's
            // not worth the hassle of making the constructor async.
            sync_create_dir(&root).map_err(|e| ErrorKind::from_io(e, &root))?;
        }

        Ok(Self { name: name.into(), root })
    }

    /// Get the absolute path for a relative storage path.
    ///
    /// Validates the path and joins it with the root directory.
    fn absolute_path(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let validated = validate_path(path.as_ref())?;
        Ok(self.root.join(validated))
    }

    /// Convert an absolute path back to a relative storage path.
    fn relative_path(&self, absolute: impl AsRef<Path>) -> Result<PathBuf> {
        let absolute = absolute.as_ref();
        let relative = absolute.strip_prefix(&self.root).or_raise(|| {
            ErrorKind::BackendError(format!("path `{:?}` is not within root `{:?}`", absolute, self.root))
        })?;
        Ok(validate_path(relative)?)
    }

    /// Re-use same data collection from file metadata for both list and stat functions
    fn metadata(path: &Path, metadata: Metadata) -> Result<FileInfo> {
        let modified = metadata.modified().map_err(ErrorKind::Io)?.into();
        Ok(FileInfo::new(PathBuf::from(path), metadata.len(), modified))
    }

    /// Keeps the `?`-unfriendly stream loop readable: resolve one directory
    /// entry to a [`FileInfo`], or `None` when it isn't a regular file.
    async fn process_entry(&self, entry: DirEntry) -> Result<Option<FileInfo>> {
        let path = entry.path();
        let metadata = entry.metadata().await.map_err(|e| ErrorKind::from_io(e, &path))?;
        // Directories aren't walked and broken symlinks are silently dropped.
        if !metadata.is_file() {
            return Ok(None);
        }
        let relative = self.relative_path(&path)?;
        Ok(Some(Self::metadata(&relative, metadata)?))
    }
}

/// Hidden sibling that [`LocalBackend::write`] stages into. Its `.partial`
/// extension keeps it out of any document listing.
fn staging_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(".");
    name.push(path.file_name().unwrap_or_default());
    name.push(".partial");
    path.with_file_name(name)
}

#[async_trait]
impl StorageBackend for LocalBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn location(&self, path: &Path) -> PathBuf {
        self.root.join(path)
    }

    fn list_stream(&self) -> FileInfoStream<'_> {
        Box::pin(stream! {
            // A missing root is an error rather than an empty listing: an
            // unmounted volume must not look like a directory of zero files.
            let mut entries = match fs::read_dir(&self.root).await {
                Ok(entries) => entries,
                Err(err) => {
                    yield Err(exn::Exn::from(ErrorKind::from_io(err, &self.root)));
                    return;
                }
            };
            loop {
                let entry = match entries.next_entry().await {
                    Ok(Some(entry)) => entry,
                    Ok(None) => break,
                    Err(e) => { yield Err(exn::Exn::from(ErrorKind::from_io(e, &self.root))); continue; },
                };
                match self.process_entry(entry).await {
                    Ok(Some(info)) => yield Ok(info),
                    Ok(None) => {},
                    Err(e) => yield Err(e),
                }
            }
        })
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        let abs_path = self.absolute_path(path)?;
        Ok(fs::try_exists(&abs_path).await.map_err(ErrorKind::Io)?)
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let abs_path = self.absolute_path(path)?;
        Ok(fs::read(&abs_path).await.map_err(|e| ErrorKind::from_io(e, path))?)
    }

    async fn write(&self, path: &Path, data: &[u8]) -> Result<()> {
        let abs_path = self.absolute_path(path)?;
        if let Some(parent) = abs_path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| ErrorKind::from_io(e, path))?;
        }
        // Stage the bytes in a sibling and rename over the target, so a crash
        // mid-write never leaves a truncated document in place.
        let staging = staging_path(&abs_path);
        let written = async {
            let mut file = fs::File::create(&staging).await?;
            file.write_all(data).await?;
            file.sync_all().await?;
            fs::rename(&staging, &abs_path).await
        }
        .await;
        if let Err(e) = written {
            fs::remove_file(&staging).await.ok();
            exn::bail!(ErrorKind::from_io(e, path));
        }
        Ok(())
    }

    async fn delete(&self, path: &Path) -> Result<()> {
        let abs_path = self.absolute_path(path)?;
        Ok(fs::remove_file(&abs_path).await.map_err(|e| ErrorKind::from_io(e, path))?)
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let from_path = self.absolute_path(from)?;
        let to_path = self.absolute_path(to)?;
        if let Some(parent) = to_path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| ErrorKind::from_io(e, to))?;
        }
        Ok(fs::rename(&from_path, &to_path).await.map_err(|e| ErrorKind::from_io(e, from))?)
    }

    async fn stat(&self, path: &Path) -> Result<FileInfo> {
        let abs_path = self.absolute_path(path)?;
        let metadata = fs::metadata(&abs_path).await.map_err(|e| ErrorKind::from_io(e, path))?;
        if !metadata.is_file() {
            exn::bail!(ErrorKind::NotFound(path.to_path_buf()));
        }
        Self::metadata(path, metadata)
    }
}

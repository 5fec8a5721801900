//! Storage Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::io::Error as IoError;
use std::path::{Path, PathBuf};

/// A storage error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for storage operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// File does not exist
    #[display("file not found: {}", _0.display())]
    NotFound(#[error(not(source))] PathBuf),
    /// Access denied (permissions or credentials)
    #[display("permission denied: {}", _0.display())]
    PermissionDenied(#[error(not(source))] PathBuf),
    /// Underlying I/O error
    #[display("I/O error: {_0}")]
    Io(IoError),
    /// Path contains invalid characters, escapes root, or isn't a plain filename
    #[display("invalid path: {}", _0.display())]
    InvalidPath(#[error(not(source))] PathBuf),
    /// Backend-specific error
    #[display("backend error: {_0}")]
    BackendError(#[error(not(source))] String),
}
impl From<IoError> for ErrorKind {
    fn from(err: IoError) -> Self {
        Self::Io(err)
    }
}

impl ErrorKind {
    /// Map a [`std::io::Error`] into the most specific kind for `path`.
    pub fn from_io(err: IoError, path: &Path) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io(err),
        }
    }

    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_) | Self::BackendError(_))
    }

    /// Returns `true` for [`ErrorKind::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_io_maps_kinds() {
        let path = Path::new("report.pdf");
        let not_found = IoError::new(std::io::ErrorKind::NotFound, "gone");
        assert!(matches!(ErrorKind::from_io(not_found, path), ErrorKind::NotFound(p) if p == path));
        let denied = IoError::new(std::io::ErrorKind::PermissionDenied, "nope");
        assert!(matches!(ErrorKind::from_io(denied, path), ErrorKind::PermissionDenied(_)));
        let other = IoError::other("disk on fire");
        assert!(matches!(ErrorKind::from_io(other, path), ErrorKind::Io(_)));
    }

    #[test]
    fn test_retryable() {
        assert!(ErrorKind::Io(IoError::other("x")).is_retryable());
        assert!(!ErrorKind::NotFound(PathBuf::from("a.txt")).is_retryable());
        assert!(!ErrorKind::InvalidPath(PathBuf::from("..")).is_retryable());
    }

    #[test]
    fn test_display() {
        assert_eq!(ErrorKind::NotFound(PathBuf::from("a.txt")).to_string(), "file not found: a.txt");
        assert_eq!(ErrorKind::BackendError("boom".to_string()).to_string(), "backend error: boom");
    }
}

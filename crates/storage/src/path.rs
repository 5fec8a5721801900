//! Path validation and security utilities.
//!
//! This module provides functions to validate storage paths and prevent
//! security issues like path traversal attacks.

use std::path::{Component, Path, PathBuf};

use crate::error::{ErrorKind, Result};

/// Validates a storage path for security and correctness.
/// Ensures that paths don't escape the storage root (no `..` traversal).
///
/// > **Note:** This does **not** normalize backslashes, non-UTF8 bytes, or
/// >           platform-specific weirdness. Null bytes are explicitly rejected.
///
/// # Returns
/// Returns the normalized path if valid, or [`InvalidPath`](crate::error::ErrorKind::InvalidPath)
/// if invalid.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use docshelf_storage::validate_path;
/// // Valid paths
/// assert!(validate_path("notes.txt").is_ok());
/// assert!(validate_path("a/../notes.txt").is_ok()); // (never leaves the root)
/// // Invalid paths
/// assert!(validate_path("../etc/passwd").is_err());
/// assert!(validate_path("a\0b").is_err());
/// // Paths get resolved
/// assert_eq!(validate_path("./misc/../notes.txt").unwrap(), Path::new("notes.txt"));
/// ```
pub fn validate(path: impl AsRef<Path>) -> Result<PathBuf> {
    let mut components = Vec::new();
    for component in path.as_ref().components() {
        match component {
            Component::Normal(s) => {
                // Null bytes pass through Path::components() on Unix but cause
                // truncation in C-based syscalls; reject them explicitly.
                if s.as_encoded_bytes().contains(&0) {
                    exn::bail!(ErrorKind::InvalidPath(path.as_ref().to_path_buf()));
                }
                components.push(s)
            },
            Component::CurDir | Component::RootDir => {},
            Component::Prefix(_) => exn::bail!(ErrorKind::InvalidPath(path.as_ref().to_path_buf())),
            Component::ParentDir => {
                if components.pop().is_none() {
                    exn::bail!(ErrorKind::InvalidPath(path.as_ref().to_path_buf()));
                }
            },
        }
    }
    match components.is_empty() {
        true => exn::bail!(ErrorKind::InvalidPath(path.as_ref().to_path_buf())),
        false => Ok(components.into_iter().collect()),
    }
}

/// Validates a plain filename: exactly one normal component, taken verbatim.
///
/// Documents live directly in the storage root, so anything that would
/// resolve into a subdirectory (or needs resolving at all) is rejected.
///
/// ```
/// use docshelf_storage::validate_name;
/// assert!(validate_name("notes.txt").is_ok());
/// assert!(validate_name("sub/notes.txt").is_err());
/// assert!(validate_name("./notes.txt").is_err());
/// ```
pub fn validate_name(name: &str) -> Result<PathBuf> {
    let path = Path::new(name);
    let mut components = path.components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(s)), None) if s == name && !s.as_encoded_bytes().contains(&0) => Ok(path.to_path_buf()),
        _ => exn::bail!(ErrorKind::InvalidPath(path.to_path_buf())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_paths() {
        assert_eq!(validate(Path::new("notes.txt")).unwrap(), Path::new("notes.txt"));
        assert_eq!(validate(Path::new("a/b/c/file.pdf")).unwrap(), Path::new("a/b/c/file.pdf"));
    }

    #[test]
    fn test_path_normalization() {
        assert_eq!(validate(Path::new("a//b//c")).unwrap(), Path::new("a/b/c"));
        assert_eq!(validate(Path::new("a/./b/./c")).unwrap(), Path::new("a/b/c"));
        assert_eq!(validate(Path::new("a/b/..")).unwrap(), Path::new("a"));
    }

    #[test]
    fn test_traversal_attempts() {
        assert!(validate(Path::new("../etc/passwd")).is_err());
        assert!(validate(Path::new("a/../../b")).is_err());
        assert!(validate(Path::new("..")).is_err());
    }

    #[test]
    fn test_invalid_characters() {
        assert!(validate(Path::new("a\0b")).is_err());
        assert!(validate(Path::new("\0")).is_err());
    }

    #[test]
    fn test_empty_paths() {
        assert!(validate(Path::new("")).is_err());
        assert!(validate(Path::new(".")).is_err());
        assert!(validate(Path::new("./")).is_err());
        assert!(validate(Path::new("//")).is_err());
    }

    #[test]
    fn test_validate_name() {
        assert_eq!(validate_name("report.docx").unwrap(), Path::new("report.docx"));
        assert_eq!(validate_name("with spaces.pdf").unwrap(), Path::new("with spaces.pdf"));
        assert!(validate_name("").is_err());
        assert!(validate_name("..").is_err());
        assert!(validate_name("dir/file.txt").is_err());
        assert!(validate_name("/abs.txt").is_err());
        assert!(validate_name("trailing.txt/").is_err());
        assert!(validate_name("nul\0.txt").is_err());
    }
}

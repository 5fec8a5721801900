//! Library Error Types
//!
//! Every operation on a [`Library`](crate::Library) reports one of these
//! kinds; the underlying storage or metadata failure is kept as a child in
//! the `exn` error tree.

use derive_more::{Display, Error};
use std::time::Duration;

/// A library error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("storage operation failed")]
    Storage,
    #[display("could not persist document metadata")]
    Metadata,
    #[display("hashing did not finish within {_0:?}")]
    HashTimeout(#[error(not(source))] Duration),
    #[display("hashing task failed")]
    Hash,
    #[display("invalid filename: {_0}")]
    InvalidFilename(#[error(not(source))] String),
    #[display("unsupported file extension: {_0}")]
    UnsupportedExtension(#[error(not(source))] String),
    #[display("filename is reserved for internal use: {_0}")]
    ReservedFilename(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage | Self::Metadata | Self::HashTimeout(_))
    }

    /// Returns `true` if the caller supplied something unusable, as opposed
    /// to the operation failing.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::InvalidFilename(_) | Self::UnsupportedExtension(_) | Self::ReservedFilename(_)
        )
    }
}

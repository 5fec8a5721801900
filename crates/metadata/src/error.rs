//! Metadata Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A metadata error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for metadata operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// Note that a corrupt or missing sidecar is *not* an error: it loads as an
/// empty mapping.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Serialization/deserialization error.
    #[display("invalid metadata: {_0}")]
    InvalidData(#[error(not(source))] &'static str),
    /// Writing the temporary file or renaming it over the sidecar failed.
    #[display("could not persist metadata")]
    Persist,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Persist)
    }
}

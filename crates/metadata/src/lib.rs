//! Persisted bookkeeping for the document shelf.
//!
//! The sidecar is not the source of truth for *which* files exist - the
//! directory is. It is the source of truth for identity (content hash) and
//! provenance. If the sidecar is deleted or corrupted it loads as empty and
//! the next reconciliation pass rebuilds it from the directory, losing only
//! upload timestamps and origin.
//!
//! # Format
//! One JSON object, keyed by filename:
//!
//! ```json
//! {
//!   "notes.txt": {
//!     "hash": "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824",
//!     "upload_date": "2024-05-01T09:30:00Z",
//!     "file_size": 5,
//!     "file_path": "data/notes.txt",
//!     "status": "active"
//!   }
//! }
//! ```

pub mod error;
mod models;
mod store;

pub use crate::models::{DocumentRecord, Origin, Status};
pub use crate::store::{MetadataStore, Records};

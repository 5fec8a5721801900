//! The sidecar-backed record store.

use crate::error::{ErrorKind, Result};
use crate::models::{DocumentRecord, RecordRow};
use docshelf_storage::BackendHandle;
use exn::ResultExt;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// In-memory mapping from filename to record.
pub type Records = BTreeMap<String, DocumentRecord>;

/// Records persisted as a JSON sidecar inside the storage backend.
///
/// Mutations ([`put`](Self::put), [`delete`](Self::delete)) only touch the
/// in-memory mapping; nothing is durable until [`save`](Self::save). The store
/// does no locking of its own - callers serialize access (the library holds
/// it behind a mutex).
pub struct MetadataStore {
    backend: BackendHandle,
    path: PathBuf,
    records: Records,
}

impl MetadataStore {
    /// Open the sidecar at `path` (relative to the backend root) and load it.
    ///
    /// Never fails: a missing or unreadable sidecar opens as an empty store.
    pub async fn open(backend: BackendHandle, path: impl Into<PathBuf>) -> Self {
        let mut store = Self {
            backend,
            path: path.into(),
            records: Records::new(),
        };
        store.load().await;
        store
    }

    /// Location of the sidecar, relative to the backend root.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Location of the temporary file used while saving.
    pub fn temp_path(&self) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(".tmp");
        PathBuf::from(name)
    }

    /// Replace the in-memory mapping with what's currently persisted.
    ///
    /// A missing sidecar, an unreadable one, or one that isn't a JSON object
    /// all load as empty. Individual records that can't be decoded are
    /// dropped and the rest are kept.
    pub async fn load(&mut self) -> &Records {
        self.records = match self.backend.read(&self.path).await {
            Ok(bytes) => Self::parse(&bytes),
            Err(e) if e.is_not_found() => {
                tracing::debug!(path = %self.path.display(), "No metadata sidecar yet; starting empty");
                Records::new()
            },
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %*e, "Could not read metadata sidecar; starting empty");
                Records::new()
            },
        };
        &self.records
    }

    /// Decode sidecar contents, tolerating corruption.
    pub fn parse(bytes: &[u8]) -> Records {
        let raw: BTreeMap<String, serde_json::Value> = match serde_json::from_slice(bytes) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(error = %e, "Metadata sidecar is malformed; starting empty");
                return Records::new();
            },
        };
        raw.into_iter()
            .filter_map(|(filename, value)| {
                let record = serde_json::from_value::<RecordRow>(value)
                    .or_raise(|| ErrorKind::InvalidData("record"))
                    .and_then(|row| DocumentRecord::from_row(filename.clone(), row));
                match record {
                    Ok(record) => Some((filename, record)),
                    Err(e) => {
                        tracing::warn!(filename, error = %*e, "Dropping unreadable metadata record");
                        None
                    },
                }
            })
            .collect()
    }

    /// Atomically persist the in-memory mapping.
    ///
    /// The mapping is written to [`temp_path`](Self::temp_path) and renamed
    /// over the sidecar, so on failure the previous sidecar is untouched.
    #[tracing::instrument(level = "debug", skip(self), fields(path = %self.path.display(), records = self.records.len()))]
    pub async fn save(&self) -> Result<()> {
        let rows = self
            .records
            .iter()
            .map(|(filename, record)| Ok((filename.as_str(), RecordRow::try_from(record)?)))
            .collect::<Result<BTreeMap<&str, RecordRow>>>()?;
        let json = serde_json::to_vec_pretty(&rows).or_raise(|| ErrorKind::InvalidData("serialize"))?;
        let temp = self.temp_path();
        self.backend.write(&temp, &json).await.or_raise(|| ErrorKind::Persist)?;
        if let Err(e) = self.backend.rename(&temp, &self.path).await {
            if let Err(cleanup) = self.backend.delete(&temp).await {
                tracing::debug!(path = %temp.display(), error = %*cleanup, "Could not remove temporary metadata file");
            }
            return Err(e).or_raise(|| ErrorKind::Persist);
        }
        Ok(())
    }

    pub fn get(&self, filename: &str) -> Option<&DocumentRecord> {
        self.records.get(filename)
    }

    /// Insert or replace the record keyed by its own filename.
    pub fn put(&mut self, record: DocumentRecord) -> Option<DocumentRecord> {
        self.records.insert(record.filename.clone(), record)
    }

    pub fn delete(&mut self, filename: &str) -> Option<DocumentRecord> {
        self.records.remove(filename)
    }

    /// All records in filename order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &DocumentRecord)> {
        self.records.iter().map(|(filename, record)| (filename.as_str(), record))
    }

    pub fn records(&self) -> &Records {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, filename: &str) -> bool {
        self.records.contains_key(filename)
    }

    /// First record (in filename order) whose content hash is `hash`.
    pub fn find_by_hash(&self, hash: &str) -> Option<&DocumentRecord> {
        self.records.values().find(|record| record.content_hash == hash)
    }

    /// Copy of the in-memory mapping, for [`restore`](Self::restore).
    pub fn snapshot(&self) -> Records {
        self.records.clone()
    }

    /// Put back a mapping taken with [`snapshot`](Self::snapshot), e.g. after
    /// a failed [`save`](Self::save).
    pub fn restore(&mut self, records: Records) {
        self.records = records;
    }
}

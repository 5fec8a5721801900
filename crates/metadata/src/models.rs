use crate::error::{Error, ErrorKind, Result};
use derive_more::Display;
use exn::{OptionExt, ResultExt};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use time::format_description::well_known::{Iso8601, Rfc3339};
use time::{OffsetDateTime, PrimitiveDateTime};

/// Record status. Only [`Status::Active`] is ever written by this crate;
/// anything else found in a sidecar is carried along verbatim but doesn't
/// count towards statistics.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum Status {
    #[display("active")]
    Active,
    #[display("{_0}")]
    Other(String),
}
impl From<String> for Status {
    fn from(value: String) -> Self {
        match value.as_str() {
            "active" => Self::Active,
            _ => Self::Other(value),
        }
    }
}

/// Provenance of a record. Display only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Origin {
    /// Written through an explicit add.
    #[display("uploaded")]
    Uploaded,
    /// Found in the directory during reconciliation.
    #[display("synced")]
    Synced,
}

/// One tracked document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRecord {
    pub filename: String,
    /// Lowercase hex SHA-256 of the file's bytes at last write/discovery.
    pub content_hash: String,
    /// Creation time for uploads, file modification time for synced files.
    pub uploaded_at: OffsetDateTime,
    pub file_size: u64,
    pub file_path: PathBuf,
    pub status: Status,
    pub origin: Origin,
}
impl DocumentRecord {
    /// A record for bytes that were just written by an explicit add.
    pub fn uploaded(
        filename: impl Into<String>,
        content_hash: impl Into<String>,
        file_size: u64,
        file_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            filename: filename.into(),
            content_hash: content_hash.into(),
            uploaded_at: OffsetDateTime::now_utc(),
            file_size,
            file_path: file_path.into(),
            status: Status::Active,
            origin: Origin::Uploaded,
        }
    }

    /// A record for a file discovered in the directory.
    pub fn synced(
        filename: impl Into<String>,
        content_hash: impl Into<String>,
        file_size: u64,
        file_path: impl Into<PathBuf>,
        modified: OffsetDateTime,
    ) -> Self {
        Self {
            uploaded_at: modified,
            origin: Origin::Synced,
            ..Self::uploaded(filename, content_hash, file_size, file_path)
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == Status::Active
    }

    pub(crate) fn from_row(filename: String, row: RecordRow) -> Result<Self> {
        Ok(Self {
            uploaded_at: parse_timestamp(&row.upload_date).ok_or_raise(|| ErrorKind::InvalidData("upload date"))?,
            filename,
            content_hash: row.hash,
            file_size: row.file_size,
            file_path: PathBuf::from(row.file_path),
            status: Status::from(row.status),
            origin: match row.synced {
                Some(true) => Origin::Synced,
                _ => Origin::Uploaded,
            },
        })
    }
}

/// Accepts RFC 3339, and offset-less ISO 8601 (assumed UTC) as written by
/// older installations.
fn parse_timestamp(value: &str) -> Option<OffsetDateTime> {
    OffsetDateTime::parse(value, &Rfc3339)
        .ok()
        .or_else(|| PrimitiveDateTime::parse(value, &Iso8601::DEFAULT).ok().map(PrimitiveDateTime::assume_utc))
}

/// On-disk shape of a record. The filename is the key of the enclosing
/// object, not a field.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct RecordRow {
    hash: String,
    upload_date: String,
    file_size: u64,
    file_path: String,
    status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    synced: Option<bool>,
}
impl TryFrom<&DocumentRecord> for RecordRow {
    type Error = Error;
    fn try_from(record: &DocumentRecord) -> std::result::Result<Self, Self::Error> {
        Ok(Self {
            hash: record.content_hash.clone(),
            upload_date: record.uploaded_at.format(&Rfc3339).or_raise(|| ErrorKind::InvalidData("upload date"))?,
            file_size: record.file_size,
            file_path: record.file_path.to_str().ok_or_raise(|| ErrorKind::InvalidData("path"))?.to_string(),
            status: record.status.to_string(),
            synced: match record.origin {
                Origin::Synced => Some(true),
                Origin::Uploaded => None,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use time::macros::datetime;

    fn row(upload_date: &str, status: &str, synced: Option<bool>) -> RecordRow {
        RecordRow {
            hash: "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824".to_string(),
            upload_date: upload_date.to_string(),
            file_size: 5,
            file_path: "data/notes.txt".to_string(),
            status: status.to_string(),
            synced,
        }
    }

    #[rstest]
    #[case("2024-05-01T09:30:00Z", datetime!(2024-05-01 09:30:00 UTC))]
    #[case("2024-05-01T11:30:00+02:00", datetime!(2024-05-01 09:30:00 UTC))]
    #[case("2024-05-01T09:30:00.250000", datetime!(2024-05-01 09:30:00.25 UTC))]
    fn test_parse_timestamp(#[case] input: &str, #[case] expected: OffsetDateTime) {
        assert_eq!(parse_timestamp(input), Some(expected));
    }

    #[test]
    fn test_parse_timestamp_garbage() {
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(parse_timestamp(""), None);
    }

    #[test]
    fn test_row_to_model() {
        let record = DocumentRecord::from_row("notes.txt".to_string(), row("2024-05-01T09:30:00Z", "active", Some(true))).unwrap();
        assert_eq!(record.filename, "notes.txt");
        assert_eq!(record.origin, Origin::Synced);
        assert!(record.is_active());
        assert_eq!(record.file_path, PathBuf::from("data/notes.txt"));
    }

    #[test]
    fn test_row_with_unknown_status() {
        let record = DocumentRecord::from_row("notes.txt".to_string(), row("2024-05-01T09:30:00Z", "archived", None)).unwrap();
        assert_eq!(record.status, Status::Other("archived".to_string()));
        assert_eq!(record.origin, Origin::Uploaded);
        assert!(!record.is_active());
    }

    #[test]
    fn test_row_with_bad_date() {
        let err = DocumentRecord::from_row("notes.txt".to_string(), row("last tuesday", "active", None)).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidData("upload date")));
    }

    #[test]
    fn test_model_to_row() {
        let uploaded = DocumentRecord::uploaded("a.pdf", "abc", 3, "data/a.pdf");
        let row = RecordRow::try_from(&uploaded).unwrap();
        assert_eq!(row.status, "active");
        assert_eq!(row.synced, None);

        let synced = DocumentRecord::synced("b.pdf", "abc", 3, "data/b.pdf", datetime!(2023-01-02 03:04:05 UTC));
        let row = RecordRow::try_from(&synced).unwrap();
        assert_eq!(row.upload_date, "2023-01-02T03:04:05Z");
        assert_eq!(row.synced, Some(true));
    }
}

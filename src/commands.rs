use crate::cli::Command;
use crate::error::{ErrorKind, Result};
use docshelf_library::{AddOutcome, DocumentListing, DuplicateCheck, DuplicateInfo, Library};
use exn::{OptionExt, ResultExt};
use std::path::{Path, PathBuf};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

pub async fn run(library: &Library, command: Command) -> Result<()> {
    match command {
        Command::Add { files, force } => add(library, &files, force).await?,
        Command::Check { file } => {
            let (name, content) = read_input(&file).await?;
            match library.check_duplicate(&name, content).await.or_raise(|| ErrorKind::Library)? {
                DuplicateCheck::Unique => println!("{name}: not tracked yet"),
                DuplicateCheck::Duplicate(info) => println!("{name}: {}", describe_duplicate(&info)),
            }
        },
        Command::Remove { names } => {
            for name in names {
                let removal = library.remove_document(&name).await.or_raise(|| ErrorKind::Library)?;
                match (removal.file_removed, removal.record_removed) {
                    (false, false) => println!("{name}: nothing to remove"),
                    (true, true) => println!("{name}: removed"),
                    (true, false) => println!("{name}: removed untracked file"),
                    (false, true) => println!("{name}: removed record (file was already gone)"),
                }
            }
        },
        Command::List => {
            let listings = library.list_documents().await;
            if listings.is_empty() {
                println!("No documents.");
            }
            for listing in &listings {
                println!("{}", format_listing(listing));
            }
        },
        Command::Sync => {
            let report = library.sync_with_filesystem().await.or_raise(|| ErrorKind::Library)?;
            println!(
                "{} documents seen, {} added, {} removed",
                report.seen,
                report.new_files.len(),
                report.removed_files.len()
            );
            for name in &report.new_files {
                println!("  + {name}");
            }
            for name in &report.removed_files {
                println!("  - {name}");
            }
            for name in &report.skipped {
                println!("  ! {name} (unreadable, skipped)");
            }
            if !report.complete {
                println!("Directory listing was incomplete; no records were dropped.");
            }
        },
        Command::Stats => {
            let stats = library.storage_stats().await.or_raise(|| ErrorKind::Library)?;
            println!("Documents:    {}", stats.total_files);
            println!("Total size:   {} bytes ({:.2} MB)", stats.total_size_bytes, stats.total_size_mb);
            println!("Average size: {:.2} MB", stats.average_file_size_mb);
        },
        Command::Cleanup => {
            let cleanup = library.cleanup_orphaned_files().await.or_raise(|| ErrorKind::Library)?;
            for name in &cleanup.orphaned {
                println!("  - {name}");
            }
            println!("Removed {} of {} orphaned files", cleanup.removed, cleanup.orphaned.len());
        },
    }
    Ok(())
}

/// Files the library refuses (bad name, unknown extension) are reported and
/// skipped so the rest still go in; the command fails at the end if there
/// were any. Any other failure stops immediately.
async fn add(library: &Library, files: &[PathBuf], force: bool) -> Result<()> {
    let mut rejected = 0;
    for file in files {
        let (name, content) = read_input(file).await?;
        match library.add_document(&name, content, force).await {
            Ok(AddOutcome::Added(record)) => println!("{name}: added ({})", record.content_hash),
            Ok(AddOutcome::Duplicate(info)) => println!("{name}: skipped, {}", describe_duplicate(&info)),
            Err(e) if e.is_rejection() => {
                println!("{name}: rejected, {}", *e);
                rejected += 1;
            },
            Err(e) => return Err(e).or_raise(|| ErrorKind::Library),
        }
    }
    if rejected > 0 {
        exn::bail!(ErrorKind::Rejected(rejected));
    }
    Ok(())
}

/// The document name for an input file is its final path component.
async fn read_input(file: &Path) -> Result<(String, Vec<u8>)> {
    let name = file
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_raise(|| ErrorKind::InputName(file.to_path_buf()))?
        .to_string();
    let content = tokio::fs::read(file).await.or_raise(|| ErrorKind::ReadInput(file.to_path_buf()))?;
    Ok((name, content))
}

fn describe_duplicate(info: &DuplicateInfo) -> String {
    if info.same_name {
        format!("already tracked with identical content (added {})", timestamp(info.uploaded_at))
    } else {
        format!("same content as {} (added {})", info.existing, timestamp(info.uploaded_at))
    }
}

fn format_listing(listing: &DocumentListing) -> String {
    let record = &listing.record;
    let state = match &listing.current {
        Some(info) if info.size == record.file_size => String::new(),
        Some(info) => format!(" [size now {} bytes]", info.size),
        None => " [missing]".to_string(),
    };
    format!(
        "{:<40} {:>12} bytes  {}  {}{state}",
        record.filename,
        record.file_size,
        timestamp(record.uploaded_at),
        record.origin,
    )
}

fn timestamp(at: OffsetDateTime) -> String {
    at.format(&Rfc3339).unwrap_or_else(|_| at.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use docshelf_library::{DocumentRecord, Options};
    use docshelf_storage::FileInfo;
    use docshelf_storage::backend::LocalBackend;
    use std::sync::Arc;
    use time::macros::datetime;

    fn listing(current: Option<u64>) -> DocumentListing {
        let modified = datetime!(2024-05-01 09:30 UTC);
        DocumentListing {
            record: DocumentRecord::synced("notes.txt", "abc", 5, "/srv/notes.txt", modified),
            current: current.map(|size| FileInfo::new("notes.txt", size, modified)),
        }
    }

    #[test]
    fn test_format_listing() {
        let line = format_listing(&listing(Some(5)));
        assert!(line.starts_with("notes.txt "));
        assert!(line.ends_with("2024-05-01T09:30:00Z  synced"));
        assert!(format_listing(&listing(Some(9))).ends_with("[size now 9 bytes]"));
        assert!(format_listing(&listing(None)).ends_with("[missing]"));
    }

    #[test]
    fn test_describe_duplicate() {
        let mut info = DuplicateInfo {
            existing: "notes.txt".to_string(),
            content_hash: "abc".to_string(),
            uploaded_at: datetime!(2024-05-01 09:30 UTC),
            file_size: 5,
            same_name: false,
        };
        assert_eq!(describe_duplicate(&info), "same content as notes.txt (added 2024-05-01T09:30:00Z)");
        info.same_name = true;
        assert!(describe_duplicate(&info).starts_with("already tracked"));
    }

    #[tokio::test]
    async fn test_add_skips_rejected_files() {
        let inbox = tempfile::tempdir().unwrap();
        let shelf = tempfile::tempdir().unwrap();
        let good = inbox.path().join("notes.txt");
        let bad = inbox.path().join("tool.exe");
        std::fs::write(&good, b"hello").unwrap();
        std::fs::write(&bad, b"MZ").unwrap();
        let backend = Arc::new(LocalBackend::new("local", shelf.path()).unwrap());
        let library = Library::open(backend, "document_metadata.json", Options::default()).await;

        let err = add(&library, &[bad, good], false).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Rejected(1)));
        assert!(library.document("notes.txt").await.is_some());
        assert!(!shelf.path().join("tool.exe").exists());
    }

    #[tokio::test]
    async fn test_read_input() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.pdf");
        std::fs::write(&path, b"%PDF").unwrap();
        let (name, content) = read_input(&path).await.unwrap();
        assert_eq!(name, "report.pdf");
        assert_eq!(content, b"%PDF");

        let err = read_input(&dir.path().join("missing.pdf")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::ReadInput(_)));
    }
}

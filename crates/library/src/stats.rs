use crate::Library;
use crate::error::Result;
use docshelf_metadata::DocumentRecord;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Aggregate figures over active records.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StorageStats {
    pub total_files: usize,
    pub total_size_bytes: u64,
    /// Rounded to two decimal places.
    pub total_size_mb: f64,
    /// Rounded to two decimal places; zero for an empty library.
    pub average_file_size_mb: f64,
}
impl StorageStats {
    /// Tally active records; anything else is ignored.
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a DocumentRecord>) -> Self {
        let (total_files, total_size_bytes) = records
            .into_iter()
            .filter(|record| record.is_active())
            .fold((0usize, 0u64), |(count, bytes), record| (count + 1, bytes + record.file_size));
        let average_file_size_mb = match total_files {
            0 => 0.0,
            n => round2(total_size_bytes as f64 / n as f64 / BYTES_PER_MB),
        };
        Self {
            total_files,
            total_size_bytes,
            total_size_mb: round2(total_size_bytes as f64 / BYTES_PER_MB),
            average_file_size_mb,
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

impl Library {
    /// Reconcile with the directory, then report on what's tracked.
    #[tracing::instrument(skip(self))]
    pub async fn storage_stats(&self) -> Result<StorageStats> {
        let mut store = self.store.lock().await;
        self.reconcile(&mut store).await?;
        Ok(StorageStats::from_records(store.records().values()))
    }
}

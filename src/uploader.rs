use crate::record::Record;
use crate::store::VectorStore;
use anyhow::{bail, Context, Result};
use std::fmt;
use tracing::{info, info_span, Instrument};

/// One submitted batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchProgress {
    /// One-based.
    pub index: usize,
    pub total: usize,
    pub size: usize,
    pub last_id: u64,
}

impl fmt::Display for BatchProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Uploaded batch {}/{} ({} points). Last ID: {}",
            self.index, self.total, self.size, self.last_id
        )
    }
}

/// Splits records into fixed-size batches and upserts them one after another.
/// A failed batch aborts the upload; earlier batches stay in the store.
pub struct BatchUploader<'a, S: VectorStore + ?Sized> {
    store: &'a S,
    batch_size: usize,
}

impl<'a, S: VectorStore + ?Sized> BatchUploader<'a, S> {
    pub fn new(store: &'a S, batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            bail!("batch size must be positive");
        }
        Ok(Self { store, batch_size })
    }

    pub const fn batch_count(&self, records: usize) -> usize {
        records.div_ceil(self.batch_size)
    }

    pub async fn upload(&self, collection: &str, records: &[Record]) -> Result<Vec<BatchProgress>> {
        let total = self.batch_count(records.len());
        self.upload_batches(collection, records, total)
            .instrument(info_span!("upload", collection, total))
            .await
    }

    async fn upload_batches(
        &self,
        collection: &str,
        records: &[Record],
        total: usize,
    ) -> Result<Vec<BatchProgress>> {
        let mut progress = Vec::with_capacity(total);
        for (offset, batch) in records.chunks(self.batch_size).enumerate() {
            let index = offset + 1;
            self.store
                .upsert(collection, batch)
                .await
                .with_context(|| format!("Batch {index}/{total} failed"))?;

            let step = BatchProgress {
                index,
                total,
                size: batch.len(),
                last_id: batch.last().map_or(0, |r| r.id),
            };
            info!("{}", step);
            progress.push(step);
        }
        Ok(progress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn progress_line_names_batch_and_last_id() {
        let step = BatchProgress {
            index: 3,
            total: 3,
            size: 50,
            last_id: 249,
        };
        assert_eq!(step.to_string(), "Uploaded batch 3/3 (50 points). Last ID: 249");
    }

    #[test]
    fn counts_partial_batches() {
        let store = MemoryStore::new();
        let uploader = BatchUploader::new(&store, 100).unwrap();
        assert_eq!(uploader.batch_count(0), 0);
        assert_eq!(uploader.batch_count(100), 1);
        assert_eq!(uploader.batch_count(250), 3);
        assert!(BatchUploader::new(&store, 0).is_err());
    }
}

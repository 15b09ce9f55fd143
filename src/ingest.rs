//! Ingestion run: workbook → merged records → one upsert into the catalog store.

use crate::{
    catalog::{CatalogError, RecordBatch, Workbook, build_record_batch},
    store::{CatalogStore, StoreError},
};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Errors that abort an ingestion run.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Workbook could not be read or lacks a sheet or column.
    #[error("Failed to build catalog records: {0}")]
    Catalog(#[from] CatalogError),
    /// Records could not be written to the store.
    #[error("Failed to upsert catalog records: {0}")]
    Store(#[from] StoreError),
}

/// Outcome of an ingestion run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestSummary {
    /// Records synthesized from the workbook.
    pub records: usize,
    /// Records written to the store.
    pub upserted: usize,
}

/// Loads catalog workbooks into a [`CatalogStore`].
pub struct CatalogIngestor {
    store: Arc<dyn CatalogStore>,
}

impl CatalogIngestor {
    /// Build an ingestor writing to `store`.
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Self { store }
    }

    /// Read the workbook at `path` and ingest it.
    pub async fn ingest_path(&self, path: impl AsRef<Path>) -> Result<IngestSummary, IngestError> {
        let path = path.as_ref();
        tracing::info!(path = %path.display(), "Loading catalog workbook");
        let workbook = Workbook::open(path)?;
        self.ingest_workbook(&workbook).await
    }

    /// Build every record first, then upsert them in one call; nothing is written on failure
    /// to build.
    pub async fn ingest_workbook(&self, workbook: &Workbook) -> Result<IngestSummary, IngestError> {
        let batch = build_record_batch(workbook)?;
        self.ingest_batch(&batch).await
    }

    /// Upsert an already-built batch, skipping the store when it is empty.
    pub async fn ingest_batch(&self, batch: &RecordBatch) -> Result<IngestSummary, IngestError> {
        tracing::info!(records = batch.len(), "Prepared catalog records");
        if batch.is_empty() {
            tracing::warn!("No records prepared from the workbook; store not updated");
            return Ok(IngestSummary {
                records: 0,
                upserted: 0,
            });
        }

        let upserted = self.store.upsert(batch).await?;
        tracing::info!(records = batch.len(), upserted, "Catalog records upserted");
        Ok(IngestSummary {
            records: batch.len(),
            upserted,
        })
    }
}

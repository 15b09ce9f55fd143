//! Record and error types for the catalog merge pipeline.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Placeholder written wherever a joined value is missing.
pub const PLACEHOLDER: &str = "N/A";

/// Errors that abort catalog loading before anything is written to the vector store.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The workbook file could not be opened or a sheet could not be decoded.
    #[error("Failed to read workbook '{path}': {message}")]
    Workbook {
        /// Path of the workbook we attempted to read.
        path: String,
        /// Diagnostic from the spreadsheet reader.
        message: String,
    },
    /// One of the five expected sheets is absent.
    #[error("Missing expected sheet '{0}'")]
    MissingSheet(String),
    /// A required column is absent from a sheet or from the merged table.
    #[error("Missing expected column '{column}' in {table}")]
    MissingColumn {
        /// Sheet name, or `merged catalog` for post-join checks.
        table: String,
        /// Column that could not be found.
        column: String,
    },
}

/// Flat metadata stored next to each catalog document.
///
/// Key names are part of the prompt contract: the scholarship and resource prompts refer to them
/// verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferingMetadata {
    /// School key from the colleges sheet.
    pub school_id: String,
    /// Program key from the programs sheet.
    pub program_id: String,
    /// Institution display name.
    pub institution_name: String,
    /// Institution type (public, private, ...).
    pub institution_type: String,
    /// Province of the campus.
    pub province: String,
    /// Municipality of the campus.
    pub municipality: String,
    /// Program display name.
    pub program_name: String,
    /// Name of a matching online resource.
    pub resource_name: String,
    /// Link of a matching online resource.
    pub resource_link: String,
    /// Type of a matching online resource.
    pub resource_types: String,
    /// DOST scholarship eligibility flag for the school.
    pub dost_eligibility: String,
}

/// One embedding-ready record derived from an offering row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogRecord {
    /// Sequential identifier, `school_program_offering_<n>`.
    pub id: String,
    /// Natural-language description embedded for retrieval.
    pub document: String,
    /// Structured fields exposed to the prompts.
    pub metadata: OfferingMetadata,
}

/// Parallel documents, metadatas and ids handed to the vector store as one upsert.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordBatch {
    /// Synthesized documents.
    pub documents: Vec<String>,
    /// Metadata aligned with `documents`.
    pub metadatas: Vec<OfferingMetadata>,
    /// Identifiers aligned with `documents`.
    pub ids: Vec<String>,
}

impl RecordBatch {
    /// Number of records in the batch.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether the batch holds no records.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Iterate the batch as `(id, document, metadata)` triples.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &OfferingMetadata)> {
        self.ids
            .iter()
            .zip(&self.documents)
            .zip(&self.metadatas)
            .map(|((id, document), metadata)| (id.as_str(), document.as_str(), metadata))
    }
}

impl FromIterator<CatalogRecord> for RecordBatch {
    fn from_iter<I: IntoIterator<Item = CatalogRecord>>(iter: I) -> Self {
        let mut batch = RecordBatch::default();
        for record in iter {
            batch.ids.push(record.id);
            batch.documents.push(record.document);
            batch.metadatas.push(record.metadata);
        }
        batch
    }
}

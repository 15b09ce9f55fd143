//! Vector store for catalog records: embeds documents and keeps them in Qdrant.
//!
//! The advisor and the ingestion pipeline only see [`CatalogStore`]; [`QdrantCatalogStore`] is
//! the production implementation.

use crate::{
    catalog::RecordBatch,
    config::get_config,
    embedding::{EmbeddingClient, EmbeddingClientError, get_embedding_client},
    qdrant::{PointUpsert, QdrantError, QdrantService, ScoredPoint},
};
use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

const RECORD_ID_FIELD: &str = "record_id";
const DOCUMENT_FIELD: &str = "document";

/// Errors raised by catalog store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Embedding provider failed to vectorize documents or the query.
    #[error("Failed to generate embeddings: {0}")]
    Embedding(#[from] EmbeddingClientError),
    /// Qdrant request failed.
    #[error("Qdrant request failed: {0}")]
    Qdrant(#[from] QdrantError),
    /// Returned embedding width does not match the collection.
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Width configured for the collection.
        expected: usize,
        /// Width produced by the provider.
        actual: usize,
    },
}

/// Documents and metadata of the nearest records, aligned and best match first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    /// Document text of each hit.
    pub documents: Vec<String>,
    /// Metadata of each hit.
    pub metadatas: Vec<Map<String, Value>>,
}

/// Persistent, queryable collection of catalog records.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Insert or overwrite every record of the batch, keyed by record id.
    async fn upsert(&self, batch: &RecordBatch) -> Result<usize, StoreError>;

    /// Return up to `n_results` records nearest to `text`.
    async fn query(&self, text: &str, n_results: usize) -> Result<QueryResult, StoreError>;
}

/// [`CatalogStore`] backed by an embedding provider and a Qdrant collection.
pub struct QdrantCatalogStore {
    embedding_client: Box<dyn EmbeddingClient + Send + Sync>,
    qdrant: QdrantService,
    collection: String,
    dimension: usize,
    batch_size: usize,
}

impl QdrantCatalogStore {
    /// Build the store from configuration and make sure its collection exists.
    pub async fn connect(collection: Option<String>) -> Result<Self, StoreError> {
        let config = get_config();
        let store = Self::new(
            get_embedding_client()?,
            QdrantService::new()?,
            collection.unwrap_or_else(|| config.qdrant_collection_name.clone()),
            config.embedding_dimension,
            config.embedding_batch_size,
        );
        store.ensure_collection().await?;
        Ok(store)
    }

    /// Assemble a store from explicit parts.
    pub fn new(
        embedding_client: Box<dyn EmbeddingClient + Send + Sync>,
        qdrant: QdrantService,
        collection: String,
        dimension: usize,
        batch_size: usize,
    ) -> Self {
        Self {
            embedding_client,
            qdrant,
            collection,
            dimension,
            batch_size: batch_size.max(1),
        }
    }

    /// Name of the backing collection.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Create the collection when it is missing.
    pub async fn ensure_collection(&self) -> Result<(), StoreError> {
        self.qdrant
            .ensure_collection(&self.collection, self.dimension)
            .await?;
        tracing::debug!(collection = %self.collection, "Collection ready");
        Ok(())
    }

    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, StoreError> {
        let vectors = self.embedding_client.generate_embeddings(texts).await?;
        if let Some(actual) = vectors
            .iter()
            .map(Vec::len)
            .find(|&len| len != self.dimension)
        {
            return Err(StoreError::DimensionMismatch {
                expected: self.dimension,
                actual,
            });
        }
        Ok(vectors)
    }
}

#[async_trait]
impl CatalogStore for QdrantCatalogStore {
    async fn upsert(&self, batch: &RecordBatch) -> Result<usize, StoreError> {
        let records: Vec<_> = batch.iter().collect();

        // Every vector is produced before the first write, so an embedding failure leaves the
        // collection untouched.
        let mut points = Vec::with_capacity(records.len());
        for chunk in records.chunks(self.batch_size) {
            let texts = chunk
                .iter()
                .map(|(_, document, _)| document.to_string())
                .collect();
            let vectors = self.embed(texts).await?;
            if vectors.len() != chunk.len() {
                return Err(EmbeddingClientError::InvalidResponse(format!(
                    "expected {} vectors, got {}",
                    chunk.len(),
                    vectors.len()
                ))
                .into());
            }
            points.extend(chunk.iter().zip(vectors).map(
                |(&(id, document, metadata), vector)| PointUpsert {
                    id: point_id(id),
                    vector,
                    payload: record_payload(id, document, metadata),
                },
            ));
        }
        tracing::debug!(collection = %self.collection, points = points.len(), "Embedded catalog records");

        let mut written = 0;
        for chunk in points.chunks(self.batch_size) {
            written += self.qdrant.upsert_points(&self.collection, chunk).await?;
            tracing::debug!(
                collection = %self.collection,
                written,
                total = batch.len(),
                "Upserted record chunk"
            );
        }

        Ok(written)
    }

    async fn query(&self, text: &str, n_results: usize) -> Result<QueryResult, StoreError> {
        let vector = self
            .embed(vec![text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| {
                EmbeddingClientError::InvalidResponse("no vector returned for query".into())
            })?;

        let hits = self
            .qdrant
            .search_points(&self.collection, &vector, n_results)
            .await?;
        tracing::debug!(collection = %self.collection, hits = hits.len(), "Catalog query complete");
        Ok(split_hits(hits))
    }
}

/// Stable Qdrant point id for a record id.
pub fn point_id(record_id: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, record_id.as_bytes()).to_string()
}

fn record_payload(
    record_id: &str,
    document: &str,
    metadata: &crate::catalog::OfferingMetadata,
) -> Map<String, Value> {
    let mut payload = match serde_json::to_value(metadata) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    };
    payload.insert(RECORD_ID_FIELD.into(), Value::String(record_id.to_string()));
    payload.insert(DOCUMENT_FIELD.into(), Value::String(document.to_string()));
    payload
}

fn split_hits(hits: Vec<ScoredPoint>) -> QueryResult {
    let mut result = QueryResult::default();
    for hit in hits {
        let mut payload = hit.payload;
        let document = match payload.remove(DOCUMENT_FIELD) {
            Some(Value::String(text)) => text,
            _ => {
                tracing::warn!(point = %hit.id, "Skipping hit without document payload");
                continue;
            }
        };
        payload.remove(RECORD_ID_FIELD);
        result.documents.push(document);
        result.metadatas.push(payload);
    }
    result
}

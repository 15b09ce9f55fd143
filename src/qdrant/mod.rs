//! Qdrant vector store integration over the REST API.

pub mod client;
pub mod types;

pub use client::QdrantService;
pub use types::{PointUpsert, QdrantError, ScoredPoint};

//! Wire types for the Qdrant REST endpoints the catalog store uses.

use reqwest::StatusCode;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors returned while talking to Qdrant.
#[derive(Debug, Error)]
pub enum QdrantError {
    /// Configured base URL cannot address REST endpoints.
    #[error("Qdrant URL '{url}' is not usable: {reason}")]
    InvalidUrl {
        /// URL as configured.
        url: String,
        /// Parse or shape problem.
        reason: String,
    },
    /// No response was received.
    #[error("Could not reach Qdrant: {0}")]
    Transport(#[from] reqwest::Error),
    /// Qdrant answered with a non-success status.
    #[error("Qdrant {operation} returned {status}: {body}")]
    Rejected {
        /// Short name of the attempted call.
        operation: &'static str,
        /// Status returned.
        status: StatusCode,
        /// Response body, possibly empty.
        body: String,
    },
}

/// Point written by an upsert: a UUID id, its vector and a JSON payload.
#[derive(Debug, Clone, Serialize)]
pub struct PointUpsert {
    /// Point identifier; Qdrant accepts UUID strings or unsigned integers.
    pub id: String,
    /// Embedding vector.
    pub vector: Vec<f32>,
    /// Payload stored alongside the vector.
    pub payload: Map<String, Value>,
}

/// Hit returned by a nearest-neighbour query.
#[derive(Debug, Clone, Deserialize)]
pub struct ScoredPoint {
    /// Point id rendered as text.
    #[serde(deserialize_with = "point_id_text")]
    pub id: String,
    /// Similarity score, higher is closer.
    pub score: f32,
    /// Stored payload; empty when Qdrant returned none.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub payload: Map<String, Value>,
}

fn point_id_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum PointId {
        Uuid(String),
        Num(u64),
    }

    Ok(match PointId::deserialize(deserializer)? {
        PointId::Uuid(text) => text,
        PointId::Num(number) => number.to_string(),
    })
}

fn null_as_empty<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Map<String, Value>, D::Error> {
    Ok(Option::deserialize(deserializer)?.unwrap_or_default())
}

/// `{ "result": ... }` envelope shared by Qdrant responses.
#[derive(Deserialize)]
pub(crate) struct Envelope<T> {
    pub(crate) result: T,
}

/// Result of `points/query`; older servers return the bare list.
#[derive(Deserialize)]
#[serde(untagged)]
pub(crate) enum QueryHits {
    Bare(Vec<ScoredPoint>),
    Wrapped {
        #[serde(default)]
        points: Vec<ScoredPoint>,
    },
}

impl QueryHits {
    pub(crate) fn into_points(self) -> Vec<ScoredPoint> {
        match self {
            Self::Bare(points) | Self::Wrapped { points } => points,
        }
    }
}

#[derive(Serialize)]
pub(crate) struct CreateCollection {
    pub(crate) vectors: VectorParams,
}

#[derive(Serialize)]
pub(crate) struct VectorParams {
    pub(crate) size: usize,
    pub(crate) distance: &'static str,
}

#[derive(Serialize)]
pub(crate) struct UpsertPoints<'a> {
    pub(crate) points: &'a [PointUpsert],
}

#[derive(Serialize)]
pub(crate) struct NearestQuery<'a> {
    pub(crate) query: &'a [f32],
    pub(crate) limit: usize,
    pub(crate) with_payload: bool,
}

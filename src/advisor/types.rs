//! Request, response and error types for the advisor.

use crate::{generation::GenerationClientError, store::StoreError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors produced while answering a query or generating a roadmap.
#[derive(Debug, Error)]
pub enum AdvisorError {
    /// Client input was absent or malformed.
    #[error("{0}")]
    Validation(String),
    /// The vector store could not be queried.
    #[error("Retrieval failed: {0}")]
    Retrieval(#[from] StoreError),
    /// The generator failed or returned output of the wrong shape.
    #[error("Generation failed: {0}")]
    Generation(String),
}

impl From<GenerationClientError> for AdvisorError {
    fn from(error: GenerationClientError) -> Self {
        Self::Generation(error.to_string())
    }
}

/// A flowchart node as currently shown by the frontend.
///
/// Accepts `{id, label}` as well as Vue Flow's `{id, data: {label}}`; numeric ids are read as
/// strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawNode")]
pub struct RoadmapNode {
    /// Node id.
    pub id: String,
    /// Current label, empty when the node has none.
    pub label: String,
}

#[derive(Deserialize)]
struct RawNode {
    id: Value,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    data: Option<RawNodeData>,
}

#[derive(Deserialize)]
struct RawNodeData {
    #[serde(default)]
    label: Option<String>,
}

impl TryFrom<RawNode> for RoadmapNode {
    type Error = String;

    fn try_from(raw: RawNode) -> Result<Self, Self::Error> {
        let id = match raw.id {
            Value::String(text) => text,
            Value::Number(number) => number.to_string(),
            other => return Err(format!("node id must be a string or number, got {other}")),
        };
        let label = raw
            .label
            .or_else(|| raw.data.and_then(|data| data.label))
            .unwrap_or_default();
        Ok(Self { id, label })
    }
}

/// Body of `POST /generate_roadmap`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoadmapRequest {
    /// Nodes currently rendered by the frontend.
    #[serde(default)]
    pub current_nodes: Vec<RoadmapNode>,
    /// Free-text interest; a default query is used when absent or blank.
    #[serde(default)]
    pub user_query: Option<String>,
}

/// One generated label for a roadmap node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoadmapLabel {
    /// Node id, `"1"` through `"15"`.
    pub id: String,
    /// Label to render on the node.
    #[serde(rename = "newLabel")]
    pub new_label: String,
}

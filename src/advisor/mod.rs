//! Query service: retrieval, prompt routing and generation for the advising endpoints.

pub mod prompts;
mod service;
pub mod types;

pub use prompts::{ContextSource, DEFAULT_ROADMAP_QUERY, PromptKind, roadmap_schema};
pub use service::{
    ASK_RESULTS, AdvisorApi, AdvisorService, ROADMAP_NODE_COUNT, ROADMAP_RESULTS,
    ROADMAP_TEMPERATURE, parse_roadmap,
};
pub use types::{AdvisorError, RoadmapLabel, RoadmapNode, RoadmapRequest};

//! Retrieval plus generation for the two advising endpoints.

use crate::{
    advisor::{
        prompts::{ContextSource, DEFAULT_ROADMAP_QUERY, PromptKind, ROADMAP_INSTRUCTION, roadmap_schema},
        types::{AdvisorError, RoadmapLabel, RoadmapRequest},
    },
    generation::{GenerationClient, GenerationRequest},
    store::CatalogStore,
};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Records retrieved for a free-form question.
pub const ASK_RESULTS: usize = 20;
/// Records retrieved for roadmap generation.
pub const ROADMAP_RESULTS: usize = 10;
/// Sampling temperature for roadmap generation.
pub const ROADMAP_TEMPERATURE: f32 = 0.8;
/// Number of flowchart nodes the roadmap must label.
pub const ROADMAP_NODE_COUNT: u32 = 15;

/// Operations exposed to the HTTP surface.
#[async_trait]
pub trait AdvisorApi: Send + Sync {
    /// Answer a free-text question; `None` or blank input is a validation error.
    async fn ask(&self, query: Option<String>) -> Result<String, AdvisorError>;

    /// Produce labels for flowchart nodes 1 through 15.
    async fn generate_roadmap(
        &self,
        request: RoadmapRequest,
    ) -> Result<Vec<RoadmapLabel>, AdvisorError>;
}

/// Stateless advisor sharing one store and one generator across requests.
pub struct AdvisorService {
    store: Arc<dyn CatalogStore>,
    generator: Arc<dyn GenerationClient>,
}

impl AdvisorService {
    /// Build an advisor over the given collaborators.
    pub fn new(store: Arc<dyn CatalogStore>, generator: Arc<dyn GenerationClient>) -> Self {
        Self { store, generator }
    }

    /// Retrieve catalog records for the question and summarize them with the routed prompt.
    pub async fn ask(&self, query: Option<String>) -> Result<String, AdvisorError> {
        let query = query
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| AdvisorError::Validation("No query provided".into()))?;

        let kind = PromptKind::classify(&query);
        let results = self.store.query(&query, ASK_RESULTS).await?;
        tracing::info!(
            prompt = kind.as_str(),
            documents = results.documents.len(),
            "Answering question"
        );

        let context = match kind.context_source() {
            ContextSource::Documents => to_context(&results.documents)?,
            ContextSource::Metadatas => to_context(&results.metadatas)?,
        };
        let request = GenerationRequest {
            system_instruction: kind.instruction().to_string(),
            contents: vec![
                format!("User's question: {query}"),
                format!("Relevant RAG Data: {context}"),
            ],
            ..Default::default()
        };

        let answer = self.generator.generate(request).await?;
        tracing::debug!(chars = answer.len(), "Answer generated");
        Ok(answer)
    }

    /// Retrieve records for the user's interest and have the generator label every node.
    pub async fn generate_roadmap(
        &self,
        request: RoadmapRequest,
    ) -> Result<Vec<RoadmapLabel>, AdvisorError> {
        let RoadmapRequest {
            current_nodes,
            user_query,
        } = request;
        let query = user_query
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_ROADMAP_QUERY.to_string());
        tracing::info!(query = %query, nodes = current_nodes.len(), "Generating roadmap");

        let results = self.store.query(&query, ROADMAP_RESULTS).await?;
        let context = to_context(&results.documents)?;
        let nodes = serde_json::to_string(&current_nodes)
            .map_err(|err| AdvisorError::Generation(err.to_string()))?;

        let generation = GenerationRequest {
            system_instruction: ROADMAP_INSTRUCTION.to_string(),
            contents: vec![
                format!("User's query/interest: {query}"),
                format!("Current Node structure: {nodes}"),
                format!("Relevant RAG Data: {context}"),
            ],
            response_schema: Some(roadmap_schema()),
            temperature: Some(ROADMAP_TEMPERATURE),
        };

        let raw = self.generator.generate(generation).await?;
        let labels = parse_roadmap(&raw)?;
        tracing::info!(labels = labels.len(), "Roadmap generated");
        Ok(labels)
    }
}

#[async_trait]
impl AdvisorApi for AdvisorService {
    async fn ask(&self, query: Option<String>) -> Result<String, AdvisorError> {
        AdvisorService::ask(self, query).await
    }

    async fn generate_roadmap(
        &self,
        request: RoadmapRequest,
    ) -> Result<Vec<RoadmapLabel>, AdvisorError> {
        AdvisorService::generate_roadmap(self, request).await
    }
}

fn to_context<T: Serialize + ?Sized>(value: &T) -> Result<String, AdvisorError> {
    serde_json::to_string_pretty(value).map_err(|err| AdvisorError::Generation(err.to_string()))
}

/// Parse generator output into labels for ids 1..=15, each exactly once, ordered by id.
pub fn parse_roadmap(raw: &str) -> Result<Vec<RoadmapLabel>, AdvisorError> {
    let mut labels: Vec<RoadmapLabel> = serde_json::from_str(strip_code_fence(raw))
        .map_err(|err| AdvisorError::Generation(format!("roadmap is not valid JSON: {err}")))?;

    let mut seen = BTreeSet::new();
    for label in &mut labels {
        label.id = label.id.trim().to_string();
        let id: u32 = label
            .id
            .parse()
            .ok()
            .filter(|id| (1..=ROADMAP_NODE_COUNT).contains(id))
            .ok_or_else(|| {
                AdvisorError::Generation(format!("unexpected roadmap node id '{}'", label.id))
            })?;
        if !seen.insert(id) {
            return Err(AdvisorError::Generation(format!(
                "roadmap node id '{id}' returned more than once"
            )));
        }
        // "01" and "+2" parse; the frontend matches on the canonical text.
        label.id = id.to_string();
    }
    if seen.len() != ROADMAP_NODE_COUNT as usize {
        let missing: Vec<String> = (1..=ROADMAP_NODE_COUNT)
            .filter(|id| !seen.contains(id))
            .map(|id| id.to_string())
            .collect();
        return Err(AdvisorError::Generation(format!(
            "roadmap is missing node ids {}",
            missing.join(", ")
        )));
    }

    labels.sort_by_key(|label| label.id.parse::<u32>().unwrap_or(u32::MAX));
    Ok(labels)
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        catalog::RecordBatch,
        generation::GenerationClientError,
        store::{QueryResult, StoreError},
    };
    use serde_json::{Map, Value, json};
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct StubStore {
        queries: Mutex<Vec<(String, usize)>>,
    }

    #[async_trait]
    impl CatalogStore for StubStore {
        async fn upsert(&self, batch: &RecordBatch) -> Result<usize, StoreError> {
            Ok(batch.len())
        }

        async fn query(&self, text: &str, n_results: usize) -> Result<QueryResult, StoreError> {
            self.queries.lock().await.push((text.to_string(), n_results));
            let mut metadata = Map::new();
            metadata.insert("institution_name".into(), json!("Test U"));
            metadata.insert("dost_eligibility".into(), json!("Yes"));
            Ok(QueryResult {
                documents: vec!["The Test U (Public college) located in Cebu City, Cebu offers the BS CS program. Their website is N/A.".into()],
                metadatas: vec![metadata],
            })
        }
    }

    struct StubGenerator {
        reply: Result<String, String>,
        requests: Mutex<Vec<GenerationRequest>>,
    }

    impl StubGenerator {
        fn replying(reply: impl Into<String>) -> Self {
            Self {
                reply: Ok(reply.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn failing(message: &str) -> Self {
            Self {
                reply: Err(message.to_string()),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl GenerationClient for StubGenerator {
        async fn generate(
            &self,
            request: GenerationRequest,
        ) -> Result<String, GenerationClientError> {
            self.requests.lock().await.push(request);
            self.reply.clone().map_err(GenerationClientError::Failed)
        }
    }

    fn full_roadmap() -> Value {
        Value::Array(
            (1..=15)
                .rev()
                .map(|id| json!({ "id": id.to_string(), "newLabel": format!("Node {id}") }))
                .collect(),
        )
    }

    fn advisor(store: &Arc<StubStore>, generator: &Arc<StubGenerator>) -> AdvisorService {
        AdvisorService::new(store.clone(), generator.clone())
    }

    #[tokio::test]
    async fn blank_query_is_rejected_before_retrieval() {
        let store = Arc::new(StubStore::default());
        let generator = Arc::new(StubGenerator::replying("unused"));
        let advisor = advisor(&store, &generator);

        for query in [None, Some(String::new()), Some("   ".into())] {
            let error = advisor.ask(query).await.expect_err("validation");
            assert!(matches!(error, AdvisorError::Validation(_)));
        }

        assert!(store.queries.lock().await.is_empty());
        assert!(generator.requests.lock().await.is_empty());
    }

    #[tokio::test]
    async fn scholarship_questions_send_metadata_context() {
        let store = Arc::new(StubStore::default());
        let generator = Arc::new(StubGenerator::replying("Test U is DOST eligible."));

        let answer = advisor(&store, &generator)
            .ask(Some("Which schools have scholarship resources?".into()))
            .await
            .expect("answer");

        assert_eq!(answer, "Test U is DOST eligible.");
        assert_eq!(
            store.queries.lock().await.as_slice(),
            [("Which schools have scholarship resources?".to_string(), ASK_RESULTS)]
        );
        let requests = generator.requests.lock().await;
        let request = &requests[0];
        assert_eq!(
            request.system_instruction,
            PromptKind::Scholarship.instruction()
        );
        assert!(request.contents[1].contains("\"dost_eligibility\": \"Yes\""));
        assert!(request.response_schema.is_none());
        assert!(request.temperature.is_none());
    }

    #[tokio::test]
    async fn institution_questions_send_documents() {
        let store = Arc::new(StubStore::default());
        let generator = Arc::new(StubGenerator::replying("Test U"));

        advisor(&store, &generator)
            .ask(Some("Where can I study computer science?".into()))
            .await
            .expect("answer");

        let requests = generator.requests.lock().await;
        assert!(requests[0].contents[1].contains("offers the BS CS program"));
        assert!(!requests[0].contents[1].contains("dost_eligibility"));
    }

    #[tokio::test]
    async fn roadmap_uses_default_query_schema_and_temperature() {
        let store = Arc::new(StubStore::default());
        let generator = Arc::new(StubGenerator::replying(full_roadmap().to_string()));

        let labels = advisor(&store, &generator)
            .generate_roadmap(RoadmapRequest::default())
            .await
            .expect("roadmap");

        let ids: Vec<_> = labels.iter().map(|label| label.id.as_str()).collect();
        let expected: Vec<String> = (1..=15).map(|id| id.to_string()).collect();
        assert_eq!(ids, expected);
        assert_eq!(labels[0].new_label, "Node 1");

        assert_eq!(
            store.queries.lock().await.as_slice(),
            [(DEFAULT_ROADMAP_QUERY.to_string(), ROADMAP_RESULTS)]
        );
        let requests = generator.requests.lock().await;
        assert_eq!(requests[0].temperature, Some(ROADMAP_TEMPERATURE));
        assert_eq!(requests[0].response_schema, Some(roadmap_schema()));
        assert_eq!(requests[0].contents.len(), 3);
    }

    #[tokio::test]
    async fn generator_failure_maps_to_generation_error() {
        let store = Arc::new(StubStore::default());
        let generator = Arc::new(StubGenerator::failing("quota exceeded"));

        let error = advisor(&store, &generator)
            .generate_roadmap(RoadmapRequest::default())
            .await
            .expect_err("failure");

        assert!(matches!(error, AdvisorError::Generation(ref message) if message.contains("quota exceeded")));
    }

    #[test]
    fn roadmap_with_missing_ids_is_rejected() {
        let partial = json!([{ "id": "1", "newLabel": "BS CS" }]).to_string();
        let error = parse_roadmap(&partial).expect_err("missing ids");
        assert!(matches!(error, AdvisorError::Generation(ref message) if message.contains("2, 3")));
    }

    #[test]
    fn roadmap_with_duplicate_or_foreign_ids_is_rejected() {
        let mut labels = full_roadmap();
        labels.as_array_mut().unwrap()[0]["id"] = json!("1");
        assert!(parse_roadmap(&labels.to_string()).is_err());

        let mut labels = full_roadmap();
        labels.as_array_mut().unwrap()[0]["id"] = json!("16");
        assert!(parse_roadmap(&labels.to_string()).is_err());
    }

    #[test]
    fn padded_or_signed_ids_are_canonicalized() {
        let mut labels = full_roadmap();
        for node in labels.as_array_mut().unwrap() {
            let replacement = match node["id"].as_str() {
                Some("1") => "01",
                Some("2") => "+2",
                _ => continue,
            };
            node["id"] = json!(replacement);
        }

        let parsed = parse_roadmap(&labels.to_string()).expect("labels");

        let ids: Vec<String> = parsed.into_iter().map(|label| label.id).collect();
        let expected: Vec<String> = (1..=15).map(|id: u32| id.to_string()).collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn roadmap_that_is_not_json_is_rejected() {
        assert!(matches!(
            parse_roadmap("Here is your roadmap!"),
            Err(AdvisorError::Generation(_))
        ));
    }

    #[test]
    fn fenced_roadmap_is_accepted() {
        let fenced = format!("```json\n{}\n```", full_roadmap());
        assert_eq!(parse_roadmap(&fenced).expect("labels").len(), 15);
    }
}

//! Text generation through the Gemini REST API.
//!
//! The advisor builds a [`GenerationRequest`] (system instruction, user parts, optional
//! structured-output settings) and hands it to a [`GenerationClient`]. [`GeminiClient`] maps it
//! onto `models/{model}:generateContent`.

use crate::config::get_config;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors surfaced while calling the generator.
#[derive(Debug, Error)]
pub enum GenerationClientError {
    /// Provider could not be reached or is not configured.
    #[error("Generation provider unavailable: {0}")]
    Unavailable(String),
    /// Provider answered with an error status.
    #[error("Failed to generate content: {0}")]
    Failed(String),
    /// Provider response did not contain usable text.
    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
}

/// One generation call: instruction, user parts and optional output constraints.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationRequest {
    /// System instruction steering the model.
    pub system_instruction: String,
    /// User-role text parts, sent in order.
    pub contents: Vec<String>,
    /// Response schema enforcing structured JSON output.
    pub response_schema: Option<Value>,
    /// Sampling temperature; provider default when unset.
    pub temperature: Option<f32>,
}

/// Interface implemented by generative model providers.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Generate text for the request.
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationClientError>;
}

/// Gemini `generateContent` client.
pub struct GeminiClient {
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GeminiClient {
    /// Build a client from the loaded configuration; fails without `GEMINI_API_KEY`.
    pub fn from_config() -> Result<Self, GenerationClientError> {
        let config = get_config();
        let api_key = config
            .require_gemini_api_key()
            .map_err(|err| GenerationClientError::Unavailable(err.to_string()))?;
        let http = Client::builder()
            .user_agent("roadmap-rag/generation")
            .build()
            .map_err(|err| GenerationClientError::Unavailable(err.to_string()))?;
        Ok(Self::new(
            http,
            config.gemini_base_url.clone(),
            api_key.to_string(),
            config.gemini_model.clone(),
        ))
    }

    /// Build a client for an explicit endpoint, key and model.
    pub fn new(http: Client, base_url: String, api_key: String, model: String) -> Self {
        Self {
            http,
            base_url,
            api_key,
            model,
        }
    }

    fn endpoint(&self) -> String {
        let model = self.model.trim_start_matches("models/");
        format!(
            "{}/models/{model}:generateContent",
            self.base_url.trim_end_matches('/')
        )
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentBody<'a> {
    system_instruction: Instruction<'a>,
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig<'a>>,
}

#[derive(Serialize)]
struct Instruction<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<&'a Value>,
}

impl<'a> GenerateContentBody<'a> {
    fn from_request(request: &'a GenerationRequest) -> Self {
        let generation_config =
            (request.temperature.is_some() || request.response_schema.is_some()).then(|| {
                GenerationConfig {
                    temperature: request.temperature,
                    response_mime_type: request
                        .response_schema
                        .as_ref()
                        .map(|_| "application/json"),
                    response_schema: request.response_schema.as_ref(),
                }
            });

        Self {
            system_instruction: Instruction {
                parts: vec![Part {
                    text: &request.system_instruction,
                }],
            },
            contents: request
                .contents
                .iter()
                .map(|text| Content {
                    role: "user",
                    parts: vec![Part { text }],
                })
                .collect(),
            generation_config,
        }
    }
}

#[derive(Deserialize, Debug)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize, Debug)]
struct Candidate {
    #[serde(default)]
    content: Option<ResponseContent>,
}

#[derive(Deserialize, Debug)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize, Debug)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[async_trait]
impl GenerationClient for GeminiClient {
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationClientError> {
        let body = GenerateContentBody::from_request(&request);
        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|error| {
                GenerationClientError::Unavailable(format!("failed to reach Gemini: {error}"))
            })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(GenerationClientError::Unavailable(format!(
                "model endpoint {} returned 404",
                self.endpoint()
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationClientError::Failed(format!(
                "Gemini returned {status}: {body}"
            )));
        }

        let payload: GenerateResponse = response.json().await.map_err(|error| {
            GenerationClientError::InvalidResponse(format!(
                "failed to decode Gemini response: {error}"
            ))
        })?;

        let text: String = payload
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect()
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(GenerationClientError::InvalidResponse(
                "no text in first candidate".into(),
            ));
        }
        Ok(text)
    }
}

//! HTTP surface for the advising backend.
//!
//! - `POST /generate_roadmap` – Label flowchart nodes 1–15 from the user's interest and the
//!   retrieved catalog. Body `{ "currentNodes": [...], "userQuery": "optional" }`; responds
//!   with `[{ "id": "1", "newLabel": "..." }, ...]`.
//! - `POST /ask_gemini` – Answer a free-text question. Body `{ "query": "..." }`; responds with
//!   `{ "response_text": "..." }`. A missing or blank query is rejected with 400.
//! - `GET /health` – Liveness probe.
//!
//! Failures are JSON bodies: `{ "error": "..." }`, plus a generic `message` on roadmap 500s.

use crate::advisor::{AdvisorApi, AdvisorError, RoadmapLabel, RoadmapRequest};
use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

const INTERNAL_ERROR_MESSAGE: &str = "An internal server error occurred.";

/// Build the HTTP router over an advisor implementation.
pub fn create_router<S>(service: Arc<S>, cors: CorsLayer) -> Router
where
    S: AdvisorApi + 'static,
{
    Router::new()
        .route("/generate_roadmap", post(generate_roadmap::<S>))
        .route("/ask_gemini", post(ask_gemini::<S>))
        .route("/health", get(health))
        .with_state(service)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// CORS policy: any origin when `allowed_origins` is `None`, otherwise the listed origins.
pub fn cors_layer(allowed_origins: Option<&[String]>) -> CorsLayer {
    let base = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    match allowed_origins {
        None => base.allow_origin(Any),
        Some(origins) => {
            let values: Vec<HeaderValue> = origins
                .iter()
                .filter_map(|origin| match HeaderValue::from_str(origin) {
                    Ok(value) => Some(value),
                    Err(err) => {
                        tracing::warn!(origin = %origin, error = %err, "Ignoring invalid CORS origin");
                        None
                    }
                })
                .collect();
            base.allow_origin(AllowOrigin::list(values))
        }
    }
}

/// Request body for `POST /ask_gemini`.
#[derive(Deserialize)]
struct AskRequest {
    #[serde(default)]
    query: Option<String>,
}

/// Success response for `POST /ask_gemini`.
#[derive(Serialize)]
struct AskResponse {
    response_text: String,
}

/// Answer a free-text question from the retrieved catalog records.
async fn ask_gemini<S>(
    State(service): State<Arc<S>>,
    payload: Result<Json<AskRequest>, JsonRejection>,
) -> Result<Json<AskResponse>, AppError>
where
    S: AdvisorApi,
{
    let query = match payload {
        Ok(Json(request)) => request.query,
        Err(rejection) => {
            tracing::debug!(error = %rejection, "Unreadable ask request body");
            None
        }
    };
    let response_text = service.ask(query).await?;
    Ok(Json(AskResponse { response_text }))
}

/// Generate labels for the roadmap flowchart.
async fn generate_roadmap<S>(
    State(service): State<Arc<S>>,
    payload: Result<Json<RoadmapRequest>, JsonRejection>,
) -> Result<Json<Vec<RoadmapLabel>>, AppError>
where
    S: AdvisorApi,
{
    let Json(request) =
        payload.map_err(|rejection| AppError::bad_request(rejection.body_text()))?;
    let labels = service
        .generate_roadmap(request)
        .await
        .map_err(|error| AppError::from(error).with_message(INTERNAL_ERROR_MESSAGE))?;
    Ok(Json(labels))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

#[derive(Debug)]
struct AppError {
    status: StatusCode,
    error: String,
    message: Option<&'static str>,
}

impl AppError {
    fn bad_request(error: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error: error.into(),
            message: None,
        }
    }

    /// Attach a caller-facing message to server-side failures.
    fn with_message(mut self, message: &'static str) -> Self {
        if self.status.is_server_error() {
            self.message = Some(message);
        }
        self
    }
}

impl From<AdvisorError> for AppError {
    fn from(error: AdvisorError) -> Self {
        match error {
            AdvisorError::Validation(message) => Self::bad_request(message),
            other => {
                tracing::error!(error = %other, "Request failed");
                Self {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    error: other.to_string(),
                    message: None,
                }
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = match self.message {
            Some(message) => json!({ "error": self.error, "message": message }),
            None => json!({ "error": self.error }),
        };
        (self.status, Json(body)).into_response()
    }
}

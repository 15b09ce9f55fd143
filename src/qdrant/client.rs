//! REST calls against Qdrant: collection bootstrap, point upserts and nearest-neighbour queries.

use crate::config::get_config;
use crate::qdrant::types::{
    CreateCollection, Envelope, NearestQuery, PointUpsert, QdrantError, QueryHits, ScoredPoint,
    UpsertPoints, VectorParams,
};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};

/// Thin Qdrant client bound to one server.
pub struct QdrantService {
    http: Client,
    base: Url,
    api_key: Option<String>,
}

impl QdrantService {
    /// Client for the configured `QDRANT_URL` and `QDRANT_API_KEY`.
    pub fn new() -> Result<Self, QdrantError> {
        let config = get_config();
        Self::with_endpoint(&config.qdrant_url, config.qdrant_api_key.clone())
    }

    /// Client for an explicit server.
    pub fn with_endpoint(url: &str, api_key: Option<String>) -> Result<Self, QdrantError> {
        let invalid = |reason: String| QdrantError::InvalidUrl {
            url: url.to_string(),
            reason,
        };
        let base = Url::parse(url).map_err(|err| invalid(err.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(invalid("not a hierarchical http(s) URL".into()));
        }
        let http = Client::builder()
            .user_agent(concat!("roadmap-rag/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let api_key = api_key.filter(|key| !key.is_empty());
        tracing::debug!(url = %base, has_api_key = api_key.is_some(), "Qdrant client ready");

        Ok(Self {
            http,
            base,
            api_key,
        })
    }

    /// Create `collection` with cosine distance unless it already exists. Returns whether it
    /// was created.
    pub async fn ensure_collection(
        &self,
        collection: &str,
        vector_size: usize,
    ) -> Result<bool, QdrantError> {
        let probe = self
            .request(Method::GET, &["collections", collection])
            .send()
            .await?;
        match probe.status() {
            StatusCode::OK => return Ok(false),
            StatusCode::NOT_FOUND => {}
            status => return Err(rejected("collection lookup", status, probe).await),
        }

        tracing::info!(collection, vector_size, "Creating collection");
        let body = CreateCollection {
            vectors: VectorParams {
                size: vector_size,
                distance: "Cosine",
            },
        };
        self.send(
            "collection create",
            self.request(Method::PUT, &["collections", collection])
                .json(&body),
        )
        .await?;
        Ok(true)
    }

    /// Insert or overwrite points by id, waiting until they are persisted.
    pub async fn upsert_points(
        &self,
        collection: &str,
        points: &[PointUpsert],
    ) -> Result<usize, QdrantError> {
        if points.is_empty() {
            return Ok(0);
        }

        self.send(
            "upsert",
            self.request(Method::PUT, &["collections", collection, "points"])
                .query(&[("wait", true)])
                .json(&UpsertPoints { points }),
        )
        .await?;
        tracing::debug!(collection, points = points.len(), "Points upserted");
        Ok(points.len())
    }

    /// The `limit` points closest to `vector`, best first, with payloads.
    pub async fn search_points(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredPoint>, QdrantError> {
        let response = self
            .send(
                "query",
                self.request(Method::POST, &["collections", collection, "points", "query"])
                    .json(&NearestQuery {
                        query: vector,
                        limit,
                        with_payload: true,
                    }),
            )
            .await?;
        let hits: Envelope<QueryHits> = response.json().await?;
        Ok(hits.result.into_points())
    }

    fn request(&self, method: Method, segments: &[&str]) -> RequestBuilder {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        let builder = self.http.request(method, url);
        match &self.api_key {
            Some(key) => builder.header("api-key", key),
            None => builder,
        }
    }

    async fn send(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<Response, QdrantError> {
        let response = request.send().await?;
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(rejected(operation, response.status(), response).await)
        }
    }
}

async fn rejected(operation: &'static str, status: StatusCode, response: Response) -> QdrantError {
    let body = response.text().await.unwrap_or_default();
    let error = QdrantError::Rejected {
        operation,
        status,
        body,
    };
    tracing::error!(error = %error, "Qdrant request failed");
    error
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{
        Method::{GET, POST, PUT},
        MockServer,
    };
    use serde_json::{Map, Value, json};

    fn service(server: &MockServer, api_key: Option<&str>) -> QdrantService {
        QdrantService::with_endpoint(&server.base_url(), api_key.map(str::to_string))
            .expect("service")
    }

    #[tokio::test]
    async fn search_points_maps_scored_payloads() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/collections/demo/points/query")
                    .json_body_partial(r#"{"limit":3,"with_payload":true}"#);
                then.status(200).json_body(json!({
                    "status": "ok",
                    "time": 0.0,
                    "result": {
                        "points": [
                            {
                                "id": "6f1c0a3e-0000-5000-8000-000000000000",
                                "score": 0.42,
                                "payload": { "document": "Example" }
                            }
                        ]
                    }
                }));
            })
            .await;

        let results = service(&server, None)
            .search_points("demo", &[0.1, 0.2], 3)
            .await
            .expect("search request");

        mock.assert_async().await;
        assert_eq!(results.len(), 1);
        let hit = &results[0];
        assert_eq!(hit.id, "6f1c0a3e-0000-5000-8000-000000000000");
        assert!((hit.score - 0.42).abs() < f32::EPSILON);
        assert_eq!(hit.payload["document"], json!("Example"));
    }

    #[tokio::test]
    async fn upsert_waits_and_sends_api_key() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/collections/demo/points")
                    .query_param("wait", "true")
                    .header("api-key", "token");
                then.status(200).json_body(json!({ "status": "ok", "result": {} }));
            })
            .await;

        let mut payload = Map::new();
        payload.insert("document".into(), Value::String("Doc".into()));
        let written = service(&server, Some("token"))
            .upsert_points(
                "demo",
                &[PointUpsert {
                    id: "6f1c0a3e-0000-5000-8000-000000000000".into(),
                    vector: vec![0.5, 0.5],
                    payload,
                }],
            )
            .await
            .expect("upsert");

        mock.assert_async().await;
        assert_eq!(written, 1);
    }

    #[tokio::test]
    async fn existing_collection_is_not_recreated() {
        let server = MockServer::start_async().await;
        let exists = server
            .mock_async(|when, then| {
                when.method(GET).path("/collections/demo");
                then.status(200).json_body(json!({ "status": "ok", "result": {} }));
            })
            .await;
        let create = server
            .mock_async(|when, then| {
                when.method(PUT).path("/collections/demo");
                then.status(200);
            })
            .await;

        let created = service(&server, None)
            .ensure_collection("demo", 768)
            .await
            .expect("ensure collection");

        assert!(!created);
        exists.assert_async().await;
        assert_eq!(create.hits_async().await, 0);
    }

    #[tokio::test]
    async fn query_failure_surfaces_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/collections/demo/points/query");
                then.status(500).body("boom");
            })
            .await;

        let error = service(&server, None)
            .search_points("demo", &[0.1], 5)
            .await
            .expect_err("failure");

        assert!(matches!(
            error,
            QdrantError::Rejected { operation: "query", status, ref body }
                if status == StatusCode::INTERNAL_SERVER_ERROR && body == "boom"
        ));
    }

    #[tokio::test]
    async fn missing_collection_is_created_with_cosine_distance() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/prefix/collections/demo");
                then.status(404);
            })
            .await;
        let create = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/prefix/collections/demo")
                    .json_body(json!({ "vectors": { "size": 8, "distance": "Cosine" } }));
                then.status(200).json_body(json!({ "result": true }));
            })
            .await;

        let service = QdrantService::with_endpoint(&server.url("/prefix/"), None).expect("service");
        let created = service.ensure_collection("demo", 8).await.expect("create");

        assert!(created);
        create.assert_async().await;
    }

    #[test]
    fn rejects_urls_without_a_path() {
        assert!(matches!(
            QdrantService::with_endpoint("mailto:qdrant@example.com", None),
            Err(QdrantError::InvalidUrl { .. })
        ));
    }
}

//! HTTP client wrapper for interacting with Qdrant.

use crate::config::Config;
use crate::index::{
    VectorIndex, validate_points, validate_query,
    types::{
        CollectionInfoResponse, CollectionSpec, CountResponse, IndexError, QueryResponse,
        QueryResponseResult, ScoredPoint, StoredPoint, UpsertSummary, VectorParams,
    },
};
use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde_json::{Value, json};
use std::time::Duration;

/// Connection settings for [`QdrantService`].
#[derive(Debug, Clone)]
pub struct QdrantSettings {
    /// Base URL of the Qdrant HTTP API.
    pub url: String,
    /// Optional `api-key` header value.
    pub api_key: Option<String>,
    /// Timeout applied to each individual request.
    pub timeout: Option<Duration>,
    /// Points sent per upsert request.
    pub upsert_batch_size: usize,
}

impl QdrantSettings {
    /// Derive settings from the runtime configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            url: config.qdrant_url.clone(),
            api_key: config.qdrant_api_key.clone(),
            timeout: config.qdrant_timeout_secs.map(Duration::from_secs),
            upsert_batch_size: config.qdrant_upsert_batch_size,
        }
    }
}

/// Lightweight HTTP client for Qdrant operations.
pub struct QdrantService {
    pub(crate) client: Client,
    pub(crate) base_url: String,
    pub(crate) api_key: Option<String>,
    pub(crate) upsert_batch_size: usize,
}

impl QdrantService {
    /// Construct a new client from explicit settings.
    pub fn new(settings: &QdrantSettings) -> Result<Self, IndexError> {
        let mut builder = Client::builder().user_agent("rusty-rag/0.1");
        if let Some(timeout) = settings.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        let base_url = normalize_base_url(&settings.url).map_err(IndexError::InvalidUrl)?;
        tracing::debug!(
            url = %base_url,
            has_api_key = %settings
                .api_key
                .as_deref()
                .map(|value| !value.is_empty())
                .unwrap_or(false),
            timeout = ?settings.timeout,
            "Initialized Qdrant HTTP client"
        );

        Ok(Self {
            client,
            base_url,
            api_key: settings.api_key.clone(),
            upsert_batch_size: settings.upsert_batch_size.max(1),
        })
    }

    /// Fetch the vector configuration of a collection, or `None` when it does not exist.
    pub async fn collection_params(
        &self,
        collection_name: &str,
    ) -> Result<Option<VectorParams>, IndexError> {
        let response = self
            .request(Method::GET, &format!("collections/{collection_name}"))
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {
                let info: CollectionInfoResponse = response.json().await?;
                Ok(Some(info.result.config.params.vectors))
            }
            StatusCode::NOT_FOUND => Ok(None),
            status => {
                let body = response.text().await.unwrap_or_default();
                let error = IndexError::UnexpectedStatus { status, body };
                tracing::error!(
                    collection = collection_name,
                    error = %error,
                    "Collection lookup failed"
                );
                Err(error)
            }
        }
    }

    async fn create_collection(&self, spec: &CollectionSpec) -> Result<(), IndexError> {
        let body = json!({
            "vectors": {
                "size": spec.vectors.size,
                "distance": spec.vectors.distance,
            }
        });

        let response = self
            .request(Method::PUT, &format!("collections/{}", spec.name))
            .json(&body)
            .send()
            .await?;

        self.ensure_success(response, "create collection").await?;
        tracing::info!(
            collection = %spec.name,
            vector_size = spec.vectors.size,
            distance = %spec.vectors.distance,
            "Collection created"
        );
        Ok(())
    }

    async fn upsert_batch(
        &self,
        collection_name: &str,
        batch: &[StoredPoint],
    ) -> Result<(), IndexError> {
        let serialized: Vec<_> = batch
            .iter()
            .map(|point| {
                json!({
                    "id": point.id.to_string(),
                    "vector": point.vector,
                    "payload": point.payload,
                })
            })
            .collect();

        let response = self
            .request(Method::PUT, &format!("collections/{collection_name}/points"))
            .query(&[("wait", true)])
            .json(&json!({ "points": serialized }))
            .send()
            .await?;

        self.ensure_success(response, "upsert points").await?;
        Ok(())
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format_endpoint(&self.base_url, path);
        let mut req = self.client.request(method, url);
        if let Some(api_key) = &self.api_key
            && !api_key.is_empty()
        {
            req = req.header("api-key", api_key);
        }
        req
    }

    async fn ensure_success(
        &self,
        response: reqwest::Response,
        operation: &'static str,
    ) -> Result<reqwest::Response, IndexError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = IndexError::UnexpectedStatus { status, body };
            tracing::error!(operation, error = %error, "Qdrant request failed");
            Err(error)
        }
    }
}

#[async_trait]
impl VectorIndex for QdrantService {
    async fn ensure_collection(&self, spec: &CollectionSpec) -> Result<(), IndexError> {
        match self.collection_params(&spec.name).await? {
            None => {
                tracing::debug!(
                    collection = %spec.name,
                    vectors = %spec.vectors,
                    "Creating collection"
                );
                self.create_collection(spec).await
            }
            Some(existing) if existing == spec.vectors => {
                tracing::debug!(collection = %spec.name, "Collection already present");
                Ok(())
            }
            Some(existing) => Err(IndexError::SchemaMismatch {
                collection: spec.name.clone(),
                existing,
                requested: spec.vectors,
            }),
        }
    }

    async fn count(&self, collection: &str) -> Result<usize, IndexError> {
        let response = self
            .request(Method::POST, &format!("collections/{collection}/points/count"))
            .json(&json!({ "exact": true }))
            .send()
            .await?;
        let response = self.ensure_success(response, "count points").await?;
        let payload: CountResponse = response.json().await?;
        Ok(payload.result.count)
    }

    async fn upsert(
        &self,
        spec: &CollectionSpec,
        points: Vec<StoredPoint>,
    ) -> Result<UpsertSummary, IndexError> {
        validate_points(spec, &points)?;
        if points.is_empty() {
            return Ok(UpsertSummary::default());
        }

        let total = points.len();
        let mut applied = 0;
        for batch in points.chunks(self.upsert_batch_size) {
            if let Err(error) = self.upsert_batch(&spec.name, batch).await {
                if applied == 0 {
                    return Err(error);
                }
                tracing::error!(
                    collection = %spec.name,
                    applied,
                    total,
                    error = %error,
                    "Upsert failed part-way"
                );
                return Err(IndexError::PartialBatch {
                    applied,
                    total,
                    source: Box::new(error),
                });
            }
            applied += batch.len();
        }

        tracing::debug!(collection = %spec.name, points = applied, "Points upserted");
        Ok(UpsertSummary { applied })
    }

    async fn similarity_search(
        &self,
        spec: &CollectionSpec,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredPoint>, IndexError> {
        validate_query(spec, vector, top_k)?;
        let body = json!({
            "query": vector,
            "limit": top_k,
            "with_payload": true,
        });

        let response = self
            .request(
                Method::POST,
                &format!("collections/{}/points/query", spec.name),
            )
            .json(&body)
            .send()
            .await?;
        let response = self.ensure_success(response, "query points").await?;

        let payload: QueryResponse = response.json().await?;
        let points = match payload.result {
            QueryResponseResult::Points(points) => points,
            QueryResponseResult::Object { points } => points,
        };
        Ok(points
            .into_iter()
            .map(|point| ScoredPoint {
                id: stringify_point_id(point.id),
                score: point.score,
                distance: spec.vectors.distance.score_to_distance(point.score),
                payload: point.payload,
            })
            .collect())
    }
}

fn normalize_base_url(url: &str) -> Result<String, String> {
    let mut parsed = reqwest::Url::parse(url).map_err(|err| err.to_string())?;
    let path = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&path);
    Ok(parsed.to_string())
}

fn format_endpoint(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}

fn stringify_point_id(id: Value) -> String {
    match id {
        Value::String(text) => text,
        Value::Number(number) => number.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{ChunkPayload, generate_point_id};
    use httpmock::{
        Method::{GET, POST, PUT},
        MockServer,
    };

    fn service(server: &MockServer, batch_size: usize) -> QdrantService {
        QdrantService {
            client: Client::builder()
                .user_agent("rusty-rag-test")
                .build()
                .expect("client"),
            base_url: server.base_url(),
            api_key: None,
            upsert_batch_size: batch_size,
        }
    }

    fn point(index: usize, dimension: usize) -> StoredPoint {
        StoredPoint {
            id: generate_point_id(),
            vector: vec![0.5; dimension],
            payload: ChunkPayload {
                text: format!("chunk {index}"),
                source: "doc.md".into(),
                chunk_index: index,
                ..Default::default()
            },
        }
    }

    #[test]
    fn invalid_url_is_rejected() {
        let error = QdrantService::new(&QdrantSettings {
            url: "not a url".into(),
            api_key: None,
            timeout: None,
            upsert_batch_size: 64,
        })
        .err()
        .expect("url should be rejected");
        assert!(matches!(error, IndexError::InvalidUrl(_)));
        assert!(error.is_configuration());
    }

    #[tokio::test]
    async fn ensure_collection_creates_missing_collection() {
        let server = MockServer::start_async().await;
        let lookup = server
            .mock_async(|when, then| {
                when.method(GET).path("/collections/docs");
                then.status(404).json_body(json!({ "status": { "error": "Not found" } }));
            })
            .await;
        let create = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/collections/docs")
                    .json_body(json!({ "vectors": { "size": 4, "distance": "Cosine" } }));
                then.status(200).json_body(json!({ "result": true, "status": "ok" }));
            })
            .await;

        service(&server, 8)
            .ensure_collection(&CollectionSpec::cosine("docs", 4))
            .await
            .expect("ensure collection");

        lookup.assert_async().await;
        create.assert_async().await;
    }

    #[tokio::test]
    async fn ensure_collection_reuses_matching_and_rejects_mismatched() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/collections/docs");
                then.status(200).json_body(json!({
                    "status": "ok",
                    "result": {
                        "status": "green",
                        "points_count": 10,
                        "config": {
                            "params": {
                                "vectors": { "size": 1024, "distance": "Cosine" },
                                "shard_number": 1
                            }
                        }
                    }
                }));
            })
            .await;
        let create = server
            .mock_async(|when, then| {
                when.method(PUT).path("/collections/docs");
                then.status(200);
            })
            .await;

        let qdrant = service(&server, 8);
        qdrant
            .ensure_collection(&CollectionSpec::cosine("docs", 1024))
            .await
            .expect("matching collection is reused");

        let error = qdrant
            .ensure_collection(&CollectionSpec::cosine("docs", 768))
            .await
            .expect_err("dimension mismatch");
        assert!(matches!(error, IndexError::SchemaMismatch { .. }));
        assert!(error.is_configuration());
        create.assert_hits_async(0).await;
    }

    #[tokio::test]
    async fn count_reads_exact_count() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/collections/docs/points/count")
                    .json_body(json!({ "exact": true }));
                then.status(200)
                    .json_body(json!({ "status": "ok", "result": { "count": 10 } }));
            })
            .await;

        let count = service(&server, 8).count("docs").await.expect("count");
        mock.assert_async().await;
        assert_eq!(count, 10);
    }

    #[tokio::test]
    async fn upsert_rejects_wrong_dimension_before_any_request() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(PUT).path("/collections/docs/points");
                then.status(200);
            })
            .await;

        let error = service(&server, 8)
            .upsert(&CollectionSpec::cosine("docs", 1024), vec![point(0, 768)])
            .await
            .expect_err("dimension mismatch");

        assert!(matches!(
            error,
            IndexError::DimensionMismatch {
                expected: 1024,
                actual: 768,
                ..
            }
        ));
        mock.assert_hits_async(0).await;
    }

    #[tokio::test]
    async fn upsert_reports_partial_batch_failure() {
        let server = MockServer::start_async().await;
        let first = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/collections/docs/points")
                    .body_contains("\"chunk_index\":0");
                then.status(200)
                    .json_body(json!({ "status": "ok", "result": { "status": "completed" } }));
            })
            .await;
        let second = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/collections/docs/points")
                    .body_contains("\"chunk_index\":2");
                then.status(503).body("overloaded");
            })
            .await;

        let points = (0..3).map(|index| point(index, 4)).collect();
        let error = service(&server, 2)
            .upsert(&CollectionSpec::cosine("docs", 4), points)
            .await
            .expect_err("second batch fails");

        first.assert_async().await;
        second.assert_async().await;
        match &error {
            IndexError::PartialBatch { applied, total, .. } => {
                assert_eq!((*applied, *total), (2, 3));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(error.is_transient());
    }

    #[tokio::test]
    async fn upsert_failure_on_first_batch_is_not_partial() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(PUT).path("/collections/docs/points");
                then.status(400).body("bad request");
            })
            .await;

        let error = service(&server, 2)
            .upsert(&CollectionSpec::cosine("docs", 4), vec![point(0, 4)])
            .await
            .expect_err("rejected");
        assert!(matches!(
            error,
            IndexError::UnexpectedStatus {
                status: StatusCode::BAD_REQUEST,
                ..
            }
        ));
        assert!(!error.is_transient());
    }

    #[tokio::test]
    async fn similarity_search_emits_expected_request() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/collections/docs/points/query")
                    .json_body(json!({
                        "query": [0.1, 0.2],
                        "limit": 3,
                        "with_payload": true
                    }));
                then.status(200).json_body(json!({
                    "status": "ok",
                    "time": 0.0,
                    "result": {
                        "points": [
                            {
                                "id": "1b4e28ba-2fa1-11d2-883f-0016d3cca427",
                                "score": 0.75,
                                "payload": {
                                    "text": "Example",
                                    "source": "doc.md",
                                    "chunk_index": 0
                                }
                            }
                        ]
                    }
                }));
            })
            .await;

        let hits = service(&server, 8)
            .similarity_search(&CollectionSpec::cosine("docs", 2), &[0.1, 0.2], 3)
            .await
            .expect("search request");

        mock.assert_async().await;
        assert_eq!(hits.len(), 1);
        let hit = &hits[0];
        assert_eq!(hit.id, "1b4e28ba-2fa1-11d2-883f-0016d3cca427");
        assert!((hit.score - 0.75).abs() < f32::EPSILON);
        assert!((hit.distance - 0.25).abs() < 1e-6);
        let payload = hit.payload.as_ref().expect("payload");
        assert_eq!(payload["text"], Value::String("Example".into()));
    }

    #[tokio::test]
    async fn similarity_search_rejects_zero_top_k() {
        let server = MockServer::start_async().await;
        let error = service(&server, 8)
            .similarity_search(&CollectionSpec::cosine("docs", 2), &[0.1, 0.2], 0)
            .await
            .expect_err("top_k");
        assert!(matches!(error, IndexError::InvalidTopK));
    }
}

//! HTTP surface for Rusty RAG.
//!
//! This module exposes a compact Axum router:
//!
//! - `POST /ingest`: chunk, embed, and store a document `{ "source", "text" }`. Returns
//!   `{ "status": "indexed", "chunks", "upserted" }`, or `{ "status": "skipped", "existing" }`
//!   when the collection is already populated.
//! - `POST /retrieve`: `{ "query", "top_k"? }` to `{ "contexts", "sources" }`.
//! - `POST /answer`: `{ "query", "top_k"? }` to `{ "answer", "contexts", "sources" }`.
//! - `GET /count`: exact number of stored chunks.
//! - `GET /metrics`: ingestion and query counters.
//!
//! Configuration errors map to `400`, transient upstream failures to `503`, anything else to
//! `500`.

use crate::processing::{Document, IngestOutcome, PipelineApi, PipelineError};
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Build the HTTP router exposing the pipeline.
pub fn create_router<S>(service: Arc<S>) -> Router
where
    S: PipelineApi + 'static,
{
    Router::new()
        .route("/ingest", post(ingest_document::<S>))
        .route("/retrieve", post(retrieve_context::<S>))
        .route("/answer", post(answer_query::<S>))
        .route("/count", get(count_chunks::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .with_state(service)
}

/// Request body for `POST /ingest`.
#[derive(Deserialize)]
struct IngestRequest {
    /// Identifier stored with every chunk.
    source: String,
    /// Extracted document text.
    text: String,
}

/// Ingest a document unless the collection already holds points.
async fn ingest_document<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<IngestRequest>,
) -> Result<Json<IngestOutcome>, AppError>
where
    S: PipelineApi,
{
    let source = request.source.clone();
    let outcome = service
        .ingest(Document::new(request.source, request.text))
        .await?;
    tracing::info!(source = %source, outcome = ?outcome, "Ingest request completed");
    Ok(Json(outcome))
}

/// Request body shared by `POST /retrieve` and `POST /answer`.
#[derive(Deserialize)]
struct QueryRequest {
    query: String,
    #[serde(default)]
    top_k: Option<usize>,
}

/// Response body for `POST /retrieve`.
#[derive(Serialize)]
struct RetrieveResponse {
    contexts: Vec<String>,
    sources: BTreeSet<String>,
}

async fn retrieve_context<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<RetrieveResponse>, AppError>
where
    S: PipelineApi,
{
    let bundle = service.retrieve(request.query, request.top_k).await?;
    Ok(Json(RetrieveResponse {
        contexts: bundle.contexts,
        sources: bundle.sources,
    }))
}

/// Response body for `POST /answer`.
#[derive(Serialize)]
struct AnswerResponse {
    answer: String,
    contexts: Vec<String>,
    sources: BTreeSet<String>,
}

async fn answer_query<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<AnswerResponse>, AppError>
where
    S: PipelineApi,
{
    let answer = service.answer(request.query, request.top_k).await?;
    Ok(Json(AnswerResponse {
        answer: answer.text,
        contexts: answer.context.contexts,
        sources: answer.context.sources,
    }))
}

async fn count_chunks<S>(State(service): State<Arc<S>>) -> Result<Json<serde_json::Value>, AppError>
where
    S: PipelineApi,
{
    let count = service.count().await?;
    Ok(Json(json!({ "count": count })))
}

async fn get_metrics<S>(State(service): State<Arc<S>>) -> impl IntoResponse
where
    S: PipelineApi,
{
    Json(service.metrics_snapshot())
}

struct AppError(PipelineError);

impl AppError {
    fn status(&self) -> StatusCode {
        if self.0.is_configuration() {
            StatusCode::BAD_REQUEST
        } else if self.0.is_transient() {
            StatusCode::SERVICE_UNAVAILABLE
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "Request failed");
        } else {
            tracing::warn!(error = %self.0, "Request rejected");
        }
        let mut body = json!({ "error": self.0.to_string() });
        if let Some((applied, total)) = self.0.partial_batch() {
            body["applied"] = json!(applied);
            body["total"] = json!(total);
        }
        (status, Json(body)).into_response()
    }
}

impl From<PipelineError> for AppError {
    fn from(inner: PipelineError) -> Self {
        Self(inner)
    }
}

//! Shared types used by the vector index implementations.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Errors returned by vector index operations.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Base URL failed to parse or normalize.
    #[error("Invalid Qdrant URL: {0}")]
    InvalidUrl(String),
    /// A vector does not match the dimension of its collection.
    #[error(
        "vector dimension mismatch for collection '{collection}': expected {expected}, got {actual}"
    )]
    DimensionMismatch {
        /// Target collection.
        collection: String,
        /// Dimension configured on the collection.
        expected: usize,
        /// Dimension of the offending vector.
        actual: usize,
    },
    /// Collection exists with a different vector configuration.
    #[error("collection '{collection}' exists as {existing} but {requested} was requested")]
    SchemaMismatch {
        /// Target collection.
        collection: String,
        /// Configuration currently stored.
        existing: VectorParams,
        /// Configuration requested by the caller.
        requested: VectorParams,
    },
    /// Nearest-neighbour queries need at least one result slot.
    #[error("top_k must be greater than zero")]
    InvalidTopK,
    /// Collection has not been created yet.
    #[error("collection '{0}' does not exist")]
    MissingCollection(String),
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Qdrant responded with an unexpected status code.
    #[error("Unexpected Qdrant response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned from Qdrant.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// Some upsert batches were applied before a later batch failed.
    #[error("upsert applied {applied} of {total} points before failing: {source}")]
    PartialBatch {
        /// Points durably written before the failure.
        applied: usize,
        /// Points in the whole request.
        total: usize,
        /// Failure of the first rejected batch.
        #[source]
        source: Box<IndexError>,
    },
}

impl IndexError {
    /// Whether the error was raised by local validation before any I/O.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidUrl(_)
                | Self::DimensionMismatch { .. }
                | Self::SchemaMismatch { .. }
                | Self::InvalidTopK
        )
    }

    /// Whether retrying the request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(error) => error.is_timeout() || error.is_connect() || error.is_request(),
            Self::UnexpectedStatus { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            Self::PartialBatch { source, .. } => source.is_transient(),
            _ => false,
        }
    }
}

/// Distance metric configured on a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Distance {
    /// Cosine similarity; higher scores are closer.
    Cosine,
    /// Dot product; higher scores are closer.
    Dot,
    /// Euclidean distance; lower scores are closer.
    Euclid,
}

impl Distance {
    /// Convert a Qdrant score into a distance where `0.0` means identical direction/position.
    pub fn score_to_distance(self, score: f32) -> f32 {
        match self {
            Self::Cosine => 1.0 - score,
            Self::Dot => -score,
            Self::Euclid => score,
        }
    }
}

impl fmt::Display for Distance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Cosine => "Cosine",
            Self::Dot => "Dot",
            Self::Euclid => "Euclid",
        };
        f.write_str(name)
    }
}

/// Vector configuration of a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorParams {
    /// Vector dimensionality.
    pub size: usize,
    /// Distance metric.
    pub distance: Distance,
}

impl fmt::Display for VectorParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-dim {}", self.size, self.distance)
    }
}

/// Named, dimension- and metric-typed container of points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSpec {
    /// Collection name.
    pub name: String,
    /// Dimension and distance metric.
    pub vectors: VectorParams,
}

impl CollectionSpec {
    /// Describe a cosine collection, the metric used for chunk embeddings.
    pub fn cosine(name: impl Into<String>, dimension: usize) -> Self {
        Self {
            name: name.into(),
            vectors: VectorParams {
                size: dimension,
                distance: Distance::Cosine,
            },
        }
    }

    /// Configured vector dimension.
    pub fn dimension(&self) -> usize {
        self.vectors.size
    }
}

/// Payload persisted alongside each chunk vector.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkPayload {
    /// Chunk text.
    pub text: String,
    /// Identifier of the originating document.
    pub source: String,
    /// Position of the chunk within its document.
    pub chunk_index: usize,
    /// SHA-256 of the whole source document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
    /// RFC3339 timestamp of the ingestion run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingested_at: Option<String>,
    /// Enclosing `#` header for markdown-chunked documents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Enclosing `##` header for markdown-chunked documents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    /// Enclosing `###` header for markdown-chunked documents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subsection: Option<String>,
}

/// Point persisted in the vector index.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredPoint {
    /// Identifier, fresh per ingestion.
    pub id: Uuid,
    /// Embedding vector.
    pub vector: Vec<f32>,
    /// Stored payload.
    pub payload: ChunkPayload,
}

/// Nearest-neighbour hit returned by similarity search.
#[derive(Debug, Clone)]
pub struct ScoredPoint {
    /// Identifier assigned to the vector.
    pub id: String,
    /// Raw score reported by the index.
    pub score: f32,
    /// Distance to the query under the collection metric (`0.0` is closest).
    pub distance: f32,
    /// Payload associated with the vector, if any.
    pub payload: Option<Map<String, Value>>,
}

/// Summary describing how an upsert request was applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertSummary {
    /// Number of points written.
    pub applied: usize,
}

#[derive(Deserialize)]
pub(crate) struct CollectionInfoResponse {
    pub(crate) result: CollectionInfo,
}

#[derive(Deserialize)]
pub(crate) struct CollectionInfo {
    pub(crate) config: CollectionConfig,
}

#[derive(Deserialize)]
pub(crate) struct CollectionConfig {
    pub(crate) params: CollectionParams,
}

#[derive(Deserialize)]
pub(crate) struct CollectionParams {
    pub(crate) vectors: VectorParams,
}

#[derive(Deserialize)]
pub(crate) struct CountResponse {
    pub(crate) result: CountResult,
}

#[derive(Deserialize)]
pub(crate) struct CountResult {
    pub(crate) count: usize,
}

#[derive(Deserialize)]
pub(crate) struct QueryResponse {
    pub(crate) result: QueryResponseResult,
}

#[derive(Deserialize)]
#[serde(untagged)]
pub(crate) enum QueryResponseResult {
    Points(Vec<QueryPoint>),
    Object {
        #[serde(default)]
        points: Vec<QueryPoint>,
    },
}

#[derive(Deserialize)]
pub(crate) struct QueryPoint {
    pub(crate) id: Value,
    pub(crate) score: f32,
    #[serde(default)]
    pub(crate) payload: Option<Map<String, Value>>,
}

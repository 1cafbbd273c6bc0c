//! Vector index abstraction with Qdrant and in-memory implementations.
//!
//! All operations are treated as blocking, retryable I/O. Implementations validate vector
//! dimensions and `top_k` locally before issuing any request, so configuration mistakes surface
//! as [`IndexError::is_configuration`] failures without touching the network.

pub mod memory;
pub mod payload;
pub mod qdrant;
pub mod types;

use async_trait::async_trait;

pub use memory::InMemoryIndex;
pub use payload::{compute_content_hash, current_timestamp_rfc3339, generate_point_id};
pub use qdrant::{QdrantService, QdrantSettings};
pub use types::{
    ChunkPayload, CollectionSpec, Distance, IndexError, ScoredPoint, StoredPoint, UpsertSummary,
    VectorParams,
};

/// Storage and nearest-neighbour search over stored points.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Create the collection when absent; an existing collection with the same vector
    /// configuration is left untouched, a mismatching one is rejected.
    async fn ensure_collection(&self, spec: &CollectionSpec) -> Result<(), IndexError>;

    /// Exact number of points stored in the collection.
    async fn count(&self, collection: &str) -> Result<usize, IndexError>;

    /// Insert or overwrite points by id.
    async fn upsert(
        &self,
        spec: &CollectionSpec,
        points: Vec<StoredPoint>,
    ) -> Result<UpsertSummary, IndexError>;

    /// Nearest neighbours of `vector`, closest first, at most `top_k` of them.
    async fn similarity_search(
        &self,
        spec: &CollectionSpec,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredPoint>, IndexError>;
}

/// Reject points whose vectors do not match the collection dimension.
pub fn validate_points(spec: &CollectionSpec, points: &[StoredPoint]) -> Result<(), IndexError> {
    points
        .iter()
        .try_for_each(|point| validate_vector(spec, &point.vector))
}

/// Reject a query vector of the wrong dimension or a zero `top_k`.
pub fn validate_query(
    spec: &CollectionSpec,
    vector: &[f32],
    top_k: usize,
) -> Result<(), IndexError> {
    if top_k == 0 {
        return Err(IndexError::InvalidTopK);
    }
    validate_vector(spec, vector)
}

fn validate_vector(spec: &CollectionSpec, vector: &[f32]) -> Result<(), IndexError> {
    if vector.len() != spec.dimension() {
        return Err(IndexError::DimensionMismatch {
            collection: spec.name.clone(),
            expected: spec.dimension(),
            actual: vector.len(),
        });
    }
    Ok(())
}

//! Process-local vector index used for tests and offline runs.

use crate::index::{
    VectorIndex, validate_points, validate_query,
    types::{
        CollectionSpec, Distance, IndexError, ScoredPoint, StoredPoint, UpsertSummary,
        VectorParams,
    },
};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug)]
struct Collection {
    vectors: VectorParams,
    points: Vec<StoredPoint>,
    positions: HashMap<Uuid, usize>,
}

impl Collection {
    fn new(vectors: VectorParams) -> Self {
        Self {
            vectors,
            points: Vec::new(),
            positions: HashMap::new(),
        }
    }

    fn put(&mut self, point: StoredPoint) {
        match self.positions.get(&point.id) {
            Some(&position) => self.points[position] = point,
            None => {
                self.positions.insert(point.id, self.points.len());
                self.points.push(point);
            }
        }
    }
}

/// Exact nearest-neighbour index kept in memory.
///
/// Upserts are all-or-nothing. Search scans every point, so this is meant for small corpora.
#[derive(Debug, Default)]
pub struct InMemoryIndex {
    collections: RwLock<HashMap<String, Collection>>,
}

impl InMemoryIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    async fn check_collection(&self, spec: &CollectionSpec) -> Result<(), IndexError> {
        let collections = self.collections.read().await;
        let collection = collections
            .get(&spec.name)
            .ok_or_else(|| IndexError::MissingCollection(spec.name.clone()))?;
        if collection.vectors != spec.vectors {
            return Err(IndexError::SchemaMismatch {
                collection: spec.name.clone(),
                existing: collection.vectors,
                requested: spec.vectors,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn ensure_collection(&self, spec: &CollectionSpec) -> Result<(), IndexError> {
        let mut collections = self.collections.write().await;
        match collections.get(&spec.name) {
            Some(existing) if existing.vectors == spec.vectors => Ok(()),
            Some(existing) => Err(IndexError::SchemaMismatch {
                collection: spec.name.clone(),
                existing: existing.vectors,
                requested: spec.vectors,
            }),
            None => {
                collections.insert(spec.name.clone(), Collection::new(spec.vectors));
                tracing::debug!(
                    collection = %spec.name,
                    vectors = %spec.vectors,
                    "Collection created"
                );
                Ok(())
            }
        }
    }

    async fn count(&self, collection: &str) -> Result<usize, IndexError> {
        self.collections
            .read()
            .await
            .get(collection)
            .map(|collection| collection.points.len())
            .ok_or_else(|| IndexError::MissingCollection(collection.to_string()))
    }

    async fn upsert(
        &self,
        spec: &CollectionSpec,
        points: Vec<StoredPoint>,
    ) -> Result<UpsertSummary, IndexError> {
        validate_points(spec, &points)?;
        self.check_collection(spec).await?;

        let applied = points.len();
        let mut collections = self.collections.write().await;
        let collection = collections
            .get_mut(&spec.name)
            .ok_or_else(|| IndexError::MissingCollection(spec.name.clone()))?;
        for point in points {
            collection.put(point);
        }
        Ok(UpsertSummary { applied })
    }

    async fn similarity_search(
        &self,
        spec: &CollectionSpec,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredPoint>, IndexError> {
        validate_query(spec, vector, top_k)?;
        self.check_collection(spec).await?;

        let collections = self.collections.read().await;
        let collection = collections
            .get(&spec.name)
            .ok_or_else(|| IndexError::MissingCollection(spec.name.clone()))?;

        let distance = collection.vectors.distance;
        let mut hits: Vec<ScoredPoint> = collection
            .points
            .iter()
            .map(|point| {
                let score = score(distance, vector, &point.vector);
                ScoredPoint {
                    id: point.id.to_string(),
                    score,
                    distance: distance.score_to_distance(score),
                    payload: payload_map(point),
                }
            })
            .collect();

        // Stable sort keeps insertion order among equidistant points.
        hits.sort_by(|left, right| left.distance.total_cmp(&right.distance));
        hits.truncate(top_k);
        Ok(hits)
    }
}

fn score(distance: Distance, query: &[f32], candidate: &[f32]) -> f32 {
    match distance {
        Distance::Cosine => {
            let norm = magnitude(query) * magnitude(candidate);
            if norm == 0.0 {
                0.0
            } else {
                dot(query, candidate) / norm
            }
        }
        Distance::Dot => dot(query, candidate),
        Distance::Euclid => query
            .iter()
            .zip(candidate)
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt(),
    }
}

fn dot(left: &[f32], right: &[f32]) -> f32 {
    left.iter().zip(right).map(|(a, b)| a * b).sum()
}

fn magnitude(vector: &[f32]) -> f32 {
    dot(vector, vector).sqrt()
}

fn payload_map(point: &StoredPoint) -> Option<Map<String, Value>> {
    match serde_json::to_value(&point.payload) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

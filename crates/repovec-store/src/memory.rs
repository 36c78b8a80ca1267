//! In-memory backend for tests.
//!
//! Implements the full [`VectorBackend`] contract over process memory with
//! brute-force cosine search, plus failure injection for exercising retry
//! paths. Compiled only for tests (`testing` feature or this crate's own
//! test builds).

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::StoreError;
use crate::traits::{validate_collection_name, VectorBackend};
use crate::types::{CollectionStats, Distance, HitPayload, ScoredPoint, SearchFilter, VectorPoint};

#[derive(Default)]
struct CollectionState {
    dimension: usize,
    distance: Distance,
    points: HashMap<Uuid, VectorPoint>,
}

#[derive(Default)]
struct Inner {
    collections: BTreeMap<String, CollectionState>,
    /// Remaining injected upsert failures per collection
    fail_upserts: HashMap<String, u32>,
}

/// Process-memory vector store.
#[derive(Default)]
pub struct InMemoryBackend {
    inner: Mutex<Inner>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` upserts into `collection` fail.
    pub async fn fail_upserts(&self, collection: &str, count: u32) {
        let mut inner = self.inner.lock().await;
        inner.fail_upserts.insert(collection.to_string(), count);
    }

    /// Stored point count, creating nothing.
    pub async fn point_count(&self, collection: &str) -> usize {
        let inner = self.inner.lock().await;
        inner
            .collections
            .get(collection)
            .map(|c| c.points.len())
            .unwrap_or(0)
    }

    /// Ids currently stored in a collection, sorted.
    pub async fn point_ids(&self, collection: &str) -> Vec<Uuid> {
        let inner = self.inner.lock().await;
        let mut ids: Vec<Uuid> = inner
            .collections
            .get(collection)
            .map(|c| c.points.keys().copied().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }
}

#[async_trait]
impl VectorBackend for InMemoryBackend {
    async fn warmup(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn ensure_collection(
        &self,
        name: &str,
        dimension: usize,
        distance: Distance,
    ) -> Result<(), StoreError> {
        validate_collection_name(name)?;
        let mut inner = self.inner.lock().await;
        if let Some(existing) = inner.collections.get(name) {
            if existing.dimension != dimension {
                return Err(StoreError::DimensionMismatch {
                    name: name.to_string(),
                    expected: dimension,
                    actual: existing.dimension,
                });
            }
            if existing.distance != distance {
                return Err(StoreError::DistanceMismatch {
                    name: name.to_string(),
                    expected: distance.as_str().to_string(),
                    actual: existing.distance.as_str().to_string(),
                });
            }
            return Ok(());
        }
        inner.collections.insert(
            name.to_string(),
            CollectionState {
                dimension,
                distance,
                points: HashMap::new(),
            },
        );
        Ok(())
    }

    async fn upsert(&self, collection: &str, points: Vec<VectorPoint>) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;

        if let Some(remaining) = inner.fail_upserts.get_mut(collection) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(StoreError::Backend("injected upsert failure".into()));
            }
        }

        let state = inner.collections.entry(collection.to_string()).or_default();
        for point in points {
            state.points.insert(point.id, point);
        }
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        query: &[f32],
        top_k: usize,
        score_threshold: Option<f32>,
        filter: Option<SearchFilter>,
    ) -> Result<Vec<ScoredPoint>, StoreError> {
        let inner = self.inner.lock().await;
        let state = inner
            .collections
            .get(collection)
            .ok_or_else(|| StoreError::CollectionNotFound(collection.to_string()))?;

        let filter = filter.unwrap_or_default();
        let mut hits: Vec<ScoredPoint> = state
            .points
            .values()
            .filter_map(|point| {
                let payload = HitPayload::from_json(&point.payload);
                if let Some(ref repo) = filter.repo_id {
                    if &payload.repo_id != repo {
                        return None;
                    }
                }
                if let Some(ref language) = filter.language {
                    if &payload.language != language {
                        return None;
                    }
                }
                let score = cosine(query, &point.vector);
                if score_threshold.is_some_and(|t| score < t) {
                    return None;
                }
                Some(ScoredPoint {
                    id: point.id.to_string(),
                    score,
                    payload,
                })
            })
            .collect();

        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn collection_stats(&self, name: &str) -> Result<CollectionStats, StoreError> {
        let inner = self.inner.lock().await;
        let state = inner
            .collections
            .get(name)
            .ok_or_else(|| StoreError::CollectionNotFound(name.to_string()))?;
        Ok(CollectionStats {
            points_count: state.points.len() as u64,
            indexed: true,
            status: "ready".to_string(),
        })
    }

    async fn list_collections(&self) -> Result<Vec<String>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.collections.keys().cloned().collect())
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

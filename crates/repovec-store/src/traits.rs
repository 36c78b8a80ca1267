//! Backend trait definition.
//!
//! The capability surface every vector store must provide. Construction is
//! cheap; `warmup` does the first network round-trip so callers control
//! when connectivity problems surface.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::types::{CollectionStats, Distance, ScoredPoint, SearchFilter, VectorPoint};

/// Vector store capability interface.
///
/// Implemented by the managed (Qdrant) and local (SurrealDB) backends; all
/// operations are async and safe to issue concurrently.
#[async_trait]
pub trait VectorBackend: Send + Sync {
    /// First network contact; fails fast on bad credentials or address.
    async fn warmup(&self) -> Result<(), StoreError>;

    /// Idempotently create a collection, or validate an existing one.
    ///
    /// Fails when the collection exists with a different dimension or
    /// distance metric.
    async fn ensure_collection(
        &self,
        name: &str,
        dimension: usize,
        distance: Distance,
    ) -> Result<(), StoreError>;

    /// Insert-or-replace points keyed by their ids.
    async fn upsert(&self, collection: &str, points: Vec<VectorPoint>) -> Result<(), StoreError>;

    /// Top-k nearest neighbours by descending score.
    async fn search(
        &self,
        collection: &str,
        query: &[f32],
        top_k: usize,
        score_threshold: Option<f32>,
        filter: Option<SearchFilter>,
    ) -> Result<Vec<ScoredPoint>, StoreError>;

    /// Point count and readiness for one collection.
    async fn collection_stats(&self, name: &str) -> Result<CollectionStats, StoreError>;

    /// Names of all collections in the store.
    async fn list_collections(&self) -> Result<Vec<String>, StoreError>;
}

/// Collection names travel into query strings on some backends, so only a
/// conservative character set is accepted.
pub(crate) fn validate_collection_name(name: &str) -> Result<(), StoreError> {
    if name.is_empty()
        || !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(StoreError::InvalidCollectionName(name.to_string()));
    }
    Ok(())
}

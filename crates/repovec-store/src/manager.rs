//! Storage manager: chunks + embeddings → validated points → upserts.
//!
//! Builds one point per chunk with a deterministic UUID id, validates the
//! vector (exact dimension, finite values), routes points to collections by
//! language and issues batched upserts. Invalid points are dropped and
//! recorded; a failed upsert is retried once before being recorded as a
//! batch failure. Nothing here aborts the run.

use std::collections::BTreeMap;
use std::sync::Arc;

use repovec_parsers::{meta, Chunk};
use serde_json::json;
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::traits::VectorBackend;
use crate::types::{point_id, VectorPoint};

/// Preferred upsert sub-batch size for both backends.
pub const UPSERT_BATCH_SIZE: usize = 100;

/// Routes a chunk to its target collection(s).
#[derive(Debug, Clone)]
pub struct CollectionRouter {
    by_language: BTreeMap<String, String>,
    default_collection: String,
    /// Cross-language union collection; written only for chunks tagged
    /// `cross_language = "true"`
    mixed: Option<String>,
}

impl CollectionRouter {
    pub fn new(
        by_language: BTreeMap<String, String>,
        default_collection: impl Into<String>,
        mixed: Option<String>,
    ) -> Self {
        Self {
            by_language,
            default_collection: default_collection.into(),
            mixed,
        }
    }

    /// Primary collection for a chunk.
    pub fn route(&self, chunk: &Chunk) -> &str {
        self.by_language
            .get(chunk.language.as_str())
            .map(String::as_str)
            .unwrap_or(&self.default_collection)
    }

    /// Mixed-collection name when this chunk is explicitly tagged for it.
    pub fn mixed_for(&self, chunk: &Chunk) -> Option<&str> {
        let tagged = chunk
            .metadata
            .get(meta::CROSS_LANGUAGE)
            .is_some_and(|v| v == "true");
        if tagged {
            self.mixed.as_deref()
        } else {
            None
        }
    }
}

/// A point dropped before storage, with its cause.
#[derive(Debug, Clone)]
pub struct DroppedPoint {
    pub file_path: String,
    pub item_name: String,
    pub reason: String,
}

/// A collection whose upsert failed after the retry.
#[derive(Debug, Clone)]
pub struct UpsertFailure {
    pub collection: String,
    pub points: usize,
    pub error: String,
}

/// Outcome of one stored batch.
#[derive(Debug, Clone, Default)]
pub struct StorageOutcome {
    /// Points stored per collection
    pub stored: BTreeMap<String, u64>,
    pub dropped: Vec<DroppedPoint>,
    pub failures: Vec<UpsertFailure>,
}

impl StorageOutcome {
    pub fn total_stored(&self) -> u64 {
        self.stored.values().sum()
    }
}

/// Builds and stores vector points.
pub struct StorageManager {
    backend: Arc<dyn VectorBackend>,
    router: CollectionRouter,
    dimension: usize,
}

impl StorageManager {
    pub fn new(backend: Arc<dyn VectorBackend>, router: CollectionRouter, dimension: usize) -> Self {
        Self {
            backend,
            router,
            dimension,
        }
    }

    /// Store one embedded batch.
    ///
    /// `chunks` and `vectors` must pair positionally; a length divergence
    /// here means the batch processor broke its own invariant, and the
    /// whole batch is refused.
    pub async fn store_batch(
        &self,
        chunks: &[Chunk],
        vectors: Vec<Vec<f32>>,
    ) -> Result<StorageOutcome, StoreError> {
        if chunks.len() != vectors.len() {
            return Err(StoreError::PairingMismatch {
                chunks: chunks.len(),
                vectors: vectors.len(),
            });
        }

        let mut outcome = StorageOutcome::default();
        let mut grouped: BTreeMap<String, Vec<VectorPoint>> = BTreeMap::new();

        for (chunk, vector) in chunks.iter().zip(vectors) {
            if let Err(reason) = self.validate_vector(&vector) {
                warn!(
                    file = %chunk.file_path,
                    item = %chunk.item_name,
                    %reason,
                    "dropping point with invalid vector"
                );
                outcome.dropped.push(DroppedPoint {
                    file_path: chunk.file_path.clone(),
                    item_name: chunk.item_name.clone(),
                    reason,
                });
                continue;
            }

            let point = VectorPoint {
                id: point_id(&chunk.chunk_hash),
                vector,
                payload: payload_for(chunk),
            };

            if let Some(mixed) = self.router.mixed_for(chunk) {
                grouped
                    .entry(mixed.to_string())
                    .or_default()
                    .push(point.clone());
            }
            grouped
                .entry(self.router.route(chunk).to_string())
                .or_default()
                .push(point);
        }

        for (collection, points) in grouped {
            let total = points.len();
            let mut stored = 0u64;
            let mut failed: Option<String> = None;

            for sub in points.chunks(UPSERT_BATCH_SIZE) {
                match self.upsert_with_retry(&collection, sub.to_vec()).await {
                    Ok(()) => stored += sub.len() as u64,
                    Err(err) => {
                        failed = Some(err.to_string());
                        break;
                    }
                }
            }

            if stored > 0 {
                *outcome.stored.entry(collection.clone()).or_default() += stored;
            }
            if let Some(error) = failed {
                warn!(collection = %collection, %error, "upsert failed after retry");
                outcome.failures.push(UpsertFailure {
                    collection,
                    points: total - stored as usize,
                    error,
                });
            }
        }

        Ok(outcome)
    }

    /// One retry on upsert failure, then give up.
    async fn upsert_with_retry(
        &self,
        collection: &str,
        points: Vec<VectorPoint>,
    ) -> Result<(), StoreError> {
        match self.backend.upsert(collection, points.clone()).await {
            Ok(()) => Ok(()),
            Err(first) => {
                debug!(collection, error = %first, "retrying upsert once");
                self.backend.upsert(collection, points).await
            }
        }
    }

    fn validate_vector(&self, vector: &[f32]) -> Result<(), String> {
        if vector.len() != self.dimension {
            return Err(format!(
                "dimension {} != expected {}",
                vector.len(),
                self.dimension
            ));
        }
        if let Some(pos) = vector.iter().position(|v| !v.is_finite()) {
            return Err(format!("non-finite value at index {}", pos));
        }
        Ok(())
    }
}

/// Chunk metadata verbatim as the point payload, content included.
fn payload_for(chunk: &Chunk) -> serde_json::Value {
    json!({
        "content": chunk.content,
        "language": chunk.language.as_str(),
        "item_type": chunk.item_type,
        "item_name": chunk.item_name,
        "file_path": chunk.file_path,
        "start_line": chunk.start_line,
        "end_line": chunk.end_line,
        "repo_id": chunk.repo_id,
        "repo_component": chunk.repo_component,
        "business_domain": chunk.business_domain,
        "complexity_score": chunk.complexity_score,
        "chunk_hash": chunk.chunk_hash,
        "metadata": chunk.metadata,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryBackend;
    use repovec_parsers::Language;

    fn chunk(name: &str) -> Chunk {
        Chunk::new(
            Language::Rust,
            "function",
            name,
            format!("fn {}() {{}}", name),
            "src/lib.rs",
            1,
            1,
            "repo-a",
        )
    }

    fn router() -> CollectionRouter {
        let mut map = BTreeMap::new();
        map.insert("rust".to_string(), "rust_code".to_string());
        CollectionRouter::new(map, "codebase", Some("mixed_all".to_string()))
    }

    fn manager(backend: Arc<InMemoryBackend>) -> StorageManager {
        StorageManager::new(backend, router(), 3)
    }

    #[tokio::test]
    async fn stores_valid_points_by_collection() {
        let backend = Arc::new(InMemoryBackend::new());
        let manager = manager(backend.clone());

        let chunks = vec![chunk("a"), chunk("b")];
        let vectors = vec![vec![0.1, 0.2, 0.3], vec![0.4, 0.5, 0.6]];

        let outcome = manager.store_batch(&chunks, vectors).await.unwrap();
        assert_eq!(outcome.stored["rust_code"], 2);
        assert!(outcome.dropped.is_empty());
        assert_eq!(backend.point_count("rust_code").await, 2);
    }

    #[tokio::test]
    async fn wrong_dimension_drops_the_point_not_the_batch() {
        let backend = Arc::new(InMemoryBackend::new());
        let manager = manager(backend.clone());

        let chunks = vec![chunk("a"), chunk("b")];
        let vectors = vec![vec![0.1, 0.2], vec![0.4, 0.5, 0.6]];

        let outcome = manager.store_batch(&chunks, vectors).await.unwrap();
        assert_eq!(outcome.total_stored(), 1);
        assert_eq!(outcome.dropped.len(), 1);
        assert!(outcome.dropped[0].reason.contains("dimension"));
    }

    #[tokio::test]
    async fn nan_vector_is_dropped_others_stored() {
        let backend = Arc::new(InMemoryBackend::new());
        let manager = manager(backend.clone());

        let chunks = vec![chunk("a"), chunk("b")];
        let vectors = vec![vec![0.1, f32::NAN, 0.3], vec![0.4, 0.5, 0.6]];

        let outcome = manager.store_batch(&chunks, vectors).await.unwrap();
        assert_eq!(outcome.total_stored(), 1);
        assert_eq!(outcome.dropped.len(), 1);
        assert!(outcome.dropped[0].reason.contains("non-finite"));
        assert_eq!(backend.point_count("rust_code").await, 1);
    }

    #[tokio::test]
    async fn pairing_mismatch_refuses_the_batch() {
        let backend = Arc::new(InMemoryBackend::new());
        let manager = manager(backend);

        let chunks = vec![chunk("a"), chunk("b")];
        let result = manager.store_batch(&chunks, vec![vec![0.0; 3]]).await;
        assert!(matches!(result, Err(StoreError::PairingMismatch { .. })));
    }

    #[tokio::test]
    async fn reingesting_identical_chunk_overwrites_in_place() {
        let backend = Arc::new(InMemoryBackend::new());
        let manager = manager(backend.clone());

        let chunks = vec![chunk("a")];
        manager
            .store_batch(&chunks, vec![vec![0.1, 0.2, 0.3]])
            .await
            .unwrap();
        manager
            .store_batch(&chunks, vec![vec![0.7, 0.8, 0.9]])
            .await
            .unwrap();

        assert_eq!(backend.point_count("rust_code").await, 1);
    }

    #[tokio::test]
    async fn cross_language_tag_also_routes_to_mixed() {
        let backend = Arc::new(InMemoryBackend::new());
        let manager = manager(backend.clone());

        let tagged = chunk("a").with_meta(meta::CROSS_LANGUAGE, "true");
        let outcome = manager
            .store_batch(&[tagged], vec![vec![0.1, 0.2, 0.3]])
            .await
            .unwrap();

        assert_eq!(outcome.stored["rust_code"], 1);
        assert_eq!(outcome.stored["mixed_all"], 1);
    }

    #[tokio::test]
    async fn upsert_failure_is_retried_then_recorded() {
        let backend = Arc::new(InMemoryBackend::new());
        backend.fail_upserts("rust_code", 1).await; // first attempt fails, retry succeeds
        let manager = manager(backend.clone());

        let outcome = manager
            .store_batch(&[chunk("a")], vec![vec![0.1, 0.2, 0.3]])
            .await
            .unwrap();
        assert_eq!(outcome.total_stored(), 1);
        assert!(outcome.failures.is_empty());

        backend.fail_upserts("rust_code", 10).await; // both attempts fail
        let outcome = manager
            .store_batch(&[chunk("b")], vec![vec![0.1, 0.2, 0.3]])
            .await
            .unwrap();
        assert_eq!(outcome.total_stored(), 0);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].collection, "rust_code");
    }

    #[test]
    fn unmapped_language_routes_to_default() {
        let router = router();
        let md = Chunk::new(
            Language::Markdown,
            "documentation",
            "Intro",
            "## Intro",
            "README.md",
            1,
            1,
            "repo-a",
        );
        assert_eq!(router.route(&md), "codebase");
    }
}

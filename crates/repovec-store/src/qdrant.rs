//! Managed remote backend (Qdrant).
//!
//! Collections are addressed by name; points carry a UUID id, a dense
//! vector and the chunk payload. Configured via `QDRANT_URL` and
//! `QDRANT_API_KEY`.

use async_trait::async_trait;
use qdrant_client::qdrant::{
    point_id::PointIdOptions, vectors_config::Config, CollectionStatus, Condition,
    CreateCollectionBuilder, Distance as QdrantDistance, Filter, PointStruct,
    SearchPointsBuilder, UpsertPointsBuilder, VectorParams, VectorsConfig,
};
use qdrant_client::{Payload, Qdrant};
use tracing::{debug, info};

use crate::error::StoreError;
use crate::traits::{validate_collection_name, VectorBackend};
use crate::types::{CollectionStats, Distance, HitPayload, ScoredPoint, SearchFilter, VectorPoint};

/// Qdrant-backed implementation of [`VectorBackend`].
pub struct QdrantBackend {
    client: Qdrant,
}

impl QdrantBackend {
    /// Build the client without touching the network; `warmup` connects.
    pub fn new(url: &str, api_key: Option<&str>) -> Result<Self, StoreError> {
        let mut builder = Qdrant::from_url(url);
        if let Some(key) = api_key {
            builder = builder.api_key(key);
        }
        let client = builder
            .build()
            .map_err(|e| StoreError::Connection(format!("qdrant client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl VectorBackend for QdrantBackend {
    async fn warmup(&self) -> Result<(), StoreError> {
        self.client
            .list_collections()
            .await
            .map_err(|e| StoreError::Connection(format!("qdrant unreachable: {}", e)))?;
        debug!("qdrant connection verified");
        Ok(())
    }

    async fn ensure_collection(
        &self,
        name: &str,
        dimension: usize,
        distance: Distance,
    ) -> Result<(), StoreError> {
        validate_collection_name(name)?;

        if self.client.collection_exists(name).await? {
            // Validate the existing collection instead of recreating it.
            let info = self
                .client
                .collection_info(name)
                .await?
                .result
                .ok_or_else(|| StoreError::CollectionNotFound(name.to_string()))?;

            let params = info
                .config
                .and_then(|c| c.params)
                .and_then(|p| p.vectors_config)
                .and_then(|v| v.config);

            if let Some(Config::Params(vector_params)) = params {
                if vector_params.size != dimension as u64 {
                    return Err(StoreError::DimensionMismatch {
                        name: name.to_string(),
                        expected: dimension,
                        actual: vector_params.size as usize,
                    });
                }
                if vector_params.distance != QdrantDistance::Cosine as i32 {
                    return Err(StoreError::DistanceMismatch {
                        name: name.to_string(),
                        expected: distance.as_str().to_string(),
                        actual: format!("{}", vector_params.distance),
                    });
                }
            }
            debug!(collection = name, "collection already exists");
            return Ok(());
        }

        info!(collection = name, dimension, "creating collection");
        let vectors_config = VectorsConfig {
            config: Some(Config::Params(VectorParams {
                size: dimension as u64,
                distance: QdrantDistance::Cosine.into(),
                ..Default::default()
            })),
        };
        self.client
            .create_collection(CreateCollectionBuilder::new(name).vectors_config(vectors_config))
            .await?;
        Ok(())
    }

    async fn upsert(&self, collection: &str, points: Vec<VectorPoint>) -> Result<(), StoreError> {
        if points.is_empty() {
            return Ok(());
        }
        debug!(collection, count = points.len(), "upserting points");

        let qdrant_points: Vec<PointStruct> = points
            .into_iter()
            .map(|p| {
                let payload = Payload::try_from(p.payload)?;
                Ok(PointStruct::new(p.id.to_string(), p.vector, payload))
            })
            .collect::<Result<Vec<_>, qdrant_client::QdrantError>>()?;

        self.client
            .upsert_points(UpsertPointsBuilder::new(collection, qdrant_points).wait(true))
            .await?;
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
        let mut builder =
            SearchPointsBuilder::new(collection, query.to_vec(), top_k as u64).with_payload(true);

        if let Some(threshold) = score_threshold {
            builder = builder.score_threshold(threshold);
        }
        if let Some(filter) = filter.filter(|f| !f.is_empty()) {
            let mut conditions = Vec::new();
            if let Some(repo_id) = filter.repo_id {
                conditions.push(Condition::matches("repo_id", repo_id));
            }
            if let Some(language) = filter.language {
                conditions.push(Condition::matches("language", language));
            }
            builder = builder.filter(Filter::must(conditions));
        }

        let response = self.client.search_points(builder).await?;

        let hits = response
            .result
            .into_iter()
            .map(|point| {
                let id = point
                    .id
                    .and_then(|p| p.point_id_options)
                    .map(|options| match options {
                        PointIdOptions::Uuid(u) => u,
                        PointIdOptions::Num(n) => n.to_string(),
                    })
                    .unwrap_or_default();

                let payload = point.payload;
                let get_string = |key: &str| -> String {
                    payload
                        .get(key)
                        .and_then(|v| v.as_str())
                        .map(|s| s.to_string())
                        .unwrap_or_default()
                };
                let get_u64 = |key: &str| -> u64 {
                    payload
                        .get(key)
                        .and_then(|v| v.as_integer())
                        .map(|i| i.max(0) as u64)
                        .unwrap_or(0)
                };

                ScoredPoint {
                    id,
                    score: point.score,
                    payload: HitPayload {
                        repo_id: get_string("repo_id"),
                        file_path: get_string("file_path"),
                        language: get_string("language"),
                        item_type: get_string("item_type"),
                        item_name: get_string("item_name"),
                        start_line: get_u64("start_line"),
                        end_line: get_u64("end_line"),
                        business_domain: get_string("business_domain"),
                        content: get_string("content"),
                    },
                }
            })
            .collect();

        Ok(hits)
    }

    async fn collection_stats(&self, name: &str) -> Result<CollectionStats, StoreError> {
        if !self.client.collection_exists(name).await? {
            return Err(StoreError::CollectionNotFound(name.to_string()));
        }
        let info = self
            .client
            .collection_info(name)
            .await?
            .result
            .ok_or_else(|| StoreError::CollectionNotFound(name.to_string()))?;

        let status = CollectionStatus::try_from(info.status)
            .map(|s| format!("{:?}", s).to_lowercase())
            .unwrap_or_else(|_| "unknown".to_string());

        Ok(CollectionStats {
            points_count: info.points_count.unwrap_or(0),
            indexed: info.status == CollectionStatus::Green as i32,
            status,
        })
    }

    async fn list_collections(&self) -> Result<Vec<String>, StoreError> {
        let response = self.client.list_collections().await?;
        Ok(response
            .collections
            .into_iter()
            .map(|c| c.name)
            .collect())
    }
}

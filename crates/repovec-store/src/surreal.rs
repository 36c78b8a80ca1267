//! Local self-hosted backend (SurrealDB).
//!
//! One table per collection plus a `rv_collections` meta table recording
//! `(name, dimension, distance)` so `ensure_collection` stays idempotent
//! and can validate what exists. Similarity is cosine via
//! `vector::similarity::cosine`, ordered descending. Configured via the
//! `SURREALDB_*` environment variables.

use async_trait::async_trait;
use serde::Deserialize;
use surrealdb::engine::remote::http::{Client, Http};
use surrealdb::opt::auth::Root;
use surrealdb::Surreal;
use tracing::{debug, info};

use crate::error::StoreError;
use crate::traits::{validate_collection_name, VectorBackend};
use crate::types::{CollectionStats, Distance, HitPayload, ScoredPoint, SearchFilter, VectorPoint};

/// Meta table registering every collection this backend manages.
const META_TABLE: &str = "rv_collections";

/// Connection parameters for [`SurrealBackend::connect`].
#[derive(Debug, Clone)]
pub struct SurrealConnection {
    /// Host and port, scheme optional (`localhost:8000`)
    pub url: String,
    pub namespace: String,
    pub database: String,
    pub username: String,
    pub password: String,
}

/// SurrealDB-backed implementation of [`VectorBackend`].
pub struct SurrealBackend {
    db: Surreal<Client>,
}

#[derive(Debug, Deserialize)]
struct MetaRow {
    #[allow(dead_code)]
    name: String,
    dimension: usize,
    distance: String,
}

#[derive(Debug, Deserialize)]
struct NameRow {
    name: String,
}

#[derive(Debug, Deserialize)]
struct CountRow {
    count: u64,
}

#[derive(Debug, Deserialize)]
struct HitRow {
    id: String,
    score: f32,
    payload: serde_json::Value,
}

impl SurrealBackend {
    /// Connect, authenticate and select the namespace/database.
    ///
    /// Unlike the managed backend this does network work up front; the
    /// SurrealDB client has no offline construction mode.
    pub async fn connect(conn: SurrealConnection) -> Result<Self, StoreError> {
        let address = conn
            .url
            .trim_start_matches("http://")
            .trim_start_matches("https://");

        let db = Surreal::new::<Http>(address)
            .await
            .map_err(|e| StoreError::Connection(format!("surrealdb unreachable: {}", e)))?;

        db.signin(Root {
            username: &conn.username,
            password: &conn.password,
        })
        .await
        .map_err(|e| StoreError::Connection(format!("surrealdb auth failed: {}", e)))?;

        db.use_ns(&conn.namespace)
            .use_db(&conn.database)
            .await
            .map_err(|e| StoreError::Connection(format!("surrealdb ns/db: {}", e)))?;

        info!(url = %conn.url, ns = %conn.namespace, db = %conn.database, "surrealdb connected");
        Ok(Self { db })
    }
}

#[async_trait]
impl VectorBackend for SurrealBackend {
    async fn warmup(&self) -> Result<(), StoreError> {
        // Cheap round-trip to confirm the session is usable.
        self.db
            .query("RETURN 1")
            .await
            .map_err(|e| StoreError::Connection(format!("surrealdb ping failed: {}", e)))?;
        Ok(())
    }

    async fn ensure_collection(
        &self,
        name: &str,
        dimension: usize,
        distance: Distance,
    ) -> Result<(), StoreError> {
        validate_collection_name(name)?;

        let mut response = self
            .db
            .query("SELECT name, dimension, distance FROM type::thing($tb, $name)")
            .bind(("tb", META_TABLE))
            .bind(("name", name.to_string()))
            .await?;
        let existing: Option<MetaRow> = response.take(0)?;

        if let Some(meta) = existing {
            if meta.dimension != dimension {
                return Err(StoreError::DimensionMismatch {
                    name: name.to_string(),
                    expected: dimension,
                    actual: meta.dimension,
                });
            }
            if meta.distance != distance.as_str() {
                return Err(StoreError::DistanceMismatch {
                    name: name.to_string(),
                    expected: distance.as_str().to_string(),
                    actual: meta.distance,
                });
            }
            debug!(collection = name, "collection already registered");
            return Ok(());
        }

        info!(collection = name, dimension, "defining collection table");
        // Table names cannot be parameterized in DEFINE statements; the
        // name was validated to [a-zA-Z0-9_] above.
        let define = format!(
            "DEFINE TABLE IF NOT EXISTS {name} SCHEMALESS;\n\
             DEFINE INDEX IF NOT EXISTS {name}_vector_idx ON {name} \
             FIELDS vector MTREE DIMENSION {dimension} DIST COSINE TYPE F32;"
        );
        self.db.query(define).await?.check()?;

        self.db
            .query(
                "UPSERT type::thing($tb, $name) CONTENT \
                 { name: $name, dimension: $dimension, distance: $distance }",
            )
            .bind(("tb", META_TABLE))
            .bind(("name", name.to_string()))
            .bind(("dimension", dimension))
            .bind(("distance", distance.as_str()))
            .await?
            .check()?;
        Ok(())
    }

    async fn upsert(&self, collection: &str, points: Vec<VectorPoint>) -> Result<(), StoreError> {
        validate_collection_name(collection)?;
        debug!(collection, count = points.len(), "upserting points");

        for point in points {
            self.db
                .query("UPSERT type::thing($tb, $id) CONTENT { vector: $vector, payload: $payload }")
                .bind(("tb", collection.to_string()))
                .bind(("id", point.id.to_string()))
                .bind(("vector", point.vector))
                .bind(("payload", point.payload))
                .await?
                .check()?;
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
        validate_collection_name(collection)?;

        let mut clauses = Vec::new();
        let filter = filter.unwrap_or_default();
        if filter.repo_id.is_some() {
            clauses.push("payload.repo_id = $repo_id");
        }
        if filter.language.is_some() {
            clauses.push("payload.language = $language");
        }
        let where_clause = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };

        let statement = format!(
            "SELECT meta::id(id) AS id, payload, \
             vector::similarity::cosine(vector, $query) AS score \
             FROM {collection} {where_clause} ORDER BY score DESC LIMIT {top_k}"
        );

        let mut request = self.db.query(statement).bind(("query", query.to_vec()));
        if let Some(repo_id) = filter.repo_id {
            request = request.bind(("repo_id", repo_id));
        }
        if let Some(language) = filter.language {
            request = request.bind(("language", language));
        }

        let mut response = request.await?;
        let rows: Vec<HitRow> = response.take(0)?;

        // The threshold cannot reference the score alias inside the query,
        // so it is applied after the fetch.
        let hits = rows
            .into_iter()
            .filter(|row| score_threshold.is_none_or(|t| row.score >= t))
            .map(|row| ScoredPoint {
                id: row.id,
                score: row.score,
                payload: HitPayload::from_json(&row.payload),
            })
            .collect();

        Ok(hits)
    }

    async fn collection_stats(&self, name: &str) -> Result<CollectionStats, StoreError> {
        validate_collection_name(name)?;

        let mut response = self
            .db
            .query("SELECT name FROM type::thing($tb, $name)")
            .bind(("tb", META_TABLE))
            .bind(("name", name.to_string()))
            .await?;
        let registered: Option<NameRow> = response.take(0)?;
        if registered.is_none() {
            return Err(StoreError::CollectionNotFound(name.to_string()));
        }

        let statement = format!("SELECT count() AS count FROM {name} GROUP ALL");
        let mut response = self.db.query(statement).await?;
        let counts: Vec<CountRow> = response.take(0)?;

        Ok(CollectionStats {
            points_count: counts.first().map(|c| c.count).unwrap_or(0),
            indexed: true,
            status: "ready".to_string(),
        })
    }

    async fn list_collections(&self) -> Result<Vec<String>, StoreError> {
        let mut response = self
            .db
            .query(format!("SELECT name FROM {META_TABLE} ORDER BY name"))
            .await?;
        let rows: Vec<NameRow> = response.take(0)?;
        Ok(rows.into_iter().map(|r| r.name).collect())
    }
}

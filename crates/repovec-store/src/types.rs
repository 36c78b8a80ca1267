//! Shared vector store types.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Distance metric for a collection. Every repovec collection is cosine;
/// the enum exists so the contract is explicit at call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Distance {
    #[default]
    Cosine,
}

impl Distance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Distance::Cosine => "cosine",
        }
    }
}

/// One vector plus its payload, keyed by a deterministic id.
#[derive(Debug, Clone)]
pub struct VectorPoint {
    /// UUID v5 derived from the chunk hash; re-ingestion overwrites in place
    pub id: Uuid,
    pub vector: Vec<f32>,
    /// Chunk metadata verbatim, including content
    pub payload: Value,
}

/// Deterministic point id for a chunk hash.
///
/// `point_id(h) == point_id(h)` for any digest `h`, which is what makes
/// upserts idempotent across runs.
pub fn point_id(chunk_hash: &str) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, chunk_hash.as_bytes())
}

/// Payload fields surfaced on search hits.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HitPayload {
    pub repo_id: String,
    pub file_path: String,
    pub language: String,
    pub item_type: String,
    pub item_name: String,
    pub start_line: u64,
    pub end_line: u64,
    pub business_domain: String,
    pub content: String,
}

impl HitPayload {
    /// Extract the known fields from a JSON payload, tolerating absences.
    pub fn from_json(value: &Value) -> Self {
        let s = |key: &str| -> String {
            value
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        let n = |key: &str| -> u64 { value.get(key).and_then(Value::as_u64).unwrap_or(0) };

        Self {
            repo_id: s("repo_id"),
            file_path: s("file_path"),
            language: s("language"),
            item_type: s("item_type"),
            item_name: s("item_name"),
            start_line: n("start_line"),
            end_line: n("end_line"),
            business_domain: s("business_domain"),
            content: s("content"),
        }
    }
}

/// One search result, ordered by descending score.
#[derive(Debug, Clone)]
pub struct ScoredPoint {
    pub id: String,
    pub score: f32,
    pub payload: HitPayload,
}

/// Optional search constraints.
#[derive(Debug, Clone, Default)]
pub struct SearchFilter {
    pub repo_id: Option<String>,
    pub language: Option<String>,
}

impl SearchFilter {
    pub fn is_empty(&self) -> bool {
        self.repo_id.is_none() && self.language.is_none()
    }
}

/// Collection health summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionStats {
    pub points_count: u64,
    pub indexed: bool,
    pub status: String,
}

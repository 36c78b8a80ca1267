//! Vector store error types.

use thiserror::Error;

/// Errors from vector backends and the storage manager.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Could not reach or authenticate with the backend
    #[error("vector store connection failed: {0}")]
    Connection(String),

    /// Collection exists with an incompatible dimension
    #[error("collection '{name}' has dimension {actual}, expected {expected}")]
    DimensionMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },

    /// Collection exists with an incompatible distance metric
    #[error("collection '{name}' uses distance '{actual}', expected '{expected}'")]
    DistanceMismatch {
        name: String,
        expected: String,
        actual: String,
    },

    /// Collection does not exist
    #[error("collection '{0}' not found")]
    CollectionNotFound(String),

    /// Collection name unusable for the backend
    #[error("invalid collection name '{0}': only [a-zA-Z0-9_] allowed")]
    InvalidCollectionName(String),

    /// Chunk and vector counts diverged before storage
    #[error("pairing mismatch: {chunks} chunks but {vectors} vectors")]
    PairingMismatch { chunks: usize, vectors: usize },

    /// Any other backend-reported failure
    #[error("vector store error: {0}")]
    Backend(String),

    /// Payload serialization failed
    #[error("payload serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<qdrant_client::QdrantError> for StoreError {
    fn from(err: qdrant_client::QdrantError) -> Self {
        StoreError::Backend(err.to_string())
    }
}

impl From<surrealdb::Error> for StoreError {
    fn from(err: surrealdb::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mismatch_errors_name_the_collection() {
        let err = StoreError::DimensionMismatch {
            name: "rust_code".into(),
            expected: 4096,
            actual: 768,
        };
        let text = err.to_string();
        assert!(text.contains("rust_code"));
        assert!(text.contains("4096"));
        assert!(text.contains("768"));
    }
}

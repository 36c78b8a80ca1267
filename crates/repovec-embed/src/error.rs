//! Embedding client errors.

use thiserror::Error;

/// Errors from the embedding endpoint.
///
/// The retry loop consults [`EmbedError::is_retryable`]; everything else is
/// surfaced immediately as a batch-level failure.
#[derive(Error, Debug)]
pub enum EmbedError {
    /// Authentication rejected (401/403); never retried
    #[error("embedding auth failed: {0}")]
    Auth(String),

    /// Other non-429 4xx; never retried
    #[error("embedding request rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },

    /// HTTP 429
    #[error("embedding rate limited, retry after {retry_after:?} seconds")]
    RateLimited { retry_after: Option<u64> },

    /// Timeout, connection failure or 5xx
    #[error("embedding service unavailable: {0}")]
    Unavailable(String),

    /// Response vector count does not match the input length
    #[error("embedding count mismatch: sent {expected} inputs, got {actual} vectors")]
    CountMismatch { expected: usize, actual: usize },

    /// Batch size outside 1..=max
    #[error("invalid batch size {size} (must be between 1 and {max})")]
    InvalidBatch { size: usize, max: usize },

    /// Response body did not parse
    #[error("malformed embedding response: {0}")]
    MalformedResponse(String),

    /// HTTP client could not be constructed
    #[error("http client error: {0}")]
    Client(String),
}

impl EmbedError {
    /// Transient failures worth a backoff-and-retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EmbedError::RateLimited { .. } | EmbedError::Unavailable(_)
        )
    }

    /// Seconds the server asked us to wait, when it said so.
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            EmbedError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryability_matches_the_taxonomy() {
        assert!(EmbedError::RateLimited { retry_after: None }.is_retryable());
        assert!(EmbedError::Unavailable("503".into()).is_retryable());
        assert!(!EmbedError::Auth("bad key".into()).is_retryable());
        assert!(!EmbedError::Rejected {
            status: 400,
            message: "bad input".into()
        }
        .is_retryable());
        assert!(!EmbedError::CountMismatch {
            expected: 4,
            actual: 3
        }
        .is_retryable());
    }
}

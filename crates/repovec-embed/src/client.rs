//! HTTP client for an OpenAI-compatible batch embeddings endpoint.
//!
//! Request: `POST {base_url}/embeddings` with `{"input": [...], "model": ...}`
//! and a bearer token. Response: `{"data": [{"embedding": [...], "index": n}]}`.
//! A process-wide semaphore caps in-flight requests; transient failures are
//! retried with capped exponential backoff and ±20% jitter.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::error::EmbedError;

/// Backoff base delay.
const BACKOFF_BASE_SECS: f64 = 1.0;
/// Backoff multiplier per attempt.
const BACKOFF_MULTIPLIER: f64 = 2.0;
/// Backoff ceiling.
const BACKOFF_CAP_SECS: f64 = 30.0;
/// Jitter ratio applied symmetrically around the computed delay.
const JITTER_RATIO: f64 = 0.2;

/// Embedding client configuration.
#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    /// Endpoint base; `/embeddings` is appended
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    /// Expected vector dimension
    pub dimension: usize,
    /// Upper bound on inputs per request
    pub max_batch_size: usize,
    /// Max in-flight requests across the process
    pub rate_limit: usize,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

#[derive(Debug, Serialize)]
struct EmbeddingsRequest {
    input: Vec<String>,
    model: String,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

/// Batch embedding client with a global in-flight cap.
pub struct EmbeddingClient {
    client: reqwest::Client,
    config: EmbeddingConfig,
    semaphore: Arc<Semaphore>,
}

impl EmbeddingClient {
    pub fn new(config: EmbeddingConfig) -> Result<Self, EmbedError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EmbedError::Client(e.to_string()))?;

        let permits = config.rate_limit.max(1);
        Ok(Self {
            client,
            config,
            semaphore: Arc::new(Semaphore::new(permits)),
        })
    }

    /// Expected vector dimension.
    pub fn dimension(&self) -> usize {
        self.config.dimension
    }

    /// Configured maximum inputs per request.
    pub fn max_batch_size(&self) -> usize {
        self.config.max_batch_size
    }

    /// Embed a batch of texts.
    ///
    /// Returns exactly `batch.len()` vectors in input order, or an error;
    /// never a short read. Transient failures are retried up to the
    /// configured limit before the whole call fails.
    pub async fn embed(&self, batch: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        if batch.is_empty() || batch.len() > self.config.max_batch_size {
            return Err(EmbedError::InvalidBatch {
                size: batch.len(),
                max: self.config.max_batch_size,
            });
        }

        let mut last_error: Option<EmbedError> = None;
        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let delay = backoff_delay(attempt, last_error.as_ref().and_then(|e| e.retry_after()));
                debug!(attempt, ?delay, "retrying embedding request");
                tokio::time::sleep(delay).await;
            }

            match self.send(batch).await {
                Ok(vectors) => return Ok(vectors),
                Err(err) if err.is_retryable() && attempt < self.config.max_retries => {
                    warn!(attempt, error = %err, "transient embedding failure");
                    last_error = Some(err);
                }
                Err(err) => return Err(err),
            }
        }

        Err(last_error
            .unwrap_or_else(|| EmbedError::Unavailable("request failed after retries".into())))
    }

    /// One minimal request to surface auth/connectivity problems before
    /// bulk work begins.
    pub async fn warmup(&self) -> Result<(), EmbedError> {
        let probe = vec!["warmup".to_string()];
        self.send(&probe).await.map(|_| ())
    }

    async fn send(&self, batch: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        // In-flight cap applies per attempt; waiting out a backoff does not
        // hold a permit.
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| EmbedError::Unavailable("semaphore closed".into()))?;

        let body = EmbeddingsRequest {
            input: batch.to_vec(),
            model: self.config.model.clone(),
        };

        let response = self
            .client
            .post(self.embeddings_url())
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    EmbedError::Unavailable("request timed out".into())
                } else if e.is_connect() {
                    EmbedError::Unavailable(format!("connection failed: {}", e))
                } else {
                    EmbedError::Unavailable(format!("request failed: {}", e))
                }
            })?;

        let status = response.status();
        match status {
            StatusCode::OK => {
                let parsed: EmbeddingsResponse = response
                    .json()
                    .await
                    .map_err(|e| EmbedError::MalformedResponse(e.to_string()))?;

                // The contract says vectors match input positions, but some
                // providers reorder; sort by index before pairing.
                let mut data = parsed.data;
                data.sort_by_key(|d| d.index);

                if data.len() != batch.len() {
                    return Err(EmbedError::CountMismatch {
                        expected: batch.len(),
                        actual: data.len(),
                    });
                }

                Ok(data.into_iter().map(|d| d.embedding).collect())
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                let body = response.text().await.unwrap_or_default();
                Err(EmbedError::Auth(body))
            }
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = response
                    .headers()
                    .get("Retry-After")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok());
                Err(EmbedError::RateLimited { retry_after })
            }
            s if s.is_server_error() => Err(EmbedError::Unavailable(format!(
                "server returned {}",
                s.as_u16()
            ))),
            s => {
                let body = response.text().await.unwrap_or_default();
                Err(EmbedError::Rejected {
                    status: s.as_u16(),
                    message: body,
                })
            }
        }
    }

    fn embeddings_url(&self) -> String {
        format!("{}/embeddings", self.config.base_url.trim_end_matches('/'))
    }
}

/// Exponential backoff with cap and ±20% jitter. A server-provided
/// retry-after wins when longer than the computed delay would be.
fn backoff_delay(attempt: u32, retry_after: Option<u64>) -> Duration {
    if let Some(secs) = retry_after {
        return Duration::from_secs(secs.min(BACKOFF_CAP_SECS as u64));
    }

    let base = (BACKOFF_BASE_SECS * BACKOFF_MULTIPLIER.powi(attempt.saturating_sub(1) as i32))
        .min(BACKOFF_CAP_SECS);
    let jittered = base * (1.0 - JITTER_RATIO + 2.0 * JITTER_RATIO * pseudo_random());
    Duration::from_secs_f64(jittered.min(BACKOFF_CAP_SECS))
}

/// Pseudo-random in [0, 1) mixed from the clock and a counter; used only
/// to de-synchronize retry timing.
fn pseudo_random() -> f64 {
    static COUNTER: AtomicU64 = AtomicU64::new(0);

    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64;
    let count = COUNTER.fetch_add(1, Ordering::Relaxed);

    let mut mixed = now.wrapping_mul(0x517cc1b727220a95).wrapping_add(count);
    mixed ^= mixed >> 33;
    mixed = mixed.wrapping_mul(0xc4ceb9fe1a85ec53);
    mixed ^= mixed >> 33;

    (mixed >> 11) as f64 / (1u64 << 53) as f64
}

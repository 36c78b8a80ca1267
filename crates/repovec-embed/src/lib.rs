//! Embedding client for the repovec pipeline.
//!
//! Wraps an OpenAI-compatible `/embeddings` endpoint with bounded
//! concurrency, retry with jittered backoff, and strict length checking:
//! the client never returns fewer vectors than inputs.

mod client;
mod error;

pub use client::{EmbeddingClient, EmbeddingConfig};
pub use error::EmbedError;

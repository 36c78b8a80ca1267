//! Pipeline error types.

use thiserror::Error;

/// Errors surfaced by the ingestion pipeline.
///
/// Only configuration errors abort a run; everything else degrades to a
/// recorded error on the statistics and the run continues.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Configuration problem; fatal at startup
    #[error(transparent)]
    Config(#[from] repovec_config::ConfigError),

    /// Parser failure that escaped per-file isolation
    #[error(transparent)]
    Parser(#[from] repovec_parsers::ParserError),

    /// Embedding client failure that escaped batch isolation (warmup)
    #[error(transparent)]
    Embed(#[from] repovec_embed::EmbedError),

    /// Vector store failure that escaped batch isolation (warmup, ensure)
    #[error(transparent)]
    Store(#[from] repovec_store::StoreError),

    /// Checkpoint file I/O
    #[error("checkpoint I/O error: {0}")]
    Checkpoint(#[from] std::io::Error),

    /// Checkpoint (de)serialization
    #[error("checkpoint serialization error: {0}")]
    CheckpointFormat(#[from] serde_json::Error),

    /// Repository directory walk failed outright
    #[error("cannot walk repository '{repo_id}': {message}")]
    Walk { repo_id: String, message: String },

    /// A worker task panicked or was aborted
    #[error("worker task failed: {0}")]
    Worker(String),
}

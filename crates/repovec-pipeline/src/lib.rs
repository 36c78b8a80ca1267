//! The repovec ingestion pipeline.
//!
//! Wires the file processor, batch processor, embedding client and vector
//! store into a resumable, cancellable run over a sequence of
//! repositories. Repositories process sequentially; embedding batches run
//! on a bounded worker pool; checkpoints always describe a true prefix of
//! persisted work.

mod batcher;
mod checkpoint;
mod error;
mod orchestrator;
mod stats;
mod walker;

pub use batcher::{BatchProcessor, BatchSettings, CheckpointPosition, FileChunks};
pub use checkpoint::{CheckpointRecord, CheckpointStore, CheckpointSummary};
pub use error::PipelineError;
pub use orchestrator::Pipeline;
pub use stats::{ErrorRecord, GroupStats, IngestStats};
pub use walker::{DiscoveredFiles, FileOutcome, FileProcessor, OversizedFile, RepoFile};

//! Batch processor: chunks → embedding batches → storage.
//!
//! Consumes parsed files from a bounded channel, forms batches of the
//! configured size and dispatches them to a worker pool. Within a batch,
//! chunk↔vector pairing is strictly positional; a batch whose embedding
//! call fails after retries contributes zero stored chunks and storage is
//! never called for it. Checkpoint barriers drain the pool so a saved
//! position always describes fully persisted work.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use repovec_config::CheckpointFrequency;
use repovec_embed::EmbeddingClient;
use repovec_parsers::Chunk;
use repovec_store::StorageManager;

use crate::stats::{ErrorRecord, GroupStats};

/// Chunks of one parsed file, in producer order.
#[derive(Debug)]
pub struct FileChunks {
    pub relative_path: String,
    pub chunks: Vec<Chunk>,
    /// Read/parse failure; the file still counts as visited
    pub error: Option<String>,
}

/// Settings for one (repository, language) group run.
#[derive(Debug, Clone)]
pub struct BatchSettings {
    pub batch_size: usize,
    /// Max batches in flight at once
    pub max_in_flight: usize,
    pub frequency: CheckpointFrequency,
    /// How long in-flight batches may run after a cancel
    pub grace: Duration,
    /// Counters carried over when resuming from a checkpoint
    pub initial_files: u64,
    pub initial_chunks: u64,
}

/// Fully persisted position reported at each checkpoint barrier.
#[derive(Debug, Clone)]
pub struct CheckpointPosition {
    pub last_file: String,
    pub files_processed: u64,
    pub chunks_processed: u64,
}

/// Result of one embedded-and-stored batch.
struct BatchOutcome {
    stored_by_collection: BTreeMap<String, u64>,
    chunks_stored: u64,
    errors: Vec<ErrorRecord>,
}

/// Drives embedding and storage for a stream of chunks.
pub struct BatchProcessor {
    embedder: Arc<EmbeddingClient>,
    storage: Arc<StorageManager>,
}

impl BatchProcessor {
    pub fn new(embedder: Arc<EmbeddingClient>, storage: Arc<StorageManager>) -> Self {
        Self { embedder, storage }
    }

    /// Consume the chunk stream until it closes or cancellation fires.
    ///
    /// `on_checkpoint` is invoked at barriers (every N files or every
    /// file for batch-checkpointed languages) after all in-flight batches
    /// have completed, so the reported position is a true prefix of
    /// persisted work.
    pub async fn stream_chunks_to_storage<F>(
        &self,
        mut rx: mpsc::Receiver<FileChunks>,
        settings: BatchSettings,
        cancel: CancellationToken,
        mut on_checkpoint: F,
    ) -> GroupStats
    where
        F: FnMut(CheckpointPosition) + Send,
    {
        let mut stats = GroupStats::default();
        let mut pending: Vec<Chunk> = Vec::new();
        let mut in_flight: JoinSet<BatchOutcome> = JoinSet::new();

        let mut files_processed = settings.initial_files;
        let mut chunks_processed = settings.initial_chunks;
        let mut files_since_barrier = 0u64;
        let mut last_file: Option<String> = None;

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    stats.cancelled = true;
                    break;
                }

                Some(result) = in_flight.join_next(), if !in_flight.is_empty() => {
                    absorb(result, &mut stats);
                }

                received = rx.recv() => {
                    let Some(file) = received else { break };

                    if let Some(error) = file.error {
                        stats.errors.push(ErrorRecord::new(file.relative_path.clone(), error));
                    } else {
                        chunks_processed += file.chunks.len() as u64;
                        stats.chunks_emitted += file.chunks.len() as u64;
                        for chunk in &file.chunks {
                            *stats
                                .chunks_by_domain
                                .entry(chunk.business_domain.clone())
                                .or_default() += 1;
                        }
                        pending.extend(file.chunks);
                    }

                    while pending.len() >= settings.batch_size {
                        let batch: Vec<Chunk> = pending.drain(..settings.batch_size).collect();
                        self.dispatch(batch, &mut in_flight, settings.max_in_flight, &mut stats)
                            .await;
                    }

                    files_processed += 1;
                    files_since_barrier += 1;
                    last_file = Some(file.relative_path);

                    let barrier = match settings.frequency {
                        CheckpointFrequency::Files(n) => files_since_barrier >= n as u64,
                        CheckpointFrequency::EveryBatch => true,
                    };
                    if barrier {
                        if !pending.is_empty() {
                            let batch: Vec<Chunk> = pending.drain(..).collect();
                            self.dispatch(batch, &mut in_flight, settings.max_in_flight, &mut stats)
                                .await;
                        }
                        drain(&mut in_flight, &mut stats).await;
                        if let Some(ref file) = last_file {
                            on_checkpoint(CheckpointPosition {
                                last_file: file.clone(),
                                files_processed,
                                chunks_processed,
                            });
                        }
                        files_since_barrier = 0;
                    }
                }
            }
        }

        if stats.cancelled {
            // No new batches after a cancel; pending chunks are abandoned
            // and in-flight work gets a bounded grace period.
            debug!(
                abandoned_chunks = pending.len(),
                "cancellation: draining in-flight batches"
            );
            drain_with_grace(&mut in_flight, &mut stats, settings.grace).await;
        } else {
            if !pending.is_empty() {
                let batch: Vec<Chunk> = pending.drain(..).collect();
                self.dispatch(batch, &mut in_flight, settings.max_in_flight, &mut stats)
                    .await;
            }
            drain(&mut in_flight, &mut stats).await;
            if let Some(ref file) = last_file {
                on_checkpoint(CheckpointPosition {
                    last_file: file.clone(),
                    files_processed,
                    chunks_processed,
                });
            }
        }

        stats.files_processed = files_processed - settings.initial_files;
        stats.last_processed_file = last_file;
        stats
    }

    /// Spawn a batch worker, first absorbing completions until a slot frees.
    async fn dispatch(
        &self,
        batch: Vec<Chunk>,
        in_flight: &mut JoinSet<BatchOutcome>,
        max_in_flight: usize,
        stats: &mut GroupStats,
    ) {
        while in_flight.len() >= max_in_flight.max(1) {
            if let Some(result) = in_flight.join_next().await {
                absorb(result, stats);
            }
        }

        let embedder = self.embedder.clone();
        let storage = self.storage.clone();
        in_flight.spawn(async move {
            let range = batch_range(&batch);
            let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();

            let vectors = match embedder.embed(&texts).await {
                Ok(vectors) => vectors,
                Err(err) => {
                    // Storage is never called for a failed batch; it
                    // contributes exactly zero stored chunks.
                    warn!(batch = %range, error = %err, "embedding failed, batch dropped");
                    return BatchOutcome {
                        stored_by_collection: BTreeMap::new(),
                        chunks_stored: 0,
                        errors: vec![ErrorRecord::new(range, format!("embedding failed: {}", err))],
                    };
                }
            };

            match storage.store_batch(&batch, vectors).await {
                Ok(outcome) => {
                    let mut errors = Vec::new();
                    for dropped in &outcome.dropped {
                        errors.push(ErrorRecord::new(
                            dropped.file_path.clone(),
                            format!("point dropped: {}", dropped.reason),
                        ));
                    }
                    for failure in &outcome.failures {
                        errors.push(ErrorRecord::new(
                            range.clone(),
                            format!(
                                "upsert to '{}' failed for {} points: {}",
                                failure.collection, failure.points, failure.error
                            ),
                        ));
                    }
                    BatchOutcome {
                        chunks_stored: outcome.total_stored(),
                        stored_by_collection: outcome.stored,
                        errors,
                    }
                }
                Err(err) => BatchOutcome {
                    stored_by_collection: BTreeMap::new(),
                    chunks_stored: 0,
                    errors: vec![ErrorRecord::new(range, format!("storage refused batch: {}", err))],
                },
            }
        });
    }
}

fn absorb(result: Result<BatchOutcome, tokio::task::JoinError>, stats: &mut GroupStats) {
    match result {
        Ok(outcome) => {
            stats.chunks_stored += outcome.chunks_stored;
            for (collection, count) in outcome.stored_by_collection {
                *stats.stored_by_collection.entry(collection).or_default() += count;
            }
            stats.errors.extend(outcome.errors);
        }
        Err(err) if err.is_cancelled() => {
            stats
                .errors
                .push(ErrorRecord::new("batch", "abandoned on cancellation"));
        }
        Err(err) => {
            stats
                .errors
                .push(ErrorRecord::new("batch", format!("worker panicked: {}", err)));
        }
    }
}

async fn drain(in_flight: &mut JoinSet<BatchOutcome>, stats: &mut GroupStats) {
    while let Some(result) = in_flight.join_next().await {
        absorb(result, stats);
    }
}

/// Drain with a deadline; whatever is still running afterwards is aborted.
async fn drain_with_grace(
    in_flight: &mut JoinSet<BatchOutcome>,
    stats: &mut GroupStats,
    grace: Duration,
) {
    let deadline = tokio::time::Instant::now() + grace;
    loop {
        if in_flight.is_empty() {
            return;
        }
        match tokio::time::timeout_at(deadline, in_flight.join_next()).await {
            Ok(Some(result)) => absorb(result, stats),
            Ok(None) => return,
            Err(_) => {
                warn!(remaining = in_flight.len(), "grace period over, aborting batches");
                in_flight.abort_all();
                while let Some(result) = in_flight.join_next().await {
                    absorb(result, stats);
                }
                return;
            }
        }
    }
}

/// Human-readable span of a batch for error records.
fn batch_range(batch: &[Chunk]) -> String {
    match (batch.first(), batch.last()) {
        (Some(first), Some(last)) if first.file_path != last.file_path => {
            format!("{}..{}", first.file_path, last.file_path)
        }
        (Some(first), _) => first.file_path.clone(),
        _ => "batch".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use repovec_parsers::Language;

    fn chunk(path: &str, name: &str) -> Chunk {
        Chunk::new(
            Language::Rust,
            "function",
            name,
            format!("fn {}() {{}}", name),
            path,
            1,
            1,
            "repo",
        )
    }

    #[test]
    fn batch_range_spans_files() {
        let batch = vec![chunk("a.rs", "f"), chunk("b.rs", "g")];
        assert_eq!(batch_range(&batch), "a.rs..b.rs");

        let single = vec![chunk("a.rs", "f"), chunk("a.rs", "g")];
        assert_eq!(batch_range(&single), "a.rs");

        assert_eq!(batch_range(&[]), "batch");
    }
}

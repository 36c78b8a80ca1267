//! Pipeline orchestrator.
//!
//! The only component that sees repositories as a sequence. Drives the
//! file processor and batch processor per repository, owns the checkpoint
//! file, aggregates statistics, and degrades gracefully: a failing
//! repository or file is recorded and the run moves on.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use repovec_config::{IngestConfig, Repository};
use repovec_embed::{EmbeddingClient, EmbeddingConfig};
use repovec_parsers::{Language, ParserRegistry};
use repovec_store::{CollectionRouter, Distance, StorageManager, VectorBackend};

use crate::batcher::{BatchProcessor, BatchSettings, FileChunks};
use crate::checkpoint::{CheckpointRecord, CheckpointStore};
use crate::error::PipelineError;
use crate::stats::IngestStats;
use crate::walker::FileProcessor;

/// Capacity of the producer→batcher channel; doubles as backpressure on
/// the parsing side.
const CHUNK_CHANNEL_CAPACITY: usize = 8;

/// Per-repository lifecycle, logged at each transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RepoState {
    Running,
    Completed,
    Failed,
}

/// The ingestion pipeline.
pub struct Pipeline {
    config: Arc<IngestConfig>,
    processor: FileProcessor,
    batcher: BatchProcessor,
    embedder: Arc<EmbeddingClient>,
    backend: Arc<dyn VectorBackend>,
    checkpoint: CheckpointStore,
    cancel: CancellationToken,
}

impl Pipeline {
    /// Cheap construction; no network until [`Pipeline::warmup`].
    pub fn new(
        config: Arc<IngestConfig>,
        backend: Arc<dyn VectorBackend>,
    ) -> Result<Self, PipelineError> {
        config.validate(&Language::all_tags())?;

        let registry = Arc::new(ParserRegistry::with_default_parsers());
        let embedder = Arc::new(EmbeddingClient::new(EmbeddingConfig {
            base_url: config.embedding.base_url.clone(),
            api_key: config.embedding.api_key.clone(),
            model: config.embedding.model.clone(),
            dimension: config.embedding.dimension,
            max_batch_size: config.batch_size,
            rate_limit: config.rate_limit,
            timeout_secs: config.request_timeout_secs,
            max_retries: config.max_retries,
        })?);

        let mut by_language = std::collections::BTreeMap::new();
        for tag in config.collections.languages() {
            if let Some(collection) = config.collections.for_language(tag) {
                by_language.insert(tag.to_string(), collection.to_string());
            }
        }
        let router = CollectionRouter::new(
            by_language,
            config.collections.default_collection(),
            config.collections.mixed().map(str::to_string),
        );
        let storage = Arc::new(StorageManager::new(
            backend.clone(),
            router,
            config.embedding.dimension,
        ));

        Ok(Self {
            processor: FileProcessor::new(config.clone(), registry),
            batcher: BatchProcessor::new(embedder.clone(), storage),
            embedder,
            backend,
            checkpoint: CheckpointStore::new(config.checkpoint_path.clone()),
            config,
            cancel: CancellationToken::new(),
        })
    }

    /// Token to wire into signal handling; cancelling it stops new batches
    /// and leaves a durable checkpoint.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Checkpoint store view, for status reporting.
    pub fn checkpoint(&self) -> &CheckpointStore {
        &self.checkpoint
    }

    /// First network contact: embedding endpoint probe, backend probe, and
    /// idempotent creation of every collection the run may write.
    pub async fn warmup(&self) -> Result<(), PipelineError> {
        self.embedder.warmup().await?;
        self.backend.warmup().await?;
        for name in self.config.collections.ingest_collections() {
            self.backend
                .ensure_collection(&name, self.config.embedding.dimension, Distance::Cosine)
                .await?;
        }
        info!("warmup complete");
        Ok(())
    }

    /// Ingest the repositories in the given order.
    ///
    /// With `resume`, previously completed repositories are skipped and the
    /// active (repo, language) group continues past its last checkpointed
    /// file. The checkpoint is cleared only on clean completion of all
    /// repositories.
    pub async fn ingest(
        &self,
        repositories: &[Repository],
        resume: bool,
    ) -> Result<IngestStats, PipelineError> {
        self.warmup().await?;

        let mut completed: Vec<String> = Vec::new();
        let mut resume_point: Option<CheckpointRecord> = None;
        if resume {
            if let Some(record) = self.checkpoint.load()? {
                info!(
                    repo = %record.repo_id,
                    language = %record.language,
                    files = record.files_processed,
                    "resuming from checkpoint"
                );
                completed = record.completed_repos.clone();
                resume_point = Some(record);
            }
        }

        let mut stats = IngestStats::default();

        for repo in repositories {
            if self.cancel.is_cancelled() {
                stats.cancelled = true;
                break;
            }
            if completed.iter().any(|id| id == &repo.id) {
                debug!(repo = %repo.id, "already completed, skipping");
                continue;
            }

            info!(repo = %repo.id, state = ?RepoState::Running, "repository started");

            if !repo.path.is_dir() {
                warn!(repo = %repo.id, path = %repo.path.display(), "repository not found on disk");
                stats.record_error(&repo.id, "repository not found on disk");
                continue;
            }

            let repo_resume = resume_point
                .take_if(|r| r.repo_id == repo.id)
                .filter(|r| !r.last_processed_file.is_empty());

            match self
                .process_repository(repo, repo_resume, &completed, &mut stats)
                .await
            {
                Ok(()) if stats.cancelled => {
                    info!(repo = %repo.id, "cancelled mid-repository");
                    break;
                }
                Ok(()) => {
                    completed.push(repo.id.clone());
                    // The transition to COMPLETED is atomic with the
                    // checkpoint update that marks the repo done.
                    let mut record = CheckpointRecord::new(&repo.id, "");
                    record.completed_repos = completed.clone();
                    if let Err(err) = self.checkpoint.save(&record) {
                        warn!(%err, "checkpoint write failed, continuing");
                    }
                    stats.repos_processed += 1;
                    info!(repo = %repo.id, state = ?RepoState::Completed, "repository finished");
                }
                Err(err) => {
                    stats.repos_failed += 1;
                    stats.record_error(&repo.id, err.to_string());
                    warn!(repo = %repo.id, state = ?RepoState::Failed, %err, "repository failed");
                }
            }
        }

        if !stats.cancelled {
            if let Err(err) = self.checkpoint.clear() {
                warn!(%err, "could not clear checkpoint after clean completion");
            }
        }

        Ok(stats)
    }

    async fn process_repository(
        &self,
        repo: &Repository,
        resume_point: Option<CheckpointRecord>,
        completed: &[String],
        stats: &mut IngestStats,
    ) -> Result<(), PipelineError> {
        let discovered = self.processor.discover(repo)?;

        for oversized in &discovered.oversized {
            stats.files_skipped += 1;
            stats.record_error(
                &oversized.relative_path,
                format!(
                    "file size {} exceeds limit {}",
                    oversized.size, self.config.max_file_size
                ),
            );
        }

        for (language, mut files) in discovered.groups {
            if self.cancel.is_cancelled() {
                stats.cancelled = true;
                return Ok(());
            }

            let tag = language.as_str();
            let mut initial_files = 0;
            let mut initial_chunks = 0;

            if let Some(ref record) = resume_point {
                if record.language == tag {
                    let last = record.last_processed_file.clone();
                    files.retain(|f| f.relative_path > last);
                    initial_files = record.files_processed;
                    initial_chunks = record.chunks_processed;
                    info!(
                        repo = %repo.id,
                        language = tag,
                        skipped_files = initial_files,
                        "resuming language group"
                    );
                }
            }
            if files.is_empty() {
                continue;
            }

            let (tx, rx) = mpsc::channel::<FileChunks>(CHUNK_CHANNEL_CAPACITY);

            // Producer: single-threaded walk + parse on a blocking thread.
            let producer = {
                let processor = self.processor.clone();
                let repo = repo.clone();
                let cancel = self.cancel.clone();
                tokio::task::spawn_blocking(move || {
                    for file in files {
                        if cancel.is_cancelled() {
                            break;
                        }
                        let outcome = processor.process_file(&repo, &file);
                        let message = FileChunks {
                            relative_path: outcome.relative_path,
                            chunks: outcome.chunks,
                            error: outcome.error,
                        };
                        if tx.blocking_send(message).is_err() {
                            break;
                        }
                    }
                })
            };

            let settings = BatchSettings {
                batch_size: self.config.batch_size,
                max_in_flight: self.config.rate_limit,
                frequency: self.config.frequency_for(tag),
                grace: Duration::from_secs(self.config.request_timeout_secs),
                initial_files,
                initial_chunks,
            };

            let checkpoint = &self.checkpoint;
            let completed_snapshot = completed.to_vec();
            let repo_id = repo.id.clone();
            let group_stats = self
                .batcher
                .stream_chunks_to_storage(rx, settings, self.cancel.clone(), move |position| {
                    let mut record = CheckpointRecord::new(&repo_id, tag);
                    record.last_processed_file = position.last_file;
                    record.files_processed = position.files_processed;
                    record.chunks_processed = position.chunks_processed;
                    record.completed_repos = completed_snapshot.clone();
                    record.touch();
                    if let Err(err) = checkpoint.save(&record) {
                        warn!(%err, "checkpoint write failed, continuing");
                    }
                })
                .await;

            if let Err(err) = producer.await {
                warn!(repo = %repo.id, language = tag, %err, "producer task failed");
                stats.record_error(&repo.id, format!("producer failed: {}", err));
            }

            stats.merge_group(tag, &group_stats);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use repovec_config::{CollectionsConfigFile, QdrantSettings};
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    fn test_config(dir: &std::path::Path) -> Arc<IngestConfig> {
        Arc::new(IngestConfig {
            repos_base_dir: dir.to_path_buf(),
            backend: repovec_config::BackendKind::Managed,
            qdrant: Some(QdrantSettings {
                url: "http://localhost:6334".into(),
                api_key: None,
            }),
            surreal: None,
            embedding: repovec_config::EmbeddingSettings {
                base_url: "http://localhost:9".into(),
                api_key: "k".into(),
                model: "m".into(),
                dimension: 4,
            },
            batch_size: 2,
            rate_limit: 2,
            request_timeout_secs: 5,
            max_retries: 0,
            max_file_size: 500_000,
            skip_dirs: IngestConfig::default_skip_dirs(),
            collections: CollectionsConfigFile::default().resolve().unwrap(),
            domains: repovec_config::DomainRules::default(),
            checkpoint_path: dir.join("ingestion_checkpoint.json"),
            checkpoint_frequency: BTreeMap::new(),
        })
    }

    #[test]
    fn construction_validates_config() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = (*test_config(dir.path())).clone();
        config.batch_size = 0;

        let backend = Arc::new(repovec_store::memory::InMemoryBackend::new());
        let result = Pipeline::new(Arc::new(config), backend);
        assert!(matches!(result, Err(PipelineError::Config(_))));
    }

    #[test]
    fn construction_succeeds_with_valid_config() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(repovec_store::memory::InMemoryBackend::new());
        let pipeline = Pipeline::new(test_config(dir.path()), backend).unwrap();
        assert_eq!(
            pipeline.checkpoint().path(),
            PathBuf::from(dir.path().join("ingestion_checkpoint.json"))
        );
    }
}

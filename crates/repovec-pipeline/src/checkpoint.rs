//! Durable ingestion checkpoint.
//!
//! One JSON file records the last fully persisted (repo, language, file)
//! position plus the set of completed repositories. Saves are atomic
//! (write to a temp file in the same directory, fsync, rename) and totally
//! ordered: the pipeline is the single writer.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::PipelineError;

/// The persisted checkpoint state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CheckpointRecord {
    /// Repository currently being ingested
    pub repo_id: String,
    /// Active language group within that repository
    pub language: String,
    /// Relative path of the last fully persisted file
    pub last_processed_file: String,
    pub files_processed: u64,
    pub chunks_processed: u64,
    /// Unix epoch seconds of the write
    pub timestamp: u64,
    /// Repositories already completed in this run sequence
    #[serde(default)]
    pub completed_repos: Vec<String>,
}

impl CheckpointRecord {
    pub fn new(repo_id: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            repo_id: repo_id.into(),
            language: language.into(),
            last_processed_file: String::new(),
            files_processed: 0,
            chunks_processed: 0,
            timestamp: unix_now(),
            completed_repos: Vec::new(),
        }
    }

    /// Refresh the timestamp before a save.
    pub fn touch(&mut self) {
        self.timestamp = unix_now();
    }
}

/// Lightweight view for status reporting.
#[derive(Debug, Clone, Serialize)]
pub struct CheckpointSummary {
    pub repo_id: String,
    pub language: String,
    pub files_processed: u64,
    pub chunks_processed: u64,
    pub completed_repos: usize,
    pub timestamp: u64,
}

/// Owns the checkpoint file. At most one writer exists at a time; the
/// orchestrator serializes saves.
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Last persisted state, or `None` when no checkpoint exists.
    ///
    /// A malformed file is treated as absent (with a warning) rather than
    /// aborting the run; resume then starts from scratch, which is safe
    /// because upserts are idempotent.
    pub fn load(&self) -> Result<Option<CheckpointRecord>, PipelineError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(&self.path)?;
        match serde_json::from_str(&text) {
            Ok(record) => Ok(Some(record)),
            Err(err) => {
                warn!(path = %self.path.display(), %err, "ignoring malformed checkpoint");
                Ok(None)
            }
        }
    }

    /// Atomic save: temp file in the same directory, flush, fsync, rename.
    pub fn save(&self, record: &CheckpointRecord) -> Result<(), PipelineError> {
        let tmp = self.path.with_extension("json.tmp");
        {
            let mut file = File::create(&tmp)?;
            file.write_all(serde_json::to_string_pretty(record)?.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        debug!(
            repo = %record.repo_id,
            language = %record.language,
            files = record.files_processed,
            "checkpoint saved"
        );
        Ok(())
    }

    /// Remove the checkpoint file; missing is fine.
    pub fn clear(&self) -> Result<(), PipelineError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Cheap counts for reporting; `None` when no checkpoint exists.
    pub fn get_info(&self) -> Option<CheckpointSummary> {
        self.load().ok().flatten().map(|record| CheckpointSummary {
            repo_id: record.repo_id,
            language: record.language,
            files_processed: record.files_processed,
            chunks_processed: record.chunks_processed,
            completed_repos: record.completed_repos.len(),
            timestamp: record.timestamp,
        })
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn store() -> (tempfile::TempDir, CheckpointStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path().join("ingestion_checkpoint.json"));
        (dir, store)
    }

    #[test]
    fn load_without_file_is_none() {
        let (_dir, store) = store();
        assert!(store.load().unwrap().is_none());
        assert!(store.get_info().is_none());
    }

    #[test]
    fn save_and_load_round_trip() {
        let (_dir, store) = store();
        let mut record = CheckpointRecord::new("repo-a", "rust");
        record.last_processed_file = "src/lib.rs".into();
        record.files_processed = 10;
        record.chunks_processed = 42;
        record.completed_repos.push("repo-z".into());

        store.save(&record).unwrap();
        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded, record);

        let info = store.get_info().unwrap();
        assert_eq!(info.files_processed, 10);
        assert_eq!(info.completed_repos, 1);
    }

    #[test]
    fn save_replaces_previous_state() {
        let (_dir, store) = store();
        let mut record = CheckpointRecord::new("repo-a", "rust");
        store.save(&record).unwrap();

        record.files_processed = 7;
        store.save(&record).unwrap();

        assert_eq!(store.load().unwrap().unwrap().files_processed, 7);
    }

    #[test]
    fn clear_removes_the_file_and_is_idempotent() {
        let (_dir, store) = store();
        store.save(&CheckpointRecord::new("repo-a", "rust")).unwrap();
        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
        store.clear().unwrap();
    }

    #[test]
    fn malformed_checkpoint_is_ignored() {
        let (_dir, store) = store();
        fs::write(store.path(), "{ not json").unwrap();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn no_temp_file_left_behind() {
        let (dir, store) = store();
        store.save(&CheckpointRecord::new("repo-a", "rust")).unwrap();
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|x| x == "tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }
}

//! Run statistics.
//!
//! Aggregated single-threaded by the orchestrator from worker completions.
//! Errors keep their occurrence order; nothing here is a control-flow
//! mechanism, it is the user-visible summary at the end of a run.

use std::collections::BTreeMap;

use serde::Serialize;

/// One recorded failure: where and why.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ErrorRecord {
    /// File path, batch range or repository id
    pub path: String,
    pub cause: String,
}

impl ErrorRecord {
    pub fn new(path: impl Into<String>, cause: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            cause: cause.into(),
        }
    }
}

/// Per-run ingestion statistics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestStats {
    pub repos_processed: u64,
    pub repos_failed: u64,
    /// Files successfully parsed, per language tag
    pub files_by_language: BTreeMap<String, u64>,
    /// Files excluded by the size gate or read errors
    pub files_skipped: u64,
    /// Points stored, per collection
    pub chunks_by_collection: BTreeMap<String, u64>,
    /// Chunks emitted, per business domain
    pub chunks_by_domain: BTreeMap<String, u64>,
    /// Total points durably stored
    pub chunks_stored: u64,
    /// Whether the run ended on cancellation
    pub cancelled: bool,
    /// Ordered error descriptors
    pub errors: Vec<ErrorRecord>,
}

impl IngestStats {
    pub fn record_error(&mut self, path: impl Into<String>, cause: impl Into<String>) {
        self.errors.push(ErrorRecord::new(path, cause));
    }

    pub fn add_files(&mut self, language: &str, count: u64) {
        *self
            .files_by_language
            .entry(language.to_string())
            .or_default() += count;
    }

    pub fn add_stored(&mut self, collection: &str, count: u64) {
        *self
            .chunks_by_collection
            .entry(collection.to_string())
            .or_default() += count;
        self.chunks_stored += count;
    }

    pub fn add_domain(&mut self, domain: &str, count: u64) {
        *self
            .chunks_by_domain
            .entry(domain.to_string())
            .or_default() += count;
    }

    /// Fold in the stats of one (repo, language) group run.
    pub fn merge_group(&mut self, language: &str, group: &GroupStats) {
        self.add_files(language, group.files_processed);
        for (collection, count) in &group.stored_by_collection {
            self.add_stored(collection, *count);
        }
        for (domain, count) in &group.chunks_by_domain {
            self.add_domain(domain, *count);
        }
        self.errors.extend(group.errors.iter().cloned());
        if group.cancelled {
            self.cancelled = true;
        }
    }
}

/// Stats from processing one (repository, language) group.
#[derive(Debug, Clone, Default)]
pub struct GroupStats {
    pub files_processed: u64,
    pub chunks_emitted: u64,
    pub chunks_stored: u64,
    pub stored_by_collection: BTreeMap<String, u64>,
    pub chunks_by_domain: BTreeMap<String, u64>,
    pub errors: Vec<ErrorRecord>,
    pub last_processed_file: Option<String>,
    pub cancelled: bool,
}

//! File processor: walk a repository tree, filter, dispatch to parsers.
//!
//! Produces a deterministic ordering: language groups first in the order
//! the repository declares its languages, then remaining supported
//! languages in canonical order; files sorted by relative path within a
//! group; chunks in source order within a file. Checkpoints rely on this
//! ordering being stable across runs.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};
use walkdir::WalkDir;

use repovec_config::{IngestConfig, Repository};
use repovec_parsers::{Chunk, Language, ParserRegistry};

use crate::error::PipelineError;

/// One candidate file found during the walk.
#[derive(Debug, Clone)]
pub struct RepoFile {
    pub path: std::path::PathBuf,
    /// Relative to the repo root, `/`-separated on every platform
    pub relative_path: String,
    pub language: Language,
    pub size: u64,
}

/// A file skipped by the size gate.
#[derive(Debug, Clone)]
pub struct OversizedFile {
    pub relative_path: String,
    pub size: u64,
}

/// The walk result: ordered language groups plus skipped files.
#[derive(Debug, Default)]
pub struct DiscoveredFiles {
    /// `(language, files sorted by relative path)` in emission order
    pub groups: Vec<(Language, Vec<RepoFile>)>,
    pub oversized: Vec<OversizedFile>,
}

impl DiscoveredFiles {
    pub fn total_files(&self) -> usize {
        self.groups.iter().map(|(_, files)| files.len()).sum()
    }
}

/// Outcome of parsing one file, with repo metadata attached.
#[derive(Debug)]
pub struct FileOutcome {
    pub relative_path: String,
    pub chunks: Vec<Chunk>,
    pub total_lines: usize,
    /// Parse or read failure; the file still counts as visited
    pub error: Option<String>,
}

/// Walks repositories and dispatches files to parsers.
#[derive(Clone)]
pub struct FileProcessor {
    config: Arc<IngestConfig>,
    registry: Arc<ParserRegistry>,
}

impl FileProcessor {
    pub fn new(config: Arc<IngestConfig>, registry: Arc<ParserRegistry>) -> Self {
        Self { config, registry }
    }

    /// Walk the repository tree and group candidate files by language.
    ///
    /// Skip directories are excluded by name at any depth. Files over the
    /// size budget are reported, not read.
    pub fn discover(&self, repo: &Repository) -> Result<DiscoveredFiles, PipelineError> {
        if !repo.path.is_dir() {
            return Err(PipelineError::Walk {
                repo_id: repo.id.clone(),
                message: format!("directory '{}' does not exist", repo.path.display()),
            });
        }

        let mut discovered = DiscoveredFiles::default();
        let mut by_language: std::collections::BTreeMap<Language, Vec<RepoFile>> =
            std::collections::BTreeMap::new();

        let skip_dirs = &self.config.skip_dirs;
        let walker = WalkDir::new(&repo.path).into_iter().filter_entry(|entry| {
            if !entry.file_type().is_dir() || entry.depth() == 0 {
                return true;
            }
            let name = entry.file_name().to_string_lossy();
            !skip_dirs.contains(name.as_ref())
        });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(repo = %repo.id, %err, "walk error, skipping entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(language) = Language::from_path(entry.path()) else {
                continue;
            };
            let relative_path = relative_to(entry.path(), &repo.path);

            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            if size > self.config.max_file_size {
                warn!(
                    repo = %repo.id,
                    file = %relative_path,
                    size,
                    limit = self.config.max_file_size,
                    "file exceeds size budget, skipping"
                );
                discovered.oversized.push(OversizedFile {
                    relative_path,
                    size,
                });
                continue;
            }

            by_language.entry(language).or_default().push(RepoFile {
                path: entry.path().to_path_buf(),
                relative_path,
                language,
                size,
            });
        }

        for files in by_language.values_mut() {
            files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        }

        for language in group_order(repo) {
            if let Some(files) = by_language.remove(&language) {
                discovered.groups.push((language, files));
            }
        }

        debug!(
            repo = %repo.id,
            files = discovered.total_files(),
            oversized = discovered.oversized.len(),
            "repository walk complete"
        );
        Ok(discovered)
    }

    /// Read, parse and enrich one file.
    ///
    /// Read and parse failures are reported in the outcome; they never
    /// propagate as errors.
    pub fn process_file(&self, repo: &Repository, file: &RepoFile) -> FileOutcome {
        let bytes = match std::fs::read(&file.path) {
            Ok(bytes) => bytes,
            Err(err) => {
                return FileOutcome {
                    relative_path: file.relative_path.clone(),
                    chunks: Vec::new(),
                    total_lines: 0,
                    error: Some(format!("read failed: {}", err)),
                }
            }
        };

        let Some(parser) = self.registry.get(file.language) else {
            return FileOutcome {
                relative_path: file.relative_path.clone(),
                chunks: Vec::new(),
                total_lines: 0,
                error: Some(format!("no parser registered for {}", file.language)),
            };
        };

        let result = parser.parse(&file.path, &file.relative_path, &bytes, &repo.id);
        if !result.success {
            return FileOutcome {
                relative_path: file.relative_path.clone(),
                chunks: Vec::new(),
                total_lines: result.total_lines,
                error: result.error.or_else(|| Some("parse failed".to_string())),
            };
        }

        let component = component_of(&file.relative_path);
        let chunks = result
            .chunks
            .into_iter()
            .map(|mut chunk| {
                chunk.repo_component = component.clone();
                chunk.business_domain = self
                    .config
                    .domains
                    .classify(&chunk.file_path, &chunk.content);
                chunk
            })
            .collect();

        FileOutcome {
            relative_path: file.relative_path.clone(),
            chunks,
            total_lines: result.total_lines,
            error: None,
        }
    }
}

/// Language emission order for one repository: declared languages first,
/// then the remaining supported ones in canonical order.
fn group_order(repo: &Repository) -> Vec<Language> {
    let mut order: Vec<Language> = repo
        .languages
        .iter()
        .filter_map(|tag| Language::from_tag(tag))
        .collect();
    for language in Language::ALL {
        if !order.contains(&language) {
            order.push(language);
        }
    }
    order
}

/// `/`-separated path relative to the repo root.
fn relative_to(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// First path segment, or empty for files at the repo root.
fn component_of(relative_path: &str) -> String {
    match relative_path.split_once('/') {
        Some((first, _)) => first.to_string(),
        None => String::new(),
    }
}

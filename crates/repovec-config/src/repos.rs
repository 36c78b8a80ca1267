//! Repository descriptor config file.
//!
//! The pipeline consumes repositories that already exist on disk under
//! `repos_base_dir`; cloning them there is someone else's job. Only
//! `github_url` is required per entry, everything else has a default.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level shape of the repositories YAML file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RepositoryConfigFile {
    /// Base directory that contains one subdirectory per repository id
    pub repos_base_dir: PathBuf,

    /// Declared repositories
    pub repositories: Vec<RepositoryEntry>,
}

/// One repository entry as written in YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryEntry {
    /// Stable identifier; defaults to the trailing segment of `github_url`
    pub id: Option<String>,

    /// Remote origin. The only strictly required field.
    pub github_url: String,

    /// Coarse repository category
    pub repo_type: RepoType,

    /// Language tags this repository is expected to contain
    pub languages: Vec<String>,

    /// Subdirectories of interest; empty means the whole tree
    pub components: Vec<String>,

    /// Processing priority class
    pub priority: Priority,

    /// Ids of repositories this one depends on
    pub service_dependencies: Vec<String>,

    pub has_helm: bool,
    pub helm_path: Option<String>,
    pub exposes_apis: bool,
    pub api_base_path: Option<String>,
}

impl Default for RepositoryEntry {
    fn default() -> Self {
        Self {
            id: None,
            github_url: String::new(),
            repo_type: RepoType::default(),
            languages: Vec::new(),
            components: Vec::new(),
            priority: Priority::default(),
            service_dependencies: Vec::new(),
            has_helm: false,
            helm_path: None,
            exposes_apis: false,
            api_base_path: None,
        }
    }
}

/// Repository category.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RepoType {
    Frontend,
    #[default]
    Backend,
    Middleware,
    Infrastructure,
    Tool,
    Documentation,
}

/// Processing priority; repositories are ingested high-first.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

/// A fully resolved repository descriptor, immutable for the run.
#[derive(Debug, Clone)]
pub struct Repository {
    /// Stable string identity
    pub id: String,
    /// On-disk location (`repos_base_dir/id`)
    pub path: PathBuf,
    pub repo_type: RepoType,
    /// Declared language tags, in declaration order
    pub languages: Vec<String>,
    pub components: Vec<String>,
    pub priority: Priority,
    pub service_dependencies: Vec<String>,
}

impl RepositoryConfigFile {
    /// Load from a YAML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        serde_yaml::from_str(&text).map_err(|source| ConfigError::Yaml {
            path: path.display().to_string(),
            source,
        })
    }

    /// Resolve entries into repository descriptors.
    ///
    /// Entries without a `github_url` are rejected; ids default to the
    /// trailing path segment of the url. Descriptors come back sorted by
    /// priority (high first), preserving file order within a class.
    pub fn resolve(&self) -> Result<Vec<Repository>, ConfigError> {
        let mut repos = Vec::with_capacity(self.repositories.len());

        for entry in &self.repositories {
            if entry.github_url.is_empty() {
                return Err(ConfigError::validation(
                    "repository entry missing github_url",
                ));
            }

            let id = match &entry.id {
                Some(id) if !id.is_empty() => id.clone(),
                _ => id_from_url(&entry.github_url).ok_or_else(|| {
                    ConfigError::validation(format!(
                        "cannot derive repository id from url '{}'",
                        entry.github_url
                    ))
                })?,
            };

            repos.push(Repository {
                path: self.repos_base_dir.join(&id),
                id,
                repo_type: entry.repo_type,
                languages: entry.languages.clone(),
                components: entry.components.clone(),
                priority: entry.priority,
                service_dependencies: entry.service_dependencies.clone(),
            });
        }

        repos.sort_by_key(|r| r.priority);
        Ok(repos)
    }
}

/// Derive a repository id from its remote url: the last non-empty path
/// segment with a trailing `.git` stripped.
fn id_from_url(url: &str) -> Option<String> {
    let tail = url
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())?;
    let tail = tail.strip_suffix(".git").unwrap_or(tail);
    if tail.is_empty() {
        None
    } else {
        Some(tail.to_string())
    }
}

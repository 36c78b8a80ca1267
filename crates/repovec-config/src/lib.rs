//! repovec configuration.
//!
//! Resolves environment variables and the two YAML config files (repository
//! descriptors, collection naming) into a single immutable [`IngestConfig`]
//! handed to every component at construction time. Validation happens once,
//! up front; a missing credential names the exact environment variable.

mod collections;
mod domains;
mod error;
mod repos;

pub use collections::{CollectionMap, CollectionsConfigFile, MIXED_KEY};
pub use domains::{DomainRule, DomainRules, UNKNOWN_DOMAIN};
pub use error::ConfigError;
pub use repos::{Priority, RepoType, Repository, RepositoryConfigFile, RepositoryEntry};

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Env var selecting the vector backend.
pub const VECTOR_BACKEND_VAR: &str = "VECTOR_BACKEND";
/// Env var overriding the repositories config file path.
pub const REPOS_CONFIG_VAR: &str = "REPOVEC_REPOS_CONFIG";
/// Env var overriding the collections config file path.
pub const COLLECTIONS_CONFIG_VAR: &str = "REPOVEC_COLLECTIONS_CONFIG";

/// Which vector store implementation to use.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Managed remote store (Qdrant)
    #[default]
    Managed,
    /// Local self-hosted store (SurrealDB)
    Local,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Managed => write!(f, "managed"),
            Self::Local => write!(f, "local"),
        }
    }
}

impl std::str::FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "managed" => Ok(Self::Managed),
            "local" => Ok(Self::Local),
            _ => Err(ConfigError::validation(format!(
                "unknown vector backend '{}'. Valid values: managed, local",
                s
            ))),
        }
    }
}

/// Connection settings for the managed Qdrant backend.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct QdrantSettings {
    pub url: String,
    pub api_key: Option<String>,
}

impl QdrantSettings {
    /// Read `QDRANT_URL` / `QDRANT_API_KEY`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            url: require_env("QDRANT_URL")?,
            api_key: std::env::var("QDRANT_API_KEY").ok(),
        })
    }
}

/// Connection settings for the local SurrealDB backend.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SurrealSettings {
    pub url: String,
    pub namespace: String,
    pub database: String,
    pub username: String,
    pub password: String,
}

impl SurrealSettings {
    /// Read the `SURREALDB_*` variables; all five are required.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            url: require_env("SURREALDB_URL")?,
            namespace: require_env("SURREALDB_NS")?,
            database: require_env("SURREALDB_DB")?,
            username: require_env("SURREALDB_USER")?,
            password: require_env("SURREALDB_PASS")?,
        })
    }
}

/// Embedding service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingSettings {
    /// Base URL of an OpenAI-compatible embeddings endpoint
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    /// Vector dimension the model produces
    pub dimension: usize,
}

impl EmbeddingSettings {
    pub const DEFAULT_DIMENSION: usize = 4096;

    /// Read the `EMBEDDING_*` variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let dimension = match std::env::var("EMBEDDING_DIMENSION") {
            Ok(raw) => raw.parse::<usize>().map_err(|_| {
                ConfigError::validation(format!("EMBEDDING_DIMENSION is not a number: '{}'", raw))
            })?,
            Err(_) => Self::DEFAULT_DIMENSION,
        };

        Ok(Self {
            base_url: require_env("EMBEDDING_API_URL")?,
            api_key: require_env("EMBEDDING_API_KEY")?,
            model: require_env("EMBEDDING_MODEL")?,
            dimension,
        })
    }
}

/// How often a language checkpoints during ingestion.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointFrequency {
    /// Checkpoint after every N fully processed files
    Files(u32),
    /// Checkpoint after every batch completes
    EveryBatch,
}

impl Default for CheckpointFrequency {
    fn default() -> Self {
        Self::Files(10)
    }
}

/// The resolved, validated configuration value handed to all components.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub repos_base_dir: PathBuf,
    pub backend: BackendKind,
    pub qdrant: Option<QdrantSettings>,
    pub surreal: Option<SurrealSettings>,
    pub embedding: EmbeddingSettings,

    /// Chunks per embedding request
    pub batch_size: usize,
    /// Max in-flight embedding requests across the process
    pub rate_limit: usize,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
    /// Files larger than this many bytes are skipped
    pub max_file_size: u64,
    /// Directory names excluded at any depth of the walk
    pub skip_dirs: BTreeSet<String>,

    pub collections: CollectionMap,
    pub domains: DomainRules,

    pub checkpoint_path: PathBuf,
    /// Per-language checkpoint cadence; languages not listed use the default
    pub checkpoint_frequency: BTreeMap<String, CheckpointFrequency>,
}

impl IngestConfig {
    pub const DEFAULT_BATCH_SIZE: usize = 50;
    pub const DEFAULT_RATE_LIMIT: usize = 4;
    pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
    pub const DEFAULT_MAX_RETRIES: u32 = 3;
    pub const DEFAULT_MAX_FILE_SIZE: u64 = 500_000;
    pub const DEFAULT_CHECKPOINT_PATH: &'static str = "./ingestion_checkpoint.json";

    /// Default skip-directory set. Matching is by directory name at any
    /// depth of a repository tree.
    pub fn default_skip_dirs() -> BTreeSet<String> {
        [
            ".git",
            "node_modules",
            "target",
            "dist",
            "build",
            "out",
            "vendor",
            "__pycache__",
            ".venv",
            "venv",
            "coverage",
            ".next",
            ".nuxt",
            "artifacts",
            "cache",
            ".cache",
            ".idea",
            ".vscode",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    /// Assemble a config from the environment plus a resolved collection map.
    ///
    /// Only the backend selected by `VECTOR_BACKEND` has its credentials
    /// resolved; the other side stays `None`.
    pub fn from_env(
        repos_base_dir: PathBuf,
        collections: CollectionMap,
    ) -> Result<Self, ConfigError> {
        let backend = match std::env::var(VECTOR_BACKEND_VAR) {
            Ok(raw) => raw.parse()?,
            Err(_) => BackendKind::default(),
        };

        let (qdrant, surreal) = match backend {
            BackendKind::Managed => (Some(QdrantSettings::from_env()?), None),
            BackendKind::Local => (None, Some(SurrealSettings::from_env()?)),
        };

        Ok(Self {
            repos_base_dir,
            backend,
            qdrant,
            surreal,
            embedding: EmbeddingSettings::from_env()?,
            batch_size: Self::DEFAULT_BATCH_SIZE,
            rate_limit: Self::DEFAULT_RATE_LIMIT,
            request_timeout_secs: Self::DEFAULT_TIMEOUT_SECS,
            max_retries: Self::DEFAULT_MAX_RETRIES,
            max_file_size: Self::DEFAULT_MAX_FILE_SIZE,
            skip_dirs: Self::default_skip_dirs(),
            collections,
            domains: DomainRules::default(),
            checkpoint_path: PathBuf::from(Self::DEFAULT_CHECKPOINT_PATH),
            checkpoint_frequency: BTreeMap::new(),
        })
    }

    /// Checkpoint cadence for a language tag.
    pub fn frequency_for(&self, language: &str) -> CheckpointFrequency {
        self.checkpoint_frequency
            .get(language)
            .copied()
            .unwrap_or_default()
    }

    /// Validate invariants that do not depend on the environment.
    ///
    /// `supported_languages` is the set of tags the parser registry knows;
    /// the config crate itself has no parser dependency.
    pub fn validate(&self, supported_languages: &[&str]) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::validation("batch_size must be at least 1"));
        }
        if self.rate_limit == 0 {
            return Err(ConfigError::validation("rate_limit must be at least 1"));
        }
        if self.embedding.dimension == 0 {
            return Err(ConfigError::validation(
                "embedding dimension must be at least 1",
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::validation(
                "request_timeout_secs must be at least 1",
            ));
        }

        match self.backend {
            BackendKind::Managed if self.qdrant.is_none() => {
                return Err(ConfigError::missing("QDRANT_URL"));
            }
            BackendKind::Local if self.surreal.is_none() => {
                return Err(ConfigError::missing("SURREALDB_URL"));
            }
            _ => {}
        }

        for tag in self.collections.languages() {
            if tag == MIXED_KEY {
                continue;
            }
            if !supported_languages.contains(&tag) {
                return Err(ConfigError::UnknownLanguage {
                    tag: tag.to_string(),
                });
            }
        }

        Ok(())
    }
}

fn require_env(name: &str) -> Result<String, ConfigError> {
    match std::env::var(name) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(ConfigError::missing(name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TAGS: &[&str] = &["rust", "typescript", "solidity", "markdown", "yaml", "hcl"];

    fn test_config() -> IngestConfig {
        IngestConfig {
            repos_base_dir: PathBuf::from("/srv/repos"),
            backend: BackendKind::Managed,
            qdrant: Some(QdrantSettings {
                url: "http://localhost:6334".into(),
                api_key: None,
            }),
            surreal: None,
            embedding: EmbeddingSettings {
                base_url: "http://localhost:8000".into(),
                api_key: "key".into(),
                model: "embed-large".into(),
                dimension: 4096,
            },
            batch_size: IngestConfig::DEFAULT_BATCH_SIZE,
            rate_limit: IngestConfig::DEFAULT_RATE_LIMIT,
            request_timeout_secs: IngestConfig::DEFAULT_TIMEOUT_SECS,
            max_retries: IngestConfig::DEFAULT_MAX_RETRIES,
            max_file_size: IngestConfig::DEFAULT_MAX_FILE_SIZE,
            skip_dirs: IngestConfig::default_skip_dirs(),
            collections: CollectionsConfigFile::default().resolve().unwrap(),
            domains: DomainRules::default(),
            checkpoint_path: PathBuf::from(IngestConfig::DEFAULT_CHECKPOINT_PATH),
            checkpoint_frequency: BTreeMap::new(),
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(test_config().validate(TAGS).is_ok());
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let mut config = test_config();
        config.batch_size = 0;
        assert!(config.validate(TAGS).is_err());
    }

    #[test]
    fn managed_backend_requires_qdrant_settings() {
        let mut config = test_config();
        config.qdrant = None;
        let err = config.validate(TAGS).unwrap_err();
        assert!(err.to_string().contains("QDRANT_URL"));
    }

    #[test]
    fn unmapped_language_is_rejected() {
        let config = test_config();
        let err = config.validate(&["rust"]).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownLanguage { .. }));
    }

    #[test]
    fn backend_kind_parses() {
        assert_eq!("managed".parse::<BackendKind>().unwrap(), BackendKind::Managed);
        assert_eq!("LOCAL".parse::<BackendKind>().unwrap(), BackendKind::Local);
        assert!("qdrant".parse::<BackendKind>().is_err());
    }

    #[test]
    fn default_frequency_is_ten_files() {
        let config = test_config();
        assert_eq!(config.frequency_for("rust"), CheckpointFrequency::Files(10));
    }

    #[test]
    fn per_language_frequency_override() {
        let mut config = test_config();
        config
            .checkpoint_frequency
            .insert("markdown".into(), CheckpointFrequency::EveryBatch);
        assert_eq!(
            config.frequency_for("markdown"),
            CheckpointFrequency::EveryBatch
        );
        assert_eq!(config.frequency_for("rust"), CheckpointFrequency::Files(10));
    }

    #[test]
    fn skip_dirs_include_the_usual_suspects() {
        let dirs = IngestConfig::default_skip_dirs();
        assert!(dirs.contains(".git"));
        assert!(dirs.contains("node_modules"));
        assert!(dirs.contains("target"));
    }
}

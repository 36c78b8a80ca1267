//! Command implementations.

pub mod collections;
pub mod ingest;
pub mod search;
pub mod status;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::debug;

use repovec_config::{
    BackendKind, CollectionsConfigFile, IngestConfig, Repository, RepositoryConfigFile,
};
use repovec_store::{QdrantBackend, SurrealBackend, SurrealConnection, VectorBackend};

use crate::GlobalOptions;

const DEFAULT_REPOS_CONFIG: &str = "repos.yaml";
const DEFAULT_COLLECTIONS_CONFIG: &str = "collections.yaml";

/// Resolved config plus a connected backend, shared by every command.
pub struct AppContext {
    pub config: Arc<IngestConfig>,
    pub backend: Arc<dyn VectorBackend>,
    /// Repositories from the repos config file, priority-ordered
    pub repositories: Vec<Repository>,
}

/// Load config files, resolve credentials from the environment and connect
/// the selected backend.
pub async fn build_context(global: &GlobalOptions) -> Result<AppContext> {
    let collections_path = config_path(&global.collections_config, DEFAULT_COLLECTIONS_CONFIG);
    let collections_file = if collections_path.exists() {
        CollectionsConfigFile::load(&collections_path)
            .with_context(|| format!("loading {}", collections_path.display()))?
    } else {
        debug!(
            path = %collections_path.display(),
            "no collections config, using defaults"
        );
        CollectionsConfigFile::default()
    };
    let collections = collections_file.resolve()?;

    let repos_path = config_path(&global.repos_config, DEFAULT_REPOS_CONFIG);
    let repos_file = if repos_path.exists() {
        RepositoryConfigFile::load(&repos_path)
            .with_context(|| format!("loading {}", repos_path.display()))?
    } else {
        debug!(path = %repos_path.display(), "no repos config found");
        RepositoryConfigFile::default()
    };
    let repositories = repos_file.resolve()?;

    let mut config = IngestConfig::from_env(repos_file.repos_base_dir.clone(), collections)?;
    if let Some(ref backend) = global.backend {
        config.backend = backend.parse()?;
        // Re-resolve credentials when the flag overrides the environment
        // selection.
        match config.backend {
            BackendKind::Managed if config.qdrant.is_none() => {
                config.qdrant = Some(repovec_config::QdrantSettings::from_env()?);
            }
            BackendKind::Local if config.surreal.is_none() => {
                config.surreal = Some(repovec_config::SurrealSettings::from_env()?);
            }
            _ => {}
        }
    }

    let backend = connect_backend(&config).await?;

    Ok(AppContext {
        config: Arc::new(config),
        backend,
        repositories,
    })
}

async fn connect_backend(config: &IngestConfig) -> Result<Arc<dyn VectorBackend>> {
    match config.backend {
        BackendKind::Managed => {
            let settings = config
                .qdrant
                .as_ref()
                .context("managed backend selected but QDRANT_URL is not set")?;
            let backend = QdrantBackend::new(&settings.url, settings.api_key.as_deref())?;
            Ok(Arc::new(backend))
        }
        BackendKind::Local => {
            let settings = config
                .surreal
                .as_ref()
                .context("local backend selected but SURREALDB_URL is not set")?;
            let backend = SurrealBackend::connect(SurrealConnection {
                url: settings.url.clone(),
                namespace: settings.namespace.clone(),
                database: settings.database.clone(),
                username: settings.username.clone(),
                password: settings.password.clone(),
            })
            .await?;
            Ok(Arc::new(backend))
        }
    }
}

fn config_path(flag: &Option<PathBuf>, default: &str) -> PathBuf {
    flag.clone().unwrap_or_else(|| Path::new(default).to_path_buf())
}

//! Collection naming config file.
//!
//! Maps language tags (and a few service/concern groupings used by the
//! query side) onto collection suffixes. A full collection name is
//! `{prefix}_{suffix}` when a prefix is configured, else the bare suffix.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Reserved key for the optional cross-language union collection.
pub const MIXED_KEY: &str = "mixed";

/// Shape of the collections YAML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionsConfigFile {
    /// Optional prefix prepended to every suffix
    pub collection_prefix: String,

    /// Language tag → collection suffix
    pub language_collections: BTreeMap<String, String>,

    /// Service grouping → collection suffix (query-side only)
    pub service_collections: BTreeMap<String, String>,

    /// Cross-cutting concern → collection suffix (query-side only)
    pub concern_collections: BTreeMap<String, String>,

    /// Alternate names accepted by the query side
    pub aliases: BTreeMap<String, String>,

    /// Suffix used when a name cannot be resolved any other way
    pub default_collection: String,
}

impl Default for CollectionsConfigFile {
    fn default() -> Self {
        let mut language_collections = BTreeMap::new();
        language_collections.insert("rust".to_string(), "rust_code".to_string());
        language_collections.insert("typescript".to_string(), "typescript_code".to_string());
        language_collections.insert("solidity".to_string(), "contracts".to_string());
        language_collections.insert("markdown".to_string(), "documentation".to_string());
        language_collections.insert("yaml".to_string(), "configuration".to_string());
        language_collections.insert("hcl".to_string(), "configuration".to_string());

        Self {
            collection_prefix: String::new(),
            language_collections,
            service_collections: BTreeMap::new(),
            concern_collections: BTreeMap::new(),
            aliases: BTreeMap::new(),
            default_collection: "codebase".to_string(),
        }
    }
}

impl CollectionsConfigFile {
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

    /// Resolve into a [`CollectionMap`] with full names.
    pub fn resolve(&self) -> Result<CollectionMap, ConfigError> {
        if self.default_collection.is_empty() {
            return Err(ConfigError::validation("default_collection must not be empty"));
        }

        let full = |suffix: &str| -> String {
            if self.collection_prefix.is_empty() {
                suffix.to_string()
            } else {
                format!("{}_{}", self.collection_prefix, suffix)
            }
        };

        let map_values =
            |m: &BTreeMap<String, String>| m.iter().map(|(k, v)| (k.clone(), full(v))).collect();

        Ok(CollectionMap {
            by_language: map_values(&self.language_collections),
            by_service: map_values(&self.service_collections),
            by_concern: map_values(&self.concern_collections),
            aliases: map_values(&self.aliases),
            default_collection: full(&self.default_collection),
        })
    }
}

/// Resolved collection names, immutable for the run.
#[derive(Debug, Clone)]
pub struct CollectionMap {
    by_language: BTreeMap<String, String>,
    by_service: BTreeMap<String, String>,
    by_concern: BTreeMap<String, String>,
    aliases: BTreeMap<String, String>,
    default_collection: String,
}

impl CollectionMap {
    /// Collection a language tag ingests into, if configured.
    pub fn for_language(&self, tag: &str) -> Option<&str> {
        self.by_language.get(tag).map(String::as_str)
    }

    /// The cross-language union collection, when configured.
    ///
    /// Never written by the default pipeline; only chunks explicitly tagged
    /// for cross-language storage land here.
    pub fn mixed(&self) -> Option<&str> {
        self.by_concern
            .get(MIXED_KEY)
            .or_else(|| self.by_language.get(MIXED_KEY))
            .map(String::as_str)
    }

    /// Fallback collection name.
    pub fn default_collection(&self) -> &str {
        &self.default_collection
    }

    /// Language tags that have a configured collection.
    pub fn languages(&self) -> impl Iterator<Item = &str> {
        self.by_language.keys().map(String::as_str)
    }

    /// Resolve a user-facing name (language tag, service, concern or alias)
    /// into a full collection name. Falls back to the default collection.
    pub fn resolve_name(&self, name: &str) -> &str {
        self.by_language
            .get(name)
            .or_else(|| self.by_service.get(name))
            .or_else(|| self.by_concern.get(name))
            .or_else(|| self.aliases.get(name))
            .map(String::as_str)
            .unwrap_or(&self.default_collection)
    }

    /// Every distinct collection the ingest side may write: the per-language
    /// collections plus the default. The mixed collection is included only
    /// when configured.
    pub fn ingest_collections(&self) -> Vec<String> {
        let mut names: Vec<String> = self.by_language.values().cloned().collect();
        names.push(self.default_collection.clone());
        if let Some(mixed) = self.mixed() {
            names.push(mixed.to_string());
        }
        names.sort();
        names.dedup();
        names
    }
}

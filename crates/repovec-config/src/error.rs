//! Configuration error types.

use thiserror::Error;

/// Errors raised while resolving or validating configuration.
///
/// Configuration errors are the only error class that is allowed to
/// terminate the process; everything downstream degrades gracefully.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required credential or setting is absent from the environment
    #[error("missing required setting: {field} (set the {field} environment variable)")]
    MissingField { field: String },

    /// A setting is present but does not parse or is out of range
    #[error("invalid configuration: {0}")]
    Validation(String),

    /// A language tag in the collection map has no registered parser
    #[error("unknown language tag '{tag}' in language_collections")]
    UnknownLanguage { tag: String },

    /// Config file could not be read
    #[error("cannot read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Config file could not be parsed as YAML
    #[error("malformed YAML in '{path}': {source}")]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

impl ConfigError {
    /// Create a MissingField error.
    pub fn missing(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    /// Create a Validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_field_names_the_variable() {
        let err = ConfigError::missing("QDRANT_API_KEY");
        assert!(err.to_string().contains("QDRANT_API_KEY"));
    }

    #[test]
    fn unknown_language_display() {
        let err = ConfigError::UnknownLanguage {
            tag: "cobol".into(),
        };
        assert!(err.to_string().contains("cobol"));
    }
}

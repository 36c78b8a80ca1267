//! Parser error types.

use std::path::PathBuf;

use thiserror::Error;

use crate::Language;

/// Errors raised while parsing one file.
///
/// Parse failures never abort the run: parsers fold these into a failed
/// [`crate::ParseResult`] and the file is recorded and skipped.
#[derive(Error, Debug)]
pub enum ParserError {
    /// The tree-sitter grammar could not be loaded
    #[error("{language} grammar unavailable: {message}")]
    Grammar { language: Language, message: String },

    /// tree-sitter returned no tree at all
    #[error("cannot build syntax tree for '{path}'")]
    TreeUnbuildable { path: PathBuf },

    /// The tree was built but contains syntax errors
    #[error("syntax errors in '{path}'")]
    Syntax { path: PathBuf },

    /// Input is not valid UTF-8
    #[error("file '{path}' is not valid UTF-8 (error at byte {valid_up_to})")]
    InvalidUtf8 { path: PathBuf, valid_up_to: usize },

    /// I/O failure while reading the file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ParserError {
    /// Create a Grammar error.
    pub fn grammar(language: Language, message: impl std::fmt::Display) -> Self {
        Self::Grammar {
            language,
            message: message.to_string(),
        }
    }

    /// Create a TreeUnbuildable error.
    pub fn tree_unbuildable(path: impl Into<PathBuf>) -> Self {
        Self::TreeUnbuildable { path: path.into() }
    }

    /// Create a Syntax error.
    pub fn syntax(path: impl Into<PathBuf>) -> Self {
        Self::Syntax { path: path.into() }
    }

    /// Create an InvalidUtf8 error.
    pub fn invalid_utf8(path: impl Into<PathBuf>, valid_up_to: usize) -> Self {
        Self::InvalidUtf8 {
            path: path.into(),
            valid_up_to,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_file() {
        let err = ParserError::syntax("/repo/src/bad.rs");
        assert!(err.to_string().contains("syntax errors"));
        assert!(err.to_string().contains("bad.rs"));

        let err = ParserError::invalid_utf8("/repo/src/x.rs", 7);
        assert!(err.to_string().contains("UTF-8"));
        assert!(err.to_string().contains("byte 7"));
    }

    #[test]
    fn grammar_error_names_the_language() {
        let err = ParserError::grammar(Language::Solidity, "version mismatch");
        assert!(err.to_string().contains("solidity"));
        assert!(err.to_string().contains("version mismatch"));
    }
}

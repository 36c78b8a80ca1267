//! Chunk extraction for the repovec ingestion pipeline.
//!
//! Each supported language has a parser implementing [`ChunkParser`]; a
//! [`ParserRegistry`] maps language tags to parser instances, constructed
//! once at startup. Parsers are pure functions of their inputs: malformed
//! input produces a failed [`ParseResult`], never a panic and never an
//! aborted run.

mod chunk;
mod error;
mod hcl;
mod markdown;
mod registry;
mod rust;
mod solidity;
mod typescript;
mod yaml;

pub use chunk::{chunk_hash, complexity_score, meta, Chunk};
pub use error::ParserError;
pub use hcl::HclParser;
pub use markdown::MarkdownParser;
pub use registry::ParserRegistry;
pub use rust::RustParser;
pub use solidity::SolidityParser;
pub use typescript::TypeScriptParser;
pub use yaml::YamlParser;

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Languages the pipeline can chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Rust,
    TypeScript,
    Solidity,
    Markdown,
    Yaml,
    Hcl,
}

impl Language {
    /// Canonical order, also the default emission order of language groups.
    pub const ALL: [Language; 6] = [
        Language::Rust,
        Language::TypeScript,
        Language::Solidity,
        Language::Markdown,
        Language::Yaml,
        Language::Hcl,
    ];

    /// Stable tag used in config maps and stored payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Rust => "rust",
            Language::TypeScript => "typescript",
            Language::Solidity => "solidity",
            Language::Markdown => "markdown",
            Language::Yaml => "yaml",
            Language::Hcl => "hcl",
        }
    }

    /// All stable tags, in canonical order.
    pub fn all_tags() -> Vec<&'static str> {
        Self::ALL.iter().map(|l| l.as_str()).collect()
    }

    /// Parse a stable tag back into a language.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|l| l.as_str() == tag)
    }

    /// Detect language from a file extension (without the dot).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "rs" => Some(Language::Rust),
            "ts" | "tsx" | "js" | "jsx" => Some(Language::TypeScript),
            "sol" => Some(Language::Solidity),
            "md" => Some(Language::Markdown),
            "yml" | "yaml" => Some(Language::Yaml),
            "tf" | "hcl" => Some(Language::Hcl),
            _ => None,
        }
    }

    /// Detect language from a file path.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of parsing one file.
#[derive(Debug, Clone, Default)]
pub struct ParseResult {
    /// False when the file could not be parsed structurally
    pub success: bool,
    /// Chunks in source order; empty on failure or for empty files
    pub chunks: Vec<Chunk>,
    /// Total line count of the file
    pub total_lines: usize,
    /// Human-readable cause when `success` is false
    pub error: Option<String>,
}

impl ParseResult {
    /// Successful parse.
    pub fn ok(chunks: Vec<Chunk>, total_lines: usize) -> Self {
        Self {
            success: true,
            chunks,
            total_lines,
            error: None,
        }
    }

    /// Failed parse; the file is skipped and the run continues.
    pub fn failed(total_lines: usize, error: ParserError) -> Self {
        Self {
            success: false,
            chunks: Vec::new(),
            total_lines,
            error: Some(error.to_string()),
        }
    }
}

/// The parser contract shared by every language.
///
/// Implementations construct a fresh tree-sitter parser per call so values
/// stay `Send + Sync` and calls are pure.
pub trait ChunkParser: Send + Sync {
    /// The language this parser handles.
    fn language(&self) -> Language;

    /// Parse one file into chunks.
    ///
    /// `file_path` is the absolute on-disk path (used only in error
    /// messages); `relative_path` is recorded on every chunk. Invalid UTF-8
    /// yields a failed result, not a panic.
    fn parse(
        &self,
        file_path: &Path,
        relative_path: &str,
        source: &[u8],
        repo_id: &str,
    ) -> ParseResult;
}

/// Decode source bytes, or build the standard failure result.
///
/// Shared by all parsers: empty files succeed with no chunks, invalid UTF-8
/// fails with a [`ParserError::InvalidUtf8`] whose line count comes from a
/// lossy decode.
pub(crate) fn decode_source<'a>(
    file_path: &Path,
    source: &'a [u8],
) -> Result<&'a str, ParseResult> {
    match std::str::from_utf8(source) {
        Ok(text) => Ok(text),
        Err(err) => {
            let lossy = String::from_utf8_lossy(source);
            Err(ParseResult::failed(
                lossy.lines().count(),
                ParserError::invalid_utf8(file_path, err.valid_up_to()),
            ))
        }
    }
}

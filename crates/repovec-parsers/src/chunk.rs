//! The chunk model: the unit of embedding.
//!
//! A chunk is a syntactically coherent span of source text (a function, a
//! type, a contract, a doc section) plus enough metadata to be
//! self-describing once it lands in a vector store. Identity is the SHA-256
//! `chunk_hash`, so re-ingesting identical content always maps to the same
//! stored point.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::Language;

/// Documented metadata keys shared across parsers.
///
/// Every key is optional; parsers only set the ones that apply.
pub mod meta {
    /// `pub` / `pub(crate)` / `private` / Solidity visibility
    pub const VISIBILITY: &str = "visibility";
    /// "true" when the item is async
    pub const IS_ASYNC: &str = "is_async";
    /// "true" when a test attribute precedes the item
    pub const HAS_TESTS: &str = "has_tests";
    /// Newline-joined file-level import / use statements
    pub const IMPORTS: &str = "imports";
    /// "true" for `.ts`/`.tsx`, "false" for plain JavaScript
    pub const IS_TYPESCRIPT: &str = "is_typescript";
    /// "true" when the chunk is a UI component (uppercase name + JSX/hooks)
    pub const IS_COMPONENT: &str = "is_component";
    /// "true" when the item is exported
    pub const IS_EXPORTED: &str = "is_exported";
    /// Solidity state mutability (view/pure/payable/nonpayable)
    pub const STATE_MUTABILITY: &str = "state_mutability";
    /// Document type for markdown chunks
    pub const DOC_TYPE: &str = "doc_type";
    /// Heading level a markdown chunk was split at
    pub const SECTION_LEVEL: &str = "section_level";
    /// Document title (text of the first level-1 heading)
    pub const TITLE: &str = "title";
    /// Set to "true" to route a copy into the mixed collection
    pub const CROSS_LANGUAGE: &str = "cross_language";
}

/// One embeddable unit of source text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Exact source text spanning the chunk, UTF-8
    pub content: String,
    pub language: Language,
    /// Language-specific category (function, struct, contract, section, ...)
    pub item_type: String,
    /// Declared name, or a synthesized `<anonymous:line>` name
    pub item_name: String,
    /// Path relative to the repository root
    pub file_path: String,
    /// 1-based inclusive
    pub start_line: usize,
    /// 1-based inclusive
    pub end_line: usize,
    pub repo_id: String,
    /// First path segment of `file_path`, filled in by the file processor
    pub repo_component: String,
    /// Ordered keyword classification, filled in by the file processor
    pub business_domain: String,
    /// Weighted size/nesting/branching score in [0, 1]
    pub complexity_score: f64,
    /// SHA-256 over `language|file_path|item_type|item_name|content`
    pub chunk_hash: String,
    /// Language-specific extras, see [`meta`]
    pub metadata: BTreeMap<String, String>,
}

impl Chunk {
    /// Build a chunk, computing its hash and complexity score.
    ///
    /// `repo_component` and `business_domain` start empty / "unknown"; the
    /// file processor fills them in before the chunk leaves the repo pass.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        language: Language,
        item_type: impl Into<String>,
        item_name: impl Into<String>,
        content: impl Into<String>,
        file_path: impl Into<String>,
        start_line: usize,
        end_line: usize,
        repo_id: impl Into<String>,
    ) -> Self {
        let content = content.into();
        let item_type = item_type.into();
        let item_name = item_name.into();
        let file_path = file_path.into();

        let chunk_hash = chunk_hash(language, &file_path, &item_type, &item_name, &content);
        let complexity_score = complexity_score(&content);

        Self {
            content,
            language,
            item_type,
            item_name,
            file_path,
            start_line,
            end_line,
            repo_id: repo_id.into(),
            repo_component: String::new(),
            business_domain: "unknown".to_string(),
            complexity_score,
            chunk_hash,
            metadata: BTreeMap::new(),
        }
    }

    /// Attach a metadata entry, builder style.
    pub fn with_meta(mut self, key: &str, value: impl Into<String>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    /// Synthesized name for items without a declared one.
    pub fn anonymous_name(line: usize) -> String {
        format!("<anonymous:{}>", line)
    }
}

/// SHA-256 fingerprint over the canonical chunk representation,
/// lowercase hex.
pub fn chunk_hash(
    language: Language,
    file_path: &str,
    item_type: &str,
    item_name: &str,
    content: &str,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(language.as_str().as_bytes());
    hasher.update(b"|");
    hasher.update(file_path.as_bytes());
    hasher.update(b"|");
    hasher.update(item_type.as_bytes());
    hasher.update(b"|");
    hasher.update(item_name.as_bytes());
    hasher.update(b"|");
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Keywords counted as branch points, across all supported languages.
const BRANCH_KEYWORDS: &[&str] = &[
    "if", "else", "for", "while", "match", "switch", "case", "catch", "loop", "require", "assert",
];

/// Weighted complexity in [0, 1]:
/// 0.4·(lines/200) + 0.3·(max indent/5) + 0.3·(branch keywords/10),
/// each term clamped to 1.
pub fn complexity_score(content: &str) -> f64 {
    if content.is_empty() {
        return 0.0;
    }

    let lines = content.lines().count().max(1);
    let norm_lines = (lines as f64 / 200.0).min(1.0);

    let max_indent = content.lines().map(indent_level).max().unwrap_or(0);
    let norm_indent = (max_indent as f64 / 5.0).min(1.0);

    let branches = branch_count(content);
    let norm_branches = (branches as f64 / 10.0).min(1.0);

    0.4 * norm_lines + 0.3 * norm_indent + 0.3 * norm_branches
}

/// Indentation depth of one line: a tab or four spaces per level.
fn indent_level(line: &str) -> usize {
    let mut spaces = 0usize;
    let mut levels = 0usize;
    for c in line.chars() {
        match c {
            '\t' => {
                levels += 1;
                spaces = 0;
            }
            ' ' => {
                spaces += 1;
                if spaces == 4 {
                    levels += 1;
                    spaces = 0;
                }
            }
            _ => break,
        }
    }
    levels
}

/// Word-boundary count of branch keywords; identifiers like `iffy` or
/// `match_all` do not count.
fn branch_count(content: &str) -> usize {
    let mut count = 0usize;
    let mut word = String::new();
    for c in content.chars().chain(std::iter::once(' ')) {
        if c.is_alphanumeric() || c == '_' {
            word.push(c);
        } else {
            if !word.is_empty() && BRANCH_KEYWORDS.contains(&word.as_str()) {
                count += 1;
            }
            word.clear();
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_stable_and_input_sensitive() {
        let a = chunk_hash(Language::Rust, "src/a.rs", "function", "f", "fn f() {}");
        let b = chunk_hash(Language::Rust, "src/a.rs", "function", "f", "fn f() {}");
        let c = chunk_hash(Language::Rust, "src/a.rs", "function", "g", "fn f() {}");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|ch| ch.is_ascii_hexdigit() && !ch.is_ascii_uppercase()));
    }

    #[test]
    fn one_liner_scores_nonzero() {
        let score = complexity_score("pub fn verify_token(t: &str) -> bool { !t.is_empty() }");
        assert!(score > 0.0);
        assert!(score <= 1.0);
    }

    #[test]
    fn score_is_clamped_to_one() {
        let mut giant = String::new();
        for _ in 0..500 {
            giant.push_str("\t\t\t\t\t\tif x { if y { if z { match w {} } } }\n");
        }
        let score = complexity_score(&giant);
        assert!(score <= 1.0);
        assert!((score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn empty_content_scores_zero() {
        assert_eq!(complexity_score(""), 0.0);
    }

    #[test]
    fn branch_count_respects_word_boundaries() {
        assert_eq!(branch_count("if iffy { match match_all() }"), 2);
        assert_eq!(branch_count("modifier"), 0);
    }

    #[test]
    fn indent_levels_mix_tabs_and_spaces() {
        assert_eq!(indent_level("\t\tx"), 2);
        assert_eq!(indent_level("        x"), 2);
        assert_eq!(indent_level("x"), 0);
    }

    #[test]
    fn anonymous_name_includes_line() {
        assert_eq!(Chunk::anonymous_name(42), "<anonymous:42>");
    }

    #[test]
    fn new_fills_hash_and_defaults() {
        let chunk = Chunk::new(
            Language::Rust,
            "function",
            "f",
            "fn f() {}",
            "src/a.rs",
            1,
            1,
            "repo",
        );
        assert_eq!(chunk.business_domain, "unknown");
        assert!(chunk.repo_component.is_empty());
        assert_eq!(chunk.chunk_hash.len(), 64);
        assert!(chunk.start_line <= chunk.end_line);
    }
}

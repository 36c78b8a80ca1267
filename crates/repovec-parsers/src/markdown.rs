//! Markdown parser.
//!
//! Documents split at level-2 headings: everything from one `## ` line to
//! the line before the next (including deeper headings and fenced code
//! blocks) is one chunk. Headings inside fences do not split. Text above
//! the first level-2 heading contributes only the document title.

use std::path::Path;

use crate::chunk::{meta, Chunk};
use crate::{decode_source, ChunkParser, Language, ParseResult};

/// Document types recognized from path keywords, checked in order.
const DOC_TYPES: &[(&str, &str)] = &[
    ("arch", "architecture"),
    ("api", "api"),
    ("auth", "authentication"),
    ("deploy", "deployment"),
    ("dev", "development"),
    ("integrat", "integration"),
];

const DEFAULT_DOC_TYPE: &str = "documentation";

pub struct MarkdownParser;

impl ChunkParser for MarkdownParser {
    fn language(&self) -> Language {
        Language::Markdown
    }

    fn parse(
        &self,
        file_path: &Path,
        relative_path: &str,
        source: &[u8],
        repo_id: &str,
    ) -> ParseResult {
        let text = match decode_source(file_path, source) {
            Ok(text) => text,
            Err(failure) => return failure,
        };
        let lines: Vec<&str> = text.lines().collect();
        let total_lines = lines.len();
        if text.trim().is_empty() {
            return ParseResult::ok(Vec::new(), total_lines);
        }

        let doc_type = doc_type_for_path(relative_path);
        let heading_indices = level2_headings(&lines);
        let title = document_title(&lines, heading_indices.first().copied());

        let mut chunks = Vec::new();
        for (i, &start) in heading_indices.iter().enumerate() {
            let end = heading_indices
                .get(i + 1)
                .copied()
                .unwrap_or(lines.len());
            let content = lines[start..end].join("\n");
            let heading = lines[start][2..].trim();
            let item_name = if heading.is_empty() {
                Chunk::anonymous_name(start + 1)
            } else {
                heading.to_string()
            };

            let mut chunk = Chunk::new(
                Language::Markdown,
                doc_type,
                item_name,
                content,
                relative_path,
                start + 1,
                end,
                repo_id,
            )
            .with_meta(meta::DOC_TYPE, doc_type)
            .with_meta(meta::SECTION_LEVEL, "2");
            if !title.is_empty() {
                chunk = chunk.with_meta(meta::TITLE, title.clone());
            }
            chunks.push(chunk);
        }

        ParseResult::ok(chunks, total_lines)
    }
}

/// Indices of level-2 heading lines, ignoring anything inside fences.
fn level2_headings(lines: &[&str]) -> Vec<usize> {
    let mut indices = Vec::new();
    let mut in_fence = false;
    for (i, line) in lines.iter().enumerate() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_fence = !in_fence;
            continue;
        }
        if !in_fence && line.starts_with("##") && !line.starts_with("###") {
            indices.push(i);
        }
    }
    indices
}

/// Text of the first level-1 heading above the first section, if any.
fn document_title(lines: &[&str], first_heading: Option<usize>) -> String {
    let limit = first_heading.unwrap_or(lines.len());
    lines[..limit]
        .iter()
        .find(|l| l.starts_with("# "))
        .map(|l| l[2..].trim().to_string())
        .unwrap_or_default()
}

fn doc_type_for_path(relative_path: &str) -> &'static str {
    let lower = relative_path.to_lowercase();
    for (keyword, doc_type) in DOC_TYPES {
        if lower.contains(keyword) {
            return doc_type;
        }
    }
    DEFAULT_DOC_TYPE
}

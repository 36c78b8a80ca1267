//! HCL / Terraform parser.
//!
//! Top-level blocks (`resource`, `module`, `variable`, ...) become chunks
//! with the block keyword as `item_type` and the joined labels as
//! `item_name`; top-level attributes become `attribute` chunks.

use std::path::Path;

use tree_sitter::{Node, Parser};

use crate::chunk::Chunk;
use crate::{decode_source, ChunkParser, Language, ParseResult, ParserError};

pub struct HclParser;

impl ChunkParser for HclParser {
    fn language(&self) -> Language {
        Language::Hcl
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
        let total_lines = text.lines().count();
        if text.trim().is_empty() {
            return ParseResult::ok(Vec::new(), total_lines);
        }

        let mut parser = Parser::new();
        if let Err(err) = parser.set_language(&tree_sitter_hcl::LANGUAGE.into()) {
            return ParseResult::failed(total_lines, ParserError::grammar(Language::Hcl, err));
        }
        let Some(tree) = parser.parse(text, None) else {
            return ParseResult::failed(total_lines, ParserError::tree_unbuildable(file_path));
        };
        let root = tree.root_node();
        if root.has_error() {
            return ParseResult::failed(total_lines, ParserError::syntax(file_path));
        }

        // config_file wraps a body; older grammar revisions omit the wrapper.
        let body = {
            let mut cursor = root.walk();
            let found = root.named_children(&mut cursor)
                .find(|n| n.kind() == "body")
                .unwrap_or(root);
            found
        };

        let mut chunks = Vec::new();
        let mut cursor = body.walk();
        let items: Vec<Node> = body.named_children(&mut cursor).collect();
        for node in items {
            match node.kind() {
                "block" => chunks.push(block_chunk(node, text, relative_path, repo_id)),
                "attribute" => {
                    let name = attribute_name(node, text).unwrap_or_else(|| {
                        Chunk::anonymous_name(node.start_position().row + 1)
                    });
                    chunks.push(Chunk::new(
                        Language::Hcl,
                        "attribute",
                        name,
                        node_text(node, text),
                        relative_path,
                        node.start_position().row + 1,
                        node.end_position().row + 1,
                        repo_id,
                    ));
                }
                _ => {}
            }
        }

        ParseResult::ok(chunks, total_lines)
    }
}

fn node_text<'s>(node: Node<'_>, src: &'s str) -> &'s str {
    node.utf8_text(src.as_bytes()).unwrap_or("")
}

/// Block keyword is the first identifier; labels are the string/identifier
/// tokens before the block body.
fn block_chunk(node: Node<'_>, src: &str, relative_path: &str, repo_id: &str) -> Chunk {
    let mut keyword = None;
    let mut labels = Vec::new();

    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        match child.kind() {
            "identifier" if keyword.is_none() => {
                keyword = Some(node_text(child, src).to_string());
            }
            "identifier" | "string_lit" => {
                labels.push(unquote(node_text(child, src)));
            }
            "body" | "block_start" => break,
            _ => {}
        }
    }

    let start = node.start_position().row + 1;
    let item_type = keyword.unwrap_or_else(|| "block".to_string());
    let item_name = if labels.is_empty() {
        Chunk::anonymous_name(start)
    } else {
        labels.join(".")
    };

    Chunk::new(
        Language::Hcl,
        item_type,
        item_name,
        node_text(node, src),
        relative_path,
        start,
        node.end_position().row + 1,
        repo_id,
    )
}

fn attribute_name(node: Node<'_>, src: &str) -> Option<String> {
    let mut cursor = node.walk();
    let found = node.named_children(&mut cursor)
        .find(|n| n.kind() == "identifier")
        .map(|n| node_text(n, src).to_string());
    found
}

fn unquote(raw: &str) -> String {
    raw.trim().trim_matches('"').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> ParseResult {
        HclParser.parse(
            Path::new("/repo/infra/main.tf"),
            "infra/main.tf",
            source.as_bytes(),
            "acme-infra",
        )
    }

    #[test]
    fn resource_blocks_become_chunks() {
        let source = r#"
resource "aws_s3_bucket" "artifacts" {
  bucket = "acme-artifacts"
}

module "network" {
  source = "./network"
}
"#;
        let result = parse(source);
        assert!(result.success, "error: {:?}", result.error);
        assert_eq!(result.chunks.len(), 2);

        let bucket = &result.chunks[0];
        assert_eq!(bucket.item_type, "resource");
        assert_eq!(bucket.item_name, "aws_s3_bucket.artifacts");
        assert!(bucket.content.contains("acme-artifacts"));

        assert_eq!(result.chunks[1].item_type, "module");
        assert_eq!(result.chunks[1].item_name, "network");
    }

    #[test]
    fn top_level_attributes_are_chunked() {
        let result = parse("environment = \"production\"\n");
        assert!(result.success, "error: {:?}", result.error);
        assert_eq!(result.chunks.len(), 1);
        assert_eq!(result.chunks[0].item_type, "attribute");
        assert_eq!(result.chunks[0].item_name, "environment");
    }

    #[test]
    fn nested_blocks_stay_inside_the_parent_chunk() {
        let source = r#"
resource "aws_instance" "web" {
  root_block_device {
    volume_size = 20
  }
}
"#;
        let result = parse(source);
        assert!(result.success, "error: {:?}", result.error);
        assert_eq!(result.chunks.len(), 1);
        assert!(result.chunks[0].content.contains("root_block_device"));
    }

    #[test]
    fn empty_file_succeeds() {
        let result = parse("");
        assert!(result.success);
        assert!(result.chunks.is_empty());
    }
}

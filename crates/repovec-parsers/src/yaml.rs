//! YAML config parser.
//!
//! Top-level mapping keys become chunks (`item_type = config_block`), one
//! per key, using the tree-sitter YAML grammar. Documents that are not
//! mappings (bare sequences, scalars) produce no chunks. Never guesses
//! nesting from indentation.

use std::path::Path;

use tree_sitter::{Node, Parser};

use crate::chunk::Chunk;
use crate::{decode_source, ChunkParser, Language, ParseResult, ParserError};

pub struct YamlParser;

impl ChunkParser for YamlParser {
    fn language(&self) -> Language {
        Language::Yaml
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
        if let Err(err) = parser.set_language(&tree_sitter_yaml::LANGUAGE.into()) {
            return ParseResult::failed(total_lines, ParserError::grammar(Language::Yaml, err));
        }
        let Some(tree) = parser.parse(text, None) else {
            return ParseResult::failed(total_lines, ParserError::tree_unbuildable(file_path));
        };
        let root = tree.root_node();
        if root.has_error() {
            return ParseResult::failed(total_lines, ParserError::syntax(file_path));
        }

        let mut chunks = Vec::new();
        for document in children_of_kind(root, "document") {
            for mapping in mappings_in(document) {
                let mut cursor = mapping.walk();
                let pairs: Vec<Node> = mapping
                    .named_children(&mut cursor)
                    .filter(|n| n.kind() == "block_mapping_pair" || n.kind() == "flow_pair")
                    .collect();
                for pair in pairs {
                    let name = pair
                        .child_by_field_name("key")
                        .map(|k| unquote(node_text(k, text)))
                        .filter(|k| !k.is_empty())
                        .unwrap_or_else(|| {
                            Chunk::anonymous_name(pair.start_position().row + 1)
                        });

                    chunks.push(Chunk::new(
                        Language::Yaml,
                        "config_block",
                        name,
                        node_text(pair, text),
                        relative_path,
                        pair.start_position().row + 1,
                        pair.end_position().row + 1,
                        repo_id,
                    ));
                }
            }
        }

        ParseResult::ok(chunks, total_lines)
    }
}

fn node_text<'s>(node: Node<'_>, src: &'s str) -> &'s str {
    node.utf8_text(src.as_bytes()).unwrap_or("")
}

fn children_of_kind<'t>(node: Node<'t>, kind: &str) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|n| n.kind() == kind)
        .collect()
}

/// Find the top-level mapping node(s) of a document, descending through
/// `block_node` wrappers only.
fn mappings_in(document: Node<'_>) -> Vec<Node<'_>> {
    let mut found = Vec::new();
    let mut stack = vec![document];
    while let Some(node) = stack.pop() {
        match node.kind() {
            "block_mapping" | "flow_mapping" => found.push(node),
            "document" | "block_node" | "flow_node" => {
                let mut cursor = node.walk();
                for child in node.named_children(&mut cursor) {
                    stack.push(child);
                }
            }
            _ => {}
        }
    }
    found
}

fn unquote(raw: &str) -> String {
    raw.trim()
        .trim_matches('"')
        .trim_matches('\'')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> ParseResult {
        YamlParser.parse(
            Path::new("/repo/deploy/values.yaml"),
            "deploy/values.yaml",
            source.as_bytes(),
            "acme-infra",
        )
    }

    #[test]
    fn top_level_keys_become_chunks() {
        let source = "replicas: 3\nimage:\n  name: acme/api\n  tag: latest\nresources:\n  limits:\n    cpu: 500m\n";
        let result = parse(source);
        assert!(result.success, "error: {:?}", result.error);

        let names: Vec<&str> = result.chunks.iter().map(|c| c.item_name.as_str()).collect();
        assert_eq!(names, vec!["replicas", "image", "resources"]);
        assert_eq!(result.chunks[1].item_type, "config_block");
        assert!(result.chunks[1].content.contains("acme/api"));
    }

    #[test]
    fn nested_keys_are_not_separate_chunks() {
        let result = parse("outer:\n  inner: 1\n  other: 2\n");
        assert!(result.success);
        assert_eq!(result.chunks.len(), 1);
        assert_eq!(result.chunks[0].item_name, "outer");
    }

    #[test]
    fn bare_sequence_yields_no_chunks() {
        let result = parse("- a\n- b\n");
        assert!(result.success);
        assert!(result.chunks.is_empty());
    }

    #[test]
    fn quoted_keys_are_unquoted() {
        let result = parse("\"quoted\": 1\n");
        assert!(result.success);
        assert_eq!(result.chunks[0].item_name, "quoted");
    }

    #[test]
    fn empty_file_succeeds() {
        let result = parse("");
        assert!(result.success);
        assert!(result.chunks.is_empty());
    }

    #[test]
    fn line_numbers_are_one_based_inclusive() {
        let result = parse("a: 1\nb:\n  c: 2\n");
        let b = &result.chunks[1];
        assert_eq!(b.start_line, 2);
        assert_eq!(b.end_line, 3);
    }
}

//! Rust source parser.
//!
//! Extracts top-level functions, type declarations, impl blocks (one chunk
//! per impl, header and body), traits, module headers (the nested contents
//! become their own chunks), and constants/statics/type aliases. File-level
//! `use` declarations are attached to every chunk so a chunk is
//! self-describing.

use std::path::Path;

use tree_sitter::{Node, Parser};

use crate::chunk::{meta, Chunk};
use crate::{decode_source, ChunkParser, Language, ParseResult, ParserError};

pub struct RustParser;

impl ChunkParser for RustParser {
    fn language(&self) -> Language {
        Language::Rust
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
        if let Err(err) = parser.set_language(&tree_sitter_rust::LANGUAGE.into()) {
            return ParseResult::failed(total_lines, ParserError::grammar(Language::Rust, err));
        }
        let Some(tree) = parser.parse(text, None) else {
            return ParseResult::failed(total_lines, ParserError::tree_unbuildable(file_path));
        };
        let root = tree.root_node();
        if root.has_error() {
            return ParseResult::failed(total_lines, ParserError::syntax(file_path));
        }

        let imports = collect_imports(root, text);
        let mut chunks = Vec::new();
        extract_items(root, text, relative_path, repo_id, &imports, &mut chunks);

        ParseResult::ok(chunks, total_lines)
    }
}

fn node_text<'s>(node: Node<'_>, src: &'s str) -> &'s str {
    node.utf8_text(src.as_bytes()).unwrap_or("")
}

fn start_line(node: Node<'_>) -> usize {
    node.start_position().row + 1
}

fn end_line(node: Node<'_>) -> usize {
    node.end_position().row + 1
}

/// Gather all `use` declarations anywhere in the file, newline-joined.
fn collect_imports(root: Node<'_>, src: &str) -> String {
    let mut lines = Vec::new();
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            match child.kind() {
                "use_declaration" => lines.push(node_text(child, src).to_string()),
                "mod_item" => {
                    if let Some(body) = child.child_by_field_name("body") {
                        stack.push(body);
                    }
                }
                _ => {}
            }
        }
    }
    lines.join("\n")
}

/// Walk one container (source file or module body) and emit item chunks.
fn extract_items(
    container: Node<'_>,
    src: &str,
    relative_path: &str,
    repo_id: &str,
    imports: &str,
    chunks: &mut Vec<Chunk>,
) {
    let mut pending_attrs: Vec<String> = Vec::new();
    let mut cursor = container.walk();
    let children: Vec<Node> = container.named_children(&mut cursor).collect();

    for node in children {
        match node.kind() {
            "attribute_item" => {
                pending_attrs.push(node_text(node, src).to_string());
                continue;
            }
            "function_item" => {
                let chunk = item_chunk(node, src, relative_path, repo_id, "function")
                    .with_meta(meta::IS_ASYNC, bool_str(is_async(node, src)))
                    .with_meta(meta::HAS_TESTS, bool_str(has_test_attr(&pending_attrs)));
                chunks.push(finish(chunk, node, src, imports));
            }
            "struct_item" => {
                let chunk = item_chunk(node, src, relative_path, repo_id, "struct");
                chunks.push(finish(chunk, node, src, imports));
            }
            "enum_item" => {
                let chunk = item_chunk(node, src, relative_path, repo_id, "enum");
                chunks.push(finish(chunk, node, src, imports));
            }
            "trait_item" => {
                let chunk = item_chunk(node, src, relative_path, repo_id, "trait");
                chunks.push(finish(chunk, node, src, imports));
            }
            "impl_item" => {
                let name = impl_name(node, src);
                let chunk = Chunk::new(
                    Language::Rust,
                    "impl",
                    name,
                    node_text(node, src),
                    relative_path,
                    start_line(node),
                    end_line(node),
                    repo_id,
                );
                chunks.push(finish(chunk, node, src, imports));
            }
            "mod_item" => {
                // Header only; nested items become their own chunks.
                let name = named_or_anonymous(node, src);
                if let Some(body) = node.child_by_field_name("body") {
                    let header = src[node.start_byte()..body.start_byte()].trim_end();
                    let chunk = Chunk::new(
                        Language::Rust,
                        "module",
                        name,
                        header,
                        relative_path,
                        start_line(node),
                        start_line(body),
                        repo_id,
                    )
                    .with_meta(meta::VISIBILITY, visibility(node, src))
                    .with_meta(meta::HAS_TESTS, bool_str(has_test_attr(&pending_attrs)));
                    chunks.push(attach_imports(chunk, imports));
                    extract_items(body, src, relative_path, repo_id, imports, chunks);
                } else {
                    let chunk = item_chunk(node, src, relative_path, repo_id, "module");
                    chunks.push(finish(chunk, node, src, imports));
                }
            }
            "const_item" => {
                let chunk = item_chunk(node, src, relative_path, repo_id, "const");
                chunks.push(finish(chunk, node, src, imports));
            }
            "static_item" => {
                let chunk = item_chunk(node, src, relative_path, repo_id, "static");
                chunks.push(finish(chunk, node, src, imports));
            }
            "type_item" => {
                let chunk = item_chunk(node, src, relative_path, repo_id, "type_alias");
                chunks.push(finish(chunk, node, src, imports));
            }
            _ => {}
        }
        pending_attrs.clear();
    }
}

fn item_chunk(
    node: Node<'_>,
    src: &str,
    relative_path: &str,
    repo_id: &str,
    item_type: &str,
) -> Chunk {
    Chunk::new(
        Language::Rust,
        item_type,
        named_or_anonymous(node, src),
        node_text(node, src),
        relative_path,
        start_line(node),
        end_line(node),
        repo_id,
    )
}

fn finish(chunk: Chunk, node: Node<'_>, src: &str, imports: &str) -> Chunk {
    let chunk = if chunk.metadata.contains_key(meta::VISIBILITY) {
        chunk
    } else {
        chunk.with_meta(meta::VISIBILITY, visibility(node, src))
    };
    attach_imports(chunk, imports)
}

fn attach_imports(chunk: Chunk, imports: &str) -> Chunk {
    if imports.is_empty() {
        chunk
    } else {
        chunk.with_meta(meta::IMPORTS, imports)
    }
}

fn named_or_anonymous(node: Node<'_>, src: &str) -> String {
    node.child_by_field_name("name")
        .map(|n| node_text(n, src).to_string())
        .unwrap_or_else(|| Chunk::anonymous_name(start_line(node)))
}

/// `impl Type` or `impl Trait for Type`.
fn impl_name(node: Node<'_>, src: &str) -> String {
    let ty = node
        .child_by_field_name("type")
        .map(|n| node_text(n, src).to_string())
        .unwrap_or_else(|| Chunk::anonymous_name(start_line(node)));
    match node.child_by_field_name("trait") {
        Some(tr) => format!("{} for {}", node_text(tr, src), ty),
        None => ty,
    }
}

fn visibility(node: Node<'_>, src: &str) -> String {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "visibility_modifier" {
            return node_text(child, src).to_string();
        }
    }
    "private".to_string()
}

fn is_async(node: Node<'_>, src: &str) -> bool {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "function_modifiers" {
            return node_text(child, src).contains("async");
        }
    }
    false
}

fn has_test_attr(attrs: &[String]) -> bool {
    attrs.iter().any(|a| a.contains("test"))
}

fn bool_str(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> ParseResult {
        RustParser.parse(
            Path::new("/repo/svc/auth.rs"),
            "svc/auth.rs",
            source.as_bytes(),
            "acme-core",
        )
    }

    #[test]
    fn single_function_round_trip() {
        let result = parse("pub fn verify_token(t: &str) -> bool { !t.is_empty() }");
        assert!(result.success);
        assert_eq!(result.chunks.len(), 1);

        let chunk = &result.chunks[0];
        assert_eq!(chunk.item_type, "function");
        assert_eq!(chunk.item_name, "verify_token");
        assert_eq!(chunk.start_line, 1);
        assert_eq!(chunk.end_line, 1);
        assert!(chunk.complexity_score > 0.0);
        assert_eq!(chunk.metadata[meta::VISIBILITY], "pub");
        assert_eq!(chunk.metadata[meta::IS_ASYNC], "false");
    }

    #[test]
    fn empty_file_succeeds_with_no_chunks() {
        let result = parse("");
        assert!(result.success);
        assert!(result.chunks.is_empty());
        assert_eq!(result.total_lines, 0);
    }

    #[test]
    fn syntax_error_fails_without_chunks() {
        let result = parse("fn broken( {");
        assert!(!result.success);
        assert!(result.chunks.is_empty());
        assert!(result.error.is_some());
    }

    #[test]
    fn extracts_types_impls_and_traits_in_order() {
        let source = r#"
use std::fmt;

pub struct Token {
    raw: String,
}

pub trait Validate {
    fn validate(&self) -> bool;
}

impl Validate for Token {
    fn validate(&self) -> bool {
        !self.raw.is_empty()
    }
}

pub const MAX_LEN: usize = 64;
"#;
        let result = parse(source);
        assert!(result.success);

        let kinds: Vec<&str> = result.chunks.iter().map(|c| c.item_type.as_str()).collect();
        assert_eq!(kinds, vec!["struct", "trait", "impl", "const"]);
        assert_eq!(result.chunks[2].item_name, "Validate for Token");
        // imports attached to every chunk
        for chunk in &result.chunks {
            assert!(chunk.metadata[meta::IMPORTS].contains("use std::fmt;"));
        }
    }

    #[test]
    fn module_header_only_and_nested_items() {
        let source = r#"
mod inner {
    pub fn helper() -> u8 { 1 }
}
"#;
        let result = parse(source);
        assert!(result.success);
        assert_eq!(result.chunks.len(), 2);

        let module = &result.chunks[0];
        assert_eq!(module.item_type, "module");
        assert_eq!(module.item_name, "inner");
        assert!(!module.content.contains("helper"));

        let nested = &result.chunks[1];
        assert_eq!(nested.item_type, "function");
        assert_eq!(nested.item_name, "helper");
    }

    #[test]
    fn async_and_test_metadata() {
        let source = r#"
pub async fn fetch() {}

#[test]
fn checks() {}
"#;
        let result = parse(source);
        assert!(result.success);
        assert_eq!(result.chunks[0].metadata[meta::IS_ASYNC], "true");
        assert_eq!(result.chunks[1].metadata[meta::HAS_TESTS], "true");
    }

    #[test]
    fn invalid_utf8_is_a_parse_failure() {
        let result = RustParser.parse(
            Path::new("/repo/src/x.rs"),
            "src/x.rs",
            &[0xc3, 0x28],
            "acme-core",
        );
        assert!(!result.success);
        assert!(result.error.unwrap().contains("UTF-8"));
    }
}

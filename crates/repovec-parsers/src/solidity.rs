//! Solidity parser.
//!
//! Contracts, interfaces and libraries contribute a header chunk; their
//! members (functions, modifiers, events, structs, enums, errors, state
//! variables, constructors) become individual chunks so no source text is
//! embedded twice. Strictly AST-based: when the grammar reports syntax
//! errors the file fails as a whole.

use std::path::Path;

use tree_sitter::{Node, Parser};

use crate::chunk::{meta, Chunk};
use crate::{decode_source, ChunkParser, Language, ParseResult, ParserError};

pub struct SolidityParser;

impl ChunkParser for SolidityParser {
    fn language(&self) -> Language {
        Language::Solidity
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
        if let Err(err) = parser.set_language(&tree_sitter_solidity::LANGUAGE.into()) {
            return ParseResult::failed(total_lines, ParserError::grammar(Language::Solidity, err));
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

        let mut cursor = root.walk();
        let children: Vec<Node> = root.named_children(&mut cursor).collect();
        for node in children {
            match node.kind() {
                "contract_declaration" => {
                    extract_container(node, "contract", text, relative_path, repo_id, &imports, &mut chunks)
                }
                "interface_declaration" => {
                    extract_container(node, "interface", text, relative_path, repo_id, &imports, &mut chunks)
                }
                "library_declaration" => {
                    extract_container(node, "library", text, relative_path, repo_id, &imports, &mut chunks)
                }
                // Free-standing items outside any contract
                _ => {
                    if let Some(item_type) = member_item_type(node.kind()) {
                        chunks.push(member_chunk(
                            node,
                            item_type,
                            text,
                            relative_path,
                            repo_id,
                            &imports,
                        ));
                    }
                }
            }
        }

        ParseResult::ok(chunks, total_lines)
    }
}

fn node_text<'s>(node: Node<'_>, src: &'s str) -> &'s str {
    node.utf8_text(src.as_bytes()).unwrap_or("")
}

fn collect_imports(root: Node<'_>, src: &str) -> String {
    let mut cursor = root.walk();
    root.named_children(&mut cursor)
        .filter(|n| n.kind() == "import_directive")
        .map(|n| node_text(n, src).to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

/// A contract/interface/library: header chunk, then one chunk per member.
fn extract_container(
    node: Node<'_>,
    container_type: &str,
    src: &str,
    relative_path: &str,
    repo_id: &str,
    imports: &str,
    chunks: &mut Vec<Chunk>,
) {
    let name = declared_name(node, src)
        .unwrap_or_else(|| Chunk::anonymous_name(node.start_position().row + 1));

    let body = node.child_by_field_name("body").or_else(|| {
        let mut cursor = node.walk();
        let found = node.named_children(&mut cursor)
            .find(|n| n.kind() == "contract_body");
        found
    });

    let header_end = body.map(|b| b.start_byte()).unwrap_or(node.end_byte());
    let header = src[node.start_byte()..header_end].trim_end();
    let header_end_line = body
        .map(|b| b.start_position().row + 1)
        .unwrap_or(node.end_position().row + 1);

    let chunk = Chunk::new(
        Language::Solidity,
        container_type,
        name,
        header,
        relative_path,
        node.start_position().row + 1,
        header_end_line,
        repo_id,
    );
    chunks.push(attach_imports(chunk, imports));

    if let Some(body) = body {
        let mut cursor = body.walk();
        let members: Vec<Node> = body.named_children(&mut cursor).collect();
        for member in members {
            if let Some(item_type) = member_item_type(member.kind()) {
                chunks.push(member_chunk(
                    member,
                    item_type,
                    src,
                    relative_path,
                    repo_id,
                    imports,
                ));
            }
        }
    }
}

fn member_item_type(kind: &str) -> Option<&'static str> {
    match kind {
        "function_definition" => Some("function"),
        "modifier_definition" => Some("modifier"),
        "constructor_definition" => Some("constructor"),
        "event_definition" => Some("event"),
        "struct_declaration" => Some("struct"),
        "enum_declaration" => Some("enum"),
        "error_declaration" => Some("error"),
        "state_variable_declaration" => Some("state_variable"),
        _ => None,
    }
}

fn member_chunk(
    node: Node<'_>,
    item_type: &str,
    src: &str,
    relative_path: &str,
    repo_id: &str,
    imports: &str,
) -> Chunk {
    let start = node.start_position().row + 1;
    let name = if item_type == "constructor" {
        "constructor".to_string()
    } else {
        declared_name(node, src).unwrap_or_else(|| Chunk::anonymous_name(start))
    };

    let mut chunk = Chunk::new(
        Language::Solidity,
        item_type,
        name,
        node_text(node, src),
        relative_path,
        start,
        node.end_position().row + 1,
        repo_id,
    );

    if let Some(visibility) = child_of_kind(node, "visibility", src) {
        chunk = chunk.with_meta(meta::VISIBILITY, visibility);
    }
    if let Some(mutability) = child_of_kind(node, "state_mutability", src) {
        chunk = chunk.with_meta(meta::STATE_MUTABILITY, mutability);
    }

    attach_imports(chunk, imports)
}

/// Declared name: the `name` field when present, else the first identifier
/// child (grammar versions differ on which items carry the field).
fn declared_name(node: Node<'_>, src: &str) -> Option<String> {
    if let Some(name) = node.child_by_field_name("name") {
        return Some(node_text(name, src).to_string());
    }
    let mut cursor = node.walk();
    let found = node.named_children(&mut cursor)
        .find(|n| n.kind() == "identifier")
        .map(|n| node_text(n, src).to_string());
    found
}

fn child_of_kind(node: Node<'_>, kind: &str, src: &str) -> Option<String> {
    let mut cursor = node.walk();
    let found = node.named_children(&mut cursor)
        .find(|n| n.kind() == kind)
        .map(|n| node_text(n, src).to_string());
    found
}

fn attach_imports(chunk: Chunk, imports: &str) -> Chunk {
    if imports.is_empty() {
        chunk
    } else {
        chunk.with_meta(meta::IMPORTS, imports)
    }
}

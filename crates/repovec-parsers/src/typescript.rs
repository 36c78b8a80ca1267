//! TypeScript-family parser: `.ts`, `.tsx`, `.js`, `.jsx`.
//!
//! Declared and arrow functions, classes, interfaces, type aliases and
//! top-level constants become chunks. A chunk is a "component" when its name
//! starts uppercase and its body references JSX elements or hook-style
//! identifiers (`useX`). The grammar is chosen per extension: TSX for
//! `.tsx`, TypeScript for `.ts`, JavaScript (which accepts JSX) otherwise.

use std::path::Path;

use tree_sitter::{Node, Parser};

use crate::chunk::{meta, Chunk};
use crate::{decode_source, ChunkParser, Language, ParseResult, ParserError};

pub struct TypeScriptParser;

impl ChunkParser for TypeScriptParser {
    fn language(&self) -> Language {
        Language::TypeScript
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

        let extension = Path::new(relative_path)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        let grammar = match extension.as_str() {
            "tsx" => tree_sitter_typescript::LANGUAGE_TSX.into(),
            "ts" => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            _ => tree_sitter_javascript::LANGUAGE.into(),
        };
        let is_typescript = matches!(extension.as_str(), "ts" | "tsx");

        let mut parser = Parser::new();
        if let Err(err) = parser.set_language(&grammar) {
            return ParseResult::failed(
                total_lines,
                ParserError::grammar(Language::TypeScript, err),
            );
        }
        let Some(tree) = parser.parse(text, None) else {
            return ParseResult::failed(total_lines, ParserError::tree_unbuildable(file_path));
        };
        let root = tree.root_node();
        if root.has_error() {
            return ParseResult::failed(total_lines, ParserError::syntax(file_path));
        }

        let imports = collect_imports(root, text);
        let mut extractor = Extractor {
            src: text,
            relative_path,
            repo_id,
            imports: &imports,
            is_typescript,
            chunks: Vec::new(),
        };
        let mut cursor = root.walk();
        for child in root.named_children(&mut cursor) {
            extractor.visit(child, false);
        }

        ParseResult::ok(extractor.chunks, total_lines)
    }
}

fn node_text<'s>(node: Node<'_>, src: &'s str) -> &'s str {
    node.utf8_text(src.as_bytes()).unwrap_or("")
}

fn collect_imports(root: Node<'_>, src: &str) -> String {
    let mut cursor = root.walk();
    root.named_children(&mut cursor)
        .filter(|n| n.kind() == "import_statement")
        .map(|n| node_text(n, src).to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

struct Extractor<'a> {
    src: &'a str,
    relative_path: &'a str,
    repo_id: &'a str,
    imports: &'a str,
    is_typescript: bool,
    chunks: Vec<Chunk>,
}

impl Extractor<'_> {
    fn visit(&mut self, node: Node<'_>, exported: bool) {
        match node.kind() {
            "export_statement" => {
                if let Some(decl) = node.child_by_field_name("declaration") {
                    self.visit(decl, true);
                } else if let Some(value) = node.child_by_field_name("value") {
                    // `export default <expr>`
                    self.push(node, value_item_type(value), None, true, value);
                }
            }
            "function_declaration" | "generator_function_declaration" => {
                self.push(node, "function", field_name(node, self.src), exported, node);
            }
            "class_declaration" => {
                self.push(node, "class", field_name(node, self.src), exported, node);
            }
            "interface_declaration" => {
                self.push(node, "interface", field_name(node, self.src), exported, node);
            }
            "type_alias_declaration" => {
                self.push(node, "type_alias", field_name(node, self.src), exported, node);
            }
            "lexical_declaration" | "variable_declaration" => {
                let mut cursor = node.walk();
                let declarators: Vec<Node> = node
                    .named_children(&mut cursor)
                    .filter(|n| n.kind() == "variable_declarator")
                    .collect();
                for declarator in declarators {
                    let name = declarator
                        .child_by_field_name("name")
                        .map(|n| node_text(n, self.src).to_string());
                    let value = declarator.child_by_field_name("value");
                    let item_type = match value.map(|v| v.kind()) {
                        Some("arrow_function") => "arrow_function",
                        Some("function_expression") | Some("function") => "function",
                        _ => "constant",
                    };
                    // Chunk the whole declaration so `const f = ...` reads naturally.
                    self.push(node, item_type, name, exported, value.unwrap_or(node));
                }
            }
            _ => {}
        }
    }

    /// Emit one chunk. `body` is the node scanned for JSX/hook usage, which
    /// may be narrower than the chunked `node`.
    fn push(
        &mut self,
        node: Node<'_>,
        item_type: &str,
        name: Option<String>,
        exported: bool,
        body: Node<'_>,
    ) {
        let start_line = node.start_position().row + 1;
        let name = name.unwrap_or_else(|| Chunk::anonymous_name(start_line));

        let component = matches!(item_type, "function" | "arrow_function" | "class")
            && name.chars().next().is_some_and(|c| c.is_uppercase())
            && (subtree_has_jsx(body) || uses_hooks(node_text(body, self.src)));
        let item_type = if component { "component" } else { item_type };

        let mut chunk = Chunk::new(
            Language::TypeScript,
            item_type,
            name,
            node_text(node, self.src),
            self.relative_path,
            start_line,
            node.end_position().row + 1,
            self.repo_id,
        )
        .with_meta(meta::IS_TYPESCRIPT, bool_str(self.is_typescript))
        .with_meta(meta::IS_COMPONENT, bool_str(component))
        .with_meta(meta::IS_EXPORTED, bool_str(exported));

        if !self.imports.is_empty() {
            chunk = chunk.with_meta(meta::IMPORTS, self.imports);
        }
        self.chunks.push(chunk);
    }
}

fn field_name(node: Node<'_>, src: &str) -> Option<String> {
    node.child_by_field_name("name")
        .map(|n| node_text(n, src).to_string())
}

fn value_item_type(value: Node<'_>) -> &'static str {
    match value.kind() {
        "arrow_function" => "arrow_function",
        "function_expression" | "function" => "function",
        "class" => "class",
        _ => "constant",
    }
}

/// Does the subtree contain JSX syntax nodes?
fn subtree_has_jsx(node: Node<'_>) -> bool {
    let mut stack = vec![node];
    while let Some(current) = stack.pop() {
        match current.kind() {
            "jsx_element" | "jsx_self_closing_element" | "jsx_fragment" => return true,
            _ => {}
        }
        let mut cursor = current.walk();
        for child in current.named_children(&mut cursor) {
            stack.push(child);
        }
    }
    false
}

/// Word-boundary scan for hook-style identifiers: `use` + uppercase.
fn uses_hooks(text: &str) -> bool {
    let mut word = String::new();
    for c in text.chars().chain(std::iter::once(' ')) {
        if c.is_alphanumeric() || c == '_' {
            word.push(c);
        } else {
            if word.len() > 3
                && word.starts_with("use")
                && word[3..].chars().next().is_some_and(|c| c.is_uppercase())
            {
                return true;
            }
            word.clear();
        }
    }
    false
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

    fn parse_as(path: &str, source: &str) -> ParseResult {
        let abs = Path::new("/repo").join(path);
        TypeScriptParser.parse(&abs, path, source.as_bytes(), "acme-web")
    }

    #[test]
    fn declared_and_arrow_functions() {
        let source = r#"
function add(a: number, b: number): number { return a + b; }
const double = (x: number) => x * 2;
const LIMIT = 10;
"#;
        let result = parse_as("src/math.ts", source);
        assert!(result.success);

        let kinds: Vec<&str> = result.chunks.iter().map(|c| c.item_type.as_str()).collect();
        assert_eq!(kinds, vec!["function", "arrow_function", "constant"]);
        assert_eq!(result.chunks[0].item_name, "add");
        assert_eq!(result.chunks[1].item_name, "double");
        assert_eq!(result.chunks[0].metadata[meta::IS_TYPESCRIPT], "true");
    }

    #[test]
    fn interfaces_and_type_aliases_are_chunked() {
        let source = r#"
export interface Session { token: string; }
export type UserId = string;
"#;
        let result = parse_as("src/types.ts", source);
        assert!(result.success);
        assert_eq!(result.chunks.len(), 2);
        assert_eq!(result.chunks[0].item_type, "interface");
        assert_eq!(result.chunks[0].metadata[meta::IS_EXPORTED], "true");
        assert_eq!(result.chunks[1].item_type, "type_alias");
    }

    #[test]
    fn component_requires_uppercase_and_jsx() {
        let source = r#"
export function LoginForm() {
  return <form className="login" />;
}

function helper() {
  return 1;
}
"#;
        let result = parse_as("src/Login.tsx", source);
        assert!(result.success);
        assert_eq!(result.chunks[0].item_type, "component");
        assert_eq!(result.chunks[0].metadata[meta::IS_COMPONENT], "true");
        assert_eq!(result.chunks[1].item_type, "function");
        assert_eq!(result.chunks[1].metadata[meta::IS_COMPONENT], "false");
    }

    #[test]
    fn hook_usage_marks_component_without_jsx() {
        let source = r#"
const Counter = () => {
  const [n, setN] = useState(0);
  return n;
};
"#;
        let result = parse_as("src/Counter.tsx", source);
        assert!(result.success);
        assert_eq!(result.chunks[0].item_type, "component");
    }

    #[test]
    fn plain_javascript_is_flagged() {
        let result = parse_as("lib/util.js", "function f() { return 1; }");
        assert!(result.success);
        assert_eq!(result.chunks[0].metadata[meta::IS_TYPESCRIPT], "false");
    }

    #[test]
    fn imports_attached_to_chunks() {
        let source = r#"
import { api } from "./api";

export function call() { return api(); }
"#;
        let result = parse_as("src/call.ts", source);
        assert!(result.success);
        assert!(result.chunks[0].metadata[meta::IMPORTS].contains("./api"));
    }

    #[test]
    fn lowercase_hook_user_is_not_a_component() {
        let source = r#"
const useCounter = () => {
  const [n, setN] = useState(0);
  return n;
};
"#;
        let result = parse_as("src/useCounter.ts", source);
        assert!(result.success);
        assert_eq!(result.chunks[0].item_type, "arrow_function");
    }

    #[test]
    fn empty_file_is_fine() {
        let result = parse_as("src/empty.ts", "");
        assert!(result.success);
        assert!(result.chunks.is_empty());
    }
}

//! Parser registry.
//!
//! Maps language tags to parser instances, built once at startup.
//! Extension = implement [`ChunkParser`] and register.

use std::collections::HashMap;
use std::sync::Arc;

use crate::{
    ChunkParser, HclParser, Language, MarkdownParser, RustParser, SolidityParser,
    TypeScriptParser, YamlParser,
};

/// Registry of chunk parsers, one per language.
pub struct ParserRegistry {
    parsers: HashMap<Language, Arc<dyn ChunkParser>>,
}

impl ParserRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self {
            parsers: HashMap::new(),
        }
    }

    /// Registry with every built-in parser.
    pub fn with_default_parsers() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(RustParser));
        registry.register(Arc::new(TypeScriptParser));
        registry.register(Arc::new(SolidityParser));
        registry.register(Arc::new(MarkdownParser));
        registry.register(Arc::new(YamlParser));
        registry.register(Arc::new(HclParser));
        registry
    }

    /// Register (or replace) the parser for its language.
    pub fn register(&mut self, parser: Arc<dyn ChunkParser>) {
        self.parsers.insert(parser.language(), parser);
    }

    /// Look up the parser for a language.
    pub fn get(&self, language: Language) -> Option<Arc<dyn ChunkParser>> {
        self.parsers.get(&language).cloned()
    }

    /// Languages with a registered parser.
    pub fn languages(&self) -> Vec<Language> {
        let mut languages: Vec<Language> = self.parsers.keys().copied().collect();
        languages.sort();
        languages
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::with_default_parsers()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_covers_all_languages() {
        let registry = ParserRegistry::with_default_parsers();
        for language in Language::ALL {
            assert!(registry.get(language).is_some(), "missing {}", language);
        }
    }

    #[test]
    fn empty_registry_has_nothing() {
        let registry = ParserRegistry::new();
        assert!(registry.get(Language::Rust).is_none());
        assert!(registry.languages().is_empty());
    }

    #[test]
    fn registration_replaces() {
        let mut registry = ParserRegistry::new();
        registry.register(Arc::new(RustParser));
        registry.register(Arc::new(RustParser));
        assert_eq!(registry.languages(), vec![Language::Rust]);
    }
}

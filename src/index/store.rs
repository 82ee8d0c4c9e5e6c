// Outbound persistence interface

use dashmap::DashMap;

use crate::error::Result;
use crate::index::{Pattern, Relationship, Symbol};

/// Receives extraction output once a file's pipeline has completed.
///
/// Implementations own name resolution for `Relationship::to_name`; the parsing
/// core only hands over unresolved names.
pub trait SymbolStore: Send + Sync {
    fn store_symbols(&self, file_path: &str, symbols: &[Symbol]) -> Result<usize>;
    fn store_relationships(&self, file_path: &str, relationships: &[Relationship]) -> Result<usize>;
    fn store_patterns(&self, file_path: &str, patterns: &[Pattern]) -> Result<usize>;
}

#[derive(Debug, Default, Clone)]
struct FileRecord {
    symbols: Vec<Symbol>,
    relationships: Vec<Relationship>,
    patterns: Vec<Pattern>,
}

/// In-memory store keyed by file. Re-storing a file replaces its previous records.
#[derive(Debug, Default)]
pub struct MemoryStore {
    files: DashMap<String, FileRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn symbol_count(&self) -> usize {
        self.files.iter().map(|f| f.symbols.len()).sum()
    }

    pub fn relationship_count(&self) -> usize {
        self.files.iter().map(|f| f.relationships.len()).sum()
    }

    pub fn pattern_count(&self) -> usize {
        self.files.iter().map(|f| f.patterns.len()).sum()
    }

    pub fn symbols_for(&self, file_path: &str) -> Vec<Symbol> {
        self.files
            .get(file_path)
            .map(|f| f.symbols.clone())
            .unwrap_or_default()
    }

    pub fn relationships_for(&self, file_path: &str) -> Vec<Relationship> {
        self.files
            .get(file_path)
            .map(|f| f.relationships.clone())
            .unwrap_or_default()
    }

    /// Resolve a relationship target against every stored symbol, qualified name first.
    pub fn resolve(&self, name: &str) -> Vec<Symbol> {
        let mut exact = Vec::new();
        let mut by_name = Vec::new();
        for file in self.files.iter() {
            for symbol in &file.symbols {
                if symbol.qualified_name == name {
                    exact.push(symbol.clone());
                } else if symbol.name == name {
                    by_name.push(symbol.clone());
                }
            }
        }
        if exact.is_empty() {
            by_name
        } else {
            exact
        }
    }
}

impl SymbolStore for MemoryStore {
    fn store_symbols(&self, file_path: &str, symbols: &[Symbol]) -> Result<usize> {
        self.files.entry(file_path.to_string()).or_default().symbols = symbols.to_vec();
        Ok(symbols.len())
    }

    fn store_relationships(&self, file_path: &str, relationships: &[Relationship]) -> Result<usize> {
        self.files.entry(file_path.to_string()).or_default().relationships =
            relationships.to_vec();
        Ok(relationships.len())
    }

    fn store_patterns(&self, file_path: &str, patterns: &[Pattern]) -> Result<usize> {
        self.files.entry(file_path.to_string()).or_default().patterns = patterns.to_vec();
        Ok(patterns.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{Language, Location, SymbolKind};

    fn symbol(name: &str, qualified: &str, file: &str) -> Symbol {
        Symbol::new(
            name,
            qualified,
            SymbolKind::Function,
            Language::Rust,
            Location::at_line(file, 1, 1),
        )
    }

    #[test]
    fn test_store_replaces_per_file() {
        let store = MemoryStore::new();
        store
            .store_symbols("a.rs", &[symbol("f", "a::f", "a.rs"), symbol("g", "a::g", "a.rs")])
            .unwrap();
        store.store_symbols("b.rs", &[symbol("h", "b::h", "b.rs")]).unwrap();
        assert_eq!(store.symbol_count(), 3);

        store.store_symbols("a.rs", &[symbol("f", "a::f", "a.rs")]).unwrap();
        assert_eq!(store.symbol_count(), 2);
        assert_eq!(store.file_count(), 2);
    }

    #[test]
    fn test_resolve_prefers_qualified_match() {
        let store = MemoryStore::new();
        store
            .store_symbols("a.rs", &[symbol("run", "a::run", "a.rs")])
            .unwrap();
        store
            .store_symbols("b.rs", &[symbol("run", "b::run", "b.rs")])
            .unwrap();

        assert_eq!(store.resolve("b::run").len(), 1);
        assert_eq!(store.resolve("run").len(), 2);
        assert!(store.resolve("missing").is_empty());
    }
}

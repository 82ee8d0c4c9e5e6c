// Rust extraction

use tree_sitter::Node;

use super::{body_complexity, split_scoped, strip_type_args};
use crate::index::{
    Language, LanguageFeatures, Relationship, RelationshipKind, RustFeatures, SymbolKind,
    Visibility,
};
use crate::indexer::visitor::{
    child_of_kind, signature_before, Extracted, HandlerKind, LanguageHandler, ScopeFrame,
    ScopeKind, TraversalContext,
};

pub struct RustHandler;

const HANDLERS: &[(&str, HandlerKind)] = &[
    ("mod_item", HandlerKind::Namespace),
    ("struct_item", HandlerKind::ClassLike),
    ("enum_item", HandlerKind::ClassLike),
    ("union_item", HandlerKind::ClassLike),
    ("trait_item", HandlerKind::ClassLike),
    ("type_item", HandlerKind::ClassLike),
    ("function_item", HandlerKind::FunctionLike),
    ("function_signature_item", HandlerKind::FunctionLike),
    ("const_item", HandlerKind::VariableLike),
    ("static_item", HandlerKind::VariableLike),
    ("field_declaration", HandlerKind::VariableLike),
    ("use_declaration", HandlerKind::Import),
    ("impl_item", HandlerKind::Inheritance),
    ("call_expression", HandlerKind::Call),
    ("struct_expression", HandlerKind::Creation),
];

fn visibility_of(ctx: &TraversalContext, node: Node) -> Visibility {
    match child_of_kind(node, "visibility_modifier").map(|v| ctx.text(v)) {
        Some("pub") => Visibility::Public,
        Some(_) => Visibility::Internal,
        None => Visibility::Private,
    }
}

/// `#[...]` items directly above `node`.
fn attributes(ctx: &TraversalContext, node: Node) -> Vec<String> {
    let mut found = Vec::new();
    let mut current = node.prev_sibling();
    while let Some(sibling) = current {
        match sibling.kind() {
            "attribute_item" => found.push(ctx.text(sibling).to_string()),
            "line_comment" | "block_comment" => {}
            _ => break,
        }
        current = sibling.prev_sibling();
    }
    found.reverse();
    found
}

fn derives(attributes: &[String]) -> Vec<String> {
    attributes
        .iter()
        .filter_map(|a| {
            let inner = a.trim_start_matches("#[").trim_end_matches(']').trim();
            inner.strip_prefix("derive(")?.strip_suffix(')').map(str::to_string)
        })
        .flat_map(|list| {
            list.split(',')
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty())
                .collect::<Vec<_>>()
        })
        .collect()
}

fn generics(ctx: &TraversalContext, node: Node) -> Vec<String> {
    let Some(params) = node.child_by_field_name("type_parameters") else {
        return Vec::new();
    };
    let mut cursor = params.walk();
    params
        .named_children(&mut cursor)
        .map(|p| ctx.text(p).to_string())
        .collect()
}

/// Bare type name an impl block attaches to: `impl<T> a::Cache<T>` gives `Cache`.
fn impl_target(ctx: &TraversalContext, impl_node: Node) -> Option<String> {
    let ty = ctx.field_text(impl_node, "type")?;
    let bare = strip_type_args(ty.trim_start_matches('&'));
    let name = split_scoped(&bare, "::").1.to_string();
    (!name.is_empty()).then_some(name)
}

fn enclosing_impl(node: Node) -> Option<Node> {
    let list = node.parent().filter(|p| p.kind() == "declaration_list")?;
    list.parent().filter(|p| p.kind() == "impl_item")
}

fn import_path(argument: &str) -> String {
    let path = argument.split(" as ").next().unwrap_or(argument).trim();
    match path.find("::{") {
        Some(idx) => path[..idx].to_string(),
        None => path.to_string(),
    }
}

impl LanguageHandler for RustHandler {
    fn language(&self) -> Language {
        Language::Rust
    }

    fn node_handlers(&self) -> &'static [(&'static str, HandlerKind)] {
        HANDLERS
    }

    fn scope_for(&self, node: Node, ctx: &TraversalContext) -> Option<ScopeFrame> {
        match node.kind() {
            "mod_item" => Some(ScopeFrame::named(ScopeKind::Namespace, ctx.field_text(node, "name")?)),
            "struct_item" | "enum_item" | "union_item" | "trait_item" => {
                Some(ScopeFrame::named(ScopeKind::Class, ctx.field_text(node, "name")?))
            }
            "impl_item" => Some(ScopeFrame::named(ScopeKind::Class, impl_target(ctx, node)?)),
            "function_item" => Some(ScopeFrame::named(ScopeKind::Function, ctx.field_text(node, "name")?)),
            "closure_expression" => Some(ScopeFrame::anonymous(ScopeKind::Function)),
            _ => None,
        }
    }

    fn handle_namespace(&self, node: Node, ctx: &mut TraversalContext) -> Extracted {
        let Some(name) = ctx.field_text(node, "name") else {
            return Extracted::Nothing;
        };
        let mut symbol = ctx.symbol(name, SymbolKind::Module, node);
        symbol.visibility = visibility_of(ctx, node);
        symbol.is_exported = symbol.visibility == Visibility::Public;
        symbol.is_definition = node.child_by_field_name("body").is_some();
        symbol.into()
    }

    fn handle_class(&self, node: Node, ctx: &mut TraversalContext) -> Extracted {
        let Some(name) = ctx.field_text(node, "name") else {
            return Extracted::Nothing;
        };
        let kind = match node.kind() {
            "enum_item" => SymbolKind::Enum,
            "trait_item" => SymbolKind::Interface,
            "type_item" => SymbolKind::Typedef,
            _ => SymbolKind::Struct,
        };
        let body = node.child_by_field_name("body");
        let attributes = attributes(ctx, node);
        let mut symbol = ctx.symbol(name, kind, node);
        symbol.visibility = visibility_of(ctx, node);
        symbol.is_exported = symbol.visibility == Visibility::Public;
        symbol.signature = Some(signature_before(ctx, node, body));
        symbol.language_features = Some(LanguageFeatures::Rust(RustFeatures {
            derives: derives(&attributes),
            attributes,
            generics: generics(ctx, node),
            is_unsafe: child_of_kind(node, "unsafe").is_some(),
            ..RustFeatures::default()
        }));
        if kind == SymbolKind::Typedef {
            symbol.return_type = ctx.field_text(node, "type").map(str::to_string);
        }
        symbol.into()
    }

    fn handle_function(&self, node: Node, ctx: &mut TraversalContext) -> Extracted {
        let Some(name) = ctx.field_text(node, "name") else {
            return Extracted::Nothing;
        };
        if ctx.in_function_body() {
            return Extracted::Nothing;
        }
        let kind = if ctx.in_class_body() {
            SymbolKind::Method
        } else {
            SymbolKind::Function
        };

        let body = node.child_by_field_name("body");
        let modifiers = child_of_kind(node, "function_modifiers")
            .map(|m| ctx.text(m))
            .unwrap_or_default();
        let trait_impl = enclosing_impl(node)
            .and_then(|imp| ctx.field_text(imp, "trait"))
            .map(strip_type_args);
        let in_trait = node
            .parent()
            .and_then(|p| p.parent())
            .map(|p| p.kind() == "trait_item")
            .unwrap_or(false);

        let attributes = attributes(ctx, node);
        let mut symbol = ctx.symbol(name, kind, node);
        symbol.visibility = if trait_impl.is_some() || in_trait {
            Visibility::Public
        } else {
            visibility_of(ctx, node)
        };
        symbol.is_exported = symbol.visibility == Visibility::Public;
        symbol.is_definition = body.is_some();
        symbol.is_async = modifiers.contains("async");
        symbol.signature = Some(signature_before(ctx, node, body));
        symbol.return_type = ctx.field_text(node, "return_type").map(str::to_string);
        symbol.complexity = body_complexity(ctx, body);
        symbol.language_features = Some(LanguageFeatures::Rust(RustFeatures {
            derives: Vec::new(),
            attributes,
            generics: generics(ctx, node),
            trait_impl,
            is_unsafe: modifiers.contains("unsafe"),
            is_const: modifiers.contains("const"),
        }));
        symbol.into()
    }

    fn handle_variable(&self, node: Node, ctx: &mut TraversalContext) -> Extracted {
        if ctx.in_function_body() {
            return Extracted::Nothing;
        }
        let Some(name) = ctx.field_text(node, "name") else {
            return Extracted::Nothing;
        };
        let kind = match node.kind() {
            "const_item" => SymbolKind::Constant,
            "field_declaration" => SymbolKind::Field,
            _ if child_of_kind(node, "mutable_specifier").is_some() => SymbolKind::Variable,
            _ => SymbolKind::Constant,
        };
        let mut symbol = ctx.symbol(name, kind, node);
        symbol.visibility = visibility_of(ctx, node);
        symbol.is_exported = symbol.visibility == Visibility::Public;
        symbol.return_type = ctx.field_text(node, "type").map(str::to_string);
        symbol.into()
    }

    fn handle_import(&self, node: Node, ctx: &mut TraversalContext) -> Extracted {
        let Some(argument) = ctx.field_text(node, "argument") else {
            return Extracted::Nothing;
        };
        let path = import_path(argument);
        let line = ctx.location(node).line;
        let mut symbol = ctx.symbol(&path, SymbolKind::Import, node);
        symbol.qualified_name = path.clone();
        symbol.visibility = visibility_of(ctx, node);
        symbol.signature = Some(ctx.text(node).to_string());

        let mut out = Extracted::from(symbol);
        out.push_relationship(Relationship::new(ctx.current_owner(), path, RelationshipKind::Imports, line));
        out
    }

    fn handle_inheritance(&self, node: Node, ctx: &mut TraversalContext) -> Extracted {
        let (Some(target), Some(tr)) = (impl_target(ctx, node), ctx.field_text(node, "trait")) else {
            return Extracted::Nothing;
        };
        let line = ctx.location(node).line;
        Relationship::new(ctx.qualify(&target), strip_type_args(tr), RelationshipKind::Implements, line).into()
    }

    fn handle_call(&self, node: Node, ctx: &mut TraversalContext) -> Extracted {
        let Some(mut function) = node.child_by_field_name("function") else {
            return Extracted::Nothing;
        };
        if function.kind() == "generic_function" {
            match function.child_by_field_name("function") {
                Some(inner) => function = inner,
                None => return Extracted::Nothing,
            }
        }
        let callee = match function.kind() {
            "identifier" | "scoped_identifier" => ctx.text(function),
            "field_expression" => ctx.field_text(function, "field").unwrap_or_default(),
            _ => return Extracted::Nothing,
        };
        if callee.is_empty() {
            return Extracted::Nothing;
        }
        let line = ctx.location(node).line;
        Relationship::new(ctx.current_owner(), callee, RelationshipKind::Calls, line).into()
    }

    fn handle_creation(&self, node: Node, ctx: &mut TraversalContext) -> Extracted {
        let Some(name) = ctx.field_text(node, "name") else {
            return Extracted::Nothing;
        };
        let ty = strip_type_args(name);
        if ty == "Self" {
            return Extracted::Nothing;
        }
        let line = ctx.location(node).line;
        Relationship::new(ctx.current_owner(), ty, RelationshipKind::Creates, line).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::Symbol;
    use crate::indexer::syntax::{SyntaxProvider, TreeSitterProvider};
    use crate::indexer::visitor::{traverse, TraversalOutput};

    const SOURCE: &str = r#"
use std::collections::HashMap;
use crate::model::{Point, Shape};

pub const MAX_SIZE: usize = 64;
static mut COUNTER: u32 = 0;

#[derive(Debug, Clone)]
pub struct Cache<K, V> {
    entries: HashMap<K, V>,
    pub capacity: usize,
}

pub trait Store {
    fn get(&self, key: &str) -> Option<String>;
}

impl<K, V> Cache<K, V> {
    pub fn new(capacity: usize) -> Self {
        Cache { entries: HashMap::new(), capacity }
    }

    pub async fn load(&mut self) -> bool {
        if self.capacity > 0 && self.entries.is_empty() {
            return true;
        }
        false
    }
}

impl<K, V> Store for Cache<K, V> {
    fn get(&self, key: &str) -> Option<String> {
        helper(key)
    }
}

mod geo {
    pub enum Kind { Circle, Square }
    pub(crate) fn area() -> f64 { 0.0 }
}

fn helper(key: &str) -> Option<String> {
    let local = 1;
    None
}
"#;

    fn extract() -> TraversalOutput {
        let tree = TreeSitterProvider::new(Language::Rust).parse(SOURCE).unwrap();
        traverse(&RustHandler, &tree, "src/cache.rs", SOURCE)
    }

    fn find<'a>(output: &'a TraversalOutput, qualified: &str) -> &'a Symbol {
        output
            .symbols
            .iter()
            .find(|s| s.qualified_name == qualified)
            .unwrap_or_else(|| panic!("missing {}", qualified))
    }

    fn features(symbol: &Symbol) -> &RustFeatures {
        match &symbol.language_features {
            Some(LanguageFeatures::Rust(f)) => f,
            other => panic!("unexpected features {:?}", other),
        }
    }

    #[test]
    fn test_items() {
        let output = extract();
        let cache = find(&output, "Cache");
        assert_eq!(cache.kind, SymbolKind::Struct);
        assert!(cache.is_exported);
        assert_eq!(features(cache).derives, vec!["Debug".to_string(), "Clone".to_string()]);
        assert_eq!(features(cache).generics.len(), 2);

        assert_eq!(find(&output, "Cache::entries").visibility, Visibility::Private);
        assert_eq!(find(&output, "Cache::capacity").visibility, Visibility::Public);
        assert_eq!(find(&output, "Store").kind, SymbolKind::Interface);
        assert!(!find(&output, "Store::get").is_definition);
        assert_eq!(find(&output, "MAX_SIZE").kind, SymbolKind::Constant);
        assert_eq!(find(&output, "COUNTER").kind, SymbolKind::Variable);
        assert_eq!(find(&output, "geo").kind, SymbolKind::Module);
        assert_eq!(find(&output, "geo::Kind").kind, SymbolKind::Enum);
        assert_eq!(find(&output, "geo::area").visibility, Visibility::Internal);
        assert_eq!(find(&output, "helper").visibility, Visibility::Private);
        assert!(output.symbols.iter().all(|s| s.name != "local"));
    }

    #[test]
    fn test_impl_methods() {
        let output = extract();
        let new = find(&output, "Cache::new");
        assert_eq!(new.kind, SymbolKind::Method);
        assert_eq!(new.return_type.as_deref(), Some("Self"));

        let load = find(&output, "Cache::load");
        assert!(load.is_async);
        assert_eq!(load.complexity, 3);

        let get = find(&output, "Cache::get");
        assert_eq!(features(get).trait_impl.as_deref(), Some("Store"));
        assert!(get.is_exported);
    }

    #[test]
    fn test_relationships() {
        let output = extract();
        let has = |from: &str, to: &str, kind: RelationshipKind| {
            output
                .relationships
                .iter()
                .any(|r| r.from_name == from && r.to_name == to && r.kind == kind)
        };
        assert!(has("Cache", "Store", RelationshipKind::Implements));
        assert!(has("src/cache.rs", "std::collections::HashMap", RelationshipKind::Imports));
        assert!(has("src/cache.rs", "crate::model", RelationshipKind::Imports));
        assert!(has("Cache::get", "helper", RelationshipKind::Calls));
        assert!(has("Cache::new", "HashMap::new", RelationshipKind::Calls));
        assert!(has("Cache::new", "Cache", RelationshipKind::Creates));
    }

    proptest::proptest! {
        #[test]
        fn prop_nested_modules_qualify_in_order(path in proptest::collection::vec("n_[a-z]{1,6}", 1..6)) {
            let mut source = String::new();
            for name in &path {
                source.push_str(&format!("mod {} {{\n", name));
            }
            source.push_str("pub fn leaf() {}\n");
            source.push_str(&"}\n".repeat(path.len()));

            let tree = TreeSitterProvider::new(Language::Rust).parse(&source).unwrap();
            let output = traverse(&RustHandler, &tree, "src/nested.rs", &source);
            let expected = format!("{}::leaf", path.join("::"));
            proptest::prop_assert!(output.symbols.iter().any(|s| s.qualified_name == expected));
        }
    }

    #[test]
    fn test_import_path() {
        assert_eq!(import_path("std::io::{self, Read}"), "std::io");
        assert_eq!(import_path("anyhow::Result as AnyResult"), "anyhow::Result");
    }
}

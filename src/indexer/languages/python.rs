// Python extraction

use tree_sitter::Node;

use super::{body_complexity, is_upper_snake, strip_type_args};
use crate::index::{
    Language, LanguageFeatures, PythonFeatures, Relationship, RelationshipKind, SymbolKind,
    Visibility,
};
use crate::indexer::visitor::{
    children_of_kind, signature_before, Extracted, HandlerKind, LanguageHandler, ScopeFrame,
    ScopeKind, TraversalContext,
};

pub struct PythonHandler;

const HANDLERS: &[(&str, HandlerKind)] = &[
    ("class_definition", HandlerKind::ClassLike),
    ("function_definition", HandlerKind::FunctionLike),
    ("assignment", HandlerKind::VariableLike),
    ("import_statement", HandlerKind::Import),
    ("import_from_statement", HandlerKind::Import),
    ("call", HandlerKind::Call),
];

const OPERATOR_DUNDERS: &[&str] = &[
    "__eq__", "__ne__", "__lt__", "__le__", "__gt__", "__ge__", "__add__", "__sub__", "__mul__",
    "__truediv__", "__floordiv__", "__mod__", "__pow__", "__and__", "__or__", "__xor__",
    "__neg__", "__pos__", "__invert__", "__getitem__", "__setitem__", "__delitem__",
    "__contains__", "__call__", "__matmul__", "__lshift__", "__rshift__",
];

fn is_dunder(name: &str) -> bool {
    name.len() > 4 && name.starts_with("__") && name.ends_with("__")
}

fn visibility_of(name: &str) -> Visibility {
    if is_dunder(name) {
        Visibility::Public
    } else if name.starts_with("__") {
        Visibility::Private
    } else if name.starts_with('_') {
        Visibility::Protected
    } else {
        Visibility::Public
    }
}

fn decorators(ctx: &TraversalContext, node: Node) -> Vec<String> {
    let Some(parent) = node.parent().filter(|p| p.kind() == "decorated_definition") else {
        return Vec::new();
    };
    children_of_kind(parent, "decorator")
        .into_iter()
        .map(|d| {
            let text = ctx.text(d).trim_start_matches('@').trim();
            text.split('(').next().unwrap_or(text).to_string()
        })
        .collect()
}

impl LanguageHandler for PythonHandler {
    fn language(&self) -> Language {
        Language::Python
    }

    fn node_handlers(&self) -> &'static [(&'static str, HandlerKind)] {
        HANDLERS
    }

    fn scope_for(&self, node: Node, ctx: &TraversalContext) -> Option<ScopeFrame> {
        let kind = match node.kind() {
            "class_definition" => ScopeKind::Class,
            "function_definition" => ScopeKind::Function,
            "lambda" => return Some(ScopeFrame::anonymous(ScopeKind::Function)),
            _ => return None,
        };
        Some(ScopeFrame::named(kind, ctx.field_text(node, "name")?))
    }

    fn handle_class(&self, node: Node, ctx: &mut TraversalContext) -> Extracted {
        let Some(name) = ctx.field_text(node, "name") else {
            return Extracted::Nothing;
        };
        let bases: Vec<String> = node
            .child_by_field_name("superclasses")
            .map(|args| {
                let mut cursor = args.walk();
                args.named_children(&mut cursor)
                    .filter(|a| matches!(a.kind(), "identifier" | "attribute" | "subscript"))
                    .map(|a| strip_type_args(ctx.text(a)))
                    .filter(|b| b != "object")
                    .collect()
            })
            .unwrap_or_default();

        let body = node.child_by_field_name("body");
        let line = ctx.location(node).line;
        let mut symbol = ctx.symbol(name, SymbolKind::Class, node);
        symbol.visibility = visibility_of(name);
        symbol.is_exported = symbol.visibility == Visibility::Public && !ctx.in_function_body();
        symbol.signature = Some(signature_before(ctx, node, body));
        symbol.language_features = Some(LanguageFeatures::Python(PythonFeatures {
            decorators: decorators(ctx, node),
            base_classes: bases.clone(),
            ..PythonFeatures::default()
        }));

        let qualified = symbol.qualified_name.clone();
        let mut out = Extracted::from(symbol);
        for base in bases {
            out.push_relationship(Relationship::new(qualified.clone(), base, RelationshipKind::Inherits, line));
        }
        out
    }

    fn handle_function(&self, node: Node, ctx: &mut TraversalContext) -> Extracted {
        let Some(name) = ctx.field_text(node, "name") else {
            return Extracted::Nothing;
        };
        if ctx.in_function_body() {
            return Extracted::Nothing;
        }

        let decorators = decorators(ctx, node);
        let kind = if !ctx.in_class_body() {
            SymbolKind::Function
        } else if name == "__init__" || name == "__new__" {
            SymbolKind::Constructor
        } else if name == "__del__" {
            SymbolKind::Destructor
        } else if OPERATOR_DUNDERS.contains(&name) {
            SymbolKind::Operator
        } else {
            SymbolKind::Method
        };

        let body = node.child_by_field_name("body");
        let mut symbol = ctx.symbol(name, kind, node);
        symbol.visibility = visibility_of(name);
        symbol.is_exported = symbol.visibility == Visibility::Public;
        symbol.signature = Some(signature_before(ctx, node, body));
        symbol.return_type = ctx.field_text(node, "return_type").map(str::to_string);
        symbol.complexity = body_complexity(ctx, body);
        symbol.is_async = ctx.text(node).trim_start().starts_with("async");
        symbol.language_features = Some(LanguageFeatures::Python(PythonFeatures {
            is_dunder: is_dunder(name),
            is_property: decorators.iter().any(|d| d == "property" || d.ends_with(".setter")),
            is_staticmethod: decorators.iter().any(|d| d == "staticmethod"),
            is_classmethod: decorators.iter().any(|d| d == "classmethod"),
            decorators,
            base_classes: Vec::new(),
        }));
        symbol.into()
    }

    fn handle_variable(&self, node: Node, ctx: &mut TraversalContext) -> Extracted {
        if ctx.in_function_body() {
            return Extracted::Nothing;
        }
        let Some(left) = node.child_by_field_name("left").filter(|l| l.kind() == "identifier") else {
            return Extracted::Nothing;
        };
        let name = ctx.text(left);
        let kind = if is_upper_snake(name) {
            SymbolKind::Constant
        } else if ctx.in_class_body() {
            SymbolKind::Field
        } else {
            SymbolKind::Variable
        };
        let mut symbol = ctx.symbol(name, kind, node);
        symbol.visibility = visibility_of(name);
        symbol.is_exported = symbol.visibility == Visibility::Public;
        symbol.return_type = ctx.field_text(node, "type").map(str::to_string);
        symbol.signature = Some(ctx.text(node).lines().next().unwrap_or_default().trim().to_string());
        symbol.into()
    }

    fn handle_import(&self, node: Node, ctx: &mut TraversalContext) -> Extracted {
        let modules: Vec<String> = if node.kind() == "import_from_statement" {
            ctx.field_text(node, "module_name").map(str::to_string).into_iter().collect()
        } else {
            let mut cursor = node.walk();
            node.children_by_field_name("name", &mut cursor)
                .map(|n| match n.kind() {
                    "aliased_import" => ctx.field_text(n, "name").unwrap_or_default().to_string(),
                    _ => ctx.text(n).to_string(),
                })
                .filter(|m| !m.is_empty())
                .collect()
        };

        let line = ctx.location(node).line;
        let owner = ctx.current_owner();
        let mut out = Extracted::Nothing;
        for module in modules {
            let mut symbol = ctx.symbol(&module, SymbolKind::Import, node);
            symbol.qualified_name = module.clone();
            symbol.signature = Some(ctx.text(node).trim().to_string());
            out.push_symbol(symbol);
            out.push_relationship(Relationship::new(owner.clone(), module, RelationshipKind::Imports, line));
        }
        out
    }

    fn handle_call(&self, node: Node, ctx: &mut TraversalContext) -> Extracted {
        let Some(function) = node.child_by_field_name("function") else {
            return Extracted::Nothing;
        };
        let callee = match function.kind() {
            "identifier" => ctx.text(function),
            "attribute" => ctx.field_text(function, "attribute").unwrap_or_default(),
            _ => return Extracted::Nothing,
        };
        if callee.is_empty() {
            return Extracted::Nothing;
        }
        // CapWords callees are constructor calls by convention.
        let kind = if function.kind() == "identifier" && callee.starts_with(|c: char| c.is_ascii_uppercase()) {
            RelationshipKind::Creates
        } else {
            RelationshipKind::Calls
        };
        let line = ctx.location(node).line;
        Relationship::new(ctx.current_owner(), callee, kind, line).into()
    }
}

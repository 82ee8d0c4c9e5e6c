// Go extraction

use tree_sitter::Node;

use super::{body_complexity, strip_type_args, unquote};
use crate::index::{
    GoFeatures, Language, LanguageFeatures, Relationship, RelationshipKind, SymbolKind, Visibility,
};
use crate::indexer::visitor::{
    child_of_kind, signature_before, Extracted, HandlerKind, LanguageHandler, ScopeFrame,
    ScopeKind, TraversalContext,
};

pub struct GoHandler;

const HANDLERS: &[(&str, HandlerKind)] = &[
    ("type_spec", HandlerKind::ClassLike),
    ("type_alias", HandlerKind::ClassLike),
    ("function_declaration", HandlerKind::FunctionLike),
    ("method_declaration", HandlerKind::FunctionLike),
    ("method_elem", HandlerKind::FunctionLike),
    ("method_spec", HandlerKind::FunctionLike),
    ("const_spec", HandlerKind::VariableLike),
    ("var_spec", HandlerKind::VariableLike),
    ("field_declaration", HandlerKind::VariableLike),
    ("import_spec", HandlerKind::Import),
    ("call_expression", HandlerKind::Call),
    ("composite_literal", HandlerKind::Creation),
];

/// Exported identifiers start with an upper-case letter.
fn visibility_of(name: &str) -> Visibility {
    if name.starts_with(|c: char| c.is_uppercase()) {
        Visibility::Public
    } else {
        Visibility::Private
    }
}

/// Receiver type of a method and whether it is taken by pointer.
fn receiver(ctx: &TraversalContext, node: Node) -> Option<(String, bool)> {
    let list = node.child_by_field_name("receiver")?;
    let mut cursor = list.walk();
    let param = list
        .named_children(&mut cursor)
        .find(|c| c.kind() == "parameter_declaration")?;
    let ty = ctx.field_text(param, "type")?.trim();
    let is_pointer = ty.starts_with('*');
    let name = strip_type_args(ty.trim_start_matches('*'));
    (!name.is_empty()).then_some((name, is_pointer))
}

fn type_parameters(ctx: &TraversalContext, node: Node) -> Vec<String> {
    let Some(params) = node.child_by_field_name("type_parameters") else {
        return Vec::new();
    };
    let mut cursor = params.walk();
    params
        .named_children(&mut cursor)
        .map(|p| ctx.text(p).to_string())
        .collect()
}

/// Anonymous struct fields: the embedded types.
fn embedded_types(ctx: &TraversalContext, struct_type: Node) -> Vec<String> {
    let Some(list) = child_of_kind(struct_type, "field_declaration_list") else {
        return Vec::new();
    };
    let mut cursor = list.walk();
    list.named_children(&mut cursor)
        .filter(|f| f.kind() == "field_declaration" && f.child_by_field_name("name").is_none())
        .filter_map(|f| ctx.field_text(f, "type"))
        .map(|t| strip_type_args(t.trim_start_matches('*')))
        .collect()
}

fn field_names<'a>(ctx: &TraversalContext<'a>, node: Node) -> Vec<&'a str> {
    let mut cursor = node.walk();
    node.children_by_field_name("name", &mut cursor)
        .map(|n| ctx.text(n))
        .collect()
}

impl LanguageHandler for GoHandler {
    fn language(&self) -> Language {
        Language::Go
    }

    fn node_handlers(&self) -> &'static [(&'static str, HandlerKind)] {
        HANDLERS
    }

    fn root_scope(&self, root: Node, ctx: &TraversalContext) -> Option<String> {
        let clause = child_of_kind(root, "package_clause")?;
        let name = child_of_kind(clause, "package_identifier")?;
        Some(ctx.text(name).to_string())
    }

    fn scope_for(&self, node: Node, ctx: &TraversalContext) -> Option<ScopeFrame> {
        match node.kind() {
            "type_spec" => Some(ScopeFrame::named(ScopeKind::Class, ctx.field_text(node, "name")?)),
            "function_declaration" => Some(ScopeFrame::named(ScopeKind::Function, ctx.field_text(node, "name")?)),
            "method_declaration" => {
                let name = ctx.field_text(node, "name")?;
                let frame = match receiver(ctx, node) {
                    Some((recv, _)) => format!("{}.{}", recv, name),
                    None => name.to_string(),
                };
                Some(ScopeFrame::named(ScopeKind::Function, frame))
            }
            "func_literal" => Some(ScopeFrame::anonymous(ScopeKind::Function)),
            _ => None,
        }
    }

    fn handle_class(&self, node: Node, ctx: &mut TraversalContext) -> Extracted {
        let Some(name) = ctx.field_text(node, "name") else {
            return Extracted::Nothing;
        };
        if ctx.in_function_body() {
            return Extracted::Nothing;
        }
        let ty = node.child_by_field_name("type");
        let kind = match (node.kind(), ty.map(|t| t.kind())) {
            ("type_alias", _) => SymbolKind::Typedef,
            (_, Some("struct_type")) => SymbolKind::Struct,
            (_, Some("interface_type")) => SymbolKind::Interface,
            _ => SymbolKind::Typedef,
        };
        let embedded = match ty {
            Some(t) if kind == SymbolKind::Struct => embedded_types(ctx, t),
            _ => Vec::new(),
        };

        let line = ctx.location(node).line;
        let mut symbol = ctx.symbol(name, kind, node);
        symbol.visibility = visibility_of(name);
        symbol.is_exported = symbol.visibility == Visibility::Public;
        symbol.signature = Some(format!("type {}", signature_before(ctx, node, ty.filter(|_| kind != SymbolKind::Typedef))));
        if kind == SymbolKind::Typedef {
            symbol.return_type = ty.map(|t| ctx.text(t).to_string());
        }
        symbol.language_features = Some(LanguageFeatures::Go(GoFeatures {
            embedded: embedded.clone(),
            type_parameters: type_parameters(ctx, node),
            ..GoFeatures::default()
        }));

        let qualified = symbol.qualified_name.clone();
        let mut out = Extracted::from(symbol);
        for base in embedded {
            out.push_relationship(Relationship::new(qualified.clone(), base, RelationshipKind::Inherits, line));
        }
        out
    }

    fn handle_function(&self, node: Node, ctx: &mut TraversalContext) -> Extracted {
        let Some(name) = ctx.field_text(node, "name") else {
            return Extracted::Nothing;
        };
        let receiver = receiver(ctx, node);
        let kind = if receiver.is_some() || ctx.in_class_body() {
            SymbolKind::Method
        } else {
            SymbolKind::Function
        };

        let body = node.child_by_field_name("body");
        let mut symbol = ctx.symbol(name, kind, node);
        if let Some((recv, _)) = &receiver {
            symbol.qualified_name = ctx.qualify(&format!("{}.{}", recv, name));
            symbol.parent_scope = Some(ctx.qualify(recv));
        }
        symbol.visibility = visibility_of(name);
        symbol.is_exported = symbol.visibility == Visibility::Public;
        symbol.is_definition = body.is_some();
        symbol.signature = Some(signature_before(ctx, node, body));
        symbol.return_type = ctx.field_text(node, "result").map(str::to_string);
        symbol.complexity = body_complexity(ctx, body);
        symbol.language_features = Some(LanguageFeatures::Go(GoFeatures {
            is_pointer_receiver: receiver.as_ref().map(|(_, p)| *p).unwrap_or(false),
            receiver: receiver.map(|(r, _)| r),
            embedded: Vec::new(),
            type_parameters: type_parameters(ctx, node),
        }));
        symbol.into()
    }

    fn handle_variable(&self, node: Node, ctx: &mut TraversalContext) -> Extracted {
        if ctx.in_function_body() {
            return Extracted::Nothing;
        }
        let kind = match node.kind() {
            "const_spec" => SymbolKind::Constant,
            "field_declaration" => SymbolKind::Field,
            _ => SymbolKind::Variable,
        };
        let ty = ctx.field_text(node, "type").map(str::to_string);
        let mut out = Extracted::Nothing;
        for name in field_names(ctx, node) {
            let mut symbol = ctx.symbol(name, kind, node);
            symbol.visibility = visibility_of(name);
            symbol.is_exported = symbol.visibility == Visibility::Public;
            symbol.return_type = ty.clone();
            out.push_symbol(symbol);
        }
        out
    }

    fn handle_import(&self, node: Node, ctx: &mut TraversalContext) -> Extracted {
        let Some(path) = ctx.field_text(node, "path").map(unquote) else {
            return Extracted::Nothing;
        };
        let line = ctx.location(node).line;
        let mut symbol = ctx.symbol(&path, SymbolKind::Import, node);
        symbol.qualified_name = path.clone();
        symbol.signature = Some(ctx.text(node).to_string());

        let mut out = Extracted::from(symbol);
        out.push_relationship(Relationship::new(ctx.current_owner(), path, RelationshipKind::Imports, line));
        out
    }

    fn handle_call(&self, node: Node, ctx: &mut TraversalContext) -> Extracted {
        let Some(function) = node.child_by_field_name("function") else {
            return Extracted::Nothing;
        };
        let callee = match function.kind() {
            "identifier" => ctx.text(function),
            "selector_expression" => ctx.field_text(function, "field").unwrap_or_default(),
            _ => return Extracted::Nothing,
        };
        if callee.is_empty() {
            return Extracted::Nothing;
        }
        let line = ctx.location(node).line;
        Relationship::new(ctx.current_owner(), callee, RelationshipKind::Calls, line).into()
    }

    fn handle_creation(&self, node: Node, ctx: &mut TraversalContext) -> Extracted {
        let Some(ty) = node.child_by_field_name("type") else {
            return Extracted::Nothing;
        };
        if !matches!(ty.kind(), "type_identifier" | "qualified_type" | "generic_type") {
            return Extracted::Nothing;
        }
        let line = ctx.location(node).line;
        Relationship::new(ctx.current_owner(), strip_type_args(ctx.text(ty)), RelationshipKind::Creates, line).into()
    }
}

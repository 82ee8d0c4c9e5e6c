// Java extraction

use tree_sitter::Node;

use super::{body_complexity, strip_type_args, type_names};
use crate::index::{
    JavaFeatures, Language, LanguageFeatures, Relationship, RelationshipKind, SymbolKind,
    Visibility,
};
use crate::indexer::visitor::{
    child_of_kind, signature_before, Extracted, HandlerKind, LanguageHandler, ScopeFrame,
    ScopeKind, TraversalContext,
};

pub struct JavaHandler;

const HANDLERS: &[(&str, HandlerKind)] = &[
    ("class_declaration", HandlerKind::ClassLike),
    ("interface_declaration", HandlerKind::ClassLike),
    ("enum_declaration", HandlerKind::ClassLike),
    ("record_declaration", HandlerKind::ClassLike),
    ("annotation_type_declaration", HandlerKind::ClassLike),
    ("method_declaration", HandlerKind::FunctionLike),
    ("constructor_declaration", HandlerKind::FunctionLike),
    ("field_declaration", HandlerKind::VariableLike),
    ("constant_declaration", HandlerKind::VariableLike),
    ("import_declaration", HandlerKind::Import),
    ("method_invocation", HandlerKind::Call),
    ("object_creation_expression", HandlerKind::Creation),
];

const TYPE_KINDS: &[&str] = &["type_identifier", "generic_type", "scoped_type_identifier"];

struct Modifiers {
    annotations: Vec<String>,
    keywords: Vec<String>,
}

impl Modifiers {
    fn of(ctx: &TraversalContext, node: Node) -> Self {
        let mut annotations = Vec::new();
        let mut keywords = Vec::new();
        if let Some(modifiers) = child_of_kind(node, "modifiers") {
            let mut cursor = modifiers.walk();
            for child in modifiers.children(&mut cursor) {
                match child.kind() {
                    "marker_annotation" | "annotation" => {
                        let text = ctx.text(child).trim_start_matches('@');
                        annotations.push(text.split('(').next().unwrap_or(text).trim().to_string());
                    }
                    _ => keywords.push(ctx.text(child).to_string()),
                }
            }
        }
        Self { annotations, keywords }
    }

    fn has(&self, keyword: &str) -> bool {
        self.keywords.iter().any(|k| k == keyword)
    }

    fn visibility(&self, in_interface: bool) -> Visibility {
        if self.has("public") || in_interface {
            Visibility::Public
        } else if self.has("private") {
            Visibility::Private
        } else if self.has("protected") {
            Visibility::Protected
        } else {
            Visibility::Internal
        }
    }
}

fn in_interface_body(node: Node) -> bool {
    node.parent()
        .map(|p| p.kind() == "interface_body" || p.kind() == "annotation_type_body")
        .unwrap_or(false)
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

impl LanguageHandler for JavaHandler {
    fn language(&self) -> Language {
        Language::Java
    }

    fn node_handlers(&self) -> &'static [(&'static str, HandlerKind)] {
        HANDLERS
    }

    fn root_scope(&self, root: Node, ctx: &TraversalContext) -> Option<String> {
        let package = child_of_kind(root, "package_declaration")?;
        let mut cursor = package.walk();
        let name = package
            .named_children(&mut cursor)
            .find(|c| matches!(c.kind(), "scoped_identifier" | "identifier"))?;
        Some(ctx.text(name).to_string())
    }

    fn scope_for(&self, node: Node, ctx: &TraversalContext) -> Option<ScopeFrame> {
        let kind = match node.kind() {
            "class_declaration" | "interface_declaration" | "enum_declaration" | "record_declaration"
            | "annotation_type_declaration" => ScopeKind::Class,
            "method_declaration" | "constructor_declaration" => ScopeKind::Function,
            "lambda_expression" => return Some(ScopeFrame::anonymous(ScopeKind::Function)),
            _ => return None,
        };
        Some(ScopeFrame::named(kind, ctx.field_text(node, "name")?))
    }

    fn handle_class(&self, node: Node, ctx: &mut TraversalContext) -> Extracted {
        let Some(name) = ctx.field_text(node, "name") else {
            return Extracted::Nothing;
        };
        let kind = match node.kind() {
            "interface_declaration" | "annotation_type_declaration" => SymbolKind::Interface,
            "enum_declaration" => SymbolKind::Enum,
            "record_declaration" => SymbolKind::Struct,
            _ => SymbolKind::Class,
        };

        let extends = node
            .child_by_field_name("superclass")
            .and_then(|s| {
                let mut cursor = s.walk();
                let ty = s.named_children(&mut cursor).find(|c| TYPE_KINDS.contains(&c.kind()));
                ty
            })
            .map(|t| strip_type_args(ctx.text(t)));
        let mut implements = Vec::new();
        for clause in [
            node.child_by_field_name("interfaces"),
            child_of_kind(node, "extends_interfaces"),
        ]
        .into_iter()
        .flatten()
        {
            if let Some(list) = child_of_kind(clause, "type_list") {
                implements.extend(type_names(ctx, list, TYPE_KINDS));
            }
        }

        let modifiers = Modifiers::of(ctx, node);
        let body = node.child_by_field_name("body");
        let line = ctx.location(node).line;
        let mut symbol = ctx.symbol(name, kind, node);
        symbol.visibility = modifiers.visibility(in_interface_body(node));
        symbol.is_exported = symbol.visibility == Visibility::Public;
        symbol.signature = Some(signature_before(ctx, node, body));
        symbol.language_features = Some(LanguageFeatures::Java(JavaFeatures {
            annotations: modifiers.annotations,
            modifiers: modifiers.keywords,
            extends: extends.clone(),
            implements: implements.clone(),
            type_parameters: type_parameters(ctx, node),
        }));

        let qualified = symbol.qualified_name.clone();
        let mut out = Extracted::from(symbol);
        if let Some(base) = extends {
            out.push_relationship(Relationship::new(qualified.clone(), base, RelationshipKind::Inherits, line));
        }
        // An interface's `extends` list is inheritance; a class's `implements` list is not.
        let iface_kind = if kind == SymbolKind::Interface {
            RelationshipKind::Inherits
        } else {
            RelationshipKind::Implements
        };
        for iface in implements {
            out.push_relationship(Relationship::new(qualified.clone(), iface, iface_kind, line));
        }
        out
    }

    fn handle_function(&self, node: Node, ctx: &mut TraversalContext) -> Extracted {
        let Some(name) = ctx.field_text(node, "name") else {
            return Extracted::Nothing;
        };
        let kind = if node.kind() == "constructor_declaration" {
            SymbolKind::Constructor
        } else {
            SymbolKind::Method
        };
        let modifiers = Modifiers::of(ctx, node);
        let body = node.child_by_field_name("body");

        let mut symbol = ctx.symbol(name, kind, node);
        symbol.visibility = modifiers.visibility(in_interface_body(node));
        symbol.is_exported = symbol.visibility == Visibility::Public;
        symbol.is_definition = body.is_some();
        symbol.signature = Some(signature_before(ctx, node, body));
        symbol.return_type = ctx.field_text(node, "type").map(str::to_string);
        symbol.complexity = body_complexity(ctx, body);
        symbol.language_features = Some(LanguageFeatures::Java(JavaFeatures {
            annotations: modifiers.annotations,
            modifiers: modifiers.keywords,
            type_parameters: type_parameters(ctx, node),
            ..JavaFeatures::default()
        }));
        symbol.into()
    }

    fn handle_variable(&self, node: Node, ctx: &mut TraversalContext) -> Extracted {
        if !ctx.in_class_body() {
            return Extracted::Nothing;
        }
        let modifiers = Modifiers::of(ctx, node);
        let interface_member = in_interface_body(node);
        let kind = if node.kind() == "constant_declaration"
            || interface_member
            || (modifiers.has("static") && modifiers.has("final"))
        {
            SymbolKind::Constant
        } else {
            SymbolKind::Field
        };
        let ty = ctx.field_text(node, "type").map(str::to_string);

        let mut out = Extracted::Nothing;
        let mut cursor = node.walk();
        for declarator in node.children_by_field_name("declarator", &mut cursor) {
            let Some(name) = ctx.field_text(declarator, "name") else {
                continue;
            };
            let mut symbol = ctx.symbol(name, kind, node);
            symbol.visibility = modifiers.visibility(interface_member);
            symbol.is_exported = symbol.visibility == Visibility::Public;
            symbol.return_type = ty.clone();
            symbol.language_features = Some(LanguageFeatures::Java(JavaFeatures {
                annotations: modifiers.annotations.clone(),
                modifiers: modifiers.keywords.clone(),
                ..JavaFeatures::default()
            }));
            out.push_symbol(symbol);
        }
        out
    }

    fn handle_import(&self, node: Node, ctx: &mut TraversalContext) -> Extracted {
        let text = ctx.text(node);
        let path: String = text
            .trim()
            .trim_start_matches("import")
            .trim_end_matches(';')
            .trim()
            .trim_start_matches("static ")
            .split_whitespace()
            .collect();
        if path.is_empty() {
            return Extracted::Nothing;
        }
        let line = ctx.location(node).line;
        let mut symbol = ctx.symbol(&path, SymbolKind::Import, node);
        symbol.qualified_name = path.clone();
        symbol.signature = Some(text.trim().to_string());

        let mut out = Extracted::from(symbol);
        out.push_relationship(Relationship::new(ctx.current_owner(), path, RelationshipKind::Imports, line));
        out
    }

    fn handle_call(&self, node: Node, ctx: &mut TraversalContext) -> Extracted {
        let Some(name) = ctx.field_text(node, "name") else {
            return Extracted::Nothing;
        };
        let line = ctx.location(node).line;
        Relationship::new(ctx.current_owner(), name, RelationshipKind::Calls, line).into()
    }

    fn handle_creation(&self, node: Node, ctx: &mut TraversalContext) -> Extracted {
        let Some(ty) = ctx.field_text(node, "type") else {
            return Extracted::Nothing;
        };
        let line = ctx.location(node).line;
        Relationship::new(ctx.current_owner(), strip_type_args(ty), RelationshipKind::Creates, line).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::Symbol;
    use crate::indexer::syntax::{SyntaxProvider, TreeSitterProvider};
    use crate::indexer::visitor::{traverse, TraversalOutput};

    const SOURCE: &str = r#"package com.example.app;

import java.util.List;
import java.util.concurrent.*;

@Service
public class UserService extends BaseService implements Repository<User>, Closeable {
    private static final int MAX_USERS = 100;
    private final List<User> users;

    public UserService(List<User> users) {
        this.users = users;
    }

    @Override
    public User find(String id) {
        for (User u : users) {
            if (u.getId().equals(id) && u.isActive()) {
                return u;
            }
        }
        return null;
    }

    public <T> T convert(T value) {
        return value;
    }

    protected void reset() {
        users.clear();
        new Audit("reset");
    }
}

interface Repository<T> {
    T find(String id);
}
"#;

    const PKG: &str = "com.example.app";

    fn extract() -> TraversalOutput {
        let tree = TreeSitterProvider::new(Language::Java).parse(SOURCE).unwrap();
        traverse(&JavaHandler, &tree, "UserService.java", SOURCE)
    }

    fn find<'a>(output: &'a TraversalOutput, name: &str) -> &'a Symbol {
        let qualified = format!("{}.{}", PKG, name);
        output
            .symbols
            .iter()
            .find(|s| s.qualified_name == qualified)
            .unwrap_or_else(|| panic!("missing {}", qualified))
    }

    fn features(symbol: &Symbol) -> &JavaFeatures {
        match &symbol.language_features {
            Some(LanguageFeatures::Java(f)) => f,
            other => panic!("unexpected features {:?}", other),
        }
    }

    #[test]
    fn test_class_shape() {
        let output = extract();
        let service = find(&output, "UserService");
        assert_eq!(service.kind, SymbolKind::Class);
        assert_eq!(service.namespace.as_deref(), Some(PKG));
        assert_eq!(features(service).annotations, vec!["Service".to_string()]);
        assert_eq!(features(service).extends.as_deref(), Some("BaseService"));
        assert_eq!(
            features(service).implements,
            vec!["Repository".to_string(), "Closeable".to_string()]
        );

        let max = find(&output, "UserService.MAX_USERS");
        assert_eq!(max.kind, SymbolKind::Constant);
        assert_eq!(max.visibility, Visibility::Private);
        assert_eq!(find(&output, "UserService.users").kind, SymbolKind::Field);
    }

    #[test]
    fn test_members() {
        let output = extract();
        assert_eq!(find(&output, "UserService.UserService").kind, SymbolKind::Constructor);

        let lookup = find(&output, "UserService.find");
        assert_eq!(lookup.kind, SymbolKind::Method);
        assert_eq!(features(lookup).annotations, vec!["Override".to_string()]);
        assert_eq!(lookup.complexity, 4);

        assert_eq!(features(find(&output, "UserService.convert")).type_parameters, vec!["T".to_string()]);
        assert_eq!(find(&output, "UserService.reset").visibility, Visibility::Protected);

        let iface = find(&output, "Repository.find");
        assert_eq!(iface.visibility, Visibility::Public);
        assert!(!iface.is_definition);
        assert_eq!(find(&output, "Repository").visibility, Visibility::Internal);
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
        let service = format!("{}.UserService", PKG);
        assert!(has(&service, "BaseService", RelationshipKind::Inherits));
        assert!(has(&service, "Repository", RelationshipKind::Implements));
        assert!(has(&service, "Closeable", RelationshipKind::Implements));
        assert!(has(PKG, "java.util.List", RelationshipKind::Imports));
        assert!(has(PKG, "java.util.concurrent.*", RelationshipKind::Imports));

        let find_owner = format!("{}.find", service);
        assert!(has(&find_owner, "equals", RelationshipKind::Calls));
        assert!(has(&find_owner, "getId", RelationshipKind::Calls));
        let reset = format!("{}.reset", service);
        assert!(has(&reset, "clear", RelationshipKind::Calls));
        assert!(has(&reset, "Audit", RelationshipKind::Creates));
    }
}

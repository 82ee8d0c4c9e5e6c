// TypeScript, TSX and JavaScript extraction

use tree_sitter::Node;

use super::{body_complexity, strip_type_args, unquote};
use crate::index::{
    Language, LanguageFeatures, Relationship, RelationshipKind, Symbol, SymbolKind,
    TypeScriptFeatures, Visibility,
};
use crate::indexer::visitor::{
    child_of_kind, children_of_kind, signature_before, Extracted, HandlerKind, LanguageHandler,
    ScopeFrame, ScopeKind, TraversalContext,
};

/// One handler serves three grammars; only the node tables differ in practice.
pub struct TypeScriptHandler {
    language: Language,
}

impl TypeScriptHandler {
    pub const fn new(language: Language) -> Self {
        Self { language }
    }
}

const HANDLERS: &[(&str, HandlerKind)] = &[
    ("class_declaration", HandlerKind::ClassLike),
    ("abstract_class_declaration", HandlerKind::ClassLike),
    ("interface_declaration", HandlerKind::ClassLike),
    ("enum_declaration", HandlerKind::ClassLike),
    ("type_alias_declaration", HandlerKind::ClassLike),
    ("function_declaration", HandlerKind::FunctionLike),
    ("generator_function_declaration", HandlerKind::FunctionLike),
    ("method_definition", HandlerKind::FunctionLike),
    ("method_signature", HandlerKind::FunctionLike),
    ("abstract_method_signature", HandlerKind::FunctionLike),
    ("variable_declarator", HandlerKind::VariableLike),
    ("public_field_definition", HandlerKind::VariableLike),
    ("field_definition", HandlerKind::VariableLike),
    ("property_signature", HandlerKind::VariableLike),
    ("import_statement", HandlerKind::Import),
    ("export_statement", HandlerKind::Export),
    ("internal_module", HandlerKind::Namespace),
    ("module", HandlerKind::Namespace),
    ("class_heritage", HandlerKind::Inheritance),
    ("extends_type_clause", HandlerKind::Inheritance),
    ("call_expression", HandlerKind::Call),
    ("new_expression", HandlerKind::Creation),
];

const FUNCTION_VALUES: &[&str] = &["arrow_function", "function_expression", "function", "generator_function"];

fn has_token(node: Node, token: &str) -> bool {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).any(|c| c.kind() == token);
    found
}

fn is_exported(node: Node) -> bool {
    let mut current = node.parent();
    while let Some(parent) = current {
        match parent.kind() {
            "export_statement" => return true,
            "lexical_declaration" | "variable_declaration" => current = parent.parent(),
            _ => return false,
        }
    }
    false
}

fn decorator_name(ctx: &TraversalContext, node: Node) -> String {
    let text = ctx.text(node).trim_start_matches('@');
    text.split(['(', '<']).next().unwrap_or(text).trim().to_string()
}

/// Decorators attached as children, on an enclosing export, or as preceding class-body siblings.
fn decorators(ctx: &TraversalContext, node: Node) -> Vec<String> {
    let mut found: Vec<String> = children_of_kind(node, "decorator")
        .into_iter()
        .map(|d| decorator_name(ctx, d))
        .collect();
    if let Some(parent) = node.parent().filter(|p| p.kind() == "export_statement") {
        found.extend(children_of_kind(parent, "decorator").into_iter().map(|d| decorator_name(ctx, d)));
    }
    let mut preceding = Vec::new();
    if node.parent().map(|p| p.kind()) == Some("class_body") {
        let mut sibling = node.prev_named_sibling();
        while let Some(s) = sibling.filter(|s| s.kind() == "decorator") {
            preceding.push(decorator_name(ctx, s));
            sibling = s.prev_named_sibling();
        }
    }
    preceding.reverse();
    preceding.extend(found);
    preceding
}

fn type_parameters(ctx: &TraversalContext, node: Node) -> Vec<String> {
    let Some(params) = node.child_by_field_name("type_parameters") else {
        return Vec::new();
    };
    let mut cursor = params.walk();
    params
        .named_children(&mut cursor)
        .map(|p| ctx.field_text(p, "name").unwrap_or_else(|| ctx.text(p)).to_string())
        .collect()
}

fn member_visibility(ctx: &TraversalContext, node: Node) -> Visibility {
    if let Some(modifier) = child_of_kind(node, "accessibility_modifier") {
        return match ctx.text(modifier) {
            "private" => Visibility::Private,
            "protected" => Visibility::Protected,
            _ => Visibility::Public,
        };
    }
    let private_name = node
        .child_by_field_name("name")
        .or_else(|| node.child_by_field_name("property"))
        .map(|n| n.kind() == "private_property_identifier")
        .unwrap_or(false);
    if private_name {
        Visibility::Private
    } else {
        Visibility::Public
    }
}

impl TypeScriptHandler {
    fn callable(&self, ctx: &TraversalContext, node: Node, name: &str, kind: SymbolKind, features: TypeScriptFeatures) -> Symbol {
        let body = node.child_by_field_name("body");
        let mut symbol = ctx.symbol(name, kind, node);
        symbol.signature = Some(signature_before(ctx, node, body));
        symbol.return_type = ctx
            .field_text(node, "return_type")
            .map(|t| t.trim_start_matches(':').trim().to_string());
        symbol.complexity = body_complexity(ctx, body);
        symbol.is_async = has_token(node, "async");
        symbol.is_definition = body.is_some();
        symbol.language_features = Some(LanguageFeatures::TypeScript(features));
        symbol
    }

    fn arrow_function(&self, ctx: &TraversalContext, declarator: Node, value: Node, name: &str) -> Symbol {
        let features = TypeScriptFeatures {
            type_parameters: type_parameters(ctx, value),
            is_arrow_function: value.kind() == "arrow_function",
            is_generator: value.kind() == "generator_function",
            ..TypeScriptFeatures::default()
        };
        let mut symbol = self.callable(ctx, value, name, SymbolKind::Function, features);
        symbol.location = ctx.location(declarator);
        symbol.signature = Some(signature_before(ctx, declarator, value.child_by_field_name("body")));
        symbol.is_exported = is_exported(declarator);
        symbol
    }
}

impl LanguageHandler for TypeScriptHandler {
    fn language(&self) -> Language {
        self.language
    }

    fn node_handlers(&self) -> &'static [(&'static str, HandlerKind)] {
        HANDLERS
    }

    fn scope_for(&self, node: Node, ctx: &TraversalContext) -> Option<ScopeFrame> {
        let named = |kind: ScopeKind| match ctx.field_text(node, "name") {
            Some(name) => ScopeFrame::named(kind, name),
            None => ScopeFrame::anonymous(kind),
        };
        match node.kind() {
            "class_declaration" | "abstract_class_declaration" | "interface_declaration" | "class" => {
                Some(named(ScopeKind::Class))
            }
            "function_declaration" | "generator_function_declaration" | "method_definition" => {
                Some(named(ScopeKind::Function))
            }
            "arrow_function" | "function_expression" | "function" | "generator_function" => {
                let declared = node
                    .parent()
                    .filter(|p| p.kind() == "variable_declarator")
                    .and_then(|p| p.child_by_field_name("name"))
                    .filter(|n| n.kind() == "identifier")
                    .map(|n| ctx.text(n));
                Some(match declared {
                    Some(name) => ScopeFrame::named(ScopeKind::Function, name),
                    None => ScopeFrame::anonymous(ScopeKind::Function),
                })
            }
            "internal_module" => Some(named(ScopeKind::Namespace)),
            _ => None,
        }
    }

    fn handle_class(&self, node: Node, ctx: &mut TraversalContext) -> Extracted {
        if ctx.in_function_body() {
            return Extracted::Nothing;
        }
        let Some(name) = ctx.field_text(node, "name") else {
            return Extracted::Nothing;
        };
        let kind = match node.kind() {
            "interface_declaration" => SymbolKind::Interface,
            "enum_declaration" => SymbolKind::Enum,
            "type_alias_declaration" => SymbolKind::Typedef,
            _ => SymbolKind::Class,
        };

        let mut features = TypeScriptFeatures {
            decorators: decorators(ctx, node),
            type_parameters: type_parameters(ctx, node),
            is_abstract: node.kind() == "abstract_class_declaration",
            ..TypeScriptFeatures::default()
        };
        if let Some(heritage) = child_of_kind(node, "class_heritage") {
            if let Some(extends) = child_of_kind(heritage, "extends_clause") {
                let mut cursor = extends.walk();
                features.extends = extends
                    .children_by_field_name("value", &mut cursor)
                    .map(|v| ctx.text(v).to_string())
                    .collect();
            }
            if let Some(implements) = child_of_kind(heritage, "implements_clause") {
                let mut cursor = implements.walk();
                features.implements = implements
                    .named_children(&mut cursor)
                    .map(|t| strip_type_args(ctx.text(t)))
                    .collect();
            }
        }

        let body = node.child_by_field_name("body");
        let mut symbol = ctx.symbol(name, kind, node);
        symbol.signature = Some(signature_before(ctx, node, body));
        symbol.is_exported = is_exported(node);
        symbol.language_features = Some(LanguageFeatures::TypeScript(features));
        symbol.into()
    }

    fn handle_function(&self, node: Node, ctx: &mut TraversalContext) -> Extracted {
        let Some(name) = ctx.field_text(node, "name") else {
            return Extracted::Nothing;
        };
        // Nested declarations are locals of the enclosing function.
        if node.kind().ends_with("function_declaration") && ctx.in_function_body() {
            return Extracted::Nothing;
        }
        let is_declaration = node.kind().ends_with("function_declaration");
        if !is_declaration && !ctx.in_class_body() {
            return Extracted::Nothing;
        }

        let features = TypeScriptFeatures {
            decorators: decorators(ctx, node),
            type_parameters: type_parameters(ctx, node),
            is_abstract: node.kind() == "abstract_method_signature" || has_token(node, "abstract"),
            is_static: has_token(node, "static"),
            is_generator: node.kind() == "generator_function_declaration" || has_token(node, "*"),
            ..TypeScriptFeatures::default()
        };

        let kind = match node.kind() {
            "function_declaration" | "generator_function_declaration" => SymbolKind::Function,
            _ if name == "constructor" => SymbolKind::Constructor,
            _ => SymbolKind::Method,
        };
        let mut symbol = self.callable(ctx, node, name, kind, features);
        if kind == SymbolKind::Function {
            symbol.is_exported = is_exported(node);
        } else {
            symbol.visibility = member_visibility(ctx, node);
        }
        symbol.into()
    }

    fn handle_variable(&self, node: Node, ctx: &mut TraversalContext) -> Extracted {
        match node.kind() {
            "variable_declarator" => {
                let Some(name_node) = node.child_by_field_name("name").filter(|n| n.kind() == "identifier") else {
                    return Extracted::Nothing;
                };
                let name = ctx.text(name_node);
                if ctx.in_function_body() {
                    return Extracted::Nothing;
                }
                if let Some(value) = node.child_by_field_name("value").filter(|v| FUNCTION_VALUES.contains(&v.kind())) {
                    return self.arrow_function(ctx, node, value, name).into();
                }
                let is_const = node
                    .parent()
                    .and_then(|p| p.child(0))
                    .map(|kw| kw.kind() == "const")
                    .unwrap_or(false);
                let kind = if is_const { SymbolKind::Constant } else { SymbolKind::Variable };
                let mut symbol = ctx.symbol(name, kind, node);
                symbol.return_type = ctx
                    .field_text(node, "type")
                    .map(|t| t.trim_start_matches(':').trim().to_string());
                symbol.signature = node.parent().map(|p| signature_before(ctx, p, None));
                symbol.is_exported = is_exported(node);
                symbol.into()
            }
            _ => {
                if !ctx.in_class_body() {
                    return Extracted::Nothing;
                }
                let Some(name_node) = node
                    .child_by_field_name("name")
                    .or_else(|| node.child_by_field_name("property"))
                else {
                    return Extracted::Nothing;
                };
                let mut symbol = ctx.symbol(ctx.text(name_node), SymbolKind::Property, node);
                symbol.visibility = member_visibility(ctx, node);
                symbol.return_type = ctx
                    .field_text(node, "type")
                    .map(|t| t.trim_start_matches(':').trim().to_string());
                symbol.signature = Some(signature_before(ctx, node, None));
                symbol.is_definition = node.kind() != "property_signature";
                symbol.language_features = Some(LanguageFeatures::TypeScript(TypeScriptFeatures {
                    decorators: decorators(ctx, node),
                    is_static: has_token(node, "static"),
                    is_readonly: has_token(node, "readonly"),
                    ..TypeScriptFeatures::default()
                }));
                symbol.into()
            }
        }
    }

    fn handle_import(&self, node: Node, ctx: &mut TraversalContext) -> Extracted {
        let Some(source) = ctx.field_text(node, "source").map(unquote) else {
            return Extracted::Nothing;
        };
        let line = ctx.location(node).line;
        let mut out = Extracted::Nothing;
        let mut symbol = ctx.symbol(&source, SymbolKind::Import, node);
        symbol.qualified_name = source.clone();
        symbol.signature = Some(ctx.text(node).trim().to_string());
        out.push_symbol(symbol);
        out.push_relationship(Relationship::new(ctx.file_path, source, RelationshipKind::Imports, line));
        out
    }

    fn handle_export(&self, node: Node, ctx: &mut TraversalContext) -> Extracted {
        let line = ctx.location(node).line;
        let mut out = Extracted::Nothing;
        if let Some(source) = ctx.field_text(node, "source").map(unquote) {
            out.push_relationship(Relationship::new(ctx.file_path, source, RelationshipKind::Imports, line));
        }
        if let Some(clause) = child_of_kind(node, "export_clause") {
            for specifier in children_of_kind(clause, "export_specifier") {
                let exported = ctx
                    .field_text(specifier, "alias")
                    .or_else(|| ctx.field_text(specifier, "name"))
                    .unwrap_or_default();
                if exported.is_empty() {
                    continue;
                }
                let mut symbol = ctx.symbol(exported, SymbolKind::Export, specifier);
                symbol.is_exported = true;
                out.push_symbol(symbol);
                let local = ctx.field_text(specifier, "name").unwrap_or(exported);
                out.push_relationship(Relationship::new(ctx.file_path, local, RelationshipKind::Exports, line));
            }
        }
        out
    }

    fn handle_namespace(&self, node: Node, ctx: &mut TraversalContext) -> Extracted {
        let Some(name) = ctx.field_text(node, "name") else {
            return Extracted::Nothing;
        };
        let kind = if node.kind() == "module" { SymbolKind::Module } else { SymbolKind::Namespace };
        let name = unquote(name);
        let mut symbol = ctx.symbol(&name, kind, node);
        symbol.is_exported = is_exported(node);
        symbol.into()
    }

    fn handle_inheritance(&self, node: Node, ctx: &mut TraversalContext) -> Extracted {
        let owner = ctx.current_owner();
        let line = ctx.location(node).line;
        let mut relationships = Vec::new();
        let mut cursor = node.walk();
        let clauses: Vec<Node> = node.named_children(&mut cursor).collect();
        for clause in clauses {
            let kind = match clause.kind() {
                "implements_clause" => RelationshipKind::Implements,
                _ => RelationshipKind::Inherits,
            };
            let targets: Vec<Node> = match clause.kind() {
                "extends_clause" | "implements_clause" => {
                    let mut inner = clause.walk();
                    clause
                        .named_children(&mut inner)
                        .filter(|c| c.kind() != "type_arguments")
                        .collect()
                }
                _ => vec![clause],
            };
            for target in targets {
                let name = strip_type_args(ctx.text(target));
                if !name.is_empty() {
                    relationships.push(Relationship::new(owner.clone(), name, kind, line));
                }
            }
        }
        relationships.into()
    }

    fn handle_call(&self, node: Node, ctx: &mut TraversalContext) -> Extracted {
        let Some(function) = node.child_by_field_name("function") else {
            return Extracted::Nothing;
        };
        let callee = match function.kind() {
            "identifier" => ctx.text(function),
            "member_expression" => ctx.field_text(function, "property").unwrap_or_default(),
            _ => return Extracted::Nothing,
        };
        if callee.is_empty() {
            return Extracted::Nothing;
        }
        let line = ctx.location(node).line;

        if callee == "require" {
            let module = node
                .child_by_field_name("arguments")
                .and_then(|args| args.named_child(0))
                .filter(|a| a.kind() == "string")
                .map(|a| unquote(ctx.text(a)));
            if let Some(module) = module {
                let mut out = Extracted::Nothing;
                let mut symbol = ctx.symbol(&module, SymbolKind::Import, node);
                symbol.qualified_name = module.clone();
                out.push_symbol(symbol);
                out.push_relationship(Relationship::new(ctx.file_path, module, RelationshipKind::Imports, line));
                return out;
            }
        }

        Relationship::new(ctx.current_owner(), callee, RelationshipKind::Calls, line).into()
    }

    fn handle_creation(&self, node: Node, ctx: &mut TraversalContext) -> Extracted {
        let Some(created) = ctx.field_text(node, "constructor").map(strip_type_args) else {
            return Extracted::Nothing;
        };
        let line = ctx.location(node).line;
        Relationship::new(ctx.current_owner(), created, RelationshipKind::Creates, line).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::syntax::{SyntaxProvider, TreeSitterProvider};
    use crate::indexer::visitor::{traverse, TraversalOutput};

    fn extract(language: Language, source: &str) -> TraversalOutput {
        let tree = TreeSitterProvider::new(language).parse(source).unwrap();
        traverse(&TypeScriptHandler::new(language), &tree, "test.ts", source)
    }

    fn find<'a>(output: &'a TraversalOutput, qualified: &str) -> &'a Symbol {
        output
            .symbols
            .iter()
            .find(|s| s.qualified_name == qualified)
            .unwrap_or_else(|| panic!("missing {}", qualified))
    }

    fn features(symbol: &Symbol) -> &TypeScriptFeatures {
        match &symbol.language_features {
            Some(LanguageFeatures::TypeScript(f)) => f,
            other => panic!("unexpected features {:?}", other),
        }
    }

    const SOURCE: &str = r#"
import { Injectable } from '@angular/core';
import * as path from "path";

export interface Shape extends Named, Sized {
  area(): number;
  readonly name: string;
}

@Injectable()
export class Circle extends Base implements Shape, Drawable {
  private radius: number;
  static count = 0;

  constructor(radius: number) {
    super();
    this.radius = radius;
  }

  async load(url: string): Promise<void> {
    const data = await fetchData(url);
    this.render(data);
  }
}

export const makeCircle = (r: number): Circle => new Circle(r);
export function helper<T>(items: T[]): T | undefined { return items[0]; }
export type Id = string | number;
enum Color { Red, Green }
namespace Geometry { export const ORIGIN = 0; }
"#;

    #[test]
    fn test_declarations() {
        let output = extract(Language::TypeScript, SOURCE);

        assert_eq!(find(&output, "Shape").kind, SymbolKind::Interface);
        let area = find(&output, "Shape.area");
        assert_eq!(area.kind, SymbolKind::Method);
        assert!(!area.is_definition);
        assert_eq!(find(&output, "Shape.name").kind, SymbolKind::Property);

        let circle = find(&output, "Circle");
        assert!(circle.is_exported);
        assert_eq!(features(circle).decorators, vec!["Injectable".to_string()]);
        assert_eq!(features(circle).extends, vec!["Base".to_string()]);
        assert_eq!(features(circle).implements, vec!["Shape".to_string(), "Drawable".to_string()]);

        assert_eq!(find(&output, "Circle.radius").visibility, Visibility::Private);
        assert!(features(find(&output, "Circle.count")).is_static);
        assert_eq!(find(&output, "Circle.constructor").kind, SymbolKind::Constructor);
        assert!(find(&output, "Circle.load").is_async);

        let make = find(&output, "makeCircle");
        assert_eq!(make.kind, SymbolKind::Function);
        assert!(make.is_exported);
        assert!(features(make).is_arrow_function);

        assert_eq!(features(find(&output, "helper")).type_parameters, vec!["T".to_string()]);
        assert_eq!(find(&output, "Id").kind, SymbolKind::Typedef);
        assert_eq!(find(&output, "Color").kind, SymbolKind::Enum);
        assert_eq!(find(&output, "Geometry").kind, SymbolKind::Namespace);
        assert_eq!(find(&output, "Geometry.ORIGIN").kind, SymbolKind::Constant);

        // Locals inside methods stay out of the symbol table.
        assert!(output.symbols.iter().all(|s| s.name != "data"));
    }

    #[test]
    fn test_relationships() {
        let output = extract(Language::TypeScript, SOURCE);
        let has = |from: &str, to: &str, kind: RelationshipKind| {
            output
                .relationships
                .iter()
                .any(|r| r.from_name == from && r.to_name == to && r.kind == kind)
        };

        assert!(has("test.ts", "@angular/core", RelationshipKind::Imports));
        assert!(has("Shape", "Named", RelationshipKind::Inherits));
        assert!(has("Shape", "Sized", RelationshipKind::Inherits));
        assert!(has("Circle", "Base", RelationshipKind::Inherits));
        assert!(has("Circle", "Drawable", RelationshipKind::Implements));
        assert!(has("Circle.load", "fetchData", RelationshipKind::Calls));
        assert!(has("Circle.load", "render", RelationshipKind::Calls));
        assert!(has("makeCircle", "Circle", RelationshipKind::Creates));
    }

    #[test]
    fn test_javascript_grammar() {
        let source = r#"
const fs = require('fs');

class Repo extends Store {
  save(item) {
    fs.writeFileSync(this.path, item);
  }
}

module.exports = { Repo };
"#;
        let output = extract(Language::JavaScript, source);
        assert_eq!(find(&output, "Repo").kind, SymbolKind::Class);
        assert_eq!(find(&output, "Repo.save").kind, SymbolKind::Method);
        assert!(output
            .symbols
            .iter()
            .any(|s| s.kind == SymbolKind::Import && s.name == "fs"));
        assert!(output
            .relationships
            .iter()
            .any(|r| r.kind == RelationshipKind::Inherits && r.to_name == "Store"));
        assert!(output
            .relationships
            .iter()
            .any(|r| r.kind == RelationshipKind::Calls && r.to_name == "writeFileSync"));
    }
}

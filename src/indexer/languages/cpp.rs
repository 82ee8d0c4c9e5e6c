// C++ extraction

use tree_sitter::Node;

use super::{body_complexity, split_scoped, strip_type_args, type_names, unquote};
use crate::index::{
    CppFeatures, Language, LanguageFeatures, Relationship, RelationshipKind, Symbol, SymbolKind,
    Visibility,
};
use crate::indexer::visitor::{
    child_of_kind, descendant_of_kind, signature_before, Extracted, HandlerKind, LanguageHandler,
    ScopeFrame, ScopeKind, TraversalContext,
};

pub struct CppHandler;

const HANDLERS: &[(&str, HandlerKind)] = &[
    ("namespace_definition", HandlerKind::Namespace),
    ("class_specifier", HandlerKind::ClassLike),
    ("struct_specifier", HandlerKind::ClassLike),
    ("union_specifier", HandlerKind::ClassLike),
    ("enum_specifier", HandlerKind::ClassLike),
    ("alias_declaration", HandlerKind::ClassLike),
    ("type_definition", HandlerKind::ClassLike),
    ("function_definition", HandlerKind::FunctionLike),
    ("field_declaration", HandlerKind::VariableLike),
    ("declaration", HandlerKind::VariableLike),
    ("preproc_include", HandlerKind::Import),
    ("using_declaration", HandlerKind::Import),
    ("base_class_clause", HandlerKind::Inheritance),
    ("call_expression", HandlerKind::Call),
    ("new_expression", HandlerKind::Creation),
    ("access_specifier", HandlerKind::AccessSpecifier),
];

const BASE_KINDS: &[&str] = &["type_identifier", "qualified_identifier", "template_type"];

fn class_name<'a>(ctx: &TraversalContext<'a>, node: Node) -> Option<&'a str> {
    let name = node.child_by_field_name("name")?;
    if name.kind() == "template_type" {
        return ctx.field_text(name, "name");
    }
    Some(ctx.text(name))
}

/// The `function_declarator` under a definition or declaration, through pointer/reference wrappers.
fn function_declarator(node: Node) -> Option<Node> {
    let declarator = node.child_by_field_name("declarator")?;
    if declarator.kind() == "function_declarator" {
        return Some(declarator);
    }
    descendant_of_kind(declarator, "function_declarator")
}

/// Name of a namespace whose closing brace is missing.
///
/// The grammar then folds `namespace <id> {` and the body into one ERROR node.
fn unclosed_namespace<'a>(ctx: &TraversalContext<'a>, node: Node) -> Option<&'a str> {
    let keyword = node.child(0)?;
    let name = node.child(1)?;
    let brace = node.child(2)?;
    let named = matches!(name.kind(), "namespace_identifier" | "identifier" | "type_identifier");
    (keyword.kind() == "namespace" && named && brace.kind() == "{").then(|| ctx.text(name))
}

fn template_params(ctx: &TraversalContext, node: Node) -> Vec<String> {
    let Some(parent) = node.parent() else {
        return Vec::new();
    };
    if parent.kind() != "template_declaration" {
        return Vec::new();
    }
    let Some(params) = parent.child_by_field_name("parameters") else {
        return Vec::new();
    };
    let mut cursor = params.walk();
    params
        .named_children(&mut cursor)
        .map(|p| ctx.text(p).split_whitespace().collect::<Vec<_>>().join(" "))
        .collect()
}

fn has_keyword(ctx: &TraversalContext, node: Node, keyword: &str) -> bool {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).any(|c| {
        c.kind() == keyword
            || (matches!(c.kind(), "storage_class_specifier" | "type_qualifier" | "virtual_specifier")
                && ctx.text(c) == keyword)
    });
    found
}

impl CppHandler {
    fn function_features(&self, ctx: &TraversalContext, node: Node, declarator: Node) -> CppFeatures {
        let template_params = template_params(ctx, node);
        let text = ctx.text(node);
        CppFeatures {
            is_virtual: has_keyword(ctx, node, "virtual"),
            is_pure_virtual: text.trim_end_matches(';').trim_end().ends_with("= 0")
                || text.contains("=0;"),
            is_static: has_keyword(ctx, node, "static"),
            is_const: has_keyword(ctx, declarator, "const"),
            is_override: has_keyword(ctx, declarator, "override"),
            is_inline: has_keyword(ctx, node, "inline"),
            is_template: !template_params.is_empty() || ctx.template_depth() > 0,
            template_params,
            base_classes: Vec::new(),
        }
    }

    /// Build a function-like symbol from a definition or a declaration.
    fn function_symbol(&self, node: Node, declarator: Node, ctx: &TraversalContext, is_definition: bool) -> Option<Symbol> {
        let name_node = declarator.child_by_field_name("declarator")?;
        let full = ctx.text(name_node);
        let (scope, last) = split_scoped(full, "::");
        let name = strip_type_args(last);
        if name.is_empty() {
            return None;
        }

        let owner = scope
            .map(|s| strip_type_args(split_scoped(s, "::").1))
            .or_else(|| ctx.enclosing_class().filter(|_| ctx.in_class_body()).map(str::to_string));

        let kind = if name_node.kind() == "destructor_name" || name.starts_with('~') {
            SymbolKind::Destructor
        } else if name_node.kind() == "operator_name" || name.starts_with("operator") {
            SymbolKind::Operator
        } else if owner.as_deref() == Some(name.as_str()) {
            SymbolKind::Constructor
        } else if owner.is_some() {
            SymbolKind::Method
        } else {
            SymbolKind::Function
        };

        let body = node.child_by_field_name("body");
        let mut symbol = ctx.symbol(&name, kind, node);
        if let Some(scope) = scope {
            let scope = scope
                .split("::")
                .map(strip_type_args)
                .collect::<Vec<_>>()
                .join("::");
            symbol.qualified_name = ctx.qualify(&format!("{}::{}", scope, name));
            symbol.parent_scope = Some(ctx.qualify(&scope));
        }
        symbol.return_type = ctx.field_text(node, "type").map(str::to_string);
        symbol.signature = Some(signature_before(ctx, node, body));
        symbol.complexity = body_complexity(ctx, body);
        symbol.is_definition = is_definition;
        symbol.is_exported = symbol.visibility == Visibility::Public && !has_keyword(ctx, node, "static");
        symbol.language_features = Some(LanguageFeatures::Cpp(self.function_features(ctx, node, declarator)));
        Some(symbol)
    }

    fn field_symbols(&self, node: Node, ctx: &TraversalContext) -> Extracted {
        let mut out = Extracted::Nothing;
        let field_type = ctx.field_text(node, "type").map(str::to_string);
        let is_const = has_keyword(ctx, node, "const") || has_keyword(ctx, node, "constexpr");
        let mut cursor = node.walk();
        for declarator in node.children_by_field_name("declarator", &mut cursor) {
            let name_node = if declarator.kind() == "field_identifier" {
                Some(declarator)
            } else {
                descendant_of_kind(declarator, "field_identifier")
            };
            let Some(name_node) = name_node else { continue };
            let name = ctx.text(name_node);
            let kind = if is_const && has_keyword(ctx, node, "static") {
                SymbolKind::Constant
            } else {
                SymbolKind::Field
            };
            let mut symbol = ctx.symbol(name, kind, node);
            symbol.return_type = field_type.clone();
            symbol.signature = Some(signature_before(ctx, node, None));
            out.push_symbol(symbol);
        }
        out
    }

    fn variable_symbols(&self, node: Node, ctx: &TraversalContext) -> Extracted {
        let mut out = Extracted::Nothing;
        let var_type = ctx.field_text(node, "type").map(str::to_string);
        let is_const = has_keyword(ctx, node, "const") || has_keyword(ctx, node, "constexpr");
        let mut cursor = node.walk();
        for declarator in node.children_by_field_name("declarator", &mut cursor) {
            let name_node = match declarator.kind() {
                "identifier" => Some(declarator),
                "init_declarator" => declarator
                    .child_by_field_name("declarator")
                    .and_then(|d| if d.kind() == "identifier" { Some(d) } else { descendant_of_kind(d, "identifier") }),
                _ => None,
            };
            let Some(name_node) = name_node else { continue };
            let kind = if is_const { SymbolKind::Constant } else { SymbolKind::Variable };
            let mut symbol = ctx.symbol(ctx.text(name_node), kind, node);
            symbol.return_type = var_type.clone();
            symbol.signature = Some(signature_before(ctx, node, None));
            symbol.is_exported = !has_keyword(ctx, node, "static");
            out.push_symbol(symbol);
        }
        out
    }
}

impl LanguageHandler for CppHandler {
    fn language(&self) -> Language {
        Language::Cpp
    }

    fn node_handlers(&self) -> &'static [(&'static str, HandlerKind)] {
        HANDLERS
    }

    fn scope_for(&self, node: Node, ctx: &TraversalContext) -> Option<ScopeFrame> {
        match node.kind() {
            "namespace_definition" => Some(match ctx.field_text(node, "name") {
                Some(name) => ScopeFrame::named(ScopeKind::Namespace, name),
                None => ScopeFrame::anonymous(ScopeKind::Namespace),
            }),
            "class_specifier" | "struct_specifier" | "union_specifier" => {
                node.child_by_field_name("body")?;
                let access = if node.kind() == "class_specifier" {
                    Visibility::Private
                } else {
                    Visibility::Public
                };
                let frame = match class_name(ctx, node) {
                    Some(name) => ScopeFrame::named(ScopeKind::Class, strip_type_args(name)),
                    None => ScopeFrame::anonymous(ScopeKind::Class),
                };
                Some(frame.with_access(access))
            }
            "function_definition" => {
                let name = function_declarator(node)
                    .and_then(|d| d.child_by_field_name("declarator"))
                    .map(|n| ctx.text(n))?;
                Some(ScopeFrame::named(ScopeKind::Function, name))
            }
            "lambda_expression" => Some(ScopeFrame::anonymous(ScopeKind::Function)),
            "template_declaration" => Some(ScopeFrame::anonymous(ScopeKind::Template)),
            "ERROR" => unclosed_namespace(ctx, node).map(|name| ScopeFrame::named(ScopeKind::Namespace, name)),
            _ => None,
        }
    }

    fn handle_namespace(&self, node: Node, ctx: &mut TraversalContext) -> Extracted {
        let Some(name) = ctx.field_text(node, "name") else {
            return Extracted::Nothing;
        };
        let mut symbol = ctx.symbol(name, SymbolKind::Namespace, node);
        symbol.is_exported = true;
        symbol.into()
    }

    fn handle_class(&self, node: Node, ctx: &mut TraversalContext) -> Extracted {
        if ctx.in_function_body() {
            return Extracted::Nothing;
        }
        match node.kind() {
            "alias_declaration" => {
                let Some(name) = ctx.field_text(node, "name") else {
                    return Extracted::Nothing;
                };
                let mut symbol = ctx.symbol(name, SymbolKind::Typedef, node);
                symbol.return_type = ctx.field_text(node, "type").map(str::to_string);
                symbol.signature = Some(signature_before(ctx, node, None));
                return symbol.into();
            }
            "type_definition" => {
                let Some(name) = node
                    .child_by_field_name("declarator")
                    .map(|d| ctx.text(d).trim_start_matches(['*', '&']).to_string())
                else {
                    return Extracted::Nothing;
                };
                let mut symbol = ctx.symbol(&name, SymbolKind::Typedef, node);
                symbol.signature = Some(signature_before(ctx, node, None));
                return symbol.into();
            }
            _ => {}
        }

        // Forward declarations and elaborated type references have no body.
        let body = node.child_by_field_name("body");
        if body.is_none() {
            return Extracted::Nothing;
        }
        let Some(name) = class_name(ctx, node) else {
            return Extracted::Nothing;
        };
        let name = strip_type_args(name);
        let kind = match node.kind() {
            "class_specifier" => SymbolKind::Class,
            "enum_specifier" => SymbolKind::Enum,
            _ => SymbolKind::Struct,
        };

        let base_classes = child_of_kind(node, "base_class_clause")
            .map(|clause| type_names(ctx, clause, BASE_KINDS))
            .unwrap_or_default();
        let template_params = template_params(ctx, node);

        let mut symbol = ctx.symbol(&name, kind, node);
        symbol.signature = Some(signature_before(ctx, node, body));
        symbol.is_exported = symbol.visibility == Visibility::Public;
        symbol.language_features = Some(LanguageFeatures::Cpp(CppFeatures {
            is_template: !template_params.is_empty() || ctx.template_depth() > 0,
            template_params,
            base_classes,
            ..CppFeatures::default()
        }));
        symbol.into()
    }

    fn handle_function(&self, node: Node, ctx: &mut TraversalContext) -> Extracted {
        if ctx.in_function_body() {
            return Extracted::Nothing;
        }
        let Some(declarator) = function_declarator(node) else {
            return Extracted::Nothing;
        };
        self.function_symbol(node, declarator, ctx, true).into()
    }

    fn handle_variable(&self, node: Node, ctx: &mut TraversalContext) -> Extracted {
        if ctx.in_function_body() {
            return Extracted::Nothing;
        }
        if let Some(declarator) = function_declarator(node) {
            return self.function_symbol(node, declarator, ctx, false).into();
        }
        if node.kind() == "field_declaration" {
            self.field_symbols(node, ctx)
        } else {
            self.variable_symbols(node, ctx)
        }
    }

    fn handle_import(&self, node: Node, ctx: &mut TraversalContext) -> Extracted {
        let target = match node.kind() {
            "preproc_include" => ctx.field_text(node, "path").map(unquote),
            _ => {
                let mut cursor = node.walk();
                let found = node
                    .named_children(&mut cursor)
                    .find(|c| matches!(c.kind(), "identifier" | "qualified_identifier"))
                    .map(|c| ctx.text(c).to_string());
                found
            }
        };
        let Some(target) = target.filter(|t| !t.is_empty()) else {
            return Extracted::Nothing;
        };
        let line = ctx.location(node).line;
        let mut out = Extracted::Nothing;
        let mut symbol = ctx.symbol(&target, SymbolKind::Import, node);
        symbol.qualified_name = target.clone();
        symbol.signature = Some(ctx.text(node).trim().to_string());
        out.push_symbol(symbol);
        out.push_relationship(Relationship::new(ctx.current_owner(), target, RelationshipKind::Imports, line));
        out
    }

    fn handle_inheritance(&self, node: Node, ctx: &mut TraversalContext) -> Extracted {
        let line = ctx.location(node).line;
        let owner = ctx.current_owner();
        type_names(ctx, node, BASE_KINDS)
            .into_iter()
            .map(|base| Relationship::new(owner.clone(), base, RelationshipKind::Inherits, line))
            .collect::<Vec<_>>()
            .into()
    }

    fn handle_call(&self, node: Node, ctx: &mut TraversalContext) -> Extracted {
        let Some(function) = node.child_by_field_name("function") else {
            return Extracted::Nothing;
        };
        let callee = match function.kind() {
            "field_expression" => ctx.field_text(function, "field").map(str::to_string),
            "template_function" => ctx.field_text(function, "name").map(str::to_string),
            "identifier" | "qualified_identifier" => Some(strip_type_args(ctx.text(function))),
            _ => None,
        };
        let Some(callee) = callee.filter(|c| !c.is_empty()) else {
            return Extracted::Nothing;
        };
        let line = ctx.location(node).line;
        Relationship::new(ctx.current_owner(), callee, RelationshipKind::Calls, line).into()
    }

    fn handle_creation(&self, node: Node, ctx: &mut TraversalContext) -> Extracted {
        let Some(created) = ctx.field_text(node, "type").map(strip_type_args) else {
            return Extracted::Nothing;
        };
        let line = ctx.location(node).line;
        Relationship::new(ctx.current_owner(), created, RelationshipKind::Creates, line).into()
    }

    fn handle_access_specifier(&self, node: Node, ctx: &mut TraversalContext) -> Extracted {
        // Access keywords inside a base clause describe the inheritance, not the members.
        if node.parent().map(|p| p.kind()) != Some("field_declaration_list") {
            return Extracted::Nothing;
        }
        let visibility = match ctx.text(node).trim_end_matches(':').trim() {
            "public" => Visibility::Public,
            "protected" => Visibility::Protected,
            "private" => Visibility::Private,
            _ => return Extracted::Nothing,
        };
        ctx.set_access(visibility);
        Extracted::Nothing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::syntax::{SyntaxProvider, TreeSitterProvider};
    use crate::indexer::visitor::{traverse, TraversalOutput};

    fn extract(source: &str) -> TraversalOutput {
        let tree = TreeSitterProvider::new(Language::Cpp).parse(source).unwrap();
        traverse(&CppHandler, &tree, "test.cpp", source)
    }

    fn find<'a>(output: &'a TraversalOutput, qualified: &str) -> &'a Symbol {
        output
            .symbols
            .iter()
            .find(|s| s.qualified_name == qualified)
            .unwrap_or_else(|| panic!("missing {}", qualified))
    }

    #[test]
    fn test_nested_qualified_name() {
        let output = extract("namespace A { class B { void C(); }; }");
        let method = find(&output, "A::B::C");
        assert_eq!(method.kind, SymbolKind::Method);
        assert_eq!(method.namespace.as_deref(), Some("A"));
        assert_eq!(method.parent_scope.as_deref(), Some("A::B"));
        assert!(!method.is_definition);
        assert_eq!(method.visibility, Visibility::Private);
        assert_eq!(find(&output, "A::B").kind, SymbolKind::Class);
    }

    #[test]
    fn test_unclosed_namespace_keeps_its_prefix() {
        let output = extract("namespace A { class B { void C(); } ");
        assert!(output.stats.error_nodes > 0);
        assert_eq!(find(&output, "A::B").kind, SymbolKind::Class);
        let method = find(&output, "A::B::C");
        assert_eq!(method.parent_scope.as_deref(), Some("A::B"));
        assert!(output.symbols.iter().all(|s| s.qualified_name.starts_with("A::")));
    }

    #[test]
    fn test_qualified_name_is_deterministic() {
        let source = "namespace A { class B { void C(); }; }";
        let first: Vec<String> = extract(source).symbols.into_iter().map(|s| s.qualified_name).collect();
        let second: Vec<String> = extract(source).symbols.into_iter().map(|s| s.qualified_name).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_access_specifiers_and_special_members() {
        let source = r#"
class Widget : public Base, private Mixin {
public:
    Widget();
    ~Widget();
    virtual void draw() const override;
    bool operator==(const Widget& other) const;
private:
    int count_;
};
"#;
        let output = extract(source);
        assert_eq!(find(&output, "Widget::Widget").kind, SymbolKind::Constructor);
        assert_eq!(find(&output, "Widget::~Widget").kind, SymbolKind::Destructor);
        assert_eq!(find(&output, "Widget::operator==").kind, SymbolKind::Operator);

        let draw = find(&output, "Widget::draw");
        assert_eq!(draw.visibility, Visibility::Public);
        match &draw.language_features {
            Some(LanguageFeatures::Cpp(f)) => {
                assert!(f.is_virtual);
                assert!(f.is_const);
                assert!(f.is_override);
            }
            other => panic!("unexpected features {:?}", other),
        }

        assert_eq!(find(&output, "Widget::count_").visibility, Visibility::Private);

        let bases: Vec<&str> = output
            .relationships
            .iter()
            .filter(|r| r.kind == RelationshipKind::Inherits)
            .map(|r| r.to_name.as_str())
            .collect();
        assert_eq!(bases, vec!["Base", "Mixin"]);
        assert!(output
            .relationships
            .iter()
            .all(|r| r.kind != RelationshipKind::Inherits || r.from_name == "Widget"));
    }

    #[test]
    fn test_out_of_line_definition() {
        let source = r#"
namespace geo {
int Shape::area(int scale) {
    if (scale > 1 && valid()) {
        return scale * 2;
    }
    return compute(scale);
}
}
"#;
        let output = extract(source);
        let area = find(&output, "geo::Shape::area");
        assert_eq!(area.kind, SymbolKind::Method);
        assert_eq!(area.return_type.as_deref(), Some("int"));
        assert!(area.complexity >= 3);
        assert!(area.is_definition);

        let calls: Vec<&str> = output
            .relationships
            .iter()
            .filter(|r| r.kind == RelationshipKind::Calls)
            .map(|r| r.to_name.as_str())
            .collect();
        assert!(calls.contains(&"valid"));
        assert!(calls.contains(&"compute"));
        assert!(output
            .relationships
            .iter()
            .filter(|r| r.kind == RelationshipKind::Calls)
            .all(|r| r.from_name == "geo::Shape::area"));
    }

    #[test]
    fn test_templates_includes_and_creation() {
        let source = r#"
#include <vector>
#include "engine/core.h"

template <typename T>
class Pool {
public:
    T* make() { return new T(); }
};

struct Point { int x; int y; };
"#;
        let output = extract(source);
        let imports: Vec<&str> = output
            .symbols
            .iter()
            .filter(|s| s.kind == SymbolKind::Import)
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(imports, vec!["vector", "engine/core.h"]);

        match &find(&output, "Pool").language_features {
            Some(LanguageFeatures::Cpp(f)) => {
                assert!(f.is_template);
                assert_eq!(f.template_params, vec!["typename T".to_string()]);
            }
            other => panic!("unexpected features {:?}", other),
        }
        assert_eq!(find(&output, "Pool::make").visibility, Visibility::Public);
        assert_eq!(find(&output, "Point").kind, SymbolKind::Struct);
        assert_eq!(find(&output, "Point::x").visibility, Visibility::Public);
        assert!(output
            .relationships
            .iter()
            .any(|r| r.kind == RelationshipKind::Creates && r.to_name == "T"));
    }

    #[test]
    fn test_locals_are_not_symbols() {
        let output = extract("void run() { int local = 1; helper(local); }");
        assert_eq!(output.symbols.len(), 1);
        assert_eq!(output.symbols[0].name, "run");
        assert_eq!(output.symbols[0].kind, SymbolKind::Function);
    }
}

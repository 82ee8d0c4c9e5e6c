// Per-language extraction modules

pub mod cpp;
pub mod go;
pub mod java;
pub mod python;
pub mod rust;
pub mod typescript;

use tree_sitter::Node;

use crate::index::Language;
use crate::indexer::complexity;
use crate::indexer::visitor::{LanguageHandler, TraversalContext};

static CPP: cpp::CppHandler = cpp::CppHandler;
static TYPESCRIPT: typescript::TypeScriptHandler = typescript::TypeScriptHandler::new(Language::TypeScript);
static TSX: typescript::TypeScriptHandler = typescript::TypeScriptHandler::new(Language::Tsx);
static JAVASCRIPT: typescript::TypeScriptHandler = typescript::TypeScriptHandler::new(Language::JavaScript);
static PYTHON: python::PythonHandler = python::PythonHandler;
static RUST: rust::RustHandler = rust::RustHandler;
static GO: go::GoHandler = go::GoHandler;
static JAVA: java::JavaHandler = java::JavaHandler;

/// Extraction module registered for `language`
pub fn handler_for(language: Language) -> &'static dyn LanguageHandler {
    match language {
        Language::Cpp => &CPP,
        Language::TypeScript => &TYPESCRIPT,
        Language::Tsx => &TSX,
        Language::JavaScript => &JAVASCRIPT,
        Language::Python => &PYTHON,
        Language::Rust => &RUST,
        Language::Go => &GO,
        Language::Java => &JAVA,
    }
}

/// Complexity of a body node; declarations without a body score zero.
pub(crate) fn body_complexity(ctx: &TraversalContext, body: Option<Node>) -> u32 {
    match body {
        Some(body) => complexity::complexity(ctx.text(body)),
        None => 0,
    }
}

/// Split `a::b::c` into (`a::b`, `c`).
pub(crate) fn split_scoped<'s>(name: &'s str, separator: &str) -> (Option<&'s str>, &'s str) {
    match name.rsplit_once(separator) {
        Some((scope, last)) if !scope.is_empty() => (Some(scope), last),
        Some((_, last)) => (None, last),
        None => (None, name),
    }
}

/// Drop generic arguments: `Map<K, V>` becomes `Map`.
pub(crate) fn strip_type_args(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut depth = 0usize;
    for ch in name.chars() {
        match ch {
            '<' | '[' if !out.is_empty() || depth > 0 => depth += 1,
            '>' | ']' if depth > 0 => depth -= 1,
            _ if depth == 0 => out.push(ch),
            _ => {}
        }
    }
    out.trim().to_string()
}

pub(crate) fn unquote(literal: &str) -> String {
    literal
        .trim()
        .trim_matches(|c| matches!(c, '"' | '\'' | '`' | '<' | '>'))
        .to_string()
}

pub(crate) fn is_upper_snake(name: &str) -> bool {
    name.chars().any(|c| c.is_ascii_uppercase())
        && name
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

/// Type-ish names listed inside an inheritance clause.
pub(crate) fn type_names(ctx: &TraversalContext, clause: Node, kinds: &[&str]) -> Vec<String> {
    let mut cursor = clause.walk();
    clause
        .named_children(&mut cursor)
        .filter(|c| kinds.contains(&c.kind()))
        .map(|c| strip_type_args(ctx.text(c)))
        .filter(|name| !name.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_scoped() {
        assert_eq!(split_scoped("A::B::f", "::"), (Some("A::B"), "f"));
        assert_eq!(split_scoped("f", "::"), (None, "f"));
        assert_eq!(split_scoped("::f", "::"), (None, "f"));
    }

    #[test]
    fn test_strip_type_args() {
        assert_eq!(strip_type_args("Base<T, std::vector<int>>"), "Base");
        assert_eq!(strip_type_args("List[int]"), "List");
        assert_eq!(strip_type_args("Plain"), "Plain");
    }

    #[test]
    fn test_every_language_has_a_handler() {
        for language in Language::ALL {
            assert_eq!(handler_for(language).language(), language);
            assert!(!handler_for(language).node_handlers().is_empty());
        }
    }
}

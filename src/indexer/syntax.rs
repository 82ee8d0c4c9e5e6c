// Syntax providers: grammar binding and tree construction

use tree_sitter::{ParseOptions as TreeParseOptions, ParseState, Parser as TreeParser, Tree};

use crate::error::{Result, SentinelError};
use crate::index::Language;
use crate::indexer::cancel::CancelToken;

/// Produces concrete syntax trees for one language.
pub trait SyntaxProvider: Send + Sync {
    fn language(&self) -> Language;

    /// Checked before every parse; an unavailable provider sends the file to pattern extraction.
    fn is_available(&self) -> bool;

    fn parse(&self, content: &str) -> Result<Tree>;

    /// Like `parse`, but gives up with `SentinelError::Cancelled` once `cancel` is set.
    ///
    /// The default only checks before starting.
    fn parse_cancellable(&self, content: &str, cancel: &CancelToken) -> Result<Tree> {
        cancel.check()?;
        self.parse(content)
    }
}

/// Grammar handle for a language
pub fn grammar(language: Language) -> tree_sitter::Language {
    match language {
        Language::Cpp => tree_sitter_cpp::LANGUAGE.into(),
        Language::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
        Language::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
        Language::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
        Language::Python => tree_sitter_python::LANGUAGE.into(),
        Language::Rust => tree_sitter_rust::LANGUAGE.into(),
        Language::Go => tree_sitter_go::LANGUAGE.into(),
        Language::Java => tree_sitter_java::LANGUAGE.into(),
    }
}

/// Tree-sitter backed provider. Binding is attempted once, at construction.
pub struct TreeSitterProvider {
    language: Language,
    grammar: tree_sitter::Language,
    init_error: Option<String>,
}

impl TreeSitterProvider {
    pub fn new(language: Language) -> Self {
        let grammar = grammar(language);
        let init_error = TreeParser::new()
            .set_language(&grammar)
            .err()
            .map(|e| e.to_string());

        if let Some(reason) = &init_error {
            tracing::warn!("Grammar for {} failed to bind: {}", language, reason);
        }

        Self {
            language,
            grammar,
            init_error,
        }
    }

    pub fn init_error(&self) -> Option<&str> {
        self.init_error.as_deref()
    }
}

impl SyntaxProvider for TreeSitterProvider {
    fn language(&self) -> Language {
        self.language
    }

    fn is_available(&self) -> bool {
        self.init_error.is_none()
    }

    fn parse(&self, content: &str) -> Result<Tree> {
        self.parser()?
            .parse(content, None)
            .ok_or_else(|| self.no_tree())
    }

    fn parse_cancellable(&self, content: &str, cancel: &CancelToken) -> Result<Tree> {
        cancel.check()?;
        let mut parser = self.parser()?;
        let bytes = content.as_bytes();
        let len = bytes.len();
        // Polled every few hundred parser operations; `true` halts the parse.
        let mut halt = |_: &ParseState| cancel.is_cancelled();
        let options = TreeParseOptions::new().progress_callback(&mut halt);
        let tree = parser.parse_with_options(
            &mut |i, _| (i < len).then(|| &bytes[i..]).unwrap_or_default(),
            None,
            Some(options),
        );
        match tree {
            Some(tree) => Ok(tree),
            None if cancel.is_cancelled() => Err(SentinelError::Cancelled),
            None => Err(self.no_tree()),
        }
    }
}

impl TreeSitterProvider {
    // Parsers are not Sync, so each parse gets its own.
    fn parser(&self) -> Result<TreeParser> {
        let mut parser = TreeParser::new();
        parser
            .set_language(&self.grammar)
            .map_err(|e| SentinelError::GrammarUnavailable {
                language: self.language.to_string(),
                reason: e.to_string(),
            })?;
        Ok(parser)
    }

    fn no_tree(&self) -> SentinelError {
        SentinelError::ParseFailed {
            file: String::new(),
            reason: format!("{} parser returned no tree", self.language),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_grammar_binds() {
        for language in Language::ALL {
            let provider = TreeSitterProvider::new(language);
            assert!(provider.is_available(), "{} grammar should bind", language);
            assert_eq!(provider.language(), language);
        }
    }

    #[test]
    fn test_parse_produces_tree() {
        let provider = TreeSitterProvider::new(Language::Python);
        let tree = provider.parse("def f():\n    return 1\n").unwrap();
        assert_eq!(tree.root_node().kind(), "module");
        assert!(!tree.root_node().has_error());
    }

    #[test]
    fn test_cancellable_parse_halts_when_flagged() {
        let provider = TreeSitterProvider::new(Language::Python);
        let source: String = (0..2000)
            .map(|i| format!("def f_{i}(a, b):\n    return a + b * {i}\n\n"))
            .collect();

        let live = CancelToken::new();
        assert!(provider.parse_cancellable(&source, &live).is_ok());

        let cancelled = CancelToken::new();
        cancelled.cancel();
        assert!(matches!(
            provider.parse_cancellable(&source, &cancelled),
            Err(SentinelError::Cancelled)
        ));
    }

    #[test]
    fn test_halt_mid_parse() {
        let provider = TreeSitterProvider::new(Language::Python);
        let source: String = (0..2000)
            .map(|i| format!("def f_{i}(a, b):\n    return a + b * {i}\n\n"))
            .collect();
        let cancel = CancelToken::new();
        let bytes = source.as_bytes();
        let len = bytes.len();
        let mut parser = provider.parser().unwrap();

        // Flip the flag from inside the first progress check.
        let flag = cancel.clone();
        let mut checks = 0usize;
        let mut halt = |_: &ParseState| {
            checks += 1;
            flag.cancel();
            flag.is_cancelled()
        };
        let tree = parser.parse_with_options(
            &mut |i, _| (i < len).then(|| &bytes[i..]).unwrap_or_default(),
            None,
            Some(TreeParseOptions::new().progress_callback(&mut halt)),
        );
        assert!(tree.is_none());
        assert_eq!(checks, 1);
        assert!(cancel.is_cancelled());
    }

    #[test]
    fn test_parse_reports_syntax_errors_in_tree() {
        let provider = TreeSitterProvider::new(Language::Rust);
        let tree = provider.parse("fn broken( {").unwrap();
        assert!(tree.root_node().has_error());
    }
}

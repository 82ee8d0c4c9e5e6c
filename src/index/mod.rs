// Index data model shared by every extraction path

pub mod store;

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Languages with a registered extraction module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Cpp,
    TypeScript,
    Tsx,
    JavaScript,
    Python,
    Rust,
    Go,
    Java,
}

impl Language {
    pub const ALL: [Language; 8] = [
        Language::Cpp,
        Language::TypeScript,
        Language::Tsx,
        Language::JavaScript,
        Language::Python,
        Language::Rust,
        Language::Go,
        Language::Java,
    ];

    /// Detect the language from a file extension.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Self> {
        let ext = path.as_ref().extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "cpp" | "cc" | "cxx" | "c++" | "hpp" | "hh" | "hxx" | "h" | "ixx" | "cppm" | "inl" => {
                Some(Language::Cpp)
            }
            "ts" | "mts" | "cts" => Some(Language::TypeScript),
            "tsx" => Some(Language::Tsx),
            "js" | "jsx" | "mjs" | "cjs" => Some(Language::JavaScript),
            "py" | "pyi" => Some(Language::Python),
            "rs" => Some(Language::Rust),
            "go" => Some(Language::Go),
            "java" => Some(Language::Java),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Cpp => "cpp",
            Language::TypeScript => "typescript",
            Language::Tsx => "tsx",
            Language::JavaScript => "javascript",
            Language::Python => "python",
            Language::Rust => "rust",
            Language::Go => "go",
            Language::Java => "java",
        }
    }

    /// Runtime family, used to decide whether a bridge leaves the source language.
    pub fn runtime(&self) -> &'static str {
        match self {
            Language::Cpp => "cpp",
            Language::TypeScript | Language::Tsx | Language::JavaScript => "javascript",
            Language::Python => "python",
            Language::Rust => "rust",
            Language::Go => "go",
            Language::Java => "java",
        }
    }

    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Language::Cpp => &["cpp", "cc", "cxx", "hpp", "hh", "hxx", "h", "ixx", "cppm"],
            Language::TypeScript => &["ts", "mts", "cts"],
            Language::Tsx => &["tsx"],
            Language::JavaScript => &["js", "jsx", "mjs", "cjs"],
            Language::Python => &["py", "pyi"],
            Language::Rust => &["rs"],
            Language::Go => &["go"],
            Language::Java => &["java"],
        }
    }

    pub fn scope_separator(&self) -> &'static str {
        match self {
            Language::Cpp | Language::Rust => "::",
            _ => ".",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cpp" | "c++" | "cxx" => Ok(Language::Cpp),
            "typescript" | "ts" => Ok(Language::TypeScript),
            "tsx" => Ok(Language::Tsx),
            "javascript" | "js" | "jsx" => Ok(Language::JavaScript),
            "python" | "py" => Ok(Language::Python),
            "rust" | "rs" => Ok(Language::Rust),
            "go" | "golang" => Ok(Language::Go),
            "java" => Ok(Language::Java),
            other => Err(format!("Unsupported language: {}", other)),
        }
    }
}

/// Symbol kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Class,
    Struct,
    Interface,
    Enum,
    Function,
    Method,
    Constructor,
    Destructor,
    Operator,
    Field,
    Property,
    Variable,
    Constant,
    Namespace,
    Module,
    Typedef,
    Import,
    Export,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Class => "class",
            SymbolKind::Struct => "struct",
            SymbolKind::Interface => "interface",
            SymbolKind::Enum => "enum",
            SymbolKind::Function => "function",
            SymbolKind::Method => "method",
            SymbolKind::Constructor => "constructor",
            SymbolKind::Destructor => "destructor",
            SymbolKind::Operator => "operator",
            SymbolKind::Field => "field",
            SymbolKind::Property => "property",
            SymbolKind::Variable => "variable",
            SymbolKind::Constant => "constant",
            SymbolKind::Namespace => "namespace",
            SymbolKind::Module => "module",
            SymbolKind::Typedef => "typedef",
            SymbolKind::Import => "import",
            SymbolKind::Export => "export",
        }
    }

    /// Kinds that own a body worth measuring.
    pub fn is_function_like(&self) -> bool {
        matches!(
            self,
            SymbolKind::Function
                | SymbolKind::Method
                | SymbolKind::Constructor
                | SymbolKind::Destructor
                | SymbolKind::Operator
        )
    }

    pub fn is_type_like(&self) -> bool {
        matches!(
            self,
            SymbolKind::Class | SymbolKind::Struct | SymbolKind::Interface | SymbolKind::Enum
        )
    }
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Visibility levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Private,
    Protected,
    Internal,
}

/// Location in source code, 1-based
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub file: String,
    pub line: u32,
    pub column: u32,
    pub end_line: u32,
    pub end_column: u32,
}

impl Location {
    pub fn at_line(file: &str, line: u32, column: u32) -> Self {
        Self {
            file: file.to_string(),
            line,
            column,
            end_line: line,
            end_column: column,
        }
    }

    pub fn contains_line(&self, line: u32) -> bool {
        self.line <= line && line <= self.end_line
    }

    pub fn span(&self) -> u32 {
        self.end_line.saturating_sub(self.line)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CppFeatures {
    pub is_virtual: bool,
    pub is_pure_virtual: bool,
    pub is_static: bool,
    pub is_const: bool,
    pub is_override: bool,
    pub is_inline: bool,
    pub is_template: bool,
    pub template_params: Vec<String>,
    pub base_classes: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TypeScriptFeatures {
    pub decorators: Vec<String>,
    pub type_parameters: Vec<String>,
    pub extends: Vec<String>,
    pub implements: Vec<String>,
    pub is_abstract: bool,
    pub is_static: bool,
    pub is_readonly: bool,
    pub is_arrow_function: bool,
    pub is_generator: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PythonFeatures {
    pub decorators: Vec<String>,
    pub base_classes: Vec<String>,
    pub is_dunder: bool,
    pub is_property: bool,
    pub is_staticmethod: bool,
    pub is_classmethod: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RustFeatures {
    pub attributes: Vec<String>,
    pub derives: Vec<String>,
    pub generics: Vec<String>,
    pub trait_impl: Option<String>,
    pub is_unsafe: bool,
    pub is_const: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GoFeatures {
    pub receiver: Option<String>,
    pub is_pointer_receiver: bool,
    pub embedded: Vec<String>,
    pub type_parameters: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JavaFeatures {
    pub annotations: Vec<String>,
    pub modifiers: Vec<String>,
    pub extends: Option<String>,
    pub implements: Vec<String>,
    pub type_parameters: Vec<String>,
}

/// Language-specific payload carried alongside a symbol. The core never reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "language", rename_all = "snake_case")]
pub enum LanguageFeatures {
    Cpp(CppFeatures),
    TypeScript(TypeScriptFeatures),
    Python(PythonFeatures),
    Rust(RustFeatures),
    Go(GoFeatures),
    Java(JavaFeatures),
}

impl LanguageFeatures {
    /// Generic or template parameters, whichever the language calls them.
    pub fn type_parameters(&self) -> &[String] {
        match self {
            LanguageFeatures::Cpp(f) => &f.template_params,
            LanguageFeatures::TypeScript(f) => &f.type_parameters,
            LanguageFeatures::Python(_) => &[],
            LanguageFeatures::Rust(f) => &f.generics,
            LanguageFeatures::Go(f) => &f.type_parameters,
            LanguageFeatures::Java(f) => &f.type_parameters,
        }
    }

    pub fn decorators(&self) -> &[String] {
        match self {
            LanguageFeatures::TypeScript(f) => &f.decorators,
            LanguageFeatures::Python(f) => &f.decorators,
            LanguageFeatures::Rust(f) => &f.attributes,
            LanguageFeatures::Java(f) => &f.annotations,
            _ => &[],
        }
    }
}

/// A code symbol (function, type, variable, etc.)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Symbol {
    pub name: String,
    pub qualified_name: String,
    pub kind: SymbolKind,
    pub language: Language,
    pub location: Location,
    pub return_type: Option<String>,
    pub signature: Option<String>,
    pub visibility: Visibility,
    pub namespace: Option<String>,
    pub parent_scope: Option<String>,
    pub confidence: f32,
    pub complexity: u32,
    pub is_definition: bool,
    pub is_exported: bool,
    pub is_async: bool,
    pub language_features: Option<LanguageFeatures>,
}

impl Symbol {
    pub fn new(
        name: impl Into<String>,
        qualified_name: impl Into<String>,
        kind: SymbolKind,
        language: Language,
        location: Location,
    ) -> Self {
        Self {
            name: name.into(),
            qualified_name: qualified_name.into(),
            kind,
            language,
            location,
            return_type: None,
            signature: None,
            visibility: Visibility::Public,
            namespace: None,
            parent_scope: None,
            confidence: 1.0,
            complexity: 0,
            is_definition: true,
            is_exported: false,
            is_async: false,
            language_features: None,
        }
    }

    /// Identity used to drop duplicate records within one pass.
    pub fn dedup_key(&self) -> (String, String, u32, SymbolKind) {
        (
            self.name.clone(),
            self.location.file.clone(),
            self.location.line,
            self.kind,
        )
    }

    /// Parameter count read back from the signature.
    pub fn parameter_count(&self) -> usize {
        let Some(signature) = self.signature.as_deref() else {
            return 0;
        };
        let Some(open) = signature.find('(') else {
            return 0;
        };
        let mut depth = 0usize;
        let mut count = 0usize;
        let mut saw_token = false;
        for ch in signature[open + 1..].chars() {
            match ch {
                '(' | '<' | '[' | '{' => depth += 1,
                ')' | '>' | ']' | '}' if depth == 0 => break,
                ')' | '>' | ']' | '}' => depth -= 1,
                ',' if depth == 0 => {
                    if saw_token {
                        count += 1;
                    }
                    saw_token = false;
                    continue;
                }
                _ => {}
            }
            if !ch.is_whitespace() {
                saw_token = true;
            }
        }
        if saw_token {
            count += 1;
        }
        count
    }
}

/// Relationship kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipKind {
    Calls,
    Uses,
    Creates,
    Inherits,
    Implements,
    Imports,
    Exports,
    Spawns,
    Invokes,
    BindsTo,
    Communicates,
}

impl RelationshipKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipKind::Calls => "calls",
            RelationshipKind::Uses => "uses",
            RelationshipKind::Creates => "creates",
            RelationshipKind::Inherits => "inherits",
            RelationshipKind::Implements => "implements",
            RelationshipKind::Imports => "imports",
            RelationshipKind::Exports => "exports",
            RelationshipKind::Spawns => "spawns",
            RelationshipKind::Invokes => "invokes",
            RelationshipKind::BindsTo => "binds_to",
            RelationshipKind::Communicates => "communicates",
        }
    }
}

/// Mechanism behind a cross-language edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BridgeKind {
    Subprocess,
    RestApi,
    Rpc,
    Ffi,
    WebSocket,
    ServiceDiscovery,
}

impl BridgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BridgeKind::Subprocess => "subprocess",
            BridgeKind::RestApi => "rest_api",
            BridgeKind::Rpc => "rpc",
            BridgeKind::Ffi => "ffi",
            BridgeKind::WebSocket => "websocket",
            BridgeKind::ServiceDiscovery => "service_discovery",
        }
    }

    pub fn relationship_kind(&self) -> RelationshipKind {
        match self {
            BridgeKind::Subprocess => RelationshipKind::Spawns,
            BridgeKind::RestApi | BridgeKind::Rpc => RelationshipKind::Invokes,
            BridgeKind::Ffi => RelationshipKind::BindsTo,
            BridgeKind::WebSocket => RelationshipKind::Communicates,
            BridgeKind::ServiceDiscovery => RelationshipKind::Uses,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeMetadata {
    pub bridge: BridgeKind,
    pub target_language: Option<String>,
    pub target: Option<String>,
    pub detail: Option<String>,
}

/// Relationship between symbols. `to_name` is resolved by the store, not here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub from_name: String,
    pub to_name: String,
    pub kind: RelationshipKind,
    pub confidence: f32,
    pub cross_language: bool,
    pub line_number: u32,
    pub source_context: Option<String>,
    pub metadata: Option<BridgeMetadata>,
}

impl Relationship {
    pub fn new(
        from_name: impl Into<String>,
        to_name: impl Into<String>,
        kind: RelationshipKind,
        line_number: u32,
    ) -> Self {
        Self {
            from_name: from_name.into(),
            to_name: to_name.into(),
            kind,
            confidence: 1.0,
            cross_language: false,
            line_number,
            source_context: None,
            metadata: None,
        }
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.source_context = Some(context.into());
        self
    }

    pub fn dedup_key(&self) -> (String, String, RelationshipKind, u32) {
        (
            self.from_name.clone(),
            self.to_name.clone(),
            self.kind,
            self.line_number,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternType {
    DesignPattern,
    LanguageIdiom,
    AntiPattern,
}

/// Typed evidence for a detected pattern
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "pattern", rename_all = "snake_case")]
pub enum PatternDetails {
    Singleton {
        class_name: String,
        accessor: Option<String>,
    },
    Factory {
        creator: String,
        product: Option<String>,
    },
    Builder {
        class_name: String,
        setters: usize,
    },
    Observer {
        class_name: String,
        methods: Vec<String>,
    },
    Raii {
        class_name: String,
    },
    Async {
        function: String,
    },
    Generic {
        symbol: String,
        parameters: Vec<String>,
    },
    HighComplexity {
        function: String,
        complexity: u32,
    },
    LongParameterList {
        function: String,
        parameter_count: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    pub pattern_type: PatternType,
    pub pattern_name: String,
    pub confidence: f32,
    pub line_number: u32,
    pub symbol: Option<String>,
    pub details: PatternDetails,
}

/// Per-function branch summary
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ControlFlowSummary {
    pub symbol: String,
    pub start_line: u32,
    pub end_line: u32,
    pub conditionals: u32,
    pub loops: u32,
    pub switch_cases: u32,
    pub exception_handlers: u32,
    pub ternaries: u32,
    pub logical_operators: u32,
    pub early_returns: u32,
    pub complexity: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ParseMethod {
    TreeSitter,
    PatternFallback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum FallbackReason {
    ProviderUnavailable,
    GrammarUnavailable { message: String },
    ParseFailed { message: String },
    LowYield { tree_symbols: usize, bytes: usize },
}

/// Traversal diagnostics. Never fed back into extraction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParseStats {
    pub nodes_visited: usize,
    pub handler_calls: usize,
    pub max_depth: usize,
    pub error_nodes: usize,
    pub missing_nodes: usize,
    pub duplicates_dropped: usize,
    pub symbols: usize,
    pub relationships: usize,
    pub patterns: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseMetadata {
    pub parse_method: ParseMethod,
    pub fallback_reason: Option<FallbackReason>,
    pub parse_errors: Vec<String>,
    pub error_node_count: usize,
    pub from_cache: bool,
    pub content_hash: String,
    pub generated_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub project_id: Option<String>,
}

/// Everything extracted from one file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseResult {
    pub file_path: String,
    pub language: Language,
    pub symbols: Vec<Symbol>,
    pub relationships: Vec<Relationship>,
    pub patterns: Vec<Pattern>,
    pub control_flow: Vec<ControlFlowSummary>,
    pub stats: ParseStats,
    pub metadata: ParseMetadata,
}

impl ParseResult {
    pub fn empty(file_path: impl Into<String>, language: Language) -> Self {
        Self {
            file_path: file_path.into(),
            language,
            symbols: Vec::new(),
            relationships: Vec::new(),
            patterns: Vec::new(),
            control_flow: Vec::new(),
            stats: ParseStats::default(),
            metadata: ParseMetadata {
                parse_method: ParseMethod::TreeSitter,
                fallback_reason: None,
                parse_errors: Vec::new(),
                error_node_count: 0,
                from_cache: false,
                content_hash: String::new(),
                generated_at: Utc::now(),
                duration_ms: 0,
                project_id: None,
            },
        }
    }

    pub fn used_fallback(&self) -> bool {
        self.metadata.parse_method == ParseMethod::PatternFallback
    }

    pub fn find_symbol(&self, qualified_name: &str) -> Option<&Symbol> {
        self.symbols.iter().find(|s| s.qualified_name == qualified_name)
    }

    /// Innermost symbol whose range covers `line`, preferring function-like ones.
    pub fn enclosing_symbol(&self, line: u32) -> Option<&Symbol> {
        enclosing_symbol(&self.symbols, line)
    }
}

pub fn enclosing_symbol(symbols: &[Symbol], line: u32) -> Option<&Symbol> {
    let covering = |function_only: bool| {
        symbols
            .iter()
            .filter(|s| s.location.contains_line(line))
            .filter(|s| !function_only || s.kind.is_function_like())
            .filter(|s| s.kind != SymbolKind::Import)
            .min_by_key(|s| s.location.span())
    };
    covering(true).or_else(|| covering(false))
}

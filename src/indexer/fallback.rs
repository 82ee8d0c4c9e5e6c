// Pattern-based fallback extraction
//
// Line scanner used when no syntax tree is available or the tree walk came back
// nearly empty. Brace depth (indentation for Python) drives a scope stack so
// nested declarations still get qualified names.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::debug;

use crate::index::{
    CppFeatures, GoFeatures, JavaFeatures, Language, LanguageFeatures, Location, PythonFeatures,
    Relationship, RelationshipKind, RustFeatures, Symbol, SymbolKind, TypeScriptFeatures,
    Visibility,
};
use crate::indexer::complexity;
use crate::indexer::languages::{is_upper_snake, split_scoped, strip_type_args};
use crate::indexer::visitor::{ScopeKind, TraversalOutput};

/// A line pattern and what a match produces
struct Rule {
    kind: Option<SymbolKind>,
    regex: Regex,
    scope: Option<ScopeKind>,
    confidence: f32,
    class_only: bool,
    root: bool,
}

impl Rule {
    fn new(kind: SymbolKind, pattern: &str, confidence: f32) -> Self {
        Self {
            kind: Some(kind),
            regex: Regex::new(pattern).expect("fallback rule pattern"),
            scope: None,
            confidence,
            class_only: false,
            root: false,
        }
    }

    /// Opens a scope without emitting a symbol (Rust `impl` blocks).
    fn scope_only(pattern: &str, scope: ScopeKind, confidence: f32) -> Self {
        Self {
            kind: None,
            scope: Some(scope),
            ..Self::new(SymbolKind::Class, pattern, confidence)
        }
    }

    /// Names the package every qualified name in the file starts from.
    fn package(pattern: &str) -> Self {
        Self {
            kind: None,
            root: true,
            ..Self::new(SymbolKind::Namespace, pattern, 0.9)
        }
    }

    fn scoped(mut self, scope: ScopeKind) -> Self {
        self.scope = Some(scope);
        self
    }

    fn in_class(mut self) -> Self {
        self.class_only = true;
        self
    }
}

static CPP_RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
    vec![
        Rule::new(SymbolKind::Import, r#"^\s*#\s*include\s*[<"](?P<name>[^>"]+)[>"]"#, 0.9),
        Rule::new(SymbolKind::Namespace, r"^\s*(?:inline\s+)?namespace\s+(?P<name>[A-Za-z_][\w:]*)\s*\{?\s*$", 0.85)
            .scoped(ScopeKind::Namespace),
        Rule::new(
            SymbolKind::Class,
            r"^\s*(?:template\s*<[^>]*>\s*)?(?P<kw>class|struct|union)\s+(?:[A-Z_][A-Z0-9_]*\s+)?(?P<name>[A-Za-z_]\w*)\s*(?:final\s*)?(?::\s*(?P<bases>[^{;]+))?\s*\{?\s*$",
            0.85,
        )
        .scoped(ScopeKind::Class),
        Rule::new(SymbolKind::Enum, r"^\s*enum\s+(?:class\s+|struct\s+)?(?P<name>[A-Za-z_]\w*)", 0.85),
        Rule::new(SymbolKind::Typedef, r"^\s*using\s+(?P<name>[A-Za-z_]\w*)\s*=", 0.8),
        Rule::new(SymbolKind::Typedef, r"^\s*typedef\s+.+?\s+(?P<name>[A-Za-z_]\w*)\s*;", 0.8),
        Rule::new(
            SymbolKind::Function,
            r"^\s*(?:template\s*<[^>]*>\s*)?(?:(?:static|inline|virtual|explicit|constexpr|extern|friend)\s+)*(?:[\w:<>,\*&]+[\s\*&]+)*(?P<name>~?[A-Za-z_][\w:]*(?:operator\s*[^\s(]+)?)\s*\([^;{]*\)\s*(?:const\s*)?(?:noexcept\s*)?(?:override\s*)?(?:final\s*)?(?:->\s*[\w:<>]+\s*)?(?:=\s*(?:0|default|delete)\s*)?[{;]?\s*$",
            0.75,
        )
        .scoped(ScopeKind::Function),
    ]
});

static TS_RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
    vec![
        Rule::new(SymbolKind::Import, r#"^\s*import\s+(?:type\s+)?(?:.+?\s+from\s+)?['"](?P<name>[^'"]+)['"]"#, 0.9),
        Rule::new(
            SymbolKind::Import,
            r#"^\s*(?:const|let|var)\s+.+?=\s*require\(\s*['"](?P<name>[^'"]+)['"]\s*\)"#,
            0.85,
        ),
        Rule::new(
            SymbolKind::Interface,
            r"^\s*(?:export\s+)?(?:default\s+)?(?:declare\s+)?interface\s+(?P<name>[A-Za-z_$][\w$]*)(?:\s*<[^>{]*>)?(?:\s+extends\s+(?P<bases>[^{]+))?\s*\{?",
            0.85,
        )
        .scoped(ScopeKind::Class),
        Rule::new(
            SymbolKind::Class,
            r"^\s*(?:export\s+)?(?:default\s+)?(?:declare\s+)?(?:abstract\s+)?class\s+(?P<name>[A-Za-z_$][\w$]*)(?:\s*<[^>{]*>)?(?:\s+extends\s+(?P<bases>[\w$.]+)(?:<[^>{]*>)?)?(?:\s+implements\s+(?P<ifaces>[^{]+))?\s*\{?",
            0.85,
        )
        .scoped(ScopeKind::Class),
        Rule::new(SymbolKind::Enum, r"^\s*(?:export\s+)?(?:declare\s+)?(?:const\s+)?enum\s+(?P<name>[A-Za-z_$][\w$]*)", 0.85),
        Rule::new(SymbolKind::Typedef, r"^\s*(?:export\s+)?(?:declare\s+)?type\s+(?P<name>[A-Za-z_$][\w$]*)(?:\s*<[^>]*>)?\s*=", 0.8),
        Rule::new(
            SymbolKind::Namespace,
            r"^\s*(?:export\s+)?(?:declare\s+)?(?:namespace|module)\s+(?P<name>[A-Za-z_$][\w$.]*)\s*\{?\s*$",
            0.8,
        )
        .scoped(ScopeKind::Namespace),
        Rule::new(
            SymbolKind::Function,
            r"^\s*(?:export\s+)?(?:default\s+)?(?:declare\s+)?(?:async\s+)?function\s*\*?\s*(?P<name>[A-Za-z_$][\w$]*)",
            0.85,
        )
        .scoped(ScopeKind::Function),
        Rule::new(
            SymbolKind::Function,
            r"^\s*(?:export\s+)?(?:const|let|var)\s+(?P<name>[A-Za-z_$][\w$]*)\s*(?::[^=]+)?=\s*(?:async\s+)?(?:\([^)]*\)|[A-Za-z_$][\w$]*)\s*(?::\s*[^=]+)?=>",
            0.8,
        )
        .scoped(ScopeKind::Function),
        Rule::new(
            SymbolKind::Function,
            r"^\s*(?:export\s+)?(?:const|let|var)\s+(?P<name>[A-Za-z_$][\w$]*)\s*=\s*(?:async\s+)?function\b",
            0.8,
        )
        .scoped(ScopeKind::Function),
        Rule::new(
            SymbolKind::Method,
            r"^\s*(?:(?:public|private|protected|static|abstract|override|async|get|set)\s+)*\*?(?P<name>[A-Za-z_$#][\w$]*)\s*(?:<[^>]*>)?\s*\([^)]*\)\s*(?::\s*[^{;]+)?\s*[{;]?\s*$",
            0.75,
        )
        .scoped(ScopeKind::Function)
        .in_class(),
        Rule::new(
            SymbolKind::Field,
            r"^\s*(?:(?:public|private|protected|static|readonly|declare)\s+)*(?P<name>[A-Za-z_$#][\w$]*)\s*[?!]?\s*(?::\s*[^=;]+)?(?:=\s*[^;]+)?;\s*$",
            0.7,
        )
        .in_class(),
        Rule::new(SymbolKind::Variable, r"^\s*(?:export\s+)?(?:const|let|var)\s+(?P<name>[A-Za-z_$][\w$]*)", 0.7),
    ]
});

static PYTHON_RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
    vec![
        Rule::new(SymbolKind::Import, r"^\s*import\s+(?P<name>[\w.]+)", 0.9),
        Rule::new(SymbolKind::Import, r"^\s*from\s+(?P<name>[\w.]+)\s+import\b", 0.9),
        Rule::new(SymbolKind::Class, r"^\s*class\s+(?P<name>[A-Za-z_]\w*)\s*(?:\((?P<bases>[^)]*)\))?\s*:", 0.85)
            .scoped(ScopeKind::Class),
        Rule::new(SymbolKind::Function, r"^\s*(?:async\s+)?def\s+(?P<name>[A-Za-z_]\w*)\s*\(", 0.85)
            .scoped(ScopeKind::Function),
        Rule::new(SymbolKind::Field, r"^\s+(?P<name>[A-Za-z_]\w*)\s*(?::[^=]+)?=[^=]", 0.7).in_class(),
        Rule::new(SymbolKind::Variable, r"^(?P<name>[A-Za-z_]\w*)\s*(?::[^=]+)?=[^=]", 0.7),
    ]
});

static RUST_RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
    const VIS: &str = r"^\s*(?:pub(?:\([^)]*\))?\s+)?";
    vec![
        Rule::new(SymbolKind::Import, &format!(r"{}use\s+(?P<name>[\w:]+)", VIS), 0.9),
        Rule::new(SymbolKind::Module, &format!(r"{}mod\s+(?P<name>\w+)", VIS), 0.85).scoped(ScopeKind::Namespace),
        Rule::new(SymbolKind::Struct, &format!(r"{}(?:struct|union)\s+(?P<name>\w+)", VIS), 0.85)
            .scoped(ScopeKind::Class),
        Rule::new(SymbolKind::Enum, &format!(r"{}enum\s+(?P<name>\w+)", VIS), 0.85).scoped(ScopeKind::Class),
        Rule::new(
            SymbolKind::Interface,
            &format!(r"{}(?:unsafe\s+)?trait\s+(?P<name>\w+)(?:\s*<[^>]*>)?(?:\s*:\s*(?P<bases>[^{{]+))?", VIS),
            0.85,
        )
        .scoped(ScopeKind::Class),
        Rule::scope_only(
            r"^\s*(?:unsafe\s+)?impl(?:\s*<[^>]*>)?\s+(?:(?P<ifaces>[\w:]+)(?:<[^>]*>)?\s+for\s+)?&?(?P<name>[\w:]+)",
            ScopeKind::Class,
            0.8,
        ),
        Rule::new(
            SymbolKind::Function,
            &format!(r#"{}(?:const\s+)?(?:async\s+)?(?:unsafe\s+)?(?:extern\s+"[^"]*"\s+)?fn\s+(?P<name>\w+)"#, VIS),
            0.85,
        )
        .scoped(ScopeKind::Function),
        Rule::new(
            SymbolKind::Constant,
            &format!(r"{}(?:const|static)\s+(?:mut\s+)?(?P<name>[A-Za-z_]\w*)\s*:", VIS),
            0.8,
        ),
        Rule::new(SymbolKind::Typedef, &format!(r"{}type\s+(?P<name>\w+)", VIS), 0.8),
    ]
});

static GO_RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
    vec![
        Rule::package(r"^\s*package\s+(?P<name>\w+)"),
        Rule::new(SymbolKind::Import, r#"^\s*import\s+(?:[\w.]+\s+)?"(?P<name>[^"]+)""#, 0.9),
        Rule::new(SymbolKind::Struct, r"^\s*type\s+(?P<name>\w+)(?:\[[^\]]*\])?\s+struct\b", 0.85)
            .scoped(ScopeKind::Class),
        Rule::new(SymbolKind::Interface, r"^\s*type\s+(?P<name>\w+)(?:\[[^\]]*\])?\s+interface\b", 0.85)
            .scoped(ScopeKind::Class),
        Rule::new(SymbolKind::Typedef, r"^\s*type\s+(?P<name>\w+)\s", 0.8),
        Rule::new(
            SymbolKind::Method,
            r"^\s*func\s+\(\s*\w*\s*\*?(?P<recv>\w+)(?:\[[^\]]*\])?\s*\)\s*(?P<name>\w+)",
            0.85,
        )
        .scoped(ScopeKind::Function),
        Rule::new(SymbolKind::Function, r"^\s*func\s+(?P<name>\w+)", 0.85).scoped(ScopeKind::Function),
        Rule::new(SymbolKind::Constant, r"^\s*const\s+(?P<name>\w+)", 0.75),
        Rule::new(SymbolKind::Variable, r"^\s*var\s+(?P<name>\w+)", 0.75),
        Rule::new(SymbolKind::Method, r"^\s*(?P<name>[A-Za-z_]\w*)\s*\(", 0.7).in_class(),
        Rule::new(SymbolKind::Field, r"^\s*(?P<name>[A-Za-z_]\w*)\s+[^\s/(]", 0.7).in_class(),
    ]
});

static JAVA_RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
    const MODS: &str = r"^\s*(?:(?:public|private|protected|static|abstract|final|sealed|non-sealed|strictfp)\s+)*";
    vec![
        Rule::package(r"^\s*package\s+(?P<name>[\w.]+)\s*;"),
        Rule::new(SymbolKind::Import, r"^\s*import\s+(?:static\s+)?(?P<name>[\w.]+(?:\.\*)?)\s*;", 0.9),
        Rule::new(
            SymbolKind::Interface,
            &format!(r"{}@?interface\s+(?P<name>\w+)(?:\s*<[^>{{]*>)?(?:\s+extends\s+(?P<bases>[^{{]+))?", MODS),
            0.85,
        )
        .scoped(ScopeKind::Class),
        Rule::new(
            SymbolKind::Class,
            &format!(
                r"{}class\s+(?P<name>\w+)(?:\s*<[^>{{]*>)?(?:\s+extends\s+(?P<bases>[\w.]+)(?:<[^>{{]*>)?)?(?:\s+implements\s+(?P<ifaces>[^{{]+))?",
                MODS
            ),
            0.85,
        )
        .scoped(ScopeKind::Class),
        Rule::new(
            SymbolKind::Enum,
            &format!(r"{}enum\s+(?P<name>\w+)(?:\s+implements\s+(?P<ifaces>[^{{]+))?", MODS),
            0.85,
        )
        .scoped(ScopeKind::Class),
        Rule::new(SymbolKind::Struct, &format!(r"{}record\s+(?P<name>\w+)", MODS), 0.85).scoped(ScopeKind::Class),
        Rule::new(
            SymbolKind::Constructor,
            r"^\s*(?:(?:public|private|protected)\s+)?(?P<name>[A-Z]\w*)\s*\([^)]*\)\s*(?:throws\s+[\w.,\s]+)?\{?\s*$",
            0.8,
        )
        .scoped(ScopeKind::Function)
        .in_class(),
        Rule::new(
            SymbolKind::Method,
            r"^\s*(?:(?:public|private|protected|static|final|abstract|synchronized|native|default)\s+)*(?:<[^>]+>\s+)?[\w.<>\[\],?]+(?:\s*<[^>]*>)?(?:\[\])*\s+(?P<name>\w+)\s*\([^)]*\)\s*(?:throws\s+[\w.,\s]+)?[{;]?\s*$",
            0.8,
        )
        .scoped(ScopeKind::Function)
        .in_class(),
        Rule::new(
            SymbolKind::Field,
            r"^\s*(?:(?:public|private|protected|static|final|transient|volatile)\s+)*[\w.<>\[\],?]+(?:\s*<[^>]*>)?\s+(?P<name>\w+)\s*(?:=[^;]*)?;\s*$",
            0.7,
        )
        .in_class(),
    ]
});

static DECORATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*@(?P<name>[\w.]+)").expect("decorator pattern"));
static RUST_ATTRIBUTE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*#\[(?P<name>.+)\]\s*$").expect("attribute pattern"));
static ACCESS_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?P<name>public|private|protected)\s*:").expect("access pattern"));
static GO_IMPORT_BLOCK: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*import\s*\(\s*$").expect("import block pattern"));
static GO_IMPORT_SPEC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^\s*(?:[\w.]+\s+)?"(?P<name>[^"]+)""#).expect("import spec pattern"));

/// Leading words that mark a statement, never a declaration.
const STATEMENT_WORDS: &[&str] = &[
    "if", "else", "for", "while", "do", "switch", "case", "return", "throw", "catch", "try",
    "delete", "new", "goto", "elif", "except", "with", "match", "loop", "yield", "await",
    "sizeof", "typeof", "defer", "go", "select", "break", "continue",
];

const PYTHON_OPERATORS: &[&str] = &[
    "__eq__", "__ne__", "__lt__", "__le__", "__gt__", "__ge__", "__add__", "__sub__", "__mul__",
    "__truediv__", "__mod__", "__getitem__", "__setitem__", "__contains__", "__call__",
];

fn rules_for(language: Language) -> &'static [Rule] {
    match language {
        Language::Cpp => &CPP_RULES,
        Language::TypeScript | Language::Tsx | Language::JavaScript => &TS_RULES,
        Language::Python => &PYTHON_RULES,
        Language::Rust => &RUST_RULES,
        Language::Go => &GO_RULES,
        Language::Java => &JAVA_RULES,
    }
}

struct Frame {
    kind: ScopeKind,
    name: Option<String>,
    /// Brace depth inside the body; indentation column for Python.
    level: usize,
    start: usize,
    symbol: Option<usize>,
    access: Option<Visibility>,
    trait_impl: Option<String>,
}

struct Pending {
    frame: Frame,
    line: usize,
}

struct Scanner<'a> {
    file_path: &'a str,
    language: Language,
    separator: &'static str,
    lines: Vec<&'a str>,
    rules: &'static [Rule],
    root: Option<String>,
    frames: Vec<Frame>,
    pending: Option<Pending>,
    depth: usize,
    decorators: Vec<String>,
    in_import_block: bool,
    output: TraversalOutput,
    seen_symbols: HashSet<(String, String, u32, SymbolKind)>,
}

/// Extract declarations from `content` line by line.
///
/// Every record carries a confidence below 1.0. Function-like symbols get an end
/// line and complexity once their scope closes.
pub fn extract(content: &str, file_path: &str, language: Language) -> TraversalOutput {
    let mut scanner = Scanner {
        file_path,
        language,
        separator: language.scope_separator(),
        lines: content.lines().collect(),
        rules: rules_for(language),
        root: None,
        frames: Vec::new(),
        pending: None,
        depth: 0,
        decorators: Vec::new(),
        in_import_block: false,
        output: TraversalOutput::default(),
        seen_symbols: HashSet::new(),
    };
    if language == Language::Python {
        scanner.scan_indented();
    } else {
        scanner.scan_braced();
    }

    let mut output = scanner.output;
    output.stats.symbols = output.symbols.len();
    output.stats.relationships = output.relationships.len();
    debug!(
        "Fallback extraction for {}: {} symbols, {} relationships",
        file_path,
        output.symbols.len(),
        output.relationships.len()
    );
    output
}

impl<'a> Scanner<'a> {
    fn scan_braced(&mut self) {
        let mut in_block_comment = false;
        for idx in 0..self.lines.len() {
            let raw = self.lines[idx];
            self.output.stats.nodes_visited += 1;
            let starts_in_comment = in_block_comment;
            let code = strip_code(raw, &mut in_block_comment, self.language);
            let trimmed = raw.trim();
            let comment_line = trimmed.starts_with("//") || trimmed.starts_with("/*") || trimmed.starts_with('*');
            if !starts_in_comment && !comment_line && !trimmed.is_empty() {
                if let Some(frame) = self.match_line(idx, raw) {
                    self.pending = Some(Pending { frame, line: idx });
                }
            }
            self.track_braces(idx, &code);
        }
        let last = self.lines.len().saturating_sub(1);
        while !self.frames.is_empty() {
            self.close_frame(last);
        }
    }

    fn track_braces(&mut self, idx: usize, code: &str) {
        for ch in code.chars() {
            match ch {
                '{' => {
                    self.depth += 1;
                    if let Some(Pending { mut frame, .. }) = self.pending.take() {
                        frame.level = self.depth;
                        self.frames.push(frame);
                    }
                }
                '}' => {
                    if self.frames.last().map(|f| f.level == self.depth).unwrap_or(false) {
                        self.close_frame(idx);
                    }
                    self.depth = self.depth.saturating_sub(1);
                }
                _ => {}
            }
        }
        // A declaration may open its body on the next line, never later.
        let stale = match &self.pending {
            Some(p) => {
                let end = code.trim_end();
                end.ends_with(';') || end.ends_with('}') || p.line < idx
            }
            None => false,
        };
        if stale {
            self.pending = None;
        }
    }

    fn scan_indented(&mut self) {
        let mut in_docstring = false;
        let mut last_code = 0;
        for idx in 0..self.lines.len() {
            let raw = self.lines[idx];
            self.output.stats.nodes_visited += 1;
            let trimmed = raw.trim();
            let quotes = trimmed.matches("\"\"\"").count() + trimmed.matches("'''").count();
            if in_docstring {
                if quotes % 2 == 1 {
                    in_docstring = false;
                }
                continue;
            }
            if trimmed.starts_with("\"\"\"") || trimmed.starts_with("'''") {
                in_docstring = quotes == 1;
                continue;
            }
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let indent = indentation(raw);
            while self.frames.last().map(|f| f.level >= indent).unwrap_or(false) {
                self.close_frame(last_code);
            }
            if let Some(mut frame) = self.match_line(idx, raw) {
                frame.level = indent;
                self.frames.push(frame);
            }
            last_code = idx;
        }
        while !self.frames.is_empty() {
            self.close_frame(last_code);
        }
    }

    fn close_frame(&mut self, end: usize) {
        let Some(frame) = self.frames.pop() else {
            return;
        };
        let Some(symbol) = frame.symbol.and_then(|i| self.output.symbols.get_mut(i)) else {
            return;
        };
        symbol.location.end_line = end as u32 + 1;
        if symbol.kind.is_function_like() {
            let body = self.lines[frame.start..=end.max(frame.start)].join("\n");
            symbol.complexity = complexity::complexity(&body);
        }
    }

    fn in_class(&self) -> bool {
        self.frames.last().map(|f| f.kind == ScopeKind::Class).unwrap_or(false)
    }

    fn in_function(&self) -> bool {
        self.frames.iter().any(|f| f.kind == ScopeKind::Function)
    }

    fn enclosing_class(&self) -> Option<&str> {
        self.frames
            .iter()
            .rev()
            .find(|f| f.kind == ScopeKind::Class)
            .and_then(|f| f.name.as_deref())
    }

    fn scope_path(&self) -> Vec<&str> {
        self.root
            .as_deref()
            .into_iter()
            .chain(self.frames.iter().filter_map(|f| f.name.as_deref()))
            .collect()
    }

    fn qualify(&self, name: &str) -> String {
        let mut parts = self.scope_path();
        parts.push(name);
        parts.join(self.separator)
    }

    fn owner(&self) -> String {
        let parts = self.scope_path();
        if parts.is_empty() {
            self.file_path.to_string()
        } else {
            parts.join(self.separator)
        }
    }

    fn namespace(&self) -> Option<String> {
        let parts: Vec<&str> = self
            .root
            .as_deref()
            .into_iter()
            .chain(
                self.frames
                    .iter()
                    .filter(|f| f.kind == ScopeKind::Namespace)
                    .filter_map(|f| f.name.as_deref()),
            )
            .collect();
        (!parts.is_empty()).then(|| parts.join(self.separator))
    }

    /// Decorator, attribute and access-label lines only update scanner state.
    fn consume_marker(&mut self, idx: usize, raw: &str) -> bool {
        match self.language {
            Language::Python | Language::TypeScript | Language::Tsx | Language::JavaScript | Language::Java => {
                if let Some(caps) = DECORATOR.captures(raw) {
                    self.decorators.push(caps["name"].to_string());
                    return !raw.trim_start().starts_with("@interface");
                }
            }
            Language::Rust => {
                if let Some(caps) = RUST_ATTRIBUTE.captures(raw) {
                    self.decorators.push(caps["name"].trim().to_string());
                    return true;
                }
            }
            Language::Cpp => {
                if let Some(caps) = ACCESS_LABEL.captures(raw) {
                    let access = match &caps["name"] {
                        "private" => Visibility::Private,
                        "protected" => Visibility::Protected,
                        _ => Visibility::Public,
                    };
                    if let Some(frame) = self.frames.iter_mut().rev().find(|f| f.kind == ScopeKind::Class) {
                        frame.access = Some(access);
                    }
                    return true;
                }
            }
            Language::Go => {
                if self.in_import_block {
                    if raw.trim_start().starts_with(')') {
                        self.in_import_block = false;
                    } else if let Some(caps) = GO_IMPORT_SPEC.captures(raw) {
                        let module = caps["name"].to_string();
                        self.emit_import(module, idx as u32 + 1, 0.9);
                    }
                    return true;
                }
                if GO_IMPORT_BLOCK.is_match(raw) {
                    self.in_import_block = true;
                    return true;
                }
            }
        }
        false
    }

    fn match_line(&mut self, idx: usize, raw: &str) -> Option<Frame> {
        if self.consume_marker(idx, raw) {
            return None;
        }
        let decorators = std::mem::take(&mut self.decorators);
        if self.in_function() {
            return None;
        }
        let first_word = raw
            .trim_start()
            .split(|c: char| !c.is_alphanumeric() && c != '_')
            .next()
            .unwrap_or_default();
        if STATEMENT_WORDS.contains(&first_word) {
            return None;
        }

        let in_class = self.in_class();
        for rule in self.rules {
            if rule.class_only && !in_class {
                continue;
            }
            let Some(caps) = rule.regex.captures(raw) else {
                continue;
            };
            let Some(name) = caps.name("name").map(|m| m.as_str().trim().trim_end_matches("::")) else {
                continue;
            };
            if name.is_empty() || STATEMENT_WORDS.contains(&name) {
                continue;
            }
            self.output.stats.handler_calls += 1;

            if rule.root {
                self.root = Some(name.to_string());
                return None;
            }
            if rule.kind == Some(SymbolKind::Constructor) && self.enclosing_class() != Some(name) {
                continue;
            }
            return self.apply(rule, &caps, name, idx, raw, decorators);
        }
        None
    }

    fn apply(
        &mut self,
        rule: &Rule,
        caps: &Captures,
        name: &str,
        idx: usize,
        raw: &str,
        decorators: Vec<String>,
    ) -> Option<Frame> {
        let line = idx as u32 + 1;
        let bases = caps.name("bases").map(|m| split_types(m.as_str())).unwrap_or_default();
        let ifaces = caps.name("ifaces").map(|m| split_types(m.as_str())).unwrap_or_default();

        let Some(base_kind) = rule.kind else {
            // Scope-only rule: an impl block attaches to its type.
            let target = split_scoped(name, "::").1.to_string();
            let qualified = self.qualify(&target);
            let trait_impl = ifaces.first().cloned();
            for iface in ifaces {
                self.output.relationships.push(
                    Relationship::new(qualified.clone(), iface, RelationshipKind::Implements, line)
                        .with_confidence(rule.confidence),
                );
            }
            return rule.scope.map(|kind| Frame {
                trait_impl,
                ..frame(kind, Some(target), idx, None)
            });
        };

        if base_kind == SymbolKind::Import {
            self.emit_import(name.to_string(), line, rule.confidence);
            return None;
        }

        // Member names may carry their own scope: C++ `A::B::f`, Go `(s *Server) Start`.
        let full = match caps.name("recv") {
            Some(recv) => format!("{}{}{}", recv.as_str(), self.separator, name),
            None => name.to_string(),
        };
        let (member_scope, last) = split_scoped(&full, self.separator);
        let last = last.to_string();
        let kind = self.resolve_kind(base_kind, caps, member_scope, &last, raw);

        let mut symbol = Symbol::new(
            last.clone(),
            self.qualify(&full),
            kind,
            self.language,
            Location::at_line(self.file_path, line, indentation(raw) as u32 + 1),
        );
        symbol.confidence = rule.confidence;
        symbol.namespace = self.namespace();
        symbol.parent_scope = match member_scope {
            Some(scope) => Some(self.qualify(scope)),
            None => {
                let parts = self.scope_path();
                (!parts.is_empty()).then(|| parts.join(self.separator))
            }
        };
        symbol.signature = Some(raw.trim().trim_end_matches('{').trim_end().to_string());
        symbol.visibility = self.visibility(&last, raw);
        symbol.is_exported = match self.language {
            Language::TypeScript | Language::Tsx | Language::JavaScript => raw.trim_start().starts_with("export"),
            _ => symbol.visibility == Visibility::Public,
        };
        symbol.is_async = raw.contains("async ");
        let declaration_only = raw.trim_end().ends_with(';') && !raw.contains("=>");
        if kind.is_function_like() && declaration_only {
            symbol.is_definition = false;
        }
        symbol.language_features = self.features(raw, decorators, &bases, &ifaces, caps);

        let qualified = symbol.qualified_name.clone();
        let dedup = symbol.dedup_key();
        let index = if self.seen_symbols.insert(dedup) {
            self.output.symbols.push(symbol);
            Some(self.output.symbols.len() - 1)
        } else {
            self.output.stats.duplicates_dropped += 1;
            None
        };

        // An interface's `extends` list is inheritance like a class's superclass.
        for base in bases {
            self.output.relationships.push(
                Relationship::new(qualified.clone(), base, RelationshipKind::Inherits, line)
                    .with_confidence(rule.confidence),
            );
        }
        for iface in ifaces {
            self.output.relationships.push(
                Relationship::new(qualified.clone(), iface, RelationshipKind::Implements, line)
                    .with_confidence(rule.confidence),
            );
        }

        let scope = rule.scope?;
        if declaration_only {
            return None;
        }
        let default_access = match (self.language, caps.name("kw").map(|m| m.as_str())) {
            (Language::Cpp, Some("class")) => Some(Visibility::Private),
            (Language::Cpp, Some(_)) => Some(Visibility::Public),
            _ => None,
        };
        let mut frame = frame(scope, Some(full), idx, default_access);
        frame.symbol = index;
        Some(frame)
    }

    /// Methods of trait impls and trait bodies are reachable wherever the trait is.
    fn in_trait_scope(&self) -> bool {
        let Some(top) = self.frames.last() else {
            return false;
        };
        top.trait_impl.is_some()
            || top
                .symbol
                .and_then(|i| self.output.symbols.get(i))
                .map(|s| s.kind == SymbolKind::Interface)
                .unwrap_or(false)
    }

    fn resolve_kind(
        &self,
        base: SymbolKind,
        caps: &Captures,
        member_scope: Option<&str>,
        name: &str,
        raw: &str,
    ) -> SymbolKind {
        match base {
            SymbolKind::Class if caps.name("kw").map(|m| m.as_str()) == Some("struct") => SymbolKind::Struct,
            SymbolKind::Variable | SymbolKind::Field if is_upper_snake(name) => SymbolKind::Constant,
            SymbolKind::Field if raw.contains("static ") && raw.contains("final ") => SymbolKind::Constant,
            SymbolKind::Function | SymbolKind::Method => {
                let owner = member_scope
                    .map(|s| split_scoped(s, self.separator).1)
                    .or_else(|| self.enclosing_class().filter(|_| self.in_class()))
                    .map(strip_type_args);
                let python_member = self.language == Language::Python && owner.is_some();
                if name.starts_with('~') || (python_member && name == "__del__") {
                    SymbolKind::Destructor
                } else if (self.language == Language::Cpp && name.starts_with("operator"))
                    || (python_member && PYTHON_OPERATORS.contains(&name))
                {
                    SymbolKind::Operator
                } else if owner.as_deref() == Some(name)
                    || (name == "constructor" && owner.is_some())
                    || (python_member && (name == "__init__" || name == "__new__"))
                {
                    SymbolKind::Constructor
                } else if owner.is_some() || caps.name("recv").is_some() {
                    SymbolKind::Method
                } else {
                    SymbolKind::Function
                }
            }
            other => other,
        }
    }

    fn visibility(&self, name: &str, raw: &str) -> Visibility {
        let line = raw.trim_start();
        match self.language {
            Language::Python => {
                if name.starts_with("__") && !name.ends_with("__") {
                    Visibility::Private
                } else if name.starts_with('_') && !name.starts_with("__") {
                    Visibility::Protected
                } else {
                    Visibility::Public
                }
            }
            Language::Go => {
                if name.starts_with(|c: char| c.is_uppercase()) {
                    Visibility::Public
                } else {
                    Visibility::Private
                }
            }
            Language::Rust => {
                if line.starts_with("pub(") {
                    Visibility::Internal
                } else if line.starts_with("pub ") || self.in_trait_scope() {
                    Visibility::Public
                } else {
                    Visibility::Private
                }
            }
            Language::Java => {
                if line.contains("public ") {
                    Visibility::Public
                } else if line.contains("private ") {
                    Visibility::Private
                } else if line.contains("protected ") {
                    Visibility::Protected
                } else {
                    Visibility::Internal
                }
            }
            Language::Cpp => {
                let access = self
                    .frames
                    .iter()
                    .rev()
                    .find(|f| f.kind == ScopeKind::Class)
                    .and_then(|f| f.access);
                access.unwrap_or(Visibility::Public)
            }
            Language::TypeScript | Language::Tsx | Language::JavaScript => {
                if line.starts_with("private ") || name.starts_with('#') {
                    Visibility::Private
                } else if line.starts_with("protected ") {
                    Visibility::Protected
                } else {
                    Visibility::Public
                }
            }
        }
    }

    fn features(
        &self,
        raw: &str,
        decorators: Vec<String>,
        bases: &[String],
        ifaces: &[String],
        caps: &Captures,
    ) -> Option<LanguageFeatures> {
        let line = raw.trim();
        let features = match self.language {
            Language::Cpp => LanguageFeatures::Cpp(CppFeatures {
                is_virtual: line.contains("virtual "),
                is_pure_virtual: line.trim_end_matches(';').trim_end().ends_with("= 0"),
                is_static: line.starts_with("static "),
                is_const: line.contains(") const"),
                is_override: line.contains(" override"),
                is_inline: line.contains("inline "),
                is_template: line.starts_with("template"),
                template_params: Vec::new(),
                base_classes: bases.to_vec(),
            }),
            Language::TypeScript | Language::Tsx | Language::JavaScript => {
                LanguageFeatures::TypeScript(TypeScriptFeatures {
                    decorators,
                    extends: bases.to_vec(),
                    implements: ifaces.to_vec(),
                    is_abstract: line.contains("abstract "),
                    is_static: line.contains("static "),
                    is_readonly: line.contains("readonly "),
                    is_arrow_function: line.contains("=>"),
                    is_generator: line.contains("function*") || line.contains("function *"),
                    ..TypeScriptFeatures::default()
                })
            }
            Language::Python => {
                let name = caps.name("name").map(|m| m.as_str()).unwrap_or_default();
                LanguageFeatures::Python(PythonFeatures {
                    is_dunder: name.starts_with("__") && name.ends_with("__"),
                    is_property: decorators.iter().any(|d| d == "property"),
                    is_staticmethod: decorators.iter().any(|d| d == "staticmethod"),
                    is_classmethod: decorators.iter().any(|d| d == "classmethod"),
                    decorators,
                    base_classes: bases.to_vec(),
                })
            }
            Language::Rust => LanguageFeatures::Rust(RustFeatures {
                derives: decorators
                    .iter()
                    .filter_map(|a| a.strip_prefix("derive(")?.strip_suffix(')'))
                    .flat_map(|list| list.split(','))
                    .map(|d| d.trim().to_string())
                    .filter(|d| !d.is_empty())
                    .collect(),
                attributes: decorators,
                generics: Vec::new(),
                trait_impl: self.frames.last().and_then(|f| f.trait_impl.clone()).filter(|_| line.contains("fn ")),
                is_unsafe: line.contains("unsafe "),
                is_const: line.contains("const fn"),
            }),
            Language::Go => LanguageFeatures::Go(GoFeatures {
                receiver: caps.name("recv").map(|m| m.as_str().to_string()),
                is_pointer_receiver: caps.name("recv").is_some() && line.contains('*'),
                ..GoFeatures::default()
            }),
            Language::Java => LanguageFeatures::Java(JavaFeatures {
                annotations: decorators,
                extends: bases.first().cloned(),
                implements: ifaces.to_vec(),
                ..JavaFeatures::default()
            }),
        };
        Some(features)
    }

    fn emit_import(&mut self, module: String, line: u32, confidence: f32) {
        let mut symbol = Symbol::new(
            module.clone(),
            module.clone(),
            SymbolKind::Import,
            self.language,
            Location::at_line(self.file_path, line, 1),
        );
        symbol.confidence = confidence;
        symbol.namespace = self.namespace();
        if self.seen_symbols.insert(symbol.dedup_key()) {
            self.output.symbols.push(symbol);
        }
        self.output.relationships.push(
            Relationship::new(self.owner(), module, RelationshipKind::Imports, line).with_confidence(confidence),
        );
    }
}

fn frame(kind: ScopeKind, name: Option<String>, start: usize, access: Option<Visibility>) -> Frame {
    Frame {
        kind,
        name,
        level: 0,
        start,
        symbol: None,
        access,
        trait_impl: None,
    }
}

fn indentation(line: &str) -> usize {
    line.chars()
        .take_while(|c| c.is_whitespace())
        .map(|c| if c == '\t' { 4 } else { 1 })
        .sum()
}

/// Split a base list at top-level commas (and `+` for trait bounds).
fn split_types(list: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut current = String::new();
    for ch in list.chars() {
        match ch {
            '<' | '(' | '[' => {
                depth += 1;
                current.push(ch);
            }
            '>' | ')' | ']' => {
                depth = depth.saturating_sub(1);
                current.push(ch);
            }
            ',' | '+' if depth == 0 => parts.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    parts.push(current);

    parts
        .into_iter()
        .filter(|p| !p.contains('='))
        .map(|p| {
            let words: Vec<&str> = p
                .split_whitespace()
                .filter(|w| !matches!(*w, "public" | "private" | "protected" | "virtual"))
                .collect();
            strip_type_args(&words.join(" "))
        })
        .filter(|p| !p.is_empty() && p != "object" && p != "{")
        .collect()
}

/// Code characters of one line with strings and comments blanked, for brace counting.
fn strip_code(line: &str, in_block_comment: &mut bool, language: Language) -> String {
    let js = matches!(language, Language::TypeScript | Language::Tsx | Language::JavaScript);
    let chars: Vec<char> = line.chars().collect();
    let mut out = String::with_capacity(line.len());
    let mut i = 0;
    while i < chars.len() {
        let ch = chars[i];
        let next = chars.get(i + 1).copied();
        if *in_block_comment {
            if ch == '*' && next == Some('/') {
                *in_block_comment = false;
                i += 2;
            } else {
                i += 1;
            }
            continue;
        }
        match ch {
            '/' if next == Some('/') => break,
            '/' if next == Some('*') => {
                *in_block_comment = true;
                i += 2;
            }
            '"' => i = skip_quoted(&chars, i, '"'),
            '`' if js => i = skip_quoted(&chars, i, '`'),
            '\'' if js => i = skip_quoted(&chars, i, '\''),
            '\'' => {
                // Char literals only; Rust lifetimes have no closing quote.
                if next == Some('\\') {
                    i = skip_quoted(&chars, i, '\'');
                } else if chars.get(i + 2) == Some(&'\'') {
                    i += 3;
                } else {
                    out.push(ch);
                    i += 1;
                }
            }
            _ => {
                out.push(ch);
                i += 1;
            }
        }
    }
    out
}

fn skip_quoted(chars: &[char], start: usize, quote: char) -> usize {
    let mut i = start + 1;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 2,
            c if c == quote => return i + 1,
            _ => i += 1,
        }
    }
    chars.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(output: &TraversalOutput) -> Vec<&str> {
        output.symbols.iter().map(|s| s.qualified_name.as_str()).collect()
    }

    fn find<'o>(output: &'o TraversalOutput, qualified: &str) -> &'o Symbol {
        output
            .symbols
            .iter()
            .find(|s| s.qualified_name == qualified)
            .unwrap_or_else(|| panic!("missing {} in {:?}", qualified, names(output)))
    }

    #[test]
    fn test_typescript_declarations() {
        let source = r#"
import { readFile } from 'fs';
const path = require('path');

export interface Shape extends Serializable {
  area(): number;
}

export class Circle extends Base implements Shape, Drawable {
  private radius: number;

  constructor(radius: number) {
    this.radius = radius;
  }

  area(): number {
    if (this.radius > 0 && this.visible) {
      return Math.PI * this.radius * this.radius;
    }
    return 0;
  }
}

export function makeCircle(r: number): Circle {
  return new Circle(r);
}

export const double = (x: number) => x * 2;
export type Id = string;
export enum Color { Red, Green }
"#;
        let output = extract(source, "shapes.ts", Language::TypeScript);
        assert_eq!(find(&output, "Shape").kind, SymbolKind::Interface);
        assert_eq!(find(&output, "Shape.area").kind, SymbolKind::Method);
        assert_eq!(find(&output, "Circle.radius").visibility, Visibility::Private);
        assert_eq!(find(&output, "Circle.constructor").kind, SymbolKind::Constructor);

        let area = find(&output, "Circle.area");
        assert_eq!(area.kind, SymbolKind::Method);
        assert_eq!(area.complexity, 3);
        assert!(area.location.end_line > area.location.line);

        assert_eq!(find(&output, "makeCircle").kind, SymbolKind::Function);
        assert_eq!(find(&output, "double").kind, SymbolKind::Function);
        assert_eq!(find(&output, "Id").kind, SymbolKind::Typedef);
        assert_eq!(find(&output, "Color").kind, SymbolKind::Enum);
        assert!(output.symbols.iter().all(|s| s.confidence >= 0.5 && s.confidence < 1.0));

        let has = |to: &str, kind: RelationshipKind| {
            output.relationships.iter().any(|r| r.to_name == to && r.kind == kind)
        };
        assert!(has("fs", RelationshipKind::Imports));
        assert!(has("path", RelationshipKind::Imports));
        assert!(has("Base", RelationshipKind::Inherits));
        assert!(has("Serializable", RelationshipKind::Inherits));
        assert!(has("Drawable", RelationshipKind::Implements));
    }

    #[test]
    fn test_cpp_nesting_and_access() {
        let source = r#"
#include <vector>
namespace engine {
namespace render {

class Renderer : public Base {
public:
    Renderer();
    ~Renderer();
    void draw(int count) const;
private:
    int frames;
};

void Renderer::draw(int count) const {
    for (int i = 0; i < count; ++i) {
        submit(i);
    }
}

}
}
"#;
        let output = extract(source, "renderer.cpp", Language::Cpp);
        assert_eq!(find(&output, "engine::render").kind, SymbolKind::Namespace);
        assert_eq!(find(&output, "engine::render::Renderer").kind, SymbolKind::Class);
        assert_eq!(
            find(&output, "engine::render::Renderer::Renderer").kind,
            SymbolKind::Constructor
        );
        assert_eq!(
            find(&output, "engine::render::Renderer::~Renderer").kind,
            SymbolKind::Destructor
        );

        let decl = output
            .symbols
            .iter()
            .find(|s| s.qualified_name == "engine::render::Renderer::draw" && !s.is_definition)
            .unwrap();
        assert_eq!(decl.visibility, Visibility::Public);

        let def = output
            .symbols
            .iter()
            .find(|s| s.qualified_name == "engine::render::Renderer::draw" && s.is_definition)
            .unwrap();
        assert_eq!(def.kind, SymbolKind::Method);
        assert_eq!(def.complexity, 2);
        assert!(output
            .relationships
            .iter()
            .any(|r| r.from_name == "engine::render::Renderer" && r.to_name == "Base"));
        assert!(output.relationships.iter().any(|r| r.to_name == "vector"));
    }

    #[test]
    fn test_python_indentation_scopes() {
        let source = "import os\n\nclass Service(Base):\n    \"\"\"Docs.\n    def not_a_method(self):\n    \"\"\"\n    limit = 5\n\n    def __init__(self):\n        self.x = 1\n\n    @property\n    def name(self):\n        if self.x or self.y:\n            return 'a'\n        return 'b'\n\ndef helper():\n    pass\n";
        let output = extract(source, "svc.py", Language::Python);
        assert_eq!(names(&output), vec!["os", "Service", "Service.limit", "Service.__init__", "Service.name", "helper"]);
        assert_eq!(find(&output, "Service.__init__").kind, SymbolKind::Constructor);

        let name = find(&output, "Service.name");
        assert_eq!(name.complexity, 3);
        assert_eq!(name.location.end_line, 16);
        match &name.language_features {
            Some(LanguageFeatures::Python(f)) => assert!(f.is_property),
            other => panic!("unexpected features {:?}", other),
        }
        assert_eq!(find(&output, "helper").kind, SymbolKind::Function);
    }

    #[test]
    fn test_go_package_and_receivers() {
        let source = "package store\n\nimport (\n\t\"context\"\n\tsql \"database/sql\"\n)\n\ntype DB struct {\n\tconn *sql.DB\n}\n\nfunc (d *DB) Query(ctx context.Context) error {\n\treturn nil\n}\n\nfunc Open() *DB {\n\treturn &DB{}\n}\n";
        let output = extract(source, "store.go", Language::Go);
        assert_eq!(find(&output, "store.DB").kind, SymbolKind::Struct);
        assert_eq!(find(&output, "store.DB.conn").kind, SymbolKind::Field);
        let query = find(&output, "store.DB.Query");
        assert_eq!(query.kind, SymbolKind::Method);
        assert_eq!(query.parent_scope.as_deref(), Some("store.DB"));
        assert_eq!(find(&output, "store.Open").visibility, Visibility::Public);
        assert!(output.relationships.iter().any(|r| r.to_name == "database/sql"));
    }

    #[test]
    fn test_rust_impl_blocks() {
        let source = "use std::fmt;\n\n#[derive(Debug)]\npub struct Point {\n    x: i32,\n}\n\nimpl fmt::Display for Point {\n    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {\n        write!(f, \"{}\", self.x)\n    }\n}\n\nimpl Point {\n    pub fn new() -> Self {\n        Point { x: 0 }\n    }\n}\n";
        let output = extract(source, "point.rs", Language::Rust);
        let point = find(&output, "Point");
        match &point.language_features {
            Some(LanguageFeatures::Rust(f)) => assert_eq!(f.derives, vec!["Debug".to_string()]),
            other => panic!("unexpected features {:?}", other),
        }
        assert_eq!(find(&output, "Point::fmt").kind, SymbolKind::Method);
        assert_eq!(find(&output, "Point::new").kind, SymbolKind::Method);
        assert!(output
            .relationships
            .iter()
            .any(|r| r.from_name == "Point" && r.to_name == "fmt::Display" && r.kind == RelationshipKind::Implements));
    }

    #[test]
    fn test_java_members() {
        let source = "package com.acme;\n\nimport java.util.List;\n\n@Entity\npublic class Order extends Base implements Serializable {\n    private static final long SERIAL = 1L;\n    private List<Item> items;\n\n    public Order(List<Item> items) {\n        this.items = items;\n    }\n\n    public int total() {\n        return items.size();\n    }\n}\n";
        let output = extract(source, "Order.java", Language::Java);
        let order = find(&output, "com.acme.Order");
        match &order.language_features {
            Some(LanguageFeatures::Java(f)) => {
                assert_eq!(f.annotations, vec!["Entity".to_string()]);
                assert_eq!(f.extends.as_deref(), Some("Base"));
            }
            other => panic!("unexpected features {:?}", other),
        }
        assert_eq!(find(&output, "com.acme.Order.SERIAL").kind, SymbolKind::Constant);
        assert_eq!(find(&output, "com.acme.Order.items").kind, SymbolKind::Field);
        assert_eq!(find(&output, "com.acme.Order.Order").kind, SymbolKind::Constructor);
        assert_eq!(find(&output, "com.acme.Order.total").kind, SymbolKind::Method);
    }

    #[test]
    fn test_strings_and_comments_do_not_move_braces() {
        let mut in_block = false;
        assert_eq!(strip_code(r#"let s = "{"; // }"#, &mut in_block, Language::Rust), "let s = ; ");
        assert_eq!(strip_code("fn f<'a>(x: &'a str) {", &mut in_block, Language::Rust), "fn f<'a>(x: &'a str) {");
        assert_eq!(strip_code("/* {", &mut in_block, Language::Cpp), "");
        assert!(in_block);
        assert_eq!(strip_code("} */ }", &mut in_block, Language::Cpp), " }");
    }

    #[test]
    fn test_split_types() {
        assert_eq!(split_types("public Base<int, T>, private virtual Mixin"), vec!["Base", "Mixin"]);
        assert_eq!(split_types("Clone + Send"), vec!["Clone", "Send"]);
        assert_eq!(split_types("Base, metaclass=Meta"), vec!["Base"]);
    }
}

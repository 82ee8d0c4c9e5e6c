// Visitor dispatch core
//
// Walks a syntax tree in pre-order and hands each node to the handler its
// language registered for that node kind. Handlers return records; the core
// owns scope tracking, accumulation, de-duplication and error accounting.

use std::collections::{HashMap, HashSet};

use tree_sitter::{Node, Tree};

use crate::index::{
    Language, Location, ParseStats, Pattern, Relationship, Symbol, SymbolKind, Visibility,
};

/// Category a language assigns to a node kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandlerKind {
    ClassLike,
    FunctionLike,
    VariableLike,
    Import,
    Export,
    Namespace,
    Inheritance,
    Call,
    Creation,
    AccessSpecifier,
}

/// One extracted record
#[derive(Debug, Clone)]
pub enum Record {
    Symbol(Symbol),
    Relationship(Relationship),
    Pattern(Pattern),
}

/// Handler output: nothing, one record, or many
#[derive(Debug, Clone, Default)]
pub enum Extracted {
    #[default]
    Nothing,
    One(Record),
    Many(Vec<Record>),
}

impl Extracted {
    pub fn push(&mut self, record: Record) {
        *self = match std::mem::take(self) {
            Extracted::Nothing => Extracted::One(record),
            Extracted::One(first) => Extracted::Many(vec![first, record]),
            Extracted::Many(mut all) => {
                all.push(record);
                Extracted::Many(all)
            }
        };
    }

    pub fn push_symbol(&mut self, symbol: Symbol) {
        self.push(Record::Symbol(symbol));
    }

    pub fn push_relationship(&mut self, relationship: Relationship) {
        self.push(Record::Relationship(relationship));
    }

    fn into_records(self) -> Vec<Record> {
        match self {
            Extracted::Nothing => Vec::new(),
            Extracted::One(record) => vec![record],
            Extracted::Many(all) => all,
        }
    }
}

impl From<Symbol> for Extracted {
    fn from(symbol: Symbol) -> Self {
        Extracted::One(Record::Symbol(symbol))
    }
}

impl From<Option<Symbol>> for Extracted {
    fn from(symbol: Option<Symbol>) -> Self {
        symbol.map(Extracted::from).unwrap_or_default()
    }
}

impl From<Relationship> for Extracted {
    fn from(relationship: Relationship) -> Self {
        Extracted::One(Record::Relationship(relationship))
    }
}

impl From<Option<Relationship>> for Extracted {
    fn from(relationship: Option<Relationship>) -> Self {
        relationship.map(Extracted::from).unwrap_or_default()
    }
}

impl From<Vec<Relationship>> for Extracted {
    fn from(relationships: Vec<Relationship>) -> Self {
        Extracted::Many(relationships.into_iter().map(Record::Relationship).collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Namespace,
    Class,
    Function,
    Template,
    Block,
}

/// A frame on the scope stack. Unnamed frames (templates, blocks) never reach qualified names.
#[derive(Debug, Clone, PartialEq)]
pub struct ScopeFrame {
    pub kind: ScopeKind,
    pub name: Option<String>,
    pub default_access: Option<Visibility>,
}

impl ScopeFrame {
    pub fn named(kind: ScopeKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: Some(name.into()),
            default_access: None,
        }
    }

    pub fn anonymous(kind: ScopeKind) -> Self {
        Self {
            kind,
            name: None,
            default_access: None,
        }
    }

    pub fn with_access(mut self, access: Visibility) -> Self {
        self.default_access = Some(access);
        self
    }
}

/// Per-file scratch state for one traversal. Never shared across files.
pub struct TraversalContext<'a> {
    pub file_path: &'a str,
    pub content: &'a str,
    pub language: Language,
    separator: &'static str,
    scopes: Vec<ScopeFrame>,
    access: Vec<Option<Visibility>>,
    template_depth: usize,
    pub stats: ParseStats,
}

impl<'a> TraversalContext<'a> {
    pub fn new(file_path: &'a str, content: &'a str, language: Language, separator: &'static str) -> Self {
        Self {
            file_path,
            content,
            language,
            separator,
            scopes: Vec::new(),
            access: Vec::new(),
            template_depth: 0,
            stats: ParseStats::default(),
        }
    }

    pub fn separator(&self) -> &'static str {
        self.separator
    }

    pub fn on_enter_scope(&mut self, frame: ScopeFrame) {
        if frame.kind == ScopeKind::Template {
            self.template_depth += 1;
        }
        self.access.push(frame.default_access);
        self.scopes.push(frame);
    }

    pub fn on_exit_scope(&mut self) {
        if let Some(frame) = self.scopes.pop() {
            if frame.kind == ScopeKind::Template {
                self.template_depth = self.template_depth.saturating_sub(1);
            }
        }
        self.access.pop();
    }

    /// Names of the enclosing named frames, outermost first.
    pub fn scope_path(&self) -> Vec<&str> {
        self.scopes.iter().filter_map(|f| f.name.as_deref()).collect()
    }

    pub fn qualify(&self, name: &str) -> String {
        let mut parts = self.scope_path();
        if parts.is_empty() {
            return name.to_string();
        }
        parts.push(name);
        parts.join(self.separator)
    }

    /// Qualified name of the innermost named frame.
    pub fn parent_scope(&self) -> Option<String> {
        let parts = self.scope_path();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(self.separator))
        }
    }

    /// Joined names of enclosing namespace frames.
    pub fn namespace(&self) -> Option<String> {
        let parts: Vec<&str> = self
            .scopes
            .iter()
            .filter(|f| f.kind == ScopeKind::Namespace)
            .filter_map(|f| f.name.as_deref())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(self.separator))
        }
    }

    /// Name of the innermost enclosing class-like frame.
    pub fn enclosing_class(&self) -> Option<&str> {
        self.scopes
            .iter()
            .rev()
            .find(|f| f.kind == ScopeKind::Class)
            .and_then(|f| f.name.as_deref())
    }

    pub fn in_class_body(&self) -> bool {
        self.scopes
            .iter()
            .rev()
            .find(|f| f.kind != ScopeKind::Template && f.kind != ScopeKind::Block)
            .map(|f| f.kind == ScopeKind::Class)
            .unwrap_or(false)
    }

    pub fn in_function_body(&self) -> bool {
        self.scopes.iter().any(|f| f.kind == ScopeKind::Function)
    }

    pub fn template_depth(&self) -> usize {
        self.template_depth
    }

    pub fn current_access(&self) -> Option<Visibility> {
        self.access.iter().rev().find_map(|a| *a)
    }

    /// Access specifiers (`public:`) rewrite the level for the rest of the enclosing class.
    pub fn set_access(&mut self, visibility: Visibility) {
        let class_frame = self.scopes.iter().rposition(|f| f.kind == ScopeKind::Class);
        if let Some(slot) = class_frame.and_then(|idx| self.access.get_mut(idx)) {
            *slot = Some(visibility);
        }
    }

    /// Symbol that owns the current position: the scope path, or the file itself at top level.
    pub fn current_owner(&self) -> String {
        self.parent_scope().unwrap_or_else(|| self.file_path.to_string())
    }

    pub fn text(&self, node: Node) -> &'a str {
        self.content.get(node.byte_range()).unwrap_or("")
    }

    pub fn field_text(&self, node: Node, field: &str) -> Option<&'a str> {
        node.child_by_field_name(field).map(|n| self.text(n))
    }

    pub fn location(&self, node: Node) -> Location {
        let start = node.start_position();
        let end = node.end_position();
        Location {
            file: self.file_path.to_string(),
            line: start.row as u32 + 1,
            column: start.column as u32 + 1,
            end_line: end.row as u32 + 1,
            end_column: end.column as u32 + 1,
        }
    }

    /// New symbol positioned at `node`, qualified against the current scope.
    pub fn symbol(&self, name: &str, kind: SymbolKind, node: Node) -> Symbol {
        let mut symbol = Symbol::new(name, self.qualify(name), kind, self.language, self.location(node));
        symbol.namespace = self.namespace();
        symbol.parent_scope = self.parent_scope();
        if let Some(access) = self.current_access() {
            symbol.visibility = access;
        }
        symbol
    }
}

/// Per-language extraction contract.
pub trait LanguageHandler: Send + Sync {
    fn language(&self) -> Language;

    /// Node kind to handler category. Kinds not listed are only descended through.
    fn node_handlers(&self) -> &'static [(&'static str, HandlerKind)];

    /// Scope every qualified name in the file starts from (a Go or Java package).
    fn root_scope(&self, _root: Node, _ctx: &TraversalContext) -> Option<String> {
        None
    }

    /// Frame to push while visiting the children of `node`.
    fn scope_for(&self, _node: Node, _ctx: &TraversalContext) -> Option<ScopeFrame> {
        None
    }

    fn handle_class(&self, _node: Node, _ctx: &mut TraversalContext) -> Extracted {
        Extracted::Nothing
    }

    fn handle_function(&self, _node: Node, _ctx: &mut TraversalContext) -> Extracted {
        Extracted::Nothing
    }

    fn handle_variable(&self, _node: Node, _ctx: &mut TraversalContext) -> Extracted {
        Extracted::Nothing
    }

    fn handle_import(&self, _node: Node, _ctx: &mut TraversalContext) -> Extracted {
        Extracted::Nothing
    }

    fn handle_export(&self, _node: Node, _ctx: &mut TraversalContext) -> Extracted {
        Extracted::Nothing
    }

    fn handle_namespace(&self, _node: Node, _ctx: &mut TraversalContext) -> Extracted {
        Extracted::Nothing
    }

    fn handle_inheritance(&self, _node: Node, _ctx: &mut TraversalContext) -> Extracted {
        Extracted::Nothing
    }

    fn handle_call(&self, _node: Node, _ctx: &mut TraversalContext) -> Extracted {
        Extracted::Nothing
    }

    fn handle_creation(&self, _node: Node, _ctx: &mut TraversalContext) -> Extracted {
        Extracted::Nothing
    }

    fn handle_access_specifier(&self, _node: Node, _ctx: &mut TraversalContext) -> Extracted {
        Extracted::Nothing
    }
}

/// Accumulated output of one traversal
#[derive(Debug, Clone, Default)]
pub struct TraversalOutput {
    pub symbols: Vec<Symbol>,
    pub relationships: Vec<Relationship>,
    pub patterns: Vec<Pattern>,
    pub stats: ParseStats,
    pub errors: Vec<String>,
}

#[derive(Default)]
struct Accumulator {
    output: TraversalOutput,
    seen_symbols: HashSet<(String, String, u32, SymbolKind)>,
    seen_relationships: HashSet<(String, String, crate::index::RelationshipKind, u32)>,
}

impl Accumulator {
    fn add(&mut self, record: Record, stats: &mut ParseStats) {
        match record {
            Record::Symbol(symbol) => {
                if self.seen_symbols.insert(symbol.dedup_key()) {
                    self.output.symbols.push(symbol);
                } else {
                    stats.duplicates_dropped += 1;
                }
            }
            Record::Relationship(relationship) => {
                if self.seen_relationships.insert(relationship.dedup_key()) {
                    self.output.relationships.push(relationship);
                } else {
                    stats.duplicates_dropped += 1;
                }
            }
            Record::Pattern(pattern) => self.output.patterns.push(pattern),
        }
    }
}

enum Step<'t> {
    Enter(Node<'t>, usize),
    Exit,
}

fn dispatch(kind: HandlerKind, handler: &dyn LanguageHandler, node: Node, ctx: &mut TraversalContext) -> Extracted {
    match kind {
        HandlerKind::ClassLike => handler.handle_class(node, ctx),
        HandlerKind::FunctionLike => handler.handle_function(node, ctx),
        HandlerKind::VariableLike => handler.handle_variable(node, ctx),
        HandlerKind::Import => handler.handle_import(node, ctx),
        HandlerKind::Export => handler.handle_export(node, ctx),
        HandlerKind::Namespace => handler.handle_namespace(node, ctx),
        HandlerKind::Inheritance => handler.handle_inheritance(node, ctx),
        HandlerKind::Call => handler.handle_call(node, ctx),
        HandlerKind::Creation => handler.handle_creation(node, ctx),
        HandlerKind::AccessSpecifier => handler.handle_access_specifier(node, ctx),
    }
}

/// Walk `tree` depth-first and collect every record the language handler produces.
///
/// The walk keeps an explicit stack, so arbitrarily deep trees cannot exhaust the
/// thread stack. Children are always visited whether or not a handler fired.
pub fn traverse(handler: &dyn LanguageHandler, tree: &Tree, file_path: &str, content: &str) -> TraversalOutput {
    let table: HashMap<&'static str, HandlerKind> = handler.node_handlers().iter().copied().collect();
    let language = handler.language();
    let mut ctx = TraversalContext::new(file_path, content, language, language.scope_separator());
    let mut acc = Accumulator::default();
    let mut visited: HashSet<usize> = HashSet::new();
    let mut errors = Vec::new();

    let root = tree.root_node();
    if let Some(package) = handler.root_scope(root, &ctx) {
        ctx.on_enter_scope(ScopeFrame::named(ScopeKind::Namespace, package));
    }

    let mut stack = vec![Step::Enter(root, 0)];
    while let Some(step) = stack.pop() {
        let (node, depth) = match step {
            Step::Exit => {
                ctx.on_exit_scope();
                continue;
            }
            Step::Enter(node, depth) => (node, depth),
        };
        if !visited.insert(node.id()) {
            continue;
        }

        ctx.stats.nodes_visited += 1;
        ctx.stats.max_depth = ctx.stats.max_depth.max(depth);

        if node.is_error() {
            ctx.stats.error_nodes += 1;
            errors.push(format!(
                "syntax error at line {}, column {}",
                node.start_position().row + 1,
                node.start_position().column + 1
            ));
        } else if node.is_missing() {
            ctx.stats.missing_nodes += 1;
            errors.push(format!(
                "missing {} at line {}",
                node.kind(),
                node.start_position().row + 1
            ));
        }

        if let Some(&kind) = table.get(node.kind()) {
            ctx.stats.handler_calls += 1;
            let extracted = dispatch(kind, handler, node, &mut ctx);
            let mut stats = std::mem::take(&mut ctx.stats);
            for record in extracted.into_records() {
                acc.add(record, &mut stats);
            }
            ctx.stats = stats;
        }

        let child_count = node.child_count();
        if child_count == 0 {
            continue;
        }

        if let Some(frame) = handler.scope_for(node, &ctx) {
            ctx.on_enter_scope(frame);
            stack.push(Step::Exit);
        }

        let mut cursor = node.walk();
        let children: Vec<Node> = node.children(&mut cursor).collect();
        for child in children.into_iter().rev() {
            stack.push(Step::Enter(child, depth + 1));
        }
    }

    let mut output = acc.output;
    ctx.stats.symbols = output.symbols.len();
    ctx.stats.relationships = output.relationships.len();
    ctx.stats.patterns = output.patterns.len();
    output.stats = ctx.stats;
    output.errors = errors;
    output
}

/// Collapse whitespace and cut the signature at the body.
pub fn signature_before(ctx: &TraversalContext, node: Node, body: Option<Node>) -> String {
    let end = body.map(|b| b.start_byte()).unwrap_or_else(|| node.end_byte());
    let raw = ctx.content.get(node.start_byte()..end).unwrap_or("");
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.trim_end_matches(['{', ':', ';', ' ']).to_string()
}

pub fn child_of_kind<'t>(node: Node<'t>, kind: &str) -> Option<Node<'t>> {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).find(|c| c.kind() == kind);
    found
}

pub fn children_of_kind<'t>(node: Node<'t>, kind: &str) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.children(&mut cursor).filter(|c| c.kind() == kind).collect()
}

/// Nearest descendant of `kind`, searched breadth-first.
pub fn descendant_of_kind<'t>(node: Node<'t>, kind: &str) -> Option<Node<'t>> {
    let mut queue = std::collections::VecDeque::from([node]);
    while let Some(current) = queue.pop_front() {
        let mut cursor = current.walk();
        for child in current.children(&mut cursor) {
            if child.kind() == kind {
                return Some(child);
            }
            queue.push_back(child);
        }
    }
    None
}

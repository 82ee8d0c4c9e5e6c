// Per-file parse pipeline: cache check, tree walk, fallback, semantic passes, cross-language scan

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Result, SentinelError};
use crate::index::{
    enclosing_symbol, ControlFlowSummary, FallbackReason, Language, ParseMetadata, ParseMethod,
    ParseResult, Symbol,
};
use crate::indexer::cache::{CacheEntry, CacheStrategy, ParseCache};
use crate::indexer::cancel::CancelToken;
use crate::indexer::complexity;
use crate::indexer::cross_language;
use crate::indexer::fallback;
use crate::indexer::languages::handler_for;
use crate::indexer::patterns;
use crate::indexer::pool::{JobHandler, WorkItem};
use crate::indexer::syntax::{SyntaxProvider, TreeSitterProvider};
use crate::indexer::visitor::{traverse, TraversalOutput};

/// Options for a single parse
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseOptions {
    pub debug_mode: bool,
    pub cache_strategy: CacheStrategy,
    pub enable_semantic_analysis: bool,
    #[serde(with = "millis")]
    pub semantic_analysis_timeout: Duration,
    pub project_id: Option<String>,
    /// Skip extension-based detection.
    pub language: Option<Language>,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            debug_mode: false,
            cache_strategy: CacheStrategy::Moderate,
            enable_semantic_analysis: true,
            semantic_analysis_timeout: Duration::from_secs(5),
            project_id: None,
            language: None,
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

/// Thresholds for the fallback decision
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Tree walks yielding fewer symbols than this are re-scanned ...
    pub fallback_min_symbols: usize,
    /// ... when the file is larger than this many bytes.
    pub fallback_min_bytes: usize,
    /// Pattern output replaces the tree walk when it finds more than this multiple of symbols.
    pub fallback_replace_ratio: f64,
    pub detect_cross_language: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            fallback_min_symbols: 3,
            fallback_min_bytes: 1000,
            fallback_replace_ratio: 2.0,
            detect_cross_language: true,
        }
    }
}

/// Turns one file into a `ParseResult`.
///
/// Holds the grammar registry and a shared cache handle. Languages whose grammar
/// fails to bind stay on pattern extraction for the lifetime of the pipeline.
pub struct ParsePipeline {
    cache: Arc<ParseCache>,
    providers: DashMap<Language, Arc<dyn SyntaxProvider>>,
    disabled: DashMap<Language, String>,
    config: PipelineConfig,
}

impl ParsePipeline {
    pub fn new(cache: Arc<ParseCache>) -> Self {
        Self::with_config(cache, PipelineConfig::default())
    }

    pub fn with_config(cache: Arc<ParseCache>, config: PipelineConfig) -> Self {
        Self {
            cache,
            providers: DashMap::new(),
            disabled: DashMap::new(),
            config,
        }
    }

    /// Replace the syntax provider for a language. Clears any earlier grammar failure.
    pub fn register_provider(&self, provider: Arc<dyn SyntaxProvider>) {
        let language = provider.language();
        self.disabled.remove(&language);
        self.providers.insert(language, provider);
    }

    pub fn cache(&self) -> &Arc<ParseCache> {
        &self.cache
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Languages currently routed to pattern extraction, with the reason.
    pub fn disabled_languages(&self) -> Vec<(Language, String)> {
        self.disabled
            .iter()
            .map(|e| (*e.key(), e.value().clone()))
            .collect()
    }

    fn provider(&self, language: Language) -> Arc<dyn SyntaxProvider> {
        if let Some(provider) = self.providers.get(&language) {
            return provider.clone();
        }
        self.providers
            .entry(language)
            .or_insert_with(|| Arc::new(TreeSitterProvider::new(language)))
            .clone()
    }

    pub fn parse_file(&self, file_path: &str, content: &str, options: &ParseOptions) -> Result<ParseResult> {
        self.parse_file_cancellable(file_path, content, options, &CancelToken::new())
    }

    /// `parse_file` that stops with `SentinelError::Cancelled` once `cancel` is set.
    ///
    /// A cancelled parse writes nothing to the cache.
    pub fn parse_file_cancellable(
        &self,
        file_path: &str,
        content: &str,
        options: &ParseOptions,
        cancel: &CancelToken,
    ) -> Result<ParseResult> {
        let language = options
            .language
            .or_else(|| Language::from_path(file_path))
            .ok_or_else(|| SentinelError::UnsupportedLanguage(file_path.to_string()))?;
        let content_hash = blake3::hash(content.as_bytes()).to_hex().to_string();

        let memoize = options.cache_strategy.memoizes();
        let limits = options.cache_strategy.limits();
        if memoize {
            if let Some(entry) = self.cache.get_with(file_path, Some(&content_hash), limits) {
                debug!("Cache hit for {}", file_path);
                return Ok(entry.to_result(file_path));
            }
        }

        let started = Instant::now();
        let mut parse_errors = Vec::new();
        let walked = self.tree_walk(language, file_path, content, cancel);
        cancel.check()?;
        let (mut output, method, fallback_reason) = match walked {
            Ok(output) => self.check_yield(output, content, file_path, language),
            Err(reason) => {
                warn!("Pattern extraction for {}: {:?}", file_path, reason);
                match &reason {
                    FallbackReason::GrammarUnavailable { message } | FallbackReason::ParseFailed { message } => {
                        parse_errors.push(message.clone())
                    }
                    _ => {}
                }
                let output = fallback::extract(content, file_path, language);
                (output, ParseMethod::PatternFallback, Some(reason))
            }
        };
        cancel.check()?;
        let error_node_count = output.stats.error_nodes + output.stats.missing_nodes;
        parse_errors.append(&mut output.errors);

        let mut control_flow = Vec::new();
        if options.enable_semantic_analysis {
            let deadline = Instant::now() + options.semantic_analysis_timeout;
            let summaries = control_flow_pass(&output.symbols, content, deadline, cancel);
            cancel.check()?;
            match summaries {
                Some(summaries) if Instant::now() < deadline => {
                    control_flow = summaries;
                    output.patterns.extend(patterns::detect(&output.symbols, language));
                }
                Some(summaries) => {
                    control_flow = summaries;
                    parse_errors.push(semantic_timeout(options.semantic_analysis_timeout));
                }
                None => parse_errors.push(semantic_timeout(options.semantic_analysis_timeout)),
            }
        }

        if self.config.detect_cross_language {
            self.cross_language_pass(&mut output, content, file_path, language);
        }
        cancel.check()?;

        let mut stats = output.stats;
        stats.symbols = output.symbols.len();
        stats.relationships = output.relationships.len();
        stats.patterns = output.patterns.len();

        let result = ParseResult {
            file_path: file_path.to_string(),
            language,
            symbols: output.symbols,
            relationships: output.relationships,
            patterns: output.patterns,
            control_flow,
            stats,
            metadata: ParseMetadata {
                parse_method: method,
                fallback_reason,
                parse_errors,
                error_node_count,
                from_cache: false,
                content_hash,
                generated_at: Utc::now(),
                duration_ms: started.elapsed().as_millis() as u64,
                project_id: options.project_id.clone(),
            },
        };

        if options.debug_mode {
            info!(
                "Parsed {} ({}, {:?}): {} nodes, {} handler calls, depth {}, {} symbols, {} relationships, {} patterns, {} errors in {}ms",
                file_path,
                language,
                result.metadata.parse_method,
                result.stats.nodes_visited,
                result.stats.handler_calls,
                result.stats.max_depth,
                result.stats.symbols,
                result.stats.relationships,
                result.stats.patterns,
                result.metadata.error_node_count,
                result.metadata.duration_ms
            );
        } else {
            debug!(
                "Parsed {}: {} symbols in {}ms",
                file_path, result.stats.symbols, result.metadata.duration_ms
            );
        }

        if memoize {
            self.cache.set_with(file_path, CacheEntry::from_result(&result), limits);
        }
        Ok(result)
    }

    fn tree_walk(
        &self,
        language: Language,
        file_path: &str,
        content: &str,
        cancel: &CancelToken,
    ) -> std::result::Result<TraversalOutput, FallbackReason> {
        if let Some(reason) = self.disabled.get(&language) {
            return Err(FallbackReason::GrammarUnavailable {
                message: reason.value().clone(),
            });
        }

        let provider = self.provider(language);
        if !provider.is_available() {
            return Err(FallbackReason::ProviderUnavailable);
        }

        match provider.parse_cancellable(content, cancel) {
            Ok(tree) => Ok(traverse(handler_for(language), &tree, file_path, content)),
            Err(e) if e.is_grammar_failure() => {
                warn!("Disabling tree parsing for {}: {}", language, e);
                self.disabled.insert(language, e.to_string());
                Err(FallbackReason::GrammarUnavailable { message: e.to_string() })
            }
            Err(e) => Err(FallbackReason::ParseFailed { message: e.to_string() }),
        }
    }

    /// Re-scan thin tree walks with the pattern extractor.
    fn check_yield(
        &self,
        output: TraversalOutput,
        content: &str,
        file_path: &str,
        language: Language,
    ) -> (TraversalOutput, ParseMethod, Option<FallbackReason>) {
        let tree_symbols = output.symbols.len();
        if tree_symbols >= self.config.fallback_min_symbols || content.len() <= self.config.fallback_min_bytes {
            return (output, ParseMethod::TreeSitter, None);
        }

        let scanned = fallback::extract(content, file_path, language);
        // Wholesale replacement, no merge of the two symbol sets.
        if scanned.symbols.len() as f64 > tree_symbols as f64 * self.config.fallback_replace_ratio {
            warn!(
                "Low yield for {}: tree walk found {} symbols, pattern scan {}",
                file_path,
                tree_symbols,
                scanned.symbols.len()
            );
            let reason = FallbackReason::LowYield {
                tree_symbols,
                bytes: content.len(),
            };
            return (scanned, ParseMethod::PatternFallback, Some(reason));
        }
        (output, ParseMethod::TreeSitter, None)
    }

    fn cross_language_pass(&self, output: &mut TraversalOutput, content: &str, file_path: &str, language: Language) {
        let mut seen: HashSet<_> = output.relationships.iter().map(|r| r.dedup_key()).collect();
        for candidate in cross_language::scan(content, language, file_path) {
            let from = enclosing_symbol(&output.symbols, candidate.line_number)
                .map(|s| s.qualified_name.clone())
                .unwrap_or_else(|| file_path.to_string());
            let relationship = candidate.into_relationship(from);
            if seen.insert(relationship.dedup_key()) {
                output.relationships.push(relationship);
            }
        }
    }
}

impl JobHandler for ParsePipeline {
    fn process(&self, item: &WorkItem, cancel: &CancelToken) -> Result<ParseResult> {
        self.parse_file_cancellable(&item.file_path, &item.content, &item.options, cancel)
    }
}

fn semantic_timeout(limit: Duration) -> String {
    format!("semantic analysis timed out after {}ms", limit.as_millis())
}

/// Branch summaries for every function-like symbol with a body.
///
/// Returns `None` if the deadline passes, or the parse is cancelled, before the pass finishes.
fn control_flow_pass(
    symbols: &[Symbol],
    content: &str,
    deadline: Instant,
    cancel: &CancelToken,
) -> Option<Vec<ControlFlowSummary>> {
    let lines: Vec<&str> = content.lines().collect();
    let mut summaries = Vec::new();
    for symbol in symbols.iter().filter(|s| s.kind.is_function_like() && s.is_definition) {
        if Instant::now() >= deadline || cancel.is_cancelled() {
            return None;
        }
        let start = symbol.location.line as usize;
        let end = symbol.location.end_line as usize;
        if start == 0 || end <= start || end > lines.len() {
            continue;
        }
        let body = lines[start - 1..end].join("\n");
        let counts = complexity::analyze(&body);
        summaries.push(counts.summary(&symbol.qualified_name, symbol.location.line, symbol.location.end_line));
    }
    Some(summaries)
}

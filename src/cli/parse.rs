use anyhow::{Context, Result};
use std::sync::Arc;

use module_sentinel::config::Config;
use module_sentinel::index::{Language, ParseResult};
use module_sentinel::indexer::{CacheStrategy, ParseCache, ParsePipeline};

pub fn parse_file(
    config: &Config,
    file: String,
    format: String,
    cache_strategy: Option<String>,
    language: Option<String>,
    show_stats: bool,
) -> Result<()> {
    let content = std::fs::read_to_string(&file).with_context(|| format!("reading {}", file))?;

    let mut options = config.parse_options();
    if let Some(strategy) = cache_strategy {
        options.cache_strategy = strategy.parse::<CacheStrategy>().map_err(anyhow::Error::msg)?;
    }
    if let Some(language) = language {
        options.language = Some(language.parse::<Language>().map_err(anyhow::Error::msg)?);
    }
    options.debug_mode |= show_stats;

    let cache = Arc::new(ParseCache::new(options.cache_strategy));
    let pipeline = ParsePipeline::with_config(cache, config.pipeline_config());
    let result = pipeline.parse_file(&file, &content, &options)?;

    match format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&result)?),
        "text" => print_text(&result, show_stats),
        other => anyhow::bail!("Unknown output format: {}", other),
    }
    Ok(())
}

fn print_text(result: &ParseResult, show_stats: bool) {
    let method = if result.used_fallback() {
        "pattern fallback"
    } else {
        "tree-sitter"
    };
    println!("{} ({}, {})", result.file_path, result.language, method);
    if let Some(reason) = &result.metadata.fallback_reason {
        println!("  fallback reason: {:?}", reason);
    }

    println!("\nSymbols ({}):", result.symbols.len());
    for symbol in &result.symbols {
        println!(
            "  {:>5}  {:<12} {:<40} {:?} c={} conf={:.2}",
            symbol.location.line,
            symbol.kind.as_str(),
            symbol.qualified_name,
            symbol.visibility,
            symbol.complexity,
            symbol.confidence
        );
    }

    if !result.relationships.is_empty() {
        println!("\nRelationships ({}):", result.relationships.len());
        for rel in &result.relationships {
            let marker = if rel.cross_language { " [cross-language]" } else { "" };
            println!(
                "  {:>5}  {} -{}-> {}{}",
                rel.line_number,
                rel.from_name,
                rel.kind.as_str(),
                rel.to_name,
                marker
            );
        }
    }

    if !result.patterns.is_empty() {
        println!("\nPatterns ({}):", result.patterns.len());
        for pattern in &result.patterns {
            println!(
                "  {:>5}  {:<20} {} ({:.2})",
                pattern.line_number,
                pattern.pattern_name,
                pattern.symbol.as_deref().unwrap_or("-"),
                pattern.confidence
            );
        }
    }

    for error in &result.metadata.parse_errors {
        println!("  ! {}", error);
    }

    if show_stats {
        let stats = &result.stats;
        println!("\nStats:");
        println!("  Nodes visited: {}", stats.nodes_visited);
        println!("  Handler calls: {}", stats.handler_calls);
        println!("  Max depth: {}", stats.max_depth);
        println!("  Error nodes: {}", stats.error_nodes + stats.missing_nodes);
        println!("  Duplicates dropped: {}", stats.duplicates_dropped);
        println!("  Duration: {}ms", result.metadata.duration_ms);
    }
}

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use tracing::{debug, info};
use walkdir::WalkDir;

use module_sentinel::config::Config;
use module_sentinel::index::store::MemoryStore;
use module_sentinel::index::Language;
use module_sentinel::indexer::{IndexReport, Indexer, ParseCache, ParsePipeline};

pub async fn index_project(
    config: Config,
    project: String,
    languages: Option<String>,
    workers: Option<usize>,
) -> Result<()> {
    println!("Module Sentinel Indexer v{}", env!("CARGO_PKG_VERSION"));
    println!("Project: {}", project);
    println!(
        "Config: {}",
        if config.project.name != "unnamed-project" { "loaded" } else { "default" }
    );

    // CLI override or config
    let enabled: Vec<Language> = match languages {
        Some(list) => list
            .split(',')
            .map(|s| s.trim().parse::<Language>().map_err(anyhow::Error::msg))
            .collect::<Result<_>>()?,
        None => config.enabled_languages(),
    };
    let names: Vec<&str> = enabled.iter().map(|l| l.as_str()).collect();
    println!("Languages: {}", names.join(", "));

    let max_size = config.max_file_size();
    let mut files = Vec::new();
    let mut skipped = 0usize;
    for entry in WalkDir::new(&project).into_iter().filter_map(|e| e.ok()) {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let path_str = path.to_string_lossy().to_string();
        let wanted = config.should_index_file(&path_str)
            && Language::from_path(path).map(|l| enabled.contains(&l)).unwrap_or(false)
            && entry.metadata().map(|m| m.len() <= max_size).unwrap_or(false);
        if !wanted {
            skipped += 1;
            continue;
        }
        match std::fs::read_to_string(path) {
            Ok(content) => files.push((path_str, content)),
            Err(e) => {
                debug!("Skipping unreadable {}: {}", path_str, e);
                skipped += 1;
            }
        }
    }
    println!("Found {} files to index ({} skipped)", files.len(), skipped);

    let mut pool_config = config.pool_config();
    if let Some(workers) = workers {
        pool_config.max_workers = workers.max(1);
    }
    println!("Workers: {}", pool_config.max_workers);

    let options = config.parse_options();
    let cache = Arc::new(ParseCache::new(options.cache_strategy));
    let pipeline = Arc::new(ParsePipeline::with_config(cache, config.pipeline_config()));
    let store = Arc::new(MemoryStore::new());
    let indexer = Indexer::new(pipeline, pool_config, store.clone(), options);

    let progress = ProgressBar::new(files.len() as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("=> "),
    );

    let batch_size = config.indexing.batch_size;
    let mut report = IndexReport::default();
    while !files.is_empty() {
        let rest = files.split_off(files.len().min(batch_size));
        let batch = std::mem::replace(&mut files, rest);
        let partial = indexer
            .index_files_with(batch, |path, _| {
                progress.set_message(path.to_string());
                progress.inc(1);
            })
            .await;
        report.merge(partial);
    }
    progress.finish_and_clear();
    let pool_stats = indexer.pool().stats().await.ok();
    indexer.shutdown().await;

    info!("Indexed {} files in {}ms", report.files, report.duration_ms);
    println!("\nIndexing complete!");
    println!("Files parsed: {}", report.parsed);
    println!("  via pattern fallback: {}", report.fallback);
    println!("  from cache: {}", report.from_cache);
    println!("Failed: {}", report.failed);
    println!("Total symbols: {}", store.symbol_count());
    println!("Total relationships: {}", store.relationship_count());
    println!("  cross-language: {}", report.cross_language);
    println!("Total patterns: {}", store.pattern_count());
    if let Some(stats) = pool_stats {
        println!(
            "Worker pool: peak {} concurrent, {} retries, {} timeouts, {} crashes",
            stats.peak_concurrency, stats.retries, stats.timeouts, stats.crashes
        );
    }
    for (file, error) in &report.errors {
        println!("  ! {}: {}", file, error);
    }

    Ok(())
}

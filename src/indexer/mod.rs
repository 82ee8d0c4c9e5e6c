// Code indexing: parse pipeline, worker pool and store hand-off

pub mod cache;
pub mod cancel;
pub mod complexity;
pub mod cross_language;
pub mod fallback;
pub mod languages;
pub mod patterns;
pub mod pipeline;
pub mod pool;
pub mod syntax;
pub mod visitor;

use std::sync::Arc;
use std::time::Instant;

use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::PoolError;
use crate::index::store::SymbolStore;
use crate::index::ParseResult;

pub use cache::{CacheLimits, CacheStrategy, ParseCache};
pub use cancel::CancelToken;
pub use pipeline::{ParseOptions, ParsePipeline, PipelineConfig};
pub use pool::{PoolConfig, PoolStats, WorkerPool};

/// Totals for one indexing run
#[derive(Debug, Clone, Default, Serialize)]
pub struct IndexReport {
    pub files: usize,
    pub parsed: usize,
    pub from_cache: usize,
    pub fallback: usize,
    pub failed: usize,
    pub symbols: usize,
    pub relationships: usize,
    pub cross_language: usize,
    pub patterns: usize,
    pub errors: Vec<(String, String)>,
    pub duration_ms: u64,
}

impl IndexReport {
    fn record(&mut self, result: &ParseResult) {
        self.parsed += 1;
        if result.metadata.from_cache {
            self.from_cache += 1;
        }
        if result.used_fallback() {
            self.fallback += 1;
        }
        self.symbols += result.symbols.len();
        self.relationships += result.relationships.len();
        self.cross_language += result.relationships.iter().filter(|r| r.cross_language).count();
        self.patterns += result.patterns.len();
    }

    /// Fold a later batch into this report.
    pub fn merge(&mut self, other: IndexReport) {
        self.files += other.files;
        self.parsed += other.parsed;
        self.from_cache += other.from_cache;
        self.fallback += other.fallback;
        self.failed += other.failed;
        self.symbols += other.symbols;
        self.relationships += other.relationships;
        self.cross_language += other.cross_language;
        self.patterns += other.patterns;
        self.errors.extend(other.errors);
        self.duration_ms += other.duration_ms;
    }

    fn fail(&mut self, file_path: &str, message: String) {
        self.failed += 1;
        self.errors.push((file_path.to_string(), message));
    }
}

/// Fans files out through the pool and hands finished results to the store
pub struct Indexer {
    pipeline: Arc<ParsePipeline>,
    pool: WorkerPool,
    store: Arc<dyn SymbolStore>,
    options: ParseOptions,
}

impl Indexer {
    /// Must be called inside a tokio runtime; the pool starts its scheduler here.
    pub fn new(
        pipeline: Arc<ParsePipeline>,
        pool_config: PoolConfig,
        store: Arc<dyn SymbolStore>,
        options: ParseOptions,
    ) -> Self {
        let pool = WorkerPool::new(pipeline.clone(), pool_config);
        Self {
            pipeline,
            pool,
            store,
            options,
        }
    }

    pub fn pipeline(&self) -> &Arc<ParsePipeline> {
        &self.pipeline
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    pub async fn index_files(&self, files: Vec<(String, String)>) -> IndexReport {
        self.index_files_with(files, |_, _| {}).await
    }

    /// Index `files`, calling `on_done` as each one finishes.
    pub async fn index_files_with<F>(&self, files: Vec<(String, String)>, mut on_done: F) -> IndexReport
    where
        F: FnMut(&str, Result<&ParseResult, &PoolError>),
    {
        let started = Instant::now();
        let mut report = IndexReport {
            files: files.len(),
            ..Default::default()
        };

        let mut pending = FuturesUnordered::new();
        for (path, content) in files {
            match self.pool.submit(path.clone(), content, self.options.clone(), 0) {
                Ok(handle) => pending.push(async move { (path, handle.await) }),
                Err(e) => {
                    warn!("Rejected {}: {}", path, e);
                    on_done(&path, Err(&e));
                    report.fail(&path, e.to_string());
                }
            }
        }

        while let Some((path, outcome)) = pending.next().await {
            match outcome {
                Ok(result) => {
                    on_done(&path, Ok(&result));
                    match self.store_result(&result) {
                        Ok(()) => report.record(&result),
                        Err(e) => report.fail(&path, e.to_string()),
                    }
                }
                Err(e) => {
                    on_done(&path, Err(&e));
                    report.fail(&path, e.to_string());
                }
            }
        }

        report.duration_ms = started.elapsed().as_millis() as u64;
        info!(
            "Indexed {} files ({} failed): {} symbols, {} relationships in {}ms",
            report.parsed, report.failed, report.symbols, report.relationships, report.duration_ms
        );
        report
    }

    fn store_result(&self, result: &ParseResult) -> crate::error::Result<()> {
        self.store.store_symbols(&result.file_path, &result.symbols)?;
        self.store
            .store_relationships(&result.file_path, &result.relationships)?;
        self.store.store_patterns(&result.file_path, &result.patterns)?;
        Ok(())
    }

    pub async fn shutdown(&self) {
        self.pool.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::store::MemoryStore;
    use std::time::Duration;

    fn indexer(store: Arc<MemoryStore>) -> Indexer {
        let pipeline = Arc::new(ParsePipeline::new(Arc::new(ParseCache::new(CacheStrategy::Moderate))));
        let pool_config = PoolConfig {
            max_workers: 2,
            worker_timeout: Duration::from_secs(10),
            ..Default::default()
        };
        Indexer::new(pipeline, pool_config, store, ParseOptions::default())
    }

    #[tokio::test]
    async fn test_index_files_fills_store() {
        let store = Arc::new(MemoryStore::new());
        let indexer = indexer(store.clone());
        let files = vec![
            (
                "app/main.py".to_string(),
                "import subprocess\n\ndef run():\n    subprocess.run(['node', 'build.js'])\n".to_string(),
            ),
            (
                "src/lib.rs".to_string(),
                "pub struct Config;\n\nimpl Config {\n    pub fn new() -> Self { Config }\n}\n".to_string(),
            ),
            ("notes.txt".to_string(), "not code".to_string()),
        ];

        let mut seen = Vec::new();
        let report = indexer
            .index_files_with(files, |path, outcome| seen.push((path.to_string(), outcome.is_ok())))
            .await;

        assert_eq!(report.files, 3);
        assert_eq!(report.parsed, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.errors[0].0, "notes.txt");
        assert_eq!(report.cross_language, 1);
        assert_eq!(seen.len(), 3);

        assert_eq!(store.file_count(), 2);
        assert!(store.symbols_for("src/lib.rs").iter().any(|s| s.qualified_name == "Config::new"));
        assert!(store.relationships_for("app/main.py").iter().any(|r| r.to_name == "build.js"));
        indexer.shutdown().await;
    }

    #[tokio::test]
    async fn test_reindex_hits_cache() {
        let store = Arc::new(MemoryStore::new());
        let indexer = indexer(store);
        let files = vec![("a.go".to_string(), "package a\n\nfunc A() {}\n".to_string())];
        indexer.index_files(files.clone()).await;
        let report = indexer.index_files(files).await;
        assert_eq!(report.from_cache, 1);
        assert_eq!(indexer.pipeline().cache().stats().hits, 1);
        indexer.shutdown().await;
    }
}

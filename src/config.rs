// Configuration management for Module Sentinel

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::index::Language;
use crate::indexer::{CacheStrategy, ParseOptions, PipelineConfig, PoolConfig};

pub const CONFIG_FILE: &str = ".sentinel.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub project: ProjectConfig,
    pub languages: LanguagesConfig,
    pub indexing: IndexingConfig,
    pub parsing: ParsingConfig,
    pub workers: WorkersConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    pub name: String,
    pub root: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LanguagesConfig {
    pub enabled: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexingConfig {
    pub exclude: Vec<String>,
    pub include: Vec<String>,
    pub batch_size: usize,
    /// Files larger than this are skipped.
    pub max_file_size_kb: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParsingConfig {
    pub cache_strategy: CacheStrategy,
    pub enable_semantic_analysis: bool,
    pub semantic_analysis_timeout_ms: u64,
    pub detect_cross_language: bool,
    pub fallback_min_symbols: usize,
    pub fallback_min_bytes: usize,
    pub fallback_replace_ratio: f64,
    pub debug_mode: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkersConfig {
    /// Zero means one worker per available core.
    pub max_workers: usize,
    pub queue_timeout_ms: u64,
    pub worker_timeout_ms: u64,
    pub retry_attempts: u32,
    pub retry_backoff_ms: u64,
    pub memory_threshold_mb: u64,
    pub max_queue_size: usize,
    pub tick_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: "unnamed-project".to_string(),
            root: ".".to_string(),
        }
    }
}

impl Default for LanguagesConfig {
    fn default() -> Self {
        Self {
            enabled: ["cpp", "typescript", "javascript", "python", "rust", "go", "java"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            exclude: vec![
                "target/".to_string(),
                "node_modules/".to_string(),
                "dist/".to_string(),
                "build/".to_string(),
                "*.min.js".to_string(),
                "**/__pycache__/**".to_string(),
                ".git/".to_string(),
            ],
            include: vec![],
            batch_size: 100,
            max_file_size_kb: 1024,
        }
    }
}

impl Default for ParsingConfig {
    fn default() -> Self {
        let pipeline = PipelineConfig::default();
        let options = ParseOptions::default();
        Self {
            cache_strategy: options.cache_strategy,
            enable_semantic_analysis: options.enable_semantic_analysis,
            semantic_analysis_timeout_ms: options.semantic_analysis_timeout.as_millis() as u64,
            detect_cross_language: pipeline.detect_cross_language,
            fallback_min_symbols: pipeline.fallback_min_symbols,
            fallback_min_bytes: pipeline.fallback_min_bytes,
            fallback_replace_ratio: pipeline.fallback_replace_ratio,
            debug_mode: false,
        }
    }
}

impl Default for WorkersConfig {
    fn default() -> Self {
        let pool = PoolConfig::default();
        Self {
            max_workers: 0,
            queue_timeout_ms: pool.queue_timeout.as_millis() as u64,
            worker_timeout_ms: pool.worker_timeout.as_millis() as u64,
            retry_attempts: pool.retry_attempts,
            retry_backoff_ms: pool.retry_backoff.as_millis() as u64,
            memory_threshold_mb: pool.memory_threshold_mb,
            max_queue_size: pool.max_queue_size,
            tick_interval_ms: pool.tick_interval.as_millis() as u64,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from project directory
    /// Looks for .sentinel.toml in the project root
    pub fn from_project_dir<P: AsRef<Path>>(project_dir: P) -> Self {
        let config_path = project_dir.as_ref().join(CONFIG_FILE);

        match Self::from_file(&config_path) {
            Ok(config) => {
                tracing::info!("Loaded configuration from {}", config_path.display());
                config
            }
            Err(e) => {
                tracing::debug!("Could not load config from {}: {}", config_path.display(), e);
                tracing::info!("Using default configuration");
                Self::default()
            }
        }
    }

    /// Check if a file path should be indexed based on include/exclude patterns
    pub fn should_index_file(&self, file_path: &str) -> bool {
        if self
            .indexing
            .exclude
            .iter()
            .any(|pattern| self.matches_pattern(file_path, pattern))
        {
            return false;
        }

        // With include patterns, the file must match at least one
        self.indexing.include.is_empty()
            || self
                .indexing
                .include
                .iter()
                .any(|pattern| self.matches_pattern(file_path, pattern))
    }

    /// Glob-style matching for the handful of shapes config files use
    fn matches_pattern(&self, file_path: &str, pattern: &str) -> bool {
        if pattern.ends_with('/') {
            // Directory pattern
            file_path.starts_with(pattern) || file_path.contains(&format!("/{}", pattern))
        } else if let Some(suffix) = pattern.strip_prefix('*') {
            if suffix.starts_with('*') {
                // **/dir/** style
                let inner = pattern.trim_matches('*').trim_matches('/');
                !inner.is_empty() && file_path.contains(&format!("/{}/", inner))
            } else {
                file_path.ends_with(suffix)
            }
        } else {
            file_path.contains(pattern)
        }
    }

    /// Enabled languages that have an extraction module
    pub fn enabled_languages(&self) -> Vec<Language> {
        let mut languages = Vec::new();
        for name in &self.languages.enabled {
            let Ok(language) = name.parse::<Language>() else {
                continue;
            };
            if !languages.contains(&language) {
                languages.push(language);
            }
            // Enabling TypeScript covers its TSX dialect too.
            if language == Language::TypeScript && !languages.contains(&Language::Tsx) {
                languages.push(Language::Tsx);
            }
        }
        languages
    }

    pub fn max_file_size(&self) -> u64 {
        self.indexing.max_file_size_kb * 1024
    }

    pub fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            debug_mode: self.parsing.debug_mode,
            cache_strategy: self.parsing.cache_strategy,
            enable_semantic_analysis: self.parsing.enable_semantic_analysis,
            semantic_analysis_timeout: Duration::from_millis(self.parsing.semantic_analysis_timeout_ms),
            project_id: Some(self.project.name.clone()),
            language: None,
        }
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            fallback_min_symbols: self.parsing.fallback_min_symbols,
            fallback_min_bytes: self.parsing.fallback_min_bytes,
            fallback_replace_ratio: self.parsing.fallback_replace_ratio,
            detect_cross_language: self.parsing.detect_cross_language,
        }
    }

    pub fn pool_config(&self) -> PoolConfig {
        let defaults = PoolConfig::default();
        let workers = &self.workers;
        PoolConfig {
            max_workers: if workers.max_workers == 0 {
                defaults.max_workers
            } else {
                workers.max_workers
            },
            queue_timeout: Duration::from_millis(workers.queue_timeout_ms),
            worker_timeout: Duration::from_millis(workers.worker_timeout_ms),
            retry_attempts: workers.retry_attempts,
            retry_backoff: Duration::from_millis(workers.retry_backoff_ms),
            memory_threshold_mb: workers.memory_threshold_mb,
            max_queue_size: workers.max_queue_size,
            tick_interval: Duration::from_millis(workers.tick_interval_ms),
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.project.name.is_empty() {
            return Err(anyhow::anyhow!("Project name cannot be empty"));
        }

        for lang in &self.languages.enabled {
            if lang.parse::<Language>().is_err() {
                return Err(anyhow::anyhow!("Unsupported language: {}", lang));
            }
        }

        if self.indexing.batch_size == 0 {
            return Err(anyhow::anyhow!("Batch size must be greater than 0"));
        }
        if self.indexing.max_file_size_kb == 0 {
            return Err(anyhow::anyhow!("Max file size must be greater than 0"));
        }

        if self.parsing.fallback_replace_ratio <= 0.0 {
            return Err(anyhow::anyhow!("Fallback replace ratio must be positive"));
        }

        let workers = &self.workers;
        if workers.worker_timeout_ms == 0 {
            return Err(anyhow::anyhow!("Worker timeout must be greater than 0"));
        }
        if workers.queue_timeout_ms == 0 {
            return Err(anyhow::anyhow!("Queue timeout must be greater than 0"));
        }
        if workers.max_queue_size == 0 {
            return Err(anyhow::anyhow!("Queue size must be greater than 0"));
        }
        if workers.memory_threshold_mb == 0 {
            return Err(anyhow::anyhow!("Memory threshold must be greater than 0"));
        }
        if workers.tick_interval_ms == 0 {
            return Err(anyhow::anyhow!("Tick interval must be greater than 0"));
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(anyhow::anyhow!("Invalid log level: {}", self.logging.level));
        }
        let valid_formats = ["compact", "pretty", "json"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            return Err(anyhow::anyhow!("Invalid log format: {}", self.logging.format));
        }

        Ok(())
    }
}

/// Load configuration for a project
pub fn load_config(project_dir: &str) -> Config {
    Config::from_project_dir(project_dir)
}

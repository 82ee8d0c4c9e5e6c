// Error types for the parsing core and the worker pool

use thiserror::Error;

/// Errors raised while turning one file into a parse result.
#[derive(Error, Debug)]
pub enum SentinelError {
    #[error("No language registered for file: {0}")]
    UnsupportedLanguage(String),

    #[error("Grammar unavailable for {language}: {reason}")]
    GrammarUnavailable { language: String, reason: String },

    #[error("Parse failed for {file}: {reason}")]
    ParseFailed { file: String, reason: String },

    #[error("Parse cancelled")]
    Cancelled,

    #[error("Store error: {0}")]
    Store(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SentinelError {
    /// Grammar problems route the language to pattern extraction instead of failing the file.
    pub fn is_grammar_failure(&self) -> bool {
        matches!(self, Self::GrammarUnavailable { .. })
    }
}

pub type Result<T> = std::result::Result<T, SentinelError>;

/// Errors surfaced by the worker pool, either at admission or as a job's terminal outcome.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PoolError {
    #[error("Queue full: {capacity} jobs already pending")]
    QueueFull { capacity: usize },

    #[error("Memory pressure: {used_mb}MB in use, threshold is {threshold_mb}MB")]
    MemoryPressure { used_mb: u64, threshold_mb: u64 },

    #[error("Job for {file} waited {waited_ms}ms in the queue")]
    QueueTimeout { file: String, waited_ms: u64 },

    #[error("Worker timed out on {file} after {attempts} attempts")]
    WorkerTimeout { file: String, attempts: u32 },

    #[error("Worker crashed on {file} after {attempts} attempts: {message}")]
    WorkerCrashed {
        file: String,
        attempts: u32,
        message: String,
    },

    #[error("Job failed: {0}")]
    Job(String),

    #[error("Worker pool is shut down")]
    ShutDown,
}

impl PoolError {
    /// Rejections raised synchronously by `submit`.
    pub fn is_admission(&self) -> bool {
        matches!(
            self,
            Self::QueueFull { .. } | Self::MemoryPressure { .. } | Self::ShutDown
        )
    }

    /// Failures that went through the retry path before surfacing.
    pub fn is_exhausted_retry(&self) -> bool {
        matches!(self, Self::WorkerTimeout { .. } | Self::WorkerCrashed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = PoolError::MemoryPressure {
            used_mb: 2048,
            threshold_mb: 1024,
        };
        assert_eq!(
            err.to_string(),
            "Memory pressure: 2048MB in use, threshold is 1024MB"
        );

        let err = SentinelError::GrammarUnavailable {
            language: "cpp".to_string(),
            reason: "version mismatch".to_string(),
        };
        assert!(err.is_grammar_failure());
        assert!(err.to_string().contains("cpp"));
    }

    #[test]
    fn test_pool_error_classes() {
        assert!(PoolError::QueueFull { capacity: 10 }.is_admission());
        assert!(PoolError::ShutDown.is_admission());
        assert!(!PoolError::Job("boom".into()).is_admission());
        assert!(PoolError::WorkerTimeout {
            file: "a.py".into(),
            attempts: 3
        }
        .is_exhausted_retry());
    }
}

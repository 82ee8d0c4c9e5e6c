// Cooperative cancellation for a running parse

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{Result, SentinelError};

/// Shared flag set by the pool when a dispatch misses its deadline.
///
/// Clones observe the same flag. The grammar parse polls it through tree-sitter's
/// progress callback; the pipeline checks it between passes.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// `Err(Cancelled)` once the flag is set.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(SentinelError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_the_flag() {
        let token = CancelToken::new();
        let seen_by_worker = token.clone();
        assert!(seen_by_worker.check().is_ok());

        token.cancel();
        assert!(seen_by_worker.is_cancelled());
        assert!(matches!(seen_by_worker.check(), Err(SentinelError::Cancelled)));
    }
}

// Memory probes used for admission control

use std::fs;

/// Reports current memory use in megabytes.
pub trait MemoryProbe: Send + Sync {
    fn used_mb(&self) -> u64;
}

const PAGE_SIZE: u64 = 4096;

/// Resident set size of this process, read from `/proc/self/statm`.
///
/// Reports zero where procfs is unavailable, so admission never rejects on those platforms.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessMemory;

impl MemoryProbe for ProcessMemory {
    fn used_mb(&self) -> u64 {
        fs::read_to_string("/proc/self/statm")
            .ok()
            .and_then(|statm| parse_statm(&statm))
            .map(|pages| pages * PAGE_SIZE / (1024 * 1024))
            .unwrap_or(0)
    }
}

fn parse_statm(statm: &str) -> Option<u64> {
    statm.split_whitespace().nth(1)?.parse().ok()
}

/// Probe returning a fixed value
#[derive(Debug, Default)]
pub struct FixedMemory(pub std::sync::atomic::AtomicU64);

impl FixedMemory {
    pub fn new(mb: u64) -> Self {
        Self(std::sync::atomic::AtomicU64::new(mb))
    }

    pub fn set(&self, mb: u64) {
        self.0.store(mb, std::sync::atomic::Ordering::Relaxed);
    }
}

impl MemoryProbe for FixedMemory {
    fn used_mb(&self) -> u64 {
        self.0.load(std::sync::atomic::Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_statm_reads_resident_pages() {
        assert_eq!(parse_statm("10240 2560 300 10 0 900 0\n"), Some(2560));
        assert_eq!(parse_statm(""), None);
    }

    #[test]
    fn test_fixed_memory() {
        let probe = FixedMemory::new(512);
        assert_eq!(probe.used_mb(), 512);
        probe.set(2048);
        assert_eq!(probe.used_mb(), 2048);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_process_memory_is_nonzero_on_linux() {
        assert!(ProcessMemory.used_mb() > 0);
    }
}

// Parse result cache with TTL expiry and batched eviction

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::index::{
    ControlFlowSummary, Language, ParseMetadata, ParseResult, ParseStats, Pattern, Relationship,
    Symbol,
};

/// Share of the capacity dropped in one eviction pass.
const EVICTION_FRACTION: f64 = 0.1;

/// Named TTL / capacity presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStrategy {
    Aggressive,
    #[default]
    Moderate,
    /// Short-lived and never consulted by the pipeline.
    Minimal,
}

impl CacheStrategy {
    pub fn ttl(&self) -> Duration {
        match self {
            CacheStrategy::Aggressive => Duration::from_secs(30 * 60),
            CacheStrategy::Moderate => Duration::from_secs(5 * 60),
            CacheStrategy::Minimal => Duration::from_secs(60),
        }
    }

    pub fn capacity(&self) -> usize {
        match self {
            CacheStrategy::Aggressive => 500,
            CacheStrategy::Moderate => 100,
            CacheStrategy::Minimal => 20,
        }
    }

    pub fn limits(&self) -> CacheLimits {
        CacheLimits {
            ttl: self.ttl(),
            capacity: self.capacity(),
        }
    }

    /// Whether parses under this strategy read and write the cache at all.
    pub fn memoizes(&self) -> bool {
        !matches!(self, CacheStrategy::Minimal)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStrategy::Aggressive => "aggressive",
            CacheStrategy::Moderate => "moderate",
            CacheStrategy::Minimal => "minimal",
        }
    }
}

impl fmt::Display for CacheStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CacheStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "aggressive" => Ok(CacheStrategy::Aggressive),
            "moderate" => Ok(CacheStrategy::Moderate),
            "minimal" | "disabled" | "none" => Ok(CacheStrategy::Minimal),
            other => Err(format!("Unknown cache strategy: {}", other)),
        }
    }
}

/// Expiry and size bound applied by one lookup or insert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheLimits {
    pub ttl: Duration,
    pub capacity: usize,
}

/// Cached extraction output for one file
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub language: Language,
    pub symbols: Vec<Symbol>,
    pub relationships: Vec<Relationship>,
    pub patterns: Vec<Pattern>,
    pub control_flow: Vec<ControlFlowSummary>,
    pub stats: ParseStats,
    pub metadata: ParseMetadata,
    pub timestamp: Instant,
    pub content_hash: Option<String>,
}

impl CacheEntry {
    pub fn from_result(result: &ParseResult) -> Self {
        Self {
            language: result.language,
            symbols: result.symbols.clone(),
            relationships: result.relationships.clone(),
            patterns: result.patterns.clone(),
            control_flow: result.control_flow.clone(),
            stats: result.stats.clone(),
            metadata: result.metadata.clone(),
            timestamp: Instant::now(),
            content_hash: Some(result.metadata.content_hash.clone()).filter(|h| !h.is_empty()),
        }
    }

    /// Rebuild the result this entry was made from, flagged as served from cache.
    pub fn to_result(&self, file_path: &str) -> ParseResult {
        let mut metadata = self.metadata.clone();
        metadata.from_cache = true;
        metadata.duration_ms = 0;
        ParseResult {
            file_path: file_path.to_string(),
            language: self.language,
            symbols: self.symbols.clone(),
            relationships: self.relationships.clone(),
            patterns: self.patterns.clone(),
            control_flow: self.control_flow.clone(),
            stats: self.stats.clone(),
            metadata,
        }
    }
}

/// Counters for diagnostics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub entries: usize,
    pub capacity: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct Slot {
    entry: CacheEntry,
    seq: u64,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<String, Slot>,
    seq: u64,
    stats: CacheStats,
}

/// Process-wide cache keyed by file path. Constructed once and shared through `Arc`.
///
/// The construction limits apply to `get` and `set`. Callers parsing under a
/// different strategy pass its limits to `get_with` and `set_with`; the keyspace
/// stays shared.
pub struct ParseCache {
    inner: Mutex<Inner>,
    limits: CacheLimits,
}

impl ParseCache {
    pub fn new(strategy: CacheStrategy) -> Self {
        Self::with_limits(strategy.ttl(), strategy.capacity())
    }

    pub fn with_limits(ttl: Duration, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Mutex::new(Inner {
                stats: CacheStats {
                    capacity,
                    ..CacheStats::default()
                },
                ..Inner::default()
            }),
            limits: CacheLimits { ttl, capacity },
        }
    }

    pub fn ttl(&self) -> Duration {
        self.limits.ttl
    }

    pub fn capacity(&self) -> usize {
        self.limits.capacity
    }

    pub fn limits(&self) -> CacheLimits {
        self.limits
    }

    pub fn get(&self, file_path: &str, content_hash: Option<&str>) -> Option<CacheEntry> {
        self.get_with(file_path, content_hash, self.limits)
    }

    /// Entry for `file_path` if it is younger than `limits.ttl` and, when `content_hash`
    /// is given, still matches it.
    ///
    /// Stale and mismatched entries are evicted on the spot and count as misses.
    pub fn get_with(&self, file_path: &str, content_hash: Option<&str>, limits: CacheLimits) -> Option<CacheEntry> {
        let mut inner = self.inner.lock();
        let verdict = inner.entries.get(file_path).map(|slot| {
            let expired = slot.entry.timestamp.elapsed() > limits.ttl;
            let mismatched = match (content_hash, slot.entry.content_hash.as_deref()) {
                (Some(wanted), Some(stored)) => wanted != stored,
                _ => false,
            };
            (expired, mismatched)
        });

        match verdict {
            Some((false, false)) => {
                inner.stats.hits += 1;
                inner.entries.get(file_path).map(|slot| slot.entry.clone())
            }
            Some((expired, _)) => {
                inner.entries.remove(file_path);
                inner.stats.misses += 1;
                if expired {
                    inner.stats.expirations += 1;
                    debug!("Cache entry for {} expired", file_path);
                } else {
                    inner.stats.evictions += 1;
                    debug!("Cache entry for {} no longer matches its content", file_path);
                }
                inner.stats.entries = inner.entries.len();
                None
            }
            None => {
                inner.stats.misses += 1;
                None
            }
        }
    }

    pub fn set(&self, file_path: &str, entry: CacheEntry) {
        self.set_with(file_path, entry, self.limits)
    }

    /// Insert under `limits.capacity`. A full cache drops its oldest tenth in one pass,
    /// plus whatever a larger strategy left above this capacity.
    pub fn set_with(&self, file_path: &str, entry: CacheEntry, limits: CacheLimits) {
        let capacity = limits.capacity.max(1);
        let mut inner = self.inner.lock();
        let len = inner.entries.len();
        if !inner.entries.contains_key(file_path) && len >= capacity {
            let count = len - capacity + batch_size(capacity);
            let evicted = Self::evict_oldest(&mut inner, count);
            debug!("Cache full at {} entries, evicted {}", capacity, evicted);
        }
        inner.seq += 1;
        let seq = inner.seq;
        inner.entries.insert(file_path.to_string(), Slot { entry, seq });
        inner.stats.entries = inner.entries.len();
    }

    pub fn invalidate(&self, file_path: &str) -> bool {
        let mut inner = self.inner.lock();
        let removed = inner.entries.remove(file_path).is_some();
        inner.stats.entries = inner.entries.len();
        removed
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.stats.entries = 0;
    }

    /// Drop every expired entry; returns how many went.
    pub fn prune_expired(&self) -> usize {
        let mut inner = self.inner.lock();
        let before = inner.entries.len();
        let ttl = self.limits.ttl;
        inner.entries.retain(|_, slot| slot.entry.timestamp.elapsed() <= ttl);
        let pruned = before - inner.entries.len();
        inner.stats.expirations += pruned as u64;
        inner.stats.entries = inner.entries.len();
        pruned
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.lock().stats.clone()
    }

    fn evict_oldest(inner: &mut Inner, count: usize) -> usize {
        let mut order: Vec<(Instant, u64, String)> = inner
            .entries
            .iter()
            .map(|(path, slot)| (slot.entry.timestamp, slot.seq, path.clone()))
            .collect();
        order.sort();
        let mut evicted = 0;
        for (_, _, path) in order.into_iter().take(count) {
            inner.entries.remove(&path);
            evicted += 1;
        }
        inner.stats.evictions += evicted as u64;
        evicted
    }
}

fn batch_size(capacity: usize) -> usize {
    ((capacity as f64 * EVICTION_FRACTION).ceil() as usize).max(1)
}

impl Default for ParseCache {
    fn default() -> Self {
        Self::new(CacheStrategy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn entry(hash: &str) -> CacheEntry {
        let mut result = ParseResult::empty("a.py", Language::Python);
        result.metadata.content_hash = hash.to_string();
        CacheEntry::from_result(&result)
    }

    #[test]
    fn test_strategy_presets() {
        assert_eq!(CacheStrategy::Aggressive.ttl(), Duration::from_secs(1800));
        assert_eq!(CacheStrategy::Moderate.capacity(), 100);
        assert_eq!(CacheStrategy::Minimal.capacity(), 20);
        assert!(!CacheStrategy::Minimal.memoizes());
        assert_eq!("Aggressive".parse::<CacheStrategy>().unwrap(), CacheStrategy::Aggressive);
        assert!("sometimes".parse::<CacheStrategy>().is_err());
    }

    #[test]
    fn test_hit_and_miss() {
        let cache = ParseCache::new(CacheStrategy::Moderate);
        assert!(cache.get("a.py", None).is_none());
        cache.set("a.py", entry("h1"));

        let hit = cache.get("a.py", Some("h1")).unwrap();
        assert_eq!(hit.content_hash.as_deref(), Some("h1"));
        assert!(hit.to_result("a.py").metadata.from_cache);

        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses), (1, 1));
    }

    #[test]
    fn test_hash_mismatch_is_a_miss() {
        let cache = ParseCache::new(CacheStrategy::Moderate);
        cache.set("a.py", entry("h1"));
        assert!(cache.get("a.py", Some("h2")).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_expired_entries_are_evicted_on_lookup() {
        let cache = ParseCache::with_limits(Duration::from_millis(10), 10);
        cache.set("a.py", entry("h1"));
        std::thread::sleep(Duration::from_millis(30));
        assert!(cache.get("a.py", None).is_none());
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.stats().expirations, 1);
    }

    #[test]
    fn test_prune_expired() {
        let cache = ParseCache::with_limits(Duration::from_millis(10), 10);
        cache.set("a.py", entry("h1"));
        cache.set("b.py", entry("h2"));
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(cache.prune_expired(), 2);
    }

    #[test]
    fn test_overflow_evicts_oldest_batch() {
        let cache = ParseCache::with_limits(Duration::from_secs(60), 20);
        for i in 0..=20 {
            cache.set(&format!("f{}.py", i), entry("h"));
        }
        // 20 - ceil(2.0) + 1
        assert_eq!(cache.len(), 19);
        assert!(cache.get("f0.py", None).is_none());
        assert!(cache.get("f1.py", None).is_none());
        assert!(cache.get("f2.py", None).is_some());
        assert!(cache.get("f20.py", None).is_some());
    }

    #[test]
    fn test_overwrite_does_not_evict() {
        let cache = ParseCache::with_limits(Duration::from_secs(60), 2);
        cache.set("a.py", entry("1"));
        cache.set("b.py", entry("1"));
        cache.set("a.py", entry("2"));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.stats().evictions, 0);
    }

    #[test]
    fn test_lookup_applies_requested_ttl() {
        let cache = ParseCache::new(CacheStrategy::Aggressive);
        cache.set("a.py", entry("h1"));
        std::thread::sleep(Duration::from_millis(30));

        let short = CacheLimits {
            ttl: Duration::from_millis(10),
            capacity: 100,
        };
        assert!(cache.get_with("a.py", Some("h1"), CacheStrategy::Aggressive.limits()).is_some());
        assert!(cache.get_with("a.py", Some("h1"), short).is_none());
        assert_eq!(cache.stats().expirations, 1);
    }

    #[test]
    fn test_insert_applies_requested_capacity() {
        let cache = ParseCache::new(CacheStrategy::Moderate);
        let aggressive = CacheStrategy::Aggressive.limits();
        for i in 0..=150 {
            cache.set_with(&format!("f{}.py", i), entry("h"), aggressive);
        }
        // A moderate cache alone would have capped this at 100.
        assert_eq!(cache.len(), 151);

        let moderate = CacheStrategy::Moderate.limits();
        cache.set_with("late.py", entry("h"), moderate);
        // Back under 100, then the usual batch of 10, then the new entry.
        assert_eq!(cache.len(), 91);
        assert!(cache.get("late.py", None).is_some());
        assert!(cache.get("f150.py", None).is_some());
        assert!(cache.get("f0.py", None).is_none());
    }

    proptest! {
        #[test]
        fn prop_eviction_leaves_expected_count(capacity in 1usize..200) {
            let cache = ParseCache::with_limits(Duration::from_secs(60), capacity);
            for i in 0..=capacity {
                cache.set(&format!("f{}", i), entry("h"));
            }
            let batch = ((capacity as f64 * 0.1).ceil() as usize).max(1);
            prop_assert_eq!(cache.len(), capacity - batch + 1);
        }
    }
}

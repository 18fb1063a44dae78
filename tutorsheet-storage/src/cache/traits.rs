//! Source trait for the read-through cache and cache statistics.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use tutorsheet_core::{DatasetKey, Record, SheetResult};

/// Loads a full dataset from its source.
///
/// `Err` means every source failed; the cache then falls back to a stale
/// snapshot or an empty list. An `Ok` value is cached as-is, including an
/// empty one.
#[async_trait]
pub trait DatasetFetcher: Send + Sync {
    async fn fetch(&self, key: DatasetKey) -> SheetResult<Vec<Record>>;
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Reads served from a snapshot within its TTL.
    pub hits: u64,
    /// Reads that had to go to the source (including joined fetches).
    pub misses: u64,
    /// Reads that joined a fetch already in flight.
    pub coalesced: u64,
    /// Fetches actually started.
    pub fetches: u64,
    /// Failed fetches answered with an expired snapshot.
    pub stale_served: u64,
    /// Number of datasets currently cached.
    pub entry_count: u64,
}

#[derive(Debug, Default)]
pub(crate) struct StatCounters {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub coalesced: AtomicU64,
    pub fetches: AtomicU64,
    pub stale_served: AtomicU64,
}

impl StatCounters {
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, entry_count: usize) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
            fetches: self.fetches.load(Ordering::Relaxed),
            stale_served: self.stale_served.load(Ordering::Relaxed),
            entry_count: entry_count as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_snapshot() {
        let counters = StatCounters::default();
        StatCounters::bump(&counters.fetches);
        StatCounters::bump(&counters.fetches);
        StatCounters::bump(&counters.hits);
        let stats = counters.snapshot(3);
        assert_eq!(stats.fetches, 2);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.entry_count, 3);
    }
}

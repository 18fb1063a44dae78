//! Tutorsheet Storage - Dataset Caching
//!
//! In-memory caching for datasets read from remote spreadsheets: a
//! read-through snapshot cache with TTL expiry, request coalescing and
//! stale fallback, plus a TTL cache for column option lists. The cache does
//! not know how data is fetched; it calls a [`DatasetFetcher`].

pub mod cache;

pub use cache::{
    CacheConfig, CacheRead, CacheStats, DatasetFetcher, Freshness, OptionCache, OptionList,
    ReadOrigin, ReadThroughCache, Snapshot, TimedEntry, TtlMap, DEFAULT_OPTION_COLUMN,
};

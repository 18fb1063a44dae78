//! Read-through dataset cache with TTL expiry and request coalescing.
//!
//! Per dataset key the cache moves between four states:
//!
//! - **Absent**: never fetched (or invalidated). The next read fetches.
//! - **Fresh**: snapshot younger than the TTL. Reads are served from memory
//!   unless the caller asks for [`Freshness::Refresh`].
//! - **Stale**: snapshot older than the TTL. Reads fetch, and the snapshot is
//!   kept as a fallback in case the fetch fails.
//! - **Fetching**: a fetch is outstanding. Every read that needs the source
//!   joins it, whatever its own freshness requirement, so concurrent readers
//!   cause exactly one request.
//!
//! Fetches run on their own task. A caller that stops waiting does not cancel
//! the fetch, and the in-flight registration is removed by a drop guard when
//! the task ends, whether it succeeded, failed or panicked.
//!
//! Invalidation leaves in-flight fetches running, but a fetch that started
//! before an invalidation of its key hands its result to its callers without
//! storing it, so a write is never shadowed by a read that raced it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use tracing::{debug, error, info, warn};
use tutorsheet_core::{DatasetKey, Record};

use super::freshness::{CacheRead, Freshness};
use super::traits::{CacheStats, DatasetFetcher, StatCounters};
use super::ttl_map::TtlMap;

/// Immutable dataset snapshot shared by every reader.
pub type Snapshot = Arc<Vec<Record>>;

type PendingRead = Shared<BoxFuture<'static, CacheRead<Snapshot>>>;

/// Configuration for the read-through cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// How long a dataset snapshot is served without refetching.
    pub entry_ttl: Duration,
    /// How long a column option list is served without refetching.
    pub options_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            entry_ttl: Duration::from_secs(5 * 60),
            options_ttl: Duration::from_secs(10 * 60),
        }
    }
}

impl CacheConfig {
    /// Create a new cache config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the dataset snapshot TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.entry_ttl = ttl;
        self
    }

    /// Set the option list TTL.
    pub fn with_options_ttl(mut self, ttl: Duration) -> Self {
        self.options_ttl = ttl;
        self
    }
}

/// Read-through cache over a [`DatasetFetcher`].
///
/// Cloning is cheap and clones share state.
///
/// # Example
///
/// ```ignore
/// let cache = ReadThroughCache::new(fetcher, CacheConfig::default());
///
/// let students = cache.get(DatasetKey::Students, Freshness::WithinTtl).await;
/// if students.is_degraded() {
///     tracing::warn!(age = ?students.staleness(), "showing cached students");
/// }
/// ```
pub struct ReadThroughCache<F> {
    inner: Arc<Inner<F>>,
}

struct Inner<F> {
    fetcher: F,
    entries: TtlMap<DatasetKey, Snapshot>,
    in_flight: Mutex<HashMap<DatasetKey, PendingRead>>,
    /// Bumped per key on every invalidation.
    generations: Mutex<HashMap<DatasetKey, u64>>,
    stats: StatCounters,
    config: CacheConfig,
}

impl<F> ReadThroughCache<F>
where
    F: DatasetFetcher + 'static,
{
    /// Create a new read-through cache.
    pub fn new(fetcher: F, config: CacheConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                fetcher,
                entries: TtlMap::new(config.entry_ttl),
                in_flight: Mutex::new(HashMap::new()),
                generations: Mutex::new(HashMap::new()),
                stats: StatCounters::default(),
                config,
            }),
        }
    }

    pub fn fetcher(&self) -> &F {
        &self.inner.fetcher
    }

    /// Read a dataset.
    ///
    /// Never fails: when the source is unreachable the previous snapshot is
    /// returned (marked [`ReadOrigin::StaleFallback`](super::ReadOrigin)), or
    /// an empty list if there is none. Must be called inside a tokio runtime.
    pub async fn get(&self, key: DatasetKey, freshness: Freshness) -> CacheRead<Snapshot> {
        if !freshness.is_refresh() {
            if let Some(entry) = self.inner.entries.get_fresh(&key) {
                StatCounters::bump(&self.inner.stats.hits);
                debug!(dataset = %key, age = ?entry.age(), "serving cached dataset");
                return CacheRead::from_cache(entry.value, entry.captured_at);
            }
        }
        StatCounters::bump(&self.inner.stats.misses);
        self.join_or_start(key).await
    }

    /// Join the outstanding fetch for `key`, or register and start one.
    ///
    /// Registration happens under the registry lock before anything is
    /// awaited, so two readers can never both start a fetch.
    fn join_or_start(&self, key: DatasetKey) -> PendingRead {
        let mut in_flight = self.inner.lock_in_flight();
        if let Some(pending) = in_flight.get(&key) {
            StatCounters::bump(&self.inner.stats.coalesced);
            debug!(dataset = %key, "joining in-flight fetch");
            return pending.clone();
        }

        StatCounters::bump(&self.inner.stats.fetches);
        debug!(dataset = %key, "starting fetch");

        let task_inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move {
            let _registration = InFlightGuard {
                inner: Arc::clone(&task_inner),
                key,
            };
            let generation = task_inner.generation(key);
            task_inner.fetch_and_store(key, generation).await
        });

        let join_inner = Arc::clone(&self.inner);
        let pending = async move {
            match task.await {
                Ok(read) => read,
                Err(err) => {
                    error!(dataset = %key, error = %err, "dataset fetch task aborted");
                    join_inner.fallback(key)
                }
            }
        }
        .boxed()
        .shared();

        in_flight.insert(key, pending.clone());
        pending
    }

    /// Drop the snapshot for `key`. A fetch already in flight keeps running
    /// but will not store its result.
    pub fn invalidate(&self, key: DatasetKey) -> bool {
        let mut generations = self.inner.lock_generations();
        *generations.entry(key).or_default() += 1;
        let removed = self.inner.entries.remove(&key);
        debug!(dataset = %key, removed, "invalidated dataset");
        removed
    }

    /// Drop every snapshot.
    pub fn invalidate_all(&self) -> usize {
        let mut generations = self.inner.lock_generations();
        for key in DatasetKey::ALL {
            *generations.entry(key).or_default() += 1;
        }
        let removed = self.inner.entries.clear();
        debug!(removed, "invalidated all datasets");
        removed
    }

    /// Age of the snapshot for `key`, fresh or not.
    pub fn age(&self, key: DatasetKey) -> Option<Duration> {
        self.inner.entries.age(&key)
    }

    /// Snapshot for `key` without touching the source, fresh or not.
    pub fn peek(&self, key: DatasetKey) -> Option<CacheRead<Snapshot>> {
        self.inner.entries.get_any(&key).map(|entry| {
            if entry.is_fresh(self.inner.config.entry_ttl) {
                CacheRead::from_cache(entry.value, entry.captured_at)
            } else {
                CacheRead::stale(entry.value, entry.captured_at)
            }
        })
    }

    /// Whether a fetch for `key` is outstanding.
    pub fn is_fetching(&self, key: DatasetKey) -> bool {
        self.inner.lock_in_flight().contains_key(&key)
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.stats.snapshot(self.inner.entries.len())
    }
}

impl<F> Inner<F>
where
    F: DatasetFetcher,
{
    async fn fetch_and_store(&self, key: DatasetKey, generation: u64) -> CacheRead<Snapshot> {
        match self.fetcher.fetch(key).await {
            Ok(records) => {
                let rows = records.len();
                let generations = self.lock_generations();
                if generations.get(&key).copied().unwrap_or_default() != generation {
                    info!(dataset = %key, rows, "dataset invalidated during fetch, not storing");
                    return CacheRead::fetched(Arc::new(records), Utc::now());
                }
                let entry = self.entries.put(key, Arc::new(records));
                drop(generations);
                info!(dataset = %key, rows, "dataset refreshed");
                CacheRead::fetched(entry.value, entry.captured_at)
            }
            Err(err) => {
                warn!(dataset = %key, error = %err, "dataset fetch failed");
                self.fallback(key)
            }
        }
    }

    /// Previous snapshot regardless of age, or an empty list.
    fn fallback(&self, key: DatasetKey) -> CacheRead<Snapshot> {
        match self.entries.get_any(&key) {
            Some(entry) => {
                StatCounters::bump(&self.stats.stale_served);
                warn!(dataset = %key, age = ?entry.age(), "serving stale dataset");
                CacheRead::stale(entry.value, entry.captured_at)
            }
            None => CacheRead::empty(Arc::new(Vec::new())),
        }
    }
}

impl<F> Inner<F> {
    fn generation(&self, key: DatasetKey) -> u64 {
        self.lock_generations().get(&key).copied().unwrap_or_default()
    }

    fn lock_generations(&self) -> MutexGuard<'_, HashMap<DatasetKey, u64>> {
        self.generations.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_in_flight(&self) -> MutexGuard<'_, HashMap<DatasetKey, PendingRead>> {
        self.in_flight.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Removes the in-flight registration when the fetch task ends.
struct InFlightGuard<F> {
    inner: Arc<Inner<F>>,
    key: DatasetKey,
}

impl<F> Drop for InFlightGuard<F> {
    fn drop(&mut self) {
        self.inner.lock_in_flight().remove(&self.key);
    }
}

impl<F> Clone for ReadThroughCache<F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::freshness::ReadOrigin;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tutorsheet_core::{Fields, RowPosition, SheetError, SheetResult};

    const TTL: Duration = Duration::from_secs(300);

    /// Fetcher that counts calls, takes `delay` to answer, and fails or
    /// panics on demand.
    #[derive(Default)]
    struct CountingFetcher {
        calls: AtomicUsize,
        delay: Duration,
        fail: AtomicBool,
        panic: AtomicBool,
    }

    impl CountingFetcher {
        fn slow(delay: Duration) -> Self {
            Self {
                delay,
                ..Default::default()
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DatasetFetcher for CountingFetcher {
        async fn fetch(&self, key: DatasetKey) -> SheetResult<Vec<Record>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.panic.load(Ordering::SeqCst) {
                panic!("fetcher exploded");
            }
            if self.fail.load(Ordering::SeqCst) {
                return Err(SheetError::NoUsableRows(key));
            }
            let mut fields = Fields::new();
            fields.insert("call".to_string(), call.to_string());
            Ok(vec![Record::new(RowPosition::new(2), format!("t-{call}"), fields)])
        }
    }

    fn cache(fetcher: CountingFetcher) -> ReadThroughCache<CountingFetcher> {
        ReadThroughCache::new(fetcher, CacheConfig::new().with_ttl(TTL))
    }

    fn call_marker(read: &CacheRead<Snapshot>) -> Option<&str> {
        read.value().first().and_then(|r| r.get("call"))
    }

    #[tokio::test(start_paused = true)]
    async fn test_fresh_entry_is_served_without_fetching() {
        let cache = cache(CountingFetcher::default());

        let first = cache.get(DatasetKey::Students, Freshness::WithinTtl).await;
        let second = cache.get(DatasetKey::Students, Freshness::WithinTtl).await;

        assert_eq!(cache.fetcher().calls(), 1);
        assert_eq!(first.origin(), ReadOrigin::Fetched);
        assert!(second.was_cache_hit());
        assert!(Arc::ptr_eq(first.value(), second.value()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_after_ttl() {
        let cache = cache(CountingFetcher::default());
        cache.get(DatasetKey::Students, Freshness::WithinTtl).await;

        tokio::time::advance(TTL - Duration::from_millis(1)).await;
        cache.get(DatasetKey::Students, Freshness::WithinTtl).await;
        assert_eq!(cache.fetcher().calls(), 1);

        tokio::time::advance(Duration::from_millis(2)).await;
        let read = cache.get(DatasetKey::Students, Freshness::WithinTtl).await;
        assert_eq!(cache.fetcher().calls(), 2);
        assert_eq!(call_marker(&read), Some("2"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_reads_share_one_fetch() {
        let cache = cache(CountingFetcher::slow(Duration::from_millis(50)));

        let (a, b) = tokio::join!(
            cache.get(DatasetKey::Attendance, Freshness::WithinTtl),
            cache.get(DatasetKey::Attendance, Freshness::Refresh),
        );

        assert_eq!(cache.fetcher().calls(), 1);
        assert!(Arc::ptr_eq(a.value(), b.value()));
        assert_eq!(cache.stats().coalesced, 1);
        assert!(!cache.is_fetching(DatasetKey::Attendance));
    }

    #[tokio::test(start_paused = true)]
    async fn test_different_keys_fetch_independently() {
        let cache = cache(CountingFetcher::slow(Duration::from_millis(50)));

        tokio::join!(
            cache.get(DatasetKey::Students, Freshness::WithinTtl),
            cache.get(DatasetKey::Teachers, Freshness::WithinTtl),
        );

        assert_eq!(cache.fetcher().calls(), 2);
        assert_eq!(cache.stats().coalesced, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_refresh_serves_stale_snapshot() {
        let cache = cache(CountingFetcher::default());
        let original = cache.get(DatasetKey::Students, Freshness::WithinTtl).await;

        tokio::time::advance(TTL * 2).await;
        cache.fetcher().fail.store(true, Ordering::SeqCst);
        let read = cache.get(DatasetKey::Students, Freshness::Refresh).await;

        assert_eq!(read.origin(), ReadOrigin::StaleFallback);
        assert!(Arc::ptr_eq(original.value(), read.value()));
        // timestamp is not refreshed by a fallback
        assert_eq!(cache.age(DatasetKey::Students), Some(TTL * 2));
        assert_eq!(cache.stats().stale_served, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_without_snapshot_is_empty() {
        let fetcher = CountingFetcher::default();
        fetcher.fail.store(true, Ordering::SeqCst);
        let cache = cache(fetcher);

        let read = cache.get(DatasetKey::Progress, Freshness::WithinTtl).await;
        assert_eq!(read.origin(), ReadOrigin::Empty);
        assert!(read.value().is_empty());
        assert!(!cache.is_fetching(DatasetKey::Progress));
        assert_eq!(cache.age(DatasetKey::Progress), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_fetch_does_not_wedge_key() {
        let fetcher = CountingFetcher::default();
        fetcher.panic.store(true, Ordering::SeqCst);
        let cache = cache(fetcher);

        let read = cache.get(DatasetKey::Teachers, Freshness::WithinTtl).await;
        assert_eq!(read.origin(), ReadOrigin::Empty);
        assert!(!cache.is_fetching(DatasetKey::Teachers));

        cache.fetcher().panic.store(false, Ordering::SeqCst);
        let read = cache.get(DatasetKey::Teachers, Freshness::WithinTtl).await;
        assert_eq!(read.origin(), ReadOrigin::Fetched);
        assert_eq!(cache.fetcher().calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_forces_refetch() {
        let cache = cache(CountingFetcher::default());
        cache.get(DatasetKey::Students, Freshness::WithinTtl).await;
        cache.get(DatasetKey::Teachers, Freshness::WithinTtl).await;

        assert!(cache.invalidate(DatasetKey::Students));
        assert_eq!(cache.age(DatasetKey::Students), None);
        let read = cache.get(DatasetKey::Students, Freshness::WithinTtl).await;
        assert_eq!(read.origin(), ReadOrigin::Fetched);
        assert_eq!(cache.fetcher().calls(), 3);

        assert_eq!(cache.invalidate_all(), 2);
        assert!(cache.peek(DatasetKey::Teachers).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_racing_an_invalidation_is_not_stored() {
        let cache = cache(CountingFetcher::slow(Duration::from_millis(50)));

        let reader = tokio::spawn({
            let cache = cache.clone();
            async move { cache.get(DatasetKey::ClassGroups, Freshness::WithinTtl).await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(cache.is_fetching(DatasetKey::ClassGroups));
        cache.invalidate(DatasetKey::ClassGroups);

        let raced = reader.await.unwrap();
        assert_eq!(raced.origin(), ReadOrigin::Fetched);
        assert_eq!(call_marker(&raced), Some("1"));
        assert_eq!(cache.age(DatasetKey::ClassGroups), None);

        let read = cache.get(DatasetKey::ClassGroups, Freshness::WithinTtl).await;
        assert_eq!(call_marker(&read), Some("2"));
        assert!(cache.peek(DatasetKey::ClassGroups).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_forced_refresh_replaces_fresh_entry() {
        let cache = cache(CountingFetcher::default());
        cache.get(DatasetKey::Students, Freshness::WithinTtl).await;

        let read = cache.get(DatasetKey::Students, Freshness::Refresh).await;
        assert_eq!(read.origin(), ReadOrigin::Fetched);
        assert_eq!(call_marker(&read), Some("2"));
        assert_eq!(cache.stats().fetches, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_caller_does_not_cancel_fetch() {
        let cache = cache(CountingFetcher::slow(Duration::from_millis(50)));

        let abandoned = tokio::time::timeout(
            Duration::from_millis(10),
            cache.get(DatasetKey::Students, Freshness::WithinTtl),
        )
        .await;
        assert!(abandoned.is_err());
        assert!(cache.is_fetching(DatasetKey::Students));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!cache.is_fetching(DatasetKey::Students));
        assert!(cache.peek(DatasetKey::Students).is_some());
        assert_eq!(cache.fetcher().calls(), 1);
    }
}

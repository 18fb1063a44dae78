//! Freshness contracts for cache reads.
//!
//! Callers state whether a cached snapshot within its TTL is acceptable, and
//! every read reports where its value came from.

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Freshness requirement for dataset reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Freshness {
    /// Serve the cached snapshot if it is younger than the TTL.
    #[default]
    WithinTtl,

    /// Ignore the cached snapshot and go to the source.
    ///
    /// A fetch already in flight for the same dataset is joined rather than
    /// duplicated. If the refresh fails, the previous snapshot (if any) is
    /// still served.
    Refresh,
}

impl Freshness {
    /// Map the UI's `forceRefresh` flag.
    pub fn from_force_refresh(force: bool) -> Self {
        if force {
            Self::Refresh
        } else {
            Self::WithinTtl
        }
    }

    pub fn is_refresh(&self) -> bool {
        matches!(self, Self::Refresh)
    }
}

/// Where the value of a [`CacheRead`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOrigin {
    /// Served from a snapshot younger than the TTL.
    Cache,
    /// Freshly fetched and now cached.
    Fetched,
    /// Refresh failed; an expired snapshot was served instead.
    StaleFallback,
    /// Refresh failed and there was nothing to fall back to.
    Empty,
}

/// Result of a cache read, carrying staleness metadata.
#[derive(Debug, Clone)]
pub struct CacheRead<T> {
    value: T,
    /// When the underlying snapshot was captured. `None` for [`ReadOrigin::Empty`].
    captured_at: Option<DateTime<Utc>>,
    origin: ReadOrigin,
}

impl<T> CacheRead<T> {
    pub fn from_cache(value: T, captured_at: DateTime<Utc>) -> Self {
        Self {
            value,
            captured_at: Some(captured_at),
            origin: ReadOrigin::Cache,
        }
    }

    pub fn fetched(value: T, captured_at: DateTime<Utc>) -> Self {
        Self {
            value,
            captured_at: Some(captured_at),
            origin: ReadOrigin::Fetched,
        }
    }

    pub fn stale(value: T, captured_at: DateTime<Utc>) -> Self {
        Self {
            value,
            captured_at: Some(captured_at),
            origin: ReadOrigin::StaleFallback,
        }
    }

    pub fn empty(value: T) -> Self {
        Self {
            value,
            captured_at: None,
            origin: ReadOrigin::Empty,
        }
    }

    /// Consume the wrapper and return the underlying value.
    pub fn into_value(self) -> T {
        self.value
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn origin(&self) -> ReadOrigin {
        self.origin
    }

    pub fn captured_at(&self) -> Option<DateTime<Utc>> {
        self.captured_at
    }

    /// Time since the snapshot was captured.
    pub fn staleness(&self) -> Duration {
        self.captured_at
            .and_then(|at| Utc::now().signed_duration_since(at).to_std().ok())
            .unwrap_or(Duration::ZERO)
    }

    pub fn was_cache_hit(&self) -> bool {
        self.origin == ReadOrigin::Cache
    }

    /// True when a refresh was attempted and failed.
    pub fn is_degraded(&self) -> bool {
        matches!(self.origin, ReadOrigin::StaleFallback | ReadOrigin::Empty)
    }

    /// Map the inner value to a new type.
    pub fn map<U, F>(self, f: F) -> CacheRead<U>
    where
        F: FnOnce(T) -> U,
    {
        CacheRead {
            value: f(self.value),
            captured_at: self.captured_at,
            origin: self.origin,
        }
    }
}

impl<T> AsRef<T> for CacheRead<T> {
    fn as_ref(&self) -> &T {
        &self.value
    }
}

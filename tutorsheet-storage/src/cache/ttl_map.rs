//! Timestamped map shared by the dataset cache and the option cache.
//!
//! Entries are never evicted by age. Expired entries read as absent through
//! [`TtlMap::get_fresh`] but stay reachable through [`TtlMap::get_any`] so a
//! failed refresh can fall back to them.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::RwLock;
use std::time::Duration;
use tokio::time::Instant;

/// A cached value and when it was captured.
#[derive(Debug, Clone)]
pub struct TimedEntry<V> {
    pub value: V,
    /// Monotonic capture time, used for age and TTL checks.
    pub stored_at: Instant,
    /// Wall-clock capture time, for display.
    pub captured_at: DateTime<Utc>,
}

impl<V> TimedEntry<V> {
    pub fn age(&self) -> Duration {
        Instant::now().saturating_duration_since(self.stored_at)
    }

    pub fn is_fresh(&self, ttl: Duration) -> bool {
        self.age() < ttl
    }
}

/// Keyed entries with capture timestamps.
#[derive(Debug)]
pub struct TtlMap<K, V> {
    ttl: Duration,
    entries: RwLock<HashMap<K, TimedEntry<V>>>,
}

impl<K, V> TtlMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Entry younger than the TTL.
    pub fn get_fresh(&self, key: &K) -> Option<TimedEntry<V>> {
        self.get_any(key).filter(|entry| entry.is_fresh(self.ttl))
    }

    /// Entry regardless of age.
    pub fn get_any(&self, key: &K) -> Option<TimedEntry<V>> {
        self.read().get(key).cloned()
    }

    /// Replace the entry for `key`, stamped now.
    pub fn put(&self, key: K, value: V) -> TimedEntry<V> {
        let entry = TimedEntry {
            value,
            stored_at: Instant::now(),
            captured_at: Utc::now(),
        };
        self.write().insert(key, entry.clone());
        entry
    }

    pub fn remove(&self, key: &K) -> bool {
        self.write().remove(key).is_some()
    }

    /// Remove every entry matching `predicate`. Returns how many were removed.
    pub fn remove_where(&self, mut predicate: impl FnMut(&K) -> bool) -> usize {
        let mut entries = self.write();
        let before = entries.len();
        entries.retain(|key, _| !predicate(key));
        before - entries.len()
    }

    pub fn clear(&self) -> usize {
        let mut entries = self.write();
        let count = entries.len();
        entries.clear();
        count
    }

    pub fn age(&self, key: &K) -> Option<Duration> {
        self.read().get(key).map(TimedEntry::age)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // A panic while holding the lock cannot leave a half-written entry, so a
    // poisoned lock is still safe to use.
    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<K, TimedEntry<V>>> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<K, TimedEntry<V>>> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }
}

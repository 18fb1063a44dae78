//! Cache of distinct column values used to populate dropdowns.
//!
//! Keyed by dataset and column label. Requests without a column share the
//! slot of the first column, labelled `"A"`.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;
use tutorsheet_core::DatasetKey;

use super::freshness::CacheRead;
use super::ttl_map::{TimedEntry, TtlMap};

/// Column label used when the caller does not name one.
pub const DEFAULT_OPTION_COLUMN: &str = "A";

/// Distinct values of one column, in first-seen order.
pub type OptionList = Arc<Vec<String>>;

type OptionSlot = (DatasetKey, String);

/// TTL cache of option lists.
#[derive(Debug)]
pub struct OptionCache {
    entries: TtlMap<OptionSlot, OptionList>,
}

impl OptionCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: TtlMap::new(ttl),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.entries.ttl()
    }

    /// Option list younger than the TTL.
    pub fn get_fresh(&self, key: DatasetKey, column: Option<&str>) -> Option<CacheRead<OptionList>> {
        self.entries
            .get_fresh(&slot(key, column))
            .map(|entry| CacheRead::from_cache(entry.value, entry.captured_at))
    }

    /// Option list regardless of age, for use when the source is down.
    pub fn get_any(&self, key: DatasetKey, column: Option<&str>) -> Option<CacheRead<OptionList>> {
        self.entries
            .get_any(&slot(key, column))
            .map(|entry| CacheRead::stale(entry.value, entry.captured_at))
    }

    pub fn put(&self, key: DatasetKey, column: Option<&str>, values: Vec<String>) -> CacheRead<OptionList> {
        let TimedEntry {
            value, captured_at, ..
        } = self.entries.put(slot(key, column), Arc::new(values));
        CacheRead::fetched(value, captured_at)
    }

    /// Drop every option list of `key`, whatever the column.
    pub fn invalidate(&self, key: DatasetKey) -> usize {
        let removed = self.entries.remove_where(|(dataset, _)| *dataset == key);
        debug!(dataset = %key, removed, "invalidated option lists");
        removed
    }

    pub fn invalidate_all(&self) -> usize {
        self.entries.clear()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn slot(key: DatasetKey, column: Option<&str>) -> OptionSlot {
    let column = column
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or(DEFAULT_OPTION_COLUMN);
    (key, column.to_string())
}

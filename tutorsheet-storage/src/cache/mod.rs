//! Cache layer with explicit freshness contracts.
//!
//! Callers say whether a snapshot within its TTL is acceptable via
//! [`Freshness`], and every read returns a [`CacheRead<T>`] that records
//! where the value came from and when it was captured. Reads never fail:
//! when the source is down the last good snapshot is served and marked as
//! such.
//!
//! # Example
//!
//! ```ignore
//! let cache = ReadThroughCache::new(fetcher, CacheConfig::default());
//!
//! // Cached students are fine if younger than the TTL
//! let read = cache.get(DatasetKey::Students, Freshness::WithinTtl).await;
//!
//! // The user hit "refresh"
//! let read = cache.get(DatasetKey::Students, Freshness::Refresh).await;
//!
//! if read.is_degraded() {
//!     tracing::warn!(age = ?read.staleness(), "source unreachable");
//! }
//! ```

pub mod freshness;
pub mod options;
pub mod read_through;
pub mod traits;
pub mod ttl_map;

pub use freshness::{CacheRead, Freshness, ReadOrigin};
pub use options::{OptionCache, OptionList, DEFAULT_OPTION_COLUMN};
pub use read_through::{CacheConfig, ReadThroughCache, Snapshot};
pub use traits::{CacheStats, DatasetFetcher};
pub use ttl_map::{TimedEntry, TtlMap};

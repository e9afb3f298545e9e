//! Cache layer for medialink.
//!
//! The connection engine talks to the cache through two narrow traits:
//! - [`SnapshotReader`]: all live resource snapshots for one category
//! - [`EdgeSink`]: idempotent batch upsert of connection items
//!
//! Two implementations are provided:
//! - [`SqliteCache`]: persistent store backed by SQLite, with TTL expiry
//! - [`memory::MemoryCache`]: in-process store for tests, with injectable failures

mod error;
pub mod memory;
mod sqlite;
mod store;

pub use error::{CacheError, CacheResult};
pub use sqlite::SqliteCache;
pub use store::{BatchOutcome, EdgeSink, FailedItem, SnapshotReader};

/// Current Unix time in seconds.
#[must_use]
pub fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

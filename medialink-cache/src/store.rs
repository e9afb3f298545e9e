//! Store abstraction traits.
//!
//! The engine never sees a concrete store. It reads snapshots through
//! [`SnapshotReader`] and writes connections through [`EdgeSink`].

use crate::error::CacheResult;
use async_trait::async_trait;
use medialink_types::{CacheItem, ResourceSnapshot, ServiceCategory};

/// Read side of the resource cache.
#[async_trait]
pub trait SnapshotReader: Send + Sync {
    /// Returns every non-expired snapshot for one category.
    ///
    /// The result is finite and each call starts from scratch.
    async fn list_by_category(
        &self,
        category: ServiceCategory,
    ) -> CacheResult<Vec<ResourceSnapshot>>;
}

/// Write side of the connection cache.
#[async_trait]
pub trait EdgeSink: Send + Sync {
    /// Upserts items keyed by `CacheItem::key`.
    ///
    /// Individual item failures are reported in the outcome rather than
    /// failing the whole call. An `Err` means nothing could be written.
    async fn upsert_batch(&self, items: &[CacheItem]) -> CacheResult<BatchOutcome>;
}

/// Result of a batch upsert.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Items written (inserted or replaced).
    pub written: usize,
    /// Items that could not be written.
    pub failed: Vec<FailedItem>,
}

impl BatchOutcome {
    /// Returns true if every item was written.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// One item the sink rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedItem {
    pub key: String,
    pub reason: String,
}

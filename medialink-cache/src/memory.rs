//! In-memory cache for tests and local dry runs.
//!
//! Implements both store traits over plain maps. Failures can be injected per
//! category (reads), per key (writes) or for the whole sink, and both reads
//! and writes can be slowed down to exercise timeouts.

use crate::error::{CacheError, CacheResult};
use crate::store::{BatchOutcome, EdgeSink, FailedItem, SnapshotReader};
use async_trait::async_trait;
use medialink_types::{CacheItem, ResourceSnapshot, ServiceCategory};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

#[derive(Default)]
struct Inner {
    resources: HashMap<ServiceCategory, Vec<ResourceSnapshot>>,
    connections: BTreeMap<String, CacheItem>,
    failing_categories: HashSet<ServiceCategory>,
    failing_keys: HashSet<String>,
    sink_down: bool,
    read_delay: Option<Duration>,
    write_delay: Option<Duration>,
    upsert_calls: usize,
}

/// A cache held entirely in memory.
#[derive(Default)]
pub struct MemoryCache {
    inner: Mutex<Inner>,
}

impl MemoryCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a cache pre-loaded with snapshots.
    pub fn with_snapshots(snapshots: impl IntoIterator<Item = ResourceSnapshot>) -> Self {
        let cache = Self::new();
        for snapshot in snapshots {
            cache.insert(snapshot);
        }
        cache
    }

    fn lock(&self) -> CacheResult<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| CacheError::Unavailable("memory cache lock poisoned".into()))
    }

    /// Adds a snapshot to its category.
    pub fn insert(&self, snapshot: ResourceSnapshot) {
        if let Ok(mut inner) = self.lock() {
            inner
                .resources
                .entry(snapshot.category)
                .or_default()
                .push(snapshot);
        }
    }

    /// Makes every read of `category` fail.
    pub fn fail_category(&self, category: ServiceCategory) {
        if let Ok(mut inner) = self.lock() {
            inner.failing_categories.insert(category);
        }
    }

    /// Makes writes of the item stored under `key` fail.
    pub fn fail_key(&self, key: impl Into<String>) {
        if let Ok(mut inner) = self.lock() {
            inner.failing_keys.insert(key.into());
        }
    }

    /// Makes every batch upsert fail outright.
    pub fn fail_sink(&self) {
        if let Ok(mut inner) = self.lock() {
            inner.sink_down = true;
        }
    }

    /// Delays every read by `delay`.
    pub fn delay_reads(&self, delay: Duration) {
        if let Ok(mut inner) = self.lock() {
            inner.read_delay = Some(delay);
        }
    }

    /// Delays every batch upsert by `delay`.
    pub fn delay_writes(&self, delay: Duration) {
        if let Ok(mut inner) = self.lock() {
            inner.write_delay = Some(delay);
        }
    }

    /// Returns the stored connection items, ordered by key.
    pub fn connections(&self) -> Vec<CacheItem> {
        self.lock()
            .map(|inner| inner.connections.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Returns the connection item stored under `key`.
    pub fn connection(&self, key: &str) -> Option<CacheItem> {
        self.lock()
            .ok()
            .and_then(|inner| inner.connections.get(key).cloned())
    }

    /// Number of `upsert_batch` calls received so far.
    pub fn upsert_calls(&self) -> usize {
        self.lock().map(|inner| inner.upsert_calls).unwrap_or(0)
    }
}

#[async_trait]
impl SnapshotReader for MemoryCache {
    async fn list_by_category(
        &self,
        category: ServiceCategory,
    ) -> CacheResult<Vec<ResourceSnapshot>> {
        let delay = self.lock()?.read_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let inner = self.lock()?;
        if inner.failing_categories.contains(&category) {
            return Err(CacheError::Unavailable(format!(
                "injected read failure for {category}"
            )));
        }
        Ok(inner.resources.get(&category).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl EdgeSink for MemoryCache {
    async fn upsert_batch(&self, items: &[CacheItem]) -> CacheResult<BatchOutcome> {
        let delay = {
            let mut inner = self.lock()?;
            inner.upsert_calls += 1;
            inner.write_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut inner = self.lock()?;
        if inner.sink_down {
            return Err(CacheError::Unavailable("injected sink failure".into()));
        }
        let mut outcome = BatchOutcome::default();
        for item in items {
            if inner.failing_keys.contains(&item.key) {
                outcome.failed.push(FailedItem {
                    key: item.key.clone(),
                    reason: "injected write failure".into(),
                });
                continue;
            }
            inner.connections.insert(item.key.clone(), item.clone());
            outcome.written += 1;
        }
        Ok(outcome)
    }
}

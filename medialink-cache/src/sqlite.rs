//! SQLite-backed cache.
//!
//! Resources and connections live in separate tables of one database file.
//! Both carry an `expires` column; reads filter on it and
//! [`SqliteCache::purge_expired`] deletes what has lapsed.

use crate::error::{CacheError, CacheResult};
use crate::store::{BatchOutcome, EdgeSink, FailedItem, SnapshotReader};
use crate::unix_now;
use async_trait::async_trait;
use medialink_types::{CacheItem, ResourceSnapshot, ServiceCategory};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

/// Persistent cache backed by SQLite.
///
/// Cloning is cheap and shares the underlying connection.
#[derive(Clone)]
pub struct SqliteCache {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCache {
    /// Opens (or creates) a cache at the given path.
    pub fn open(path: impl AsRef<Path>) -> CacheResult<Self> {
        let conn = Connection::open(path.as_ref())?;
        let cache = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        cache.init_schema()?;
        Ok(cache)
    }

    /// Opens an in-memory cache (for testing).
    pub fn open_in_memory() -> CacheResult<Self> {
        let conn = Connection::open_in_memory()?;
        let cache = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        cache.init_schema()?;
        Ok(cache)
    }

    fn lock(&self) -> CacheResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| CacheError::Unavailable("cache connection lock poisoned".into()))
    }

    fn init_schema(&self) -> CacheResult<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS resources (
                key TEXT PRIMARY KEY,
                category TEXT NOT NULL,
                region TEXT NOT NULL,
                updated INTEGER NOT NULL,
                expires INTEGER NOT NULL,
                data TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS resources_by_category
                ON resources (category, expires);

            CREATE TABLE IF NOT EXISTS connections (
                key TEXT PRIMARY KEY,
                source TEXT NOT NULL,
                target TEXT NOT NULL,
                region TEXT NOT NULL,
                relation TEXT NOT NULL,
                updated INTEGER NOT NULL,
                expires INTEGER NOT NULL,
                data TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS connections_by_expiry
                ON connections (expires);
            ",
        )?;
        Ok(())
    }

    // ── Resources ────────────────────────────────────────────────

    /// Stores (or replaces) one resource snapshot with the given lifetime.
    pub fn put_resource(
        &self,
        snapshot: &ResourceSnapshot,
        region: &str,
        ttl_secs: i64,
        now: i64,
    ) -> CacheResult<()> {
        let data = serde_json::to_string(&snapshot.body)?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO resources (key, category, region, updated, expires, data)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                snapshot.identity.as_str(),
                snapshot.category.as_str(),
                region,
                now,
                now + ttl_secs,
                data,
            ],
        )?;
        Ok(())
    }

    /// Returns the snapshots of one category that are still live at `now`.
    ///
    /// Rows whose body is not valid JSON are skipped.
    pub fn resources_at(
        &self,
        category: ServiceCategory,
        now: i64,
    ) -> CacheResult<Vec<ResourceSnapshot>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT key, data FROM resources WHERE category = ?1 AND expires > ?2 ORDER BY key",
        )?;
        let rows = stmt.query_map(params![category.as_str(), now], |row| {
            let key: String = row.get(0)?;
            let data: String = row.get(1)?;
            Ok((key, data))
        })?;

        let mut snapshots = Vec::new();
        for row in rows {
            let (key, data) = row?;
            match serde_json::from_str(&data) {
                Ok(body) => snapshots.push(ResourceSnapshot::new(key, category, body)),
                Err(e) => warn!("skipping cached {} {}: body is not JSON: {}", category, key, e),
            }
        }
        Ok(snapshots)
    }

    // ── Connections ──────────────────────────────────────────────

    /// Upserts connection items inside one transaction.
    ///
    /// A failing item is recorded and the rest of the batch still commits.
    pub fn write_connections(&self, items: &[CacheItem]) -> CacheResult<BatchOutcome> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut outcome = BatchOutcome::default();
        for item in items {
            let result = tx.execute(
                "INSERT OR REPLACE INTO connections
                     (key, source, target, region, relation, updated, expires, data)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    item.key,
                    item.from.as_str(),
                    item.to.as_str(),
                    item.region,
                    item.relation,
                    item.updated,
                    item.expires,
                    item.data,
                ],
            );
            match result {
                Ok(_) => outcome.written += 1,
                Err(e) => outcome.failed.push(FailedItem {
                    key: item.key.clone(),
                    reason: e.to_string(),
                }),
            }
        }
        tx.commit()?;
        debug!(
            "upserted {} connection items ({} failed)",
            outcome.written,
            outcome.failed.len()
        );
        Ok(outcome)
    }

    /// Returns every connection item still live at `now`, ordered by key.
    pub fn connections_at(&self, now: i64) -> CacheResult<Vec<CacheItem>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT key, source, target, region, relation, updated, expires, data
             FROM connections WHERE expires > ?1 ORDER BY key",
        )?;
        let rows = stmt.query_map(params![now], row_to_item)?;
        let mut items = Vec::new();
        for row in rows {
            items.push(row?);
        }
        Ok(items)
    }

    /// Returns the connection item stored under `key`, if any (expired or not).
    pub fn connection(&self, key: &str) -> CacheResult<Option<CacheItem>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT key, source, target, region, relation, updated, expires, data
             FROM connections WHERE key = ?1",
        )?;
        let mut rows = stmt.query(params![key])?;
        let item = match rows.next()? {
            Some(row) => Some(row_to_item(row)?),
            None => None,
        };
        Ok(item)
    }

    /// Deletes every resource and connection that has expired at `now`.
    /// Returns the number of rows removed.
    pub fn purge_expired(&self, now: i64) -> CacheResult<usize> {
        let conn = self.lock()?;
        let resources = conn.execute("DELETE FROM resources WHERE expires <= ?1", params![now])?;
        let connections =
            conn.execute("DELETE FROM connections WHERE expires <= ?1", params![now])?;
        Ok(resources + connections)
    }
}

fn row_to_item(row: &rusqlite::Row<'_>) -> rusqlite::Result<CacheItem> {
    let source: String = row.get(1)?;
    let target: String = row.get(2)?;
    Ok(CacheItem {
        key: row.get(0)?,
        from: source.into(),
        to: target.into(),
        region: row.get(3)?,
        relation: row.get(4)?,
        updated: row.get(5)?,
        expires: row.get(6)?,
        data: row.get(7)?,
    })
}

impl std::fmt::Debug for SqliteCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteCache").finish_non_exhaustive()
    }
}

#[async_trait]
impl SnapshotReader for SqliteCache {
    async fn list_by_category(
        &self,
        category: ServiceCategory,
    ) -> CacheResult<Vec<ResourceSnapshot>> {
        let cache = self.clone();
        tokio::task::spawn_blocking(move || cache.resources_at(category, unix_now()))
            .await
            .map_err(|e| CacheError::Unavailable(format!("cache worker failed: {e}")))?
    }
}

#[async_trait]
impl EdgeSink for SqliteCache {
    async fn upsert_batch(&self, items: &[CacheItem]) -> CacheResult<BatchOutcome> {
        let cache = self.clone();
        let items = items.to_vec();
        tokio::task::spawn_blocking(move || cache.write_connections(&items))
            .await
            .map_err(|e| CacheError::Unavailable(format!("cache worker failed: {e}")))?
    }
}

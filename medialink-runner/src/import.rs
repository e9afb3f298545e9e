//! Seeding the cache from a JSON file of snapshots.

use anyhow::{Context, Result};
use medialink_cache::SqliteCache;
use medialink_types::ResourceSnapshot;
use std::path::Path;
use tracing::debug;

/// Reads a JSON array of `{identity, category, body}` objects.
pub fn read_snapshots(path: &Path) -> Result<Vec<ResourceSnapshot>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read snapshot file {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("Failed to decode snapshots in {}", path.display()))
}

/// Stores every snapshot in `cache`, live for `ttl_secs` from `now`.
/// Returns the number stored.
pub fn import_snapshots(
    cache: &SqliteCache,
    snapshots: &[ResourceSnapshot],
    region: &str,
    ttl_secs: i64,
    now: i64,
) -> Result<usize> {
    for snapshot in snapshots {
        cache
            .put_resource(snapshot, region, ttl_secs, now)
            .with_context(|| format!("Failed to store snapshot {}", snapshot.identity))?;
        debug!(category = %snapshot.category, identity = %snapshot.identity, "snapshot imported");
    }
    Ok(snapshots.len())
}

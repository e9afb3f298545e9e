//! Turning edges into storable cache items.

use medialink_types::{CacheItem, ConnectionEdge, GLOBAL_REGION};

/// Materializes one edge as it is stored at `now` with a lifetime of `ttl_secs`.
pub fn to_cache_item(edge: &ConnectionEdge, now: i64, ttl_secs: i64) -> CacheItem {
    CacheItem {
        key: edge.identity_key(),
        from: edge.source.clone(),
        to: edge.target.clone(),
        region: GLOBAL_REGION.to_string(),
        relation: edge.relation.clone(),
        updated: now,
        expires: now.saturating_add(ttl_secs),
        data: edge.evidence.to_string(),
    }
}

/// Materializes a batch with a single timestamp.
pub fn to_cache_items(edges: &[ConnectionEdge], now: i64, ttl_secs: i64) -> Vec<CacheItem> {
    edges.iter().map(|e| to_cache_item(e, now, ttl_secs)).collect()
}

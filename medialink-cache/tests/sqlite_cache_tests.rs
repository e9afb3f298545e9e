use medialink_cache::{EdgeSink, SnapshotReader, SqliteCache};
use medialink_types::{CacheItem, ResourceSnapshot, ServiceCategory, GLOBAL_REGION};
use pretty_assertions::assert_eq;
use serde_json::json;

fn item(key: &str, updated: i64, expires: i64) -> CacheItem {
    let (from, to) = key.split_once('|').unwrap_or((key, "target"));
    CacheItem {
        key: key.to_string(),
        from: from.into(),
        to: to.into(),
        region: GLOBAL_REGION.into(),
        relation: "medialive-channel-s3-bucket".into(),
        updated,
        expires,
        data: json!({"from": from, "to": to, "scheme": "s3"}).to_string(),
    }
}

fn bucket(name: &str) -> ResourceSnapshot {
    ResourceSnapshot::new(
        format!("arn:aws:s3:::{name}"),
        ServiceCategory::S3Bucket,
        json!({"Name": name}),
    )
}

// ── Resources ────────────────────────────────────────────────────

#[test]
fn put_and_list_resources() {
    let cache = SqliteCache::open_in_memory().unwrap();
    cache.put_resource(&bucket("a"), "us-west-2", 60, 1_000).unwrap();
    cache.put_resource(&bucket("b"), "us-west-2", 60, 1_000).unwrap();

    let listed = cache.resources_at(ServiceCategory::S3Bucket, 1_010).unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].identity.as_str(), "arn:aws:s3:::a");
    assert_eq!(listed[0].body, json!({"Name": "a"}));
}

#[test]
fn list_filters_by_category() {
    let cache = SqliteCache::open_in_memory().unwrap();
    cache.put_resource(&bucket("a"), "us-west-2", 60, 1_000).unwrap();
    let channels = cache
        .resources_at(ServiceCategory::MediaLiveChannel, 1_010)
        .unwrap();
    assert!(channels.is_empty());
}

#[test]
fn expired_resources_are_hidden() {
    let cache = SqliteCache::open_in_memory().unwrap();
    cache.put_resource(&bucket("a"), "us-west-2", 60, 1_000).unwrap();
    assert_eq!(cache.resources_at(ServiceCategory::S3Bucket, 1_059).unwrap().len(), 1);
    assert!(cache.resources_at(ServiceCategory::S3Bucket, 1_060).unwrap().is_empty());
}

#[test]
fn put_resource_replaces_same_identity() {
    let cache = SqliteCache::open_in_memory().unwrap();
    cache.put_resource(&bucket("a"), "us-west-2", 60, 1_000).unwrap();
    let mut updated = bucket("a");
    updated.body = json!({"Name": "a", "Versioning": true});
    cache.put_resource(&updated, "us-west-2", 60, 1_001).unwrap();

    let listed = cache.resources_at(ServiceCategory::S3Bucket, 1_010).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].body["Versioning"], true);
}

// ── Connections ──────────────────────────────────────────────────

#[test]
fn write_and_read_connections() {
    let cache = SqliteCache::open_in_memory().unwrap();
    let outcome = cache
        .write_connections(&[item("a|b", 100, 200), item("c|d", 100, 200)])
        .unwrap();
    assert_eq!(outcome.written, 2);
    assert!(outcome.is_complete());

    let items = cache.connections_at(150).unwrap();
    assert_eq!(items, vec![item("a|b", 100, 200), item("c|d", 100, 200)]);
}

#[test]
fn upsert_same_key_refreshes_timestamps() {
    let cache = SqliteCache::open_in_memory().unwrap();
    cache.write_connections(&[item("a|b", 100, 200)]).unwrap();
    cache.write_connections(&[item("a|b", 150, 250)]).unwrap();

    let items = cache.connections_at(0).unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].updated, 150);
    assert_eq!(items[0].expires, 250);
}

#[test]
fn connection_lookup_by_key() {
    let cache = SqliteCache::open_in_memory().unwrap();
    cache.write_connections(&[item("a|b", 100, 200)]).unwrap();
    assert!(cache.connection("a|b").unwrap().is_some());
    assert!(cache.connection("missing").unwrap().is_none());
}

#[test]
fn purge_removes_only_expired_rows() {
    let cache = SqliteCache::open_in_memory().unwrap();
    cache.put_resource(&bucket("old"), "us-west-2", 10, 100).unwrap();
    cache.put_resource(&bucket("new"), "us-west-2", 1_000, 100).unwrap();
    cache
        .write_connections(&[item("a|b", 100, 110), item("c|d", 100, 5_000)])
        .unwrap();

    let removed = cache.purge_expired(500).unwrap();
    assert_eq!(removed, 2);
    assert_eq!(cache.resources_at(ServiceCategory::S3Bucket, 0).unwrap().len(), 1);
    assert_eq!(cache.connections_at(0).unwrap().len(), 1);
}

#[test]
fn cache_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.db");
    {
        let cache = SqliteCache::open(&path).unwrap();
        cache.write_connections(&[item("a|b", 100, i64::MAX)]).unwrap();
    }
    let reopened = SqliteCache::open(&path).unwrap();
    assert_eq!(reopened.connections_at(0).unwrap().len(), 1);
}

// ── Trait implementations ────────────────────────────────────────

#[tokio::test]
async fn reader_trait_returns_live_snapshots() {
    let cache = SqliteCache::open_in_memory().unwrap();
    let now = medialink_cache::unix_now();
    cache.put_resource(&bucket("live"), "us-west-2", 3_600, now).unwrap();
    cache.put_resource(&bucket("stale"), "us-west-2", 10, now - 100).unwrap();

    let listed = cache.list_by_category(ServiceCategory::S3Bucket).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].identity.as_str(), "arn:aws:s3:::live");
}

#[tokio::test]
async fn sink_trait_upserts() {
    let cache = SqliteCache::open_in_memory().unwrap();
    let outcome = cache.upsert_batch(&[item("a|b", 1, i64::MAX)]).await.unwrap();
    assert_eq!(outcome.written, 1);
    assert_eq!(cache.connections_at(0).unwrap().len(), 1);
}

#[tokio::test]
async fn sink_trait_accepts_empty_batch() {
    let cache = SqliteCache::open_in_memory().unwrap();
    let outcome = cache.upsert_batch(&[]).await.unwrap();
    assert_eq!(outcome.written, 0);
    assert!(outcome.is_complete());
}

//! Shared fixtures for connection rule tests.

#![allow(dead_code)]

use medialink_connect::{ConnectionRule, EngineConfig, Inventory, Rule};
use medialink_types::{ConnectionEdge, ResourceSnapshot, ServiceCategory};
use serde_json::{json, Value};

pub fn snapshot(category: ServiceCategory, identity: &str, body: Value) -> ResourceSnapshot {
    ResourceSnapshot::new(identity, category, body)
}

/// Evaluates one rule with the default configuration against snapshots of any
/// categories. Every category is present in the inventory.
pub fn eval(rule: &Rule, snapshots: Vec<ResourceSnapshot>) -> Vec<ConnectionEdge> {
    eval_with(rule, snapshots, &EngineConfig::default())
}

pub fn eval_with(
    rule: &Rule,
    snapshots: Vec<ResourceSnapshot>,
    config: &EngineConfig,
) -> Vec<ConnectionEdge> {
    let inventory = Inventory::from_snapshots(snapshots);
    rule.evaluate(&inventory, config).expect("rule evaluation")
}

/// Sorted identity keys.
pub fn keys(edges: &[ConnectionEdge]) -> Vec<String> {
    let mut keys: Vec<String> = edges.iter().map(ConnectionEdge::identity_key).collect();
    keys.sort_unstable();
    keys
}

// ── Live video ───────────────────────────────────────────────────

pub fn channel(identity: &str, id: &str, class: &str, destinations: Value) -> ResourceSnapshot {
    snapshot(
        ServiceCategory::MediaLiveChannel,
        identity,
        json!({"Arn": identity, "Id": id, "ChannelClass": class, "Destinations": destinations}),
    )
}

/// A channel with one destination per URL.
pub fn channel_with_outputs(identity: &str, urls: &[&str]) -> ResourceSnapshot {
    let destinations: Vec<Value> = urls
        .iter()
        .enumerate()
        .map(|(i, url)| {
            json!({
                "Id": format!("dest{i}"),
                "Settings": [{"Url": url}],
                "MediaPackageSettings": [],
            })
        })
        .collect();
    channel(identity, "1234567", "SINGLE_PIPELINE", Value::Array(destinations))
}

pub fn input(identity: &str, body: Value) -> ResourceSnapshot {
    snapshot(ServiceCategory::MediaLiveInput, identity, body)
}

pub fn multiplex(identity: &str, body: Value) -> ResourceSnapshot {
    snapshot(ServiceCategory::MediaLiveMultiplex, identity, body)
}

pub fn link_device(identity: &str, id: &str) -> ResourceSnapshot {
    snapshot(ServiceCategory::LinkDevice, identity, json!({"Id": id, "Arn": identity}))
}

// ── Packaging ────────────────────────────────────────────────────

pub fn packaging_channel(identity: &str, id: &str, ingest_urls: &[&str]) -> ResourceSnapshot {
    let endpoints: Vec<Value> = ingest_urls.iter().map(|u| json!({"Url": u})).collect();
    snapshot(
        ServiceCategory::MediaPackageChannel,
        identity,
        json!({"Arn": identity, "Id": id, "HlsIngest": {"IngestEndpoints": endpoints}}),
    )
}

pub fn endpoint(identity: &str, body: Value) -> ResourceSnapshot {
    snapshot(ServiceCategory::MediaPackageEndpoint, identity, body)
}

pub fn key_server(identity: &str, endpoint: &str, scheme: &str) -> ResourceSnapshot {
    snapshot(
        ServiceCategory::SpekeKeyServer,
        identity,
        json!({"endpoint": endpoint, "scheme": scheme}),
    )
}

// ── Storage and delivery ─────────────────────────────────────────

pub fn bucket(name: &str) -> ResourceSnapshot {
    snapshot(
        ServiceCategory::S3Bucket,
        &format!("arn:aws:s3:::{name}"),
        json!({"Name": name}),
    )
}

pub fn container(identity: &str, endpoint: &str) -> ResourceSnapshot {
    snapshot(
        ServiceCategory::MediaStoreContainer,
        identity,
        json!({"ARN": identity, "Name": "live", "Endpoint": endpoint}),
    )
}

pub fn distribution(identity: &str, domain: &str, origins: Value, tags: Value) -> ResourceSnapshot {
    snapshot(
        ServiceCategory::CloudFrontDistribution,
        identity,
        json!({"DomainName": domain, "Origins": {"Quantity": 1, "Items": origins}, "Tags": tags}),
    )
}

pub fn playback_config(identity: &str, source_url: &str) -> ResourceSnapshot {
    snapshot(
        ServiceCategory::MediaTailorConfiguration,
        identity,
        json!({"PlaybackConfigurationArn": identity, "VideoContentSourceUrl": source_url}),
    )
}

// ── Transport ────────────────────────────────────────────────────

pub fn flow(identity: &str, body: Value) -> ResourceSnapshot {
    snapshot(ServiceCategory::MediaConnectFlow, identity, body)
}

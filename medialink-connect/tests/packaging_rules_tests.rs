mod common;

use common::*;
use medialink_connect::rules::packaging::{
    CHANNEL_TO_ENDPOINT, ENDPOINT_TO_DISTRIBUTION_BY_TAG, ENDPOINT_TO_DISTRIBUTION_BY_URL,
    ENDPOINT_TO_KEY_SERVER, ENDPOINT_TO_PLAYBACK_CONFIG,
};
use medialink_connect::EngineConfig;
use pretty_assertions::assert_eq;
use serde_json::json;

const MP: &str = "arn:aws:mediapackage:us-west-2:1:channels/abc";
const EP: &str = "arn:aws:mediapackage:us-west-2:1:origin_endpoints/hls";
const EP_URL: &str = "https://x.mediapackage.amazonaws.com/out/v1/abc/index.m3u8";
const CF: &str = "arn:aws:cloudfront::1:distribution/E1";

fn hls_endpoint(identity: &str, channel_id: &str, url: &str) -> medialink_types::ResourceSnapshot {
    endpoint(
        identity,
        json!({"ChannelId": channel_id, "Url": url, "HlsPackage": {"SegmentDurationSeconds": 6}}),
    )
}

// ── Channel to endpoint ──────────────────────────────────────────

#[test]
fn endpoint_edge_names_package_kind() {
    let edges = eval(
        &CHANNEL_TO_ENDPOINT,
        vec![
            packaging_channel(MP, "live-1", &[]),
            hls_endpoint(EP, "live-1", EP_URL),
            hls_endpoint("arn:ep:other", "live-2", EP_URL),
        ],
    );
    assert_eq!(keys(&edges), vec![format!("{MP}:{EP}")]);
    assert_eq!(edges[0].evidence_str("package"), Some("HLS"));
}

#[test]
fn endpoint_without_package_has_empty_kind() {
    let edges = eval(
        &CHANNEL_TO_ENDPOINT,
        vec![
            packaging_channel(MP, "live-1", &[]),
            endpoint(EP, json!({"ChannelId": "live-1", "Url": EP_URL})),
        ],
    );
    assert_eq!(edges[0].evidence_str("package"), Some(""));
}

// ── Endpoint to distribution ─────────────────────────────────────

#[test]
fn tagged_distribution_fronts_every_channel_endpoint() {
    let edges = eval(
        &ENDPOINT_TO_DISTRIBUTION_BY_TAG,
        vec![
            packaging_channel(MP, "live-1", &[]),
            hls_endpoint(EP, "live-1", EP_URL),
            endpoint(
                "arn:ep:cmaf",
                json!({
                    "ChannelId": "live-1",
                    "Url": "https://x.mediapackage.amazonaws.com/out/v1/cmaf",
                    "CmafPackage": {"HlsManifests": [{"Url": "http://x.mediapackage.amazonaws.com/out/v1/cmaf/index.m3u8"}]},
                }),
            ),
            hls_endpoint("arn:ep:elsewhere", "live-2", EP_URL),
            distribution(CF, "d111.cloudfront.net", json!([]), json!({"mediapackage:cloudfront_assoc": MP})),
        ],
    );
    assert_eq!(keys(&edges), vec![format!("{EP}:{CF}"), format!("arn:ep:cmaf:{CF}")]);
    let cmaf = edges.iter().find(|e| e.source.as_str() == "arn:ep:cmaf").unwrap();
    assert_eq!(cmaf.evidence_str("scheme"), Some("http"));
    assert_eq!(cmaf.evidence_str("connected_by"), Some("tag"));
    assert_eq!(cmaf.evidence_str("tag"), Some("mediapackage:cloudfront_assoc"));
}

#[test]
fn tags_that_do_not_name_a_channel_are_ignored() {
    let edges = eval(
        &ENDPOINT_TO_DISTRIBUTION_BY_TAG,
        vec![
            packaging_channel(MP, "live-1", &[]),
            hls_endpoint(EP, "live-1", EP_URL),
            distribution(
                CF,
                "d111.cloudfront.net",
                json!([]),
                json!({"Owner": MP, "MP-Endpoint-ARN": "arn:aws:mediapackage:us-west-2:1:origin_endpoints/x"}),
            ),
        ],
    );
    assert!(edges.is_empty());
}

#[test]
fn close_origin_url_matches_endpoint() {
    let edges = eval(
        &ENDPOINT_TO_DISTRIBUTION_BY_URL,
        vec![
            hls_endpoint(EP, "live-1", EP_URL),
            hls_endpoint("arn:ep:far", "live-1", "https://other.example.org/live/stream.mpd"),
            distribution(
                CF,
                "d111.cloudfront.net",
                json!([{"DomainName": "x.mediapackage.amazonaws.com", "OriginPath": "/out/v1/abc"}]),
                json!({}),
            ),
        ],
    );
    assert_eq!(keys(&edges), vec![format!("{EP}:{CF}")]);
    assert_eq!(edges[0].evidence_str("connected_by"), Some("url"));
    assert_eq!(edges[0].evidence_str("match"), Some("80%"));
    assert_eq!(edges[0].evidence_str("scheme"), Some("https"));
}

#[test]
fn origin_url_threshold_is_configurable() {
    let config = EngineConfig {
        similarity_threshold: 81,
        ..EngineConfig::default()
    };
    let edges = eval_with(
        &ENDPOINT_TO_DISTRIBUTION_BY_URL,
        vec![
            hls_endpoint(EP, "live-1", EP_URL),
            distribution(
                CF,
                "d111.cloudfront.net",
                json!([{"DomainName": "x.mediapackage.amazonaws.com", "OriginPath": "/out/v1/abc"}]),
                json!({}),
            ),
        ],
        &config,
    );
    assert!(edges.is_empty());
}

// ── Key servers and playback ─────────────────────────────────────

#[test]
fn encrypted_endpoint_uses_key_server() {
    let edges = eval(
        &ENDPOINT_TO_KEY_SERVER,
        vec![
            endpoint(
                EP,
                json!({
                    "ChannelId": "live-1",
                    "HlsPackage": {"Encryption": {"SpekeKeyProvider": {"Url": "https://keys.example/v1/speke"}}},
                }),
            ),
            key_server("arn:speke:1", "https://keys.example/v1/speke", "https"),
            key_server("arn:speke:2", "https://keys.example/v2/speke", "https"),
        ],
    );
    assert_eq!(keys(&edges), vec![format!("{EP}:arn:speke:1")]);
    assert_eq!(edges[0].evidence_str("scheme"), Some("https"));
}

#[test]
fn playback_config_sources_from_endpoint_prefix() {
    let edges = eval(
        &ENDPOINT_TO_PLAYBACK_CONFIG,
        vec![
            hls_endpoint(EP, "live-1", EP_URL),
            playback_config("arn:mt:1", "https://x.mediapackage.amazonaws.com/out/v1/abc"),
            playback_config("arn:mt:2", "https://x.mediapackage.amazonaws.com/out/v1/zzz"),
            playback_config("arn:mt:3", ""),
        ],
    );
    assert_eq!(keys(&edges), vec![format!("{EP}:arn:mt:1")]);
    assert_eq!(edges[0].relation, "mediapackage-origin-endpoint-mediatailor-configuration");
}

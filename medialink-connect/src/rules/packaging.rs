//! Rules for packaging channels and their origin endpoints.

use super::{same, Rule};
use crate::config::EngineConfig;
use crate::error::RuleResult;
use crate::extract::scheme_of;
use crate::matchers::similarity_ratio;
use crate::views::{
    DistributionView, EndpointView, Inventory, KeyServerView, PackagingChannelView,
    PlaybackConfigView,
};
use medialink_types::{ConnectionEdge, ServiceCategory as Category};

pub const CHANNEL_TO_ENDPOINT: Rule = Rule {
    name: "packaging-channel-to-endpoint",
    relation: "mediapackage-channel-mediapackage-origin-endpoint",
    inputs: &[Category::MediaPackageChannel, Category::MediaPackageEndpoint],
    eval: channel_to_endpoint,
};

pub const ENDPOINT_TO_DISTRIBUTION_BY_TAG: Rule = Rule {
    name: "endpoint-to-distribution-by-tag",
    relation: "mediapackage-origin-endpoint-cloudfront-distribution",
    inputs: &[
        Category::CloudFrontDistribution,
        Category::MediaPackageChannel,
        Category::MediaPackageEndpoint,
    ],
    eval: endpoint_to_distribution_by_tag,
};

pub const ENDPOINT_TO_DISTRIBUTION_BY_URL: Rule = Rule {
    name: "endpoint-to-distribution-by-url",
    relation: "mediapackage-origin-endpoint-cloudfront-distribution",
    inputs: &[Category::CloudFrontDistribution, Category::MediaPackageEndpoint],
    eval: endpoint_to_distribution_by_url,
};

pub const ENDPOINT_TO_KEY_SERVER: Rule = Rule {
    name: "endpoint-to-key-server",
    relation: "mediapackage-origin-endpoint-speke-keyserver",
    inputs: &[Category::SpekeKeyServer, Category::MediaPackageEndpoint],
    eval: endpoint_to_key_server,
};

pub const ENDPOINT_TO_PLAYBACK_CONFIG: Rule = Rule {
    name: "endpoint-to-playback-config",
    relation: "mediapackage-origin-endpoint-mediatailor-configuration",
    inputs: &[Category::MediaPackageEndpoint, Category::MediaTailorConfiguration],
    eval: endpoint_to_playback_config,
};

/// Distribution tags that name the packaging channel behind it.
pub const CHANNEL_TAG_KEYS: [&str; 2] = ["MP-Endpoint-ARN", "mediapackage:cloudfront_assoc"];

const CHANNEL_ARN_MARKER: &str = ":channels/";

pub fn channel_to_endpoint(
    inventory: &Inventory,
    _config: &EngineConfig,
) -> RuleResult<Vec<ConnectionEdge>> {
    let channels = inventory.get::<PackagingChannelView>()?;
    let endpoints = inventory.get::<EndpointView>()?;
    let mut edges = Vec::new();

    for channel in channels {
        for endpoint in endpoints {
            if !same(channel.view.id.as_deref(), endpoint.channel_id.as_deref()) {
                continue;
            }
            edges.push(
                ConnectionEdge::new(channel.id.clone(), endpoint.id.clone(), CHANNEL_TO_ENDPOINT.relation)
                    .with_evidence("package", endpoint.package_kind.clone()),
            );
        }
    }
    Ok(edges)
}

/// A tagged distribution fronts every endpoint of the packaging channel the
/// tag names.
pub fn endpoint_to_distribution_by_tag(
    inventory: &Inventory,
    _config: &EngineConfig,
) -> RuleResult<Vec<ConnectionEdge>> {
    let distributions = inventory.get::<DistributionView>()?;
    let channels = inventory.get::<PackagingChannelView>()?;
    let endpoints = inventory.get::<EndpointView>()?;
    let mut edges = Vec::new();

    for distribution in distributions {
        for (key, value) in &distribution.tags {
            if !CHANNEL_TAG_KEYS.contains(&key.as_str()) || !value.contains(CHANNEL_ARN_MARKER) {
                continue;
            }
            let Some(channel_id) = channels
                .iter()
                .find(|c| c.id.as_str() == value.as_str())
                .and_then(|c| c.view.id.as_deref())
            else {
                continue;
            };
            for endpoint in endpoints {
                if endpoint.channel_id.as_deref() != Some(channel_id) {
                    continue;
                }
                let scheme = endpoint.playback_url().map(scheme_of).unwrap_or_default();
                edges.push(
                    ConnectionEdge::new(
                        endpoint.id.clone(),
                        distribution.id.clone(),
                        ENDPOINT_TO_DISTRIBUTION_BY_TAG.relation,
                    )
                    .with_evidence("scheme", scheme)
                    .with_evidence("connected_by", "tag")
                    .with_evidence("tag", key.as_str()),
                );
            }
        }
    }
    Ok(edges)
}

/// An origin whose `domain/path` is close enough to an endpoint URL.
pub fn endpoint_to_distribution_by_url(
    inventory: &Inventory,
    config: &EngineConfig,
) -> RuleResult<Vec<ConnectionEdge>> {
    let distributions = inventory.get::<DistributionView>()?;
    let endpoints = inventory.get::<EndpointView>()?;
    let mut edges = Vec::new();

    for distribution in distributions {
        for origin in distribution.origins() {
            let Some(domain) = origin.domain_name.as_deref() else {
                continue;
            };
            let partial = format!("{domain}/{}", origin.origin_path.as_deref().unwrap_or(""));
            for endpoint in endpoints {
                let Some(url) = endpoint.url.as_deref() else {
                    continue;
                };
                let ratio = similarity_ratio(&partial, url);
                if ratio < config.similarity_threshold {
                    continue;
                }
                edges.push(
                    ConnectionEdge::new(
                        endpoint.id.clone(),
                        distribution.id.clone(),
                        ENDPOINT_TO_DISTRIBUTION_BY_URL.relation,
                    )
                    .with_evidence("scheme", scheme_of(url))
                    .with_evidence("connected_by", "url")
                    .with_evidence("match", format!("{ratio}%")),
                );
            }
        }
    }
    Ok(edges)
}

pub fn endpoint_to_key_server(
    inventory: &Inventory,
    _config: &EngineConfig,
) -> RuleResult<Vec<ConnectionEdge>> {
    let servers = inventory.get::<KeyServerView>()?;
    let endpoints = inventory.get::<EndpointView>()?;
    let mut edges = Vec::new();

    for server in servers {
        let Some(server_url) = server.endpoint.as_deref() else {
            continue;
        };
        for endpoint in endpoints {
            for url in &endpoint.key_server_urls {
                if url != server_url {
                    continue;
                }
                edges.push(
                    ConnectionEdge::new(endpoint.id.clone(), server.id.clone(), ENDPOINT_TO_KEY_SERVER.relation)
                        .with_evidence("scheme", server.scheme.clone()),
                );
            }
        }
    }
    Ok(edges)
}

/// Playback configurations whose content source is a prefix or part of an
/// endpoint URL.
pub fn endpoint_to_playback_config(
    inventory: &Inventory,
    _config: &EngineConfig,
) -> RuleResult<Vec<ConnectionEdge>> {
    let endpoints = inventory.get::<EndpointView>()?;
    let configs = inventory.get::<PlaybackConfigView>()?;
    let mut edges = Vec::new();

    for endpoint in endpoints {
        let Some(endpoint_url) = endpoint.url.as_deref() else {
            continue;
        };
        for playback in configs {
            let Some(source) = playback.video_content_source_url.as_deref() else {
                continue;
            };
            if source.is_empty() || !endpoint_url.contains(source) {
                continue;
            }
            edges.push(
                ConnectionEdge::new(
                    endpoint.id.clone(),
                    playback.id.clone(),
                    ENDPOINT_TO_PLAYBACK_CONFIG.relation,
                )
                .with_evidence("scheme", scheme_of(source)),
            );
        }
    }
    Ok(edges)
}

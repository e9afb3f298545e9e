//! Rules connecting object storage, object-store containers and CDN
//! distributions to the resources that read from or write to them.

use super::{same, Rule};
use crate::config::EngineConfig;
use crate::error::RuleResult;
use crate::extract::{bucket_reference, cdn_reference, netloc_of, origin_bucket, scheme_of, UrlParts};
use crate::views::{
    BucketView, ChannelView, ContainerView, DistributionView, InputView, Inventory,
    PlaybackConfigView, Resource,
};
use medialink_types::{ConnectionEdge, ServiceCategory as Category};

pub const CHANNEL_TO_CONTAINER: Rule = Rule {
    name: "channel-to-container",
    relation: "medialive-channel-mediastore-container",
    inputs: &[Category::MediaLiveChannel, Category::MediaStoreContainer],
    eval: channel_to_container,
};

pub const CONTAINER_TO_INPUT: Rule = Rule {
    name: "container-to-input",
    relation: "mediastore-container-medialive-input",
    inputs: &[Category::MediaLiveInput, Category::MediaStoreContainer],
    eval: container_to_input,
};

pub const BUCKET_TO_DISTRIBUTION: Rule = Rule {
    name: "bucket-to-distribution",
    relation: "s3-bucket-cloudfront-distribution",
    inputs: &[Category::S3Bucket, Category::CloudFrontDistribution],
    eval: bucket_to_distribution,
};

pub const BUCKET_TO_INPUT: Rule = Rule {
    name: "bucket-to-input",
    relation: "s3-bucket-medialive-input",
    inputs: &[Category::S3Bucket, Category::MediaLiveInput],
    eval: bucket_to_input,
};

pub const DISTRIBUTION_TO_INPUT: Rule = Rule {
    name: "distribution-to-input",
    relation: "cloudfront-distribution-medialive-input",
    inputs: &[Category::CloudFrontDistribution, Category::MediaLiveInput],
    eval: distribution_to_input,
};

pub const BUCKET_TO_PLAYBACK_CONFIG: Rule = Rule {
    name: "bucket-to-playback-config",
    relation: "s3-bucket-mediatailor-configuration",
    inputs: &[Category::S3Bucket, Category::MediaTailorConfiguration],
    eval: bucket_to_playback_config,
};

pub const CONTAINER_TO_PLAYBACK_CONFIG: Rule = Rule {
    name: "container-to-playback-config",
    relation: "mediastore-container-mediatailor-configuration",
    inputs: &[Category::MediaStoreContainer, Category::MediaTailorConfiguration],
    eval: container_to_playback_config,
};

pub const CONTAINER_TO_DISTRIBUTION: Rule = Rule {
    name: "container-to-distribution",
    relation: "mediastore-container-cloudfront-distribution",
    inputs: &[Category::MediaStoreContainer, Category::CloudFrontDistribution],
    eval: container_to_distribution,
};

pub const CHANNEL_TO_BUCKET: Rule = Rule {
    name: "channel-to-bucket",
    relation: "medialive-channel-s3-bucket",
    inputs: &[Category::MediaLiveChannel, Category::S3Bucket],
    eval: channel_to_bucket,
};

/// Hosts served by the object-store service carry this marker.
const CONTAINER_HOST_MARKER: &str = "mediastore";

/// Containers whose endpoint host equals the host of `url`.
fn containers_at<'a>(
    containers: &'a [Resource<ContainerView>],
    url: &str,
) -> impl Iterator<Item = &'a Resource<ContainerView>> {
    let host = netloc_of(url).to_string();
    containers.iter().filter(move |c| {
        !host.is_empty() && c.endpoint.as_deref().map(netloc_of) == Some(host.as_str())
    })
}

fn is_container_url(url: &str) -> bool {
    netloc_of(url).contains(CONTAINER_HOST_MARKER)
}

pub fn channel_to_container(
    inventory: &Inventory,
    _config: &EngineConfig,
) -> RuleResult<Vec<ConnectionEdge>> {
    let channels = inventory.get::<ChannelView>()?;
    let containers = inventory.get::<ContainerView>()?;
    let mut edges = Vec::new();

    for channel in channels {
        for url in channel.output_urls().filter(|u| is_container_url(u)) {
            for container in containers_at(containers, url) {
                edges.push(
                    ConnectionEdge::new(channel.id.clone(), container.id.clone(), CHANNEL_TO_CONTAINER.relation)
                        .with_evidence("scheme", scheme_of(url)),
                );
            }
        }
    }
    Ok(edges)
}

pub fn container_to_input(
    inventory: &Inventory,
    _config: &EngineConfig,
) -> RuleResult<Vec<ConnectionEdge>> {
    let inputs = inventory.get::<InputView>()?;
    let containers = inventory.get::<ContainerView>()?;
    let mut edges = Vec::new();

    for input in inputs {
        for url in input.source_urls().filter(|u| is_container_url(u)) {
            for container in containers_at(containers, url) {
                edges.push(
                    ConnectionEdge::new(container.id.clone(), input.id.clone(), CONTAINER_TO_INPUT.relation)
                        .with_evidence("scheme", scheme_of(url)),
                );
            }
        }
    }
    Ok(edges)
}

/// Distributions with an origin in the bucket's website or REST host.
pub fn bucket_to_distribution(
    inventory: &Inventory,
    _config: &EngineConfig,
) -> RuleResult<Vec<ConnectionEdge>> {
    let buckets = inventory.get::<BucketView>()?;
    let distributions = inventory.get::<DistributionView>()?;
    let mut edges = Vec::new();

    for bucket in buckets {
        for distribution in distributions {
            for origin in distribution.origins() {
                let name = origin.domain_name.as_deref().and_then(origin_bucket);
                if same(name, bucket.name.as_deref()) {
                    edges.push(
                        ConnectionEdge::new(
                            bucket.id.clone(),
                            distribution.id.clone(),
                            BUCKET_TO_DISTRIBUTION.relation,
                        )
                        .with_evidence("label", "S3"),
                    );
                }
            }
        }
    }
    Ok(edges)
}

pub fn bucket_to_input(
    inventory: &Inventory,
    _config: &EngineConfig,
) -> RuleResult<Vec<ConnectionEdge>> {
    let buckets = inventory.get::<BucketView>()?;
    let inputs = inventory.get::<InputView>()?;
    let mut edges = Vec::new();

    for input in inputs {
        for reference in input.source_urls().filter_map(bucket_reference) {
            for bucket in buckets {
                if bucket.name.as_deref() == Some(reference.name.as_str()) {
                    edges.push(
                        ConnectionEdge::new(bucket.id.clone(), input.id.clone(), BUCKET_TO_INPUT.relation)
                            .with_evidence("scheme", reference.scheme.clone()),
                    );
                }
            }
        }
    }
    Ok(edges)
}

pub fn distribution_to_input(
    inventory: &Inventory,
    _config: &EngineConfig,
) -> RuleResult<Vec<ConnectionEdge>> {
    let distributions = inventory.get::<DistributionView>()?;
    let inputs = inventory.get::<InputView>()?;
    let mut edges = Vec::new();

    for input in inputs {
        for reference in input.source_urls().filter_map(cdn_reference) {
            for distribution in distributions {
                if distribution.domain_name.as_deref() == Some(reference.name.as_str()) {
                    edges.push(
                        ConnectionEdge::new(
                            distribution.id.clone(),
                            input.id.clone(),
                            DISTRIBUTION_TO_INPUT.relation,
                        )
                        .with_evidence("scheme", reference.scheme.clone()),
                    );
                }
            }
        }
    }
    Ok(edges)
}

pub fn bucket_to_playback_config(
    inventory: &Inventory,
    _config: &EngineConfig,
) -> RuleResult<Vec<ConnectionEdge>> {
    let buckets = inventory.get::<BucketView>()?;
    let configs = inventory.get::<PlaybackConfigView>()?;
    let mut edges = Vec::new();

    for playback in configs {
        let Some(reference) = playback
            .video_content_source_url
            .as_deref()
            .and_then(bucket_reference)
        else {
            continue;
        };
        for bucket in buckets {
            if bucket.name.as_deref() == Some(reference.name.as_str()) {
                edges.push(
                    ConnectionEdge::new(bucket.id.clone(), playback.id.clone(), BUCKET_TO_PLAYBACK_CONFIG.relation)
                        .with_evidence("scheme", reference.scheme.clone()),
                );
            }
        }
    }
    Ok(edges)
}

pub fn container_to_playback_config(
    inventory: &Inventory,
    _config: &EngineConfig,
) -> RuleResult<Vec<ConnectionEdge>> {
    let containers = inventory.get::<ContainerView>()?;
    let configs = inventory.get::<PlaybackConfigView>()?;
    let mut edges = Vec::new();

    for playback in configs {
        let Some(url) = playback.video_content_source_url.as_deref() else {
            continue;
        };
        if !is_container_url(url) {
            continue;
        }
        for container in containers_at(containers, url) {
            edges.push(
                ConnectionEdge::new(
                    container.id.clone(),
                    playback.id.clone(),
                    CONTAINER_TO_PLAYBACK_CONFIG.relation,
                )
                .with_evidence("scheme", scheme_of(url)),
            );
        }
    }
    Ok(edges)
}

/// Distributions whose origin host appears in a container's endpoint.
pub fn container_to_distribution(
    inventory: &Inventory,
    _config: &EngineConfig,
) -> RuleResult<Vec<ConnectionEdge>> {
    let containers = inventory.get::<ContainerView>()?;
    let distributions = inventory.get::<DistributionView>()?;
    let mut edges = Vec::new();

    for distribution in distributions {
        for origin in distribution.origins() {
            let Some(domain) = origin.domain_name.as_deref() else {
                continue;
            };
            if !domain.contains(CONTAINER_HOST_MARKER) {
                continue;
            }
            for container in containers {
                let Some(endpoint) = container.endpoint.as_deref() else {
                    continue;
                };
                if endpoint.contains(domain) {
                    edges.push(
                        ConnectionEdge::new(
                            container.id.clone(),
                            distribution.id.clone(),
                            CONTAINER_TO_DISTRIBUTION.relation,
                        )
                        .with_evidence("scheme", scheme_of(endpoint)),
                    );
                }
            }
        }
    }
    Ok(edges)
}

/// Channel outputs written with the `s3` or `s3ssl` scheme.
pub fn channel_to_bucket(
    inventory: &Inventory,
    _config: &EngineConfig,
) -> RuleResult<Vec<ConnectionEdge>> {
    let channels = inventory.get::<ChannelView>()?;
    let buckets = inventory.get::<BucketView>()?;
    let mut edges = Vec::new();

    for channel in channels {
        for url in channel.output_urls() {
            let Some(parts) = UrlParts::parse(url) else {
                continue;
            };
            if !matches!(parts.scheme.as_str(), "s3" | "s3ssl") {
                continue;
            }
            for bucket in buckets {
                if bucket.name.as_deref() == Some(parts.netloc) {
                    edges.push(
                        ConnectionEdge::new(channel.id.clone(), bucket.id.clone(), CHANNEL_TO_BUCKET.relation)
                            .with_evidence("scheme", parts.scheme.clone()),
                    );
                }
            }
        }
    }
    Ok(edges)
}

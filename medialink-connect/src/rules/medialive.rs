//! Rules centred on live channels and inputs.

use super::{same, Rule};
use crate::config::EngineConfig;
use crate::error::RuleResult;
use crate::extract::{current_ingest_url, UrlParts};
use crate::matchers::same_netloc;
use crate::pipeline::{fan_out, Pipelined};
use crate::views::{
    ChannelView, InputView, Inventory, LinkDeviceView, MultiplexView, PackagingChannelView,
};
use medialink_types::{ConnectionEdge, ServiceCategory as Category};

pub const CHANNEL_TO_PACKAGING_CHANNEL: Rule = Rule {
    name: "channel-to-packaging-channel",
    relation: "medialive-channel-mediapackage-channel",
    inputs: &[Category::MediaLiveChannel, Category::MediaPackageChannel],
    eval: channel_to_packaging_channel,
};

pub const INPUT_TO_CHANNEL: Rule = Rule {
    name: "input-to-channel",
    relation: "medialive-input-medialive-channel",
    inputs: &[Category::MediaLiveChannel, Category::MediaLiveInput],
    eval: input_to_channel,
};

pub const CHANNEL_TO_MULTIPLEX: Rule = Rule {
    name: "channel-to-multiplex",
    relation: "medialive-channel-multiplex",
    inputs: &[Category::MediaLiveChannel, Category::MediaLiveMultiplex],
    eval: channel_to_multiplex,
};

pub const LINK_DEVICE_TO_INPUT: Rule = Rule {
    name: "link-device-to-input",
    relation: "link-device-medialive-input",
    inputs: &[Category::MediaLiveInput, Category::LinkDevice],
    eval: link_device_to_input,
};

pub const CHANNEL_TO_INPUT: Rule = Rule {
    name: "channel-to-input",
    relation: "medialive-channel-medialive-input",
    inputs: &[Category::MediaLiveChannel, Category::MediaLiveInput],
    eval: channel_to_input,
};

const ARQ_INFO: &str = "https://en.wikipedia.org/wiki/Automatic_repeat_request";

/// Channels push to packaging channels either by channel id (one edge per
/// running pipeline) or by ingest URL (the setting index is the pipeline).
pub fn channel_to_packaging_channel(
    inventory: &Inventory,
    _config: &EngineConfig,
) -> RuleResult<Vec<ConnectionEdge>> {
    let channels = inventory.get::<ChannelView>()?;
    let packaging = inventory.get::<PackagingChannelView>()?;
    let relation = CHANNEL_TO_PACKAGING_CHANNEL.relation;
    let mut edges = Vec::new();

    for channel in channels {
        for destination in &channel.destinations {
            if !destination.media_package_settings.is_empty() {
                for setting in &destination.media_package_settings {
                    for target in packaging {
                        if !same(target.view.id.as_deref(), setting.channel_id.as_deref()) {
                            continue;
                        }
                        edges.extend(fan_out(channel.running_pipelines(), || {
                            ConnectionEdge::new(channel.id.clone(), target.id.clone(), relation)
                        }));
                    }
                }
                // Channel-id delivery covers the whole channel.
                break;
            }

            for (index, setting) in destination.settings.iter().enumerate() {
                let Some(url) = setting.url.as_deref() else {
                    continue;
                };
                let current = current_ingest_url(url);
                let pipeline = u32::try_from(index).unwrap_or(u32::MAX);
                for target in packaging {
                    for ingest in target.ingest_urls() {
                        if ingest == url || current.as_deref() == Some(ingest) {
                            edges.push(
                                ConnectionEdge::new(channel.id.clone(), target.id.clone(), relation)
                                    .with_pipeline(pipeline),
                            );
                        }
                    }
                }
            }
        }
    }
    Ok(edges)
}

pub fn input_to_channel(
    inventory: &Inventory,
    _config: &EngineConfig,
) -> RuleResult<Vec<ConnectionEdge>> {
    let channels = inventory.get::<ChannelView>()?;
    let inputs = inventory.get::<InputView>()?;
    let mut edges = Vec::new();

    for channel in channels {
        let Some(channel_id) = channel.view.id.as_deref() else {
            continue;
        };
        for input in inputs {
            for attached in &input.attached_channels {
                if attached != channel_id {
                    continue;
                }
                edges.extend(fan_out(channel.running_pipelines(), || {
                    ConnectionEdge::new(input.id.clone(), channel.id.clone(), INPUT_TO_CHANNEL.relation)
                        .with_evidence("type", input.kind.clone())
                }));
            }
        }
    }
    Ok(edges)
}

pub fn channel_to_multiplex(
    inventory: &Inventory,
    _config: &EngineConfig,
) -> RuleResult<Vec<ConnectionEdge>> {
    let channels = inventory.get::<ChannelView>()?;
    let multiplexes = inventory.get::<MultiplexView>()?;
    let mut edges = Vec::new();

    for channel in channels {
        for settings in channel.destinations.iter().filter_map(|d| d.multiplex_settings.as_ref()) {
            for multiplex in multiplexes {
                if !same(multiplex.view.id.as_deref(), settings.multiplex_id.as_deref()) {
                    continue;
                }
                edges.extend(fan_out(channel.running_pipelines(), || {
                    ConnectionEdge::new(
                        channel.id.clone(),
                        multiplex.id.clone(),
                        CHANNEL_TO_MULTIPLEX.relation,
                    )
                    .with_evidence("program", settings.program_name.clone())
                }));
            }
        }
    }
    Ok(edges)
}

pub fn link_device_to_input(
    inventory: &Inventory,
    _config: &EngineConfig,
) -> RuleResult<Vec<ConnectionEdge>> {
    let inputs = inventory.get::<InputView>()?;
    let devices = inventory.get::<LinkDeviceView>()?;
    let mut edges = Vec::new();

    for input in inputs {
        for device_ref in &input.input_devices {
            for device in devices {
                if same(device_ref.id.as_deref(), device.view.id.as_deref()) {
                    edges.push(
                        ConnectionEdge::new(device.id.clone(), input.id.clone(), LINK_DEVICE_TO_INPUT.relation)
                            .with_evidence("scheme", "ARQ")
                            .with_evidence("info", ARQ_INFO),
                    );
                }
            }
        }
    }
    Ok(edges)
}

/// Channel RTP outputs that land on an RTP push input.
pub fn channel_to_input(
    inventory: &Inventory,
    _config: &EngineConfig,
) -> RuleResult<Vec<ConnectionEdge>> {
    let channels = inventory.get::<ChannelView>()?;
    let inputs = inventory.get::<InputView>()?;
    let mut edges = Vec::new();

    for channel in channels {
        for url in channel.output_urls() {
            if UrlParts::parse(url).is_none_or(|parts| parts.scheme != "rtp") {
                continue;
            }
            for input in inputs.iter().filter(|i| i.kind.as_deref() == Some("RTP_PUSH")) {
                for input_url in input.destinations.iter().filter_map(|d| d.url.as_deref()) {
                    if !same_netloc(url, input_url) {
                        continue;
                    }
                    let scheme = UrlParts::parse(input_url)
                        .map(|p| p.scheme.to_uppercase())
                        .unwrap_or_default();
                    edges.push(
                        ConnectionEdge::new(channel.id.clone(), input.id.clone(), CHANNEL_TO_INPUT.relation)
                            .with_evidence("scheme", scheme),
                    );
                }
            }
        }
    }
    Ok(edges)
}

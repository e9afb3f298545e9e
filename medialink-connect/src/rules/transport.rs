//! Transport-level rules: flows, entitlements and RTP push outputs.
//!
//! Transport endpoints are matched by address. Flows attached to a VPC are
//! matched by a synthesized key of address, port and subnet instead, since the
//! same private address can exist in several subnets.

use super::{same, Rule};
use crate::config::EngineConfig;
use crate::error::RuleResult;
use crate::extract::UrlParts;
use crate::matchers::{pair_matches, NetworkKey};
use crate::views::{
    ChannelView, FlowOutput, FlowView, InputView, Inventory, MultiplexView, Resource,
};
use medialink_types::{ConnectionEdge, ServiceCategory as Category};
use tracing::warn;

pub const FLOW_TO_INPUT: Rule = Rule {
    name: "flow-to-input",
    relation: "mediaconnect-flow-medialive-input",
    inputs: &[Category::MediaConnectFlow, Category::MediaLiveInput],
    eval: flow_to_input,
};

pub const FLOW_TO_FLOW: Rule = Rule {
    name: "flow-to-flow",
    relation: "mediaconnect-flow-mediaconnect-flow",
    inputs: &[Category::MediaConnectFlow],
    eval: flow_to_flow,
};

pub const MULTIPLEX_TO_FLOW: Rule = Rule {
    name: "multiplex-to-flow",
    relation: "multiplex-mediaconnect-flow",
    inputs: &[Category::MediaLiveMultiplex, Category::MediaConnectFlow],
    eval: multiplex_to_flow,
};

pub const CHANNEL_TO_FLOW: Rule = Rule {
    name: "channel-to-flow",
    relation: "medialive-channel-mediaconnect-flow",
    inputs: &[Category::MediaLiveChannel, Category::MediaConnectFlow],
    eval: channel_to_flow,
};

pub const CDI: &str = "cdi";
pub const ST2110_JPEGXS: &str = "st2110-jpegxs";

/// Each flow output reaches an input either by direct reference or by
/// pushing to one of the input's destination addresses.
pub fn flow_to_input(
    inventory: &Inventory,
    _config: &EngineConfig,
) -> RuleResult<Vec<ConnectionEdge>> {
    let flows = inventory.get::<FlowView>()?;
    let inputs = inventory.get::<InputView>()?;
    let mut edges = Vec::new();
    // Direct references are only trusted against a loaded input set.
    if inputs.is_empty() {
        return Ok(edges);
    }

    for flow in flows {
        for output in &flow.outputs {
            if let Some(input_arn) = output.media_live_input_arn.as_deref().filter(|a| !a.is_empty()) {
                edges.push(
                    ConnectionEdge::new(flow.id.clone(), input_arn, FLOW_TO_INPUT.relation)
                        .with_evidence("scheme", "MEDIACONNECT"),
                );
                continue;
            }
            let Some(destination) = output.destination.as_deref() else {
                continue;
            };
            // Several inputs can list the address; the smallest identity wins.
            let target = inputs
                .iter()
                .filter(|input| {
                    input
                        .destinations
                        .iter()
                        .any(|d| d.ip.as_deref() == Some(destination))
                })
                .min_by(|a, b| a.id.cmp(&b.id));
            if let Some(input) = target {
                edges.push(
                    ConnectionEdge::new(flow.id.clone(), input.id.clone(), FLOW_TO_INPUT.relation)
                        .with_evidence("scheme", input.kind.clone()),
                );
            }
        }
    }
    Ok(edges)
}

/// How a consuming flow's source is identified.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Ingress {
    /// Public source reached at the flow's egress address.
    Address(String),
    /// VPC source with one stream.
    Cdi(NetworkKey),
    /// VPC source with two paired streams.
    JpegXs([NetworkKey; 2]),
    /// VPC source that cannot be matched.
    Unmatched,
}

fn ingress_of(flow: &Resource<FlowView>) -> Option<Ingress> {
    if !flow.in_vpc() {
        return flow.egress_ip.clone().map(Ingress::Address);
    }
    let source = flow.source.as_ref()?;
    let ingress = match source.protocol() {
        Some(CDI) => {
            let subnet = flow.subnet(source.vpc_interface_name.as_deref()?)?;
            Ingress::Cdi(NetworkKey::new(
                source.ingest_ip.as_deref()?,
                source.ingest_port?,
                subnet,
            ))
        }
        Some(ST2110_JPEGXS) => {
            let configs = &source.media_stream_source_configurations.first()?.input_configurations;
            let key = |i: usize| -> Option<NetworkKey> {
                let config = configs.get(i)?;
                let interface = config.interface.as_ref()?.name.as_deref()?;
                Some(NetworkKey::new(
                    config.input_ip.as_deref()?,
                    config.input_port?,
                    flow.subnet(interface)?,
                ))
            };
            Ingress::JpegXs([key(0)?, key(1)?])
        }
        other => {
            warn!(flow = %flow.id, protocol = ?other, "unhandled VPC transport protocol");
            Ingress::Unmatched
        }
    };
    Some(ingress)
}

fn output_key(producer: &FlowView, output: &FlowOutput) -> Option<NetworkKey> {
    let interface = output.vpc_interface_attachment.as_ref()?.vpc_interface_name.as_deref()?;
    Some(NetworkKey::new(
        output.destination.as_deref()?,
        output.port?,
        producer.subnet(interface)?,
    ))
}

fn output_keys(producer: &FlowView, output: &FlowOutput) -> Option<[NetworkKey; 2]> {
    let configs = &output
        .media_stream_output_configurations
        .first()?
        .destination_configurations;
    let key = |i: usize| -> Option<NetworkKey> {
        let config = configs.get(i)?;
        let interface = config.interface.as_ref()?.name.as_deref()?;
        Some(NetworkKey::new(
            config.destination_ip.as_deref()?,
            config.destination_port?,
            producer.subnet(interface)?,
        ))
    };
    Some([key(0)?, key(1)?])
}

fn feeds(ingress: &Ingress, consumer: &FlowView, producer: &FlowView, output: &FlowOutput) -> bool {
    match ingress {
        Ingress::Address(ip) => output.destination.as_deref() == Some(ip.as_str()),
        Ingress::Unmatched => false,
        Ingress::Cdi(_) | Ingress::JpegXs(_) => {
            let consumer_protocol = consumer.source.as_ref().and_then(|s| s.protocol());
            if !producer.in_vpc() || !same(consumer_protocol, output.protocol()) {
                return false;
            }
            match ingress {
                Ingress::Cdi(key) => output_key(producer, output).as_ref() == Some(key),
                Ingress::JpegXs(keys) => {
                    output_keys(producer, output).is_some_and(|dest| pair_matches(keys, &dest))
                }
                _ => false,
            }
        }
    }
}

/// Flows feed other flows through entitlements or by pushing an output to
/// the consumer's source.
pub fn flow_to_flow(
    inventory: &Inventory,
    _config: &EngineConfig,
) -> RuleResult<Vec<ConnectionEdge>> {
    let flows = inventory.get::<FlowView>()?;
    let relation = FLOW_TO_FLOW.relation;
    let mut edges = Vec::new();

    for consumer in flows {
        let entitlement = consumer
            .source
            .as_ref()
            .and_then(|s| s.entitlement_arn.as_deref())
            .filter(|arn| !arn.is_empty());
        if let Some(arn) = entitlement {
            let mut exporters = flows
                .iter()
                .filter(|p| p.id != consumer.id && p.exports(arn))
                .peekable();
            if exporters.peek().is_none() {
                // Granted from outside the cache, e.g. another account.
                edges.push(
                    ConnectionEdge::new(arn, consumer.id.clone(), relation)
                        .with_evidence("scheme", "ENTITLEMENT"),
                );
            }
            for producer in exporters {
                edges.push(
                    ConnectionEdge::new(producer.id.clone(), consumer.id.clone(), relation)
                        .with_evidence("scheme", "ENTITLEMENT"),
                );
            }
        }

        let Some(ingress) = ingress_of(consumer) else {
            continue;
        };
        for producer in flows.iter().filter(|p| p.id != consumer.id) {
            for output in &producer.outputs {
                let Some(protocol) = output.protocol() else {
                    continue;
                };
                if feeds(&ingress, consumer, producer, output) {
                    edges.push(
                        ConnectionEdge::new(producer.id.clone(), consumer.id.clone(), relation)
                            .with_evidence("scheme", protocol.to_uppercase()),
                    );
                }
            }
        }
    }
    Ok(edges)
}

pub fn multiplex_to_flow(
    inventory: &Inventory,
    _config: &EngineConfig,
) -> RuleResult<Vec<ConnectionEdge>> {
    let multiplexes = inventory.get::<MultiplexView>()?;
    let flows = inventory.get::<FlowView>()?;
    let mut edges = Vec::new();

    for multiplex in multiplexes {
        for flow in flows {
            for arn in &flow.source_entitlement_arns {
                if multiplex.entitlement_arns.contains(arn) {
                    edges.push(
                        ConnectionEdge::new(multiplex.id.clone(), flow.id.clone(), MULTIPLEX_TO_FLOW.relation)
                            .with_evidence("entitlement", arn.as_str()),
                    );
                }
            }
        }
    }
    Ok(edges)
}

/// Channel RTP outputs that land on a flow's RTP source.
pub fn channel_to_flow(
    inventory: &Inventory,
    _config: &EngineConfig,
) -> RuleResult<Vec<ConnectionEdge>> {
    let channels = inventory.get::<ChannelView>()?;
    let flows = inventory.get::<FlowView>()?;
    let mut edges = Vec::new();

    for channel in channels {
        for url in channel.output_urls() {
            let Some(parts) = UrlParts::parse(url) else {
                continue;
            };
            if parts.scheme != "rtp" {
                continue;
            }
            for flow in flows {
                for source in &flow.sources {
                    let Some(protocol) = source.protocol().filter(|p| p.contains("rtp")) else {
                        continue;
                    };
                    let (Some(ip), Some(port)) = (source.ingest_ip.as_deref(), source.ingest_port) else {
                        continue;
                    };
                    if parts.netloc == format!("{ip}:{port}") {
                        edges.push(
                            ConnectionEdge::new(channel.id.clone(), flow.id.clone(), CHANNEL_TO_FLOW.relation)
                                .with_evidence("scheme", protocol.to_uppercase()),
                        );
                    }
                }
            }
        }
    }
    Ok(edges)
}

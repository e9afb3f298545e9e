mod common;

use common::*;
use medialink_connect::rules::transport::{
    CHANNEL_TO_FLOW, FLOW_TO_FLOW, FLOW_TO_INPUT, MULTIPLEX_TO_FLOW,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

const FLOW_A: &str = "arn:aws:mediaconnect:us-west-2:1:flow:1-A:a";
const FLOW_B: &str = "arn:aws:mediaconnect:us-west-2:1:flow:1-B:b";

fn cdi_consumer(ingest_ip: &str, port: u32, subnet: &str) -> Value {
    json!({
        "EgressIp": "10.0.0.5",
        "Source": {
            "IngestIp": ingest_ip,
            "IngestPort": port,
            "VpcInterfaceName": "vpc-in",
            "Transport": {"Protocol": "cdi"},
        },
        "VpcInterfaces": [{"Name": "vpc-in"}],
        "VpcSubnet": {"vpc-in": subnet},
        "Outputs": [],
    })
}

fn cdi_producer(destination: &str, port: u32, subnet: &str) -> Value {
    json!({
        "Source": {"Transport": {"Protocol": "cdi"}},
        "VpcInterfaces": [{"Name": "vpc-out"}],
        "VpcSubnet": {"vpc-out": subnet},
        "Outputs": [{
            "Destination": destination,
            "Port": port,
            "Transport": {"Protocol": "cdi"},
            "VpcInterfaceAttachment": {"VpcInterfaceName": "vpc-out"},
        }],
    })
}

fn jpegxs_consumer(pairs: [(&str, u32, &str); 2]) -> Value {
    let configs: Vec<Value> = pairs
        .iter()
        .enumerate()
        .map(|(i, (ip, port, _))| {
            json!({"InputIp": ip, "InputPort": port, "Interface": {"Name": format!("in{i}")}})
        })
        .collect();
    json!({
        "Source": {
            "Transport": {"Protocol": "st2110-jpegxs"},
            "MediaStreamSourceConfigurations": [{"InputConfigurations": configs}],
        },
        "VpcInterfaces": [{"Name": "in0"}, {"Name": "in1"}],
        "VpcSubnet": {"in0": pairs[0].2, "in1": pairs[1].2},
        "Outputs": [],
    })
}

fn jpegxs_producer(pairs: [(&str, u32, &str); 2]) -> Value {
    let configs: Vec<Value> = pairs
        .iter()
        .enumerate()
        .map(|(i, (ip, port, _))| {
            json!({"DestinationIp": ip, "DestinationPort": port, "Interface": {"Name": format!("out{i}")}})
        })
        .collect();
    json!({
        "Source": {"Transport": {"Protocol": "st2110-jpegxs"}},
        "VpcInterfaces": [{"Name": "out0"}, {"Name": "out1"}],
        "VpcSubnet": {"out0": pairs[0].2, "out1": pairs[1].2},
        "Outputs": [{
            "Transport": {"Protocol": "st2110-jpegxs"},
            "MediaStreamOutputConfigurations": [{"DestinationConfigurations": configs}],
        }],
    })
}

// ── Flow to flow ─────────────────────────────────────────────────

#[test]
fn output_pushed_to_egress_address_connects_flows() {
    let edges = eval(
        &FLOW_TO_FLOW,
        vec![
            flow(
                FLOW_A,
                json!({"Outputs": [{"Destination": "10.0.0.5", "Port": 5000, "Transport": {"Protocol": "rtp"}}]}),
            ),
            flow(FLOW_B, json!({"EgressIp": "10.0.0.5", "Source": {"Transport": {"Protocol": "rtp"}}})),
        ],
    );
    assert_eq!(keys(&edges), vec![format!("{FLOW_A}:{FLOW_B}")]);
    assert_eq!(edges[0].relation, "mediaconnect-flow-mediaconnect-flow");
    assert_eq!(edges[0].evidence_str("scheme"), Some("RTP"));
}

#[test]
fn flow_never_connects_to_itself() {
    let edges = eval(
        &FLOW_TO_FLOW,
        vec![flow(
            FLOW_A,
            json!({
                "EgressIp": "10.0.0.5",
                "Outputs": [{"Destination": "10.0.0.5", "Transport": {"Protocol": "rtp"}}],
            }),
        )],
    );
    assert!(edges.is_empty());
}

#[test]
fn entitlement_subscriber_connects_to_exporting_flow() {
    let entitlement = "arn:aws:mediaconnect:us-west-2:1:entitlement:1-E:share";
    let edges = eval(
        &FLOW_TO_FLOW,
        vec![
            flow(FLOW_A, json!({"Entitlements": [{"EntitlementArn": entitlement}], "Outputs": []})),
            flow(FLOW_B, json!({"Source": {"EntitlementArn": entitlement}})),
        ],
    );
    assert_eq!(keys(&edges), vec![format!("{FLOW_A}:{FLOW_B}")]);
    assert_eq!(edges[0].evidence_str("scheme"), Some("ENTITLEMENT"));
}

#[test]
fn foreign_entitlement_is_its_own_source() {
    let entitlement = "arn:aws:mediaconnect:us-east-1:2:entitlement:1-X:partner";
    let edges = eval(
        &FLOW_TO_FLOW,
        vec![flow(FLOW_B, json!({"Source": {"EntitlementArn": entitlement}}))],
    );
    assert_eq!(keys(&edges), vec![format!("{entitlement}:{FLOW_B}")]);
}

#[test]
fn cdi_flows_match_on_synthesized_key() {
    let edges = eval(
        &FLOW_TO_FLOW,
        vec![
            flow(FLOW_A, cdi_producer("10.1.0.9", 6000, "subnet-1")),
            flow(FLOW_B, cdi_consumer("10.1.0.9", 6000, "subnet-1")),
        ],
    );
    assert_eq!(keys(&edges), vec![format!("{FLOW_A}:{FLOW_B}")]);
    assert_eq!(edges[0].evidence_str("scheme"), Some("CDI"));
}

#[test]
fn vpc_flows_with_different_subnets_do_not_match() {
    let mut producer = cdi_producer("10.1.0.9", 6000, "subnet-1");
    producer["Outputs"][0]["Destination"] = json!("10.0.0.5");
    let edges = eval(
        &FLOW_TO_FLOW,
        vec![
            flow(FLOW_A, producer),
            // Same address as the producer's destination, other subnet.
            flow(FLOW_B, cdi_consumer("10.0.0.5", 6000, "subnet-2")),
        ],
    );
    assert!(edges.is_empty());
}

#[test]
fn vpc_consumer_ignores_protocol_mismatch() {
    let mut producer = cdi_producer("10.1.0.9", 6000, "subnet-1");
    producer["Outputs"][0]["Transport"]["Protocol"] = json!("rtp");
    let edges = eval(
        &FLOW_TO_FLOW,
        vec![
            flow(FLOW_A, producer),
            flow(FLOW_B, cdi_consumer("10.1.0.9", 6000, "subnet-1")),
        ],
    );
    assert!(edges.is_empty());
}

#[test]
fn jpegxs_pairs_match_in_either_order() {
    let edges = eval(
        &FLOW_TO_FLOW,
        vec![
            flow(
                FLOW_A,
                jpegxs_producer([("10.2.0.2", 7002, "subnet-b"), ("10.2.0.1", 7000, "subnet-a")]),
            ),
            flow(
                FLOW_B,
                jpegxs_consumer([("10.2.0.1", 7000, "subnet-a"), ("10.2.0.2", 7002, "subnet-b")]),
            ),
        ],
    );
    assert_eq!(keys(&edges), vec![format!("{FLOW_A}:{FLOW_B}")]);
    assert_eq!(edges[0].evidence_str("scheme"), Some("ST2110-JPEGXS"));
}

#[test]
fn jpegxs_pairs_need_both_streams() {
    let edges = eval(
        &FLOW_TO_FLOW,
        vec![
            flow(
                FLOW_A,
                jpegxs_producer([("10.2.0.1", 7000, "subnet-a"), ("10.2.0.3", 7004, "subnet-b")]),
            ),
            flow(
                FLOW_B,
                jpegxs_consumer([("10.2.0.1", 7000, "subnet-a"), ("10.2.0.2", 7002, "subnet-b")]),
            ),
        ],
    );
    assert!(edges.is_empty());
}

#[test]
fn unhandled_vpc_protocol_connects_nothing() {
    let mut consumer = cdi_consumer("10.1.0.9", 6000, "subnet-1");
    consumer["Source"]["Transport"]["Protocol"] = json!("srt-listener");
    let edges = eval(
        &FLOW_TO_FLOW,
        vec![
            flow(FLOW_A, json!({"Outputs": [{"Destination": "10.0.0.5", "Transport": {"Protocol": "srt-listener"}}]})),
            flow(FLOW_B, consumer),
        ],
    );
    assert!(edges.is_empty());
}

// ── Flow to input ────────────────────────────────────────────────

#[test]
fn direct_input_reference_wins() {
    let edges = eval(
        &FLOW_TO_INPUT,
        vec![
            flow(
                FLOW_A,
                json!({"Outputs": [
                    {"MediaLiveInputArn": "arn:aws:medialive:us-west-2:1:input:9", "Destination": "10.0.0.8"},
                ]}),
            ),
            input("arn:input:by-ip", json!({"Type": "RTP_PUSH", "Destinations": [{"Ip": "10.0.0.8"}]})),
        ],
    );
    assert_eq!(
        keys(&edges),
        vec![format!("{FLOW_A}:arn:aws:medialive:us-west-2:1:input:9")]
    );
    assert_eq!(edges[0].evidence_str("scheme"), Some("MEDIACONNECT"));
}

#[test]
fn direct_reference_needs_loaded_inputs() {
    let edges = eval(
        &FLOW_TO_INPUT,
        vec![flow(
            FLOW_A,
            json!({"Outputs": [{"MediaLiveInputArn": "arn:aws:medialive:us-west-2:1:input:9"}]}),
        )],
    );
    assert!(edges.is_empty());
}

#[test]
fn output_address_matches_input() {
    let edges = eval(
        &FLOW_TO_INPUT,
        vec![
            flow(FLOW_A, json!({"Outputs": [{"Destination": "10.0.0.8"}, {"Destination": "10.0.0.99"}]})),
            input(
                "arn:input:1",
                json!({"Type": "RTP_PUSH", "Destinations": [{"Ip": "10.0.0.7"}, {"Ip": "10.0.0.8"}]}),
            ),
        ],
    );
    assert_eq!(keys(&edges), vec![format!("{FLOW_A}:arn:input:1")]);
    assert_eq!(edges[0].evidence_str("scheme"), Some("RTP_PUSH"));
}

#[test]
fn shared_address_picks_smallest_input_regardless_of_order() {
    let pushed = flow(FLOW_A, json!({"Outputs": [{"Destination": "10.0.0.8"}]}));
    let first = input("arn:input:1", json!({"Type": "RTP_PUSH", "Destinations": [{"Ip": "10.0.0.8"}]}));
    let second = input("arn:input:2", json!({"Type": "RTP_PUSH", "Destinations": [{"Ip": "10.0.0.8"}]}));

    let forward = eval(&FLOW_TO_INPUT, vec![pushed.clone(), first.clone(), second.clone()]);
    let reverse = eval(&FLOW_TO_INPUT, vec![pushed, second, first]);
    assert_eq!(keys(&forward), vec![format!("{FLOW_A}:arn:input:1")]);
    assert_eq!(keys(&forward), keys(&reverse));
}

// ── Multiplex and channel to flow ────────────────────────────────

#[test]
fn multiplex_entitlement_feeds_flow() {
    let entitlement = "arn:aws:mediaconnect:us-west-2:1:entitlement:1-M:mux";
    let edges = eval(
        &MULTIPLEX_TO_FLOW,
        vec![
            multiplex(
                "arn:mux:1",
                json!({"Id": "mux-1", "Destinations": [{"MediaConnectSettings": {"EntitlementArn": entitlement}}]}),
            ),
            flow(FLOW_A, json!({"Source": {"EntitlementArn": entitlement}})),
            flow(FLOW_B, json!({"Source": {"EntitlementArn": "arn:other"}})),
        ],
    );
    assert_eq!(keys(&edges), vec![format!("arn:mux:1:{FLOW_A}")]);
    assert_eq!(edges[0].evidence_str("entitlement"), Some(entitlement));
}

#[test]
fn channel_rtp_output_reaches_flow_source() {
    let edges = eval(
        &CHANNEL_TO_FLOW,
        vec![
            channel_with_outputs("arn:channel:1", &["rtp://203.0.113.4:5000"]),
            flow(
                FLOW_A,
                json!({"Sources": [{"IngestIp": "203.0.113.4", "IngestPort": 5000, "Transport": {"Protocol": "rtp-fec"}}]}),
            ),
            flow(
                FLOW_B,
                json!({"Sources": [{"IngestIp": "203.0.113.4", "IngestPort": 5000, "Transport": {"Protocol": "zixi-push"}}]}),
            ),
        ],
    );
    assert_eq!(keys(&edges), vec![format!("arn:channel:1:{FLOW_A}")]);
    assert_eq!(edges[0].evidence_str("scheme"), Some("RTP-FEC"));
}

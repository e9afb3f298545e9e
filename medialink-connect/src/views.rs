//! Typed views over resource snapshot bodies.
//!
//! Each category decodes once per run into a small struct holding only the
//! fields the rules read. Every field is optional or defaults to empty, so a
//! partial document still decodes; only a document of the wrong shape (for
//! example a string where an object is expected) is dropped.

use crate::error::{RuleError, RuleResult};
use crate::path::FieldPath;
use crate::pipeline::Pipelined;
use medialink_types::{ResourceId, ResourceSnapshot, ServiceCategory};
use regex_lite::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::ops::Deref;
use std::sync::LazyLock;
use tracing::warn;

/// A category-specific view of a snapshot body.
pub trait ResourceView: DeserializeOwned + Send + Sync + 'static {
    /// Category whose snapshots decode into this view.
    const CATEGORY: ServiceCategory;

    /// Decodes one body. Views with derived fields override this.
    fn decode(body: &Value) -> serde_json::Result<Self> {
        Self::deserialize(body)
    }
}

/// A decoded snapshot: its identity plus its typed view.
#[derive(Debug, Clone)]
pub struct Resource<T> {
    pub id: ResourceId,
    pub view: T,
}

impl<T> Deref for Resource<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.view
    }
}

/// Marks a field as present even when its value is `null`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// Treats an explicit `null` like a missing field.
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// ── Live video ───────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ChannelView {
    pub id: Option<String>,
    /// `Some` whenever the key exists, `Some(None)` for an explicit `null`.
    #[serde(default, deserialize_with = "present")]
    pub channel_class: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub destinations: Vec<ChannelDestination>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ChannelDestination {
    pub id: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub settings: Vec<DestinationSetting>,
    #[serde(default, deserialize_with = "nullable")]
    pub media_package_settings: Vec<MediaPackageSetting>,
    pub multiplex_settings: Option<MultiplexSettings>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DestinationSetting {
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MediaPackageSetting {
    pub channel_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MultiplexSettings {
    pub multiplex_id: Option<String>,
    pub program_name: Option<String>,
}

impl ChannelView {
    /// Every output URL across all destinations, in document order.
    pub fn output_urls(&self) -> impl Iterator<Item = &str> {
        self.destinations
            .iter()
            .flat_map(|d| d.settings.iter())
            .filter_map(|s| s.url.as_deref())
    }
}

impl Pipelined for ChannelView {
    fn channel_class(&self) -> Option<Option<&str>> {
        self.channel_class.as_ref().map(Option::as_deref)
    }

    fn destination_count(&self) -> usize {
        self.destinations.len()
    }
}

impl ResourceView for ChannelView {
    const CATEGORY: ServiceCategory = ServiceCategory::MediaLiveChannel;
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InputView {
    pub id: Option<String>,
    #[serde(rename = "Type")]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub sources: Vec<InputSource>,
    #[serde(default, deserialize_with = "nullable")]
    pub destinations: Vec<InputDestination>,
    #[serde(default, deserialize_with = "nullable")]
    pub attached_channels: Vec<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub input_devices: Vec<InputDeviceRef>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InputSource {
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InputDestination {
    pub ip: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InputDeviceRef {
    pub id: Option<String>,
}

impl InputView {
    pub fn source_urls(&self) -> impl Iterator<Item = &str> {
        self.sources.iter().filter_map(|s| s.url.as_deref())
    }
}

impl ResourceView for InputView {
    const CATEGORY: ServiceCategory = ServiceCategory::MediaLiveInput;
}

static MULTIPLEX_ENTITLEMENTS: LazyLock<FieldPath> = LazyLock::new(|| {
    FieldPath::new()
        .descend()
        .field("Destinations")
        .any_index()
        .field("MediaConnectSettings")
        .field("EntitlementArn")
});

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MultiplexView {
    pub id: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub destinations: Vec<Value>,
    /// Entitlements the multiplex exports to transport flows.
    #[serde(skip)]
    pub entitlement_arns: Vec<String>,
}

impl Pipelined for MultiplexView {
    fn channel_class(&self) -> Option<Option<&str>> {
        None
    }

    fn destination_count(&self) -> usize {
        self.destinations.len()
    }
}

impl ResourceView for MultiplexView {
    const CATEGORY: ServiceCategory = ServiceCategory::MediaLiveMultiplex;

    fn decode(body: &Value) -> serde_json::Result<Self> {
        let mut view = Self::deserialize(body)?;
        view.entitlement_arns = MULTIPLEX_ENTITLEMENTS
            .find_strings(body)
            .into_iter()
            .map(str::to_string)
            .collect();
        Ok(view)
    }
}

// ── Packaging ────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PackagingChannelView {
    pub id: Option<String>,
    pub hls_ingest: Option<HlsIngest>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HlsIngest {
    #[serde(default, deserialize_with = "nullable")]
    pub ingest_endpoints: Vec<IngestEndpoint>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct IngestEndpoint {
    pub url: Option<String>,
}

impl PackagingChannelView {
    pub fn ingest_urls(&self) -> impl Iterator<Item = &str> {
        self.hls_ingest
            .iter()
            .flat_map(|h| h.ingest_endpoints.iter())
            .filter_map(|e| e.url.as_deref())
    }
}

impl ResourceView for PackagingChannelView {
    const CATEGORY: ServiceCategory = ServiceCategory::MediaPackageChannel;
}

static PACKAGE_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+)Package$").expect("static package pattern"));

static KEY_SERVER_URLS: LazyLock<FieldPath> =
    LazyLock::new(|| FieldPath::new().descend().field("SpekeKeyProvider").field("Url"));

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EndpointView {
    pub id: Option<String>,
    pub channel_id: Option<String>,
    pub url: Option<String>,
    pub cmaf_package: Option<CmafPackage>,
    /// Uppercased prefix of the `*Package` field, e.g. `HLS`. Empty if none.
    #[serde(skip)]
    pub package_kind: String,
    /// Key-server URLs referenced anywhere in the endpoint's encryption settings.
    #[serde(skip)]
    pub key_server_urls: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CmafPackage {
    #[serde(default, deserialize_with = "nullable")]
    pub hls_manifests: Vec<HlsManifest>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HlsManifest {
    pub url: Option<String>,
}

impl EndpointView {
    /// URL a viewer actually requests: the first CMAF manifest when the
    /// endpoint packages CMAF, otherwise the endpoint URL.
    pub fn playback_url(&self) -> Option<&str> {
        match &self.cmaf_package {
            Some(cmaf) => cmaf.hls_manifests.first().and_then(|m| m.url.as_deref()),
            None => self.url.as_deref(),
        }
    }
}

impl ResourceView for EndpointView {
    const CATEGORY: ServiceCategory = ServiceCategory::MediaPackageEndpoint;

    fn decode(body: &Value) -> serde_json::Result<Self> {
        let mut view = Self::deserialize(body)?;
        // Object keys iterate sorted; the first package key wins.
        view.package_kind = body
            .as_object()
            .and_then(|map| {
                map.keys().find_map(|key| {
                    PACKAGE_KEY
                        .captures(key)
                        .and_then(|caps| caps.get(1))
                        .map(|m| m.as_str().to_uppercase())
                })
            })
            .unwrap_or_default();
        view.key_server_urls = KEY_SERVER_URLS
            .find_strings(body)
            .into_iter()
            .map(str::to_string)
            .collect();
        Ok(view)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct KeyServerView {
    pub endpoint: Option<String>,
    pub scheme: Option<String>,
}

impl ResourceView for KeyServerView {
    const CATEGORY: ServiceCategory = ServiceCategory::SpekeKeyServer;
}

// ── Storage and delivery ─────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerView {
    pub name: Option<String>,
    pub endpoint: Option<String>,
}

impl ResourceView for ContainerView {
    const CATEGORY: ServiceCategory = ServiceCategory::MediaStoreContainer;
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BucketView {
    pub name: Option<String>,
}

impl ResourceView for BucketView {
    const CATEGORY: ServiceCategory = ServiceCategory::S3Bucket;
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DistributionView {
    pub domain_name: Option<String>,
    pub origins: Option<Origins>,
    #[serde(default, deserialize_with = "nullable")]
    pub tags: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Origins {
    #[serde(default, deserialize_with = "nullable")]
    pub items: Vec<Origin>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Origin {
    pub domain_name: Option<String>,
    pub origin_path: Option<String>,
}

impl DistributionView {
    pub fn origins(&self) -> impl Iterator<Item = &Origin> {
        self.origins.iter().flat_map(|o| o.items.iter())
    }
}

impl ResourceView for DistributionView {
    const CATEGORY: ServiceCategory = ServiceCategory::CloudFrontDistribution;
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PlaybackConfigView {
    pub video_content_source_url: Option<String>,
}

impl ResourceView for PlaybackConfigView {
    const CATEGORY: ServiceCategory = ServiceCategory::MediaTailorConfiguration;
}

// ── Transport ────────────────────────────────────────────────────

static FLOW_SOURCE_ENTITLEMENTS: LazyLock<FieldPath> =
    LazyLock::new(|| FieldPath::new().descend().field("Source").field("EntitlementArn"));

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FlowView {
    pub egress_ip: Option<String>,
    pub source: Option<FlowSource>,
    #[serde(default, deserialize_with = "nullable")]
    pub sources: Vec<FlowSource>,
    #[serde(default, deserialize_with = "nullable")]
    pub outputs: Vec<FlowOutput>,
    #[serde(default, deserialize_with = "nullable")]
    pub entitlements: Vec<FlowEntitlement>,
    pub vpc_interfaces: Option<Vec<Value>>,
    /// VPC interface name to subnet.
    #[serde(default, deserialize_with = "nullable")]
    pub vpc_subnet: BTreeMap<String, String>,
    /// Every `Source.EntitlementArn` found anywhere in the document.
    #[serde(skip)]
    pub source_entitlement_arns: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FlowSource {
    pub entitlement_arn: Option<String>,
    pub ingest_ip: Option<String>,
    pub ingest_port: Option<u32>,
    pub transport: Option<Transport>,
    pub vpc_interface_name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub media_stream_source_configurations: Vec<MediaStreamSourceConfiguration>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Transport {
    pub protocol: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MediaStreamSourceConfiguration {
    #[serde(default, deserialize_with = "nullable")]
    pub input_configurations: Vec<InputConfiguration>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InputConfiguration {
    pub input_ip: Option<String>,
    pub input_port: Option<u32>,
    pub interface: Option<InterfaceRef>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InterfaceRef {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FlowOutput {
    pub destination: Option<String>,
    pub port: Option<u32>,
    pub media_live_input_arn: Option<String>,
    pub transport: Option<Transport>,
    pub vpc_interface_attachment: Option<VpcInterfaceAttachment>,
    #[serde(default, deserialize_with = "nullable")]
    pub media_stream_output_configurations: Vec<MediaStreamOutputConfiguration>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VpcInterfaceAttachment {
    pub vpc_interface_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MediaStreamOutputConfiguration {
    #[serde(default, deserialize_with = "nullable")]
    pub destination_configurations: Vec<DestinationConfiguration>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DestinationConfiguration {
    pub destination_ip: Option<String>,
    pub destination_port: Option<u32>,
    pub interface: Option<InterfaceRef>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FlowEntitlement {
    pub entitlement_arn: Option<String>,
}

impl Transport {
    pub fn protocol(transport: Option<&Self>) -> Option<&str> {
        transport.and_then(|t| t.protocol.as_deref())
    }
}

impl FlowSource {
    pub fn protocol(&self) -> Option<&str> {
        Transport::protocol(self.transport.as_ref())
    }
}

impl FlowOutput {
    pub fn protocol(&self) -> Option<&str> {
        Transport::protocol(self.transport.as_ref())
    }
}

impl FlowView {
    pub fn in_vpc(&self) -> bool {
        self.vpc_interfaces.is_some()
    }

    pub fn subnet(&self, interface: &str) -> Option<&str> {
        self.vpc_subnet.get(interface).map(String::as_str)
    }

    /// Whether this flow grants `arn` to subscribers.
    pub fn exports(&self, arn: &str) -> bool {
        self.entitlements
            .iter()
            .any(|e| e.entitlement_arn.as_deref() == Some(arn))
    }
}

impl ResourceView for FlowView {
    const CATEGORY: ServiceCategory = ServiceCategory::MediaConnectFlow;

    fn decode(body: &Value) -> serde_json::Result<Self> {
        let mut view = Self::deserialize(body)?;
        view.source_entitlement_arns = FLOW_SOURCE_ENTITLEMENTS
            .find_strings(body)
            .into_iter()
            .map(str::to_string)
            .collect();
        Ok(view)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LinkDeviceView {
    pub id: Option<String>,
}

impl ResourceView for LinkDeviceView {
    const CATEGORY: ServiceCategory = ServiceCategory::LinkDevice;
}

// ── Inventory ────────────────────────────────────────────────────

/// Decodes every snapshot of `T::CATEGORY`. Snapshots of other categories
/// and bodies that do not decode are skipped.
pub fn decode_all<T: ResourceView>(snapshots: &[ResourceSnapshot]) -> Vec<Resource<T>> {
    snapshots
        .iter()
        .filter(|s| s.category == T::CATEGORY)
        .filter_map(|s| match T::decode(&s.body) {
            Ok(view) => Some(Resource {
                id: s.identity.clone(),
                view,
            }),
            Err(e) => {
                warn!(identity = %s.identity, category = %T::CATEGORY, "skipping undecodable snapshot: {e}");
                None
            }
        })
        .collect()
}

/// The decoded, read-only resources of one run, keyed by category.
///
/// A category is absent when it could not be loaded; rules that read it
/// fail with [`RuleError::MissingCategory`].
#[derive(Default)]
pub struct Inventory {
    views: HashMap<ServiceCategory, Box<dyn Any + Send + Sync>>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an inventory where every category is present, grouping
    /// `snapshots` by their category.
    pub fn from_snapshots(snapshots: impl IntoIterator<Item = ResourceSnapshot>) -> Self {
        let mut grouped: HashMap<ServiceCategory, Vec<ResourceSnapshot>> = HashMap::new();
        for snapshot in snapshots {
            grouped.entry(snapshot.category).or_default().push(snapshot);
        }
        let mut inventory = Self::new();
        for category in ServiceCategory::ALL {
            let group = grouped.remove(&category).unwrap_or_default();
            inventory.load(category, &group);
        }
        inventory
    }

    /// Decodes and stores one category's snapshots, replacing any previous set.
    pub fn load(&mut self, category: ServiceCategory, snapshots: &[ResourceSnapshot]) {
        let views: Box<dyn Any + Send + Sync> = match category {
            ServiceCategory::MediaLiveChannel => Box::new(decode_all::<ChannelView>(snapshots)),
            ServiceCategory::MediaLiveInput => Box::new(decode_all::<InputView>(snapshots)),
            ServiceCategory::MediaLiveMultiplex => Box::new(decode_all::<MultiplexView>(snapshots)),
            ServiceCategory::MediaPackageChannel => {
                Box::new(decode_all::<PackagingChannelView>(snapshots))
            }
            ServiceCategory::MediaPackageEndpoint => Box::new(decode_all::<EndpointView>(snapshots)),
            ServiceCategory::MediaStoreContainer => Box::new(decode_all::<ContainerView>(snapshots)),
            ServiceCategory::S3Bucket => Box::new(decode_all::<BucketView>(snapshots)),
            ServiceCategory::CloudFrontDistribution => {
                Box::new(decode_all::<DistributionView>(snapshots))
            }
            ServiceCategory::SpekeKeyServer => Box::new(decode_all::<KeyServerView>(snapshots)),
            ServiceCategory::MediaConnectFlow => Box::new(decode_all::<FlowView>(snapshots)),
            ServiceCategory::MediaTailorConfiguration => {
                Box::new(decode_all::<PlaybackConfigView>(snapshots))
            }
            ServiceCategory::LinkDevice => Box::new(decode_all::<LinkDeviceView>(snapshots)),
        };
        self.views.insert(category, views);
    }

    /// The resources of `T::CATEGORY`.
    pub fn get<T: ResourceView>(&self) -> RuleResult<&[Resource<T>]> {
        self.views
            .get(&T::CATEGORY)
            .and_then(|boxed| boxed.downcast_ref::<Vec<Resource<T>>>())
            .map(Vec::as_slice)
            .ok_or(RuleError::MissingCategory(T::CATEGORY))
    }

    /// Number of loaded categories.
    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }
}

impl std::fmt::Debug for Inventory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut categories: Vec<_> = self.views.keys().map(ServiceCategory::as_str).collect();
        categories.sort_unstable();
        f.debug_struct("Inventory")
            .field("categories", &categories)
            .finish()
    }
}

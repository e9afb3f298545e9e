//! Service categories partition the resource cache.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The kind of resource a snapshot describes.
///
/// The string tag is what the collector writes into the cache's category
/// column, so it must stay stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ServiceCategory {
    #[serde(rename = "medialive-channel")]
    MediaLiveChannel,
    #[serde(rename = "medialive-input")]
    MediaLiveInput,
    #[serde(rename = "medialive-multiplex")]
    MediaLiveMultiplex,
    #[serde(rename = "mediapackage-channel")]
    MediaPackageChannel,
    #[serde(rename = "mediapackage-origin-endpoint")]
    MediaPackageEndpoint,
    #[serde(rename = "mediastore-container")]
    MediaStoreContainer,
    #[serde(rename = "s3")]
    S3Bucket,
    #[serde(rename = "cloudfront-distribution")]
    CloudFrontDistribution,
    #[serde(rename = "speke-keyserver")]
    SpekeKeyServer,
    #[serde(rename = "mediaconnect-flow")]
    MediaConnectFlow,
    #[serde(rename = "mediatailor-configuration")]
    MediaTailorConfiguration,
    #[serde(rename = "link-device")]
    LinkDevice,
}

impl ServiceCategory {
    /// Every category, in a fixed order.
    pub const ALL: [ServiceCategory; 12] = [
        Self::MediaLiveChannel,
        Self::MediaLiveInput,
        Self::MediaLiveMultiplex,
        Self::MediaPackageChannel,
        Self::MediaPackageEndpoint,
        Self::MediaStoreContainer,
        Self::S3Bucket,
        Self::CloudFrontDistribution,
        Self::SpekeKeyServer,
        Self::MediaConnectFlow,
        Self::MediaTailorConfiguration,
        Self::LinkDevice,
    ];

    /// Returns the cache tag for this category.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::MediaLiveChannel => "medialive-channel",
            Self::MediaLiveInput => "medialive-input",
            Self::MediaLiveMultiplex => "medialive-multiplex",
            Self::MediaPackageChannel => "mediapackage-channel",
            Self::MediaPackageEndpoint => "mediapackage-origin-endpoint",
            Self::MediaStoreContainer => "mediastore-container",
            Self::S3Bucket => "s3",
            Self::CloudFrontDistribution => "cloudfront-distribution",
            Self::SpekeKeyServer => "speke-keyserver",
            Self::MediaConnectFlow => "mediaconnect-flow",
            Self::MediaTailorConfiguration => "mediatailor-configuration",
            Self::LinkDevice => "link-device",
        }
    }
}

impl fmt::Display for ServiceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceCategory {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| crate::Error::UnknownCategory(s.to_string()))
    }
}

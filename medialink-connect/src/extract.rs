//! Field extractors for URL-shaped references.
//!
//! Resource documents refer to each other through URLs written by different
//! services. These helpers split URLs without normalizing them and recognize
//! the handful of storage and CDN URL forms that identify a bucket or a
//! distribution.

use regex_lite::Regex;
use std::sync::LazyLock;

/// RFC 3986 appendix B, with the authority captured verbatim.
static URL_SPLIT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:([A-Za-z][A-Za-z0-9+.-]*):)?(?://([^/?#]*))?([^?#]*)")
        .expect("static URL pattern")
});

/// A URL split into the components the rules compare.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlParts<'a> {
    /// Lowercased scheme, empty if the URL has none.
    pub scheme: String,
    /// Network location exactly as written (`host`, `host:port`, `user@host`).
    pub netloc: &'a str,
    /// Path exactly as written.
    pub path: &'a str,
}

impl<'a> UrlParts<'a> {
    /// Splits `url`. Never fails on non-empty input; missing pieces are empty.
    pub fn parse(url: &'a str) -> Option<Self> {
        if url.is_empty() {
            return None;
        }
        let caps = URL_SPLIT.captures(url)?;
        Some(Self {
            scheme: caps
                .get(1)
                .map(|m| m.as_str().to_ascii_lowercase())
                .unwrap_or_default(),
            netloc: caps.get(2).map(|m| m.as_str()).unwrap_or(""),
            path: caps.get(3).map(|m| m.as_str()).unwrap_or(""),
        })
    }
}

/// Returns the lowercased scheme of `url`, or an empty string.
pub fn scheme_of(url: &str) -> String {
    UrlParts::parse(url).map(|p| p.scheme).unwrap_or_default()
}

/// Returns the verbatim network location of `url`, or an empty string.
pub fn netloc_of(url: &str) -> &str {
    UrlParts::parse(url).map(|p| p.netloc).unwrap_or("")
}

/// Which URL form identified the referenced resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlStyle {
    /// `http(s)://bucket.s3-website...`
    Website,
    /// `http(s)://s3-region.amazonaws.com/bucket/key`
    PathStyle,
    /// `http(s)://bucket.s3.amazonaws.com/key`
    VirtualHosted,
    /// `http(s)://bucket.s3-region.amazonaws.com`
    RegionalVirtualHosted,
    /// `s3://bucket/...`
    BucketScheme,
    /// `s3ssl://bucket/...`
    SslBucketScheme,
    /// `http(s)://dxxxx.cloudfront.net/...`
    CdnDomain,
}

impl UrlStyle {
    /// Whether this style names an object-storage bucket.
    #[must_use]
    pub const fn is_bucket(&self) -> bool {
        !matches!(self, Self::CdnDomain)
    }
}

/// A resource name recognized inside a URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlReference {
    /// Bucket name or distribution domain.
    pub name: String,
    /// Lowercased scheme of the URL.
    pub scheme: String,
    pub style: UrlStyle,
}

static URL_FORMS: LazyLock<Vec<(UrlStyle, Regex)>> = LazyLock::new(|| {
    [
        (UrlStyle::Website, r"^http.?://(\S+)\.s3-website.+"),
        (UrlStyle::PathStyle, r"^http.?://s3-\S+\.amazonaws\.com/([^/]+)/.+"),
        (UrlStyle::VirtualHosted, r"^http.?://(\S+)\.s3\.amazonaws\.com/.+"),
        (UrlStyle::RegionalVirtualHosted, r"^http.?://(\S+)\.s3-(\S+)\.amazonaws\.com"),
        (UrlStyle::BucketScheme, r"^s3://([^/]+)"),
        (UrlStyle::SslBucketScheme, r"^s3ssl://([^/]+)"),
        (UrlStyle::CdnDomain, r"^http.?://(\S+\.cloudfront\.net)/.*"),
    ]
    .into_iter()
    .map(|(style, pattern)| (style, Regex::new(pattern).expect("static URL form")))
    .collect()
});

/// Recognizes a bucket or CDN domain in `url`. The first matching form wins.
pub fn classify_url(url: &str) -> Option<UrlReference> {
    URL_FORMS.iter().find_map(|(style, re)| {
        re.captures(url).and_then(|caps| {
            caps.get(1).map(|name| UrlReference {
                name: name.as_str().to_string(),
                scheme: scheme_of(url),
                style: *style,
            })
        })
    })
}

/// Bucket name of `url` if it is any of the bucket forms.
pub fn bucket_reference(url: &str) -> Option<UrlReference> {
    classify_url(url).filter(|r| r.style.is_bucket())
}

/// Distribution domain of `url` if it is a CDN URL.
pub fn cdn_reference(url: &str) -> Option<UrlReference> {
    classify_url(url).filter(|r| r.style == UrlStyle::CdnDomain)
}

static S3_ORIGIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\S+)\.s3([^.])*\.amazonaws\.com").expect("static origin pattern")
});

/// Bucket name of a CDN origin domain such as `bucket.s3.amazonaws.com`.
pub fn origin_bucket(domain_name: &str) -> Option<&str> {
    S3_ORIGIN
        .captures(domain_name)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Rewrites a legacy packaging ingest URL into its current form.
///
/// `scheme://host/in/v1/UID/rest` becomes `scheme://host/in/v2/UID/UID/channel`.
/// Only paths with exactly five `/`-separated pieces qualify.
pub fn current_ingest_url(url: &str) -> Option<String> {
    let parts = UrlParts::parse(url)?;
    if !parts.path.starts_with("/in/v1/") {
        return None;
    }
    let pieces: Vec<&str> = parts.path.split('/').collect();
    if pieces.len() != 5 {
        return None;
    }
    let uid = pieces[3];
    Some(format!(
        "{}://{}/in/v2/{uid}/{uid}/channel",
        parts.scheme, parts.netloc
    ))
}

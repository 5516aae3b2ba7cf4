//! Translation between externally facing URLs and storage keys.
//!
//! Both functions are pure: the same inputs always yield the same output,
//! and nothing here touches the network or the store.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

use crate::types::MappedKey;
use crate::types::error::S3batchError;

/// Host suffixes recognised in source URLs when none are configured.
pub const DEFAULT_HOST_SUFFIXES: [&str; 2] = [".com", ".net"];

const PRODUCTION_ENVIRONMENT: &str = "production";

// Characters left as-is in access URLs: alphanumerics plus `/-_.~!*'()+`.
const ACCESS_URL_ESCAPE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'!')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')')
    .remove(b'+');

/// Public addressing of a bucket in one environment.
///
/// ```
/// use s3batch_rs::key_mapper::PublicEndpoints;
///
/// let endpoints = PublicEndpoints::new("bucket", "region", None, "staging");
/// assert_eq!(endpoints.origin(), "https://bucket.s3.region.amazonaws.com");
/// assert_eq!(endpoints.delimiter(), "bucket.s3.region.amazonaws.com/");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PublicEndpoints {
    pub bucket: String,
    pub region: String,
    pub cdn_domain: Option<String>,
    pub environment: String,
}

impl PublicEndpoints {
    pub fn new(
        bucket: impl Into<String>,
        region: impl Into<String>,
        cdn_domain: Option<String>,
        environment: impl Into<String>,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            region: region.into(),
            cdn_domain,
            environment: environment.into(),
        }
    }

    /// Virtual-hosted style host of the bucket.
    pub fn bucket_host(&self) -> String {
        format!("{}.s3.{}.amazonaws.com", self.bucket, self.region)
    }

    /// Origin substituted into source URLs.
    pub fn origin(&self) -> String {
        format!("https://{}", self.bucket_host())
    }

    /// Separator between the origin and the storage key.
    pub fn delimiter(&self) -> String {
        format!("{}/", self.bucket_host())
    }

    pub fn is_production(&self) -> bool {
        self.environment == PRODUCTION_ENVIRONMENT
    }
}

/// Map a public source URL onto a storage key.
///
/// The `http(s)://host` prefix is replaced by `origin` when the host ends in
/// one of `host_suffixes`. The longest such prefix inside the host wins, and a
/// URL with no matching prefix is left untouched. The rewritten URL is then
/// percent-decoded and split on the first `delimiter`; everything after it is
/// the key. Only a missing delimiter is an error.
///
/// ```
/// use s3batch_rs::key_mapper::map_source_url;
///
/// let mapped = map_source_url(
///     "https://example.com/a/b.png",
///     "https://bucket.s3.region.amazonaws.com",
///     "bucket.s3.region.amazonaws.com/",
///     &[".com".to_string(), ".net".to_string()],
/// )
/// .unwrap();
///
/// assert_eq!(mapped.key, "a/b.png");
/// assert_eq!(mapped.url, "https://bucket.s3.region.amazonaws.com/a/b.png");
/// ```
pub fn map_source_url(
    raw_url: &str,
    origin: &str,
    delimiter: &str,
    host_suffixes: &[String],
) -> Result<MappedKey, S3batchError> {
    let url = rewrite_origin(raw_url, origin, host_suffixes);

    // Invalid UTF-8 escapes become U+FFFD.
    let decoded_bytes = urlencoding::decode_binary(url.as_bytes());
    let decoded = String::from_utf8_lossy(&decoded_bytes);

    // An empty key is kept; the item then fails on its own.
    let Some((_, key)) = decoded.split_once(delimiter) else {
        return Err(S3batchError::Mapping(format!(
            "{raw_url}: delimiter '{delimiter}' not found"
        )));
    };

    Ok(MappedKey {
        key: key.to_string(),
        url,
    })
}

/// Replace the scheme and host of `raw_url` with `origin`.
pub fn rewrite_origin(raw_url: &str, origin: &str, host_suffixes: &[String]) -> String {
    let Some(scheme_len) = ["https://", "http://"]
        .iter()
        .find(|scheme| raw_url.starts_with(*scheme))
        .map(|scheme| scheme.len())
    else {
        return raw_url.to_string();
    };

    let rest = &raw_url[scheme_len..];
    let host_run = rest.find('/').map_or(rest, |end| &rest[..end]);

    // At least one host character must precede the suffix.
    let host_end = host_suffixes
        .iter()
        .filter(|suffix| !suffix.is_empty())
        .filter_map(|suffix| {
            host_run
                .rfind(suffix.as_str())
                .filter(|start| *start > 0)
                .map(|start| start + suffix.len())
        })
        .max();

    match host_end {
        Some(end) => format!("{origin}{}", &rest[end..]),
        None => raw_url.to_string(),
    }
}

/// Public URL under which an uploaded object is served.
///
/// Production always prefers the CDN domain; every other environment uses
/// the bucket-native domain.
pub fn create_access_url(key: &str, endpoints: &PublicEndpoints) -> String {
    let encoded_key = utf8_percent_encode(key, ACCESS_URL_ESCAPE_SET).to_string();

    match (&endpoints.cdn_domain, endpoints.is_production()) {
        (Some(cdn_domain), true) => format!("https://{cdn_domain}/{encoded_key}"),
        _ => format!("https://{}/{encoded_key}", endpoints.bucket_host()),
    }
}

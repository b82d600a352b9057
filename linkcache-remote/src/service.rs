use crate::error::{FetchError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// Query parameter carrying the client version on every batch request.
pub const VERSION_QUERY_PARAM: &str = "addon_version";

pub const DEFAULT_EMBEDLY_ENDPOINT: &str = "https://embedly-proxy.services.mozilla.com/v2/extract";
pub const DEFAULT_METADATA_ENDPOINT: &str = "https://metadata.dev.mozaws.net/v1/metadata";

/// The remote services able to answer a metadata batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetadataService {
    #[default]
    Embedly,
    MetadataService,
}

impl MetadataService {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetadataService::Embedly => "Embedly",
            MetadataService::MetadataService => "MetadataService",
        }
    }

    /// Maps a configured service name onto a service. Unknown names map to
    /// the default service.
    pub fn from_name(name: &str) -> Self {
        match name {
            "MetadataService" => MetadataService::MetadataService,
            "Embedly" => MetadataService::Embedly,
            _ => MetadataService::default(),
        }
    }

    pub fn default_endpoint(&self) -> &'static str {
        match self {
            MetadataService::Embedly => DEFAULT_EMBEDLY_ENDPOINT,
            MetadataService::MetadataService => DEFAULT_METADATA_ENDPOINT,
        }
    }
}

impl fmt::Display for MetadataService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Builds the request URL for a service: the configured base plus the
/// client version tag.
pub fn versioned_endpoint(base: &str, version: &str) -> Result<Url> {
    let mut url = Url::parse(base)
        .map_err(|e| FetchError::InvalidEndpoint(format!("{}: {}", base, e)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(FetchError::InvalidEndpoint(format!(
            "{}: unsupported scheme {}",
            base,
            url.scheme()
        )));
    }
    url.query_pairs_mut()
        .append_pair(VERSION_QUERY_PARAM, version);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_name() {
        assert_eq!(MetadataService::from_name("Embedly"), MetadataService::Embedly);
        assert_eq!(
            MetadataService::from_name("MetadataService"),
            MetadataService::MetadataService
        );
        assert_eq!(MetadataService::from_name("garbagePref"), MetadataService::Embedly);
        assert_eq!(MetadataService::from_name(""), MetadataService::Embedly);
    }

    #[test]
    fn test_versioned_endpoint() {
        let url = versioned_endpoint("http://localhost:8089/embedlyLinkData", "1.2.3").unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8089/embedlyLinkData?addon_version=1.2.3"
        );
    }

    #[test]
    fn test_versioned_endpoint_rejects_garbage() {
        assert!(versioned_endpoint("not a url", "1.0").is_err());
        assert!(versioned_endpoint("ftp://example.com/data", "1.0").is_err());
    }
}

//! Configuration for the preview pipeline

use linkcache_remote::MetadataService;
use linkcache_remote::service::{DEFAULT_EMBEDLY_ENDPOINT, DEFAULT_METADATA_ENDPOINT};
use serde::{Deserialize, Serialize};

/// Three days.
pub const DEFAULT_METADATA_TTL_SECS: u64 = 3 * 24 * 60 * 60;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Settings handed to [`crate::provider::PreviewProvider`] at construction.
///
/// Field names on the wire match the host's preference keys, so a
/// preferences dump can be deserialized directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    /// Name of the remote service to use; unknown names select Embedly
    #[serde(rename = "metadataSource")]
    pub metadata_source: String,
    #[serde(rename = "embedly.endpoint")]
    pub embedly_endpoint: String,
    #[serde(rename = "metadata.endpoint")]
    pub metadata_endpoint: String,
    /// When false, links pass through untouched and nothing is fetched
    #[serde(rename = "previews.enabled")]
    pub previews_enabled: bool,
    /// Enrollment in the metadata service experiment overrides `metadataSource`
    #[serde(rename = "experiments.metadataService")]
    pub metadata_service_experiment: bool,
    /// Table domains whose icon and color beat the remote service's.
    /// `None` means every domain in the table with both an icon and a color.
    #[serde(rename = "tippytop.overrides", skip_serializing_if = "Option::is_none")]
    pub tippytop_overrides: Option<Vec<String>>,
    /// Sent as `addon_version` on every batch request
    pub client_version: String,
    pub metadata_ttl_secs: u64,
    /// 0 disables the request timeout
    pub request_timeout_secs: u64,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            metadata_source: MetadataService::Embedly.as_str().to_string(),
            embedly_endpoint: DEFAULT_EMBEDLY_ENDPOINT.to_string(),
            metadata_endpoint: DEFAULT_METADATA_ENDPOINT.to_string(),
            previews_enabled: true,
            metadata_service_experiment: false,
            tippytop_overrides: None,
            client_version: env!("CARGO_PKG_VERSION").to_string(),
            metadata_ttl_secs: DEFAULT_METADATA_TTL_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl PreviewConfig {
    /// The service batches are sent to.
    pub fn service(&self) -> MetadataService {
        if self.metadata_service_experiment {
            MetadataService::MetadataService
        } else {
            MetadataService::from_name(&self.metadata_source)
        }
    }

    /// Base endpoint of the selected service, before the version tag.
    pub fn endpoint_base(&self) -> &str {
        match self.service() {
            MetadataService::Embedly => &self.embedly_endpoint,
            MetadataService::MetadataService => &self.metadata_endpoint,
        }
    }

    /// Whether `domain` may override remote icons, given that the table has
    /// complete data for it.
    pub fn allows_tippytop_override(&self, domain: &str) -> bool {
        match &self.tippytop_overrides {
            None => true,
            Some(domains) => domains.iter().any(|d| d.eq_ignore_ascii_case(domain)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let config = PreviewConfig::default();
        assert_eq!(config.service(), MetadataService::Embedly);
        assert_eq!(config.endpoint_base(), DEFAULT_EMBEDLY_ENDPOINT);
        assert!(config.previews_enabled);
    }

    #[test]
    fn test_preference_keys() {
        let config: PreviewConfig = serde_json::from_value(json!({
            "metadataSource": "MetadataService",
            "embedly.endpoint": "http://localhost:8089/embedlyLinkData",
            "metadata.endpoint": "http://localhost:8089/metadataServiceLinkData",
            "previews.enabled": false
        }))
        .unwrap();

        assert_eq!(config.service(), MetadataService::MetadataService);
        assert_eq!(config.endpoint_base(), "http://localhost:8089/metadataServiceLinkData");
        assert!(!config.previews_enabled);
        assert_eq!(config.metadata_ttl_secs, DEFAULT_METADATA_TTL_SECS);
    }

    #[test]
    fn test_unknown_source_falls_back_to_embedly() {
        let config = PreviewConfig {
            metadata_source: "garbagePref".to_string(),
            embedly_endpoint: "http://localhost:8089/embedlyLinkData".to_string(),
            ..PreviewConfig::default()
        };
        assert_eq!(config.service(), MetadataService::Embedly);
        assert_eq!(config.endpoint_base(), "http://localhost:8089/embedlyLinkData");
    }

    #[test]
    fn test_experiment_forces_metadata_service() {
        let config = PreviewConfig {
            metadata_service_experiment: true,
            ..PreviewConfig::default()
        };
        assert_eq!(config.service(), MetadataService::MetadataService);
    }

    #[test]
    fn test_override_list() {
        let mut config = PreviewConfig::default();
        assert!(config.allows_tippytop_override("youtube.com"));

        config.tippytop_overrides = Some(vec!["YouTube.com".to_string()]);
        assert!(config.allows_tippytop_override("youtube.com"));
        assert!(!config.allows_tippytop_override("amazon.com"));
    }
}

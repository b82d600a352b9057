use chrono::{DateTime, Utc};
use linkcache_remote::MetadataService;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// A history or bookmark entry handed in by the host.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Link {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_visit_date: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frecency: Option<i64>,
    /// Favicon blob as a data URI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favicon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bookmark_date_created: Option<i64>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub link_type: Option<String>,
}

impl Link {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq)]
pub struct SanitizedLink {
    pub link: Link,
    pub sanitized_url: String,
    pub cache_key: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetadataSource {
    Embedly,
    MetadataService,
    TippyTopProvider,
}

impl MetadataSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetadataSource::Embedly => "Embedly",
            MetadataSource::MetadataService => "MetadataService",
            MetadataSource::TippyTopProvider => "TippyTopProvider",
        }
    }
}

impl From<MetadataService> for MetadataSource {
    fn from(service: MetadataService) -> Self {
        match service {
            MetadataService::Embedly => MetadataSource::Embedly,
            MetadataService::MetadataService => MetadataSource::MetadataService,
        }
    }
}

impl fmt::Display for MetadataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetadataSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Embedly" => Ok(MetadataSource::Embedly),
            "MetadataService" => Ok(MetadataSource::MetadataService),
            "TippyTopProvider" => Ok(MetadataSource::TippyTopProvider),
            other => Err(format!("unknown metadata source: {}", other)),
        }
    }
}

/// Persisted metadata for one cache key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub cache_key: String,
    pub url: String,
    pub sanitized_url: String,
    pub metadata_source: MetadataSource,
    pub favicon_url: Option<String>,
    pub background_color: Option<String>,
    /// Service-specific fields (title, description, images, ...).
    pub fields: Map<String, Value>,
    pub expired_at: DateTime<Utc>,
}

impl MetadataRecord {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expired_at <= now
    }

    pub fn title(&self) -> Option<&str> {
        self.fields.get("title").and_then(Value::as_str)
    }
}

/// A link as returned to the host: the live link plus whatever metadata the
/// cache, the remote service and the fallback table could contribute.
///
/// Service fields that do not map onto a named field are flattened into the
/// top level next to the link's own fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnhancedLink {
    #[serde(flatten)]
    pub link: Link,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sanitized_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata_source: Option<MetadataSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favicon_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub has_metadata: bool,
    /// Never holds a key that names one of the fields above.
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

/// JSON keys of [`EnhancedLink`]'s named fields, including the flattened
/// [`Link`]'s.
pub const ENHANCED_LINK_KEYS: &[&str] = &[
    "url",
    "title",
    "lastVisitDate",
    "frecency",
    "favicon",
    "bookmarkDateCreated",
    "type",
    "sanitized_url",
    "cache_key",
    "metadata_source",
    "favicon_url",
    "background_color",
    "has_metadata",
];

fn is_false(value: &bool) -> bool {
    !*value
}

impl From<Link> for EnhancedLink {
    fn from(link: Link) -> Self {
        Self {
            link,
            ..Self::default()
        }
    }
}

//! Layered merge of fallback, stored and live link data.
//!
//! Layers apply low to high priority in [`MERGE_ORDER`]. Record fields win
//! over the caller's link except for [`LIVE_FIELDS`], which always come from
//! the live input. The one exception going the other way is
//! [`FALLBACK_OVERRIDE_FIELDS`]: for table domains allowed to override, the
//! fallback's values for those fields survive the metadata layer.

use crate::model::{
    ENHANCED_LINK_KEYS, EnhancedLink, MetadataRecord, MetadataSource, SanitizedLink,
};
use crate::tippytop::FallbackData;
use chrono::{DateTime, Utc};
use linkcache_remote::ServiceFields;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeLayer {
    /// Bundled icon table
    Fallback,
    /// Stored or freshly fetched record
    Metadata,
    /// Fields handed in by the caller on this call
    LiveInput,
}

pub const MERGE_ORDER: [MergeLayer; 3] =
    [MergeLayer::Fallback, MergeLayer::Metadata, MergeLayer::LiveInput];

pub const FALLBACK_OVERRIDE_FIELDS: &[&str] = &["favicon_url", "background_color"];

/// Link fields taken from the caller on every call, whatever the record says.
pub const LIVE_FIELDS: &[&str] =
    &["url", "lastVisitDate", "bookmarkDateCreated", "frecency", "type"];

pub struct MergeInputs<'a> {
    pub link: &'a SanitizedLink,
    pub fallback: &'a FallbackData,
    pub record: Option<&'a MetadataRecord>,
    /// Whether the fallback may beat the record on the override fields
    pub fallback_overrides: bool,
}

pub fn assemble(inputs: &MergeInputs<'_>) -> EnhancedLink {
    let mut enhanced = EnhancedLink::default();
    for layer in MERGE_ORDER {
        match layer {
            MergeLayer::Fallback => apply_fallback(&mut enhanced, inputs.fallback),
            MergeLayer::Metadata => {
                if let Some(record) = inputs.record {
                    apply_record(&mut enhanced, record, inputs.fallback_overrides);
                }
            }
            MergeLayer::LiveInput => apply_live(&mut enhanced, inputs.link),
        }
    }
    enhanced
}

fn apply_fallback(enhanced: &mut EnhancedLink, fallback: &FallbackData) {
    enhanced.favicon_url = fallback.favicon_url.clone();
    enhanced.background_color = fallback.background_color.clone();
    enhanced.metadata_source = Some(fallback.metadata_source);
}

fn apply_record(enhanced: &mut EnhancedLink, record: &MetadataRecord, fallback_overrides: bool) {
    let keeps_fallback = |field: &str| fallback_overrides && FALLBACK_OVERRIDE_FIELDS.contains(&field);

    if !keeps_fallback("favicon_url")
        && let Some(favicon_url) = non_empty(record.favicon_url.as_deref())
    {
        enhanced.favicon_url = Some(favicon_url.to_string());
    }
    if !keeps_fallback("background_color")
        && let Some(color) = non_empty(record.background_color.as_deref())
    {
        enhanced.background_color = Some(color.to_string());
    }

    if let Some(title) = non_empty(record.title()) {
        enhanced.link.title = Some(title.to_string());
    }
    if let Some(favicon) = non_empty(record.fields.get("favicon").and_then(Value::as_str)) {
        enhanced.link.favicon = Some(favicon.to_string());
    }

    enhanced.metadata_source = Some(record.metadata_source);
    enhanced.metadata = record
        .fields
        .iter()
        .filter(|(key, _)| !ENHANCED_LINK_KEYS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    enhanced.has_metadata = true;
}

fn apply_live(enhanced: &mut EnhancedLink, link: &SanitizedLink) {
    let live = &link.link;
    enhanced.link.url = live.url.clone();
    enhanced.link.last_visit_date = live.last_visit_date;
    enhanced.link.bookmark_date_created = live.bookmark_date_created;
    enhanced.link.frecency = live.frecency;
    enhanced.link.link_type = live.link_type.clone();

    // Everything else only fills what the record left empty
    if enhanced.link.title.is_none() {
        enhanced.link.title = live.title.clone();
    }
    if enhanced.link.favicon.is_none() {
        enhanced.link.favicon = live.favicon.clone();
    }

    enhanced.sanitized_url = Some(link.sanitized_url.clone());
    enhanced.cache_key = Some(link.cache_key.clone());
}

/// Builds the record persisted for a fetched link. The service's icon and
/// color win unless empty, in which case the fallback fills them.
pub fn record_from_service(
    link: &SanitizedLink,
    mut fields: ServiceFields,
    source: MetadataSource,
    fallback: &FallbackData,
    expired_at: DateTime<Utc>,
) -> MetadataRecord {
    let favicon_url = take_string(&mut fields, "favicon_url").or_else(|| fallback.favicon_url.clone());
    let background_color =
        take_string(&mut fields, "background_color").or_else(|| fallback.background_color.clone());

    MetadataRecord {
        cache_key: link.cache_key.clone(),
        url: link.link.url.clone(),
        sanitized_url: link.sanitized_url.clone(),
        metadata_source: source,
        favicon_url,
        background_color,
        fields,
        expired_at,
    }
}

fn take_string(fields: &mut ServiceFields, key: &str) -> Option<String> {
    match fields.remove(key) {
        Some(Value::String(value)) if !value.trim().is_empty() => Some(value),
        _ => None,
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Link;
    use serde_json::json;

    fn sanitized(url: &str) -> SanitizedLink {
        SanitizedLink {
            link: Link {
                url: url.to_string(),
                last_visit_date: Some(1459537019061),
                ..Link::default()
            },
            sanitized_url: url.to_string(),
            cache_key: crate::sanitize::derive_cache_key(url),
        }
    }

    fn fallback(favicon: Option<&str>, color: Option<&str>) -> FallbackData {
        FallbackData {
            favicon_url: favicon.map(str::to_string),
            background_color: color.map(str::to_string),
            metadata_source: MetadataSource::TippyTopProvider,
        }
    }

    fn fields(value: serde_json::Value) -> ServiceFields {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_fallback_only() {
        let link = sanitized("http://www.youtube.com/");
        let fallback = fallback(Some("tt.png"), Some("#DB4338"));
        let enhanced = assemble(&MergeInputs {
            link: &link,
            fallback: &fallback,
            record: None,
            fallback_overrides: true,
        });

        assert_eq!(enhanced.metadata_source, Some(MetadataSource::TippyTopProvider));
        assert_eq!(enhanced.favicon_url.as_deref(), Some("tt.png"));
        assert!(!enhanced.has_metadata);
        assert_eq!(enhanced.link, link.link);
    }

    #[test]
    fn test_service_wins_unless_overridden() {
        let link = sanitized("http://www.youtube.com/");
        let fallback = fallback(Some("tt.png"), Some("#DB4338"));
        let record = record_from_service(
            &link,
            fields(json!({"favicon_url": "https://badicon.com", "background_color": "#BADCOLR", "title": "YT"})),
            MetadataSource::Embedly,
            &fallback,
            Utc::now(),
        );

        let plain = assemble(&MergeInputs {
            link: &link,
            fallback: &fallback,
            record: Some(&record),
            fallback_overrides: false,
        });
        assert_eq!(plain.favicon_url.as_deref(), Some("https://badicon.com"));
        assert_eq!(plain.background_color.as_deref(), Some("#BADCOLR"));

        let overridden = assemble(&MergeInputs {
            link: &link,
            fallback: &fallback,
            record: Some(&record),
            fallback_overrides: true,
        });
        assert_eq!(overridden.favicon_url.as_deref(), Some("tt.png"));
        assert_eq!(overridden.background_color.as_deref(), Some("#DB4338"));
        assert_eq!(overridden.metadata_source, Some(MetadataSource::Embedly));
        assert_eq!(overridden.link.title.as_deref(), Some("YT"));
        assert!(!overridden.metadata.contains_key("title"));
    }

    #[test]
    fn test_fallback_fills_empty_service_fields() {
        let link = sanitized("http://example.com/");
        let fallback = fallback(Some("tt.png"), Some("#FFF"));
        let record = record_from_service(
            &link,
            fields(json!({"favicon_url": "", "title": "Example"})),
            MetadataSource::MetadataService,
            &fallback,
            Utc::now(),
        );

        assert_eq!(record.favicon_url.as_deref(), Some("tt.png"));
        assert_eq!(record.background_color.as_deref(), Some("#FFF"));
        assert!(!record.fields.contains_key("favicon_url"));
        assert_eq!(record.title(), Some("Example"));
    }

    #[test]
    fn test_live_fields_win_over_record() {
        let mut link = sanitized("http://example.com/");
        link.link.title = Some("Live title".to_string());
        link.link.frecency = Some(2000);
        let fallback = fallback(None, None);
        let mut record = record_from_service(
            &link,
            fields(json!({"lastVisitDate": 1, "frecency": 5, "title": "Fetched title", "description": "d"})),
            MetadataSource::Embedly,
            &fallback,
            Utc::now(),
        );
        record.url = "http://stale.example.com/".to_string();

        let enhanced = assemble(&MergeInputs {
            link: &link,
            fallback: &fallback,
            record: Some(&record),
            fallback_overrides: false,
        });
        assert_eq!(enhanced.link.last_visit_date, Some(1459537019061));
        assert_eq!(enhanced.link.frecency, Some(2000));
        assert_eq!(enhanced.link.url, "http://example.com/");
        assert_eq!(enhanced.link.title.as_deref(), Some("Fetched title"));
        assert_eq!(enhanced.metadata["description"], "d");
        assert!(!enhanced.metadata.contains_key("lastVisitDate"));
    }

    #[test]
    fn test_live_title_fills_missing_record_title() {
        let mut link = sanitized("http://example.com/");
        link.link.title = Some("Live title".to_string());
        let fallback = fallback(None, None);
        let record = record_from_service(
            &link,
            fields(json!({"description": "d"})),
            MetadataSource::Embedly,
            &fallback,
            Utc::now(),
        );

        let enhanced = assemble(&MergeInputs {
            link: &link,
            fallback: &fallback,
            record: Some(&record),
            fallback_overrides: false,
        });
        assert_eq!(enhanced.link.title.as_deref(), Some("Live title"));
    }

    #[test]
    fn test_service_fields_serialize_at_top_level() {
        let link = sanitized("http://example.com/");
        let fallback = fallback(None, None);
        let record = record_from_service(
            &link,
            fields(json!({"title": "Fetched title", "description": "d"})),
            MetadataSource::Embedly,
            &fallback,
            Utc::now(),
        );

        let enhanced = assemble(&MergeInputs {
            link: &link,
            fallback: &fallback,
            record: Some(&record),
            fallback_overrides: false,
        });
        let value = serde_json::to_value(&enhanced).unwrap();
        assert_eq!(value["title"], "Fetched title");
        assert_eq!(value["description"], "d");
        assert_eq!(value["cache_key"], "example.com/");
        assert_eq!(value["lastVisitDate"], 1459537019061i64);
        assert!(value.get("metadata").is_none());
    }
}

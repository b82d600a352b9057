//! Bundled favicon and background color table for popular sites.

use crate::model::MetadataSource;
use serde::Deserialize;
use std::collections::HashMap;
use url::Url;

const TIPPYTOP_TABLE: &str = include_str!("../data/tippytop.json");

/// Prefix the table's relative image paths resolve against.
pub const TIPPYTOP_IMAGE_ROOT: &str = "resource://linkcache/tippytop/";

#[derive(Debug, Clone, Deserialize)]
struct TableEntry {
    domain: String,
    image_url: Option<String>,
    background_color: Option<String>,
}

/// What the fallback table knows about a link.
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackData {
    pub favicon_url: Option<String>,
    pub background_color: Option<String>,
    pub metadata_source: MetadataSource,
}

impl FallbackData {
    fn empty() -> Self {
        Self {
            favicon_url: None,
            background_color: None,
            metadata_source: MetadataSource::TippyTopProvider,
        }
    }

    /// True when the table supplies both an icon and a color.
    pub fn is_complete(&self) -> bool {
        self.favicon_url.is_some() && self.background_color.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct TippyTopProvider {
    sites: HashMap<String, TableEntry>,
}

impl TippyTopProvider {
    /// Loads the table shipped with the crate.
    pub fn bundled() -> Result<Self, serde_json::Error> {
        Self::from_json(TIPPYTOP_TABLE)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let entries: Vec<TableEntry> = serde_json::from_str(json)?;
        let sites = entries
            .into_iter()
            .map(|entry| (entry.domain.to_ascii_lowercase(), entry))
            .collect();
        Ok(Self { sites })
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    /// The table domain `url` resolves to, if any. The most specific domain
    /// wins: `m.youtube.com` falls back to `youtube.com`.
    pub fn matching_domain(&self, url: &str) -> Option<&str> {
        self.lookup(url).map(|entry| entry.domain.as_str())
    }

    fn lookup(&self, url: &str) -> Option<&TableEntry> {
        let parsed = Url::parse(url).ok()?;
        let host = parsed.host_str()?.to_ascii_lowercase();
        let mut candidate = host.strip_prefix("www.").unwrap_or(&host);

        loop {
            if let Some(entry) = self.sites.get(candidate) {
                return Some(entry);
            }
            match candidate.split_once('.') {
                Some((_, parent)) if parent.contains('.') => candidate = parent,
                _ => return None,
            }
        }
    }

    /// Icon and color for `url`; empty fields, still tagged, on no match.
    pub fn resolve(&self, url: &str) -> FallbackData {
        let Some(entry) = self.lookup(url) else {
            return FallbackData::empty();
        };

        FallbackData {
            favicon_url: entry
                .image_url
                .as_ref()
                .filter(|u| !u.is_empty())
                .map(|u| resolve_image_url(u)),
            background_color: entry.background_color.clone().filter(|c| !c.is_empty()),
            metadata_source: MetadataSource::TippyTopProvider,
        }
    }
}

fn resolve_image_url(image_url: &str) -> String {
    if image_url.contains("://") {
        image_url.to_string()
    } else {
        format!("{}{}", TIPPYTOP_IMAGE_ROOT, image_url.trim_start_matches('/'))
    }
}

use crate::model::{Link, SanitizedLink};
use crate::sanitize::{derive_cache_key, sanitize_url};
use std::collections::HashSet;
use tracing::debug;

/// Sanitizes a link and derives its key. `None` when the URL is blank or
/// does not parse.
pub fn sanitize_link(link: &Link) -> Option<SanitizedLink> {
    let sanitized_url = match sanitize_url(&link.url) {
        Ok(url) if !url.is_empty() => url,
        Ok(_) => return None,
        Err(e) => {
            debug!("Skipping unparseable url {:?}: {}", link.url, e);
            return None;
        }
    };
    let cache_key = derive_cache_key(&sanitized_url);
    if cache_key.is_empty() {
        return None;
    }

    Some(SanitizedLink {
        link: link.clone(),
        sanitized_url,
        cache_key,
    })
}

/// One link per cache key, keeping the first seen in its original form.
pub fn unique_links(links: &[Link]) -> Vec<Link> {
    unique_sanitized_links(links)
        .into_iter()
        .map(|sanitized| sanitized.link)
        .collect()
}

pub(crate) fn unique_sanitized_links(links: &[Link]) -> Vec<SanitizedLink> {
    let mut seen = HashSet::new();
    links
        .iter()
        .filter_map(sanitize_link)
        .filter(|sanitized| seen.insert(sanitized.cache_key.clone()))
        .collect()
}

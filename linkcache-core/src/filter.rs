// Link admission rules applied before any sanitizing or lookup

use crate::model::Link;
use std::fmt;
use std::sync::Arc;
use url::Url;

pub const ALLOWED_PROTOCOLS: &[&str] = &["http", "https"];
pub const DISALLOWED_HOSTS: &[&str] = &["localhost", "127.0.0.1", "0.0.0.0"];

/// A single admission rule. Returning false rejects the link.
pub type UrlRule = Arc<dyn Fn(&Link) -> bool + Send + Sync>;

/// An ordered chain of rules; a link passes only if every rule passes.
#[derive(Clone)]
pub struct LinkFilter {
    rules: Vec<UrlRule>,
}

impl LinkFilter {
    pub fn allows(&self, link: &Link) -> bool {
        self.rules.iter().all(|rule| rule(link))
    }

    /// Returns the passing links, unchanged and in order.
    pub fn apply(&self, links: &[Link]) -> Vec<Link> {
        links.iter().filter(|link| self.allows(link)).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Default for LinkFilter {
    fn default() -> Self {
        build_filter(default_rules())
    }
}

impl fmt::Debug for LinkFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkFilter")
            .field("rules", &self.rules.len())
            .finish()
    }
}

/// Wraps a closure as a [`UrlRule`].
pub fn rule<F>(f: F) -> UrlRule
where
    F: Fn(&Link) -> bool + Send + Sync + 'static,
{
    Arc::new(f)
}

pub fn build_filter(rules: Vec<UrlRule>) -> LinkFilter {
    LinkFilter { rules }
}

/// Present, parseable, http(s) and not pointing at the local machine.
pub fn default_rules() -> Vec<UrlRule> {
    vec![
        rule(|link: &Link| !link.url.trim().is_empty()),
        rule(|link: &Link| Url::parse(&link.url).is_ok()),
        rule(|link: &Link| {
            Url::parse(&link.url)
                .map(|u| ALLOWED_PROTOCOLS.contains(&u.scheme()))
                .unwrap_or(false)
        }),
        rule(|link: &Link| {
            Url::parse(&link.url)
                .ok()
                .and_then(|u| u.host_str().map(|h| !DISALLOWED_HOSTS.contains(&h)))
                .unwrap_or(false)
        }),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_filter_allows_everything() {
        let filter = build_filter(Vec::new());
        assert!(filter.is_empty());
        assert!(filter.allows(&Link::new("")));
    }

    #[test]
    fn test_rules_short_circuit() {
        let filter = build_filter(vec![
            rule(|_: &Link| false),
            rule(|_: &Link| panic!("second rule must not run")),
        ]);
        assert!(!filter.allows(&Link::new("http://foo.com/")));
    }
}

use crate::config::PreviewConfig;
use crate::data::MetadataStore;
use crate::dedupe::{sanitize_link, unique_sanitized_links};
use crate::error::{PreviewError, Result};
use crate::filter::LinkFilter;
use crate::inflight::InFlight;
use crate::merge::{MergeInputs, assemble, record_from_service};
use crate::model::{EnhancedLink, Link, MetadataRecord, MetadataSource, SanitizedLink};
use crate::tippytop::{FallbackData, TippyTopProvider};
use chrono::{DateTime, TimeDelta, Utc};
use linkcache_remote::{MetadataClient, ServiceFields, versioned_endpoint};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};
use url::Url;

/// Enriches batches of links with page metadata, serving from the store
/// where it can and fetching the rest from the configured service.
pub struct PreviewProvider<S: MetadataStore> {
    config: PreviewConfig,
    store: S,
    client: MetadataClient,
    endpoint: Url,
    source: MetadataSource,
    tippytop: TippyTopProvider,
    filter: LinkFilter,
    inflight: InFlight,
}

impl<S: MetadataStore> PreviewProvider<S> {
    pub fn new(config: PreviewConfig, store: S) -> Result<Self> {
        let tippytop = TippyTopProvider::bundled().map_err(PreviewError::FallbackTable)?;
        Self::with_tippytop(config, store, tippytop)
    }

    pub fn with_tippytop(config: PreviewConfig, store: S, tippytop: TippyTopProvider) -> Result<Self> {
        let service = config.service();
        let endpoint = versioned_endpoint(config.endpoint_base(), &config.client_version)?;
        let client = MetadataClient::with_timeout(config.request_timeout_secs)?;

        info!(
            "Metadata source {} at {} (previews {})",
            service,
            endpoint,
            if config.previews_enabled { "enabled" } else { "disabled" }
        );

        Ok(Self {
            source: service.into(),
            config,
            store,
            client,
            endpoint,
            tippytop,
            filter: LinkFilter::default(),
            inflight: InFlight::new(),
        })
    }

    /// Replaces the default URL rules.
    pub fn with_filter(mut self, filter: LinkFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn config(&self) -> &PreviewConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn metadata_endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn metadata_source_name(&self) -> MetadataSource {
        self.source
    }

    pub fn tippytop(&self) -> &TippyTopProvider {
        &self.tippytop
    }

    /// Sanitizes and keys every link, skipping ones that cannot be
    /// sanitized. No filtering or dedupe.
    pub fn process_links(&self, links: &[Link]) -> Vec<SanitizedLink> {
        links.iter().filter_map(sanitize_link).collect()
    }

    /// Filtered, one link per cache key, in input order.
    pub fn unique_links(&self, links: &[Link]) -> Vec<SanitizedLink> {
        unique_sanitized_links(&self.filter.apply(links))
    }

    /// Enriches `links`, fetching whatever the store does not hold.
    pub async fn get_enhanced_links(&self, links: &[Link]) -> Result<Vec<EnhancedLink>> {
        if !self.config.previews_enabled {
            return Ok(passthrough(links));
        }

        let links = self.unique_links(links);
        let mut records = self.cached_records(&links).await?;

        let misses: Vec<SanitizedLink> = links
            .iter()
            .filter(|link| !records.contains_key(&link.cache_key))
            .cloned()
            .collect();
        info!(
            "{} links: {} cached, {} to fetch",
            links.len(),
            records.len(),
            misses.len()
        );

        if !misses.is_empty() {
            let persisted = self.save_links(&misses).await?;
            let settled: HashSet<&str> = persisted.iter().map(|r| r.cache_key.as_str()).collect();

            // Keys stored by a concurrent invocation since the first lookup
            let reread: Vec<String> = misses
                .iter()
                .filter(|link| !settled.contains(link.cache_key.as_str()))
                .map(|link| link.cache_key.clone())
                .collect();
            let late = if reread.is_empty() {
                Vec::new()
            } else {
                self.store.get_by_cache_keys(&reread).await?
            };

            records.extend(
                persisted
                    .into_iter()
                    .chain(late)
                    .map(|record| (record.cache_key.clone(), record)),
            );
        }

        Ok(self.assemble_all(&links, &records))
    }

    /// Like [`Self::get_enhanced_links`], but only from the store. Misses
    /// come back with fallback data alone.
    pub async fn get_cached_enhanced_links(&self, links: &[Link]) -> Result<Vec<EnhancedLink>> {
        if !self.config.previews_enabled {
            return Ok(passthrough(links));
        }

        let links = self.unique_links(links);
        let records = self.cached_records(&links).await?;
        debug!("{} of {} links cached", records.len(), links.len());
        Ok(self.assemble_all(&links, &records))
    }

    /// Fetches and persists metadata for `links`, returning the records
    /// this call stored.
    ///
    /// Keys another invocation is already fetching are not requested again:
    /// this call waits for that fetch to finish instead. A failed fetch
    /// stores nothing and releases its keys.
    pub async fn save_links(&self, links: &[SanitizedLink]) -> Result<Vec<MetadataRecord>> {
        if !self.config.previews_enabled {
            debug!("Previews disabled, not fetching {} links", links.len());
            return Ok(Vec::new());
        }

        let mut seen = HashSet::new();
        let links: Vec<&SanitizedLink> = links
            .iter()
            .filter(|link| seen.insert(link.cache_key.as_str()))
            .collect();
        let keys: Vec<String> = links.iter().map(|link| link.cache_key.clone()).collect();

        let (claim, waiters) = self.inflight.claim(&keys);
        let persisted = if claim.keys().is_empty() {
            Vec::new()
        } else {
            // Another invocation may have stored these between our caller's
            // lookup and the claim.
            let stored: HashSet<String> = self
                .store
                .get_by_cache_keys(claim.keys())
                .await?
                .into_iter()
                .map(|record| record.cache_key)
                .collect();
            let to_fetch: Vec<&SanitizedLink> = links
                .iter()
                .copied()
                .filter(|link| claim.contains(&link.cache_key) && !stored.contains(&link.cache_key))
                .collect();

            self.fetch_and_persist(&to_fetch).await?
        };
        drop(claim);

        if !waiters.is_empty() {
            debug!("Waiting on {} links fetched elsewhere", waiters.keys().len());
            waiters.wait().await;
        }

        Ok(persisted)
    }

    async fn fetch_and_persist(&self, links: &[&SanitizedLink]) -> Result<Vec<MetadataRecord>> {
        if links.is_empty() {
            return Ok(Vec::new());
        }

        let urls: Vec<String> = links.iter().map(|link| link.sanitized_url.clone()).collect();
        let mut response = self
            .client
            .fetch_batch(&self.endpoint, &urls)
            .await?
            .into_inner();

        let expired_at = self.expiry_from(Utc::now());
        let records: Vec<MetadataRecord> = links
            .iter()
            .filter_map(|link| {
                let fields = response.remove(&link.sanitized_url)?;
                let fallback = self.tippytop.resolve(&link.sanitized_url);
                Some(record_from_service(link, fields, self.source, &fallback, expired_at))
            })
            .collect();

        if records.len() < links.len() {
            debug!(
                "{} of {} requested links had no metadata",
                links.len() - records.len(),
                links.len()
            );
        }

        self.store.insert(&records).await?;
        info!("Cached metadata for {} links from {}", records.len(), self.source);
        Ok(records)
    }

    /// Stores metadata derived locally rather than fetched. `None` when the
    /// link's URL cannot be sanitized.
    pub async fn process_and_insert_metadata(
        &self,
        link: &Link,
        source: MetadataSource,
        fields: ServiceFields,
    ) -> Result<Option<MetadataRecord>> {
        let Some(sanitized) = sanitize_link(link) else {
            debug!("Not storing metadata for unusable url {:?}", link.url);
            return Ok(None);
        };

        let fallback = self.tippytop.resolve(&sanitized.sanitized_url);
        let record = record_from_service(
            &sanitized,
            fields,
            source,
            &fallback,
            self.expiry_from(Utc::now()),
        );
        self.store.insert(std::slice::from_ref(&record)).await?;
        Ok(Some(record))
    }

    /// Whether unexpired metadata is stored for `url`.
    pub async fn link_exists(&self, url: &str) -> Result<bool> {
        match sanitize_link(&Link::new(url)) {
            Some(sanitized) => Ok(self.store.cache_key_exists(&sanitized.cache_key).await?),
            None => Ok(false),
        }
    }

    async fn cached_records(&self, links: &[SanitizedLink]) -> Result<HashMap<String, MetadataRecord>> {
        if links.is_empty() {
            return Ok(HashMap::new());
        }
        let keys: Vec<String> = links.iter().map(|link| link.cache_key.clone()).collect();
        Ok(self
            .store
            .get_by_cache_keys(&keys)
            .await?
            .into_iter()
            .map(|record| (record.cache_key.clone(), record))
            .collect())
    }

    fn assemble_all(
        &self,
        links: &[SanitizedLink],
        records: &HashMap<String, MetadataRecord>,
    ) -> Vec<EnhancedLink> {
        links
            .iter()
            .map(|link| {
                let fallback = self.tippytop.resolve(&link.sanitized_url);
                assemble(&MergeInputs {
                    link,
                    fallback_overrides: self.fallback_overrides(link, &fallback),
                    fallback: &fallback,
                    record: records.get(&link.cache_key),
                })
            })
            .collect()
    }

    fn fallback_overrides(&self, link: &SanitizedLink, fallback: &FallbackData) -> bool {
        fallback.is_complete()
            && self
                .tippytop
                .matching_domain(&link.sanitized_url)
                .is_some_and(|domain| self.config.allows_tippytop_override(domain))
    }

    fn expiry_from(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        i64::try_from(self.config.metadata_ttl_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

fn passthrough(links: &[Link]) -> Vec<EnhancedLink> {
    links.iter().cloned().map(EnhancedLink::from).collect()
}

use crate::error::{FetchError, Result};
use crate::response::{BatchRequest, BatchResponse, ServiceResponse};
use reqwest::Client;
use serde_json::Value;
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use url::Url;

/// Posts batches of sanitized URLs to a metadata service.
#[derive(Debug, Clone)]
pub struct MetadataClient {
    client: Client,
}

impl MetadataClient {
    pub fn new() -> Result<Self> {
        Self::with_timeout(10)
    }

    /// A `timeout_secs` of 0 leaves requests without a timeout.
    pub fn with_timeout(timeout_secs: u64) -> Result<Self> {
        let mut builder = Client::builder()
            .user_agent(concat!("linkcache/", env!("CARGO_PKG_VERSION")))
            .pool_max_idle_per_host(4)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .redirect(reqwest::redirect::Policy::limited(5));

        if timeout_secs > 0 {
            builder = builder
                .timeout(Duration::from_secs(timeout_secs))
                .connect_timeout(Duration::from_secs(timeout_secs.div_ceil(2)));
        }

        Ok(Self { client: builder.build()? })
    }

    /// Requests metadata for `urls` in a single round trip.
    ///
    /// `endpoint` must already carry the version query. Entries the service
    /// returns for URLs outside `urls` are discarded, as are entries whose
    /// value is not a JSON object. Transport errors and non-2xx statuses fail
    /// the whole batch.
    pub async fn fetch_batch(&self, endpoint: &Url, urls: &[String]) -> Result<ServiceResponse> {
        if urls.is_empty() {
            return Ok(ServiceResponse::new());
        }

        info!("Requesting metadata for {} urls from {}", urls.len(), endpoint.path());

        let start = Instant::now();
        let response = self
            .client
            .post(endpoint.clone())
            .json(&BatchRequest { urls })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!("Metadata request to {} failed with {}", endpoint, status);
            return Err(FetchError::Status {
                status,
                endpoint: endpoint.to_string(),
            });
        }

        let body = response.text().await?;
        debug!("Metadata response received in {:?}", start.elapsed());

        let parsed: BatchResponse = serde_json::from_str(&body)?;
        Ok(Self::retain_requested(parsed, urls))
    }

    /// Keeps only object-valued entries for URLs that were actually sent.
    fn retain_requested(parsed: BatchResponse, requested: &[String]) -> ServiceResponse {
        let requested: HashSet<&str> = requested.iter().map(String::as_str).collect();
        let mut accepted = ServiceResponse::new();

        for (url, value) in parsed.urls {
            if !requested.contains(url.as_str()) {
                warn!("Discarding metadata for unrequested url {}", url);
                accepted.dropped += 1;
                continue;
            }
            match value {
                Value::Object(fields) => {
                    accepted.urls.insert(url, fields);
                }
                other => {
                    debug!("Ignoring non-object metadata for {}: {}", url, other);
                    accepted.dropped += 1;
                }
            }
        }

        accepted
    }
}

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Service-specific fields returned for a single URL.
pub type ServiceFields = Map<String, Value>;

/// Body of an outbound batch request.
#[derive(Debug, Serialize)]
pub struct BatchRequest<'a> {
    pub urls: &'a [String],
}

/// Raw body of a batch response, before the requested-set check.
#[derive(Debug, Default, Deserialize)]
pub struct BatchResponse {
    #[serde(default)]
    pub urls: HashMap<String, Value>,
}

/// Metadata accepted from a batch response, keyed by the sanitized URL that
/// was sent.
#[derive(Debug, Clone, Default)]
pub struct ServiceResponse {
    pub urls: HashMap<String, ServiceFields>,
    pub dropped: usize,
}

impl ServiceResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, url: &str) -> Option<&ServiceFields> {
        self.urls.get(url)
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    pub fn into_inner(self) -> HashMap<String, ServiceFields> {
        self.urls
    }
}

use crate::data::{MetadataStore, StoreResult};
use crate::model::MetadataRecord;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;

/// Map-backed store for hosts without a database, and for tests.
#[derive(Debug, Default)]
pub struct MemoryMetadataStore {
    records: Mutex<HashMap<String, MetadataRecord>>,
    insert_calls: AtomicUsize,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored record, expired or not, ordered by cache key.
    pub async fn records(&self) -> Vec<MetadataRecord> {
        let mut records: Vec<MetadataRecord> = self.records.lock().await.values().cloned().collect();
        records.sort_by(|a, b| a.cache_key.cmp(&b.cache_key));
        records
    }

    pub async fn get(&self, cache_key: &str) -> Option<MetadataRecord> {
        self.records.lock().await.get(cache_key).cloned()
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }

    /// How many times `insert` has been called with a non-empty batch.
    pub fn insert_calls(&self) -> usize {
        self.insert_calls.load(Ordering::Relaxed)
    }
}

impl MetadataStore for MemoryMetadataStore {
    async fn get_by_cache_keys(&self, keys: &[String]) -> StoreResult<Vec<MetadataRecord>> {
        let now = Utc::now();
        let records = self.records.lock().await;
        Ok(keys
            .iter()
            .filter_map(|key| records.get(key))
            .filter(|record| !record.is_expired_at(now))
            .cloned()
            .collect())
    }

    async fn insert(&self, records: &[MetadataRecord]) -> StoreResult<()> {
        if records.is_empty() {
            return Ok(());
        }
        self.insert_calls.fetch_add(1, Ordering::Relaxed);
        let mut stored = self.records.lock().await;
        for record in records {
            stored.insert(record.cache_key.clone(), record.clone());
        }
        Ok(())
    }

    async fn cache_key_exists(&self, key: &str) -> StoreResult<bool> {
        let now = Utc::now();
        Ok(self
            .records
            .lock()
            .await
            .get(key)
            .is_some_and(|record| !record.is_expired_at(now)))
    }
}

use crate::error::StoreError;
use crate::model::{MetadataRecord, MetadataSource};
use chrono::{DateTime, Utc};
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use serde_json::{Map, Value};
use std::future::Future;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::debug;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Keys bound per lookup query, well under SQLite's host parameter limit.
pub const LOOKUP_CHUNK_SIZE: usize = 900;

/// Persistent home of [`MetadataRecord`]s, keyed by cache key.
///
/// The store is the authority on expiry: lookups only return records whose
/// `expired_at` is still in the future, and inserting a record for an
/// existing key replaces it.
pub trait MetadataStore: Send + Sync {
    fn get_by_cache_keys(
        &self,
        keys: &[String],
    ) -> impl Future<Output = StoreResult<Vec<MetadataRecord>>> + Send;

    fn insert(&self, records: &[MetadataRecord]) -> impl Future<Output = StoreResult<()>> + Send;

    fn cache_key_exists(&self, key: &str) -> impl Future<Output = StoreResult<bool>> + Send;
}

impl<T: MetadataStore> MetadataStore for Arc<T> {
    fn get_by_cache_keys(
        &self,
        keys: &[String],
    ) -> impl Future<Output = StoreResult<Vec<MetadataRecord>>> + Send {
        (**self).get_by_cache_keys(keys)
    }

    fn insert(&self, records: &[MetadataRecord]) -> impl Future<Output = StoreResult<()>> + Send {
        (**self).insert(records)
    }

    fn cache_key_exists(&self, key: &str) -> impl Future<Output = StoreResult<bool>> + Send {
        (**self).cache_key_exists(key)
    }
}

/// SQLite-backed store. Queries run on the blocking pool.
#[derive(Clone)]
pub struct SqliteMetadataStore {
    conn: Arc<Mutex<Connection>>,
}

fn current_timestamp_millis() -> i64 {
    Utc::now().timestamp_millis()
}

impl SqliteMetadataStore {
    pub fn exists(path: &Path) -> bool {
        path.exists()
    }

    pub fn open(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            ",
        )?;

        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> StoreResult<Self> {
        init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Runs `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> StoreResult<T> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().map_err(|_| StoreError::Poisoned)?;
            f(&guard)
        })
        .await?
    }

    /// Deletes expired records, returning how many went.
    pub async fn purge_expired(&self) -> StoreResult<usize> {
        let now = current_timestamp_millis();
        let removed = self
            .with_conn(move |conn| {
                Ok(conn.execute(
                    "DELETE FROM page_metadata WHERE expired_at <= ?1",
                    params![now],
                )?)
            })
            .await?;
        debug!("Purged {} expired metadata records", removed);
        Ok(removed)
    }

    /// Number of stored records, expired or not.
    pub async fn count(&self) -> StoreResult<usize> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM page_metadata", [], |row| row.get(0))?;
            Ok(count as usize)
        })
        .await
    }
}

fn init_schema(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS page_metadata (
    cache_key TEXT PRIMARY KEY,
    url TEXT NOT NULL,
    sanitized_url TEXT NOT NULL,
    metadata_source TEXT NOT NULL CHECK(metadata_source IN ('Embedly', 'MetadataService', 'TippyTopProvider')),
    favicon_url TEXT,
    background_color TEXT,
    fields TEXT NOT NULL,       -- JSON object of service-specific fields
    created_at INTEGER NOT NULL,
    expired_at INTEGER NOT NULL -- unix millis
);

CREATE INDEX IF NOT EXISTS idx_page_metadata_expired_at ON page_metadata(expired_at);
        ",
    )?;
    Ok(())
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<RawRecord> {
    Ok(RawRecord {
        cache_key: row.get(0)?,
        url: row.get(1)?,
        sanitized_url: row.get(2)?,
        metadata_source: row.get(3)?,
        favicon_url: row.get(4)?,
        background_color: row.get(5)?,
        fields: row.get(6)?,
        expired_at: row.get(7)?,
    })
}

/// A row as stored, before the JSON and enum columns are decoded.
struct RawRecord {
    cache_key: String,
    url: String,
    sanitized_url: String,
    metadata_source: String,
    favicon_url: Option<String>,
    background_color: Option<String>,
    fields: String,
    expired_at: i64,
}

impl TryFrom<RawRecord> for MetadataRecord {
    type Error = StoreError;

    fn try_from(raw: RawRecord) -> StoreResult<Self> {
        let metadata_source: MetadataSource =
            raw.metadata_source
                .parse()
                .map_err(|reason| StoreError::Corrupt {
                    cache_key: raw.cache_key.clone(),
                    reason,
                })?;
        let fields: Map<String, Value> = serde_json::from_str(&raw.fields)?;
        let expired_at = DateTime::<Utc>::from_timestamp_millis(raw.expired_at).ok_or_else(|| {
            StoreError::Corrupt {
                cache_key: raw.cache_key.clone(),
                reason: format!("expired_at out of range: {}", raw.expired_at),
            }
        })?;

        Ok(MetadataRecord {
            cache_key: raw.cache_key,
            url: raw.url,
            sanitized_url: raw.sanitized_url,
            metadata_source,
            favicon_url: raw.favicon_url,
            background_color: raw.background_color,
            fields,
            expired_at,
        })
    }
}

impl MetadataStore for SqliteMetadataStore {
    async fn get_by_cache_keys(&self, keys: &[String]) -> StoreResult<Vec<MetadataRecord>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let keys = keys.to_vec();
        let now = current_timestamp_millis();
        let raw = self
            .with_conn(move |conn| {
                let mut rows = Vec::new();
                for chunk in keys.chunks(LOOKUP_CHUNK_SIZE) {
                    let placeholders = vec!["?"; chunk.len()].join(", ");
                    let sql = format!(
                        "SELECT cache_key, url, sanitized_url, metadata_source, favicon_url,
                                background_color, fields, expired_at
                         FROM page_metadata
                         WHERE expired_at > ? AND cache_key IN ({})",
                        placeholders
                    );
                    let mut stmt = conn.prepare_cached(&sql)?;
                    let params = std::iter::once(SqlValue::Integer(now))
                        .chain(chunk.iter().cloned().map(SqlValue::Text));
                    for row in stmt.query_map(params_from_iter(params), record_from_row)? {
                        rows.push(row?);
                    }
                }
                Ok(rows)
            })
            .await?;

        raw.into_iter().map(MetadataRecord::try_from).collect()
    }

    async fn insert(&self, records: &[MetadataRecord]) -> StoreResult<()> {
        if records.is_empty() {
            return Ok(());
        }

        let rows = records
            .iter()
            .map(|record| Ok((record.clone(), serde_json::to_string(&record.fields)?)))
            .collect::<StoreResult<Vec<_>>>()?;
        let created_at = current_timestamp_millis();

        self.with_conn(move |conn| {
            let tx = conn.unchecked_transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT OR REPLACE INTO page_metadata (
                        cache_key, url, sanitized_url, metadata_source, favicon_url,
                        background_color, fields, created_at, expired_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                )?;
                for (record, fields) in &rows {
                    stmt.execute(params![
                        &record.cache_key,
                        &record.url,
                        &record.sanitized_url,
                        record.metadata_source.as_str(),
                        &record.favicon_url,
                        &record.background_color,
                        fields,
                        created_at,
                        record.expired_at.timestamp_millis(),
                    ])?;
                }
            }
            tx.commit()?;
            Ok(())
        })
        .await?;

        debug!("Stored {} metadata records", records.len());
        Ok(())
    }

    async fn cache_key_exists(&self, key: &str) -> StoreResult<bool> {
        let key = key.to_string();
        let now = current_timestamp_millis();
        self.with_conn(move |conn| {
            let found: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM page_metadata WHERE cache_key = ?1 AND expired_at > ?2",
                    params![key, now],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(found.is_some())
        })
        .await
    }
}

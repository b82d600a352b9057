use linkcache_remote::FetchError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt record for {cache_key}: {reason}")]
    Corrupt { cache_key: String, reason: String },

    #[error("Store task failed: {0}")]
    JoinError(#[from] tokio::task::JoinError),

    #[error("Store lock poisoned")]
    Poisoned,
}

#[derive(Error, Debug)]
pub enum PreviewError {
    #[error("Metadata fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Metadata store failed: {0}")]
    Store(#[from] StoreError),

    #[error("Invalid fallback table: {0}")]
    FallbackTable(#[source] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PreviewError>;

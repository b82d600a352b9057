pub mod config;
pub mod data;
pub mod dedupe;
pub mod error;
pub mod filter;
pub mod inflight;
pub mod memory;
pub mod merge;
pub mod model;
pub mod provider;
pub mod sanitize;
pub mod tippytop;

pub use config::PreviewConfig;
pub use data::{MetadataStore, SqliteMetadataStore};
pub use dedupe::unique_links;
pub use error::{PreviewError, Result, StoreError};
pub use filter::{LinkFilter, UrlRule, build_filter, default_rules};
pub use memory::MemoryMetadataStore;
pub use merge::{FALLBACK_OVERRIDE_FIELDS, LIVE_FIELDS, MERGE_ORDER, MergeLayer};
pub use model::{
    ENHANCED_LINK_KEYS, EnhancedLink, Link, MetadataRecord, MetadataSource, SanitizedLink,
};
pub use provider::PreviewProvider;
pub use sanitize::{derive_cache_key, sanitize_url};
pub use tippytop::{FallbackData, TippyTopProvider};

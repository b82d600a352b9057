pub mod handlers;

pub use handlers::{
    init_tracing, load_config_from_file, load_links_from_file, open_provider, parse_url_line,
};

pub use linkcache_core::{
    EnhancedLink, Link, MemoryMetadataStore, MetadataRecord, MetadataSource, MetadataStore,
    PreviewConfig, PreviewError, PreviewProvider, SqliteMetadataStore, StoreError,
};
pub use linkcache_remote::{FetchError, MetadataService};

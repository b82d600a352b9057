use anyhow::{Context, Result, bail};
use linkcache_core::{Link, PreviewConfig, PreviewProvider, SqliteMetadataStore};
use std::fs;
use std::path::Path;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use url::Url;

pub const DEFAULT_LOG_DIRECTIVE: &str = "linkcache=info,linkcache_core=info,linkcache_remote=info";

/// Installs a fmt subscriber filtered by `RUST_LOG`, falling back to
/// [`DEFAULT_LOG_DIRECTIVE`]. Safe to call more than once.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_DIRECTIVE));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Reads a [`PreviewConfig`] from a JSON file of preference keys. Missing
/// keys take their defaults.
pub fn load_config_from_file(path: &Path) -> Result<PreviewConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config = serde_json::from_str(&content)
        .with_context(|| format!("Invalid config in {}", path.display()))?;
    Ok(config)
}

/// Loads links from a file holding either a JSON array of link objects or
/// one URL per line.
pub fn load_links_from_file(path: &Path) -> Result<Vec<Link>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read links file {}", path.display()))?;

    let links: Vec<Link> = if content.trim_start().starts_with('[') {
        serde_json::from_str(&content)
            .with_context(|| format!("Invalid links JSON in {}", path.display()))?
    } else {
        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| parse_url_line(line.trim()))
            .map(Link::new)
            .collect()
    };

    if links.is_empty() {
        bail!("No links found in {}", path.display());
    }

    Ok(links)
}

/// Parse a single line as a URL, trying to add http:// if needed
pub fn parse_url_line(line: &str) -> Option<String> {
    if Url::parse(line).is_ok() {
        return Some(line.to_string());
    }

    let with_scheme = format!("http://{}", line);
    if Url::parse(&with_scheme).is_ok() {
        return Some(with_scheme);
    }

    warn!("Skipping invalid URL '{}'", line);
    None
}

/// Opens (creating if needed) the metadata database at `db_path` and builds
/// a provider over it.
pub fn open_provider(config: PreviewConfig, db_path: &Path) -> Result<PreviewProvider<SqliteMetadataStore>> {
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    let existed = SqliteMetadataStore::exists(db_path);
    let store = SqliteMetadataStore::open(db_path)
        .with_context(|| format!("Failed to open metadata database {}", db_path.display()))?;
    if !existed {
        info!("Created metadata database at {}", db_path.display());
    }

    PreviewProvider::new(config, store).context("Failed to set up preview provider")
}

use linkcache::handlers::*;
use linkcache::{MetadataService, MetadataSource, PreviewConfig};
use std::io::Write;
use tempfile::{NamedTempFile, TempDir};

#[test]
fn test_parse_url_line_with_scheme() {
    let result = parse_url_line("https://example.com");
    assert_eq!(result, Some("https://example.com".to_string()));
}

#[test]
fn test_parse_url_line_without_scheme() {
    let result = parse_url_line("example.com");
    assert_eq!(result, Some("http://example.com".to_string()));
}

#[test]
fn test_parse_url_line_invalid() {
    let result = parse_url_line("not a valid url!!!");
    assert_eq!(result, None);
}

#[test]
fn test_load_links_from_url_list() -> Result<(), Box<dyn std::error::Error>> {
    let mut temp_file = NamedTempFile::new()?;
    writeln!(temp_file, "https://example.com")?;
    writeln!(temp_file, "mozilla.org")?;
    writeln!(temp_file)?; // Empty line
    writeln!(temp_file, "https://www.youtube.com/")?;

    let links = load_links_from_file(temp_file.path())?;

    assert_eq!(links.len(), 3);
    assert_eq!(links[0].url, "https://example.com");
    assert_eq!(links[1].url, "http://mozilla.org");
    assert_eq!(links[2].url, "https://www.youtube.com/");

    Ok(())
}

#[test]
fn test_load_links_from_json() -> Result<(), Box<dyn std::error::Error>> {
    let mut temp_file = NamedTempFile::new()?;
    write!(
        temp_file,
        r#"[{{"url": "http://foo.com/", "lastVisitDate": 1459537019061, "type": "history"}}, {{"url": null}}]"#
    )?;

    let links = load_links_from_file(temp_file.path())?;

    assert_eq!(links.len(), 2);
    assert_eq!(links[0].last_visit_date, Some(1459537019061));
    assert_eq!(links[0].link_type.as_deref(), Some("history"));
    assert_eq!(links[1].url, "");

    Ok(())
}

#[test]
fn test_load_links_from_file_empty() {
    let mut temp_file = NamedTempFile::new().unwrap();
    writeln!(temp_file).unwrap();
    writeln!(temp_file, "   ").unwrap();

    let result = load_links_from_file(temp_file.path());
    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("No links found"));
}

#[test]
fn test_load_links_from_missing_file() {
    let temp_dir = TempDir::new().unwrap();
    let result = load_links_from_file(&temp_dir.path().join("nope.txt"));
    assert!(result.unwrap_err().to_string().contains("Failed to read links file"));
}

#[test]
fn test_load_config_from_file() -> Result<(), Box<dyn std::error::Error>> {
    let mut temp_file = NamedTempFile::new()?;
    write!(
        temp_file,
        r#"{{"metadataSource": "MetadataService", "previews.enabled": false, "tippytop.overrides": ["youtube.com"]}}"#
    )?;

    let config = load_config_from_file(temp_file.path())?;

    assert_eq!(config.service(), MetadataService::MetadataService);
    assert!(!config.previews_enabled);
    assert!(config.allows_tippytop_override("youtube.com"));
    assert!(!config.allows_tippytop_override("amazon.com"));
    assert_eq!(config.metadata_ttl_secs, PreviewConfig::default().metadata_ttl_secs);

    Ok(())
}

#[test]
fn test_load_config_invalid_json() {
    let mut temp_file = NamedTempFile::new().unwrap();
    write!(temp_file, "{{ not json").unwrap();

    let result = load_config_from_file(temp_file.path());
    assert!(result.unwrap_err().to_string().contains("Invalid config"));
}

#[test]
fn test_open_provider_creates_database() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("nested").join("metadata.db");

    let provider = open_provider(PreviewConfig::default(), &db_path).unwrap();

    assert!(db_path.exists());
    assert_eq!(provider.metadata_source_name(), MetadataSource::Embedly);
}

#[test]
fn test_open_provider_rejects_bad_endpoint() {
    let temp_dir = TempDir::new().unwrap();
    let config = PreviewConfig {
        embedly_endpoint: "::garbage::".to_string(),
        ..PreviewConfig::default()
    };

    let result = open_provider(config, &temp_dir.path().join("metadata.db"));
    assert!(result.is_err());
}

#[test]
fn test_init_tracing_is_idempotent() {
    init_tracing();
    init_tracing();
}

//! URL sanitizing and cache key derivation.
//!
//! A sanitized URL carries no credentials, no fragment, no redundant path
//! segments and only the query parameters in [`ALLOWED_QUERY_PARAMS`]. The
//! cache key is derived from it textually so equivalent URLs always share a
//! key.

use url::Url;

/// Query parameters that survive sanitizing. Everything else is dropped.
pub const ALLOWED_QUERY_PARAMS: &[&str] = &["p", "q", "query", "s", "search", "sitesearch"];

/// Normalizes `url`. Blank input yields an empty string; input the URL parser
/// rejects yields its parse error.
pub fn sanitize_url(url: &str) -> Result<String, url::ParseError> {
    let url = url.trim();
    if url.is_empty() {
        return Ok(String::new());
    }

    let mut parsed = Url::parse(url)?;

    // Both only fail for cannot-be-a-base URLs, which have no credentials.
    let _ = parsed.set_username("");
    let _ = parsed.set_password(None);
    parsed.set_fragment(None);

    if !parsed.cannot_be_a_base() {
        let path = normalize_path(parsed.path());
        parsed.set_path(&path);
    }

    let kept: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(name, _)| ALLOWED_QUERY_PARAMS.contains(&&**name))
        .map(|(name, value)| (name.into_owned(), value.into_owned()))
        .collect();

    parsed.set_query(None);
    if !kept.is_empty() {
        parsed.query_pairs_mut().extend_pairs(kept);
    }

    Ok(parsed.into())
}

/// Collapses repeated separators, resolves dot segments against the root and
/// drops a trailing slash. The root path stays `/`.
fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." | "%2e" | "%2E" => {}
            ".." | "%2e%2e" | "%2E%2E" | ".%2e" | "%2e." | ".%2E" | "%2E." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    format!("/{}", segments.join("/"))
}

/// Derives the store key for a sanitized URL: the scheme and a leading `www.`
/// are dropped, host, port, path and query are kept.
pub fn derive_cache_key(sanitized_url: &str) -> String {
    let rest = strip_prefix_ignore_case(sanitized_url, "https://")
        .or_else(|| strip_prefix_ignore_case(sanitized_url, "http://"))
        .unwrap_or(sanitized_url);
    let rest = strip_prefix_ignore_case(rest, "www.").unwrap_or(rest);
    rest.to_string()
}

fn strip_prefix_ignore_case<'a>(value: &'a str, prefix: &str) -> Option<&'a str> {
    if value.len() >= prefix.len()
        && value.is_char_boundary(prefix.len())
        && value[..prefix.len()].eq_ignore_ascii_case(prefix)
    {
        Some(&value[prefix.len()..])
    } else {
        None
    }
}

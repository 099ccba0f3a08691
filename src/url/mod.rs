//! URL handling module for Evidence-Crawler
//!
//! Crawl requests arrive as plain strings. This module turns them into parsed
//! URLs and extracts the domain used for rate limiting.

mod domain;

use crate::{UrlError, UrlResult};
use url::Url;

pub use domain::extract_domain;

/// Parses a crawl request and extracts its domain
///
/// # Returns
///
/// * `Ok((Url, String))` - The parsed URL and its domain
/// * `Err(UrlError)` - The string is not a URL, or the URL has no host
pub fn parse_request(raw: &str) -> UrlResult<(Url, String)> {
    let url = Url::parse(raw.trim()).map_err(|e| UrlError::Parse(format!("{}: {}", raw, e)))?;
    let domain = extract_domain(&url).ok_or_else(|| UrlError::MissingDomain(raw.to_string()))?;
    Ok((url, domain))
}

/// Reads crawl requests from a URL list, one per line
///
/// Blank lines and lines starting with `#` are ignored. Lines are trimmed but
/// otherwise kept as written, since results are keyed by the exact string.
pub fn parse_url_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

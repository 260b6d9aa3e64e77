//! URL handling module for Sitemapper
//!
//! This module provides link normalization, canonical dedup keys, and
//! same-site host matching.

mod domain;
mod normalize;

use crate::UrlError;
use url::Url;

// Re-export main functions
pub use domain::{is_same_site, site_host};
pub use normalize::{canonical, normalize_link, normalize_links};

/// Parses a crawl root, accepting only absolute http(s) URLs with a host
///
/// # Examples
///
/// ```
/// use sitemapper::url::parse_site;
///
/// assert!(parse_site("https://example.com").is_ok());
/// assert!(parse_site("ftp://example.com").is_err());
/// assert!(parse_site("example.com").is_err());
/// ```
pub fn parse_site(site: &str) -> Result<Url, UrlError> {
    let url = Url::parse(site).map_err(|e| UrlError::Parse(format!("{}: {}", site, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    if url.host_str().is_none() {
        return Err(UrlError::MissingHost);
    }

    Ok(url)
}

//! Output module for rendering sitemaps
//!
//! This module handles:
//! - Writing an embedded crawl's sitemap as JSON
//! - Building the sitemap details view from the durable store

use crate::protocol::SitemapDetails;
use crate::state::SiteMap;
use crate::storage::{SitemapStore, StorageError};
use std::io::Write;

/// Writes the sitemap as a JSON array of `{URL, Links}` sorted by URL
///
/// # Arguments
///
/// * `sitemap` - The crawled sitemap
/// * `writer` - Destination, typically stdout
///
/// # Returns
///
/// * `Ok(usize)` - Number of entries written
/// * `Err(SitemapperError)` - Failed to serialize or write
pub fn write_sitemap_json<W: Write>(sitemap: &SiteMap, mut writer: W) -> crate::Result<usize> {
    let results = sitemap.to_results();
    serde_json::to_writer_pretty(&mut writer, &results)?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(results.len())
}

/// Builds the details view of a stored sitemap
///
/// Fails with `SitemapNotFound` when the ID is unknown.
pub fn sitemap_details<S: SitemapStore + ?Sized>(
    store: &S,
    sitemap_id: &str,
) -> crate::Result<SitemapDetails> {
    let record = store
        .sitemap(sitemap_id)?
        .ok_or_else(|| StorageError::SitemapNotFound(sitemap_id.to_string()))?;
    let results = store.results(sitemap_id)?;

    Ok(SitemapDetails {
        sitemap_id: record.sitemap_id,
        url: record.url,
        max_depth: record.max_depth,
        count: results.len(),
        results,
    })
}

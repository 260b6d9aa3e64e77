//! Single-URL worker
//!
//! A worker is the embedded engine run one level deep against exactly one
//! URL. It reports that URL's links under its crawl ID and exits.

use crate::bus::{publish_json, MessageBus};
use crate::config::CrawlerConfig;
use crate::crawler::{build_http_client, CrawlEngine, Strategy};
use crate::protocol::{PageLinks, ResultsMessage};
use crate::state::SiteMap;
use crate::url::{canonical, parse_site};
use std::sync::Arc;
use tracing::info;

/// Expands `site` and publishes the result on `results_subject`
///
/// Only the expanded URL is reported. The URLs it links to are recorded as
/// leaves by the one-level crawl and never fetched, so reporting them would
/// tell the manager they had been expanded with no links.
///
/// # Arguments
///
/// * `config` - Crawler configuration (timeout, user agent)
/// * `site` - The URL to expand
/// * `crawl_id` - The job this expansion belongs to
/// * `bus` - Where the results are published
/// * `results_subject` - Subject of the results message
pub async fn run_worker(
    config: &CrawlerConfig,
    site: &str,
    crawl_id: &str,
    bus: &dyn MessageBus,
    results_subject: &str,
) -> crate::Result<ResultsMessage> {
    let root = parse_site(site)?;
    let sitemap = Arc::new(SiteMap::new());
    let client = build_http_client(config)?;

    let engine = CrawlEngine::new(
        Arc::clone(&sitemap),
        root.clone(),
        1,
        Strategy::Concurrent,
        client,
    );
    engine.run().await;

    let url = canonical(root.as_str());
    let links = sitemap.links(&url).unwrap_or_default();
    info!("Crawl {}: {} has {} links", crawl_id, url, links.len());

    let message = ResultsMessage {
        crawl_id: crawl_id.to_string(),
        results: vec![PageLinks { url, links }],
    };
    publish_json(bus, results_subject, &message).await?;

    Ok(message)
}

//! Wire types exchanged between the submitter, the crawl manager and workers
//!
//! Field names follow the JSON shapes on the bus and the HTTP API exactly,
//! which is why every field carries an explicit rename.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Published on the start subject to request a new sitemap
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartMessage {
    #[serde(rename = "SitemapID")]
    pub sitemap_id: String,
    #[serde(rename = "URL")]
    pub url: String,
    #[serde(rename = "MaxDepth")]
    pub max_depth: u32,
}

/// Published on the crawl subject: expand one URL of one sitemap
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlMessage {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "SitemapID")]
    pub sitemap_id: String,
    #[serde(rename = "URL")]
    pub url: String,
    #[serde(rename = "Depth")]
    pub depth: u32,
}

impl CrawlMessage {
    /// Creates a crawl request with a fresh crawl ID
    pub fn new(sitemap_id: &str, url: &str, depth: u32) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            sitemap_id: sitemap_id.to_string(),
            url: url.to_string(),
            depth,
        }
    }
}

/// Published by a worker on the results subject
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultsMessage {
    #[serde(rename = "CrawlId")]
    pub crawl_id: String,
    #[serde(rename = "Results")]
    pub results: Vec<PageLinks>,
}

/// One page and the links found on it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageLinks {
    #[serde(rename = "URL")]
    pub url: String,
    #[serde(rename = "Links")]
    pub links: Vec<String>,
}

/// Body of `POST /sitemap`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SitemapCreateRequest {
    #[serde(rename = "URL")]
    pub url: String,
    #[serde(rename = "MaxDepth")]
    pub max_depth: u32,
}

/// Response of `POST /sitemap`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SitemapCreateResponse {
    #[serde(rename = "SitemapID")]
    pub sitemap_id: String,
    #[serde(rename = "URL")]
    pub url: String,
    #[serde(rename = "MaxDepth")]
    pub max_depth: u32,
}

impl From<&StartMessage> for SitemapCreateResponse {
    fn from(start: &StartMessage) -> Self {
        Self {
            sitemap_id: start.sitemap_id.clone(),
            url: start.url.clone(),
            max_depth: start.max_depth,
        }
    }
}

/// Response of `GET /sitemap/{id}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SitemapDetails {
    #[serde(rename = "SitemapID")]
    pub sitemap_id: String,
    #[serde(rename = "URL")]
    pub url: String,
    #[serde(rename = "MaxDepth")]
    pub max_depth: u32,
    #[serde(rename = "Count")]
    pub count: usize,
    #[serde(rename = "Results")]
    pub results: Vec<PageLinks>,
}

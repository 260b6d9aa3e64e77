//! Crawler module for web page fetching and traversal
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with outcome classification
//! - HTML link extraction
//! - The non-blocking admission limiter
//! - The traversal engine and its three scheduling strategies

mod engine;
mod fetcher;
mod limiter;
mod parser;

pub use engine::{CrawlEngine, CrawlSummary, CrawlTask, Strategy};
pub use fetcher::{build_http_client, fetch_page, FetchResult, MAX_REDIRECTS};
pub use limiter::{AtCapacity, Limiter, MAX_BACKOFF};
pub use parser::extract_links;

pub(crate) use limiter::random_backoff;

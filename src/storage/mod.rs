//! Storage module for persisting distributed crawl state
//!
//! This module handles all database operations for the crawl manager:
//! - SQLite database initialization and schema management
//! - Sitemap records
//! - Crawl job claims and status transitions
//! - Per-URL link results

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStore;
pub use traits::{SitemapStore, StorageError, StorageResult};

use crate::state::JobStatus;
use std::path::Path;

/// Opens a storage database, creating the schema if needed
///
/// Missing parent directories are created first.
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
pub fn open_store(path: &Path) -> StorageResult<SqliteStore> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    SqliteStore::open(path)
}

/// Represents a sitemap in the database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SitemapRecord {
    pub sitemap_id: String,
    pub url: String,
    pub max_depth: u32,
    pub created_at: String,
}

/// A job about to be claimed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewJob {
    pub crawl_id: String,
    pub sitemap_id: String,
    pub url: String,
    pub depth: u32,
    pub max_depth: u32,
}

/// Represents a crawl job in the database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlJob {
    pub crawl_id: String,
    pub sitemap_id: String,
    pub url: String,
    pub depth: u32,
    pub max_depth: u32,
    pub status: JobStatus,
    pub created_at: String,
    pub updated_at: String,
}

/// Outcome of [`SitemapStore::claim_job`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobClaim {
    /// A new PENDING job was written; the caller owns the launch
    Claimed,
    /// The URL (or crawl ID) was already known; nothing was written
    AlreadyKnown,
}

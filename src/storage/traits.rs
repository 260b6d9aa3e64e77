//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::protocol::PageLinks;
use crate::state::JobStatus;
use crate::storage::{CrawlJob, JobClaim, NewJob, SitemapRecord};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Sitemap already exists: {0}")]
    SitemapExists(String),

    #[error("Sitemap not found: {0}")]
    SitemapNotFound(String),

    #[error("Crawl job not found: {0}")]
    JobNotFound(String),

    #[error("Invalid job status in database: {0}")]
    InvalidStatus(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for durable sitemap storage
///
/// The store is the single source of truth for the distributed crawl: it
/// decides which (sitemap, URL) pairs get a job, and holds every result.
/// Implementations must make [`SitemapStore::claim_job`] a single atomic
/// write so concurrent managers cannot both claim the same URL.
pub trait SitemapStore {
    // ===== Sitemaps =====

    /// Records a new sitemap
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The sitemap was created
    /// * `Err(StorageError::SitemapExists)` - The ID is already in use; nothing changed
    fn create_sitemap(&mut self, sitemap_id: &str, url: &str, max_depth: u32)
        -> StorageResult<()>;

    /// Gets a sitemap by ID
    fn sitemap(&self, sitemap_id: &str) -> StorageResult<Option<SitemapRecord>>;

    /// Gets the maximum depth of a sitemap
    ///
    /// Fails with `SitemapNotFound` for unknown IDs.
    fn max_depth(&self, sitemap_id: &str) -> StorageResult<u32>;

    // ===== Crawl Jobs =====

    /// Creates a PENDING job unless the URL is already known for its sitemap
    ///
    /// A URL is known when it already has a job or a stored result in the
    /// same sitemap, or when the crawl ID is already taken.
    fn claim_job(&mut self, job: &NewJob) -> StorageResult<JobClaim>;

    /// Deletes a job that is still PENDING
    ///
    /// Returns true if a row was removed.
    fn release_job(&mut self, crawl_id: &str) -> StorageResult<bool>;

    /// Gets a job by crawl ID
    fn job(&self, crawl_id: &str) -> StorageResult<Option<CrawlJob>>;

    /// Moves a job forward to `status`
    ///
    /// Only succeeds from one of `status.predecessors()`; returns false when
    /// the job is missing or already at or past `status`.
    fn advance_job(&mut self, crawl_id: &str, status: JobStatus) -> StorageResult<bool>;

    // ===== Results =====

    /// Stores the links found on `url`, replacing any previous set
    fn write_results(
        &mut self,
        sitemap_id: &str,
        crawl_id: &str,
        url: &str,
        links: &[String],
    ) -> StorageResult<()>;

    /// Gets every stored result of a sitemap, sorted by URL
    fn results(&self, sitemap_id: &str) -> StorageResult<Vec<PageLinks>>;

    // ===== Health =====

    /// Verifies the backend is reachable
    fn health_check(&self) -> StorageResult<()>;
}

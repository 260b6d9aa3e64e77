//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the SitemapStore trait.

use crate::protocol::PageLinks;
use crate::state::JobStatus;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{SitemapStore, StorageError, StorageResult};
use crate::storage::{CrawlJob, JobClaim, NewJob, SitemapRecord};
use crate::url::canonical;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// SQLite storage backend
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens or creates the database at `path`
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStore)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn open(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        // WAL lets several manager processes share one database file
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA busy_timeout = 5000;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn parse_status(raw: String) -> StorageResult<JobStatus> {
    JobStatus::from_db_string(&raw).ok_or(StorageError::InvalidStatus(raw))
}

impl SitemapStore for SqliteStore {
    // ===== Sitemaps =====

    fn create_sitemap(
        &mut self,
        sitemap_id: &str,
        url: &str,
        max_depth: u32,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO sitemaps (sitemap_id, url, max_depth, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![sitemap_id, url, max_depth, now],
        )?;

        if inserted == 0 {
            return Err(StorageError::SitemapExists(sitemap_id.to_string()));
        }
        Ok(())
    }

    fn sitemap(&self, sitemap_id: &str) -> StorageResult<Option<SitemapRecord>> {
        let record = self
            .conn
            .query_row(
                "SELECT sitemap_id, url, max_depth, created_at FROM sitemaps WHERE sitemap_id = ?1",
                params![sitemap_id],
                |row| {
                    Ok(SitemapRecord {
                        sitemap_id: row.get(0)?,
                        url: row.get(1)?,
                        max_depth: row.get(2)?,
                        created_at: row.get(3)?,
                    })
                },
            )
            .optional()?;

        Ok(record)
    }

    fn max_depth(&self, sitemap_id: &str) -> StorageResult<u32> {
        self.conn
            .query_row(
                "SELECT max_depth FROM sitemaps WHERE sitemap_id = ?1",
                params![sitemap_id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| StorageError::SitemapNotFound(sitemap_id.to_string()))
    }

    // ===== Crawl Jobs =====

    fn claim_job(&mut self, job: &NewJob) -> StorageResult<JobClaim> {
        let now = Utc::now().to_rfc3339();
        let url = canonical(&job.url);

        // Uniqueness on (sitemap_id, url) and on crawl_id makes this one
        // statement the whole claim; no read precedes it.
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO crawl_jobs
                (crawl_id, sitemap_id, url, depth, max_depth, status, created_at, updated_at)
             SELECT ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7
             WHERE NOT EXISTS (
                SELECT 1 FROM results_by_sitemap_id WHERE sitemap_id = ?2 AND url = ?3
             )",
            params![
                job.crawl_id,
                job.sitemap_id,
                url,
                job.depth,
                job.max_depth,
                JobStatus::Pending.to_db_string(),
                now
            ],
        )?;

        Ok(if inserted == 1 {
            JobClaim::Claimed
        } else {
            JobClaim::AlreadyKnown
        })
    }

    fn release_job(&mut self, crawl_id: &str) -> StorageResult<bool> {
        let deleted = self.conn.execute(
            "DELETE FROM crawl_jobs WHERE crawl_id = ?1 AND status = ?2",
            params![crawl_id, JobStatus::Pending.to_db_string()],
        )?;
        Ok(deleted > 0)
    }

    fn job(&self, crawl_id: &str) -> StorageResult<Option<CrawlJob>> {
        let row = self
            .conn
            .query_row(
                "SELECT crawl_id, sitemap_id, url, depth, max_depth, status, created_at, updated_at
                 FROM crawl_jobs WHERE crawl_id = ?1",
                params![crawl_id],
                |row| {
                    Ok((
                        CrawlJob {
                            crawl_id: row.get(0)?,
                            sitemap_id: row.get(1)?,
                            url: row.get(2)?,
                            depth: row.get(3)?,
                            max_depth: row.get(4)?,
                            status: JobStatus::Pending,
                            created_at: row.get(6)?,
                            updated_at: row.get(7)?,
                        },
                        row.get::<_, String>(5)?,
                    ))
                },
            )
            .optional()?;

        match row {
            Some((mut job, status)) => {
                job.status = parse_status(status)?;
                Ok(Some(job))
            }
            None => Ok(None),
        }
    }

    fn advance_job(&mut self, crawl_id: &str, status: JobStatus) -> StorageResult<bool> {
        let allowed = status
            .predecessors()
            .iter()
            .map(|s| format!("'{}'", s.to_db_string()))
            .collect::<Vec<_>>();

        if allowed.is_empty() {
            return Ok(false);
        }

        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            &format!(
                "UPDATE crawl_jobs SET status = ?1, updated_at = ?2
                 WHERE crawl_id = ?3 AND status IN ({})",
                allowed.join(", ")
            ),
            params![status.to_db_string(), now, crawl_id],
        )?;

        Ok(updated > 0)
    }

    // ===== Results =====

    fn write_results(
        &mut self,
        sitemap_id: &str,
        crawl_id: &str,
        url: &str,
        links: &[String],
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let encoded =
            serde_json::to_string(links).map_err(|e| StorageError::Serialization(e.to_string()))?;

        self.conn.execute(
            "INSERT INTO results_by_sitemap_id (sitemap_id, url, crawl_id, links, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(sitemap_id, url) DO UPDATE SET
                crawl_id = excluded.crawl_id,
                links = excluded.links,
                updated_at = excluded.updated_at",
            params![sitemap_id, canonical(url), crawl_id, encoded, now],
        )?;
        Ok(())
    }

    fn results(&self, sitemap_id: &str) -> StorageResult<Vec<PageLinks>> {
        let mut stmt = self.conn.prepare(
            "SELECT url, links FROM results_by_sitemap_id WHERE sitemap_id = ?1 ORDER BY url",
        )?;

        let rows = stmt
            .query_map(params![sitemap_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(url, encoded)| {
                let mut links: Vec<String> = serde_json::from_str(&encoded)
                    .map_err(|e| StorageError::Serialization(e.to_string()))?;
                links.sort();
                Ok(PageLinks { url, links })
            })
            .collect()
    }

    // ===== Health =====

    fn health_check(&self) -> StorageResult<()> {
        self.conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }
}

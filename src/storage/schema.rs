//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Sitemapper database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One row per requested sitemap; immutable once written
CREATE TABLE IF NOT EXISTS sitemaps (
    sitemap_id TEXT PRIMARY KEY,
    url TEXT NOT NULL,
    max_depth INTEGER NOT NULL,
    created_at TEXT NOT NULL
);

-- One row per single-URL expansion; at most one per (sitemap, url)
CREATE TABLE IF NOT EXISTS crawl_jobs (
    crawl_id TEXT PRIMARY KEY,
    sitemap_id TEXT NOT NULL REFERENCES sitemaps(sitemap_id),
    url TEXT NOT NULL,
    depth INTEGER NOT NULL,
    max_depth INTEGER NOT NULL,
    status TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE(sitemap_id, url)
);

CREATE INDEX IF NOT EXISTS idx_crawl_jobs_status ON crawl_jobs(status);

-- Links found on each expanded URL, links stored as a JSON array
CREATE TABLE IF NOT EXISTS results_by_sitemap_id (
    sitemap_id TEXT NOT NULL REFERENCES sitemaps(sitemap_id),
    url TEXT NOT NULL,
    crawl_id TEXT NOT NULL,
    links TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (sitemap_id, url)
);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

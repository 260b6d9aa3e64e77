//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `SiteMap`: the in-process visited set and link graph of one crawl run
//! - `JobStatus`: the lifecycle of a distributed crawl job (PENDING, CREATED, COMPLETE)

mod job_status;
mod sitemap;

// Re-export main types
pub use job_status::JobStatus;
pub use sitemap::SiteMap;

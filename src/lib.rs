//! Sitemapper: a website link-topology mapper
//!
//! This crate crawls a site from a root URL, extracts and normalizes same-site
//! links, and records the resulting graph up to a bounded depth. It runs either
//! embedded (one process, three concurrency strategies) or distributed, where a
//! message-driven manager fans single-URL expansions out to launched workers.

pub mod bus;
pub mod config;
pub mod crawler;
pub mod manager;
pub mod output;
pub mod protocol;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for sitemapper operations
#[derive(Debug, Error)]
pub enum SitemapperError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Message bus error: {0}")]
    Bus(#[from] bus::BusError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid identifier: {0}")]
    InvalidId(#[from] uuid::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Missing required config section [{0}]")]
    MissingSection(&'static str),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,
}

/// Result type alias for sitemapper operations
pub type Result<T> = std::result::Result<T, SitemapperError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{CrawlEngine, Limiter, Strategy};
pub use manager::CrawlManager;
pub use state::{JobStatus, SiteMap};
pub use crate::url::{canonical, normalize_links};

use clap::ValueEnum;
use serde::Deserialize;
use std::path::PathBuf;

/// Main configuration structure for Sitemapper
///
/// Only `[crawler]` is always present (with defaults). The distributed sections
/// are optional in the file; the commands that need them ask for them through
/// the `require_*` accessors.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    pub bus: Option<BusConfig>,
    pub store: Option<StoreConfig>,
    pub launcher: Option<LauncherConfig>,
    #[serde(default)]
    pub manager: ManagerConfig,
}

/// Crawl strategy selected in configuration or on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum CrawlMode {
    /// Depth-first, one page at a time
    Synchronous,
    /// One task per discovered link, unbounded
    #[default]
    Concurrent,
    /// One task per discovered link, admitted through a bounded limiter
    Limited,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Maximum depth to crawl from the root URL
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,

    #[serde(default)]
    pub mode: CrawlMode,

    /// Maximum number of in-flight crawl steps in limited mode
    #[serde(default = "default_limit")]
    pub limit: usize,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            mode: CrawlMode::default(),
            limit: default_limit(),
            request_timeout_secs: default_request_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

/// Message bus connection and topic names
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BusConfig {
    /// NATS server address (e.g., "nats://localhost:4222")
    pub server: String,
    pub start_subject: String,
    pub crawl_subject: String,
    pub results_subject: String,
}

/// Durable store configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StoreConfig {
    /// Path to the SQLite database file
    pub database_path: PathBuf,
}

/// Worker launcher configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LauncherConfig {
    /// Program started for each crawl job
    pub program: PathBuf,

    /// Arguments placed before the worker subcommand
    #[serde(default)]
    pub args: Vec<String>,

    /// Maximum number of workers alive at once
    #[serde(default = "default_max_jobs")]
    pub max_jobs: usize,
}

/// Crawl manager process configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ManagerConfig {
    /// File created once the manager is subscribed and serving
    pub ready_file: Option<PathBuf>,
}

fn default_max_depth() -> u32 {
    1
}

fn default_limit() -> usize {
    10
}

fn default_request_timeout_secs() -> u64 {
    5
}

fn default_user_agent() -> String {
    format!("sitemapper/{}", env!("CARGO_PKG_VERSION"))
}

fn default_max_jobs() -> usize {
    16
}

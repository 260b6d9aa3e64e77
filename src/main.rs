//! Sitemapper main entry point
//!
//! This is the command-line interface for the Sitemapper link-topology mapper.

use anyhow::Context;
use clap::{Parser, Subcommand};
use sitemapper::bus::{publish_json, NatsBus};
use sitemapper::config::{load_config_with_hash, validate, Config, CrawlMode};
use sitemapper::manager::{run_worker, CrawlManager, ProcessLauncher};
use sitemapper::output::{sitemap_details, write_sitemap_json};
use sitemapper::protocol::{SitemapCreateResponse, StartMessage};
use sitemapper::storage::{open_store, SitemapStore};
use sitemapper::url::parse_site;
use sitemapper::{CrawlEngine, SiteMap};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Sitemapper: a website link-topology mapper
///
/// Sitemapper crawls a site from a root URL and records which same-site pages
/// link to which, up to a maximum depth. It runs embedded in one process or
/// distributed across a manager and launched workers.
#[derive(Parser, Debug)]
#[command(name = "sitemapper")]
#[command(version = "1.0.0")]
#[command(about = "A website link-topology mapper", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(short, long, global = true, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl a site in this process and print its sitemap as JSON
    Map {
        /// Root URL to crawl
        #[arg(long)]
        site: String,

        /// Maximum crawl depth (overrides the config file)
        #[arg(long)]
        depth: Option<u32>,

        /// Crawl strategy (overrides the config file)
        #[arg(long, value_enum)]
        mode: Option<CrawlMode>,

        /// In-flight step limit for the limited strategy
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Expand one URL and publish its links for the manager
    Worker {
        #[arg(long)]
        site: String,

        /// Crawl job this expansion reports under
        #[arg(long)]
        id: Uuid,
    },

    /// Run the distributed crawl manager until interrupted
    Manager,

    /// Ask the manager to map a site
    Submit {
        #[arg(long)]
        url: String,

        #[arg(long, default_value_t = 1)]
        max_depth: u32,
    },

    /// Print a stored sitemap
    Report {
        #[arg(long)]
        id: Uuid,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let config = load(cli.config.as_ref())?;

    match cli.command {
        Command::Map {
            site,
            depth,
            mode,
            limit,
        } => handle_map(config, &site, depth, mode, limit).await,
        Command::Worker { site, id } => handle_worker(&config, &site, id).await,
        Command::Manager => handle_manager(&config).await,
        Command::Submit { url, max_depth } => handle_submit(&config, &url, max_depth).await,
        Command::Report { id } => handle_report(&config, id),
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
///
/// Logs go to stderr so that stdout carries only JSON output.
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sitemapper=info,warn"),
            1 => EnvFilter::new("sitemapper=debug,info"),
            2 => EnvFilter::new("sitemapper=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Loads the configuration file, or the built-in defaults when none is given
fn load(path: Option<&PathBuf>) -> anyhow::Result<Config> {
    let Some(path) = path else {
        tracing::debug!("No configuration file given, using defaults");
        return Ok(Config::default());
    };

    tracing::info!("Loading configuration from: {}", path.display());
    let (config, hash) = load_config_with_hash(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", hash);

    Ok(config)
}

/// Handles `map`: embedded crawl with the sitemap written to stdout
async fn handle_map(
    mut config: Config,
    site: &str,
    depth: Option<u32>,
    mode: Option<CrawlMode>,
    limit: Option<usize>,
) -> anyhow::Result<()> {
    if let Some(depth) = depth {
        config.crawler.max_depth = depth;
    }
    if let Some(mode) = mode {
        config.crawler.mode = mode;
    }
    if let Some(limit) = limit {
        config.crawler.limit = limit;
    }
    validate(&config)?;

    let root = parse_site(&site.to_lowercase())?;
    let sitemap = Arc::new(SiteMap::new());
    let engine = CrawlEngine::from_config(&config.crawler, Arc::clone(&sitemap), root)?;

    let summary = engine.run().await;

    let count = write_sitemap_json(&sitemap, std::io::stdout().lock())?;
    tracing::info!("Mapped {} pages in {:?}", count, summary.elapsed);

    Ok(())
}

/// Handles `worker`: one single-level expansion reported over the bus
async fn handle_worker(config: &Config, site: &str, id: Uuid) -> anyhow::Result<()> {
    let bus_config = config.require_bus()?;
    let bus = NatsBus::connect(bus_config).await?;

    let crawl_id = id.to_string();
    run_worker(
        &config.crawler,
        &site.to_lowercase(),
        &crawl_id,
        &bus,
        &bus_config.results_subject,
    )
    .await
    .with_context(|| format!("Worker for crawl {} failed", crawl_id))?;

    bus.flush().await?;
    Ok(())
}

/// Handles `manager`: serve Start, Crawl and Results messages until a signal
async fn handle_manager(config: &Config) -> anyhow::Result<()> {
    let bus_config = config.require_bus()?;
    let store_config = config.require_store()?;
    let launcher_config = config.require_launcher()?;

    let store = open_store(&store_config.database_path).with_context(|| {
        format!(
            "Failed to open store at {}",
            store_config.database_path.display()
        )
    })?;
    store.health_check()?;
    let bus = NatsBus::connect(bus_config).await?;
    let deliveries = bus.subscribe_all().await?;

    let manager = CrawlManager::new(
        Arc::new(Mutex::new(store)),
        Arc::new(bus.clone()),
        Arc::new(ProcessLauncher::new(launcher_config)),
        bus.subjects().clone(),
    );

    if let Some(ready_file) = &config.manager.ready_file {
        std::fs::write(ready_file, b"ready\n")
            .with_context(|| format!("Failed to write {}", ready_file.display()))?;
    }
    tracing::info!("Crawl manager ready");

    tokio::select! {
        _ = manager.serve(deliveries) => {}
        _ = shutdown_signal() => tracing::info!("Shutting down crawl manager"),
    }

    Ok(())
}

/// Handles `submit`: publish a Start message for a fresh sitemap
async fn handle_submit(config: &Config, url: &str, max_depth: u32) -> anyhow::Result<()> {
    let bus_config = config.require_bus()?;
    let root = parse_site(&url.to_lowercase())?;

    let message = StartMessage {
        sitemap_id: Uuid::new_v4().to_string(),
        url: root.to_string(),
        max_depth,
    };

    let bus = NatsBus::connect(bus_config).await?;
    publish_json(&bus, &bus_config.start_subject, &message).await?;
    bus.flush().await?;

    let response = SitemapCreateResponse::from(&message);
    println!("{}", serde_json::to_string_pretty(&response)?);

    Ok(())
}

/// Handles `report`: print a stored sitemap
fn handle_report(config: &Config, id: Uuid) -> anyhow::Result<()> {
    let store_config = config.require_store()?;
    let store = open_store(&store_config.database_path)?;

    let details = sitemap_details(&store, &id.to_string())?;
    println!("{}", serde_json::to_string_pretty(&details)?);

    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    tracing::warn!("Failed to listen for SIGTERM: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = terminate => {}
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

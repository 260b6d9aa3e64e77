//! Configuration module for Sitemapper
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use sitemapper::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("sitemapper.toml")).unwrap();
//! println!("Crawler will use max depth: {}", config.crawler.max_depth);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    BusConfig, Config, CrawlMode, CrawlerConfig, LauncherConfig, ManagerConfig, StoreConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash};
pub use validation::validate;

use crate::ConfigError;

impl Config {
    /// Returns the `[bus]` section or a fatal configuration error
    pub fn require_bus(&self) -> Result<&BusConfig, ConfigError> {
        self.bus.as_ref().ok_or(ConfigError::MissingSection("bus"))
    }

    /// Returns the `[store]` section or a fatal configuration error
    pub fn require_store(&self) -> Result<&StoreConfig, ConfigError> {
        self.store.as_ref().ok_or(ConfigError::MissingSection("store"))
    }

    /// Returns the `[launcher]` section or a fatal configuration error
    pub fn require_launcher(&self) -> Result<&LauncherConfig, ConfigError> {
        self.launcher
            .as_ref()
            .ok_or(ConfigError::MissingSection("launcher"))
    }
}

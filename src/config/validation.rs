use crate::config::types::{BusConfig, Config, CrawlMode, CrawlerConfig, LauncherConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    if let Some(bus) = &config.bus {
        validate_bus_config(bus)?;
    }
    if let Some(store) = &config.store {
        if store.database_path.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "database-path cannot be empty".to_string(),
            ));
        }
    }
    if let Some(launcher) = &config.launcher {
        validate_launcher_config(launcher)?;
    }
    Ok(())
}

/// Validates crawler configuration
pub(crate) fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.mode == CrawlMode::Limited && config.limit < 1 {
        return Err(ConfigError::Validation(format!(
            "limit must be >= 1 in limited mode, got {}",
            config.limit
        )));
    }

    if config.request_timeout_secs < 1 || config.request_timeout_secs > 120 {
        return Err(ConfigError::Validation(format!(
            "request-timeout-secs must be between 1 and 120, got {}",
            config.request_timeout_secs
        )));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates bus configuration
fn validate_bus_config(config: &BusConfig) -> Result<(), ConfigError> {
    let server = Url::parse(&config.server).map_err(|e| {
        ConfigError::InvalidUrl(format!("Invalid bus server '{}': {}", config.server, e))
    })?;
    if server.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(format!(
            "Bus server '{}' has no host",
            config.server
        )));
    }

    let subjects = [
        ("start-subject", &config.start_subject),
        ("crawl-subject", &config.crawl_subject),
        ("results-subject", &config.results_subject),
    ];

    for (key, subject) in &subjects {
        validate_subject(key, subject)?;
    }

    if config.start_subject == config.crawl_subject
        || config.start_subject == config.results_subject
        || config.crawl_subject == config.results_subject
    {
        return Err(ConfigError::Validation(
            "start-subject, crawl-subject and results-subject must be distinct".to_string(),
        ));
    }

    Ok(())
}

/// Validates a single subject name: non-empty, no whitespace or wildcards
fn validate_subject(key: &str, subject: &str) -> Result<(), ConfigError> {
    if subject.is_empty() {
        return Err(ConfigError::Validation(format!("{} cannot be empty", key)));
    }

    if subject
        .chars()
        .any(|c| c.is_whitespace() || c == '*' || c == '>')
    {
        return Err(ConfigError::Validation(format!(
            "{} must not contain whitespace or wildcards, got '{}'",
            key, subject
        )));
    }

    if subject.starts_with('.') || subject.ends_with('.') || subject.contains("..") {
        return Err(ConfigError::Validation(format!(
            "{} has an empty token, got '{}'",
            key, subject
        )));
    }

    Ok(())
}

/// Validates launcher configuration
fn validate_launcher_config(config: &LauncherConfig) -> Result<(), ConfigError> {
    if config.program.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "launcher program cannot be empty".to_string(),
        ));
    }

    if config.max_jobs < 1 {
        return Err(ConfigError::Validation(format!(
            "max-jobs must be >= 1, got {}",
            config.max_jobs
        )));
    }

    Ok(())
}

//! Worker launchers
//!
//! A launcher starts one isolated worker per crawl job. It reports quota
//! exhaustion separately from other failures because the manager retries
//! the former and abandons the latter.

use crate::config::LauncherConfig;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::process::Command;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// Errors raised when starting a worker
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("Worker quota exceeded")]
    QuotaExceeded,

    #[error("Failed to spawn worker: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("Launch failed: {0}")]
    Other(String),
}

/// Trait for starting workers
#[async_trait]
pub trait TaskLauncher: Send + Sync {
    /// Starts a worker that expands `url` and reports under `crawl_id`
    ///
    /// Returns once the worker has been started, not when it finishes.
    async fn launch(&self, crawl_id: &str, url: &str) -> Result<(), LaunchError>;
}

/// Launches each worker as a child process
///
/// The command line is `<program> <args...> worker --site <url> --id <crawl_id>`.
/// At most `max-jobs` children run at once; a launch beyond that fails with
/// [`LaunchError::QuotaExceeded`] instead of waiting.
pub struct ProcessLauncher {
    program: PathBuf,
    args: Vec<String>,
    quota: Arc<Semaphore>,
    max_jobs: usize,
}

impl ProcessLauncher {
    pub fn new(config: &LauncherConfig) -> Self {
        Self {
            program: config.program.clone(),
            args: config.args.clone(),
            quota: Arc::new(Semaphore::new(config.max_jobs)),
            max_jobs: config.max_jobs,
        }
    }

    /// Number of workers currently alive
    pub fn running(&self) -> usize {
        self.max_jobs - self.quota.available_permits()
    }
}

#[async_trait]
impl TaskLauncher for ProcessLauncher {
    async fn launch(&self, crawl_id: &str, url: &str) -> Result<(), LaunchError> {
        let permit = self
            .quota
            .clone()
            .try_acquire_owned()
            .map_err(|_| LaunchError::QuotaExceeded)?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg("worker")
            .arg("--site")
            .arg(url)
            .arg("--id")
            .arg(crawl_id)
            .spawn()?;

        debug!("Launched worker {:?} for {} ({})", child.id(), url, crawl_id);

        let crawl_id = crawl_id.to_string();
        tokio::spawn(async move {
            // The quota slot is held until the child exits
            let _permit = permit;
            match child.wait().await {
                Ok(status) if status.success() => debug!("Worker {} finished", crawl_id),
                Ok(status) => warn!("Worker {} exited with {}", crawl_id, status),
                Err(e) => warn!("Failed to wait for worker {}: {}", crawl_id, e),
            }
        });

        Ok(())
    }
}

/// Outcome a [`ScriptedLauncher`] returns for one launch attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedOutcome {
    Started,
    QuotaExceeded,
    Fail(String),
}

/// A launch that a [`ScriptedLauncher`] reported as started
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRequest {
    pub crawl_id: String,
    pub url: String,
}

/// Launcher that plays back scripted outcomes and records launches
///
/// Once the script is exhausted every attempt succeeds.
#[derive(Debug, Default)]
pub struct ScriptedLauncher {
    script: Mutex<VecDeque<ScriptedOutcome>>,
    launched: Mutex<Vec<LaunchRequest>>,
    attempts: AtomicUsize,
}

impl ScriptedLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a launcher that answers the first attempts with `outcomes`
    pub fn with_outcomes(outcomes: impl IntoIterator<Item = ScriptedOutcome>) -> Self {
        Self {
            script: Mutex::new(outcomes.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Launches that were reported as started
    pub fn launches(&self) -> Vec<LaunchRequest> {
        self.launched
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Started launches for one URL
    pub fn launch_count_for(&self, url: &str) -> usize {
        self.launched
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|l| l.url == url)
            .count()
    }

    /// Every attempt, whatever its outcome
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TaskLauncher for ScriptedLauncher {
    async fn launch(&self, crawl_id: &str, url: &str) -> Result<(), LaunchError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        let outcome = self
            .script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or(ScriptedOutcome::Started);

        match outcome {
            ScriptedOutcome::Started => {
                self.launched
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .push(LaunchRequest {
                        crawl_id: crawl_id.to_string(),
                        url: url.to_string(),
                    });
                Ok(())
            }
            ScriptedOutcome::QuotaExceeded => Err(LaunchError::QuotaExceeded),
            ScriptedOutcome::Fail(reason) => Err(LaunchError::Other(reason)),
        }
    }
}

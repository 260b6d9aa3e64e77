//! Depth-bounded, deduplicated site traversal
//!
//! Every strategy runs the same step, [`CrawlEngine::expand`]:
//!
//! 1. If the URL sits at the maximum depth, record it as a leaf and stop
//! 2. Claim the URL in the sitemap; stop if it was already claimed
//! 3. Fetch, extract hrefs, normalize them against the root and the page
//! 4. Record the links and hand them back as tasks one level deeper
//!
//! Strategies differ only in how the returned tasks are submitted, which is
//! the job of the private `Dispatcher`.

use crate::config::{CrawlMode, CrawlerConfig};
use crate::crawler::fetcher::{build_http_client, fetch_page, FetchResult};
use crate::crawler::limiter::Limiter;
use crate::crawler::parser::extract_links;
use crate::state::SiteMap;
use crate::url::{is_same_site, normalize_links, site_host};
use reqwest::Client;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use url::Url;

/// How discovered links are scheduled
#[derive(Debug, Clone)]
pub enum Strategy {
    /// Depth-first, one step at a time on the calling task
    Synchronous,
    /// One spawned task per discovered link, unbounded
    Concurrent,
    /// One spawned task per discovered link, each admitted through the limiter
    Limited(Arc<Limiter>),
}

impl Strategy {
    /// Builds the strategy selected by the crawler configuration
    pub fn from_config(config: &CrawlerConfig) -> Self {
        match config.mode {
            CrawlMode::Synchronous => Self::Synchronous,
            CrawlMode::Concurrent => Self::Concurrent,
            CrawlMode::Limited => Self::Limited(Arc::new(Limiter::new(config.limit))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Synchronous => "synchronous",
            Self::Concurrent => "concurrent",
            Self::Limited(_) => "limited",
        }
    }
}

/// One pending step: a URL and the depth it was discovered at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlTask {
    pub url: String,
    pub depth: u32,
}

/// Outcome of a completed run
#[derive(Debug, Clone, Copy)]
pub struct CrawlSummary {
    /// Number of reached URLs (expanded pages plus depth-capped leaves)
    pub pages: usize,
    pub elapsed: Duration,
}

/// Traversal orchestrator
///
/// Cheap to clone; clones share the sitemap and HTTP client.
#[derive(Debug, Clone)]
pub struct CrawlEngine {
    sitemap: Arc<SiteMap>,
    root: Url,
    max_depth: u32,
    strategy: Strategy,
    client: Client,
}

impl CrawlEngine {
    /// Creates an engine for one crawl run
    ///
    /// # Arguments
    ///
    /// * `sitemap` - The visited set and link graph this run fills in
    /// * `root` - Start URL; also the site whose hosts are in scope
    /// * `max_depth` - URLs discovered at this depth are recorded as leaves, not fetched
    /// * `strategy` - How discovered links are scheduled
    /// * `client` - HTTP client used for every fetch
    pub fn new(
        sitemap: Arc<SiteMap>,
        root: Url,
        max_depth: u32,
        strategy: Strategy,
        client: Client,
    ) -> Self {
        Self {
            sitemap,
            root,
            max_depth,
            strategy,
            client,
        }
    }

    /// Creates an engine with the client and strategy the configuration describes
    pub fn from_config(
        config: &CrawlerConfig,
        sitemap: Arc<SiteMap>,
        root: Url,
    ) -> Result<Self, reqwest::Error> {
        let client = build_http_client(config)?;
        Ok(Self::new(
            sitemap,
            root,
            config.max_depth,
            Strategy::from_config(config),
            client,
        ))
    }

    pub fn sitemap(&self) -> &Arc<SiteMap> {
        &self.sitemap
    }

    pub fn root(&self) -> &Url {
        &self.root
    }

    /// Crawls from the root until every reachable branch has stopped
    ///
    /// Returns once all submitted steps, including descendants of spawned
    /// ones, have finished.
    pub async fn run(&self) -> CrawlSummary {
        let started = Instant::now();
        info!(
            "Crawling {} with depth {} ({})",
            self.root,
            self.max_depth,
            self.strategy.name()
        );

        // The root is fetched as given; the sitemap keys it canonically
        let mut dispatcher = Dispatcher::for_strategy(&self.strategy);
        dispatcher.submit_all(
            self,
            vec![CrawlTask {
                url: self.root.to_string(),
                depth: 0,
            }],
        );

        while let Some(children) = dispatcher.next(self).await {
            dispatcher.submit_all(self, children);
        }

        let summary = CrawlSummary {
            pages: self.sitemap.len(),
            elapsed: started.elapsed(),
        };
        info!(
            "Crawl of {} finished: {} pages in {:?}",
            self.root, summary.pages, summary.elapsed
        );
        summary
    }

    /// Performs one traversal step and returns the next level of tasks
    pub async fn expand(&self, task: CrawlTask) -> Vec<CrawlTask> {
        // A leaf does not block a later, shallower arrival from expanding the URL
        if task.depth >= self.max_depth {
            self.sitemap.mark_leaf(&task.url);
            debug!("Not fetching {}: depth {} reached", task.url, task.depth);
            return Vec::new();
        }

        if !self.sitemap.claim(&task.url) {
            debug!("Skipping {}: already claimed", task.url);
            return Vec::new();
        }

        let (final_url, body) = match fetch_page(&self.client, &task.url).await {
            FetchResult::Success {
                final_url, body, ..
            } => (final_url, body),
            FetchResult::HttpError { status_code } => {
                debug!("{} returned HTTP {}", task.url, status_code);
                return Vec::new();
            }
            FetchResult::NetworkError { error } => {
                warn!("Failed to fetch {}: {}", task.url, error);
                return Vec::new();
            }
        };

        let Some(parent) = self.parent_for(&task.url, &final_url) else {
            return Vec::new();
        };

        let hrefs = extract_links(&body);
        let links = normalize_links(&hrefs, &self.root, &parent);
        debug!(
            "{} (depth {}): {} hrefs, {} links",
            task.url,
            task.depth,
            hrefs.len(),
            links.len()
        );

        if links.is_empty() {
            return Vec::new();
        }

        self.sitemap.record_links(&task.url, &links);

        links
            .into_iter()
            .map(|url| CrawlTask {
                url,
                depth: task.depth + 1,
            })
            .collect()
    }

    /// Page URL that relative hrefs resolve against
    ///
    /// The post-redirect URL when it is still on the site, else the requested one.
    fn parent_for(&self, requested: &str, final_url: &str) -> Option<Url> {
        let root_host = site_host(&self.root).unwrap_or_default();

        Url::parse(final_url)
            .ok()
            .filter(|url| {
                site_host(url)
                    .map(|host| is_same_site(&host, &root_host))
                    .unwrap_or(false)
            })
            .or_else(|| Url::parse(requested).ok())
    }

    /// Spawns one step onto the join set, routed through the limiter if any
    fn spawn_step(&self, set: &mut JoinSet<Vec<CrawlTask>>, task: CrawlTask) {
        let engine = self.clone();
        match &self.strategy {
            Strategy::Limited(limiter) => {
                let limiter = Arc::clone(limiter);
                set.spawn(async move {
                    limiter
                        .run_with_backoff(|| engine.expand(task.clone()))
                        .await
                });
            }
            Strategy::Synchronous | Strategy::Concurrent => {
                set.spawn(async move { engine.expand(task).await });
            }
        }
    }
}

/// Submits steps and yields the children of each finished one
enum Dispatcher {
    /// Work stack drained on the calling task; depth-first
    Inline(Vec<CrawlTask>),
    /// Join barrier over spawned steps
    Spawned(JoinSet<Vec<CrawlTask>>),
}

impl Dispatcher {
    fn for_strategy(strategy: &Strategy) -> Self {
        match strategy {
            Strategy::Synchronous => Self::Inline(Vec::new()),
            Strategy::Concurrent | Strategy::Limited(_) => Self::Spawned(JoinSet::new()),
        }
    }

    fn submit_all(&mut self, engine: &CrawlEngine, tasks: Vec<CrawlTask>) {
        match self {
            // Reversed so the first link is expanded first
            Self::Inline(stack) => stack.extend(tasks.into_iter().rev()),
            Self::Spawned(set) => {
                for task in tasks {
                    engine.spawn_step(set, task);
                }
            }
        }
    }

    /// Children of the next finished step, or None when nothing is left
    async fn next(&mut self, engine: &CrawlEngine) -> Option<Vec<CrawlTask>> {
        match self {
            Self::Inline(stack) => {
                let task = stack.pop()?;
                Some(engine.expand(task).await)
            }
            Self::Spawned(set) => loop {
                match set.join_next().await? {
                    Ok(children) => return Some(children),
                    Err(e) => warn!("Crawl step aborted: {}", e),
                }
            },
        }
    }
}

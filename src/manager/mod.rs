//! Distributed crawl manager
//!
//! The manager is a message-driven state machine that reproduces the embedded
//! engine's depth-bounded, deduplicated expansion across worker processes:
//!
//! - **Start** records the sitemap and emits the first Crawl at depth 1
//! - **Crawl** prunes by depth, claims the URL in the store, launches a worker
//! - **Results** stores each link set and emits Crawl messages one level deeper
//!
//! The store is the only authority on what has been claimed. The bus only
//! signals, and every handler tolerates duplicate delivery.

mod launcher;
mod worker;

pub use launcher::{
    LaunchError, LaunchRequest, ProcessLauncher, ScriptedLauncher, ScriptedOutcome, TaskLauncher,
};
pub use worker::run_worker;

use crate::bus::{publish_json, Delivery, MessageBus, Subjects};
use crate::crawler::random_backoff;
use crate::protocol::{CrawlMessage, ResultsMessage, StartMessage};
use crate::state::JobStatus;
use crate::storage::{JobClaim, NewJob, SitemapStore, StorageError};
use crate::url::canonical;
use futures::{Stream, StreamExt};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Upper bound (exclusive) of the delay before a quota-rejected Crawl is re-published
pub const QUOTA_BACKOFF: Duration = Duration::from_millis(1000);

/// What a Start message led to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    /// Sitemap recorded; the first Crawl message carries `crawl_id`
    Started { crawl_id: String },
    /// The sitemap ID was already in use; nothing was emitted
    Conflict,
}

/// What a Crawl message led to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlOutcome {
    /// A worker was started and the job moved to CREATED
    Launched,
    /// The depth is beyond the sitemap's maximum
    DepthExceeded,
    /// The URL already has a job or a result in this sitemap
    AlreadyKnown,
    /// The launch quota was exhausted; the message was re-published
    Requeued,
    /// The launch failed for another reason; the job stays PENDING
    Abandoned,
}

/// Message-driven crawl orchestrator
pub struct CrawlManager<S> {
    store: Arc<Mutex<S>>,
    bus: Arc<dyn MessageBus>,
    launcher: Arc<dyn TaskLauncher>,
    subjects: Subjects,
}

impl<S> Clone for CrawlManager<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            bus: Arc::clone(&self.bus),
            launcher: Arc::clone(&self.launcher),
            subjects: self.subjects.clone(),
        }
    }
}

impl<S> CrawlManager<S>
where
    S: SitemapStore + Send + 'static,
{
    /// Creates a manager
    ///
    /// # Arguments
    ///
    /// * `store` - Durable store shared by every handler
    /// * `bus` - Where Crawl messages are published
    /// * `launcher` - Starts one worker per claimed job
    /// * `subjects` - Subject names of the three message kinds
    pub fn new(
        store: Arc<Mutex<S>>,
        bus: Arc<dyn MessageBus>,
        launcher: Arc<dyn TaskLauncher>,
        subjects: Subjects,
    ) -> Self {
        Self {
            store,
            bus,
            launcher,
            subjects,
        }
    }

    pub fn store(&self) -> &Arc<Mutex<S>> {
        &self.store
    }

    fn lock(&self) -> MutexGuard<'_, S> {
        self.store.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Records a new sitemap and emits the Crawl for its root at depth 1
    pub async fn handle_start(&self, message: StartMessage) -> crate::Result<StartOutcome> {
        info!(
            "[Start] sitemap {} for {} (max depth {})",
            message.sitemap_id, message.url, message.max_depth
        );

        Uuid::parse_str(&message.sitemap_id)?;
        let url = canonical(&message.url);

        let created = self
            .lock()
            .create_sitemap(&message.sitemap_id, &url, message.max_depth);
        match created {
            Ok(()) => {}
            Err(StorageError::SitemapExists(id)) => {
                warn!("[Start] sitemap {} already exists, ignoring", id);
                return Ok(StartOutcome::Conflict);
            }
            Err(e) => return Err(e.into()),
        }

        let crawl = CrawlMessage::new(&message.sitemap_id, &url, 1);
        publish_json(self.bus.as_ref(), &self.subjects.crawl, &crawl).await?;

        Ok(StartOutcome::Started { crawl_id: crawl.id })
    }

    /// Claims one URL for expansion and launches its worker
    pub async fn handle_crawl(&self, message: CrawlMessage) -> crate::Result<CrawlOutcome> {
        info!(
            "[Crawl] {} at depth {} (crawl {})",
            message.url, message.depth, message.id
        );

        let max_depth = self.lock().max_depth(&message.sitemap_id)?;
        if message.depth > max_depth {
            debug!(
                "[Crawl] {} exceeds max depth {} of sitemap {}",
                message.url, max_depth, message.sitemap_id
            );
            return Ok(CrawlOutcome::DepthExceeded);
        }

        let job = NewJob {
            crawl_id: message.id.clone(),
            sitemap_id: message.sitemap_id.clone(),
            url: canonical(&message.url),
            depth: message.depth,
            max_depth,
        };

        let claim = self.lock().claim_job(&job)?;
        if claim == JobClaim::AlreadyKnown {
            debug!(
                "[Crawl] {} already known in sitemap {}",
                job.url, job.sitemap_id
            );
            return Ok(CrawlOutcome::AlreadyKnown);
        }

        match self.launcher.launch(&job.crawl_id, &job.url).await {
            Ok(()) => {
                let advanced = self.lock().advance_job(&job.crawl_id, JobStatus::Created)?;
                if !advanced {
                    debug!("[Crawl] job {} already past CREATED", job.crawl_id);
                }
                Ok(CrawlOutcome::Launched)
            }
            Err(LaunchError::QuotaExceeded) => {
                // Give the URL back so the re-published message can claim it again
                self.lock().release_job(&job.crawl_id)?;

                let delay = random_backoff(QUOTA_BACKOFF);
                warn!(
                    "[Crawl] worker quota exceeded for {}, retrying in {:?}",
                    job.url, delay
                );
                tokio::time::sleep(delay).await;

                publish_json(self.bus.as_ref(), &self.subjects.crawl, &message).await?;
                Ok(CrawlOutcome::Requeued)
            }
            Err(e) => {
                error!(
                    "[Crawl] failed to launch worker for {} (crawl {}): {}",
                    job.url, job.crawl_id, e
                );
                Ok(CrawlOutcome::Abandoned)
            }
        }
    }

    /// Stores a worker's results and emits the next level of Crawl messages
    ///
    /// Returns the number of Crawl messages emitted.
    pub async fn handle_results(&self, message: ResultsMessage) -> crate::Result<usize> {
        info!(
            "[Results] crawl {} with {} pages",
            message.crawl_id,
            message.results.len()
        );

        let job = self
            .lock()
            .job(&message.crawl_id)?
            .ok_or_else(|| StorageError::JobNotFound(message.crawl_id.clone()))?;

        if job.status.is_terminal() {
            warn!(
                "[Results] crawl {} is already {}, ignoring duplicate",
                job.crawl_id, job.status
            );
            return Ok(0);
        }

        let next_depth = job.depth + 1;
        let mut emitted = 0;

        for page in &message.results {
            self.lock()
                .write_results(&job.sitemap_id, &job.crawl_id, &page.url, &page.links)?;

            if next_depth > job.max_depth {
                continue;
            }

            for link in &page.links {
                let crawl = CrawlMessage::new(&job.sitemap_id, link, next_depth);
                publish_json(self.bus.as_ref(), &self.subjects.crawl, &crawl).await?;
                emitted += 1;
            }
        }

        self.lock().advance_job(&job.crawl_id, JobStatus::Complete)?;
        debug!(
            "[Results] crawl {} complete, {} crawls emitted",
            job.crawl_id, emitted
        );

        Ok(emitted)
    }

    /// Decodes one delivery and runs the matching handler
    pub async fn dispatch(&self, delivery: Delivery) -> crate::Result<()> {
        if delivery.subject == self.subjects.start {
            let message: StartMessage = serde_json::from_slice(&delivery.payload)?;
            self.handle_start(message).await?;
        } else if delivery.subject == self.subjects.crawl {
            let message: CrawlMessage = serde_json::from_slice(&delivery.payload)?;
            self.handle_crawl(message).await?;
        } else if delivery.subject == self.subjects.results {
            let message: ResultsMessage = serde_json::from_slice(&delivery.payload)?;
            self.handle_results(message).await?;
        } else {
            warn!("Ignoring message on unexpected subject {}", delivery.subject);
        }
        Ok(())
    }

    /// Handles deliveries until the stream ends
    ///
    /// Each delivery runs on its own task, so a quota back-off never holds up
    /// other messages. Handler errors are logged and the message dropped.
    pub async fn serve<St>(&self, mut deliveries: St)
    where
        St: Stream<Item = Delivery> + Unpin,
    {
        while let Some(delivery) = deliveries.next().await {
            let manager = self.clone();
            tokio::spawn(async move {
                let subject = delivery.subject.clone();
                if let Err(e) = manager.dispatch(delivery).await {
                    error!("Failed to handle message on {}: {}", subject, e);
                }
            });
        }
        info!("Message stream closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::RecordingBus;
    use crate::storage::SqliteStore;
    use bytes::Bytes;

    const SITEMAP: &str = "0b8f7a52-3c1d-4e4f-9a6b-5d2e1f0c9b01";

    struct Harness {
        manager: CrawlManager<SqliteStore>,
        bus: Arc<RecordingBus>,
        launcher: Arc<ScriptedLauncher>,
    }

    fn subjects() -> Subjects {
        Subjects {
            start: "sitemap.start".to_string(),
            crawl: "sitemap.crawl".to_string(),
            results: "sitemap.results".to_string(),
        }
    }

    fn harness(launcher: ScriptedLauncher) -> Harness {
        let store = Arc::new(Mutex::new(SqliteStore::open_in_memory().unwrap()));
        let bus = Arc::new(RecordingBus::new());
        let launcher = Arc::new(launcher);
        let manager = CrawlManager::new(store, bus.clone(), launcher.clone(), subjects());
        Harness {
            manager,
            bus,
            launcher,
        }
    }

    fn start(max_depth: u32) -> StartMessage {
        StartMessage {
            sitemap_id: SITEMAP.to_string(),
            url: "https://h/".to_string(),
            max_depth,
        }
    }

    #[tokio::test]
    async fn test_start_emits_first_crawl() {
        let h = harness(ScriptedLauncher::new());
        let outcome = h.manager.handle_start(start(2)).await.unwrap();

        let crawls = h.bus.messages_for_subject("sitemap.crawl");
        assert_eq!(crawls.len(), 1);
        let crawl: CrawlMessage = h.bus.deserialize_message(&crawls[0]).unwrap();
        assert_eq!(crawl.url, "https://h");
        assert_eq!(crawl.depth, 1);
        assert_eq!(crawl.sitemap_id, SITEMAP);
        assert_eq!(
            outcome,
            StartOutcome::Started {
                crawl_id: crawl.id.clone()
            }
        );
    }

    #[tokio::test]
    async fn test_duplicate_start_is_conflict() {
        let h = harness(ScriptedLauncher::new());
        h.manager.handle_start(start(2)).await.unwrap();
        let outcome = h.manager.handle_start(start(5)).await.unwrap();

        assert_eq!(outcome, StartOutcome::Conflict);
        assert_eq!(h.bus.publish_count_for("sitemap.crawl"), 1);
        assert_eq!(h.manager.lock().max_depth(SITEMAP).unwrap(), 2);
    }

    #[tokio::test]
    async fn test_start_with_invalid_id_is_reported() {
        let h = harness(ScriptedLauncher::new());
        let mut message = start(1);
        message.sitemap_id = "not-a-uuid".to_string();

        assert!(h.manager.handle_start(message).await.is_err());
        assert_eq!(h.bus.publish_count(), 0);
    }

    #[tokio::test]
    async fn test_crawl_launches_and_marks_created() {
        let h = harness(ScriptedLauncher::new());
        h.manager.handle_start(start(2)).await.unwrap();

        let crawl = CrawlMessage::new(SITEMAP, "https://h", 1);
        let outcome = h.manager.handle_crawl(crawl.clone()).await.unwrap();

        assert_eq!(outcome, CrawlOutcome::Launched);
        assert_eq!(h.launcher.launches()[0].crawl_id, crawl.id);
        let job = h.manager.lock().job(&crawl.id).unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Created);
        assert_eq!(job.max_depth, 2);
    }

    #[tokio::test]
    async fn test_crawl_beyond_max_depth_is_pruned() {
        let h = harness(ScriptedLauncher::new());
        h.manager.handle_start(start(1)).await.unwrap();

        let crawl = CrawlMessage::new(SITEMAP, "https://h/deep", 2);
        let outcome = h.manager.handle_crawl(crawl.clone()).await.unwrap();

        assert_eq!(outcome, CrawlOutcome::DepthExceeded);
        assert_eq!(h.launcher.attempts(), 0);
        assert!(h.manager.lock().job(&crawl.id).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_crawl_for_unknown_sitemap_is_error() {
        let h = harness(ScriptedLauncher::new());
        let crawl = CrawlMessage::new(SITEMAP, "https://h", 1);
        assert!(h.manager.handle_crawl(crawl).await.is_err());
        assert_eq!(h.launcher.attempts(), 0);
    }

    #[tokio::test]
    async fn test_same_url_from_two_parents_launches_once() {
        let h = harness(ScriptedLauncher::new());
        h.manager.handle_start(start(3)).await.unwrap();

        let first = CrawlMessage::new(SITEMAP, "https://h/shared", 2);
        let second = CrawlMessage::new(SITEMAP, "https://h/shared/", 2);

        assert_eq!(
            h.manager.handle_crawl(first).await.unwrap(),
            CrawlOutcome::Launched
        );
        assert_eq!(
            h.manager.handle_crawl(second).await.unwrap(),
            CrawlOutcome::AlreadyKnown
        );
        assert_eq!(h.launcher.launch_count_for("https://h/shared"), 1);
    }

    #[tokio::test]
    async fn test_redelivered_crawl_is_noop() {
        let h = harness(ScriptedLauncher::new());
        h.manager.handle_start(start(2)).await.unwrap();

        let crawl = CrawlMessage::new(SITEMAP, "https://h", 1);
        h.manager.handle_crawl(crawl.clone()).await.unwrap();
        assert_eq!(
            h.manager.handle_crawl(crawl).await.unwrap(),
            CrawlOutcome::AlreadyKnown
        );
        assert_eq!(h.launcher.attempts(), 1);
    }

    #[tokio::test]
    async fn test_quota_exceeded_republishes_same_message() {
        let h = harness(ScriptedLauncher::with_outcomes([
            ScriptedOutcome::QuotaExceeded,
        ]));
        h.manager.handle_start(start(2)).await.unwrap();
        h.bus.drain();

        let crawl = CrawlMessage::new(SITEMAP, "https://h", 1);
        let outcome = h.manager.handle_crawl(crawl.clone()).await.unwrap();
        assert_eq!(outcome, CrawlOutcome::Requeued);

        let requeued = h.bus.drain();
        assert_eq!(requeued.len(), 1);
        let again: CrawlMessage = h.bus.deserialize_message(&requeued[0]).unwrap();
        assert_eq!(again, crawl);
        assert!(h.manager.lock().job(&crawl.id).unwrap().is_none());

        // The re-published message claims and launches normally
        assert_eq!(
            h.manager.handle_crawl(again).await.unwrap(),
            CrawlOutcome::Launched
        );
        assert_eq!(h.launcher.launches().len(), 1);
    }

    #[tokio::test]
    async fn test_other_launch_failure_leaves_job_pending() {
        let h = harness(ScriptedLauncher::with_outcomes([ScriptedOutcome::Fail(
            "no such image".to_string(),
        )]));
        h.manager.handle_start(start(2)).await.unwrap();
        h.bus.drain();

        let crawl = CrawlMessage::new(SITEMAP, "https://h", 1);
        let outcome = h.manager.handle_crawl(crawl.clone()).await.unwrap();

        assert_eq!(outcome, CrawlOutcome::Abandoned);
        assert_eq!(h.bus.publish_count(), 0);
        let job = h.manager.lock().job(&crawl.id).unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Pending);
    }

    #[tokio::test]
    async fn test_results_emit_next_level_and_complete_job() {
        let h = harness(ScriptedLauncher::new());
        h.manager.handle_start(start(2)).await.unwrap();
        let crawl = CrawlMessage::new(SITEMAP, "https://h", 1);
        h.manager.handle_crawl(crawl.clone()).await.unwrap();
        h.bus.drain();

        let results = ResultsMessage {
            crawl_id: crawl.id.clone(),
            results: vec![crate::protocol::PageLinks {
                url: "https://h".to_string(),
                links: vec!["https://h/a".to_string(), "https://h/b".to_string()],
            }],
        };
        let emitted = h.manager.handle_results(results.clone()).await.unwrap();
        assert_eq!(emitted, 2);

        let crawls: Vec<CrawlMessage> = h
            .bus
            .messages_for_subject("sitemap.crawl")
            .iter()
            .map(|m| h.bus.deserialize_message(m).unwrap())
            .collect();
        assert!(crawls.iter().all(|c| c.depth == 2));
        assert_eq!(crawls[0].url, "https://h/a");

        let job = h.manager.lock().job(&crawl.id).unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Complete);
        assert_eq!(h.manager.lock().results(SITEMAP).unwrap().len(), 1);

        // Duplicate delivery of the same results does nothing
        assert_eq!(h.manager.handle_results(results).await.unwrap(), 0);
        assert_eq!(h.bus.publish_count_for("sitemap.crawl"), 2);
    }

    #[tokio::test]
    async fn test_results_at_max_depth_emit_nothing() {
        let h = harness(ScriptedLauncher::new());
        h.manager.handle_start(start(1)).await.unwrap();
        let crawl = CrawlMessage::new(SITEMAP, "https://h", 1);
        h.manager.handle_crawl(crawl.clone()).await.unwrap();
        h.bus.drain();

        let results = ResultsMessage {
            crawl_id: crawl.id.clone(),
            results: vec![crate::protocol::PageLinks {
                url: "https://h".to_string(),
                links: vec!["https://h/a".to_string()],
            }],
        };

        assert_eq!(h.manager.handle_results(results).await.unwrap(), 0);
        assert_eq!(h.bus.publish_count(), 0);
        assert_eq!(
            h.manager.lock().job(&crawl.id).unwrap().unwrap().status,
            JobStatus::Complete
        );
    }

    #[tokio::test]
    async fn test_results_for_unknown_crawl_is_error() {
        let h = harness(ScriptedLauncher::new());
        let results = ResultsMessage {
            crawl_id: "missing".to_string(),
            results: Vec::new(),
        };
        assert!(h.manager.handle_results(results).await.is_err());
    }

    #[tokio::test]
    async fn test_dispatch_routes_by_subject() {
        let h = harness(ScriptedLauncher::new());
        let payload = serde_json::to_vec(&start(1)).unwrap();

        h.manager
            .dispatch(Delivery {
                subject: "sitemap.start".to_string(),
                payload: Bytes::from(payload),
            })
            .await
            .unwrap();
        assert_eq!(h.bus.publish_count_for("sitemap.crawl"), 1);

        // Unknown subjects are ignored
        h.manager
            .dispatch(Delivery {
                subject: "sitemap.other".to_string(),
                payload: Bytes::from_static(b"{}"),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_dispatch_rejects_malformed_payload() {
        let h = harness(ScriptedLauncher::new());
        let result = h
            .manager
            .dispatch(Delivery {
                subject: "sitemap.crawl".to_string(),
                payload: Bytes::from_static(b"not json"),
            })
            .await;
        assert!(matches!(result, Err(crate::SitemapperError::Json(_))));
    }
}

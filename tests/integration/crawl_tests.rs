//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and test the embedded
//! engine and the distributed manager/worker cycle end-to-end.

use sitemapper::bus::{publish_json, Delivery, RecordingBus, Subjects};
use sitemapper::config::{CrawlMode, CrawlerConfig};
use sitemapper::crawler::build_http_client;
use sitemapper::manager::{
    run_worker, CrawlOutcome, ScriptedLauncher, ScriptedOutcome, StartOutcome,
};
use sitemapper::output::{sitemap_details, write_sitemap_json};
use sitemapper::protocol::{CrawlMessage, StartMessage};
use sitemapper::storage::{SitemapStore, SqliteStore};
use sitemapper::{CrawlEngine, CrawlManager, JobStatus, Limiter, SiteMap, Strategy};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SITEMAP_ID: &str = "6f1c2d3e-4b5a-4c6d-8e7f-9a0b1c2d3e4f";
const START: &str = "sitemap.start";
const CRAWL: &str = "sitemap.crawl";
const RESULTS: &str = "sitemap.results";

async fn mount_page(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "text/html"),
        )
        .mount(server)
        .await;
}

/// Root links to A and B; A and B link back to root and on to C
///
/// C must never be requested: it sits at depth 2.
async fn mount_cycle(server: &MockServer) {
    let base = server.uri();

    mount_page(
        server,
        "/",
        r#"<html><body><a href="/a">A</a><a href="/b">B</a></body></html>"#.to_string(),
    )
    .await;
    for page in ["/a", "/b"] {
        mount_page(
            server,
            page,
            format!(r#"<a href="{}">Home</a><a href="/c">C</a>"#, base),
        )
        .await;
    }
    Mock::given(method("GET"))
        .and(path("/c"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(server)
        .await;
}

fn engine(root: &str, max_depth: u32, strategy: Strategy) -> CrawlEngine {
    let root = Url::parse(root).unwrap();
    let client = build_http_client(&CrawlerConfig::default()).unwrap();
    CrawlEngine::new(Arc::new(SiteMap::new()), root, max_depth, strategy, client)
}

fn strategies() -> Vec<Strategy> {
    vec![
        Strategy::Synchronous,
        Strategy::Concurrent,
        Strategy::Limited(Arc::new(Limiter::new(1))),
    ]
}

#[tokio::test]
async fn test_cycle_is_mapped_once_with_every_strategy() {
    for strategy in strategies() {
        let server = MockServer::start().await;
        mount_cycle(&server).await;
        let base = server.uri();
        let name = strategy.name();

        let engine = engine(&base, 2, strategy);
        let summary = engine.run().await;
        let snapshot = engine.sitemap().snapshot();

        let keys: Vec<&String> = snapshot.keys().collect();
        let a = format!("{}/a", base);
        let b = format!("{}/b", base);
        let c = format!("{}/c", base);
        assert_eq!(keys, vec![&base, &a, &b, &c], "strategy {}", name);
        assert_eq!(summary.pages, 4);

        assert_eq!(snapshot[&base], vec![a.clone(), b.clone()]);
        assert_eq!(snapshot[&a], vec![base.clone(), c.clone()]);
        assert_eq!(snapshot[&b], vec![base.clone(), c.clone()]);
        assert!(snapshot[&c].is_empty());
    }
}

#[tokio::test]
async fn test_page_reached_at_two_depths_is_expanded_with_every_strategy() {
    for strategy in strategies() {
        let server = MockServer::start().await;
        let base = server.uri();
        let name = strategy.name();

        // Depth-first order reaches /b through /a (depth 2) before the root's
        // own link to /b (depth 1)
        mount_page(&server, "/", r#"<a href="/a">A</a><a href="/b">B</a>"#.to_string()).await;
        mount_page(&server, "/a", r#"<a href="/b">B</a>"#.to_string()).await;
        Mock::given(method("GET"))
            .and(path("/b"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"<a href="/d">D</a>"#)
                    .insert_header("content-type", "text/html"),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/d"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let engine = engine(&base, 2, strategy);
        engine.run().await;
        let snapshot = engine.sitemap().snapshot();

        let a = format!("{}/a", base);
        let b = format!("{}/b", base);
        let d = format!("{}/d", base);
        let keys: Vec<&String> = snapshot.keys().collect();
        assert_eq!(keys, vec![&base, &a, &b, &d], "strategy {}", name);
        assert_eq!(snapshot[&a], vec![b.clone()], "strategy {}", name);
        assert_eq!(snapshot[&b], vec![d.clone()], "strategy {}", name);
        assert!(snapshot[&d].is_empty());
    }
}

#[tokio::test]
async fn test_depth_zero_maps_only_the_root() {
    for strategy in strategies() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let engine = engine(&server.uri(), 0, strategy);
        engine.run().await;

        let snapshot = engine.sitemap().snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[&server.uri()], Vec::<String>::new());
    }
}

#[tokio::test]
async fn test_self_references_and_foreign_links_are_dropped() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        r##"
        <a href="/">Home</a>
        <a href="">Here</a>
        <a href="#top">Top</a>
        <a href="mailto:someone@example.com">Mail</a>
        <a href="https://elsewhere.example/page">Elsewhere</a>
        "##
        .to_string(),
    )
    .await;

    let engine = engine(&server.uri(), 3, Strategy::Concurrent);
    engine.run().await;

    let snapshot = engine.sitemap().snapshot();
    assert_eq!(snapshot.len(), 1);
    assert!(snapshot[&server.uri()].is_empty());
}

#[tokio::test]
async fn test_relative_links_resolve_against_the_page() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_page(&server, "/docs/", r#"<a href="intro.html">Intro</a>"#.to_string()).await;
    mount_page(
        &server,
        "/docs/intro.html",
        r#"<a href="../about?ref=intro">About</a><a href="./setup/">Setup</a>"#.to_string(),
    )
    .await;

    let engine = engine(&format!("{}/docs/", base), 2, Strategy::Synchronous);
    engine.run().await;

    let snapshot = engine.sitemap().snapshot();
    assert_eq!(
        snapshot[&format!("{}/docs", base)],
        vec![format!("{}/docs/intro.html", base)]
    );
    assert_eq!(
        snapshot[&format!("{}/docs/intro.html", base)],
        vec![format!("{}/about", base), format!("{}/docs/setup", base)]
    );
    assert!(snapshot.contains_key(&format!("{}/about", base)));
}

#[tokio::test]
async fn test_links_resolve_against_the_redirect_target() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_page(&server, "/", r#"<a href="/old">Old</a>"#.to_string()).await;
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(301).insert_header("location", "/new/"))
        .mount(&server)
        .await;
    mount_page(&server, "/new/", r#"<a href="page">Page</a>"#.to_string()).await;

    let engine = engine(&base, 2, Strategy::Concurrent);
    engine.run().await;

    assert_eq!(
        engine.sitemap().links(&format!("{}/old", base)),
        Some(vec![format!("{}/new/page", base)])
    );
}

#[tokio::test]
async fn test_engine_from_config_and_json_output() {
    let server = MockServer::start().await;
    mount_cycle(&server).await;
    let base = server.uri();

    let config = CrawlerConfig {
        max_depth: 1,
        mode: CrawlMode::Limited,
        limit: 2,
        ..CrawlerConfig::default()
    };
    let sitemap = Arc::new(SiteMap::new());
    let engine =
        CrawlEngine::from_config(&config, Arc::clone(&sitemap), Url::parse(&base).unwrap())
            .unwrap();
    engine.run().await;

    let mut buffer = Vec::new();
    let count = write_sitemap_json(&sitemap, &mut buffer).unwrap();
    assert_eq!(count, 3);

    let value: serde_json::Value = serde_json::from_slice(&buffer).unwrap();
    assert_eq!(value[0]["URL"], base);
    assert_eq!(
        value[0]["Links"],
        serde_json::json!([format!("{}/a", base), format!("{}/b", base)])
    );
    assert_eq!(value[1]["Links"], serde_json::json!([]));
}

struct Cluster {
    manager: CrawlManager<SqliteStore>,
    bus: Arc<RecordingBus>,
    launcher: Arc<ScriptedLauncher>,
}

fn cluster(launcher: ScriptedLauncher) -> Cluster {
    let store = Arc::new(Mutex::new(SqliteStore::open_in_memory().unwrap()));
    let bus = Arc::new(RecordingBus::new());
    let launcher = Arc::new(launcher);
    let subjects = Subjects {
        start: START.to_string(),
        crawl: CRAWL.to_string(),
        results: RESULTS.to_string(),
    };
    let manager = CrawlManager::new(store, bus.clone(), launcher.clone(), subjects);
    Cluster {
        manager,
        bus,
        launcher,
    }
}

impl Cluster {
    /// Delivers bus traffic to the manager and runs a worker for every launch
    /// until nothing is left to do
    async fn settle(&self) {
        let config = CrawlerConfig::default();
        let mut workers_run = 0;

        loop {
            let messages = self.bus.drain();
            for message in &messages {
                self.manager
                    .dispatch(Delivery::from(message.clone()))
                    .await
                    .unwrap();
            }

            let launches = self.launcher.launches();
            for launch in &launches[workers_run..] {
                run_worker(
                    &config,
                    &launch.url,
                    &launch.crawl_id,
                    self.bus.as_ref(),
                    RESULTS,
                )
                .await
                .unwrap();
            }

            if messages.is_empty() && launches.len() == workers_run {
                break;
            }
            workers_run = launches.len();
        }
    }

    fn store(&self) -> std::sync::MutexGuard<'_, SqliteStore> {
        self.manager.store().lock().unwrap()
    }
}

#[tokio::test]
async fn test_distributed_crawl_maps_cycle() {
    let server = MockServer::start().await;
    mount_cycle(&server).await;
    let base = server.uri();

    let cluster = cluster(ScriptedLauncher::new());
    let start = StartMessage {
        sitemap_id: SITEMAP_ID.to_string(),
        url: format!("{}/", base),
        max_depth: 2,
    };
    publish_json(cluster.bus.as_ref(), START, &start)
        .await
        .unwrap();

    cluster.settle().await;

    // Root at depth 1, A and B at depth 2; each URL launched exactly once
    assert_eq!(cluster.launcher.launches().len(), 3);
    assert_eq!(cluster.launcher.launch_count_for(&base), 1);

    let details = sitemap_details(&*cluster.store(), SITEMAP_ID).unwrap();
    assert_eq!(details.url, base);
    assert_eq!(details.max_depth, 2);
    assert_eq!(details.count, 3);

    let urls: Vec<&str> = details.results.iter().map(|r| r.url.as_str()).collect();
    let a = format!("{}/a", base);
    let b = format!("{}/b", base);
    assert_eq!(urls, vec![base.as_str(), a.as_str(), b.as_str()]);
    assert_eq!(details.results[0].links, vec![a.clone(), b.clone()]);
    assert_eq!(
        details.results[1].links,
        vec![base.clone(), format!("{}/c", base)]
    );

    for launch in cluster.launcher.launches() {
        let job = cluster.store().job(&launch.crawl_id).unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Complete);
    }
}

#[tokio::test]
async fn test_concurrent_duplicate_crawls_launch_once() {
    let cluster = cluster(ScriptedLauncher::new());
    cluster
        .manager
        .handle_start(StartMessage {
            sitemap_id: SITEMAP_ID.to_string(),
            url: "https://site.example".to_string(),
            max_depth: 3,
        })
        .await
        .unwrap();

    let first = CrawlMessage::new(SITEMAP_ID, "https://site.example/shared", 2);
    let second = CrawlMessage::new(SITEMAP_ID, "https://site.example/shared", 2);
    let (a, b) = tokio::join!(
        cluster.manager.handle_crawl(first),
        cluster.manager.handle_crawl(second)
    );

    let mut outcomes = vec![a.unwrap(), b.unwrap()];
    outcomes.sort_by_key(|o| *o == CrawlOutcome::Launched);
    assert_eq!(
        outcomes,
        vec![CrawlOutcome::AlreadyKnown, CrawlOutcome::Launched]
    );
    assert_eq!(
        cluster
            .launcher
            .launch_count_for("https://site.example/shared"),
        1
    );
}

#[tokio::test]
async fn test_quota_exhaustion_is_retried_until_launched() {
    let cluster = cluster(ScriptedLauncher::with_outcomes([
        ScriptedOutcome::QuotaExceeded,
    ]));
    let started = cluster
        .manager
        .handle_start(StartMessage {
            sitemap_id: SITEMAP_ID.to_string(),
            url: "https://site.example".to_string(),
            max_depth: 1,
        })
        .await
        .unwrap();
    let StartOutcome::Started { crawl_id } = started else {
        panic!("expected a started sitemap, got {:?}", started);
    };

    let first: CrawlMessage = {
        let messages = cluster.bus.drain();
        cluster.bus.deserialize_message(&messages[0]).unwrap()
    };
    assert_eq!(
        cluster.manager.handle_crawl(first.clone()).await.unwrap(),
        CrawlOutcome::Requeued
    );
    assert!(cluster.store().job(&crawl_id).unwrap().is_none());

    let retried: CrawlMessage = {
        let messages = cluster.bus.drain();
        assert_eq!(messages.len(), 1);
        cluster.bus.deserialize_message(&messages[0]).unwrap()
    };
    assert_eq!(retried, first);
    assert_eq!(
        cluster.manager.handle_crawl(retried).await.unwrap(),
        CrawlOutcome::Launched
    );

    assert_eq!(cluster.launcher.attempts(), 2);
    assert_eq!(
        cluster.store().job(&crawl_id).unwrap().unwrap().status,
        JobStatus::Created
    );
}

#[tokio::test]
async fn test_serve_survives_malformed_messages() {
    let cluster = cluster(ScriptedLauncher::new());
    let start = StartMessage {
        sitemap_id: SITEMAP_ID.to_string(),
        url: "https://site.example".to_string(),
        max_depth: 1,
    };
    let deliveries = vec![
        Delivery {
            subject: CRAWL.to_string(),
            payload: bytes::Bytes::from_static(b"{not json"),
        },
        Delivery {
            subject: START.to_string(),
            payload: bytes::Bytes::from(serde_json::to_vec(&start).unwrap()),
        },
    ];

    cluster
        .manager
        .serve(futures::stream::iter(deliveries))
        .await;

    // Handlers run on their own tasks; wait for the Start to be processed
    let mut emitted = false;
    for _ in 0..50 {
        if cluster.bus.publish_count_for(CRAWL) == 1 {
            emitted = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(emitted);
    assert_eq!(cluster.store().max_depth(SITEMAP_ID).unwrap(), 1);
}

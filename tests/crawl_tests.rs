//! Integration tests for the crawl engine and driver
//!
//! These tests drive full crawls through a scripted in-memory fetcher so the
//! traversal, failure handling and checkpoint behaviour can be checked
//! without network access.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use sumi_capture::config::{Config, CrawlerConfig, HttpConfig, OutputConfig, UserAgentConfig};
use sumi_capture::crawler::{
    prepare_session, run_crawl, EngineSettings, FetchResponse, Fetcher, HtmlLinkExtractor,
    RunOptions, TransportError,
};
use sumi_capture::state::FailureKind;
use sumi_capture::storage::{Checkpointer, MemoryBodyStore};
use sumi_capture::{CaptureError, CrawlEngine, CrawlSession, ScopePolicy, Step};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Fetcher answering from a script; unscripted URLs get a 404
#[derive(Default)]
struct ScriptedFetcher {
    responses: HashMap<String, Result<FetchResponse, TransportError>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    fn new() -> Self {
        Self::default()
    }

    fn page(mut self, url: &str, body: &str) -> Self {
        self.responses.insert(
            url.to_string(),
            Ok(FetchResponse {
                status: 200,
                content_type: Some("text/html; charset=utf-8".to_string()),
                body: body.as_bytes().to_vec(),
            }),
        );
        self
    }

    fn file(mut self, url: &str, content_type: &str, body: &[u8]) -> Self {
        self.responses.insert(
            url.to_string(),
            Ok(FetchResponse {
                status: 200,
                content_type: Some(content_type.to_string()),
                body: body.to_vec(),
            }),
        );
        self
    }

    fn failure(mut self, url: &str, kind: FailureKind, message: &str) -> Self {
        self.responses
            .insert(url.to_string(), Err(TransportError::new(kind, message)));
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn call_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for url in self.calls() {
            *counts.entry(url).or_insert(0) += 1;
        }
        counts
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchResponse, TransportError> {
        self.calls.lock().unwrap().push(url.to_string());
        self.responses.get(url.as_str()).cloned().unwrap_or_else(|| {
            Ok(FetchResponse {
                status: 404,
                content_type: Some("text/html".to_string()),
                body: b"not found".to_vec(),
            })
        })
    }
}

/// Fetcher that never completes
struct StalledFetcher;

#[async_trait]
impl Fetcher for StalledFetcher {
    async fn fetch(&self, _url: &Url) -> Result<FetchResponse, TransportError> {
        std::future::pending().await
    }
}

/// A small site: the seed links to two pages that share a link to /c,
/// plus an image, an external site and a mail address
fn small_site() -> ScriptedFetcher {
    ScriptedFetcher::new()
        .page(
            "https://target.tld/",
            r#"<a href="/a">A</a>
               <a href="https://target.tld/b?ref=home">B</a>
               <a href="https://other.tld/">Elsewhere</a>
               <a href="mailto:x@y.com">Mail</a>
               <img src="/logo.png"><a href="/logo.png">Logo</a>"#,
        )
        .page("https://target.tld/a", r#"<a href="/c">C</a><a href="/">Home</a>"#)
        .page("https://target.tld/b", r#"<a href="c#section">C</a>"#)
        .page("https://target.tld/c", "<p>leaf</p>")
        .file("https://target.tld/logo.png", "image/png", &[0x89, b'P', b'N', b'G', 0xff])
}

fn new_session() -> CrawlSession {
    CrawlSession::new("https://target.tld/", ScopePolicy::new("target.tld")).unwrap()
}

fn engine_with(session: CrawlSession, fetcher: Arc<dyn Fetcher>) -> CrawlEngine {
    CrawlEngine::new(
        session,
        fetcher,
        Arc::new(HtmlLinkExtractor),
        EngineSettings::default(),
        CancellationToken::new(),
    )
}

async fn run_to_end(engine: &mut CrawlEngine) -> usize {
    let mut steps = 0;
    while let Step::Captured(_) = engine.step().await.unwrap() {
        steps += 1;
    }
    steps
}

fn labels(session: &CrawlSession) -> BTreeMap<String, &'static str> {
    session
        .registry()
        .iter()
        .map(|resource| (resource.url().to_string(), resource.label()))
        .collect()
}

fn create_test_config(checkpoint_path: PathBuf) -> Config {
    Config {
        crawler: CrawlerConfig {
            target_domain: "target.tld".to_string(),
            seed: "https://target.tld/".to_string(),
            request_delay: 0,
            timeout_pause: 60,
            checkpoint_interval: 2,
            max_pages_per_run: 0,
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestCapture".to_string(),
            crawler_version: "1.0".to_string(),
            contact_url: "https://target.tld/about".to_string(),
            contact_email: "ops@target.tld".to_string(),
        },
        http: HttpConfig::default(),
        output: OutputConfig {
            checkpoint_path,
            body_store_path: None,
        },
    }
}

#[tokio::test]
async fn test_first_step_registers_only_in_scope_links() {
    let fetcher = Arc::new(ScriptedFetcher::new().page(
        "https://target.tld/",
        r#"<a href="https://target.tld/a">A</a>
           <a href="https://other.tld/">Other</a>
           <a href="mailto:x@y.com">Mail</a>"#,
    ));
    let mut engine = engine_with(new_session(), fetcher);

    match engine.step().await.unwrap() {
        Step::Captured(resource) => {
            assert_eq!(resource.url().as_str(), "https://target.tld/");
            assert_eq!(resource.label(), "fetched_page");
        }
        Step::EndOfCrawl => panic!("seed was not fetched"),
    }

    let registered: BTreeSet<_> = engine
        .session()
        .registry()
        .iter()
        .map(|resource| resource.url().to_string())
        .collect();
    assert_eq!(
        registered,
        BTreeSet::from([
            "https://target.tld/".to_string(),
            "https://target.tld/a".to_string()
        ])
    );

    let frontier: Vec<_> = engine
        .session()
        .frontier()
        .sorted()
        .iter()
        .map(|url| url.to_string())
        .collect();
    assert_eq!(frontier, vec!["https://target.tld/a".to_string()]);
    assert_eq!(engine.remaining_count(), 1);
}

#[tokio::test]
async fn test_full_crawl_small_site() {
    let fetcher = Arc::new(small_site());
    let mut engine = engine_with(new_session(), fetcher.clone());

    let steps = run_to_end(&mut engine).await;
    assert_eq!(steps, 5);
    assert!(engine.session().is_complete());

    let session = engine.session();
    assert_eq!(
        labels(session),
        BTreeMap::from([
            ("https://target.tld/".to_string(), "fetched_page"),
            ("https://target.tld/a".to_string(), "fetched_page"),
            ("https://target.tld/b".to_string(), "fetched_page"),
            ("https://target.tld/c".to_string(), "fetched_page"),
            ("https://target.tld/logo.png".to_string(), "fetched_opaque"),
        ])
    );

    let logo = session
        .registry()
        .iter()
        .find(|resource| resource.url().as_str().ends_with("logo.png"))
        .unwrap();
    assert_eq!(logo.body().unwrap().as_bytes(), &[0x89, b'P', b'N', b'G', 0xff]);
    assert!(logo.links().is_none());

    let seed = session
        .registry()
        .iter()
        .find(|resource| resource.url().as_str() == "https://target.tld/")
        .unwrap();
    assert_eq!(seed.links().unwrap().len(), 3);
}

#[tokio::test]
async fn test_each_resource_fetched_once_in_any_order() {
    // The frontier order is arbitrary; repeat so different orders get exercised
    let mut outcomes = BTreeSet::new();
    for _ in 0..25 {
        let fetcher = Arc::new(small_site());
        let mut engine = engine_with(new_session(), fetcher.clone());
        run_to_end(&mut engine).await;

        assert!(fetcher.call_counts().values().all(|&count| count == 1));
        assert_eq!(fetcher.calls().len(), engine.session().registry().len());
        assert_eq!(fetcher.calls()[0], "https://target.tld/");
        outcomes.insert(labels(engine.session()));
    }
    assert_eq!(outcomes.len(), 1);
}

#[tokio::test]
async fn test_shared_link_registered_once() {
    let fetcher = Arc::new(small_site());
    let mut engine = engine_with(new_session(), fetcher.clone());
    run_to_end(&mut engine).await;

    let c_entries = engine
        .session()
        .registry()
        .iter()
        .filter(|resource| resource.url().as_str() == "https://target.tld/c")
        .count();
    assert_eq!(c_entries, 1);
    assert_eq!(fetcher.call_counts()["https://target.tld/c"], 1);
}

#[tokio::test]
async fn test_failures_recorded_and_crawl_continues() {
    let fetcher = Arc::new(
        ScriptedFetcher::new()
            .page(
                "https://target.tld/",
                r#"<a href="/tls">T</a><a href="/down">D</a><a href="/missing">M</a><a href="/ok">O</a>"#,
            )
            .failure("https://target.tld/tls", FailureKind::Tls, "certificate expired")
            .failure(
                "https://target.tld/down",
                FailureKind::Connection,
                "connection refused",
            )
            .page("https://target.tld/ok", "<p>fine</p>"),
    );
    let mut engine = engine_with(new_session(), fetcher.clone());

    assert_eq!(run_to_end(&mut engine).await, 5);

    let session = engine.session();
    let failure = |path: &str| {
        session
            .registry()
            .iter()
            .find(|resource| resource.url().as_str() == format!("https://target.tld{}", path))
            .and_then(|resource| resource.failure().map(|(kind, detail)| (kind, detail.to_string())))
    };
    assert_eq!(
        failure("/tls"),
        Some((FailureKind::Tls, "certificate expired".to_string()))
    );
    assert_eq!(failure("/down").map(|f| f.0), Some(FailureKind::Connection));
    assert_eq!(
        failure("/missing"),
        Some((FailureKind::HttpError, "HTTP 404 Not Found".to_string()))
    );
    assert_eq!(failure("/ok"), None);

    let progress = engine.progress();
    assert_eq!(progress.captured, 2);
    assert_eq!(progress.failed, 3);
    assert_eq!(progress.remaining, 0);

    // Failed resources are never fetched again within the session
    assert!(matches!(engine.step().await.unwrap(), Step::EndOfCrawl));
    assert_eq!(fetcher.calls().len(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_pauses_next_step() {
    let fetcher = Arc::new(
        ScriptedFetcher::new()
            .page("https://target.tld/", r#"<a href="/b">B</a><a href="/c">C</a>"#)
            .failure("https://target.tld/b", FailureKind::Timeout, "operation timed out")
            .page("https://target.tld/c", "<p>c</p>"),
    );
    let pause = Duration::from_secs(30);
    let mut engine = CrawlEngine::new(
        new_session(),
        fetcher.clone(),
        Arc::new(HtmlLinkExtractor),
        EngineSettings {
            timeout_pause: pause,
        },
        CancellationToken::new(),
    );

    let mut previous_was_timeout = false;
    loop {
        let started = tokio::time::Instant::now();
        let step = engine.step().await.unwrap();
        let elapsed = started.elapsed();

        let fetched = matches!(step, Step::Captured(_));
        if previous_was_timeout && fetched {
            assert!(elapsed >= pause, "fetch after timeout waited {:?}", elapsed);
        } else {
            // The first step and the final end of crawl never wait
            assert!(elapsed < pause, "step waited {:?} without a pending fetch", elapsed);
        }

        match step {
            Step::Captured(resource) => {
                previous_was_timeout =
                    matches!(resource.failure(), Some((FailureKind::Timeout, _)));
            }
            Step::EndOfCrawl => break,
        }
    }

    let b = engine
        .session()
        .registry()
        .iter()
        .find(|resource| resource.url().as_str() == "https://target.tld/b")
        .unwrap();
    assert_eq!(b.label(), "fetch_failed");
    assert_eq!(b.failure().map(|f| f.0), Some(FailureKind::Timeout));
    assert_eq!(fetcher.calls().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_fetch_keeps_resource_unfetched() {
    let mut engine = engine_with(new_session(), Arc::new(StalledFetcher));
    let cancel = engine.cancellation_token().clone();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
    });

    assert!(matches!(engine.step().await, Err(CaptureError::Cancelled)));

    let session = engine.session();
    assert_eq!(session.remaining_count(), 1);
    assert!(session.registry().iter().all(|resource| resource.is_unfetched()));
}

#[tokio::test]
async fn test_checkpoint_resume_finishes_without_refetching() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("checkpoint.json");
    let fetcher = Arc::new(small_site());

    let mut first = engine_with(new_session(), fetcher.clone());
    for _ in 0..2 {
        assert!(matches!(first.step().await.unwrap(), Step::Captured(_)));
    }
    let mut checkpointer = Checkpointer::inline();
    checkpointer.save_to_path(first.session(), &path).unwrap();
    let interrupted = first.into_session();

    let restored = checkpointer.load_from_path(&path).unwrap();
    assert_eq!(labels(&restored), labels(&interrupted));
    assert_eq!(restored.frontier().sorted(), interrupted.frontier().sorted());

    let mut second = engine_with(restored, fetcher.clone());
    run_to_end(&mut second).await;

    assert!(second.session().is_complete());
    assert_eq!(second.session().registry().len(), 5);
    assert!(fetcher.call_counts().values().all(|&count| count == 1));
}

#[tokio::test]
async fn test_checkpoint_round_trip_with_body_store() {
    let fetcher = Arc::new(small_site());
    let mut engine = engine_with(new_session(), fetcher);
    run_to_end(&mut engine).await;
    let session = engine.into_session();

    let mut checkpointer = Checkpointer::with_body_store(Box::new(MemoryBodyStore::new()));
    let bytes = checkpointer.save(&session).unwrap();
    let restored = checkpointer.load(&bytes).unwrap();

    for resource in session.registry().iter() {
        let other = restored.resource(resource.url()).unwrap();
        assert_eq!(other.state(), resource.state());
    }
    assert_eq!(restored.registry().len(), session.registry().len());
    assert!(restored.is_complete());
}

#[tokio::test]
async fn test_corrupt_checkpoint_aborts_startup() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("checkpoint.json");
    std::fs::write(&path, b"{ not a checkpoint").unwrap();

    let config = create_test_config(path.clone());
    let result = prepare_session(&config, "hash", &Checkpointer::inline(), false);
    assert!(matches!(result, Err(CaptureError::Storage(_))));

    // --fresh ignores the broken file
    let session = prepare_session(&config, "hash", &Checkpointer::inline(), true).unwrap();
    assert_eq!(session.remaining_count(), 1);
}

#[tokio::test]
async fn test_run_crawl_to_completion() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path().join("checkpoint.json"));
    let options = RunOptions::from_config(&config);
    let fetcher = Arc::new(small_site());
    let mut engine = engine_with(new_session(), fetcher);
    let mut checkpointer = Checkpointer::inline();

    let summary = run_crawl(&mut engine, &mut checkpointer, &options)
        .await
        .unwrap();

    assert!(summary.finished);
    assert_eq!(summary.steps, 5);
    // Every second step plus the final save
    assert_eq!(summary.checkpoints, 3);
    assert_eq!(summary.progress.remaining, 0);

    let saved = checkpointer.load_from_path(&options.checkpoint_path).unwrap();
    assert!(saved.is_complete());
    assert_eq!(labels(&saved), labels(engine.session()));
}

#[tokio::test]
async fn test_run_crawl_page_budget_then_resume() {
    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(dir.path().join("checkpoint.json"));
    config.crawler.max_pages_per_run = 2;
    let options = RunOptions::from_config(&config);
    let fetcher = Arc::new(small_site());
    let mut checkpointer = Checkpointer::inline();

    let mut engine = engine_with(new_session(), fetcher.clone());
    let summary = run_crawl(&mut engine, &mut checkpointer, &options)
        .await
        .unwrap();
    assert!(!summary.finished);
    assert_eq!(summary.steps, 2);

    let session = prepare_session(&config, "hash", &checkpointer, false).unwrap();
    assert_eq!(session.counts().attempted(), 2);

    let mut engine = engine_with(session, fetcher.clone());
    let unlimited = RunOptions {
        max_pages: None,
        ..options
    };
    let summary = run_crawl(&mut engine, &mut checkpointer, &unlimited)
        .await
        .unwrap();
    assert!(summary.finished);
    assert_eq!(summary.steps, 3);
    assert!(fetcher.call_counts().values().all(|&count| count == 1));
}

#[tokio::test(start_paused = true)]
async fn test_run_crawl_cancelled_saves_checkpoint() {
    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(dir.path().join("checkpoint.json"));
    config.crawler.request_delay = 10_000;
    config.crawler.checkpoint_interval = 100;
    let options = RunOptions::from_config(&config);
    let mut engine = engine_with(new_session(), Arc::new(small_site()));
    let cancel = engine.cancellation_token().clone();
    let mut checkpointer = Checkpointer::inline();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(15)).await;
        cancel.cancel();
    });

    let result = run_crawl(&mut engine, &mut checkpointer, &options).await;
    assert!(matches!(result, Err(CaptureError::Cancelled)));

    let saved = checkpointer.load_from_path(&options.checkpoint_path).unwrap();
    assert_eq!(saved.counts().attempted(), 2);
    assert_eq!(labels(&saved), labels(engine.session()));
}

#[tokio::test]
async fn test_retry_failed_requeues_across_sessions() {
    let failing = Arc::new(
        ScriptedFetcher::new()
            .page("https://target.tld/", r#"<a href="/flaky">F</a>"#)
            .failure("https://target.tld/flaky", FailureKind::Connection, "reset"),
    );
    let mut engine = engine_with(new_session(), failing);
    run_to_end(&mut engine).await;

    let mut session = engine.into_session();
    assert_eq!(session.counts().fetch_failed, 1);
    assert_eq!(session.requeue_failed(), 1);
    assert_eq!(session.remaining_count(), 1);

    let healthy = Arc::new(ScriptedFetcher::new().page("https://target.tld/flaky", "<p>ok</p>"));
    let mut engine = engine_with(session, healthy.clone());
    assert_eq!(run_to_end(&mut engine).await, 1);
    assert_eq!(healthy.calls(), vec!["https://target.tld/flaky".to_string()]);
    assert_eq!(engine.progress().failed, 0);
}

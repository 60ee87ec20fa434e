//! Integration tests for the crawl engine
//!
//! These tests use wiremock to create mock HTTP servers and run full
//! crawls end-to-end against them.

use crawlerbykc::crawler::{FetchError, HtmlParseData, HtmlParser, ParseData, ParseError};
use crawlerbykc::state::UrlState;
use crawlerbykc::storage::{frontier_db_path, SqliteStorage, Storage};
use crawlerbykc::{
    CrawlConfig, CrawlController, CrawlError, CrawlReport, Page, ShutdownHandle, WebCrawler,
    WebUrl,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// What every visitor instance of a test reports back
#[derive(Default)]
struct Journal {
    visited: Mutex<Vec<String>>,
    statuses: Mutex<Vec<(String, u16)>>,
    failures: Mutex<Vec<String>>,
    titles: Mutex<Vec<Option<String>>>,
    binary: Mutex<Vec<String>>,
    redirect_checks: AtomicUsize,
}

impl Journal {
    fn visited(&self) -> Vec<String> {
        let mut visited = self.visited.lock().unwrap().clone();
        visited.sort();
        visited
    }
}

/// Test visitor recording everything it sees
struct Recorder {
    journal: Arc<Journal>,
    reject_prefix: Option<String>,
    panic_on: Option<String>,
    stop_after_visit: Option<ShutdownHandle>,
}

impl Recorder {
    fn new(journal: &Arc<Journal>) -> Self {
        Self {
            journal: Arc::clone(journal),
            reject_prefix: None,
            panic_on: None,
            stop_after_visit: None,
        }
    }
}

impl WebCrawler for Recorder {
    fn should_visit(&self, referring: Option<&Page>, url: &WebUrl) -> bool {
        if referring.is_none() {
            self.journal.redirect_checks.fetch_add(1, Ordering::SeqCst);
        }
        match &self.reject_prefix {
            Some(prefix) => !url.path().starts_with(prefix.as_str()),
            None => true,
        }
    }

    fn visit(&mut self, page: &Page) -> anyhow::Result<()> {
        let path = page.url().path().to_string();
        if self.panic_on.as_deref() == Some(path.as_str()) {
            panic!("visitor exploded on {}", path);
        }
        if let Some(html) = page.html() {
            self.journal.titles.lock().unwrap().push(html.title.clone());
        }
        if page.parse_data().is_binary() {
            self.journal.binary.lock().unwrap().push(path.clone());
        }
        self.journal.visited.lock().unwrap().push(path);
        if let Some(handle) = &self.stop_after_visit {
            handle.shutdown();
        }
        Ok(())
    }

    fn handle_page_status_code(&mut self, url: &WebUrl, status: u16) {
        self.journal
            .statuses
            .lock()
            .unwrap()
            .push((url.path().to_string(), status));
    }

    fn on_fetch_failure(&mut self, url: &WebUrl, _error: &FetchError) {
        self.journal
            .failures
            .lock()
            .unwrap()
            .push(url.path().to_string());
    }
}

fn test_config(dir: &TempDir) -> CrawlConfig {
    CrawlConfig {
        storage_folder: dir.path().join("frontier"),
        politeness_delay: 0,
        user_agent_string: "TestBot/1.0".to_string(),
        connection_timeout: 2_000,
        socket_timeout: 5_000,
        ..CrawlConfig::default()
    }
}

fn html(links: &[&str]) -> ResponseTemplate {
    let anchors: String = links
        .iter()
        .map(|link| format!(r#"<a href="{}">{}</a>"#, link, link))
        .collect();
    ResponseTemplate::new(200).set_body_raw(
        format!(
            "<html><head><title>Test</title></head><body>{}</body></html>",
            anchors
        ),
        "text/html",
    )
}

async fn mount_page(server: &MockServer, page: &str, links: &[&str]) {
    Mock::given(method("GET"))
        .and(path(page))
        .respond_with(html(links))
        .mount(server)
        .await;
}

async fn mount_robots(server: &MockServer, body: &str) {
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/plain"))
        .mount(server)
        .await;
}

fn storage_of(dir: &TempDir) -> SqliteStorage {
    SqliteStorage::new(&frontier_db_path(&dir.path().join("frontier"))).unwrap()
}

/// Runs a crawl from `seed` with plain recorders
async fn crawl(config: CrawlConfig, seed: &str, workers: usize) -> (CrawlReport, Arc<Journal>) {
    let controller = CrawlController::new(config).unwrap();
    controller.add_seed(seed).unwrap();

    let journal = Arc::new(Journal::default());
    let factory = {
        let journal = Arc::clone(&journal);
        move || -> anyhow::Result<Recorder> { Ok(Recorder::new(&journal)) }
    };
    let report = controller.start(factory, workers).await.unwrap();
    (report, journal)
}

/// Number of GET requests per path, robots.txt excluded
async fn request_counts(server: &MockServer) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for request in server.received_requests().await.unwrap() {
        let path = request.url.path().to_string();
        if path != "/robots.txt" {
            *counts.entry(path).or_insert(0) += 1;
        }
    }
    counts
}

#[tokio::test]
async fn test_depth_and_page_ceilings() {
    let server = MockServer::start().await;
    mount_page(&server, "/", &["/a", "/b", "/c", "/d"]).await;
    for child in ["/a", "/b", "/c", "/d"] {
        mount_page(&server, child, &["/deeper"]).await;
    }
    mount_page(&server, "/deeper", &[]).await;

    let dir = TempDir::new().unwrap();
    let config = CrawlConfig {
        max_depth_of_crawling: 1,
        max_pages_to_fetch: 3,
        ..test_config(&dir)
    };
    let controller = CrawlController::new(config).unwrap();
    controller.add_seed(&format!("{}/", server.uri())).unwrap();

    let journal = Arc::new(Journal::default());
    let factory = {
        let journal = Arc::clone(&journal);
        move || -> anyhow::Result<Recorder> { Ok(Recorder::new(&journal)) }
    };
    let report = controller.start(factory, 2).await.unwrap();

    assert_eq!(report.fetched, 3);
    assert!(!report.stopped_early);
    assert_eq!(controller.frontier().accepted_count(), 3);
    assert_eq!(journal.visited(), vec!["/", "/a", "/b"]);

    let counts = request_counts(&server).await;
    assert!(!counts.contains_key("/c"));
    assert!(!counts.contains_key("/d"));
    assert!(!counts.contains_key("/deeper"));
}

#[tokio::test]
async fn test_seeds_only_at_depth_zero() {
    let server = MockServer::start().await;
    mount_page(&server, "/", &["/a"]).await;
    mount_page(&server, "/a", &[]).await;

    let dir = TempDir::new().unwrap();
    let config = CrawlConfig {
        max_depth_of_crawling: 0,
        ..test_config(&dir)
    };
    let controller = CrawlController::new(config).unwrap();
    controller.add_seed(&format!("{}/", server.uri())).unwrap();

    let journal = Arc::new(Journal::default());
    let factory = {
        let journal = Arc::clone(&journal);
        move || -> anyhow::Result<Recorder> { Ok(Recorder::new(&journal)) }
    };
    let report = controller.start(factory, 1).await.unwrap();

    assert_eq!(report.fetched, 1);
    assert_eq!(journal.visited(), vec!["/"]);
}

#[tokio::test]
async fn test_robots_disallow_is_never_fetched() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private/\n"),
        )
        .expect(1)
        .mount(&server)
        .await;
    mount_page(&server, "/", &["/private/page", "/public"]).await;
    mount_page(&server, "/private/page", &[]).await;
    mount_page(&server, "/public", &[]).await;

    let dir = TempDir::new().unwrap();
    let controller = CrawlController::new(test_config(&dir)).unwrap();
    controller.add_seed(&format!("{}/", server.uri())).unwrap();
    controller
        .add_seed(&format!("{}/private/seeded", server.uri()))
        .unwrap();

    let journal = Arc::new(Journal::default());
    let factory = {
        let journal = Arc::clone(&journal);
        move || -> anyhow::Result<Recorder> { Ok(Recorder::new(&journal)) }
    };
    let report = controller.start(factory, 2).await.unwrap();

    assert_eq!(journal.visited(), vec!["/", "/public"]);
    assert_eq!(report.stats.robots_denied, 1);

    let counts = request_counts(&server).await;
    assert!(!counts.contains_key("/private/page"));
    assert!(!counts.contains_key("/private/seeded"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_single_connection_per_host_never_overlaps() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    for page in ["/p1", "/p2", "/p3", "/p4"] {
        Mock::given(method("GET"))
            .and(path(page))
            .respond_with(html(&[]).set_delay(Duration::from_millis(100)))
            .mount(&server)
            .await;
    }

    let dir = TempDir::new().unwrap();
    let config = CrawlConfig {
        max_connections_per_host: 1,
        ..test_config(&dir)
    };
    let controller = CrawlController::new(config).unwrap();
    for page in ["/p1", "/p2", "/p3", "/p4"] {
        controller
            .add_seed(&format!("{}{}", server.uri(), page))
            .unwrap();
    }

    let journal = Arc::new(Journal::default());
    let factory = {
        let journal = Arc::clone(&journal);
        move || -> anyhow::Result<Recorder> { Ok(Recorder::new(&journal)) }
    };

    let started = Instant::now();
    let report = controller.start(factory, 2).await.unwrap();

    assert_eq!(report.fetched, 4);
    // Four 100ms responses served one at a time
    assert!(
        started.elapsed() >= Duration::from_millis(400),
        "fetches overlapped: {:?}",
        started.elapsed()
    );
}

#[tokio::test]
async fn test_politeness_delay_spaces_fetches() {
    let server = MockServer::start().await;
    mount_page(&server, "/", &["/a", "/b"]).await;
    mount_page(&server, "/a", &[]).await;
    mount_page(&server, "/b", &[]).await;

    let dir = TempDir::new().unwrap();
    let config = CrawlConfig {
        politeness_delay: 150,
        respect_robots_txt: false,
        ..test_config(&dir)
    };
    let controller = CrawlController::new(config).unwrap();
    controller.add_seed(&format!("{}/", server.uri())).unwrap();

    let journal = Arc::new(Journal::default());
    let factory = {
        let journal = Arc::clone(&journal);
        move || -> anyhow::Result<Recorder> { Ok(Recorder::new(&journal)) }
    };

    let started = Instant::now();
    let report = controller.start(factory, 3).await.unwrap();

    assert_eq!(report.fetched, 3);
    assert!(started.elapsed() >= Duration::from_millis(300));

    let robots_requests = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|request| request.url.path() == "/robots.txt")
        .count();
    assert_eq!(robots_requests, 0);
}

#[tokio::test]
async fn test_should_visit_rejection_is_never_fetched() {
    let server = MockServer::start().await;
    mount_page(&server, "/", &["/skip-me", "/keep"]).await;
    mount_page(&server, "/skip-me", &[]).await;
    mount_page(&server, "/keep", &["/skip-too"]).await;

    let dir = TempDir::new().unwrap();
    let controller = CrawlController::new(test_config(&dir)).unwrap();
    controller.add_seed(&format!("{}/", server.uri())).unwrap();

    let journal = Arc::new(Journal::default());
    let factory = {
        let journal = Arc::clone(&journal);
        move || -> anyhow::Result<Recorder> {
            let mut recorder = Recorder::new(&journal);
            recorder.reject_prefix = Some("/skip".to_string());
            Ok(recorder)
        }
    };
    let report = controller.start(factory, 2).await.unwrap();

    assert_eq!(journal.visited(), vec!["/", "/keep"]);
    assert_eq!(controller.frontier().accepted_count(), 2);
    assert_eq!(report.stats.links_discovered, 3);

    let counts = request_counts(&server).await;
    assert!(!counts.contains_key("/skip-me"));
    assert!(!counts.contains_key("/skip-too"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_each_url_fetched_once_under_concurrency() {
    let server = MockServer::start().await;
    let pages = ["/a", "/b", "/c", "/d", "/shared"];
    mount_page(&server, "/", &pages).await;
    for page in pages {
        mount_page(&server, page, &["/", "/a", "/b", "/c", "/d", "/shared"]).await;
    }

    let dir = TempDir::new().unwrap();
    let controller = CrawlController::new(test_config(&dir)).unwrap();
    controller.add_seed(&format!("{}/", server.uri())).unwrap();
    controller.add_seed(&format!("{}/shared", server.uri())).unwrap();

    let journal = Arc::new(Journal::default());
    let factory = {
        let journal = Arc::clone(&journal);
        move || -> anyhow::Result<Recorder> { Ok(Recorder::new(&journal)) }
    };
    let report = controller.start(factory, 4).await.unwrap();

    assert_eq!(report.fetched, 6);
    assert_eq!(journal.visited().len(), 6);

    let counts = request_counts(&server).await;
    assert_eq!(counts.len(), 6);
    for (path, count) in counts {
        assert_eq!(count, 1, "{} fetched {} times", path, count);
    }
}

#[tokio::test]
async fn test_resume_does_not_refetch() {
    let server = MockServer::start().await;
    mount_page(&server, "/", &["/a", "/b"]).await;
    mount_page(&server, "/a", &[]).await;
    mount_page(&server, "/b", &[]).await;
    let seed = format!("{}/", server.uri());

    let dir = TempDir::new().unwrap();
    let journal = Arc::new(Journal::default());

    {
        let controller = CrawlController::new(test_config(&dir)).unwrap();
        controller.add_seed(&seed).unwrap();

        let handle = controller.shutdown_handle();
        let factory = {
            let journal = Arc::clone(&journal);
            move || -> anyhow::Result<Recorder> {
                let mut recorder = Recorder::new(&journal);
                recorder.stop_after_visit = Some(handle.clone());
                Ok(recorder)
            }
        };
        let report = controller.start(factory, 1).await.unwrap();

        assert!(report.stopped_early);
        assert_eq!(report.fetched, 1);
        assert_eq!(report.frontier_remaining, 2);
    }

    {
        let config = CrawlConfig {
            resumable_crawling: true,
            ..test_config(&dir)
        };
        let controller = CrawlController::new(config).unwrap();
        controller.add_seed(&seed).unwrap();
        assert_eq!(controller.frontier().size(), 2);

        let factory = {
            let journal = Arc::clone(&journal);
            move || -> anyhow::Result<Recorder> { Ok(Recorder::new(&journal)) }
        };
        let report = controller.start(factory, 2).await.unwrap();

        assert!(!report.stopped_early);
        assert_eq!(report.fetched, 3);
    }

    assert_eq!(journal.visited(), vec!["/", "/a", "/b"]);
    let counts = request_counts(&server).await;
    assert_eq!(counts.get("/"), Some(&1));
    assert_eq!(counts.get("/a"), Some(&1));
    assert_eq!(counts.get("/b"), Some(&1));

    let storage = SqliteStorage::new(&frontier_db_path(&dir.path().join("frontier"))).unwrap();
    assert_eq!(storage.count_urls_by_state(UrlState::Fetched).unwrap(), 3);
    assert_eq!(storage.count_urls_by_state(UrlState::Queued).unwrap(), 0);
}

#[tokio::test]
async fn test_fresh_start_clears_stored_frontier() {
    let server = MockServer::start().await;
    mount_page(&server, "/", &[]).await;
    let seed = format!("{}/", server.uri());
    let dir = TempDir::new().unwrap();

    for _ in 0..2 {
        let controller = CrawlController::new(test_config(&dir)).unwrap();
        controller.add_seed(&seed).unwrap();
        let report = controller
            .start(|| -> anyhow::Result<Recorder> { Ok(Recorder::new(&Arc::default())) }, 1)
            .await
            .unwrap();
        assert_eq!(report.fetched, 1);
    }

    assert_eq!(request_counts(&server).await.get("/"), Some(&2));
}

#[tokio::test]
async fn test_redirect_target_is_crawled() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(301).insert_header("location", "/new"))
        .mount(&server)
        .await;
    mount_page(&server, "/new", &[]).await;

    let dir = TempDir::new().unwrap();
    let controller = CrawlController::new(test_config(&dir)).unwrap();
    controller.add_seed(&format!("{}/old", server.uri())).unwrap();

    let journal = Arc::new(Journal::default());
    let factory = {
        let journal = Arc::clone(&journal);
        move || -> anyhow::Result<Recorder> { Ok(Recorder::new(&journal)) }
    };
    controller.start(factory, 1).await.unwrap();

    assert_eq!(journal.visited(), vec!["/new"]);
    assert_eq!(journal.redirect_checks.load(Ordering::SeqCst), 1);
    let statuses = journal.statuses.lock().unwrap().clone();
    assert!(statuses.contains(&("/old".to_string(), 301)));
    assert!(statuses.contains(&("/new".to_string(), 200)));
}

#[tokio::test]
async fn test_redirect_not_followed_when_disabled() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/new"))
        .mount(&server)
        .await;
    mount_page(&server, "/new", &[]).await;

    let dir = TempDir::new().unwrap();
    let config = CrawlConfig {
        follow_redirects: false,
        ..test_config(&dir)
    };
    let controller = CrawlController::new(config).unwrap();
    controller.add_seed(&format!("{}/old", server.uri())).unwrap();

    let journal = Arc::new(Journal::default());
    let factory = {
        let journal = Arc::clone(&journal);
        move || -> anyhow::Result<Recorder> { Ok(Recorder::new(&journal)) }
    };
    controller.start(factory, 1).await.unwrap();

    assert!(journal.visited().is_empty());
    assert!(!request_counts(&server).await.contains_key("/new"));
}

#[tokio::test]
async fn test_fetch_failure_does_not_stop_crawl() {
    let server = MockServer::start().await;
    mount_page(&server, "/", &["/missing", "/ok"]).await;
    mount_page(&server, "/ok", &[]).await;

    let dir = TempDir::new().unwrap();
    let controller = CrawlController::new(test_config(&dir)).unwrap();
    controller.add_seed(&format!("{}/", server.uri())).unwrap();

    let journal = Arc::new(Journal::default());
    let factory = {
        let journal = Arc::clone(&journal);
        move || -> anyhow::Result<Recorder> { Ok(Recorder::new(&journal)) }
    };
    let report = controller.start(factory, 1).await.unwrap();

    assert_eq!(journal.visited(), vec!["/", "/ok"]);
    assert_eq!(*journal.failures.lock().unwrap(), vec!["/missing".to_string()]);
    assert_eq!(report.stats.fetch_failures, 1);
    assert_eq!(report.fetched, 3);

    let storage = SqliteStorage::new(&frontier_db_path(&dir.path().join("frontier"))).unwrap();
    assert_eq!(storage.count_urls_by_state(UrlState::Failed).unwrap(), 1);
}

#[tokio::test]
async fn test_visitor_panic_is_isolated() {
    let server = MockServer::start().await;
    mount_page(&server, "/", &["/boom", "/fine"]).await;
    mount_page(&server, "/boom", &[]).await;
    mount_page(&server, "/fine", &[]).await;

    let dir = TempDir::new().unwrap();
    let controller = CrawlController::new(test_config(&dir)).unwrap();
    controller.add_seed(&format!("{}/", server.uri())).unwrap();

    let journal = Arc::new(Journal::default());
    let factory = {
        let journal = Arc::clone(&journal);
        move || -> anyhow::Result<Recorder> {
            let mut recorder = Recorder::new(&journal);
            recorder.panic_on = Some("/boom".to_string());
            Ok(recorder)
        }
    };
    let report = controller.start(factory, 1).await.unwrap();

    assert_eq!(journal.visited(), vec!["/", "/fine"]);
    assert_eq!(report.stats.visitor_failures, 1);
    assert_eq!(report.stats.pages_visited, 2);
    assert_eq!(report.fetched, 3);
}

#[tokio::test]
async fn test_factory_error_is_fatal_before_any_fetch() {
    let server = MockServer::start().await;
    mount_page(&server, "/", &[]).await;

    let dir = TempDir::new().unwrap();
    let controller = CrawlController::new(test_config(&dir)).unwrap();
    controller.add_seed(&format!("{}/", server.uri())).unwrap();

    let created = AtomicUsize::new(0);
    let factory = || -> anyhow::Result<Recorder> {
        if created.fetch_add(1, Ordering::SeqCst) == 1 {
            anyhow::bail!("second visitor unavailable");
        }
        Ok(Recorder::new(&Arc::default()))
    };

    match controller.start(factory, 3).await {
        Err(CrawlError::Factory { worker, .. }) => assert_eq!(worker, 2),
        other => panic!("expected factory error, got {:?}", other.map(|r| r.fetched)),
    }
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unusable_storage_folder_is_fatal() {
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("file");
    std::fs::write(&blocker, b"not a folder").unwrap();

    let config = CrawlConfig {
        storage_folder: blocker.join("frontier"),
        ..CrawlConfig::default()
    };
    assert!(matches!(
        CrawlController::new(config),
        Err(CrawlError::Storage(_))
    ));
}

#[tokio::test]
async fn test_huge_crawl_delay_does_not_abort_crawl() {
    let server = MockServer::start().await;
    mount_robots(&server, "User-agent: *\nCrawl-delay: 1e30\n").await;
    mount_page(&server, "/", &["/a"]).await;
    mount_page(&server, "/a", &[]).await;

    let dir = TempDir::new().unwrap();
    let (report, journal) = crawl(test_config(&dir), &format!("{}/", server.uri()), 2).await;

    assert!(!report.stopped_early);
    assert_eq!(report.fetched, 2);
    assert_eq!(journal.visited(), vec!["/", "/a"]);
}

#[tokio::test]
async fn test_robots_crawl_delay_spaces_fetches() {
    let server = MockServer::start().await;
    mount_robots(&server, "User-agent: *\nCrawl-delay: 0.3\n").await;
    mount_page(&server, "/", &["/a", "/b"]).await;
    mount_page(&server, "/a", &[]).await;
    mount_page(&server, "/b", &[]).await;

    let dir = TempDir::new().unwrap();
    let config = CrawlConfig {
        politeness_delay: 10,
        ..test_config(&dir)
    };

    let started = Instant::now();
    let (report, journal) = crawl(config, &format!("{}/", server.uri()), 3).await;

    assert_eq!(report.fetched, 3);
    assert_eq!(journal.visited(), vec!["/", "/a", "/b"]);
    // Two gaps of at least 300ms between the three page fetches
    assert!(
        started.elapsed() >= Duration::from_millis(600),
        "crawl-delay not applied: {:?}",
        started.elapsed()
    );
}

#[tokio::test]
async fn test_non_utf8_html_is_parse_failure() {
    let server = MockServer::start().await;
    let mut body = b"<html><body><a href=\"/child\">child</a>".to_vec();
    body.extend_from_slice(&[0xff, 0xfe, 0xfd]);
    body.extend_from_slice(b"</body></html>");
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/html"))
        .mount(&server)
        .await;
    mount_page(&server, "/child", &[]).await;

    let dir = TempDir::new().unwrap();
    let (report, journal) = crawl(test_config(&dir), &format!("{}/", server.uri()), 1).await;

    assert!(journal.visited().is_empty());
    assert_eq!(report.stats.parse_failures, 1);
    assert_eq!(report.stats.pages_visited, 0);
    assert_eq!(report.stats.links_discovered, 0);
    assert!(!request_counts(&server).await.contains_key("/child"));

    let storage = storage_of(&dir);
    assert_eq!(storage.count_urls_by_state(UrlState::ParseFailed).unwrap(), 1);
    assert_eq!(storage.count_total_urls().unwrap(), 1);
}

#[tokio::test]
async fn test_binary_content_skipped_unless_included() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/file.bin"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(vec![0u8, 1, 2, 255], "application/octet-stream"),
        )
        .mount(&server)
        .await;
    let seed = format!("{}/file.bin", server.uri());

    let dir = TempDir::new().unwrap();
    let (report, journal) = crawl(test_config(&dir), &seed, 1).await;

    assert!(journal.visited().is_empty());
    assert_eq!(report.stats.pages_fetched, 1);
    assert_eq!(report.stats.pages_visited, 0);
    assert_eq!(storage_of(&dir).count_urls_by_state(UrlState::Skipped).unwrap(), 1);

    let dir = TempDir::new().unwrap();
    let config = CrawlConfig {
        include_binary_content: true,
        ..test_config(&dir)
    };
    let (report, journal) = crawl(config, &seed, 1).await;

    assert_eq!(journal.visited(), vec!["/file.bin"]);
    assert_eq!(*journal.binary.lock().unwrap(), vec!["/file.bin".to_string()]);
    assert_eq!(report.stats.pages_visited, 1);
    assert_eq!(storage_of(&dir).count_urls_by_state(UrlState::Fetched).unwrap(), 1);
}

#[tokio::test]
async fn test_outgoing_links_capped_per_page() {
    let server = MockServer::start().await;
    mount_page(&server, "/", &["/a", "/b", "/c", "/d"]).await;
    for page in ["/a", "/b", "/c", "/d"] {
        mount_page(&server, page, &[]).await;
    }

    let dir = TempDir::new().unwrap();
    let config = CrawlConfig {
        max_outgoing_links_to_follow: 2,
        ..test_config(&dir)
    };
    let (report, journal) = crawl(config, &format!("{}/", server.uri()), 2).await;

    assert_eq!(report.stats.links_discovered, 2);
    assert_eq!(report.fetched, 3);
    assert_eq!(journal.visited(), vec!["/", "/a", "/b"]);

    let counts = request_counts(&server).await;
    assert!(!counts.contains_key("/c"));
    assert!(!counts.contains_key("/d"));
}

#[tokio::test]
async fn test_links_past_page_limit_cost_no_robots_fetch() {
    let seed_server = MockServer::start().await;
    let others = [
        MockServer::start().await,
        MockServer::start().await,
        MockServer::start().await,
    ];
    let links: Vec<String> = others.iter().map(|s| format!("{}/", s.uri())).collect();
    let link_refs: Vec<&str> = links.iter().map(String::as_str).collect();
    mount_page(&seed_server, "/", &link_refs).await;

    let dir = TempDir::new().unwrap();
    let config = CrawlConfig {
        max_pages_to_fetch: 1,
        ..test_config(&dir)
    };
    let (report, journal) = crawl(config, &format!("{}/", seed_server.uri()), 2).await;

    assert_eq!(journal.visited(), vec!["/"]);
    assert_eq!(report.stats.links_discovered, 3);
    assert_eq!(report.fetched, 1);
    for other in &others {
        assert!(
            other.received_requests().await.unwrap().is_empty(),
            "{} was contacted",
            other.uri()
        );
    }
}

/// Parser that ignores the body and reports one fixed link
struct FixedParser;

impl HtmlParser for FixedParser {
    fn parse(
        &self,
        _body: &[u8],
        _content_type: Option<&str>,
        url: &Url,
    ) -> Result<ParseData, ParseError> {
        let injected = url.join("/injected").map_err(|_| ParseError::InvalidEncoding {
            url: url.to_string(),
        })?;
        Ok(ParseData::Html(HtmlParseData {
            title: Some("fixed".to_string()),
            outgoing_urls: vec![injected.to_string()],
            ..HtmlParseData::default()
        }))
    }
}

#[tokio::test]
async fn test_custom_parser_replaces_default() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("no links here", "text/plain"))
        .mount(&server)
        .await;
    mount_page(&server, "/injected", &[]).await;

    let dir = TempDir::new().unwrap();
    let controller = CrawlController::new(test_config(&dir))
        .unwrap()
        .with_parser(FixedParser);
    controller.add_seed(&format!("{}/", server.uri())).unwrap();

    let journal = Arc::new(Journal::default());
    let factory = {
        let journal = Arc::clone(&journal);
        move || -> anyhow::Result<Recorder> { Ok(Recorder::new(&journal)) }
    };
    let report = controller.start(factory, 1).await.unwrap();

    assert_eq!(report.fetched, 2);
    assert_eq!(journal.visited(), vec!["/", "/injected"]);
    assert_eq!(
        *journal.titles.lock().unwrap(),
        vec![Some("fixed".to_string()), Some("fixed".to_string())]
    );
}

//! The caller-supplied visitor contract
//!
//! Each worker owns one [`WebCrawler`] instance, created by a
//! [`WebCrawlerFactory`] before any worker starts. Instances are never
//! shared between workers; shared counters live in [`CrawlStats`], which
//! the engine owns and visitors may only read.

use crate::crawler::fetcher::{FetchError, FetchedPage};
use crate::crawler::parser::{HtmlParseData, ParseData};
use crate::url::WebUrl;
use reqwest::header::HeaderMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A fetched and parsed page, as handed to visitors
#[derive(Debug, Clone)]
pub struct Page {
    url: WebUrl,
    status_code: u16,
    content_type: Option<String>,
    headers: HeaderMap,
    content: Vec<u8>,
    parse_data: ParseData,
}

impl Page {
    pub(crate) fn new(url: WebUrl, fetched: FetchedPage, parse_data: ParseData) -> Self {
        Self {
            url,
            status_code: fetched.status,
            content_type: fetched.content_type,
            headers: fetched.headers,
            content: fetched.body,
            parse_data,
        }
    }

    pub fn url(&self) -> &WebUrl {
        &self.url
    }

    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Raw response body
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn parse_data(&self) -> &ParseData {
        &self.parse_data
    }

    /// HTML parse data, when the page was HTML
    pub fn html(&self) -> Option<&HtmlParseData> {
        self.parse_data.as_html()
    }

    /// Deduplicated outgoing links found on the page
    pub fn outgoing_urls(&self) -> &[String] {
        self.parse_data.outgoing_urls()
    }
}

/// Crawl-wide counters owned by the controller
///
/// Visitors see these through [`WorkerContext::stats`]; only the engine
/// updates them.
#[derive(Debug, Default)]
pub struct CrawlStats {
    pages_fetched: AtomicU64,
    fetch_failures: AtomicU64,
    robots_denied: AtomicU64,
    parse_failures: AtomicU64,
    pages_visited: AtomicU64,
    links_discovered: AtomicU64,
    visitor_failures: AtomicU64,
    targets_completed: AtomicU64,
}

/// Point-in-time copy of [`CrawlStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub pages_fetched: u64,
    pub fetch_failures: u64,
    pub robots_denied: u64,
    pub parse_failures: u64,
    pub pages_visited: u64,
    pub links_discovered: u64,
    pub visitor_failures: u64,
    pub targets_completed: u64,
}

impl CrawlStats {
    /// Responses downloaded successfully
    pub fn pages_fetched(&self) -> u64 {
        self.pages_fetched.load(Ordering::SeqCst)
    }

    pub fn fetch_failures(&self) -> u64 {
        self.fetch_failures.load(Ordering::SeqCst)
    }

    pub fn robots_denied(&self) -> u64 {
        self.robots_denied.load(Ordering::SeqCst)
    }

    pub fn parse_failures(&self) -> u64 {
        self.parse_failures.load(Ordering::SeqCst)
    }

    /// Pages whose `visit` returned normally
    pub fn pages_visited(&self) -> u64 {
        self.pages_visited.load(Ordering::SeqCst)
    }

    /// Links considered for admission across all pages
    pub fn links_discovered(&self) -> u64 {
        self.links_discovered.load(Ordering::SeqCst)
    }

    /// Errors and panics raised by visitor code
    pub fn visitor_failures(&self) -> u64 {
        self.visitor_failures.load(Ordering::SeqCst)
    }

    pub fn targets_completed(&self) -> u64 {
        self.targets_completed.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            pages_fetched: self.pages_fetched(),
            fetch_failures: self.fetch_failures(),
            robots_denied: self.robots_denied(),
            parse_failures: self.parse_failures(),
            pages_visited: self.pages_visited(),
            links_discovered: self.links_discovered(),
            visitor_failures: self.visitor_failures(),
            targets_completed: self.targets_completed(),
        }
    }

    pub(crate) fn record_fetch(&self) {
        self.pages_fetched.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn record_fetch_failure(&self) {
        self.fetch_failures.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn record_robots_denied(&self) {
        self.robots_denied.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn record_parse_failure(&self) {
        self.parse_failures.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn record_visit(&self) {
        self.pages_visited.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn record_links(&self, count: u64) {
        self.links_discovered.fetch_add(count, Ordering::SeqCst);
    }

    pub(crate) fn record_visitor_failure(&self) {
        self.visitor_failures.fetch_add(1, Ordering::SeqCst);
    }

    /// Returns the number of targets completed so far, including this one
    pub(crate) fn record_completion(&self) -> u64 {
        self.targets_completed.fetch_add(1, Ordering::SeqCst) + 1
    }
}

/// What a visitor learns about the worker running it
#[derive(Debug, Clone)]
pub struct WorkerContext {
    worker_id: usize,
    stats: Arc<CrawlStats>,
}

impl WorkerContext {
    pub(crate) fn new(worker_id: usize, stats: Arc<CrawlStats>) -> Self {
        Self { worker_id, stats }
    }

    /// 1-based id of the worker
    pub fn worker_id(&self) -> usize {
        self.worker_id
    }

    /// Crawl-wide counters; clone the `Arc` to keep reading them later
    pub fn stats(&self) -> &Arc<CrawlStats> {
        &self.stats
    }
}

/// A caller-supplied page visitor
///
/// The engine calls [`WebCrawler::should_visit`] for every discovered link
/// and redirect target before admitting it, and [`WebCrawler::visit`] for
/// every page that was fetched and parsed. Errors returned from `visit`
/// and panics in either method are caught per page, logged and counted;
/// they never stop the crawl. A panic in `should_visit` rejects the link.
pub trait WebCrawler: Send + 'static {
    /// Called once on the worker before it pops its first target
    fn on_start(&mut self, _ctx: &WorkerContext) {}

    /// Admission predicate for a discovered URL
    ///
    /// `referring` is the page the link was found on, or None for redirect
    /// targets.
    fn should_visit(&self, _referring: Option<&Page>, _url: &WebUrl) -> bool {
        true
    }

    /// Consumes a fetched and parsed page
    fn visit(&mut self, page: &Page) -> anyhow::Result<()>;

    /// Called with the status code of every HTTP response
    fn handle_page_status_code(&mut self, _url: &WebUrl, _status: u16) {}

    /// Called when a fetch fails (timeout, connection error, non-2xx, too large)
    fn on_fetch_failure(&mut self, _url: &WebUrl, _error: &FetchError) {}

    /// Called once when the worker stops
    fn on_before_exit(&mut self) {}
}

/// Produces one [`WebCrawler`] per worker
///
/// Any `Fn() -> anyhow::Result<C>` closure is a factory.
pub trait WebCrawlerFactory {
    type Crawler: WebCrawler;

    fn create(&self) -> anyhow::Result<Self::Crawler>;
}

impl<F, C> WebCrawlerFactory for F
where
    F: Fn() -> anyhow::Result<C>,
    C: WebCrawler,
{
    type Crawler = C;

    fn create(&self) -> anyhow::Result<C> {
        self()
    }
}

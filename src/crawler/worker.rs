//! Worker loop
//!
//! Each worker repeatedly pops a target, checks robots rules, fetches,
//! parses, admits discovered links and hands the page to its visitor.
//! Stop requests are observed only between targets.

use crate::config::CrawlConfig;
use crate::crawler::fetcher::{FetchOutcome, PoliteFetcher};
use crate::crawler::frontier::Frontier;
use crate::crawler::parser::HtmlParser;
use crate::crawler::visitor::{CrawlStats, Page, WebCrawler, WorkerContext};
use crate::robots::RobotsPolicyCache;
use crate::state::{UrlState, WorkerState};
use crate::url::WebUrl;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// Completed targets between two progress log lines
const PROGRESS_EVERY: u64 = 10;

/// Engine components shared by every worker
pub(crate) struct CrawlShared {
    pub config: CrawlConfig,
    pub frontier: Arc<Frontier>,
    pub fetcher: Arc<PoliteFetcher>,
    pub robots: Arc<RobotsPolicyCache>,
    pub parser: Arc<dyn HtmlParser>,
    pub stats: Arc<CrawlStats>,
}

pub(crate) struct Worker<C: WebCrawler> {
    id: usize,
    crawler: C,
    shared: Arc<CrawlShared>,
    state: WorkerState,
}

impl<C: WebCrawler> Worker<C> {
    pub fn new(id: usize, crawler: C, shared: Arc<CrawlShared>) -> Self {
        Self {
            id,
            crawler,
            shared,
            state: WorkerState::Idle,
        }
    }

    fn transition(&mut self, next: WorkerState) {
        if !self.state.can_transition_to(next) {
            tracing::warn!(
                "Worker {}: unexpected transition {} -> {}",
                self.id,
                self.state,
                next
            );
        }
        tracing::trace!("Worker {}: {} -> {}", self.id, self.state, next);
        self.state = next;
    }

    /// Runs until the frontier is exhausted or shut down
    ///
    /// Returns the number of targets this worker completed.
    pub async fn run(mut self) -> u64 {
        let ctx = WorkerContext::new(self.id, Arc::clone(&self.shared.stats));
        let id = self.id;
        guarded(id, "on_start", || self.crawler.on_start(&ctx));
        tracing::debug!("Worker {} started", id);

        let mut completed = 0;
        while let Some(target) = self.shared.frontier.pop().await {
            let outcome = self.process(&target).await;
            self.transition(WorkerState::Idle);
            self.shared.frontier.complete(&target, outcome);
            completed += 1;

            let total = self.shared.stats.record_completion();
            if total % PROGRESS_EVERY == 0 {
                tracing::info!(
                    "Progress: {} completed, {} fetched, {} queued, {} in flight",
                    total,
                    self.shared.frontier.fetched_count(),
                    self.shared.frontier.size(),
                    self.shared.frontier.in_flight()
                );
            }
        }

        self.transition(WorkerState::Stopping);
        guarded(id, "on_before_exit", || self.crawler.on_before_exit());
        self.transition(WorkerState::Stopped);
        tracing::debug!("Worker {} stopped after {} targets", id, completed);

        completed
    }

    /// Handles one target and returns its final state
    async fn process(&mut self, target: &WebUrl) -> UrlState {
        let shared = Arc::clone(&self.shared);
        self.transition(WorkerState::Fetching);

        if !shared.robots.is_allowed(target).await {
            shared.stats.record_robots_denied();
            return UrlState::RobotsDenied;
        }

        let fetched = match shared.fetcher.fetch(target.url()).await {
            FetchOutcome::Success(fetched) => fetched,
            FetchOutcome::Redirect { status, location } => {
                self.status_hook(target, status);
                self.follow_redirect(target, &location).await;
                return UrlState::Redirected;
            }
            FetchOutcome::Failure(error) => {
                shared.stats.record_fetch_failure();
                if let Some(status) = error.status() {
                    self.status_hook(target, status);
                }
                tracing::debug!("Fetch failed for {}: {}", target, error);
                let crawler = &mut self.crawler;
                guarded(self.id, "on_fetch_failure", || {
                    crawler.on_fetch_failure(target, &error)
                });
                return UrlState::Failed;
            }
        };

        shared.stats.record_fetch();
        self.status_hook(target, fetched.status);

        self.transition(WorkerState::Parsing);
        let parse_data = match shared.parser.parse(
            &fetched.body,
            fetched.content_type.as_deref(),
            target.url(),
        ) {
            Ok(data) => data,
            Err(e) => {
                shared.stats.record_parse_failure();
                tracing::warn!("Parse failed for {}: {}", target, e);
                return UrlState::ParseFailed;
            }
        };

        if parse_data.is_binary() && !shared.config.include_binary_content {
            tracing::debug!("Skipping binary content at {}", target);
            return UrlState::Skipped;
        }

        self.transition(WorkerState::Dispatching);
        let page = Page::new(target.clone(), fetched, parse_data);
        self.admit_links(&page).await;
        self.dispatch(&page);

        UrlState::Fetched
    }

    /// Offers the page's links to the frontier
    async fn admit_links(&mut self, page: &Page) {
        let shared = Arc::clone(&self.shared);
        let links = page.outgoing_urls();
        let considered = links.len().min(shared.config.max_outgoing_links_to_follow);
        shared.stats.record_links(considered as u64);

        for raw in links.iter().take(considered) {
            let child = match WebUrl::child(raw, page.url()) {
                Ok(child) => child,
                Err(e) => {
                    tracing::debug!("Dropping link on {}: {}", page.url(), e);
                    continue;
                }
            };
            self.offer(Some(page), child).await;
        }
    }

    async fn follow_redirect(&mut self, target: &WebUrl, location: &str) {
        if !self.shared.config.follow_redirects {
            tracing::debug!("Not following redirect {} -> {}", target, location);
            return;
        }

        match WebUrl::redirect(location, target) {
            Ok(next) => {
                tracing::debug!("Redirect {} -> {}", target, next);
                self.offer(None, next).await;
            }
            Err(e) => tracing::debug!("Bad redirect target from {}: {}", target, e),
        }
    }

    /// Filters a candidate through the visitor and robots rules, then pushes it
    ///
    /// Candidates the frontier would refuse are dropped before robots.txt
    /// is consulted, so no robots fetch is spent on them.
    async fn offer(&mut self, referring: Option<&Page>, candidate: WebUrl) {
        let shared = Arc::clone(&self.shared);
        if !shared.frontier.would_accept(&candidate) {
            tracing::trace!("Frontier would refuse {}", candidate);
            return;
        }
        if !self.should_visit(referring, &candidate) {
            tracing::trace!("Visitor rejected {}", candidate);
            return;
        }
        if !shared.robots.is_allowed(&candidate).await {
            return;
        }
        shared.frontier.push(candidate);
    }

    fn should_visit(&self, referring: Option<&Page>, candidate: &WebUrl) -> bool {
        let crawler = &self.crawler;
        match catch_unwind(AssertUnwindSafe(|| crawler.should_visit(referring, candidate))) {
            Ok(admit) => admit,
            Err(panic) => {
                self.shared.stats.record_visitor_failure();
                tracing::error!(
                    "Worker {}: should_visit panicked for {}: {}",
                    self.id,
                    candidate,
                    panic_message(&*panic)
                );
                false
            }
        }
    }

    fn dispatch(&mut self, page: &Page) {
        let crawler = &mut self.crawler;
        match catch_unwind(AssertUnwindSafe(|| crawler.visit(page))) {
            Ok(Ok(())) => self.shared.stats.record_visit(),
            Ok(Err(e)) => {
                self.shared.stats.record_visitor_failure();
                tracing::error!("Worker {}: visit failed for {}: {:#}", self.id, page.url(), e);
            }
            Err(panic) => {
                self.shared.stats.record_visitor_failure();
                tracing::error!(
                    "Worker {}: visit panicked for {}: {}",
                    self.id,
                    page.url(),
                    panic_message(&*panic)
                );
            }
        }
    }

    fn status_hook(&mut self, target: &WebUrl, status: u16) {
        let crawler = &mut self.crawler;
        guarded(self.id, "handle_page_status_code", || {
            crawler.handle_page_status_code(target, status)
        });
    }
}

/// Runs a visitor hook, logging instead of unwinding if it panics
fn guarded(worker: usize, hook: &str, f: impl FnOnce()) {
    if let Err(panic) = catch_unwind(AssertUnwindSafe(f)) {
        tracing::error!("Worker {}: {} panicked: {}", worker, hook, panic_message(&*panic));
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

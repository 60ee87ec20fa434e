//! Shared crawl frontier
//!
//! This module handles:
//! - Admission of new targets (depth ceiling, page ceiling, uniqueness)
//! - Durable recording of every accepted target before it can be popped
//! - Handing out targets whose host is eligible under politeness rules
//! - Termination detection (empty queue and nothing in flight)
//! - Rehydration from the durable store on resume

use crate::config::CrawlConfig;
use crate::state::{HostRegistry, UrlState};
use crate::storage::{NewUrl, SqliteStorage, Storage, StorageError, StorageResult};
use crate::url::WebUrl;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::Notify;

/// Longest a waiting `pop` sleeps before re-checking the queue
const MAX_IDLE_WAIT: Duration = Duration::from_millis(500);

/// Re-check interval when a host has no free connection slot
const SLOT_RECHECK: Duration = Duration::from_millis(20);

/// What happened to a pushed target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Accepted and assigned this document id
    Accepted(i64),
    /// Deeper than the configured maximum depth
    TooDeep,
    /// Already enqueued or fetched during this crawl
    Duplicate,
    /// The page ceiling has been reached
    LimitReached,
    /// The durable store refused the write
    StorageFailed,
}

impl PushOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }
}

struct FrontierState {
    /// Targets waiting to be fetched, in insertion order
    queue: VecDeque<WebUrl>,
    /// Every URL accepted during this crawl
    visited: HashSet<String>,
    /// Number of accepted targets, counted against the page ceiling
    accepted: u64,
    /// Targets completed after a fetch attempt
    fetched: u64,
    /// Targets handed out and not yet completed
    in_flight: usize,
    next_doc_id: i64,
    /// Latched once the queue drained with nothing in flight
    finished: bool,
}

enum Next {
    Target(WebUrl),
    Done,
    Wait(Duration),
}

/// The shared work queue of discovered URLs
///
/// All admission rules (depth, page ceiling, uniqueness) are enforced here
/// and nowhere else. The visited check and insert happen under one lock
/// together with the durable write.
pub struct Frontier {
    state: Mutex<FrontierState>,
    storage: Arc<Mutex<SqliteStorage>>,
    hosts: Arc<HostRegistry>,
    max_depth: u32,
    page_limit: Option<u64>,
    notify: Notify,
    shutdown: AtomicBool,
}

impl Frontier {
    /// Opens the frontier over the durable store
    ///
    /// With `resumable_crawling` the stored URLs are rehydrated: all of them
    /// enter the visited set and count against the page ceiling, and those
    /// still queued or in progress are queued again in document id order.
    /// Otherwise the store is cleared.
    ///
    /// # Errors
    ///
    /// Returns a `StorageError` if the store cannot be read or cleared.
    pub fn open(
        config: &CrawlConfig,
        storage: Arc<Mutex<SqliteStorage>>,
        hosts: Arc<HostRegistry>,
    ) -> StorageResult<Self> {
        let mut state = FrontierState {
            queue: VecDeque::new(),
            visited: HashSet::new(),
            accepted: 0,
            fetched: 0,
            in_flight: 0,
            next_doc_id: 1,
            finished: false,
        };

        {
            let mut store = storage.lock().unwrap_or_else(|e| e.into_inner());
            if config.resumable_crawling {
                for record in store.load_urls()? {
                    state.visited.insert(record.url.clone());
                    state.accepted += 1;
                    if counts_as_fetched(record.state) {
                        state.fetched += 1;
                    }
                    if record.state.is_active() {
                        match WebUrl::restore(
                            &record.url,
                            record.doc_id,
                            record.depth,
                            record.parent_doc_id,
                            record.parent_url.clone(),
                        ) {
                            Ok(target) => state.queue.push_back(target),
                            Err(e) => tracing::warn!("Dropping stored URL {}: {}", record.url, e),
                        }
                    }
                }
                state.next_doc_id = store.max_doc_id()? + 1;
                tracing::info!(
                    "Resumed frontier: {} known URLs, {} pending",
                    state.accepted,
                    state.queue.len()
                );
            } else {
                store.clear_urls()?;
            }
        }

        Ok(Self {
            state: Mutex::new(state),
            storage,
            hosts,
            max_depth: config.max_depth_of_crawling,
            page_limit: config.page_limit(),
            notify: Notify::new(),
            shutdown: AtomicBool::new(false),
        })
    }

    fn lock(&self) -> MutexGuard<'_, FrontierState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn store(&self) -> MutexGuard<'_, SqliteStorage> {
        self.storage.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Offers a target to the frontier
    ///
    /// Rejected targets are dropped silently; the outcome says why.
    pub fn push(&self, target: WebUrl) -> PushOutcome {
        let outcome = self.admit(target);
        if outcome.is_accepted() {
            self.notify.notify_waiters();
        }
        outcome
    }

    fn admit(&self, target: WebUrl) -> PushOutcome {
        if !self.accepts_depth(target.depth()) {
            tracing::trace!("Too deep ({}): {}", target.depth(), target);
            return PushOutcome::TooDeep;
        }

        let mut state = self.lock();

        if state.visited.contains(target.as_str()) {
            return PushOutcome::Duplicate;
        }
        if let Some(limit) = self.page_limit {
            if state.accepted >= limit {
                tracing::trace!("Page limit reached, dropping {}", target);
                return PushOutcome::LimitReached;
            }
        }

        let doc_id = state.next_doc_id;
        let record = NewUrl {
            doc_id,
            url: target.as_str(),
            host: target.host(),
            parent_url: target.parent_url(),
            parent_doc_id: target.parent_doc_id(),
            depth: target.depth(),
        };
        match self.store().insert_url(&record) {
            Ok(()) => {}
            Err(StorageError::ConstraintViolation(_)) => {
                state.visited.insert(target.as_str().to_string());
                return PushOutcome::Duplicate;
            }
            Err(e) => {
                tracing::warn!("Failed to persist {}: {}", target, e);
                return PushOutcome::StorageFailed;
            }
        }

        state.next_doc_id += 1;
        state.accepted += 1;
        state.finished = false;
        state.visited.insert(target.as_str().to_string());
        tracing::debug!("Queued {} (doc {}, depth {})", target, doc_id, target.depth());
        state.queue.push_back(target.with_doc_id(doc_id));

        PushOutcome::Accepted(doc_id)
    }

    /// Whether a target at `depth` is within the depth ceiling
    pub fn accepts_depth(&self, depth: u32) -> bool {
        depth <= self.max_depth
    }

    /// Read-only admission check: depth, novelty and page limit
    ///
    /// A `true` answer may be stale by the time the target is pushed;
    /// `push` makes the binding decision.
    pub fn would_accept(&self, target: &WebUrl) -> bool {
        if !self.accepts_depth(target.depth()) {
            return false;
        }
        let state = self.lock();
        if state.visited.contains(target.as_str()) {
            return false;
        }
        self.page_limit.map_or(true, |limit| state.accepted < limit)
    }

    /// Takes the first target whose host is eligible right now
    ///
    /// Returns None when nothing is eligible; this says nothing about
    /// whether the crawl is over.
    pub fn try_pop(&self) -> Option<WebUrl> {
        match self.next(Instant::now()) {
            Next::Target(target) => Some(target),
            _ => None,
        }
    }

    /// Waits for the next eligible target
    ///
    /// Returns None once the queue is empty and no target is in flight, or
    /// after [`Frontier::shutdown`].
    pub async fn pop(&self) -> Option<WebUrl> {
        loop {
            let notified = self.notify.notified();
            match self.next(Instant::now()) {
                Next::Target(target) => return Some(target),
                Next::Done => return None,
                Next::Wait(wait) => {
                    tokio::select! {
                        _ = notified => {}
                        _ = tokio::time::sleep(wait) => {}
                    }
                }
            }
        }
    }

    fn next(&self, now: Instant) -> Next {
        if self.shutdown.load(Ordering::SeqCst) {
            return Next::Done;
        }

        let mut state = self.lock();
        if state.finished {
            return Next::Done;
        }

        if state.queue.is_empty() {
            if state.in_flight == 0 {
                state.finished = true;
                drop(state);
                tracing::debug!("Frontier exhausted");
                self.notify.notify_waiters();
                return Next::Done;
            }
            return Next::Wait(MAX_IDLE_WAIT);
        }

        let ready = state
            .queue
            .iter()
            .position(|t| self.hosts.is_ready(t.host(), now));

        if let Some(target) = ready.and_then(|index| state.queue.remove(index)) {
            state.in_flight += 1;
            drop(state);
            if let Some(doc_id) = target.doc_id() {
                if let Err(e) = self.store().update_url_state(doc_id, UrlState::InProgress) {
                    tracing::warn!("Failed to mark {} in progress: {}", target, e);
                }
            }
            return Next::Target(target);
        }

        let mut hosts_seen = HashSet::new();
        let wait = state
            .queue
            .iter()
            .filter(|t| hosts_seen.insert(t.host()))
            .map(|t| self.hosts.time_until_ready(t.host(), now))
            .min()
            .unwrap_or(MAX_IDLE_WAIT);

        Next::Wait(if wait.is_zero() {
            SLOT_RECHECK
        } else {
            wait.min(MAX_IDLE_WAIT)
        })
    }

    /// Records the final state of a popped target
    pub fn complete(&self, target: &WebUrl, outcome: UrlState) {
        {
            let mut state = self.lock();
            state.in_flight = state.in_flight.saturating_sub(1);
            if counts_as_fetched(outcome) {
                state.fetched += 1;
            }
        }

        if let Some(doc_id) = target.doc_id() {
            if let Err(e) = self.store().update_url_state(doc_id, outcome) {
                tracing::warn!("Failed to record {} as {}: {}", target, outcome, e);
            }
        }

        self.notify.notify_waiters();
    }

    /// Makes every current and future `pop` return None
    ///
    /// Queued targets stay queued in the durable store.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Whether the crawl ran out of work
    pub fn is_finished(&self) -> bool {
        self.lock().finished
    }

    /// Number of targets waiting to be popped
    pub fn size(&self) -> usize {
        self.lock().queue.len()
    }

    /// Number of targets completed after a fetch attempt
    pub fn fetched_count(&self) -> u64 {
        self.lock().fetched
    }

    /// Number of targets accepted, including resumed ones
    pub fn accepted_count(&self) -> u64 {
        self.lock().accepted
    }

    pub fn in_flight(&self) -> usize {
        self.lock().in_flight
    }

    pub fn hosts(&self) -> &Arc<HostRegistry> {
        &self.hosts
    }
}

/// Whether a completed target consumed a fetch
fn counts_as_fetched(state: UrlState) -> bool {
    state.is_terminal() && state != UrlState::RobotsDenied
}

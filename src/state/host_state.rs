use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Per-host politeness bookkeeping
///
/// A fetch to a host may start only when a connection slot is free and
/// `max(politeness delay, robots crawl-delay)` has passed since both the
/// last completed fetch and the last started fetch to that host.
#[derive(Debug)]
pub struct HostState {
    /// Connection slots, one permit per allowed concurrent fetch
    slots: Arc<Semaphore>,

    /// Serializes waiters so starts happen in eligibility order
    gate: tokio::sync::Mutex<()>,

    /// Completion time of the last fetch and start time of the last fetch
    timing: Mutex<HostTiming>,

    /// Robots crawl-delay in milliseconds, 0 when the host declares none
    crawl_delay_ms: AtomicU64,

    /// Number of fetches started against this host
    fetches: AtomicU64,
}

#[derive(Debug, Default, Clone, Copy)]
struct HostTiming {
    last_completed: Option<Instant>,
    last_started: Option<Instant>,
}

impl HostState {
    /// Creates state for a host allowing `max_connections` concurrent fetches
    pub fn new(max_connections: u32) -> Self {
        Self {
            slots: Arc::new(Semaphore::new(max_connections.max(1) as usize)),
            gate: tokio::sync::Mutex::new(()),
            timing: Mutex::new(HostTiming::default()),
            crawl_delay_ms: AtomicU64::new(0),
            fetches: AtomicU64::new(0),
        }
    }

    fn timing(&self) -> MutexGuard<'_, HostTiming> {
        self.timing.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Records the robots crawl-delay for this host
    pub fn set_crawl_delay(&self, delay: Option<Duration>) {
        let ms = delay.map(|d| d.as_millis() as u64).unwrap_or(0);
        self.crawl_delay_ms.store(ms, Ordering::SeqCst);
    }

    /// The robots crawl-delay, if the host declared one
    pub fn crawl_delay(&self) -> Option<Duration> {
        match self.crawl_delay_ms.load(Ordering::SeqCst) {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    /// Effective spacing: the larger of the configured delay and crawl-delay
    pub fn effective_delay(&self, politeness: Duration) -> Duration {
        std::cmp::max(politeness, self.crawl_delay().unwrap_or(Duration::ZERO))
    }

    /// Earliest instant the next fetch may start, None if it may start now
    pub fn next_allowed(&self, politeness: Duration) -> Option<Instant> {
        let timing = *self.timing();
        let reference = match (timing.last_completed, timing.last_started) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        reference.map(|last| last + self.effective_delay(politeness))
    }

    /// Time left until the next fetch may start
    pub fn time_until_ready(&self, politeness: Duration, now: Instant) -> Duration {
        self.next_allowed(politeness)
            .map(|at| at.saturating_duration_since(now))
            .unwrap_or(Duration::ZERO)
    }

    /// Non-blocking eligibility check used by the frontier
    pub fn is_ready(&self, politeness: Duration, now: Instant) -> bool {
        self.slots.available_permits() > 0 && self.time_until_ready(politeness, now).is_zero()
    }

    /// Number of fetches currently holding a connection slot
    pub fn in_flight(&self, max_connections: u32) -> usize {
        (max_connections.max(1) as usize).saturating_sub(self.slots.available_permits())
    }

    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Waits for a connection slot and for the politeness window
    ///
    /// The wait is cooperative: the task sleeps until the host becomes
    /// eligible. The returned permit holds the slot until it is dropped,
    /// and dropping it records the completion time.
    ///
    /// Returns None only if the slot semaphore was closed.
    pub async fn acquire(self: &Arc<Self>, politeness: Duration) -> Option<HostPermit> {
        let slot = self.slots.clone().acquire_owned().await.ok()?;

        let _gate = self.gate.lock().await;
        loop {
            let wait = self.time_until_ready(politeness, Instant::now());
            if wait.is_zero() {
                break;
            }
            tracing::trace!("Waiting {:?} for host politeness window", wait);
            tokio::time::sleep(wait).await;
        }

        self.timing().last_started = Some(Instant::now());
        self.fetches.fetch_add(1, Ordering::SeqCst);

        Some(HostPermit {
            host: Arc::clone(self),
            _slot: slot,
        })
    }

    fn record_completion(&self, at: Instant) {
        self.timing().last_completed = Some(at);
    }
}

/// A held connection slot for one fetch
///
/// Politeness spacing is measured from the end of the response, so the
/// completion time is recorded when the permit is dropped.
#[derive(Debug)]
pub struct HostPermit {
    host: Arc<HostState>,
    _slot: OwnedSemaphorePermit,
}

impl Drop for HostPermit {
    fn drop(&mut self) {
        self.host.record_completion(Instant::now());
    }
}

/// Shared table of [`HostState`] entries, keyed by `host[:port]`
///
/// The table lock is only held for lookups; waiting on one host never
/// blocks lookups or fetches for other hosts.
#[derive(Debug)]
pub struct HostRegistry {
    politeness: Duration,
    max_connections: u32,
    hosts: Mutex<HashMap<String, Arc<HostState>>>,
}

impl HostRegistry {
    pub fn new(politeness: Duration, max_connections: u32) -> Self {
        Self {
            politeness,
            max_connections,
            hosts: Mutex::new(HashMap::new()),
        }
    }

    /// Gets the state for a host, creating it on first use
    pub fn host(&self, key: &str) -> Arc<HostState> {
        let mut hosts = self.hosts.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(
            hosts
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(HostState::new(self.max_connections))),
        )
    }

    /// Gets the state for a host only if it has been seen
    pub fn get(&self, key: &str) -> Option<Arc<HostState>> {
        let hosts = self.hosts.lock().unwrap_or_else(|e| e.into_inner());
        hosts.get(key).cloned()
    }

    pub fn politeness(&self) -> Duration {
        self.politeness
    }

    pub fn max_connections(&self) -> u32 {
        self.max_connections
    }

    /// Whether a fetch to `key` could start right now
    pub fn is_ready(&self, key: &str, now: Instant) -> bool {
        self.get(key)
            .map(|h| h.is_ready(self.politeness, now))
            .unwrap_or(true)
    }

    /// Time until `key` becomes eligible
    pub fn time_until_ready(&self, key: &str, now: Instant) -> Duration {
        self.get(key)
            .map(|h| h.time_until_ready(self.politeness, now))
            .unwrap_or(Duration::ZERO)
    }

    /// Waits for `key` to become eligible and claims a connection slot
    pub async fn acquire(&self, key: &str) -> Option<HostPermit> {
        self.host(key).acquire(self.politeness).await
    }

    pub fn set_crawl_delay(&self, key: &str, delay: Option<Duration>) {
        self.host(key).set_crawl_delay(delay);
    }

    /// Number of hosts seen so far
    pub fn len(&self) -> usize {
        self.hosts.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

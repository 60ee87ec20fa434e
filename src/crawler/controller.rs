//! Crawl controller
//!
//! Owns the frontier, robots cache and fetcher for the lifetime of a crawl,
//! launches one worker task per visitor instance and waits for all of them.

use crate::config::{fingerprint_crawl_config, CrawlConfig};
use crate::crawler::fetcher::PoliteFetcher;
use crate::crawler::frontier::{Frontier, PushOutcome};
use crate::crawler::parser::{HtmlParser, ScraperParser};
use crate::crawler::visitor::{CrawlStats, StatsSnapshot, WebCrawlerFactory};
use crate::crawler::worker::{CrawlShared, Worker};
use crate::robots::RobotsPolicyCache;
use crate::state::HostRegistry;
use crate::storage::{open_storage, RunStatus, SqliteStorage, Storage};
use crate::url::WebUrl;
use crate::{ConfigError, CrawlError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::task::JoinSet;

/// Summary returned by [`CrawlController::start`]
#[derive(Debug, Clone)]
pub struct CrawlReport {
    /// Id of the durable run record
    pub run_id: i64,

    /// Counters at the end of the crawl
    pub stats: StatsSnapshot,

    /// Targets completed after a fetch attempt, including resumed ones
    pub fetched: u64,

    /// Targets still queued when the crawl ended
    pub frontier_remaining: usize,

    pub elapsed: Duration,

    /// True when the crawl ended through a [`ShutdownHandle`]
    pub stopped_early: bool,
}

/// Requests a cooperative stop of a running crawl
///
/// Workers finish the target they are working on and then exit; targets
/// still queued stay in the durable frontier.
#[derive(Clone)]
pub struct ShutdownHandle {
    frontier: Arc<Frontier>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        tracing::info!("Shutdown requested");
        self.frontier.shutdown();
    }

    pub fn is_shutdown(&self) -> bool {
        self.frontier.is_shutdown()
    }
}

/// Entry point of the crawl engine
///
/// # Example
///
/// ```no_run
/// use crawlerbykc::{CrawlConfig, CrawlController, Page, WebCrawler};
///
/// struct Printer;
///
/// impl WebCrawler for Printer {
///     fn visit(&mut self, page: &Page) -> anyhow::Result<()> {
///         println!("{}", page.url());
///         Ok(())
///     }
/// }
///
/// # async fn run() -> Result<(), crawlerbykc::CrawlError> {
/// let config = CrawlConfig {
///     storage_folder: "/tmp/crawl".into(),
///     max_depth_of_crawling: 2,
///     ..CrawlConfig::default()
/// };
/// let controller = CrawlController::new(config)?;
/// controller.add_seed("https://example.org/")?;
/// let report = controller.start(|| Ok(Printer), 4).await?;
/// println!("fetched {} pages", report.fetched);
/// # Ok(())
/// # }
/// ```
pub struct CrawlController {
    config: CrawlConfig,
    config_hash: String,
    storage: Arc<Mutex<SqliteStorage>>,
    frontier: Arc<Frontier>,
    fetcher: Arc<PoliteFetcher>,
    robots: Arc<RobotsPolicyCache>,
    parser: Arc<dyn HtmlParser>,
    stats: Arc<CrawlStats>,
    started: AtomicBool,
}

impl CrawlController {
    /// Validates the configuration and opens the durable frontier
    ///
    /// # Errors
    ///
    /// Returns `CrawlError::Config` for an invalid configuration,
    /// `CrawlError::Storage` if the storage folder cannot be used and
    /// `CrawlError::Client` if the HTTP client cannot be built.
    pub fn new(config: CrawlConfig) -> Result<Self, CrawlError> {
        config.validate()?;

        let storage = Arc::new(Mutex::new(open_storage(&config.storage_folder)?));
        let hosts = Arc::new(HostRegistry::new(
            config.politeness(),
            config.max_connections_per_host,
        ));
        let frontier = Arc::new(Frontier::open(
            &config,
            Arc::clone(&storage),
            Arc::clone(&hosts),
        )?);
        let fetcher = Arc::new(PoliteFetcher::new(&config, hosts)?);
        let robots = Arc::new(RobotsPolicyCache::new(
            Arc::clone(&fetcher),
            &config.user_agent_string,
            config.respect_robots_txt,
        ));

        tracing::info!(
            "Crawl controller ready (storage: {}, politeness: {}ms, max depth: {}, page limit: {})",
            config.storage_folder.display(),
            config.politeness_delay,
            config.max_depth_of_crawling,
            config
                .page_limit()
                .map(|n| n.to_string())
                .unwrap_or_else(|| "unlimited".to_string())
        );

        Ok(Self {
            config_hash: fingerprint_crawl_config(&config),
            config,
            storage,
            frontier,
            fetcher,
            robots,
            parser: Arc::new(ScraperParser),
            stats: Arc::new(CrawlStats::default()),
            started: AtomicBool::new(false),
        })
    }

    /// Replaces the default HTML parser
    pub fn with_parser(mut self, parser: impl HtmlParser + 'static) -> Self {
        self.parser = Arc::new(parser);
        self
    }

    /// Records `hash` with each run instead of the limits fingerprint
    ///
    /// Launchers pass the hash of the file the configuration came from, so a
    /// resumed run can be traced back to it.
    pub fn with_config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = hash.into();
        self
    }

    fn store(&self) -> MutexGuard<'_, SqliteStorage> {
        self.storage.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queues a depth-0 target
    ///
    /// Seeds bypass visitor admission but not the frontier's rules; a seed
    /// already known to the frontier is ignored.
    ///
    /// # Errors
    ///
    /// Returns `CrawlError::Url` if `url` is not an absolute http(s) URL.
    pub fn add_seed(&self, url: &str) -> Result<(), CrawlError> {
        let seed = WebUrl::seed(url)?;
        match self.frontier.push(seed) {
            PushOutcome::Accepted(doc_id) => tracing::debug!("Seed {} queued as #{}", url, doc_id),
            PushOutcome::Duplicate => tracing::debug!("Seed {} already known", url),
            other => tracing::warn!("Seed {} not queued: {:?}", url, other),
        }
        Ok(())
    }

    /// Runs the crawl to completion with `workers` visitor instances
    ///
    /// Every visitor is created before any worker starts. Returns once the
    /// frontier is exhausted, or after [`ShutdownHandle::shutdown`] once
    /// every worker has finished its current target.
    ///
    /// # Errors
    ///
    /// Only setup problems are errors: zero workers, a second call, a
    /// failing factory or a storage failure while recording the run.
    pub async fn start<F>(&self, factory: F, workers: usize) -> Result<CrawlReport, CrawlError>
    where
        F: WebCrawlerFactory,
    {
        if workers == 0 {
            return Err(ConfigError::Validation("at least one worker is required".to_string()).into());
        }
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(CrawlError::AlreadyRunning);
        }

        let run_id = self.begin_run()?;

        let mut crawlers = Vec::with_capacity(workers);
        for worker in 1..=workers {
            match factory.create() {
                Ok(crawler) => crawlers.push(crawler),
                Err(source) => {
                    tracing::error!("Crawler factory failed for worker {}: {:#}", worker, source);
                    self.store().finish_run(run_id, RunStatus::Failed)?;
                    return Err(CrawlError::Factory { worker, source });
                }
            }
        }

        let shared = Arc::new(CrawlShared {
            config: self.config.clone(),
            frontier: Arc::clone(&self.frontier),
            fetcher: Arc::clone(&self.fetcher),
            robots: Arc::clone(&self.robots),
            parser: Arc::clone(&self.parser),
            stats: Arc::clone(&self.stats),
        });

        tracing::info!(
            "Starting run {} with {} workers, {} targets queued",
            run_id,
            workers,
            self.frontier.size()
        );
        let started = Instant::now();

        let mut tasks = JoinSet::new();
        for (index, crawler) in crawlers.into_iter().enumerate() {
            let worker = Worker::new(index + 1, crawler, Arc::clone(&shared));
            tasks.spawn(worker.run());
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                tracing::error!("Worker task failed: {}", e);
                self.frontier.shutdown();
            }
        }

        let stopped_early = self.frontier.is_shutdown() && !self.frontier.is_finished();
        let status = if stopped_early {
            RunStatus::Interrupted
        } else {
            RunStatus::Completed
        };
        self.store().finish_run(run_id, status)?;

        let report = CrawlReport {
            run_id,
            stats: self.stats.snapshot(),
            fetched: self.frontier.fetched_count(),
            frontier_remaining: self.frontier.size(),
            elapsed: started.elapsed(),
            stopped_early,
        };

        tracing::info!(
            "Run {} {} in {:.1}s: {} fetched, {} visited, {} failed, {} robots denied, {} queued",
            run_id,
            status.to_db_string(),
            report.elapsed.as_secs_f64(),
            report.fetched,
            report.stats.pages_visited,
            report.stats.fetch_failures,
            report.stats.robots_denied,
            report.frontier_remaining
        );

        Ok(report)
    }

    /// Closes a stale run left by a crash and records a new one
    fn begin_run(&self) -> Result<i64, CrawlError> {
        let mut store = self.store();

        if let Some(previous) = store.get_latest_run()? {
            if previous.status == RunStatus::Running {
                tracing::warn!("Run {} did not finish cleanly, marking interrupted", previous.id);
                store.finish_run(previous.id, RunStatus::Interrupted)?;
            }
            if self.config.resumable_crawling && previous.config_hash != self.config_hash {
                tracing::warn!(
                    "Configuration changed since run {}; resuming with the new settings",
                    previous.id
                );
            }
        }

        Ok(store.create_run(&self.config_hash)?)
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            frontier: Arc::clone(&self.frontier),
        }
    }

    /// Read-only view of the frontier
    pub fn frontier(&self) -> &Frontier {
        &self.frontier
    }

    pub fn stats(&self) -> &Arc<CrawlStats> {
        &self.stats
    }

    pub fn robots(&self) -> &RobotsPolicyCache {
        &self.robots
    }

    pub fn config(&self) -> &CrawlConfig {
        &self.config
    }
}

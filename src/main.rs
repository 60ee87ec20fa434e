//! crawlerbykc main entry point
//!
//! This is the command-line interface for the crawlerbykc crawl engine. It
//! crawls the configured seeds with a console visitor that prints every page.

use clap::Parser;
use crawlerbykc::config::{load_config_with_hash, Config, LaunchConfig};
use crawlerbykc::crawler::WorkerContext;
use crawlerbykc::output::{load_statistics, print_statistics};
use crawlerbykc::storage::{frontier_db_path, SqliteStorage};
use crawlerbykc::{CrawlController, Page, WebCrawler, WebUrl};
use regex::Regex;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// crawlerbykc: a polite multi-worker web crawler
///
/// Crawls from the configured seeds while respecting robots.txt and
/// per-host politeness, printing a short report for every page.
#[derive(Parser, Debug)]
#[command(name = "crawlerbykc")]
#[command(version)]
#[command(about = "A polite multi-worker web crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Resume from the stored frontier, overriding the config file
    #[arg(long, conflicts_with = "fresh")]
    resume: bool,

    /// Start a fresh crawl, clearing the stored frontier
    #[arg(long, conflicts_with = "resume")]
    fresh: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the stored frontier and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if cli.fresh {
        config.crawl.resumable_crawling = false;
    } else if cli.resume {
        config.crawl.resumable_crawling = true;
    }

    if cli.dry_run {
        handle_dry_run(&config)?;
    } else if cli.stats {
        handle_stats(&config)?;
    } else {
        handle_crawl(config, config_hash).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("crawlerbykc=info,warn"),
            1 => EnvFilter::new("crawlerbykc=debug,info"),
            2 => EnvFilter::new("crawlerbykc=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let crawl = &config.crawl;
    println!("=== crawlerbykc Dry Run ===\n");

    println!("Crawl Configuration:");
    println!("  Storage folder: {}", crawl.storage_folder.display());
    println!("  Politeness delay: {}ms", crawl.politeness_delay);
    println!("  Max depth: {}", crawl.max_depth_of_crawling);
    match crawl.page_limit() {
        Some(limit) => println!("  Max pages: {}", limit),
        None => println!("  Max pages: unlimited"),
    }
    println!("  Max connections per host: {}", crawl.max_connections_per_host);
    println!("  User agent: {}", crawl.user_agent_string);
    println!("  Respect robots.txt: {}", crawl.respect_robots_txt);
    println!("  Follow redirects: {}", crawl.follow_redirects);
    println!("  Resumable: {}", crawl.resumable_crawling);

    let launch = &config.launch;
    println!("\nWorkers: {}", launch.workers);

    println!("\nSeeds ({}):", launch.seeds.len());
    for seed in &launch.seeds {
        println!("  - {}", seed);
    }

    if !launch.allowed_prefixes.is_empty() {
        println!("\nAllowed prefixes ({}):", launch.allowed_prefixes.len());
        for prefix in &launch.allowed_prefixes {
            println!("  - {}", prefix);
        }
    }

    println!("\nSkipped extensions: {}", launch.skip_extensions.join(", "));

    LinkFilter::new(launch)?;

    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would start crawling {} seed URLs with {} workers",
        launch.seeds.len(),
        launch.workers
    );

    Ok(())
}

/// Handles the --stats mode: shows statistics from the stored frontier
fn handle_stats(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let path = frontier_db_path(&config.crawl.storage_folder);
    if !path.exists() {
        println!("No stored frontier at {}", path.display());
        return Ok(());
    }

    println!("Database: {}\n", path.display());
    let storage = SqliteStorage::new(&path)?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(
    config: Config,
    config_hash: String,
) -> Result<(), Box<dyn std::error::Error>> {
    if config.crawl.resumable_crawling {
        tracing::info!("Starting crawl (resuming from stored frontier)");
    } else {
        tracing::info!("Starting fresh crawl");
    }

    let filter = Arc::new(LinkFilter::new(&config.launch)?);
    let workers = config.launch.workers;

    let controller = CrawlController::new(config.crawl)?.with_config_hash(config_hash);
    for seed in &config.launch.seeds {
        if let Err(e) = controller.add_seed(seed) {
            tracing::warn!("Skipping seed {}: {}", seed, e);
        }
    }

    let handle = controller.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, finishing in-flight pages");
            handle.shutdown();
        }
    });

    let factory = move || -> anyhow::Result<ConsoleCrawler> {
        Ok(ConsoleCrawler::new(Arc::clone(&filter)))
    };

    match controller.start(factory, workers).await {
        Ok(report) => {
            println!("\n=== Crawl Finished ===");
            println!("  Pages fetched: {}", report.fetched);
            println!("  Pages visited: {}", report.stats.pages_visited);
            println!("  Links discovered: {}", report.stats.links_discovered);
            println!("  Fetch failures: {}", report.stats.fetch_failures);
            println!("  Robots denied: {}", report.stats.robots_denied);
            println!("  Still queued: {}", report.frontier_remaining);
            println!("  Elapsed: {:.1}s", report.elapsed.as_secs_f64());
            if report.stopped_early {
                println!("  Stopped early; rerun with --resume to continue");
            }
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}

/// Admission rules of the console crawler
struct LinkFilter {
    skip: Regex,
    allowed_prefixes: Vec<String>,
}

impl LinkFilter {
    fn new(launch: &LaunchConfig) -> Result<Self, regex::Error> {
        let pattern = format!(r"(?i)\.({})$", launch.skip_extensions.join("|"));
        Ok(Self {
            skip: Regex::new(&pattern)?,
            allowed_prefixes: launch.allowed_prefixes.clone(),
        })
    }

    fn admits(&self, url: &WebUrl) -> bool {
        if self.skip.is_match(url.path()) {
            return false;
        }
        self.allowed_prefixes.is_empty()
            || self
                .allowed_prefixes
                .iter()
                .any(|prefix| url.as_str().starts_with(prefix.as_str()))
    }
}

/// Prints a short report for every visited page
struct ConsoleCrawler {
    filter: Arc<LinkFilter>,
    worker_id: usize,
    visited: u64,
    bytes: u64,
}

impl ConsoleCrawler {
    fn new(filter: Arc<LinkFilter>) -> Self {
        Self {
            filter,
            worker_id: 0,
            visited: 0,
            bytes: 0,
        }
    }
}

impl WebCrawler for ConsoleCrawler {
    fn on_start(&mut self, ctx: &WorkerContext) {
        self.worker_id = ctx.worker_id();
    }

    fn should_visit(&self, _referring: Option<&Page>, url: &WebUrl) -> bool {
        self.filter.admits(url)
    }

    fn visit(&mut self, page: &Page) -> anyhow::Result<()> {
        self.visited += 1;
        self.bytes += page.content().len() as u64;

        println!("[worker {}] URL: {}", self.worker_id, page.url());
        println!("  Depth: {}", page.url().depth());
        if let Some(parent) = page.url().parent_url() {
            println!("  Parent: {}", parent);
        }

        if let Some(html) = page.html() {
            println!("  Title: {}", html.title.as_deref().unwrap_or("-"));
            println!("  Text length: {}", html.text.len());
            println!("  Html length: {}", html.html.len());
            println!("  Number of outgoing links: {}", html.outgoing_urls.len());
            for link in html.outgoing_urls.iter().take(3) {
                println!("    -> {}", link);
            }
        } else if let Some(text) = page.parse_data().text() {
            println!("  Text length: {}", text.len());
        } else {
            println!("  Binary content: {} bytes", page.content().len());
        }

        Ok(())
    }

    fn on_before_exit(&mut self) {
        println!(
            "[worker {}] visited {} pages, {} bytes",
            self.worker_id, self.visited, self.bytes
        );
    }
}

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Launcher file layout used by the `crawlerbykc` binary
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawl: CrawlConfig,
    pub launch: LaunchConfig,
}

/// Crawl engine configuration
///
/// A snapshot handed to [`crate::crawler::CrawlController::new`]; it is
/// validated once there and never changes for the lifetime of a crawl.
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlConfig {
    /// Folder holding the durable frontier database
    #[serde(rename = "storage-folder")]
    pub storage_folder: PathBuf,

    /// Minimum time between two fetches to the same host (milliseconds)
    #[serde(rename = "politeness-delay", default = "default_politeness_delay")]
    pub politeness_delay: u64,

    /// Maximum crawl depth; 0 fetches the seeds only
    #[serde(rename = "max-depth-of-crawling", default = "default_max_depth")]
    pub max_depth_of_crawling: u32,

    /// Maximum number of pages accepted into the frontier; <= 0 is unlimited
    #[serde(rename = "max-pages-to-fetch", default = "default_max_pages")]
    pub max_pages_to_fetch: i64,

    /// User-Agent header sent with every request
    #[serde(rename = "user-agent-string", default = "default_user_agent")]
    pub user_agent_string: String,

    /// Maximum number of simultaneous connections to one host
    #[serde(rename = "max-connections-per-host", default = "default_max_connections")]
    pub max_connections_per_host: u32,

    /// TCP connect timeout (milliseconds)
    #[serde(rename = "connection-timeout", default = "default_timeout")]
    pub connection_timeout: u64,

    /// Whole-request timeout once connected (milliseconds)
    #[serde(rename = "socket-timeout", default = "default_timeout")]
    pub socket_timeout: u64,

    /// Resume from the durable frontier instead of starting fresh
    #[serde(rename = "resumable-crawling", default)]
    pub resumable_crawling: bool,

    /// Schedule the targets of 3xx responses
    #[serde(rename = "follow-redirects", default = "default_true")]
    pub follow_redirects: bool,

    /// Fetch and honor robots.txt
    #[serde(rename = "respect-robots-txt", default = "default_true")]
    pub respect_robots_txt: bool,

    /// Largest response body accepted (bytes)
    #[serde(rename = "max-download-size", default = "default_max_download_size")]
    pub max_download_size: u64,

    /// Number of parsed links per page considered for admission
    #[serde(rename = "max-outgoing-links-to-follow", default = "default_max_outgoing")]
    pub max_outgoing_links_to_follow: usize,

    /// Hand non-text responses to visitors
    #[serde(rename = "include-binary-content", default)]
    pub include_binary_content: bool,
}

fn default_politeness_delay() -> u64 {
    200
}

fn default_max_depth() -> u32 {
    u32::MAX
}

fn default_max_pages() -> i64 {
    -1
}

fn default_user_agent() -> String {
    format!("crawlerbykc/{}", env!("CARGO_PKG_VERSION"))
}

fn default_max_connections() -> u32 {
    100
}

fn default_timeout() -> u64 {
    20_000
}

fn default_true() -> bool {
    true
}

fn default_max_download_size() -> u64 {
    1_048_576
}

fn default_max_outgoing() -> usize {
    5000
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            storage_folder: std::env::temp_dir().join("crawlerbykc"),
            politeness_delay: default_politeness_delay(),
            max_depth_of_crawling: default_max_depth(),
            max_pages_to_fetch: default_max_pages(),
            user_agent_string: default_user_agent(),
            max_connections_per_host: default_max_connections(),
            connection_timeout: default_timeout(),
            socket_timeout: default_timeout(),
            resumable_crawling: false,
            follow_redirects: true,
            respect_robots_txt: true,
            max_download_size: default_max_download_size(),
            max_outgoing_links_to_follow: default_max_outgoing(),
            include_binary_content: false,
        }
    }
}

impl CrawlConfig {
    /// Validates the configuration, see [`crate::config::validate_crawl_config`]
    pub fn validate(&self) -> Result<(), crate::ConfigError> {
        super::validation::validate_crawl_config(self)
    }

    /// Page ceiling, or `None` when unlimited
    pub fn page_limit(&self) -> Option<u64> {
        (self.max_pages_to_fetch > 0).then(|| self.max_pages_to_fetch as u64)
    }

    pub fn politeness(&self) -> Duration {
        Duration::from_millis(self.politeness_delay)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.socket_timeout)
    }
}

/// What the binary crawls and how many workers it uses
#[derive(Debug, Clone, Deserialize)]
pub struct LaunchConfig {
    /// Number of worker tasks
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Seed URLs, crawled at depth 0
    pub seeds: Vec<String>,

    /// Only URLs starting with one of these prefixes are admitted (all if empty)
    #[serde(rename = "allowed-prefixes", default)]
    pub allowed_prefixes: Vec<String>,

    /// File extensions never admitted
    #[serde(rename = "skip-extensions", default = "default_skip_extensions")]
    pub skip_extensions: Vec<String>,
}

fn default_workers() -> usize {
    1
}

fn default_skip_extensions() -> Vec<String> {
    [
        "css", "js", "gif", "jpg", "jpeg", "png", "mp3", "mp4", "zip", "gz", "pdf", "doc", "docx",
        "xls", "xlsx",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

//! crawlerbykc: a polite, multi-worker web crawling engine
//!
//! The engine keeps a durable frontier of discovered URLs, honors robots.txt
//! and per-host politeness limits, and hands every fetched and parsed page to
//! caller-supplied [`crawler::WebCrawler`] visitors, one instance per worker.

pub mod config;
pub mod crawler;
pub mod output;
pub mod robots;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Fatal errors of the crawl engine
///
/// Everything that can go wrong while a crawl is running (fetch failures,
/// parse failures, visitor failures) is handled inside the workers. Only
/// setup problems surface through this type.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to create crawler instance for worker {worker}: {source}")]
    Factory {
        worker: usize,
        source: anyhow::Error,
    },

    #[error("Crawl already running")]
    AlreadyRunning,
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Malformed URL '{url}': {reason}")]
    Malformed { url: String, reason: String },

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL: {0}")]
    MissingHost(String),
}

/// Result type alias for engine setup operations
pub type Result<T> = std::result::Result<T, CrawlError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::CrawlConfig;
pub use crawler::{
    CrawlController, CrawlReport, HtmlParseData, Page, ParseData, ShutdownHandle, WebCrawler,
    WebCrawlerFactory,
};
pub use url::{normalize_url, WebUrl};

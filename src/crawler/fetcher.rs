//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with the configured user agent and timeouts
//! - Waiting for a per-host connection slot and politeness window
//! - Manual redirect handling (redirects are reported, not followed)
//! - Enforcing the maximum download size
//! - Error classification

use crate::config::CrawlConfig;
use crate::state::HostRegistry;
use crate::url::host_key;
use reqwest::header::{HeaderMap, CONTENT_LENGTH, CONTENT_TYPE, LOCATION};
use reqwest::{redirect::Policy, Client};
use std::sync::Arc;
use thiserror::Error;
use url::Url;

/// Non-fatal reasons a fetch produced no page
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("response exceeds {limit} bytes")]
    TooLarge { limit: u64 },

    #[error("redirect {0} without a usable Location header")]
    BadRedirect(u16),

    #[error("failed to read body: {0}")]
    Body(String),

    #[error("URL has no host: {0}")]
    NoHost(String),

    #[error("request failed: {0}")]
    Other(String),
}

impl FetchError {
    /// HTTP status of the response, when the failure came from one
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status(code) | Self::BadRedirect(code) => Some(*code),
            _ => None,
        }
    }
}

/// A successfully downloaded response
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// The URL that was requested
    pub url: Url,
    /// HTTP status code
    pub status: u16,
    /// Content-Type header value
    pub content_type: Option<String>,
    /// All response headers
    pub headers: HeaderMap,
    /// Raw body bytes
    pub body: Vec<u8>,
}

/// Result of a fetch operation
#[derive(Debug)]
pub enum FetchOutcome {
    /// 2xx response with its body
    Success(FetchedPage),

    /// 3xx response; `location` is resolved against the requested URL
    Redirect { status: u16, location: String },

    /// Timeout, connection error, non-2xx status or oversized body
    Failure(FetchError),
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The crawl configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &CrawlConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent_string.clone())
        .connect_timeout(config.connect_timeout())
        .timeout(config.request_timeout())
        .redirect(Policy::none()) // Handle redirects manually
        .gzip(true)
        .brotli(true)
        .build()
}

/// Performs HTTP fetches while honoring per-host politeness
///
/// Every fetch first claims a slot from the shared [`HostRegistry`], which
/// caps concurrent connections per host and spaces fetch starts by the
/// politeness delay (or the host's robots crawl-delay, if larger). The slot
/// is released when the response body has been read, and that moment is
/// what the next fetch to the host is spaced from.
pub struct PoliteFetcher {
    client: Client,
    hosts: Arc<HostRegistry>,
    max_download_size: u64,
}

impl PoliteFetcher {
    /// Creates a fetcher sharing `hosts` with the frontier
    pub fn new(config: &CrawlConfig, hosts: Arc<HostRegistry>) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(config)?,
            hosts,
            max_download_size: config.max_download_size,
        })
    }

    pub fn hosts(&self) -> &Arc<HostRegistry> {
        &self.hosts
    }

    /// Fetches `url`, waiting cooperatively for the host to become eligible
    ///
    /// Never returns an error: every problem is folded into
    /// [`FetchOutcome::Failure`].
    pub async fn fetch(&self, url: &Url) -> FetchOutcome {
        let Some(key) = host_key(url) else {
            return FetchOutcome::Failure(FetchError::NoHost(url.to_string()));
        };

        let Some(permit) = self.hosts.acquire(&key).await else {
            return FetchOutcome::Failure(FetchError::Other("host slots closed".to_string()));
        };

        tracing::debug!("Fetching {}", url);
        let outcome = self.execute(url).await;
        drop(permit);

        outcome
    }

    async fn execute(&self, url: &Url) -> FetchOutcome {
        let mut response = match self.client.get(url.clone()).send().await {
            Ok(response) => response,
            Err(e) => return FetchOutcome::Failure(classify_error(&e)),
        };

        let status = response.status();

        if status.is_redirection() {
            let location = response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|loc| url.join(loc).ok());
            return match location {
                Some(target) => FetchOutcome::Redirect {
                    status: status.as_u16(),
                    location: target.to_string(),
                },
                None => FetchOutcome::Failure(FetchError::BadRedirect(status.as_u16())),
            };
        }

        if !status.is_success() {
            return FetchOutcome::Failure(FetchError::Status(status.as_u16()));
        }

        let limit = self.max_download_size;
        let declared = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        if declared.map_or(false, |len| len > limit) {
            return FetchOutcome::Failure(FetchError::TooLarge { limit });
        }

        let headers = response.headers().clone();
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());

        let mut body = Vec::new();
        loop {
            match response.chunk().await {
                Ok(Some(chunk)) => {
                    if body.len() as u64 + chunk.len() as u64 > limit {
                        return FetchOutcome::Failure(FetchError::TooLarge { limit });
                    }
                    body.extend_from_slice(&chunk);
                }
                Ok(None) => break,
                Err(e) if e.is_timeout() => return FetchOutcome::Failure(FetchError::Timeout),
                Err(e) => return FetchOutcome::Failure(FetchError::Body(e.to_string())),
            }
        }

        FetchOutcome::Success(FetchedPage {
            url: url.clone(),
            status: status.as_u16(),
            content_type,
            headers,
            body,
        })
    }
}

/// Maps a reqwest error onto the fetch failure taxonomy
fn classify_error(e: &reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else if e.is_connect() {
        FetchError::Connect(e.to_string())
    } else {
        FetchError::Other(e.to_string())
    }
}

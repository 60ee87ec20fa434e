//! Crawler module: the fetch-parse-dispatch engine
//!
//! This module contains the core crawling logic, including:
//! - The shared frontier with depth, uniqueness and page-ceiling admission
//! - Politeness-bounded HTTP fetching
//! - HTML parsing and link extraction
//! - The visitor contract and the worker pool that drives it

mod controller;
mod fetcher;
mod frontier;
mod parser;
mod visitor;
mod worker;

pub use controller::{CrawlController, CrawlReport, ShutdownHandle};
pub use fetcher::{build_http_client, FetchError, FetchOutcome, FetchedPage, PoliteFetcher};
pub use frontier::{Frontier, PushOutcome};
pub use parser::{parse_html, HtmlParseData, HtmlParser, ParseData, ParseError, ScraperParser};
pub use visitor::{CrawlStats, Page, StatsSnapshot, WebCrawler, WebCrawlerFactory, WorkerContext};

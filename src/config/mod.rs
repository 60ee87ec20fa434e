//! Configuration module for crawlerbykc
//!
//! This module holds the crawl engine configuration ([`CrawlConfig`]) and the
//! launcher file format read by the binary.
//!
//! # Example
//!
//! ```no_run
//! use crawlerbykc::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("crawl.toml")).unwrap();
//! println!("Max depth: {}", config.crawl.max_depth_of_crawling);
//! ```

mod parser;
mod types;
mod validation;

pub use types::{Config, CrawlConfig, LaunchConfig};

pub use parser::{
    compute_config_hash, fingerprint_crawl_config, load_config, load_config_with_hash,
    parse_config,
};
pub use validation::{validate, validate_crawl_config};

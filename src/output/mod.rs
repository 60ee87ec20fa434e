//! Output module for reporting on stored crawl state
//!
//! Summaries are computed from the durable frontier, so they are available
//! for finished, interrupted and running crawls alike.

pub mod stats;

pub use stats::{load_statistics, print_statistics, CrawlStatistics};

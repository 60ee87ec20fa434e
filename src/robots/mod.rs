//! Robots.txt handling module
//!
//! This module provides functionality for fetching, parsing, and caching robots.txt files.
//! It respects robots.txt directives when crawling websites.

mod cache;
mod parser;

pub use cache::RobotsPolicyCache;
pub use parser::{agent_token, ParsedRobots};

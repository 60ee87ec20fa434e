//! Statistics generation from the durable frontier
//!
//! This module provides functionality for summarizing a crawl's stored
//! state and displaying it.

use crate::state::UrlState;
use crate::storage::{RunRecord, Storage, StorageResult};
use std::collections::HashMap;

/// Crawl statistics summary
#[derive(Debug, Clone)]
pub struct CrawlStatistics {
    /// Total number of URLs accepted into the frontier
    pub total_urls: u64,

    /// Count of URLs by state
    pub urls_by_state: HashMap<UrlState, u64>,

    /// Number of distinct hosts encountered
    pub unique_hosts: u64,

    /// Deepest crawl depth reached, None when nothing was stored
    pub deepest_depth: Option<u32>,

    /// Number of URLs at each depth
    pub depth_breakdown: HashMap<u32, usize>,

    /// The most recent run
    pub last_run: Option<RunRecord>,
}

impl CrawlStatistics {
    /// Number of URLs in `state`
    pub fn count(&self, state: UrlState) -> u64 {
        self.urls_by_state.get(&state).copied().unwrap_or(0)
    }

    /// URLs still queued or in progress
    pub fn pending(&self) -> u64 {
        self.count(UrlState::Queued) + self.count(UrlState::InProgress)
    }

    /// URLs that ended in an error state
    pub fn errors(&self) -> u64 {
        self.urls_by_state
            .iter()
            .filter(|(state, _)| state.is_error())
            .map(|(_, count)| count)
            .sum()
    }
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(CrawlStatistics)` - Successfully loaded statistics
/// * `Err(StorageError)` - Failed to query statistics
pub fn load_statistics(storage: &dyn Storage) -> StorageResult<CrawlStatistics> {
    let total_urls = storage.count_total_urls()?;
    let unique_hosts = storage.count_unique_hosts()?;
    let urls_by_state = storage.get_state_summary()?;
    let depth_breakdown = storage.get_depth_breakdown()?;
    let deepest_depth = depth_breakdown.keys().max().copied();
    let last_run = storage.get_latest_run()?;

    Ok(CrawlStatistics {
        total_urls,
        urls_by_state,
        unique_hosts,
        deepest_depth,
        depth_breakdown,
        last_run,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Crawl Statistics ===\n");

    if let Some(run) = &stats.last_run {
        println!("Last run:");
        println!("  Id: {}", run.id);
        println!("  Status: {}", run.status.to_db_string());
        println!("  Started: {}", run.started_at);
        if let Some(finished) = &run.finished_at {
            println!("  Finished: {}", finished);
        }
        println!();
    }

    println!("Overview:");
    println!("  Total URLs: {}", stats.total_urls);
    println!("  Unique hosts: {}", stats.unique_hosts);
    match stats.deepest_depth {
        Some(depth) => println!("  Deepest depth: {}", depth),
        None => println!("  Deepest depth: -"),
    }
    println!("  Pending: {}", stats.pending());
    println!();

    println!("URLs by State:");
    for state in UrlState::all() {
        let count = stats.count(state);
        if count == 0 {
            continue;
        }
        let percentage = if stats.total_urls > 0 {
            (count as f64 / stats.total_urls as f64) * 100.0
        } else {
            0.0
        };
        println!("  {}: {} ({:.1}%)", state, count, percentage);
    }
    println!();

    if !stats.depth_breakdown.is_empty() {
        println!("URLs by Depth:");
        let mut depths: Vec<_> = stats.depth_breakdown.iter().collect();
        depths.sort();
        for (depth, count) in depths {
            println!("  {}: {}", depth, count);
        }
        println!();
    }

    let fetched = stats.count(UrlState::Fetched);
    let attempted = fetched + stats.errors();
    let success_rate = if attempted > 0 {
        (fetched as f64 / attempted as f64) * 100.0
    } else {
        0.0
    };

    println!(
        "Success Rate: {:.1}% ({} / {} attempted URLs fetched and parsed)",
        success_rate, fetched, attempted
    );
}

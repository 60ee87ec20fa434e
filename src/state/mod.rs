//! State module for tracking crawl progress
//!
//! This module provides state management for URLs, hosts and workers during the crawl process.
//!
//! # Components
//!
//! - `UrlState`: Tracks the state of individual URLs in the durable frontier (queued, in progress, fetched, etc.)
//! - `HostState` / `HostRegistry`: Per-host politeness timing and connection slots
//! - `WorkerState`: Lifecycle of a single worker loop

mod host_state;
mod url_state;
mod worker_state;

// Re-export main types
pub use host_state::{HostPermit, HostRegistry, HostState};
pub use url_state::UrlState;
pub use worker_state::WorkerState;

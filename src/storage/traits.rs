//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::state::UrlState;
use crate::storage::{NewUrl, RunRecord, RunStatus, UrlRecord};
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("URL not found: {0}")]
    UrlNotFound(String),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for durable frontier backends
///
/// This trait defines all database operations needed by the crawler.
/// The engine wraps the backend in a mutex, so implementations need only be `Send`.
pub trait Storage: Send {
    // ===== Run Management =====

    /// Creates a new crawl run
    ///
    /// # Arguments
    ///
    /// * `config_hash` - Fingerprint of the crawl configuration
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Updates the status of a run
    fn update_run_status(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()>;

    /// Marks a run as finished with the given status and a finish timestamp
    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()>;

    // ===== URL Management =====

    /// Persists a newly accepted URL in the `queued` state
    ///
    /// # Arguments
    ///
    /// * `url` - The URL with its frontier-assigned document id
    ///
    /// # Errors
    ///
    /// Returns `ConstraintViolation` if the URL or document id is already stored.
    fn insert_url(&mut self, url: &NewUrl<'_>) -> StorageResult<()>;

    /// Gets a URL by document id
    fn get_url(&self, doc_id: i64) -> StorageResult<UrlRecord>;

    /// Gets a URL by its normalized string
    fn get_url_by_str(&self, url: &str) -> StorageResult<Option<UrlRecord>>;

    /// Updates the state of a URL
    fn update_url_state(&mut self, doc_id: i64, state: UrlState) -> StorageResult<()>;

    /// Loads every stored URL in document id order
    ///
    /// This is used to rehydrate the frontier on resume
    fn load_urls(&self) -> StorageResult<Vec<UrlRecord>>;

    /// Highest document id assigned so far, 0 if none
    fn max_doc_id(&self) -> StorageResult<i64>;

    /// Deletes every stored URL
    fn clear_urls(&mut self) -> StorageResult<()>;

    // ===== Statistics =====

    /// Counts URLs by state
    fn count_urls_by_state(&self, state: UrlState) -> StorageResult<u64>;

    /// Gets total URL count
    fn count_total_urls(&self) -> StorageResult<u64>;

    /// Gets count of distinct hosts discovered
    fn count_unique_hosts(&self) -> StorageResult<u64>;

    /// Gets the URL count for every state present
    fn get_state_summary(&self) -> StorageResult<HashMap<UrlState, u64>>;

    /// Gets URL count breakdown by depth
    ///
    /// Returns a map of depth -> number of URLs at that depth
    fn get_depth_breakdown(&self) -> StorageResult<HashMap<u32, usize>>;

    /// Gets list of all discovered hosts
    ///
    /// Returns a sorted list of unique hosts found during the crawl
    fn get_discovered_hosts(&self) -> StorageResult<Vec<String>>;
}

//! Storage module for the durable frontier
//!
//! This module handles all database operations for the crawler, including:
//! - SQLite database initialization and schema management
//! - Persisting every accepted URL with its depth, parent and state
//! - Run tracking and resumption support
//! - Aggregate queries for the statistics report

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::state::UrlState;

use std::path::{Path, PathBuf};

/// File name of the frontier database inside the storage folder
pub const FRONTIER_DB_NAME: &str = "frontier.db";

/// Path of the frontier database for a storage folder
pub fn frontier_db_path(storage_folder: &Path) -> PathBuf {
    storage_folder.join(FRONTIER_DB_NAME)
}

/// Opens (creating if needed) the frontier database inside `storage_folder`
///
/// # Arguments
///
/// * `storage_folder` - Directory holding the crawl's durable state
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(StorageError)` - The folder could not be created or the database opened
pub fn open_storage(storage_folder: &Path) -> StorageResult<SqliteStorage> {
    std::fs::create_dir_all(storage_folder)?;
    SqliteStorage::new(&frontier_db_path(storage_folder))
}

/// A URL accepted into the frontier, as persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlRecord {
    pub doc_id: i64,
    pub url: String,
    pub host: String,
    pub parent_url: Option<String>,
    pub parent_doc_id: Option<i64>,
    pub depth: u32,
    pub state: UrlState,
    pub discovered_at: String,
    pub updated_at: String,
}

/// Fields needed to persist a newly accepted URL
#[derive(Debug, Clone, Copy)]
pub struct NewUrl<'a> {
    pub doc_id: i64,
    pub url: &'a str,
    pub host: &'a str,
    pub parent_url: Option<&'a str>,
    pub parent_doc_id: Option<i64>,
    pub depth: u32,
}

/// Represents a crawl run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
}

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "interrupted" => Some(Self::Interrupted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

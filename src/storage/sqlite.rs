//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::state::UrlState;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{NewUrl, RunRecord, RunStatus, UrlRecord};
use chrono::Utc;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use std::collections::HashMap;
use std::path::Path;

const URL_COLUMNS: &str = "doc_id, url, host, parent_url, parent_doc_id, depth, state, \
                           discovered_at, updated_at";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        // Every push is committed before the target becomes visible, so keep
        // the write path cheap.
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn row_to_url(row: &Row<'_>) -> rusqlite::Result<UrlRecord> {
    Ok(UrlRecord {
        doc_id: row.get(0)?,
        url: row.get(1)?,
        host: row.get(2)?,
        parent_url: row.get(3)?,
        parent_doc_id: row.get(4)?,
        depth: row.get(5)?,
        state: UrlState::from_db_string(&row.get::<_, String>(6)?).unwrap_or(UrlState::Failed),
        discovered_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn row_to_run(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(4)?)
            .unwrap_or(RunStatus::Running),
    })
}

impl Storage for SqliteStorage {
    // ===== Run Management =====

    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status FROM runs WHERE id = ?1",
                params![run_id],
                row_to_run,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status FROM runs ORDER BY id DESC LIMIT 1",
                [],
                row_to_run,
            )
            .optional()?;

        Ok(run)
    }

    fn update_run_status(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()> {
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1 WHERE id = ?2",
            params![status.to_db_string(), run_id],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![status.to_db_string(), now, run_id],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    // ===== URL Management =====

    fn insert_url(&mut self, url: &NewUrl<'_>) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO urls (doc_id, url, host, parent_url, parent_doc_id, depth, state,
                 discovered_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
                params![
                    url.doc_id,
                    url.url,
                    url.host,
                    url.parent_url,
                    url.parent_doc_id,
                    url.depth,
                    UrlState::Queued.to_db_string(),
                    now
                ],
            )
            .map_err(|e| match e {
                rusqlite::Error::SqliteFailure(err, _) if err.code == ErrorCode::ConstraintViolation => {
                    StorageError::ConstraintViolation(format!("URL already stored: {}", url.url))
                }
                other => StorageError::Sqlite(other),
            })?;
        Ok(())
    }

    fn get_url(&self, doc_id: i64) -> StorageResult<UrlRecord> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM urls WHERE doc_id = ?1", URL_COLUMNS),
                params![doc_id],
                row_to_url,
            )
            .optional()?
            .ok_or_else(|| StorageError::UrlNotFound(format!("Document ID {}", doc_id)))
    }

    fn get_url_by_str(&self, url: &str) -> StorageResult<Option<UrlRecord>> {
        let record = self
            .conn
            .query_row(
                &format!("SELECT {} FROM urls WHERE url = ?1", URL_COLUMNS),
                params![url],
                row_to_url,
            )
            .optional()?;

        Ok(record)
    }

    fn update_url_state(&mut self, doc_id: i64, state: UrlState) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE urls SET state = ?1, updated_at = ?2 WHERE doc_id = ?3",
            params![state.to_db_string(), now, doc_id],
        )?;
        if updated == 0 {
            return Err(StorageError::UrlNotFound(format!("Document ID {}", doc_id)));
        }
        Ok(())
    }

    fn load_urls(&self) -> StorageResult<Vec<UrlRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {} FROM urls ORDER BY doc_id", URL_COLUMNS))?;

        let urls = stmt
            .query_map([], row_to_url)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(urls)
    }

    fn max_doc_id(&self) -> StorageResult<i64> {
        let max: Option<i64> = self
            .conn
            .query_row("SELECT MAX(doc_id) FROM urls", [], |row| row.get(0))?;
        Ok(max.unwrap_or(0))
    }

    fn clear_urls(&mut self) -> StorageResult<()> {
        self.conn.execute("DELETE FROM urls", [])?;
        Ok(())
    }

    // ===== Statistics =====

    fn count_urls_by_state(&self, state: UrlState) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM urls WHERE state = ?1",
            params![state.to_db_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_total_urls(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM urls", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_unique_hosts(&self) -> StorageResult<u64> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(DISTINCT host) FROM urls", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn get_state_summary(&self) -> StorageResult<HashMap<UrlState, u64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT state, COUNT(*) FROM urls GROUP BY state")?;

        let mut summary = HashMap::new();
        let rows = stmt.query_map([], |row| {
            let state_str: String = row.get(0)?;
            let count: i64 = row.get(1)?;
            Ok((state_str, count))
        })?;

        for row in rows {
            let (state_str, count) = row?;
            if let Some(state) = UrlState::from_db_string(&state_str) {
                summary.insert(state, count as u64);
            }
        }

        Ok(summary)
    }

    fn get_depth_breakdown(&self) -> StorageResult<HashMap<u32, usize>> {
        let mut stmt = self
            .conn
            .prepare("SELECT depth, COUNT(*) FROM urls GROUP BY depth ORDER BY depth")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, u32>(0)?, row.get::<_, usize>(1)?))
        })?;

        let mut breakdown = HashMap::new();
        for row in rows {
            let (depth, count) = row?;
            breakdown.insert(depth, count);
        }

        Ok(breakdown)
    }

    fn get_discovered_hosts(&self) -> StorageResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT host FROM urls ORDER BY host")?;
        let hosts = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(hosts)
    }
}

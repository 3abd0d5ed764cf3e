//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::crawler::CrawlResult;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{ResultRecord, RunRecord, RunStatus};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::BTreeMap;
use std::path::Path;

const RUN_COLUMNS: &str =
    "id, seed_url, started_at, finished_at, config_hash, status, pages_total";

const RESULT_COLUMNS: &str = "id, run_id, url, final_url, depth, source, success, status_code,
     title, error_message, retries, pagination_type, next_page_url, extracted_content, crawled_at";

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

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        seed_url: row.get(1)?,
        started_at: row.get(2)?,
        finished_at: row.get(3)?,
        config_hash: row.get(4)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(5)?)
            .unwrap_or(RunStatus::Running),
        pages_total: row.get::<_, Option<i64>>(6)?.map(|n| n as u64),
    })
}

fn result_from_row(row: &Row<'_>) -> rusqlite::Result<ResultRecord> {
    Ok(ResultRecord {
        id: row.get(0)?,
        run_id: row.get(1)?,
        url: row.get(2)?,
        final_url: row.get(3)?,
        depth: row.get(4)?,
        source: row.get(5)?,
        success: row.get(6)?,
        status_code: row.get(7)?,
        title: row.get(8)?,
        error_message: row.get(9)?,
        retries: row.get(10)?,
        pagination_type: row.get(11)?,
        next_page_url: row.get(12)?,
        extracted_content: row.get(13)?,
        crawled_at: row.get(14)?,
    })
}

impl Storage for SqliteStorage {
    // ===== Run Management =====

    fn create_run(&mut self, seed_url: &str, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (seed_url, started_at, config_hash, status) VALUES (?1, ?2, ?3, ?4)",
            params![seed_url, now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        let query = format!("SELECT {} FROM runs WHERE id = ?1", RUN_COLUMNS);
        self.conn
            .query_row(&query, params![run_id], run_from_row)
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let query = format!("SELECT {} FROM runs ORDER BY id DESC LIMIT 1", RUN_COLUMNS);
        let run = self.conn.query_row(&query, [], run_from_row).optional()?;
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

    fn complete_run(&mut self, run_id: i64, pages_total: usize) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, pages_total = ?3 WHERE id = ?4",
            params![
                RunStatus::Completed.to_db_string(),
                now,
                pages_total as i64,
                run_id
            ],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    // ===== Results =====

    fn record_result(&mut self, run_id: i64, result: &CrawlResult) -> StorageResult<()> {
        let extracted_content = result
            .extracted_content
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let pagination = result
            .pagination_info
            .as_ref()
            .filter(|info| info.has_pagination);

        self.conn.execute(
            "INSERT OR REPLACE INTO results (
                run_id, url, final_url, depth, source, success, status_code, title,
                error_message, retries, response_time_ms, content_size, links_count,
                pagination_type, next_page_url, extracted_content, crawled_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
            params![
                run_id,
                result.url,
                result.final_url,
                result.depth,
                result.source.as_str(),
                result.success,
                result.status_code,
                result.title,
                result.error,
                result.retries,
                result.performance_metrics.response_time as i64,
                result.performance_metrics.content_size as i64,
                result.performance_metrics.links_count as i64,
                pagination.map(|info| info.pagination_type.as_str()),
                pagination.and_then(|info| info.next_page_url.as_deref()),
                extracted_content,
                result.crawled_at.to_rfc3339(),
            ],
        )?;

        Ok(())
    }

    fn get_results(&self, run_id: i64) -> StorageResult<Vec<ResultRecord>> {
        let query = format!(
            "SELECT {} FROM results WHERE run_id = ?1 ORDER BY id",
            RESULT_COLUMNS
        );
        let mut stmt = self.conn.prepare(&query)?;

        let results = stmt
            .query_map(params![run_id], result_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(results)
    }

    // ===== Statistics =====

    fn count_results(&self, run_id: i64, success: Option<bool>) -> StorageResult<u64> {
        let count: i64 = match success {
            Some(success) => self.conn.query_row(
                "SELECT COUNT(*) FROM results WHERE run_id = ?1 AND success = ?2",
                params![run_id, success],
                |row| row.get(0),
            )?,
            None => self.conn.query_row(
                "SELECT COUNT(*) FROM results WHERE run_id = ?1",
                params![run_id],
                |row| row.get(0),
            )?,
        };
        Ok(count as u64)
    }

    fn get_depth_breakdown(&self, run_id: i64) -> StorageResult<BTreeMap<u32, u64>> {
        let query = "
            SELECT depth, COUNT(*) as count
            FROM results
            WHERE run_id = ?1
            GROUP BY depth
            ORDER BY depth
        ";

        let mut stmt = self.conn.prepare(query)?;
        let rows = stmt.query_map(params![run_id], |row| {
            Ok((row.get::<_, u32>(0)?, row.get::<_, i64>(1)? as u64))
        })?;

        let mut breakdown = BTreeMap::new();
        for row in rows {
            let (depth, count) = row?;
            breakdown.insert(depth, count);
        }

        Ok(breakdown)
    }

    fn get_source_breakdown(&self, run_id: i64) -> StorageResult<BTreeMap<String, u64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT source, COUNT(*) FROM results WHERE run_id = ?1 GROUP BY source")?;

        let breakdown = stmt
            .query_map(params![run_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
            })?
            .collect::<Result<BTreeMap<_, _>, _>>()?;

        Ok(breakdown)
    }

    fn get_error_summary(&self, run_id: i64) -> StorageResult<Vec<(String, u64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT error_message, COUNT(*) as count FROM results
             WHERE run_id = ?1 AND success = 0 AND error_message IS NOT NULL
             GROUP BY error_message ORDER BY count DESC, error_message",
        )?;

        let errors = stmt
            .query_map(params![run_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(errors)
    }
}

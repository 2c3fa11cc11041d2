//! SQLite record sink
//!
//! Stores every page record of a run in a `pages` table, keyed by the run
//! that produced it. The `runs` table remembers when each run started,
//! finished and with which configuration.

use crate::output::record::PageRecord;
use crate::output::stats::CrawlSummary;
use crate::output::traits::{RecordSink, SinkResult};
use crate::state::PageStatus;
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Mutex, PoisonError};

/// SQL schema for the output database
pub const SCHEMA_SQL: &str = r#"
-- Track crawl runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    state TEXT NOT NULL
);

-- One row per fetch attempt
CREATE TABLE IF NOT EXISTS pages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    url TEXT NOT NULL,
    depth INTEGER NOT NULL,
    status TEXT NOT NULL,
    http_status INTEGER,
    title TEXT,
    body_text TEXT NOT NULL,
    outbound_links TEXT NOT NULL,
    failure_reason TEXT,
    annotations TEXT,
    fetched_at TEXT NOT NULL,
    UNIQUE(run_id, url)
);

CREATE INDEX IF NOT EXISTS idx_pages_run ON pages(run_id);
CREATE INDEX IF NOT EXISTS idx_pages_status ON pages(status);
"#;

pub struct SqliteSink {
    conn: Mutex<Connection>,
    run_id: i64,
}

impl SqliteSink {
    /// Opens (or creates) the database at `path` and starts a new run
    pub fn open(path: &Path, config_hash: &str) -> SinkResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
        ",
        )?;

        Self::with_connection(conn, config_hash)
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn open_in_memory(config_hash: &str) -> SinkResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Self::with_connection(conn, config_hash)
    }

    fn with_connection(conn: Connection, config_hash: &str) -> SinkResult<Self> {
        conn.execute_batch(SCHEMA_SQL)?;

        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO runs (started_at, config_hash, state) VALUES (?1, ?2, ?3)",
            params![now, config_hash, "running"],
        )?;
        let run_id = conn.last_insert_rowid();

        Ok(Self {
            conn: Mutex::new(conn),
            run_id,
        })
    }

    pub fn run_id(&self) -> i64 {
        self.run_id
    }

    /// Marks the run finished with the summary's terminal state
    pub fn complete_run(&self, summary: &CrawlSummary) -> SinkResult<()> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        conn.execute(
            "UPDATE runs SET state = ?1, finished_at = ?2 WHERE id = ?3",
            params![
                summary.state.as_str(),
                summary.finished_at.to_rfc3339(),
                self.run_id
            ],
        )?;
        Ok(())
    }

    /// Counts this run's pages with the given status
    pub fn count_pages_by_status(&self, status: PageStatus) -> SinkResult<u64> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM pages WHERE run_id = ?1 AND status = ?2",
            params![self.run_id, status.to_db_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Terminal state recorded for this run, if any
    pub fn run_state(&self) -> SinkResult<String> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        let state = conn.query_row(
            "SELECT state FROM runs WHERE id = ?1",
            params![self.run_id],
            |row| row.get(0),
        )?;
        Ok(state)
    }
}

#[async_trait]
impl RecordSink for SqliteSink {
    async fn write(&self, record: &PageRecord) -> SinkResult<()> {
        let links = serde_json::to_string(&record.outbound_links)?;
        let annotations = record
            .score_annotations
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let failure = record.failure_reason.as_ref().map(ToString::to_string);

        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        conn.execute(
            "INSERT OR REPLACE INTO pages
                (run_id, url, depth, status, http_status, title, body_text,
                 outbound_links, failure_reason, annotations, fetched_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                self.run_id,
                record.url,
                record.depth,
                record.status.to_db_string(),
                record.http_status,
                record.title,
                record.body_text,
                links,
                failure,
                annotations,
                record.fetched_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }
}

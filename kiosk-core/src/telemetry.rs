use std::fs::{create_dir_all, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OpenFlags};
use serde::Serialize;
use thiserror::Error;

use crate::rotation::FailureKind;

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize)]
struct FailureRecord<'a> {
    timestamp: DateTime<Utc>,
    url: &'a str,
    category: FailureKind,
    reason: &'a str,
    attempt: usize,
}

/// Durable trail of visit failures and browser restarts: an append-only
/// JSONL log for quick inspection plus a SQLite database for queries.
///
/// Callers treat every write failure as a warning; telemetry must never
/// take the rotation loop down.
#[derive(Debug)]
pub struct VisitTelemetry {
    log: Mutex<File>,
    db_path: PathBuf,
    flags: OpenFlags,
}

impl VisitTelemetry {
    pub fn new(
        log_path: impl AsRef<Path>,
        db_path: impl AsRef<Path>,
    ) -> Result<Self, TelemetryError> {
        let log_path = log_path.as_ref().to_path_buf();
        if let Some(parent) = log_path.parent() {
            create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;
        let db_path = db_path.as_ref().to_path_buf();
        if let Some(parent) = db_path.parent() {
            create_dir_all(parent)?;
        }
        let telemetry = Self {
            log: Mutex::new(file),
            db_path,
            flags: OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        };
        telemetry.initialize_db()?;
        Ok(telemetry)
    }

    fn initialize_db(&self) -> Result<(), TelemetryError> {
        let conn = self.open_db()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS visit_failures (
                ts DATETIME DEFAULT CURRENT_TIMESTAMP,
                url TEXT,
                category TEXT,
                reason TEXT,
                attempt INTEGER
            );
            CREATE INDEX IF NOT EXISTS idx_visit_failures_ts ON visit_failures(ts DESC);
            CREATE TABLE IF NOT EXISTS browser_restarts (
                ts DATETIME DEFAULT CURRENT_TIMESTAMP,
                proxy TEXT,
                user_agent TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_browser_restarts_ts ON browser_restarts(ts DESC);",
        )?;
        Ok(())
    }

    fn open_db(&self) -> Result<Connection, TelemetryError> {
        Ok(Connection::open_with_flags(&self.db_path, self.flags)?)
    }

    pub fn record_failure(
        &self,
        url: &str,
        category: FailureKind,
        reason: &str,
        attempt: usize,
    ) -> Result<(), TelemetryError> {
        let record = FailureRecord {
            timestamp: Utc::now(),
            url,
            category,
            reason,
            attempt,
        };
        let json = serde_json::to_string(&record)?;
        if let Ok(mut guard) = self.log.lock() {
            writeln!(guard, "{json}")?;
            guard.flush()?;
        }
        let conn = self.open_db()?;
        conn.execute(
            "INSERT INTO visit_failures (url, category, reason, attempt)
             VALUES (?1, ?2, ?3, ?4)",
            params![url, category.to_string(), reason, attempt as i64],
        )?;
        Ok(())
    }

    pub fn record_restart(
        &self,
        proxy: Option<&str>,
        user_agent: &str,
    ) -> Result<(), TelemetryError> {
        let conn = self.open_db()?;
        conn.execute(
            "INSERT INTO browser_restarts (proxy, user_agent) VALUES (?1, ?2)",
            params![proxy.unwrap_or_default(), user_agent],
        )?;
        Ok(())
    }

    pub fn database_path(&self) -> &Path {
        &self.db_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn failures_land_in_log_and_database() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("failures.log");
        let db_path = dir.path().join("telemetry.sqlite");
        let telemetry = VisitTelemetry::new(&log_path, &db_path).unwrap();

        telemetry
            .record_failure(
                "https://example.com",
                FailureKind::Timeout,
                "3 attempts exhausted",
                3,
            )
            .unwrap();
        telemetry.record_restart(Some("http://proxy-a:3128"), "UA-1").unwrap();

        let log_contents = std::fs::read_to_string(&log_path).unwrap();
        assert!(log_contents.contains("attempts exhausted"));

        let conn = Connection::open(&db_path).unwrap();
        let failure_count: i64 = conn
            .query_row("SELECT COUNT(*) FROM visit_failures", [], |row| row.get(0))
            .unwrap();
        assert_eq!(failure_count, 1);
        let category: String = conn
            .query_row("SELECT category FROM visit_failures", [], |row| row.get(0))
            .unwrap();
        assert_eq!(category, "timeout");
        let restart_count: i64 = conn
            .query_row("SELECT COUNT(*) FROM browser_restarts", [], |row| row.get(0))
            .unwrap();
        assert_eq!(restart_count, 1);
    }
}

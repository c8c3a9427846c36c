// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Operations journal: append-only SQLite log of reconcile runs and console
// mutations.
//
// Schema:
//   journal(
//     id        INTEGER PRIMARY KEY AUTOINCREMENT,
//     timestamp TEXT    NOT NULL,   -- RFC 3339
//     run_id    TEXT,               -- set for pipeline rows
//     action    TEXT    NOT NULL,   -- e.g. "upsert", "clear", "cleanup"
//     subject   TEXT    NOT NULL,   -- queue, job, service, or "fleet"
//     success   INTEGER NOT NULL,
//     details   TEXT
//   )

use std::path::Path;

use chrono::Utc;
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use airspool_core::error::{AirspoolError, Result};
use airspool_core::types::RunId;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS journal (
    id        INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT    NOT NULL,
    run_id    TEXT,
    action    TEXT    NOT NULL,
    subject   TEXT    NOT NULL,
    success   INTEGER NOT NULL,
    details   TEXT
);";

fn db_err(e: rusqlite::Error) -> AirspoolError {
    AirspoolError::Journal(e.to_string())
}

/// One journal row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: i64,
    pub timestamp: String,
    pub run_id: Option<String>,
    pub action: String,
    pub subject: String,
    pub success: bool,
    pub details: Option<String>,
}

impl JournalEntry {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            timestamp: row.get(1)?,
            run_id: row.get(2)?,
            action: row.get(3)?,
            subject: row.get(4)?,
            success: row.get::<_, i32>(5)? != 0,
            details: row.get(6)?,
        })
    }
}

pub struct Journal {
    conn: Connection,
}

impl Journal {
    /// Open (or create) the journal database, creating its directory.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(db_err)?;
        conn.execute_batch("PRAGMA journal_mode = WAL;").map_err(db_err)?;
        conn.execute_batch(SCHEMA).map_err(db_err)?;
        debug!("journal opened");
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        conn.execute_batch(SCHEMA).map_err(db_err)?;
        Ok(Self { conn })
    }

    #[instrument(skip(self, details))]
    pub fn record(
        &self,
        run_id: Option<RunId>,
        action: &str,
        subject: &str,
        success: bool,
        details: Option<&str>,
    ) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO journal (timestamp, run_id, action, subject, success, details)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    Utc::now().to_rfc3339(),
                    run_id.map(|r| r.to_string()),
                    action,
                    subject,
                    success as i32,
                    details
                ],
            )
            .map_err(db_err)?;
        debug!("journal entry recorded");
        Ok(())
    }

    /// Most recent rows, newest first.
    pub fn recent(&self, limit: u32) -> Result<Vec<JournalEntry>> {
        self.query(
            "SELECT id, timestamp, run_id, action, subject, success, details
             FROM journal ORDER BY id DESC LIMIT ?1",
            params![limit],
        )
    }

    /// Every row of one run, in insertion order.
    pub fn for_run(&self, run_id: RunId) -> Result<Vec<JournalEntry>> {
        self.query(
            "SELECT id, timestamp, run_id, action, subject, success, details
             FROM journal WHERE run_id = ?1 ORDER BY id ASC",
            params![run_id.to_string()],
        )
    }

    pub fn count(&self) -> Result<u64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM journal", [], |row| row.get(0))
            .map_err(db_err)
    }

    fn query(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<JournalEntry>> {
        let mut stmt = self.conn.prepare(sql).map_err(db_err)?;
        let rows = stmt.query_map(params, JournalEntry::from_row).map_err(db_err)?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row.map_err(db_err)?);
        }
        Ok(entries)
    }
}

//! SQLite-based session storage.
//!
//! Each session occupies one row, upserted on every autosave: a few
//! summary columns for cheap listing plus the full record JSON. The
//! database lives at `~/.config/pulselane/pulselane.db`.

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use super::{data_dir, SessionStore};
use crate::error::StoreError;
use crate::session::SessionRecord;

/// One row of the session listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRow {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub tick_count: u64,
    pub coins: f64,
}

/// SQLite database for session records.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open the database at `~/.config/pulselane/pulselane.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, StoreError> {
        let path = data_dir()?.join("pulselane.db");
        Self::open_at(&path)
    }

    /// Open (or create) a database at an explicit path.
    pub fn open_at(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|e| StoreError::OpenFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database (for tests).
    pub fn open_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(|e| StoreError::OpenFailed {
            path: ":memory:".into(),
            message: e.to_string(),
        })?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn migrate(&self) -> Result<(), StoreError> {
        self.conn().execute_batch(
            "CREATE TABLE IF NOT EXISTS sessions (
                id               TEXT PRIMARY KEY,
                started_at       TEXT NOT NULL,
                ended_at         TEXT,
                tick_interval_ms INTEGER NOT NULL,
                tick_count       INTEGER NOT NULL,
                coins            REAL NOT NULL,
                record           TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_sessions_started_at ON sessions(started_at);",
        )?;
        Ok(())
    }

    /// List stored sessions, most recent first.
    pub fn list_sessions(&self) -> Result<Vec<SessionRow>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, started_at, ended_at, tick_count, coins
             FROM sessions
             ORDER BY started_at DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, f64>(4)?,
            ))
        })?;

        let mut sessions = Vec::new();
        for row in rows {
            let (id, started_at, ended_at, tick_count, coins) = row?;
            let started_at = started_at
                .parse::<DateTime<Utc>>()
                .map_err(|e| StoreError::QueryFailed(e.to_string()))?;
            let ended_at = match ended_at {
                Some(raw) => Some(
                    raw.parse::<DateTime<Utc>>()
                        .map_err(|e| StoreError::QueryFailed(e.to_string()))?,
                ),
                None => None,
            };
            sessions.push(SessionRow {
                id,
                started_at,
                ended_at,
                tick_count: tick_count.max(0) as u64,
                coins,
            });
        }
        Ok(sessions)
    }
}

impl SessionStore for Database {
    fn save(&self, record: &SessionRecord) -> Result<(), StoreError> {
        let raw = serde_json::to_string(record)?;
        self.conn().execute(
            "INSERT INTO sessions (id, started_at, ended_at, tick_interval_ms, tick_count, coins, record)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(id) DO UPDATE SET
                 ended_at = excluded.ended_at,
                 tick_count = excluded.tick_count,
                 coins = excluded.coins,
                 record = excluded.record",
            params![
                record.session.id,
                record.session.start_time.to_rfc3339(),
                record.session.end_time.map(|t| t.to_rfc3339()),
                record.session.tick_interval_ms as i64,
                record.timeline.tick_count as i64,
                record.totals.coins,
                raw,
            ],
        )?;
        Ok(())
    }

    fn load(&self, session_id: &str) -> Result<Option<SessionRecord>, StoreError> {
        let raw: Option<String> = self
            .conn()
            .query_row(
                "SELECT record FROM sessions WHERE id = ?1",
                params![session_id],
                |row| row.get(0),
            )
            .optional()?;
        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }
}

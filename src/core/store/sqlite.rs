//! SQLite event store backend for persistent storage.

use super::{now, Event, EventStatus, EventStore, StoreStats};
use crate::error::StoreError;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use uuid::Uuid;

const COLUMNS: &str = "id, name, payload, status, error, created_at, processed_at";

/// SQLite-backed persistent event store
///
/// Uses WAL (Write-Ahead Logging) mode so several processes can share the
/// database file. Claims run inside an `IMMEDIATE` transaction, which takes
/// the write lock before selecting, so two claimers never see the same
/// pending rows.
pub struct SqliteEventStore {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

/// A row as stored, before validation
struct RawEvent {
    id: String,
    name: String,
    payload: Vec<u8>,
    status: String,
    error: Option<String>,
    created_at: i64,
    processed_at: Option<i64>,
}

impl RawEvent {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            payload: row.get(2)?,
            status: row.get(3)?,
            error: row.get(4)?,
            created_at: row.get(5)?,
            processed_at: row.get(6)?,
        })
    }
}

impl TryFrom<RawEvent> for Event {
    type Error = StoreError;

    fn try_from(raw: RawEvent) -> Result<Self, Self::Error> {
        let id = Uuid::parse_str(&raw.id)
            .map_err(|e| StoreError::Corrupt(format!("bad id {}: {}", raw.id, e)))?;

        Ok(Event {
            id,
            name: raw.name,
            payload: raw.payload,
            status: raw.status.parse()?,
            error: raw.error,
            created_at: from_timestamp(raw.created_at)?,
            processed_at: raw.processed_at.map(from_timestamp).transpose()?,
        })
    }
}

/// Convert a timestamp to microseconds since the Unix epoch
fn to_timestamp(time: DateTime<Utc>) -> i64 {
    time.timestamp_micros()
}

/// Clamp a row limit into SQLite's range; a negative LIMIT means no limit
fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

/// Convert microseconds since the Unix epoch to a timestamp
fn from_timestamp(micros: i64) -> Result<DateTime<Utc>, StoreError> {
    DateTime::from_timestamp_micros(micros)
        .ok_or_else(|| StoreError::Corrupt(format!("timestamp out of range: {}", micros)))
}

impl SqliteEventStore {
    /// Open or create an event database at the given path
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        // Create parent directories if needed
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::OpenFailed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        }

        let conn = Connection::open(path).map_err(|e| StoreError::OpenFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL;")?;

        Self::init(conn, path.to_path_buf())
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(|e| StoreError::OpenFailed {
            path: PathBuf::from(":memory:"),
            reason: e.to_string(),
        })?;

        Self::init(conn, PathBuf::from(":memory:"))
    }

    fn init(conn: Connection, db_path: PathBuf) -> Result<Self, StoreError> {
        // Other processes may hold the write lock while claiming
        conn.busy_timeout(Duration::from_secs(5))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS events (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                payload BLOB NOT NULL,
                status TEXT NOT NULL,
                error TEXT,
                created_at INTEGER NOT NULL,
                processed_at INTEGER
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_events_status_created
             ON events(status, created_at)",
            [],
        )?;

        tracing::debug!(path = %db_path.display(), "opened event store");

        Ok(Self {
            conn: Mutex::new(conn),
            db_path,
        })
    }

    /// Path of the backing database
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Move a processing event to a terminal state
    fn finish(
        &self,
        id: Uuid,
        status: EventStatus,
        error: Option<&str>,
    ) -> Result<(), StoreError> {
        debug_assert!(status.is_terminal());
        let conn = self.lock()?;
        let id_str = id.to_string();

        let updated = conn.execute(
            "UPDATE events SET status = ?, error = ?, processed_at = ?
             WHERE id = ? AND status = 'processing'",
            params![status.as_str(), error, to_timestamp(now()), id_str],
        )?;

        if updated == 1 {
            return Ok(());
        }

        let current: Option<String> = conn
            .query_row("SELECT status FROM events WHERE id = ?", [&id_str], |row| {
                row.get(0)
            })
            .optional()?;

        match current {
            Some(status) => Err(StoreError::InvalidTransition { id, status }),
            None => Err(StoreError::NotFound { id }),
        }
    }

    /// Move every event in `from` back to pending
    fn reset(&self, from: EventStatus) -> Result<usize, StoreError> {
        let conn = self.lock()?;

        let count = conn.execute(
            "UPDATE events SET status = 'pending', error = NULL, processed_at = NULL
             WHERE status = ?",
            [from.as_str()],
        )?;

        Ok(count)
    }
}

impl EventStore for SqliteEventStore {
    fn claim_pending(&self, limit: usize) -> Result<Vec<Event>, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let raw: Vec<RawEvent> = {
            let mut stmt = tx.prepare(&format!(
                "SELECT {} FROM events
                 WHERE status = 'pending'
                 ORDER BY created_at ASC, rowid ASC
                 LIMIT ?",
                COLUMNS
            ))?;
            let rows = stmt.query_map([sql_limit(limit)], RawEvent::from_row)?;
            rows.collect::<rusqlite::Result<_>>()?
        };

        let mut events = raw
            .into_iter()
            .map(Event::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        {
            let mut update =
                tx.prepare("UPDATE events SET status = 'processing' WHERE id = ?")?;
            for event in &mut events {
                update.execute([event.id.to_string()])?;
                event.status = EventStatus::Processing;
            }
        }

        tx.commit()?;

        Ok(events)
    }

    fn create(&self, event: &Event) -> Result<(), StoreError> {
        let conn = self.lock()?;

        conn.execute(
            "INSERT INTO events
             (id, name, payload, status, error, created_at, processed_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                event.id.to_string(),
                event.name,
                event.payload,
                event.status.as_str(),
                event.error,
                to_timestamp(event.created_at),
                event.processed_at.map(to_timestamp),
            ],
        )?;

        Ok(())
    }

    fn mark_done(&self, id: Uuid) -> Result<(), StoreError> {
        self.finish(id, EventStatus::Done, None)
    }

    fn mark_failed(&self, id: Uuid, error: &str) -> Result<(), StoreError> {
        self.finish(id, EventStatus::Failed, Some(error))
    }

    fn get(&self, id: Uuid) -> Result<Option<Event>, StoreError> {
        let conn = self.lock()?;

        let raw = conn
            .query_row(
                &format!("SELECT {} FROM events WHERE id = ?", COLUMNS),
                [id.to_string()],
                RawEvent::from_row,
            )
            .optional()?;

        raw.map(Event::try_from).transpose()
    }

    fn list(&self, status: Option<EventStatus>, limit: usize) -> Result<Vec<Event>, StoreError> {
        let conn = self.lock()?;

        let raw: Vec<RawEvent> = match status {
            Some(status) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM events WHERE status = ?
                     ORDER BY created_at ASC, rowid ASC LIMIT ?",
                    COLUMNS
                ))?;
                let rows =
                    stmt.query_map(params![status.as_str(), sql_limit(limit)], RawEvent::from_row)?;
                rows.collect::<rusqlite::Result<_>>()?
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM events ORDER BY created_at ASC, rowid ASC LIMIT ?",
                    COLUMNS
                ))?;
                let rows = stmt.query_map([sql_limit(limit)], RawEvent::from_row)?;
                rows.collect::<rusqlite::Result<_>>()?
            }
        };

        raw.into_iter().map(Event::try_from).collect()
    }

    fn stats(&self) -> Result<StoreStats, StoreError> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM events GROUP BY status")?;
        let counts: Vec<(String, i64)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<_>>()?;

        let mut stats = StoreStats::default();
        for (status, count) in counts {
            stats.bump(status.parse()?, count as usize);
        }

        Ok(stats)
    }

    fn requeue_failed(&self) -> Result<usize, StoreError> {
        self.reset(EventStatus::Failed)
    }

    fn reset_processing(&self) -> Result<usize, StoreError> {
        self.reset(EventStatus::Processing)
    }
}

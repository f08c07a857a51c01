//! SQLite-based ledger store.
//!
//! Entries live in an insert-only table ordered by an autoincrement sequence.
//! `synchronous=FULL` makes each committed insert durable before `append`
//! returns.

use super::{LedgerStore, ResumeEntry, ResumeStatus};
use crate::error::{Result, YtragError};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OpenFlags};
use std::path::Path;
use std::sync::Mutex;
use tracing::{info, instrument, warn};
use uuid::Uuid;

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS ledger (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        video_id TEXT NOT NULL,
        status TEXT NOT NULL,
        recorded_at TEXT NOT NULL,
        run_id TEXT,
        detail TEXT
    );

    CREATE INDEX IF NOT EXISTS idx_ledger_video_id ON ledger(video_id);
"#;

/// SQLite ledger store.
pub struct SqliteLedgerStore {
    conn: Mutex<Connection>,
}

impl SqliteLedgerStore {
    /// Open (or create) the ledger database at `path`.
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=FULL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Initialized SQLite ledger at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an existing ledger database for replay only.
    pub fn open_read_only(path: &Path) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory ledger (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| YtragError::Ledger(format!("Failed to acquire lock: {}", e)))
    }
}

impl LedgerStore for SqliteLedgerStore {
    fn append(&mut self, entry: &ResumeEntry) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT INTO ledger (video_id, status, recorded_at, run_id, detail)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                entry.video_id,
                entry.status.as_str(),
                entry.timestamp.to_rfc3339(),
                entry.run_id.map(|id| id.to_string()),
                entry.detail,
            ],
        )?;
        Ok(())
    }

    fn replay(&self) -> Result<Vec<ResumeEntry>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT video_id, status, recorded_at, run_id, detail FROM ledger ORDER BY seq",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, Option<String>>(4)?,
            ))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (video_id, status, recorded_at, run_id, detail) = row?;

            let status = match status.parse::<ResumeStatus>() {
                Ok(status) => status,
                Err(e) => {
                    warn!("Skipping ledger row for {}: {}", video_id, e);
                    continue;
                }
            };

            entries.push(ResumeEntry {
                video_id,
                status,
                timestamp: DateTime::parse_from_rfc3339(&recorded_at)
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or_else(|_| Utc::now()),
                run_id: run_id.and_then(|s| Uuid::parse_str(&s).ok()),
                detail,
            });
        }

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::ResumeLedger;

    #[test]
    fn test_append_and_replay_in_order() {
        let mut store = SqliteLedgerStore::in_memory().unwrap();
        store
            .append(&ResumeEntry::new("a", ResumeStatus::Failed))
            .unwrap();
        store
            .append(&ResumeEntry::new("b", ResumeStatus::Done))
            .unwrap();
        store
            .append(&ResumeEntry::new("a", ResumeStatus::Done))
            .unwrap();

        let entries = store.replay().unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].video_id, "a");
        assert_eq!(entries[0].status, ResumeStatus::Failed);
        assert_eq!(entries[2].status, ResumeStatus::Done);
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".ytrag_archive.db");

        {
            let store = SqliteLedgerStore::new(&path).unwrap();
            let mut ledger = ResumeLedger::open(Box::new(store)).unwrap();
            ledger.record("vid1", ResumeStatus::SkippedNoSubtitles).unwrap();
            ledger
                .record_with_detail("vid2", ResumeStatus::Failed, Some("timeout".into()))
                .unwrap();
        }

        let store = SqliteLedgerStore::new(&path).unwrap();
        let ledger = ResumeLedger::open(Box::new(store)).unwrap();
        assert!(ledger.has("vid1"));
        assert!(!ledger.has("vid2"));

        let failed = ledger.entries().find(|e| e.video_id == "vid2").unwrap();
        assert_eq!(failed.detail.as_deref(), Some("timeout"));
        assert!(failed.run_id.is_some());
    }

    #[test]
    fn test_read_only_open_replays_existing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");
        {
            let mut store = SqliteLedgerStore::new(&path).unwrap();
            store.append(&ResumeEntry::new("vid1", ResumeStatus::Done)).unwrap();
        }

        let mut store = SqliteLedgerStore::open_read_only(&path).unwrap();
        assert_eq!(store.replay().unwrap().len(), 1);
        assert!(store
            .append(&ResumeEntry::new("vid2", ResumeStatus::Done))
            .is_err());
        assert!(SqliteLedgerStore::open_read_only(&dir.path().join("missing.db")).is_err());
    }
}

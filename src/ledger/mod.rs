//! Resume ledger.
//!
//! An append-only record of every video a run has handled. The ledger is
//! replayed once when opened; afterwards lookups hit the in-memory view,
//! which also reflects records made during the current run. Entries are
//! never rewritten: when a video appears more than once, the latest entry
//! wins.

mod file;
mod memory;
mod sqlite;

pub use file::JsonlLedgerStore;
pub(crate) use file::terminate_partial_line;
pub use memory::MemoryLedgerStore;
pub use sqlite::SqliteLedgerStore;

use crate::config::{LedgerBackend, Settings};
use crate::error::{Result, YtragError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// Outcome recorded for a video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResumeStatus {
    /// Transcript produced and handed to the consolidator.
    Done,
    /// No acceptable track, or the track held no speech.
    SkippedNoSubtitles,
    /// Attempted and failed; retried on the next run.
    Failed,
}

impl ResumeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResumeStatus::Done => "done",
            ResumeStatus::SkippedNoSubtitles => "skipped-no-subtitles",
            ResumeStatus::Failed => "failed",
        }
    }

    /// Whether a video with this status is finished for good.
    pub fn is_final(&self) -> bool {
        matches!(self, ResumeStatus::Done | ResumeStatus::SkippedNoSubtitles)
    }
}

impl std::str::FromStr for ResumeStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "done" => Ok(ResumeStatus::Done),
            "skipped-no-subtitles" => Ok(ResumeStatus::SkippedNoSubtitles),
            "failed" => Ok(ResumeStatus::Failed),
            _ => Err(format!("Unknown ledger status: {}", s)),
        }
    }
}

impl std::fmt::Display for ResumeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One ledger record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResumeEntry {
    pub video_id: String,
    pub status: ResumeStatus,
    pub timestamp: DateTime<Utc>,
    /// Run that wrote the entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<Uuid>,
    /// Failure reason, for `failed` entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ResumeEntry {
    pub fn new(video_id: impl Into<String>, status: ResumeStatus) -> Self {
        Self {
            video_id: video_id.into(),
            status,
            timestamp: Utc::now(),
            run_id: None,
            detail: None,
        }
    }
}

/// Durable storage for ledger entries.
pub trait LedgerStore: Send {
    /// Append one entry. Must be durable before returning.
    fn append(&mut self, entry: &ResumeEntry) -> Result<()>;

    /// Every stored entry, in append order.
    fn replay(&self) -> Result<Vec<ResumeEntry>>;
}

/// Per-status totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerCounts {
    pub done: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// In-memory view over an append-only [`LedgerStore`].
pub struct ResumeLedger {
    store: Box<dyn LedgerStore>,
    seen: HashMap<String, ResumeEntry>,
    run_id: Uuid,
}

impl ResumeLedger {
    /// Open a ledger and replay its history.
    pub fn open(store: Box<dyn LedgerStore>) -> Result<Self> {
        let mut ledger = Self {
            store,
            seen: HashMap::new(),
            run_id: Uuid::new_v4(),
        };
        ledger.load()?;
        Ok(ledger)
    }

    /// Open the ledger configured in `settings`.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let path = settings.ledger_path();
        let store: Box<dyn LedgerStore> = match settings.ledger.backend {
            LedgerBackend::Jsonl => Box::new(JsonlLedgerStore::new(&path)?),
            LedgerBackend::Sqlite => Box::new(SqliteLedgerStore::new(&path)?),
        };
        Self::open(store)
    }

    /// Open the configured ledger for inspection without writing to it.
    pub fn open_read_only(settings: &Settings) -> Result<Self> {
        let path = settings.ledger_path();
        let store: Box<dyn LedgerStore> = match settings.ledger.backend {
            LedgerBackend::Jsonl => Box::new(JsonlLedgerStore::open_read_only(&path)?),
            LedgerBackend::Sqlite => Box::new(SqliteLedgerStore::open_read_only(&path)?),
        };
        Self::open(store)
    }

    /// Rebuild the in-memory view from storage and return each video's status.
    #[instrument(skip(self))]
    pub fn load(&mut self) -> Result<HashMap<String, ResumeStatus>> {
        let entries = self.store.replay()?;
        let total = entries.len();

        self.seen.clear();
        for entry in entries {
            self.seen.insert(entry.video_id.clone(), entry);
        }

        info!("Loaded ledger: {} entries, {} videos", total, self.seen.len());
        Ok(self
            .seen
            .iter()
            .map(|(id, entry)| (id.clone(), entry.status))
            .collect())
    }

    /// True when the video is finished for good (`done` or `skipped-no-subtitles`).
    pub fn has(&self, video_id: &str) -> bool {
        self.status(video_id).is_some_and(|s| s.is_final())
    }

    /// Latest recorded status for a video.
    pub fn status(&self, video_id: &str) -> Option<ResumeStatus> {
        self.seen.get(video_id).map(|e| e.status)
    }

    /// Append an outcome. Returns once the entry is durable.
    pub fn record(&mut self, video_id: &str, status: ResumeStatus) -> Result<()> {
        self.record_with_detail(video_id, status, None)
    }

    /// Append an outcome with an optional reason.
    pub fn record_with_detail(
        &mut self,
        video_id: &str,
        status: ResumeStatus,
        detail: Option<String>,
    ) -> Result<()> {
        if video_id.is_empty() {
            return Err(YtragError::Ledger("Cannot record an empty video id".to_string()));
        }

        let entry = ResumeEntry {
            run_id: Some(self.run_id),
            detail,
            ..ResumeEntry::new(video_id, status)
        };

        self.store.append(&entry)?;
        debug!(video_id, status = %status, "Recorded ledger entry");
        self.seen.insert(video_id.to_string(), entry);
        Ok(())
    }

    /// Totals per status over the latest entry of each video.
    pub fn counts(&self) -> LedgerCounts {
        let mut counts = LedgerCounts::default();
        for entry in self.seen.values() {
            match entry.status {
                ResumeStatus::Done => counts.done += 1,
                ResumeStatus::SkippedNoSubtitles => counts.skipped += 1,
                ResumeStatus::Failed => counts.failed += 1,
            }
        }
        counts
    }

    /// Latest entry per video.
    pub fn entries(&self) -> impl Iterator<Item = &ResumeEntry> {
        self.seen.values()
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_has() {
        let mut ledger = ResumeLedger::open(Box::new(MemoryLedgerStore::new())).unwrap();

        assert!(!ledger.has("a"));
        ledger.record("a", ResumeStatus::Done).unwrap();
        ledger.record("b", ResumeStatus::SkippedNoSubtitles).unwrap();
        ledger.record("c", ResumeStatus::Failed).unwrap();

        assert!(ledger.has("a"));
        assert!(ledger.has("b"));
        assert!(!ledger.has("c"));
        assert_eq!(ledger.status("c"), Some(ResumeStatus::Failed));
        assert_eq!(
            ledger.counts(),
            LedgerCounts {
                done: 1,
                skipped: 1,
                failed: 1
            }
        );
    }

    #[test]
    fn test_latest_entry_wins_on_replay() {
        let store = MemoryLedgerStore::new();
        {
            let mut ledger = ResumeLedger::open(Box::new(store.clone())).unwrap();
            ledger.record("a", ResumeStatus::Failed).unwrap();
            ledger.record("a", ResumeStatus::Done).unwrap();
        }

        let mut reopened = ResumeLedger::open(Box::new(store.clone())).unwrap();
        assert!(reopened.has("a"));
        assert_eq!(store.len(), 2);

        let loaded = reopened.load().unwrap();
        assert_eq!(loaded.get("a"), Some(&ResumeStatus::Done));
    }

    #[test]
    fn test_entries_carry_run_id() {
        let store = MemoryLedgerStore::new();
        let mut ledger = ResumeLedger::open(Box::new(store.clone())).unwrap();
        ledger
            .record_with_detail("x", ResumeStatus::Failed, Some("HTTP 429".into()))
            .unwrap();

        let entry = ledger.entries().next().unwrap();
        assert_eq!(entry.run_id, Some(ledger.run_id()));
        assert_eq!(entry.detail.as_deref(), Some("HTTP 429"));
    }

    #[test]
    fn test_rejects_empty_id() {
        let mut ledger = ResumeLedger::open(Box::new(MemoryLedgerStore::new())).unwrap();
        assert!(ledger.record("", ResumeStatus::Done).is_err());
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&ResumeStatus::SkippedNoSubtitles).unwrap();
        assert_eq!(json, "\"skipped-no-subtitles\"");
        assert_eq!("failed".parse::<ResumeStatus>().unwrap(), ResumeStatus::Failed);
    }
}

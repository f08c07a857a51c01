//! In-memory ledger store.
//!
//! Useful for testing. Clones share the same entries, so a ledger can be
//! "reopened" over the same history.

use super::{LedgerStore, ResumeEntry};
use crate::error::{Result, YtragError};
use std::sync::{Arc, Mutex};

/// Ledger store backed by a shared vector.
#[derive(Clone, Default)]
pub struct MemoryLedgerStore {
    entries: Arc<Mutex<Vec<ResumeEntry>>>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, superseded ones included.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LedgerStore for MemoryLedgerStore {
    fn append(&mut self, entry: &ResumeEntry) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| YtragError::Ledger(format!("Failed to acquire lock: {}", e)))?;
        entries.push(entry.clone());
        Ok(())
    }

    fn replay(&self) -> Result<Vec<ResumeEntry>> {
        let entries = self
            .entries
            .lock()
            .map_err(|e| YtragError::Ledger(format!("Failed to acquire lock: {}", e)))?;
        Ok(entries.clone())
    }
}

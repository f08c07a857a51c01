//! JSON-lines ledger store.
//!
//! One JSON object per line, synced to disk after every append. A crash can
//! at worst leave a torn final line, which replay skips.

use super::{LedgerStore, ResumeEntry};
use crate::error::{Result, YtragError};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

/// Append-only ledger file.
pub struct JsonlLedgerStore {
    path: PathBuf,
    file: File,
}

impl JsonlLedgerStore {
    /// Open (or create) the ledger file at `path`.
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;

        if terminate_partial_line(&mut file)? {
            warn!("Ledger {:?} ends with a partial record", path);
        }

        info!("Opened ledger at {:?}", path);

        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    /// Open an existing ledger for replay only. Nothing is created or repaired.
    pub fn open_read_only(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .map_err(|e| YtragError::Ledger(format!("Cannot read {:?}: {}", path, e)))?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Terminate a torn last line so the next append starts cleanly.
///
/// The file must be open for reading and appending. Returns true when a
/// newline was added.
pub(crate) fn terminate_partial_line(file: &mut File) -> Result<bool> {
    if file.metadata()?.len() == 0 {
        return Ok(false);
    }

    let mut last = [0u8; 1];
    file.seek(SeekFrom::End(-1))?;
    file.read_exact(&mut last)?;
    if last[0] == b'\n' {
        return Ok(false);
    }

    file.write_all(b"\n")?;
    file.sync_data()?;
    Ok(true)
}

impl LedgerStore for JsonlLedgerStore {
    fn append(&mut self, entry: &ResumeEntry) -> Result<()> {
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');
        self.file.write_all(line.as_bytes())?;
        self.file.sync_data()?;
        Ok(())
    }

    fn replay(&self) -> Result<Vec<ResumeEntry>> {
        let file = File::open(&self.path)
            .map_err(|e| YtragError::Ledger(format!("Cannot read {:?}: {}", self.path, e)))?;

        let mut entries = Vec::new();
        for (number, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<ResumeEntry>(&line) {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!("Skipping unreadable ledger line {}: {}", number + 1, e),
            }
        }

        Ok(entries)
    }
}

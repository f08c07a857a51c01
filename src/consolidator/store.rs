//! Durable storage for volumes, the manifest and the staged open volume.

use super::{render::sanitize_filename, CleanedTranscript, Manifest};
use crate::error::{Result, YtragError};
use crate::ledger::terminate_partial_line;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;
use tracing::{debug, info, instrument, warn};

const MANIFEST_FILE: &str = "manifest.json";
const STAGING_DIR: &str = ".staging";

/// A transcript appended to an open volume, tagged with that volume's index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagedTranscript {
    pub volume: u32,
    pub transcript: CleanedTranscript,
}

/// Trait for volume storage backends.
pub trait VolumeStore: Send {
    /// Load the manifest, or an empty one if none was written yet.
    fn load_manifest(&self) -> Result<Manifest>;

    /// Replace the manifest. Must be atomic.
    fn write_manifest(&mut self, manifest: &Manifest) -> Result<()>;

    /// Write a sealed volume. Must be durable and atomic.
    fn write_volume(&mut self, file_name: &str, contents: &str) -> Result<()>;

    /// Durably stage one transcript of a channel's open volume.
    fn stage(&mut self, channel: &str, entry: &StagedTranscript) -> Result<()>;

    /// Every staged transcript of a channel, in append order.
    fn load_staged(&self, channel: &str) -> Result<Vec<StagedTranscript>>;

    /// Drop a channel's staging after its volume is sealed.
    fn clear_staged(&mut self, channel: &str) -> Result<()>;
}

/// Filesystem volume store rooted at the exports directory.
pub struct FsVolumeStore {
    dir: PathBuf,
}

impl FsVolumeStore {
    #[instrument(skip_all)]
    pub fn new(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir.join(STAGING_DIR))?;
        info!("Volume store at {:?}", dir);
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    /// Store over an exports directory that may not exist. Creates nothing.
    pub fn existing(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.dir.join(MANIFEST_FILE)
    }

    fn staging_path(&self, channel: &str) -> PathBuf {
        self.dir
            .join(STAGING_DIR)
            .join(format!("{}.jsonl", sanitize_filename(channel)))
    }

    /// Write via a synced temp file in the same directory, then rename.
    fn write_atomic(&self, path: &Path, contents: &[u8]) -> Result<()> {
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(contents)?;
        tmp.as_file().sync_all()?;
        tmp.persist(path)
            .map_err(|e| YtragError::Storage(format!("Cannot replace {:?}: {}", path, e.error)))?;
        Ok(())
    }
}

impl VolumeStore for FsVolumeStore {
    fn load_manifest(&self) -> Result<Manifest> {
        let path = self.manifest_path();
        if !path.exists() {
            return Ok(Manifest::default());
        }
        let content = std::fs::read_to_string(&path)?;
        serde_json::from_str(&content)
            .map_err(|e| YtragError::Storage(format!("Corrupt manifest {:?}: {}", path, e)))
    }

    fn write_manifest(&mut self, manifest: &Manifest) -> Result<()> {
        let mut json = serde_json::to_string_pretty(manifest)?;
        json.push('\n');
        self.write_atomic(&self.manifest_path(), json.as_bytes())
    }

    fn write_volume(&mut self, file_name: &str, contents: &str) -> Result<()> {
        let path = self.dir.join(file_name);
        self.write_atomic(&path, contents.as_bytes())?;
        debug!("Wrote volume {:?}", path);
        Ok(())
    }

    fn stage(&mut self, channel: &str, entry: &StagedTranscript) -> Result<()> {
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');

        let path = self.staging_path(channel);
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)?;
        if terminate_partial_line(&mut file)? {
            warn!("Staging {:?} ends with a partial record", path);
        }
        file.write_all(line.as_bytes())?;
        file.sync_data()?;
        Ok(())
    }

    fn load_staged(&self, channel: &str) -> Result<Vec<StagedTranscript>> {
        let path = self.staging_path(channel);
        let file = match std::fs::File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut staged = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(&line) {
                Ok(entry) => staged.push(entry),
                Err(e) => warn!("Skipping unreadable staged transcript in {:?}: {}", path, e),
            }
        }
        Ok(staged)
    }

    fn clear_staged(&mut self, channel: &str) -> Result<()> {
        match std::fs::remove_file(self.staging_path(channel)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[derive(Default)]
struct MemoryState {
    manifest: Option<Manifest>,
    manifest_writes: usize,
    volumes: BTreeMap<String, String>,
    staged: HashMap<String, Vec<StagedTranscript>>,
}

/// In-memory volume store (useful for testing). Clones share state.
#[derive(Clone, Default)]
pub struct MemoryVolumeStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryVolumeStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|e| YtragError::Storage(format!("Failed to acquire lock: {}", e)))
    }

    /// Contents of a written volume.
    pub fn volume(&self, file_name: &str) -> Option<String> {
        self.lock().ok()?.volumes.get(file_name).cloned()
    }

    /// Names of all written volumes, sorted.
    pub fn volume_names(&self) -> Vec<String> {
        self.lock()
            .map(|s| s.volumes.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// How many times the manifest has been written.
    pub fn manifest_writes(&self) -> usize {
        self.lock().map(|s| s.manifest_writes).unwrap_or(0)
    }
}

impl VolumeStore for MemoryVolumeStore {
    fn load_manifest(&self) -> Result<Manifest> {
        Ok(self.lock()?.manifest.clone().unwrap_or_default())
    }

    fn write_manifest(&mut self, manifest: &Manifest) -> Result<()> {
        let mut state = self.lock()?;
        state.manifest = Some(manifest.clone());
        state.manifest_writes += 1;
        Ok(())
    }

    fn write_volume(&mut self, file_name: &str, contents: &str) -> Result<()> {
        self.lock()?
            .volumes
            .insert(file_name.to_string(), contents.to_string());
        Ok(())
    }

    fn stage(&mut self, channel: &str, entry: &StagedTranscript) -> Result<()> {
        self.lock()?
            .staged
            .entry(channel.to_string())
            .or_default()
            .push(entry.clone());
        Ok(())
    }

    fn load_staged(&self, channel: &str) -> Result<Vec<StagedTranscript>> {
        Ok(self.lock()?.staged.get(channel).cloned().unwrap_or_default())
    }

    fn clear_staged(&mut self, channel: &str) -> Result<()> {
        self.lock()?.staged.remove(channel);
        Ok(())
    }
}

//! Configuration settings for ytrag.

use crate::error::{Result, YtragError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub download: DownloadSettings,
    pub backoff: BackoffSettings,
    pub cleaner: CleanerSettings,
    pub volumes: VolumeSettings,
    pub ledger: LedgerSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Working directory for the ledger, staging and exported volumes.
    pub output_dir: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            output_dir: ".".to_string(),
            log_level: "warn".to_string(),
        }
    }
}

/// Subtitle acquisition settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadSettings {
    /// Ordered language preference. Empty means detect the spoken language per video.
    pub preferred_langs: Vec<String>,
    /// Path or name of the yt-dlp executable.
    pub yt_dlp_path: String,
    /// Timeout for a single remote attempt, in seconds.
    pub attempt_timeout_secs: u64,
    /// Minimum pause between videos, in milliseconds.
    pub request_interval_ms: u64,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            preferred_langs: Vec::new(),
            yt_dlp_path: "yt-dlp".to_string(),
            attempt_timeout_secs: 120,
            request_interval_ms: 1000,
        }
    }
}

impl DownloadSettings {
    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout_secs)
    }

    pub fn request_interval(&self) -> Duration {
        Duration::from_millis(self.request_interval_ms)
    }
}

/// Retry and adaptive backoff tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffSettings {
    /// Base delay before the first retry, in milliseconds.
    pub base_delay_ms: u64,
    /// Upper bound for any single delay, in milliseconds.
    pub max_delay_ms: u64,
    /// Total attempts per operation, including the first one.
    pub max_attempts: u32,
    /// Jitter as a fraction of the computed delay (0.0 - 1.0).
    pub jitter_fraction: f64,
    /// Successes required after a rate limit before the base delay decays.
    pub cooldown_successes: u32,
    /// Amount the widened base delay shrinks per success once cooled down, in milliseconds.
    pub decay_ms: u64,
}

impl Default for BackoffSettings {
    fn default() -> Self {
        Self {
            base_delay_ms: 2000,
            max_delay_ms: 30_000,
            max_attempts: 6,
            jitter_fraction: 0.25,
            cooldown_successes: 3,
            decay_ms: 500,
        }
    }
}

/// Subtitle cleaning settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanerSettings {
    /// Silence between cues (seconds) that starts a new paragraph.
    pub pause_threshold_secs: f64,
    /// Paragraphs longer than this break at the next sentence end.
    pub max_paragraph_words: usize,
    /// Capitalize the first letter of each sentence.
    pub capitalize_sentences: bool,
}

impl Default for CleanerSettings {
    fn default() -> Self {
        Self {
            pause_threshold_secs: 2.5,
            max_paragraph_words: 200,
            capitalize_sentences: true,
        }
    }
}

/// Volume consolidation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeSettings {
    /// Number of transcripts per sealed volume.
    pub transcripts_per_volume: usize,
    /// Directory (relative to the output dir) for volumes and the manifest.
    pub exports_dir: String,
}

impl Default for VolumeSettings {
    fn default() -> Self {
        Self {
            transcripts_per_volume: 100,
            exports_dir: "_exports".to_string(),
        }
    }
}

/// Storage backend for the resume ledger.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LedgerBackend {
    /// Append-only JSON lines file (default).
    #[default]
    Jsonl,
    /// Insert-only SQLite table.
    Sqlite,
}

impl std::str::FromStr for LedgerBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "jsonl" | "json" => Ok(LedgerBackend::Jsonl),
            "sqlite" => Ok(LedgerBackend::Sqlite),
            _ => Err(format!("Unknown ledger backend: {}", s)),
        }
    }
}

impl std::fmt::Display for LedgerBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LedgerBackend::Jsonl => write!(f, "jsonl"),
            LedgerBackend::Sqlite => write!(f, "sqlite"),
        }
    }
}

/// Resume ledger settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct LedgerSettings {
    pub backend: LedgerBackend,
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| YtragError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("ytrag")
            .join("config.toml")
    }

    /// Reject values the pipeline cannot operate with.
    pub fn validate(&self) -> Result<()> {
        if self.volumes.transcripts_per_volume == 0 {
            return Err(YtragError::Config(
                "volumes.transcripts_per_volume must be at least 1".to_string(),
            ));
        }
        if self.backoff.max_attempts == 0 {
            return Err(YtragError::Config(
                "backoff.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.backoff.base_delay_ms > self.backoff.max_delay_ms {
            return Err(YtragError::Config(format!(
                "backoff.base_delay_ms ({}) exceeds backoff.max_delay_ms ({})",
                self.backoff.base_delay_ms, self.backoff.max_delay_ms
            )));
        }
        if !(0.0..=1.0).contains(&self.backoff.jitter_fraction) {
            return Err(YtragError::Config(
                "backoff.jitter_fraction must be between 0.0 and 1.0".to_string(),
            ));
        }
        if self.cleaner.pause_threshold_secs < 0.0 {
            return Err(YtragError::Config(
                "cleaner.pause_threshold_secs cannot be negative".to_string(),
            ));
        }
        Ok(())
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded output directory path.
    pub fn output_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.output_dir)
    }

    /// Directory holding sealed volumes, staging and the manifest.
    pub fn exports_dir(&self) -> PathBuf {
        self.output_dir().join(&self.volumes.exports_dir)
    }

    /// Path of the resume ledger for the configured backend.
    pub fn ledger_path(&self) -> PathBuf {
        let name = match self.ledger.backend {
            LedgerBackend::Jsonl => ".ytrag_archive.jsonl",
            LedgerBackend::Sqlite => ".ytrag_archive.db",
        };
        self.output_dir().join(name)
    }
}

//! Configuration module for ytrag.
//!
//! Handles loading and validating application settings.

mod settings;

pub use settings::{
    BackoffSettings, CleanerSettings, DownloadSettings, GeneralSettings, LedgerBackend,
    LedgerSettings, Settings, VolumeSettings,
};

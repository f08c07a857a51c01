//! Subtitle source abstraction for ytrag.
//!
//! The pipeline never talks to YouTube directly; it goes through the
//! [`SubtitleSource`] trait so listings and payloads can come from yt-dlp in
//! production and from scripted fakes in tests.

mod youtube;

pub use youtube::{normalize_source_url, YtDlpSource};

use crate::cleaner::SubtitleFormat;
use crate::error::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A video as reported by the listing. Never mutated after listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoRef {
    /// Stable upstream identifier.
    pub id: String,
    /// Title.
    pub title: String,
    /// Publication date (if the listing provides it).
    pub published_at: Option<NaiveDate>,
}

impl VideoRef {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            published_at: None,
        }
    }

    pub fn with_published_at(mut self, date: NaiveDate) -> Self {
        self.published_at = Some(date);
        self
    }
}

/// Origin of a subtitle track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrackKind {
    /// Uploaded by the creator.
    Manual,
    /// Speech recognition in the spoken language.
    AutoGenerated,
    /// Machine translation of another track.
    AutoTranslated,
}

impl TrackKind {
    /// Lower ranks are preferred.
    pub fn rank(self) -> u8 {
        match self {
            TrackKind::Manual => 0,
            TrackKind::AutoGenerated => 1,
            TrackKind::AutoTranslated => 2,
        }
    }
}

impl std::fmt::Display for TrackKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackKind::Manual => write!(f, "manual"),
            TrackKind::AutoGenerated => write!(f, "auto-generated"),
            TrackKind::AutoTranslated => write!(f, "auto-translated"),
        }
    }
}

/// One subtitle offering for a video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackInfo {
    /// Language code as reported upstream ("en", "en-US").
    pub language_code: String,
    /// Track origin.
    pub kind: TrackKind,
    /// Payload format.
    pub format: SubtitleFormat,
    /// Download location, when the source needs one.
    pub url: Option<String>,
}

impl TrackInfo {
    pub fn new(language_code: impl Into<String>, kind: TrackKind) -> Self {
        Self {
            language_code: language_code.into(),
            kind,
            format: SubtitleFormat::Vtt,
            url: None,
        }
    }
}

/// Result of listing a channel, playlist or single video.
#[derive(Debug, Clone)]
pub struct VideoListing {
    /// Channel identifier used for volumes and the manifest.
    pub channel: String,
    /// Videos in listing order.
    pub videos: Vec<VideoRef>,
}

/// Raw subtitle payload with its format.
#[derive(Debug, Clone)]
pub struct RawSubtitle {
    pub bytes: Vec<u8>,
    pub format: SubtitleFormat,
}

/// Trait for subtitle providers.
#[async_trait]
pub trait SubtitleSource: Send + Sync {
    /// List the videos behind a channel, playlist or video URL, in listing order.
    async fn list_videos(&self, source_url: &str) -> Result<VideoListing>;

    /// List the subtitle tracks available for one video.
    async fn list_tracks(&self, video_id: &str) -> Result<Vec<TrackInfo>>;

    /// Fetch the raw payload of one track.
    async fn fetch_track(&self, video_id: &str, track: &TrackInfo) -> Result<RawSubtitle>;
}

//! Volume consolidation.
//!
//! Cleaned transcripts are gathered per channel into an open volume. When
//! the open volume reaches capacity, or is flushed at the end of a run, it is
//! sealed: rendered to a text artifact, written durably, and only then added
//! to the manifest. Appends to the open volume are staged so an interrupted
//! run resumes where it stopped.

mod manifest;
mod render;
mod store;

pub use manifest::{ChannelManifest, Manifest};
pub use render::{render_volume, sanitize_filename, volume_file_name};
pub use store::{FsVolumeStore, MemoryVolumeStore, StagedTranscript, VolumeStore};

use crate::config::Settings;
use crate::error::{Result, YtragError};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{info, instrument, warn};

/// Normalized transcript of one video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanedTranscript {
    pub video_id: String,
    pub language_code: String,
    pub title: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<NaiveDate>,
}

/// A batch of transcripts written as one artifact once sealed.
#[derive(Debug, Clone, PartialEq)]
pub struct Volume {
    /// 1-based, contiguous per channel.
    pub index: u32,
    pub transcripts: Vec<CleanedTranscript>,
}

impl Volume {
    fn new(index: u32) -> Self {
        Self {
            index,
            transcripts: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.transcripts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transcripts.is_empty()
    }

    pub fn contains(&self, video_id: &str) -> bool {
        self.transcripts.iter().any(|t| t.video_id == video_id)
    }
}

/// Result of sealing a volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedVolume {
    pub channel: String,
    pub index: u32,
    pub file_name: String,
    pub transcripts: usize,
}

/// Owns the open volume of every channel and the manifest.
pub struct Consolidator {
    per_volume: usize,
    manifest: Manifest,
    open: HashMap<String, Volume>,
    store: Box<dyn VolumeStore>,
}

impl Consolidator {
    /// Create a consolidator over `store`, sealing every `per_volume` transcripts.
    pub fn open(store: Box<dyn VolumeStore>, per_volume: usize) -> Result<Self> {
        if per_volume == 0 {
            return Err(YtragError::Config(
                "transcripts per volume must be at least 1".to_string(),
            ));
        }

        let manifest = store.load_manifest()?;
        info!(
            "Loaded manifest with {} channel(s), {} transcripts per volume",
            manifest.channels.len(),
            per_volume
        );

        Ok(Self {
            per_volume,
            manifest,
            open: HashMap::new(),
            store,
        })
    }

    /// Consolidator writing to the configured exports directory.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let store = FsVolumeStore::new(&settings.exports_dir())?;
        Self::open(Box::new(store), settings.volumes.transcripts_per_volume)
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn per_volume(&self) -> usize {
        self.per_volume
    }

    /// The channel's open volume, restoring staged transcripts on first use.
    pub fn open_volume(&mut self, channel: &str) -> Result<&Volume> {
        Ok(&*self.open_volume_mut(channel)?)
    }

    fn open_volume_mut(&mut self, channel: &str) -> Result<&mut Volume> {
        if !self.open.contains_key(channel) {
            let index = self.manifest.next_index(channel);
            let mut volume = Volume::new(index);

            for staged in self.store.load_staged(channel)? {
                // Lower tags belong to volumes that were sealed already.
                if staged.volume == index && !volume.contains(&staged.transcript.video_id) {
                    volume.transcripts.push(staged.transcript);
                }
            }
            if !volume.is_empty() {
                info!(
                    channel,
                    volume = index,
                    transcripts = volume.len(),
                    "Restored staged transcripts"
                );
            }

            self.open.insert(channel.to_string(), volume);
        }

        self.open
            .get_mut(channel)
            .ok_or_else(|| YtragError::Storage(format!("No open volume for {}", channel)))
    }

    /// Add a transcript to the channel's open volume, sealing it when full.
    #[instrument(skip(self, transcript), fields(video_id = %transcript.video_id))]
    pub fn append(
        &mut self,
        channel: &str,
        transcript: CleanedTranscript,
    ) -> Result<Option<SealedVolume>> {
        let index = {
            let volume = self.open_volume_mut(channel)?;
            if volume.contains(&transcript.video_id) {
                warn!("Transcript already in open volume {}, ignoring", volume.index);
                return Ok(None);
            }
            volume.index
        };

        let staged = StagedTranscript {
            volume: index,
            transcript,
        };
        self.store.stage(channel, &staged)?;

        let per_volume = self.per_volume;
        let volume = self.open_volume_mut(channel)?;
        volume.transcripts.push(staged.transcript);

        if volume.len() >= per_volume {
            return self.seal(channel);
        }
        Ok(None)
    }

    /// Seal the channel's open volume even if under capacity.
    pub fn flush(&mut self, channel: &str) -> Result<Option<SealedVolume>> {
        self.open_volume_mut(channel)?;
        self.seal(channel)
    }

    /// Seal every open volume this consolidator has touched.
    pub fn flush_all(&mut self) -> Result<Vec<SealedVolume>> {
        let mut channels: Vec<String> = self.open.keys().cloned().collect();
        channels.sort();

        let mut sealed = Vec::new();
        for channel in channels {
            if let Some(volume) = self.flush(&channel)? {
                sealed.push(volume);
            }
        }
        Ok(sealed)
    }

    /// Write the open volume, then the manifest, then drop its staging.
    fn seal(&mut self, channel: &str) -> Result<Option<SealedVolume>> {
        let Some(volume) = self.open.get(channel) else {
            return Ok(None);
        };
        if volume.is_empty() {
            return Ok(None);
        }

        let index = volume.index;
        let count = volume.len();
        let first_number = self.manifest.sealed_transcripts(channel) + 1;
        let file_name = volume_file_name(channel, index);
        let contents = render_volume(channel, index, first_number, &volume.transcripts);
        let last_video_id = volume.transcripts.last().map(|t| t.video_id.clone());

        self.store.write_volume(&file_name, &contents)?;

        let mut manifest = self.manifest.clone();
        manifest.record_sealed(channel, file_name.clone(), count, last_video_id);
        self.store.write_manifest(&manifest)?;
        self.manifest = manifest;

        self.store.clear_staged(channel)?;
        self.open.insert(channel.to_string(), Volume::new(index + 1));

        info!(channel, volume = index, transcripts = count, "Sealed {}", file_name);

        Ok(Some(SealedVolume {
            channel: channel.to_string(),
            index,
            file_name,
            transcripts: count,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transcript(id: &str) -> CleanedTranscript {
        CleanedTranscript {
            video_id: id.to_string(),
            language_code: "en".to_string(),
            title: format!("Video {}", id),
            text: format!("Text of {}.", id),
            published_at: None,
        }
    }

    fn consolidator(store: &MemoryVolumeStore, per_volume: usize) -> Consolidator {
        Consolidator::open(Box::new(store.clone()), per_volume).unwrap()
    }

    #[test]
    fn test_five_videos_two_per_volume() {
        let store = MemoryVolumeStore::new();
        let mut c = consolidator(&store, 2);

        let mut sealed = Vec::new();
        for id in ["A", "B", "C", "D", "E"] {
            sealed.extend(c.append("chan", transcript(id)).unwrap());
        }
        sealed.extend(c.flush("chan").unwrap());

        let sizes: Vec<usize> = sealed.iter().map(|s| s.transcripts).collect();
        assert_eq!(sizes, vec![2, 2, 1]);

        let entry = c.manifest().channel("chan").unwrap();
        assert_eq!(entry.volume_count, 3);
        assert_eq!(entry.total_transcripts, 5);
        assert_eq!(entry.last_video_id.as_deref(), Some("E"));
        assert_eq!(
            store.volume_names(),
            vec!["chan_Vol01.txt", "chan_Vol02.txt", "chan_Vol03.txt"]
        );

        let second = store.volume("chan_Vol02.txt").unwrap();
        assert!(second.contains("=== CONTENTS: transcripts 3 to 4 ==="));
        assert!(second.contains("# Video C") && second.contains("# Video D"));
    }

    #[test]
    fn test_manifest_total_matches_volume_sizes() {
        let store = MemoryVolumeStore::new();
        let mut c = consolidator(&store, 3);

        let mut sealed_total = 0;
        for i in 0..10 {
            for s in c.append("chan", transcript(&format!("v{}", i))).unwrap() {
                sealed_total += s.transcripts;
            }
        }
        for s in c.flush_all().unwrap() {
            sealed_total += s.transcripts;
        }

        assert_eq!(sealed_total, 10);
        assert_eq!(c.manifest().sealed_transcripts("chan"), 10);
        assert_eq!(c.manifest().channel("chan").unwrap().volume_count, 4);
    }

    #[test]
    fn test_flush_of_empty_volume_writes_nothing() {
        let store = MemoryVolumeStore::new();
        let mut c = consolidator(&store, 2);

        c.append("chan", transcript("A")).unwrap();
        c.append("chan", transcript("B")).unwrap();
        assert_eq!(store.manifest_writes(), 1);

        assert_eq!(c.flush("chan").unwrap(), None);
        assert!(c.flush_all().unwrap().is_empty());
        assert_eq!(store.manifest_writes(), 1);
    }

    #[test]
    fn test_open_volume_is_restored_from_staging() {
        let store = MemoryVolumeStore::new();
        {
            let mut c = consolidator(&store, 3);
            c.append("chan", transcript("A")).unwrap();
            c.append("chan", transcript("B")).unwrap();
            // Dropped without flushing, as after an interrupt.
        }
        assert_eq!(store.manifest_writes(), 0);

        let mut c = consolidator(&store, 3);
        assert_eq!(c.open_volume("chan").unwrap().len(), 2);

        let sealed = c.append("chan", transcript("C")).unwrap().unwrap();
        assert_eq!(sealed.index, 1);
        assert_eq!(sealed.transcripts, 3);
    }

    #[test]
    fn test_staging_of_sealed_volume_is_ignored() {
        let store = MemoryVolumeStore::new();
        let mut c = consolidator(&store, 1);
        c.append("chan", transcript("A")).unwrap();

        // Crash between the manifest write and clearing the staging.
        let mut raw = store.clone();
        raw.stage(
            "chan",
            &StagedTranscript {
                volume: 1,
                transcript: transcript("A"),
            },
        )
        .unwrap();

        let mut reopened = consolidator(&store, 1);
        assert!(reopened.open_volume("chan").unwrap().is_empty());
        let sealed = reopened.append("chan", transcript("B")).unwrap().unwrap();
        assert_eq!(sealed.index, 2);
        assert_eq!(reopened.manifest().sealed_transcripts("chan"), 2);
    }

    #[test]
    fn test_duplicate_in_open_volume_is_ignored() {
        let store = MemoryVolumeStore::new();
        let mut c = consolidator(&store, 5);
        c.append("chan", transcript("A")).unwrap();
        c.append("chan", transcript("A")).unwrap();
        assert_eq!(c.open_volume("chan").unwrap().len(), 1);
    }

    #[test]
    fn test_channels_are_independent() {
        let store = MemoryVolumeStore::new();
        let mut c = consolidator(&store, 2);
        c.append("one", transcript("A")).unwrap();
        c.append("two", transcript("B")).unwrap();
        c.append("one", transcript("C")).unwrap();

        assert_eq!(c.manifest().channel("one").unwrap().volume_count, 1);
        assert!(c.manifest().channel("two").is_none());

        let sealed = c.flush_all().unwrap();
        assert_eq!(sealed.len(), 1);
        assert_eq!(sealed[0].channel, "two");
    }

    #[test]
    fn test_zero_capacity_is_rejected() {
        assert!(Consolidator::open(Box::new(MemoryVolumeStore::new()), 0).is_err());
    }
}

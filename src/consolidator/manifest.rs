//! Manifest of sealed volumes per channel.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Progress record for one channel. Only sealed volumes are counted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelManifest {
    pub volume_count: u32,
    pub total_transcripts: usize,
    pub last_video_id: Option<String>,
    /// Sealed volume file names, in index order.
    pub volumes: Vec<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Manifest across all channels written to the exports directory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub channels: BTreeMap<String, ChannelManifest>,
}

impl Manifest {
    pub fn channel(&self, channel: &str) -> Option<&ChannelManifest> {
        self.channels.get(channel)
    }

    /// Index the next volume of `channel` will take.
    pub fn next_index(&self, channel: &str) -> u32 {
        self.channel(channel).map_or(0, |c| c.volume_count) + 1
    }

    /// Number of transcripts already sealed for `channel`.
    pub fn sealed_transcripts(&self, channel: &str) -> usize {
        self.channel(channel).map_or(0, |c| c.total_transcripts)
    }

    /// Account for a newly sealed volume.
    pub fn record_sealed(
        &mut self,
        channel: &str,
        file_name: String,
        transcripts: usize,
        last_video_id: Option<String>,
    ) {
        let entry = self.channels.entry(channel.to_string()).or_default();
        entry.volume_count += 1;
        entry.total_transcripts += transcripts;
        if last_video_id.is_some() {
            entry.last_video_id = last_video_id;
        }
        entry.volumes.push(file_name);
        entry.updated_at = Some(Utc::now());
    }
}

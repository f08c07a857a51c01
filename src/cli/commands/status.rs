//! Status command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::consolidator::{Consolidator, FsVolumeStore};
use crate::ledger::ResumeLedger;
use anyhow::Result;

/// Show sealed volumes per channel and ledger totals.
pub fn run_status(settings: &Settings) -> Result<()> {
    Output::header("ytrag status");
    Output::kv("Output directory", &settings.output_dir().display().to_string());

    if !settings.ledger_path().exists() {
        Output::info("No runs yet in this directory.");
        return Ok(());
    }

    let ledger = ResumeLedger::open_read_only(settings)?;
    let counts = ledger.counts();

    Output::header("Ledger");
    Output::kv("Backend", &settings.ledger.backend.to_string());
    Output::kv("Done", &counts.done.to_string());
    Output::kv("Skipped (no subtitles)", &counts.skipped.to_string());
    Output::kv("Failed (retried next run)", &counts.failed.to_string());

    let store = FsVolumeStore::existing(&settings.exports_dir());
    let mut consolidator =
        Consolidator::open(Box::new(store), settings.volumes.transcripts_per_volume)?;
    let channels: Vec<String> = consolidator.manifest().channels.keys().cloned().collect();

    Output::header("Channels");
    if channels.is_empty() {
        Output::info("No sealed volumes yet.");
        return Ok(());
    }

    for channel in channels {
        let open = consolidator.open_volume(&channel)?.len();
        if let Some(entry) = consolidator.manifest().channel(&channel) {
            Output::channel_info(&channel, entry.volume_count, entry.total_transcripts, open);
            if let Some(last) = &entry.last_video_id {
                Output::kv("Last video", last);
            }
        }
    }

    Ok(())
}

//! Run command implementation.

use crate::cli::output::truncate;
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::pipeline::{Pipeline, RunObserver, RunSummary, VideoOutcome};
use crate::source::{normalize_source_url, VideoRef, YtDlpSource};
use anyhow::Result;
use indicatif::ProgressBar;
use std::sync::{Arc, Mutex};

/// Progress bar driven by pipeline notifications.
struct ProgressReporter {
    spinner: ProgressBar,
    bar: Mutex<Option<ProgressBar>>,
}

impl ProgressReporter {
    fn new() -> Self {
        Self {
            spinner: Output::spinner("Fetching video list..."),
            bar: Mutex::new(None),
        }
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        if let Ok(guard) = self.bar.lock() {
            if let Some(bar) = guard.as_ref() {
                f(bar);
            }
        }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
        self.with_bar(|bar| bar.finish_and_clear());
    }
}

impl RunObserver for ProgressReporter {
    fn listed(&self, channel: &str, total: usize) {
        self.spinner.finish_and_clear();
        Output::info(&format!("Found {} videos in {}", total, channel));
        if let Ok(mut guard) = self.bar.lock() {
            *guard = Some(Output::progress_bar(total as u64, ""));
        }
    }

    fn video_started(&self, video: &VideoRef) {
        self.with_bar(|bar| bar.set_message(truncate(&video.title, 40)));
    }

    fn video_finished(&self, video: &VideoRef, outcome: VideoOutcome) {
        self.with_bar(|bar| {
            match outcome {
                VideoOutcome::Failed => {
                    bar.println(format!("  failed: {} ({})", video.title, video.id))
                }
                VideoOutcome::SkippedNoSubtitles => {
                    bar.println(format!("  no subtitles: {} ({})", video.title, video.id))
                }
                VideoOutcome::Done | VideoOutcome::AlreadyHandled => {}
            }
            bar.inc(1);
        });
    }
}

/// Run the pipeline over a channel, playlist or single video.
pub async fn run_channel(
    url: &str,
    langs: &[String],
    per_volume: Option<usize>,
    output: Option<String>,
    mut settings: Settings,
) -> Result<()> {
    if !langs.is_empty() {
        settings.download.preferred_langs = langs.to_vec();
    }
    if let Some(n) = per_volume {
        settings.volumes.transcripts_per_volume = n;
    }
    if let Some(dir) = output {
        settings.general.output_dir = dir;
    }

    // Pre-flight checks
    if let Err(e) = preflight::check(Operation::Run, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'ytrag doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let source_url = normalize_source_url(url)?;
    Output::info(&format!("Processing: {}", source_url));
    if settings.download.preferred_langs.is_empty() {
        Output::info("Languages: auto-detect");
    } else {
        Output::info(&format!(
            "Languages: {}",
            settings.download.preferred_langs.join(", ")
        ));
    }

    let source = Arc::new(YtDlpSource::new(settings.download.yt_dlp_path.clone()));
    let reporter = Arc::new(ProgressReporter::new());
    let mut pipeline = Pipeline::new(&settings, source)?.with_observer(reporter.clone());

    let result = pipeline.run(&source_url).await;
    reporter.finish();

    match result {
        Ok(summary) => {
            print_summary(&summary, &settings);
            Ok(())
        }
        Err(e) => {
            Output::error(&format!("Run aborted: {}", e));
            Output::info("Finished videos are recorded; run again to resume.");
            Err(e.into())
        }
    }
}

fn print_summary(summary: &RunSummary, settings: &Settings) {
    Output::header(&format!("Run summary: {}", summary.channel));
    Output::kv("Listed", &summary.listed.to_string());
    Output::kv("Done", &summary.done.to_string());
    Output::kv("Skipped (no subtitles)", &summary.skipped.to_string());
    Output::kv("Failed", &summary.failed.to_string());
    Output::kv("Already handled", &summary.already_handled.to_string());
    Output::kv("Volumes sealed", &summary.volumes_sealed.len().to_string());

    for volume in &summary.volumes_sealed {
        Output::list_item(&format!(
            "{} ({} transcripts)",
            volume.file_name, volume.transcripts
        ));
    }

    println!();
    if summary.failed > 0 {
        Output::warning(&format!(
            "{} video(s) failed and will be retried on the next run.",
            summary.failed
        ));
    } else {
        Output::success(&format!(
            "Exports are in {}",
            settings.exports_dir().display()
        ));
    }
}

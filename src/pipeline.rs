//! Pipeline orchestrator for ytrag.
//!
//! Drives one channel through track selection, guarded fetching, cleaning,
//! the resume ledger and volume consolidation, one video at a time in
//! listing order.

use crate::backoff::{BackoffController, BackoffPolicy};
use crate::cleaner::Cleaner;
use crate::config::Settings;
use crate::consolidator::{CleanedTranscript, Consolidator, SealedVolume};
use crate::error::Result;
use crate::ledger::{ResumeLedger, ResumeStatus};
use crate::selection::TrackSelector;
use crate::source::{SubtitleSource, VideoRef};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// What happened to one listed video during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoOutcome {
    Done,
    SkippedNoSubtitles,
    Failed,
    /// Finished by an earlier run.
    AlreadyHandled,
}

/// Receives progress notifications from a running pipeline.
pub trait RunObserver: Send + Sync {
    fn listed(&self, _channel: &str, _total: usize) {}
    fn video_started(&self, _video: &VideoRef) {}
    fn video_finished(&self, _video: &VideoRef, _outcome: VideoOutcome) {}
}

/// Counts reported at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub channel: String,
    pub listed: usize,
    pub done: usize,
    pub skipped: usize,
    pub failed: usize,
    pub already_handled: usize,
    pub volumes_sealed: Vec<SealedVolume>,
}

impl RunSummary {
    fn count(&mut self, outcome: VideoOutcome) {
        match outcome {
            VideoOutcome::Done => self.done += 1,
            VideoOutcome::SkippedNoSubtitles => self.skipped += 1,
            VideoOutcome::Failed => self.failed += 1,
            VideoOutcome::AlreadyHandled => self.already_handled += 1,
        }
    }
}

/// The main orchestrator: the single writer of the ledger and the consolidator.
pub struct Pipeline {
    source: Arc<dyn SubtitleSource>,
    backoff: BackoffController,
    ledger: ResumeLedger,
    consolidator: Consolidator,
    cleaner: Cleaner,
    preferred_langs: Vec<String>,
    observer: Option<Arc<dyn RunObserver>>,
}

impl Pipeline {
    /// Create a pipeline with on-disk ledger and volumes from `settings`.
    pub fn new(settings: &Settings, source: Arc<dyn SubtitleSource>) -> Result<Self> {
        std::fs::create_dir_all(settings.output_dir())?;

        let ledger = ResumeLedger::from_settings(settings)?;
        let consolidator = Consolidator::from_settings(settings)?;
        let backoff = BackoffController::new(BackoffPolicy::from_settings(
            &settings.backoff,
            &settings.download,
        ));

        Ok(Self::with_components(
            source,
            backoff,
            ledger,
            consolidator,
            Cleaner::new(settings.cleaner.clone()),
            settings.download.preferred_langs.clone(),
        ))
    }

    /// Create a pipeline with custom components.
    pub fn with_components(
        source: Arc<dyn SubtitleSource>,
        backoff: BackoffController,
        ledger: ResumeLedger,
        consolidator: Consolidator,
        cleaner: Cleaner,
        preferred_langs: Vec<String>,
    ) -> Self {
        Self {
            source,
            backoff,
            ledger,
            consolidator,
            cleaner,
            preferred_langs,
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn RunObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn ledger(&self) -> &ResumeLedger {
        &self.ledger
    }

    pub fn consolidator(&self) -> &Consolidator {
        &self.consolidator
    }

    pub fn backoff(&self) -> &BackoffController {
        &self.backoff
    }

    /// Process every listed video of `source_url` not yet finished.
    ///
    /// Per-video failures are recorded and the run moves on; only fatal
    /// errors (and a listing that cannot be obtained) end it early.
    #[instrument(skip(self), fields(source = %source_url))]
    pub async fn run(&mut self, source_url: &str) -> Result<RunSummary> {
        let source = Arc::clone(&self.source);
        let listing = self
            .backoff
            .execute("list videos", || source.list_videos(source_url))
            .await?;

        info!(
            "Listed {} videos for channel {}",
            listing.videos.len(),
            listing.channel
        );
        if let Some(observer) = &self.observer {
            observer.listed(&listing.channel, listing.videos.len());
        }

        let mut summary = RunSummary {
            channel: listing.channel.clone(),
            listed: listing.videos.len(),
            ..RunSummary::default()
        };

        let mut attempted = false;
        for video in &listing.videos {
            if let Some(observer) = &self.observer {
                observer.video_started(video);
            }

            let outcome = if self.ledger.has(&video.id) {
                debug!(video_id = %video.id, "Already handled");
                VideoOutcome::AlreadyHandled
            } else {
                if attempted {
                    self.backoff.pace().await;
                }
                attempted = true;
                self.handle_video(&listing.channel, video, &mut summary)
                    .await?
            };

            summary.count(outcome);
            if let Some(observer) = &self.observer {
                observer.video_finished(video, outcome);
            }
        }

        summary
            .volumes_sealed
            .extend(self.consolidator.flush(&listing.channel)?);

        info!(
            done = summary.done,
            skipped = summary.skipped,
            failed = summary.failed,
            already_handled = summary.already_handled,
            volumes_sealed = summary.volumes_sealed.len(),
            "Run complete"
        );

        Ok(summary)
    }

    /// Process one video, containing every error that is not fatal.
    async fn handle_video(
        &mut self,
        channel: &str,
        video: &VideoRef,
        summary: &mut RunSummary,
    ) -> Result<VideoOutcome> {
        match self.process_video(channel, video, summary).await {
            Ok(outcome) => Ok(outcome),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                warn!(video_id = %video.id, error = %e, "Video failed");
                self.ledger
                    .record_with_detail(&video.id, ResumeStatus::Failed, Some(e.to_string()))?;
                Ok(VideoOutcome::Failed)
            }
        }
    }

    #[instrument(skip(self, video, summary), fields(video_id = %video.id))]
    async fn process_video(
        &mut self,
        channel: &str,
        video: &VideoRef,
        summary: &mut RunSummary,
    ) -> Result<VideoOutcome> {
        let source = Arc::clone(&self.source);

        let tracks = self
            .backoff
            .execute("list tracks", || source.list_tracks(&video.id))
            .await?;

        let Some(track) = TrackSelector::choose(&tracks, &self.preferred_langs) else {
            info!("No acceptable subtitle track among {}", tracks.len());
            self.ledger
                .record(&video.id, ResumeStatus::SkippedNoSubtitles)?;
            return Ok(VideoOutcome::SkippedNoSubtitles);
        };
        debug!(language = %track.language_code, kind = %track.kind, "Selected track");

        let raw = self
            .backoff
            .execute("fetch track", || source.fetch_track(&video.id, track))
            .await?;

        let text = self.cleaner.clean(&raw.bytes, raw.format);
        if text.is_empty() {
            info!("Track held no speech after cleaning");
            self.ledger
                .record(&video.id, ResumeStatus::SkippedNoSubtitles)?;
            return Ok(VideoOutcome::SkippedNoSubtitles);
        }

        self.ledger.record(&video.id, ResumeStatus::Done)?;

        let transcript = CleanedTranscript {
            video_id: video.id.clone(),
            language_code: track.language_code.clone(),
            title: video.title.clone(),
            text,
            published_at: video.published_at,
        };
        if let Some(sealed) = self.consolidator.append(channel, transcript)? {
            summary.volumes_sealed.push(sealed);
        }

        Ok(VideoOutcome::Done)
    }
}

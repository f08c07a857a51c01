//! ytrag - YouTube subtitles to RAG-ready volumes
//!
//! A resumable CLI tool that downloads the subtitles of every video on a
//! YouTube channel or playlist, cleans them into plain prose, and
//! consolidates them into bounded text volumes ready to load into a
//! retrieval-augmented generation system.
//!
//! # Overview
//!
//! ytrag allows you to:
//! - Pick the best subtitle track per video (manual over auto-generated over translated)
//! - Survive rate limiting with adaptive exponential backoff
//! - Resume interrupted runs without reprocessing finished videos
//! - Export volumes of N transcripts with a manifest describing progress
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - `config` - Configuration management
//! - `source` - Subtitle source abstraction (yt-dlp)
//! - `selection` - Track selection policy
//! - `backoff` - Adaptive retry and pacing
//! - `cleaner` - Subtitle to prose conversion
//! - `ledger` - Append-only resume ledger
//! - `consolidator` - Volume assembly and manifest
//! - `pipeline` - Pipeline coordination
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use ytrag::config::Settings;
//! use ytrag::pipeline::Pipeline;
//! use ytrag::source::YtDlpSource;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let source = Arc::new(YtDlpSource::new(settings.download.yt_dlp_path.clone()));
//!     let mut pipeline = Pipeline::new(&settings, source)?;
//!
//!     let summary = pipeline.run("https://www.youtube.com/@SomeChannel/videos").await?;
//!     println!("{} done, {} failed", summary.done, summary.failed);
//!
//!     Ok(())
//! }
//! ```

pub mod backoff;
pub mod cleaner;
pub mod cli;
pub mod config;
pub mod consolidator;
pub mod error;
pub mod ledger;
pub mod pipeline;
pub mod selection;
pub mod source;

pub use error::{Result, YtragError};

//! CLI module for ytrag.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};

/// ytrag - YouTube subtitles to RAG-ready volumes
///
/// Downloads the subtitles of a channel or playlist, cleans them into prose
/// and consolidates them into bounded text volumes. Runs are resumable.
#[derive(Parser, Debug)]
#[command(name = "ytrag")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true, env = "YTRAG_CONFIG")]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download, clean and consolidate every video of a channel or playlist
    Run {
        /// Channel, playlist or video URL (or a bare video ID)
        url: String,

        /// Preferred subtitle languages in order (e.g. "es,en"); auto-detect when omitted
        #[arg(short, long, value_delimiter = ',')]
        lang: Vec<String>,

        /// Transcripts per volume
        #[arg(long)]
        per_volume: Option<usize>,

        /// Output directory for the ledger and exports
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Show volumes per channel and ledger counts
    Status,

    /// Clean a single local subtitle file into plain text
    Clean {
        /// Path to a .vtt or .srt file
        file: String,

        /// Output file (stdout if not specified)
        #[arg(short, long)]
        output: Option<String>,

        /// Subtitle format (vtt, srt); detected when omitted
        #[arg(long)]
        format: Option<String>,
    },

    /// Check system requirements and configuration
    Doctor,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_with_languages() {
        let cli = Cli::try_parse_from([
            "ytrag",
            "-vv",
            "run",
            "https://www.youtube.com/@chan",
            "--lang",
            "es,en",
            "--per-volume",
            "50",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Run {
                url,
                lang,
                per_volume,
                output,
            } => {
                assert_eq!(url, "https://www.youtube.com/@chan");
                assert_eq!(lang, vec!["es", "en"]);
                assert_eq!(per_volume, Some(50));
                assert!(output.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_config_path() {
        let cli = Cli::try_parse_from(["ytrag", "config", "path", "--config", "/tmp/x.toml"]).unwrap();
        assert_eq!(cli.config.as_deref(), Some("/tmp/x.toml"));
        assert!(matches!(
            cli.command,
            Commands::Config {
                action: ConfigAction::Path
            }
        ));
    }
}

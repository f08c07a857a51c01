//! Clean command - run the cleaner on a local subtitle file.

use crate::cleaner::{Cleaner, SubtitleFormat};
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use anyhow::{Context, Result};
use std::path::Path;

/// Clean one subtitle file and write the text to `output` or stdout.
pub fn run_clean(
    file: &str,
    output: Option<&str>,
    format: Option<&str>,
    settings: &Settings,
) -> Result<()> {
    preflight::check(Operation::Clean, settings)?;

    let path = Path::new(file);
    let raw = std::fs::read(path).with_context(|| format!("Cannot read {}", file))?;

    let format = match format {
        Some(f) => f.parse::<SubtitleFormat>().map_err(|e| anyhow::anyhow!(e))?,
        None => SubtitleFormat::from_path(path).unwrap_or_else(|| SubtitleFormat::detect(&raw)),
    };

    let text = Cleaner::new(settings.cleaner.clone()).clean(&raw, format);
    if text.is_empty() {
        Output::warning("No speech found in the subtitle file.");
    }

    match output {
        Some(out) => {
            std::fs::write(out, format!("{}\n", text))
                .with_context(|| format!("Cannot write {}", out))?;
            Output::success(&format!(
                "Wrote {} words to {}",
                text.split_whitespace().count(),
                out
            ));
        }
        None => println!("{}", text),
    }

    Ok(())
}

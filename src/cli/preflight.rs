//! Pre-flight checks before expensive operations.
//!
//! Validates that required tools and configuration are available
//! before starting a run that would otherwise fail on its first video.

use crate::config::Settings;
use crate::error::{Result, YtragError};
use std::process::Command;

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// A pipeline run needs yt-dlp and a valid configuration.
    Run,
    /// Cleaning a local file needs nothing external.
    Clean,
}

/// Run pre-flight checks for the given operation.
///
/// Returns Ok(()) if all checks pass, or an error describing what's missing.
pub fn check(operation: Operation, settings: &Settings) -> Result<()> {
    settings.validate()?;
    match operation {
        Operation::Run => {
            check_tool(&settings.download.yt_dlp_path)?;
        }
        Operation::Clean => {}
    }
    Ok(())
}

/// Check if an external tool is available.
pub fn check_tool(name: &str) -> Result<()> {
    match Command::new(name).arg("--version").output() {
        Ok(output) if output.status.success() => Ok(()),
        Ok(_) => Err(YtragError::ToolNotFound(format!(
            "{} is installed but not working correctly",
            name
        ))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(YtragError::ToolNotFound(name.to_string()))
        }
        Err(e) => Err(YtragError::ToolNotFound(format!("{}: {}", name, e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_clean_no_requirements() {
        assert!(check(Operation::Clean, &Settings::default()).is_ok());
    }

    #[test]
    fn test_missing_tool() {
        let err = check_tool("ytrag-no-such-tool-xyz").unwrap_err();
        assert!(matches!(err, YtragError::ToolNotFound(_)));
    }

    #[test]
    fn test_invalid_settings_fail_preflight() {
        let mut settings = Settings::default();
        settings.volumes.transcripts_per_volume = 0;
        assert!(check(Operation::Clean, &settings).is_err());
    }
}

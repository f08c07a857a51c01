//! Cue block parsing for WebVTT and SRT payloads.

use regex::Regex;
use std::sync::OnceLock;

/// One timed cue with its raw payload lines.
#[derive(Debug, Clone, PartialEq)]
pub struct Cue {
    /// Start time in seconds.
    pub start: f64,
    /// End time in seconds.
    pub end: f64,
    /// Payload lines, markup still attached.
    pub lines: Vec<String>,
}

fn timing_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^((?:\d+:)?\d{1,2}:\d{2}[.,]\d{1,3})\s*-->\s*((?:\d+:)?\d{1,2}:\d{2}[.,]\d{1,3})")
            .expect("Invalid regex")
    })
}

/// Parse `HH:MM:SS.mmm`, `MM:SS.mmm` or the SRT form `HH:MM:SS,mmm` into seconds.
pub fn parse_timestamp(timestamp: &str) -> Option<f64> {
    let timestamp = timestamp.trim().replace(',', ".");
    let parts: Vec<&str> = timestamp.split(':').collect();

    let (hours, minutes, seconds) = match parts.as_slice() {
        [h, m, s] => (h.parse::<u64>().ok()?, m.parse::<u64>().ok()?, s.parse::<f64>().ok()?),
        [m, s] => (0, m.parse::<u64>().ok()?, s.parse::<f64>().ok()?),
        _ => return None,
    };

    if !seconds.is_finite() || seconds < 0.0 {
        return None;
    }

    Some((hours * 3600 + minutes * 60) as f64 + seconds)
}

/// Split subtitle text into cues.
///
/// Anything outside a cue (the `WEBVTT` header, `NOTE`/`STYLE`/`REGION`
/// blocks, cue identifiers) is dropped. Cue settings after the timing are
/// ignored. A cue's payload ends at a blank line or at the next timing line,
/// so payloads without blank-line separators still parse.
pub fn parse_cues(content: &str) -> Vec<Cue> {
    let mut cues = Vec::new();
    let mut current: Option<Cue> = None;

    for raw in content.lines() {
        let line = raw.trim_start_matches('\u{feff}').trim();

        if let Some(caps) = timing_regex().captures(line) {
            if let Some(cue) = current.take() {
                cues.push(cue);
            }
            let start = parse_timestamp(&caps[1]);
            let end = parse_timestamp(&caps[2]);
            if let (Some(start), Some(end)) = (start, end) {
                current = Some(Cue {
                    start,
                    end,
                    lines: Vec::new(),
                });
            }
            continue;
        }

        if line.is_empty() {
            if let Some(cue) = current.take() {
                cues.push(cue);
            }
            continue;
        }

        // Numeric cue ids (SRT sequence numbers) can appear without a blank line before them.
        if line.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }

        if let Some(cue) = current.as_mut() {
            cue.lines.push(line.to_string());
        }
    }

    if let Some(cue) = current.take() {
        cues.push(cue);
    }

    cues
}

//! Subtitle cleaning.
//!
//! Turns a raw WebVTT or SRT payload into plain paragraphs: timing and
//! styling are dropped, non-speech markers removed, and the rolling-window
//! repetition typical of auto-generated captions is collapsed so each spoken
//! word appears once.

mod cue;
mod text;

pub use cue::{parse_cues, parse_timestamp, Cue};
pub use text::{capitalize_sentences, is_noise, strip_markup};

use crate::config::CleanerSettings;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::path::Path;
use text::{ends_sentence, normalize_word};

/// How many recently emitted words are kept for overlap detection.
const OVERLAP_WINDOW: usize = 64;

/// Supported subtitle payload formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubtitleFormat {
    Vtt,
    Srt,
}

impl SubtitleFormat {
    /// Guess the format from the payload itself.
    pub fn detect(bytes: &[u8]) -> Self {
        let head = String::from_utf8_lossy(&bytes[..bytes.len().min(64)]);
        if head.trim_start_matches('\u{feff}').trim_start().starts_with("WEBVTT") {
            SubtitleFormat::Vtt
        } else {
            SubtitleFormat::Srt
        }
    }

    /// Format implied by a file extension, if recognized.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        ext.parse().ok()
    }
}

impl std::str::FromStr for SubtitleFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "vtt" | "webvtt" => Ok(SubtitleFormat::Vtt),
            "srt" => Ok(SubtitleFormat::Srt),
            _ => Err(format!("Unknown subtitle format: {}. Use vtt or srt.", s)),
        }
    }
}

impl std::fmt::Display for SubtitleFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubtitleFormat::Vtt => write!(f, "vtt"),
            SubtitleFormat::Srt => write!(f, "srt"),
        }
    }
}

/// Converts raw subtitle payloads into normalized transcript text.
#[derive(Debug, Clone, Default)]
pub struct Cleaner {
    settings: CleanerSettings,
}

impl Cleaner {
    pub fn new(settings: CleanerSettings) -> Self {
        Self { settings }
    }

    /// Clean a raw payload. An empty result means the payload held no speech.
    pub fn clean(&self, raw: &[u8], format: SubtitleFormat) -> String {
        let raw = raw.strip_prefix(b"\xef\xbb\xbf").unwrap_or(raw);
        let content = match (std::str::from_utf8(raw), format) {
            (Ok(text), _) => Cow::Borrowed(text),
            // WebVTT is UTF-8 by definition; legacy SRT files are often Latin-1.
            (Err(_), SubtitleFormat::Srt) => Cow::Owned(raw.iter().map(|&b| b as char).collect()),
            (Err(_), SubtitleFormat::Vtt) => String::from_utf8_lossy(raw),
        };
        self.clean_str(&content)
    }

    /// Clean subtitle text that is already decoded.
    pub fn clean_str(&self, content: &str) -> String {
        let mut paragraphs: Vec<Vec<String>> = Vec::new();
        let mut current: Vec<String> = Vec::new();
        let mut emitted: Vec<String> = Vec::new();
        let mut prev_end: Option<f64> = None;

        for cue in parse_cues(content) {
            let words: Vec<String> = cue
                .lines
                .iter()
                .map(|line| strip_markup(line))
                .filter(|line| !is_noise(line))
                .flat_map(|line| {
                    line.split_whitespace()
                        .map(str::to_string)
                        .collect::<Vec<_>>()
                })
                .collect();

            if words.is_empty() {
                continue;
            }

            if let Some(end) = prev_end {
                if cue.start - end >= self.settings.pause_threshold_secs && !current.is_empty() {
                    paragraphs.push(std::mem::take(&mut current));
                }
            }
            prev_end = Some(cue.end);

            for word in new_tail(&emitted, &words) {
                let long_enough = current.len() >= self.settings.max_paragraph_words;
                if long_enough && current.last().is_some_and(|w| ends_sentence(w)) {
                    paragraphs.push(std::mem::take(&mut current));
                }

                emitted.push(normalize_word(word));
                current.push(word.clone());
            }

            if emitted.len() > OVERLAP_WINDOW {
                emitted.drain(..emitted.len() - OVERLAP_WINDOW);
            }
        }

        if !current.is_empty() {
            paragraphs.push(current);
        }

        paragraphs
            .iter()
            .map(|words| {
                let paragraph = words.join(" ");
                if self.settings.capitalize_sentences {
                    capitalize_sentences(&paragraph)
                } else {
                    paragraph
                }
            })
            .collect::<Vec<_>>()
            .join("\n\n")
            .trim()
            .to_string()
    }
}

/// The part of `words` not already covered by the end of `emitted`.
///
/// A cue of two or more words found anywhere in the emitted window adds
/// nothing. Otherwise finds the longest suffix of the emitted words that
/// equals a prefix of the cue. One-word overlaps only count when they cover
/// the whole cue, so a sentence that legitimately starts with the previous
/// word survives.
fn new_tail<'a>(emitted: &[String], words: &'a [String]) -> &'a [String] {
    let keys: Vec<String> = words.iter().map(|w| normalize_word(w)).collect();

    if keys.len() >= 2 && emitted.windows(keys.len()).any(|window| window == keys.as_slice()) {
        return &words[words.len()..];
    }

    let max_overlap = emitted.len().min(keys.len());

    for k in (1..=max_overlap).rev() {
        if emitted[emitted.len() - k..] == keys[..k] && (k >= 2 || k == keys.len()) {
            return &words[k..];
        }
    }

    words
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cleaner() -> Cleaner {
        Cleaner::default()
    }

    #[test]
    fn test_removes_header_and_timestamps() {
        let content = "WEBVTT\n\n00:00:00.000 --> 00:00:01.000\nhello world";
        let result = cleaner().clean_str(content);
        assert_eq!(result, "Hello world");
        assert!(!result.contains("-->"));
    }

    #[test]
    fn test_removes_markers_and_tags() {
        let content = "00:00:00.000 --> 00:00:01.000\n[Music]\n\n00:00:01.000 --> 00:00:02.000\n<c>hello</c> world";
        let result = cleaner().clean_str(content);
        assert_eq!(result, "Hello world");
    }

    #[test]
    fn test_empty_input_yields_empty_output() {
        assert_eq!(cleaner().clean_str(""), "");
        assert_eq!(cleaner().clean_str("WEBVTT\n\n00:00:00.000 --> 00:00:05.000\n[Music]\n"), "");
        assert_eq!(cleaner().clean(b"not a subtitle at all", SubtitleFormat::Srt), "");
    }

    #[test]
    fn test_paragraph_break_on_pause() {
        let content = "00:00:00.000 --> 00:00:01.000\nfirst sentence\n00:00:05.000 --> 00:00:06.000\nsecond sentence after pause";
        let result = cleaner().clean_str(content);
        assert_eq!(result, "First sentence\n\nSecond sentence after pause");
    }

    #[test]
    fn test_rolling_auto_captions_are_collapsed() {
        let content = "WEBVTT\nKind: captions\nLanguage: en\n\n\
00:00:00.000 --> 00:00:02.000 align:start position:0%\n\
so<00:00:00.500><c> today</c><00:00:01.000><c> we</c>\n\n\
00:00:02.000 --> 00:00:02.010 align:start position:0%\n\
so today we\n\n\
00:00:02.010 --> 00:00:04.000 align:start position:0%\n\
so today we\n\
talk<00:00:02.500><c> about</c><00:00:03.000><c> rust</c>\n\n\
00:00:04.000 --> 00:00:04.010 align:start position:0%\n\
talk about rust\n\n\
00:00:04.010 --> 00:00:06.000 align:start position:0%\n\
talk about rust\n\
and<c> memory</c><c> safety</c>\n";

        let result = cleaner().clean_str(content);
        assert_eq!(result, "So today we talk about rust and memory safety");
    }

    #[test]
    fn test_legitimate_repeated_word_survives() {
        let content = "00:00:00.000 --> 00:00:01.000\nI said no\n\n00:00:01.000 --> 00:00:02.000\nno means no";
        let result = cleaner().clean_str(content);
        assert_eq!(result, "I said no no means no");
    }

    #[test]
    fn test_srt_payload() {
        let srt = "1\n00:00:01,000 --> 00:00:02,000\n<i>Hola</i> mundo.\n\n2\n00:00:02,100 --> 00:00:03,000\nqué &amp; tal\n";
        let result = cleaner().clean(srt.as_bytes(), SubtitleFormat::Srt);
        assert_eq!(result, "Hola mundo. Qué & tal");
    }

    #[test]
    fn test_cue_inside_previous_emission_is_dropped() {
        let content = "00:00:00.000 --> 00:00:01.000\none two three four\n\n00:00:01.000 --> 00:00:02.000\ntwo three\n\n00:00:02.000 --> 00:00:03.000\nfive six";
        let result = cleaner().clean_str(content);
        assert_eq!(result, "One two three four five six");
    }

    #[test]
    fn test_latin1_srt_is_decoded() {
        let srt = b"1\n00:00:01,000 --> 00:00:02,000\nca\xf1\xf3n\n";
        assert_eq!(cleaner().clean(srt, SubtitleFormat::Srt), "Cañón");
    }

    #[test]
    fn test_long_paragraph_breaks_at_sentence_end() {
        let settings = CleanerSettings {
            max_paragraph_words: 3,
            ..CleanerSettings::default()
        };
        let content = "00:00:00.000 --> 00:00:01.000\none two three four. five six\n";
        let result = Cleaner::new(settings).clean_str(content);
        assert_eq!(result, "One two three four.\n\nFive six");
    }

    #[test]
    fn test_whitespace_collapsed() {
        let content = "00:00:00.000 --> 00:00:01.000\n   lots    of\tspace   \n";
        assert_eq!(cleaner().clean_str(content), "Lots of space");
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(SubtitleFormat::detect(b"WEBVTT\n\n"), SubtitleFormat::Vtt);
        assert_eq!(SubtitleFormat::detect(b"\xef\xbb\xbfWEBVTT"), SubtitleFormat::Vtt);
        assert_eq!(SubtitleFormat::detect(b"1\n00:00:01,000"), SubtitleFormat::Srt);
        assert_eq!(
            SubtitleFormat::from_path(Path::new("video.en.SRT")),
            Some(SubtitleFormat::Srt)
        );
        assert_eq!(SubtitleFormat::from_path(Path::new("notes.txt")), None);
    }
}

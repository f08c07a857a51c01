//! Volume text layout.

use super::CleanedTranscript;
use std::fmt::Write;

const SEPARATOR: &str = "\n\n---\n[END OF TRANSCRIPT]\n---\n\n";

/// Make a channel name safe to use as a file name.
pub fn sanitize_filename(name: &str) -> String {
    let name = name
        .replace("..", "_")
        .replace(['/', '\\'], "⧸")
        .replace(':', "：")
        .replace('|', "｜")
        .replace('?', "？")
        .replace('"', "＂")
        .replace('<', "＜")
        .replace('>', "＞")
        .replace('*', "＊");

    let name: String = name.chars().filter(|c| !c.is_control()).collect();
    let name = name.trim();
    if name.is_empty() {
        "untitled".to_string()
    } else {
        name.to_string()
    }
}

/// File name of a channel's volume.
pub fn volume_file_name(channel: &str, index: u32) -> String {
    format!("{}_Vol{:02}.txt", sanitize_filename(channel), index)
}

/// Render a sealed volume. `first_number` is the channel-wide number of its
/// first transcript.
pub fn render_volume(
    channel: &str,
    index: u32,
    first_number: usize,
    transcripts: &[CleanedTranscript],
) -> String {
    let last_number = first_number + transcripts.len().saturating_sub(1);
    let mut out = String::new();

    // Writing to a String cannot fail.
    let _ = writeln!(out, "=== COLLECTION: {} ===", channel);
    let _ = writeln!(out, "=== VOLUME: {} ===", index);
    let _ = writeln!(
        out,
        "=== CONTENTS: transcripts {} to {} ===\n",
        first_number, last_number
    );

    for (i, transcript) in transcripts.iter().enumerate() {
        if i > 0 {
            out.push_str(SEPARATOR);
        }
        render_transcript(&mut out, transcript);
    }

    if !transcripts.is_empty() {
        let rule = "=".repeat(60);
        let _ = write!(out, "\n\n{}\n=== INDEX OF THIS VOLUME ===\n{}\n\n", rule, rule);
        for (i, transcript) in transcripts.iter().enumerate() {
            let _ = writeln!(out, "{}. {}", first_number + i, transcript.title);
        }
    }

    out
}

fn render_transcript(out: &mut String, transcript: &CleanedTranscript) {
    let _ = writeln!(out, "# {}", transcript.title);
    let _ = writeln!(out, "**Language:** {}", transcript.language_code);
    let _ = writeln!(out, "**Video:** {}", transcript.video_id);
    if let Some(date) = transcript.published_at {
        let _ = writeln!(out, "**Published:** {}", date.format("%Y-%m-%d"));
    }
    out.push_str("---\n\n");
    out.push_str(transcript.text.trim_end());
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn transcript(id: &str, title: &str) -> CleanedTranscript {
        CleanedTranscript {
            video_id: id.to_string(),
            language_code: "en".to_string(),
            title: title.to_string(),
            text: format!("Body of {}.", title),
            published_at: None,
        }
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("../etc/passwd"), "_⧸etc⧸passwd");
        assert_eq!(sanitize_filename("AC/DC: Live?"), "AC⧸DC： Live？");
        assert_eq!(sanitize_filename("  spaced  "), "spaced");
        assert_eq!(sanitize_filename(""), "untitled");
        assert_eq!(volume_file_name("My Channel", 3), "My Channel_Vol03.txt");
    }

    #[test]
    fn test_render_volume_layout() {
        let mut first = transcript("a1", "First talk");
        first.published_at = NaiveDate::from_ymd_opt(2024, 3, 9);
        let second = transcript("b2", "Second talk");

        let text = render_volume("Chan", 2, 101, &[first, second]);

        assert!(text.starts_with(
            "=== COLLECTION: Chan ===\n=== VOLUME: 2 ===\n=== CONTENTS: transcripts 101 to 102 ===\n\n# First talk\n"
        ));
        assert!(text.contains("**Published:** 2024-03-09\n---\n\nBody of First talk."));
        assert!(text.contains("Body of First talk.\n\n---\n[END OF TRANSCRIPT]\n---\n\n# Second talk"));
        assert!(text.contains("=== INDEX OF THIS VOLUME ==="));
        assert!(text.ends_with("101. First talk\n102. Second talk\n"));
        assert_eq!(text.matches("[END OF TRANSCRIPT]").count(), 1);
        assert_eq!(text.matches("**Published:**").count(), 1);
    }
}

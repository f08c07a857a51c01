//! Line-level text normalization.

use regex::Regex;
use std::sync::OnceLock;

/// Non-speech annotations that carry no content.
const NOISE_MARKERS: &[&str] = &[
    "[music]",
    "[applause]",
    "[laughter]",
    "[cheering]",
    "[silence]",
    "[inaudible]",
    "[crosstalk]",
    "[noise]",
    "[background noise]",
    "[foreign]",
    "[speaking foreign language]",
    "[no audio]",
    "[pause]",
    "[sighs]",
    "[coughs]",
    "[clears throat]",
    "[música]",
    "[aplausos]",
    "[risas]",
];

struct Patterns {
    inline_timestamp: Regex,
    tag: Regex,
    ass_override: Regex,
    cue_setting: Regex,
    whitespace: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        inline_timestamp: Regex::new(r"<\d{2}:\d{2}:\d{2}\.\d{3}>").expect("Invalid regex"),
        tag: Regex::new(r"<[^>]*>").expect("Invalid regex"),
        ass_override: Regex::new(r"\{\\[^}]*\}").expect("Invalid regex"),
        cue_setting: Regex::new(r"\b(?:align|position|line|size|vertical|region):\S+")
            .expect("Invalid regex"),
        whitespace: Regex::new(r"\s+").expect("Invalid regex"),
    })
}

/// Strip timing, styling and markup from one payload line.
pub fn strip_markup(line: &str) -> String {
    let p = patterns();

    let line = p.inline_timestamp.replace_all(line, "");
    let line = p.tag.replace_all(&line, "");
    let line = p.ass_override.replace_all(&line, "");
    let line = p.cue_setting.replace_all(&line, "");

    let decoded = line
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
        .replace(">>", " ");

    p.whitespace.replace_all(&decoded, " ").trim().to_string()
}

/// True when a line holds only non-speech markers.
pub fn is_noise(line: &str) -> bool {
    let mut rest = line.to_lowercase();
    for marker in NOISE_MARKERS {
        rest = rest.replace(marker, "");
    }
    rest.chars().all(|c| c.is_whitespace() || c == '♪' || c == '♫')
}

/// Comparison key for overlap detection: lowercase, surrounding punctuation removed.
pub fn normalize_word(word: &str) -> String {
    word.trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase()
}

/// Whether a word closes a sentence.
pub fn ends_sentence(word: &str) -> bool {
    word.trim_end_matches(['"', '\'', ')', '»'])
        .ends_with(['.', '?', '!'])
}

/// Capitalize the first letter of the text and of every sentence.
pub fn capitalize_sentences(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut capitalize_next = true;
    let mut after_terminator = false;

    for c in text.chars() {
        if capitalize_next && c.is_alphabetic() {
            out.extend(c.to_uppercase());
            capitalize_next = false;
            after_terminator = false;
            continue;
        }

        if after_terminator {
            // "3.5" or "example.com" are not sentence ends.
            if c.is_whitespace() {
                capitalize_next = true;
            }
            after_terminator = false;
        }

        if matches!(c, '.' | '?' | '!') {
            after_terminator = true;
        }

        out.push(c);
    }

    out
}

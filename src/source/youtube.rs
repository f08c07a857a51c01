//! yt-dlp backed subtitle source.

use super::{RawSubtitle, SubtitleSource, TrackInfo, TrackKind, VideoListing, VideoRef};
use crate::cleaner::SubtitleFormat;
use crate::error::{Result, YtragError};
use crate::selection::base_language;
use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;
use tracing::{debug, instrument};
use url::Url;

const ACCEPTED_HOSTS: &[&str] = &[
    "youtube.com",
    "www.youtube.com",
    "m.youtube.com",
    "music.youtube.com",
    "youtu.be",
];

fn video_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-zA-Z0-9_-]{11}$").expect("Invalid regex"))
}

/// Accept a YouTube URL or a bare video ID and return a canonical URL.
pub fn normalize_source_url(input: &str) -> Result<String> {
    let input = input.trim();

    if video_id_regex().is_match(input) {
        return Ok(watch_url(input));
    }

    let url = Url::parse(input)
        .map_err(|e| YtragError::InvalidInput(format!("Not a URL ({}): {}", e, input)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(YtragError::InvalidInput(format!(
            "Unsupported URL scheme: {}",
            url.scheme()
        )));
    }

    let host = url.host_str().unwrap_or_default().to_lowercase();
    if !ACCEPTED_HOSTS.contains(&host.as_str()) {
        return Err(YtragError::InvalidInput(format!(
            "Not a YouTube URL: {}",
            input
        )));
    }

    Ok(url.to_string())
}

fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", video_id)
}

/// Subtitle source that shells out to yt-dlp for metadata and fetches payloads over HTTP.
pub struct YtDlpSource {
    program: String,
    http: reqwest::Client,
}

impl YtDlpSource {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            http: reqwest::Client::new(),
        }
    }

    /// Run yt-dlp with the given arguments and parse stdout as a single JSON document.
    async fn run_json(&self, args: &[&str], subject: &str) -> Result<Value> {
        let output = tokio::process::Command::new(&self.program)
            .args(args)
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    YtragError::ToolNotFound(self.program.clone())
                } else {
                    YtragError::Source(format!("Failed to run {}: {}", self.program, e))
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_failure(subject, &stderr));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        serde_json::from_str(&stdout).map_err(|e| {
            YtragError::Malformed(format!("Failed to parse yt-dlp output for {}: {}", subject, e))
        })
    }
}

impl Default for YtDlpSource {
    fn default() -> Self {
        Self::new("yt-dlp")
    }
}

#[async_trait]
impl SubtitleSource for YtDlpSource {
    #[instrument(skip(self))]
    async fn list_videos(&self, source_url: &str) -> Result<VideoListing> {
        let url = normalize_source_url(source_url)?;
        let json = self
            .run_json(
                &[
                    "--dump-single-json",
                    "--flat-playlist",
                    "--no-warnings",
                    &url,
                ],
                &url,
            )
            .await
            .map_err(|e| match e {
                // A listing that cannot be resolved leaves nothing to do.
                YtragError::VideoUnavailable(msg) | YtragError::Malformed(msg) => {
                    YtragError::Source(msg)
                }
                other => other,
            })?;

        let listing = parse_listing(&json)?;
        debug!(
            "Listed {} videos for channel {}",
            listing.videos.len(),
            listing.channel
        );
        Ok(listing)
    }

    #[instrument(skip(self))]
    async fn list_tracks(&self, video_id: &str) -> Result<Vec<TrackInfo>> {
        let url = watch_url(video_id);
        let json = self
            .run_json(
                &["--dump-json", "--skip-download", "--no-warnings", &url],
                video_id,
            )
            .await?;

        Ok(parse_tracks(&json))
    }

    #[instrument(skip(self, track), fields(lang = %track.language_code, kind = %track.kind))]
    async fn fetch_track(&self, video_id: &str, track: &TrackInfo) -> Result<RawSubtitle> {
        let url = track.url.as_deref().ok_or_else(|| {
            YtragError::Malformed(format!(
                "Track {} of {} has no download URL",
                track.language_code, video_id
            ))
        })?;

        let response = self.http.get(url).send().await?;
        let status = response.status();

        if status.as_u16() == 429 {
            return Err(YtragError::RateLimited(format!(
                "HTTP 429 fetching subtitles for {}",
                video_id
            )));
        }
        if status.is_server_error() {
            return Err(YtragError::Transient(format!(
                "HTTP {} fetching subtitles for {}",
                status, video_id
            )));
        }
        if !status.is_success() {
            return Err(YtragError::VideoUnavailable(format!(
                "HTTP {} fetching subtitles for {}",
                status, video_id
            )));
        }

        let bytes = response.bytes().await?;
        Ok(RawSubtitle {
            bytes: bytes.to_vec(),
            format: track.format,
        })
    }
}

/// Map yt-dlp stderr to the error taxonomy.
fn classify_failure(subject: &str, stderr: &str) -> YtragError {
    let message = format!("{}: {}", subject, stderr.trim());
    let lower = stderr.to_lowercase();

    if lower.contains("429") || lower.contains("too many requests") {
        YtragError::RateLimited(message)
    } else if lower.contains("timed out")
        || lower.contains("connection reset")
        || lower.contains("temporary failure")
        || lower.contains("remote end closed")
    {
        YtragError::Transient(message)
    } else if lower.contains("private video")
        || lower.contains("video unavailable")
        || lower.contains("members-only")
        || lower.contains("confirm your age")
        || lower.contains("has been removed")
    {
        YtragError::VideoUnavailable(message)
    } else if lower.contains("sign in") || lower.contains("login required") {
        YtragError::Auth(message)
    } else {
        YtragError::Source(message)
    }
}

fn parse_listing(json: &Value) -> Result<VideoListing> {
    let channel = ["channel", "uploader", "playlist_title", "title"]
        .iter()
        .find_map(|key| json[*key].as_str())
        .unwrap_or("Unknown Channel")
        .to_string();

    let mut videos = Vec::new();
    if json.get("entries").is_some() {
        collect_entries(json, &mut videos);
    } else if let Some(video) = parse_entry(json) {
        videos.push(video);
    } else {
        return Err(YtragError::Source(
            "Listing contained neither entries nor a video".to_string(),
        ));
    }

    Ok(VideoListing { channel, videos })
}

/// Flatten nested playlists (channel tabs) into a single ordered list.
fn collect_entries(json: &Value, out: &mut Vec<VideoRef>) {
    let Some(entries) = json["entries"].as_array() else {
        return;
    };

    for entry in entries {
        if entry.get("entries").is_some() {
            collect_entries(entry, out);
        } else if let Some(video) = parse_entry(entry) {
            if !out.iter().any(|v| v.id == video.id) {
                out.push(video);
            }
        }
    }
}

fn parse_entry(entry: &Value) -> Option<VideoRef> {
    let id = entry["id"].as_str()?;
    if !video_id_regex().is_match(id) {
        return None;
    }

    let title = entry["title"].as_str().unwrap_or("Unknown Title");
    let mut video = VideoRef::new(id, title);

    video.published_at = entry["upload_date"]
        .as_str()
        .and_then(|d| chrono::NaiveDate::parse_from_str(d, "%Y%m%d").ok())
        .or_else(|| {
            entry["timestamp"]
                .as_i64()
                .and_then(|ts| chrono::DateTime::from_timestamp(ts, 0))
                .map(|dt| dt.date_naive())
        });

    Some(video)
}

fn parse_tracks(json: &Value) -> Vec<TrackInfo> {
    let mut tracks = Vec::new();

    if let Some(subs) = json["subtitles"].as_object() {
        for (lang, formats) in subs {
            if lang == "live_chat" {
                continue;
            }
            if let Some((format, url)) = pick_format(formats) {
                tracks.push(TrackInfo {
                    language_code: lang.clone(),
                    kind: TrackKind::Manual,
                    format,
                    url: Some(url),
                });
            }
        }
    }

    let Some(autos) = json["automatic_captions"].as_object() else {
        return tracks;
    };

    // The spoken language: declared, or implied by an "-orig" caption track.
    let spoken = json["language"]
        .as_str()
        .map(base_language)
        .or_else(|| {
            autos
                .keys()
                .find(|k| k.ends_with("-orig"))
                .map(|k| base_language(k.trim_end_matches("-orig")))
        });

    for (lang, formats) in autos {
        let Some((format, url)) = pick_format(formats) else {
            continue;
        };

        let (code, kind) = if let Some(stripped) = lang.strip_suffix("-orig") {
            (stripped.to_string(), TrackKind::AutoGenerated)
        } else if let Some(spoken) = spoken.as_deref() {
            if spoken == base_language(lang) {
                (lang.clone(), TrackKind::AutoGenerated)
            } else {
                (lang.clone(), TrackKind::AutoTranslated)
            }
        } else if is_translation_url(&url) {
            (lang.clone(), TrackKind::AutoTranslated)
        } else {
            // Spoken language unknown and no sign of machine translation.
            (lang.clone(), TrackKind::AutoGenerated)
        };

        let duplicate = tracks
            .iter()
            .any(|t| t.kind == kind && t.language_code == code);
        if !duplicate {
            tracks.push(TrackInfo {
                language_code: code,
                kind,
                format,
                url: Some(url),
            });
        }
    }

    tracks
}

/// Machine translations carry a `tlang` query parameter on the timedtext URL.
fn is_translation_url(url: &str) -> bool {
    Url::parse(url)
        .map(|u| u.query_pairs().any(|(k, _)| k == "tlang"))
        .unwrap_or(false)
}

/// Prefer WebVTT, fall back to SRT.
fn pick_format(formats: &Value) -> Option<(SubtitleFormat, String)> {
    let formats = formats.as_array()?;
    let find = |ext: &str| {
        formats.iter().find_map(|f| {
            if f["ext"].as_str() == Some(ext) {
                f["url"].as_str().map(|u| u.to_string())
            } else {
                None
            }
        })
    };

    find("vtt")
        .map(|u| (SubtitleFormat::Vtt, u))
        .or_else(|| find("srt").map(|u| (SubtitleFormat::Srt, u)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_source_url() {
        assert_eq!(
            normalize_source_url("dQw4w9WgXcQ").unwrap(),
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
        );
        assert!(normalize_source_url("https://www.youtube.com/@somechannel/videos").is_ok());
        assert!(normalize_source_url("https://youtu.be/dQw4w9WgXcQ").is_ok());
        assert!(normalize_source_url("https://vimeo.com/12345").is_err());
        assert!(normalize_source_url("ftp://youtube.com/watch?v=dQw4w9WgXcQ").is_err());
        assert!(normalize_source_url("not a url").is_err());
    }

    #[test]
    fn test_classify_failure() {
        assert!(matches!(
            classify_failure("x", "ERROR: HTTP Error 429: Too Many Requests"),
            YtragError::RateLimited(_)
        ));
        assert!(matches!(
            classify_failure("x", "ERROR: [youtube] x: Private video"),
            YtragError::VideoUnavailable(_)
        ));
        assert!(matches!(
            classify_failure("x", "ERROR: Sign in to confirm you're not a bot"),
            YtragError::Auth(_)
        ));
        assert!(matches!(
            classify_failure("x", "ERROR: Read timed out"),
            YtragError::Transient(_)
        ));
    }

    #[test]
    fn test_parse_listing_flattens_tabs() {
        let json = json!({
            "channel": "Test Channel",
            "entries": [
                {"title": "Videos", "entries": [
                    {"id": "aaaaaaaaaaa", "title": "First", "upload_date": "20240102"},
                    {"id": "bbbbbbbbbbb", "title": "Second"}
                ]},
                {"title": "Shorts", "entries": [
                    {"id": "aaaaaaaaaaa", "title": "First"}
                ]}
            ]
        });

        let listing = parse_listing(&json).unwrap();
        assert_eq!(listing.channel, "Test Channel");
        assert_eq!(listing.videos.len(), 2);
        assert_eq!(
            listing.videos[0].published_at,
            chrono::NaiveDate::from_ymd_opt(2024, 1, 2)
        );
        assert_eq!(listing.videos[1].published_at, None);
    }

    #[test]
    fn test_parse_listing_single_video() {
        let json = json!({"id": "ccccccccccc", "title": "Solo", "uploader": "Someone"});
        let listing = parse_listing(&json).unwrap();
        assert_eq!(listing.channel, "Someone");
        assert_eq!(listing.videos, vec![VideoRef::new("ccccccccccc", "Solo")]);
    }

    #[test]
    fn test_parse_tracks_classifies_kinds() {
        let json = json!({
            "language": "en",
            "subtitles": {
                "en-US": [{"ext": "srt", "url": "http://s/en-US.srt"}, {"ext": "vtt", "url": "http://s/en-US.vtt"}],
                "live_chat": [{"ext": "json", "url": "http://s/chat"}]
            },
            "automatic_captions": {
                "en-orig": [{"ext": "vtt", "url": "http://a/en-orig"}],
                "en": [{"ext": "vtt", "url": "http://a/en"}],
                "es": [{"ext": "vtt", "url": "http://a/es"}],
                "fr": [{"ext": "json3", "url": "http://a/fr"}]
            }
        });

        let tracks = parse_tracks(&json);
        let manual: Vec<_> = tracks.iter().filter(|t| t.kind == TrackKind::Manual).collect();
        assert_eq!(manual.len(), 1);
        assert_eq!(manual[0].format, SubtitleFormat::Vtt);
        assert_eq!(manual[0].url.as_deref(), Some("http://s/en-US.vtt"));

        let generated: Vec<_> = tracks
            .iter()
            .filter(|t| t.kind == TrackKind::AutoGenerated)
            .collect();
        assert_eq!(generated.len(), 1);
        assert_eq!(generated[0].language_code, "en");

        assert!(tracks
            .iter()
            .any(|t| t.language_code == "es" && t.kind == TrackKind::AutoTranslated));
        assert!(!tracks.iter().any(|t| t.language_code == "fr"));
    }

    #[test]
    fn test_parse_tracks_without_spoken_language() {
        let json = json!({
            "language": null,
            "automatic_captions": {
                "en": [{"ext": "vtt", "url": "https://www.youtube.com/api/timedtext?v=x&lang=en&fmt=vtt"}],
                "es": [{"ext": "vtt", "url": "https://www.youtube.com/api/timedtext?v=x&lang=en&tlang=es&fmt=vtt"}]
            }
        });

        let tracks = parse_tracks(&json);
        let kind_of = |code: &str| {
            tracks
                .iter()
                .find(|t| t.language_code == code)
                .map(|t| t.kind)
        };
        assert_eq!(kind_of("en"), Some(TrackKind::AutoGenerated));
        assert_eq!(kind_of("es"), Some(TrackKind::AutoTranslated));

        let chosen = crate::selection::TrackSelector::choose(&tracks, &[] as &[&str]).unwrap();
        assert_eq!(chosen.language_code, "en");
    }
}

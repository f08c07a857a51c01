//! Subtitle track selection.
//!
//! Picks at most one track per video. Within a language family ("en",
//! "en-US", "en-GB") the best kind wins (manual, then auto-generated, then
//! auto-translated), and among tracks of that kind the bare code is preferred
//! over regional variants. Auto-translated tracks are a last resort: they are
//! only considered when no requested language has an original track at all.
//! Selection is pure, so re-runs make the same choice for the same input.

use crate::source::{TrackInfo, TrackKind};

/// Strip the regional suffix and normalize case: "en-US" -> "en", "pt_BR" -> "pt".
pub fn base_language(code: &str) -> String {
    code.split(['-', '_'])
        .next()
        .unwrap_or(code)
        .trim()
        .to_lowercase()
}

fn is_bare(code: &str) -> bool {
    !code.contains(['-', '_'])
}

/// Track selection policy.
pub struct TrackSelector;

impl TrackSelector {
    /// Pick the best track for the first requested language that has one.
    pub fn select<'a, S: AsRef<str>>(
        tracks: &'a [TrackInfo],
        preferred_langs: &[S],
    ) -> Option<&'a TrackInfo> {
        let walk = |allow_translated: bool| {
            preferred_langs.iter().find_map(|lang| {
                Self::best_for_language(tracks, &base_language(lang.as_ref()), allow_translated)
            })
        };

        walk(false).or_else(|| walk(true))
    }

    /// Pick a track in the spoken language, detected from the available tracks.
    ///
    /// Speech recognition runs in the spoken language, so the first
    /// auto-generated track names it; without one, the first manual track does.
    pub fn select_auto(tracks: &[TrackInfo]) -> Option<&TrackInfo> {
        let detected = tracks
            .iter()
            .find(|t| t.kind == TrackKind::AutoGenerated)
            .or_else(|| tracks.iter().find(|t| t.kind == TrackKind::Manual))?;

        Self::best_for_language(tracks, &base_language(&detected.language_code), false)
    }

    /// Select using the preference list, or auto-detection when it is empty.
    pub fn choose<'a, S: AsRef<str>>(
        tracks: &'a [TrackInfo],
        preferred_langs: &[S],
    ) -> Option<&'a TrackInfo> {
        if preferred_langs.is_empty() {
            Self::select_auto(tracks)
        } else {
            Self::select(tracks, preferred_langs)
        }
    }

    /// The single surviving representative of one language family.
    fn best_for_language<'a>(
        tracks: &'a [TrackInfo],
        base: &str,
        allow_translated: bool,
    ) -> Option<&'a TrackInfo> {
        let family: Vec<&TrackInfo> = tracks
            .iter()
            .filter(|t| allow_translated || t.kind != TrackKind::AutoTranslated)
            .filter(|t| base_language(&t.language_code) == base)
            .collect();

        let best_rank = family.iter().map(|t| t.kind.rank()).min()?;
        let mut candidates = family.into_iter().filter(|t| t.kind.rank() == best_rank);

        let first = candidates.next()?;
        if is_bare(&first.language_code) {
            return Some(first);
        }
        Some(
            candidates
                .find(|t| is_bare(&t.language_code))
                .unwrap_or(first),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(code: &str, kind: TrackKind) -> TrackInfo {
        TrackInfo::new(code, kind)
    }

    #[test]
    fn test_base_language() {
        assert_eq!(base_language("en-US"), "en");
        assert_eq!(base_language("EN"), "en");
        assert_eq!(base_language("pt_BR"), "pt");
        assert_eq!(base_language("zh-Hans"), "zh");
    }

    #[test]
    fn test_manual_beats_auto_in_family() {
        let tracks = vec![
            track("en-US", TrackKind::Manual),
            track("en", TrackKind::AutoGenerated),
            track("es", TrackKind::Manual),
        ];

        let selected = TrackSelector::select(&tracks, &["en", "es"]).unwrap();
        assert_eq!(selected, &track("en-US", TrackKind::Manual));
    }

    #[test]
    fn test_bare_code_preferred_over_regional() {
        let tracks = vec![
            track("en-GB", TrackKind::Manual),
            track("en", TrackKind::Manual),
            track("en-US", TrackKind::Manual),
        ];

        let selected = TrackSelector::select(&tracks, &["en"]).unwrap();
        assert_eq!(selected.language_code, "en");
    }

    #[test]
    fn test_regional_tie_break_is_first_encountered() {
        let tracks = vec![
            track("en-US", TrackKind::AutoGenerated),
            track("en-GB", TrackKind::AutoGenerated),
        ];

        for _ in 0..10 {
            let selected = TrackSelector::select(&tracks, &["en"]).unwrap();
            assert_eq!(selected.language_code, "en-US");
        }

        let reversed: Vec<_> = tracks.iter().rev().cloned().collect();
        let selected = TrackSelector::select(&reversed, &["en"]).unwrap();
        assert_eq!(selected.language_code, "en-GB");
    }

    #[test]
    fn test_original_captions_beat_translation_in_preferred_language() {
        let tracks = vec![
            track("es", TrackKind::AutoTranslated),
            track("en", TrackKind::AutoGenerated),
        ];

        let selected = TrackSelector::select(&tracks, &["es", "en"]).unwrap();
        assert_eq!(selected, &track("en", TrackKind::AutoGenerated));
    }

    #[test]
    fn test_translation_is_last_resort() {
        let tracks = vec![
            track("fr", TrackKind::Manual),
            track("es", TrackKind::AutoTranslated),
        ];

        let selected = TrackSelector::select(&tracks, &["es", "en"]).unwrap();
        assert_eq!(selected, &track("es", TrackKind::AutoTranslated));

        let with_original = vec![
            track("es", TrackKind::AutoTranslated),
            track("es", TrackKind::AutoGenerated),
        ];
        let selected = TrackSelector::select(&with_original, &["es"]).unwrap();
        assert_eq!(selected.kind, TrackKind::AutoGenerated);
    }

    #[test]
    fn test_preference_order_is_respected() {
        let tracks = vec![
            track("en", TrackKind::Manual),
            track("es", TrackKind::AutoGenerated),
        ];

        let selected = TrackSelector::select(&tracks, &["es", "en"]).unwrap();
        assert_eq!(selected.language_code, "es");

        let selected = TrackSelector::select(&tracks, &["en-US", "es"]).unwrap();
        assert_eq!(selected.language_code, "en");
    }

    #[test]
    fn test_no_match_returns_none() {
        let tracks = vec![track("fr", TrackKind::Manual)];
        assert!(TrackSelector::select(&tracks, &["en", "es"]).is_none());
        assert!(TrackSelector::select::<&str>(&[], &["en"]).is_none());
    }

    #[test]
    fn test_select_auto_uses_spoken_language() {
        let tracks = vec![
            track("de", TrackKind::Manual),
            track("fr", TrackKind::AutoTranslated),
            track("es", TrackKind::AutoGenerated),
            track("es-419", TrackKind::Manual),
        ];

        let selected = TrackSelector::select_auto(&tracks).unwrap();
        assert_eq!(selected, &track("es-419", TrackKind::Manual));
    }

    #[test]
    fn test_select_auto_ignores_translations_only() {
        let tracks = vec![track("fr", TrackKind::AutoTranslated)];
        assert!(TrackSelector::select_auto(&tracks).is_none());
        assert!(TrackSelector::choose::<String>(&tracks, &[]).is_none());
    }
}

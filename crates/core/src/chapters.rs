//! Chapter list compilation for the video description.
//!
//! Hosting platforms only accept chapter metadata that starts at `0:00`, has
//! at least [`DEFAULT_MIN_CHAPTER_COUNT`] entries and keeps a minimum gap
//! between entries. A list that cannot satisfy those rules is returned
//! empty, which callers treat as "no chapters".

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::game::GameRecord;
use crate::policy::PolicyKind;
use crate::timeline::{EventKind, Timeline};
use crate::types::{frame_to_seconds, Ply};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const DEFAULT_MIN_CHAPTER_SPACING_SECS: u64 = 15;
pub const DEFAULT_MIN_CHAPTER_COUNT: usize = 3;
pub const DEFAULT_TITLE_MAX_CHARS: usize = 60;

/// Shortest title budget that still leaves room for a move prefix.
pub const MIN_TITLE_MAX_CHARS: usize = 8;

/// Phase cut points as a percentage of the move count.
const MIDDLEGAME_PERCENT: usize = 33;
const ENDGAME_PERCENT: usize = 75;

const ELLIPSIS: char = '…';

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterRules {
    pub min_spacing_secs: u64,
    pub min_count: usize,
    pub title_max_chars: usize,
}

impl Default for ChapterRules {
    fn default() -> Self {
        Self {
            min_spacing_secs: DEFAULT_MIN_CHAPTER_SPACING_SECS,
            min_count: DEFAULT_MIN_CHAPTER_COUNT,
            title_max_chars: DEFAULT_TITLE_MAX_CHARS,
        }
    }
}

impl ChapterRules {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.min_spacing_secs == 0 {
            return Err(CoreError::Validation(
                "chapter spacing must be > 0 seconds".to_string(),
            ));
        }
        if self.min_count == 0 {
            return Err(CoreError::Validation(
                "minimum chapter count must be > 0".to_string(),
            ));
        }
        if self.title_max_chars < MIN_TITLE_MAX_CHARS {
            return Err(CoreError::Validation(format!(
                "chapter title budget must be at least {MIN_TITLE_MAX_CHARS} characters"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    pub start_seconds: u64,
    pub timestamp: String,
    pub title: String,
}

impl Chapter {
    fn new(start_seconds: u64, title: String) -> Self {
        Self {
            start_seconds,
            timestamp: format_timestamp(start_seconds),
            title,
        }
    }
}

/// A potential chapter boundary before spacing is applied.
#[derive(Debug, Clone)]
struct Candidate {
    seconds: u64,
    title: String,
}

// ---------------------------------------------------------------------------
// Formatting
// ---------------------------------------------------------------------------

/// `M:SS` below one hour, `H:MM:SS` from one hour up.
pub fn format_timestamp(total_seconds: u64) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes}:{seconds:02}")
    }
}

/// Collapse whitespace and cut to `max_chars`, ending with an ellipsis when
/// anything was dropped.
pub fn truncate_title(text: &str, max_chars: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= max_chars {
        return collapsed;
    }
    let kept: String = collapsed.chars().take(max_chars.saturating_sub(1)).collect();
    let mut title = kept.trim_end().to_string();
    title.push(ELLIPSIS);
    title
}

fn prefixed(game: &GameRecord, ply: Ply, text: &str) -> String {
    match game.move_into(ply) {
        Some(mv) => format!("{}: {text}", mv.numbered()),
        None => text.to_string(),
    }
}

/// One `TIMESTAMP Title` line per chapter.
pub fn description_block(chapters: &[Chapter]) -> String {
    chapters
        .iter()
        .map(|c| format!("{} {}", c.timestamp, c.title))
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// Candidates
// ---------------------------------------------------------------------------

fn annotation_candidates(timeline: &Timeline, game: &GameRecord) -> Vec<Candidate> {
    timeline
        .segments_of(EventKind::AnnotatedMove)
        .map(|s| Candidate {
            seconds: frame_to_seconds(s.start_frame, timeline.fps()),
            title: prefixed(game, s.ply, s.annotation.as_deref().unwrap_or_default()),
        })
        .collect()
}

fn phase_candidates(timeline: &Timeline, game: &GameRecord) -> Vec<Candidate> {
    let n = game.ply_count();
    if n == 0 {
        return Vec::new();
    }
    let cuts = [
        (1, "Opening"),
        ((n * MIDDLEGAME_PERCENT).div_ceil(100).max(1), "Middlegame"),
        ((n * ENDGAME_PERCENT).div_ceil(100).max(1), "Endgame"),
    ];
    cuts.into_iter()
        .filter_map(|(cut, label)| {
            let segment = timeline
                .segments()
                .iter()
                .find(|s| s.kind != EventKind::Intro && s.ply >= cut)?;
            Some(Candidate {
                seconds: frame_to_seconds(segment.start_frame, timeline.fps()),
                title: prefixed(game, segment.ply, label),
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Compilation
// ---------------------------------------------------------------------------

/// Reduce `timeline` to a platform-valid chapter list.
///
/// Annotated videos chapter on their annotations; every other variant
/// chapters on opening / middlegame / endgame boundaries. The first kept
/// chapter is moved to `0:00`.
pub fn compile_chapters(
    timeline: &Timeline,
    game: &GameRecord,
    rules: &ChapterRules,
) -> Vec<Chapter> {
    let candidates = match timeline.policy() {
        PolicyKind::Annotated => annotation_candidates(timeline, game),
        _ => phase_candidates(timeline, game),
    };

    let mut kept: Vec<Chapter> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let start_seconds = match kept.last() {
            None => 0,
            Some(last) if candidate.seconds >= last.start_seconds + rules.min_spacing_secs => {
                candidate.seconds
            }
            Some(_) => continue,
        };
        let title = truncate_title(&candidate.title, rules.title_max_chars);
        kept.push(Chapter::new(start_seconds, title));
    }

    if kept.len() < rules.min_count {
        tracing::debug!(
            policy = %timeline.policy(),
            kept = kept.len(),
            min_count = rules.min_count,
            "Too few chapters after spacing -- omitting chapter list",
        );
        return Vec::new();
    }
    kept
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::TimelinePolicy;

    const KNIGHT_SHUFFLE: [&str; 4] = ["Nf3", "Nf6", "Ng1", "Ng8"];

    fn shuffle_game(plies: usize) -> GameRecord {
        GameRecord::from_sans((0..plies).map(|i| KNIGHT_SHUFFLE[i % 4]))
    }

    fn chapters_for(game: &GameRecord, kind: PolicyKind) -> Vec<Chapter> {
        let policy = TimelinePolicy::for_kind(kind);
        let timeline = Timeline::build(game, &[], &policy, 30);
        compile_chapters(&timeline, game, &policy.chapters)
    }

    // -- format_timestamp --

    #[test]
    fn timestamps_below_and_above_one_hour() {
        assert_eq!(format_timestamp(0), "0:00");
        assert_eq!(format_timestamp(75), "1:15");
        assert_eq!(format_timestamp(3599), "59:59");
        assert_eq!(format_timestamp(3600), "1:00:00");
        assert_eq!(format_timestamp(3725), "1:02:05");
    }

    // -- truncate_title --

    #[test]
    fn short_titles_are_untouched() {
        assert_eq!(truncate_title("Sharp  line\n here", 60), "Sharp line here");
    }

    #[test]
    fn long_titles_end_with_ellipsis() {
        let title = truncate_title("abcdefghijkl", 10);
        assert_eq!(title, "abcdefghi…");
        assert_eq!(title.chars().count(), 10);
    }

    // -- compile_chapters --

    #[test]
    fn annotated_chapters_respect_spacing() {
        // ply 0 at 3s, ply 10 at 17s, ply 20 at 31s (too close), ply 30 at 45s
        let game = shuffle_game(40)
            .with_annotation(0, "Setting up")
            .with_annotation(10, "Knights return")
            .with_annotation(20, "Again")
            .with_annotation(30, "Draw by repetition looms");
        let chapters = chapters_for(&game, PolicyKind::Annotated);
        let stamps: Vec<&str> = chapters.iter().map(|c| c.timestamp.as_str()).collect();
        assert_eq!(stamps, ["0:00", "0:17", "0:45"]);
        assert_eq!(chapters[0].title, "Setting up");
        assert_eq!(chapters[1].title, "5... Nf6: Knights return");
    }

    #[test]
    fn walkthrough_chapters_follow_game_phases() {
        let chapters = chapters_for(&shuffle_game(60), PolicyKind::Walkthrough);
        let stamps: Vec<&str> = chapters.iter().map(|c| c.timestamp.as_str()).collect();
        assert_eq!(stamps, ["0:00", "0:22", "0:47"]);
        assert_eq!(chapters[0].title, "1. Nf3: Opening");
        assert_eq!(chapters[1].title, "10... Ng8: Middlegame");
        assert_eq!(chapters[2].title, "23. Nf3: Endgame");
    }

    #[test]
    fn short_game_has_no_chapters() {
        assert!(chapters_for(&shuffle_game(8), PolicyKind::Walkthrough).is_empty());
        assert!(chapters_for(&GameRecord::default(), PolicyKind::Highlights).is_empty());
    }

    #[test]
    fn too_few_annotations_yield_no_chapters() {
        let game = shuffle_game(40).with_annotation(5, "Only one");
        assert!(chapters_for(&game, PolicyKind::Annotated).is_empty());
    }

    #[test]
    fn first_chapter_is_forced_to_zero() {
        let game = shuffle_game(60)
            .with_annotation(20, "a")
            .with_annotation(40, "b")
            .with_annotation(59, "c");
        let chapters = chapters_for(&game, PolicyKind::Annotated);
        assert_eq!(chapters.len(), 3);
        assert_eq!(chapters[0].start_seconds, 0);
        assert_eq!(chapters[0].timestamp, "0:00");
    }

    #[test]
    fn description_block_lines() {
        let chapters = vec![
            Chapter::new(0, "Opening".into()),
            Chapter::new(95, "Middlegame".into()),
        ];
        assert_eq!(description_block(&chapters), "0:00 Opening\n1:35 Middlegame");
    }

    // -- ChapterRules --

    #[test]
    fn rules_validation() {
        assert!(ChapterRules::default().validate().is_ok());
        let rules = ChapterRules {
            min_spacing_secs: 0,
            ..ChapterRules::default()
        };
        assert!(rules.validate().is_err());
        let rules = ChapterRules {
            title_max_chars: 3,
            ..ChapterRules::default()
        };
        assert!(rules.validate().is_err());
    }
}

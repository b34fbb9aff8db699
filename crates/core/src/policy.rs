//! Timeline policies: the per-variant timing constants.
//!
//! The four presentation variants share one builder and one resolver; they
//! differ only in the [`TimelinePolicy`] value passed in. All durations are
//! milliseconds and are turned into frames exclusively through
//! [`TimelinePolicy::event_frames`], which the builder and the duration
//! calculator both call.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::chapters::ChapterRules;
use crate::critical::DetectorConfig;
use crate::error::CoreError;
use crate::timeline::EventKind;
use crate::types::{millis_to_frames, FrameIndex, Millis};

// ---------------------------------------------------------------------------
// Frame rate
// ---------------------------------------------------------------------------

pub const DEFAULT_FPS: u32 = 30;
pub const MIN_FPS: u32 = 1;
pub const MAX_FPS: u32 = 120;

// ---------------------------------------------------------------------------
// Bookend segments
// ---------------------------------------------------------------------------

pub const INTRO_MS: Millis = 3_000;
pub const OUTRO_MS: Millis = 3_000;
/// Result announcement shown before the outro by highlights and puzzle videos.
pub const RESULT_ANNOUNCEMENT_MS: Millis = 4_000;

// ---------------------------------------------------------------------------
// Per-move timing
// ---------------------------------------------------------------------------

pub const MOVE_MS: Millis = 1_000;
/// Highlights videos move quickly between critical moments.
pub const HIGHLIGHTS_MOVE_MS: Millis = 500;
pub const ANNOTATION_PAUSE_MS: Millis = 4_000;
pub const CRITICAL_MOMENT_MS: Millis = 5_000;

// ---------------------------------------------------------------------------
// Puzzle phases
// ---------------------------------------------------------------------------

pub const PUZZLE_PAUSE_MS: Millis = 1_000;
pub const PUZZLE_QUESTION_MS: Millis = 1_000;
pub const PUZZLE_THINKING_MS: Millis = 4_000;
pub const PUZZLE_REVEAL_MS: Millis = 2_000;
pub const MAX_PUZZLE_PROMPTS: usize = 4;

// ---------------------------------------------------------------------------
// Overlay envelope
// ---------------------------------------------------------------------------

pub const OVERLAY_FADE_MS: Millis = 300;

// ---------------------------------------------------------------------------
// Limits
// ---------------------------------------------------------------------------

/// Upper bound for any single overridden duration (one hour).
pub const MAX_DURATION_MS: Millis = 3_600_000;

// ---------------------------------------------------------------------------
// Fallback durations (used when movetext cannot be parsed)
// ---------------------------------------------------------------------------

pub const WALKTHROUGH_FALLBACK_MS: Millis = 60_000;
pub const ANNOTATED_FALLBACK_MS: Millis = 90_000;
pub const HIGHLIGHTS_FALLBACK_MS: Millis = 75_000;
pub const PUZZLE_FALLBACK_MS: Millis = 90_000;

// ---------------------------------------------------------------------------
// Policy kind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    Walkthrough,
    Annotated,
    Highlights,
    Puzzle,
}

impl PolicyKind {
    pub const ALL: [PolicyKind; 4] = [
        PolicyKind::Walkthrough,
        PolicyKind::Annotated,
        PolicyKind::Highlights,
        PolicyKind::Puzzle,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Walkthrough => "walkthrough",
            Self::Annotated => "annotated",
            Self::Highlights => "highlights",
            Self::Puzzle => "puzzle",
        }
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PolicyKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s.trim())
            .ok_or_else(|| {
                CoreError::Validation(format!(
                    "Unknown policy '{s}'. Valid: walkthrough, annotated, highlights, puzzle"
                ))
            })
    }
}

// ---------------------------------------------------------------------------
// Policy value object
// ---------------------------------------------------------------------------

/// Durations of the four puzzle sub-phases, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PuzzlePhases {
    pub pause_ms: Millis,
    pub question_ms: Millis,
    pub thinking_ms: Millis,
    pub reveal_ms: Millis,
}

impl Default for PuzzlePhases {
    fn default() -> Self {
        Self {
            pause_ms: PUZZLE_PAUSE_MS,
            question_ms: PUZZLE_QUESTION_MS,
            thinking_ms: PUZZLE_THINKING_MS,
            reveal_ms: PUZZLE_REVEAL_MS,
        }
    }
}

impl PuzzlePhases {
    pub fn total_ms(&self) -> Millis {
        self.pause_ms
            .saturating_add(self.question_ms)
            .saturating_add(self.thinking_ms)
            .saturating_add(self.reveal_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelinePolicy {
    pub kind: PolicyKind,
    pub intro_ms: Millis,
    pub outro_ms: Millis,
    /// `None` when the variant has no result screen.
    pub result_ms: Option<Millis>,
    pub move_ms: Millis,
    pub annotation_pause_ms: Millis,
    pub critical_ms: Millis,
    pub puzzle: PuzzlePhases,
    pub max_puzzle_prompts: usize,
    pub fade_ms: Millis,
    pub fallback_ms: Millis,
    pub detector: DetectorConfig,
    pub chapters: ChapterRules,
}

impl TimelinePolicy {
    /// Canonical constants for a variant.
    pub fn for_kind(kind: PolicyKind) -> Self {
        let base = Self {
            kind,
            intro_ms: INTRO_MS,
            outro_ms: OUTRO_MS,
            result_ms: None,
            move_ms: MOVE_MS,
            annotation_pause_ms: ANNOTATION_PAUSE_MS,
            critical_ms: CRITICAL_MOMENT_MS,
            puzzle: PuzzlePhases::default(),
            max_puzzle_prompts: MAX_PUZZLE_PROMPTS,
            fade_ms: OVERLAY_FADE_MS,
            fallback_ms: WALKTHROUGH_FALLBACK_MS,
            detector: DetectorConfig::default(),
            chapters: ChapterRules::default(),
        };
        match kind {
            PolicyKind::Walkthrough => base,
            PolicyKind::Annotated => Self {
                fallback_ms: ANNOTATED_FALLBACK_MS,
                ..base
            },
            PolicyKind::Highlights => Self {
                move_ms: HIGHLIGHTS_MOVE_MS,
                result_ms: Some(RESULT_ANNOUNCEMENT_MS),
                fallback_ms: HIGHLIGHTS_FALLBACK_MS,
                ..base
            },
            PolicyKind::Puzzle => Self {
                result_ms: Some(RESULT_ANNOUNCEMENT_MS),
                fallback_ms: PUZZLE_FALLBACK_MS,
                ..base
            },
        }
    }

    /// Whether this variant needs evaluation data at all.
    pub fn uses_critical_moments(&self) -> bool {
        matches!(self.kind, PolicyKind::Highlights | PolicyKind::Puzzle)
    }

    /// Duration of one event of `kind`, in milliseconds.
    pub fn event_millis(&self, kind: EventKind) -> Millis {
        match kind {
            EventKind::Intro => self.intro_ms,
            EventKind::NormalMove => self.move_ms,
            EventKind::AnnotatedMove => self.move_ms.saturating_add(self.annotation_pause_ms),
            EventKind::CriticalMoment => self.critical_ms,
            EventKind::PuzzlePrompt => self.puzzle.total_ms(),
            EventKind::ResultAnnouncement => self.result_ms.unwrap_or(0),
            EventKind::Outro => self.outro_ms,
        }
    }

    /// Frames occupied by one event of `kind`. Never zero, so every planned
    /// event owns at least one frame.
    pub fn event_frames(&self, kind: EventKind, fps: u32) -> FrameIndex {
        millis_to_frames(self.event_millis(kind), fps).max(1)
    }

    pub fn fade_frames(&self, fps: u32) -> FrameIndex {
        millis_to_frames(self.fade_ms, fps).max(1)
    }

    pub fn fallback_frames(&self, fps: u32) -> FrameIndex {
        millis_to_frames(self.fallback_ms, fps)
    }

    /// Check internal consistency of overridden constants.
    pub fn validate(&self) -> Result<(), CoreError> {
        let positive = [
            ("intro_ms", self.intro_ms),
            ("outro_ms", self.outro_ms),
            ("move_ms", self.move_ms),
            ("critical_ms", self.critical_ms),
            ("fallback_ms", self.fallback_ms),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(CoreError::Validation(format!("{name} must be > 0")));
            }
        }
        let bounded = [
            ("intro_ms", self.intro_ms),
            ("outro_ms", self.outro_ms),
            ("result_ms", self.result_ms.unwrap_or(0)),
            ("move_ms", self.move_ms),
            ("annotation_pause_ms", self.annotation_pause_ms),
            ("critical_ms", self.critical_ms),
            ("puzzle.pause_ms", self.puzzle.pause_ms),
            ("puzzle.question_ms", self.puzzle.question_ms),
            ("puzzle.thinking_ms", self.puzzle.thinking_ms),
            ("puzzle.reveal_ms", self.puzzle.reveal_ms),
            ("fade_ms", self.fade_ms),
            ("fallback_ms", self.fallback_ms),
        ];
        for (name, value) in bounded {
            if value > MAX_DURATION_MS {
                return Err(CoreError::Validation(format!(
                    "{name} must be at most {MAX_DURATION_MS}ms, got {value}"
                )));
            }
        }
        if self.result_ms == Some(0) {
            return Err(CoreError::Validation(
                "result_ms must be > 0 when present".to_string(),
            ));
        }
        if self.puzzle.thinking_ms == 0 {
            return Err(CoreError::Validation(
                "puzzle thinking phase must be > 0".to_string(),
            ));
        }

        let shortest_overlay = [
            self.event_millis(EventKind::AnnotatedMove),
            self.critical_ms,
            self.puzzle.total_ms(),
        ]
        .into_iter()
        .min()
        .unwrap_or(0);
        if self.fade_ms.saturating_mul(2) > shortest_overlay {
            return Err(CoreError::Validation(format!(
                "fade_ms ({}) must fit twice into the shortest overlay segment ({shortest_overlay}ms)",
                self.fade_ms
            )));
        }

        self.detector.validate()?;
        self.chapters.validate()
    }
}

impl Default for TimelinePolicy {
    fn default() -> Self {
        Self::for_kind(PolicyKind::Walkthrough)
    }
}

/// Validate a frames-per-second value.
pub fn validate_fps(fps: u32) -> Result<(), CoreError> {
    if !(MIN_FPS..=MAX_FPS).contains(&fps) {
        return Err(CoreError::Validation(format!(
            "fps must be between {MIN_FPS} and {MAX_FPS}, got {fps}"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Frame state resolution: global frame number → what to draw.
//!
//! [`resolve_frame`] is a pure function of its arguments. Render workers
//! call it for arbitrary, non-contiguous frame ranges in any order, and the
//! output must match a single sequential render exactly.

use serde::{Deserialize, Serialize};

use crate::critical::MomentKind;
use crate::policy::TimelinePolicy;
use crate::replay::PositionCache;
use crate::timeline::{EventKind, Segment, Timeline};
use crate::types::{millis_to_frames, FrameIndex, Ply};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Peak board scale at full overlay opacity during a critical moment.
pub const CRITICAL_EMPHASIS_PEAK: f64 = 1.15;

/// Board scale held during a puzzle reveal.
pub const PUZZLE_REVEAL_EMPHASIS: f64 = 1.1;

pub const NEUTRAL_EMPHASIS: f64 = 1.0;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlayKind {
    None,
    Title,
    Annotation,
    Critical,
    Puzzle,
    Result,
    Outro,
}

impl OverlayKind {
    fn for_event(kind: EventKind) -> Self {
        match kind {
            EventKind::Intro => Self::Title,
            EventKind::NormalMove => Self::None,
            EventKind::AnnotatedMove => Self::Annotation,
            EventKind::CriticalMoment => Self::Critical,
            EventKind::PuzzlePrompt => Self::Puzzle,
            EventKind::ResultAnnouncement => Self::Result,
            EventKind::Outro => Self::Outro,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PuzzlePhase {
    Pause,
    Question,
    Thinking,
    Reveal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PuzzleState {
    pub phase: PuzzlePhase,
    /// Whole seconds left to think; only set during [`PuzzlePhase::Thinking`].
    pub countdown: Option<u64>,
}

/// Everything a renderer needs for one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameState {
    pub frame: FrameIndex,
    pub ply: Ply,
    pub position: String,
    pub event: EventKind,
    pub frame_in_segment: FrameIndex,
    pub overlay: OverlayKind,
    pub overlay_opacity: f64,
    pub emphasis_scale: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub moment: Option<MomentKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub puzzle: Option<PuzzleState>,
}

// ---------------------------------------------------------------------------
// Envelope helpers
// ---------------------------------------------------------------------------

/// Piecewise-linear fade-in / hold / fade-out over a segment of
/// `duration` frames. Zero on the first and last frame, one in the hold.
pub fn overlay_envelope(
    frame_in_segment: FrameIndex,
    duration: FrameIndex,
    fade_frames: FrameIndex,
) -> f64 {
    if duration == 0 || fade_frames == 0 {
        return 0.0;
    }
    let last = duration.saturating_sub(1);
    let t = frame_in_segment.min(last);
    let fade = fade_frames as f64;
    let rising = t as f64 / fade;
    let falling = (last - t) as f64 / fade;
    rising.min(falling).clamp(0.0, 1.0)
}

/// Phase boundaries of a puzzle segment, as frame offsets from its start:
/// `[question_start, thinking_start, reveal_start]`.
fn puzzle_boundaries(policy: &TimelinePolicy, fps: u32) -> [FrameIndex; 3] {
    let p = &policy.puzzle;
    [
        millis_to_frames(p.pause_ms, fps),
        millis_to_frames(p.pause_ms + p.question_ms, fps),
        millis_to_frames(p.pause_ms + p.question_ms + p.thinking_ms, fps),
    ]
}

/// Sub-phase and countdown at `frame_in_segment` of a puzzle segment.
pub fn puzzle_state(
    frame_in_segment: FrameIndex,
    policy: &TimelinePolicy,
    fps: u32,
) -> PuzzleState {
    let [question_start, thinking_start, reveal_start] = puzzle_boundaries(policy, fps);
    if frame_in_segment < question_start {
        PuzzleState {
            phase: PuzzlePhase::Pause,
            countdown: None,
        }
    } else if frame_in_segment < thinking_start {
        PuzzleState {
            phase: PuzzlePhase::Question,
            countdown: None,
        }
    } else if frame_in_segment < reveal_start {
        let remaining = reveal_start - frame_in_segment;
        PuzzleState {
            phase: PuzzlePhase::Thinking,
            countdown: Some(remaining.div_ceil(fps.max(1) as u64)),
        }
    } else {
        PuzzleState {
            phase: PuzzlePhase::Reveal,
            countdown: None,
        }
    }
}

fn emphasis(segment: &Segment, opacity: f64, puzzle: Option<&PuzzleState>) -> f64 {
    match segment.kind {
        EventKind::CriticalMoment => NEUTRAL_EMPHASIS + (CRITICAL_EMPHASIS_PEAK - 1.0) * opacity,
        EventKind::PuzzlePrompt
            if puzzle.is_some_and(|p| p.phase == PuzzlePhase::Reveal) =>
        {
            PUZZLE_REVEAL_EMPHASIS
        }
        _ => NEUTRAL_EMPHASIS,
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Resolve global frame `frame` to its visual state.
///
/// Total over all inputs: frames at or past the end resolve to the last
/// frame of the final segment.
pub fn resolve_frame(
    frame: FrameIndex,
    timeline: &Timeline,
    cache: &PositionCache,
    policy: &TimelinePolicy,
) -> FrameState {
    let fps = timeline.fps();
    let Some(segment) = timeline.segment_at(frame) else {
        return FrameState {
            frame,
            ply: 0,
            position: cache.position(0).to_string(),
            event: EventKind::Intro,
            frame_in_segment: 0,
            overlay: OverlayKind::None,
            overlay_opacity: 0.0,
            emphasis_scale: NEUTRAL_EMPHASIS,
            moment: None,
            annotation: None,
            puzzle: None,
        };
    };

    let duration = segment.duration_frames();
    let frame_in_segment = frame
        .saturating_sub(segment.start_frame)
        .min(duration.saturating_sub(1));

    let overlay_opacity = if segment.kind.has_overlay() {
        overlay_envelope(frame_in_segment, duration, policy.fade_frames(fps))
    } else {
        0.0
    };

    let puzzle = (segment.kind == EventKind::PuzzlePrompt)
        .then(|| puzzle_state(frame_in_segment, policy, fps));

    FrameState {
        frame,
        ply: segment.ply,
        position: cache.position(segment.ply).to_string(),
        event: segment.kind,
        frame_in_segment,
        overlay: OverlayKind::for_event(segment.kind),
        overlay_opacity,
        emphasis_scale: emphasis(segment, overlay_opacity, puzzle.as_ref()),
        moment: segment.moment,
        annotation: segment.annotation.clone(),
        puzzle,
    }
}

/// Resolve every frame in `[start, end)`.
pub fn resolve_range(
    start: FrameIndex,
    end: FrameIndex,
    timeline: &Timeline,
    cache: &PositionCache,
    policy: &TimelinePolicy,
) -> Vec<FrameState> {
    (start..end)
        .map(|f| resolve_frame(f, timeline, cache, policy))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::critical::CriticalMoment;
    use crate::game::GameRecord;
    use crate::policy::PolicyKind;
    use crate::replay::PrecomputedReplay;

    fn game() -> GameRecord {
        GameRecord::from_sans(["e4", "e5", "Nf3", "Nc6", "Bb5", "a6", "Ba4", "Nf6"])
    }

    fn cache_for(game: &GameRecord) -> PositionCache {
        let positions = (1..=game.ply_count()).map(|p| format!("pos-{p}")).collect();
        PositionCache::build(&PrecomputedReplay::new(positions), &game.moves)
    }

    // -- overlay_envelope --

    #[test]
    fn envelope_fades_in_holds_and_fades_out() {
        assert_eq!(overlay_envelope(0, 150, 9), 0.0);
        assert!((overlay_envelope(3, 150, 9) - 3.0 / 9.0).abs() < 1e-12);
        assert_eq!(overlay_envelope(9, 150, 9), 1.0);
        assert_eq!(overlay_envelope(75, 150, 9), 1.0);
        assert!((overlay_envelope(146, 150, 9) - 3.0 / 9.0).abs() < 1e-12);
        assert_eq!(overlay_envelope(149, 150, 9), 0.0);
    }

    #[test]
    fn envelope_short_segment_never_reaches_full() {
        let peak = (0..10)
            .map(|f| overlay_envelope(f, 10, 9))
            .fold(0.0_f64, f64::max);
        assert!(peak < 1.0);
    }

    #[test]
    fn envelope_degenerate_inputs() {
        assert_eq!(overlay_envelope(0, 0, 9), 0.0);
        assert_eq!(overlay_envelope(5, 10, 0), 0.0);
    }

    // -- puzzle_state --

    #[test]
    fn puzzle_phases_at_thirty_fps() {
        let policy = TimelinePolicy::for_kind(PolicyKind::Puzzle);
        assert_eq!(puzzle_state(0, &policy, 30).phase, PuzzlePhase::Pause);
        assert_eq!(puzzle_state(29, &policy, 30).phase, PuzzlePhase::Pause);
        assert_eq!(puzzle_state(30, &policy, 30).phase, PuzzlePhase::Question);
        assert_eq!(puzzle_state(60, &policy, 30).phase, PuzzlePhase::Thinking);
        assert_eq!(puzzle_state(179, &policy, 30).phase, PuzzlePhase::Thinking);
        assert_eq!(puzzle_state(180, &policy, 30).phase, PuzzlePhase::Reveal);
        assert_eq!(puzzle_state(239, &policy, 30).phase, PuzzlePhase::Reveal);
    }

    #[test]
    fn puzzle_countdown_counts_whole_seconds() {
        let policy = TimelinePolicy::for_kind(PolicyKind::Puzzle);
        assert_eq!(puzzle_state(60, &policy, 30).countdown, Some(4));
        assert_eq!(puzzle_state(89, &policy, 30).countdown, Some(4));
        assert_eq!(puzzle_state(90, &policy, 30).countdown, Some(3));
        assert_eq!(puzzle_state(149, &policy, 30).countdown, Some(2));
        assert_eq!(puzzle_state(150, &policy, 30).countdown, Some(1));
        assert_eq!(puzzle_state(179, &policy, 30).countdown, Some(1));
        assert_eq!(puzzle_state(180, &policy, 30).countdown, None);
    }

    // -- resolve_frame --

    #[test]
    fn normal_move_has_no_overlay() {
        let game = game();
        let policy = TimelinePolicy::default();
        let timeline = Timeline::build(&game, &[], &policy, 30);
        let state = resolve_frame(100, &timeline, &cache_for(&game), &policy);
        assert_eq!(state.event, EventKind::NormalMove);
        assert_eq!(state.ply, 1);
        assert_eq!(state.position, "pos-1");
        assert_eq!(state.overlay, OverlayKind::None);
        assert_eq!(state.overlay_opacity, 0.0);
        assert_eq!(state.emphasis_scale, NEUTRAL_EMPHASIS);
    }

    #[test]
    fn intro_shows_starting_position() {
        let game = game();
        let policy = TimelinePolicy::default();
        let timeline = Timeline::build(&game, &[], &policy, 30);
        let state = resolve_frame(45, &timeline, &cache_for(&game), &policy);
        assert_eq!(state.overlay, OverlayKind::Title);
        assert_eq!(state.overlay_opacity, 1.0);
        assert_eq!(state.position, crate::replay::STARTING_FEN);
    }

    #[test]
    fn annotated_segment_carries_text_and_envelope() {
        let game = game().with_annotation(3, "Developing with tempo");
        let policy = TimelinePolicy::for_kind(PolicyKind::Annotated);
        let timeline = Timeline::build(&game, &[], &policy, 30);
        // intro 90 + plies 1,2 at 30 each => ply 3 starts at 150
        let start = resolve_frame(150, &timeline, &cache_for(&game), &policy);
        let hold = resolve_frame(220, &timeline, &cache_for(&game), &policy);
        assert_eq!(start.event, EventKind::AnnotatedMove);
        assert_eq!(start.overlay_opacity, 0.0);
        assert_eq!(hold.overlay_opacity, 1.0);
        assert_eq!(hold.annotation.as_deref(), Some("Developing with tempo"));
        assert_eq!(hold.position, "pos-3");
    }

    #[test]
    fn critical_moment_emphasis_follows_opacity() {
        let game = game();
        let policy = TimelinePolicy::for_kind(PolicyKind::Highlights);
        let moment = CriticalMoment {
            ply: 5,
            kind: MomentKind::Blunder,
            eval_before: 40,
            eval_after: -320,
        };
        let timeline = Timeline::build(&game, &[moment], &policy, 30);
        let seg = timeline.segments_of(EventKind::CriticalMoment).next().unwrap();
        let cache = cache_for(&game);

        let first = resolve_frame(seg.start_frame, &timeline, &cache, &policy);
        let mid = resolve_frame(seg.start_frame + 75, &timeline, &cache, &policy);
        assert_eq!(first.emphasis_scale, NEUTRAL_EMPHASIS);
        assert!((mid.emphasis_scale - CRITICAL_EMPHASIS_PEAK).abs() < 1e-12);
        assert_eq!(mid.moment, Some(MomentKind::Blunder));
    }

    #[test]
    fn puzzle_frame_exposes_phase() {
        let game = game().with_annotation(2, "What now?");
        let policy = TimelinePolicy::for_kind(PolicyKind::Puzzle);
        let timeline = Timeline::build(&game, &[], &policy, 30);
        let seg = timeline.segments_of(EventKind::PuzzlePrompt).next().unwrap();
        let cache = cache_for(&game);

        let thinking = resolve_frame(seg.start_frame + 100, &timeline, &cache, &policy);
        let puzzle = thinking.puzzle.unwrap();
        assert_eq!(puzzle.phase, PuzzlePhase::Thinking);
        assert_eq!(puzzle.countdown, Some(3));

        let reveal = resolve_frame(seg.start_frame + 200, &timeline, &cache, &policy);
        assert_eq!(reveal.emphasis_scale, PUZZLE_REVEAL_EMPHASIS);
    }

    #[test]
    fn frames_past_the_end_clamp_to_last_frame() {
        let game = game();
        let policy = TimelinePolicy::default();
        let timeline = Timeline::build(&game, &[], &policy, 30);
        let cache = cache_for(&game);
        let last = resolve_frame(419, &timeline, &cache, &policy);
        let past = resolve_frame(5_000, &timeline, &cache, &policy);
        assert_eq!(past.event, EventKind::Outro);
        assert_eq!(past.frame_in_segment, last.frame_in_segment);
        assert_eq!(past.position, last.position);
    }

    #[test]
    fn out_of_order_resolution_matches_sequential() {
        let game = game().with_annotation(4, "Pin");
        let policy = TimelinePolicy::for_kind(PolicyKind::Annotated);
        let timeline = Timeline::build(&game, &[], &policy, 30);
        let cache = cache_for(&game);
        let sequential = resolve_range(0, timeline.total_frames(), &timeline, &cache, &policy);
        for f in (0..timeline.total_frames()).rev().step_by(7) {
            assert_eq!(
                resolve_frame(f, &timeline, &cache, &policy),
                sequential[f as usize]
            );
        }
    }
}

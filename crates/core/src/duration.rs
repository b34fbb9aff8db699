//! Total video length in frames.
//!
//! This is the single duration formula shared by job submission, preview
//! and render metadata. It sums [`TimelinePolicy::event_frames`] over the
//! same event plan the timeline builder lays out, so the result always
//! equals `Timeline::total_frames()` for the same inputs.

use std::collections::BTreeMap;

use crate::critical::{detect_critical_moments, CriticalMoment};
use crate::game::{parse_movetext, EvaluationSample, GameRecord};
use crate::policy::TimelinePolicy;
use crate::timeline::plan_events;
use crate::types::{FrameIndex, Ply};

/// Frames for `game` given already-detected `moments`.
pub fn total_frames(
    game: &GameRecord,
    moments: &[CriticalMoment],
    policy: &TimelinePolicy,
    fps: u32,
) -> FrameIndex {
    plan_events(game, moments, policy)
        .iter()
        .map(|event| policy.event_frames(event.kind, fps))
        .fold(0, FrameIndex::saturating_add)
}

/// Frames for `game`, running critical moment detection when the policy
/// needs it.
pub fn total_frames_for_game(game: &GameRecord, policy: &TimelinePolicy, fps: u32) -> FrameIndex {
    let moments = if policy.uses_critical_moments() {
        detect_critical_moments(&game.evaluations, &policy.detector)
    } else {
        Vec::new()
    };
    total_frames(game, &moments, policy, fps)
}

/// Request-time estimate from raw movetext.
///
/// Never fails: movetext that does not parse falls back to the policy's
/// fixed fallback duration.
pub fn estimate_total_frames(
    movetext: &str,
    annotations: &BTreeMap<Ply, String>,
    evaluations: &[EvaluationSample],
    policy: &TimelinePolicy,
    fps: u32,
) -> FrameIndex {
    match parse_movetext(movetext) {
        Ok(moves) => {
            let game = GameRecord {
                moves,
                evaluations: evaluations.to_vec(),
                annotations: annotations.clone(),
            };
            total_frames_for_game(&game, policy, fps)
        }
        Err(e) => {
            let frames = policy.fallback_frames(fps);
            tracing::warn!(
                policy = %policy.kind,
                error = %e,
                fallback_frames = frames,
                "Movetext did not parse -- using fallback duration",
            );
            frames
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Event timeline construction.
//!
//! A single left-to-right pass over the game's plies classifies every
//! position into an [`EventKind`] (the event plan), then lays the plan out as
//! contiguous frame [`Segment`]s. The duration calculator sums the same plan
//! without building segments, so both always agree.
//!
//! Invariants of a built [`Timeline`]:
//! - the first segment starts at frame 0;
//! - each segment ends where the next one starts (no gaps, no overlap);
//! - ply indices never decrease.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::critical::{CriticalMoment, MomentKind};
use crate::error::CoreError;
use crate::game::GameRecord;
use crate::policy::{PolicyKind, TimelinePolicy};
use crate::types::{FrameIndex, Ply};

// ---------------------------------------------------------------------------
// Event kinds
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Intro,
    NormalMove,
    AnnotatedMove,
    CriticalMoment,
    PuzzlePrompt,
    ResultAnnouncement,
    Outro,
}

impl EventKind {
    /// Whether segments of this kind show a fading overlay.
    pub fn has_overlay(self) -> bool {
        !matches!(self, Self::NormalMove)
    }
}

/// One classified position, before frame layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedEvent {
    pub ply: Ply,
    pub kind: EventKind,
    pub moment: Option<MomentKind>,
    pub annotation: Option<String>,
}

impl PlannedEvent {
    fn bare(ply: Ply, kind: EventKind) -> Self {
        Self {
            ply,
            kind,
            moment: None,
            annotation: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Planning
// ---------------------------------------------------------------------------

/// Plies that become puzzle prompts: the earliest `max_prompts` positions
/// that carry an annotation or a critical moment. Ply 0 has no move to
/// guess and is never a prompt.
pub fn puzzle_prompt_plies(
    game: &GameRecord,
    moments: &[CriticalMoment],
    max_prompts: usize,
) -> BTreeSet<Ply> {
    let last = game.ply_count();
    game.annotations
        .keys()
        .copied()
        .chain(moments.iter().map(|m| m.ply))
        .filter(|ply| (1..=last).contains(ply))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .take(max_prompts)
        .collect()
}

/// Classify every position of `game` under `policy`, bookends included.
///
/// Never rejects input: an empty game yields just the bookend events.
pub fn plan_events(
    game: &GameRecord,
    moments: &[CriticalMoment],
    policy: &TimelinePolicy,
) -> Vec<PlannedEvent> {
    let last = game.ply_count();
    let critical: BTreeMap<Ply, MomentKind> = match policy.kind {
        PolicyKind::Highlights | PolicyKind::Puzzle => {
            moments.iter().map(|m| (m.ply, m.kind)).collect()
        }
        _ => BTreeMap::new(),
    };
    let prompts = match policy.kind {
        PolicyKind::Puzzle => puzzle_prompt_plies(game, moments, policy.max_puzzle_prompts),
        _ => BTreeSet::new(),
    };

    let mut events = Vec::with_capacity(last + 3);
    events.push(PlannedEvent::bare(0, EventKind::Intro));

    for ply in 0..=last {
        let annotation = game.annotation_at(ply);
        let event = match policy.kind {
            PolicyKind::Annotated if annotation.is_some() => PlannedEvent {
                ply,
                kind: EventKind::AnnotatedMove,
                moment: None,
                annotation: annotation.map(str::to_string),
            },
            PolicyKind::Highlights if critical.contains_key(&ply) => PlannedEvent {
                ply,
                kind: EventKind::CriticalMoment,
                moment: critical.get(&ply).copied(),
                annotation: None,
            },
            PolicyKind::Puzzle if prompts.contains(&ply) => PlannedEvent {
                ply,
                kind: EventKind::PuzzlePrompt,
                moment: critical.get(&ply).copied(),
                annotation: annotation.map(str::to_string),
            },
            // The starting position only gets airtime when something happens there.
            _ if ply == 0 => continue,
            _ => PlannedEvent::bare(ply, EventKind::NormalMove),
        };
        events.push(event);
    }

    if policy.result_ms.is_some() {
        events.push(PlannedEvent::bare(last, EventKind::ResultAnnouncement));
    }
    events.push(PlannedEvent::bare(last, EventKind::Outro));
    events
}

// ---------------------------------------------------------------------------
// Segments
// ---------------------------------------------------------------------------

/// Half-open frame interval `[start_frame, end_frame)` tagged with one ply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub start_frame: FrameIndex,
    pub end_frame: FrameIndex,
    pub ply: Ply,
    pub kind: EventKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub moment: Option<MomentKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotation: Option<String>,
}

impl Segment {
    pub fn duration_frames(&self) -> FrameIndex {
        self.end_frame - self.start_frame
    }

    pub fn contains(&self, frame: FrameIndex) -> bool {
        self.start_frame <= frame && frame < self.end_frame
    }
}

/// Immutable, ordered segment list for one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Timeline {
    policy: PolicyKind,
    fps: u32,
    segments: Vec<Segment>,
}

impl Timeline {
    /// Lay out the event plan as contiguous segments.
    pub fn build(
        game: &GameRecord,
        moments: &[CriticalMoment],
        policy: &TimelinePolicy,
        fps: u32,
    ) -> Self {
        let mut offset: FrameIndex = 0;
        let segments: Vec<Segment> = plan_events(game, moments, policy)
            .into_iter()
            .map(|event| {
                let start_frame = offset;
                offset = offset.saturating_add(policy.event_frames(event.kind, fps));
                Segment {
                    start_frame,
                    end_frame: offset,
                    ply: event.ply,
                    kind: event.kind,
                    moment: event.moment,
                    annotation: event.annotation,
                }
            })
            .collect();

        tracing::debug!(
            policy = %policy.kind,
            fps,
            plies = game.ply_count(),
            segments = segments.len(),
            total_frames = offset,
            "Timeline built",
        );

        Self {
            policy: policy.kind,
            fps,
            segments,
        }
    }

    pub fn policy(&self) -> PolicyKind {
        self.policy
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// End frame of the last segment.
    pub fn total_frames(&self) -> FrameIndex {
        self.segments.last().map(|s| s.end_frame).unwrap_or(0)
    }

    /// Segment containing `frame`, found by binary search. Frames past the
    /// end resolve to the last segment.
    pub fn segment_at(&self, frame: FrameIndex) -> Option<&Segment> {
        let idx = self.segments.partition_point(|s| s.end_frame <= frame);
        self.segments.get(idx).or_else(|| self.segments.last())
    }

    /// Segments of one kind, in timeline order.
    pub fn segments_of(&self, kind: EventKind) -> impl Iterator<Item = &Segment> {
        self.segments.iter().filter(move |s| s.kind == kind)
    }

    /// Check the contiguity and ordering invariants.
    pub fn validate(&self) -> Result<(), CoreError> {
        let first = self
            .segments
            .first()
            .ok_or_else(|| CoreError::Internal("timeline has no segments".to_string()))?;
        if first.start_frame != 0 {
            return Err(CoreError::Internal(format!(
                "first segment starts at frame {}",
                first.start_frame
            )));
        }
        for (i, s) in self.segments.iter().enumerate() {
            if s.end_frame <= s.start_frame {
                return Err(CoreError::Internal(format!("segment {i} is empty")));
            }
        }
        for (i, pair) in self.segments.windows(2).enumerate() {
            let (a, b) = (&pair[0], &pair[1]);
            if a.end_frame != b.start_frame {
                return Err(CoreError::Internal(format!(
                    "segments {i} and {} are not contiguous ({} != {})",
                    i + 1,
                    a.end_frame,
                    b.start_frame
                )));
            }
            if b.ply < a.ply {
                return Err(CoreError::Internal(format!(
                    "ply decreases between segments {i} and {}",
                    i + 1
                )));
            }
        }
        Ok(())
    }

    /// SHA-256 hex digest of the canonical JSON form. Two builds from the
    /// same inputs produce the same fingerprint.
    pub fn fingerprint(&self) -> String {
        // Serializing plain structs with string/integer fields cannot fail.
        let bytes = serde_json::to_vec(self).unwrap_or_default();
        format!("{:x}", Sha256::digest(&bytes))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

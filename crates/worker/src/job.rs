//! Job files and job plans.
//!
//! A job file is JSON:
//!
//! ```json
//! {
//!   "policy": "annotated",
//!   "fps": 30,
//!   "movetext": "1. e4 e5 2. Nf3 Nc6",
//!   "annotations": { "3": "Knight development" },
//!   "evaluations": [{ "ply": 1, "eval": 30 }],
//!   "positions": ["<fen after ply 1>", "..."]
//! }
//! ```
//!
//! Exactly one of `moves` (SAN list) or `movetext` is required. Without
//! `positions` the worker replays symbolically (see [`MoveTrailReplay`]).
//! A move that is not SAN does not fail the job: replay freezes at it and
//! the plan carries a replay warning.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use chessreel_core::chapters::Chapter;
use chessreel_core::critical::CriticalMoment;
use chessreel_core::game::{
    is_san, parse_movetext_lenient, Annotation, EvaluationSample, GameRecord, Move,
};
use chessreel_core::job::CompiledJob;
use chessreel_core::partition::{partition_frames, FrameRange};
use chessreel_core::policy::{PolicyKind, TimelinePolicy, DEFAULT_FPS};
use chessreel_core::replay::{PrecomputedReplay, ReplayEngine, ReplayError, ReplayWarning};
use chessreel_core::types::{FrameIndex, Ply};

use crate::error::WorkerError;

// ---------------------------------------------------------------------------
// Symbolic replay
// ---------------------------------------------------------------------------

/// Position key made of the moves played so far (`"e4 e5 Nf3"`). Used when
/// the job carries no precomputed positions and the renderer replays moves
/// itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct MoveTrailReplay;

impl ReplayEngine for MoveTrailReplay {
    fn initial_position(&self) -> String {
        String::new()
    }

    fn apply(&self, position: &str, mv: &Move) -> Result<String, ReplayError> {
        if !is_san(&mv.san) {
            return Err(ReplayError::InvalidMove {
                ply: mv.ply,
                san: mv.san.clone(),
            });
        }
        if position.is_empty() {
            Ok(mv.san.clone())
        } else {
            Ok(format!("{position} {}", mv.san))
        }
    }
}

// ---------------------------------------------------------------------------
// Job file
// ---------------------------------------------------------------------------

fn default_fps() -> u32 {
    DEFAULT_FPS
}

#[derive(Debug, Clone, Deserialize)]
pub struct RenderJob {
    pub policy: PolicyKind,
    #[serde(default = "default_fps")]
    pub fps: u32,
    #[serde(default)]
    pub moves: Option<Vec<String>>,
    #[serde(default)]
    pub movetext: Option<String>,
    #[serde(default)]
    pub evaluations: Vec<EvaluationSample>,
    #[serde(default)]
    pub annotations: BTreeMap<Ply, String>,
    /// Position after each ply, in order.
    #[serde(default)]
    pub positions: Option<Vec<String>>,
    /// Position before the first move; standard start when absent.
    #[serde(default)]
    pub initial_position: Option<String>,
}

impl RenderJob {
    pub async fn load(path: &Path) -> Result<Self, WorkerError> {
        let raw = tokio::fs::read_to_string(path).await?;
        let job: Self = serde_json::from_str(&raw)?;
        tracing::debug!(path = %path.display(), policy = %job.policy, "Job file loaded");
        Ok(job)
    }

    /// Assemble the immutable game record.
    pub fn game(&self) -> Result<GameRecord, WorkerError> {
        let game = match (&self.moves, &self.movetext) {
            (Some(sans), None) => GameRecord::from_sans(sans.iter().cloned()),
            (None, Some(text)) => {
                let parsed = parse_movetext_lenient(text)?;
                if let Some(ply) = parsed.first_invalid {
                    tracing::warn!(
                        ply,
                        san = %parsed.moves[ply].san,
                        "Movetext contains a non-SAN move -- replay will freeze there",
                    );
                }
                GameRecord {
                    moves: parsed.moves,
                    ..GameRecord::default()
                }
            }
            (Some(_), Some(_)) => {
                return Err(WorkerError::InvalidJob(
                    "set either `moves` or `movetext`, not both".to_string(),
                ))
            }
            (None, None) => {
                return Err(WorkerError::InvalidJob(
                    "one of `moves` or `movetext` is required".to_string(),
                ))
            }
        };
        Ok(GameRecord {
            evaluations: self.evaluations.clone(),
            annotations: self.annotations.clone(),
            ..game
        })
    }

    pub fn engine(&self) -> Box<dyn ReplayEngine> {
        match &self.positions {
            Some(positions) => match &self.initial_position {
                Some(initial) => Box::new(PrecomputedReplay::with_initial(
                    initial.clone(),
                    positions.clone(),
                )),
                None => Box::new(PrecomputedReplay::new(positions.clone())),
            },
            None => Box::new(MoveTrailReplay),
        }
    }

    pub fn compile(&self, fps_override: Option<u32>) -> Result<CompiledJob, WorkerError> {
        let fps = fps_override.unwrap_or(self.fps);
        let engine = self.engine();
        let job = CompiledJob::compile(
            self.game()?,
            TimelinePolicy::for_kind(self.policy),
            fps,
            engine.as_ref(),
        )?;
        if let Some(warning) = job.replay_warning() {
            tracing::warn!(
                frozen_at = warning.frozen_at,
                message = %warning.message,
                "Replay stopped early -- remaining plies show the frozen position",
            );
        }
        Ok(job)
    }
}

// ---------------------------------------------------------------------------
// Plan output
// ---------------------------------------------------------------------------

/// Job metadata handed to the render farm scheduler and the description
/// builder.
#[derive(Debug, Clone, Serialize)]
pub struct JobPlan {
    pub policy: PolicyKind,
    pub fps: u32,
    pub total_frames: FrameIndex,
    pub fingerprint: String,
    pub chunks: Vec<FrameRange>,
    pub moments: Vec<CriticalMoment>,
    pub annotations: Vec<Annotation>,
    pub chapters: Vec<Chapter>,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replay_warning: Option<ReplayWarning>,
}

impl JobPlan {
    pub fn build(job: &CompiledJob, frames_per_chunk: u64) -> Result<Self, WorkerError> {
        Ok(Self {
            policy: job.policy().kind,
            fps: job.fps(),
            total_frames: job.total_frames(),
            fingerprint: job.fingerprint(),
            chunks: partition_frames(job.total_frames(), frames_per_chunk)?,
            moments: job.moments().to_vec(),
            annotations: job.game().annotation_list(),
            chapters: job.chapters().to_vec(),
            description: job.description_block(),
            replay_warning: job.replay_warning().cloned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn job(json: &str) -> RenderJob {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn move_trail_replay_builds_prefixes() {
        let game = GameRecord::from_sans(["e4", "e5"]);
        let cache = chessreel_core::replay::PositionCache::build(&MoveTrailReplay, &game.moves);
        assert_eq!(cache.position(0), "");
        assert_eq!(cache.position(2), "e4 e5");
    }

    #[test]
    fn game_from_san_list() {
        let job = job(r#"{"policy": "walkthrough", "moves": ["e4", "e5"]}"#);
        assert_eq!(job.fps, DEFAULT_FPS);
        assert_eq!(job.game().unwrap().ply_count(), 2);
    }

    #[test]
    fn game_from_movetext_keeps_annotations() {
        let job = job(
            r#"{"policy": "annotated", "movetext": "1. d4 d5 2. c4", "annotations": {"3": "Gambit"}}"#,
        );
        let game = job.game().unwrap();
        assert_eq!(game.ply_count(), 3);
        assert_eq!(game.annotation_at(3), Some("Gambit"));
    }

    #[test]
    fn moves_and_movetext_are_exclusive() {
        let both = job(r#"{"policy": "walkthrough", "moves": ["e4"], "movetext": "1. e4"}"#);
        assert_matches!(both.game(), Err(WorkerError::InvalidJob(_)));
        let neither = job(r#"{"policy": "walkthrough"}"#);
        assert_matches!(neither.game(), Err(WorkerError::InvalidJob(_)));
    }

    #[test]
    fn move_trail_replay_rejects_non_san() {
        let game = GameRecord::from_sans(["e4", "e5", "banana", "Nc6"]);
        let cache = chessreel_core::replay::PositionCache::build(&MoveTrailReplay, &game.moves);
        assert_eq!(cache.warning().unwrap().frozen_at, 2);
        assert_eq!(cache.position(3), "e4 e5");
        assert_eq!(cache.position(4), "e4 e5");
    }

    #[test]
    fn non_san_movetext_keeps_every_move() {
        let job = job(r#"{"policy": "walkthrough", "movetext": "1. e4 e5 2. banana Nc6"}"#);
        let game = job.game().unwrap();
        assert_eq!(game.ply_count(), 4);
        assert_eq!(game.moves[2].san, "banana");
    }

    #[test]
    fn unbalanced_movetext_is_a_core_error() {
        let job = job(r#"{"policy": "walkthrough", "movetext": "1. e4 {never closed"}"#);
        assert_matches!(job.game(), Err(WorkerError::Core(_)));
    }

    #[test]
    fn fps_override_wins() {
        let job = job(r#"{"policy": "walkthrough", "fps": 30, "moves": ["e4"]}"#);
        assert_eq!(job.compile(Some(60)).unwrap().fps(), 60);
    }

    #[test]
    fn plan_chunks_cover_video() {
        let job = job(r#"{"policy": "walkthrough", "moves": ["e4", "e5", "Nf3", "Nc6", "Bb5", "a6", "Ba4", "Nf6"]}"#);
        let compiled = job.compile(None).unwrap();
        let plan = JobPlan::build(&compiled, 100).unwrap();
        assert_eq!(plan.total_frames, 420);
        assert_eq!(plan.chunks.len(), 5);
        assert_eq!(plan.fingerprint, compiled.fingerprint());
        assert!(plan.replay_warning.is_none());
    }
}

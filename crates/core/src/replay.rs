//! Position cache over an external move replay engine.
//!
//! The replay engine is a black box behind [`ReplayEngine`]. The
//! [`PositionCache`] runs it exactly once per job and stores one position
//! string per ply, so frame resolution is an index lookup instead of a
//! replay from move zero.
//!
//! A move the engine cannot apply freezes the cache: every later ply reuses
//! the last good position and a [`ReplayWarning`] is recorded. Nothing
//! propagates past the cache, so a render job never fails mid-frame.

use serde::Serialize;

use crate::game::Move;
use crate::types::Ply;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// FEN of the standard starting position.
pub const STARTING_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

// ---------------------------------------------------------------------------
// Engine seam
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReplayError {
    #[error("Move '{san}' at ply {ply} cannot be applied")]
    InvalidMove { ply: Ply, san: String },

    #[error("Replay engine failed at ply {ply}: {reason}")]
    Engine { ply: Ply, reason: String },
}

/// Applies moves to positions. Implementations are provided by the analysis
/// subsystem; legality checking is entirely their concern.
pub trait ReplayEngine {
    /// Position string before the first move.
    fn initial_position(&self) -> String;

    /// Position string after applying `mv` to `position`.
    fn apply(&self, position: &str, mv: &Move) -> Result<String, ReplayError>;
}

/// Replay engine backed by positions that were already computed upstream
/// (one entry per ply, in order). A missing or empty entry is treated as an
/// unplayable move.
#[derive(Debug, Clone)]
pub struct PrecomputedReplay {
    initial: String,
    after_each_ply: Vec<String>,
}

impl PrecomputedReplay {
    pub fn new(after_each_ply: Vec<String>) -> Self {
        Self::with_initial(STARTING_FEN.to_string(), after_each_ply)
    }

    pub fn with_initial(initial: String, after_each_ply: Vec<String>) -> Self {
        Self {
            initial,
            after_each_ply,
        }
    }
}

impl ReplayEngine for PrecomputedReplay {
    fn initial_position(&self) -> String {
        self.initial.clone()
    }

    fn apply(&self, _position: &str, mv: &Move) -> Result<String, ReplayError> {
        match self.after_each_ply.get(mv.ply) {
            Some(next) if !next.trim().is_empty() => Ok(next.clone()),
            _ => Err(ReplayError::InvalidMove {
                ply: mv.ply,
                san: mv.san.clone(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Cache
// ---------------------------------------------------------------------------

/// Recorded when replay stops early.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplayWarning {
    /// Position ply the cache froze at (last successfully reached position).
    pub frozen_at: Ply,
    pub message: String,
}

/// Index-addressable positions `0..=ply_count` for one job. Read-only after
/// [`PositionCache::build`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionCache {
    positions: Vec<String>,
    warning: Option<ReplayWarning>,
}

impl PositionCache {
    /// Replay `moves` once through `engine`.
    pub fn build(engine: &dyn ReplayEngine, moves: &[Move]) -> Self {
        let mut positions = Vec::with_capacity(moves.len() + 1);
        positions.push(engine.initial_position());
        let mut warning = None;

        for mv in moves {
            let current = positions.last().cloned().unwrap_or_default();
            if warning.is_some() {
                positions.push(current);
                continue;
            }
            match engine.apply(&current, mv) {
                Ok(next) => positions.push(next),
                Err(e) => {
                    let frozen_at = positions.len() - 1;
                    tracing::warn!(
                        ply = mv.ply,
                        san = %mv.san,
                        frozen_at,
                        error = %e,
                        "Replay failed -- freezing position cache",
                    );
                    warning = Some(ReplayWarning {
                        frozen_at,
                        message: e.to_string(),
                    });
                    positions.push(current);
                }
            }
        }

        Self { positions, warning }
    }

    /// Position at `ply`. Plies past the end clamp to the final position.
    pub fn position(&self, ply: Ply) -> &str {
        let idx = ply.min(self.positions.len().saturating_sub(1));
        self.positions.get(idx).map(String::as_str).unwrap_or_default()
    }

    /// Number of half-moves covered (positions are `0..=ply_count`).
    pub fn ply_count(&self) -> Ply {
        self.positions.len().saturating_sub(1)
    }

    pub fn warning(&self) -> Option<&ReplayWarning> {
        self.warning.as_ref()
    }

    pub fn is_frozen(&self) -> bool {
        self.warning.is_some()
    }

    pub fn positions(&self) -> &[String] {
        &self.positions
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Critical moment detection over a per-ply evaluation curve.
//!
//! A critical moment is a ply whose evaluation differs sharply from the
//! previous ply's. Only adjacent plies that both carry a sample are compared,
//! so sparse curves never invent swings across gaps.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::game::EvaluationSample;
use crate::types::Ply;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Default evaluation delta (centipawns) that marks a critical moment.
pub const DEFAULT_THRESHOLD_CP: i32 = 200;

/// Default number of moments retained after magnitude ranking.
pub const DEFAULT_MAX_MOMENTS: usize = 5;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MomentKind {
    Brilliant,
    Blunder,
    Swing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriticalMoment {
    pub ply: Ply,
    pub kind: MomentKind,
    pub eval_before: i32,
    pub eval_after: i32,
}

impl CriticalMoment {
    /// Evaluation change in centipawns, widened so extreme samples cannot
    /// overflow.
    pub fn delta(&self) -> i64 {
        eval_delta(self.eval_before, self.eval_after)
    }

    pub fn magnitude(&self) -> u64 {
        self.delta().unsigned_abs()
    }
}

fn eval_delta(before: i32, after: i32) -> i64 {
    i64::from(after) - i64::from(before)
}

/// Classification thresholds. With all three equal (the default) every
/// qualifying delta is either a blunder or a brilliancy; a brilliant
/// threshold above the swing threshold turns moderate gains into swings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectorConfig {
    pub blunder_threshold_cp: i32,
    pub brilliant_threshold_cp: i32,
    pub swing_threshold_cp: i32,
    pub max_moments: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            blunder_threshold_cp: DEFAULT_THRESHOLD_CP,
            brilliant_threshold_cp: DEFAULT_THRESHOLD_CP,
            swing_threshold_cp: DEFAULT_THRESHOLD_CP,
            max_moments: DEFAULT_MAX_MOMENTS,
        }
    }
}

impl DetectorConfig {
    pub fn validate(&self) -> Result<(), CoreError> {
        for (name, value) in [
            ("blunder_threshold_cp", self.blunder_threshold_cp),
            ("brilliant_threshold_cp", self.brilliant_threshold_cp),
            ("swing_threshold_cp", self.swing_threshold_cp),
        ] {
            if value <= 0 {
                return Err(CoreError::Validation(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }
        Ok(())
    }

    /// Classify a single evaluation delta.
    pub fn classify(&self, delta: i64) -> Option<MomentKind> {
        if delta <= -i64::from(self.blunder_threshold_cp) {
            Some(MomentKind::Blunder)
        } else if delta >= i64::from(self.brilliant_threshold_cp) {
            Some(MomentKind::Brilliant)
        } else if delta.unsigned_abs() >= u64::from(self.swing_threshold_cp.unsigned_abs()) {
            Some(MomentKind::Swing)
        } else {
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Detection
// ---------------------------------------------------------------------------

/// Detect critical moments, keep the `max_moments` largest swings (earlier ply
/// wins ties) and return them ordered by ply.
///
/// Duplicate samples for one ply resolve to the last one supplied.
pub fn detect_critical_moments(
    evaluations: &[EvaluationSample],
    config: &DetectorConfig,
) -> Vec<CriticalMoment> {
    let curve: BTreeMap<Ply, i32> = evaluations.iter().map(|s| (s.ply, s.centipawns)).collect();

    let mut moments: Vec<CriticalMoment> = curve
        .iter()
        .filter(|(ply, _)| **ply >= 1)
        .filter_map(|(&ply, &after)| {
            let before = *curve.get(&(ply - 1))?;
            let kind = config.classify(eval_delta(before, after))?;
            Some(CriticalMoment {
                ply,
                kind,
                eval_before: before,
                eval_after: after,
            })
        })
        .collect();

    if moments.len() > config.max_moments {
        moments.sort_by(|a, b| b.magnitude().cmp(&a.magnitude()).then(a.ply.cmp(&b.ply)));
        moments.truncate(config.max_moments);
        moments.sort_by_key(|m| m.ply);
    }

    moments
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Splitting a video into render chunks.
//!
//! Each chunk is a contiguous, half-open frame range handed to one stateless
//! render worker. Chunks are disjoint and together cover `[0, total)`.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::FrameIndex;

/// Frames per chunk when the job does not say otherwise.
pub const DEFAULT_FRAMES_PER_CHUNK: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameRange {
    pub start: FrameIndex,
    pub end: FrameIndex,
}

impl FrameRange {
    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn frames(&self) -> std::ops::Range<FrameIndex> {
        self.start..self.end
    }
}

/// Split `[0, total_frames)` into chunks of at most `frames_per_chunk`.
/// The last chunk takes the remainder.
pub fn partition_frames(
    total_frames: FrameIndex,
    frames_per_chunk: u64,
) -> Result<Vec<FrameRange>, CoreError> {
    if frames_per_chunk == 0 {
        return Err(CoreError::Validation(
            "frames_per_chunk must be > 0".to_string(),
        ));
    }
    let chunks = (0..total_frames)
        .step_by(frames_per_chunk as usize)
        .map(|start| FrameRange {
            start,
            end: (start + frames_per_chunk).min(total_frames),
        })
        .collect();
    Ok(chunks)
}

/// Position index in a game: 0 is the starting position, `n` is the position
/// after the `n`-th half-move.
pub type Ply = usize;

/// Global frame number within a rendered video.
pub type FrameIndex = u64;

/// Durations are specified in whole milliseconds so every call site converts
/// them to frames with the same integer arithmetic.
pub type Millis = u64;

/// Convert a millisecond duration to a frame count at `fps`, rounding half up.
/// Saturates instead of overflowing.
pub fn millis_to_frames(millis: Millis, fps: u32) -> FrameIndex {
    millis.saturating_mul(u64::from(fps)).saturating_add(500) / 1000
}

/// Whole seconds elapsed at the start of `frame` (floor).
pub fn frame_to_seconds(frame: FrameIndex, fps: u32) -> u64 {
    if fps == 0 {
        return 0;
    }
    frame / fps as u64
}

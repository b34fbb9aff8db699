//! Frame rendering across chunks.
//!
//! Each chunk is resolved on the blocking pool with no shared mutable
//! state; the compiled job is read-only behind an `Arc`. Output is stitched
//! back together in chunk order.

use std::io::Write;
use std::sync::Arc;

use chessreel_core::frame_state::FrameState;
use chessreel_core::job::CompiledJob;
use chessreel_core::partition::{partition_frames, FrameRange};

use crate::error::WorkerError;

/// Clamp `range` to the video's frame count.
pub fn clamp_range(range: FrameRange, total_frames: u64) -> FrameRange {
    FrameRange {
        start: range.start.min(total_frames),
        end: range.end.min(total_frames),
    }
}

/// Resolve every frame of `range` on the current thread.
pub fn render_sequential(job: &CompiledJob, range: FrameRange) -> Vec<FrameState> {
    job.render_range(clamp_range(range, job.total_frames()))
}

/// Resolve the whole video, one blocking task per chunk.
pub async fn render_concurrently(
    job: Arc<CompiledJob>,
    frames_per_chunk: u64,
) -> Result<Vec<FrameState>, WorkerError> {
    let chunks = partition_frames(job.total_frames(), frames_per_chunk)?;
    tracing::info!(
        chunks = chunks.len(),
        frames_per_chunk,
        total_frames = job.total_frames(),
        "Rendering chunks",
    );

    let tasks = chunks.into_iter().map(|range| {
        let job = Arc::clone(&job);
        tokio::task::spawn_blocking(move || job.render_range(range))
    });
    let rendered = futures::future::try_join_all(tasks).await?;

    Ok(rendered.into_iter().flatten().collect())
}

/// Write frames as JSON lines.
pub fn write_frames<W: Write>(frames: &[FrameState], mut out: W) -> Result<(), WorkerError> {
    for frame in frames {
        serde_json::to_writer(&mut out, frame)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(())
}

//! One compiled presentation job.
//!
//! [`CompiledJob::compile`] runs the whole pipeline once: replay into the
//! position cache, critical moment detection, timeline layout and chapter
//! compilation. Everything it holds is read-only afterwards, so a job can
//! be shared across render threads behind an `Arc`.

use crate::chapters::{compile_chapters, description_block, Chapter};
use crate::critical::{detect_critical_moments, CriticalMoment};
use crate::duration;
use crate::error::CoreError;
use crate::frame_state::{resolve_frame, FrameState};
use crate::game::GameRecord;
use crate::partition::FrameRange;
use crate::policy::{validate_fps, TimelinePolicy};
use crate::replay::{PositionCache, ReplayEngine, ReplayWarning};
use crate::timeline::Timeline;
use crate::types::{FrameIndex, Ply};

#[derive(Debug, Clone)]
pub struct CompiledJob {
    game: GameRecord,
    policy: TimelinePolicy,
    moments: Vec<CriticalMoment>,
    cache: PositionCache,
    timeline: Timeline,
    chapters: Vec<Chapter>,
}

impl CompiledJob {
    /// Validate the inputs and compile the job.
    ///
    /// Only configuration errors are reported. Bad moves freeze the position
    /// cache and surface through [`CompiledJob::replay_warning`].
    pub fn compile(
        game: GameRecord,
        policy: TimelinePolicy,
        fps: u32,
        engine: &dyn ReplayEngine,
    ) -> Result<Self, CoreError> {
        validate_fps(fps)?;
        policy.validate()?;

        let cache = PositionCache::build(engine, &game.moves);
        let moments = if policy.uses_critical_moments() {
            detect_critical_moments(&game.evaluations, &policy.detector)
        } else {
            Vec::new()
        };

        let timeline = Timeline::build(&game, &moments, &policy, fps);
        timeline.validate()?;

        let expected = duration::total_frames(&game, &moments, &policy, fps);
        if expected != timeline.total_frames() {
            return Err(CoreError::Internal(format!(
                "duration mismatch: calculator {expected}, timeline {}",
                timeline.total_frames()
            )));
        }

        let chapters = compile_chapters(&timeline, &game, &policy.chapters);

        tracing::info!(
            policy = %policy.kind,
            fps,
            plies = game.ply_count(),
            moments = moments.len(),
            chapters = chapters.len(),
            total_frames = timeline.total_frames(),
            replay_frozen = cache.is_frozen(),
            "Job compiled",
        );

        Ok(Self {
            game,
            policy,
            moments,
            cache,
            timeline,
            chapters,
        })
    }

    pub fn game(&self) -> &GameRecord {
        &self.game
    }

    pub fn policy(&self) -> &TimelinePolicy {
        &self.policy
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn fps(&self) -> u32 {
        self.timeline.fps()
    }

    pub fn total_frames(&self) -> FrameIndex {
        self.timeline.total_frames()
    }

    pub fn moments(&self) -> &[CriticalMoment] {
        &self.moments
    }

    pub fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }

    pub fn description_block(&self) -> String {
        description_block(&self.chapters)
    }

    pub fn fingerprint(&self) -> String {
        self.timeline.fingerprint()
    }

    pub fn replay_warning(&self) -> Option<&ReplayWarning> {
        self.cache.warning()
    }

    /// Cached position at `ply`.
    pub fn position(&self, ply: Ply) -> Result<&str, CoreError> {
        let ply_count = self.cache.ply_count();
        if ply > ply_count {
            return Err(CoreError::PlyOutOfRange { ply, ply_count });
        }
        Ok(self.cache.position(ply))
    }

    pub fn resolve_frame(&self, frame: FrameIndex) -> FrameState {
        resolve_frame(frame, &self.timeline, &self.cache, &self.policy)
    }

    /// Resolve every frame of one render chunk.
    pub fn render_range(&self, range: FrameRange) -> Vec<FrameState> {
        range.frames().map(|f| self.resolve_frame(f)).collect()
    }
}

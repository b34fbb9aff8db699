//! Worker runtime configuration.

use std::path::PathBuf;
use std::str::FromStr;

use chessreel_core::partition::{FrameRange, DEFAULT_FRAMES_PER_CHUNK};
use chessreel_core::policy::validate_fps;

use crate::error::WorkerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerMode {
    /// Print job metadata and the chunk plan.
    Plan,
    /// Resolve a frame range and print one frame state per line.
    Render,
}

impl FromStr for WorkerMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "plan" => Ok(Self::Plan),
            "render" => Ok(Self::Render),
            _ => Err("expected 'plan' or 'render'".to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    pub job_path: PathBuf,
    pub mode: WorkerMode,
    /// Frame range to render; the whole video when unset.
    pub range: Option<FrameRange>,
    pub frames_per_chunk: u64,
    /// Replaces the job file's `fps` when set.
    pub fps_override: Option<u32>,
}

impl WorkerConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable           | Required | Default |
    /// |--------------------|----------|---------|
    /// | `JOB_PATH`         | yes      | --      |
    /// | `WORKER_MODE`      | no       | `plan`  |
    /// | `RANGE_START`      | no       | --      |
    /// | `RANGE_END`        | no       | --      |
    /// | `FRAMES_PER_CHUNK` | no       | `100`   |
    /// | `FPS_OVERRIDE`     | no       | --      |
    ///
    /// `RANGE_START` and `RANGE_END` must be set together.
    pub fn from_env() -> Result<Self, WorkerError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`WorkerConfig::from_env`] with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, WorkerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let job_path = lookup("JOB_PATH")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .ok_or(WorkerError::MissingEnv("JOB_PATH"))?;

        let mode = parse_var(&lookup, "WORKER_MODE")?.unwrap_or(WorkerMode::Plan);

        let frames_per_chunk =
            parse_var(&lookup, "FRAMES_PER_CHUNK")?.unwrap_or(DEFAULT_FRAMES_PER_CHUNK);
        if frames_per_chunk == 0 {
            return Err(invalid("FRAMES_PER_CHUNK", "0", "must be > 0"));
        }

        let fps_override: Option<u32> = parse_var(&lookup, "FPS_OVERRIDE")?;
        if let Some(fps) = fps_override {
            validate_fps(fps)
                .map_err(|e| invalid("FPS_OVERRIDE", &fps.to_string(), &e.to_string()))?;
        }

        let start: Option<u64> = parse_var(&lookup, "RANGE_START")?;
        let end: Option<u64> = parse_var(&lookup, "RANGE_END")?;
        let range = match (start, end) {
            (None, None) => None,
            (Some(start), Some(end)) if start < end => Some(FrameRange { start, end }),
            (Some(start), Some(end)) => {
                return Err(invalid(
                    "RANGE_END",
                    &end.to_string(),
                    &format!("must be greater than RANGE_START ({start})"),
                ))
            }
            (Some(_), None) => return Err(WorkerError::MissingEnv("RANGE_END")),
            (None, Some(_)) => return Err(WorkerError::MissingEnv("RANGE_START")),
        };

        Ok(Self {
            job_path,
            mode,
            range,
            frames_per_chunk,
            fps_override,
        })
    }
}

fn parse_var<F, T>(lookup: &F, name: &'static str) -> Result<Option<T>, WorkerError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| invalid(name, &raw, &e.to_string())),
    }
}

fn invalid(name: &'static str, value: &str, reason: &str) -> WorkerError {
    WorkerError::InvalidEnv {
        name,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<WorkerConfig, WorkerError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        WorkerConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_with_only_job_path() {
        let config = config(&[("JOB_PATH", "job.json")]).unwrap();
        assert_eq!(config.job_path, PathBuf::from("job.json"));
        assert_eq!(config.mode, WorkerMode::Plan);
        assert_eq!(config.frames_per_chunk, DEFAULT_FRAMES_PER_CHUNK);
        assert!(config.range.is_none());
        assert!(config.fps_override.is_none());
    }

    #[test]
    fn job_path_is_required() {
        assert_matches!(config(&[]), Err(WorkerError::MissingEnv("JOB_PATH")));
    }

    #[test]
    fn render_mode_with_range() {
        let config = config(&[
            ("JOB_PATH", "job.json"),
            ("WORKER_MODE", "render"),
            ("RANGE_START", "100"),
            ("RANGE_END", "200"),
            ("FPS_OVERRIDE", "60"),
        ])
        .unwrap();
        assert_eq!(config.mode, WorkerMode::Render);
        assert_eq!(config.range, Some(FrameRange { start: 100, end: 200 }));
        assert_eq!(config.fps_override, Some(60));
    }

    #[test]
    fn half_open_range_is_rejected() {
        assert_matches!(
            config(&[("JOB_PATH", "j"), ("RANGE_START", "10")]),
            Err(WorkerError::MissingEnv("RANGE_END"))
        );
        assert_matches!(
            config(&[("JOB_PATH", "j"), ("RANGE_START", "10"), ("RANGE_END", "10")]),
            Err(WorkerError::InvalidEnv { name: "RANGE_END", .. })
        );
    }

    #[test]
    fn bad_values_are_rejected() {
        assert_matches!(
            config(&[("JOB_PATH", "j"), ("WORKER_MODE", "preview")]),
            Err(WorkerError::InvalidEnv { name: "WORKER_MODE", .. })
        );
        assert_matches!(
            config(&[("JOB_PATH", "j"), ("FRAMES_PER_CHUNK", "0")]),
            Err(WorkerError::InvalidEnv { name: "FRAMES_PER_CHUNK", .. })
        );
        assert_matches!(
            config(&[("JOB_PATH", "j"), ("FPS_OVERRIDE", "500")]),
            Err(WorkerError::InvalidEnv { name: "FPS_OVERRIDE", .. })
        );
    }
}

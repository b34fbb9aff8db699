//! `chessreel-worker` -- stateless render worker.
//!
//! Loads one job file, compiles its presentation timeline and either prints
//! the job plan (`plan` mode) or resolves a frame range to JSON-lines frame
//! states (`render` mode). See [`WorkerConfig::from_env`] for variables.
//!
//! Logs go to stderr; stdout carries only job output.

use std::sync::Arc;

use chessreel_worker::config::{WorkerConfig, WorkerMode};
use chessreel_worker::error::WorkerError;
use chessreel_worker::job::{JobPlan, RenderJob};
use chessreel_worker::render;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chessreel_worker=info,chessreel_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run().await {
        tracing::error!(error = %e, "Worker failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), WorkerError> {
    let config = WorkerConfig::from_env()?;

    tracing::info!(
        job_path = %config.job_path.display(),
        mode = ?config.mode,
        frames_per_chunk = config.frames_per_chunk,
        "Starting chessreel-worker",
    );

    let job = RenderJob::load(&config.job_path).await?;
    let compiled = Arc::new(job.compile(config.fps_override)?);
    let stdout = std::io::stdout();

    match config.mode {
        WorkerMode::Plan => {
            let plan = JobPlan::build(&compiled, config.frames_per_chunk)?;
            serde_json::to_writer_pretty(stdout.lock(), &plan)?;
            println!();
        }
        WorkerMode::Render => {
            let frames = match config.range {
                Some(range) => render::render_sequential(&compiled, range),
                None => {
                    render::render_concurrently(Arc::clone(&compiled), config.frames_per_chunk)
                        .await?
                }
            };
            tracing::info!(frames = frames.len(), "Frames resolved");
            render::write_frames(&frames, stdout.lock())?;
        }
    }

    Ok(())
}

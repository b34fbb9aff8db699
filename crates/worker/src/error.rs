use chessreel_core::error::CoreError;

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("{0} environment variable is required")]
    MissingEnv(&'static str),

    #[error("{name} has an invalid value '{value}': {reason}")]
    InvalidEnv {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Invalid job: {0}")]
    InvalidJob(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Render task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

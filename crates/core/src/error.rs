use crate::types::Ply;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Movetext parse failed at token {index} ('{token}'): {reason}")]
    Parse {
        index: usize,
        token: String,
        reason: String,
    },

    #[error("Ply {ply} is out of range (game has {ply_count} plies)")]
    PlyOutOfRange { ply: Ply, ply_count: Ply },

    #[error("Internal error: {0}")]
    Internal(String),
}

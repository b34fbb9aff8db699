//! `chessreel-worker` library crate.
//!
//! Job loading, planning and chunk rendering, exposed for integration
//! testing. The binary entrypoint lives in `main.rs`.

pub mod config;
pub mod error;
pub mod job;
pub mod render;

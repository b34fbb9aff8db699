//! Presentation timeline compiler for chess game videos.
//!
//! Turns a game record (moves, evaluations, annotations) into a
//! frame-accurate segment timeline, resolves any frame to its visual state,
//! and derives the chapter list for the video description. All modules are
//! pure and synchronous.

pub mod chapters;
pub mod critical;
pub mod duration;
pub mod error;
pub mod frame_state;
pub mod game;
pub mod job;
pub mod partition;
pub mod policy;
pub mod replay;
pub mod timeline;
pub mod types;

//! Camera emotion tally.
//!
//! Frames from a camera or video file are fanned out over a fixed pool of
//! inference workers. Each worker owns its own face detection and emotion
//! classification networks plus a private frame buffer, and is checked out
//! by exactly one prediction task at a time.

pub mod config;
pub mod pipeline;
pub mod report;
#[cfg(feature = "opencv")]
pub mod session;
pub mod video;

//! # Scheduler Module
//!
//! Walks the fixed number of animation steps, renders each one, and pushes the
//! resulting frames into a [`FrameSink`] with real-time or free-running pacing.

pub mod clock;
pub mod pacing;

pub use clock::{FrameSink, Scheduler};
pub use pacing::PacingMode;

//! # Recording Pipeline
//!
//! Ties the scheduler, an encoder adapter, the chunk collector and the
//! artifact writer into one run. Backends come from a [`BackendProvider`], so
//! the same pipeline records with ffmpeg or entirely in memory.

pub mod backends;
pub mod recorder;
pub mod report;

pub use backends::{BackendProvider, FfmpegBackends, MemoryBackends};
pub use recorder::RecordingPipeline;
pub use report::RunReport;

//! # Canvas-Recorder
//!
//! Render a deterministic, parameterized animation frame by frame and export
//! it either as a muxed video container or as a raw H.264 bitstream.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use canvas_recorder::{
//!     animation::ColorsAnimation,
//!     config::Config,
//!     pipeline::RecordingPipeline,
//! };
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let config = Config::default();
//! let pipeline = RecordingPipeline::new(config, Box::new(ColorsAnimation::new()));
//! let report = pipeline.record().await?;
//! println!("saved {}", report.artifact_path.display());
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`animation`] - Timing parameters, drawing surface, frames and frame sources
//! - [`scheduler`] - Fixed-count step loop with real-time or free-running pacing
//! - [`encoder`] - Encoder lifecycle, format negotiation and backends
//! - [`output`] - Chunk collection, artifact assembly and download
//! - [`audio`] - Tone track generation
//! - [`pipeline`] - The end-to-end recording run
//! - [`config`] - Configuration management
//!
//! ## Custom Animations
//!
//! Anything implementing [`FrameSource`](animation::FrameSource) can be
//! recorded, including plain closures:
//!
//! ```rust
//! use canvas_recorder::animation::{FrameSource, Surface};
//!
//! let fade = |surface: &mut Surface, progress: f64| -> canvas_recorder::Result<()> {
//!     let level = (progress * 255.0) as u8;
//!     for pixel in surface.image_mut().pixels_mut() {
//!         pixel.0 = [level, level, level, 255];
//!     }
//!     Ok(())
//! };
//! assert_eq!(fade.name(), "closure");
//! ```

pub mod animation;
pub mod audio;
pub mod config;
pub mod encoder;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod scheduler;

// Re-export commonly used types for convenience
pub use crate::{
    animation::{AnimationParameters, Frame, FrameSource},
    config::Config,
    encoder::{EncoderAdapter, EncoderMode},
    error::{RecorderError, Result},
    pipeline::{RecordingPipeline, RunReport},
    scheduler::PacingMode,
};

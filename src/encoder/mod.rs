//! # Encoder Module
//!
//! Everything between a rendered [`Frame`](crate::animation::Frame) and an
//! encoded chunk. Two recording strategies share one lifecycle:
//!
//! - **Streaming capture** ([`StreamingCapture`]): negotiates a container from
//!   an ordered candidate list and lets a muxing recorder emit container bytes
//!   on its own schedule.
//! - **Explicit encode** ([`ExplicitEncoder`]): configures a raw H.264 encoder
//!   and emits one access unit per frame.
//!
//! Both run their backend on a blocking worker behind a bounded queue, so
//! `encode` suspends when the encoder falls behind.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use canvas_recorder::encoder::{EncoderAdapter, EncoderSettings, ExplicitEncoder, MemoryBackend};
//! use canvas_recorder::output::ChunkCollector;
//!
//! # #[tokio::main]
//! # async fn main() -> canvas_recorder::Result<()> {
//! let collector = ChunkCollector::new();
//! let mut encoder = ExplicitEncoder::new(MemoryBackend::new(), Arc::new(collector.clone()), 8);
//! encoder.configure(&EncoderSettings {
//!     codec: "h264".to_string(),
//!     width: 640,
//!     height: 360,
//!     framerate: 60,
//!     crf: 23,
//!     keyframe_interval: 60,
//!     duration_seconds: 4.0,
//! }).await?;
//! # Ok(())
//! # }
//! ```

use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub mod adapter;
pub mod annexb;
pub mod backend;
pub mod explicit;
pub mod ffmpeg;
pub mod format;
pub mod memory;
pub mod state;
pub mod streaming;
mod worker;

pub use adapter::{Adapter, EncoderAdapter, OutputFormat};
pub use backend::{BitstreamBackend, CaptureBackend, EncoderBackend, EncoderSettings};
pub use explicit::ExplicitEncoder;
pub use ffmpeg::{FfmpegBitstreamBackend, FfmpegCaptureBackend, FfmpegProbe, LazyFfmpegProbe};
pub use format::{default_candidates, negotiate, FormatCandidate, FormatProbe};
pub use memory::MemoryBackend;
pub use state::AdapterState;
pub use streaming::StreamingCapture;

/// Which recording strategy a run uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncoderMode {
    /// Muxed container from a capture-stream recorder
    Streaming,
    /// Raw H.264 bitstream from a frame-by-frame encoder
    Explicit,
}

impl EncoderMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Streaming => "streaming",
            Self::Explicit => "explicit",
        }
    }
}

impl FromStr for EncoderMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "streaming" | "stream" | "capture" => Ok(Self::Streaming),
            "explicit" | "raw" | "h264" => Ok(Self::Explicit),
            other => Err(format!("unknown encoder mode '{}' (expected streaming or explicit)", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_parsing() {
        assert_eq!("streaming".parse::<EncoderMode>().unwrap(), EncoderMode::Streaming);
        assert_eq!("Explicit".parse::<EncoderMode>().unwrap(), EncoderMode::Explicit);
        assert!("mp4".parse::<EncoderMode>().is_err());
    }
}

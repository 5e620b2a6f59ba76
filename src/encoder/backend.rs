use std::sync::Arc;

use crate::{
    animation::Frame,
    encoder::format::FormatCandidate,
    error::Result,
    output::ChunkObserver,
};

/// Parameters an encoder is configured with before the first frame
#[derive(Debug, Clone, PartialEq)]
pub struct EncoderSettings {
    /// Codec name, `h264` for the raw bitstream encoder
    pub codec: String,
    pub width: u32,
    pub height: u32,
    pub framerate: u32,
    /// x264 constant rate factor
    pub crf: u8,
    /// Frames between requested keyframes
    pub keyframe_interval: u64,
    /// Length of the run, used to size auxiliary tracks
    pub duration_seconds: f64,
}

/// Frame-consuming half of an encoder backend
///
/// After `start` returns, every method runs on the encode worker thread, so
/// implementations may block. Chunks are reported through the observer passed
/// to `start`, from whichever thread produces them.
pub trait EncoderBackend: Send + 'static {
    /// Acquire resources (processes, files) and begin accepting frames
    fn start(&mut self, observer: Arc<dyn ChunkObserver>) -> Result<()>;

    /// Consume one frame; frames arrive in strictly increasing timestamp order
    fn encode(&mut self, frame: Frame) -> Result<()>;

    /// Ask the backend to hand over whatever output it has buffered so far
    fn request_data(&mut self) -> Result<()> {
        Ok(())
    }

    /// Drain all buffered frames into chunks and release resources
    fn finish(&mut self) -> Result<()>;

    /// Release resources without draining
    fn abort(&mut self) {}
}

/// Explicit frame-by-frame encoder producing a raw bitstream
pub trait BitstreamBackend: EncoderBackend {
    /// Validate settings against what the platform can do
    ///
    /// Fails with `UnsupportedConfig` if the settings cannot be satisfied.
    fn configure(&mut self, settings: &EncoderSettings) -> Result<()>;
}

/// Capture-stream recorder producing a muxed container
pub trait CaptureBackend: EncoderBackend {
    /// Fix the container/codec combination and frame geometry for the run
    fn select_format(&mut self, format: &FormatCandidate, settings: &EncoderSettings) -> Result<()>;
}

impl<B: EncoderBackend + ?Sized> EncoderBackend for Box<B> {
    fn start(&mut self, observer: Arc<dyn ChunkObserver>) -> Result<()> {
        (**self).start(observer)
    }

    fn encode(&mut self, frame: Frame) -> Result<()> {
        (**self).encode(frame)
    }

    fn request_data(&mut self) -> Result<()> {
        (**self).request_data()
    }

    fn finish(&mut self) -> Result<()> {
        (**self).finish()
    }

    fn abort(&mut self) {
        (**self).abort()
    }
}

impl<B: BitstreamBackend + ?Sized> BitstreamBackend for Box<B> {
    fn configure(&mut self, settings: &EncoderSettings) -> Result<()> {
        (**self).configure(settings)
    }
}

impl<B: CaptureBackend + ?Sized> CaptureBackend for Box<B> {
    fn select_format(&mut self, format: &FormatCandidate, settings: &EncoderSettings) -> Result<()> {
        (**self).select_format(format, settings)
    }
}

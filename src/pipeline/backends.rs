use crate::{
    audio::ToneGenerator,
    config::Config,
    encoder::{
        BitstreamBackend, CaptureBackend, FfmpegBitstreamBackend, FfmpegCaptureBackend, FormatProbe,
        LazyFfmpegProbe, MemoryBackend,
    },
};

/// Supplies the backends and format probe for one run
///
/// Each call hands out fresh instances; a backend is consumed by the run that
/// uses it.
pub trait BackendProvider: Send + Sync {
    fn name(&self) -> &str;

    fn capture_backend(&self, config: &Config) -> Box<dyn CaptureBackend>;

    fn bitstream_backend(&self, config: &Config) -> Box<dyn BitstreamBackend>;

    fn format_probe(&self, config: &Config) -> Box<dyn FormatProbe>;

    /// Backends that only simulate encoding; their output is not playable media
    fn simulated(&self) -> bool {
        false
    }
}

/// Encodes with the ffmpeg executable from the configuration
#[derive(Debug, Clone, Copy, Default)]
pub struct FfmpegBackends;

impl BackendProvider for FfmpegBackends {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    fn capture_backend(&self, config: &Config) -> Box<dyn CaptureBackend> {
        let tone = config
            .audio
            .enabled
            .then(|| ToneGenerator::from_config(&config.audio));
        Box::new(FfmpegCaptureBackend::new(&config.encoder.ffmpeg_path, tone))
    }

    fn bitstream_backend(&self, config: &Config) -> Box<dyn BitstreamBackend> {
        Box::new(FfmpegBitstreamBackend::new(&config.encoder.ffmpeg_path))
    }

    fn format_probe(&self, config: &Config) -> Box<dyn FormatProbe> {
        Box::new(LazyFfmpegProbe::new(&config.encoder.ffmpeg_path, config.audio.enabled))
    }
}

/// In-process backends for dry runs; every candidate format is accepted
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryBackends;

impl BackendProvider for MemoryBackends {
    fn name(&self) -> &str {
        "memory"
    }

    fn capture_backend(&self, _config: &Config) -> Box<dyn CaptureBackend> {
        Box::new(MemoryBackend::new())
    }

    fn bitstream_backend(&self, _config: &Config) -> Box<dyn BitstreamBackend> {
        Box::new(MemoryBackend::new())
    }

    fn format_probe(&self, _config: &Config) -> Box<dyn FormatProbe> {
        Box::new(|_: &crate::encoder::FormatCandidate| true)
    }

    fn simulated(&self) -> bool {
        true
    }
}

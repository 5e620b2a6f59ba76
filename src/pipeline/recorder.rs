use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::{
    animation::{FrameSource, PixelBuffer, Surface, KEYFRAME_INTERVAL},
    config::Config,
    encoder::{
        default_candidates, Adapter, EncoderAdapter, EncoderMode, EncoderSettings, ExplicitEncoder,
        StreamingCapture,
    },
    error::{EncoderError, RenderError, Result},
    output::{ArtifactWriter, ChunkCollector, OutputAssembler},
    pipeline::{
        backends::{BackendProvider, FfmpegBackends},
        report::RunReport,
    },
    scheduler::Scheduler,
};

/// Simulated backends write placeholder bytes, saved under this extra suffix
pub const SIMULATED_SUFFIX: &str = "dry-run";
const SIMULATED_MIME: &str = "application/octet-stream";

/// Runs one recording from first frame to saved artifact
///
/// The pipeline follows a fixed order:
/// 1. Setup - validate configuration, size the surface, build the adapter
/// 2. Configure - negotiate format / configure the encoder before rendering
/// 3. Record - schedule every frame through the adapter, then flush and close
/// 4. Assemble - concatenate collected chunks into one artifact
/// 5. Download - write the artifact into the output directory
///
/// Any failure aborts the run: the adapter is flushed and closed best-effort,
/// collected chunks are discarded and no file is written.
pub struct RecordingPipeline<P = FfmpegBackends> {
    config: Config,
    source: Box<dyn FrameSource>,
    backends: P,
}

impl RecordingPipeline<FfmpegBackends> {
    pub fn new(config: Config, source: Box<dyn FrameSource>) -> Self {
        Self::with_backends(config, source, FfmpegBackends)
    }
}

impl<P: BackendProvider> RecordingPipeline<P> {
    pub fn with_backends(config: Config, source: Box<dyn FrameSource>, backends: P) -> Self {
        Self {
            config,
            source,
            backends,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Settings handed to the encoder for a surface of the given size
    pub fn encoder_settings(&self, width: u32, height: u32) -> EncoderSettings {
        EncoderSettings {
            codec: "h264".to_string(),
            width,
            height,
            framerate: self.config.animation.fps,
            crf: self.config.encoder.crf(),
            keyframe_interval: KEYFRAME_INTERVAL,
            duration_seconds: self.config.animation.duration_seconds,
        }
    }

    /// Build the adapter for the configured mode, reporting to `collector`
    pub fn build_adapter(&self, collector: &ChunkCollector) -> Adapter {
        let observer = Arc::new(collector.clone());
        let backlog = self.config.encoder.backlog;

        match self.config.encoder.mode {
            EncoderMode::Streaming => Adapter::Streaming(StreamingCapture::new(
                self.backends.capture_backend(&self.config),
                observer,
                backlog,
                default_candidates(),
                self.backends.format_probe(&self.config),
            )),
            EncoderMode::Explicit => Adapter::Explicit(ExplicitEncoder::new(
                self.backends.bitstream_backend(&self.config),
                observer,
                backlog,
            )),
        }
    }

    /// Record the whole animation and save it
    pub async fn record(&self) -> Result<RunReport> {
        let started_at = chrono::Local::now();
        let timer = Instant::now();

        info!("Starting recording");
        info!("   Source: {}", self.source.name());
        info!("   Mode: {} ({} backends)", self.config.encoder.mode.as_str(), self.backends.name());
        info!("   Output: {}", self.config.output.directory.display());

        // Step 1: Setup
        self.config.validate()?;
        let params = self.config.animation.parameters()?;
        let (width, height) = self.config.animation.surface_size();
        let surface = Surface::new(width, height)?;
        debug!(
            "Surface {}x{} (logical {}x{} at {}x)",
            width,
            height,
            self.config.animation.width,
            self.config.animation.height,
            self.config.animation.device_pixel_ratio
        );

        let collector = ChunkCollector::new();
        let mut adapter = self.build_adapter(&collector);

        // Step 2: Configure before anything is rendered
        if let Err(e) = adapter.configure(&self.encoder_settings(width, height)).await {
            warn!("Encoder setup failed: {}", e);
            if let Err(close_err) = adapter.close().await {
                warn!("Closing adapter after failed setup: {}", close_err);
            }
            collector.discard();
            return Err(e);
        }

        // Step 3: Record
        let mut scheduler = Scheduler::new(params, self.config.pacing.mode, surface);
        let frames = match scheduler.run(&*self.source, &mut adapter).await {
            Ok(frames) => frames,
            Err(e) => {
                let dropped = collector.count();
                collector.discard();
                warn!("Recording aborted, discarded {} chunks: {}", dropped, e);
                return Err(e);
            }
        };

        // Step 4: Assemble
        let format = adapter
            .output_format()
            .ok_or_else(|| EncoderError::fault("adapter finished without an output format"))?;
        let (mime_type, filename) = if self.backends.simulated() {
            (SIMULATED_MIME.to_string(), format!("{}.{}", format.filename, SIMULATED_SUFFIX))
        } else {
            (format.mime_type, format.filename)
        };
        let chunks = collector.take();
        let chunk_count = chunks.len();
        let artifact = OutputAssembler::assemble(&chunks, &mime_type, &filename);
        drop(chunks);
        info!("Assembled {} chunks into {} bytes", chunk_count, artifact.len());

        // Step 5: Download
        let writer = ArtifactWriter::new(&self.config.output.directory);
        let artifact_path = writer.save(&artifact).await?;

        let report = RunReport {
            artifact_path,
            mime_type: artifact.mime_type.clone(),
            bytes: artifact.len(),
            chunks: chunk_count,
            frames,
            mode: self.config.encoder.mode,
            pacing: self.config.pacing.mode,
            started_at,
            elapsed: timer.elapsed(),
        };
        report.log();
        Ok(report)
    }

    /// Render a single frame at `progress` without encoding anything
    pub fn render_frame(&self, progress: f64) -> Result<PixelBuffer> {
        if !(0.0..=1.0).contains(&progress) {
            return Err(RenderError::SourceFailed {
                progress,
                reason: "progress must be within [0, 1]".to_string(),
            }
            .into());
        }

        self.config.validate()?;
        let (width, height) = self.config.animation.surface_size();
        let mut surface = Surface::new(width, height)?;
        self.source.render(&mut surface, progress)?;
        Ok(surface.snapshot())
    }

    /// Render a single frame at `progress` and save it as PNG
    pub fn preview<Q: AsRef<Path>>(&self, progress: f64, path: Q) -> Result<PixelBuffer> {
        let path = path.as_ref();
        let pixels = self.render_frame(progress)?;

        pixels.save_png(path).map_err(|e| {
            warn!("Preview save failed: {}", e);
            RenderError::PreviewFailed {
                path: path.display().to_string(),
            }
        })?;

        info!("Preview at progress {:.3} saved to {}", progress, path.display());
        Ok(pixels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::ColorsAnimation;
    use crate::pipeline::backends::MemoryBackends;
    use crate::scheduler::PacingMode;
    use tempfile::tempdir;

    fn config(mode: EncoderMode, directory: &Path) -> Config {
        let mut config = Config::default();
        config.animation.fps = 30;
        config.animation.duration_seconds = 1.0;
        config.animation.width = 32;
        config.animation.height = 18;
        config.encoder.mode = mode;
        config.pacing.mode = PacingMode::FreeRunning;
        config.output.directory = directory.to_path_buf();
        config
    }

    #[tokio::test]
    async fn test_dry_run_explicit() {
        let dir = tempdir().unwrap();
        let pipeline = RecordingPipeline::with_backends(
            config(EncoderMode::Explicit, dir.path()),
            Box::new(ColorsAnimation::new()),
            MemoryBackends,
        );

        let report = pipeline.record().await.unwrap();
        assert_eq!(report.frames, 30);
        assert_eq!(report.chunks, 30);
        assert_eq!(report.mime_type, "application/octet-stream");
        assert_eq!(report.artifact_path, dir.path().join("encoded.h264.dry-run"));
        assert_eq!(std::fs::read(&report.artifact_path).unwrap().len(), report.bytes);
    }

    #[tokio::test]
    async fn test_dry_run_streaming() {
        let dir = tempdir().unwrap();
        let pipeline = RecordingPipeline::with_backends(
            config(EncoderMode::Streaming, dir.path()),
            Box::new(ColorsAnimation::new()),
            MemoryBackends,
        );

        let report = pipeline.record().await.unwrap();
        assert_eq!(report.mime_type, "application/octet-stream");
        assert_eq!(report.artifact_path, dir.path().join("video.mp4.dry-run"));
        assert!(!dir.path().join("video.mp4").exists());
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected_before_recording() {
        let dir = tempdir().unwrap();
        let mut config = config(EncoderMode::Explicit, dir.path());
        config.animation.fps = 0;

        let pipeline = RecordingPipeline::with_backends(config, Box::new(ColorsAnimation::new()), MemoryBackends);
        assert!(pipeline.record().await.is_err());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_preview_png() {
        let dir = tempdir().unwrap();
        let mut config = config(EncoderMode::Explicit, dir.path());
        config.animation.device_pixel_ratio = 2.0;
        let pipeline = RecordingPipeline::with_backends(config, Box::new(ColorsAnimation::new()), MemoryBackends);

        let path = dir.path().join("preview.png");
        let pixels = pipeline.preview(0.5, &path).unwrap();
        assert_eq!((pixels.width(), pixels.height()), (64, 36));

        let decoded = image::open(&path).unwrap().to_rgba8();
        assert_eq!(decoded.as_raw().as_slice(), pixels.as_bytes());
    }

    #[test]
    fn test_preview_rejects_out_of_range_progress() {
        let dir = tempdir().unwrap();
        let pipeline = RecordingPipeline::with_backends(
            config(EncoderMode::Explicit, dir.path()),
            Box::new(ColorsAnimation::new()),
            MemoryBackends,
        );
        assert!(pipeline.render_frame(1.5).is_err());
        assert!(pipeline.render_frame(-0.1).is_err());
    }
}

use std::path::Path;
use std::sync::{Arc, Mutex};

use canvas_recorder::{
    animation::{ColorsAnimation, Surface},
    config::Config,
    encoder::{
        annexb::AccessUnitSplitter,
        memory::{MemoryBackend, MemoryEvent, MemoryLog},
        BitstreamBackend, CaptureBackend, EncoderMode, FormatCandidate, FormatProbe,
    },
    error::{EncoderError, RecorderError},
    pipeline::{BackendProvider, MemoryBackends, RecordingPipeline},
    scheduler::PacingMode,
};
use tempfile::tempdir;

fn config(mode: EncoderMode, fps: u32, duration: f64, directory: &Path) -> Config {
    let mut config = Config::default();
    config.animation.fps = fps;
    config.animation.duration_seconds = duration;
    config.animation.width = 64;
    config.animation.height = 36;
    config.encoder.mode = mode;
    config.encoder.backlog = 4;
    config.pacing.mode = PacingMode::FreeRunning;
    config.output.directory = directory.to_path_buf();
    config
}

/// Memory backends with failure injection and a shared call log
#[derive(Default)]
struct ScriptedBackends {
    fail_at_frame: Option<u64>,
    no_formats: bool,
    log: Mutex<Option<MemoryLog>>,
}

impl ScriptedBackends {
    fn backend(&self) -> MemoryBackend {
        let backend = match self.fail_at_frame {
            Some(index) => MemoryBackend::new().failing_at(index),
            None => MemoryBackend::new(),
        };
        *self.log.lock().unwrap() = Some(backend.log());
        backend
    }

    fn log(&self) -> MemoryLog {
        self.log.lock().unwrap().clone().expect("backend was never built")
    }
}

impl BackendProvider for ScriptedBackends {
    fn name(&self) -> &str {
        "scripted"
    }

    fn capture_backend(&self, _config: &Config) -> Box<dyn CaptureBackend> {
        Box::new(self.backend())
    }

    fn bitstream_backend(&self, _config: &Config) -> Box<dyn BitstreamBackend> {
        Box::new(self.backend())
    }

    fn format_probe(&self, _config: &Config) -> Box<dyn FormatProbe> {
        let accept = !self.no_formats;
        Box::new(move |_: &FormatCandidate| accept)
    }
}

/// Records every progress value it is asked to render
fn recording_source(seen: Arc<Mutex<Vec<f64>>>) -> impl Fn(&mut Surface, f64) -> canvas_recorder::Result<()> {
    move |surface: &mut Surface, progress: f64| {
        seen.lock().unwrap().push(progress);
        let level = (progress * 255.0) as u8;
        for pixel in surface.image_mut().pixels_mut() {
            pixel.0 = [level, 0, 255 - level, 255];
        }
        Ok(())
    }
}

fn files_in(dir: &Path) -> Vec<String> {
    std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect()
}

#[tokio::test]
async fn test_four_seconds_at_sixty_fps() {
    let dir = tempdir().unwrap();
    let pipeline = RecordingPipeline::with_backends(
        config(EncoderMode::Explicit, 60, 4.0, dir.path()),
        Box::new(ColorsAnimation::new()),
        MemoryBackends,
    );

    let report = pipeline.record().await.unwrap();
    assert_eq!(report.frames, 240);
    assert_eq!(report.chunks, 240);
    assert_eq!(report.artifact_path.file_name().unwrap(), "encoded.h264.dry-run");

    let bytes = std::fs::read(&report.artifact_path).unwrap();
    assert_eq!(bytes.len(), report.bytes);

    let mut splitter = AccessUnitSplitter::new();
    let mut units = splitter.push(&bytes);
    units.extend(splitter.finish());
    assert_eq!(units.len(), 240);

    let keyframes: Vec<usize> = units
        .iter()
        .enumerate()
        .filter(|(_, unit)| unit.is_idr)
        .map(|(index, _)| index)
        .collect();
    assert_eq!(keyframes, vec![0, 60, 120, 180]);
}

#[tokio::test]
async fn test_progress_values_are_exact_and_ordered() {
    let dir = tempdir().unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let pipeline = RecordingPipeline::with_backends(
        config(EncoderMode::Explicit, 10, 2.0, dir.path()),
        Box::new(recording_source(Arc::clone(&seen))),
        MemoryBackends,
    );

    pipeline.record().await.unwrap();

    let seen = seen.lock().unwrap().clone();
    let expected: Vec<f64> = (0..20).map(|i| i as f64 / 20.0).collect();
    assert_eq!(seen, expected);
}

#[tokio::test]
async fn test_artifacts_are_deterministic() {
    for mode in [EncoderMode::Explicit, EncoderMode::Streaming] {
        let mut outputs = Vec::new();
        for _ in 0..2 {
            let dir = tempdir().unwrap();
            let pipeline = RecordingPipeline::with_backends(
                config(mode, 30, 1.0, dir.path()),
                Box::new(ColorsAnimation::new()),
                MemoryBackends,
            );
            let report = pipeline.record().await.unwrap();
            outputs.push(std::fs::read(&report.artifact_path).unwrap());
        }
        assert_eq!(outputs[0], outputs[1], "{} output differs between runs", mode.as_str());
    }
}

#[tokio::test]
async fn test_streaming_requests_data_every_step() {
    let dir = tempdir().unwrap();
    let backends = Arc::new(ScriptedBackends::default());
    let pipeline = RecordingPipeline::with_backends(
        config(EncoderMode::Streaming, 30, 1.0, dir.path()),
        Box::new(ColorsAnimation::new()),
        SharedBackends(Arc::clone(&backends)),
    );

    let report = pipeline.record().await.unwrap();
    assert_eq!(report.mime_type, "video/mp4");
    assert_eq!(files_in(dir.path()), vec!["video.mp4".to_string()]);

    let requests = backends
        .log()
        .events()
        .into_iter()
        .filter(|event| *event == MemoryEvent::RequestData)
        .count();
    assert_eq!(requests, 30);
}

#[tokio::test]
async fn test_encoder_fault_discards_output() {
    let dir = tempdir().unwrap();
    let backends = Arc::new(ScriptedBackends {
        fail_at_frame: Some(100),
        ..ScriptedBackends::default()
    });
    let pipeline = RecordingPipeline::with_backends(
        config(EncoderMode::Explicit, 60, 4.0, dir.path()),
        Box::new(ColorsAnimation::new()),
        SharedBackends(Arc::clone(&backends)),
    );

    let err = pipeline.record().await.unwrap_err();
    assert!(matches!(err, RecorderError::Encoder(EncoderError::EncoderFault { .. })));
    assert!(files_in(dir.path()).is_empty());

    let log = backends.log();
    assert!(log.contains(&MemoryEvent::Aborted));
    assert!(!log.contains(&MemoryEvent::Finished));
    assert!(!log.encoded_frames().contains(&100));
}

#[tokio::test]
async fn test_no_supported_format_renders_nothing() {
    let dir = tempdir().unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let backends = ScriptedBackends {
        no_formats: true,
        ..ScriptedBackends::default()
    };
    let pipeline = RecordingPipeline::with_backends(
        config(EncoderMode::Streaming, 60, 4.0, dir.path()),
        Box::new(recording_source(Arc::clone(&seen))),
        backends,
    );

    let err = pipeline.record().await.unwrap_err();
    assert!(matches!(err, RecorderError::Encoder(EncoderError::NoSupportedFormat { .. })));
    assert!(seen.lock().unwrap().is_empty());
    assert!(files_in(dir.path()).is_empty());
}

#[tokio::test]
async fn test_render_failure_still_flushes_and_closes() {
    let dir = tempdir().unwrap();
    let backends = Arc::new(ScriptedBackends::default());
    let failing = |_: &mut Surface, progress: f64| -> canvas_recorder::Result<()> {
        if progress >= 0.5 {
            return Err(RecorderError::generic("renderer crashed"));
        }
        Ok(())
    };
    let pipeline = RecordingPipeline::with_backends(
        config(EncoderMode::Explicit, 20, 1.0, dir.path()),
        Box::new(failing),
        SharedBackends(Arc::clone(&backends)),
    );

    let err = pipeline.record().await.unwrap_err();
    assert!(err.to_string().contains("renderer crashed"));
    assert!(files_in(dir.path()).is_empty());

    let log = backends.log();
    assert_eq!(log.encoded_frames(), (0..10).collect::<Vec<u64>>());
    assert!(log.contains(&MemoryEvent::Finished));
}

/// Lets a test keep a handle on the provider the pipeline owns
struct SharedBackends(Arc<ScriptedBackends>);

impl BackendProvider for SharedBackends {
    fn name(&self) -> &str {
        self.0.name()
    }

    fn capture_backend(&self, config: &Config) -> Box<dyn CaptureBackend> {
        self.0.capture_backend(config)
    }

    fn bitstream_backend(&self, config: &Config) -> Box<dyn BitstreamBackend> {
        self.0.bitstream_backend(config)
    }

    fn format_probe(&self, config: &Config) -> Box<dyn FormatProbe> {
        self.0.format_probe(config)
    }
}

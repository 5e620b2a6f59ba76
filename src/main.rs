use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use canvas_recorder::{
    animation::ColorsAnimation,
    config::Config,
    encoder::EncoderMode,
    pipeline::{MemoryBackends, RecordingPipeline},
    scheduler::PacingMode,
    RecorderError,
};

#[derive(Parser)]
#[command(
    name = "canvas-recorder",
    version,
    about = "Record a deterministic animation to video",
    long_about = "Canvas-Recorder renders a fixed-length animation frame by frame and exports it either as a muxed video (MP4/WebM with a tone track) or as a raw H.264 bitstream."
)]
struct Cli {
    /// Configuration file (optional)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Recording strategy (streaming, explicit)
    #[arg(short, long)]
    mode: Option<EncoderMode>,

    /// Step pacing (real_time, free_running)
    #[arg(short, long)]
    pacing: Option<PacingMode>,

    /// Frames per second
    #[arg(long)]
    fps: Option<u32>,

    /// Animation length in seconds
    #[arg(long)]
    duration: Option<f64>,

    /// Directory that receives the recording
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Do not mux the tone track
    #[arg(long)]
    no_audio: bool,

    /// Encode with in-memory backends instead of ffmpeg
    #[arg(long)]
    dry_run: bool,

    /// Render one frame at this progress (0.0-1.0) to PNG instead of recording
    #[arg(long, value_name = "PROGRESS")]
    preview: Option<f64>,

    /// Where the preview PNG is written
    #[arg(long, default_value = "preview.png")]
    preview_out: PathBuf,

    /// Write the effective configuration to this file and exit
    #[arg(long, value_name = "PATH")]
    save_config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn apply_overrides(&self, config: &mut Config) {
        if let Some(mode) = self.mode {
            config.encoder.mode = mode;
        }
        if let Some(pacing) = self.pacing {
            config.pacing.mode = pacing;
        }
        if let Some(fps) = self.fps {
            config.animation.fps = fps;
        }
        if let Some(duration) = self.duration {
            config.animation.duration_seconds = duration;
        }
        if let Some(dir) = &self.output_dir {
            config.output.directory = dir.clone();
        }
        if self.no_audio {
            config.audio.enabled = false;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    info!("Starting Canvas-Recorder v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config = match &cli.config {
        Some(config_path) => {
            info!("Loading configuration from {:?}", config_path);
            Config::from_file(config_path)?
        }
        None => {
            info!("Using default configuration");
            Config::default()
        }
    };
    cli.apply_overrides(&mut config);
    config.validate()?;

    if let Some(path) = &cli.save_config {
        config
            .save_to_file(path)
            .with_context(|| format!("writing configuration to {}", path.display()))?;
        info!("Configuration written to {:?}", path);
        return Ok(());
    }

    let source = Box::new(ColorsAnimation::new());

    if cli.dry_run {
        let pipeline = RecordingPipeline::with_backends(config, source, MemoryBackends);
        return run(pipeline, &cli).await;
    }

    let pipeline = RecordingPipeline::new(config, source);
    run(pipeline, &cli).await
}

async fn run<P>(pipeline: RecordingPipeline<P>, cli: &Cli) -> Result<()>
where
    P: canvas_recorder::pipeline::BackendProvider,
{
    if let Some(progress) = cli.preview {
        pipeline.preview(progress, &cli.preview_out)?;
        return Ok(());
    }

    match pipeline.record().await {
        Ok(report) => {
            info!("Recording saved to: {:?}", report.artifact_path);
            Ok(())
        }
        Err(e) => {
            error!("{}", e.user_message());
            Err(report_error(e))
        }
    }
}

fn report_error(e: RecorderError) -> anyhow::Error {
    if e.is_programming_error() {
        anyhow::Error::new(e).context("internal encoder misuse")
    } else {
        anyhow::Error::new(e)
    }
}

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};

use canvas_recorder::encoder::{
    default_candidates, ffmpeg::check_ffmpeg_available, negotiate, FfmpegProbe, FormatProbe,
};

/// List the recording formats the local ffmpeg can produce
#[derive(Parser)]
#[command(name = "probe-formats", version)]
struct Cli {
    /// ffmpeg executable to probe
    #[arg(long, default_value = "ffmpeg")]
    ffmpeg: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().init();
    let cli = Cli::parse();

    if !check_ffmpeg_available(&cli.ffmpeg) {
        warn!("{} is not runnable; nothing can be recorded", cli.ffmpeg.display());
    }

    let probe = FfmpegProbe::detect(&cli.ffmpeg);
    let candidates = default_candidates();

    println!("Format candidates (in preference order):");
    for candidate in &candidates {
        let mark = if probe.is_supported(candidate) { "yes" } else { "no " };
        println!(
            "  [{}] .{:<5} {} ({} + {})",
            mark,
            candidate.extension,
            candidate.mime_type,
            candidate.video_encoder,
            candidate.audio_encoder.as_deref().unwrap_or("no audio")
        );
    }
    println!(
        "Raw H.264 encoder (libx264): {}",
        if probe.has_encoder("libx264") { "available" } else { "missing" }
    );

    match negotiate(&candidates, &probe) {
        Ok(selected) => info!("Streaming mode would record {}", selected.filename()),
        Err(e) => warn!("Streaming mode unavailable: {}", e),
    }

    Ok(())
}

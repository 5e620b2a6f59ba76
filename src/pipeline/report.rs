use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Local};
use tracing::info;

use crate::{encoder::EncoderMode, scheduler::PacingMode};

/// Summary of a completed run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub artifact_path: PathBuf,
    pub mime_type: String,
    pub bytes: usize,
    pub chunks: usize,
    pub frames: u64,
    pub mode: EncoderMode,
    pub pacing: PacingMode,
    pub started_at: DateTime<Local>,
    pub elapsed: Duration,
}

impl RunReport {
    /// Frames rendered and encoded per wall-clock second
    pub fn throughput(&self) -> f64 {
        let seconds = self.elapsed.as_secs_f64();
        if seconds > 0.0 {
            self.frames as f64 / seconds
        } else {
            0.0
        }
    }

    pub fn log(&self) {
        info!("Recording complete");
        info!("   Artifact: {}", self.artifact_path.display());
        info!("   Type: {} ({} bytes in {} chunks)", self.mime_type, self.bytes, self.chunks);
        info!(
            "   Frames: {} ({} mode, {} pacing, {:.1} frames/s)",
            self.frames,
            self.mode.as_str(),
            self.pacing.as_str(),
            self.throughput()
        );
        info!(
            "   Started {} and took {:.2}s",
            self.started_at.format("%Y-%m-%d %H:%M:%S"),
            self.elapsed.as_secs_f64()
        );
    }
}

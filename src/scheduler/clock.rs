use tracing::{debug, info, warn};

use crate::{
    animation::{AnimationParameters, Frame, FrameSource, Surface},
    error::Result,
    scheduler::pacing::PacingMode,
};

/// Consumer of the frames produced by the scheduler
///
/// `emit` may suspend (encoder backpressure). `end_of_stream` is called once
/// after the last frame. `abort` is the best-effort cleanup path taken when
/// the run fails; it must not return errors.
#[allow(async_fn_in_trait)]
pub trait FrameSink {
    async fn emit(&mut self, frame: Frame) -> Result<()>;

    async fn end_of_stream(&mut self) -> Result<()>;

    async fn abort(&mut self);
}

/// Drives a fixed number of animation steps
///
/// Owns the drawing surface for the whole run. Each step renders into the
/// surface, copies it into a [`Frame`], hands the frame to the sink and then
/// waits according to the pacing mode.
pub struct Scheduler {
    params: AnimationParameters,
    pacing: PacingMode,
    surface: Surface,
}

impl Scheduler {
    pub fn new(params: AnimationParameters, pacing: PacingMode, surface: Surface) -> Self {
        Self {
            params,
            pacing,
            surface,
        }
    }

    pub fn params(&self) -> &AnimationParameters {
        &self.params
    }

    pub fn pacing(&self) -> PacingMode {
        self.pacing
    }

    /// Run every step, then signal end-of-stream
    ///
    /// On the first failure the sink is aborted and the error is returned.
    /// Returns the number of frames emitted.
    pub async fn run<S, K>(&mut self, source: &S, sink: &mut K) -> Result<u64>
    where
        S: FrameSource + ?Sized,
        K: FrameSink,
    {
        let frame_count = self.params.frame_count();
        let interval = self.params.frame_interval();

        info!(
            "Scheduling {} frames at {} fps ({} pacing, source '{}')",
            frame_count,
            self.params.fps(),
            self.pacing.as_str(),
            source.name()
        );

        for index in 0..frame_count {
            if let Err(e) = self.step(source, sink, index).await {
                warn!("Aborting run at frame {}/{}: {}", index, frame_count, e);
                sink.abort().await;
                return Err(e);
            }

            self.pacing.wait(interval).await;
        }

        if let Err(e) = sink.end_of_stream().await {
            warn!("Finalizing run failed: {}", e);
            sink.abort().await;
            return Err(e);
        }

        debug!("Scheduler finished {} frames", frame_count);
        Ok(frame_count)
    }

    async fn step<S, K>(&mut self, source: &S, sink: &mut K, index: u64) -> Result<()>
    where
        S: FrameSource + ?Sized,
        K: FrameSink,
    {
        let progress = self.params.progress(index);
        source.render(&mut self.surface, progress)?;

        let frame = Frame {
            index,
            progress,
            pixels: self.surface.snapshot(),
            timestamp_micros: self.params.timestamp_micros(index),
            duration_micros: self.params.frame_duration_micros(),
            is_key_frame: self.params.is_key_frame(index),
        };

        tracing::trace!(
            "Frame {} progress={:.4} ts={}us key={}",
            frame.index,
            frame.progress,
            frame.timestamp_micros,
            frame.is_key_frame
        );

        sink.emit(frame).await
    }
}

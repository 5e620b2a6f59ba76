use std::time::Duration;

use crate::error::{ConfigError, Result};

/// A keyframe is requested on every frame index divisible by this
pub const KEYFRAME_INTERVAL: u64 = 60;

const MICROS_PER_SECOND: u64 = 1_000_000;

/// Timing parameters for one run
///
/// Immutable once constructed: the frame count is derived from the frame rate
/// and duration exactly once.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnimationParameters {
    fps: u32,
    duration_seconds: f64,
    frame_count: u64,
}

impl AnimationParameters {
    /// Create parameters, rejecting non-positive rates and durations
    pub fn new(fps: u32, duration_seconds: f64) -> Result<Self> {
        if fps == 0 || u64::from(fps) > MICROS_PER_SECOND {
            return Err(ConfigError::InvalidValue {
                key: "animation.fps".to_string(),
                value: fps.to_string(),
            }
            .into());
        }

        if !(duration_seconds.is_finite() && duration_seconds > 0.0) {
            return Err(ConfigError::InvalidValue {
                key: "animation.duration_seconds".to_string(),
                value: duration_seconds.to_string(),
            }
            .into());
        }

        let frame_count = (f64::from(fps) * duration_seconds).round() as u64;
        if frame_count == 0 {
            return Err(ConfigError::InvalidValue {
                key: "animation.duration_seconds".to_string(),
                value: format!("{} (no frames at {} fps)", duration_seconds, fps),
            }
            .into());
        }

        Ok(Self {
            fps,
            duration_seconds,
            frame_count,
        })
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    pub fn duration_seconds(&self) -> f64 {
        self.duration_seconds
    }

    /// Number of steps in the run, `round(fps * duration)`
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Progress value for a step, `index / frame_count`, always in `[0, 1)`
    pub fn progress(&self, index: u64) -> f64 {
        index as f64 / self.frame_count as f64
    }

    /// Presentation timestamp of a step in microseconds
    ///
    /// Computed as `index * 1_000_000 / fps` in integer arithmetic, so the
    /// value never drifts with the frame index.
    pub fn timestamp_micros(&self, index: u64) -> u64 {
        index * MICROS_PER_SECOND / u64::from(self.fps)
    }

    /// Nominal duration of one frame in microseconds
    pub fn frame_duration_micros(&self) -> u64 {
        MICROS_PER_SECOND / u64::from(self.fps)
    }

    /// Wall-clock budget of one step under real-time pacing
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.fps))
    }

    pub fn is_key_frame(&self, index: u64) -> bool {
        index % KEYFRAME_INTERVAL == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_run_has_240_frames() {
        let params = AnimationParameters::new(60, 4.0).unwrap();
        assert_eq!(params.frame_count(), 240);

        let keyframes: Vec<u64> = (0..params.frame_count())
            .filter(|&i| params.is_key_frame(i))
            .collect();
        assert_eq!(keyframes, vec![0, 60, 120, 180]);
    }

    #[test]
    fn test_frame_count_matches_product() {
        for (fps, duration) in [(24, 2.0), (30, 1.5), (60, 0.5), (25, 10.0), (1, 3.0)] {
            let params = AnimationParameters::new(fps, duration).unwrap();
            assert_eq!(params.frame_count(), (fps as f64 * duration) as u64);
        }
    }

    #[test]
    fn test_timestamps() {
        let params = AnimationParameters::new(60, 4.0).unwrap();
        assert_eq!(params.timestamp_micros(0), 0);
        assert_eq!(params.timestamp_micros(1), 16_666);
        assert_eq!(params.timestamp_micros(3), 50_000);
        assert_eq!(params.timestamp_micros(60), 1_000_000);
        assert_eq!(params.frame_duration_micros(), 16_666);

        let mut last = None;
        for i in 0..params.frame_count() {
            let ts = params.timestamp_micros(i);
            if let Some(prev) = last {
                assert!(ts > prev);
            }
            last = Some(ts);
        }
    }

    #[test]
    fn test_progress_range() {
        let params = AnimationParameters::new(30, 1.0).unwrap();
        assert_eq!(params.progress(0), 0.0);
        assert_eq!(params.progress(15), 0.5);
        assert!(params.progress(29) < 1.0);
    }

    #[test]
    fn test_rejects_invalid() {
        assert!(AnimationParameters::new(0, 4.0).is_err());
        assert!(AnimationParameters::new(60, 0.0).is_err());
        assert!(AnimationParameters::new(60, -1.0).is_err());
        assert!(AnimationParameters::new(60, f64::NAN).is_err());
        assert!(AnimationParameters::new(1, 0.1).is_err());
    }
}

use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};

use crate::{
    animation::AnimationParameters,
    encoder::EncoderMode,
    error::{ConfigError, Result},
    scheduler::PacingMode,
};

/// Main configuration for the Canvas-Recorder
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Animation timing and surface size
    pub animation: AnimationConfig,

    /// Encoder backend selection and tuning
    pub encoder: EncoderConfig,

    /// Step pacing
    pub pacing: PacingConfig,

    /// Tone track settings
    pub audio: AudioConfig,

    /// Where artifacts are written
    pub output: OutputConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound { path: path.display().to_string() })?;

        let config: Config = toml::from_str(&content)
            .map_err(|_| ConfigError::ParseFailed { path: path.display().to_string() })?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::InvalidValue {
                key: "config".to_string(),
                value: e.to_string()
            })?;

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.animation.validate()?;
        self.encoder.validate()?;
        self.audio.validate()?;
        Ok(())
    }
}

/// Animation timing and drawing surface configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationConfig {
    /// Frames per second
    pub fps: u32,

    /// Length of the animation in seconds
    pub duration_seconds: f64,

    /// Logical surface width before device pixel scaling
    pub width: u32,

    /// Logical surface height before device pixel scaling
    pub height: u32,

    /// Device pixel scaling factor, applied once at setup
    pub device_pixel_ratio: f64,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            fps: 60,
            duration_seconds: 4.0,
            width: 640,
            height: 360,
            device_pixel_ratio: 1.0,
        }
    }
}

impl AnimationConfig {
    fn validate(&self) -> Result<()> {
        AnimationParameters::new(self.fps, self.duration_seconds)?;

        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::InvalidValue {
                key: "animation.size".to_string(),
                value: format!("{}x{}", self.width, self.height)
            }.into());
        }

        if !(self.device_pixel_ratio.is_finite() && self.device_pixel_ratio > 0.0) {
            return Err(ConfigError::InvalidValue {
                key: "animation.device_pixel_ratio".to_string(),
                value: self.device_pixel_ratio.to_string()
            }.into());
        }

        let (width, height) = self.surface_size();
        if width < 2 || height < 2 {
            return Err(ConfigError::InvalidValue {
                key: "animation.surface_size".to_string(),
                value: format!("{}x{}", width, height)
            }.into());
        }

        Ok(())
    }

    /// Timing parameters for one run
    pub fn parameters(&self) -> Result<AnimationParameters> {
        AnimationParameters::new(self.fps, self.duration_seconds)
    }

    /// Physical surface size: logical size scaled by the device pixel ratio,
    /// rounded down to even dimensions (required for yuv420p output)
    pub fn surface_size(&self) -> (u32, u32) {
        let scale = |v: u32| {
            let scaled = (v as f64 * self.device_pixel_ratio).round() as u32;
            scaled & !1
        };
        (scale(self.width), scale(self.height))
    }
}

/// Encoder backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    /// Streaming capture (muxed container) or explicit encode (raw bitstream)
    pub mode: EncoderMode,

    /// Frames that may be queued before `encode` suspends
    pub backlog: usize,

    /// ffmpeg executable used by both backends
    pub ffmpeg_path: PathBuf,

    /// Quality setting (0-100, higher is better)
    pub quality: u8,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            mode: EncoderMode::Streaming,
            backlog: 8,
            ffmpeg_path: PathBuf::from("ffmpeg"),
            quality: 85,
        }
    }
}

impl EncoderConfig {
    fn validate(&self) -> Result<()> {
        if self.backlog == 0 {
            return Err(ConfigError::InvalidValue {
                key: "encoder.backlog".to_string(),
                value: self.backlog.to_string()
            }.into());
        }

        if self.quality > 100 {
            return Err(ConfigError::InvalidValue {
                key: "encoder.quality".to_string(),
                value: self.quality.to_string()
            }.into());
        }

        Ok(())
    }

    /// Map the 0-100 quality setting onto an x264 CRF value
    pub fn crf(&self) -> u8 {
        (51 - ((self.quality as f32 / 100.0) * 51.0) as u8).clamp(0, 51)
    }
}

/// Step pacing configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    pub mode: PacingMode,
}

/// Tone track configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Mux a tone track when the negotiated format carries audio
    pub enabled: bool,

    /// Tone frequency (Hz)
    pub frequency_hz: f32,

    /// Sample rate of the generated track (Hz)
    pub sample_rate: u32,

    /// Peak amplitude (0.0-1.0)
    pub amplitude: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            frequency_hz: 440.0,
            sample_rate: 48000,
            amplitude: 0.25,
        }
    }
}

impl AudioConfig {
    fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(ConfigError::InvalidValue {
                key: "audio.sample_rate".to_string(),
                value: self.sample_rate.to_string()
            }.into());
        }

        // Nyquist
        if !(self.frequency_hz > 0.0 && self.frequency_hz < self.sample_rate as f32 / 2.0) {
            return Err(ConfigError::InvalidValue {
                key: "audio.frequency_hz".to_string(),
                value: self.frequency_hz.to_string()
            }.into());
        }

        if !(0.0..=1.0).contains(&self.amplitude) {
            return Err(ConfigError::InvalidValue {
                key: "audio.amplitude".to_string(),
                value: self.amplitude.to_string()
            }.into());
        }

        Ok(())
    }
}

/// Output location configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory that receives the finished artifact
    pub directory: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { directory: PathBuf::from(".") }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_roundtrip() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("test_config.toml");

        let mut original_config = Config::default();
        original_config.encoder.mode = EncoderMode::Explicit;
        original_config.pacing.mode = PacingMode::FreeRunning;

        original_config.save_to_file(&file_path).unwrap();
        let loaded_config = Config::from_file(&file_path).unwrap();

        assert_eq!(loaded_config.animation.fps, 60);
        assert_eq!(loaded_config.encoder.mode, EncoderMode::Explicit);
        assert_eq!(loaded_config.pacing.mode, PacingMode::FreeRunning);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [animation]
            fps = 30

            [encoder]
            mode = "explicit"
            "#,
        )
        .unwrap();

        assert_eq!(config.animation.fps, 30);
        assert_eq!(config.animation.duration_seconds, 4.0);
        assert_eq!(config.encoder.mode, EncoderMode::Explicit);
        assert_eq!(config.encoder.backlog, 8);
        assert!(config.audio.enabled);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempdir().unwrap();
        let err = Config::from_file(dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(
            err,
            crate::RecorderError::Config(ConfigError::FileNotFound { .. })
        ));
    }

    #[test]
    fn test_invalid_fps() {
        let mut config = Config::default();
        config.animation.fps = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_backlog() {
        let mut config = Config::default();
        config.encoder.backlog = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_tone_above_nyquist() {
        let mut config = Config::default();
        config.audio.frequency_hz = 30000.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_surface_size_scaling() {
        let mut animation = AnimationConfig::default();
        assert_eq!(animation.surface_size(), (640, 360));

        animation.device_pixel_ratio = 2.0;
        assert_eq!(animation.surface_size(), (1280, 720));

        animation.width = 101;
        animation.height = 51;
        animation.device_pixel_ratio = 1.0;
        assert_eq!(animation.surface_size(), (100, 50));
    }

    #[test]
    fn test_quality_to_crf() {
        let mut encoder = EncoderConfig::default();
        encoder.quality = 100;
        assert_eq!(encoder.crf(), 0);
        encoder.quality = 0;
        assert_eq!(encoder.crf(), 51);
    }
}

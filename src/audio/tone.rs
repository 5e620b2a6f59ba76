use std::path::Path;

use tracing::debug;

use crate::{
    config::AudioConfig,
    error::{EncoderError, Result},
};

/// Fixed-frequency sine tone
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneGenerator {
    pub frequency_hz: f32,
    pub sample_rate: u32,
    pub amplitude: f32,
}

impl ToneGenerator {
    pub fn new(frequency_hz: f32, sample_rate: u32, amplitude: f32) -> Self {
        Self {
            frequency_hz,
            sample_rate,
            amplitude: amplitude.clamp(0.0, 1.0),
        }
    }

    pub fn from_config(config: &AudioConfig) -> Self {
        Self::new(config.frequency_hz, config.sample_rate, config.amplitude)
    }

    /// Number of mono samples covering `duration_seconds`
    pub fn sample_count(&self, duration_seconds: f64) -> usize {
        (duration_seconds * f64::from(self.sample_rate)).round() as usize
    }

    /// 16-bit PCM samples of the tone
    pub fn samples(&self, duration_seconds: f64) -> impl Iterator<Item = i16> + '_ {
        let step = 2.0 * std::f64::consts::PI * f64::from(self.frequency_hz) / f64::from(self.sample_rate);
        let peak = f64::from(self.amplitude) * f64::from(i16::MAX);

        (0..self.sample_count(duration_seconds)).map(move |n| ((n as f64 * step).sin() * peak).round() as i16)
    }

    /// Write the tone as a mono 16-bit WAV file
    pub fn write_wav<P: AsRef<Path>>(&self, path: P, duration_seconds: f64) -> Result<()> {
        let path = path.as_ref();
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let wav_error = |e: hound::Error| EncoderError::fault(format!(
            "failed to write tone track {}: {}",
            path.display(),
            e
        ));

        let mut writer = hound::WavWriter::create(path, spec).map_err(wav_error)?;
        for sample in self.samples(duration_seconds) {
            writer.write_sample(sample).map_err(wav_error)?;
        }
        writer.finalize().map_err(wav_error)?;

        debug!(
            "Wrote {:.1} Hz tone ({:.2}s) to {}",
            self.frequency_hz,
            duration_seconds,
            path.display()
        );
        Ok(())
    }
}

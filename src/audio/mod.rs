//! # Audio Module
//!
//! The only audio this crate produces: a single fixed-frequency tone, written
//! as a WAV file and muxed into containers that carry an audio track.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use canvas_recorder::audio::ToneGenerator;
//!
//! # fn main() -> canvas_recorder::Result<()> {
//! let tone = ToneGenerator::new(440.0, 48000, 0.25);
//! tone.write_wav("tone.wav", 4.0)?;
//! # Ok(())
//! # }
//! ```

pub mod tone;

pub use tone::ToneGenerator;

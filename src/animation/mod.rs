//! # Animation Module
//!
//! Timing parameters, the reusable drawing surface, the frame value handed to
//! encoders, and the frame sources that draw the animation.
//!
//! ## Usage
//!
//! ```rust
//! use canvas_recorder::animation::{AnimationParameters, ColorsAnimation, FrameSource, Surface};
//!
//! # fn main() -> canvas_recorder::Result<()> {
//! let params = AnimationParameters::new(60, 4.0)?;
//! assert_eq!(params.frame_count(), 240);
//!
//! let mut surface = Surface::new(320, 180)?;
//! ColorsAnimation::new().render(&mut surface, params.progress(120))?;
//! let pixels = surface.snapshot();
//! assert_eq!(pixels.width(), 320);
//! # Ok(())
//! # }
//! ```

pub mod colors;
pub mod frame;
pub mod params;
pub mod source;

pub use colors::{ColorsAnimation, PALETTE};
pub use frame::{Frame, PixelBuffer, Surface};
pub use params::{AnimationParameters, KEYFRAME_INTERVAL};
pub use source::FrameSource;

use image::{ImageBuffer, Rgba, RgbaImage};

use crate::error::{RenderError, Result};

/// An owned RGBA8 pixel buffer
///
/// Frames carry one of these by value, so a queued frame never aliases the
/// drawing surface it was copied from.
#[derive(Clone, Debug, PartialEq)]
pub struct PixelBuffer {
    buffer: RgbaImage,
}

impl PixelBuffer {
    /// Create a new buffer with the given dimensions filled with the specified color
    pub fn new_filled(width: u32, height: u32, color: [u8; 4]) -> Self {
        let buffer = ImageBuffer::from_pixel(width, height, Rgba(color));
        Self { buffer }
    }

    /// Create a buffer from raw RGBA bytes
    pub fn from_rgba_bytes(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        ImageBuffer::from_raw(width, height, data).map(|buffer| Self { buffer })
    }

    pub fn width(&self) -> u32 {
        self.buffer.width()
    }

    pub fn height(&self) -> u32 {
        self.buffer.height()
    }

    /// Get a pixel at the given coordinates
    pub fn get_pixel(&self, x: u32, y: u32) -> [u8; 4] {
        self.buffer.get_pixel(x, y).0
    }

    /// Raw RGBA bytes, row-major
    pub fn as_bytes(&self) -> &[u8] {
        self.buffer.as_raw()
    }

    /// Save the buffer as a PNG file
    pub fn save_png<P: AsRef<std::path::Path>>(&self, path: P) -> std::result::Result<(), image::ImageError> {
        self.buffer.save(path)
    }
}

/// The single mutable drawing surface of a run
///
/// Owned by the scheduler, lent to the frame source for one render call at a
/// time and overwritten every step.
#[derive(Debug)]
pub struct Surface {
    image: RgbaImage,
}

impl Surface {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(RenderError::InvalidSurface { width, height }.into());
        }
        Ok(Self {
            image: ImageBuffer::new(width, height),
        })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn image_mut(&mut self) -> &mut RgbaImage {
        &mut self.image
    }

    /// Copy the current contents out of the surface
    pub fn snapshot(&self) -> PixelBuffer {
        PixelBuffer {
            buffer: self.image.clone(),
        }
    }
}

/// One animation step, ready for the encoder
#[derive(Clone, Debug)]
pub struct Frame {
    pub index: u64,
    pub progress: f64,
    pub pixels: PixelBuffer,
    pub timestamp_micros: u64,
    pub duration_micros: u64,
    pub is_key_frame: bool,
}

impl Frame {
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_is_detached_from_surface() {
        let mut surface = Surface::new(4, 2).unwrap();
        surface.image_mut().put_pixel(0, 0, Rgba([1, 2, 3, 255]));

        let snapshot = surface.snapshot();
        surface.image_mut().put_pixel(0, 0, Rgba([9, 9, 9, 255]));

        assert_eq!(snapshot.get_pixel(0, 0), [1, 2, 3, 255]);
        assert_eq!(snapshot.as_bytes().len(), 4 * 2 * 4);
    }

    #[test]
    fn test_empty_surface_rejected() {
        assert!(Surface::new(0, 10).is_err());
    }

    #[test]
    fn test_from_rgba_bytes_checks_length() {
        assert!(PixelBuffer::from_rgba_bytes(2, 2, vec![0; 16]).is_some());
        assert!(PixelBuffer::from_rgba_bytes(2, 2, vec![0; 15]).is_none());
    }
}

use rayon::prelude::*;

use crate::{
    animation::{frame::Surface, source::FrameSource},
    error::Result,
};

/// The color cycle, in display order
pub const PALETTE: [[u8; 3]; 13] = [
    [0x49, 0x3c, 0x2b],
    [0xbe, 0x26, 0x33],
    [0xe0, 0x6f, 0x8b],
    [0xa4, 0x64, 0x22],
    [0xeb, 0x89, 0x31],
    [0xf7, 0xe2, 0x6b],
    [0x1b, 0x26, 0x32],
    [0x2f, 0x48, 0x4e],
    [0x44, 0x89, 0x1a],
    [0xa3, 0xce, 0x27],
    [0x00, 0x57, 0x84],
    [0x31, 0xa2, 0xf2],
    [0xb2, 0xdc, 0xef],
];

/// Share of the surface covered by the centred title plate
const PLATE_WIDTH: f64 = 0.6;
const PLATE_HEIGHT: f64 = 0.25;

/// Cycles through the palette: each color segment grows a disc of the next
/// color out of the centre, with the title plate drawn in the color after
/// that wherever the disc covers it.
#[derive(Debug, Clone, Default)]
pub struct ColorsAnimation;

/// The three colors and disc radius of one progress value
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorsState {
    pub background: [u8; 3],
    pub foreground: [u8; 3],
    pub highlight: [u8; 3],
    pub disc_radius: f64,
}

impl ColorsAnimation {
    pub fn new() -> Self {
        Self
    }

    /// Resolve colors and disc radius for a surface of the given size
    pub fn state(progress: f64, width: u32, height: u32) -> ColorsState {
        let scaled = progress * PALETTE.len() as f64;
        let segment = scaled.floor().max(0.0) as usize;
        let fraction = scaled.rem_euclid(1.0);

        let w = f64::from(width);
        let h = f64::from(height);
        let reach = fraction * (w * w + h * h).sqrt() / 2.0;

        ColorsState {
            background: PALETTE[segment % PALETTE.len()],
            foreground: PALETTE[(segment + 1) % PALETTE.len()],
            highlight: PALETTE[(segment + 2) % PALETTE.len()],
            disc_radius: fraction * reach,
        }
    }
}

impl FrameSource for ColorsAnimation {
    fn name(&self) -> &str {
        "colors"
    }

    fn render(&self, surface: &mut Surface, progress: f64) -> Result<()> {
        let width = surface.width();
        let height = surface.height();
        let state = Self::state(progress, width, height);

        let cx = f64::from(width) / 2.0;
        let cy = f64::from(height) / 2.0;
        let plate_half_w = f64::from(width) * PLATE_WIDTH / 2.0;
        let plate_half_h = f64::from(height) * PLATE_HEIGHT / 2.0;
        let radius_sq = state.disc_radius * state.disc_radius;
        let row_bytes = width as usize * 4;

        surface
            .image_mut()
            .par_chunks_mut(row_bytes)
            .enumerate()
            .for_each(|(y, row)| {
                let dy = y as f64 + 0.5 - cy;
                let in_plate_row = dy.abs() <= plate_half_h;

                for (x, pixel) in row.chunks_exact_mut(4).enumerate() {
                    let dx = x as f64 + 0.5 - cx;
                    let in_plate = in_plate_row && dx.abs() <= plate_half_w;
                    let in_disc = dx * dx + dy * dy <= radius_sq;

                    let color = match (in_disc, in_plate) {
                        (true, true) => state.highlight,
                        (true, false) | (false, true) => state.foreground,
                        (false, false) => state.background,
                    };

                    pixel[..3].copy_from_slice(&color);
                    pixel[3] = 255;
                }
            });

        Ok(())
    }
}

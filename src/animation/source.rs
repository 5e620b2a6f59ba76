use crate::{animation::frame::Surface, error::Result};

/// Maps a progress value to pixels
///
/// Implementations draw into the borrowed surface and must not keep any
/// reference to it after `render` returns. Rendering the same progress twice
/// must produce the same pixels.
pub trait FrameSource: Send + Sync {
    /// Returns the unique name of this animation
    fn name(&self) -> &str;

    /// Draw the animation state at `progress` (in `[0, 1)`) onto `surface`
    ///
    /// # Returns
    ///
    /// Returns `Ok(())` if the frame was drawn, or an error that aborts the run.
    fn render(&self, surface: &mut Surface, progress: f64) -> Result<()>;
}

impl<F> FrameSource for F
where
    F: Fn(&mut Surface, f64) -> Result<()> + Send + Sync,
{
    fn name(&self) -> &str {
        "closure"
    }

    fn render(&self, surface: &mut Surface, progress: f64) -> Result<()> {
        self(surface, progress)
    }
}

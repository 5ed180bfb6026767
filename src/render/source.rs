use crate::expression::value::Color;
use image::{GenericImageView, ImageBuffer, Pixel};
use std::ops::Deref;

/// Read-only input image as seen by the sampling functions.
///
/// Implementations must be shareable across worker threads; the engine never writes to them.
pub trait SourceImage: Sync {
    /// Width in pixels.
    fn width(&self) -> u32;
    /// Height in pixels.
    fn height(&self) -> u32;
    /// Straight-alpha RGBA8 at an in-bounds position.
    fn rgba8(&self, x: u32, y: u32) -> [u8; 4];
}

impl SourceImage for image::DynamicImage {
    fn width(&self) -> u32 {
        GenericImageView::width(self)
    }

    fn height(&self) -> u32 {
        GenericImageView::height(self)
    }

    fn rgba8(&self, x: u32, y: u32) -> [u8; 4] {
        self.get_pixel(x, y).0
    }
}

impl<P, C> SourceImage for ImageBuffer<P, C>
where
    P: Pixel<Subpixel = u8> + Sync,
    C: Deref<Target = [u8]> + Sync,
{
    fn width(&self) -> u32 {
        ImageBuffer::width(self)
    }

    fn height(&self) -> u32 {
        ImageBuffer::height(self)
    }

    fn rgba8(&self, x: u32, y: u32) -> [u8; 4] {
        self.get_pixel(x, y).to_rgba().0
    }
}

/// Sample `img` at a possibly fractional, possibly out-of-bounds position.
///
/// Coordinates are floored, then clamped to the nearest edge pixel. Non-finite coordinates read
/// pixel `(0, 0)`; an empty image reads transparent black.
pub fn sample(img: &dyn SourceImage, x: f64, y: f64) -> Color {
    let (w, h) = (img.width(), img.height());
    if w == 0 || h == 0 {
        return Color::new(0.0, 0.0, 0.0, 0.0);
    }
    Color::from_rgba8(img.rgba8(clamp_coord(x, w), clamp_coord(y, h)))
}

fn clamp_coord(v: f64, len: u32) -> u32 {
    if !v.is_finite() {
        return 0;
    }
    let max = f64::from(len - 1);
    v.floor().clamp(0.0, max) as u32
}

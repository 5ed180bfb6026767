use crate::expression::value::Color;
use crate::foundation::error::{PixformError, PixformResult};
use anyhow::anyhow;

/// Packed 8-bit output image, row-major, `channels` bytes per pixel.
///
/// Channel layouts: 1 grey, 2 grey+alpha, 3 RGB, 4 RGBA. Grey is Rec.601 luma.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputImage {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Bytes per pixel, `1..=4`.
    pub channels: u8,
    /// `width * height * channels` bytes.
    pub data: Vec<u8>,
}

impl OutputImage {
    /// `len` must equal `width * height * channels`.
    pub(crate) fn zeroed(width: u32, height: u32, channels: u8, len: usize) -> Self {
        Self {
            width,
            height,
            channels,
            data: vec![0; len],
        }
    }

    /// Bytes of one row.
    pub fn row_bytes(&self) -> usize {
        self.width as usize * usize::from(self.channels)
    }

    /// Bytes of the pixel at `(x, y)`, or `None` when out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Option<&[u8]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let c = usize::from(self.channels);
        let start = y as usize * self.row_bytes() + x as usize * c;
        self.data.get(start..start + c)
    }

    /// Convert into the matching `image` buffer type.
    pub fn into_dynamic(self) -> PixformResult<image::DynamicImage> {
        let (w, h) = (self.width, self.height);
        let bad = || PixformError::Other(anyhow!("output buffer does not match {w}x{h}"));
        Ok(match self.channels {
            1 => image::DynamicImage::ImageLuma8(
                image::GrayImage::from_raw(w, h, self.data).ok_or_else(bad)?,
            ),
            2 => image::DynamicImage::ImageLumaA8(
                image::GrayAlphaImage::from_raw(w, h, self.data).ok_or_else(bad)?,
            ),
            3 => image::DynamicImage::ImageRgb8(
                image::RgbImage::from_raw(w, h, self.data).ok_or_else(bad)?,
            ),
            4 => image::DynamicImage::ImageRgba8(
                image::RgbaImage::from_raw(w, h, self.data).ok_or_else(bad)?,
            ),
            n => return Err(PixformError::usage(format!("unsupported channel count {n}"))),
        })
    }
}

/// Write `c` into one output pixel of `out.len()` channels.
pub(crate) fn encode_pixel(c: Color, out: &mut [u8]) {
    let [r, g, b, a] = c.to_rgba8();
    match out {
        [l] => *l = luma8(c),
        [l, al] => {
            *l = luma8(c);
            *al = a;
        }
        [rr, gg, bb] => {
            *rr = r;
            *gg = g;
            *bb = b;
        }
        [rr, gg, bb, aa] => {
            *rr = r;
            *gg = g;
            *bb = b;
            *aa = a;
        }
        _ => {}
    }
}

fn luma8(c: Color) -> u8 {
    c.luma().round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::GenericImageView;

    #[test]
    fn encodes_each_channel_layout() {
        let c = Color::new(200.0, 100.0, 50.0, 128.0);
        let mut px = [0u8; 4];
        encode_pixel(c, &mut px);
        assert_eq!(px, [200, 100, 50, 128]);

        let mut px = [0u8; 3];
        encode_pixel(c, &mut px);
        assert_eq!(px, [200, 100, 50]);

        // 0.299*200 + 0.587*100 + 0.114*50 = 124.2
        let mut px = [0u8; 2];
        encode_pixel(c, &mut px);
        assert_eq!(px, [124, 128]);

        let mut px = [0u8; 1];
        encode_pixel(c, &mut px);
        assert_eq!(px, [124]);
    }

    #[test]
    fn pixel_indexing_and_conversion() {
        let mut img = OutputImage::zeroed(3, 2, 3, 18);
        img.data[(3 + 2) * 3] = 9;
        assert_eq!(img.pixel(2, 1), Some(&[9u8, 0, 0][..]));
        assert_eq!(img.pixel(3, 0), None);

        let dynamic = img.into_dynamic().unwrap();
        assert_eq!(dynamic.color(), image::ColorType::Rgb8);
        assert_eq!((dynamic.width(), dynamic.height()), (3, 2));
    }
}

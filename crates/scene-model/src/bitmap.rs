//! Straight-alpha RGBA8 pixel buffers.
//!
//! Used both for decoded image assets and for the raster surface a frame is
//! painted into.

use crate::color::Color;

/// A packed RGBA8 image, row-major, 4 bytes per pixel.
#[derive(Debug, Clone, PartialEq)]
pub struct Bitmap {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

impl Bitmap {
    /// Create a bitmap filled with transparent black.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            data: vec![0u8; (width as usize) * (height as usize) * 4],
            width,
            height,
        }
    }

    /// Create a bitmap filled with a solid color.
    pub fn solid(width: u32, height: u32, color: Color) -> Self {
        let mut bitmap = Self::new(width, height);
        bitmap.fill(color);
        bitmap
    }

    /// Wrap existing RGBA8 data. Returns `None` if the length does not match.
    pub fn from_rgba8(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        if data.len() != (width as usize) * (height as usize) * 4 {
            return None;
        }
        Some(Self {
            data,
            width,
            height,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw pixel bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Consume the bitmap and return its pixel bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Overwrite every pixel with `color`.
    pub fn fill(&mut self, color: Color) {
        let pixel = color.to_rgba8();
        for chunk in self.data.chunks_exact_mut(4) {
            chunk.copy_from_slice(&pixel);
        }
    }

    /// Get the RGBA value at a pixel coordinate. Returns None if out of bounds.
    pub fn get_pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        let offset = self.offset(x, y)?;
        let mut px = [0u8; 4];
        px.copy_from_slice(&self.data[offset..offset + 4]);
        Some(px)
    }

    /// Set the RGBA value at a pixel coordinate. No-op if out of bounds.
    pub fn set_pixel(&mut self, x: u32, y: u32, rgba: [u8; 4]) {
        if let Some(offset) = self.offset(x, y) {
            self.data[offset..offset + 4].copy_from_slice(&rgba);
        }
    }

    /// Source-over blend `rgba` onto the pixel at `(x, y)`, with an extra
    /// coverage factor in `[0, 255]` applied to the source alpha.
    pub fn blend_pixel(&mut self, x: u32, y: u32, rgba: [u8; 4], coverage: u8) {
        let Some(offset) = self.offset(x, y) else {
            return;
        };
        let sa = (rgba[3] as u32 * coverage as u32) / 255;
        if sa == 0 {
            return;
        }
        let d = &mut self.data[offset..offset + 4];
        if sa == 255 {
            d.copy_from_slice(&rgba);
            return;
        }

        let da = d[3] as u32;
        let inv_sa = 255 - sa;
        let out_a = sa + (da * inv_sa) / 255;
        if out_a == 0 {
            return;
        }
        for c in 0..3 {
            let src = rgba[c] as u32 * sa;
            let dst = (d[c] as u32 * da * inv_sa) / 255;
            d[c] = ((src + dst) / out_a).min(255) as u8;
        }
        d[3] = out_a.min(255) as u8;
    }

    /// Nearest-neighbour sample at normalized coordinates `(u, v)` in `[0, 1)`.
    pub fn sample(&self, u: f64, v: f64) -> Option<[u8; 4]> {
        if self.width == 0 || self.height == 0 {
            return None;
        }
        let x = (u * self.width as f64).floor();
        let y = (v * self.height as f64).floor();
        if x < 0.0 || y < 0.0 {
            return None;
        }
        self.get_pixel(x as u32, y as u32)
    }

    /// Count of pixels whose color differs from `color`.
    pub fn count_pixels_not(&self, color: Color) -> usize {
        let target = color.to_rgba8();
        self.data
            .chunks_exact(4)
            .filter(|px| *px != target.as_slice())
            .count()
    }

    fn offset(&self, x: u32, y: u32) -> Option<usize> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(((y as usize) * (self.width as usize) + (x as usize)) * 4)
    }
}

//! CPU rasterizer implementing the [`Surface`] contract.
//!
//! Shapes are sampled at pixel centers without anti-aliasing, so the same
//! command stream always yields the same bytes. Text goes through `fontdue`
//! when a font is loaded; otherwise every glyph is a solid block on the
//! fixed-advance grid the model measures with.

use std::f64::consts::TAU;
use std::path::Path;
use std::sync::Arc;

use fontdue::{Font, FontSettings};
use scenecast_common::error::{SceneError, SceneResult};
use scenecast_scene_model::surface::{fixed_text_metrics, FALLBACK_ADVANCE};
use scenecast_scene_model::{Bitmap, Color, Point, Rect, Surface, TextMetrics, TextStyle};

/// A parsed font shared between surfaces.
pub type FontHandle = Arc<Font>;

/// Load a TTF/OTF font file.
pub fn load_font(path: &Path) -> SceneResult<FontHandle> {
    let data = std::fs::read(path).map_err(|e| {
        SceneError::config(format!("failed to read font file {}: {e}", path.display()))
    })?;
    let font = Font::from_bytes(data, FontSettings::default()).map_err(|e| {
        SceneError::config(format!("failed to parse font {}: {e}", path.display()))
    })?;
    Ok(Arc::new(font))
}

/// An RGBA raster target.
pub struct RasterSurface {
    bitmap: Bitmap,
    clips: Vec<Rect>,
    font: Option<FontHandle>,
}

impl RasterSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            bitmap: Bitmap::new(width, height),
            clips: Vec::new(),
            font: None,
        }
    }

    pub fn with_font(mut self, font: Option<FontHandle>) -> Self {
        self.font = font;
        self
    }

    pub fn bitmap(&self) -> &Bitmap {
        &self.bitmap
    }

    pub fn into_bitmap(self) -> Bitmap {
        self.bitmap
    }

    /// Write the current pixels to a PNG file.
    pub fn save_png(&self, path: &Path) -> SceneResult<()> {
        save_png(&self.bitmap, path)
    }

    /// The active clip in pixel space, or `None` when it is empty.
    fn clip_bounds(&self) -> Option<Rect> {
        let mut clip = Rect::new(
            0.0,
            0.0,
            self.bitmap.width() as f64,
            self.bitmap.height() as f64,
        );
        for r in &self.clips {
            clip = clip.intersect(r)?;
        }
        Some(clip)
    }

    /// Pixel index range whose centers fall in `rect` and the clip.
    fn pixel_span(&self, rect: &Rect) -> Option<(u32, u32, u32, u32)> {
        let area = rect.intersect(&self.clip_bounds()?)?;
        let x0 = (area.x - 0.5).ceil().max(0.0) as u32;
        let y0 = (area.y - 0.5).ceil().max(0.0) as u32;
        let x1 = (area.right() - 0.5).ceil().max(0.0) as u32;
        let y1 = (area.bottom() - 0.5).ceil().max(0.0) as u32;
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some((
            x0,
            y0,
            x1.min(self.bitmap.width()),
            y1.min(self.bitmap.height()),
        ))
    }

    /// Blend `color` into every pixel of `rect` whose center passes `inside`.
    fn fill_where(&mut self, rect: Rect, color: Color, inside: impl Fn(f64, f64) -> bool) {
        let rgba = color.to_rgba8();
        if rgba[3] == 0 {
            return;
        }
        let Some((x0, y0, x1, y1)) = self.pixel_span(&rect) else {
            return;
        };
        for py in y0..y1 {
            for px in x0..x1 {
                let cx = px as f64 + 0.5;
                let cy = py as f64 + 0.5;
                if inside(cx, cy) {
                    self.bitmap.blend_pixel(px, py, rgba, 255);
                }
            }
        }
    }

    fn fill_text_blocks(&mut self, text: &str, origin: Point, style: &TextStyle) {
        let advance = style.font_size * FALLBACK_ADVANCE;
        let line_h = style.line_height();
        for (row, line) in text.split('\n').enumerate() {
            let top = origin.y + row as f64 * line_h + style.font_size * 0.2;
            for (col, ch) in line.chars().enumerate() {
                if ch.is_whitespace() {
                    continue;
                }
                let x = origin.x + col as f64 * advance + advance * 0.1;
                let glyph = Rect::new(x, top, advance * 0.8, style.font_size * 0.8);
                self.fill_rect(glyph, style.color);
            }
        }
    }

    fn fill_text_glyphs(&mut self, font: &Font, text: &str, origin: Point, style: &TextStyle) {
        let rgba = style.color.to_rgba8();
        if rgba[3] == 0 {
            return;
        }
        let Some(clip) = self.clip_bounds() else {
            return;
        };
        let size = style.font_size as f32;
        let ascent = font
            .horizontal_line_metrics(size)
            .map(|m| m.ascent as f64)
            .unwrap_or(style.font_size * 0.8);
        for (row, line) in text.split('\n').enumerate() {
            let baseline = origin.y + row as f64 * style.line_height() + ascent;
            let mut pen_x = origin.x;
            for ch in line.chars() {
                let (metrics, coverage) = font.rasterize(ch, size);
                let gx = pen_x.round() as i64 + metrics.xmin as i64;
                let gy = baseline.round() as i64 - (metrics.height as i64 + metrics.ymin as i64);
                for yy in 0..metrics.height {
                    for xx in 0..metrics.width {
                        let c = coverage[yy * metrics.width + xx];
                        if c == 0 {
                            continue;
                        }
                        let px = gx + xx as i64;
                        let py = gy + yy as i64;
                        if px < 0 || py < 0 {
                            continue;
                        }
                        let (cx, cy) = (px as f64 + 0.5, py as f64 + 0.5);
                        if clip.contains(cx, cy) {
                            self.bitmap.blend_pixel(px as u32, py as u32, rgba, c);
                        }
                    }
                }
                pen_x += metrics.advance_width as f64;
            }
        }
    }
}

impl Surface for RasterSurface {
    fn width(&self) -> u32 {
        self.bitmap.width()
    }

    fn height(&self) -> u32 {
        self.bitmap.height()
    }

    fn clear(&mut self, color: Color) {
        self.bitmap.fill(color);
    }

    fn fill_rect(&mut self, rect: Rect, color: Color) {
        self.fill_where(rect, color, |_, _| true);
    }

    fn fill_rounded_rect(&mut self, rect: Rect, radius: f64, color: Color) {
        let r = radius.clamp(0.0, rect.width.min(rect.height) / 2.0);
        self.fill_where(rect, color, |x, y| in_rounded_rect(&rect, r, x, y));
    }

    fn stroke_rect(&mut self, rect: Rect, line_width: f64, color: Color) {
        let half = line_width / 2.0;
        let outer = Rect::new(
            rect.x - half,
            rect.y - half,
            rect.width + line_width,
            rect.height + line_width,
        );
        let inner = rect.inset(half);
        self.fill_where(outer, color, |x, y| {
            inner.width <= 0.0 || inner.height <= 0.0 || !inner.contains(x, y)
        });
    }

    fn stroke_arc(
        &mut self,
        center: Point,
        radius: f64,
        start_angle: f64,
        sweep: f64,
        line_width: f64,
        color: Color,
    ) {
        if sweep <= 0.0 {
            return;
        }
        let half = line_width / 2.0;
        let outer = radius + half;
        let bounds = Rect::new(center.x - outer, center.y - outer, outer * 2.0, outer * 2.0);
        let full = sweep >= TAU;
        self.fill_where(bounds, color, |x, y| {
            let dx = x - center.x;
            let dy = y - center.y;
            let d = (dx * dx + dy * dy).sqrt();
            if (d - radius).abs() > half {
                return false;
            }
            full || (dy.atan2(dx) - start_angle).rem_euclid(TAU) <= sweep
        });
    }

    fn fill_text(&mut self, text: &str, origin: Point, style: &TextStyle) {
        match self.font.clone() {
            Some(font) => self.fill_text_glyphs(&font, text, origin, style),
            None => self.fill_text_blocks(text, origin, style),
        }
    }

    fn measure_text(&self, text: &str, style: &TextStyle) -> TextMetrics {
        let Some(font) = &self.font else {
            return fixed_text_metrics(text, style);
        };
        let size = style.font_size as f32;
        let mut lines = 0usize;
        let mut widest = 0.0f64;
        for line in text.split('\n') {
            lines += 1;
            let width: f64 = line
                .chars()
                .map(|ch| font.metrics(ch, size).advance_width as f64)
                .sum();
            widest = widest.max(width);
        }
        TextMetrics {
            width: widest,
            height: lines as f64 * style.line_height(),
        }
    }

    fn draw_bitmap(&mut self, bitmap: &Bitmap, dest: Rect, clip: Rect, clip_radius: f64, opacity: f64) {
        if dest.width <= 0.0 || dest.height <= 0.0 || opacity <= 0.0 {
            return;
        }
        let Some(visible) = dest.intersect(&clip) else {
            return;
        };
        let Some((x0, y0, x1, y1)) = self.pixel_span(&visible) else {
            return;
        };
        let r = clip_radius.clamp(0.0, clip.width.min(clip.height) / 2.0);
        let coverage = (opacity.clamp(0.0, 1.0) * 255.0).round() as u8;
        for py in y0..y1 {
            for px in x0..x1 {
                let cx = px as f64 + 0.5;
                let cy = py as f64 + 0.5;
                if !in_rounded_rect(&clip, r, cx, cy) {
                    continue;
                }
                let u = (cx - dest.x) / dest.width;
                let v = (cy - dest.y) / dest.height;
                if let Some(rgba) = bitmap.sample(u, v) {
                    self.bitmap.blend_pixel(px, py, rgba, coverage);
                }
            }
        }
    }

    fn push_clip(&mut self, rect: Rect) {
        self.clips.push(rect);
    }

    fn pop_clip(&mut self) {
        self.clips.pop();
    }
}

/// Whether `(x, y)` lies inside `rect` with corners rounded by `r`.
fn in_rounded_rect(rect: &Rect, r: f64, x: f64, y: f64) -> bool {
    if !rect.contains(x, y) {
        return false;
    }
    if r <= 0.0 {
        return true;
    }
    let cx = x.clamp(rect.x + r, rect.right() - r);
    let cy = y.clamp(rect.y + r, rect.bottom() - r);
    let dx = x - cx;
    let dy = y - cy;
    dx * dx + dy * dy <= r * r
}

/// Encode a bitmap as PNG.
pub fn save_png(bitmap: &Bitmap, path: &Path) -> SceneResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let img = image::RgbaImage::from_raw(bitmap.width(), bitmap.height(), bitmap.as_bytes().to_vec())
        .ok_or_else(|| SceneError::render("bitmap size does not match its pixel data"))?;
    img.save_with_format(path, image::ImageFormat::Png)
        .map_err(|e| SceneError::render(format!("failed to write PNG {}: {e}", path.display())))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    const RED: [u8; 4] = [255, 0, 0, 255];

    fn red() -> Color {
        Color::from_rgba8(RED)
    }

    #[test]
    fn test_fill_rect_hits_pixel_centers() {
        let mut s = RasterSurface::new(10, 10);
        s.fill_rect(Rect::new(2.0, 2.0, 3.0, 2.0), red());
        assert_eq!(s.bitmap().get_pixel(2, 2), Some(RED));
        assert_eq!(s.bitmap().get_pixel(4, 3), Some(RED));
        assert_eq!(s.bitmap().get_pixel(5, 3), Some([0, 0, 0, 0]));
        assert_eq!(s.bitmap().count_pixels_not(Color::TRANSPARENT), 6);
    }

    #[test]
    fn test_clip_stack_limits_drawing() {
        let mut s = RasterSurface::new(10, 10);
        s.push_clip(Rect::new(0.0, 0.0, 5.0, 10.0));
        s.fill_rect(Rect::new(0.0, 0.0, 10.0, 10.0), red());
        s.pop_clip();
        assert_eq!(s.bitmap().get_pixel(4, 0), Some(RED));
        assert_eq!(s.bitmap().get_pixel(5, 0), Some([0, 0, 0, 0]));
        s.pop_clip();
        s.fill_rect(Rect::new(9.0, 9.0, 1.0, 1.0), red());
        assert_eq!(s.bitmap().get_pixel(9, 9), Some(RED));
    }

    #[test]
    fn test_rounded_rect_skips_corners() {
        let mut s = RasterSurface::new(20, 20);
        s.fill_rounded_rect(Rect::new(0.0, 0.0, 20.0, 20.0), 8.0, red());
        assert_eq!(s.bitmap().get_pixel(0, 0), Some([0, 0, 0, 0]));
        assert_eq!(s.bitmap().get_pixel(10, 10), Some(RED));
        assert_eq!(s.bitmap().get_pixel(10, 0), Some(RED));
    }

    #[test]
    fn test_quarter_arc_covers_top_right_only() {
        let mut s = RasterSurface::new(40, 40);
        s.stroke_arc(Point::new(20.0, 20.0), 15.0, -FRAC_PI_2, FRAC_PI_2, 4.0, red());
        // Straight up from center lies on the arc; straight down does not.
        assert_eq!(s.bitmap().get_pixel(20, 5), Some(RED));
        assert_eq!(s.bitmap().get_pixel(20, 34), Some([0, 0, 0, 0]));
        // Right side (angle 0) is the end of the sweep.
        assert_eq!(s.bitmap().get_pixel(34, 19), Some(RED));
        assert_eq!(s.bitmap().get_pixel(5, 20), Some([0, 0, 0, 0]));
    }

    #[test]
    fn test_block_text_matches_fixed_metrics() {
        let mut s = RasterSurface::new(100, 40);
        let style = TextStyle::new(20.0, Color::WHITE);
        let m = s.measure_text("ab", &style);
        assert!((m.width - 24.0).abs() < 1e-9);
        s.fill_text("a b", Point::new(0.0, 0.0), &style);
        assert!(s.bitmap().count_pixels_not(Color::TRANSPARENT) > 0);
        // The space cell stays empty.
        assert_eq!(s.bitmap().get_pixel(18, 12), Some([0, 0, 0, 0]));
    }

    #[test]
    fn test_draw_bitmap_respects_rounded_clip() {
        let mut s = RasterSurface::new(20, 20);
        let src = Bitmap::solid(2, 2, red());
        let area = Rect::new(0.0, 0.0, 20.0, 20.0);
        s.draw_bitmap(&src, area, area, 6.0, 1.0);
        assert_eq!(s.bitmap().get_pixel(0, 0), Some([0, 0, 0, 0]));
        assert_eq!(s.bitmap().get_pixel(10, 10), Some(RED));
    }

    #[test]
    fn test_identical_commands_identical_bytes() {
        let draw = || {
            let mut s = RasterSurface::new(32, 32);
            s.clear(Color::BLACK);
            s.fill_rounded_rect(Rect::new(3.0, 3.0, 20.0, 12.0), 4.0, red());
            s.stroke_arc(Point::new(16.0, 16.0), 10.0, 0.0, 2.0, 3.0, Color::WHITE);
            s.into_bitmap()
        };
        assert_eq!(draw(), draw());
    }
}

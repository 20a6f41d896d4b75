//! The drawing contract scene objects paint through.
//!
//! Painting is infallible: a surface clips anything outside its bounds and
//! never returns an error to the painter. Two implementations exist, the
//! pixel raster in the render engine and [`RecordingSurface`] here, which
//! captures the command stream for inspection.

use serde::{Deserialize, Serialize};

use crate::bitmap::Bitmap;
use crate::color::Color;
use crate::geometry::{Point, Rect};

/// Line height as a multiple of the font size.
pub const LINE_HEIGHT: f64 = 1.2;

/// Glyph advance as a multiple of the font size when no font is loaded.
pub const FALLBACK_ADVANCE: f64 = 0.6;

/// Font and fill used for a text run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextStyle {
    pub font_size: f64,
    pub color: Color,
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub monospace: bool,
}

impl TextStyle {
    pub fn new(font_size: f64, color: Color) -> Self {
        Self {
            font_size,
            color,
            bold: false,
            monospace: false,
        }
    }

    pub fn monospace(mut self) -> Self {
        self.monospace = true;
        self
    }

    pub fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    pub fn line_height(&self) -> f64 {
        self.font_size * LINE_HEIGHT
    }
}

/// Measured extent of a text run.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TextMetrics {
    pub width: f64,
    pub height: f64,
}

/// Fixed-advance metrics: every glyph is `FALLBACK_ADVANCE * font_size` wide.
///
/// Multi-line runs measure as the widest line by the line count.
pub fn fixed_text_metrics(text: &str, style: &TextStyle) -> TextMetrics {
    let advance = style.font_size * FALLBACK_ADVANCE;
    let mut lines = 0usize;
    let mut widest = 0usize;
    for line in text.split('\n') {
        lines += 1;
        widest = widest.max(line.chars().count());
    }
    TextMetrics {
        width: widest as f64 * advance,
        height: lines as f64 * style.line_height(),
    }
}

/// A 2D drawing target.
///
/// Angles are radians, measured clockwise from the positive x axis (canvas
/// y grows downward), so `-PI / 2` points straight up.
pub trait Surface {
    /// Surface width in pixels.
    fn width(&self) -> u32;

    /// Surface height in pixels.
    fn height(&self) -> u32;

    /// Replace every pixel with `color`.
    fn clear(&mut self, color: Color);

    fn fill_rect(&mut self, rect: Rect, color: Color);

    fn fill_rounded_rect(&mut self, rect: Rect, radius: f64, color: Color);

    /// Outline `rect` with a stroke centered on its edges.
    fn stroke_rect(&mut self, rect: Rect, line_width: f64, color: Color);

    /// Stroke a circular arc of `sweep` radians starting at `start_angle`.
    fn stroke_arc(
        &mut self,
        center: Point,
        radius: f64,
        start_angle: f64,
        sweep: f64,
        line_width: f64,
        color: Color,
    );

    /// Draw `text` with its top-left corner at `origin`.
    fn fill_text(&mut self, text: &str, origin: Point, style: &TextStyle);

    fn measure_text(&self, text: &str, style: &TextStyle) -> TextMetrics;

    /// Scale `bitmap` into `dest`, showing only the part inside `clip`
    /// (a rounded rectangle with `clip_radius`).
    fn draw_bitmap(&mut self, bitmap: &Bitmap, dest: Rect, clip: Rect, clip_radius: f64, opacity: f64);

    /// Restrict subsequent drawing to `rect` (intersected with any active clip).
    fn push_clip(&mut self, rect: Rect);

    /// Drop the most recent clip. No-op when none is active.
    fn pop_clip(&mut self);
}

/// One recorded drawing call.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Clear(Color),
    FillRect {
        rect: Rect,
        color: Color,
    },
    FillRoundedRect {
        rect: Rect,
        radius: f64,
        color: Color,
    },
    StrokeRect {
        rect: Rect,
        line_width: f64,
        color: Color,
    },
    StrokeArc {
        center: Point,
        radius: f64,
        start_angle: f64,
        sweep: f64,
        line_width: f64,
        color: Color,
    },
    FillText {
        text: String,
        origin: Point,
        style: TextStyle,
    },
    DrawBitmap {
        width: u32,
        height: u32,
        dest: Rect,
        clip: Rect,
        clip_radius: f64,
        opacity: f64,
    },
    PushClip(Rect),
    PopClip,
}

/// A surface that records commands instead of rasterizing them.
#[derive(Debug, Clone, Default)]
pub struct RecordingSurface {
    width: u32,
    height: u32,
    commands: Vec<DrawCommand>,
}

impl RecordingSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            commands: Vec::new(),
        }
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn take_commands(&mut self) -> Vec<DrawCommand> {
        std::mem::take(&mut self.commands)
    }

    /// Whether anything besides a clear was drawn.
    pub fn has_marks(&self) -> bool {
        self.commands
            .iter()
            .any(|c| {
                !matches!(
                    c,
                    DrawCommand::Clear(_) | DrawCommand::PushClip(_) | DrawCommand::PopClip
                )
            })
    }

    /// All text runs drawn, in order.
    pub fn texts(&self) -> Vec<&str> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                DrawCommand::FillText { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl Surface for RecordingSurface {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn clear(&mut self, color: Color) {
        self.commands.push(DrawCommand::Clear(color));
    }

    fn fill_rect(&mut self, rect: Rect, color: Color) {
        self.commands.push(DrawCommand::FillRect { rect, color });
    }

    fn fill_rounded_rect(&mut self, rect: Rect, radius: f64, color: Color) {
        self.commands
            .push(DrawCommand::FillRoundedRect { rect, radius, color });
    }

    fn stroke_rect(&mut self, rect: Rect, line_width: f64, color: Color) {
        self.commands.push(DrawCommand::StrokeRect {
            rect,
            line_width,
            color,
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
        self.commands.push(DrawCommand::StrokeArc {
            center,
            radius,
            start_angle,
            sweep,
            line_width,
            color,
        });
    }

    fn fill_text(&mut self, text: &str, origin: Point, style: &TextStyle) {
        self.commands.push(DrawCommand::FillText {
            text: text.to_string(),
            origin,
            style: style.clone(),
        });
    }

    fn measure_text(&self, text: &str, style: &TextStyle) -> TextMetrics {
        fixed_text_metrics(text, style)
    }

    fn draw_bitmap(&mut self, bitmap: &Bitmap, dest: Rect, clip: Rect, clip_radius: f64, opacity: f64) {
        self.commands.push(DrawCommand::DrawBitmap {
            width: bitmap.width(),
            height: bitmap.height(),
            dest,
            clip,
            clip_radius,
            opacity,
        });
    }

    fn push_clip(&mut self, rect: Rect) {
        self.commands.push(DrawCommand::PushClip(rect));
    }

    fn pop_clip(&mut self) {
        self.commands.push(DrawCommand::PopClip);
    }
}

use std::f64::consts::{FRAC_PI_2, TAU};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Drawable, ObjectKind, PaintContext};
use crate::color::Color;
use crate::easing::ease_out_cubic;
use crate::geometry::{Point, Rect};
use crate::props::{self, PropertyMap};
use crate::surface::TextStyle;

/// Where a circular progress arc begins: straight up.
pub const ARC_START_ANGLE: f64 = -FRAC_PI_2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProgressStyle {
    #[default]
    Linear,
    Circular,
}

impl ProgressStyle {
    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "linear" | "bar" => Some(Self::Linear),
            "circular" | "circle" | "ring" => Some(Self::Circular),
            _ => None,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Self::Linear => "linear",
            Self::Circular => "circular",
        }
    }
}

/// A bar or ring filling up to a percentage.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressObject {
    /// Target percentage in `[0, 100]`.
    pub value: f64,
    pub style: ProgressStyle,
    pub color: Color,
    pub track_color: Color,
    /// Ring stroke width (circular only).
    pub thickness: f64,
    pub show_label: bool,
    pub font_size: f64,
}

impl ProgressObject {
    pub fn new(value: f64, style: ProgressStyle) -> Self {
        Self {
            value: value.clamp(0.0, 100.0),
            style,
            ..Self::default()
        }
    }

    /// Interpolated percentage at `progress`.
    pub fn percent_at(&self, progress: f64) -> f64 {
        self.value.clamp(0.0, 100.0) * ease_out_cubic(progress)
    }

    fn paint_label(&self, ctx: &mut PaintContext<'_>, pct: f64, center: Point) {
        if !self.show_label {
            return;
        }
        let style = TextStyle::new(self.font_size, self.color).bold();
        let label = format!("{}%", pct.round() as i64);
        let m = ctx.surface.measure_text(&label, &style);
        let origin = Point::new(center.x - m.width / 2.0, center.y - m.height / 2.0);
        ctx.surface.fill_text(&label, origin, &style);
    }
}

impl Default for ProgressObject {
    fn default() -> Self {
        Self {
            value: 75.0,
            style: ProgressStyle::Linear,
            color: Color::SELECTION,
            track_color: Color::rgba(1.0, 1.0, 1.0, 0.15),
            thickness: 12.0,
            show_label: false,
            font_size: 20.0,
        }
    }
}

impl Drawable for ProgressObject {
    fn kind(&self) -> ObjectKind {
        ObjectKind::Progress
    }

    fn paint(&self, ctx: &mut PaintContext<'_>) {
        let pct = self.percent_at(ctx.progress);
        let b = *ctx.bounds;
        match self.style {
            ProgressStyle::Linear => {
                let radius = b.height / 2.0;
                ctx.surface.fill_rounded_rect(b, radius, self.track_color);
                let filled = b.width * pct / 100.0;
                if filled > 0.0 {
                    let bar = Rect::new(b.x, b.y, filled, b.height);
                    ctx.surface
                        .fill_rounded_rect(bar, radius.min(filled / 2.0), self.color);
                }
                self.paint_label(ctx, pct, b.center());
            }
            ProgressStyle::Circular => {
                let center = b.center();
                let radius = ((b.width.min(b.height) - self.thickness) / 2.0).max(0.0);
                ctx.surface
                    .stroke_arc(center, radius, 0.0, TAU, self.thickness, self.track_color);
                let sweep = TAU * pct / 100.0;
                if sweep > 0.0 {
                    ctx.surface.stroke_arc(
                        center,
                        radius,
                        ARC_START_ANGLE,
                        sweep,
                        self.thickness,
                        self.color,
                    );
                }
                self.paint_label(ctx, pct, center);
            }
        }
    }

    fn write_properties(&self, out: &mut PropertyMap) {
        out.insert("value".into(), props::number_value(self.value));
        out.insert("variant".into(), Value::from(self.style.as_str()));
        out.insert("color".into(), Value::from(self.color.to_string()));
        out.insert("trackColor".into(), Value::from(self.track_color.to_string()));
        out.insert("thickness".into(), props::number_value(self.thickness));
        out.insert("showLabel".into(), Value::from(self.show_label));
        out.insert("fontSize".into(), props::number_value(self.font_size));
    }

    fn apply_property(&mut self, key: &str, value: &Value) -> bool {
        match key {
            "value" => props::assign(&mut self.value, key, value, |v| {
                props::coerce_number(v).map(|n| n.clamp(0.0, 100.0))
            }),
            "variant" => props::assign(&mut self.style, key, value, |v| {
                v.as_str().and_then(ProgressStyle::parse)
            }),
            "color" => props::assign(&mut self.color, key, value, props::coerce_color),
            "trackColor" => props::assign(&mut self.track_color, key, value, props::coerce_color),
            "thickness" => props::assign(&mut self.thickness, key, value, |v| {
                props::coerce_number(v).map(|n| n.max(0.0))
            }),
            "showLabel" => props::assign(&mut self.show_label, key, value, props::coerce_bool),
            "fontSize" => props::assign(&mut self.font_size, key, value, |v| {
                props::coerce_number(v).filter(|n| *n > 0.0)
            }),
            _ => return false,
        }
        true
    }
}

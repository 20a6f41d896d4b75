use serde_json::Value;

use super::{Drawable, ObjectKind, PaintContext};
use crate::color::Color;
use crate::easing::ease_out_cubic;
use crate::geometry::Point;
use crate::props::{self, PropertyMap};
use crate::surface::TextStyle;

/// A number that counts up (or down) into place.
#[derive(Debug, Clone, PartialEq)]
pub struct CounterObject {
    pub start_value: f64,
    pub end_value: f64,
    pub prefix: String,
    pub suffix: String,
    pub font_size: f64,
    pub color: Color,
}

impl CounterObject {
    pub fn new(start_value: f64, end_value: f64) -> Self {
        Self {
            start_value,
            end_value,
            ..Self::default()
        }
    }

    /// Rounded value shown at `progress`.
    /// Halves round toward positive infinity, so `-2.5` shows as `-2`.
    pub fn value_at(&self, progress: f64) -> i64 {
        let eased = ease_out_cubic(progress);
        (self.start_value + (self.end_value - self.start_value) * eased + 0.5).floor() as i64
    }

    /// Formatted label shown at `progress`, e.g. `$1,250+`.
    pub fn label_at(&self, progress: f64) -> String {
        format!(
            "{}{}{}",
            self.prefix,
            format_grouped(self.value_at(progress)),
            self.suffix
        )
    }

    fn style(&self) -> TextStyle {
        TextStyle::new(self.font_size, self.color).bold()
    }
}

impl Default for CounterObject {
    fn default() -> Self {
        Self {
            start_value: 0.0,
            end_value: 100.0,
            prefix: String::new(),
            suffix: String::new(),
            font_size: 64.0,
            color: Color::WHITE,
        }
    }
}

/// Integer with comma thousands separators: `-1234567` becomes `-1,234,567`.
pub fn format_grouped(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if value < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

impl Drawable for CounterObject {
    fn kind(&self) -> ObjectKind {
        ObjectKind::Counter
    }

    fn paint(&self, ctx: &mut PaintContext<'_>) {
        let style = self.style();
        let label = self.label_at(ctx.progress);
        let measured = ctx.surface.measure_text(&label, &style);
        ctx.bounds.width = measured.width;
        ctx.bounds.height = measured.height;
        ctx.surface
            .fill_text(&label, Point::new(ctx.bounds.x, ctx.bounds.y), &style);
    }

    fn write_properties(&self, out: &mut PropertyMap) {
        out.insert("startValue".into(), props::number_value(self.start_value));
        out.insert("endValue".into(), props::number_value(self.end_value));
        out.insert("prefix".into(), Value::from(self.prefix.clone()));
        out.insert("suffix".into(), Value::from(self.suffix.clone()));
        out.insert("fontSize".into(), props::number_value(self.font_size));
        out.insert("color".into(), Value::from(self.color.to_string()));
    }

    fn apply_property(&mut self, key: &str, value: &Value) -> bool {
        match key {
            "startValue" => props::assign(&mut self.start_value, key, value, props::coerce_number),
            "endValue" => props::assign(&mut self.end_value, key, value, props::coerce_number),
            "prefix" => props::assign(&mut self.prefix, key, value, props::coerce_string),
            "suffix" => props::assign(&mut self.suffix, key, value, props::coerce_string),
            "fontSize" => props::assign(&mut self.font_size, key, value, |v| {
                props::coerce_number(v).filter(|n| *n > 0.0)
            }),
            "color" => props::assign(&mut self.color, key, value, props::coerce_color),
            _ => return false,
        }
        true
    }
}

use serde_json::Value;

use super::text::reveal_prefix;
use super::{Drawable, ObjectKind, PaintContext};
use crate::color::Color;
use crate::easing::staggered;
use crate::geometry::Point;
use crate::props::{self, PropertyMap};
use crate::surface::TextStyle;

/// A monospace code block whose lines type themselves in.
#[derive(Debug, Clone, PartialEq)]
pub struct CodeObject {
    pub code: String,
    pub font_size: f64,
    pub color: Color,
    pub background: Color,
    pub padding: f64,
    pub corner_radius: f64,
    /// Delay between successive lines, as a fraction of the whole entrance.
    pub line_stagger: f64,
}

impl CodeObject {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            ..Self::default()
        }
    }

    /// The visible part of each line at `progress`.
    pub fn visible_lines(&self, progress: f64) -> Vec<&str> {
        let lines: Vec<&str> = self.code.split('\n').collect();
        let n = lines.len();
        lines
            .into_iter()
            .enumerate()
            .map(|(i, line)| reveal_prefix(line, staggered(progress, i, n, self.line_stagger)))
            .collect()
    }
}

impl Default for CodeObject {
    fn default() -> Self {
        Self {
            code: "fn main() {\n    println!(\"hello\");\n}".to_string(),
            font_size: 16.0,
            color: Color::rgb(0.89, 0.91, 0.94),
            background: Color::rgb(0.07, 0.09, 0.15),
            padding: 16.0,
            corner_radius: 8.0,
            line_stagger: 0.1,
        }
    }
}

impl Drawable for CodeObject {
    fn kind(&self) -> ObjectKind {
        ObjectKind::Code
    }

    fn paint(&self, ctx: &mut PaintContext<'_>) {
        let b = *ctx.bounds;
        ctx.surface
            .fill_rounded_rect(b, self.corner_radius, self.background);

        let style = TextStyle::new(self.font_size, self.color).monospace();
        let line_h = style.line_height();
        ctx.surface.push_clip(b);
        for (i, line) in self.visible_lines(ctx.progress).into_iter().enumerate() {
            if line.is_empty() {
                continue;
            }
            let origin = Point::new(b.x + self.padding, b.y + self.padding + i as f64 * line_h);
            ctx.surface.fill_text(line, origin, &style);
        }
        ctx.surface.pop_clip();
    }

    fn write_properties(&self, out: &mut PropertyMap) {
        out.insert("code".into(), Value::from(self.code.clone()));
        out.insert("fontSize".into(), props::number_value(self.font_size));
        out.insert("color".into(), Value::from(self.color.to_string()));
        out.insert("background".into(), Value::from(self.background.to_string()));
        out.insert("padding".into(), props::number_value(self.padding));
        out.insert("cornerRadius".into(), props::number_value(self.corner_radius));
        out.insert("lineStagger".into(), props::number_value(self.line_stagger));
    }

    fn apply_property(&mut self, key: &str, value: &Value) -> bool {
        match key {
            "code" => props::assign(&mut self.code, key, value, props::coerce_string),
            "fontSize" => props::assign(&mut self.font_size, key, value, |v| {
                props::coerce_number(v).filter(|n| *n > 0.0)
            }),
            "color" => props::assign(&mut self.color, key, value, props::coerce_color),
            "background" => props::assign(&mut self.background, key, value, props::coerce_color),
            "padding" => props::assign(&mut self.padding, key, value, |v| {
                props::coerce_number(v).map(|n| n.max(0.0))
            }),
            "cornerRadius" => props::assign(&mut self.corner_radius, key, value, |v| {
                props::coerce_number(v).map(|n| n.max(0.0))
            }),
            "lineStagger" => props::assign(&mut self.line_stagger, key, value, |v| {
                props::coerce_number(v).map(|n| n.clamp(0.0, 1.0))
            }),
            _ => return false,
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rect;
    use crate::object::SceneObject;
    use crate::surface::RecordingSurface;

    #[test]
    fn test_lines_reveal_in_order() {
        let code = CodeObject {
            line_stagger: 0.5,
            ..CodeObject::new("abcd\nefgh")
        };
        // progress * 1.5 = 0.75 for the first line, 0.25 for the second.
        assert_eq!(code.visible_lines(0.5), vec!["abc", "e"]);
        assert_eq!(code.visible_lines(1.0), vec!["abcd", "efgh"]);
        assert_eq!(code.visible_lines(0.0), vec!["", ""]);
    }

    #[test]
    fn test_paint_clips_to_block() {
        let mut obj = SceneObject::new(CodeObject::new("x = 1"), Rect::new(0.0, 0.0, 200.0, 80.0))
            .with_timing(0.0, 0.0);
        let mut surface = RecordingSurface::new(300, 300);
        obj.paint(&mut surface, 0.0);
        assert_eq!(surface.texts(), vec!["x = 1"]);
        // Fixed block: painting never resizes it.
        assert_eq!(obj.bounds(), Rect::new(0.0, 0.0, 200.0, 80.0));
    }
}

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Drawable, ObjectKind, PaintContext};
use crate::color::Color;
use crate::easing::ease_out_cubic;
use crate::geometry::Point;
use crate::props::{self, PropertyMap};
use crate::surface::TextStyle;

/// Vertical distance a sliding text travels, in pixels.
pub const SLIDE_DISTANCE: f64 = 50.0;

/// How a text object enters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TextAnimation {
    /// Characters appear one at a time.
    #[default]
    Typewriter,
    Fade,
    /// Rises into place from below, decelerating.
    Slide,
    None,
}

impl TextAnimation {
    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "typewriter" => Some(Self::Typewriter),
            "fade" => Some(Self::Fade),
            "slide" => Some(Self::Slide),
            "none" => Some(Self::None),
            _ => None,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Self::Typewriter => "typewriter",
            Self::Fade => "fade",
            Self::Slide => "slide",
            Self::None => "none",
        }
    }
}

/// A run of text sized by its measured glyph metrics.
#[derive(Debug, Clone, PartialEq)]
pub struct TextObject {
    pub text: String,
    pub font_size: f64,
    pub color: Color,
    pub bold: bool,
    pub animation: TextAnimation,
}

impl TextObject {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn with_animation(mut self, animation: TextAnimation) -> Self {
        self.animation = animation;
        self
    }

    pub fn style(&self) -> TextStyle {
        let style = TextStyle::new(self.font_size, self.color);
        if self.bold {
            style.bold()
        } else {
            style
        }
    }

    /// The characters a typewriter reveal shows at `progress`.
    pub fn revealed(&self, progress: f64) -> &str {
        reveal_prefix(&self.text, progress)
    }
}

impl Default for TextObject {
    fn default() -> Self {
        Self {
            text: "Text".to_string(),
            font_size: 48.0,
            color: Color::WHITE,
            bold: false,
            animation: TextAnimation::Typewriter,
        }
    }
}

/// The prefix of `text` holding `floor(chars * progress)` characters.
pub(crate) fn reveal_prefix(text: &str, progress: f64) -> &str {
    let total = text.chars().count();
    let shown = ((total as f64) * progress.clamp(0.0, 1.0)).floor() as usize;
    match text.char_indices().nth(shown) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

impl Drawable for TextObject {
    fn kind(&self) -> ObjectKind {
        ObjectKind::Text
    }

    fn paint(&self, ctx: &mut PaintContext<'_>) {
        let style = self.style();
        let measured = ctx.surface.measure_text(&self.text, &style);
        ctx.bounds.width = measured.width;
        ctx.bounds.height = measured.height;

        let origin = Point::new(ctx.bounds.x, ctx.bounds.y);
        match self.animation {
            TextAnimation::Typewriter => {
                let shown = self.revealed(ctx.progress);
                if !shown.is_empty() {
                    ctx.surface.fill_text(shown, origin, &style);
                }
            }
            TextAnimation::Fade => {
                let faded = TextStyle {
                    color: style.color.faded(ctx.progress),
                    ..style
                };
                ctx.surface.fill_text(&self.text, origin, &faded);
            }
            TextAnimation::Slide => {
                let offset = SLIDE_DISTANCE * (1.0 - ease_out_cubic(ctx.progress));
                let origin = Point::new(origin.x, origin.y + offset);
                ctx.surface.fill_text(&self.text, origin, &style);
            }
            TextAnimation::None => ctx.surface.fill_text(&self.text, origin, &style),
        }
    }

    fn write_properties(&self, out: &mut PropertyMap) {
        out.insert("text".into(), Value::from(self.text.clone()));
        out.insert("fontSize".into(), props::number_value(self.font_size));
        out.insert("color".into(), Value::from(self.color.to_string()));
        out.insert("bold".into(), Value::from(self.bold));
        out.insert("animation".into(), Value::from(self.animation.as_str()));
    }

    fn apply_property(&mut self, key: &str, value: &Value) -> bool {
        match key {
            "text" => props::assign(&mut self.text, key, value, props::coerce_string),
            "fontSize" => props::assign(&mut self.font_size, key, value, |v| {
                props::coerce_number(v).filter(|n| *n > 0.0)
            }),
            "color" => props::assign(&mut self.color, key, value, props::coerce_color),
            "bold" => props::assign(&mut self.bold, key, value, props::coerce_bool),
            "animation" => props::assign(&mut self.animation, key, value, |v| {
                v.as_str().and_then(TextAnimation::parse)
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
    use crate::surface::{DrawCommand, RecordingSurface};
    use serde_json::json;

    #[test]
    fn test_typewriter_half_way_reveals_one_of_two() {
        let mut obj =
            SceneObject::new(TextObject::new("Hi"), Rect::new(0.0, 0.0, 10.0, 10.0)).with_timing(0.0, 1000.0);
        let mut surface = RecordingSurface::new(200, 200);
        obj.paint(&mut surface, 500.0);
        assert_eq!(surface.texts(), vec!["H"]);
    }

    #[test]
    fn test_reveal_prefix_respects_char_boundaries() {
        assert_eq!(reveal_prefix("héllo", 0.4), "hé");
        assert_eq!(reveal_prefix("abc", 0.0), "");
        assert_eq!(reveal_prefix("abc", 1.0), "abc");
    }

    #[test]
    fn test_paint_caches_measured_size() {
        let mut obj =
            SceneObject::new(TextObject::new("abcd"), Rect::new(5.0, 5.0, 1.0, 1.0)).with_timing(0.0, 0.0);
        let mut surface = RecordingSurface::new(200, 200);
        obj.paint(&mut surface, 0.0);
        // 4 glyphs at 0.6 * 48 px, one line at 1.2 * 48 px.
        assert!((obj.bounds().width - 115.2).abs() < 1e-9);
        assert!((obj.bounds().height - 57.6).abs() < 1e-9);
        assert!(obj.contains_point(100.0, 50.0));
    }

    #[test]
    fn test_slide_starts_below_and_settles() {
        let data = TextObject::new("Go").with_animation(TextAnimation::Slide);
        let mut obj = SceneObject::new(data, Rect::new(0.0, 100.0, 0.0, 0.0)).with_timing(0.0, 1000.0);
        let mut surface = RecordingSurface::new(200, 200);
        obj.paint(&mut surface, 0.0);
        obj.paint(&mut surface, 1000.0);
        let ys: Vec<f64> = surface
            .commands()
            .iter()
            .filter_map(|c| match c {
                DrawCommand::FillText { origin, .. } => Some(origin.y),
                _ => None,
            })
            .collect();
        assert_eq!(ys, vec![150.0, 100.0]);
    }

    #[test]
    fn test_fade_scales_alpha() {
        let data = TextObject::new("Go").with_animation(TextAnimation::Fade);
        let mut obj = SceneObject::new(data, Rect::default()).with_timing(0.0, 1000.0);
        let mut surface = RecordingSurface::new(200, 200);
        obj.paint(&mut surface, 250.0);
        match &surface.commands()[0] {
            DrawCommand::FillText { style, .. } => assert!((style.color.a - 0.25).abs() < 1e-6),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_apply_properties() {
        let mut t = TextObject::default();
        assert!(t.apply_property("fontSize", &json!("32")));
        assert!(t.apply_property("animation", &json!("fade")));
        assert!(t.apply_property("animation", &json!("spin")));
        assert!(!t.apply_property("radius", &json!(3)));
        assert_eq!(t.font_size, 32.0);
        assert_eq!(t.animation, TextAnimation::Fade);
    }
}

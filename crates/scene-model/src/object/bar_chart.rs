use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Drawable, ObjectKind, PaintContext};
use crate::color::Color;
use crate::easing::{ease_out_cubic, staggered};
use crate::geometry::{Point, Rect};
use crate::props::{self, PropertyMap};
use crate::surface::TextStyle;

/// Space between the plot and the label row.
const LABEL_GAP: f64 = 6.0;

/// One bar of a chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarDatum {
    pub label: String,
    pub value: f64,
    /// Overrides the chart's bar color.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
}

impl BarDatum {
    pub fn new(label: impl Into<String>, value: f64) -> Self {
        Self {
            label: label.into(),
            value,
            color: None,
        }
    }

    fn to_value(&self) -> Value {
        let mut map = PropertyMap::new();
        map.insert("label".into(), Value::from(self.label.clone()));
        map.insert("value".into(), props::number_value(self.value));
        if let Some(color) = self.color {
            map.insert("color".into(), Value::from(color.to_string()));
        }
        Value::Object(map)
    }

    fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        Some(Self {
            label: obj.get("label").and_then(props::coerce_string).unwrap_or_default(),
            value: obj.get("value").and_then(props::coerce_number)?,
            color: obj.get("color").and_then(props::coerce_color),
        })
    }
}

/// Vertical bars that grow from the baseline one after another.
#[derive(Debug, Clone, PartialEq)]
pub struct BarChartObject {
    pub data: Vec<BarDatum>,
    pub bar_color: Color,
    pub label_color: Color,
    pub gap: f64,
    /// Delay between successive bars, as a fraction of the whole entrance.
    pub stagger: f64,
    pub show_labels: bool,
    pub font_size: f64,
    pub corner_radius: f64,
}

impl BarChartObject {
    pub fn new(data: Vec<BarDatum>) -> Self {
        Self {
            data,
            ..Self::default()
        }
    }

    /// Height of bar `index` as a fraction of the plot height at `progress`.
    pub fn bar_fraction(&self, index: usize, progress: f64) -> f64 {
        let Some(datum) = self.data.get(index) else {
            return 0.0;
        };
        let max = self
            .data
            .iter()
            .map(|d| d.value)
            .fold(0.0f64, f64::max);
        if max <= 0.0 {
            return 0.0;
        }
        let local = staggered(progress, index, self.data.len(), self.stagger);
        (datum.value.max(0.0) / max) * ease_out_cubic(local)
    }

    fn label_style(&self) -> TextStyle {
        TextStyle::new(self.font_size, self.label_color)
    }
}

impl Default for BarChartObject {
    fn default() -> Self {
        Self {
            data: vec![
                BarDatum::new("Q1", 40.0),
                BarDatum::new("Q2", 65.0),
                BarDatum::new("Q3", 50.0),
                BarDatum::new("Q4", 90.0),
            ],
            bar_color: Color::SELECTION,
            label_color: Color::rgb(0.8, 0.84, 0.9),
            gap: 16.0,
            stagger: 0.1,
            show_labels: true,
            font_size: 14.0,
            corner_radius: 4.0,
        }
    }
}

impl Drawable for BarChartObject {
    fn kind(&self) -> ObjectKind {
        ObjectKind::BarChart
    }

    fn paint(&self, ctx: &mut PaintContext<'_>) {
        let n = self.data.len();
        if n == 0 {
            return;
        }
        let b = *ctx.bounds;
        let style = self.label_style();
        let label_h = if self.show_labels {
            style.line_height() + LABEL_GAP
        } else {
            0.0
        };
        let plot_h = (b.height - label_h).max(0.0);
        let bar_w = ((b.width - self.gap * (n - 1) as f64) / n as f64).max(0.0);

        for (i, datum) in self.data.iter().enumerate() {
            let x = b.x + i as f64 * (bar_w + self.gap);
            let h = plot_h * self.bar_fraction(i, ctx.progress);
            if h > 0.0 {
                let bar = Rect::new(x, b.y + plot_h - h, bar_w, h);
                let color = datum.color.unwrap_or(self.bar_color);
                ctx.surface
                    .fill_rounded_rect(bar, self.corner_radius.min(h / 2.0), color);
            }
            if self.show_labels && !datum.label.is_empty() {
                let local = staggered(ctx.progress, i, n, self.stagger);
                if local > 0.0 {
                    let faded = TextStyle {
                        color: style.color.faded(local),
                        ..style.clone()
                    };
                    let m = ctx.surface.measure_text(&datum.label, &faded);
                    let origin = Point::new(x + (bar_w - m.width) / 2.0, b.y + plot_h + LABEL_GAP);
                    ctx.surface.fill_text(&datum.label, origin, &faded);
                }
            }
        }
    }

    fn write_properties(&self, out: &mut PropertyMap) {
        out.insert(
            "data".into(),
            Value::Array(self.data.iter().map(BarDatum::to_value).collect()),
        );
        out.insert("barColor".into(), Value::from(self.bar_color.to_string()));
        out.insert("labelColor".into(), Value::from(self.label_color.to_string()));
        out.insert("gap".into(), props::number_value(self.gap));
        out.insert("stagger".into(), props::number_value(self.stagger));
        out.insert("showLabels".into(), Value::from(self.show_labels));
        out.insert("fontSize".into(), props::number_value(self.font_size));
        out.insert("cornerRadius".into(), props::number_value(self.corner_radius));
    }

    fn apply_property(&mut self, key: &str, value: &Value) -> bool {
        match key {
            "data" => props::assign(&mut self.data, key, value, |v| {
                v.as_array()
                    .map(|items| items.iter().filter_map(BarDatum::from_value).collect())
            }),
            "barColor" => props::assign(&mut self.bar_color, key, value, props::coerce_color),
            "labelColor" => props::assign(&mut self.label_color, key, value, props::coerce_color),
            "gap" => props::assign(&mut self.gap, key, value, |v| {
                props::coerce_number(v).map(|n| n.max(0.0))
            }),
            "stagger" => props::assign(&mut self.stagger, key, value, |v| {
                props::coerce_number(v).map(|n| n.clamp(0.0, 1.0))
            }),
            "showLabels" => props::assign(&mut self.show_labels, key, value, props::coerce_bool),
            "fontSize" => props::assign(&mut self.font_size, key, value, |v| {
                props::coerce_number(v).filter(|n| *n > 0.0)
            }),
            "cornerRadius" => props::assign(&mut self.corner_radius, key, value, |v| {
                props::coerce_number(v).map(|n| n.max(0.0))
            }),
            _ => return false,
        }
        true
    }
}

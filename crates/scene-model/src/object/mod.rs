//! Scene objects: drawable units with their own entrance animation.
//!
//! A [`SceneObject`] carries the parts every variant shares (identity,
//! bounds, timing window) and an [`ObjectData`] holding the variant-specific
//! parameters. Visual state is a function of the object's progress through
//! `[start_time, start_time + duration]`, so painting the same object at the
//! same time always produces the same output.

pub mod bar_chart;
pub mod code;
pub mod counter;
pub mod image;
pub mod progress;
pub mod text;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::geometry::{Point, Rect};
use crate::props::{self, PropertyMap};
use crate::surface::Surface;

pub use bar_chart::{BarChartObject, BarDatum};
pub use code::CodeObject;
pub use counter::{format_grouped, CounterObject};
pub use image::{AssetState, ImageEffect, ImageObject, ImageSlot};
pub use progress::{ProgressObject, ProgressStyle};
pub use text::{TextAnimation, TextObject};

/// Entrance duration for objects created without explicit timing.
pub const DEFAULT_DURATION_MS: f64 = 1000.0;

/// Unique identifier of a scene object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(Uuid);

impl ObjectId {
    /// A fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ObjectId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// The variant of a scene object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ObjectKind {
    Text,
    Image,
    BarChart,
    Code,
    Counter,
    Progress,
}

impl ObjectKind {
    pub const ALL: [ObjectKind; 6] = [
        ObjectKind::Text,
        ObjectKind::Image,
        ObjectKind::BarChart,
        ObjectKind::Code,
        ObjectKind::Counter,
        ObjectKind::Progress,
    ];

    /// Human-readable label, used when an object has no name.
    pub fn label(&self) -> &'static str {
        match self {
            ObjectKind::Text => "Text",
            ObjectKind::Image => "Image",
            ObjectKind::BarChart => "Bar Chart",
            ObjectKind::Code => "Code",
            ObjectKind::Counter => "Counter",
            ObjectKind::Progress => "Progress",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Inputs handed to a variant when it paints.
pub struct PaintContext<'a> {
    pub surface: &'a mut dyn Surface,
    /// The object's bounds. Variants sized by their content write the
    /// measured size back here.
    pub bounds: &'a mut Rect,
    /// Linear progress through the entrance window, in `[0, 1]`.
    pub progress: f64,
}

/// Behaviour every object variant provides.
pub trait Drawable {
    fn kind(&self) -> ObjectKind;

    fn paint(&self, ctx: &mut PaintContext<'_>);

    /// Write every variant-specific tunable into `out`.
    fn write_properties(&self, out: &mut PropertyMap);

    /// Apply one property. Returns `false` when `key` is not recognised.
    fn apply_property(&mut self, key: &str, value: &Value) -> bool;
}

/// Variant-specific parameters of a scene object.
#[derive(Debug, Clone)]
pub enum ObjectData {
    Text(TextObject),
    Image(ImageObject),
    BarChart(BarChartObject),
    Code(CodeObject),
    Counter(CounterObject),
    Progress(ProgressObject),
}

macro_rules! dispatch {
    ($data:expr, $v:ident => $body:expr) => {
        match $data {
            ObjectData::Text($v) => $body,
            ObjectData::Image($v) => $body,
            ObjectData::BarChart($v) => $body,
            ObjectData::Code($v) => $body,
            ObjectData::Counter($v) => $body,
            ObjectData::Progress($v) => $body,
        }
    };
}

impl ObjectData {
    /// Default parameters for a variant.
    pub fn default_for(kind: ObjectKind) -> Self {
        match kind {
            ObjectKind::Text => ObjectData::Text(TextObject::default()),
            ObjectKind::Image => ObjectData::Image(ImageObject::default()),
            ObjectKind::BarChart => ObjectData::BarChart(BarChartObject::default()),
            ObjectKind::Code => ObjectData::Code(CodeObject::default()),
            ObjectKind::Counter => ObjectData::Counter(CounterObject::default()),
            ObjectKind::Progress => ObjectData::Progress(ProgressObject::default()),
        }
    }
}

impl Drawable for ObjectData {
    fn kind(&self) -> ObjectKind {
        dispatch!(self, v => v.kind())
    }

    fn paint(&self, ctx: &mut PaintContext<'_>) {
        dispatch!(self, v => v.paint(ctx))
    }

    fn write_properties(&self, out: &mut PropertyMap) {
        dispatch!(self, v => v.write_properties(out))
    }

    fn apply_property(&mut self, key: &str, value: &Value) -> bool {
        dispatch!(self, v => v.apply_property(key, value))
    }
}

macro_rules! impl_from_variant {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        $(
            impl From<$ty> for ObjectData {
                fn from(v: $ty) -> Self {
                    ObjectData::$variant(v)
                }
            }
        )*
    };
}

impl_from_variant!(
    Text(TextObject),
    Image(ImageObject),
    BarChart(BarChartObject),
    Code(CodeObject),
    Counter(CounterObject),
    Progress(ProgressObject),
);

/// A drawable, animatable unit owned by a scene.
#[derive(Debug, Clone)]
pub struct SceneObject {
    id: ObjectId,
    name: Option<String>,
    bounds: Rect,
    start_time: f64,
    duration: f64,
    data: ObjectData,
}

impl SceneObject {
    /// Create an object starting at time 0 with the default duration.
    pub fn new(data: impl Into<ObjectData>, bounds: Rect) -> Self {
        Self {
            id: ObjectId::new(),
            name: None,
            bounds,
            start_time: 0.0,
            duration: DEFAULT_DURATION_MS,
            data: data.into(),
        }
    }

    /// A variant with default parameters placed at `(x, y)`.
    pub fn with_defaults(kind: ObjectKind, x: f64, y: f64) -> Self {
        let (width, height) = match kind {
            ObjectKind::Text | ObjectKind::Counter => (200.0, 60.0),
            ObjectKind::Image => (320.0, 180.0),
            ObjectKind::BarChart => (400.0, 240.0),
            ObjectKind::Code => (420.0, 160.0),
            ObjectKind::Progress => (300.0, 24.0),
        };
        Self::new(ObjectData::default_for(kind), Rect::new(x, y, width, height))
    }

    pub fn with_timing(mut self, start_time: f64, duration: f64) -> Self {
        self.set_timing(start_time, duration);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_id(mut self, id: ObjectId) -> Self {
        self.id = id;
        self
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn kind(&self) -> ObjectKind {
        self.data.kind()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The name, or the variant label when unnamed.
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| self.kind().label().to_string())
    }

    pub fn set_name(&mut self, name: Option<String>) {
        self.name = name.filter(|n| !n.trim().is_empty());
    }

    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    pub fn set_bounds(&mut self, bounds: Rect) {
        self.bounds = bounds;
    }

    pub fn set_position(&mut self, x: f64, y: f64) {
        self.bounds.x = x;
        self.bounds.y = y;
    }

    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Set the entrance window. Negative values are clamped to zero.
    pub fn set_timing(&mut self, start_time: f64, duration: f64) {
        self.start_time = start_time.max(0.0);
        self.duration = duration.max(0.0);
    }

    pub fn data(&self) -> &ObjectData {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut ObjectData {
        &mut self.data
    }

    /// Whether the object exists on the canvas at scene time `t`.
    pub fn is_present_at(&self, t: f64) -> bool {
        t >= self.start_time
    }

    /// Linear progress through the entrance window at `t`, or `None`
    /// before the object starts. A zero duration settles immediately.
    pub fn progress_at(&self, t: f64) -> Option<f64> {
        if !self.is_present_at(t) {
            return None;
        }
        if self.duration <= 0.0 {
            return Some(1.0);
        }
        Some(((t - self.start_time) / self.duration).clamp(0.0, 1.0))
    }

    /// Paint at absolute scene time `t`. Writes nothing before the start.
    pub fn paint(&mut self, surface: &mut dyn Surface, t: f64) {
        let Some(progress) = self.progress_at(t) else {
            return;
        };
        let mut ctx = PaintContext {
            surface,
            bounds: &mut self.bounds,
            progress,
        };
        self.data.paint(&mut ctx);
    }

    /// Bounding-box containment against the current (last measured) size.
    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        self.bounds.contains(x, y)
    }

    /// Flat view of every editable property.
    pub fn properties(&self) -> PropertyMap {
        let mut out = PropertyMap::new();
        if let Some(name) = &self.name {
            out.insert("name".into(), Value::from(name.clone()));
        }
        out.insert("x".into(), props::number_value(self.bounds.x));
        out.insert("y".into(), props::number_value(self.bounds.y));
        out.insert("width".into(), props::number_value(self.bounds.width));
        out.insert("height".into(), props::number_value(self.bounds.height));
        out.insert("startTime".into(), props::number_value(self.start_time));
        out.insert("duration".into(), props::number_value(self.duration));
        self.data.write_properties(&mut out);
        out
    }

    /// Apply the keys present in `partial`. Unknown keys are ignored.
    pub fn update_properties(&mut self, partial: &PropertyMap) {
        for (key, value) in partial {
            match key.as_str() {
                "name" => self.set_name(props::coerce_string(value)),
                "x" => props::assign(&mut self.bounds.x, key, value, props::coerce_number),
                "y" => props::assign(&mut self.bounds.y, key, value, props::coerce_number),
                "width" => {
                    props::assign(&mut self.bounds.width, key, value, props::coerce_number);
                    self.bounds.width = self.bounds.width.max(0.0);
                }
                "height" => {
                    props::assign(&mut self.bounds.height, key, value, props::coerce_number);
                    self.bounds.height = self.bounds.height.max(0.0);
                }
                "startTime" => {
                    props::assign(&mut self.start_time, key, value, props::coerce_number);
                    self.start_time = self.start_time.max(0.0);
                }
                "duration" => {
                    props::assign(&mut self.duration, key, value, props::coerce_number);
                    self.duration = self.duration.max(0.0);
                }
                _ => {
                    if !self.data.apply_property(key, value) {
                        tracing::debug!(key, kind = %self.kind(), "Ignoring unknown property");
                    }
                }
            }
        }
    }

    /// A deep copy with a fresh id, shifted by `offset` on both axes.
    pub fn duplicate(&self, offset: f64) -> SceneObject {
        let mut copy = self.clone();
        copy.id = ObjectId::new();
        copy.bounds = self.bounds.translated(offset, offset);
        copy
    }

    /// Top-left corner.
    pub fn origin(&self) -> Point {
        Point::new(self.bounds.x, self.bounds.y)
    }
}

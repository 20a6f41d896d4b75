use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Drawable, ObjectKind, PaintContext};
use crate::bitmap::Bitmap;
use crate::geometry::Rect;
use crate::props::{self, PropertyMap};

/// Zoom effect grows the image from 1.0 to `1.0 + ZOOM_AMOUNT`.
pub const ZOOM_AMOUNT: f64 = 0.2;

/// Pan effect draws the image at this fixed scale and slides it left.
pub const PAN_OVERSCALE: f64 = 1.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ImageEffect {
    #[default]
    None,
    ZoomIn,
    PanLeft,
}

impl ImageEffect {
    fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "none" => Some(Self::None),
            "zoomIn" | "zoom-in" | "zoom" => Some(Self::ZoomIn),
            "panLeft" | "pan-left" | "pan" => Some(Self::PanLeft),
            _ => None,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::ZoomIn => "zoomIn",
            Self::PanLeft => "panLeft",
        }
    }
}

/// Lifecycle of a decoded image asset.
#[derive(Debug, Clone, Default)]
pub enum AssetState {
    /// Nobody has asked for the asset yet.
    #[default]
    Pending,
    Loading,
    Ready(Arc<Bitmap>),
    /// Decoding failed. The object paints nothing from here on.
    Failed(String),
}

/// Shared slot a background loader fills with a decoded bitmap.
///
/// Clones share the slot; the bitmap is immutable once ready.
#[derive(Debug, Clone, Default)]
pub struct ImageSlot(Arc<Mutex<AssetState>>);

impl ImageSlot {
    pub fn state(&self) -> AssetState {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn bitmap(&self) -> Option<Arc<Bitmap>> {
        match &*self.0.lock().unwrap_or_else(|e| e.into_inner()) {
            AssetState::Ready(bitmap) => Some(Arc::clone(bitmap)),
            _ => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.bitmap().is_some()
    }

    /// Claim the slot for loading. Returns `false` if a load already started
    /// or finished.
    pub fn begin_load(&self) -> bool {
        let mut state = self.0.lock().unwrap_or_else(|e| e.into_inner());
        if matches!(*state, AssetState::Pending) {
            *state = AssetState::Loading;
            true
        } else {
            false
        }
    }

    pub fn resolve(&self, bitmap: Bitmap) {
        *self.0.lock().unwrap_or_else(|e| e.into_inner()) = AssetState::Ready(Arc::new(bitmap));
    }

    pub fn fail(&self, message: impl Into<String>) {
        *self.0.lock().unwrap_or_else(|e| e.into_inner()) = AssetState::Failed(message.into());
    }
}

/// A picture loaded from a path or `file://` URI.
#[derive(Debug, Clone)]
pub struct ImageObject {
    src: String,
    pub effect: ImageEffect,
    pub corner_radius: f64,
    pub opacity: f64,
    slot: ImageSlot,
}

impl ImageObject {
    pub fn new(src: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            ..Self::default()
        }
    }

    pub fn with_effect(mut self, effect: ImageEffect) -> Self {
        self.effect = effect;
        self
    }

    pub fn src(&self) -> &str {
        &self.src
    }

    /// Point at a new source. The previous bitmap is dropped and the object
    /// is not ready until the new one loads.
    pub fn set_src(&mut self, src: impl Into<String>) {
        let src = src.into();
        if src != self.src {
            self.src = src;
            self.slot = ImageSlot::default();
        }
    }

    pub fn slot(&self) -> &ImageSlot {
        &self.slot
    }

    /// Where the bitmap lands for `bounds` at `progress`.
    pub fn destination(&self, bounds: Rect, progress: f64) -> Rect {
        match self.effect {
            ImageEffect::None => bounds,
            ImageEffect::ZoomIn => {
                let scale = 1.0 + ZOOM_AMOUNT * progress;
                let w = bounds.width * scale;
                let h = bounds.height * scale;
                let c = bounds.center();
                Rect::new(c.x - w / 2.0, c.y - h / 2.0, w, h)
            }
            ImageEffect::PanLeft => {
                let w = bounds.width * PAN_OVERSCALE;
                let h = bounds.height * PAN_OVERSCALE;
                let dx = -(w - bounds.width) * progress;
                let y = bounds.y - (h - bounds.height) / 2.0;
                Rect::new(bounds.x + dx, y, w, h)
            }
        }
    }
}

impl Default for ImageObject {
    fn default() -> Self {
        Self {
            src: String::new(),
            effect: ImageEffect::None,
            corner_radius: 12.0,
            opacity: 1.0,
            slot: ImageSlot::default(),
        }
    }
}

impl PartialEq for ImageObject {
    fn eq(&self, other: &Self) -> bool {
        self.src == other.src
            && self.effect == other.effect
            && self.corner_radius == other.corner_radius
            && self.opacity == other.opacity
    }
}

impl Drawable for ImageObject {
    fn kind(&self) -> ObjectKind {
        ObjectKind::Image
    }

    fn paint(&self, ctx: &mut PaintContext<'_>) {
        let Some(bitmap) = self.slot.bitmap() else {
            return;
        };
        let bounds = *ctx.bounds;
        let dest = self.destination(bounds, ctx.progress);
        ctx.surface
            .draw_bitmap(&bitmap, dest, bounds, self.corner_radius, self.opacity);
    }

    fn write_properties(&self, out: &mut PropertyMap) {
        out.insert("src".into(), Value::from(self.src.clone()));
        out.insert("effect".into(), Value::from(self.effect.as_str()));
        out.insert("cornerRadius".into(), props::number_value(self.corner_radius));
        out.insert("opacity".into(), props::number_value(self.opacity));
    }

    fn apply_property(&mut self, key: &str, value: &Value) -> bool {
        match key {
            "src" => {
                if let Some(src) = props::coerce_string(value) {
                    self.set_src(src);
                }
            }
            "effect" => props::assign(&mut self.effect, key, value, |v| {
                v.as_str().and_then(ImageEffect::parse)
            }),
            "cornerRadius" => props::assign(&mut self.corner_radius, key, value, |v| {
                props::coerce_number(v).map(|n| n.max(0.0))
            }),
            "opacity" => props::assign(&mut self.opacity, key, value, |v| {
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
    use crate::color::Color;
    use crate::object::SceneObject;
    use crate::surface::{DrawCommand, RecordingSurface};
    use serde_json::json;

    fn image_obj(effect: ImageEffect) -> SceneObject {
        SceneObject::new(
            ImageObject::new("photo.png").with_effect(effect),
            Rect::new(100.0, 100.0, 200.0, 100.0),
        )
        .with_timing(0.0, 1000.0)
    }

    #[test]
    fn test_not_ready_paints_nothing() {
        let mut obj = image_obj(ImageEffect::None);
        let mut surface = RecordingSurface::new(400, 400);
        obj.paint(&mut surface, 5000.0);
        assert!(!surface.has_marks());
    }

    #[test]
    fn test_failed_load_stays_blank() {
        let mut obj = image_obj(ImageEffect::None);
        if let crate::object::ObjectData::Image(img) = obj.data() {
            assert!(img.slot().begin_load());
            img.slot().fail("decode error");
            assert!(!img.slot().begin_load());
        }
        let mut surface = RecordingSurface::new(400, 400);
        obj.paint(&mut surface, 5000.0);
        assert!(!surface.has_marks());
    }

    #[test]
    fn test_ready_image_is_clipped_to_bounds() {
        let mut obj = image_obj(ImageEffect::ZoomIn);
        if let crate::object::ObjectData::Image(img) = obj.data() {
            img.slot().resolve(Bitmap::solid(4, 4, Color::WHITE));
        }
        let mut surface = RecordingSurface::new(400, 400);
        obj.paint(&mut surface, 500.0);
        match &surface.commands()[0] {
            DrawCommand::DrawBitmap { dest, clip, .. } => {
                assert_eq!(*clip, Rect::new(100.0, 100.0, 200.0, 100.0));
                assert!((dest.width - 220.0).abs() < 1e-9);
                assert!((dest.center().x - 200.0).abs() < 1e-9);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_pan_left_translates_by_overscan() {
        let img = ImageObject::new("a.png").with_effect(ImageEffect::PanLeft);
        let bounds = Rect::new(0.0, 0.0, 100.0, 50.0);
        let start = img.destination(bounds, 0.0);
        let end = img.destination(bounds, 1.0);
        assert_eq!(start.x, 0.0);
        assert!((end.x + 20.0).abs() < 1e-9);
        assert!((end.right() - bounds.right()).abs() < 1e-9);
    }

    #[test]
    fn test_changing_src_resets_slot() {
        let mut img = ImageObject::new("a.png");
        img.slot().resolve(Bitmap::new(1, 1));
        assert!(img.slot().is_ready());
        img.apply_property("src", &json!("a.png"));
        assert!(img.slot().is_ready());
        img.apply_property("src", &json!("b.png"));
        assert!(!img.slot().is_ready());
    }
}

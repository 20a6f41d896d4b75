//! Frame rendering: background, objects in paint order, selection overlay.

use scenecast_common::config::CanvasConfig;
use scenecast_common::error::{SceneError, SceneResult};
use scenecast_scene_model::{Bitmap, Color, Corner, ObjectId, Rect, Scene, Surface};

use crate::raster::{self, FontHandle, RasterSurface};

/// Stroke width of the selection box.
pub const SELECTION_STROKE: f64 = 2.0;

/// What to draw on top of the objects.
#[derive(Debug, Clone, Copy, Default)]
pub struct Overlay {
    pub selected: Option<ObjectId>,
    /// Hidden while previewing or exporting.
    pub suppressed: bool,
    pub handle_size: f64,
}

/// Canvas settings shared by every frame.
#[derive(Clone)]
pub struct FrameRenderer {
    width: u32,
    height: u32,
    background: Color,
    font: Option<FontHandle>,
}

impl std::fmt::Debug for FrameRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameRenderer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("background", &self.background)
            .field("font", &self.font.is_some())
            .finish()
    }
}

impl FrameRenderer {
    pub fn new(width: u32, height: u32, background: Color) -> Self {
        Self {
            width,
            height,
            background,
            font: None,
        }
    }

    /// Build from canvas configuration. An unusable size or font is fatal.
    pub fn from_config(canvas: &CanvasConfig) -> SceneResult<Self> {
        if canvas.width == 0 || canvas.height == 0 {
            return Err(SceneError::config(format!(
                "Drawing surface unavailable: {}x{} canvas",
                canvas.width, canvas.height
            )));
        }
        let background = Color::from_hex(&canvas.background).map_err(|_| {
            SceneError::config(format!("invalid canvas background {:?}", canvas.background))
        })?;
        let font = canvas
            .font_path
            .as_deref()
            .map(raster::load_font)
            .transpose()?;
        Ok(Self {
            width: canvas.width,
            height: canvas.height,
            background,
            font,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn background(&self) -> Color {
        self.background
    }

    /// A blank surface with this canvas's size and font.
    pub fn surface(&self) -> RasterSurface {
        RasterSurface::new(self.width, self.height).with_font(self.font.clone())
    }

    /// Render the scene at time `t` into a new bitmap.
    pub fn render(&self, scene: &mut Scene, t: f64, overlay: &Overlay) -> Bitmap {
        let mut surface = self.surface();
        self.render_into(&mut surface, scene, t, overlay);
        surface.into_bitmap()
    }

    /// Render the scene at time `t` onto any surface.
    pub fn render_into(&self, surface: &mut dyn Surface, scene: &mut Scene, t: f64, overlay: &Overlay) {
        surface.clear(self.background);
        scene.paint(surface, t);
        if overlay.suppressed {
            return;
        }
        if let Some(bounds) = overlay
            .selected
            .and_then(|id| scene.get(id))
            .filter(|o| o.is_present_at(t))
            .map(|o| o.bounds())
        {
            paint_selection(surface, bounds, overlay.handle_size);
        }
    }
}

/// Box around `bounds` plus a square handle on each corner.
pub fn paint_selection(surface: &mut dyn Surface, bounds: Rect, handle_size: f64) {
    surface.stroke_rect(bounds, SELECTION_STROKE, Color::SELECTION);
    for corner in Corner::ALL {
        let handle = bounds.handle(corner, handle_size);
        surface.fill_rect(handle, Color::WHITE);
        surface.stroke_rect(handle, 1.0, Color::SELECTION);
    }
}

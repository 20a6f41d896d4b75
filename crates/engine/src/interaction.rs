//! Pointer-driven selection, drag, and corner-handle resize.

use scenecast_common::config::InteractionConfig;
use scenecast_scene_model::{Corner, ObjectId, Point, Rect, Scene};
use serde::{Deserialize, Serialize};

/// Cursor the host should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CursorHint {
    #[default]
    Default,
    /// Over an object that is not selected.
    Pointer,
    /// Over the selected object's body.
    Move,
    /// Top-left or bottom-right handle.
    ResizeNwse,
    /// Top-right or bottom-left handle.
    ResizeNesw,
}

impl CursorHint {
    pub fn for_corner(corner: Corner) -> Self {
        match corner {
            Corner::TopLeft | Corner::BottomRight => Self::ResizeNwse,
            Corner::TopRight | Corner::BottomLeft => Self::ResizeNesw,
        }
    }

    /// CSS cursor name.
    pub fn css(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Pointer => "pointer",
            Self::Move => "move",
            Self::ResizeNwse => "nwse-resize",
            Self::ResizeNesw => "nesw-resize",
        }
    }
}

/// Gesture in progress between pointer-down and pointer-up.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum InputState {
    #[default]
    Idle,
    Dragging {
        id: ObjectId,
        start: Point,
        snapshot: Rect,
    },
    Resizing {
        id: ObjectId,
        handle: Corner,
        start: Point,
        snapshot: Rect,
    },
}

/// Actions returned from input handlers for the host to process.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    SelectionChanged(Option<ObjectId>),
    ObjectMoved(ObjectId),
    ObjectResized(ObjectId),
    SetCursor(CursorHint),
    RenderNeeded,
}

/// Bounds after dragging `handle` by `(dx, dy)` from `snapshot`.
///
/// The diagonally opposite corner stays where it was and neither side
/// shrinks below `min_size`.
pub fn resize_from_handle(snapshot: Rect, handle: Corner, dx: f64, dy: f64, min_size: f64) -> Rect {
    let anchor = snapshot.corner(handle.opposite());
    let moved = snapshot.corner(handle);
    let (mx, my) = (moved.x + dx, moved.y + dy);

    let left = matches!(handle, Corner::TopLeft | Corner::BottomLeft);
    let top = matches!(handle, Corner::TopLeft | Corner::TopRight);

    let width = if left { anchor.x - mx } else { mx - anchor.x }.max(min_size);
    let height = if top { anchor.y - my } else { my - anchor.y }.max(min_size);
    let x = if left { anchor.x - width } else { anchor.x };
    let y = if top { anchor.y - height } else { anchor.y };
    Rect::new(x, y, width, height)
}

#[derive(Debug, Clone)]
pub struct InteractionController {
    selected: Option<ObjectId>,
    input: InputState,
    cursor: CursorHint,
    handle_size: f64,
    min_size: f64,
}

impl InteractionController {
    pub fn new(config: &InteractionConfig) -> Self {
        Self {
            selected: None,
            input: InputState::Idle,
            cursor: CursorHint::Default,
            handle_size: config.handle_size,
            min_size: config.min_object_size,
        }
    }

    pub fn selected(&self) -> Option<ObjectId> {
        self.selected
    }

    pub fn input(&self) -> &InputState {
        &self.input
    }

    pub fn cursor(&self) -> CursorHint {
        self.cursor
    }

    pub fn handle_size(&self) -> f64 {
        self.handle_size
    }

    /// Change the selection. Returns `true` if it changed.
    pub fn select(&mut self, id: Option<ObjectId>) -> bool {
        if self.selected == id {
            return false;
        }
        self.selected = id;
        true
    }

    /// Drop the selection and any gesture. Returns `true` if something was
    /// selected.
    pub fn clear(&mut self) -> bool {
        self.input = InputState::Idle;
        self.selected.take().is_some()
    }

    /// Forget `id` if it was selected or being manipulated.
    pub fn forget(&mut self, id: ObjectId) -> bool {
        match self.input {
            InputState::Dragging { id: active, .. } | InputState::Resizing { id: active, .. }
                if active == id =>
            {
                self.input = InputState::Idle;
            }
            _ => {}
        }
        if self.selected == Some(id) {
            self.selected = None;
            return true;
        }
        false
    }

    /// Selected object's handle under `point`, tested in [`Corner::ALL`]
    /// order. An object absent at `t` has no handles.
    fn handle_at(&self, scene: &Scene, point: Point, t: f64) -> Option<(ObjectId, Corner, Rect)> {
        let id = self.selected?;
        let object = scene.get(id).filter(|o| o.is_present_at(t))?;
        let bounds = object.bounds();
        Corner::ALL
            .into_iter()
            .find(|&corner| bounds.handle(corner, self.handle_size).contains(point.x, point.y))
            .map(|corner| (id, corner, bounds))
    }

    /// Handle a pointer-down event at scene time `t`. Handles are ignored
    /// while `locked` (previewing or exporting).
    pub fn on_pointer_down(&mut self, scene: &Scene, point: Point, t: f64, locked: bool) -> Vec<Action> {
        let mut actions = Vec::new();

        if !locked {
            if let Some((id, handle, snapshot)) = self.handle_at(scene, point, t) {
                self.input = InputState::Resizing {
                    id,
                    handle,
                    start: point,
                    snapshot,
                };
                return actions;
            }
        }

        match scene.hit_test(point.x, point.y, t) {
            Some(id) => {
                if self.select(Some(id)) {
                    actions.push(Action::SelectionChanged(Some(id)));
                }
                if let Some(object) = scene.get(id) {
                    self.input = InputState::Dragging {
                        id,
                        start: point,
                        snapshot: object.bounds(),
                    };
                }
                actions.push(Action::RenderNeeded);
            }
            None => {
                self.input = InputState::Idle;
                if self.selected.take().is_some() {
                    actions.push(Action::SelectionChanged(None));
                    actions.push(Action::RenderNeeded);
                }
            }
        }
        actions
    }

    /// Handle a pointer-move event.
    pub fn on_pointer_move(&mut self, scene: &mut Scene, point: Point, t: f64, locked: bool) -> Vec<Action> {
        match self.input {
            InputState::Idle => {
                let cursor = self.hover_cursor(scene, point, t, locked);
                if cursor == self.cursor {
                    return Vec::new();
                }
                self.cursor = cursor;
                vec![Action::SetCursor(cursor)]
            }
            InputState::Dragging { id, start, snapshot } => {
                let (dx, dy) = point.delta_from(&start);
                let Some(object) = scene.get_mut(id) else {
                    self.input = InputState::Idle;
                    return Vec::new();
                };
                let moved = snapshot.translated(dx, dy);
                object.set_position(moved.x, moved.y);
                vec![Action::ObjectMoved(id), Action::RenderNeeded]
            }
            InputState::Resizing {
                id,
                handle,
                start,
                snapshot,
            } => {
                let (dx, dy) = point.delta_from(&start);
                let Some(object) = scene.get_mut(id) else {
                    self.input = InputState::Idle;
                    return Vec::new();
                };
                object.set_bounds(resize_from_handle(snapshot, handle, dx, dy, self.min_size));
                vec![Action::ObjectResized(id), Action::RenderNeeded]
            }
        }
    }

    /// Handle a pointer-up event. Always returns to idle.
    pub fn on_pointer_up(&mut self) -> Vec<Action> {
        let previous = std::mem::replace(&mut self.input, InputState::Idle);
        match previous {
            InputState::Idle => Vec::new(),
            InputState::Dragging { id, snapshot, .. } | InputState::Resizing { id, snapshot, .. } => {
                tracing::trace!(id = %id, from = ?snapshot, "Gesture ended");
                vec![Action::RenderNeeded]
            }
        }
    }

    fn hover_cursor(&self, scene: &Scene, point: Point, t: f64, locked: bool) -> CursorHint {
        if !locked {
            if let Some((_, corner, _)) = self.handle_at(scene, point, t) {
                return CursorHint::for_corner(corner);
            }
        }
        match scene.hit_test(point.x, point.y, t) {
            Some(id) if Some(id) == self.selected => CursorHint::Move,
            Some(_) => CursorHint::Pointer,
            None => CursorHint::Default,
        }
    }
}

impl Default for InteractionController {
    fn default() -> Self {
        Self::new(&InteractionConfig::default())
    }
}

//! The engine context: one scene, one clock, one selection, one renderer.
//!
//! Every subsystem reaches shared state through this object. Hosts observe
//! changes through [`Engine::subscribe`].

use std::sync::Arc;
use std::time::Duration;

use scenecast_common::clock::{MonotonicClock, TimeSource};
use scenecast_common::config::EngineConfig;
use scenecast_common::error::SceneResult;
use scenecast_render_engine::{request_scene_images, wait_for_images, FrameRenderer, Overlay};
use scenecast_scene_model::{
    Bitmap, ObjectId, ObjectKind, Point, PropertyMap, Scene, SceneDocument, SceneObject,
};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::events::{EngineEvent, EventBus};
use crate::interaction::{Action, CursorHint, InteractionController};
use crate::playback::{PlaybackClock, PlaybackState, TickOutcome};

/// Keys with a built-in shortcut.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key {
    Delete,
    Backspace,
    Escape,
    Space,
    ArrowLeft,
    ArrowRight,
    Other(String),
}

impl Key {
    /// Parse a DOM `KeyboardEvent.key` value.
    pub fn from_name(name: &str) -> Self {
        match name {
            "Delete" => Self::Delete,
            "Backspace" => Self::Backspace,
            "Escape" | "Esc" => Self::Escape,
            " " | "Space" | "Spacebar" => Self::Space,
            "ArrowLeft" | "Left" => Self::ArrowLeft,
            "ArrowRight" | "Right" => Self::ArrowRight,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Result of a key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyResponse {
    pub handled: bool,
    /// The host should suppress its default behavior (page scroll on space).
    pub prevent_default: bool,
}

impl KeyResponse {
    fn handled() -> Self {
        Self {
            handled: true,
            prevent_default: false,
        }
    }
}

/// One row of an object list.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectSummary {
    pub id: ObjectId,
    pub kind: ObjectKind,
    pub name: String,
    pub start_time: f64,
    pub duration: f64,
}

pub struct Engine {
    pub(crate) config: EngineConfig,
    pub(crate) scene: Scene,
    pub(crate) clock: PlaybackClock,
    pub(crate) interaction: InteractionController,
    pub(crate) renderer: FrameRenderer,
    time_source: Arc<dyn TimeSource>,
    pub(crate) events: EventBus,
    frame: Bitmap,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("objects", &self.scene.len())
            .field("clock", &self.clock)
            .field("selected", &self.interaction.selected())
            .field("renderer", &self.renderer)
            .finish()
    }
}

impl Engine {
    /// Build an engine driven by the monotonic wall clock.
    ///
    /// Fails if the configuration is invalid or the drawing surface cannot
    /// be created.
    pub fn new(config: EngineConfig) -> SceneResult<Self> {
        Self::with_time_source(config, Arc::new(MonotonicClock::start()))
    }

    pub fn with_time_source(config: EngineConfig, time_source: Arc<dyn TimeSource>) -> SceneResult<Self> {
        config.validate()?;
        let renderer = FrameRenderer::from_config(&config.canvas)?;
        let frame = Bitmap::new(renderer.width(), renderer.height());
        tracing::info!(
            width = renderer.width(),
            height = renderer.height(),
            duration_ms = config.playback.total_duration_ms,
            "Engine created"
        );
        let mut engine = Self {
            clock: PlaybackClock::from_config(&config.playback),
            interaction: InteractionController::new(&config.interaction),
            scene: Scene::new(),
            renderer,
            time_source,
            events: EventBus::default(),
            frame,
            config,
        };
        engine.render();
        Ok(engine)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn clock(&self) -> &PlaybackClock {
        &self.clock
    }

    pub fn renderer(&self) -> &FrameRenderer {
        &self.renderer
    }

    /// The most recently rendered frame.
    pub fn frame(&self) -> &Bitmap {
        &self.frame
    }

    pub fn cursor(&self) -> CursorHint {
        self.interaction.cursor()
    }

    // --- Rendering ---

    /// Re-render at the current time.
    pub fn render(&mut self) -> &Bitmap {
        let overlay = Overlay {
            selected: self.interaction.selected(),
            suppressed: self.clock.suppresses_selection(),
            handle_size: self.interaction.handle_size(),
        };
        self.frame = self
            .renderer
            .render(&mut self.scene, self.clock.current_time(), &overlay);
        &self.frame
    }

    /// Wait for images still decoding, up to the configured reply timeout.
    /// Returns `false` if some were still loading when time ran out.
    pub async fn wait_for_images(&self) -> bool {
        let wait = Duration::from_millis(self.config.export.reply_timeout_ms);
        wait_for_images(&self.scene, wait).await
    }

    // --- Scene ---

    /// Replace the scene and timeline settings with a document's.
    pub fn load_document(&mut self, document: &SceneDocument) {
        self.clock.stop();
        self.interaction.clear();
        self.scene = document.to_scene();
        self.clock.set_total_duration(document.total_duration);
        self.clock.set_looping(document.looping);
        request_scene_images(&self.scene);
        tracing::info!(objects = self.scene.len(), "Scene document loaded");
        self.events.emit(EngineEvent::SelectionChanged { selected: None });
        self.objects_changed();
        self.playback_changed();
    }

    /// Snapshot the scene and timeline settings.
    pub fn to_document(&self) -> SceneDocument {
        SceneDocument::from_scene(&self.scene, self.clock.total_duration(), self.clock.is_looping())
    }

    pub fn add_object(&mut self, object: SceneObject) -> ObjectId {
        let id = self.scene.add(object);
        tracing::debug!(id = %id, "Object added");
        request_scene_images(&self.scene);
        self.objects_changed();
        id
    }

    /// Add a variant with its default parameters at `(x, y)`.
    pub fn add_default(&mut self, kind: ObjectKind, x: f64, y: f64) -> ObjectId {
        self.add_object(SceneObject::with_defaults(kind, x, y))
    }

    /// Remove an object, clearing the selection if it was selected.
    pub fn remove_object(&mut self, id: ObjectId) -> bool {
        if self.scene.remove(id).is_none() {
            return false;
        }
        tracing::debug!(id = %id, "Object removed");
        if self.interaction.forget(id) {
            self.events.emit(EngineEvent::SelectionChanged { selected: None });
        }
        self.objects_changed();
        true
    }

    /// Copy an object (offset by the configured clone offset) and select
    /// the copy.
    pub fn duplicate_object(&mut self, id: ObjectId) -> Option<ObjectId> {
        let copy = self.scene.duplicate(id, self.config.interaction.clone_offset)?;
        tracing::debug!(source = %id, copy = %copy, "Object duplicated");
        self.objects_changed();
        self.select(Some(copy));
        Some(copy)
    }

    /// Swap with the next object (paint later, appear on top).
    pub fn move_up(&mut self, id: ObjectId) -> bool {
        let moved = self.scene.move_up(id);
        if moved {
            self.objects_changed();
        }
        moved
    }

    /// Swap with the previous object.
    pub fn move_down(&mut self, id: ObjectId) -> bool {
        let moved = self.scene.move_down(id);
        if moved {
            self.objects_changed();
        }
        moved
    }

    /// Set or clear (`None` or blank) an object's display name.
    pub fn rename_object(&mut self, id: ObjectId, name: Option<String>) -> bool {
        let Some(object) = self.scene.get_mut(id) else {
            return false;
        };
        object.set_name(name);
        self.objects_changed();
        true
    }

    pub fn object_properties(&self, id: ObjectId) -> Option<PropertyMap> {
        self.scene.get(id).map(SceneObject::properties)
    }

    /// Apply a partial property map to one object.
    pub fn update_properties(&mut self, id: ObjectId, partial: &PropertyMap) -> bool {
        let Some(object) = self.scene.get_mut(id) else {
            return false;
        };
        object.update_properties(partial);
        request_scene_images(&self.scene);
        self.objects_changed();
        true
    }

    pub fn object_summaries(&self) -> Vec<ObjectSummary> {
        self.scene
            .iter()
            .map(|o| ObjectSummary {
                id: o.id(),
                kind: o.kind(),
                name: o.display_name(),
                start_time: o.start_time(),
                duration: o.duration(),
            })
            .collect()
    }

    // --- Selection ---

    pub fn selected(&self) -> Option<ObjectId> {
        self.interaction.selected()
    }

    pub fn select(&mut self, id: Option<ObjectId>) {
        let id = id.filter(|id| self.scene.contains(*id));
        if self.interaction.select(id) {
            self.events.emit(EngineEvent::SelectionChanged { selected: id });
            self.render();
        }
    }

    pub(crate) fn clear_selection(&mut self) {
        if self.interaction.clear() {
            self.events.emit(EngineEvent::SelectionChanged { selected: None });
        }
    }

    // --- Playback ---

    pub fn current_time(&self) -> f64 {
        self.clock.current_time()
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.clock.state()
    }

    pub fn play(&mut self) {
        if self.clock.play(self.time_source.now_ms()) {
            self.playback_changed();
        }
    }

    pub fn pause(&mut self) {
        if self.clock.pause() {
            self.playback_changed();
        }
    }

    pub fn stop(&mut self) {
        if self.clock.stop() {
            self.playback_changed();
        }
        self.render();
    }

    pub fn toggle_play(&mut self) {
        if self.clock.is_playing() {
            self.pause();
        } else {
            self.play();
        }
    }

    /// Play once from the start with the selection cleared and hidden.
    pub fn preview(&mut self) {
        if self.clock.is_playing() {
            return;
        }
        self.clear_selection();
        if self.clock.preview(self.time_source.now_ms()) {
            self.playback_changed();
        }
    }

    /// Jump to `time` (clamped) and re-render immediately.
    pub fn seek(&mut self, time: f64) {
        let before = self.clock.state();
        let applied = self.clock.seek(time);
        if self.clock.state() != before {
            self.playback_changed();
        }
        self.events.emit(EngineEvent::TimeUpdate { time: applied });
        self.render();
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.clock.set_looping(looping);
    }

    pub fn set_total_duration(&mut self, total_duration: f64) {
        self.clock.set_total_duration(total_duration);
        self.events.emit(EngineEvent::TimeUpdate {
            time: self.clock.current_time(),
        });
    }

    /// One render-loop step. Returns whether playback is still running.
    pub fn tick(&mut self) -> bool {
        let outcome = self.clock.tick(self.time_source.now_ms());
        let Some(time) = outcome.time() else {
            return false;
        };
        self.events.emit(EngineEvent::TimeUpdate { time });
        if let TickOutcome::Finished { .. } = outcome {
            tracing::debug!(time, "Playback reached the end");
            self.playback_changed();
        }
        self.render();
        self.clock.is_playing()
    }

    // --- Pointer and keyboard ---

    fn locked(&self) -> bool {
        self.clock.suppresses_selection()
    }

    pub fn on_pointer_down(&mut self, point: Point) -> Vec<Action> {
        let t = self.clock.current_time();
        let locked = self.locked();
        let actions = self.interaction.on_pointer_down(&self.scene, point, t, locked);
        self.apply_actions(&actions);
        actions
    }

    pub fn on_pointer_move(&mut self, point: Point) -> Vec<Action> {
        let t = self.clock.current_time();
        let locked = self.locked();
        let actions = self
            .interaction
            .on_pointer_move(&mut self.scene, point, t, locked);
        self.apply_actions(&actions);
        actions
    }

    pub fn on_pointer_up(&mut self, _point: Point) -> Vec<Action> {
        let actions = self.interaction.on_pointer_up();
        self.apply_actions(&actions);
        actions
    }

    fn apply_actions(&mut self, actions: &[Action]) {
        let mut render = false;
        for action in actions {
            match *action {
                Action::SelectionChanged(selected) => {
                    self.events.emit(EngineEvent::SelectionChanged { selected });
                }
                Action::RenderNeeded => render = true,
                Action::ObjectMoved(_) | Action::ObjectResized(_) | Action::SetCursor(_) => {}
            }
        }
        if render {
            self.render();
        }
    }

    /// Handle a key press. Nothing happens while a text field has focus.
    pub fn on_key_down(&mut self, key: &Key, text_input_focused: bool) -> KeyResponse {
        if text_input_focused {
            return KeyResponse::default();
        }
        match key {
            Key::Delete | Key::Backspace => match self.interaction.selected() {
                Some(id) => {
                    self.remove_object(id);
                    KeyResponse::handled()
                }
                None => KeyResponse::default(),
            },
            Key::Escape => {
                self.clear_selection();
                self.render();
                KeyResponse::handled()
            }
            Key::Space => {
                self.toggle_play();
                KeyResponse {
                    handled: true,
                    prevent_default: true,
                }
            }
            Key::ArrowLeft | Key::ArrowRight => {
                let step = self.config.playback.seek_step_ms;
                let delta = if *key == Key::ArrowLeft { -step } else { step };
                self.pause();
                self.seek(self.clock.current_time() + delta);
                KeyResponse {
                    handled: true,
                    prevent_default: true,
                }
            }
            Key::Other(_) => KeyResponse::default(),
        }
    }

    // --- Notifications ---

    fn objects_changed(&mut self) {
        self.events.emit(EngineEvent::ObjectsChanged);
        self.render();
    }

    pub(crate) fn playback_changed(&mut self) {
        self.events.emit(EngineEvent::PlaybackChanged {
            state: self.clock.state(),
            time: self.clock.current_time(),
            previewing: self.clock.is_previewing(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scenecast_common::clock::ManualClock;
    use scenecast_common::config::CanvasConfig;
    use scenecast_common::error::SceneError;
    use scenecast_scene_model::{Rect, TextObject};
    use serde_json::json;

    fn small_config() -> EngineConfig {
        EngineConfig {
            canvas: CanvasConfig {
                width: 160,
                height: 90,
                ..CanvasConfig::default()
            },
            ..EngineConfig::default()
        }
    }

    fn engine() -> (Engine, ManualClock) {
        let clock = ManualClock::new(0.0);
        let engine = Engine::with_time_source(small_config(), Arc::new(clock.clone())).unwrap();
        (engine, clock)
    }

    fn drain(rx: &mut broadcast::Receiver<EngineEvent>) -> Vec<EngineEvent> {
        std::iter::from_fn(|| rx.try_recv().ok()).collect()
    }

    #[test]
    fn test_zero_canvas_is_fatal() {
        let mut config = small_config();
        config.canvas.height = 0;
        let err = Engine::new(config).unwrap_err();
        assert!(matches!(err, SceneError::Config { .. }));
    }

    #[test]
    fn test_remove_selected_clears_selection() {
        let (mut engine, _) = engine();
        let id = engine.add_default(ObjectKind::Code, 10.0, 10.0);
        engine.select(Some(id));
        let mut rx = engine.subscribe();
        assert!(engine.remove_object(id));
        assert_eq!(engine.selected(), None);
        let events = drain(&mut rx);
        assert!(events.contains(&EngineEvent::SelectionChanged { selected: None }));
        assert!(events.contains(&EngineEvent::ObjectsChanged));
        assert!(!engine.remove_object(id));
    }

    #[test]
    fn test_duplicate_selects_copy() {
        let (mut engine, _) = engine();
        let id = engine.add_default(ObjectKind::BarChart, 10.0, 10.0);
        let copy = engine.duplicate_object(id).unwrap();
        assert_ne!(copy, id);
        assert_eq!(engine.selected(), Some(copy));
        let a = engine.scene().get(id).unwrap().bounds();
        let b = engine.scene().get(copy).unwrap().bounds();
        assert_eq!(b.x - a.x, engine.config().interaction.clone_offset);
    }

    #[test]
    fn test_rename_and_summaries() {
        let (mut engine, _) = engine();
        let id = engine.add_object(SceneObject::new(
            TextObject::new("Hello"),
            Rect::new(0.0, 0.0, 10.0, 10.0),
        ));
        assert!(engine.rename_object(id, Some("Title".into())));
        let summaries = engine.object_summaries();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].name, "Title");
        assert_eq!(summaries[0].kind, ObjectKind::Text);
    }

    #[test]
    fn test_update_properties_coerces_and_ignores_unknown() {
        let (mut engine, _) = engine();
        let id = engine.add_default(ObjectKind::Counter, 0.0, 0.0);
        let partial = json!({"endValue": "250", "bogus": true})
            .as_object()
            .cloned()
            .unwrap();
        assert!(engine.update_properties(id, &partial));
        let props = engine.object_properties(id).unwrap();
        assert_eq!(props["endValue"], json!(250));
        assert!(!props.contains_key("bogus"));
    }

    #[test]
    fn test_malformed_color_leaves_property_unchanged() {
        let (mut engine, _) = engine();
        let id = engine.add_default(ObjectKind::Counter, 0.0, 0.0);
        let before = engine.object_properties(id).unwrap()["color"].clone();
        let partial = json!({"color": "a\u{e9}123"}).as_object().cloned().unwrap();
        assert!(engine.update_properties(id, &partial));
        assert_eq!(engine.object_properties(id).unwrap()["color"], before);
    }

    #[test]
    fn test_seek_from_stopped_announces_pause() {
        let (mut engine, _) = engine();
        engine.set_total_duration(1000.0);
        let mut rx = engine.subscribe();
        engine.seek(500.0);
        assert_eq!(engine.playback_state(), PlaybackState::Paused);
        let events = drain(&mut rx);
        assert_eq!(
            events,
            vec![
                EngineEvent::PlaybackChanged {
                    state: PlaybackState::Paused,
                    time: 500.0,
                    previewing: false,
                },
                EngineEvent::TimeUpdate { time: 500.0 },
            ]
        );

        // Staying paused does not repeat the state change.
        engine.seek(200.0);
        assert_eq!(drain(&mut rx), vec![EngineEvent::TimeUpdate { time: 200.0 }]);
    }

    #[test]
    fn test_tick_follows_time_source() {
        let (mut engine, clock) = engine();
        engine.set_total_duration(1000.0);
        engine.play();
        clock.advance(400.0);
        assert!(engine.tick());
        assert_eq!(engine.current_time(), 400.0);
        clock.advance(700.0);
        assert!(!engine.tick());
        assert_eq!(engine.current_time(), 1000.0);
        assert_eq!(engine.playback_state(), PlaybackState::Paused);
    }

    #[test]
    fn test_seek_twice_renders_same_frame() {
        let (mut engine, _) = engine();
        engine.add_default(ObjectKind::Progress, 10.0, 10.0);
        engine.seek(300.0);
        let first = engine.frame().clone();
        engine.seek(300.0);
        assert_eq!(&first, engine.frame());
    }

    #[test]
    fn test_preview_clears_selection_and_hides_box() {
        let (mut engine, _) = engine();
        let id = engine.add_default(ObjectKind::Code, 10.0, 10.0);
        engine.select(Some(id));
        engine.preview();
        assert_eq!(engine.selected(), None);
        assert!(engine.clock().is_previewing());
        assert!(engine.clock().is_playing());
    }

    #[test]
    fn test_keyboard_shortcuts() {
        let (mut engine, _) = engine();
        let id = engine.add_default(ObjectKind::Code, 10.0, 10.0);
        engine.select(Some(id));

        // Typing in a field does nothing.
        assert!(!engine.on_key_down(&Key::Delete, true).handled);
        assert!(engine.scene().contains(id));

        let space = engine.on_key_down(&Key::from_name(" "), false);
        assert!(space.prevent_default);
        assert!(engine.clock().is_playing());

        engine.on_key_down(&Key::ArrowRight, false);
        assert_eq!(engine.playback_state(), PlaybackState::Paused);
        assert_eq!(engine.current_time(), engine.config().playback.seek_step_ms);
        engine.on_key_down(&Key::ArrowLeft, false);
        engine.on_key_down(&Key::ArrowLeft, false);
        assert_eq!(engine.current_time(), 0.0);

        engine.on_key_down(&Key::Escape, false);
        assert_eq!(engine.selected(), None);
        assert!(!engine.on_key_down(&Key::Backspace, false).handled);

        engine.select(Some(id));
        assert!(engine.on_key_down(&Key::from_name("Backspace"), false).handled);
        assert!(engine.scene().is_empty());
    }

    #[test]
    fn test_pointer_drag_through_engine() {
        let (mut engine, _) = engine();
        let id = engine.add_default(ObjectKind::Code, 10.0, 10.0);
        let start = engine.scene().get(id).unwrap().bounds();
        let mut rx = engine.subscribe();
        engine.on_pointer_down(Point::new(start.x + 1.0, start.y + 1.0));
        engine.on_pointer_move(Point::new(start.x + 6.0, start.y + 4.0));
        engine.on_pointer_up(Point::new(start.x + 6.0, start.y + 4.0));
        let moved = engine.scene().get(id).unwrap().bounds();
        assert_eq!((moved.x, moved.y), (start.x + 5.0, start.y + 3.0));
        assert!(drain(&mut rx).contains(&EngineEvent::SelectionChanged { selected: Some(id) }));
    }

    #[test]
    fn test_document_round_trip() {
        let (mut engine, _) = engine();
        engine.add_default(ObjectKind::Text, 5.0, 5.0);
        engine.add_default(ObjectKind::Counter, 20.0, 20.0);
        engine.set_looping(true);
        let doc = engine.to_document();
        let (mut other, _) = self::engine();
        other.load_document(&doc);
        assert_eq!(other.scene().len(), 2);
        assert!(other.clock().is_looping());
        assert_eq!(other.scene().ids(), engine.scene().ids());
    }
}

//! Notifications for hosts observing the engine.

use scenecast_render_engine::ExportStage;
use scenecast_scene_model::ObjectId;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::playback::PlaybackState;

/// Default number of events a slow subscriber may lag behind.
pub const EVENT_CAPACITY: usize = 256;

/// Something observable changed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// An object was added, removed, reordered, renamed, or edited.
    ObjectsChanged,
    SelectionChanged {
        selected: Option<ObjectId>,
    },
    PlaybackChanged {
        state: PlaybackState,
        time: f64,
        previewing: bool,
    },
    TimeUpdate {
        time: f64,
    },
    ExportProgress {
        progress: f64,
        frame: u64,
        total_frames: u64,
        stage: ExportStage,
    },
    ExportFinished {
        bytes: usize,
    },
    ExportFailed {
        message: String,
    },
}

/// Fan-out of [`EngineEvent`]s. Sending with no subscribers is fine.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: EngineEvent) {
        tracing::trace!(event = ?event, "Engine event");
        let _ = self.tx.send(event);
    }

    /// A sender usable from export progress callbacks.
    pub fn sender(&self) -> broadcast::Sender<EngineEvent> {
        self.tx.clone()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(EVENT_CAPACITY)
    }
}

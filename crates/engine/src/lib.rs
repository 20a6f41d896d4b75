//! Scenecast Engine
//!
//! The stateful side of Scenecast. One [`Engine`] owns a scene, the
//! playback clock, the pointer selection and the frame renderer, and
//! drives both export strategies.
//!
//! - **Playback:** stopped, playing, paused; plus preview and export flags
//! - **Interaction:** select, drag and corner-resize through pointer events
//! - **Events:** a broadcast stream of [`EngineEvent`]s for hosts
//! - **Export:** live recording and offline encoding over the same sweep

pub mod driver;
pub mod engine;
pub mod events;
pub mod export;
pub mod interaction;
pub mod playback;

pub use driver::{run_playback_loop, DEFAULT_FRAME_INTERVAL};
pub use engine::{Engine, Key, KeyResponse, ObjectSummary};
pub use events::{EngineEvent, EventBus, EVENT_CAPACITY};
pub use export::{ExportOutput, OfflineTarget};
pub use interaction::{Action, CursorHint, InputState, InteractionController};
pub use playback::{PlaybackClock, PlaybackState, TickOutcome};

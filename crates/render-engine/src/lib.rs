//! Scenecast Render Engine
//!
//! Turns a [`Scene`](scenecast_scene_model::Scene) into pixels and pixels
//! into video.
//!
//! # Pipeline Architecture
//!
//! ```text
//! Scene ── FrameRenderer ── RasterSurface ── Bitmap
//!                                              │
//!            frame sweep (t = n * 1000 / fps)  │
//!                                              ├── StreamRecorder (gif, webm)
//!                                              │
//!                                              └── EncoderSession ══ worker ── ContainerTarget (raw, mp4, mov)
//! ```
//!
//! The sweep never reads a wall clock, so every export of the same scene is
//! identical.

pub mod assets;
pub mod encoder;
pub mod ffmpeg;
pub mod raster;
pub mod recorder;
pub mod render;
pub mod sweep;

pub use assets::{request_scene_images, wait_for_images};
pub use encoder::{
    encode_scene, ContainerTarget, EncoderConfig, EncoderSession, FfmpegContainerTarget,
    RawContainerTarget, SessionOptions,
};
pub use raster::RasterSurface;
pub use recorder::{
    record_live, select_format, LiveOptions, RecordingFormat, StreamRecorder,
};
pub use render::{FrameRenderer, Overlay};
pub use sweep::*;

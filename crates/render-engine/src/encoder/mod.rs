//! Offline frame encoder: a worker that owns a container target, reached
//! through an asynchronous message protocol with caller-side backpressure.

pub mod protocol;
pub mod session;
pub mod target;
pub mod worker;

pub use protocol::*;
pub use session::*;
pub use target::*;
pub use worker::*;

use std::time::Instant;

use scenecast_common::clock::ms_to_us;
use scenecast_common::error::SceneResult;
use scenecast_scene_model::Scene;

use crate::render::{FrameRenderer, Overlay};
use crate::sweep::{ExportProgress, ExportStage, FrameSweep, ProgressCallback};

/// Render every frame of `sweep` through an encoder session and return the
/// finished container.
///
/// The session must be freshly spawned; this sends `CONFIG` itself.
pub async fn encode_scene(
    scene: &mut Scene,
    renderer: &FrameRenderer,
    session: &mut EncoderSession,
    config: EncoderConfig,
    sweep: FrameSweep,
    progress: Option<&ProgressCallback>,
) -> SceneResult<Vec<u8>> {
    let started = Instant::now();
    session.configure(config).await?;
    tracing::info!(frames = sweep.total_frames, fps = sweep.fps, "Offline encode started");

    let overlay = Overlay {
        suppressed: true,
        ..Overlay::default()
    };
    let duration_us = sweep.frame_duration_us();
    for (frame, t) in sweep.iter() {
        let bitmap = renderer.render(scene, t, &overlay);
        session
            .encode_frame(bitmap, ms_to_us(t), Some(duration_us))
            .await?;
        tracing::debug!(frame, time_ms = t, pending = session.pending(), "Frame submitted");
        if let Some(cb) = progress {
            cb(ExportProgress::rendering(
                frame + 1,
                sweep.total_frames,
                started.elapsed().as_secs_f64(),
            ));
        }
    }

    if let Some(cb) = progress {
        cb(ExportProgress::stage(ExportStage::Finalizing, sweep.total_frames));
    }
    session.finalize().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use scenecast_scene_model::{Color, Rect, SceneObject, TextObject};

    #[tokio::test]
    async fn test_encode_scene_timestamps_in_microseconds() {
        let mut scene = Scene::new();
        scene.add(
            SceneObject::new(TextObject::new("Go"), Rect::new(2.0, 2.0, 10.0, 10.0))
                .with_timing(0.0, 100.0),
        );
        let renderer = FrameRenderer::new(16, 8, Color::BLACK);
        let mut session =
            EncoderSession::spawn(Box::new(RawContainerTarget::new()), SessionOptions::default()).unwrap();
        let bytes = encode_scene(
            &mut scene,
            &renderer,
            &mut session,
            EncoderConfig::new(16, 8, 30.0),
            FrameSweep::new(100.0, 30.0),
            None,
        )
        .await
        .unwrap();
        let info = parse_raw_container(&bytes).unwrap();
        assert_eq!(
            info.frames,
            vec![(0, 33_333), (33_333, 33_333), (66_667, 33_333)]
        );
    }
}

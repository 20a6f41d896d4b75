use std::io::Cursor;
use std::sync::Arc;

use image::codecs::gif::GifDecoder;
use image::AnimationDecoder;
use scenecast_common::clock::ManualClock;
use scenecast_common::config::{CanvasConfig, EngineConfig};
use scenecast_common::error::{SceneError, SceneResult};
use scenecast_engine::{Engine, EngineEvent, OfflineTarget, PlaybackState};
use scenecast_render_engine::encoder::{
    parse_raw_container, ContainerTarget, EncoderConfig, EncoderSession, SessionOptions,
};
use scenecast_render_engine::recorder::GifRecorder;
use scenecast_render_engine::{CancelToken, ExportStage, FrameSweep, RecordingFormat, StreamRecorder};
use scenecast_scene_model::{Bitmap, ObjectKind};
use tokio::sync::broadcast;

fn engine(duration_ms: f64) -> Engine {
    let mut config = EngineConfig {
        canvas: CanvasConfig {
            width: 64,
            height: 36,
            ..CanvasConfig::default()
        },
        ..EngineConfig::default()
    };
    config.playback.total_duration_ms = duration_ms;
    Engine::with_time_source(config, Arc::new(ManualClock::new(0.0))).expect("engine")
}

fn drain(rx: &mut broadcast::Receiver<EngineEvent>) -> Vec<EngineEvent> {
    std::iter::from_fn(|| rx.try_recv().ok()).collect()
}

fn stages(events: &[EngineEvent]) -> Vec<ExportStage> {
    events
        .iter()
        .filter_map(|e| match e {
            EngineEvent::ExportProgress { stage, .. } => Some(*stage),
            _ => None,
        })
        .collect()
}

/// Counts frames and can cancel partway through.
struct CountingRecorder {
    frames: u64,
    cancel_after: Option<(u64, CancelToken)>,
    aborted: bool,
}

impl CountingRecorder {
    fn new() -> Self {
        Self {
            frames: 0,
            cancel_after: None,
            aborted: false,
        }
    }
}

impl StreamRecorder for CountingRecorder {
    fn name(&self) -> &str {
        "counting"
    }
    fn is_available(&self) -> bool {
        true
    }
    fn mime_type(&self) -> &'static str {
        "application/octet-stream"
    }
    fn start(&mut self, _: u32, _: u32, _: f64) -> SceneResult<()> {
        Ok(())
    }
    fn push_frame(&mut self, _: &Bitmap) -> SceneResult<()> {
        self.frames += 1;
        if let Some((after, token)) = &self.cancel_after {
            if self.frames == *after {
                token.cancel();
            }
        }
        Ok(())
    }
    fn finish(&mut self) -> SceneResult<Vec<u8>> {
        Ok(self.frames.to_le_bytes().to_vec())
    }
    fn abort(&mut self) {
        self.aborted = true;
    }
}

/// Refuses to open.
struct BrokenTarget;

impl ContainerTarget for BrokenTarget {
    fn name(&self) -> &str {
        "broken"
    }
    fn open(&mut self, _: &EncoderConfig) -> SceneResult<()> {
        Err(SceneError::encoder("no codec"))
    }
    fn write_frame(&mut self, _: &Bitmap, _: u64, _: u64) -> SceneResult<()> {
        Ok(())
    }
    fn close_source(&mut self) -> SceneResult<()> {
        Ok(())
    }
    fn poll_buffer(&mut self) -> SceneResult<Option<Vec<u8>>> {
        Ok(None)
    }
}

#[tokio::test]
async fn live_gif_export_has_one_frame_per_sweep_step() {
    let mut engine = engine(250.0);
    let id = engine.add_default(ObjectKind::Counter, 4.0, 4.0);
    engine.select(Some(id));
    engine.seek(120.0);
    let mut rx = engine.subscribe();

    let output = engine
        .export_live(&[RecordingFormat::Gif], Some(20.0), &CancelToken::new())
        .await
        .expect("gif export");

    assert_eq!(output.extension, "gif");
    assert_eq!(output.mime_type, "image/gif");
    assert_eq!(output.frames, 5);
    let decoder = GifDecoder::new(Cursor::new(output.bytes.clone())).expect("decodable gif");
    let frames = decoder.into_frames().collect_frames().expect("frames");
    assert_eq!(frames.len(), 5);

    assert_eq!(engine.current_time(), 0.0);
    assert_eq!(engine.selected(), None);
    assert!(!engine.clock().is_exporting());

    let events = drain(&mut rx);
    let stages = stages(&events);
    assert_eq!(stages.first(), Some(&ExportStage::Preparing));
    assert_eq!(stages.last(), Some(&ExportStage::Complete));
    assert!(events.contains(&EngineEvent::SelectionChanged { selected: None }));
    assert!(events.contains(&EngineEvent::ExportFinished {
        bytes: output.bytes.len()
    }));
}

#[tokio::test]
async fn live_export_pauses_running_playback() {
    let mut engine = engine(200.0);
    engine.play();
    let mut recorder = CountingRecorder::new();
    let output = engine
        .export_live_with(&mut recorder, "bin", Some(10.0), &CancelToken::new())
        .await
        .expect("export");
    assert_eq!(recorder.frames, 2);
    assert_eq!(output.bytes, 2u64.to_le_bytes().to_vec());
    assert_eq!(engine.playback_state(), PlaybackState::Paused);
    assert_eq!(engine.current_time(), 0.0);
}

#[tokio::test]
async fn cancelled_live_export_restores_state() {
    let mut engine = engine(1000.0);
    let token = CancelToken::new();
    let mut recorder = CountingRecorder::new();
    recorder.cancel_after = Some((3, token.clone()));
    let mut rx = engine.subscribe();

    let err = engine
        .export_live_with(&mut recorder, "bin", Some(30.0), &token)
        .await
        .unwrap_err();

    assert!(matches!(err, SceneError::Cancelled { frame: 2 }));
    assert!(recorder.aborted);
    assert_eq!(recorder.frames, 3);
    assert!(!engine.clock().is_exporting());
    assert_eq!(engine.current_time(), 0.0);
    assert!(drain(&mut rx)
        .iter()
        .any(|e| matches!(e, EngineEvent::ExportFailed { .. })));
}

#[tokio::test]
async fn live_export_rejects_bad_frame_rate_before_touching_state() {
    let mut engine = engine(500.0);
    engine.seek(200.0);
    let mut recorder = CountingRecorder::new();
    let err = engine
        .export_live_with(&mut recorder, "bin", Some(0.0), &CancelToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, SceneError::InvalidArgument { .. }));
    assert_eq!(recorder.frames, 0);
    assert_eq!(engine.current_time(), 200.0);
}

#[tokio::test]
async fn offline_raw_export_stamps_microsecond_timestamps() {
    let mut engine = engine(100.0);
    engine.add_default(ObjectKind::Progress, 2.0, 2.0);
    let mut rx = engine.subscribe();

    let output = engine
        .export_offline(OfflineTarget::Raw, Some(30.0))
        .await
        .expect("raw export");

    assert_eq!(output.extension, "scnraw");
    assert_eq!(output.frames, 3);
    let info = parse_raw_container(&output.bytes).expect("raw container");
    assert_eq!((info.width, info.height), (64, 36));
    assert_eq!(info.frames, vec![(0, 33_333), (33_333, 33_333), (66_667, 33_333)]);

    let stages = stages(&drain(&mut rx));
    assert!(stages.contains(&ExportStage::Rendering));
    assert!(stages.contains(&ExportStage::Finalizing));
    assert_eq!(stages.last(), Some(&ExportStage::Complete));
    assert!(!engine.clock().is_exporting());
}

#[tokio::test]
async fn offline_export_failure_is_reported_and_state_restored() {
    let mut engine = engine(100.0);
    engine.seek(50.0);
    let mut rx = engine.subscribe();
    let session = EncoderSession::spawn(Box::new(BrokenTarget), SessionOptions::default()).expect("spawn");
    let sweep = FrameSweep::new(100.0, 30.0);
    let config = EncoderConfig::new(64, 36, 30.0);

    let result = engine
        .export_offline_with(session, config, sweep, "video/mp4", "mp4")
        .await;

    assert!(result.is_err());
    assert_eq!(engine.current_time(), 0.0);
    assert!(!engine.clock().is_exporting());
    let events = drain(&mut rx);
    assert!(events
        .iter()
        .any(|e| matches!(e, EngineEvent::ExportFailed { message } if message.contains("no codec"))));
    assert!(!events
        .iter()
        .any(|e| matches!(e, EngineEvent::ExportFinished { .. })));
}

#[tokio::test]
async fn repeated_exports_are_identical() {
    let mut engine = engine(300.0);
    engine.add_default(ObjectKind::Text, 2.0, 2.0);
    engine.add_default(ObjectKind::BarChart, 10.0, 10.0);
    let first = engine.export_offline(OfflineTarget::Raw, Some(10.0)).await.expect("first");
    engine.seek(170.0);
    let second = engine.export_offline(OfflineTarget::Raw, Some(10.0)).await.expect("second");
    assert_eq!(first.bytes, second.bytes);
}

#[test]
fn gif_recorder_is_always_available() {
    assert!(GifRecorder::new().is_available());
}

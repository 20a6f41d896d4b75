//! Live-stream recorders and the deterministic frame sweep that feeds them.

use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, Frame, RgbaImage};
use scenecast_common::error::{SceneError, SceneResult};
use scenecast_scene_model::{Bitmap, Scene};

use crate::ffmpeg::{self, FfmpegPipe};
use crate::render::{FrameRenderer, Overlay};
use crate::sweep::{CancelToken, ExportProgress, FrameSweep, ProgressCallback};

/// Trait for live-stream recorders (GIF, ffmpeg WebM, etc.).
pub trait StreamRecorder: Send {
    /// Recorder name.
    fn name(&self) -> &str;

    /// Check if this recorder can run on the system.
    fn is_available(&self) -> bool;

    /// MIME type of the finished stream.
    fn mime_type(&self) -> &'static str;

    /// Prepare for frames of `width x height` at `fps`.
    fn start(&mut self, width: u32, height: u32, fps: f64) -> SceneResult<()>;

    /// Append one frame.
    fn push_frame(&mut self, frame: &Bitmap) -> SceneResult<()>;

    /// Stop recording and hand back the encoded bytes.
    fn finish(&mut self) -> SceneResult<Vec<u8>>;

    /// Discard a partial recording.
    fn abort(&mut self) {}
}

/// Formats a live recording can be produced in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingFormat {
    Gif,
    Webm,
}

impl RecordingFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Gif => "gif",
            Self::Webm => "webm",
        }
    }

    pub fn recorder(self) -> Box<dyn StreamRecorder> {
        match self {
            Self::Gif => Box::new(GifRecorder::new()),
            Self::Webm => Box::new(FfmpegRecorder::new()),
        }
    }
}

/// First format among `preferred` whose recorder can run here.
pub fn select_format(preferred: &[RecordingFormat]) -> SceneResult<RecordingFormat> {
    for &format in preferred {
        if format.recorder().is_available() {
            return Ok(format);
        }
        tracing::debug!(format = ?format, "Recording format not available");
    }
    Err(SceneError::unsupported(format!(
        "No supported recording format available (tried {preferred:?})"
    )))
}

/// `Write` sink whose bytes can be taken out after the writer is dropped.
#[derive(Debug, Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    fn take(&self) -> Vec<u8> {
        std::mem::take(&mut *self.0.lock().unwrap_or_else(|e| e.into_inner()))
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Animated GIF built in memory.
pub struct GifRecorder {
    speed: i32,
    buffer: SharedBuffer,
    encoder: Option<GifEncoder<SharedBuffer>>,
    delay: Option<Delay>,
    size: (u32, u32),
}

impl GifRecorder {
    pub fn new() -> Self {
        Self::with_speed(10)
    }

    /// `speed` trades quality for encode time (1 slowest, 30 fastest).
    pub fn with_speed(speed: i32) -> Self {
        Self {
            speed: speed.clamp(1, 30),
            buffer: SharedBuffer::default(),
            encoder: None,
            delay: None,
            size: (0, 0),
        }
    }
}

impl Default for GifRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamRecorder for GifRecorder {
    fn name(&self) -> &str {
        "gif"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn mime_type(&self) -> &'static str {
        "image/gif"
    }

    fn start(&mut self, width: u32, height: u32, fps: f64) -> SceneResult<()> {
        if !(fps > 0.0) {
            return Err(SceneError::invalid_argument(format!("invalid frame rate {fps}")));
        }
        self.buffer = SharedBuffer::default();
        let mut encoder = GifEncoder::new_with_speed(self.buffer.clone(), self.speed);
        encoder
            .set_repeat(Repeat::Infinite)
            .map_err(|e| SceneError::encoder(format!("GIF setup failed: {e}")))?;
        // GIF delays are in hundredths of a second; the encoder rounds.
        self.delay = Some(Delay::from_numer_denom_ms(
            (1_000_000.0 / fps).round() as u32,
            1000,
        ));
        self.encoder = Some(encoder);
        self.size = (width, height);
        Ok(())
    }

    fn push_frame(&mut self, frame: &Bitmap) -> SceneResult<()> {
        let (Some(encoder), Some(delay)) = (self.encoder.as_mut(), self.delay) else {
            return Err(SceneError::encoder("GIF recorder not started"));
        };
        if (frame.width(), frame.height()) != self.size {
            return Err(SceneError::encoder(format!(
                "frame is {}x{}, recorder expects {}x{}",
                frame.width(),
                frame.height(),
                self.size.0,
                self.size.1
            )));
        }
        let image = RgbaImage::from_raw(frame.width(), frame.height(), frame.as_bytes().to_vec())
            .ok_or_else(|| SceneError::encoder("frame buffer has inconsistent size"))?;
        encoder
            .encode_frame(Frame::from_parts(image, 0, 0, delay))
            .map_err(|e| SceneError::encoder(format!("GIF frame encode failed: {e}")))
    }

    fn finish(&mut self) -> SceneResult<Vec<u8>> {
        let encoder = self
            .encoder
            .take()
            .ok_or_else(|| SceneError::encoder("GIF recorder not started"))?;
        // Dropping the encoder writes the trailer.
        drop(encoder);
        Ok(self.buffer.take())
    }

    fn abort(&mut self) {
        self.encoder = None;
        self.buffer.take();
    }
}

/// WebM (VP9) through an `ffmpeg` child process.
pub struct FfmpegRecorder {
    bitrate_kbps: u32,
    pipe: Option<FfmpegPipe>,
    output: Option<PathBuf>,
}

impl FfmpegRecorder {
    pub fn new() -> Self {
        Self::with_bitrate(5000)
    }

    pub fn with_bitrate(bitrate_kbps: u32) -> Self {
        Self {
            bitrate_kbps,
            pipe: None,
            output: None,
        }
    }

    fn codec_args(&self) -> Vec<String> {
        vec![
            "-c:v".to_string(),
            "libvpx-vp9".to_string(),
            "-b:v".to_string(),
            format!("{}k", self.bitrate_kbps.max(500)),
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
            "-an".to_string(),
        ]
    }

    fn remove_output(&mut self) {
        if let Some(path) = self.output.take() {
            if let Err(err) = std::fs::remove_file(&path) {
                if err.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(error = %err, path = %path.display(), "Failed to remove partial recording");
                }
            }
        }
    }
}

impl Default for FfmpegRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamRecorder for FfmpegRecorder {
    fn name(&self) -> &str {
        "ffmpeg-webm"
    }

    fn is_available(&self) -> bool {
        ffmpeg::command_exists("ffmpeg")
    }

    fn mime_type(&self) -> &'static str {
        "video/webm"
    }

    fn start(&mut self, width: u32, height: u32, fps: f64) -> SceneResult<()> {
        let output = ffmpeg::temp_output_path(RecordingFormat::Webm.extension());
        let mut args = ffmpeg::rawvideo_input_args(width, height, fps);
        args.extend(self.codec_args());
        args.push(output.to_string_lossy().into_owned());
        self.pipe = Some(FfmpegPipe::spawn(&args, width, height)?);
        self.output = Some(output);
        Ok(())
    }

    fn push_frame(&mut self, frame: &Bitmap) -> SceneResult<()> {
        self.pipe
            .as_mut()
            .ok_or_else(|| SceneError::encoder("ffmpeg recorder not started"))?
            .write_frame(frame)
    }

    fn finish(&mut self) -> SceneResult<Vec<u8>> {
        let mut pipe = self
            .pipe
            .take()
            .ok_or_else(|| SceneError::encoder("ffmpeg recorder not started"))?;
        pipe.finish()?;
        let path = self
            .output
            .take()
            .ok_or_else(|| SceneError::encoder("ffmpeg recorder has no output path"))?;
        ffmpeg::take_output(&path)?
            .ok_or_else(|| SceneError::encoder("ffmpeg produced an empty recording"))
    }

    fn abort(&mut self) {
        // Dropping the pipe kills the child.
        self.pipe = None;
        self.remove_output();
    }
}

/// Pacing for the live sweep.
#[derive(Debug, Clone, Copy, Default)]
pub struct LiveOptions {
    /// Pause after each frame; zero just yields to the scheduler.
    pub frame_yield: Duration,
}

/// Render every frame of `sweep` into `recorder` and return the stream.
///
/// Scene time comes only from the frame index. Cancellation is checked after
/// each frame; a cancelled or failed run aborts the recorder.
pub async fn record_live(
    scene: &mut Scene,
    renderer: &FrameRenderer,
    recorder: &mut dyn StreamRecorder,
    sweep: FrameSweep,
    options: LiveOptions,
    cancel: &CancelToken,
    progress: Option<&ProgressCallback>,
) -> SceneResult<Vec<u8>> {
    let result = sweep_frames(scene, renderer, recorder, sweep, options, cancel, progress).await;
    match result {
        Ok(()) => recorder.finish(),
        Err(err) => {
            recorder.abort();
            Err(err)
        }
    }
}

async fn sweep_frames(
    scene: &mut Scene,
    renderer: &FrameRenderer,
    recorder: &mut dyn StreamRecorder,
    sweep: FrameSweep,
    options: LiveOptions,
    cancel: &CancelToken,
    progress: Option<&ProgressCallback>,
) -> SceneResult<()> {
    let started = Instant::now();
    recorder.start(renderer.width(), renderer.height(), sweep.fps)?;
    tracing::info!(
        recorder = recorder.name(),
        frames = sweep.total_frames,
        fps = sweep.fps,
        "Live recording started"
    );

    let overlay = Overlay {
        suppressed: true,
        ..Overlay::default()
    };
    for (frame, t) in sweep.iter() {
        let bitmap = renderer.render(scene, t, &overlay);
        recorder.push_frame(&bitmap)?;
        tracing::debug!(frame, time_ms = t, "Frame recorded");

        if options.frame_yield.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(options.frame_yield).await;
        }
        if cancel.is_cancelled() {
            tracing::info!(frame, "Live recording cancelled");
            return Err(SceneError::Cancelled { frame });
        }
        if let Some(cb) = progress {
            cb(ExportProgress::rendering(
                frame + 1,
                sweep.total_frames,
                started.elapsed().as_secs_f64(),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use scenecast_scene_model::{Color, CounterObject, Rect, SceneObject};

    /// Keeps frames in memory.
    #[derive(Default)]
    struct CollectingRecorder {
        frames: Vec<Bitmap>,
        started: bool,
        aborted: bool,
    }

    impl StreamRecorder for CollectingRecorder {
        fn name(&self) -> &str {
            "collect"
        }
        fn is_available(&self) -> bool {
            true
        }
        fn mime_type(&self) -> &'static str {
            "application/octet-stream"
        }
        fn start(&mut self, _: u32, _: u32, _: f64) -> SceneResult<()> {
            self.started = true;
            Ok(())
        }
        fn push_frame(&mut self, frame: &Bitmap) -> SceneResult<()> {
            self.frames.push(frame.clone());
            Ok(())
        }
        fn finish(&mut self) -> SceneResult<Vec<u8>> {
            Ok(self.frames.iter().flat_map(|f| f.as_bytes().to_vec()).collect())
        }
        fn abort(&mut self) {
            self.aborted = true;
        }
    }

    fn counter_scene() -> Scene {
        let mut scene = Scene::new();
        scene.add(
            SceneObject::new(CounterObject::new(0.0, 100.0), Rect::new(4.0, 4.0, 40.0, 20.0))
                .with_timing(0.0, 100.0),
        );
        scene
    }

    #[tokio::test]
    async fn test_sweep_is_repeatable() {
        let renderer = FrameRenderer::new(64, 32, Color::BLACK);
        let sweep = FrameSweep::new(200.0, 20.0);

        let mut first = CollectingRecorder::default();
        let a = record_live(
            &mut counter_scene(),
            &renderer,
            &mut first,
            sweep,
            LiveOptions::default(),
            &CancelToken::new(),
            None,
        )
        .await
        .unwrap();

        let mut second = CollectingRecorder::default();
        let b = record_live(
            &mut counter_scene(),
            &renderer,
            &mut second,
            sweep,
            LiveOptions {
                frame_yield: Duration::from_millis(2),
            },
            &CancelToken::new(),
            None,
        )
        .await
        .unwrap();

        assert_eq!(first.frames.len(), 4);
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_progress_reaches_one() {
        let renderer = FrameRenderer::new(32, 16, Color::BLACK);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let cb: ProgressCallback = Box::new(move |p| sink.lock().unwrap().push(p.progress));
        let mut recorder = CollectingRecorder::default();
        record_live(
            &mut counter_scene(),
            &renderer,
            &mut recorder,
            FrameSweep::new(100.0, 30.0),
            LiveOptions::default(),
            &CancelToken::new(),
            Some(&cb),
        )
        .await
        .unwrap();
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen.last().copied(), Some(1.0));
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn test_cancel_aborts_between_frames() {
        let renderer = FrameRenderer::new(32, 16, Color::BLACK);
        let cancel = CancelToken::new();
        cancel.cancel();
        let mut recorder = CollectingRecorder::default();
        let err = record_live(
            &mut counter_scene(),
            &renderer,
            &mut recorder,
            FrameSweep::new(1000.0, 30.0),
            LiveOptions::default(),
            &cancel,
            None,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, SceneError::Cancelled { frame: 0 }));
        assert_eq!(recorder.frames.len(), 1);
        assert!(recorder.aborted);
    }

    #[tokio::test]
    async fn test_gif_recorder_produces_gif() {
        let renderer = FrameRenderer::new(24, 12, Color::rgb(0.2, 0.4, 0.6));
        let mut recorder = GifRecorder::with_speed(30);
        let bytes = record_live(
            &mut counter_scene(),
            &renderer,
            &mut recorder,
            FrameSweep::new(100.0, 20.0),
            LiveOptions::default(),
            &CancelToken::new(),
            None,
        )
        .await
        .unwrap();
        assert!(bytes.starts_with(b"GIF89a"));
        assert_eq!(bytes.last(), Some(&0x3b));
    }

    #[test]
    fn test_gif_rejects_wrong_frame_size() {
        let mut recorder = GifRecorder::new();
        recorder.start(10, 10, 30.0).unwrap();
        let err = recorder.push_frame(&Bitmap::new(5, 5)).unwrap_err();
        assert!(matches!(err, SceneError::EncoderSession { .. }));
    }

    #[test]
    fn test_push_before_start_fails() {
        let mut recorder = GifRecorder::new();
        assert!(recorder.push_frame(&Bitmap::new(1, 1)).is_err());
        assert!(recorder.finish().is_err());
    }

    #[test]
    fn test_select_format_prefers_listed_order() {
        let format = select_format(&[RecordingFormat::Gif, RecordingFormat::Webm]).unwrap();
        assert_eq!(format, RecordingFormat::Gif);
        assert_eq!(format.recorder().name(), "gif");
        assert!(matches!(
            select_format(&[]),
            Err(SceneError::Unsupported { .. })
        ));
    }
}

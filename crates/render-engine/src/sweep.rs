//! Deterministic frame sweeps.
//!
//! An export never consults a wall clock: frame `n` is always rendered at
//! `n * 1000 / fps` milliseconds, so the same scene exports identically on
//! any hardware.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Progress callback for export rendering.
pub type ProgressCallback = Box<dyn Fn(ExportProgress) + Send + Sync>;

/// Export progress report.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportProgress {
    /// Current progress [0.0, 1.0].
    pub progress: f64,

    /// Frames rendered so far.
    pub frames_rendered: u64,

    /// Total frames to render.
    pub total_frames: u64,

    /// Estimated time remaining in seconds.
    pub eta_secs: f64,

    /// Current stage.
    pub stage: ExportStage,
}

impl ExportProgress {
    pub fn stage(stage: ExportStage, total_frames: u64) -> Self {
        let done = matches!(stage, ExportStage::Complete);
        Self {
            progress: if done { 1.0 } else { 0.0 },
            frames_rendered: if done { total_frames } else { 0 },
            total_frames,
            eta_secs: 0.0,
            stage,
        }
    }

    /// Report after `frames_rendered` of `total_frames`, estimating the
    /// remaining time from `elapsed_secs`.
    pub fn rendering(frames_rendered: u64, total_frames: u64, elapsed_secs: f64) -> Self {
        let progress = if total_frames == 0 {
            1.0
        } else {
            (frames_rendered as f64 / total_frames as f64).clamp(0.0, 1.0)
        };
        let eta_secs = if progress > 0.0 {
            (elapsed_secs / progress) - elapsed_secs
        } else {
            0.0
        }
        .max(0.0);
        Self {
            progress,
            frames_rendered,
            total_frames,
            eta_secs,
            stage: ExportStage::Rendering,
        }
    }
}

/// Stages of the export process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportStage {
    Preparing,
    Rendering,
    Encoding,
    Finalizing,
    Complete,
    Failed,
}

/// `ceil(duration_secs * fps)`; zero for an empty or invalid timeline.
pub fn total_frames(duration_ms: f64, fps: f64) -> u64 {
    if !(duration_ms > 0.0) || !(fps > 0.0) {
        return 0;
    }
    // Nudge down so that 2000 ms at 30 fps is 60 frames, not 61 from
    // floating-point noise.
    ((duration_ms / 1000.0) * fps - 1e-9).ceil().max(0.0) as u64
}

/// Scene time of frame `frame`.
pub fn frame_time_ms(frame: u64, fps: f64) -> f64 {
    frame as f64 * (1000.0 / fps)
}

/// Frame indices and their scene times.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameSweep {
    pub fps: f64,
    pub total_frames: u64,
}

impl FrameSweep {
    pub fn new(duration_ms: f64, fps: f64) -> Self {
        Self {
            fps,
            total_frames: total_frames(duration_ms, fps),
        }
    }

    /// Microseconds each frame is shown for.
    pub fn frame_duration_us(&self) -> u64 {
        scenecast_common::clock::ms_to_us(1000.0 / self.fps)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u64, f64)> {
        let fps = self.fps;
        (0..self.total_frames).map(move |frame| (frame, frame_time_ms(frame, fps)))
    }
}

/// Cooperative cancellation checked between frames.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

//! Messages exchanged with the encoder worker.
//!
//! The worker is reached only through these messages. Replies to one
//! session arrive in request order.

use std::time::Duration;

use scenecast_common::config::ContainerFormat;
use scenecast_common::error::SceneError;
use scenecast_scene_model::Bitmap;

/// Output settings sent with `Config`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EncoderConfig {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bitrate_kbps: Option<u32>,
    #[serde(default)]
    pub format: ContainerFormat,
}

impl EncoderConfig {
    pub fn new(width: u32, height: u32, fps: f64) -> Self {
        Self {
            width,
            height,
            fps,
            bitrate_kbps: None,
            format: ContainerFormat::default(),
        }
    }

    pub fn with_bitrate(mut self, kbps: u32) -> Self {
        self.bitrate_kbps = Some(kbps);
        self
    }

    pub fn with_format(mut self, format: ContainerFormat) -> Self {
        self.format = format;
        self
    }
}

/// Caller to worker.
#[derive(Debug)]
pub enum WorkerRequest {
    Config(EncoderConfig),
    EncodeFrame {
        bitmap: Bitmap,
        /// Presentation time in microseconds.
        timestamp_us: u64,
        duration_us: Option<u64>,
    },
    Finalize,
}

impl WorkerRequest {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG",
            Self::EncodeFrame { .. } => "ENCODE_FRAME",
            Self::Finalize => "FINALIZE",
        }
    }
}

/// Worker to caller.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerReply {
    /// Container and video track are initialized.
    Ready,
    /// Sent after a frame is queued and again after it is consumed.
    Progress {
        queue_size: usize,
        /// Frames fully consumed so far in this session.
        encoded: u64,
    },
    Complete {
        buffer: Vec<u8>,
    },
    /// Terminates the session.
    Error {
        kind: WorkerErrorKind,
        message: String,
    },
}

impl WorkerReply {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Ready => "READY",
            Self::Progress { .. } => "PROGRESS",
            Self::Complete { .. } => "COMPLETE",
            Self::Error { .. } => "ERROR",
        }
    }

    pub fn error(kind: WorkerErrorKind, message: impl Into<String>) -> Self {
        Self::Error {
            kind,
            message: message.into(),
        }
    }
}

/// Why the worker gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerErrorKind {
    /// The output buffer never appeared within the retry budget.
    FinalizeTimeout { attempts: u32, waited_ms: u64 },
    /// A frame or finalize arrived before `Config`.
    NotConfigured,
    /// The container target failed.
    Encoder,
    /// A request that makes no sense in the current session state.
    Protocol,
}

/// Convert a worker `ERROR` into the caller-facing error.
pub fn reply_error(kind: WorkerErrorKind, message: String) -> SceneError {
    match kind {
        WorkerErrorKind::FinalizeTimeout {
            attempts,
            waited_ms,
        } => SceneError::encoder_timeout(message, attempts, waited_ms),
        WorkerErrorKind::NotConfigured | WorkerErrorKind::Encoder | WorkerErrorKind::Protocol => {
            SceneError::encoder(message)
        }
    }
}

/// How long `Finalize` polls for the output buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinalizePolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl FinalizePolicy {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            delay,
        }
    }

    /// Upper bound on time spent sleeping between polls.
    pub fn budget(&self) -> Duration {
        self.delay * self.attempts.saturating_sub(1)
    }
}

impl Default for FinalizePolicy {
    fn default() -> Self {
        Self::new(50, Duration::from_millis(100))
    }
}

//! Caller side of the encoder protocol.

use std::time::Duration;

use scenecast_common::config::ExportDefaults;
use scenecast_common::error::{SceneError, SceneResult};
use scenecast_scene_model::Bitmap;
use tokio::sync::mpsc::error::TryRecvError;

use super::protocol::{reply_error, EncoderConfig, FinalizePolicy, WorkerReply, WorkerRequest};
use super::target::ContainerTarget;
use super::worker::{spawn_encoder_worker, WorkerHandle};

/// Frames sent to the worker versus frames it has finished with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingFrames {
    sent: u64,
    completed: u64,
}

impl PendingFrames {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> u64 {
        self.sent
    }

    pub fn completed(&self) -> u64 {
        self.completed
    }

    /// Frames in flight. Never negative.
    pub fn pending(&self) -> u64 {
        self.sent.saturating_sub(self.completed)
    }

    pub fn on_sent(&mut self) {
        self.sent += 1;
    }

    /// Record the worker's cumulative encoded count.
    pub fn on_encoded_total(&mut self, encoded: u64) {
        self.completed = self.completed.max(encoded.min(self.sent));
    }
}

/// Limits for one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    /// Most `EncodeFrame` messages allowed in flight.
    pub max_in_flight: usize,
    /// How long to wait for any single reply.
    pub reply_timeout: Duration,
    pub finalize: FinalizePolicy,
}

impl SessionOptions {
    pub fn from_config(export: &ExportDefaults) -> Self {
        Self {
            max_in_flight: export.max_in_flight_frames.max(1),
            reply_timeout: Duration::from_millis(export.reply_timeout_ms),
            finalize: FinalizePolicy::new(
                export.finalize_attempts,
                Duration::from_millis(export.finalize_delay_ms),
            ),
        }
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from_config(&ExportDefaults::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Spawned,
    Ready,
    Finished,
    Failed,
}

/// A live connection to one encoder worker.
///
/// Dropping the session discards the worker.
pub struct EncoderSession {
    worker: WorkerHandle,
    options: SessionOptions,
    pending: PendingFrames,
    queue_size: usize,
    state: SessionState,
}

impl EncoderSession {
    /// Spawn a worker around `target`. Fails up front if the target cannot
    /// run here.
    pub fn spawn(target: Box<dyn ContainerTarget>, options: SessionOptions) -> SceneResult<Self> {
        if !target.is_available() {
            return Err(SceneError::unsupported(format!(
                "encoder target {:?} is not available",
                target.name()
            )));
        }
        tracing::debug!(
            target_name = target.name(),
            max_in_flight = options.max_in_flight,
            "Spawning encoder worker"
        );
        Ok(Self {
            worker: spawn_encoder_worker(target, options.finalize),
            options,
            pending: PendingFrames::new(),
            queue_size: 0,
            state: SessionState::Spawned,
        })
    }

    pub fn pending(&self) -> u64 {
        self.pending.pending()
    }

    pub fn frames(&self) -> PendingFrames {
        self.pending
    }

    /// Last queue size the worker reported.
    pub fn queue_size(&self) -> usize {
        self.queue_size
    }

    /// Send `CONFIG` and wait for `READY`.
    pub async fn configure(&mut self, config: EncoderConfig) -> SceneResult<()> {
        if self.state != SessionState::Spawned {
            return Err(SceneError::encoder("encoder session already configured"));
        }
        self.send(WorkerRequest::Config(config))?;
        loop {
            match self.next_reply(self.options.reply_timeout).await? {
                WorkerReply::Ready => {
                    self.state = SessionState::Ready;
                    return Ok(());
                }
                other => self.unexpected(&other),
            }
        }
    }

    /// Send one frame, first waiting until fewer than `max_in_flight` are
    /// pending.
    pub async fn encode_frame(
        &mut self,
        bitmap: Bitmap,
        timestamp_us: u64,
        duration_us: Option<u64>,
    ) -> SceneResult<()> {
        self.ensure_ready()?;
        self.drain_ready_replies()?;
        while self.pending.pending() >= self.options.max_in_flight as u64 {
            tracing::trace!(pending = self.pending.pending(), "Encoder backpressure");
            let reply = self.next_reply(self.options.reply_timeout).await?;
            self.handle_progress(reply);
        }
        self.pending.on_sent();
        self.send(WorkerRequest::EncodeFrame {
            bitmap,
            timestamp_us,
            duration_us,
        })
    }

    /// Send `FINALIZE` and wait for the finished container.
    pub async fn finalize(&mut self) -> SceneResult<Vec<u8>> {
        self.ensure_ready()?;
        self.send(WorkerRequest::Finalize)?;
        // The worker may legitimately spend its whole retry budget polling.
        let wait = self.options.reply_timeout + self.options.finalize.budget();
        loop {
            match self.next_reply(wait).await? {
                WorkerReply::Complete { buffer } => {
                    self.state = SessionState::Finished;
                    tracing::info!(
                        bytes = buffer.len(),
                        frames = self.pending.completed(),
                        "Encoder session complete"
                    );
                    return Ok(buffer);
                }
                reply @ WorkerReply::Progress { .. } => self.handle_progress(reply),
                other => self.unexpected(&other),
            }
        }
    }

    fn ensure_ready(&self) -> SceneResult<()> {
        match self.state {
            SessionState::Ready => Ok(()),
            SessionState::Spawned => Err(SceneError::encoder("encoder session not configured")),
            SessionState::Finished => Err(SceneError::encoder("encoder session already finalized")),
            SessionState::Failed => Err(SceneError::encoder("encoder session terminated")),
        }
    }

    fn send(&mut self, request: WorkerRequest) -> SceneResult<()> {
        let label = request.label();
        if self.worker.requests.send(request).is_err() {
            self.state = SessionState::Failed;
            return Err(SceneError::encoder(format!(
                "encoder worker exited before {label}"
            )));
        }
        Ok(())
    }

    /// Await one reply. `ERROR` and a closed channel end the session.
    async fn next_reply(&mut self, wait: Duration) -> SceneResult<WorkerReply> {
        let reply = match tokio::time::timeout(wait, self.worker.replies.recv()).await {
            Ok(Some(reply)) => reply,
            Ok(None) => {
                self.state = SessionState::Failed;
                return Err(SceneError::encoder("encoder worker exited unexpectedly"));
            }
            Err(_) => {
                self.state = SessionState::Failed;
                return Err(SceneError::encoder_timeout(
                    "no reply from encoder worker",
                    1,
                    wait.as_millis() as u64,
                ));
            }
        };
        self.check_error(reply)
    }

    fn check_error(&mut self, reply: WorkerReply) -> SceneResult<WorkerReply> {
        match reply {
            WorkerReply::Error { kind, message } => {
                self.state = SessionState::Failed;
                Err(reply_error(kind, message))
            }
            other => Ok(other),
        }
    }

    fn drain_ready_replies(&mut self) -> SceneResult<()> {
        loop {
            match self.worker.replies.try_recv() {
                Ok(reply) => {
                    let reply = self.check_error(reply)?;
                    self.handle_progress(reply);
                }
                Err(TryRecvError::Empty) => return Ok(()),
                Err(TryRecvError::Disconnected) => {
                    self.state = SessionState::Failed;
                    return Err(SceneError::encoder("encoder worker exited unexpectedly"));
                }
            }
        }
    }

    fn handle_progress(&mut self, reply: WorkerReply) {
        match reply {
            WorkerReply::Progress {
                queue_size,
                encoded,
            } => {
                self.queue_size = queue_size;
                self.pending.on_encoded_total(encoded);
            }
            other => self.unexpected(&other),
        }
    }

    fn unexpected(&self, reply: &WorkerReply) {
        tracing::warn!(reply = reply.label(), "Ignoring unexpected encoder reply");
    }
}

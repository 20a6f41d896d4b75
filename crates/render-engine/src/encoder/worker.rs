//! The encoder worker: owns a [`ContainerTarget`] on its own thread and
//! talks to the caller only through channels.

use std::collections::VecDeque;

use scenecast_scene_model::Bitmap;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

use super::protocol::{EncoderConfig, FinalizePolicy, WorkerErrorKind, WorkerReply, WorkerRequest};
use super::target::ContainerTarget;

/// Caller's end of a worker.
#[derive(Debug)]
pub struct WorkerHandle {
    pub requests: UnboundedSender<WorkerRequest>,
    pub replies: UnboundedReceiver<WorkerReply>,
    pub task: JoinHandle<()>,
}

/// Start a worker on the blocking pool. Must be called inside a tokio runtime.
pub fn spawn_encoder_worker(target: Box<dyn ContainerTarget>, finalize: FinalizePolicy) -> WorkerHandle {
    let (request_tx, request_rx) = mpsc::unbounded_channel();
    let (reply_tx, reply_rx) = mpsc::unbounded_channel();
    let task = tokio::task::spawn_blocking(move || {
        let mut worker = Worker::new(target, finalize, reply_tx);
        worker.run(request_rx);
    });
    WorkerHandle {
        requests: request_tx,
        replies: reply_rx,
        task,
    }
}

struct QueuedFrame {
    bitmap: Bitmap,
    timestamp_us: u64,
    duration_us: Option<u64>,
}

struct Worker {
    target: Box<dyn ContainerTarget>,
    finalize: FinalizePolicy,
    replies: UnboundedSender<WorkerReply>,
    config: Option<EncoderConfig>,
    queue: VecDeque<QueuedFrame>,
    encoded: u64,
}

/// Whether the session continues after handling a request.
enum Flow {
    Continue,
    Stop,
}

impl Worker {
    fn new(
        target: Box<dyn ContainerTarget>,
        finalize: FinalizePolicy,
        replies: UnboundedSender<WorkerReply>,
    ) -> Self {
        Self {
            target,
            finalize,
            replies,
            config: None,
            queue: VecDeque::new(),
            encoded: 0,
        }
    }

    fn run(&mut self, mut requests: UnboundedReceiver<WorkerRequest>) {
        tracing::debug!(target_name = self.target.name(), "Encoder worker started");
        let mut deferred: Option<WorkerRequest> = None;
        loop {
            let request = match deferred.take() {
                Some(request) => request,
                None => match requests.blocking_recv() {
                    Some(request) => request,
                    None => {
                        tracing::debug!("Encoder worker discarded by caller");
                        return;
                    }
                },
            };
            tracing::trace!(request = request.label(), "Worker request");

            let flow = match request {
                WorkerRequest::Config(config) => self.configure(config),
                WorkerRequest::EncodeFrame {
                    bitmap,
                    timestamp_us,
                    duration_us,
                } => {
                    let mut flow = self.accept(QueuedFrame {
                        bitmap,
                        timestamp_us,
                        duration_us,
                    });
                    // Queue whatever else is already waiting, then drain.
                    while matches!(flow, Flow::Continue) {
                        match requests.try_recv() {
                            Ok(WorkerRequest::EncodeFrame {
                                bitmap,
                                timestamp_us,
                                duration_us,
                            }) => {
                                flow = self.accept(QueuedFrame {
                                    bitmap,
                                    timestamp_us,
                                    duration_us,
                                });
                            }
                            Ok(other) => {
                                deferred = Some(other);
                                break;
                            }
                            Err(_) => break,
                        }
                    }
                    match flow {
                        Flow::Continue => self.drain_queue(),
                        Flow::Stop => Flow::Stop,
                    }
                }
                WorkerRequest::Finalize => self.finish(),
            };

            if matches!(flow, Flow::Stop) {
                tracing::debug!(encoded = self.encoded, "Encoder worker session ended");
                return;
            }
        }
    }

    fn send(&self, reply: WorkerReply) -> Flow {
        if self.replies.send(reply).is_err() {
            tracing::debug!("Encoder caller went away");
            return Flow::Stop;
        }
        Flow::Continue
    }

    fn fail(&self, kind: WorkerErrorKind, message: impl Into<String>) -> Flow {
        let message = message.into();
        tracing::error!(kind = ?kind, error = %message, "Encoder worker failed");
        let _ = self.send(WorkerReply::error(kind, message));
        Flow::Stop
    }

    fn progress(&self) -> Flow {
        self.send(WorkerReply::Progress {
            queue_size: self.queue.len(),
            encoded: self.encoded,
        })
    }

    fn configure(&mut self, config: EncoderConfig) -> Flow {
        if self.config.is_some() {
            return self.fail(WorkerErrorKind::Protocol, "encoder already configured");
        }
        if !(config.fps > 0.0) {
            return self.fail(
                WorkerErrorKind::Encoder,
                format!("invalid frame rate {}", config.fps),
            );
        }
        if let Err(err) = self.target.open(&config) {
            return self.fail(WorkerErrorKind::Encoder, err.to_string());
        }
        tracing::info!(
            width = config.width,
            height = config.height,
            fps = config.fps,
            format = ?config.format,
            target_name = self.target.name(),
            "Encoder configured"
        );
        self.config = Some(config);
        self.send(WorkerReply::Ready)
    }

    fn accept(&mut self, frame: QueuedFrame) -> Flow {
        if self.config.is_none() {
            return self.fail(
                WorkerErrorKind::NotConfigured,
                "frame received before encoder was configured",
            );
        }
        self.queue.push_back(frame);
        self.progress()
    }

    fn default_duration_us(&self) -> u64 {
        self.config
            .as_ref()
            .map(|c| scenecast_common::clock::ms_to_us(1000.0 / c.fps))
            .unwrap_or(0)
    }

    fn drain_queue(&mut self) -> Flow {
        let default_duration = self.default_duration_us();
        while let Some(frame) = self.queue.pop_front() {
            let duration = frame.duration_us.unwrap_or(default_duration);
            if let Err(err) = self
                .target
                .write_frame(&frame.bitmap, frame.timestamp_us, duration)
            {
                return self.fail(WorkerErrorKind::Encoder, err.to_string());
            }
            // Release the pixels before reporting the frame as consumed.
            drop(frame);
            self.encoded += 1;
            if let Flow::Stop = self.progress() {
                return Flow::Stop;
            }
        }
        Flow::Continue
    }

    fn finish(&mut self) -> Flow {
        if self.config.is_none() {
            return self.fail(
                WorkerErrorKind::NotConfigured,
                "finalize received before encoder was configured",
            );
        }
        if let Flow::Stop = self.drain_queue() {
            return Flow::Stop;
        }
        if let Err(err) = self.target.close_source() {
            return self.fail(WorkerErrorKind::Encoder, err.to_string());
        }

        let policy = self.finalize;
        let started = std::time::Instant::now();
        for attempt in 1..=policy.attempts {
            match self.target.poll_buffer() {
                Ok(Some(buffer)) if !buffer.is_empty() => {
                    tracing::info!(
                        bytes = buffer.len(),
                        frames = self.encoded,
                        attempt,
                        "Encoder finalized"
                    );
                    let _ = self.send(WorkerReply::Complete { buffer });
                    return Flow::Stop;
                }
                Ok(_) => {
                    tracing::debug!(attempt, "Output buffer not ready yet");
                }
                Err(err) => return self.fail(WorkerErrorKind::Encoder, err.to_string()),
            }
            if attempt < policy.attempts {
                std::thread::sleep(policy.delay);
            }
        }

        let waited_ms = started.elapsed().as_millis() as u64;
        self.fail(
            WorkerErrorKind::FinalizeTimeout {
                attempts: policy.attempts,
                waited_ms,
            },
            format!(
                "output buffer still empty after {} attempts",
                policy.attempts
            ),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::target::{parse_raw_container, RawContainerTarget};
    use scenecast_common::error::{SceneError, SceneResult};
    use std::time::Duration;

    /// Accepts everything but never produces output.
    struct EmptyTarget;

    impl ContainerTarget for EmptyTarget {
        fn name(&self) -> &str {
            "empty"
        }
        fn open(&mut self, _: &EncoderConfig) -> SceneResult<()> {
            Ok(())
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

    /// Fails on the second frame.
    struct FlakyTarget(u32);

    impl ContainerTarget for FlakyTarget {
        fn name(&self) -> &str {
            "flaky"
        }
        fn open(&mut self, _: &EncoderConfig) -> SceneResult<()> {
            Ok(())
        }
        fn write_frame(&mut self, _: &Bitmap, _: u64, _: u64) -> SceneResult<()> {
            self.0 += 1;
            if self.0 == 2 {
                return Err(SceneError::encoder("muxer rejected frame"));
            }
            Ok(())
        }
        fn close_source(&mut self) -> SceneResult<()> {
            Ok(())
        }
        fn poll_buffer(&mut self) -> SceneResult<Option<Vec<u8>>> {
            Ok(Some(vec![1]))
        }
    }

    async fn next(handle: &mut WorkerHandle) -> WorkerReply {
        tokio::time::timeout(Duration::from_secs(5), handle.replies.recv())
            .await
            .unwrap()
            .unwrap()
    }

    fn frame(ts: u64) -> WorkerRequest {
        WorkerRequest::EncodeFrame {
            bitmap: Bitmap::new(2, 2),
            timestamp_us: ts,
            duration_us: None,
        }
    }

    #[tokio::test]
    async fn test_protocol_sequence() {
        let mut handle = spawn_encoder_worker(Box::new(RawContainerTarget::new()), FinalizePolicy::default());
        handle
            .requests
            .send(WorkerRequest::Config(EncoderConfig::new(2, 2, 50.0)))
            .unwrap();
        assert_eq!(next(&mut handle).await, WorkerReply::Ready);

        handle.requests.send(frame(0)).unwrap();
        assert_eq!(
            next(&mut handle).await,
            WorkerReply::Progress { queue_size: 1, encoded: 0 }
        );
        assert_eq!(
            next(&mut handle).await,
            WorkerReply::Progress { queue_size: 0, encoded: 1 }
        );

        handle.requests.send(WorkerRequest::Finalize).unwrap();
        let WorkerReply::Complete { buffer } = next(&mut handle).await else {
            panic!("expected COMPLETE");
        };
        let info = parse_raw_container(&buffer).unwrap();
        assert_eq!(info.frames, vec![(0, 20_000)]);
        handle.task.await.unwrap();
    }

    #[tokio::test]
    async fn test_frame_before_config_is_error() {
        let mut handle = spawn_encoder_worker(Box::new(RawContainerTarget::new()), FinalizePolicy::default());
        handle.requests.send(frame(0)).unwrap();
        assert!(matches!(
            next(&mut handle).await,
            WorkerReply::Error { kind: WorkerErrorKind::NotConfigured, .. }
        ));
        handle.task.await.unwrap();
        assert!(handle.replies.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_finalize_timeout_is_distinct() {
        let mut handle = spawn_encoder_worker(
            Box::new(EmptyTarget),
            FinalizePolicy::new(3, Duration::from_millis(5)),
        );
        handle
            .requests
            .send(WorkerRequest::Config(EncoderConfig::new(2, 2, 30.0)))
            .unwrap();
        assert_eq!(next(&mut handle).await, WorkerReply::Ready);
        handle.requests.send(WorkerRequest::Finalize).unwrap();
        match next(&mut handle).await {
            WorkerReply::Error {
                kind: WorkerErrorKind::FinalizeTimeout { attempts, waited_ms },
                ..
            } => {
                assert_eq!(attempts, 3);
                assert!(waited_ms >= 10);
            }
            other => panic!("expected finalize timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_encoder_error_ends_session() {
        let mut handle = spawn_encoder_worker(Box::new(FlakyTarget(0)), FinalizePolicy::default());
        handle
            .requests
            .send(WorkerRequest::Config(EncoderConfig::new(2, 2, 30.0)))
            .unwrap();
        assert_eq!(next(&mut handle).await, WorkerReply::Ready);
        handle.requests.send(frame(0)).unwrap();
        handle.requests.send(frame(33_333)).unwrap();
        let mut saw_error = false;
        while let Some(reply) = handle.replies.recv().await {
            if let WorkerReply::Error { kind, message } = reply {
                assert_eq!(kind, WorkerErrorKind::Encoder);
                assert!(message.contains("muxer rejected frame"));
                saw_error = true;
            }
        }
        assert!(saw_error);
    }

    #[tokio::test]
    async fn test_double_config_is_protocol_error() {
        let mut handle = spawn_encoder_worker(Box::new(RawContainerTarget::new()), FinalizePolicy::default());
        let cfg = EncoderConfig::new(2, 2, 30.0);
        handle.requests.send(WorkerRequest::Config(cfg.clone())).unwrap();
        handle.requests.send(WorkerRequest::Config(cfg)).unwrap();
        assert_eq!(next(&mut handle).await, WorkerReply::Ready);
        assert!(matches!(
            next(&mut handle).await,
            WorkerReply::Error { kind: WorkerErrorKind::Protocol, .. }
        ));
    }
}

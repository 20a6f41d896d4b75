//! Export orchestration.
//!
//! Both strategies pause playback, clear the selection and raise the
//! exporting flag before any frame is rendered, and rewind the scene to
//! time 0 afterwards whether the export succeeded or not.

use std::time::Duration;

use scenecast_common::config::ContainerFormat;
use scenecast_common::error::{SceneError, SceneResult};
use scenecast_render_engine::encoder::{
    encode_scene, ContainerTarget, EncoderConfig, EncoderSession, FfmpegContainerTarget,
    RawContainerTarget, SessionOptions,
};
use scenecast_render_engine::recorder::FfmpegRecorder;
use scenecast_render_engine::{
    record_live, select_format, CancelToken, ExportProgress, ExportStage,
    FrameSweep, LiveOptions, ProgressCallback, RecordingFormat, StreamRecorder,
};

use crate::engine::Engine;
use crate::events::EngineEvent;

/// Bytes produced by an export.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportOutput {
    pub bytes: Vec<u8>,
    pub mime_type: &'static str,
    pub extension: &'static str,
    pub frames: u64,
}

/// Which container an offline export produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfflineTarget {
    /// MP4 or MOV through ffmpeg.
    Container(ContainerFormat),
    /// Uncompressed frames in the raw container; needs no external tools.
    Raw,
}

impl OfflineTarget {
    fn build(self) -> Box<dyn ContainerTarget> {
        match self {
            Self::Container(_) => Box::new(FfmpegContainerTarget::new()),
            Self::Raw => Box::new(RawContainerTarget::new()),
        }
    }

    fn format(self, fallback: ContainerFormat) -> ContainerFormat {
        match self {
            Self::Container(format) => format,
            Self::Raw => fallback,
        }
    }

    fn mime_type(self) -> &'static str {
        match self {
            Self::Container(ContainerFormat::Mp4) => "video/mp4",
            Self::Container(ContainerFormat::Mov) => "video/quicktime",
            Self::Raw => "application/octet-stream",
        }
    }

    fn extension(self) -> &'static str {
        match self {
            Self::Container(format) => format.extension(),
            Self::Raw => "scnraw",
        }
    }
}

fn progress_sink(engine: &Engine) -> ProgressCallback {
    let tx = engine.events.sender();
    Box::new(move |p: ExportProgress| {
        let _ = tx.send(EngineEvent::ExportProgress {
            progress: p.progress,
            frame: p.frames_rendered,
            total_frames: p.total_frames,
            stage: p.stage,
        });
    })
}

impl Engine {
    /// Frame rate used when a caller does not pick one.
    pub fn export_fps(&self) -> f64 {
        self.config.export.fps
    }

    fn sweep(&self, fps: Option<f64>) -> SceneResult<FrameSweep> {
        let fps = fps.unwrap_or(self.config.export.fps);
        if !(fps > 0.0) || !fps.is_finite() {
            return Err(SceneError::invalid_argument(format!("invalid frame rate {fps}")));
        }
        Ok(FrameSweep::new(self.clock.total_duration(), fps))
    }

    /// Take logical control of the surface away from live playback.
    async fn begin_export(&mut self, sweep: &FrameSweep) {
        self.pause();
        self.clear_selection();
        self.clock.set_exporting(true);
        self.events.emit(EngineEvent::ExportProgress {
            progress: 0.0,
            frame: 0,
            total_frames: sweep.total_frames,
            stage: ExportStage::Preparing,
        });
        self.wait_for_images().await;
    }

    /// Hand control back and report the outcome.
    fn end_export(&mut self, result: &SceneResult<ExportOutput>) {
        self.clock.set_exporting(false);
        self.seek(0.0);
        match result {
            Ok(output) => {
                self.events.emit(EngineEvent::ExportProgress {
                    progress: 1.0,
                    frame: output.frames,
                    total_frames: output.frames,
                    stage: ExportStage::Complete,
                });
                self.events.emit(EngineEvent::ExportFinished {
                    bytes: output.bytes.len(),
                });
                tracing::info!(bytes = output.bytes.len(), frames = output.frames, "Export finished");
            }
            Err(err) => {
                self.events.emit(EngineEvent::ExportFailed {
                    message: err.to_string(),
                });
                tracing::error!(error = %err, "Export failed");
            }
        }
    }

    fn report_unstarted(&self, err: SceneError) -> SceneError {
        self.events.emit(EngineEvent::ExportFailed {
            message: err.to_string(),
        });
        tracing::error!(error = %err, "Export could not start");
        err
    }

    /// Record the timeline with the first available live recorder.
    pub async fn export_live(
        &mut self,
        formats: &[RecordingFormat],
        fps: Option<f64>,
        cancel: &CancelToken,
    ) -> SceneResult<ExportOutput> {
        let format = select_format(formats).map_err(|e| self.report_unstarted(e))?;
        let mut recorder: Box<dyn StreamRecorder> = match format {
            RecordingFormat::Webm => Box::new(FfmpegRecorder::with_bitrate(self.config.export.bitrate_kbps)),
            other => other.recorder(),
        };
        let extension = format.extension();
        self.export_live_with(recorder.as_mut(), extension, fps, cancel).await
    }

    /// Record the timeline into a specific recorder.
    pub async fn export_live_with(
        &mut self,
        recorder: &mut dyn StreamRecorder,
        extension: &'static str,
        fps: Option<f64>,
        cancel: &CancelToken,
    ) -> SceneResult<ExportOutput> {
        let sweep = self.sweep(fps).map_err(|e| self.report_unstarted(e))?;
        if !recorder.is_available() {
            return Err(self.report_unstarted(SceneError::unsupported(format!(
                "recorder {:?} is not available",
                recorder.name()
            ))));
        }
        tracing::info!(
            recorder = recorder.name(),
            frames = sweep.total_frames,
            fps = sweep.fps,
            "Starting live export"
        );

        self.begin_export(&sweep).await;
        let progress = progress_sink(self);
        let options = LiveOptions {
            frame_yield: Duration::from_millis(self.config.export.frame_yield_ms),
        };
        let mime_type = recorder.mime_type();
        let result = record_live(
            &mut self.scene,
            &self.renderer,
            recorder,
            sweep,
            options,
            cancel,
            Some(&progress),
        )
        .await
        .map(|bytes| ExportOutput {
            bytes,
            mime_type,
            extension,
            frames: sweep.total_frames,
        });
        self.end_export(&result);
        result
    }

    /// Encode the timeline through the offline worker.
    pub async fn export_offline(&mut self, target: OfflineTarget, fps: Option<f64>) -> SceneResult<ExportOutput> {
        let sweep = self.sweep(fps).map_err(|e| self.report_unstarted(e))?;
        let format = target.format(self.config.export.format);
        let session = EncoderSession::spawn(target.build(), SessionOptions::from_config(&self.config.export))
            .map_err(|e| self.report_unstarted(e))?;
        let config = EncoderConfig::new(self.renderer.width(), self.renderer.height(), sweep.fps)
            .with_bitrate(self.config.export.bitrate_kbps)
            .with_format(format);
        self.export_offline_with(session, config, sweep, target.mime_type(), target.extension())
            .await
    }

    /// Encode through an already spawned session.
    pub async fn export_offline_with(
        &mut self,
        mut session: EncoderSession,
        config: EncoderConfig,
        sweep: FrameSweep,
        mime_type: &'static str,
        extension: &'static str,
    ) -> SceneResult<ExportOutput> {
        tracing::info!(
            frames = sweep.total_frames,
            fps = sweep.fps,
            format = ?config.format,
            "Starting offline export"
        );
        self.begin_export(&sweep).await;
        let progress = progress_sink(self);
        let result = encode_scene(
            &mut self.scene,
            &self.renderer,
            &mut session,
            config,
            sweep,
            Some(&progress),
        )
        .await
        .map(|bytes| ExportOutput {
            bytes,
            mime_type,
            extension,
            frames: sweep.total_frames,
        });
        self.end_export(&result);
        result
    }
}

//! Container targets the encoder worker writes into.

use std::path::PathBuf;

use scenecast_common::config::ContainerFormat;
use scenecast_common::error::{SceneError, SceneResult};
use scenecast_scene_model::Bitmap;

use super::protocol::EncoderConfig;
use crate::ffmpeg::{self, FfmpegPipe};

/// A muxer behind the worker.
///
/// `poll_buffer` may return `None` for a while after `close_source`; the
/// worker keeps polling within its retry budget.
pub trait ContainerTarget: Send {
    /// Target name.
    fn name(&self) -> &str;

    /// Check if this target can run on the system.
    fn is_available(&self) -> bool {
        true
    }

    /// Initialize the output container and its video track.
    fn open(&mut self, config: &EncoderConfig) -> SceneResult<()>;

    fn write_frame(&mut self, frame: &Bitmap, timestamp_us: u64, duration_us: u64)
        -> SceneResult<()>;

    /// No more frames will arrive.
    fn close_source(&mut self) -> SceneResult<()>;

    /// The finished container, once it exists.
    fn poll_buffer(&mut self) -> SceneResult<Option<Vec<u8>>>;
}

/// Magic bytes at the start of a raw container.
pub const RAW_MAGIC: &[u8; 7] = b"SCNRAW1";

/// Uncompressed in-memory container.
///
/// Layout (little endian): magic, width u32, height u32, fps f64, format u8,
/// then per frame: timestamp u64, duration u64, byte length u32, RGBA bytes.
#[derive(Debug, Default)]
pub struct RawContainerTarget {
    size: Option<(u32, u32)>,
    data: Vec<u8>,
    closed: bool,
    frames: u64,
}

impl RawContainerTarget {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Parsed header and frame index of a raw container.
#[derive(Debug, Clone, PartialEq)]
pub struct RawContainerInfo {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub format: ContainerFormat,
    /// `(timestamp_us, duration_us)` per frame.
    pub frames: Vec<(u64, u64)>,
}

fn format_tag(format: ContainerFormat) -> u8 {
    match format {
        ContainerFormat::Mp4 => 0,
        ContainerFormat::Mov => 1,
    }
}

/// Read back a raw container's header and frame timing.
pub fn parse_raw_container(bytes: &[u8]) -> SceneResult<RawContainerInfo> {
    fn take<'a>(bytes: &mut &'a [u8], n: usize) -> SceneResult<&'a [u8]> {
        if bytes.len() < n {
            return Err(SceneError::invalid_argument("truncated raw container"));
        }
        let (head, rest) = bytes.split_at(n);
        *bytes = rest;
        Ok(head)
    }
    fn u32_le(bytes: &mut &[u8]) -> SceneResult<u32> {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(take(bytes, 4)?);
        Ok(u32::from_le_bytes(buf))
    }
    fn u64_le(bytes: &mut &[u8]) -> SceneResult<u64> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(take(bytes, 8)?);
        Ok(u64::from_le_bytes(buf))
    }

    let mut rest = bytes;
    if take(&mut rest, RAW_MAGIC.len())? != RAW_MAGIC {
        return Err(SceneError::invalid_argument("not a raw container"));
    }
    let width = u32_le(&mut rest)?;
    let height = u32_le(&mut rest)?;
    let fps = f64::from_bits(u64_le(&mut rest)?);
    let format = match take(&mut rest, 1)?[0] {
        0 => ContainerFormat::Mp4,
        1 => ContainerFormat::Mov,
        other => {
            return Err(SceneError::invalid_argument(format!(
                "unknown container format tag {other}"
            )))
        }
    };
    let mut frames = Vec::new();
    while !rest.is_empty() {
        let timestamp = u64_le(&mut rest)?;
        let duration = u64_le(&mut rest)?;
        let len = u32_le(&mut rest)? as usize;
        take(&mut rest, len)?;
        frames.push((timestamp, duration));
    }
    Ok(RawContainerInfo {
        width,
        height,
        fps,
        format,
        frames,
    })
}

impl ContainerTarget for RawContainerTarget {
    fn name(&self) -> &str {
        "raw"
    }

    fn open(&mut self, config: &EncoderConfig) -> SceneResult<()> {
        if config.width == 0 || config.height == 0 {
            return Err(SceneError::encoder(format!(
                "cannot open {}x{} video track",
                config.width, config.height
            )));
        }
        self.data.clear();
        self.data.extend_from_slice(RAW_MAGIC);
        self.data.extend_from_slice(&config.width.to_le_bytes());
        self.data.extend_from_slice(&config.height.to_le_bytes());
        self.data.extend_from_slice(&config.fps.to_bits().to_le_bytes());
        self.data.push(format_tag(config.format));
        self.size = Some((config.width, config.height));
        self.closed = false;
        self.frames = 0;
        Ok(())
    }

    fn write_frame(
        &mut self,
        frame: &Bitmap,
        timestamp_us: u64,
        duration_us: u64,
    ) -> SceneResult<()> {
        let size = self
            .size
            .ok_or_else(|| SceneError::encoder("video track not initialized"))?;
        if self.closed {
            return Err(SceneError::encoder("frame source already closed"));
        }
        if (frame.width(), frame.height()) != size {
            return Err(SceneError::encoder(format!(
                "frame is {}x{}, track is {}x{}",
                frame.width(),
                frame.height(),
                size.0,
                size.1
            )));
        }
        let bytes = frame.as_bytes();
        let len = u32::try_from(bytes.len())
            .map_err(|_| SceneError::encoder("frame too large for raw container"))?;
        self.data.extend_from_slice(&timestamp_us.to_le_bytes());
        self.data.extend_from_slice(&duration_us.to_le_bytes());
        self.data.extend_from_slice(&len.to_le_bytes());
        self.data.extend_from_slice(bytes);
        self.frames += 1;
        Ok(())
    }

    fn close_source(&mut self) -> SceneResult<()> {
        if self.size.is_none() {
            return Err(SceneError::encoder("output not initialized"));
        }
        self.closed = true;
        tracing::debug!(frames = self.frames, bytes = self.data.len(), "Raw container closed");
        Ok(())
    }

    fn poll_buffer(&mut self) -> SceneResult<Option<Vec<u8>>> {
        if !self.closed || self.data.is_empty() {
            return Ok(None);
        }
        Ok(Some(std::mem::take(&mut self.data)))
    }
}

/// MP4/MOV (H.264) through an `ffmpeg` child process.
pub struct FfmpegContainerTarget {
    pipe: Option<FfmpegPipe>,
    output: Option<PathBuf>,
}

impl FfmpegContainerTarget {
    pub fn new() -> Self {
        Self {
            pipe: None,
            output: None,
        }
    }

    fn codec_args(config: &EncoderConfig) -> Vec<String> {
        let mut args = vec![
            "-c:v".to_string(),
            "libx264".to_string(),
            "-preset".to_string(),
            "medium".to_string(),
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
        ];
        if let Some(kbps) = config.bitrate_kbps {
            args.push("-b:v".to_string());
            args.push(format!("{}k", kbps.max(500)));
        }
        if config.format == ContainerFormat::Mp4 {
            args.push("-movflags".to_string());
            args.push("+faststart".to_string());
        }
        args.push("-an".to_string());
        args
    }
}

impl Default for FfmpegContainerTarget {
    fn default() -> Self {
        Self::new()
    }
}

impl ContainerTarget for FfmpegContainerTarget {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    fn is_available(&self) -> bool {
        ffmpeg::command_exists("ffmpeg")
    }

    fn open(&mut self, config: &EncoderConfig) -> SceneResult<()> {
        let output = ffmpeg::temp_output_path(config.format.extension());
        let mut args = ffmpeg::rawvideo_input_args(config.width, config.height, config.fps);
        args.extend(Self::codec_args(config));
        args.push(output.to_string_lossy().into_owned());
        self.pipe = Some(FfmpegPipe::spawn(&args, config.width, config.height)?);
        self.output = Some(output);
        Ok(())
    }

    fn write_frame(&mut self, frame: &Bitmap, _timestamp_us: u64, _duration_us: u64) -> SceneResult<()> {
        // Constant frame rate: ffmpeg derives timing from -framerate.
        self.pipe
            .as_mut()
            .ok_or_else(|| SceneError::encoder("video track not initialized"))?
            .write_frame(frame)
    }

    fn close_source(&mut self) -> SceneResult<()> {
        let mut pipe = self
            .pipe
            .take()
            .ok_or_else(|| SceneError::encoder("frame source not initialized"))?;
        pipe.finish()
    }

    fn poll_buffer(&mut self) -> SceneResult<Option<Vec<u8>>> {
        let Some(path) = self.output.as_deref() else {
            return Err(SceneError::encoder("output not initialized"));
        };
        let buffer = ffmpeg::take_output(path)?;
        if buffer.is_some() {
            self.output = None;
        }
        Ok(buffer)
    }
}

impl Drop for FfmpegContainerTarget {
    fn drop(&mut self) {
        self.pipe = None;
        if let Some(path) = self.output.take() {
            let _ = std::fs::remove_file(path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_container_round_trip_header() {
        let mut target = RawContainerTarget::new();
        target
            .open(&EncoderConfig::new(2, 2, 25.0).with_format(ContainerFormat::Mov))
            .unwrap();
        target.write_frame(&Bitmap::new(2, 2), 0, 40_000).unwrap();
        target.write_frame(&Bitmap::new(2, 2), 40_000, 40_000).unwrap();
        assert!(target.poll_buffer().unwrap().is_none());
        target.close_source().unwrap();
        let bytes = target.poll_buffer().unwrap().unwrap();
        let info = parse_raw_container(&bytes).unwrap();
        assert_eq!((info.width, info.height, info.fps), (2, 2, 25.0));
        assert_eq!(info.format, ContainerFormat::Mov);
        assert_eq!(info.frames, vec![(0, 40_000), (40_000, 40_000)]);
    }

    #[test]
    fn test_raw_frame_before_open_fails() {
        let mut target = RawContainerTarget::new();
        assert!(target.write_frame(&Bitmap::new(1, 1), 0, 0).is_err());
        assert!(target.close_source().is_err());
    }

    #[test]
    fn test_raw_rejects_mismatched_frame() {
        let mut target = RawContainerTarget::new();
        target.open(&EncoderConfig::new(4, 4, 30.0)).unwrap();
        assert!(target.write_frame(&Bitmap::new(3, 4), 0, 0).is_err());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_raw_container(b"nope").is_err());
        assert!(parse_raw_container(b"SCNRAW1\x01").is_err());
    }

    #[test]
    fn test_mp4_args_include_faststart() {
        let args = FfmpegContainerTarget::codec_args(&EncoderConfig::new(8, 8, 30.0).with_bitrate(100));
        assert!(args.windows(2).any(|w| w[0] == "-movflags"));
        assert!(args.windows(2).any(|w| w[0] == "-b:v" && w[1] == "500k"));
        let mov = FfmpegContainerTarget::codec_args(
            &EncoderConfig::new(8, 8, 30.0).with_format(ContainerFormat::Mov),
        );
        assert!(!mov.iter().any(|a| a == "-movflags"));
    }
}

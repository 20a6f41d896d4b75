//! Shared plumbing for encoders that pipe raw RGBA frames into `ffmpeg`.

use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::thread::JoinHandle;

use scenecast_common::error::{SceneError, SceneResult};
use scenecast_scene_model::Bitmap;

/// Whether `binary` resolves on `PATH`.
pub fn command_exists(binary: &str) -> bool {
    Command::new("sh")
        .arg("-c")
        .arg(format!("command -v {binary} >/dev/null 2>&1"))
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// A fresh output path in the system temp directory.
pub fn temp_output_path(extension: &str) -> PathBuf {
    std::env::temp_dir().join(format!("scenecast-{}.{extension}", uuid::Uuid::new_v4()))
}

/// Arguments that make ffmpeg read rawvideo RGBA frames from stdin.
pub fn rawvideo_input_args(width: u32, height: u32, fps: f64) -> Vec<String> {
    vec![
        "-hide_banner".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-y".to_string(),
        "-f".to_string(),
        "rawvideo".to_string(),
        "-pixel_format".to_string(),
        "rgba".to_string(),
        "-video_size".to_string(),
        format!("{width}x{height}"),
        "-framerate".to_string(),
        format!("{fps}"),
        "-i".to_string(),
        "-".to_string(),
    ]
}

/// A running ffmpeg child fed through stdin.
pub struct FfmpegPipe {
    child: Child,
    stdin: Option<ChildStdin>,
    stderr_task: Option<JoinHandle<String>>,
    frame_bytes: usize,
}

impl FfmpegPipe {
    /// Spawn ffmpeg with `args`, expecting `width * height` RGBA frames.
    pub fn spawn(args: &[String], width: u32, height: u32) -> SceneResult<Self> {
        tracing::debug!(args = ?args, "Running ffmpeg");
        let mut child = Command::new("ffmpeg")
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| SceneError::encoder(format!("Failed to start ffmpeg: {e}")))?;

        tracing::info!(pid = child.id(), width, height, "ffmpeg process started");

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| SceneError::encoder("Failed to capture ffmpeg stdin"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| SceneError::encoder("Failed to capture ffmpeg stderr"))?;

        // Drain stderr concurrently so ffmpeg never blocks on a full pipe.
        let stderr_task = std::thread::spawn(move || -> String {
            let mut reader = BufReader::new(stderr);
            let mut output = String::new();
            match reader.read_to_string(&mut output) {
                Ok(_) => output,
                Err(err) => format!("<failed to read ffmpeg stderr: {err}>"),
            }
        });

        Ok(Self {
            child,
            stdin: Some(stdin),
            stderr_task: Some(stderr_task),
            frame_bytes: (width as usize) * (height as usize) * 4,
        })
    }

    /// Write one frame. The bitmap must match the configured size.
    pub fn write_frame(&mut self, frame: &Bitmap) -> SceneResult<()> {
        if frame.as_bytes().len() != self.frame_bytes {
            return Err(SceneError::encoder(format!(
                "frame is {}x{}, expected {} bytes",
                frame.width(),
                frame.height(),
                self.frame_bytes
            )));
        }
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| SceneError::encoder("ffmpeg input already closed"))?;
        stdin
            .write_all(frame.as_bytes())
            .map_err(|e| SceneError::encoder(format!("Failed writing frame to ffmpeg: {e}")))
    }

    /// Close stdin and wait for ffmpeg to exit.
    pub fn finish(&mut self) -> SceneResult<()> {
        drop(self.stdin.take());
        let status = self
            .child
            .wait()
            .map_err(|e| SceneError::encoder(format!("Failed to wait on ffmpeg: {e}")))?;
        let stderr_output = self
            .stderr_task
            .take()
            .map(|task| {
                task.join()
                    .unwrap_or_else(|_| "<failed to join stderr reader>".to_string())
            })
            .unwrap_or_default();

        if !status.success() {
            return Err(SceneError::encoder(format!(
                "ffmpeg failed (status {}): {}",
                status,
                stderr_output.trim()
            )));
        }
        Ok(())
    }
}

impl Drop for FfmpegPipe {
    fn drop(&mut self) {
        if self.stdin.is_some() {
            drop(self.stdin.take());
            if let Err(err) = self.child.kill() {
                tracing::debug!(error = %err, "ffmpeg already exited");
            }
            let _ = self.child.wait();
        }
    }
}

/// Read and delete an encoder output file. Returns `None` while it is empty
/// or missing.
pub fn take_output(path: &Path) -> SceneResult<Option<Vec<u8>>> {
    match std::fs::read(path) {
        Ok(bytes) if !bytes.is_empty() => {
            if let Err(err) = std::fs::remove_file(path) {
                tracing::warn!(error = %err, path = %path.display(), "Failed to remove encoder output");
            }
            Ok(Some(bytes))
        }
        Ok(_) => Ok(None),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(SceneError::encoder(format!(
            "Failed reading encoder output {}: {err}",
            path.display()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rawvideo_args_describe_frames() {
        let args = rawvideo_input_args(640, 360, 30.0);
        assert!(args.windows(2).any(|w| w[0] == "-video_size" && w[1] == "640x360"));
        assert!(args.windows(2).any(|w| w[0] == "-framerate" && w[1] == "30"));
        assert_eq!(args.last().map(String::as_str), Some("-"));
    }

    #[test]
    fn test_temp_paths_are_unique() {
        assert_ne!(temp_output_path("mp4"), temp_output_path("mp4"));
        assert!(temp_output_path("mov").to_string_lossy().ends_with(".mov"));
    }

    #[test]
    fn test_take_output_missing_and_empty() {
        let path = temp_output_path("bin");
        assert!(take_output(&path).unwrap().is_none());
        std::fs::write(&path, b"").unwrap();
        assert!(take_output(&path).unwrap().is_none());
        std::fs::write(&path, b"data").unwrap();
        assert_eq!(take_output(&path).unwrap(), Some(b"data".to_vec()));
        assert!(!path.exists());
    }

    #[test]
    fn test_command_exists_for_missing_binary() {
        assert!(!command_exists("scenecast-definitely-not-a-binary"));
    }
}

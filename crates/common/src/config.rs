//! Engine configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{SceneError, SceneResult};

/// Global engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Drawing surface settings.
    pub canvas: CanvasConfig,

    /// Playback defaults.
    pub playback: PlaybackDefaults,

    /// Pointer interaction tunables.
    pub interaction: InteractionConfig,

    /// Export defaults.
    pub export: ExportDefaults,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Drawing surface settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasConfig {
    /// Surface width in pixels.
    pub width: u32,

    /// Surface height in pixels.
    pub height: u32,

    /// Background color as hex string (for example `#0f172a`).
    pub background: String,

    /// Optional TTF/OTF file used for glyph rasterization and metrics.
    /// Without one, text uses fixed-advance block glyphs.
    pub font_path: Option<PathBuf>,
}

/// Playback defaults applied to a fresh engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackDefaults {
    /// Scene-wide duration in milliseconds.
    pub total_duration_ms: f64,

    /// Whether playback loops back to 0 at the end.
    pub looping: bool,

    /// Arrow-key seek step in milliseconds.
    pub seek_step_ms: f64,
}

/// Pointer interaction tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InteractionConfig {
    /// Side length of the square corner handles, in pixels.
    pub handle_size: f64,

    /// Minimum width/height an object can be resized to.
    pub min_object_size: f64,

    /// Offset applied to both axes when duplicating an object.
    pub clone_offset: f64,
}

/// Container produced by the offline frame encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ContainerFormat {
    #[default]
    Mp4,
    Mov,
}

impl ContainerFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::Mov => "mov",
        }
    }
}

/// Export defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportDefaults {
    /// Output frame rate.
    pub fps: f64,

    /// Video bitrate in kbps (0 = encoder default).
    pub bitrate_kbps: u32,

    /// Container for the offline encoder.
    pub format: ContainerFormat,

    /// Upper bound on `ENCODE_FRAME` messages awaiting consumption.
    pub max_in_flight_frames: usize,

    /// Attempts made while waiting for the finalized buffer.
    pub finalize_attempts: u32,

    /// Delay between finalize attempts in milliseconds.
    pub finalize_delay_ms: u64,

    /// Longest wait for any single worker reply, in milliseconds.
    pub reply_timeout_ms: u64,

    /// Pause after each live-export frame so the recorder can drain.
    pub frame_yield_ms: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "scenecast=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            background: "#0f172a".to_string(),
            font_path: None,
        }
    }
}

impl Default for PlaybackDefaults {
    fn default() -> Self {
        Self {
            total_duration_ms: 5000.0,
            looping: false,
            seek_step_ms: 100.0,
        }
    }
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            handle_size: 10.0,
            min_object_size: 20.0,
            clone_offset: 20.0,
        }
    }
}

impl Default for ExportDefaults {
    fn default() -> Self {
        Self {
            fps: 30.0,
            bitrate_kbps: 5000,
            format: ContainerFormat::Mp4,
            max_in_flight_frames: 8,
            finalize_attempts: 50,
            finalize_delay_ms: 100,
            reply_timeout_ms: 30_000,
            frame_yield_ms: 0,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl EngineConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match std::fs::read_to_string(&config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Load config from an explicit path. Unlike [`EngineConfig::load`],
    /// read and parse failures are returned to the caller.
    pub fn load_from(path: impl AsRef<Path>) -> SceneResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SceneError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| SceneError::config(format!("Invalid config {}: {e}", path.display())))
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        let config_path = config_file_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }

    /// Check the parts of the configuration that engine construction depends on.
    pub fn validate(&self) -> SceneResult<()> {
        if self.canvas.width == 0 || self.canvas.height == 0 {
            return Err(SceneError::config(format!(
                "Drawing surface unavailable: {}x{} canvas",
                self.canvas.width, self.canvas.height
            )));
        }
        if !(self.export.fps > 0.0) {
            return Err(SceneError::config(format!(
                "Export fps must be positive, got {}",
                self.export.fps
            )));
        }
        if self.export.max_in_flight_frames == 0 {
            return Err(SceneError::config("max_in_flight_frames must be at least 1"));
        }
        if self.playback.total_duration_ms < 0.0 {
            return Err(SceneError::config("total_duration_ms cannot be negative"));
        }
        Ok(())
    }
}

/// Standard config file location.
fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("scenecast").join("config.json")
}

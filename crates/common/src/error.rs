//! Error types shared across Scenecast crates.

use std::path::PathBuf;

/// Top-level error type for Scenecast operations.
#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Render error: {message}")]
    Render { message: String },

    #[error("Asset error: {message} ({path})")]
    Asset { message: String, path: PathBuf },

    #[error("Encoder session error: {message}")]
    EncoderSession { message: String },

    #[error("Encoder timed out after {attempts} attempts ({waited_ms} ms): {message}")]
    EncoderTimeout {
        message: String,
        attempts: u32,
        waited_ms: u64,
    },

    #[error("Export cancelled at frame {frame}")]
    Cancelled { frame: u64 },

    #[error("Unsupported operation: {message}")]
    Unsupported { message: String },

    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using SceneError.
pub type SceneResult<T> = Result<T, SceneError>;

impl SceneError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render {
            message: msg.into(),
        }
    }

    pub fn asset(msg: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::Asset {
            message: msg.into(),
            path: path.into(),
        }
    }

    pub fn encoder(msg: impl Into<String>) -> Self {
        Self::EncoderSession {
            message: msg.into(),
        }
    }

    pub fn encoder_timeout(msg: impl Into<String>, attempts: u32, waited_ms: u64) -> Self {
        Self::EncoderTimeout {
            message: msg.into(),
            attempts,
            waited_ms,
        }
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported {
            message: msg.into(),
        }
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: msg.into(),
        }
    }

    /// Whether this error came from the encoder retry budget running out
    /// rather than from the encoder itself reporting a failure.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::EncoderTimeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_is_distinguishable() {
        let timeout = SceneError::encoder_timeout("buffer never appeared", 50, 5000);
        let session = SceneError::encoder("muxer rejected frame");
        assert!(timeout.is_timeout());
        assert!(!session.is_timeout());
        assert!(timeout.to_string().contains("50 attempts"));
    }

    #[test]
    fn test_asset_error_display() {
        let err = SceneError::asset("decode failed", "/tmp/hero.png");
        assert!(err.to_string().contains("decode failed"));
        assert!(err.to_string().contains("/tmp/hero.png"));
    }
}

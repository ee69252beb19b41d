//! Error taxonomy for the composition pipeline.
//!
//! Structural problems (bad time ranges, a failed ffmpeg run) surface to the
//! caller; per-item problems (one bad color, one missing font) are recovered
//! with documented fallbacks at the call site and never reach this type.

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by the composition pipeline.
#[derive(Debug, Error)]
pub enum Error {
    /// A timestamp string did not match `HH:MM:SS,mmm`.
    #[error("malformed timestamp {input:?}: expected HH:MM:SS,mmm")]
    Format { input: String },

    /// A cue or trim range with `end <= start`.
    #[error("invalid time range: end ({end}s) must be after start ({start}s)")]
    InvalidRange { start: f64, end: f64 },

    /// A color string was not a 6-hex-digit value.
    #[error("malformed color {input:?}: expected 6 hex digits")]
    Encoding { input: String },

    /// ffmpeg exited non-zero. Carries the exit code and the tail of stderr.
    #[error("ffmpeg exited with code {code:?}: {stderr}")]
    Transcode { code: Option<i32>, stderr: String },

    /// ffprobe could not resolve a duration.
    #[error("could not probe duration of {}", path.display())]
    Probe { path: PathBuf },

    /// A font could not be loaded or parsed, and no fallback face exists.
    #[error("font error: {0}")]
    Font(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("image encoding failed: {0}")]
    Image(#[from] image::ImageError),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

//! `sear` - clip composition pipeline
//!
//! # Features
//!
//! - **Subtitle burn-in**: cue lists + one style to positioned ASS markup
//! - **Text overlays**: independently timed, rasterized to transparent PNG
//!   frames and composited onto the video
//! - **Background music**: volume-scaled mix under the primary track
//! - **Cancellable renders**: an in-flight ffmpeg run stops cleanly, with
//!   intermediate artifacts removed on every exit path
//!
//! # Example
//!
//! ```rust,no_run
//! use sear::{CompositionRequest, FontRegistry, RenderConfig, Renderer};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let request = CompositionRequest::new("clip.mp4", "out.mp4");
//!     let renderer = Renderer::new(RenderConfig::default())?;
//!     let outcome = renderer.render(&request, &FontRegistry::new()).await?;
//!     println!("{outcome:?}");
//!     Ok(())
//! }
//! ```

pub mod compose;
pub mod error;
pub mod timecode;
pub mod transcript;

pub use compose::{
    AssCompiler, BackgroundAudio, BoxStyle, CodecProfile, CompositionPlan, CompositionRequest,
    FilterGraph, FontRegistry, OverlayRasterizer, OverlaySource, OverlayStyle, QualityTier,
    RenderConfig, RenderControl, RenderOutcome, RenderProgress, Renderer, SubtitleCue,
    SubtitleStyle, TextOverlay,
};
pub use error::{Error, Result};
pub use timecode::TimeWindow;
pub use transcript::{Highlight, Transcript};

/// Version of sear
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

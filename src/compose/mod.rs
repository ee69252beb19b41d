//! Clip composition pipeline.
//!
//! Takes a source video plus timed text annotations and produces a single
//! re-encoded output clip with everything burned in.
//!
//! # Components
//!
//! - **Markup compilation**: cues + style to a positioned ASS document
//! - **Overlay rasterization**: free-positioned text to transparent PNG
//!   frames with per-frame time-window activation
//! - **Filter-graph assembly**: typed ffmpeg stages decided once per render
//! - **Render driving**: process control, progress, cancellation, cleanup
//!
//! # Example
//!
//! ```rust,no_run
//! use sear::{CompositionRequest, FontRegistry, RenderConfig, Renderer, SubtitleCue};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut request = CompositionRequest::new("clip.mp4", "out.mp4");
//!     request.cues.push(SubtitleCue::new("00:00:00,000", "00:00:02,000", "Hello"));
//!
//!     let renderer = Renderer::new(RenderConfig::default())?;
//!     let fonts = FontRegistry::new();
//!     renderer.render(&request, &fonts).await?;
//!     Ok(())
//! }
//! ```

pub mod graph;
pub mod overlay;
pub mod plan;
pub mod raster;
pub mod render;
pub mod subtitle;

pub use graph::{AudioStage, FilterGraph, VideoStage};
pub use overlay::{compile_overlay_document, OverlayStyle, TextOverlay};
pub use plan::{
    BackgroundAudio, CodecProfile, CompositionPlan, CompositionRequest, OverlaySource, QualityTier,
};
pub use raster::{FontRegistry, OverlayRasterizer};
pub use render::{
    RenderConfig, RenderControl, RenderOutcome, RenderProgress, Renderer,
};
pub use subtitle::{AssCompiler, BoxStyle, SubtitleCue, SubtitleStyle};

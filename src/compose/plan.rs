//! Composition requests and the plan derived from them.
//!
//! A [`CompositionRequest`] is the unit of work for one render. The branch
//! decisions it implies (burn subtitles? composite an overlay image or a
//! frame sequence? mix background audio?) are computed exactly once into a
//! [`CompositionPlan`] and threaded through the pipeline, so no component
//! re-derives them.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::compose::overlay::TextOverlay;
use crate::compose::subtitle::{SubtitleCue, SubtitleStyle};

/// Target codec family for the output container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecProfile {
    /// H.264 video with AAC audio (mp4).
    #[default]
    H264,
    /// VP9 video with Opus audio (webm).
    Vp9,
}

impl CodecProfile {
    #[must_use]
    pub fn video_codec(&self) -> &'static str {
        match self {
            Self::H264 => "libx264",
            Self::Vp9 => "libvpx-vp9",
        }
    }

    #[must_use]
    pub fn audio_codec(&self) -> &'static str {
        match self {
            Self::H264 => "aac",
            Self::Vp9 => "libopus",
        }
    }

    /// Constant-quality value for a tier, scaled per codec family.
    #[must_use]
    pub fn crf(&self, tier: QualityTier) -> u32 {
        match (self, tier) {
            (Self::H264, QualityTier::Low) => 28,
            (Self::H264, QualityTier::Medium) => 23,
            (Self::H264, QualityTier::High) => 18,
            (Self::Vp9, QualityTier::Low) => 35,
            (Self::Vp9, QualityTier::Medium) => 31,
            (Self::Vp9, QualityTier::High) => 24,
        }
    }
}

/// Encoder effort/quality tier, mapped to concrete values per codec family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    Low,
    #[default]
    Medium,
    High,
}

impl QualityTier {
    /// x264/x265-style preset name.
    #[must_use]
    pub fn preset(&self) -> &'static str {
        match self {
            Self::Low => "veryfast",
            Self::Medium => "medium",
            Self::High => "slow",
        }
    }
}

/// Background music track mixed under the primary audio.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackgroundAudio {
    pub path: PathBuf,
    /// Volume, 0-100; clamped at graph-build time.
    pub volume: u8,
}

fn default_width() -> u32 {
    1920
}
fn default_height() -> u32 {
    1080
}
fn default_fps() -> u32 {
    30
}

/// Everything one render needs. Created fresh per call; never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositionRequest {
    pub source: PathBuf,
    pub output: PathBuf,
    #[serde(default)]
    pub cues: Vec<SubtitleCue>,
    #[serde(default)]
    pub style: Option<SubtitleStyle>,
    #[serde(default)]
    pub overlays: Vec<TextOverlay>,
    #[serde(default)]
    pub background_audio: Option<BackgroundAudio>,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_fps")]
    pub fps: u32,
    #[serde(default)]
    pub codec: CodecProfile,
    #[serde(default)]
    pub quality: QualityTier,
}

impl CompositionRequest {
    #[must_use]
    pub fn new(source: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            output: output.into(),
            cues: Vec::new(),
            style: None,
            overlays: Vec::new(),
            background_audio: None,
            width: default_width(),
            height: default_height(),
            fps: default_fps(),
            codec: CodecProfile::default(),
            quality: QualityTier::default(),
        }
    }
}

/// How overlay pixels reach the transcoder, if at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlaySource {
    None,
    /// One transparent image, looped for the full duration.
    StaticImage,
    /// A numbered frame sequence at the output frame rate.
    FrameSequence,
}

/// The branch decisions for one render, computed once from the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositionPlan {
    pub burn_subtitles: bool,
    pub overlay: OverlaySource,
    pub mix_audio: bool,
    /// ffmpeg input index of the overlay image/sequence, when present.
    pub overlay_input: Option<usize>,
    /// ffmpeg input index of the background audio track, when present.
    pub audio_input: Option<usize>,
}

impl CompositionPlan {
    /// Derive the plan. Input indices follow declaration order: the source
    /// video is always input 0, the overlay (if any) comes next, background
    /// audio last.
    #[must_use]
    pub fn from_request(request: &CompositionRequest) -> Self {
        let burn_subtitles = !request.cues.is_empty();

        let overlay = if request.overlays.is_empty() {
            OverlaySource::None
        } else if request.overlays.iter().all(TextOverlay::is_static) {
            OverlaySource::StaticImage
        } else {
            // Any timed overlay forces the sequence path for the whole set.
            OverlaySource::FrameSequence
        };

        let overlay_input = (overlay != OverlaySource::None).then_some(1);
        let audio_input = request
            .background_audio
            .as_ref()
            .map(|_| if overlay_input.is_some() { 2 } else { 1 });

        Self {
            burn_subtitles,
            overlay,
            mix_audio: audio_input.is_some(),
            overlay_input,
            audio_input,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CompositionRequest {
        CompositionRequest::new("in.mp4", "out.mp4")
    }

    fn cue() -> SubtitleCue {
        SubtitleCue::new("00:00:00,000", "00:00:01,000", "hi")
    }

    #[test]
    fn bare_request_plans_passthrough() {
        let plan = CompositionPlan::from_request(&request());
        assert!(!plan.burn_subtitles);
        assert_eq!(plan.overlay, OverlaySource::None);
        assert!(!plan.mix_audio);
        assert_eq!(plan.overlay_input, None);
        assert_eq!(plan.audio_input, None);
    }

    #[test]
    fn cues_enable_burn_in() {
        let mut req = request();
        req.cues.push(cue());
        let plan = CompositionPlan::from_request(&req);
        assert!(plan.burn_subtitles);
        assert_eq!(plan.overlay, OverlaySource::None);
    }

    #[test]
    fn all_static_overlays_use_single_image() {
        let mut req = request();
        req.overlays.push(TextOverlay::new("a", (10.0, 10.0)));
        req.overlays.push(TextOverlay::new("b", (90.0, 90.0)));
        let plan = CompositionPlan::from_request(&req);
        assert_eq!(plan.overlay, OverlaySource::StaticImage);
        assert_eq!(plan.overlay_input, Some(1));
    }

    #[test]
    fn any_timed_overlay_forces_sequence() {
        let mut req = request();
        req.overlays.push(TextOverlay::new("static", (10.0, 10.0)));
        req.overlays
            .push(TextOverlay::new("timed", (50.0, 50.0)).with_timing(2.0, 4.0));
        let plan = CompositionPlan::from_request(&req);
        assert_eq!(plan.overlay, OverlaySource::FrameSequence);
    }

    #[test]
    fn input_indices_follow_declaration_order() {
        let mut req = request();
        req.cues.push(cue());
        req.overlays.push(TextOverlay::new("a", (10.0, 10.0)));
        req.background_audio = Some(BackgroundAudio {
            path: "music.mp3".into(),
            volume: 40,
        });
        let plan = CompositionPlan::from_request(&req);
        assert_eq!(plan.overlay_input, Some(1));
        assert_eq!(plan.audio_input, Some(2));

        // Without an overlay, audio moves up to input 1.
        let mut req = request();
        req.background_audio = Some(BackgroundAudio {
            path: "music.mp3".into(),
            volume: 40,
        });
        let plan = CompositionPlan::from_request(&req);
        assert_eq!(plan.overlay_input, None);
        assert_eq!(plan.audio_input, Some(1));
    }

    #[test]
    fn quality_maps_per_codec_family() {
        assert_eq!(CodecProfile::H264.crf(QualityTier::High), 18);
        assert_eq!(CodecProfile::H264.crf(QualityTier::Low), 28);
        assert_eq!(CodecProfile::Vp9.crf(QualityTier::Medium), 31);
        assert_eq!(CodecProfile::H264.video_codec(), "libx264");
        assert_eq!(CodecProfile::Vp9.audio_codec(), "libopus");
    }

    #[test]
    fn request_deserializes_with_defaults() {
        let req: CompositionRequest =
            serde_json::from_str(r#"{"source": "a.mp4", "output": "b.mp4"}"#).unwrap();
        assert_eq!(req.width, 1920);
        assert_eq!(req.height, 1080);
        assert_eq!(req.fps, 30);
        assert_eq!(req.codec, CodecProfile::H264);
        assert_eq!(req.quality, QualityTier::Medium);
        assert!(req.cues.is_empty());
    }
}

//! Free-positioned text overlays.
//!
//! Overlays are independent of subtitle cues: each carries its own style,
//! position, and optional time window. Array order is paint order: later
//! overlays draw on top. Two consumers exist: the rasterizer (pixel output)
//! and the markup entry point below (ASS events with inline overrides).

use std::fmt::Write as FmtWrite;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::compose::subtitle::{
    anchor_pixels, ass_alpha, escape_event_text, parse_hex_rgb, AssCompiler,
};
use crate::error::Result;
use crate::timecode::{ass_time_from_centis, centis_from_seconds, TimeWindow};

/// Per-overlay style. Unlike [`super::subtitle::SubtitleStyle`] there is no
/// shared document style; every overlay embeds its own overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayStyle {
    pub font_family: String,
    pub font_size: u32,
    /// Fill color as `#RRGGBB`.
    pub color: String,
    pub stroke_color: Option<String>,
    pub stroke_width: f32,
    /// Opacity, 0-100.
    pub opacity: u8,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            font_family: "Arial".to_string(),
            font_size: 64,
            color: "#FFFFFF".to_string(),
            stroke_color: None,
            stroke_width: 0.0,
            opacity: 100,
            bold: false,
            italic: false,
            underline: false,
        }
    }
}

/// A freely positioned, independently timed text element.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextOverlay {
    pub text: String,
    /// Anchor as percentages of canvas width/height.
    pub position: (f32, f32),
    #[serde(default)]
    pub style: OverlayStyle,
    /// Absent timing means the overlay is static: visible for the whole
    /// output duration.
    #[serde(default)]
    pub timing: Option<TimeWindow>,
}

impl TextOverlay {
    #[must_use]
    pub fn new(text: impl Into<String>, position: (f32, f32)) -> Self {
        Self {
            text: text.into(),
            position,
            style: OverlayStyle::default(),
            timing: None,
        }
    }

    #[must_use]
    pub fn with_style(mut self, style: OverlayStyle) -> Self {
        self.style = style;
        self
    }

    #[must_use]
    pub fn with_timing(mut self, start: f64, end: f64) -> Self {
        self.timing = Some(TimeWindow::new(start, end));
        self
    }

    /// Whether the overlay has no time window at all.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.timing.is_none()
    }

    /// The overlay's window, open on both ends when no timing was given.
    #[must_use]
    pub fn window(&self) -> TimeWindow {
        self.timing.unwrap_or_default()
    }
}

/// Inline ASS color tag value: `&HBBGGRR&` (no alpha byte).
///
/// Malformed colors follow the same fallback policy as the cue compiler:
/// warn and render opaque white.
fn inline_color(hex: &str) -> String {
    match parse_hex_rgb(hex) {
        Ok((r, g, b)) => format!("&H{b:02X}{g:02X}{r:02X}&"),
        Err(_) => {
            warn!("malformed overlay color {hex:?}, falling back to white");
            "&HFFFFFF&".to_string()
        }
    }
}

/// Compile overlays into a standalone ASS document.
///
/// Each event carries its full style inline (`\pos`, `\fs`, `\fn`, colors,
/// border, flags); overlays without an explicit end run until `default_end`
/// (typically the source video's total duration).
pub fn compile_overlay_document(
    overlays: &[TextOverlay],
    width: u32,
    height: u32,
    default_end: f64,
) -> Result<String> {
    let compiler = AssCompiler::new(width, height).with_title("sear overlays");
    // Events are fully self-styled; the declared style only anchors the
    // format table.
    let base_style = "Style: Overlay,Arial,64,&H00FFFFFF,&H000000FF,&H00000000,&H00000000,\
                      0,0,0,0,100,100,0,0,1,0,0,5,0,0,0,1";
    let mut doc = compiler.header(base_style);

    for overlay in overlays {
        let window = overlay.window();
        let start = window.start.unwrap_or(0.0);
        let end = window.end.unwrap_or(default_end);

        let start_cs = centis_from_seconds(start);
        let mut end_cs = centis_from_seconds(end);
        if end_cs <= start_cs {
            end_cs = start_cs + 1;
        }

        writeln!(
            doc,
            "Dialogue: 0,{},{},Overlay,,0,0,0,,{{{}}}{}",
            ass_time_from_centis(start_cs),
            ass_time_from_centis(end_cs),
            override_tags(overlay, width, height),
            escape_event_text(&overlay.text),
        )
        .expect("writing to String cannot fail");
    }

    Ok(doc)
}

/// Build the inline override block for one overlay event.
fn override_tags(overlay: &TextOverlay, width: u32, height: u32) -> String {
    let style = &overlay.style;
    let (x, y) = anchor_pixels(overlay.position, width, height);

    let mut tags = format!(
        "\\an5\\pos({x},{y})\\fn{}\\fs{}\\c{}",
        style.font_family,
        style.font_size,
        inline_color(&style.color),
    );
    if style.opacity < 100 {
        let alpha = ass_alpha(style.opacity);
        let _ = write!(tags, "\\alpha&H{alpha:02X}&");
    }
    if let Some(ref stroke) = style.stroke_color {
        let _ = write!(tags, "\\3c{}", inline_color(stroke));
    }
    if style.stroke_width > 0.0 {
        let _ = write!(tags, "\\bord{}", style.stroke_width);
    }
    if style.bold {
        tags.push_str("\\b1");
    }
    if style.italic {
        tags.push_str("\\i1");
    }
    if style.underline {
        tags.push_str("\\u1");
    }
    tags
}

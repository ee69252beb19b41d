//! Styled-subtitle markup compilation.
//!
//! Turns an ordered cue list plus one style descriptor into a complete ASS
//! document: a header declaring the canvas resolution and a single named
//! style, then one positioned `Dialogue:` event per cue. Positions come in as
//! percentages of the canvas and are mapped to pixels here, once.

use std::fmt::Write as FmtWrite;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Error, Result};
use crate::timecode::{
    ass_time_from_centis, centis_from_seconds, duration_seconds, parse_subtitle_time,
};

/// Name of the single style an ASS document declares for cue rendering.
pub const CUE_STYLE_NAME: &str = "Caption";

/// Fallback used when a color string fails to parse: fully opaque white.
const FALLBACK_COLOR: &str = "&H00FFFFFF";

/// A single timed subtitle line.
///
/// Timestamps are stored in subtitle-file form (`HH:MM:SS,mmm`) and converted
/// on demand; intermediate storage never loses millisecond precision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubtitleCue {
    pub start: String,
    pub end: String,
    pub text: String,
}

impl SubtitleCue {
    #[must_use]
    pub fn new(start: impl Into<String>, end: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
            text: text.into(),
        }
    }
}

/// Optional background box behind subtitle text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoxStyle {
    pub enabled: bool,
    /// Box color as `#RRGGBB`.
    pub color: String,
    /// Box opacity, 0-100.
    pub opacity: u8,
    pub corner_radius: u32,
    pub padding: u32,
}

impl Default for BoxStyle {
    fn default() -> Self {
        Self {
            enabled: false,
            color: "#000000".to_string(),
            opacity: 60,
            corner_radius: 0,
            padding: 10,
        }
    }
}

/// Style descriptor applied uniformly to every cue in one render.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SubtitleStyle {
    pub font_family: String,
    pub font_size: u32,
    /// Fill color as `#RRGGBB`.
    pub fill_color: String,
    /// Stroke color as `#RRGGBB`.
    pub stroke_color: String,
    pub stroke_width: f32,
    pub background: BoxStyle,
    /// Overall opacity, 0-100.
    pub opacity: u8,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    /// Anchor as percentages of canvas width/height; `(50, 50)` is centered.
    pub position: (f32, f32),
}

impl Default for SubtitleStyle {
    fn default() -> Self {
        Self {
            font_family: "Arial".to_string(),
            font_size: 48,
            fill_color: "#FFFFFF".to_string(),
            stroke_color: "#000000".to_string(),
            stroke_width: 2.0,
            background: BoxStyle::default(),
            opacity: 100,
            bold: false,
            italic: false,
            underline: false,
            position: (50.0, 90.0),
        }
    }
}

/// Parse a `#RRGGBB` (or bare `RRGGBB`) color string.
pub fn parse_hex_rgb(value: &str) -> Result<(u8, u8, u8)> {
    let normalized = value.trim().trim_start_matches('#');
    if normalized.len() != 6 || !normalized.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(Error::Encoding {
            input: value.to_string(),
        });
    }
    let r = u8::from_str_radix(&normalized[0..2], 16).expect("validated hex");
    let g = u8::from_str_radix(&normalized[2..4], 16).expect("validated hex");
    let b = u8::from_str_radix(&normalized[4..6], 16).expect("validated hex");
    Ok((r, g, b))
}

/// Encode a hex color plus an opacity percentage as an ASS `&HAABBGGRR` value.
///
/// Byte order is reversed (blue, green, red) and prefixed with an alpha byte
/// of `round((100 - opacity) / 100 * 255)`; alpha `00` is fully opaque.
pub fn encode_ass_color(hex: &str, opacity_percent: u8) -> Result<String> {
    let (r, g, b) = parse_hex_rgb(hex)?;
    let alpha = ass_alpha(opacity_percent);
    Ok(format!("&H{alpha:02X}{b:02X}{g:02X}{r:02X}"))
}

/// Alpha byte for an opacity percentage (0 = fully opaque in ASS).
#[must_use]
pub fn ass_alpha(opacity_percent: u8) -> u8 {
    let opacity = f32::from(opacity_percent.min(100));
    ((100.0 - opacity) / 100.0 * 255.0).round() as u8
}

/// [`encode_ass_color`] with the documented fallback: a malformed color logs
/// a warning and renders as opaque white instead of failing the whole render.
#[must_use]
pub fn encode_ass_color_or_default(hex: &str, opacity_percent: u8) -> String {
    match encode_ass_color(hex, opacity_percent) {
        Ok(encoded) => encoded,
        Err(_) => {
            warn!("malformed color {hex:?}, falling back to opaque white");
            FALLBACK_COLOR.to_string()
        }
    }
}

/// Map a percentage anchor to integer pixel coordinates on the canvas.
#[must_use]
pub fn anchor_pixels(percent: (f32, f32), width: u32, height: u32) -> (i32, i32) {
    let x = (percent.0 / 100.0 * width as f32).round() as i32;
    let y = (percent.1 / 100.0 * height as f32).round() as i32;
    (x, y)
}

/// Escape cue text for use in an ASS event.
///
/// Backslashes are doubled, braces become parentheses (ASS reserves braces
/// for inline overrides), and line breaks become the explicit `\N` marker.
#[must_use]
pub fn escape_event_text(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('{', "(")
        .replace('}', ")")
        .replace("\r\n", "\\N")
        .replace('\n', "\\N")
}

/// ASS document compiler for one canvas size.
#[derive(Debug, Clone)]
pub struct AssCompiler {
    pub play_res_x: u32,
    pub play_res_y: u32,
    pub title: String,
}

impl AssCompiler {
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            play_res_x: width,
            play_res_y: height,
            title: "sear captions".to_string(),
        }
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Compile a cue list and a single style into a complete ASS document.
    ///
    /// Events are emitted in input order, each carrying an absolute `\pos`
    /// override so per-item positioning works the same for cues and overlays.
    /// When centisecond rounding would collapse a cue to zero duration, the
    /// event end is bumped one centisecond so `end > start` always holds in
    /// the emitted document.
    pub fn compile(&self, cues: &[SubtitleCue], style: &SubtitleStyle) -> Result<String> {
        let mut doc = self.header(&self.style_line(style));
        let (x, y) = anchor_pixels(style.position, self.play_res_x, self.play_res_y);

        for cue in cues {
            let start = parse_subtitle_time(&cue.start)?;
            let end = parse_subtitle_time(&cue.end)?;
            duration_seconds(start, end)?;

            let start_cs = centis_from_seconds(start);
            let mut end_cs = centis_from_seconds(end);
            if end_cs <= start_cs {
                end_cs = start_cs + 1;
            }

            writeln!(
                doc,
                "Dialogue: 0,{},{},{CUE_STYLE_NAME},,0,0,0,,{{\\pos({x},{y})}}{}",
                ass_time_from_centis(start_cs),
                ass_time_from_centis(end_cs),
                escape_event_text(&cue.text),
            )
            .expect("writing to String cannot fail");
        }

        Ok(doc)
    }

    /// ASS header: script info, the style table, and the events format line.
    pub(crate) fn header(&self, style_line: &str) -> String {
        let mut header = String::new();
        let mut line = |s: &str| {
            header.push_str(s);
            header.push('\n');
        };

        line("[Script Info]");
        line(&format!("Title: {}", self.title));
        line("ScriptType: v4.00+");
        line(&format!("PlayResX: {}", self.play_res_x));
        line(&format!("PlayResY: {}", self.play_res_y));
        line("ScaledBorderAndShadow: yes");
        line("YCbCr Matrix: TV.709");
        line("");
        line("[V4+ Styles]");
        line(
            "Format: Name, Fontname, Fontsize, PrimaryColour, SecondaryColour, \
             OutlineColour, BackColour, Bold, Italic, Underline, StrikeOut, ScaleX, \
             ScaleY, Spacing, Angle, BorderStyle, Outline, Shadow, Alignment, \
             MarginL, MarginR, MarginV, Encoding",
        );
        line(style_line);
        line("");
        line("[Events]");
        line("Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text");
        header
    }

    /// Render the style table line for the cue style.
    ///
    /// An enabled background box selects BorderStyle 3 (opaque box behind the
    /// text) instead of the plain outline mode; the box color goes through the
    /// same hex+alpha conversion as the text colors.
    fn style_line(&self, style: &SubtitleStyle) -> String {
        let primary = encode_ass_color_or_default(&style.fill_color, style.opacity);
        let outline = encode_ass_color_or_default(&style.stroke_color, style.opacity);
        let (border_style, back) = if style.background.enabled {
            (
                3,
                encode_ass_color_or_default(&style.background.color, style.background.opacity),
            )
        } else {
            (1, "&H00000000".to_string())
        };

        format!(
            "Style: {CUE_STYLE_NAME},{},{},{primary},&H000000FF,{outline},{back},{},{},{},0,100,100,0,0,{border_style},{},0,5,0,0,0,1",
            style.font_family,
            style.font_size,
            if style.bold { -1 } else { 0 },
            if style.italic { -1 } else { 0 },
            if style.underline { -1 } else { 0 },
            style.stroke_width,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_color_alpha_and_byte_order() {
        // Opacity 100 -> alpha 00; opacity 0 -> alpha FF.
        assert_eq!(encode_ass_color("#FFFFFF", 100).unwrap(), "&H00FFFFFF");
        assert_eq!(encode_ass_color("#FFFFFF", 0).unwrap(), "&HFFFFFFFF");
        // Byte order is blue-green-red after the alpha prefix.
        assert_eq!(encode_ass_color("#FF8000", 100).unwrap(), "&H000080FF");
        assert_eq!(encode_ass_color("102030", 100).unwrap(), "&H00302010");
    }

    #[test]
    fn encode_color_intermediate_alpha_rounds() {
        // (100 - 50) / 100 * 255 = 127.5, rounds to 128 = 0x80.
        assert_eq!(encode_ass_color("#000000", 50).unwrap(), "&H80000000");
    }

    #[test]
    fn malformed_color_falls_back_to_opaque_white() {
        // One bad color must not abort a multi-cue render; the documented
        // fallback is opaque white.
        assert!(encode_ass_color("#GGGGGG", 100).is_err());
        assert!(encode_ass_color("#FFF", 100).is_err());
        assert_eq!(encode_ass_color_or_default("#GGGGGG", 100), "&H00FFFFFF");
        assert_eq!(encode_ass_color_or_default("not-a-color", 100), "&H00FFFFFF");
    }

    #[test]
    fn anchor_maps_percent_to_rounded_pixels() {
        assert_eq!(anchor_pixels((50.0, 50.0), 1920, 1080), (960, 540));
        assert_eq!(anchor_pixels((0.0, 100.0), 1920, 1080), (0, 1080));
        assert_eq!(anchor_pixels((33.333, 66.667), 300, 300), (100, 200));
    }

    #[test]
    fn event_text_escaping() {
        assert_eq!(escape_event_text("a\\b"), "a\\\\b");
        assert_eq!(escape_event_text("{tag}"), "(tag)");
        assert_eq!(escape_event_text("two\nlines"), "two\\Nlines");
        assert_eq!(escape_event_text("crlf\r\nline"), "crlf\\Nline");
    }

    #[test]
    fn compile_emits_one_event_per_cue_in_order() {
        let cues = vec![
            SubtitleCue::new("00:00:00,000", "00:00:05,000", "Hello"),
            SubtitleCue::new("00:00:05,000", "00:00:10,000", "World"),
            SubtitleCue::new("00:00:10,000", "00:00:10,050", "X"),
        ];
        let doc = AssCompiler::new(1920, 1080)
            .compile(&cues, &SubtitleStyle::default())
            .unwrap();

        assert!(doc.contains("[Script Info]"));
        assert!(doc.contains("PlayResX: 1920"));
        assert!(doc.contains("PlayResY: 1080"));
        // Exactly one declared style, referenced by all three events.
        assert_eq!(doc.matches("\nStyle: ").count(), 1);
        assert_eq!(doc.matches("Dialogue: ").count(), 3);
        assert_eq!(doc.matches(&format!(",{CUE_STYLE_NAME},")).count(), 3);

        let hello = doc.find("Hello").unwrap();
        let world = doc.find("World").unwrap();
        assert!(hello < world, "events must keep input order");
    }

    #[test]
    fn compile_keeps_sub_centisecond_cue_renderable() {
        // 50ms survives centisecond rounding on its own.
        let cues = vec![SubtitleCue::new("00:00:10,000", "00:00:10,050", "X")];
        let doc = AssCompiler::new(1920, 1080)
            .compile(&cues, &SubtitleStyle::default())
            .unwrap();
        assert!(doc.contains("0:00:10.00,0:00:10.05"));

        // 4ms collapses to the same centisecond; policy is to bump the end by
        // one centisecond rather than reject, so the event stays visible.
        let cues = vec![SubtitleCue::new("00:00:10,000", "00:00:10,004", "X")];
        let doc = AssCompiler::new(1920, 1080)
            .compile(&cues, &SubtitleStyle::default())
            .unwrap();
        assert!(doc.contains("0:00:10.00,0:00:10.01"));
    }

    #[test]
    fn compile_rejects_inverted_cues() {
        let cues = vec![SubtitleCue::new("00:00:05,000", "00:00:05,000", "X")];
        let err = AssCompiler::new(1920, 1080)
            .compile(&cues, &SubtitleStyle::default())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRange { .. }));
    }

    #[test]
    fn compile_positions_every_event() {
        let style = SubtitleStyle {
            position: (50.0, 90.0),
            ..SubtitleStyle::default()
        };
        let cues = vec![SubtitleCue::new("00:00:00,000", "00:00:01,000", "Hi")];
        let doc = AssCompiler::new(1920, 1080).compile(&cues, &style).unwrap();
        assert!(doc.contains("{\\pos(960,972)}"));
    }

    #[test]
    fn background_box_switches_border_style() {
        let mut style = SubtitleStyle::default();
        let doc = AssCompiler::new(1280, 720)
            .compile(&[SubtitleCue::new("00:00:00,000", "00:00:01,000", "A")], &style)
            .unwrap();
        let style_line = doc.lines().find(|l| l.starts_with("Style: ")).unwrap();
        assert!(style_line.contains(",1,"), "outline mode by default");

        style.background.enabled = true;
        style.background.color = "#202020".to_string();
        style.background.opacity = 40;
        let doc = AssCompiler::new(1280, 720)
            .compile(&[SubtitleCue::new("00:00:00,000", "00:00:01,000", "A")], &style)
            .unwrap();
        let style_line = doc.lines().find(|l| l.starts_with("Style: ")).unwrap();
        // Alpha for 40% opacity: (100-40)/100*255 = 153 = 0x99, BGR reversal.
        assert!(style_line.contains("&H99202020"));
    }
}

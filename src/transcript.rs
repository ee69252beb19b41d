//! Ingestion of transcription and clip-selection output.
//!
//! Both collaborators are black boxes; only their output shapes are consumed
//! here. Whisper-style JSON becomes subtitle cues, and clip-selector output
//! becomes validated time ranges, validated for well-formedness only
//! (parseable timestamps, `end > start`), never for semantic judgment.

use serde::{Deserialize, Serialize};

use crate::compose::subtitle::SubtitleCue;
use crate::error::{Error, Result};
use crate::timecode::{duration_seconds, format_subtitle_time, parse_subtitle_time};

/// Whisper-style transcription output.
#[derive(Debug, Clone, Deserialize)]
pub struct Transcript {
    #[serde(default)]
    pub text: String,
    pub segments: Vec<TranscriptSegment>,
    #[serde(default)]
    pub language: Option<String>,
}

/// One timed segment of transcribed speech, in seconds.
#[derive(Debug, Clone, Deserialize)]
pub struct TranscriptSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

impl Transcript {
    /// Parse transcription JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Convert segments to subtitle cues, dropping empty or inverted ones.
    ///
    /// Transcription engines occasionally emit zero-length or empty
    /// segments around silence; those are skipped, not errors.
    #[must_use]
    pub fn to_cues(&self) -> Vec<SubtitleCue> {
        self.segments
            .iter()
            .filter(|seg| seg.end > seg.start && !seg.text.trim().is_empty())
            .map(|seg| {
                SubtitleCue::new(
                    format_subtitle_time(seg.start),
                    format_subtitle_time(seg.end),
                    seg.text.trim(),
                )
            })
            .collect()
    }
}

/// A timestamp that arrives either as float seconds or subtitle-file form.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TimeField {
    Seconds(f64),
    Stamp(String),
}

impl TimeField {
    /// Resolve to seconds.
    pub fn to_seconds(&self) -> Result<f64> {
        match self {
            Self::Seconds(s) => Ok(*s),
            Self::Stamp(stamp) => parse_subtitle_time(stamp),
        }
    }
}

/// One candidate clip range from the clip selector, as received.
#[derive(Debug, Clone, Deserialize)]
pub struct RawHighlight {
    pub start: TimeField,
    pub end: TimeField,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

/// A validated candidate clip range in seconds.
#[derive(Debug, Clone, Serialize)]
pub struct Highlight {
    pub start: f64,
    pub end: f64,
    pub title: Option<String>,
    pub reason: Option<String>,
}

/// Parse and validate a clip-selector response (a JSON array of ranges).
///
/// Rejects unparseable timestamps and inverted ranges; everything else is
/// passed through untouched.
pub fn parse_highlights(json: &str) -> Result<Vec<Highlight>> {
    let raw: Vec<RawHighlight> = serde_json::from_str(json)?;
    raw.into_iter()
        .map(|h| {
            let start = h.start.to_seconds()?;
            let end = h.end.to_seconds()?;
            duration_seconds(start, end)?;
            Ok(Highlight {
                start,
                end,
                title: h.title,
                reason: h.reason,
            })
        })
        .collect()
}

/// Parse SRT content into cues.
///
/// Timestamps are validated through the time codec and re-emitted in
/// normalized form.
pub fn parse_srt(content: &str) -> Result<Vec<SubtitleCue>> {
    let mut cues = Vec::new();
    let mut lines = content.lines().peekable();

    while lines.peek().is_some() {
        while lines.peek().is_some_and(|l| l.trim().is_empty()) {
            lines.next();
        }
        let Some(seq_line) = lines.next() else { break };
        if seq_line.trim().parse::<u32>().is_err() {
            continue;
        }
        let Some(time_line) = lines.next() else { break };

        let (start_raw, end_raw) = time_line.split_once("-->").ok_or_else(|| Error::Format {
            input: time_line.to_string(),
        })?;
        let start = parse_subtitle_time(start_raw.trim())?;
        let end = parse_subtitle_time(end_raw.trim())?;

        let mut text_lines = Vec::new();
        while lines.peek().is_some_and(|l| !l.trim().is_empty()) {
            if let Some(line) = lines.next() {
                text_lines.push(line);
            }
        }

        cues.push(SubtitleCue::new(
            format_subtitle_time(start),
            format_subtitle_time(end),
            text_lines.join("\n"),
        ));
    }

    Ok(cues)
}

/// Emit cues as SRT content.
#[must_use]
pub fn to_srt(cues: &[SubtitleCue]) -> String {
    let mut out = String::new();
    for (i, cue) in cues.iter().enumerate() {
        out.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            i + 1,
            cue.start,
            cue.end,
            cue.text
        ));
    }
    out
}

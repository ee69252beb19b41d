//! Timestamp parsing, formatting, and window arithmetic.
//!
//! Three encodings travel through the pipeline: subtitle-file time
//! (`HH:MM:SS,mmm`), ASS event time (`H:MM:SS.cc`), and plain floating-point
//! seconds. All conversions go through this module; no other component
//! re-implements the arithmetic.
//!
//! Millisecond precision is preserved everywhere except the ASS boundary,
//! which truncates to centiseconds. That loss happens exactly once, at
//! markup emission.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Parse a subtitle-file timestamp (`HH:MM:SS,mmm`) into seconds.
///
/// Hours are at least two digits and may exceed 24 (pure elapsed time, not
/// wall-clock); minutes and seconds are exactly two digits and below 60;
/// milliseconds are exactly three digits.
pub fn parse_subtitle_time(input: &str) -> Result<f64> {
    let malformed = || Error::Format {
        input: input.to_string(),
    };

    let (hms, millis) = input.split_once(',').ok_or_else(malformed)?;
    let mut parts = hms.split(':');
    let (hours, minutes, seconds) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(h), Some(m), Some(s), None) => (h, m, s),
        _ => return Err(malformed()),
    };

    if hours.len() < 2 || minutes.len() != 2 || seconds.len() != 2 || millis.len() != 3 {
        return Err(malformed());
    }
    for field in [hours, minutes, seconds, millis] {
        if !field.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed());
        }
    }

    let hours: u64 = hours.parse().map_err(|_| malformed())?;
    let minutes: u64 = minutes.parse().map_err(|_| malformed())?;
    let seconds: u64 = seconds.parse().map_err(|_| malformed())?;
    let millis: u64 = millis.parse().map_err(|_| malformed())?;

    if minutes >= 60 || seconds >= 60 {
        return Err(malformed());
    }

    let total_ms = hours * 3_600_000 + minutes * 60_000 + seconds * 1000 + millis;
    Ok(total_ms as f64 / 1000.0)
}

/// Format seconds as a subtitle-file timestamp (`HH:MM:SS,mmm`).
///
/// Inverse of [`parse_subtitle_time`]; round-trips at millisecond precision.
#[must_use]
pub fn format_subtitle_time(seconds: f64) -> String {
    let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms % 3_600_000) / 60_000;
    let secs = (total_ms % 60_000) / 1000;
    let millis = total_ms % 1000;
    format!("{hours:02}:{minutes:02}:{secs:02},{millis:03}")
}

/// Total centiseconds in a seconds value, rounded.
///
/// Rounding at the centisecond level is what makes the `.99x -> carry`
/// case fall out naturally in [`ass_time_from_centis`].
#[must_use]
pub fn centis_from_seconds(seconds: f64) -> u64 {
    (seconds.max(0.0) * 100.0).round() as u64
}

/// Format a centisecond count as an ASS event timestamp (`H:MM:SS.cc`).
///
/// The hour field is not zero-padded; minutes, seconds, and centiseconds are
/// two-digit zero-padded. The centisecond field is always below 100 because
/// the input is a whole count, not a rounded fraction.
#[must_use]
pub fn ass_time_from_centis(total_cs: u64) -> String {
    let cs = total_cs % 100;
    let total_secs = total_cs / 100;
    let secs = total_secs % 60;
    let total_mins = total_secs / 60;
    let mins = total_mins % 60;
    let hours = total_mins / 60;
    format!("{hours}:{mins:02}:{secs:02}.{cs:02}")
}

/// Format seconds as an ASS event timestamp (`H:MM:SS.cc`).
#[must_use]
pub fn format_ass_time(seconds: f64) -> String {
    ass_time_from_centis(centis_from_seconds(seconds))
}

/// Duration between two points in seconds.
pub fn duration_seconds(start: f64, end: f64) -> Result<f64> {
    if end <= start {
        return Err(Error::InvalidRange { start, end });
    }
    Ok(end - start)
}

/// A time window with open ends: a missing start means "from zero", a missing
/// end means "until the caller-supplied default end".
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    #[serde(default)]
    pub start: Option<f64>,
    #[serde(default)]
    pub end: Option<f64>,
}

impl TimeWindow {
    /// Window covering `[start, end]`.
    #[must_use]
    pub fn new(start: f64, end: f64) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    /// Whether instant `t` falls inside the window, inclusive on both bounds.
    #[must_use]
    pub fn is_active_at(&self, default_end: f64, t: f64) -> bool {
        let start = self.start.unwrap_or(0.0);
        let end = self.end.unwrap_or(default_end);
        t >= start && t <= end
    }
}

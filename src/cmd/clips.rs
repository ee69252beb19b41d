use std::path::Path;

use anyhow::{Context, Result};

use sear::timecode::format_subtitle_time;
use sear::transcript::parse_highlights;

pub async fn run(file: &Path) -> Result<()> {
    let json = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;
    let highlights = parse_highlights(&json)?;

    eprintln!("🎯 {} candidate ranges", highlights.len());
    for (i, h) in highlights.iter().enumerate() {
        let title = h.title.as_deref().unwrap_or("(untitled)");
        println!(
            "{:>3}. {} -> {}  {title}",
            i + 1,
            format_subtitle_time(h.start),
            format_subtitle_time(h.end),
        );
        if let Some(reason) = &h.reason {
            println!("     {reason}");
        }
    }
    Ok(())
}

use std::process::Stdio;

use anyhow::Result;
use tokio::process::Command;

use sear::compose::raster::default_font;
use sear::{RenderConfig, Renderer};

pub async fn run() -> Result<()> {
    let config = RenderConfig::default();
    let renderer = Renderer::new(config.clone())?;

    let ffmpeg_ok = renderer.check_available().await;
    let ffprobe_ok = Command::new(&config.ffprobe_path)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map(|s| s.success())
        .unwrap_or(false);
    let font_ok = default_font().is_ok();

    let mark = |ok: bool| if ok { "✅" } else { "❌" };
    println!("{} ffmpeg   ({})", mark(ffmpeg_ok), config.ffmpeg_path);
    println!("{} ffprobe  ({})", mark(ffprobe_ok), config.ffprobe_path);
    println!("{} system default font", mark(font_ok));
    println!("   temp dir: {}", config.temp_dir.display());

    if !ffmpeg_ok || !ffprobe_ok {
        std::process::exit(1);
    }
    Ok(())
}

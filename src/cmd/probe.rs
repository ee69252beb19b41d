use std::path::Path;

use anyhow::Result;

use sear::{RenderConfig, Renderer};

pub async fn run(file: &Path) -> Result<()> {
    let renderer = Renderer::new(RenderConfig::default())?;
    let duration = renderer.probe_duration(file).await?;
    println!("{duration:.3}");
    Ok(())
}

use std::path::Path;

use anyhow::{bail, Context, Result};
use tokio::sync::{mpsc, watch};

use sear::{
    CompositionRequest, FontRegistry, RenderConfig, RenderControl, RenderOutcome, RenderProgress,
    Renderer,
};

pub async fn run(job: &Path, output: Option<&Path>, fonts: &[String]) -> Result<()> {
    let json = tokio::fs::read_to_string(job)
        .await
        .with_context(|| format!("failed to read job file {}", job.display()))?;
    let mut request: CompositionRequest =
        serde_json::from_str(&json).context("malformed composition job")?;
    if let Some(output) = output {
        request.output = output.to_path_buf();
    }

    let registry = FontRegistry::new();
    for spec in fonts {
        let Some((name, path)) = spec.split_once('=') else {
            bail!("font spec {spec:?} must be NAME=PATH");
        };
        // A bad font degrades to the system default face; it never blocks
        // the render.
        if let Err(e) = registry.register(name, Path::new(path)) {
            eprintln!("⚠️  {e}; falling back to system default font");
        }
    }

    let renderer = Renderer::new(RenderConfig::default())?;

    eprintln!("🎬 Rendering: {}", request.source.display());
    eprintln!("   Output: {}", request.output.display());
    eprintln!(
        "   Cues: {}, overlays: {}, background audio: {}",
        request.cues.len(),
        request.overlays.len(),
        request.background_audio.is_some()
    );

    // Ctrl-C stops the render; a stopped render is an outcome, not an error.
    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = cancel_tx.send(true);
        }
    });

    let (progress_tx, mut progress_rx) = mpsc::channel::<RenderProgress>(16);
    let reporter = tokio::spawn(async move {
        while let Some(progress) = progress_rx.recv().await {
            if let Some(percent) = progress.percent {
                eprint!("\r   {percent:>5.1}%  frame {} ({})", progress.frame, progress.speed);
            }
        }
        eprintln!();
    });

    let start = std::time::Instant::now();
    let outcome = renderer
        .render_with(
            &request,
            &registry,
            RenderControl {
                cancel: Some(cancel_rx),
                progress: Some(progress_tx),
            },
        )
        .await?;
    let _ = reporter.await;

    match outcome {
        RenderOutcome::Finished(path) => {
            eprintln!(
                "✅ Rendered {} in {:.1}s",
                path.display(),
                start.elapsed().as_secs_f64()
            );
        }
        RenderOutcome::Stopped => {
            eprintln!("🛑 Render stopped");
        }
    }

    Ok(())
}

//! End-to-end pipeline tests against a real ffmpeg.
//!
//! Skipped (with a note) when ffmpeg or a needed encoder is missing, so the
//! suite stays green on minimal machines; the full path runs wherever a
//! stock ffmpeg build is installed.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;
use tokio::sync::watch;

use sear::{
    BackgroundAudio, CompositionRequest, FontRegistry, RenderConfig, RenderControl, RenderOutcome,
    Renderer, SubtitleCue,
};

fn test_config(temp: &Path) -> RenderConfig {
    RenderConfig {
        temp_dir: temp.to_path_buf(),
        ..RenderConfig::default()
    }
}

async fn has_encoder(config: &RenderConfig, name: &str) -> bool {
    let Ok(out) = Command::new(&config.ffmpeg_path)
        .args(["-hide_banner", "-encoders"])
        .stderr(Stdio::null())
        .output()
        .await
    else {
        return false;
    };
    String::from_utf8_lossy(&out.stdout).contains(name)
}

/// Synthesize a short test clip (video + audio) with ffmpeg's lavfi sources.
async fn make_source(config: &RenderConfig, dir: &Path) -> Option<PathBuf> {
    let path = dir.join("source.mp4");
    let status = Command::new(&config.ffmpeg_path)
        .args([
            "-y",
            "-f",
            "lavfi",
            "-i",
            "testsrc=duration=1:size=320x240:rate=10",
            "-f",
            "lavfi",
            "-i",
            "sine=frequency=440:duration=1",
            "-c:v",
            "mpeg4",
            "-c:a",
            "aac",
            "-shortest",
        ])
        .arg(&path)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .ok()?;
    status.success().then_some(path)
}

fn temp_dir_is_empty(dir: &Path) -> bool {
    std::fs::read_dir(dir)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(true)
}

#[tokio::test]
async fn passthrough_render_produces_output_and_cleans_up() {
    let scratch = tempfile::tempdir().unwrap();
    let intermediates = scratch.path().join("intermediates");
    let config = test_config(&intermediates);
    let renderer = Renderer::new(config.clone()).unwrap();

    if !renderer.check_available().await || !has_encoder(&config, "libx264").await {
        eprintln!("skipping: ffmpeg with libx264 not available");
        return;
    }
    let Some(source) = make_source(&config, scratch.path()).await else {
        eprintln!("skipping: could not synthesize test clip");
        return;
    };

    let request = CompositionRequest::new(&source, scratch.path().join("out.mp4"));
    let outcome = renderer.render(&request, &FontRegistry::new()).await.unwrap();

    assert_eq!(outcome, RenderOutcome::Finished(request.output.clone()));
    assert!(request.output.exists());
    assert!(temp_dir_is_empty(&intermediates));

    let duration = renderer.probe_duration(&request.output).await.unwrap();
    assert!((0.5..2.0).contains(&duration), "duration {duration}");
}

#[tokio::test]
async fn background_audio_mix_renders() {
    let scratch = tempfile::tempdir().unwrap();
    let intermediates = scratch.path().join("intermediates");
    let config = test_config(&intermediates);
    let renderer = Renderer::new(config.clone()).unwrap();

    if !renderer.check_available().await || !has_encoder(&config, "libx264").await {
        eprintln!("skipping: ffmpeg with libx264 not available");
        return;
    }
    let Some(source) = make_source(&config, scratch.path()).await else {
        eprintln!("skipping: could not synthesize test clip");
        return;
    };

    // A second synthesized track, longer than the clip: output duration must
    // still be governed by the primary.
    let music = scratch.path().join("music.wav");
    let made = Command::new(&config.ffmpeg_path)
        .args([
            "-y",
            "-f",
            "lavfi",
            "-i",
            "sine=frequency=220:duration=5",
        ])
        .arg(&music)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map(|s| s.success())
        .unwrap_or(false);
    if !made {
        eprintln!("skipping: could not synthesize music track");
        return;
    }

    let mut request = CompositionRequest::new(&source, scratch.path().join("mixed.mp4"));
    request.background_audio = Some(BackgroundAudio {
        path: music,
        volume: 40,
    });
    let outcome = renderer.render(&request, &FontRegistry::new()).await.unwrap();

    assert!(matches!(outcome, RenderOutcome::Finished(_)));
    let duration = renderer.probe_duration(&request.output).await.unwrap();
    assert!(duration < 2.5, "primary governs duration, got {duration}");
}

#[tokio::test]
async fn cancelled_render_reports_stopped_and_cleans_up() {
    let scratch = tempfile::tempdir().unwrap();
    let intermediates = scratch.path().join("intermediates");
    let config = test_config(&intermediates);
    let renderer = Renderer::new(config.clone()).unwrap();

    if !renderer.check_available().await {
        eprintln!("skipping: ffmpeg not available");
        return;
    }

    // Cues force a markup intermediate onto disk before ffmpeg starts; the
    // stop must still remove it. The pre-flipped cancel makes the outcome
    // deterministic regardless of how fast ffmpeg runs.
    let mut request =
        CompositionRequest::new(scratch.path().join("missing.mp4"), scratch.path().join("out.mp4"));
    request
        .cues
        .push(SubtitleCue::new("00:00:00,000", "00:00:01,000", "hi"));

    let (cancel_tx, cancel_rx) = watch::channel(true);
    let outcome = renderer
        .render_with(
            &request,
            &FontRegistry::new(),
            RenderControl {
                cancel: Some(cancel_rx),
                progress: None,
            },
        )
        .await
        .unwrap();
    drop(cancel_tx);

    assert_eq!(outcome, RenderOutcome::Stopped);
    assert!(temp_dir_is_empty(&intermediates));
}

//! Render driving: ffmpeg/ffprobe invocation, progress, cancellation,
//! and unconditional cleanup of intermediate artifacts.
//!
//! The renderer owns no per-render state; distinct renders with distinct
//! output paths may run concurrently. Callers serialize requests per output
//! path; that is the only ordering concern.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use once_cell::sync::Lazy;
use regex::Regex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{ChildStdout, Command};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::compose::graph::{FilterGraph, AUDIO_OUT, VIDEO_OUT};
use crate::compose::plan::{CodecProfile, CompositionPlan, CompositionRequest, OverlaySource};
use crate::compose::raster::{frame_pattern, FontRegistry, OverlayRasterizer};
use crate::compose::subtitle::AssCompiler;
use crate::error::{Error, Result};

/// Duration used when the probe fails; the render proceeds with a warning.
pub const FALLBACK_DURATION_SECS: f64 = 60.0;

static PROGRESS_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\w+)=(\S+)$").expect("static regex"));

/// Paths and scratch space for the external tools.
#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
    /// Directory for intermediate artifacts (markup, overlay images).
    pub temp_dir: PathBuf,
}

impl Default for RenderConfig {
    fn default() -> Self {
        let find = |name: &str| {
            which::which(name).map_or_else(|_| name.to_string(), |p| p.to_string_lossy().to_string())
        };
        Self {
            ffmpeg_path: find("ffmpeg"),
            ffprobe_path: find("ffprobe"),
            temp_dir: std::env::temp_dir().join("sear"),
        }
    }
}

/// Progress snapshot parsed from ffmpeg's `-progress` stream.
#[derive(Debug, Clone, Default)]
pub struct RenderProgress {
    pub frame: u64,
    pub out_time_secs: f64,
    pub speed: String,
    /// Percent of the probed duration, when one was resolved.
    pub percent: Option<f64>,
}

/// How a render ended. Cancellation is an outcome, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOutcome {
    /// The output file was produced.
    Finished(PathBuf),
    /// The render was intentionally stopped mid-flight.
    Stopped,
}

/// Cancellation and progress hooks for one render call.
#[derive(Default)]
pub struct RenderControl {
    /// Flips to `true` to request termination.
    pub cancel: Option<watch::Receiver<bool>>,
    /// Receives progress snapshots while ffmpeg runs.
    pub progress: Option<mpsc::Sender<RenderProgress>>,
}

/// Intermediate on-disk artifacts for one render.
///
/// Deleted on every exit path (success, failure, or cancellation); a cleanup
/// failure is logged and never replaces the primary result.
#[derive(Default)]
struct Intermediates {
    markup: Option<PathBuf>,
    overlay_image: Option<PathBuf>,
    frame_dir: Option<PathBuf>,
}

impl Intermediates {
    async fn cleanup(&self) {
        for path in [&self.markup, &self.overlay_image].into_iter().flatten() {
            if let Err(e) = tokio::fs::remove_file(path).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!("failed to remove {}: {e}", path.display());
                }
            }
        }
        if let Some(dir) = &self.frame_dir {
            if let Err(e) = tokio::fs::remove_dir_all(dir).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!("failed to remove {}: {e}", dir.display());
                }
            }
        }
    }
}

enum OverlayInput {
    Image(PathBuf),
    Sequence(PathBuf),
}

/// Drives one composition request to a finished output file.
pub struct Renderer {
    config: RenderConfig,
}

impl Renderer {
    pub fn new(config: RenderConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.temp_dir)?;
        Ok(Self { config })
    }

    #[must_use]
    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Check whether ffmpeg responds.
    pub async fn check_available(&self) -> bool {
        Command::new(&self.config.ffmpeg_path)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    /// Resolve a media file's duration in seconds via ffprobe.
    pub async fn probe_duration(&self, path: &Path) -> Result<f64> {
        let out = Command::new(&self.config.ffprobe_path)
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(path)
            .output()
            .await?;

        if !out.status.success() {
            return Err(Error::Probe {
                path: path.to_path_buf(),
            });
        }
        String::from_utf8_lossy(&out.stdout)
            .trim()
            .parse::<f64>()
            .map_err(|_| Error::Probe {
                path: path.to_path_buf(),
            })
    }

    /// Render with default control (no cancellation, no progress sink).
    pub async fn render(
        &self,
        request: &CompositionRequest,
        fonts: &FontRegistry,
    ) -> Result<RenderOutcome> {
        self.render_with(request, fonts, RenderControl::default()).await
    }

    /// Render one composition request.
    pub async fn render_with(
        &self,
        request: &CompositionRequest,
        fonts: &FontRegistry,
        control: RenderControl,
    ) -> Result<RenderOutcome> {
        let plan = CompositionPlan::from_request(request);
        let duration = match self.probe_duration(&request.source).await {
            Ok(d) => d,
            Err(e) => {
                warn!("{e}; continuing with {FALLBACK_DURATION_SECS}s fallback duration");
                FALLBACK_DURATION_SECS
            }
        };

        let mut intermediates = Intermediates::default();
        let result = self
            .render_inner(request, &plan, duration, fonts, control, &mut intermediates)
            .await;
        intermediates.cleanup().await;
        result
    }

    async fn render_inner(
        &self,
        request: &CompositionRequest,
        plan: &CompositionPlan,
        duration: f64,
        fonts: &FontRegistry,
        control: RenderControl,
        intermediates: &mut Intermediates,
    ) -> Result<RenderOutcome> {
        let markup_path = if plan.burn_subtitles {
            let style = request.style.clone().unwrap_or_default();
            let doc = AssCompiler::new(request.width, request.height)
                .compile(&request.cues, &style)?;
            let path = self.scratch_path("ass");
            tokio::fs::write(&path, doc).await?;
            intermediates.markup = Some(path.clone());
            debug!("wrote subtitle markup {}", path.display());
            Some(path)
        } else {
            None
        };

        let overlay_input = match plan.overlay {
            OverlaySource::None => None,
            OverlaySource::StaticImage => {
                let path = self.scratch_path("png");
                let mut rasterizer =
                    OverlayRasterizer::new(fonts, request.width, request.height);
                rasterizer.render_static(&request.overlays, &path).await?;
                intermediates.overlay_image = Some(path.clone());
                Some(OverlayInput::Image(path))
            }
            OverlaySource::FrameSequence => {
                let dir = self.scratch_path("frames");
                tokio::fs::create_dir_all(&dir).await?;
                intermediates.frame_dir = Some(dir.clone());
                let mut rasterizer =
                    OverlayRasterizer::new(fonts, request.width, request.height);
                let report = |done: usize, total: usize, pct: f32| {
                    debug!("rasterized {done}/{total} overlay frames ({pct:.0}%)");
                };
                rasterizer
                    .render_sequence(&request.overlays, duration, request.fps, &dir, Some(&report))
                    .await?;
                Some(OverlayInput::Sequence(dir))
            }
        };

        let volume = request.background_audio.as_ref().map_or(100, |a| a.volume);
        let graph = FilterGraph::from_plan(plan, markup_path.as_deref(), volume);
        let args = build_args(request, duration, overlay_input.as_ref(), &graph);
        debug!("ffmpeg args: {args:?}");

        let mut child = Command::new(&self.config.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        if let Some(stdout) = child.stdout.take() {
            let sink = control.progress.clone();
            tokio::spawn(pump_progress(stdout, duration, sink));
        }

        let stderr_task: Option<JoinHandle<Vec<String>>> = child.stderr.take().map(|stderr| {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                let mut collected = Vec::new();
                while let Ok(Some(line)) = lines.next_line().await {
                    collected.push(line);
                }
                collected
            })
        });

        let status = match control.cancel {
            Some(mut cancel) => loop {
                if *cancel.borrow_and_update() {
                    info!("stop requested, terminating transcoder");
                    let _ = child.start_kill();
                    let _ = child.wait().await;
                    return Ok(RenderOutcome::Stopped);
                }
                tokio::select! {
                    status = child.wait() => break status?,
                    changed = cancel.changed() => {
                        if changed.is_err() {
                            // Requester went away; run to completion.
                            break child.wait().await?;
                        }
                    }
                }
            },
            None => child.wait().await?,
        };

        // A signal-terminated child is an intentional stop, not a failure.
        let Some(code) = status.code() else {
            info!("transcoder terminated by signal");
            return Ok(RenderOutcome::Stopped);
        };

        if code != 0 {
            let stderr = match stderr_task {
                Some(task) => stderr_tail(&task.await.unwrap_or_default()),
                None => String::new(),
            };
            return Err(Error::Transcode {
                code: Some(code),
                stderr,
            });
        }

        info!("rendered {}", request.output.display());
        Ok(RenderOutcome::Finished(request.output.clone()))
    }

    fn scratch_path(&self, suffix: &str) -> PathBuf {
        self.config
            .temp_dir
            .join(format!("{}.{suffix}", uuid::Uuid::new_v4()))
    }
}

/// Assemble the full ffmpeg argument list for one render.
fn build_args(
    request: &CompositionRequest,
    duration: f64,
    overlay: Option<&OverlayInput>,
    graph: &FilterGraph,
) -> Vec<String> {
    let mut args: Vec<String> = [
        "-hide_banner",
        "-loglevel",
        "error",
        "-nostdin",
        "-progress",
        "pipe:1",
        "-y",
    ]
    .iter()
    .map(ToString::to_string)
    .collect();

    args.push("-i".to_string());
    args.push(request.source.to_string_lossy().to_string());

    match overlay {
        Some(OverlayInput::Image(path)) => {
            // Loop the still for the clip's duration so overlay has frames
            // to composite across the whole output.
            args.extend([
                "-loop".to_string(),
                "1".to_string(),
                "-t".to_string(),
                format!("{duration:.3}"),
                "-i".to_string(),
                path.to_string_lossy().to_string(),
            ]);
        }
        Some(OverlayInput::Sequence(dir)) => {
            args.extend([
                "-framerate".to_string(),
                request.fps.to_string(),
                "-i".to_string(),
                frame_pattern(dir),
            ]);
        }
        None => {}
    }

    if let Some(bg) = &request.background_audio {
        args.push("-i".to_string());
        args.push(bg.path.to_string_lossy().to_string());
    }

    args.push("-filter_complex".to_string());
    args.push(graph.serialize());

    args.push("-map".to_string());
    args.push(VIDEO_OUT.to_string());
    args.push("-map".to_string());
    if graph.mixes_audio() {
        args.push(AUDIO_OUT.to_string());
    } else {
        args.push("0:a?".to_string());
    }

    args.push("-c:v".to_string());
    args.push(request.codec.video_codec().to_string());
    let crf = request.codec.crf(request.quality);
    match request.codec {
        CodecProfile::H264 => {
            args.extend([
                "-preset".to_string(),
                request.quality.preset().to_string(),
                "-crf".to_string(),
                crf.to_string(),
                "-movflags".to_string(),
                "+faststart".to_string(),
            ]);
        }
        CodecProfile::Vp9 => {
            args.extend([
                "-crf".to_string(),
                crf.to_string(),
                "-b:v".to_string(),
                "0".to_string(),
            ]);
        }
    }
    args.push("-c:a".to_string());
    args.push(request.codec.audio_codec().to_string());
    args.push("-b:a".to_string());
    args.push(
        match request.codec {
            CodecProfile::H264 => "160k",
            CodecProfile::Vp9 => "96k",
        }
        .to_string(),
    );

    args.push(request.output.to_string_lossy().to_string());
    args
}

/// Parse ffmpeg's `-progress pipe:1` key=value stream and forward snapshots.
async fn pump_progress(
    stdout: ChildStdout,
    total_secs: f64,
    sink: Option<mpsc::Sender<RenderProgress>>,
) {
    let mut lines = BufReader::new(stdout).lines();
    let mut current = RenderProgress::default();

    while let Ok(Some(line)) = lines.next_line().await {
        let Some(caps) = PROGRESS_LINE.captures(line.trim()) else {
            continue;
        };
        let (key, value) = (&caps[1], &caps[2]);
        match key {
            "frame" => current.frame = value.parse().unwrap_or(0),
            // out_time_ms is microseconds despite the name.
            "out_time_ms" => {
                let micros: u64 = value.parse().unwrap_or(0);
                current.out_time_secs = micros as f64 / 1_000_000.0;
                current.percent = (total_secs > 0.0)
                    .then(|| (current.out_time_secs / total_secs).min(1.0) * 100.0);
            }
            "speed" => current.speed = value.to_string(),
            // Each progress block ends with progress=continue|end; that is
            // the natural report cadence.
            "progress" => {
                if let Some(sink) = &sink {
                    if sink.send(current.clone()).await.is_err() {
                        return;
                    }
                } else {
                    debug!(
                        "transcode progress: {:.1}s ({})",
                        current.out_time_secs, current.speed
                    );
                }
                if value == "end" {
                    return;
                }
            }
            _ => {}
        }
    }
}

/// Last few meaningful stderr lines, newest last.
fn stderr_tail(lines: &[String]) -> String {
    let mut tail: Vec<&str> = lines
        .iter()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .rev()
        .take(4)
        .collect();
    tail.reverse();
    tail.join(" | ")
}

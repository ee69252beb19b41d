use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use sear::compose::overlay::compile_overlay_document;
use sear::transcript::{parse_srt, Transcript};
use sear::{AssCompiler, SubtitleStyle, TextOverlay};

pub struct Args {
    pub transcript: Option<PathBuf>,
    pub srt: Option<PathBuf>,
    pub overlays: Option<PathBuf>,
    pub style: Option<PathBuf>,
    pub output: PathBuf,
    pub width: u32,
    pub height: u32,
    pub duration: f64,
}

pub async fn run(args: Args) -> Result<()> {
    let doc = if let Some(overlays) = &args.overlays {
        if args.transcript.is_some() || args.srt.is_some() {
            bail!("--overlays compiles a standalone document; drop --transcript/--srt");
        }
        let json = tokio::fs::read_to_string(overlays)
            .await
            .with_context(|| format!("failed to read {}", overlays.display()))?;
        let overlays: Vec<TextOverlay> =
            serde_json::from_str(&json).context("malformed overlay list")?;
        eprintln!("📝 Compiling {} overlays", overlays.len());
        compile_overlay_document(&overlays, args.width, args.height, args.duration)?
    } else {
        let cues = if let Some(transcript) = &args.transcript {
            let json = tokio::fs::read_to_string(transcript)
                .await
                .with_context(|| format!("failed to read {}", transcript.display()))?;
            Transcript::from_json(&json)?.to_cues()
        } else if let Some(srt) = &args.srt {
            let content = tokio::fs::read_to_string(srt)
                .await
                .with_context(|| format!("failed to read {}", srt.display()))?;
            parse_srt(&content)?
        } else {
            bail!("one of --transcript, --srt, or --overlays is required");
        };

        let style = match &args.style {
            Some(path) => {
                let json = tokio::fs::read_to_string(path)
                    .await
                    .with_context(|| format!("failed to read {}", path.display()))?;
                serde_json::from_str::<SubtitleStyle>(&json).context("malformed style")?
            }
            None => SubtitleStyle::default(),
        };

        eprintln!("📝 Compiling {} cues", cues.len());
        AssCompiler::new(args.width, args.height).compile(&cues, &style)?
    };

    tokio::fs::write(&args.output, doc).await?;
    eprintln!("✅ Wrote {}", args.output.display());
    Ok(())
}

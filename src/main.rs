//! `sear` CLI - render composition jobs and inspect pipeline inputs

mod cmd;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "sear")]
#[command(about = "Burn subtitles, text overlays, and music into video clips")]
#[command(version)]
struct Cli {
    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a composition job to a finished clip
    Render {
        /// Path to a JSON composition job file
        job: PathBuf,

        /// Override the job's output path
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Register a font as NAME=PATH (repeatable)
        #[arg(long = "font", value_name = "NAME=PATH")]
        fonts: Vec<String>,
    },

    /// Compile subtitle or overlay markup without rendering video
    Subtitles {
        /// Whisper-style transcript JSON
        #[arg(long, conflicts_with = "srt")]
        transcript: Option<PathBuf>,

        /// SRT subtitle file
        #[arg(long)]
        srt: Option<PathBuf>,

        /// Overlay list JSON (compiled to a standalone document)
        #[arg(long)]
        overlays: Option<PathBuf>,

        /// Style descriptor JSON (defaults apply when omitted)
        #[arg(long)]
        style: Option<PathBuf>,

        /// Output markup path
        #[arg(short, long)]
        output: PathBuf,

        /// Canvas width in pixels
        #[arg(long, default_value = "1920")]
        width: u32,

        /// Canvas height in pixels
        #[arg(long, default_value = "1080")]
        height: u32,

        /// Default end time in seconds for unbounded overlays
        #[arg(long, default_value = "60")]
        duration: f64,
    },

    /// Validate clip-selector output and list candidate ranges
    Clips {
        /// JSON array of candidate time ranges
        file: PathBuf,
    },

    /// Probe a media file's duration
    Probe {
        /// Media file path
        file: PathBuf,
    },

    /// Check external tool availability
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    FmtSubscriber::builder()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .with_target(false)
        .compact()
        .init();

    match cli.command {
        Commands::Render { job, output, fonts } => {
            cmd::render::run(&job, output.as_deref(), &fonts).await?;
        }
        Commands::Subtitles {
            transcript,
            srt,
            overlays,
            style,
            output,
            width,
            height,
            duration,
        } => {
            cmd::subtitles::run(cmd::subtitles::Args {
                transcript,
                srt,
                overlays,
                style,
                output,
                width,
                height,
                duration,
            })
            .await?;
        }
        Commands::Clips { file } => {
            cmd::clips::run(&file).await?;
        }
        Commands::Probe { file } => {
            cmd::probe::run(&file).await?;
        }
        Commands::Check => {
            cmd::check::run().await?;
        }
    }

    Ok(())
}

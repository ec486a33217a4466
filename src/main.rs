mod ai;
mod assemble;
mod capture;
mod config;
mod download;
mod error;
mod ocr;
mod ordering;
mod pipeline;
mod scenes;
mod search;
mod timecode;
mod tools;
mod viewer;
mod watermark;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use config::{OcrBackend, Settings, Tools};
use pipeline::Outcome;

#[derive(Parser)]
#[command(name = "vidsum")]
#[command(about = "Summarize the top short video on a subject as an animated GIF", long_about = None)]
struct Cli {
    /// Asked for on stdin when omitted
    subject: Option<String>,
    #[arg(long, default_value = ".")]
    output_root: PathBuf,
    #[arg(long, default_value_t = 10.0)]
    max_video_minutes: f64,
    #[arg(long, default_value_t = 20, value_parser = clap::value_parser!(u16).range(1..))]
    search_results: u16,
    /// Scene list CSV with `Start Timecode`/`End Timecode` columns, skips detection
    #[arg(long)]
    scene_list: Option<PathBuf>,
    #[arg(long, default_value_t = 27.0)]
    scene_threshold: f64,
    #[arg(long, default_value_t = 15)]
    min_scene_frames: usize,
    #[arg(long, default_value_t = 1.0)]
    min_scene_secs: f64,
    #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u32).range(1..))]
    samples_per_scene: u32,
    #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u32).range(1..))]
    base_fps: u32,
    #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u32).range(1..))]
    max_playback_secs: u32,
    #[arg(long, value_enum, default_value_t = OcrBackend::Tesseract)]
    ocr: OcrBackend,
    #[arg(long, default_value = "video summary")]
    label: String,
    /// TrueType font used for the label
    #[arg(long, default_value = "font.ttf")]
    font: PathBuf,
    /// Do not open the viewer window
    #[arg(long)]
    no_view: bool,
    #[arg(long, default_value = "yt-dlp")]
    yt_dlp: PathBuf,
    #[arg(long, default_value = "ffmpeg")]
    ffmpeg: PathBuf,
    #[arg(long, default_value = "tesseract")]
    tesseract: PathBuf,
}

impl From<Cli> for Settings {
    fn from(cli: Cli) -> Self {
        Self {
            output_root: cli.output_root,
            max_video_minutes: cli.max_video_minutes,
            search_results: cli.search_results.into(),
            scene_list: cli.scene_list,
            scene_threshold: cli.scene_threshold,
            min_scene_frames: cli.min_scene_frames,
            min_scene_secs: cli.min_scene_secs,
            samples_per_scene: cli.samples_per_scene,
            base_fps: cli.base_fps,
            max_playback_secs: cli.max_playback_secs,
            ocr: cli.ocr,
            label: cli.label,
            font: cli.font,
            view: !cli.no_view,
            tools: Tools {
                yt_dlp: cli.yt_dlp,
                ffmpeg: cli.ffmpeg,
                tesseract: cli.tesseract,
            },
            ..Settings::default()
        }
    }
}

fn prompt_subject() -> anyhow::Result<String> {
    print!("Please enter a subject for the video: ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let subject = line.trim().to_owned();
    anyhow::ensure!(!subject.is_empty(), "no subject given");
    Ok(subject)
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let mut cli = Cli::parse();
    let subject = match cli.subject.take() {
        Some(subject) if !subject.trim().is_empty() => subject.trim().to_owned(),
        _ => prompt_subject()?,
    };
    let settings = Settings::from(cli);

    let summary = match pipeline::run(&subject, &settings).await? {
        Outcome::Done(summary) => summary,
        Outcome::NoShortVideo => {
            error!(
                "No videos shorter than {} minutes found. Exiting...",
                settings.max_video_minutes
            );
            return Ok(ExitCode::FAILURE);
        }
    };
    info!(
        "Done: {} frames at {} fps in {}",
        summary.frames,
        summary.rate.fps(),
        summary.run_dir.display()
    );

    if settings.view {
        let title = format!("{} - summary", subject);
        tokio::task::block_in_place(|| viewer::show(&summary.gif, &title))?;
    }

    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults_match_settings() {
        let settings = Settings::from(Cli::parse_from(["vidsum", "cats"]));
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_cli_overrides() {
        let cli = Cli::parse_from([
            "vidsum",
            "--samples-per-scene",
            "5",
            "--ocr",
            "openai",
            "--no-view",
            "--scene-list",
            "scenes.csv",
        ]);
        assert!(cli.subject.is_none());
        let settings = Settings::from(cli);
        assert_eq!(settings.samples_per_scene, 5);
        assert_eq!(settings.ocr, OcrBackend::Openai);
        assert!(!settings.view);
        assert_eq!(settings.scene_list, Some(PathBuf::from("scenes.csv")));
    }

    #[test]
    fn test_cli_rejects_zero_samples() {
        assert!(Cli::try_parse_from(["vidsum", "--samples-per-scene", "0"]).is_err());
    }
}

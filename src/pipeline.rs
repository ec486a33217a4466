use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Local};
use tracing::{info, warn};

use crate::assemble::{self, PlaybackRate};
use crate::capture;
use crate::config::{OcrBackend, Settings};
use crate::download;
use crate::ocr::{self, OpenAiVision, Tesseract};
use crate::scenes;
use crate::search;
use crate::watermark;

/// What a finished run produced.
#[derive(Debug)]
pub(crate) struct Summary {
    pub run_dir: PathBuf,
    pub gif: PathBuf,
    pub frames: usize,
    pub rate: PlaybackRate,
}

#[derive(Debug)]
pub(crate) enum Outcome {
    Done(Summary),
    NoShortVideo,
}

/// Replaces characters that cannot appear in a file name.
pub(crate) fn file_safe(subject: &str) -> String {
    let cleaned: String = subject
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    if cleaned.is_empty() {
        "untitled".to_owned()
    } else {
        cleaned
    }
}

pub(crate) fn run_dir_name(started: DateTime<Local>, subject: &str) -> String {
    format!(
        "video summary - {} - {}",
        started.format("%Y%m%d-%H%M%S"),
        file_safe(subject)
    )
}

/// Creates the per-run directory; an existing directory of the same name is an error.
pub(crate) fn create_run_dir(
    root: &Path,
    started: DateTime<Local>,
    subject: &str,
) -> anyhow::Result<PathBuf> {
    fs::create_dir_all(root).with_context(|| format!("cannot create {}", root.display()))?;
    let dir = root.join(run_dir_name(started, subject));
    fs::create_dir(&dir).with_context(|| format!("cannot create run directory {}", dir.display()))?;
    Ok(dir)
}

pub(crate) async fn run(subject: &str, settings: &Settings) -> anyhow::Result<Outcome> {
    let videos = search::search_videos(subject, settings).await?;
    let Some(top_video) = videos.first() else {
        return Ok(Outcome::NoShortVideo);
    };

    let run_dir = create_run_dir(&settings.output_root, Local::now(), subject)?;
    info!("Writing to {}", run_dir.display());

    let video_path = download::download_video(top_video, &run_dir, settings).await?;

    let scene_list = match &settings.scene_list {
        Some(path) => {
            info!("Reading scenes from {}", path.display());
            scenes::read_scene_list(path)
                .with_context(|| format!("bad scene list {}", path.display()))?
        }
        None => scenes::detect_scenes(
            &video_path,
            settings.scene_threshold,
            settings.min_scene_frames,
        )
        .context("scene detection failed")?,
    };
    for (i, scene) in scene_list.iter().enumerate() {
        info!("Scene {}: {}", i + 1, scene);
    }
    scenes::write_scene_list(&run_dir.join("scenes.csv"), &scene_list)?;

    capture::sample_frames(
        &video_path,
        &scene_list,
        settings.min_scene_secs,
        settings.samples_per_scene,
        &run_dir,
    )
    .context("frame extraction failed")?;

    let snippets = match settings.ocr {
        OcrBackend::Tesseract => {
            ocr::recognize_dir(&Tesseract::new(&settings.tools.tesseract), &run_dir).await?
        }
        OcrBackend::Openai => ocr::recognize_dir(&OpenAiVision, &run_dir).await?,
        OcrBackend::None => Vec::new(),
    };
    if !snippets.is_empty() {
        ocr::write_snippets(&run_dir.join("recognized_text.txt"), &snippets)?;
    }

    let frames = watermark::watermark_dir(
        &run_dir,
        &settings.label,
        &settings.font,
        &settings.tools.ffmpeg,
    )
    .await?;

    let (gif, rate) = assemble::assemble_gif(
        &frames,
        subject,
        &run_dir,
        settings.base_fps,
        settings.max_playback_secs,
    )?;
    if let PlaybackRate::Capped(fps) = rate {
        warn!("{} frames exceed the base rate, playing at {} fps", frames.len(), fps);
    }

    Ok(Outcome::Done(Summary {
        run_dir,
        gif,
        frames: frames.len(),
        rate,
    }))
}

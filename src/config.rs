use std::path::PathBuf;

use clap::ValueEnum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OcrBackend {
    /// `tesseract <image> stdout`
    Tesseract,
    /// GPT-4o vision, needs `OPENAI_API_KEY`
    Openai,
    None,
}

/// External programs the pipeline shells out to.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Tools {
    pub yt_dlp: PathBuf,
    pub ffmpeg: PathBuf,
    pub tesseract: PathBuf,
}

impl Default for Tools {
    fn default() -> Self {
        Self {
            yt_dlp: "yt-dlp".into(),
            ffmpeg: "ffmpeg".into(),
            tesseract: "tesseract".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Settings {
    pub output_root: PathBuf,
    /// Candidates must be strictly shorter than this many minutes.
    pub max_video_minutes: f64,
    pub search_results: usize,
    pub download_format: String,
    /// Imported instead of running the content detector.
    pub scene_list: Option<PathBuf>,
    pub scene_threshold: f64,
    pub min_scene_frames: usize,
    /// Scenes shorter than this are not sampled.
    pub min_scene_secs: f64,
    pub samples_per_scene: u32,
    pub base_fps: u32,
    pub max_playback_secs: u32,
    pub ocr: OcrBackend,
    pub label: String,
    pub font: PathBuf,
    pub view: bool,
    pub tools: Tools,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            output_root: ".".into(),
            max_video_minutes: 10.0,
            search_results: 20,
            download_format: "best[ext=mp4]/best".to_owned(),
            scene_list: None,
            scene_threshold: 27.0,
            min_scene_frames: 15,
            min_scene_secs: 1.0,
            samples_per_scene: 3,
            base_fps: 3,
            max_playback_secs: 10,
            ocr: OcrBackend::Tesseract,
            label: "video summary".to_owned(),
            font: "font.ttf".into(),
            view: true,
            tools: Tools::default(),
        }
    }
}

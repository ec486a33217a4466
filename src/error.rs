use std::path::PathBuf;

use thiserror::Error;

pub(crate) type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub(crate) enum Error {
    #[error("malformed timecode {input:?}: {reason}")]
    Format { input: String, reason: &'static str },

    #[error("scene interval starts after it ends ({start} > {end})")]
    InvalidInterval { start: f64, end: f64 },

    #[error("no images to process in {0}")]
    NoFrames(PathBuf),

    #[error("watermark font not found at {0}")]
    FontMissing(PathBuf),

    #[error("`{program}` exited with {status}: {stderr}")]
    ToolFailed {
        program: String,
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("media has no video stream")]
    NoVideoStream,

    #[error("no video frames could be decoded from {0}")]
    EmptyMedia(PathBuf),

    #[error("scene list {path} is missing the {column:?} column")]
    MissingColumn { path: PathBuf, column: &'static str },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Ffmpeg(#[from] ffmpeg_next::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

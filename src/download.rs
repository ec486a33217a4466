use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use anyhow::{ensure, Context};
use tracing::info;

use crate::config::Settings;
use crate::search::VideoCandidate;
use crate::tools;

/// Downloads `video` into `dest_dir` and returns the local file.
pub(crate) async fn download_video(
    video: &VideoCandidate,
    dest_dir: &Path,
    settings: &Settings,
) -> anyhow::Result<PathBuf> {
    info!("Downloading top video...");
    match video.view_count {
        Some(views) => info!("Top video: {} ({} views)", video.title(), views),
        None => info!("Top video: {}", video.title()),
    }
    let url = video.watch_url();
    info!("URL: {}", url);

    let template = dest_dir.join("%(id)s.%(ext)s");
    let stdout = tools::run(
        &settings.tools.yt_dlp,
        [
            OsStr::new("--no-playlist"),
            OsStr::new("--quiet"),
            OsStr::new("-f"),
            OsStr::new(&settings.download_format),
            OsStr::new("-o"),
            template.as_os_str(),
            OsStr::new("--print"),
            OsStr::new("after_move:filepath"),
            OsStr::new("--"),
            OsStr::new(&url),
        ],
    )
    .await
    .with_context(|| format!("yt-dlp failed to download {}", url))?;

    let path = downloaded_path(&stdout).context("yt-dlp did not report a file path")?;
    ensure!(path.exists(), "downloaded file {} does not exist", path.display());
    Ok(path)
}

/// The last non-empty line printed by `--print after_move:filepath`.
fn downloaded_path(stdout: &str) -> Option<PathBuf> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .last()
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downloaded_path_takes_last_line() {
        let out = "WARNING: something\n/tmp/run/abc.mp4\n\n";
        assert_eq!(downloaded_path(out), Some(PathBuf::from("/tmp/run/abc.mp4")));
        assert_eq!(downloaded_path("  \n"), None);
    }
}

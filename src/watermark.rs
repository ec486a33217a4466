use std::ffi::OsString;
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::{debug, info};

use crate::error::Error;
use crate::ordering;
use crate::tools;

/// Escapes a value for an ffmpeg filter option inside a filtergraph string.
fn escape_filter_value(value: &str) -> String {
    let mut option = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '\'' | ':') {
            option.push('\\');
        }
        option.push(c);
    }
    let mut graph = String::with_capacity(option.len());
    for c in option.chars() {
        if matches!(c, '\\' | '\'' | '[' | ']' | ',' | ';') {
            graph.push('\\');
        }
        graph.push(c);
    }
    graph
}

fn drawtext_filter(label: &str, font: &Path) -> String {
    format!(
        "drawtext=fontfile={}:text={}:expansion=none:fontcolor=white:fontsize=h/16:\
         box=1:boxcolor=black@0.5:boxborderw=8:x=w-tw-24:y=h-th-24",
        escape_filter_value(&font.to_string_lossy()),
        escape_filter_value(label),
    )
}

/// Overlays `label` on every frame in `dir`, replacing each file in place.
pub(crate) async fn watermark_dir(
    dir: &Path,
    label: &str,
    font: &Path,
    ffmpeg: &Path,
) -> anyhow::Result<Vec<PathBuf>> {
    info!("Watermarking frames...");
    if !font.is_file() {
        return Err(Error::FontMissing(font.to_owned()).into());
    }

    let filter = drawtext_filter(label, font);
    let frames = ordering::list_frames(dir)?;
    for frame in &frames {
        let mut partial = frame.clone().into_os_string();
        partial.push(".partial");
        let partial = PathBuf::from(partial);

        let args: [OsString; 14] = [
            "-y".into(),
            "-loglevel".into(),
            "error".into(),
            "-i".into(),
            frame.into(),
            "-vf".into(),
            filter.as_str().into(),
            "-q:v".into(),
            "2".into(),
            "-f".into(),
            "image2".into(),
            "-update".into(),
            "1".into(),
            partial.as_os_str().into(),
        ];
        tools::run(ffmpeg, &args)
            .await
            .with_context(|| format!("failed to watermark {}", frame.display()))?;
        tokio::fs::rename(&partial, frame).await?;
        debug!("watermarked {}", frame.display());
    }

    info!("Watermarked {} frames", frames.len());
    Ok(frames)
}

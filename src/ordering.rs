use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};

static FRAME_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"scene_(\d+)_frame_(\d+)").expect("valid regex"));

/// Position of a sampled still: 1-based scene, then 1-based sample within it.
///
/// The derived `Ord` compares `scene` first, which is the chronological order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct SampledFrame {
    pub scene: u32,
    pub frame: u32,
}

impl SampledFrame {
    pub fn new(scene: u32, frame: u32) -> Self {
        Self { scene, frame }
    }

    pub fn file_name(&self) -> String {
        format!("scene_{}_frame_{}.jpg", self.scene, self.frame)
    }
}

impl fmt::Display for SampledFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scene {} frame {}", self.scene, self.frame)
    }
}

/// An image on disk tagged with the frame it was sampled as.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct ImageAsset {
    pub key: SampledFrame,
    pub path: PathBuf,
}

impl ImageAsset {
    /// `None` when the file name does not follow `scene_<N>_frame_<M>`.
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        parse_sampled_frame(name).map(|key| Self {
            key,
            path: path.to_owned(),
        })
    }
}

pub(crate) fn parse_sampled_frame(name: &str) -> Option<SampledFrame> {
    let caps = FRAME_NAME.captures(name)?;
    Some(SampledFrame::new(caps[1].parse().ok()?, caps[2].parse().ok()?))
}

/// Sort key for a frame file name; `(0, 0)` for names that are not frames,
/// which puts them before every real frame.
pub(crate) fn ordering_key(name: &str) -> (u32, u32) {
    parse_sampled_frame(name).map_or((0, 0), |f| (f.scene, f.frame))
}

/// The `.jpg` files of `dir`, in ordering-key order.
pub(crate) fn list_frames(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_jpeg = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("jpg") || ext.eq_ignore_ascii_case("jpeg"));
        if is_jpeg && path.is_file() {
            paths.push(path);
        }
    }
    if paths.is_empty() {
        return Err(Error::NoFrames(dir.to_owned()));
    }
    sort_paths(&mut paths);
    Ok(paths)
}

/// Sorts paths by the ordering key of their file names.
pub(crate) fn sort_paths(paths: &mut [PathBuf]) {
    paths.sort_by_cached_key(|p| {
        let name = p.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        ordering_key(name)
    });
}

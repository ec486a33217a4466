use std::fs;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use image::codecs::gif::{GifEncoder, Repeat};
use image::imageops::{self, FilterType};
use image::{Delay, Frame};
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::ordering::ImageAsset;
use crate::pipeline::file_safe;

/// Frames per second chosen for the summary, and which rule chose it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PlaybackRate {
    /// Playing at the base rate stays under the playback cap.
    Base(u32),
    /// `frame_count / max_playback_secs`, for sequences too long for the base rate.
    Capped(u32),
}

impl PlaybackRate {
    pub fn fps(self) -> u32 {
        match self {
            PlaybackRate::Base(fps) | PlaybackRate::Capped(fps) => fps.max(1),
        }
    }
}

pub(crate) fn playback_rate(
    frame_count: usize,
    base_fps: u32,
    max_playback_secs: u32,
) -> PlaybackRate {
    let frame_count = frame_count as u64;
    let max_playback_secs = u64::from(max_playback_secs.max(1));
    // frame_count / base_fps < max_playback_secs, without the division
    if frame_count < u64::from(base_fps) * max_playback_secs {
        PlaybackRate::Base(base_fps)
    } else {
        PlaybackRate::Capped((frame_count / max_playback_secs) as u32)
    }
}

pub(crate) fn gif_file_name(subject: &str) -> String {
    format!("{} - summary.gif", file_safe(subject))
}

/// Encodes the frames into `<subject> - summary.gif` inside `output_dir`, looping
/// forever. Paths that are not sampled frames are skipped.
pub(crate) fn assemble_gif(
    frames: &[PathBuf],
    subject: &str,
    output_dir: &Path,
    base_fps: u32,
    max_playback_secs: u32,
) -> Result<(PathBuf, PlaybackRate)> {
    let mut assets = Vec::with_capacity(frames.len());
    for path in frames {
        match ImageAsset::from_path(path) {
            Some(asset) => assets.push(asset),
            None => warn!("skipping {}, not a sampled frame", path.display()),
        }
    }
    if assets.is_empty() {
        return Err(Error::NoFrames(output_dir.to_owned()));
    }
    assets.sort();

    let rate = playback_rate(assets.len(), base_fps, max_playback_secs);
    let delay = Delay::from_numer_denom_ms(1000, rate.fps());
    info!("Assembling {} frames at {} fps...", assets.len(), rate.fps());

    let output_path = output_dir.join(gif_file_name(subject));
    let writer = BufWriter::new(fs::File::create(&output_path)?);
    let mut encoder = GifEncoder::new_with_speed(writer, 10);
    encoder.set_repeat(Repeat::Infinite)?;

    let mut size = None;
    for asset in &assets {
        let mut rgba = image::open(&asset.path)?.to_rgba8();
        let (width, height) = *size.get_or_insert(rgba.dimensions());
        if rgba.dimensions() != (width, height) {
            rgba = imageops::resize(&rgba, width, height, FilterType::Triangle);
        }
        encoder.encode_frame(Frame::from_parts(rgba, 0, 0, delay))?;
    }
    drop(encoder);

    info!("Summary written to {}", output_path.display());
    Ok((output_path, rate))
}

#[cfg(test)]
mod tests {
    use image::codecs::gif::GifDecoder;
    use image::{AnimationDecoder, Rgb, RgbImage};

    use super::*;

    #[test]
    fn test_rate_boundary() {
        assert_eq!(playback_rate(29, 3, 10), PlaybackRate::Base(3));
        assert_eq!(playback_rate(30, 3, 10), PlaybackRate::Capped(3));
        assert_eq!(playback_rate(31, 3, 10), PlaybackRate::Capped(3));
        assert_eq!(playback_rate(45, 3, 10), PlaybackRate::Capped(4));
        assert_eq!(playback_rate(1, 3, 10), PlaybackRate::Base(3));
    }

    #[test]
    fn test_rate_uses_configured_cap() {
        assert_eq!(playback_rate(59, 6, 10), PlaybackRate::Base(6));
        assert_eq!(playback_rate(60, 6, 10), PlaybackRate::Capped(6));
        assert_eq!(playback_rate(100, 3, 5), PlaybackRate::Capped(20));
        assert_eq!(playback_rate(2, 3, 0), PlaybackRate::Base(3));
    }

    #[test]
    fn test_gif_file_name() {
        assert_eq!(gif_file_name("cats"), "cats - summary.gif");
    }

    fn write_frame(dir: &Path, name: &str, size: (u32, u32), shade: u8) -> PathBuf {
        let path = dir.join(name);
        RgbImage::from_pixel(size.0, size.1, Rgb([shade, shade, shade]))
            .save(&path)
            .unwrap();
        path
    }

    #[test]
    fn test_assemble_writes_looping_gif() {
        let dir = tempfile::tempdir().unwrap();
        let frames = vec![
            write_frame(dir.path(), "scene_2_frame_1.jpg", (32, 24), 200),
            write_frame(dir.path(), "scene_1_frame_1.jpg", (32, 24), 20),
            write_frame(dir.path(), "scene_1_frame_2.jpg", (64, 48), 120),
            write_frame(dir.path(), "cover.png", (32, 24), 0),
        ];

        let (gif, rate) = assemble_gif(&frames, "cats", dir.path(), 3, 10).unwrap();
        assert_eq!(gif, dir.path().join("cats - summary.gif"));
        assert_eq!(rate, PlaybackRate::Base(3));

        let reader = std::io::BufReader::new(fs::File::open(&gif).unwrap());
        let decoder = GifDecoder::new(reader).unwrap();
        let decoded = decoder.into_frames().collect_frames().unwrap();
        assert_eq!(decoded.len(), 3);
        assert!(decoded.iter().all(|f| f.buffer().dimensions() == (32, 24)));
        // first frame is the darkest, scene 1 frame 1
        assert!(decoded[0].buffer().get_pixel(0, 0)[0] < 60);
    }

    #[test]
    fn test_assemble_requires_frames() {
        let dir = tempfile::tempdir().unwrap();
        let result = assemble_gif(&[dir.path().join("cover.png")], "cats", dir.path(), 3, 10);
        assert!(matches!(result, Err(Error::NoFrames(_))));
    }
}

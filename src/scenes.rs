use std::fmt;
use std::fs;
use std::io::Write;
use std::path::Path;

use ffmpeg::util::frame::video::Video;
use ffmpeg::{format, software};
use ffmpeg_next as ffmpeg;
use tracing::{debug, info};

use crate::capture::{self, rgb_bytes};
use crate::error::{Error, Result};
use crate::timecode::{format_timecode, parse_timecode};

/// A span of the source video between two detected cuts, in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct SceneInterval {
    start: f64,
    end: f64,
}

impl SceneInterval {
    pub fn new(start: f64, end: f64) -> Result<Self> {
        if start > end || start < 0.0 {
            return Err(Error::InvalidInterval { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn end(&self) -> f64 {
        self.end
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

impl fmt::Display for SceneInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", format_timecode(self.start), format_timecode(self.end))
    }
}

/// Width frames are shrunk to before comparing them.
const ANALYSIS_WIDTH: u32 = 128;

/// Cut detector over consecutive frames, scoring the mean HSV change.
///
/// Hue is on the 0..180 scale and saturation/value on 0..255, so a
/// threshold of 27 behaves like PySceneDetect's `ContentDetector` default.
pub(crate) struct ContentDetector {
    threshold: f64,
    min_scene_frames: usize,
    previous: Option<Vec<[u8; 3]>>,
    last_cut: Option<usize>,
    frame_number: usize,
}

impl ContentDetector {
    pub fn new(threshold: f64, min_scene_frames: usize) -> Self {
        Self {
            threshold,
            min_scene_frames,
            previous: None,
            last_cut: None,
            frame_number: 0,
        }
    }

    /// Feeds one packed RGB24 frame; returns true if a cut starts at this frame.
    pub fn process(&mut self, rgb: &[u8]) -> bool {
        let hsv: Vec<[u8; 3]> = rgb
            .chunks_exact(3)
            .map(|p| rgb_to_hsv(p[0], p[1], p[2]))
            .collect();
        let frame_number = self.frame_number;
        self.frame_number += 1;

        let last_cut = *self.last_cut.get_or_insert(frame_number);
        let score = match &self.previous {
            Some(previous) if previous.len() == hsv.len() && !hsv.is_empty() => {
                Self::score(previous, &hsv)
            }
            _ => 0.0,
        };
        self.previous = Some(hsv);

        if score >= self.threshold && frame_number - last_cut >= self.min_scene_frames {
            debug!("cut at frame {} (score {:.2})", frame_number, score);
            self.last_cut = Some(frame_number);
            true
        } else {
            false
        }
    }

    fn score(a: &[[u8; 3]], b: &[[u8; 3]]) -> f64 {
        let mut sums = [0u64; 3];
        for (x, y) in a.iter().zip(b) {
            for c in 0..3 {
                sums[c] += u64::from(x[c].abs_diff(y[c]));
            }
        }
        let n = a.len() as f64;
        sums.iter().map(|&s| s as f64 / n).sum::<f64>() / 3.0
    }
}

/// 8-bit HSV with hue halved to fit 0..180.
fn rgb_to_hsv(r: u8, g: u8, b: u8) -> [u8; 3] {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = f64::from(max - min);
    let v = max;
    let s = if max == 0 {
        0
    } else {
        (255.0 * delta / f64::from(max)).round() as u8
    };
    if delta == 0.0 {
        return [0, s, v];
    }
    let (r, g, b) = (f64::from(r), f64::from(g), f64::from(b));
    let max = f64::from(max);
    let mut h = if max == r {
        60.0 * (g - b) / delta
    } else if max == g {
        120.0 + 60.0 * (b - r) / delta
    } else {
        240.0 + 60.0 * (r - g) / delta
    };
    if h < 0.0 {
        h += 360.0;
    }
    [((h / 2.0).round() as u8).min(179), s, v]
}

/// Builds intervals from cut times. No cuts means no intervals.
pub(crate) fn intervals_from_cuts(cuts: &[f64], media_end: f64) -> Result<Vec<SceneInterval>> {
    if cuts.is_empty() {
        return Ok(Vec::new());
    }
    let mut bounds = Vec::with_capacity(cuts.len() + 2);
    bounds.push(0.0);
    bounds.extend_from_slice(cuts);
    bounds.push(media_end.max(cuts[cuts.len() - 1]));
    bounds
        .windows(2)
        .map(|w| SceneInterval::new(w[0], w[1]))
        .collect()
}

/// Decodes `input_path` and splits it into scenes.
pub(crate) fn detect_scenes(
    input_path: &Path,
    threshold: f64,
    min_scene_frames: usize,
) -> Result<Vec<SceneInterval>> {
    info!("Detecting scenes...");
    capture::init()?;

    let mut input = format::input(&input_path)?;
    let (video_stream_index, time_base, mut decoder) = capture::open_video(&input)?;

    let (width, height) = analysis_size(decoder.width(), decoder.height());
    let mut scaler = software::scaling::context::Context::get(
        decoder.format(),
        decoder.width(),
        decoder.height(),
        format::Pixel::RGB24,
        width,
        height,
        software::scaling::Flags::FAST_BILINEAR,
    )?;

    let mut detector = ContentDetector::new(threshold, min_scene_frames);
    let mut cuts = Vec::new();
    let mut last_seen = 0.0_f64;
    let mut receive_and_process_decoded_frames =
        |decoder: &mut ffmpeg::decoder::Video| -> Result<()> {
            let mut decoded = Video::empty();
            while decoder.receive_frame(&mut decoded).is_ok() {
                let seconds = decoded
                    .timestamp()
                    .or_else(|| decoded.pts())
                    .map_or(last_seen, |pts| pts as f64 * time_base);
                last_seen = last_seen.max(seconds);

                let mut small = Video::empty();
                scaler.run(&decoded, &mut small)?;
                if detector.process(&rgb_bytes(&small)) {
                    cuts.push(seconds);
                }
            }
            Ok(())
        };

    for (stream, packet) in input.packets() {
        if stream.index() == video_stream_index {
            decoder.send_packet(&packet)?;
            receive_and_process_decoded_frames(&mut decoder)?;
        }
    }
    decoder.send_eof()?;
    receive_and_process_decoded_frames(&mut decoder)?;

    let media_end = capture::container_duration(&input).unwrap_or(last_seen).max(last_seen);
    let scenes = intervals_from_cuts(&cuts, media_end)?;
    info!("Detected {} scenes", scenes.len());
    Ok(scenes)
}

fn analysis_size(width: u32, height: u32) -> (u32, u32) {
    if width <= ANALYSIS_WIDTH || width == 0 {
        return (width.max(2), height.max(2));
    }
    let scaled = (u64::from(height) * u64::from(ANALYSIS_WIDTH) / u64::from(width)) as u32;
    (ANALYSIS_WIDTH, (scaled & !1).max(2))
}

const START_COLUMN: &str = "Start Timecode";
const END_COLUMN: &str = "End Timecode";

/// Writes `scenes` as CSV with `Start Timecode`/`End Timecode` columns.
pub(crate) fn write_scene_list(path: &Path, scenes: &[SceneInterval]) -> Result<()> {
    let mut file = std::io::BufWriter::new(fs::File::create(path)?);
    writeln!(file, "Scene Number,{},{},Length (seconds)", START_COLUMN, END_COLUMN)?;
    for (i, scene) in scenes.iter().enumerate() {
        writeln!(
            file,
            "{},{},{},{:.3}",
            i + 1,
            format_timecode(scene.start()),
            format_timecode(scene.end()),
            scene.duration()
        )?;
    }
    file.flush()?;
    Ok(())
}

/// Reads a scene list CSV. Lines before the header row (PySceneDetect puts a
/// cut list there) are skipped.
pub(crate) fn read_scene_list(path: &Path) -> Result<Vec<SceneInterval>> {
    let content = fs::read_to_string(path)?;
    let mut lines = content.lines().skip_while(|line| !line.contains(START_COLUMN));

    let missing = |column| Error::MissingColumn {
        path: path.to_owned(),
        column,
    };
    let header: Vec<&str> = lines
        .next()
        .ok_or_else(|| missing(START_COLUMN))?
        .split(',')
        .map(str::trim)
        .collect();
    let start_idx = header
        .iter()
        .position(|h| *h == START_COLUMN)
        .ok_or_else(|| missing(START_COLUMN))?;
    let end_idx = header
        .iter()
        .position(|h| *h == END_COLUMN)
        .ok_or_else(|| missing(END_COLUMN))?;

    lines
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let fields: Vec<&str> = line.split(',').map(str::trim).collect();
            let field = |idx: usize| fields.get(idx).copied().unwrap_or_default();
            SceneInterval::new(parse_timecode(field(start_idx))?, parse_timecode(field(end_idx))?)
        })
        .collect()
}

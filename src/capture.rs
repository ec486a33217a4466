use std::fs;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use ffmpeg::util::frame::video::Video;
use ffmpeg::{codec, decoder, format, media, rescale, software};
use ffmpeg_next::{self as ffmpeg};
use image::codecs::jpeg;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::ordering::{ImageAsset, SampledFrame};
use crate::scenes::SceneInterval;

static INIT: OnceLock<Result<(), ffmpeg::Error>> = OnceLock::new();

pub(crate) fn init() -> Result<()> {
    let result = *INIT.get_or_init(|| {
        ffmpeg::init()?;
        ffmpeg::log::set_level(ffmpeg::log::Level::Error);
        Ok(())
    });
    Ok(result?)
}

/// Finds the best video stream and opens a decoder for it.
///
/// Returns the stream index, its time base in seconds and the decoder.
pub(crate) fn open_video(input: &format::context::Input) -> Result<(usize, f64, decoder::Video)> {
    let stream = input
        .streams()
        .best(media::Type::Video)
        .ok_or(Error::NoVideoStream)?;
    let decoder = codec::context::Context::from_parameters(stream.parameters())?
        .decoder()
        .video()?;
    Ok((stream.index(), stream.time_base().into(), decoder))
}

/// Container duration in seconds, if the container reports one.
pub(crate) fn container_duration(input: &format::context::Input) -> Option<f64> {
    let duration = input.duration();
    (duration > 0).then(|| duration as f64 * f64::from(rescale::TIME_BASE))
}

pub(crate) fn media_duration(input_path: &Path) -> Result<f64> {
    init()?;
    let input = format::input(&input_path)?;
    if let Some(duration) = container_duration(&input) {
        return Ok(duration);
    }
    let stream = input
        .streams()
        .best(media::Type::Video)
        .ok_or(Error::NoVideoStream)?;
    let time_base: f64 = stream.time_base().into();
    Ok((stream.duration().max(0) as f64 * time_base).max(0.0))
}

/// Packed RGB24 pixels of `frame`, dropping any row padding.
pub(crate) fn rgb_bytes(frame: &Video) -> Vec<u8> {
    let row = frame.width() as usize * 3;
    let stride = frame.stride(0);
    frame
        .data(0)
        .chunks(stride)
        .take(frame.height() as usize)
        .flat_map(|line| line[..row].iter().copied())
        .collect()
}

/// Timestamps to grab, as `(frame, seconds)` pairs.
///
/// Each scene at least `min_scene_secs` long gets `samples_per_scene` evenly
/// spaced interior samples; shorter scenes get none but still consume their
/// scene number. With no scenes at all, one frame is taken at the middle of
/// the media.
pub(crate) fn plan_samples(
    scenes: &[SceneInterval],
    min_scene_secs: f64,
    samples_per_scene: u32,
    media_duration: f64,
) -> Vec<(SampledFrame, f64)> {
    if scenes.is_empty() {
        return vec![(SampledFrame::new(1, 1), media_duration / 2.0)];
    }

    scenes
        .iter()
        .zip(1u32..)
        .filter(|(scene, _)| scene.duration() >= min_scene_secs)
        .flat_map(|(scene, scene_number)| {
            let step = scene.duration() / f64::from(samples_per_scene + 1);
            (1..=samples_per_scene).map(move |k| {
                (SampledFrame::new(scene_number, k), scene.start() + step * f64::from(k))
            })
        })
        .collect()
}

fn write_jpeg(frame: &Video, path: &Path) -> Result<()> {
    let mut writer = BufWriter::new(fs::File::create(path)?);
    let mut encoder = jpeg::JpegEncoder::new_with_quality(&mut writer, 95);
    encoder.encode(
        &rgb_bytes(frame),
        frame.width(),
        frame.height(),
        image::ExtendedColorType::Rgb8,
    )?;
    Ok(())
}

/// Planned samples not yet written, in timestamp order.
pub(crate) struct FrameSchedule {
    pending: Vec<(SampledFrame, f64)>,
    next: usize,
}

impl FrameSchedule {
    pub fn new(plan: &[(SampledFrame, f64)]) -> Self {
        let mut pending = plan.to_vec();
        pending.sort_by(|a, b| a.1.total_cmp(&b.1));
        Self { pending, next: 0 }
    }

    pub fn is_done(&self) -> bool {
        self.next >= self.pending.len()
    }

    /// Samples whose timestamp is at or before a frame shown at `seconds`.
    pub fn due(&mut self, seconds: f64) -> Vec<SampledFrame> {
        let start = self.next;
        while self.pending.get(self.next).is_some_and(|&(_, at)| at <= seconds) {
            self.next += 1;
        }
        self.pending[start..self.next].iter().map(|&(key, _)| key).collect()
    }

    /// Samples left once decoding stopped. They fall after the last frame, so
    /// they reuse it; without any decoded frame that is an error.
    pub fn finish(self, input_path: &Path, decoded_any: bool) -> Result<Vec<SampledFrame>> {
        let leftover: Vec<_> = self.pending[self.next..].iter().map(|&(key, _)| key).collect();
        if !leftover.is_empty() && !decoded_any {
            return Err(Error::EmptyMedia(input_path.to_owned()));
        }
        Ok(leftover)
    }
}

/// Decodes `input_path` once and writes a JPEG for every planned timestamp into
/// `output_dir`, using the first frame at or after the timestamp. Timestamps past
/// the last decoded frame get the last frame.
pub(crate) fn grab_frames(
    input_path: &Path,
    plan: &[(SampledFrame, f64)],
    output_dir: &Path,
) -> Result<Vec<ImageAsset>> {
    init()?;
    let mut schedule = FrameSchedule::new(plan);

    let mut input = format::input(&input_path)?;
    let (video_stream_index, time_base, mut decoder) = open_video(&input)?;
    let mut scaler = software::scaling::context::Context::get(
        decoder.format(),
        decoder.width(),
        decoder.height(),
        format::Pixel::RGB24,
        decoder.width(),
        decoder.height(),
        software::scaling::Flags::BILINEAR,
    )?;

    let mut written = Vec::with_capacity(plan.len());
    let mut last = Video::empty();
    let mut decoded_any = false;
    let mut save =
        |scaler: &mut software::scaling::Context, frame: &Video, key: SampledFrame| -> Result<()> {
            let mut rgb_frame = Video::empty();
            scaler.run(frame, &mut rgb_frame)?;
            let path = output_dir.join(key.file_name());
            write_jpeg(&rgb_frame, &path)?;
            debug!("{} -> {}", key, path.display());
            written.push(ImageAsset { key, path });
            Ok(())
        };

    let mut receive_and_process_decoded_frames =
        |decoder: &mut decoder::Video| -> Result<bool> {
            let mut decoded = Video::empty();
            while !schedule.is_done() && decoder.receive_frame(&mut decoded).is_ok() {
                let Some(pts) = decoded.timestamp().or_else(|| decoded.pts()) else {
                    continue;
                };
                for key in schedule.due(pts as f64 * time_base) {
                    save(&mut scaler, &decoded, key)?;
                }
                std::mem::swap(&mut decoded, &mut last);
                decoded_any = true;
            }
            Ok(schedule.is_done())
        };

    let mut done = false;
    for (stream, packet) in input.packets() {
        if stream.index() == video_stream_index {
            decoder.send_packet(&packet)?;
            done = receive_and_process_decoded_frames(&mut decoder)?;
            if done {
                break;
            }
        }
    }
    if !done {
        decoder.send_eof()?;
        receive_and_process_decoded_frames(&mut decoder)?;
    }

    let leftover = schedule.finish(input_path, decoded_any)?;
    if !leftover.is_empty() {
        warn!("{} samples fall after the last frame, reusing it", leftover.len());
        for key in leftover {
            save(&mut scaler, &last, key)?;
        }
    }

    Ok(written)
}

/// Writes the sampled stills for `scenes` into `output_dir`.
pub(crate) fn sample_frames(
    input_path: &Path,
    scenes: &[SceneInterval],
    min_scene_secs: f64,
    samples_per_scene: u32,
    output_dir: &Path,
) -> Result<Vec<PathBuf>> {
    let duration = if scenes.is_empty() {
        media_duration(input_path)?
    } else {
        0.0
    };
    let plan = plan_samples(scenes, min_scene_secs, samples_per_scene, duration);
    info!("Extracting {} frames from {} scenes...", plan.len(), scenes.len());

    let assets = grab_frames(input_path, &plan, output_dir)?;
    Ok(assets.into_iter().map(|asset| asset.path).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scene(start: f64, end: f64) -> SceneInterval {
        SceneInterval::new(start, end).unwrap()
    }

    #[test]
    fn test_plan_interior_samples() {
        let plan = plan_samples(&[scene(10.0, 18.0)], 1.0, 3, 0.0);
        assert_eq!(
            plan,
            [
                (SampledFrame::new(1, 1), 12.0),
                (SampledFrame::new(1, 2), 14.0),
                (SampledFrame::new(1, 3), 16.0),
            ]
        );
    }

    #[test]
    fn test_plan_skips_short_scenes_but_keeps_numbering() {
        let scenes = [scene(0.0, 0.5), scene(0.5, 4.5), scene(4.5, 4.9)];
        let plan = plan_samples(&scenes, 1.0, 3, 0.0);
        assert_eq!(plan.len(), 3);
        assert!(plan.iter().all(|(f, _)| f.scene == 2));
        assert!(plan.iter().all(|&(_, at)| at > 0.5 && at < 4.5));
    }

    #[test]
    fn test_plan_threshold_is_inclusive() {
        let plan = plan_samples(&[scene(3.0, 4.0)], 1.0, 1, 0.0);
        assert_eq!(plan, [(SampledFrame::new(1, 1), 3.5)]);
    }

    #[test]
    fn test_plan_bounded_by_scenes_times_samples() {
        let scenes: Vec<_> = (0..7)
            .map(|i| scene(f64::from(i) * 2.0, f64::from(i) * 2.0 + 2.0))
            .collect();
        for k in 1..5 {
            let plan = plan_samples(&scenes, 1.0, k, 0.0);
            assert!(plan.len() <= scenes.len() * k as usize);
            assert_eq!(plan.len(), scenes.len() * k as usize);
        }
        assert!(plan_samples(&scenes, 5.0, 3, 0.0).is_empty());
    }

    #[test]
    fn test_schedule_assigns_first_frame_at_or_after_target() {
        let plan = [
            (SampledFrame::new(1, 2), 1.1),
            (SampledFrame::new(1, 1), 0.5),
            (SampledFrame::new(1, 3), 1.5),
        ];
        let mut schedule = FrameSchedule::new(&plan);

        // frames every 0.4 s: 0.0, 0.4, 0.8, 1.2, 1.6
        assert!(schedule.due(0.0).is_empty());
        assert!(schedule.due(0.4).is_empty());
        assert_eq!(schedule.due(0.8), [SampledFrame::new(1, 1)]);
        assert_eq!(schedule.due(1.2), [SampledFrame::new(1, 2)]);
        assert!(!schedule.is_done());
        assert_eq!(schedule.due(1.6), [SampledFrame::new(1, 3)]);
        assert!(schedule.is_done());
        assert!(schedule.finish(Path::new("clip.mp4"), true).unwrap().is_empty());
    }

    #[test]
    fn test_schedule_puts_close_targets_on_one_frame() {
        let plan = plan_samples(&[scene(0.0, 0.1)], 0.0, 3, 0.0);
        let mut schedule = FrameSchedule::new(&plan);
        assert!(schedule.due(0.0).is_empty());
        let keys = schedule.due(0.1);
        assert_eq!(
            keys,
            [SampledFrame::new(1, 1), SampledFrame::new(1, 2), SampledFrame::new(1, 3)]
        );
    }

    #[test]
    fn test_schedule_reuses_last_frame_for_late_targets() {
        let plan = [(SampledFrame::new(1, 1), 2.0), (SampledFrame::new(2, 1), 9.0)];
        let mut schedule = FrameSchedule::new(&plan);
        assert_eq!(schedule.due(2.0), [SampledFrame::new(1, 1)]);
        assert!(schedule.due(4.96).is_empty());
        assert_eq!(
            schedule.finish(Path::new("clip.mp4"), true).unwrap(),
            [SampledFrame::new(2, 1)]
        );
    }

    #[test]
    fn test_schedule_without_frames_is_empty_media() {
        let plan = plan_samples(&[], 1.0, 3, 10.0);
        let schedule = FrameSchedule::new(&plan);
        assert!(matches!(
            schedule.finish(Path::new("clip.mp4"), false),
            Err(Error::EmptyMedia(_))
        ));
    }

    #[test]
    fn test_schedule_midpoint_sample_written_once() {
        let plan = plan_samples(&[], 1.0, 3, 10.0);
        let mut schedule = FrameSchedule::new(&plan);
        let written: Vec<_> = [0.0, 4.0, 5.0, 6.0]
            .into_iter()
            .flat_map(|at| schedule.due(at))
            .collect();
        assert_eq!(written, [SampledFrame::new(1, 1)]);
        assert!(schedule.is_done());
    }

    #[test]
    fn test_schedule_empty_plan() {
        let mut schedule = FrameSchedule::new(&[]);
        assert!(schedule.is_done());
        assert!(schedule.due(1.0).is_empty());
        assert!(schedule.finish(Path::new("clip.mp4"), false).unwrap().is_empty());
    }

    #[test]
    fn test_schedule_writes_at_most_scenes_times_samples() {
        let scenes: Vec<_> = (0..4)
            .map(|i| scene(f64::from(i) * 3.0, f64::from(i) * 3.0 + 3.0))
            .collect();
        let plan = plan_samples(&scenes, 1.0, 3, 0.0);
        let mut schedule = FrameSchedule::new(&plan);
        let mut written: Vec<SampledFrame> =
            (0..=240).flat_map(|i| schedule.due(f64::from(i) / 24.0)).collect();
        written.extend(schedule.finish(Path::new("clip.mp4"), true).unwrap());
        assert_eq!(written.len(), scenes.len() * 3);
        written.sort();
        written.dedup();
        assert_eq!(written.len(), scenes.len() * 3);
    }

    #[test]
    fn test_plan_without_scenes_takes_midpoint() {
        let plan = plan_samples(&[], 1.0, 3, 93.0);
        assert_eq!(plan, [(SampledFrame::new(1, 1), 46.5)]);
    }
}

use std::fs;
use std::io::BufReader;
use std::path::Path;
use std::time::{Duration, Instant};

use eframe::egui;
use image::codecs::gif::GifDecoder;
use image::AnimationDecoder;

use crate::error::Result;

/// GIF viewers clamp tiny delays; 0 or 1 centisecond plays at 10 fps in browsers.
const MIN_FRAME_DELAY: Duration = Duration::from_millis(20);

struct GifFrame {
    image: egui::ColorImage,
    delay: Duration,
}

fn load_gif(path: &Path) -> Result<Vec<GifFrame>> {
    let decoder = GifDecoder::new(BufReader::new(fs::File::open(path)?))?;
    let frames = decoder.into_frames().collect_frames()?;
    Ok(frames
        .into_iter()
        .map(|frame| {
            let (numer, denom) = frame.delay().numer_denom_ms();
            let delay = Duration::from_millis(u64::from(numer) / u64::from(denom.max(1)));
            let buffer = frame.into_buffer();
            let size = [buffer.width() as usize, buffer.height() as usize];
            GifFrame {
                image: egui::ColorImage::from_rgba_unmultiplied(size, buffer.as_raw()),
                delay,
            }
        })
        .collect())
}

/// Which frame is on screen and since when.
#[derive(Debug)]
pub(crate) struct Playback {
    delays: Vec<Duration>,
    current: usize,
    shown_at: Instant,
}

impl Playback {
    pub fn new(delays: Vec<Duration>, now: Instant) -> Self {
        Self {
            delays: delays.into_iter().map(|d| d.max(MIN_FRAME_DELAY)).collect(),
            current: 0,
            shown_at: now,
        }
    }

    pub fn current(&self) -> usize {
        self.current
    }

    /// Moves past every frame whose delay ran out by `now`, wrapping at the end.
    /// Returns how long the current frame still has to stay up.
    pub fn advance(&mut self, now: Instant) -> Option<Duration> {
        if self.delays.is_empty() {
            return None;
        }
        let cycle: Duration = self.delays.iter().sum();
        if now.duration_since(self.shown_at) > cycle {
            // window was hidden or stalled, restart the current frame
            self.shown_at = now;
        }
        loop {
            let delay = self.delays[self.current];
            let elapsed = now.duration_since(self.shown_at);
            if elapsed < delay {
                return Some(delay - elapsed);
            }
            self.shown_at += delay;
            self.current = (self.current + 1) % self.delays.len();
        }
    }
}

struct SummaryViewer {
    textures: Vec<egui::TextureHandle>,
    playback: Playback,
}

impl eframe::App for SummaryViewer {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let wait = self.playback.advance(Instant::now());
        egui::CentralPanel::default().show(ctx, |ui| {
            if let Some(texture) = self.textures.get(self.playback.current()) {
                ui.centered_and_justified(|ui| {
                    ui.add(egui::Image::new(texture).shrink_to_fit());
                });
            }
        });
        if let Some(wait) = wait {
            ctx.request_repaint_after(wait);
        }
    }
}

/// Opens a window looping the GIF at `path`. Blocks until the window is closed.
pub(crate) fn show(path: &Path, title: &str) -> anyhow::Result<()> {
    let frames = load_gif(path)?;
    let [width, height] = frames
        .first()
        .map_or([640, 480], |frame| frame.image.size);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([width as f32, height as f32])
            .with_title(title),
        ..Default::default()
    };

    eframe::run_native(
        title,
        options,
        Box::new(move |cc| {
            let delays = frames.iter().map(|frame| frame.delay).collect();
            let textures = frames
                .into_iter()
                .enumerate()
                .map(|(i, frame)| {
                    cc.egui_ctx.load_texture(
                        format!("frame-{i}"),
                        frame.image,
                        egui::TextureOptions::LINEAR,
                    )
                })
                .collect();
            Ok(Box::new(SummaryViewer {
                textures,
                playback: Playback::new(delays, Instant::now()),
            }))
        }),
    )
    .map_err(|e| anyhow::anyhow!("viewer failed: {e}"))
}

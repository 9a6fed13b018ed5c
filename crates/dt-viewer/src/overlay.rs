//! Text drawn onto frames: channel labels, timestamps and the stream rate

use std::sync::OnceLock;
use std::time::Instant;

use bytes::Bytes;
use chrono::{DateTime, Local};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use rusttype::{point, Font, Scale};

use crate::jpeg;

pub const LIVE_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
pub const RECONNECTING_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const STAMP_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
const BACKDROP: Rgb<u8> = Rgb([0, 0, 0]);

const LABEL_SCALE: f32 = 24.0;
const STAMP_SCALE: f32 = 18.0;
const MARGIN: i32 = 10;

/// Smoothing of the rate estimate
const FPS_ALPHA: f64 = 0.12;

/// The font is compiled into the binary
fn font() -> Option<&'static Font<'static>> {
    static FONT: OnceLock<Option<Font<'static>>> = OnceLock::new();
    FONT.get_or_init(|| {
        let font = Font::try_from_bytes(include_bytes!("../resources/DejaVuSansMono.ttf"));
        if font.is_none() {
            tracing::warn!("Bundled font is unreadable; frames will carry no text");
        }
        font
    })
    .as_ref()
}

/// Pixel width of `text` at `scale`
fn text_width(font: &Font<'_>, scale: Scale, text: &str) -> i32 {
    font.layout(text, scale, point(0.0, 0.0))
        .filter_map(|glyph| glyph.pixel_bounding_box())
        .map(|bb| bb.max.x)
        .max()
        .unwrap_or(0)
}

/// Draw `text` on a dark backdrop with its top-left corner at (x, y)
///
/// Text that runs past the image edge is clipped.
pub fn draw_label(image: &mut RgbImage, text: &str, x: i32, y: i32, size: f32, color: Rgb<u8>) {
    let Some(font) = font() else { return };
    let scale = Scale::uniform(size);
    let width = text_width(font, scale, text);
    if width <= 0 {
        return;
    }

    let pad = (size / 6.0).ceil() as i32;
    let backdrop = Rect::at(x - pad, y - pad).of_size(
        (width + 2 * pad) as u32,
        (size.ceil() as i32 + 2 * pad) as u32,
    );
    draw_filled_rect_mut(image, backdrop, BACKDROP);
    draw_text_mut(image, color, x, y, scale, font, text);
}

/// Channel name in the top-left corner
pub fn draw_channel_label(image: &mut RgbImage, text: &str, color: Rgb<u8>) {
    draw_label(image, text, MARGIN, MARGIN, LABEL_SCALE, color);
}

/// Decode `frame`, label it and encode it again
///
/// Returns `None` when the frame is not a decodable JPEG.
pub fn label_jpeg(frame: &[u8], text: &str, quality: u8) -> Option<Bytes> {
    let mut image = jpeg::decode(frame).ok()?;
    draw_channel_label(&mut image, text, LIVE_COLOR);
    jpeg::encode(&image, quality).ok()
}

/// Exponential moving average of the part rate of one stream
#[derive(Debug, Default)]
pub struct FpsMeter {
    last: Option<Instant>,
    ema: f64,
}

impl FpsMeter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a part sent at `now` and return the smoothed rate
    pub fn tick(&mut self, now: Instant) -> f64 {
        if let Some(last) = self.last.replace(now) {
            let elapsed = now.saturating_duration_since(last).as_secs_f64().max(1e-6);
            let instant = 1.0 / elapsed;
            self.ema = if self.ema > 0.0 {
                (1.0 - FPS_ALPHA) * self.ema + FPS_ALPHA * instant
            } else {
                instant
            };
        }
        self.ema
    }
}

/// Wall-clock time and stream rate printed along the bottom of a part
#[derive(Debug, Clone, Copy)]
pub struct Stamp {
    pub at: DateTime<Local>,
    pub fps: f64,
}

impl Stamp {
    pub fn now(fps: f64) -> Self {
        Self {
            at: Local::now(),
            fps,
        }
    }

    /// Timestamp bottom-left, rate bottom-right
    pub fn draw(&self, image: &mut RgbImage) {
        let Some(font) = font() else { return };
        let scale = Scale::uniform(STAMP_SCALE);
        let y = image.height() as i32 - STAMP_SCALE as i32 - MARGIN;

        let time = self.at.format("%Y-%m-%d %H:%M:%S").to_string();
        draw_label(image, &time, MARGIN, y, STAMP_SCALE, STAMP_COLOR);

        let fps = format!("FPS ~ {:.1}", self.fps);
        let x = (image.width() as i32 - text_width(font, scale, &fps) - MARGIN).max(MARGIN);
        draw_label(image, &fps, x, y, STAMP_SCALE, STAMP_COLOR);
    }
}

/// Decode `frame`, stamp it and encode it again
///
/// Returns `None` when the frame is not a decodable JPEG.
pub fn stamp_jpeg(frame: &[u8], stamp: &Stamp, quality: u8) -> Option<Bytes> {
    let mut image = jpeg::decode(frame).ok()?;
    stamp.draw(&mut image);
    jpeg::encode(&image, quality).ok()
}

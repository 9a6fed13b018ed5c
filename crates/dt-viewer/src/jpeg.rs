//! JPEG frame handling
//!
//! ffmpeg's `mjpeg` muxer writes back-to-back JPEG images with no framing of
//! its own, so frames are cut at the SOI/EOI markers.

use std::io::Cursor;

use bytes::{Buf, Bytes, BytesMut};
use image::codecs::jpeg::JpegEncoder;
use image::{ImageFormat, ImageResult, Rgb, RgbImage};
use tokio_util::codec::Decoder;

use crate::overlay;

const SOI: [u8; 2] = [0xFF, 0xD8];
const EOI: [u8; 2] = [0xFF, 0xD9];

/// Upper bound for a single frame before the stream is considered corrupt
const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Splits a byte stream into JPEG images
#[derive(Debug, Default)]
pub struct JpegFrameCodec {
    /// Bytes after SOI already searched for EOI
    scanned: usize,
}

impl Decoder for JpegFrameCodec {
    type Item = Bytes;
    type Error = std::io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>, Self::Error> {
        if self.scanned == 0 {
            match find_marker(src, SOI, 0) {
                Some(start) => src.advance(start),
                None => {
                    // A trailing 0xFF may be the first half of the next SOI
                    let keep = usize::from(src.last() == Some(&0xFF));
                    let len = src.len();
                    src.advance(len - keep);
                    return Ok(None);
                }
            }
            self.scanned = SOI.len();
        }

        // Step back one byte so a marker split across reads is still found
        let from = self.scanned.saturating_sub(1).max(SOI.len());
        match find_marker(src, EOI, from) {
            Some(end) => {
                self.scanned = 0;
                Ok(Some(src.split_to(end + EOI.len()).freeze()))
            }
            None if src.len() > MAX_FRAME_LEN => Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "JPEG frame exceeds size limit",
            )),
            None => {
                self.scanned = src.len();
                Ok(None)
            }
        }
    }
}

fn find_marker(buf: &[u8], marker: [u8; 2], from: usize) -> Option<usize> {
    buf.get(from..)?
        .windows(2)
        .position(|w| w == marker)
        .map(|pos| pos + from)
}

/// Encode an RGB image as JPEG
pub fn encode(image: &RgbImage, quality: u8) -> ImageResult<Bytes> {
    let mut buf = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100)).encode(
        image,
        image.width(),
        image.height(),
        image::ColorType::Rgb8,
    )?;
    Ok(Bytes::from(buf.into_inner()))
}

/// Decode a JPEG into an RGB image
pub fn decode(data: &[u8]) -> ImageResult<RgbImage> {
    Ok(image::load_from_memory_with_format(data, ImageFormat::Jpeg)?.to_rgb8())
}

/// Frame shown while a channel is (re)connecting
///
/// A dark square with a red bar and "CH<n> (reconnecting...)" below it.
pub fn placeholder(channel: u8, height: u32) -> ImageResult<Bytes> {
    let side = height.max(16);
    let mut image = RgbImage::from_pixel(side, side, Rgb([12, 12, 16]));
    let bar = (side / 24).max(4);
    for y in 0..bar {
        for x in 0..side {
            image.put_pixel(x, y, Rgb([200, 0, 0]));
        }
    }
    overlay::draw_label(
        &mut image,
        &format!("CH{} (reconnecting...)", channel),
        10,
        bar as i32 + 12,
        18.0,
        overlay::RECONNECTING_COLOR,
    );
    encode(&image, 70)
}

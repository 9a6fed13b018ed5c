//! Multi-channel mosaics

use bytes::Bytes;
use image::imageops::{self, FilterType};
use image::RgbImage;

use crate::jpeg;
use crate::overlay::Stamp;

/// Largest canvas a mosaic may allocate
pub const MAX_CANVAS_PIXELS: u64 = 64 * 1024 * 1024;

/// Cell width for a cell height, assuming 16:9 sources
pub fn cell_width(cell_height: u32) -> Option<u32> {
    Some(cell_height.checked_mul(16)? / 9)
}

/// Black canvas, or `None` past the size limit
fn canvas(width: u32, height: u32) -> Option<RgbImage> {
    if u64::from(width) * u64::from(height) > MAX_CANVAS_PIXELS {
        tracing::warn!("Mosaic of {}x{} exceeds the canvas limit", width, height);
        return None;
    }
    Some(RgbImage::new(width, height))
}

/// Layout of a mosaic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// Frames side by side at their own size
    Row,
    /// Fixed-size cells, `cols` per row
    Grid { cols: u32, cell_height: u32 },
}

/// Place frames side by side, top-aligned
///
/// The canvas is as tall as the tallest frame and as wide as all frames
/// together. Returns `None` when there is nothing to draw or the canvas
/// would be too large.
pub fn compose_row(frames: &[RgbImage]) -> Option<RgbImage> {
    let height = frames.iter().map(|f| f.height()).max()?;
    let width = frames
        .iter()
        .try_fold(0u32, |width, f| width.checked_add(f.width()))?;

    let mut canvas = canvas(width, height)?;
    let mut x: i64 = 0;
    for frame in frames {
        imageops::replace(&mut canvas, frame, x, 0);
        x += i64::from(frame.width());
    }
    Some(canvas)
}

/// Resize frames into a grid of equal cells; missing frames stay black
///
/// Returns `None` when there are no frames or the canvas would be too large.
pub fn compose_grid(frames: &[Option<RgbImage>], cols: u32, cell_height: u32) -> Option<RgbImage> {
    if frames.is_empty() {
        return None;
    }

    let cols = cols.max(1);
    let cell_height = cell_height.max(1);
    let cell_width = cell_width(cell_height)?.max(1);
    let rows = u32::try_from(frames.len()).ok()?.div_ceil(cols);

    let mut canvas = canvas(cols.checked_mul(cell_width)?, rows.checked_mul(cell_height)?)?;
    for (i, frame) in frames.iter().enumerate() {
        let Some(frame) = frame else { continue };
        let i = i as u32;
        let (row, col) = (i / cols, i % cols);
        let cell = imageops::resize(frame, cell_width, cell_height, FilterType::Triangle);
        imageops::replace(
            &mut canvas,
            &cell,
            i64::from(col * cell_width),
            i64::from(row * cell_height),
        );
    }
    Some(canvas)
}

/// Decode the current channel frames, compose and stamp them, then encode
/// the result
///
/// Frames that are missing or fail to decode are dropped from a row and
/// left black in a grid.
pub fn render(
    frames: &[Option<Bytes>],
    layout: Layout,
    quality: u8,
    stamp: &Stamp,
) -> Option<Bytes> {
    let decoded: Vec<Option<RgbImage>> = frames
        .iter()
        .map(|f| f.as_ref().and_then(|data| jpeg::decode(data).ok()))
        .collect();

    let mut canvas = match layout {
        Layout::Row => {
            let present: Vec<RgbImage> = decoded.into_iter().flatten().collect();
            compose_row(&present)?
        }
        Layout::Grid { cols, cell_height } => compose_grid(&decoded, cols, cell_height)?,
    };
    stamp.draw(&mut canvas);

    match jpeg::encode(&canvas, quality) {
        Ok(data) => Some(data),
        Err(e) => {
            tracing::warn!("Failed to encode mosaic: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn solid(width: u32, height: u32, value: u8) -> RgbImage {
        RgbImage::from_pixel(width, height, Rgb([value, value, value]))
    }

    #[test]
    fn test_row_dimensions() {
        let canvas = compose_row(&[solid(100, 50, 10), solid(60, 80, 200)]).unwrap();
        assert_eq!(canvas.dimensions(), (160, 80));
        assert_eq!(canvas.get_pixel(0, 0), &Rgb([10, 10, 10]));
        assert_eq!(canvas.get_pixel(100, 0), &Rgb([200, 200, 200]));
        // Below the shorter frame stays black
        assert_eq!(canvas.get_pixel(0, 70), &Rgb([0, 0, 0]));
        assert!(compose_row(&[]).is_none());
    }

    #[test]
    fn test_grid_layout() {
        let frames = vec![Some(solid(32, 18, 255)), None, Some(solid(10, 10, 100))];
        let canvas = compose_grid(&frames, 2, 90).unwrap();

        // 2 columns of 160x90 cells, 2 rows
        assert_eq!(canvas.dimensions(), (320, 180));
        assert_eq!(canvas.get_pixel(10, 10), &Rgb([255, 255, 255]));
        assert_eq!(canvas.get_pixel(170, 10), &Rgb([0, 0, 0]));
        assert_eq!(canvas.get_pixel(10, 100), &Rgb([100, 100, 100]));
    }

    #[test]
    fn test_grid_too_large_is_refused() {
        let frames = vec![Some(solid(32, 18, 255))];
        assert!(compose_grid(&frames, 10_000_000, 360).is_none());
        assert!(compose_grid(&frames, u32::MAX, 360).is_none());
        assert!(compose_grid(&frames, 2, u32::MAX).is_none());
        assert!(compose_grid(&frames, 4, 1080).is_some());
    }

    #[test]
    fn test_render_skips_undecodable() {
        let stamp = Stamp::now(12.0);
        let good = jpeg::encode(&solid(64, 36, 128), 90).unwrap();
        let frames = vec![Some(good), Some(Bytes::from_static(b"not a jpeg")), None];

        let row = render(&frames, Layout::Row, 80, &stamp).unwrap();
        assert_eq!(jpeg::decode(&row).unwrap().dimensions(), (64, 36));

        let grid = render(
            &frames,
            Layout::Grid {
                cols: 4,
                cell_height: 36,
            },
            80,
            &stamp,
        )
        .unwrap();
        assert_eq!(jpeg::decode(&grid).unwrap().dimensions(), (256, 36));

        assert!(render(&[None], Layout::Row, 80, &stamp).is_none());
    }
}

//! Fixed-size RGBA canvas the recorder captures from.
//!
//! Blits use nearest-neighbor sampling on pixel centers. Destination
//! rectangles are in canvas pixels and may be fractional.

use admock_preview_model::geometry::{CanvasSize, DrawRect, Rect};
use image::RgbaImage;

const OPAQUE_BLACK: [u8; 4] = [0, 0, 0, 255];

/// The composited frame buffer.
#[derive(Debug, Clone)]
pub struct Canvas {
    image: RgbaImage,
}

impl Canvas {
    pub fn new(size: CanvasSize) -> Self {
        Self {
            image: RgbaImage::new(size.width, size.height),
        }
    }

    pub fn size(&self) -> CanvasSize {
        CanvasSize::new(self.image.width(), self.image.height())
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// Fill with opaque black.
    pub fn clear(&mut self) {
        for px in self.image.chunks_exact_mut(4) {
            px.copy_from_slice(&OPAQUE_BLACK);
        }
    }

    /// Copy `src` scaled into `dest`, touching only pixels inside `clip`.
    pub fn draw_image(&mut self, src: &RgbaImage, dest: &DrawRect, clip: &Rect) {
        let Some(span) = self.span(dest, clip, src) else {
            return;
        };
        let stride = self.image.width() as usize * 4;
        let src_stride = src.width() as usize * 4;
        let src_raw = src.as_raw();
        let dst_raw: &mut [u8] = &mut self.image;

        for (row, sy) in span.rows.iter().enumerate() {
            let y = span.y0 + row;
            let dst_row = &mut dst_raw[y * stride..(y + 1) * stride];
            let src_row = &src_raw[sy * src_stride..(sy + 1) * src_stride];
            for (col, sx) in span.cols.iter().enumerate() {
                let d = (span.x0 + col) * 4;
                let s = sx * 4;
                dst_row[d..d + 3].copy_from_slice(&src_row[s..s + 3]);
                dst_row[d + 3] = 255;
            }
        }
    }

    /// Alpha-composite `overlay` over the whole canvas, scaling it when its
    /// size differs.
    pub fn draw_overlay(&mut self, overlay: &RgbaImage) {
        if overlay.dimensions() == self.image.dimensions() {
            for (dst, src) in self
                .image
                .chunks_exact_mut(4)
                .zip(overlay.as_raw().chunks_exact(4))
            {
                blend_over(dst, src);
            }
            return;
        }

        let full = self.size().full_rect();
        let Some(span) = self.span(&DrawRect::from(full), &full, overlay) else {
            return;
        };
        let stride = self.image.width() as usize * 4;
        let src_stride = overlay.width() as usize * 4;
        let src_raw = overlay.as_raw();
        let dst_raw: &mut [u8] = &mut self.image;

        for (row, sy) in span.rows.iter().enumerate() {
            let y = span.y0 + row;
            let dst_row = &mut dst_raw[y * stride..(y + 1) * stride];
            let src_row = &src_raw[sy * src_stride..(sy + 1) * src_stride];
            for (col, sx) in span.cols.iter().enumerate() {
                let d = (span.x0 + col) * 4;
                let s = sx * 4;
                blend_over(&mut dst_row[d..d + 4], &src_row[s..s + 4]);
            }
        }
    }

    /// Destination pixels covered by `dest ∩ clip ∩ canvas`, with the source
    /// column/row sampled for each.
    fn span(&self, dest: &DrawRect, clip: &Rect, src: &RgbaImage) -> Option<Span> {
        let (src_w, src_h) = src.dimensions();
        if src_w == 0 || src_h == 0 || !(dest.draw_width > 0.0 && dest.draw_height > 0.0) {
            return None;
        }
        let visible = dest.as_rect().intersect(clip)?.intersect(&self.size().full_rect())?;

        let (x0, x1) = pixel_range(visible.x, visible.right(), self.image.width());
        let (y0, y1) = pixel_range(visible.y, visible.bottom(), self.image.height());
        if x0 >= x1 || y0 >= y1 {
            return None;
        }

        let cols = (x0..x1)
            .map(|x| sample_index(x, dest.draw_x, dest.draw_width, src_w))
            .collect();
        let rows = (y0..y1)
            .map(|y| sample_index(y, dest.draw_y, dest.draw_height, src_h))
            .collect();
        Some(Span { x0, y0, cols, rows })
    }
}

struct Span {
    x0: usize,
    y0: usize,
    cols: Vec<usize>,
    rows: Vec<usize>,
}

/// Pixels whose centers fall inside `[start, end)`.
fn pixel_range(start: f64, end: f64, limit: u32) -> (usize, usize) {
    let lo = (start - 0.5).ceil().max(0.0) as usize;
    let hi = ((end - 0.5).ceil().max(0.0) as usize).min(limit as usize);
    (lo, hi)
}

fn sample_index(pixel: usize, origin: f64, extent: f64, src_len: u32) -> usize {
    let t = (pixel as f64 + 0.5 - origin) / extent;
    ((t * src_len as f64).floor().max(0.0) as usize).min(src_len as usize - 1)
}

/// Source-over with an opaque destination.
fn blend_over(dst: &mut [u8], src: &[u8]) {
    let a = src[3] as u32;
    match a {
        0 => {}
        255 => dst[..3].copy_from_slice(&src[..3]),
        _ => {
            for i in 0..3 {
                let blended = src[i] as u32 * a + dst[i] as u32 * (255 - a);
                dst[i] = ((blended + 127) / 255) as u8;
            }
            dst[3] = 255;
        }
    }
}

use std::ops::Range;

use thiserror::Error;

use crate::annotation::infrastructure::stamp_image::StampImage;
use crate::shared::frame::BYTES_PER_PIXEL;
use crate::shared::rect::PixelRect;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum BitmapError {
    #[error("bitmap dimensions must be positive, got {width}x{height}")]
    ZeroDimensions { width: u32, height: u32 },
    #[error("bytes per row ({bytes_per_row}) cannot hold {width} BGRA pixels")]
    StrideTooSmall { bytes_per_row: usize, width: u32 },
    #[error("buffer of {actual} bytes is too short for {expected}")]
    BufferTooShort { actual: usize, expected: usize },
}

/// Drawing surface bound directly to caller-owned BGRA memory.
///
/// 8 bits per channel, little-endian 32-bit pixels with premultiplied alpha
/// first (bytes B, G, R, A). Coordinates have their origin at the
/// bottom-left corner with y growing upward; memory rows are top-down.
/// A pixel is covered by a shape when its centre is inside the shape
/// (left/bottom edges inclusive, right/top exclusive). Everything is clipped
/// to the surface.
pub struct BitmapContext<'a> {
    data: &'a mut [u8],
    width: u32,
    height: u32,
    bytes_per_row: usize,
}

impl<'a> BitmapContext<'a> {
    pub fn new(
        data: &'a mut [u8],
        width: u32,
        height: u32,
        bytes_per_row: usize,
    ) -> Result<Self, BitmapError> {
        if width == 0 || height == 0 {
            return Err(BitmapError::ZeroDimensions { width, height });
        }
        if bytes_per_row < width as usize * BYTES_PER_PIXEL {
            return Err(BitmapError::StrideTooSmall {
                bytes_per_row,
                width,
            });
        }
        let expected = bytes_per_row * height as usize;
        if data.len() < expected {
            return Err(BitmapError::BufferTooShort {
                actual: data.len(),
                expected,
            });
        }
        Ok(Self {
            data,
            width,
            height,
            bytes_per_row,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Strokes the boundary of `rect` with a line of `line_width` centred on
    /// the edges. The interior is left untouched.
    pub fn stroke_rect(&mut self, rect: &PixelRect, line_width: f64, color: [u8; 4]) {
        if !rect.is_finite() || rect.is_empty() || line_width <= 0.0 {
            return;
        }
        let half = line_width / 2.0;
        let outer = rect.inset(-half);
        let inner = rect.inset(half);

        let cols = span(outer.x, outer.max_x(), self.width);
        let rows = span(outer.y, outer.max_y(), self.height);
        let (inner_cols, inner_rows) = if inner.is_empty() {
            (0..0, 0..0)
        } else {
            (
                span(inner.x, inner.max_x(), self.width),
                span(inner.y, inner.max_y(), self.height),
            )
        };

        for py in rows {
            if inner_rows.contains(&py) {
                for px in cols.start..inner_cols.start.max(cols.start) {
                    self.put(px, py, color);
                }
                for px in inner_cols.end.min(cols.end)..cols.end {
                    self.put(px, py, color);
                }
            } else {
                for px in cols.clone() {
                    self.put(px, py, color);
                }
            }
        }
    }

    /// Draws `image` scaled to fill `rect`, upright, composited over the
    /// existing pixels. Sampling is nearest-neighbour.
    pub fn draw_image(&mut self, image: &StampImage, rect: &PixelRect) {
        if !rect.is_finite() || rect.is_empty() {
            return;
        }
        let sw = image.width();
        let sh = image.height();
        let cols = span(rect.x, rect.max_x(), self.width);
        let rows = span(rect.y, rect.max_y(), self.height);

        for py in rows {
            // The image's first row sits at the top edge of the rect.
            let v = ((rect.max_y() - (py as f64 + 0.5)) / rect.height * sh as f64) as u32;
            let v = v.min(sh - 1);
            for px in cols.clone() {
                let u = ((px as f64 + 0.5 - rect.x) / rect.width * sw as f64) as u32;
                let u = u.min(sw - 1);
                self.blend(px, py, image.pixel(u, v));
            }
        }
    }

    /// BGRA pixel at `(x, y)` in surface coordinates.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = self.offset(x, y);
        let mut px = [0u8; 4];
        px.copy_from_slice(&self.data[offset..offset + BYTES_PER_PIXEL]);
        Some(px)
    }

    fn offset(&self, x: u32, y: u32) -> usize {
        let row = (self.height - 1 - y) as usize;
        row * self.bytes_per_row + x as usize * BYTES_PER_PIXEL
    }

    fn put(&mut self, x: u32, y: u32, color: [u8; 4]) {
        let offset = self.offset(x, y);
        self.data[offset..offset + BYTES_PER_PIXEL].copy_from_slice(&color);
    }

    fn blend(&mut self, x: u32, y: u32, src: [u8; 4]) {
        let src_a = src[3] as u32;
        if src_a == 255 {
            self.put(x, y, src);
            return;
        }
        if src_a == 0 {
            return;
        }
        let offset = self.offset(x, y);
        let dst = &mut self.data[offset..offset + BYTES_PER_PIXEL];
        for c in 0..BYTES_PER_PIXEL {
            let blended = src[c] as u32 + (dst[c] as u32 * (255 - src_a) + 127) / 255;
            dst[c] = blended.min(255) as u8;
        }
    }
}

/// Pixel indices whose centres fall in `[lo, hi)`, clipped to `[0, limit)`.
fn span(lo: f64, hi: f64, limit: u32) -> Range<u32> {
    let limit_f = limit as f64;
    let start = (lo - 0.5).ceil().clamp(0.0, limit_f) as u32;
    let end = (hi - 0.5).ceil().clamp(0.0, limit_f) as u32;
    start..end.max(start)
}

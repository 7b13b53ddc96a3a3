use crate::shared::rect::{NormalizedRect, PixelRect};

/// Scales a normalized rect to pixel space. No clamping: boxes the detector
/// placed partly outside the frame stay outside.
pub fn map(rect: &NormalizedRect, frame_width: u32, frame_height: u32) -> PixelRect {
    let w = frame_width as f64;
    let h = frame_height as f64;
    PixelRect::new(
        rect.min_x * w,
        rect.min_y * h,
        rect.width * w,
        rect.height * h,
    )
}

/// Inverse of [`map`].
pub fn unmap(rect: &PixelRect, frame_width: u32, frame_height: u32) -> NormalizedRect {
    let w = frame_width as f64;
    let h = frame_height as f64;
    NormalizedRect::new(rect.x / w, rect.y / h, rect.width / w, rect.height / h)
}

/// Maps every rect, preserving count and order.
pub fn map_all(rects: &[NormalizedRect], frame_width: u32, frame_height: u32) -> Vec<PixelRect> {
    rects
        .iter()
        .map(|r| map(r, frame_width, frame_height))
        .collect()
}

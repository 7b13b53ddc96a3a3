use std::path::Path;

use image::RgbaImage;

use crate::annotation::domain::annotated_frame::AnnotatedFrame;
use crate::shared::frame::{Frame, BYTES_PER_PIXEL};
use crate::shared::orientation::Orientation;
use crate::shared::pixel::bgra_premultiplied_to_rgba;
use crate::video::domain::image_writer::ImageWriter;

/// Writes annotated frames to image files using the `image` crate.
///
/// The output format follows the file extension.
pub struct ImageFileWriter;

impl ImageFileWriter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ImageFileWriter {
    fn default() -> Self {
        Self::new()
    }
}

fn to_rgba_image(frame: &Frame) -> Result<RgbaImage, Box<dyn std::error::Error>> {
    let data = frame
        .data()
        .ok_or_else(|| format!("frame {} has no pixel memory", frame.index()))?;
    let row_bytes = frame.width() as usize * BYTES_PER_PIXEL;

    let mut rgba = Vec::with_capacity(row_bytes * frame.height() as usize);
    for row in data.chunks(frame.bytes_per_row()).take(frame.height() as usize) {
        for px in row[..row_bytes].chunks_exact(BYTES_PER_PIXEL) {
            rgba.extend_from_slice(&bgra_premultiplied_to_rgba([px[0], px[1], px[2], px[3]]));
        }
    }

    RgbaImage::from_raw(frame.width(), frame.height(), rgba)
        .ok_or_else(|| "failed to create image from frame data".into())
}

/// Rotates the captured image so it displays upright for the given
/// interface orientation.
pub fn apply_orientation(img: RgbaImage, orientation: Orientation) -> RgbaImage {
    match orientation {
        Orientation::Up => img,
        Orientation::Down => image::imageops::rotate180(&img),
        Orientation::Left => image::imageops::rotate270(&img),
        Orientation::Right => image::imageops::rotate90(&img),
    }
}

impl ImageWriter for ImageFileWriter {
    fn write(&self, path: &Path, frame: &AnnotatedFrame) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let img = apply_orientation(to_rgba_image(frame.frame())?, frame.orientation());
        img.save(path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED_BGRA: [u8; 4] = [0, 0, 255, 255];
    const BLUE_BGRA: [u8; 4] = [255, 0, 0, 255];

    fn annotated(frame: Frame, orientation: Orientation) -> AnnotatedFrame {
        AnnotatedFrame::new(frame, orientation, 0)
    }

    /// 3x2 frame, all blue except a red pixel in the top-left corner.
    fn marked_frame() -> Frame {
        let mut data: Vec<u8> = BLUE_BGRA.iter().copied().cycle().take(3 * 2 * 4).collect();
        data[..4].copy_from_slice(&RED_BGRA);
        Frame::new(data, 3, 2, 12, 0).unwrap()
    }

    fn write_and_read(frame: AnnotatedFrame) -> RgbaImage {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.png");
        ImageFileWriter::new().write(&path, &frame).unwrap();
        image::open(&path).unwrap().to_rgba8()
    }

    #[test]
    fn test_write_creates_file_and_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.png");
        let frame = Frame::filled(10, 8, BLUE_BGRA, 0).unwrap();

        ImageFileWriter::new()
            .write(&path, &annotated(frame, Orientation::Up))
            .unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_pixels_are_written_as_rgba() {
        let img = write_and_read(annotated(marked_frame(), Orientation::Up));
        assert_eq!(img.dimensions(), (3, 2));
        assert_eq!(img.get_pixel(0, 0).0, [255, 0, 0, 255]);
        assert_eq!(img.get_pixel(2, 1).0, [0, 0, 255, 255]);
    }

    #[test]
    fn test_row_padding_is_skipped() {
        let mut data = vec![0u8; 2 * 16];
        data[..8].copy_from_slice(&[RED_BGRA, RED_BGRA].concat());
        data[16..24].copy_from_slice(&[BLUE_BGRA, BLUE_BGRA].concat());
        let frame = Frame::new(data, 2, 2, 16, 0).unwrap();

        let img = write_and_read(annotated(frame, Orientation::Up));
        assert_eq!(img.get_pixel(1, 0).0, [255, 0, 0, 255]);
        assert_eq!(img.get_pixel(0, 1).0, [0, 0, 255, 255]);
    }

    #[test]
    fn test_translucent_pixels_are_unpremultiplied() {
        let frame = Frame::filled(1, 1, [25, 50, 100, 128], 0).unwrap();
        let img = write_and_read(annotated(frame, Orientation::Up));
        let [r, g, b, a] = img.get_pixel(0, 0).0;
        assert!((r as i32 - 200).abs() <= 1);
        assert!((g as i32 - 100).abs() <= 1);
        assert!((b as i32 - 50).abs() <= 1);
        assert_eq!(a, 128);
    }

    #[test]
    fn test_down_rotates_180() {
        let img = write_and_read(annotated(marked_frame(), Orientation::Down));
        assert_eq!(img.dimensions(), (3, 2));
        assert_eq!(img.get_pixel(2, 1).0, [255, 0, 0, 255]);
    }

    #[test]
    fn test_right_rotates_90_clockwise() {
        let img = write_and_read(annotated(marked_frame(), Orientation::Right));
        assert_eq!(img.dimensions(), (2, 3));
        // Top-left moves to top-right.
        assert_eq!(img.get_pixel(1, 0).0, [255, 0, 0, 255]);
    }

    #[test]
    fn test_left_rotates_270_clockwise() {
        let img = write_and_read(annotated(marked_frame(), Orientation::Left));
        assert_eq!(img.dimensions(), (2, 3));
        // Top-left moves to bottom-left.
        assert_eq!(img.get_pixel(0, 2).0, [255, 0, 0, 255]);
    }

    #[test]
    fn test_frame_without_storage_fails() {
        let dir = tempfile::tempdir().unwrap();
        let frame = Frame::without_storage(4, 4, 16, 0).unwrap();
        assert!(ImageFileWriter::new()
            .write(&dir.path().join("x.png"), &annotated(frame, Orientation::Up))
            .is_err());
    }
}

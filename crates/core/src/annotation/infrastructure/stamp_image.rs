use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::shared::pixel::rgba_to_bgra_premultiplied;

#[derive(Error, Debug)]
pub enum StampError {
    #[error("failed to decode stamp image {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("stamp image {0} has zero dimensions")]
    Empty(PathBuf),
}

/// Decorative image drawn by the stamp style, stored as premultiplied BGRA
/// rows without padding so it can be composited straight onto a frame.
#[derive(Clone, Debug, PartialEq)]
pub struct StampImage {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl StampImage {
    pub fn from_rgba(img: &image::RgbaImage) -> Option<Self> {
        let (width, height) = img.dimensions();
        if width == 0 || height == 0 {
            return None;
        }
        let mut pixels = Vec::with_capacity(width as usize * height as usize * 4);
        for px in img.pixels() {
            pixels.extend_from_slice(&rgba_to_bgra_premultiplied(px.0));
        }
        Some(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn load(path: &Path) -> Result<Self, StampError> {
        let img = image::open(path)
            .map_err(|source| StampError::Decode {
                path: path.to_path_buf(),
                source,
            })?
            .to_rgba8();
        Self::from_rgba(&img).ok_or_else(|| StampError::Empty(path.to_path_buf()))
    }

    /// Loads the stamp at startup. A missing or broken asset is not fatal:
    /// the stamp styles then draw nothing.
    pub fn load_optional(path: Option<&Path>) -> Option<Arc<Self>> {
        let path = path?;
        match Self::load(path) {
            Ok(stamp) => {
                log::info!(
                    "Loaded stamp image {} ({}x{})",
                    path.display(),
                    stamp.width,
                    stamp.height
                );
                Some(Arc::new(stamp))
            }
            Err(e) => {
                log::warn!("{e}; stamp markers will be skipped");
                None
            }
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Premultiplied BGRA pixel at column `x`, row `y` (top-down).
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let offset = (y as usize * self.width as usize + x as usize) * 4;
        let mut px = [0u8; 4];
        px.copy_from_slice(&self.pixels[offset..offset + 4]);
        px
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_rgba_swaps_to_bgra() {
        let img = image::RgbaImage::from_pixel(2, 2, image::Rgba([10, 20, 30, 255]));
        let stamp = StampImage::from_rgba(&img).unwrap();
        assert_eq!(stamp.width(), 2);
        assert_eq!(stamp.height(), 2);
        assert_eq!(stamp.pixel(1, 1), [30, 20, 10, 255]);
    }

    #[test]
    fn test_from_rgba_premultiplies() {
        let img = image::RgbaImage::from_pixel(1, 1, image::Rgba([255, 0, 200, 128]));
        let stamp = StampImage::from_rgba(&img).unwrap();
        assert_eq!(stamp.pixel(0, 0), [100, 0, 128, 128]);
    }

    #[test]
    fn test_from_rgba_rejects_empty() {
        let img = image::RgbaImage::new(0, 4);
        assert!(StampImage::from_rgba(&img).is_none());
    }

    #[test]
    fn test_load_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stamp.png");
        image::RgbaImage::from_pixel(3, 2, image::Rgba([0, 0, 255, 255]))
            .save(&path)
            .unwrap();

        let stamp = StampImage::load(&path).unwrap();
        assert_eq!((stamp.width(), stamp.height()), (3, 2));
        assert_eq!(stamp.pixel(0, 0), [255, 0, 0, 255]);
    }

    #[test]
    fn test_load_missing_file_fails() {
        let err = StampImage::load(Path::new("/nonexistent/stamp.png")).unwrap_err();
        assert!(matches!(err, StampError::Decode { .. }));
    }

    #[test]
    fn test_load_optional_missing_is_none() {
        assert!(StampImage::load_optional(Some(Path::new("/nonexistent/stamp.png"))).is_none());
        assert!(StampImage::load_optional(None).is_none());
    }
}

use std::fs;
use std::path::{Path, PathBuf};

use crate::shared::constants::IMAGE_EXTENSIONS;
use crate::shared::frame::{Frame, BYTES_PER_PIXEL};
use crate::shared::pixel::rgba_to_bgra_premultiplied;
use crate::video::domain::frame_reader::{FrameReader, SourceMetadata};

/// Reads a still image, or every image in a directory, as a frame sequence.
///
/// Directory entries are taken in file-name order and filtered by
/// extension. Each file is decoded only when its frame is requested.
pub struct ImageFileReader {
    paths: Option<Vec<PathBuf>>,
}

impl ImageFileReader {
    pub fn new() -> Self {
        Self { paths: None }
    }
}

impl Default for ImageFileReader {
    fn default() -> Self {
        Self::new()
    }
}

pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn list_images(dir: &Path) -> Result<Vec<PathBuf>, Box<dyn std::error::Error>> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && is_image_file(&path) {
            paths.push(path);
        }
    }
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(paths)
}

fn decode_frame(path: &Path, index: usize) -> Result<Frame, Box<dyn std::error::Error>> {
    let img = image::open(path)
        .map_err(|e| format!("failed to decode {}: {e}", path.display()))?
        .to_rgba8();
    let (width, height) = img.dimensions();
    let mut data = Vec::with_capacity(width as usize * height as usize * BYTES_PER_PIXEL);
    for px in img.pixels() {
        data.extend_from_slice(&rgba_to_bgra_premultiplied(px.0));
    }
    Ok(Frame::new(
        data,
        width,
        height,
        width as usize * BYTES_PER_PIXEL,
        index,
    )?)
}

impl FrameReader for ImageFileReader {
    fn open(&mut self, path: &Path) -> Result<SourceMetadata, Box<dyn std::error::Error>> {
        let paths = if path.is_dir() {
            list_images(path)?
        } else if path.is_file() {
            vec![path.to_path_buf()]
        } else {
            return Err(format!("input not found: {}", path.display()).into());
        };

        let first = paths
            .first()
            .ok_or_else(|| format!("no images found in {}", path.display()))?;
        let (width, height) = image::image_dimensions(first)
            .map_err(|e| format!("failed to read {}: {e}", first.display()))?;

        log::debug!("Opened {} image(s) from {}", paths.len(), path.display());

        let metadata = SourceMetadata {
            width,
            height,
            total_frames: paths.len(),
            source_path: Some(path.to_path_buf()),
        };
        self.paths = Some(paths);
        Ok(metadata)
    }

    fn frames(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_> {
        match &self.paths {
            Some(paths) => Box::new(
                paths
                    .iter()
                    .enumerate()
                    .map(|(index, path)| decode_frame(path, index)),
            ),
            None => Box::new(std::iter::once(Err("ImageFileReader: not opened".into()))),
        }
    }

    fn close(&mut self) {
        self.paths = None;
    }
}

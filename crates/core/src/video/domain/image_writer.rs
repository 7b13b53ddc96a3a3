use std::path::Path;

use crate::annotation::domain::annotated_frame::AnnotatedFrame;

/// Presents an annotated frame by writing it to an image file.
pub trait ImageWriter: Send {
    /// Writes the frame upright according to its orientation tag.
    fn write(&self, path: &Path, frame: &AnnotatedFrame) -> Result<(), Box<dyn std::error::Error>>;
}

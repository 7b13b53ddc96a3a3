use crate::shared::frame::Frame;
use crate::shared::rect::NormalizedRect;

/// Domain interface for face detection.
///
/// Returns one normalized, bottom-left-origin rect per face, in whatever
/// order the detector produces them. Implementations may keep state across
/// frames, hence `&mut self`.
pub trait FaceDetector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<NormalizedRect>, Box<dyn std::error::Error>>;
}

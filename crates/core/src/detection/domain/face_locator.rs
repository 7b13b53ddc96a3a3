use crate::detection::domain::face_detector::FaceDetector;
use crate::shared::frame::Frame;
use crate::shared::rect::NormalizedRect;

/// Runs the face detector for one frame and never fails.
///
/// A detector error is logged and reported as "no faces", so a bad frame
/// cannot stall delivery of the next one.
pub struct FaceLocator {
    detector: Box<dyn FaceDetector>,
}

impl FaceLocator {
    pub fn new(detector: Box<dyn FaceDetector>) -> Self {
        Self { detector }
    }

    pub fn locate(&mut self, frame: &Frame) -> Vec<NormalizedRect> {
        match self.detector.detect(frame) {
            Ok(rects) => rects,
            Err(e) => {
                log::warn!("Face detection failed on frame {}: {e}", frame.index());
                Vec::new()
            }
        }
    }
}

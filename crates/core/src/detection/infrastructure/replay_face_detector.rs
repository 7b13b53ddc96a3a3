use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::detection::domain::face_detector::FaceDetector;
use crate::shared::frame::Frame;
use crate::shared::rect::NormalizedRect;

/// Replays recorded detections by frame index.
///
/// Lets a run be reproduced without a model: the recording is a JSON object
/// mapping frame index to a list of normalized rects, e.g.
/// `{"0": [{"min_x": 0.1, "min_y": 0.1, "width": 0.2, "height": 0.2}]}`.
pub struct ReplayFaceDetector {
    recording: Arc<HashMap<usize, Vec<NormalizedRect>>>,
}

impl ReplayFaceDetector {
    pub fn new(recording: Arc<HashMap<usize, Vec<NormalizedRect>>>) -> Self {
        Self { recording }
    }

    pub fn from_json_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let json = fs::read_to_string(path)
            .map_err(|e| format!("failed to read detections {}: {e}", path.display()))?;
        let recording: HashMap<usize, Vec<NormalizedRect>> = serde_json::from_str(&json)
            .map_err(|e| format!("invalid detections {}: {e}", path.display()))?;
        log::info!(
            "Loaded recorded detections for {} frames from {}",
            recording.len(),
            path.display()
        );
        Ok(Self::new(Arc::new(recording)))
    }
}

impl FaceDetector for ReplayFaceDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<NormalizedRect>, Box<dyn std::error::Error>> {
        Ok(self
            .recording
            .get(&frame.index())
            .cloned()
            .unwrap_or_default())
    }
}

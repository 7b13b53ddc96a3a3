use std::path::{Path, PathBuf};

use crate::shared::frame::Frame;

/// What a reader learned about its source on open.
#[derive(Clone, Debug, PartialEq)]
pub struct SourceMetadata {
    pub width: u32,
    pub height: u32,
    /// 0 when the source is unbounded.
    pub total_frames: usize,
    pub source_path: Option<PathBuf>,
}

/// Delivers BGRA frames from a capture source.
///
/// Implementations own decoding; the pipeline only sees [`Frame`]s.
pub trait FrameReader: Send {
    fn open(&mut self, path: &Path) -> Result<SourceMetadata, Box<dyn std::error::Error>>;

    /// Frames in delivery order, indexed from 0.
    fn frames(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_>;

    fn close(&mut self);
}

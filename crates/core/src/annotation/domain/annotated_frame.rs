use crate::shared::frame::Frame;
use crate::shared::orientation::Orientation;

/// A frame after in-place drawing, tagged for presentation.
#[derive(Clone, Debug)]
pub struct AnnotatedFrame {
    frame: Frame,
    orientation: Orientation,
    markers_drawn: usize,
}

impl AnnotatedFrame {
    pub fn new(frame: Frame, orientation: Orientation, markers_drawn: usize) -> Self {
        Self {
            frame,
            orientation,
            markers_drawn,
        }
    }

    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn markers_drawn(&self) -> usize {
        self.markers_drawn
    }

    pub fn index(&self) -> usize {
        self.frame.index()
    }
}

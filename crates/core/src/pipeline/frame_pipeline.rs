use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::annotation::domain::annotated_frame::AnnotatedFrame;
use crate::annotation::domain::coordinate_mapper;
use crate::annotation::domain::frame_annotator::FrameAnnotator;
use crate::annotation::domain::marker_style::MarkerStyle;
use crate::detection::domain::face_locator::FaceLocator;
use crate::pipeline::pipeline_logger::{NullPipelineLogger, PipelineLogger};
use crate::shared::frame::Frame;
use crate::shared::orientation::Orientation;

/// Cloneable token that lets another thread discard in-flight work.
#[derive(Clone, Debug)]
pub struct PipelineHandle {
    generation: Arc<AtomicU64>,
}

impl PipelineHandle {
    /// Any frame currently between detection and annotation is dropped.
    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}

/// Locate → map → annotate for one frame at a time.
///
/// Each call to [`process`](Self::process) claims a new generation before
/// detection. If the generation moved on by the time detection returns
/// (a newer frame, a style switch, an orientation switch), the stale
/// result is dropped rather than drawn.
pub struct FramePipeline {
    locator: FaceLocator,
    annotator: FrameAnnotator,
    generation: Arc<AtomicU64>,
    logger: Box<dyn PipelineLogger>,
    processed: usize,
    expected_frames: usize,
}

impl FramePipeline {
    pub fn new(locator: FaceLocator, annotator: FrameAnnotator) -> Self {
        Self {
            locator,
            annotator,
            generation: Arc::new(AtomicU64::new(0)),
            logger: Box::new(NullPipelineLogger),
            processed: 0,
            expected_frames: 0,
        }
    }

    pub fn with_logger(mut self, logger: Box<dyn PipelineLogger>) -> Self {
        self.logger = logger;
        self
    }

    /// Total used for progress reporting; 0 for an unbounded source.
    pub fn set_expected_frames(&mut self, total: usize) {
        self.expected_frames = total;
    }

    pub fn handle(&self) -> PipelineHandle {
        PipelineHandle {
            generation: Arc::clone(&self.generation),
        }
    }

    pub fn style(&self) -> MarkerStyle {
        self.annotator.style()
    }

    pub fn orientation(&self) -> Orientation {
        self.annotator.orientation()
    }

    pub fn set_style(&mut self, style: MarkerStyle) {
        if self.annotator.style() != style {
            log::info!("Marker style: {} -> {style}", self.annotator.style());
        }
        self.annotator.set_style(style);
        self.handle().invalidate();
    }

    pub fn set_orientation(&mut self, orientation: Orientation) {
        if self.annotator.orientation() != orientation {
            log::info!(
                "Orientation: {} -> {orientation}",
                self.annotator.orientation()
            );
        }
        self.annotator.set_orientation(orientation);
        self.handle().invalidate();
    }

    pub fn logger(&self) -> &dyn PipelineLogger {
        self.logger.as_ref()
    }

    pub fn process(&mut self, frame: Frame) -> Option<AnnotatedFrame> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let index = frame.index();

        let t0 = Instant::now();
        let faces = self.locator.locate(&frame);
        self.logger
            .timing("detect", t0.elapsed().as_secs_f64() * 1000.0);

        self.processed += 1;
        self.logger.progress(self.processed, self.expected_frames);

        if self.generation.load(Ordering::SeqCst) != generation {
            self.logger.frame_dropped(index, "superseded");
            return None;
        }

        self.logger.metric("faces", faces.len() as f64);
        let rects = coordinate_mapper::map_all(&faces, frame.width(), frame.height());

        let t1 = Instant::now();
        let annotated = self.annotator.annotate(frame, &rects);
        self.logger
            .timing("annotate", t1.elapsed().as_secs_f64() * 1000.0);

        if annotated.is_none() {
            self.logger.frame_dropped(index, "pixel memory unavailable");
        }
        annotated
    }
}

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::pipeline::frame_pipeline::FramePipeline;
use crate::video::domain::frame_reader::FrameReader;
use crate::video::domain::image_writer::ImageWriter;

/// Outcome of one sequence run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SequenceSummary {
    pub frames_read: usize,
    pub frames_written: usize,
    pub frames_dropped: usize,
    pub markers_drawn: usize,
    pub cancelled: bool,
}

/// Progress callback: `(current, total)`. Return `false` to stop the run.
pub type ProgressFn = Box<dyn Fn(usize, usize) -> bool + Send>;

/// Offline pipeline: read → locate → map → annotate → write, one file per
/// delivered frame.
pub struct AnnotateSequenceUseCase {
    reader: Box<dyn FrameReader>,
    writer: Box<dyn ImageWriter>,
    pipeline: FramePipeline,
    on_progress: Option<ProgressFn>,
    cancelled: Arc<AtomicBool>,
}

impl AnnotateSequenceUseCase {
    pub fn new(
        reader: Box<dyn FrameReader>,
        writer: Box<dyn ImageWriter>,
        pipeline: FramePipeline,
        on_progress: Option<ProgressFn>,
        cancelled: Arc<AtomicBool>,
    ) -> Self {
        Self {
            reader,
            writer,
            pipeline,
            on_progress,
            cancelled,
        }
    }

    pub fn pipeline(&self) -> &FramePipeline {
        &self.pipeline
    }

    pub fn output_path(output_dir: &Path, index: usize) -> PathBuf {
        output_dir.join(format!("frame_{index:05}.png"))
    }

    pub fn execute(
        &mut self,
        input_path: &Path,
        output_dir: &Path,
    ) -> Result<SequenceSummary, Box<dyn std::error::Error>> {
        let metadata = self.reader.open(input_path)?;
        log::info!(
            "Annotating {} frame(s) ({}x{}) with {} markers",
            metadata.total_frames,
            metadata.width,
            metadata.height,
            self.pipeline.style()
        );
        self.pipeline.set_expected_frames(metadata.total_frames);

        let mut summary = SequenceSummary::default();
        let result = self.run(output_dir, metadata.total_frames, &mut summary);
        self.reader.close();
        result?;

        self.pipeline.logger().summary();
        Ok(summary)
    }

    fn run(
        &mut self,
        output_dir: &Path,
        total: usize,
        summary: &mut SequenceSummary,
    ) -> Result<(), Box<dyn std::error::Error>> {
        for frame in self.reader.frames() {
            if self.cancelled.load(Ordering::Relaxed) {
                summary.cancelled = true;
                break;
            }

            let frame = frame?;
            summary.frames_read += 1;

            match self.pipeline.process(frame) {
                Some(annotated) => {
                    let path = Self::output_path(output_dir, annotated.index());
                    self.writer.write(&path, &annotated)?;
                    summary.frames_written += 1;
                    summary.markers_drawn += annotated.markers_drawn();
                }
                None => summary.frames_dropped += 1,
            }

            if let Some(cb) = &self.on_progress {
                if !cb(summary.frames_read, total) {
                    self.cancelled.store(true, Ordering::Relaxed);
                    summary.cancelled = true;
                    break;
                }
            }
        }
        Ok(())
    }
}

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{select, Receiver, Sender, TrySendError};

use crate::annotation::domain::annotated_frame::AnnotatedFrame;
use crate::annotation::domain::marker_style::MarkerStyle;
use crate::pipeline::frame_pipeline::{FramePipeline, PipelineHandle};
use crate::shared::frame::Frame;
use crate::shared::orientation::Orientation;

enum Command {
    SetStyle(MarkerStyle),
    SetOrientation(Orientation),
}

#[derive(Default)]
struct Counters {
    dropped: AtomicUsize,
    superseded: AtomicUsize,
}

/// Runs a [`FramePipeline`] on a dedicated thread for live capture.
///
/// Layout: `capture → submit → worker [drain to newest → process] → result slot`
///
/// Submitting never blocks. Frames that pile up while the worker is busy
/// are dropped in favour of the newest one, so a slow detector lowers the
/// output rate instead of building latency. Only one finished frame is
/// held at a time; an unread result is replaced by the next one.
pub struct ThreadedFramePipeline {
    frame_tx: Option<Sender<Frame>>,
    command_tx: Option<Sender<Command>>,
    result_rx: Receiver<AnnotatedFrame>,
    handle: PipelineHandle,
    counters: Arc<Counters>,
    worker: Option<JoinHandle<FramePipeline>>,
}

impl ThreadedFramePipeline {
    pub fn spawn(pipeline: FramePipeline) -> Self {
        let (frame_tx, frame_rx) = crossbeam_channel::unbounded::<Frame>();
        let (command_tx, command_rx) = crossbeam_channel::unbounded::<Command>();
        let (result_tx, result_rx) = crossbeam_channel::bounded::<AnnotatedFrame>(1);
        let handle = pipeline.handle();
        let counters = Arc::new(Counters::default());

        let worker = spawn_worker(
            pipeline,
            frame_rx,
            command_rx,
            ResultSlot {
                tx: result_tx,
                stale_rx: result_rx.clone(),
            },
            counters.clone(),
        );

        Self {
            frame_tx: Some(frame_tx),
            command_tx: Some(command_tx),
            result_rx,
            handle,
            counters,
            worker: Some(worker),
        }
    }

    /// Hands a frame to the worker. Returns `false` once shut down.
    pub fn submit(&self, frame: Frame) -> bool {
        match &self.frame_tx {
            Some(tx) => tx.send(frame).is_ok(),
            None => false,
        }
    }

    pub fn set_style(&self, style: MarkerStyle) {
        self.send_command(Command::SetStyle(style));
    }

    pub fn set_orientation(&self, orientation: Orientation) {
        self.send_command(Command::SetOrientation(orientation));
    }

    /// Newest finished frame, if one is waiting.
    pub fn latest(&self) -> Option<AnnotatedFrame> {
        self.result_rx.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<AnnotatedFrame> {
        self.result_rx.recv_timeout(timeout).ok()
    }

    /// Frames skipped because a newer one arrived before the worker got to them.
    pub fn dropped_frames(&self) -> usize {
        self.counters.dropped.load(Ordering::Relaxed)
    }

    /// Finished frames discarded because a newer result replaced them unread.
    pub fn superseded_results(&self) -> usize {
        self.counters.superseded.load(Ordering::Relaxed)
    }

    /// Stops accepting frames, lets the worker finish what it has, and
    /// returns the pipeline. The newest result stays readable.
    pub fn shutdown(&mut self) -> Option<FramePipeline> {
        self.frame_tx.take();
        self.command_tx.take();
        let worker = self.worker.take()?;
        match worker.join() {
            Ok(pipeline) => Some(pipeline),
            Err(_) => {
                log::error!("Frame pipeline worker panicked");
                None
            }
        }
    }

    fn send_command(&self, command: Command) {
        // Discard whatever the worker is detecting right now; the command
        // itself is applied before the next frame.
        self.handle.invalidate();
        if let Some(tx) = &self.command_tx {
            let _ = tx.send(command);
        }
    }
}

impl Drop for ThreadedFramePipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Single-slot output. The worker keeps a receiver so it can evict a
/// result nobody collected.
struct ResultSlot {
    tx: Sender<AnnotatedFrame>,
    stale_rx: Receiver<AnnotatedFrame>,
}

impl ResultSlot {
    fn publish(&self, mut annotated: AnnotatedFrame, counters: &Counters) {
        loop {
            match self.tx.try_send(annotated) {
                Ok(()) => return,
                Err(TrySendError::Full(back)) => {
                    if let Ok(stale) = self.stale_rx.try_recv() {
                        log::trace!("Replacing unread result {}", stale.index());
                        counters.superseded.fetch_add(1, Ordering::Relaxed);
                    }
                    annotated = back;
                }
                Err(TrySendError::Disconnected(_)) => return,
            }
        }
    }
}

fn spawn_worker(
    mut pipeline: FramePipeline,
    frame_rx: Receiver<Frame>,
    command_rx: Receiver<Command>,
    results: ResultSlot,
    counters: Arc<Counters>,
) -> JoinHandle<FramePipeline> {
    std::thread::spawn(move || {
        let mut commands_open = true;
        loop {
            let next = if commands_open {
                select! {
                    recv(command_rx) -> msg => {
                        match msg {
                            Ok(command) => apply(&mut pipeline, command),
                            // Shutting down; keep going until the frames run out.
                            Err(_) => commands_open = false,
                        }
                        continue;
                    },
                    recv(frame_rx) -> msg => msg,
                }
            } else {
                frame_rx.recv()
            };
            let Ok(mut frame) = next else { break };

            while let Ok(newer) = frame_rx.try_recv() {
                log::trace!("Skipping stale frame {}", frame.index());
                counters.dropped.fetch_add(1, Ordering::Relaxed);
                frame = newer;
            }
            while let Ok(command) = command_rx.try_recv() {
                apply(&mut pipeline, command);
            }
            if let Some(annotated) = pipeline.process(frame) {
                results.publish(annotated, &counters);
            }
        }
        log::debug!("Frame pipeline worker stopped");
        pipeline
    })
}

fn apply(pipeline: &mut FramePipeline, command: Command) {
    match command {
        Command::SetStyle(style) => pipeline.set_style(style),
        Command::SetOrientation(orientation) => pipeline.set_orientation(orientation),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::domain::frame_annotator::FrameAnnotator;
    use crate::detection::domain::face_detector::FaceDetector;
    use crate::detection::domain::face_locator::FaceLocator;
    use crate::shared::rect::NormalizedRect;

    const TIMEOUT: Duration = Duration::from_secs(5);

    /// Blocks inside `detect` until the test releases it.
    struct GatedDetector {
        started_tx: Sender<usize>,
        gate_rx: Receiver<()>,
    }

    impl FaceDetector for GatedDetector {
        fn detect(
            &mut self,
            frame: &Frame,
        ) -> Result<Vec<NormalizedRect>, Box<dyn std::error::Error>> {
            let _ = self.started_tx.send(frame.index());
            let _ = self.gate_rx.recv();
            Ok(vec![NormalizedRect::new(0.25, 0.25, 0.5, 0.5)])
        }
    }

    // Field order matters: the gate closes before the worker is joined.
    struct Harness {
        gate_tx: Sender<()>,
        started_rx: Receiver<usize>,
        live: ThreadedFramePipeline,
    }

    impl Harness {
        fn new(style: MarkerStyle) -> Self {
            let (started_tx, started_rx) = crossbeam_channel::unbounded();
            let (gate_tx, gate_rx) = crossbeam_channel::unbounded();
            let pipeline = FramePipeline::new(
                FaceLocator::new(Box::new(GatedDetector {
                    started_tx,
                    gate_rx,
                })),
                FrameAnnotator::new(style, None),
            );
            Self {
                gate_tx,
                started_rx,
                live: ThreadedFramePipeline::spawn(pipeline),
            }
        }

        fn wait_started(&self) -> usize {
            self.started_rx.recv_timeout(TIMEOUT).unwrap()
        }

        fn release(&self) {
            self.gate_tx.send(()).unwrap();
        }
    }

    fn frame(index: usize) -> Frame {
        Frame::filled(16, 16, [0, 0, 0, 255], index).unwrap()
    }

    #[test]
    fn test_submitted_frame_comes_back_annotated() {
        let h = Harness::new(MarkerStyle::Outline);
        assert!(h.live.submit(frame(0)));
        assert_eq!(h.wait_started(), 0);
        h.release();

        let out = h.live.recv_timeout(TIMEOUT).unwrap();
        assert_eq!(out.index(), 0);
        assert_eq!(out.markers_drawn(), 1);
    }

    #[test]
    fn test_stale_pending_frames_are_skipped() {
        let h = Harness::new(MarkerStyle::Outline);
        h.live.submit(frame(0));
        assert_eq!(h.wait_started(), 0);

        h.live.submit(frame(1));
        h.live.submit(frame(2));
        h.live.submit(frame(3));
        h.release();

        assert_eq!(h.live.recv_timeout(TIMEOUT).unwrap().index(), 0);
        assert_eq!(h.wait_started(), 3);
        h.release();
        assert_eq!(h.live.recv_timeout(TIMEOUT).unwrap().index(), 3);
        assert_eq!(h.live.dropped_frames(), 2);
    }

    #[test]
    fn test_style_switch_discards_in_flight_frame() {
        let h = Harness::new(MarkerStyle::Outline);
        h.live.submit(frame(0));
        assert_eq!(h.wait_started(), 0);

        h.live.set_style(MarkerStyle::Stamp);
        h.release();

        h.live.submit(frame(1));
        assert_eq!(h.wait_started(), 1);
        h.release();

        let out = h.live.recv_timeout(TIMEOUT).unwrap();
        assert_eq!(out.index(), 1);
        // Stamp style with no stamp image draws nothing.
        assert_eq!(out.markers_drawn(), 0);
    }

    #[test]
    fn test_orientation_command_applies_to_next_frame() {
        let h = Harness::new(MarkerStyle::Outline);
        h.live.set_orientation(Orientation::Right);
        h.live.submit(frame(0));
        h.wait_started();
        h.release();

        let out = h.live.recv_timeout(TIMEOUT).unwrap();
        assert_eq!(out.orientation(), Orientation::Right);
    }

    #[test]
    fn test_latest_returns_newest_result() {
        let mut h = Harness::new(MarkerStyle::Outline);
        h.live.submit(frame(0));
        h.wait_started();
        h.release();
        h.live.submit(frame(1));
        h.wait_started();
        h.release();

        let pipeline = h.live.shutdown().unwrap();
        assert_eq!(pipeline.style(), MarkerStyle::Outline);
        assert_eq!(h.live.latest().unwrap().index(), 1);
        assert!(h.live.latest().is_none());
        assert_eq!(h.live.superseded_results(), 1);
    }

    #[test]
    fn test_shutdown_finishes_frame_queued_behind_busy_worker() {
        let mut h = Harness::new(MarkerStyle::Outline);
        h.live.submit(frame(0));
        assert_eq!(h.wait_started(), 0);
        h.live.submit(frame(1));
        h.release();
        h.release();

        h.live.shutdown().unwrap();
        assert_eq!(h.live.latest().unwrap().index(), 1);
        assert_eq!(h.live.dropped_frames(), 0);
    }

    #[test]
    fn test_unread_results_do_not_accumulate() {
        const FRAMES: usize = 20;
        let mut h = Harness::new(MarkerStyle::Outline);
        for i in 0..FRAMES {
            h.release();
            h.live.submit(frame(i));
        }

        h.live.shutdown().unwrap();
        assert_eq!(h.live.result_rx.len(), 1);
        assert_eq!(
            h.live.dropped_frames() + h.live.superseded_results(),
            FRAMES - 1
        );
        assert_eq!(h.live.latest().unwrap().index(), FRAMES - 1);
        assert!(h.live.latest().is_none());
    }

    #[test]
    fn test_submit_after_shutdown_is_rejected() {
        let mut h = Harness::new(MarkerStyle::Outline);
        assert!(h.live.shutdown().is_some());
        assert!(!h.live.submit(frame(0)));
        assert!(h.live.shutdown().is_none());
    }
}

use std::collections::BTreeMap;
use std::time::Instant;

/// Cross-cutting observer for per-frame pipeline events.
///
/// Keeps the frame pipeline free of any particular output mechanism; the CLI
/// plugs in a summarising logger, tests and embedders use the null one.
pub trait PipelineLogger: Send {
    /// Report frame-level progress. `total` is 0 for unbounded (live) sources.
    fn progress(&mut self, current: usize, total: usize);

    /// Record how long a named stage took for one frame.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Record a point-in-time metric (e.g. faces found).
    fn metric(&mut self, name: &str, value: f64);

    /// A frame left the pipeline without producing an image.
    fn frame_dropped(&mut self, index: usize, reason: &str);

    /// Emit an end-of-run summary. Default: no-op.
    fn summary(&self) {}
}

/// Discards every event.
pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn progress(&mut self, _current: usize, _total: usize) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn frame_dropped(&mut self, _index: usize, _reason: &str) {}
}

/// Running aggregate of one series, constant memory regardless of run length.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SeriesStats {
    pub count: usize,
    pub total: f64,
    pub min: f64,
    pub max: f64,
}

impl SeriesStats {
    fn record(&mut self, value: f64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.count += 1;
        self.total += value;
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total / self.count as f64
        }
    }
}

/// Aggregates stage timings, metrics and drops, and logs a summary through
/// the `log` facade at the end of a run.
///
/// Progress lines are throttled to every `throttle_frames` frames.
pub struct StatsPipelineLogger {
    throttle_frames: usize,
    timings: BTreeMap<String, SeriesStats>,
    metrics: BTreeMap<String, SeriesStats>,
    dropped: usize,
    frames_seen: usize,
    start_time: Instant,
}

impl StatsPipelineLogger {
    pub fn new(throttle_frames: usize) -> Self {
        Self {
            throttle_frames: throttle_frames.max(1),
            timings: BTreeMap::new(),
            metrics: BTreeMap::new(),
            dropped: 0,
            frames_seen: 0,
            start_time: Instant::now(),
        }
    }

    pub fn timing_stats(&self, stage: &str) -> Option<SeriesStats> {
        self.timings.get(stage).copied()
    }

    pub fn metric_stats(&self, name: &str) -> Option<SeriesStats> {
        self.metrics.get(name).copied()
    }

    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Returns the formatted summary, or `None` if nothing was recorded.
    pub fn summary_string(&self) -> Option<String> {
        if self.timings.is_empty() && self.metrics.is_empty() && self.dropped == 0 {
            return None;
        }

        let elapsed_s = self.start_time.elapsed().as_secs_f64();
        let mut lines = vec![format!(
            "Pipeline summary ({} frames, {} dropped, {elapsed_s:.1}s):",
            self.frames_seen, self.dropped
        )];

        for (stage, s) in &self.timings {
            lines.push(format!(
                "  {stage:10}: avg {:6.1}ms  min {:6.1}ms  max {:6.1}ms",
                s.mean(),
                s.min,
                s.max
            ));
        }
        for (name, s) in &self.metrics {
            lines.push(format!("  {name}: avg {:.1}  max {:.0}", s.mean(), s.max));
        }
        if self.frames_seen > 0 && elapsed_s > 0.0 {
            lines.push(format!(
                "  Throughput: {:.1} fps",
                self.frames_seen as f64 / elapsed_s
            ));
        }

        Some(lines.join("\n"))
    }
}

impl Default for StatsPipelineLogger {
    fn default() -> Self {
        Self::new(30)
    }
}

impl PipelineLogger for StatsPipelineLogger {
    fn progress(&mut self, current: usize, total: usize) {
        self.frames_seen = self.frames_seen.max(current);
        let at_end = total > 0 && current == total;
        if current % self.throttle_frames == 0 || at_end {
            if total > 0 {
                let pct = current as f64 / total as f64 * 100.0;
                log::info!("Processed {current}/{total} frames ({pct:.1}%)");
            } else {
                log::info!("Processed {current} frames");
            }
        }
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.timings
            .entry(stage.to_string())
            .or_default()
            .record(duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        self.metrics.entry(name.to_string()).or_default().record(value);
    }

    fn frame_dropped(&mut self, index: usize, reason: &str) {
        self.dropped += 1;
        log::debug!("Dropped frame {index}: {reason}");
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n\n{text}");
        }
    }
}

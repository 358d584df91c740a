use std::collections::HashMap;
use std::time::Instant;

use crate::tracking::domain::tracking_result::{TrackingResult, Verdict};

/// Observer for tracking-session events.
///
/// Lets the CLI print timings and a summary while the desktop and server
/// stay quiet, without the session loop knowing which one it talks to.
pub trait SessionLogger: Send {
    /// Called once per analyzed frame.
    fn frame(&mut self, index: usize, result: &TrackingResult);

    /// Record how long a named stage took for one frame.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Record a point-in-time metric.
    fn metric(&mut self, name: &str, value: f64);

    fn info(&mut self, message: &str);

    /// Emit an end-of-session summary. Default: no-op.
    fn summary(&self) {}
}

pub struct NullSessionLogger;

impl SessionLogger for NullSessionLogger {
    fn frame(&mut self, _index: usize, _result: &TrackingResult) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn info(&mut self, _message: &str) {}
}

/// Logs status changes as they happen and keeps per-stage timings, metrics
/// and verdict counts for the closing summary.
///
/// A heartbeat line is written every `throttle_frames` frames.
pub struct StdoutSessionLogger {
    throttle_frames: usize,
    timings: HashMap<String, Vec<f64>>,
    metrics: HashMap<String, Vec<f64>>,
    start_time: Instant,
    frames: usize,
    attentive_frames: usize,
    unknown_frames: usize,
    last_status: Option<String>,
}

impl StdoutSessionLogger {
    pub fn new(throttle_frames: usize) -> Self {
        Self {
            throttle_frames: throttle_frames.max(1),
            timings: HashMap::new(),
            metrics: HashMap::new(),
            start_time: Instant::now(),
            frames: 0,
            attentive_frames: 0,
            unknown_frames: 0,
            last_status: None,
        }
    }

    /// Returns the formatted summary, or `None` if no frame was seen.
    pub fn summary_string(&self) -> Option<String> {
        if self.frames == 0 {
            return None;
        }

        let elapsed_ms = self.start_time.elapsed().as_secs_f64() * 1000.0;
        let frames = self.frames;
        let mut lines = vec![format!(
            "Session summary ({frames} frames, {:.1}s total):",
            elapsed_ms / 1000.0
        )];

        let mut stages: Vec<_> = self.timings.keys().collect();
        stages.sort();
        for stage in stages {
            let durations = &self.timings[stage];
            let total_ms: f64 = durations.iter().sum();
            let avg_ms = total_ms / durations.len().max(1) as f64;
            lines.push(format!("  {stage:12}: avg {avg_ms:6.1}ms  total {total_ms:7.0}ms"));
        }

        let mut metric_names: Vec<_> = self.metrics.keys().collect();
        metric_names.sort();
        for name in metric_names {
            let values = &self.metrics[name];
            let avg = values.iter().sum::<f64>() / values.len().max(1) as f64;
            lines.push(format!("  {name}: avg {avg:.1}"));
        }

        let pct = self.attentive_frames as f64 / frames as f64 * 100.0;
        lines.push(format!(
            "  Attentive: {}/{frames} frames ({pct:.1}%)",
            self.attentive_frames
        ));
        if self.unknown_frames > 0 {
            lines.push(format!("  Unknown: {} frames", self.unknown_frames));
        }

        if elapsed_ms > 0.0 {
            let fps = frames as f64 / (elapsed_ms / 1000.0);
            lines.push(format!("  Throughput: {fps:.1} fps"));
        }

        Some(lines.join("\n"))
    }

}

impl Default for StdoutSessionLogger {
    fn default() -> Self {
        Self::new(100)
    }
}

impl SessionLogger for StdoutSessionLogger {
    fn frame(&mut self, index: usize, result: &TrackingResult) {
        self.frames += 1;
        match result.verdict {
            Verdict::Attentive => self.attentive_frames += 1,
            Verdict::Unknown => self.unknown_frames += 1,
            Verdict::Inattentive => {}
        }
        if self.last_status.as_deref() != Some(result.status.as_str()) {
            log::info!("Frame {index}: {}", result.status);
            self.last_status = Some(result.status.clone());
        }
        if self.frames % self.throttle_frames == 0 {
            log::info!("Processed {} frames", self.frames);
        }
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.timings
            .entry(stage.to_string())
            .or_default()
            .push(duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        self.metrics.entry(name.to_string()).or_default().push(value);
    }

    fn info(&mut self, message: &str) {
        log::info!("{message}");
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n\n{text}");
        }
    }
}

//! Frame-synchronous tracking loop shared by the CLI and desktop front ends.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crate::capture::domain::frame_source::FrameSource;
use crate::detection::domain::detector::DetectorSet;
use crate::error::CaptureError;
use crate::shared::frame::Frame;
use crate::tracking::domain::attention_tracker::AttentionTracker;
use crate::tracking::domain::band::{Band, BandCommand, BandController};
use crate::tracking::domain::tracking_result::TrackingResult;

use super::session_logger::SessionLogger;

/// One frame and what the tracker made of it.
#[derive(Clone, Debug)]
pub struct SessionTick {
    pub frame: Frame,
    pub result: TrackingResult,
    pub band: Band,
}

/// Owns a frame source, the detectors, the tracker and the band.
///
/// Everything runs on the caller's thread: `tick` reads, analyzes and
/// returns one frame. A read failure stops the session; it is not retried.
pub struct TrackingSession {
    source: Box<dyn FrameSource>,
    detectors: DetectorSet,
    tracker: AttentionTracker,
    band: BandController,
    logger: Box<dyn SessionLogger>,
    mirror: bool,
    detection_enabled: bool,
    running: bool,
}

impl TrackingSession {
    pub fn new(
        source: Box<dyn FrameSource>,
        detectors: DetectorSet,
        tracker: AttentionTracker,
        band: BandController,
        logger: Box<dyn SessionLogger>,
    ) -> Self {
        Self {
            source,
            detectors,
            tracker,
            band,
            logger,
            mirror: false,
            detection_enabled: true,
            running: false,
        }
    }

    pub fn with_mirror(mut self, mirror: bool) -> Self {
        self.mirror = mirror;
        self
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn band(&self) -> Band {
        self.band.band()
    }

    pub fn detection_enabled(&self) -> bool {
        self.detection_enabled
    }

    pub fn set_detection_enabled(&mut self, enabled: bool) {
        self.detection_enabled = enabled;
    }

    pub fn set_mirror(&mut self, mirror: bool) {
        self.mirror = mirror;
    }

    pub fn apply_band(&mut self, command: BandCommand) -> bool {
        self.band.apply(command)
    }

    pub fn set_band_position(&mut self, position: i32) {
        self.band.set_position(position);
    }

    pub fn start(&mut self) -> Result<(), CaptureError> {
        if self.running {
            return Ok(());
        }
        self.source.open()?;
        self.running = true;
        self.logger.info(&format!("Tracking started on {}", self.source.describe()));
        Ok(())
    }

    /// Releases the source and forgets the session's face.
    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        self.source.close();
        self.tracker.reset();
        self.band.apply(BandCommand::EndDrag);
        self.running = false;
        self.logger.info("Tracking stopped");
    }

    pub fn tick(&mut self) -> Result<SessionTick, CaptureError> {
        if !self.running {
            return Err(CaptureError::NotOpen);
        }

        let t0 = Instant::now();
        let frame = match self.source.read() {
            Ok(frame) => frame,
            Err(e) => {
                self.stop();
                return Err(e);
            }
        };
        let frame = if self.mirror { frame.mirrored() } else { frame };
        self.logger.timing("capture", elapsed_ms(t0));

        self.band.sync_frame_height(frame.height());
        let band = self.band.band();

        let t1 = Instant::now();
        let result = if self.detection_enabled {
            self.tracker.analyze_frame(&mut self.detectors, &frame, &band)
        } else {
            TrackingResult::preview_only()
        };
        self.logger.timing("analyze", elapsed_ms(t1));
        self.logger.metric("faces", if result.face.is_some() { 1.0 } else { 0.0 });
        self.logger.frame(frame.index(), &result);

        Ok(SessionTick {
            frame,
            result,
            band,
        })
    }

    /// Runs ticks at a fixed interval until `stop` is set, the source ends,
    /// or `max_frames` frames were analyzed. Returns the frame count.
    ///
    /// The source is released and the summary emitted whichever way the
    /// loop ends.
    pub fn run<F>(
        &mut self,
        interval: Duration,
        max_frames: Option<usize>,
        stop: &AtomicBool,
        mut on_tick: F,
    ) -> Result<usize, CaptureError>
    where
        F: FnMut(&SessionTick),
    {
        self.start()?;
        let mut frames = 0;
        let outcome = loop {
            if stop.load(Ordering::Relaxed) || max_frames.is_some_and(|max| frames >= max) {
                break Ok(frames);
            }
            let started = Instant::now();
            match self.tick() {
                Ok(tick) => {
                    on_tick(&tick);
                    frames += 1;
                }
                Err(CaptureError::EndOfStream(_)) => break Ok(frames),
                Err(e) => break Err(e),
            }
            if let Some(rest) = interval.checked_sub(started.elapsed()) {
                thread::sleep(rest);
            }
        };
        self.stop();
        self.logger.summary();
        outcome
    }
}

fn elapsed_ms(since: Instant) -> f64 {
    since.elapsed().as_secs_f64() * 1000.0
}

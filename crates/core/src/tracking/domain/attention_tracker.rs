//! Per-frame attention decision.
//!
//! Turns a frame and a band into a [`TrackingResult`], falling back to the
//! last known face when detection drops out.

use image::GrayImage;

use crate::detection::domain::detector::{DetectorRole, DetectorSet};
use crate::shared::frame::Frame;
use crate::shared::geometry::Rect;

use super::band::Band;
use super::landmark_estimator::{LandmarkEstimator, NoseSource};
use super::sticky_memory::StickyMemory;
use super::tracking_result::{
    TrackingResult, Verdict, STATUS_BAND_ALERT, STATUS_GOOD, STATUS_NOT_FOUND, STATUS_TURNED_AWAY,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttentionState {
    /// No face detected since the session began.
    NoFaceEver,
    /// A face was detected on the latest analyzed frame.
    Tracking,
    /// A face was seen before but not on the latest analyzed frame.
    DroppedOut,
}

/// Session-scoped tracker. One per camera session or per web client.
#[derive(Clone, Debug)]
pub struct AttentionTracker {
    estimator: LandmarkEstimator,
    memory: StickyMemory,
    state: AttentionState,
}

impl Default for AttentionTracker {
    fn default() -> Self {
        Self::new(LandmarkEstimator::default())
    }
}

impl AttentionTracker {
    pub fn new(estimator: LandmarkEstimator) -> Self {
        Self {
            estimator,
            memory: StickyMemory::default(),
            state: AttentionState::NoFaceEver,
        }
    }

    pub fn state(&self) -> AttentionState {
        self.state
    }

    pub fn memory(&self) -> &StickyMemory {
        &self.memory
    }

    /// Forget the session: clears sticky memory and returns to `NoFaceEver`.
    pub fn reset(&mut self) {
        self.memory.clear();
        self.state = AttentionState::NoFaceEver;
    }

    pub fn analyze_frame(&mut self, detectors: &mut DetectorSet, frame: &Frame, band: &Band) -> TrackingResult {
        self.analyze_gray(detectors, &frame.to_gray(), band)
    }

    pub fn analyze_gray(&mut self, detectors: &mut DetectorSet, gray: &GrayImage, band: &Band) -> TrackingResult {
        let band = band.clamped(gray.height());
        let Some(faces) = detectors.detect(DetectorRole::Face, gray) else {
            return TrackingResult::unavailable();
        };
        let faces: Vec<Rect> = faces
            .iter()
            .filter_map(|f| f.clamp_to(gray.width(), gray.height()))
            .collect();
        match Rect::largest(&faces) {
            Some(face) => self.on_face(detectors, gray, face, &band),
            None => self.on_dropout(detectors, gray),
        }
    }

    fn on_face(&mut self, detectors: &mut DetectorSet, gray: &GrayImage, face: Rect, band: &Band) -> TrackingResult {
        let nose = self.estimator.estimate(gray, &face, detectors);
        let band_violation = band.is_outside(nose.point);
        let turned_away = detectors.has(DetectorRole::Nose) && nose.source == NoseSource::Proxy;
        let attentive = !(band_violation || turned_away);

        self.memory.remember(face);
        self.transition(AttentionState::Tracking);

        TrackingResult {
            face: Some(face),
            nose: Some(nose.point),
            verdict: if attentive {
                Verdict::Attentive
            } else {
                Verdict::Inattentive
            },
            status: if attentive { STATUS_GOOD } else { STATUS_BAND_ALERT }.to_string(),
        }
    }

    fn on_dropout(&mut self, detectors: &mut DetectorSet, gray: &GrayImage) -> TrackingResult {
        let Some(last_face) = self.memory.last_face() else {
            return TrackingResult {
                face: None,
                nose: None,
                verdict: Verdict::Inattentive,
                status: STATUS_NOT_FOUND.to_string(),
            };
        };

        let turned_away = detectors
            .detect(DetectorRole::Profile, gray)
            .is_some_and(|candidates| Rect::largest(&candidates).is_some());
        self.transition(AttentionState::DroppedOut);

        TrackingResult {
            face: Some(last_face),
            nose: None,
            verdict: Verdict::Inattentive,
            status: if turned_away {
                STATUS_TURNED_AWAY
            } else {
                STATUS_NOT_FOUND
            }
            .to_string(),
        }
    }

    fn transition(&mut self, next: AttentionState) {
        if self.state != next {
            log::debug!("Attention state {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }
}

use crate::shared::constants::STATUS_CAMERA_RUNNING;
use crate::shared::geometry::{Point, Rect};

pub const STATUS_GOOD: &str = "Tracking good";
pub const STATUS_BAND_ALERT: &str = "Tracking alert: face turned away or nose crossed the band";
pub const STATUS_TURNED_AWAY: &str = "Tracking alert: user turned away from camera";
pub const STATUS_NOT_FOUND: &str = "Tracking alert: face not found";
pub const STATUS_UNAVAILABLE: &str = "Tracking unavailable: face detector not loaded";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    Attentive,
    Inattentive,
    /// No verdict could be formed, e.g. no face detector is loaded.
    Unknown,
}

/// Everything one frame's analysis produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackingResult {
    pub face: Option<Rect>,
    pub nose: Option<Point>,
    pub verdict: Verdict,
    pub status: String,
}

impl TrackingResult {
    pub fn attentive(&self) -> bool {
        self.verdict == Verdict::Attentive
    }

    /// What clients flag as a problem: anything short of attentive.
    pub fn tracking_bad(&self) -> bool {
        !self.attentive()
    }

    pub(crate) fn unavailable() -> Self {
        Self {
            face: None,
            nose: None,
            verdict: Verdict::Unknown,
            status: STATUS_UNAVAILABLE.to_string(),
        }
    }

    /// Frame shown without analysis.
    pub fn preview_only() -> Self {
        Self {
            face: None,
            nose: None,
            verdict: Verdict::Unknown,
            status: STATUS_CAMERA_RUNNING.to_string(),
        }
    }
}

//! The horizontal reference band and the single owner that mutates it.

use serde::{Deserialize, Serialize};

use crate::shared::geometry::Point;

/// Pointer distance, in frame pixels, within which a press grabs the band.
pub const DEFAULT_DRAG_TOLERANCE: i32 = 20;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BandKind {
    #[default]
    Line,
    Strip,
}

impl BandKind {
    pub fn at(self, position: i32, strip_height: i32) -> Band {
        match self {
            BandKind::Line => Band::Line { y: position },
            BandKind::Strip => Band::Strip {
                center_y: position,
                height: strip_height.max(0),
            },
        }
    }
}

/// A horizontal line, or a strip of rows centred on `center_y`.
///
/// For a line, a nose at or above it is attentive and strictly below it is
/// a violation. For a strip, anything outside `[top, bottom]` is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Band {
    Line { y: i32 },
    Strip { center_y: i32, height: i32 },
}

/// `max(0, min(position, frame_height - 1))`.
pub fn clamp_position(position: i32, frame_height: u32) -> i32 {
    let max = (frame_height as i64 - 1).clamp(0, i32::MAX as i64) as i32;
    position.min(max).max(0)
}

impl Band {
    pub fn kind(&self) -> BandKind {
        match self {
            Band::Line { .. } => BandKind::Line,
            Band::Strip { .. } => BandKind::Strip,
        }
    }

    pub fn position(&self) -> i32 {
        match *self {
            Band::Line { y } => y,
            Band::Strip { center_y, .. } => center_y,
        }
    }

    pub fn with_position(self, position: i32) -> Band {
        match self {
            Band::Line { .. } => Band::Line { y: position },
            Band::Strip { height, .. } => Band::Strip {
                center_y: position,
                height,
            },
        }
    }

    pub fn clamped(self, frame_height: u32) -> Band {
        self.with_position(clamp_position(self.position(), frame_height))
    }

    pub fn top(&self) -> i32 {
        match *self {
            Band::Line { y } => y,
            Band::Strip { center_y, height } => center_y - height.max(0) / 2,
        }
    }

    pub fn bottom(&self) -> i32 {
        match *self {
            Band::Line { y } => y,
            Band::Strip { center_y, height } => center_y + height.max(0) / 2,
        }
    }

    pub fn is_outside(&self, point: Point) -> bool {
        match self {
            Band::Line { y } => point.y > *y,
            Band::Strip { .. } => point.y < self.top() || point.y > self.bottom(),
        }
    }

    /// Whether a press at row `y` is close enough to pick the band up.
    pub fn grabs(&self, y: i32, tolerance: i32) -> bool {
        y >= self.top() - tolerance && y <= self.bottom() + tolerance
    }
}

/// Pointer gestures already translated into frame coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BandCommand {
    BeginDrag { y: i32 },
    UpdatePosition { y: i32 },
    EndDrag,
}

/// Owns the band. All mutation goes through [`BandController::apply`] or
/// the explicit setters, and every position it stores is clamped to the
/// last known frame height.
#[derive(Clone, Debug)]
pub struct BandController {
    band: Band,
    frame_height: Option<u32>,
    anchor: Option<f64>,
    tolerance: i32,
    dragging: bool,
}

impl BandController {
    pub fn new(band: Band, tolerance: i32) -> Self {
        Self {
            band: band.with_position(band.position().max(0)),
            frame_height: None,
            anchor: None,
            tolerance: tolerance.max(0),
            dragging: false,
        }
    }

    /// A band placed at `fraction` of the frame height once it is known.
    pub fn anchored(kind: BandKind, fraction: f64, strip_height: i32, tolerance: i32) -> Self {
        Self {
            anchor: Some(fraction.clamp(0.0, 1.0)),
            ..Self::new(kind.at(0, strip_height), tolerance)
        }
    }

    pub fn band(&self) -> Band {
        self.band
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    pub fn frame_height(&self) -> Option<u32> {
        self.frame_height
    }

    /// Re-clamps when the frame height changes.
    pub fn sync_frame_height(&mut self, frame_height: u32) {
        if self.frame_height == Some(frame_height) {
            return;
        }
        self.frame_height = Some(frame_height);
        if let Some(fraction) = self.anchor.take() {
            let position = (frame_height as f64 * fraction).round() as i32;
            self.band = self.band.with_position(position);
        }
        self.band = self.band.clamped(frame_height);
    }

    pub fn set_position(&mut self, position: i32) {
        self.anchor = None;
        self.band = self.band.with_position(self.clamp(position));
    }

    pub fn set_band(&mut self, band: Band) {
        self.anchor = None;
        self.band = band.with_position(self.clamp(band.position()));
    }

    /// Applies one gesture. Returns true when the band moved or a drag
    /// started or ended.
    pub fn apply(&mut self, command: BandCommand) -> bool {
        match command {
            BandCommand::BeginDrag { y } => {
                if self.dragging || !self.band.grabs(y, self.tolerance) {
                    return false;
                }
                self.dragging = true;
                true
            }
            BandCommand::UpdatePosition { y } => {
                if !self.dragging {
                    return false;
                }
                let before = self.band;
                self.set_position(y);
                self.band != before
            }
            BandCommand::EndDrag => std::mem::replace(&mut self.dragging, false),
        }
    }

    fn clamp(&self, position: i32) -> i32 {
        match self.frame_height {
            Some(h) => clamp_position(position, h),
            None => position.max(0),
        }
    }
}

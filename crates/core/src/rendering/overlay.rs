//! Draws the tracking overlay into a frame in place.

use crate::shared::frame::Frame;
use crate::shared::geometry::{Point, Rect};
use crate::tracking::domain::band::Band;
use crate::tracking::domain::tracking_result::{TrackingResult, Verdict};

pub const COLOR_ATTENTIVE: [u8; 3] = [0, 220, 0];
pub const COLOR_INATTENTIVE: [u8; 3] = [230, 40, 40];
pub const COLOR_UNKNOWN: [u8; 3] = [150, 150, 150];
pub const COLOR_BAND: [u8; 3] = [255, 200, 0];
pub const COLOR_NOSE: [u8; 3] = [0, 160, 255];

const BOX_THICKNESS: i32 = 2;
const BAND_THICKNESS: i32 = 2;
const NOSE_RADIUS: i32 = 4;

pub fn verdict_color(verdict: Verdict) -> [u8; 3] {
    match verdict {
        Verdict::Attentive => COLOR_ATTENTIVE,
        Verdict::Inattentive => COLOR_INATTENTIVE,
        Verdict::Unknown => COLOR_UNKNOWN,
    }
}

/// Band first, then the face box, then the nose dot on top.
pub fn draw_tracking(frame: &mut Frame, result: &TrackingResult, band: &Band) {
    draw_band(frame, band);
    if let Some(face) = result.face {
        draw_rect(frame, &face, verdict_color(result.verdict), BOX_THICKNESS);
    }
    if let Some(nose) = result.nose {
        draw_dot(frame, nose, NOSE_RADIUS, COLOR_NOSE);
    }
}

pub fn draw_band(frame: &mut Frame, band: &Band) {
    let width = frame.width() as i32;
    match band {
        Band::Line { y } => fill(frame, &Rect::new(0, y - BAND_THICKNESS / 2, width, BAND_THICKNESS), COLOR_BAND),
        Band::Strip { .. } => {
            let (top, bottom) = (band.top(), band.bottom());
            fill(frame, &Rect::new(0, top, width, 1), COLOR_BAND);
            fill(frame, &Rect::new(0, bottom, width, 1), COLOR_BAND);
        }
    }
}

pub fn draw_rect(frame: &mut Frame, rect: &Rect, color: [u8; 3], thickness: i32) {
    let t = thickness.max(1).min(rect.width).min(rect.height);
    if t <= 0 {
        return;
    }
    fill(frame, &Rect::new(rect.x, rect.y, rect.width, t), color);
    fill(frame, &Rect::new(rect.x, rect.bottom() - t, rect.width, t), color);
    fill(frame, &Rect::new(rect.x, rect.y, t, rect.height), color);
    fill(frame, &Rect::new(rect.right() - t, rect.y, t, rect.height), color);
}

pub fn draw_dot(frame: &mut Frame, center: Point, radius: i32, color: [u8; 3]) {
    let r2 = radius * radius;
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy <= r2 {
                fill(frame, &Rect::new(center.x + dx, center.y + dy, 1, 1), color);
            }
        }
    }
}

/// Paints the part of `rect` that lies inside the frame.
fn fill(frame: &mut Frame, rect: &Rect, color: [u8; 3]) {
    let Some(area) = rect.clamp_to(frame.width(), frame.height()) else {
        return;
    };
    let channels = frame.channels() as usize;
    let mut pixels = frame.as_ndarray_mut();
    for y in area.y..area.bottom() {
        for x in area.x..area.right() {
            for (c, value) in color.iter().enumerate().take(channels.min(3)) {
                pixels[[y as usize, x as usize, c]] = *value;
            }
        }
    }
}

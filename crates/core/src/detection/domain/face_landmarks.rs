//! Five-point face landmarks as produced by pose-style face models.
//!
//! Order: left eye, right eye, nose, left mouth corner, right mouth corner.
//! Points with x <= 0 were below the keypoint confidence cut and count as
//! not visible.

const LEFT_EYE: usize = 0;
const RIGHT_EYE: usize = 1;
const NOSE: usize = 2;

#[derive(Clone, Debug, PartialEq)]
pub struct FaceLandmarks {
    points: [(f64, f64); 5],
}

impl FaceLandmarks {
    pub fn new(points: [(f64, f64); 5]) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[(f64, f64); 5] {
        &self.points
    }

    pub fn has_visible(&self) -> bool {
        self.points.iter().any(|(x, _)| *x > 0.0)
    }

    /// The nose tip, if the model was confident about it.
    pub fn nose(&self) -> Option<(f64, f64)> {
        let nose = self.points[NOSE];
        (nose.0 > 0.0).then_some(nose)
    }

    /// How much the face is turned: 0.0 = frontal, 1.0 = full profile.
    ///
    /// Nose offset from the eye midpoint relative to the eye span. A face
    /// whose eyes are not both visible reads as full profile.
    pub fn profile_ratio(&self) -> f64 {
        let left_eye = self.points[LEFT_EYE];
        let right_eye = self.points[RIGHT_EYE];
        if left_eye.0 <= 0.0 || right_eye.0 <= 0.0 {
            return 1.0;
        }
        let Some(nose) = self.nose() else {
            return 0.0;
        };

        let eye_mid_x = (left_eye.0 + right_eye.0) / 2.0;
        let eye_span = (right_eye.0 - left_eye.0).abs();
        if eye_span <= 0.0 {
            return 1.0;
        }

        ((nose.0 - eye_mid_x).abs() / eye_span).min(1.0)
    }
}

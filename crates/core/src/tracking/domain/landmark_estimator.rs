use image::GrayImage;

use crate::detection::domain::detector::{crop, DetectorRole, DetectorSet};
use crate::error::ConfigurationError;
use crate::shared::geometry::{Point, Rect};

/// Where the nose sits down the face box when no landmark is found.
pub const DEFAULT_PROXY_FRACTION: f64 = 0.58;
pub const MIN_PROXY_FRACTION: f64 = 0.5;
pub const MAX_PROXY_FRACTION: f64 = 0.6;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoseSource {
    Landmark,
    Proxy,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NoseEstimate {
    pub point: Point,
    pub source: NoseSource,
}

/// Locates the nose inside a face box.
///
/// Searches the lower three quarters of the face with the nose detector and
/// falls back to a fixed point on the face's vertical centre line.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LandmarkEstimator {
    proxy_fraction: f64,
}

impl Default for LandmarkEstimator {
    fn default() -> Self {
        Self {
            proxy_fraction: DEFAULT_PROXY_FRACTION,
        }
    }
}

impl LandmarkEstimator {
    pub fn new(proxy_fraction: f64) -> Result<Self, ConfigurationError> {
        if !(MIN_PROXY_FRACTION..=MAX_PROXY_FRACTION).contains(&proxy_fraction) {
            return Err(ConfigurationError::Invalid(format!(
                "nose proxy fraction {proxy_fraction} is outside {MIN_PROXY_FRACTION}..={MAX_PROXY_FRACTION}"
            )));
        }
        Ok(Self { proxy_fraction })
    }

    pub fn proxy_fraction(&self) -> f64 {
        self.proxy_fraction
    }

    pub fn proxy_point(&self, face: &Rect) -> Point {
        Point::new(
            face.x + face.width / 2,
            face.y + (face.height as f64 * self.proxy_fraction).round() as i32,
        )
    }

    pub fn estimate(&self, gray: &GrayImage, face: &Rect, detectors: &mut DetectorSet) -> NoseEstimate {
        self.find_landmark(gray, face, detectors)
            .map(|point| NoseEstimate {
                point,
                source: NoseSource::Landmark,
            })
            .unwrap_or_else(|| NoseEstimate {
                point: self.proxy_point(face),
                source: NoseSource::Proxy,
            })
    }

    fn find_landmark(&self, gray: &GrayImage, face: &Rect, detectors: &mut DetectorSet) -> Option<Point> {
        if !detectors.has(DetectorRole::Nose) {
            return None;
        }
        let region = face
            .lower_three_quarters()
            .clamp_to(gray.width(), gray.height())?;
        let candidates = detectors.detect(DetectorRole::Nose, &crop(gray, &region))?;
        let nose = Rect::largest(&candidates)?;
        Some(nose.translate(region.x, region.y).center())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::detector::testing::ScriptedDetector;

    fn face() -> Rect {
        Rect::new(100, 100, 80, 80)
    }

    #[test]
    fn test_proxy_point_for_reference_face() {
        let estimator = LandmarkEstimator::default();
        assert_eq!(estimator.proxy_point(&face()), Point::new(140, 146));
    }

    #[test]
    fn test_proxy_used_without_nose_detector() {
        let gray = GrayImage::new(320, 240);
        let estimate = LandmarkEstimator::default().estimate(&gray, &face(), &mut DetectorSet::new());
        assert_eq!(estimate.source, NoseSource::Proxy);
        assert_eq!(estimate.point, Point::new(140, 146));
    }

    #[test]
    fn test_landmark_translated_to_frame_coordinates() {
        let gray = GrayImage::new(320, 240);
        // Region starts at (100, 120); nose box centre in region is (40, 30).
        let nose = ScriptedDetector::always(vec![Rect::new(5, 5, 6, 6), Rect::new(30, 20, 20, 20)]);
        let seen = nose.seen.clone();
        let mut detectors = DetectorSet::new().with(DetectorRole::Nose, Box::new(nose));

        let estimate = LandmarkEstimator::default().estimate(&gray, &face(), &mut detectors);
        assert_eq!(estimate.source, NoseSource::Landmark);
        assert_eq!(estimate.point, Point::new(140, 150));
        assert_eq!(seen.lock().unwrap().as_slice(), &[(80, 60)]);
    }

    #[test]
    fn test_search_region_clamped_to_frame() {
        let gray = GrayImage::new(120, 130);
        let nose = ScriptedDetector::always(vec![]);
        let seen = nose.seen.clone();
        let mut detectors = DetectorSet::new().with(DetectorRole::Nose, Box::new(nose));

        let estimate = LandmarkEstimator::default().estimate(&gray, &face(), &mut detectors);
        assert_eq!(estimate.source, NoseSource::Proxy);
        assert_eq!(seen.lock().unwrap().as_slice(), &[(20, 10)]);
    }

    #[test]
    fn test_face_outside_frame_skips_detector() {
        let gray = GrayImage::new(50, 50);
        let nose = ScriptedDetector::always(vec![Rect::new(0, 0, 4, 4)]);
        let seen = nose.seen.clone();
        let mut detectors = DetectorSet::new().with(DetectorRole::Nose, Box::new(nose));

        let estimate = LandmarkEstimator::default().estimate(&gray, &face(), &mut detectors);
        assert_eq!(estimate.source, NoseSource::Proxy);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_rejects_fraction_out_of_range() {
        assert!(LandmarkEstimator::new(0.45).is_err());
        assert!(LandmarkEstimator::new(0.61).is_err());
        assert_eq!(LandmarkEstimator::new(0.5).unwrap().proxy_fraction(), 0.5);
    }
}

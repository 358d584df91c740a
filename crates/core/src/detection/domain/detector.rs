use std::fmt;

use image::GrayImage;

use crate::error::DetectionError;
use crate::shared::geometry::Rect;

/// Classifies a grayscale region into candidate rectangles.
///
/// Rectangles are relative to the image passed in. Implementations may hold
/// inference sessions and scratch buffers, hence `&mut self`.
pub trait Detector: Send {
    fn detect(&mut self, image: &GrayImage) -> Result<Vec<Rect>, DetectionError>;
}

/// What a detector instance looks for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DetectorRole {
    Face,
    Profile,
    Nose,
}

impl DetectorRole {
    pub const ALL: [DetectorRole; 3] = [DetectorRole::Face, DetectorRole::Profile, DetectorRole::Nose];
}

impl fmt::Display for DetectorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DetectorRole::Face => "face",
            DetectorRole::Profile => "profile",
            DetectorRole::Nose => "nose",
        };
        f.write_str(name)
    }
}

/// The detectors available to a tracking session, one optional slot per role.
///
/// Built once at startup and injected. An empty slot means the feature is
/// unavailable; the tracker degrades instead of failing.
#[derive(Default)]
pub struct DetectorSet {
    face: Option<Box<dyn Detector>>,
    profile: Option<Box<dyn Detector>>,
    nose: Option<Box<dyn Detector>>,
}

impl DetectorSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, role: DetectorRole, detector: Box<dyn Detector>) -> Self {
        self.insert(role, detector);
        self
    }

    pub fn insert(&mut self, role: DetectorRole, detector: Box<dyn Detector>) {
        *self.slot_mut(role) = Some(detector);
    }

    pub fn remove(&mut self, role: DetectorRole) -> Option<Box<dyn Detector>> {
        self.slot_mut(role).take()
    }

    pub fn has(&self, role: DetectorRole) -> bool {
        match role {
            DetectorRole::Face => self.face.is_some(),
            DetectorRole::Profile => self.profile.is_some(),
            DetectorRole::Nose => self.nose.is_some(),
        }
    }

    pub fn roles(&self) -> Vec<DetectorRole> {
        DetectorRole::ALL.into_iter().filter(|r| self.has(*r)).collect()
    }

    /// Runs the detector for `role`.
    ///
    /// Returns `None` when no detector is configured for the role. A runtime
    /// failure is logged and reported as an empty candidate list.
    pub fn detect(&mut self, role: DetectorRole, image: &GrayImage) -> Option<Vec<Rect>> {
        let detector = self.slot_mut(role).as_mut()?;
        match detector.detect(image) {
            Ok(candidates) => Some(candidates),
            Err(e) => {
                log::warn!("{role} detector failed on this frame: {e}");
                Some(Vec::new())
            }
        }
    }

    fn slot_mut(&mut self, role: DetectorRole) -> &mut Option<Box<dyn Detector>> {
        match role {
            DetectorRole::Face => &mut self.face,
            DetectorRole::Profile => &mut self.profile,
            DetectorRole::Nose => &mut self.nose,
        }
    }
}

impl fmt::Debug for DetectorSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DetectorSet")
            .field("roles", &self.roles())
            .finish()
    }
}

/// Crops `rect` out of `image`. The rectangle must already lie inside it.
pub fn crop(image: &GrayImage, rect: &Rect) -> GrayImage {
    image::imageops::crop_imm(
        image,
        rect.x.max(0) as u32,
        rect.y.max(0) as u32,
        rect.width.max(0) as u32,
        rect.height.max(0) as u32,
    )
    .to_image()
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use super::*;

    /// Replays one scripted response per call, then keeps returning the
    /// fallback. Records the size of every image it was given.
    pub struct ScriptedDetector {
        script: VecDeque<Result<Vec<Rect>, DetectionError>>,
        fallback: Vec<Rect>,
        pub seen: Arc<Mutex<Vec<(u32, u32)>>>,
    }

    impl ScriptedDetector {
        pub fn always(candidates: Vec<Rect>) -> Self {
            Self {
                script: VecDeque::new(),
                fallback: candidates,
                seen: Arc::default(),
            }
        }

        pub fn sequence(script: Vec<Vec<Rect>>) -> Self {
            Self {
                script: script.into_iter().map(Ok).collect(),
                fallback: Vec::new(),
                seen: Arc::default(),
            }
        }

        pub fn failing() -> Self {
            Self {
                script: VecDeque::from([Err(DetectionError::Inference("boom".into()))]),
                fallback: Vec::new(),
                seen: Arc::default(),
            }
        }
    }

    impl Detector for ScriptedDetector {
        fn detect(&mut self, image: &GrayImage) -> Result<Vec<Rect>, DetectionError> {
            self.seen.lock().unwrap().push(image.dimensions());
            self.script
                .pop_front()
                .unwrap_or_else(|| Ok(self.fallback.clone()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::ScriptedDetector;
    use super::*;

    fn gray(w: u32, h: u32) -> GrayImage {
        GrayImage::new(w, h)
    }

    #[test]
    fn test_empty_set_reports_unavailable() {
        let mut set = DetectorSet::new();
        assert!(set.roles().is_empty());
        assert_eq!(set.detect(DetectorRole::Face, &gray(4, 4)), None);
    }

    #[test]
    fn test_configured_role_returns_candidates() {
        let face = Rect::new(1, 1, 2, 2);
        let mut set =
            DetectorSet::new().with(DetectorRole::Face, Box::new(ScriptedDetector::always(vec![face])));
        assert!(set.has(DetectorRole::Face));
        assert!(!set.has(DetectorRole::Nose));
        assert_eq!(set.detect(DetectorRole::Face, &gray(4, 4)), Some(vec![face]));
    }

    #[test]
    fn test_runtime_failure_is_treated_as_no_candidates() {
        let mut set = DetectorSet::new().with(DetectorRole::Profile, Box::new(ScriptedDetector::failing()));
        assert_eq!(set.detect(DetectorRole::Profile, &gray(4, 4)), Some(vec![]));
    }

    #[test]
    fn test_remove_clears_slot() {
        let mut set = DetectorSet::new().with(DetectorRole::Nose, Box::new(ScriptedDetector::always(vec![])));
        assert!(set.remove(DetectorRole::Nose).is_some());
        assert_eq!(set.roles(), vec![]);
    }

    #[test]
    fn test_role_display() {
        let names: Vec<String> = DetectorRole::ALL.iter().map(|r| r.to_string()).collect();
        assert_eq!(names, ["face", "profile", "nose"]);
    }

    #[test]
    fn test_crop_extracts_region() {
        let mut image = gray(4, 4);
        image.put_pixel(2, 3, image::Luma([200]));
        let cropped = crop(&image, &Rect::new(1, 2, 2, 2));
        assert_eq!(cropped.dimensions(), (2, 2));
        assert_eq!(cropped.get_pixel(1, 1).0, [200]);
    }
}

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use image::GrayImage;

use crate::detection::domain::detector::{Detector, DetectorRole};
use crate::error::{ConfigurationError, DetectionError};
use crate::shared::geometry::Rect;

/// Smallest face `rustface` accepts; lower values are rejected by its
/// detector.
pub const DEFAULT_MIN_FACE_SIZE: u32 = 20;
const DEFAULT_SCORE_THRESH: f64 = 2.0;

/// Frontal face detector backed by the SeetaFace cascade in `rustface`.
///
/// The model is read once; a fresh detector is created from it per call
/// because `rustface` detectors hold per-image scratch state.
pub struct SeetaFaceDetector {
    model: rustface::Model,
    min_face_size: u32,
    score_thresh: f64,
}

impl SeetaFaceDetector {
    pub fn from_file(path: &Path) -> Result<Self, ConfigurationError> {
        if !path.exists() {
            return Err(ConfigurationError::ModelMissing {
                role: DetectorRole::Face,
                path: path.to_path_buf(),
            });
        }
        let load_failed = |message: String| ConfigurationError::LoadFailed {
            role: DetectorRole::Face,
            path: path.to_path_buf(),
            message,
        };
        let file = File::open(path).map_err(|e| load_failed(e.to_string()))?;
        let model = rustface::read_model(BufReader::new(file)).map_err(|e| load_failed(e.to_string()))?;
        log::info!("Loaded SeetaFace model {}", path.display());
        Ok(Self {
            model,
            min_face_size: DEFAULT_MIN_FACE_SIZE,
            score_thresh: DEFAULT_SCORE_THRESH,
        })
    }

    pub fn with_min_face_size(mut self, min_face_size: u32) -> Self {
        self.min_face_size = min_face_size;
        self
    }
}

impl Detector for SeetaFaceDetector {
    fn detect(&mut self, image: &GrayImage) -> Result<Vec<Rect>, DetectionError> {
        let (width, height) = image.dimensions();
        if width < self.min_face_size || height < self.min_face_size {
            return Ok(Vec::new());
        }
        let mut detector = rustface::create_detector_with_model(self.model.clone());
        detector.set_min_face_size(self.min_face_size);
        detector.set_score_thresh(self.score_thresh);
        detector.set_pyramid_scale_factor(0.8);
        detector.set_slide_window_step(4, 4);

        let faces = detector.detect(&rustface::ImageData::new(image.as_raw(), width, height));
        Ok(faces
            .iter()
            .filter_map(|face| {
                let bbox = face.bbox();
                Rect::new(bbox.x(), bbox.y(), bbox.width() as i32, bbox.height() as i32)
                    .clamp_to(width, height)
            })
            .collect())
    }
}

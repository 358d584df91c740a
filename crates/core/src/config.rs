//! Tracker configuration, loadable from JSON and overridden by front ends.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::detection::infrastructure::onnx_pose_detector::{
    DEFAULT_CONFIDENCE, DEFAULT_PROFILE_THRESHOLD,
};
use crate::detection::infrastructure::seeta_face_detector::DEFAULT_MIN_FACE_SIZE;
use crate::error::ConfigurationError;
use crate::shared::constants::FRAME_INTERVAL_MS;
use crate::tracking::domain::band::{BandController, BandKind, DEFAULT_DRAG_TOLERANCE};
use crate::tracking::domain::landmark_estimator::{
    DEFAULT_PROXY_FRACTION, MAX_PROXY_FRACTION, MIN_PROXY_FRACTION,
};

pub const DEFAULT_BAND_FRACTION: f64 = 0.6;
pub const DEFAULT_STRIP_HEIGHT: i32 = 40;

/// Which model locates frontal faces.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FaceBackend {
    /// SeetaFace cascade via `rustface`.
    Seeta,
    /// YOLO-pose ONNX model.
    #[default]
    Pose,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub backend: FaceBackend,
    /// Explicit SeetaFace model; resolved from the cache when absent.
    pub face_model: Option<PathBuf>,
    /// Explicit pose model; resolved from the cache when absent.
    pub pose_model: Option<PathBuf>,
    pub nose: bool,
    pub profile: bool,
    pub confidence: f64,
    pub profile_threshold: f64,
    /// Smallest face side in pixels the SeetaFace backend looks for.
    pub min_face_size: u32,
    /// Fail startup instead of running with tracking unavailable.
    pub require_face: bool,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            backend: FaceBackend::default(),
            face_model: None,
            pose_model: None,
            nose: true,
            profile: true,
            confidence: DEFAULT_CONFIDENCE,
            profile_threshold: DEFAULT_PROFILE_THRESHOLD,
            min_face_size: DEFAULT_MIN_FACE_SIZE,
            require_face: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub nose_proxy_fraction: f64,
    pub band_kind: BandKind,
    /// Initial band position as a fraction of the frame height.
    pub band_fraction: f64,
    /// Absolute initial band position; wins over `band_fraction`.
    pub band_y: Option<i32>,
    pub strip_height: i32,
    pub drag_tolerance: i32,
    pub frame_interval_ms: u64,
    pub mirror: bool,
    pub detectors: DetectorConfig,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            nose_proxy_fraction: DEFAULT_PROXY_FRACTION,
            band_kind: BandKind::Line,
            band_fraction: DEFAULT_BAND_FRACTION,
            band_y: None,
            strip_height: DEFAULT_STRIP_HEIGHT,
            drag_tolerance: DEFAULT_DRAG_TOLERANCE,
            frame_interval_ms: FRAME_INTERVAL_MS,
            mirror: true,
            detectors: DetectorConfig::default(),
        }
    }
}

impl TrackerConfig {
    /// Reads a JSON file. Missing keys keep their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigurationError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigurationError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|source| ConfigurationError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if !(MIN_PROXY_FRACTION..=MAX_PROXY_FRACTION).contains(&self.nose_proxy_fraction) {
            return Err(ConfigurationError::Invalid(format!(
                "nose_proxy_fraction must be within {MIN_PROXY_FRACTION}..={MAX_PROXY_FRACTION}, got {}",
                self.nose_proxy_fraction
            )));
        }
        if !(0.0..=1.0).contains(&self.band_fraction) {
            return Err(ConfigurationError::Invalid(format!(
                "band_fraction must be within 0..=1, got {}",
                self.band_fraction
            )));
        }
        if self.strip_height < 0 {
            return Err(ConfigurationError::Invalid(format!(
                "strip_height must not be negative, got {}",
                self.strip_height
            )));
        }
        if self.drag_tolerance < 0 {
            return Err(ConfigurationError::Invalid(format!(
                "drag_tolerance must not be negative, got {}",
                self.drag_tolerance
            )));
        }
        if self.detectors.min_face_size < DEFAULT_MIN_FACE_SIZE {
            return Err(ConfigurationError::Invalid(format!(
                "min_face_size must be at least {DEFAULT_MIN_FACE_SIZE}, got {}",
                self.detectors.min_face_size
            )));
        }
        if !(0.0..=1.0).contains(&self.detectors.confidence) {
            return Err(ConfigurationError::Invalid(format!(
                "confidence must be within 0..=1, got {}",
                self.detectors.confidence
            )));
        }
        Ok(())
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }

    /// A band controller placed from this configuration. Fractional
    /// placement resolves on the first frame, once the height is known.
    pub fn band_controller(&self) -> BandController {
        match self.band_y {
            Some(y) => BandController::new(self.band_kind.at(y, self.strip_height), self.drag_tolerance),
            None => BandController::anchored(
                self.band_kind,
                self.band_fraction,
                self.strip_height,
                self.drag_tolerance,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::domain::band::Band;
    use rstest::rstest;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = TrackerConfig::default();
        assert_eq!(config.nose_proxy_fraction, 0.58);
        assert_eq!(config.frame_interval(), Duration::from_millis(15));
        assert_eq!(config.drag_tolerance, 20);
        assert!(config.mirror);
        assert_eq!(config.detectors.backend, FaceBackend::Pose);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_partial_file_keeps_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("noseline.json");
        fs::write(
            &path,
            r#"{"band_kind": "strip", "strip_height": 60, "detectors": {"backend": "seeta", "nose": false}}"#,
        )
        .unwrap();

        let config = TrackerConfig::load(&path).unwrap();
        assert_eq!(config.band_kind, BandKind::Strip);
        assert_eq!(config.strip_height, 60);
        assert_eq!(config.detectors.backend, FaceBackend::Seeta);
        assert!(!config.detectors.nose);
        assert!(config.detectors.profile);
        assert_eq!(config.detectors.min_face_size, 20);
        assert_eq!(config.nose_proxy_fraction, 0.58);
    }

    #[test]
    fn test_load_missing_file() {
        let tmp = TempDir::new().unwrap();
        let err = TrackerConfig::load(&tmp.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, ConfigurationError::Read { .. }));
    }

    #[test]
    fn test_load_malformed_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bad.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(TrackerConfig::load(&path).unwrap_err(), ConfigurationError::Parse { .. }));
    }

    #[rstest]
    #[case::fraction_low(TrackerConfig { nose_proxy_fraction: 0.4, ..Default::default() })]
    #[case::fraction_high(TrackerConfig { nose_proxy_fraction: 0.7, ..Default::default() })]
    #[case::band_fraction(TrackerConfig { band_fraction: 1.5, ..Default::default() })]
    #[case::strip_height(TrackerConfig { strip_height: -1, ..Default::default() })]
    #[case::tolerance(TrackerConfig { drag_tolerance: -3, ..Default::default() })]
    #[case::min_face_size(TrackerConfig {
        detectors: DetectorConfig { min_face_size: 12, ..Default::default() },
        ..Default::default()
    })]
    fn test_validate_rejects(#[case] config: TrackerConfig) {
        assert!(matches!(config.validate(), Err(ConfigurationError::Invalid(_))));
    }

    #[test]
    fn test_band_controller_absolute_position() {
        let config = TrackerConfig {
            band_y: Some(150),
            ..Default::default()
        };
        assert_eq!(config.band_controller().band(), Band::Line { y: 150 });
    }

    #[test]
    fn test_band_controller_fraction_resolves_on_first_frame() {
        let config = TrackerConfig {
            band_kind: BandKind::Strip,
            ..Default::default()
        };
        let mut controller = config.band_controller();
        controller.sync_frame_height(480);
        assert_eq!(
            controller.band(),
            Band::Strip {
                center_y: 288,
                height: 40
            }
        );
    }
}

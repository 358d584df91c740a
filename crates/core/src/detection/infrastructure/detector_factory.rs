use std::path::Path;

use crate::config::{DetectorConfig, FaceBackend};
use crate::detection::domain::detector::{DetectorRole, DetectorSet};
use crate::error::ConfigurationError;
use crate::shared::model_resolver::{self, ModelResolveError, ModelSpec, POSE_MODEL, SEETA_MODEL};

use super::onnx_pose_detector::PoseModel;
use super::seeta_face_detector::SeetaFaceDetector;

/// Builds the detector set described by `config`.
///
/// Each role that fails to load is reported once with a warning and left
/// out of the set. Only a missing face detector with `require_face` set is
/// fatal.
pub fn build_detectors(
    config: &DetectorConfig,
    bundled_dir: Option<&Path>,
) -> Result<DetectorSet, ConfigurationError> {
    let mut detectors = DetectorSet::new();

    let pose_roles = pose_roles(config);
    if !pose_roles.is_empty() {
        let loaded = resolve_model(POSE_MODEL, config.pose_model.as_deref(), bundled_dir, pose_roles[0])
            .and_then(|path| PoseModel::load(&path));
        match loaded {
            Ok(model) => {
                for role in &pose_roles {
                    detectors.insert(
                        *role,
                        Box::new(model.detector(*role, config.confidence, config.profile_threshold)),
                    );
                }
            }
            Err(e) => {
                let names: Vec<String> = pose_roles.iter().map(ToString::to_string).collect();
                log::warn!("{e}; disabling {} detection", names.join(", "));
            }
        }
    }

    if config.backend == FaceBackend::Seeta {
        let loaded = resolve_model(SEETA_MODEL, config.face_model.as_deref(), bundled_dir, DetectorRole::Face)
            .and_then(|path| SeetaFaceDetector::from_file(&path))
            .map(|detector| detector.with_min_face_size(config.min_face_size));
        match loaded {
            Ok(detector) => detectors.insert(DetectorRole::Face, Box::new(detector)),
            Err(e) => log::warn!("{e}; face tracking unavailable"),
        }
    }

    if !detectors.has(DetectorRole::Face) && config.require_face {
        return Err(ConfigurationError::FaceDetectorRequired);
    }
    log::info!("Detectors loaded: {detectors:?}");
    Ok(detectors)
}

/// Roles served by the pose model under `config`, face first.
fn pose_roles(config: &DetectorConfig) -> Vec<DetectorRole> {
    let mut roles = Vec::new();
    if config.backend == FaceBackend::Pose {
        roles.push(DetectorRole::Face);
    }
    if config.profile {
        roles.push(DetectorRole::Profile);
    }
    if config.nose {
        roles.push(DetectorRole::Nose);
    }
    roles
}

fn resolve_model(
    model: ModelSpec,
    explicit: Option<&Path>,
    bundled_dir: Option<&Path>,
    role: DetectorRole,
) -> Result<std::path::PathBuf, ConfigurationError> {
    model_resolver::resolve(model, explicit, bundled_dir, None).map_err(|e| match e {
        ModelResolveError::Missing(path) => ConfigurationError::ModelMissing { role, path },
        other => ConfigurationError::LoadFailed {
            role,
            path: explicit.map(Path::to_path_buf).unwrap_or_else(|| model.name.into()),
            message: other.to_string(),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::path::PathBuf;

    fn missing_models(dir: &Path) -> DetectorConfig {
        DetectorConfig {
            face_model: Some(dir.join("absent.bin")),
            pose_model: Some(dir.join("absent.onnx")),
            ..DetectorConfig::default()
        }
    }

    #[rstest]
    #[case(FaceBackend::Pose, true, true, vec![DetectorRole::Face, DetectorRole::Profile, DetectorRole::Nose])]
    #[case(FaceBackend::Seeta, true, false, vec![DetectorRole::Profile])]
    #[case(FaceBackend::Seeta, false, false, vec![])]
    #[case(FaceBackend::Pose, false, true, vec![DetectorRole::Face, DetectorRole::Nose])]
    fn test_pose_roles(
        #[case] backend: FaceBackend,
        #[case] profile: bool,
        #[case] nose: bool,
        #[case] expected: Vec<DetectorRole>,
    ) {
        let config = DetectorConfig {
            backend,
            profile,
            nose,
            ..DetectorConfig::default()
        };
        assert_eq!(pose_roles(&config), expected);
    }

    #[rstest]
    #[case(FaceBackend::Pose)]
    #[case(FaceBackend::Seeta)]
    fn test_missing_models_degrade_to_empty_set(#[case] backend: FaceBackend) {
        let dir = tempfile::tempdir().unwrap();
        let config = DetectorConfig {
            backend,
            ..missing_models(dir.path())
        };
        let detectors = build_detectors(&config, None).unwrap();
        assert!(detectors.roles().is_empty());
    }

    #[test]
    fn test_require_face_fails_without_face_detector() {
        let dir = tempfile::tempdir().unwrap();
        let config = DetectorConfig {
            require_face: true,
            ..missing_models(dir.path())
        };
        let err = build_detectors(&config, None).unwrap_err();
        assert!(matches!(err, ConfigurationError::FaceDetectorRequired));
    }

    #[test]
    fn test_missing_explicit_model_names_role_and_path() {
        let path = PathBuf::from("/nonexistent/seeta.bin");
        let err = resolve_model(SEETA_MODEL, Some(&path), None, DetectorRole::Face).unwrap_err();
        match err {
            ConfigurationError::ModelMissing { role, path: reported } => {
                assert_eq!(role, DetectorRole::Face);
                assert_eq!(reported, path);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}

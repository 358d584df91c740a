use std::thread;

use crossbeam_channel::Receiver;

use noseline_core::config::DetectorConfig;
use noseline_core::detection::domain::detector::DetectorSet;
use noseline_core::detection::infrastructure::detector_factory::build_detectors;

pub enum LoaderMessage {
    Loaded(DetectorSet),
    /// Loading failed outright; the set is empty and tracking unavailable.
    Failed(String),
}

/// Resolves and loads the detectors off the UI thread. Model downloads can
/// take a while on first launch.
pub fn spawn(config: DetectorConfig) -> Receiver<LoaderMessage> {
    let (tx, rx) = crossbeam_channel::bounded::<LoaderMessage>(1);

    thread::spawn(move || {
        let message = match build_detectors(&config, None) {
            Ok(detectors) => LoaderMessage::Loaded(detectors),
            Err(e) => LoaderMessage::Failed(e.to_string()),
        };
        let _ = tx.send(message);
    });

    rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_missing_models_still_report_loaded() {
        let tmp = tempfile::tempdir().unwrap();
        let config = DetectorConfig {
            face_model: Some(tmp.path().join("absent.bin")),
            pose_model: Some(tmp.path().join("absent.onnx")),
            ..DetectorConfig::default()
        };
        match spawn(config).recv_timeout(Duration::from_secs(10)).unwrap() {
            LoaderMessage::Loaded(detectors) => assert!(detectors.roles().is_empty()),
            LoaderMessage::Failed(e) => panic!("unexpected failure: {e}"),
        }
    }

    #[test]
    fn test_required_face_reports_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let config = DetectorConfig {
            pose_model: Some(tmp.path().join("absent.onnx")),
            require_face: true,
            ..DetectorConfig::default()
        };
        let message = spawn(config).recv_timeout(Duration::from_secs(10)).unwrap();
        assert!(matches!(message, LoaderMessage::Failed(_)));
    }
}

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use noseline_core::config::{FaceBackend, TrackerConfig};
use noseline_core::shared::constants::APP_DIR_NAME;
use noseline_core::tracking::domain::band::BandKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Appearance {
    System,
    Dark,
    Light,
}

impl Appearance {
    pub const ALL: &[Appearance] = &[Appearance::System, Appearance::Dark, Appearance::Light];
}

impl std::fmt::Display for Appearance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Appearance::System => write!(f, "System"),
            Appearance::Dark => write!(f, "Dark"),
            Appearance::Light => write!(f, "Light"),
        }
    }
}

/// Preferences remembered between runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub appearance: Appearance,
    pub high_contrast: bool,
    /// ffmpeg input format; the platform default when unset.
    pub camera_format: Option<String>,
    pub camera_device: Option<String>,
    pub mirror: bool,
    pub detect_faces: bool,
    /// Last band position in frame pixels.
    pub band_y: Option<i32>,
    pub strip_height: Option<i32>,
    pub backend: FaceBackend,
    pub face_model: Option<PathBuf>,
    pub pose_model: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            appearance: Appearance::System,
            high_contrast: false,
            camera_format: None,
            camera_device: None,
            mirror: true,
            detect_faces: true,
            band_y: None,
            strip_height: None,
            backend: FaceBackend::default(),
            face_model: None,
            pose_model: None,
        }
    }
}

impl Settings {
    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR_NAME).join("settings.json"))
    }

    pub fn load() -> Self {
        Self::config_path()
            .map(|path| Self::load_from(&path))
            .unwrap_or_default()
    }

    pub fn save(&self) {
        if let Some(path) = Self::config_path() {
            self.save_to(&path);
        }
    }

    fn load_from(path: &Path) -> Self {
        fs::read_to_string(path)
            .ok()
            .and_then(|json| serde_json::from_str(&json).ok())
            .unwrap_or_default()
    }

    fn save_to(&self, path: &Path) {
        if let Some(parent) = path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        match serde_json::to_string_pretty(self) {
            Ok(json) => {
                if let Err(e) = fs::write(path, json) {
                    log::warn!("Could not save settings to {}: {e}", path.display());
                }
            }
            Err(e) => log::warn!("Could not serialize settings: {e}"),
        }
    }

    /// Tracker configuration for these preferences.
    pub fn tracker_config(&self) -> TrackerConfig {
        let mut config = TrackerConfig {
            mirror: self.mirror,
            band_y: self.band_y,
            ..TrackerConfig::default()
        };
        if let Some(height) = self.strip_height {
            config.band_kind = BandKind::Strip;
            config.strip_height = height;
        }
        config.detectors.backend = self.backend;
        config.detectors.face_model = self.face_model.clone();
        config.detectors.pose_model = self.pose_model.clone();
        config
    }
}

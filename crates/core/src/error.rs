//! Error types shared across the tracking engine and its front ends.
//!
//! "No face in frame" is never an error; it is an ordinary tracking result.

use std::path::PathBuf;

use thiserror::Error;

use crate::detection::domain::detector::DetectorRole;

/// A detector or its model could not be set up at startup.
///
/// Front ends log these once and run with the feature degraded, unless the
/// face detector is explicitly required.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("{role} detector model not found at {path}")]
    ModelMissing { role: DetectorRole, path: PathBuf },
    #[error("failed to load {role} detector from {path}: {message}")]
    LoadFailed {
        role: DetectorRole,
        path: PathBuf,
        message: String,
    },
    #[error("face detector is required but could not be loaded")]
    FaceDetectorRequired,
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error("failed to read configuration file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// The frame source could not be opened or stopped producing frames.
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("could not open {device}: {message}")]
    Open { device: String, message: String },
    #[error("failed to read a frame from {device}: {message}")]
    Read { device: String, message: String },
    #[error("{0} has no more frames")]
    EndOfStream(String),
    #[error("capture source is not open")]
    NotOpen,
}

/// A single detector invocation failed. Callers log it and treat the frame
/// as having no candidates for that role.
#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("inference failed: {0}")]
    Inference(String),
    #[error("unexpected model output: {0}")]
    Output(String),
    #[error("detector session is poisoned")]
    Poisoned,
}

/// A client request could not be turned into a frame and band.
#[derive(Error, Debug)]
pub enum InputError {
    #[error("image_data must be a data:image URL")]
    NotDataUrl,
    #[error("image_data has no base64 payload")]
    MissingPayload,
    #[error("image_data is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("image could not be decoded: {0}")]
    Image(#[from] image::ImageError),
    #[error("malformed request body: {0}")]
    Json(#[from] serde_json::Error),
    #[error("horizontal_band_height must not be negative (got {0})")]
    NegativeBandHeight(i32),
    #[error("request body exceeds {0} bytes")]
    TooLarge(usize),
    #[error("request body could not be read: {0}")]
    Body(#[from] std::io::Error),
}

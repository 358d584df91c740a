pub const POSE_MODEL_NAME: &str = "yolo11n-pose_widerface.onnx";
pub const POSE_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/yolo11n-pose_widerface.onnx";

pub const SEETA_MODEL_NAME: &str = "seeta_fd_frontal_v1.0.bin";
pub const SEETA_MODEL_URL: &str =
    "https://github.com/atomashpolskiy/rustface/raw/master/model/seeta_fd_frontal_v1.0.bin";

/// Directory name used under the platform cache and config dirs.
pub const APP_DIR_NAME: &str = "Noseline";

/// Delay between frame ticks in the preview loops.
pub const FRAME_INTERVAL_MS: u64 = 15;

/// Status shown while frames flow with detection switched off.
pub const STATUS_CAMERA_RUNNING: &str = "Camera running";
pub const STATUS_CAMERA_STOPPED: &str = "Camera stopped";

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "webp"];

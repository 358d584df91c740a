//! YOLO-pose face model via ONNX Runtime, serving all three detector roles.
//!
//! One session is shared by the face, profile and nose detectors built from
//! a [`PoseModel`]. Each role filters the same raw detections differently:
//! frontal faces and turned faces are split on the landmark profile ratio,
//! and the nose role reports a small box around the nose keypoint.

use std::path::Path;
use std::sync::{Arc, Mutex};

use image::GrayImage;

use crate::detection::domain::detector::{Detector, DetectorRole};
use crate::detection::domain::face_landmarks::FaceLandmarks;
use crate::error::{ConfigurationError, DetectionError};
use crate::shared::geometry::Rect;

use super::onnx_session::{declared_input_size, load_session};

/// Fallback input resolution when the model doesn't declare one.
const DEFAULT_INPUT_SIZE: u32 = 640;

/// Default detection confidence threshold.
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

/// Profile ratio at or above which a face counts as turned away.
pub const DEFAULT_PROFILE_THRESHOLD: f64 = 0.6;

const NMS_IOU_THRESH: f64 = 0.45;

/// 5 landmarks x (x, y, conf).
const NUM_KEYPOINT_VALUES: usize = 15;

const KEYPOINT_CONF_THRESH: f64 = 0.5;

/// Nose box side relative to the face width.
const NOSE_BOX_FRACTION: f64 = 0.25;
const MIN_NOSE_BOX: i32 = 2;

/// A loaded pose model that can hand out role-specific detectors.
#[derive(Clone)]
pub struct PoseModel {
    session: Arc<Mutex<ort::session::Session>>,
    input_size: u32,
}

impl PoseModel {
    pub fn load(model_path: &Path) -> Result<Self, ConfigurationError> {
        if !model_path.exists() {
            return Err(ConfigurationError::ModelMissing {
                role: DetectorRole::Face,
                path: model_path.to_path_buf(),
            });
        }
        let session = load_session(model_path).map_err(|e| ConfigurationError::LoadFailed {
            role: DetectorRole::Face,
            path: model_path.to_path_buf(),
            message: e.to_string(),
        })?;
        let input_size = declared_input_size(&session).unwrap_or(DEFAULT_INPUT_SIZE);
        log::info!(
            "Loaded pose model {} ({input_size}x{input_size})",
            model_path.display()
        );
        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            input_size,
        })
    }

    pub fn detector(&self, role: DetectorRole, confidence: f64, profile_threshold: f64) -> OnnxPoseDetector {
        OnnxPoseDetector {
            model: self.clone(),
            role,
            confidence,
            profile_threshold,
        }
    }

    fn infer(&self, image: &GrayImage, confidence: f64) -> Result<Vec<PoseDetection>, DetectionError> {
        if image.width() == 0 || image.height() == 0 {
            return Ok(Vec::new());
        }
        let (input_tensor, letterbox) = letterbox(image, self.input_size);
        let input_value = ort::value::Tensor::from_array(input_tensor)
            .map_err(|e| DetectionError::Inference(e.to_string()))?;

        let mut session = self.session.lock().map_err(|_| DetectionError::Poisoned)?;
        let outputs = session
            .run(ort::inputs![input_value])
            .map_err(|e| DetectionError::Inference(e.to_string()))?;
        if outputs.len() == 0 {
            return Err(DetectionError::Output("model produced no outputs".into()));
        }
        let tensor = outputs[0]
            .try_extract_array::<f32>()
            .map_err(|e| DetectionError::Output(e.to_string()))?;
        let shape = tensor.shape().to_vec();
        if shape.len() != 3 {
            return Err(DetectionError::Output(format!("unexpected output shape {shape:?}")));
        }
        let data = tensor
            .as_slice()
            .ok_or_else(|| DetectionError::Output("output tensor is not contiguous".into()))?;

        let mut raw = parse_detections(data, &shape, confidence, &letterbox);
        Ok(nms(&mut raw, NMS_IOU_THRESH))
    }
}

/// One role's view of a [`PoseModel`].
pub struct OnnxPoseDetector {
    model: PoseModel,
    role: DetectorRole,
    confidence: f64,
    profile_threshold: f64,
}

impl Detector for OnnxPoseDetector {
    fn detect(&mut self, image: &GrayImage) -> Result<Vec<Rect>, DetectionError> {
        let detections = self.model.infer(image, self.confidence)?;
        Ok(select_for_role(
            &detections,
            self.role,
            self.profile_threshold,
            image.dimensions(),
        ))
    }
}

#[derive(Clone, Debug)]
struct PoseDetection {
    bbox: [f64; 4],
    confidence: f64,
    landmarks: Option<FaceLandmarks>,
}

impl PoseDetection {
    fn rect(&self) -> Rect {
        let [x1, y1, x2, y2] = self.bbox;
        Rect::new(
            x1.round() as i32,
            y1.round() as i32,
            (x2 - x1).round() as i32,
            (y2 - y1).round() as i32,
        )
    }

    fn is_turned(&self, threshold: f64) -> bool {
        self.landmarks
            .as_ref()
            .is_some_and(|lm| lm.profile_ratio() >= threshold)
    }
}

/// Face and profile boxes are clipped to the `(width, height)` frame; boxes
/// with nothing left inside it are dropped.
fn select_for_role(
    detections: &[PoseDetection],
    role: DetectorRole,
    profile_threshold: f64,
    (width, height): (u32, u32),
) -> Vec<Rect> {
    match role {
        DetectorRole::Face => detections
            .iter()
            .filter(|d| !d.is_turned(profile_threshold))
            .filter_map(|d| d.rect().clamp_to(width, height))
            .collect(),
        DetectorRole::Profile => detections
            .iter()
            .filter(|d| d.is_turned(profile_threshold))
            .filter_map(|d| d.rect().clamp_to(width, height))
            .collect(),
        DetectorRole::Nose => detections
            .iter()
            .filter_map(|d| {
                let (nx, ny) = d.landmarks.as_ref()?.nose()?;
                let face_width = d.bbox[2] - d.bbox[0];
                let side = ((face_width * NOSE_BOX_FRACTION).round() as i32).max(MIN_NOSE_BOX);
                let (cx, cy) = (nx.round() as i32, ny.round() as i32);
                Some(Rect::new(cx - side / 2, cy - side / 2, side, side))
            })
            .filter(|r| !r.is_empty())
            .collect(),
    }
}

// ---------------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug)]
struct Letterbox {
    scale: f64,
    pad_x: u32,
    pad_y: u32,
}

impl Letterbox {
    fn to_source(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (x - self.pad_x as f64) / self.scale,
            (y - self.pad_y as f64) / self.scale,
        )
    }
}

/// Letterbox-resize a gray image into a `target_size` square, replicating
/// the luma plane into the three input channels the model expects.
fn letterbox(image: &GrayImage, target_size: u32) -> (ndarray::Array4<f32>, Letterbox) {
    let (src_w, src_h) = image.dimensions();
    let target = target_size as f64;

    let scale = (target / src_w as f64).min(target / src_h as f64);
    let new_w = ((src_w as f64 * scale).round() as u32).min(target_size);
    let new_h = ((src_h as f64 * scale).round() as u32).min(target_size);
    let pad_x = (target_size - new_w) / 2;
    let pad_y = (target_size - new_h) / 2;

    // YOLO pads with 114/255 gray.
    let fill = 114.0f32 / 255.0;
    let size = target_size as usize;
    let mut tensor = ndarray::Array4::<f32>::from_elem((1, 3, size, size), fill);

    for y in 0..new_h {
        let src_y = ((y as f64 / scale) as u32).min(src_h - 1);
        for x in 0..new_w {
            let src_x = ((x as f64 / scale) as u32).min(src_w - 1);
            let value = image.get_pixel(src_x, src_y).0[0] as f32 / 255.0;
            let (ty, tx) = ((pad_y + y) as usize, (pad_x + x) as usize);
            for c in 0..3 {
                tensor[[0, c, ty, tx]] = value;
            }
        }
    }

    (tensor, Letterbox { scale, pad_x, pad_y })
}

// ---------------------------------------------------------------------------
// Postprocessing
// ---------------------------------------------------------------------------

/// Parse `[1, features, detections]` or `[1, detections, features]` output.
///
/// Row layout: `[cx, cy, w, h, conf, kp0_x, kp0_y, kp0_conf, ...]`.
fn parse_detections(data: &[f32], shape: &[usize], confidence: f64, letterbox: &Letterbox) -> Vec<PoseDetection> {
    let transposed = shape[1] < shape[2];
    let (num_dets, num_feats) = if transposed {
        (shape[2], shape[1])
    } else {
        (shape[1], shape[2])
    };
    if num_feats < 5 || data.len() < num_dets * num_feats {
        return Vec::new();
    }
    let value = |det: usize, feat: usize| -> f64 {
        let idx = if transposed {
            feat * num_dets + det
        } else {
            det * num_feats + feat
        };
        data[idx] as f64
    };

    let mut detections = Vec::new();
    for i in 0..num_dets {
        let conf = value(i, 4);
        if conf < confidence {
            continue;
        }
        let (cx, cy, w, h) = (value(i, 0), value(i, 1), value(i, 2), value(i, 3));
        let (x1, y1) = letterbox.to_source(cx - w / 2.0, cy - h / 2.0);
        let (x2, y2) = letterbox.to_source(cx + w / 2.0, cy + h / 2.0);

        // A box with no confident keypoint is treated as landmarkless.
        let landmarks = (num_feats >= 5 + NUM_KEYPOINT_VALUES)
            .then(|| {
                let mut pts = [(0.0f64, 0.0f64); 5];
                for (k, pt) in pts.iter_mut().enumerate() {
                    let base = 5 + k * 3;
                    if value(i, base + 2) >= KEYPOINT_CONF_THRESH {
                        *pt = letterbox.to_source(value(i, base), value(i, base + 1));
                    }
                }
                FaceLandmarks::new(pts)
            })
            .filter(FaceLandmarks::has_visible);

        detections.push(PoseDetection {
            bbox: [x1, y1, x2, y2],
            confidence: conf,
            landmarks,
        });
    }
    detections
}

/// Greedy NMS: highest confidence first, drop boxes overlapping a kept one.
fn nms(dets: &mut [PoseDetection], iou_thresh: f64) -> Vec<PoseDetection> {
    dets.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<PoseDetection> = Vec::new();
    for det in dets.iter() {
        if keep.iter().all(|k| bbox_iou(&k.bbox, &det.bbox) <= iou_thresh) {
            keep.push(det.clone());
        }
    }
    keep
}

/// IoU between two `[x1, y1, x2, y2]` boxes.
fn bbox_iou(a: &[f64; 4], b: &[f64; 4]) -> f64 {
    let x1 = a[0].max(b[0]);
    let y1 = a[1].max(b[1]);
    let x2 = a[2].min(b[2]);
    let y2 = a[3].min(b[3]);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    if inter == 0.0 {
        return 0.0;
    }
    let area_a = (a[2] - a[0]) * (a[3] - a[1]);
    let area_b = (b[2] - b[0]) * (b[3] - b[1]);
    inter / (area_a + area_b - inter)
}

//! JSON shapes exchanged with the browser client.

use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

use crate::error::InputError;
use crate::shared::frame::Frame;
use crate::tracking::domain::band::Band;
use crate::tracking::domain::tracking_result::TrackingResult;

const DATA_URL_PREFIX: &str = "data:image";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    /// `data:image/<fmt>;base64,<payload>`.
    pub image_data: String,
    pub horizontal_band_center_y: i32,
    pub horizontal_band_height: i32,
}

impl AnalyzeRequest {
    pub fn parse(body: &[u8]) -> Result<Self, InputError> {
        Ok(serde_json::from_slice(body)?)
    }

    pub fn band(&self) -> Result<Band, InputError> {
        if self.horizontal_band_height < 0 {
            return Err(InputError::NegativeBandHeight(self.horizontal_band_height));
        }
        Ok(Band::Strip {
            center_y: self.horizontal_band_center_y,
            height: self.horizontal_band_height,
        })
    }

    pub fn frame(&self) -> Result<Frame, InputError> {
        decode_data_url(&self.image_data)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    pub face: Option<[i32; 4]>,
    pub nose: Option<[i32; 2]>,
    pub tracking_bad: bool,
    pub status: String,
}

impl From<&TrackingResult> for AnalyzeResponse {
    fn from(result: &TrackingResult) -> Self {
        Self {
            face: result.face.map(|r| r.to_array()),
            nose: result.nose.map(|p| [p.x, p.y]),
            tracking_bad: result.tracking_bad(),
            status: result.status.clone(),
        }
    }
}

impl AnalyzeResponse {
    /// Reply for a request that never reached the tracker.
    pub fn rejected(error: &InputError) -> Self {
        Self {
            face: None,
            nose: None,
            tracking_bad: true,
            status: format!("Invalid request: {error}"),
        }
    }
}

/// Decodes a `data:image/...;base64,...` URL into an RGB frame.
pub fn decode_data_url(data: &str) -> Result<Frame, InputError> {
    if !data.starts_with(DATA_URL_PREFIX) {
        return Err(InputError::NotDataUrl);
    }
    let (_, payload) = data.split_once(',').ok_or(InputError::MissingPayload)?;
    let payload = payload.trim();
    if payload.is_empty() {
        return Err(InputError::MissingPayload);
    }
    let bytes = BASE64_STANDARD.decode(payload)?;
    let image = image::load_from_memory(&bytes)?;
    Ok(Frame::from_rgb_image(image.to_rgb8(), 0))
}

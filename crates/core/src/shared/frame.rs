use image::{GrayImage, RgbImage};
use ndarray::{ArrayView3, ArrayViewMut3};

/// ITU-R BT.601 luma weights, matching the usual RGB-to-gray conversion.
const LUMA_WEIGHTS: [f32; 3] = [0.299, 0.587, 0.114];

/// A single captured frame: contiguous pixel bytes in row-major order.
///
/// Capture yields RGB (3 channels); the browser path may hand in RGBA.
/// Detection always runs on the grayscale view from [`Frame::to_gray`].
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
    index: usize,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8, index: usize) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * (channels as usize),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            channels,
            index,
        }
    }

    pub fn from_rgb_image(image: RgbImage, index: usize) -> Self {
        let (width, height) = image.dimensions();
        Self::new(image.into_raw(), width, height, 3, index)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(self.shape(), &self.data)
            .expect("Frame data length must match dimensions")
    }

    pub fn as_ndarray_mut(&mut self) -> ArrayViewMut3<'_, u8> {
        ArrayViewMut3::from_shape(self.shape(), &mut self.data)
            .expect("Frame data length must match dimensions")
    }

    /// Single-channel luma image. Alpha, if any, is ignored.
    pub fn to_gray(&self) -> GrayImage {
        let channels = self.channels as usize;
        let luma: Vec<u8> = if channels < 3 {
            self.data.iter().step_by(channels.max(1)).copied().collect()
        } else {
            self.data
                .chunks_exact(channels)
                .map(|px| {
                    let y = px[0] as f32 * LUMA_WEIGHTS[0]
                        + px[1] as f32 * LUMA_WEIGHTS[1]
                        + px[2] as f32 * LUMA_WEIGHTS[2];
                    y.round().clamp(0.0, 255.0) as u8
                })
                .collect()
        };
        GrayImage::from_raw(self.width, self.height, luma)
            .expect("Frame data length must match dimensions")
    }

    /// Horizontally flipped copy, as shown in a selfie-style preview.
    pub fn mirrored(&self) -> Frame {
        let row_len = self.width as usize * self.channels as usize;
        let channels = self.channels as usize;
        let mut data = Vec::with_capacity(self.data.len());
        if row_len > 0 {
            for row in self.data.chunks_exact(row_len) {
                for px in row.chunks_exact(channels).rev() {
                    data.extend_from_slice(px);
                }
            }
        }
        Frame::new(data, self.width, self.height, self.channels, self.index)
    }

    /// RGBA bytes for display surfaces. Gray frames are expanded.
    pub fn to_rgba(&self) -> Vec<u8> {
        let channels = self.channels as usize;
        let mut out = Vec::with_capacity(self.width as usize * self.height as usize * 4);
        if channels == 0 {
            return out;
        }
        for px in self.data.chunks_exact(channels) {
            match channels {
                1 | 2 => out.extend_from_slice(&[px[0], px[0], px[0], 255]),
                3 => out.extend_from_slice(&[px[0], px[1], px[2], 255]),
                _ => out.extend_from_slice(&px[..4]),
            }
        }
        out
    }

    fn shape(&self) -> (usize, usize, usize) {
        (
            self.height as usize,
            self.width as usize,
            self.channels as usize,
        )
    }
}

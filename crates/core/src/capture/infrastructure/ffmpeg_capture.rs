use std::fmt;
use std::path::PathBuf;

use crate::capture::domain::frame_source::FrameSource;
use crate::error::CaptureError;
use crate::shared::frame::Frame;

/// Where frames come from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CaptureInput {
    /// A camera opened through an ffmpeg input device, e.g. `v4l2` with
    /// `/dev/video0`, `avfoundation` with `0`, or `dshow` with `video=...`.
    Device { format: String, name: String },
    /// A video file played back frame by frame.
    File(PathBuf),
}

impl CaptureInput {
    /// The platform's first camera.
    pub fn default_camera() -> Self {
        Self::camera(None, None)
    }

    /// A camera device; unset parts fall back to the platform default.
    pub fn camera(format: Option<String>, name: Option<String>) -> Self {
        let (default_format, default_name) = default_device();
        CaptureInput::Device {
            format: format.unwrap_or_else(|| default_format.to_string()),
            name: name.unwrap_or_else(|| default_name.to_string()),
        }
    }
}

impl fmt::Display for CaptureInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureInput::Device { format, name } => write!(f, "{format} device {name}"),
            CaptureInput::File(path) => write!(f, "file {}", path.display()),
        }
    }
}

#[cfg(target_os = "macos")]
fn default_device() -> (&'static str, &'static str) {
    ("avfoundation", "0")
}

#[cfg(target_os = "windows")]
fn default_device() -> (&'static str, &'static str) {
    ("dshow", "video=Integrated Camera")
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn default_device() -> (&'static str, &'static str) {
    ("v4l2", "/dev/video0")
}

/// Captures frames through ffmpeg-next (libavdevice + libavcodec) and
/// converts each one to RGB24.
pub struct FfmpegCapture {
    input: CaptureInput,
    video_size: Option<(u32, u32)>,
    state: Option<CaptureState>,
    frame_index: usize,
}

struct CaptureState {
    ictx: ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: ffmpeg_next::software::scaling::Context,
    stream_index: usize,
    width: u32,
    height: u32,
    flushing: bool,
}

// Safety: FfmpegCapture is only driven from one thread at a time. The raw
// pointers inside the ffmpeg types are never shared.
unsafe impl Send for FfmpegCapture {}

impl FfmpegCapture {
    pub fn new(input: CaptureInput) -> Self {
        Self {
            input,
            video_size: None,
            state: None,
            frame_index: 0,
        }
    }

    /// Requested device resolution. Ignored for files.
    pub fn with_video_size(mut self, width: u32, height: u32) -> Self {
        self.video_size = Some((width, height));
        self
    }

    pub fn is_open(&self) -> bool {
        self.state.is_some()
    }

    fn open_error(&self, message: impl ToString) -> CaptureError {
        CaptureError::Open {
            device: self.describe(),
            message: message.to_string(),
        }
    }

    fn read_error(&self, message: impl ToString) -> CaptureError {
        CaptureError::Read {
            device: self.describe(),
            message: message.to_string(),
        }
    }

    fn open_input(&self) -> Result<ffmpeg_next::format::context::Input, CaptureError> {
        match &self.input {
            CaptureInput::File(path) => ffmpeg_next::format::input(path).map_err(|e| self.open_error(e)),
            CaptureInput::Device { format, name } => {
                ffmpeg_next::device::register_all();
                let device_format = ffmpeg_next::device::input::video()
                    .find(|f| f.name() == format)
                    .ok_or_else(|| self.open_error(format!("input device format {format} is not available")))?;
                let mut options = ffmpeg_next::Dictionary::new();
                if let Some((w, h)) = self.video_size {
                    options.set("video_size", &format!("{w}x{h}"));
                }
                let ctx = ffmpeg_next::format::open_with(
                    name,
                    &ffmpeg_next::format::Format::Input(device_format),
                    options,
                )
                .map_err(|e| self.open_error(e))?;
                Ok(ctx.input())
            }
        }
    }
}

impl FrameSource for FfmpegCapture {
    fn open(&mut self) -> Result<(), CaptureError> {
        if self.state.is_some() {
            return Ok(());
        }
        ffmpeg_next::init().map_err(|e| self.open_error(e))?;

        let ictx = self.open_input()?;
        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or_else(|| self.open_error("no video stream found"))?;
        let stream_index = stream.index();
        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())
            .map_err(|e| self.open_error(e))?;
        let decoder = codec_ctx.decoder().video().map_err(|e| self.open_error(e))?;

        let (width, height) = (decoder.width(), decoder.height());
        let scaler = ffmpeg_next::software::scaling::Context::get(
            decoder.format(),
            width,
            height,
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )
        .map_err(|e| self.open_error(e))?;

        log::info!("Opened {} ({width}x{height})", self.describe());
        self.frame_index = 0;
        self.state = Some(CaptureState {
            ictx,
            decoder,
            scaler,
            stream_index,
            width,
            height,
            flushing: false,
        });
        Ok(())
    }

    fn read(&mut self) -> Result<Frame, CaptureError> {
        let index = self.frame_index;
        let result = match self.state.as_mut() {
            Some(state) => state.next_frame(index),
            None => return Err(CaptureError::NotOpen),
        };
        match result {
            Ok(Some(frame)) => {
                self.frame_index += 1;
                Ok(frame)
            }
            Ok(None) => Err(CaptureError::EndOfStream(self.describe())),
            Err(e) => Err(self.read_error(e)),
        }
    }

    fn close(&mut self) {
        if self.state.take().is_some() {
            log::info!("Closed {}", self.describe());
        }
    }

    fn describe(&self) -> String {
        match &self.input {
            CaptureInput::Device { format, name } => format!("camera {name} ({format})"),
            CaptureInput::File(path) => path.display().to_string(),
        }
    }
}

impl CaptureState {
    /// Next decoded frame, `None` once the stream is exhausted.
    fn next_frame(&mut self, index: usize) -> Result<Option<Frame>, ffmpeg_next::Error> {
        loop {
            if let Some(frame) = self.try_receive(index)? {
                return Ok(Some(frame));
            }
            if self.flushing {
                return Ok(None);
            }

            let Some((stream, packet)) = self.ictx.packets().next() else {
                let _ = self.decoder.send_eof();
                self.flushing = true;
                continue;
            };
            if stream.index() != self.stream_index {
                continue;
            }
            // Corrupt packets from a live device are skipped.
            if let Err(e) = self.decoder.send_packet(&packet) {
                log::debug!("Dropped packet: {e}");
            }
        }
    }

    fn try_receive(&mut self, index: usize) -> Result<Option<Frame>, ffmpeg_next::Error> {
        let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
        if self.decoder.receive_frame(&mut decoded).is_err() {
            return Ok(None);
        }
        let mut rgb_frame = ffmpeg_next::util::frame::video::Video::empty();
        self.scaler.run(&decoded, &mut rgb_frame)?;
        let pixels = extract_rgb_pixels(&rgb_frame, self.width, self.height);
        Ok(Some(Frame::new(pixels, self.width, self.height, 3, index)))
    }
}

/// Copies an ffmpeg RGB24 frame into a tightly packed buffer, dropping the
/// per-row stride padding.
fn extract_rgb_pixels(rgb_frame: &ffmpeg_next::util::frame::video::Video, width: u32, height: u32) -> Vec<u8> {
    let stride = rgb_frame.stride(0);
    let data = rgb_frame.data(0);
    let row_bytes = width as usize * 3;

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        pixels.extend_from_slice(&data[start..start + row_bytes]);
    }
    pixels
}

use crate::error::CaptureError;
use crate::shared::frame::Frame;

/// A live or recorded stream of RGB frames.
///
/// `open` acquires the device or file, `read` blocks for the next frame and
/// `close` releases everything. A source may be reopened after `close`.
pub trait FrameSource: Send {
    fn open(&mut self) -> Result<(), CaptureError>;

    fn read(&mut self) -> Result<Frame, CaptureError>;

    fn close(&mut self);

    /// Human-readable name used in logs and error messages.
    fn describe(&self) -> String;
}

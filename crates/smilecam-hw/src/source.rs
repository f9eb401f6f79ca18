//! Capture seams: something that yields frames, and something that opens it.

use crate::camera::CameraError;
use crate::frame::Frame;

/// An opened frame producer. Dropping it releases the underlying device.
pub trait FrameSource: Send {
    /// Read one frame. Blocks until the device delivers a buffer.
    fn read_frame(&mut self) -> Result<Frame, CameraError>;
}

/// Opens a [`FrameSource`] on demand; called once per capture session.
pub trait CameraProvider: Send + Sync {
    fn open(&self) -> Result<Box<dyn FrameSource>, CameraError>;

    /// Human-readable device identifier for logs and status output.
    fn describe(&self) -> String;
}

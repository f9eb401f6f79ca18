//! Webcam capture over V4L2.

use crate::frame::{self, Frame};
use crate::source::{CameraProvider, FrameSource};
use image::RgbImage;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use v4l::buffer::Type as BufType;
use v4l::capability::Flags;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::{Format, FourCC};

/// Highest `/dev/videoN` index checked by [`Camera::list_devices`].
const MAX_VIDEO_INDEX: u32 = 16;
/// Kernel buffers queued per capture.
const CAPTURE_BUFFERS: u32 = 4;
/// Longest wait for a dequeued buffer before the grab is abandoned.
const CAPTURE_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("camera not found: {0}")]
    DeviceNotFound(String),
    #[error("camera is in use by another process")]
    DeviceBusy,
    #[error("{0} is not a video capture device")]
    NotCaptureDevice(String),
    #[error("format negotiation failed: {0}")]
    FormatNegotiationFailed(String),
    #[error("frame grab failed: {0}")]
    CaptureFailed(String),
}

/// A V4L2 capture device found on the system.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub path: String,
    pub name: String,
    pub driver: String,
    pub bus: String,
}

/// Pixel layouts the camera may hand back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// One JPEG image per buffer; the default for USB webcams.
    Mjpeg,
    /// Packed YUV 4:2:2, two bytes per pixel.
    Yuyv,
    /// 8-bit luma only.
    Grey,
}

impl PixelFormat {
    fn from_fourcc(fourcc: FourCC) -> Option<Self> {
        match &fourcc.repr {
            b"MJPG" => Some(Self::Mjpeg),
            b"YUYV" => Some(Self::Yuyv),
            b"GREY" => Some(Self::Grey),
            _ => None,
        }
    }
}

/// An open webcam producing RGB frames.
pub struct Camera {
    device: Device,
    pub device_path: String,
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
}

impl Camera {
    /// Open `device_path` and ask for `width`x`height` MJPG. The driver may
    /// answer with another size or with YUYV/GREY; the negotiated values are
    /// kept on the returned handle.
    pub fn open(device_path: &str, width: u32, height: u32) -> Result<Self, CameraError> {
        let device = open_capture_device(device_path)?;
        let format = negotiate(&device, width, height)?;
        let pixel_format = PixelFormat::from_fourcc(format.fourcc).ok_or_else(|| {
            CameraError::FormatNegotiationFailed(format!(
                "driver offered {}, expected MJPG, YUYV or GREY",
                format.fourcc
            ))
        })?;

        tracing::info!(
            device = device_path,
            width = format.width,
            height = format.height,
            format = ?pixel_format,
            "camera ready"
        );

        Ok(Self {
            device,
            device_path: device_path.to_string(),
            width: format.width,
            height: format.height,
            pixel_format,
        })
    }

    /// Grab one frame and convert it to RGB.
    ///
    /// The stream lives only for this call, so nothing is left queued
    /// between polls.
    pub fn capture_frame(&self) -> Result<Frame, CameraError> {
        let mut stream =
            MmapStream::with_buffers(&self.device, BufType::VideoCapture, CAPTURE_BUFFERS)
                .map_err(|e| CameraError::CaptureFailed(format!("stream setup: {e}")))?;
        stream.set_timeout(CAPTURE_TIMEOUT);
        let (buf, meta) = stream
            .next()
            .map_err(|e| CameraError::CaptureFailed(format!("dequeue: {e}")))?;

        // MJPG buffers are only partly filled; bytesused marks the payload.
        let payload = match meta.bytesused as usize {
            0 => buf,
            n => &buf[..n.min(buf.len())],
        };
        let image = self.to_rgb(payload)?;
        Ok(Frame::new(image, meta.sequence))
    }

    fn to_rgb(&self, payload: &[u8]) -> Result<RgbImage, CameraError> {
        match self.pixel_format {
            PixelFormat::Mjpeg => frame::mjpeg_to_rgb(payload),
            PixelFormat::Yuyv => frame::yuyv_to_rgb(payload, self.width, self.height),
            PixelFormat::Grey => frame::grey_to_rgb(payload, self.width, self.height),
        }
        .map_err(|e| CameraError::CaptureFailed(format!("{:?} decode: {e}", self.pixel_format)))
    }

    /// Capture-capable devices among `/dev/video0` .. `/dev/video15`.
    pub fn list_devices() -> Vec<DeviceInfo> {
        (0..MAX_VIDEO_INDEX)
            .map(|i| format!("/dev/video{i}"))
            .filter(|path| Path::new(path).exists())
            .filter_map(|path| {
                let caps = Device::with_path(&path).ok()?.query_caps().ok()?;
                caps.capabilities
                    .contains(Flags::VIDEO_CAPTURE)
                    .then(|| DeviceInfo {
                        path,
                        name: caps.card,
                        driver: caps.driver,
                        bus: caps.bus,
                    })
            })
            .collect()
    }
}

fn open_capture_device(device_path: &str) -> Result<Device, CameraError> {
    if !Path::new(device_path).exists() {
        return Err(CameraError::DeviceNotFound(device_path.to_string()));
    }

    let device = Device::with_path(device_path).map_err(|e| match e.raw_os_error() {
        Some(code) if code == EBUSY => CameraError::DeviceBusy,
        _ => CameraError::DeviceNotFound(format!("{device_path}: {e}")),
    })?;

    let caps = device.query_caps().map_err(|e| {
        CameraError::DeviceNotFound(format!("{device_path}: querying capabilities: {e}"))
    })?;
    if !caps.capabilities.contains(Flags::VIDEO_CAPTURE) {
        return Err(CameraError::NotCaptureDevice(device_path.to_string()));
    }

    tracing::debug!(
        device = device_path,
        card = %caps.card,
        driver = %caps.driver,
        "opened V4L2 device"
    );
    Ok(device)
}

/// errno for "device or resource busy" on Linux.
const EBUSY: i32 = 16;

fn negotiate(device: &Device, width: u32, height: u32) -> Result<Format, CameraError> {
    let requested = Format::new(width, height, FourCC::new(b"MJPG"));
    device
        .set_format(&requested)
        .map_err(|e| CameraError::FormatNegotiationFailed(format!("{width}x{height} MJPG: {e}")))
}

impl FrameSource for Camera {
    fn read_frame(&mut self) -> Result<Frame, CameraError> {
        self.capture_frame()
    }
}

impl Drop for Camera {
    fn drop(&mut self) {
        tracing::info!(device = %self.device_path, "camera released");
    }
}

/// Opens a fresh [`Camera`] for every capture session.
#[derive(Debug, Clone)]
pub struct V4lCameraProvider {
    pub device_path: String,
    pub width: u32,
    pub height: u32,
}

impl V4lCameraProvider {
    pub fn new(device_path: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            device_path: device_path.into(),
            width,
            height,
        }
    }
}

impl CameraProvider for V4lCameraProvider {
    fn open(&self) -> Result<Box<dyn FrameSource>, CameraError> {
        let camera = Camera::open(&self.device_path, self.width, self.height)?;
        Ok(Box::new(camera))
    }

    fn describe(&self) -> String {
        format!("{} ({}x{})", self.device_path, self.width, self.height)
    }
}

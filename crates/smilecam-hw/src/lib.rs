//! smilecam-hw: hardware abstraction for webcam capture.
//!
//! Provides V4L2-based camera access, RGB frame conversion, and the
//! `FrameSource`/`CameraProvider` seams the daemon's capture loop polls.

pub mod camera;
pub mod frame;
pub mod source;

pub use camera::{Camera, CameraError, DeviceInfo, PixelFormat, V4lCameraProvider};
pub use frame::{rgb_to_gray, Frame, FrameError};
pub use source::{CameraProvider, FrameSource};

//! rollcall-hw — Camera access for capture sessions.
//!
//! Opens V4L2 devices, negotiates a grayscale-convertible pixel format and
//! hands frames to rollcall-core through its `CameraProvider` trait.

pub mod camera;
pub mod frame;

pub use camera::{Camera, CameraError, DeviceInfo, PixelFormat, V4lCameraProvider};

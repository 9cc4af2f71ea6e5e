//! Hardware behind the sessions: camera, face detector and terminal.

use crate::config::Config;
use crate::terminal::TerminalSurface;
use anyhow::{Context as _, Result};
use rollcall_core::{
    BoundingBox, CameraProvider, DetectError, FaceLocator, Frame, Surface, SurfaceError,
};
use rollcall_hw::V4lCameraProvider;
use rollcall_vision::ScrfdLocator;
use std::path::PathBuf;

/// What the control loop needs from the outside world.
pub trait Devices {
    fn camera(&self) -> &dyn CameraProvider;

    /// Load the face detector. Called at most once per successful load.
    fn load_locator(&mut self) -> Result<Box<dyn FaceLocator>>;

    /// Take over the display for one session.
    fn open_surface(&mut self, hint: &str) -> Result<Box<dyn Surface>, SurfaceError>;
}

/// V4L2 camera, SCRFD on ONNX Runtime and the controlling terminal.
pub struct Hardware {
    camera: V4lCameraProvider,
    model_path: PathBuf,
    min_confidence: f32,
}

impl Hardware {
    pub fn from_config(config: &Config) -> Self {
        Self {
            camera: V4lCameraProvider::new(config.camera_device.clone(), config.warmup_frames),
            model_path: config.model_path(),
            min_confidence: config.min_face_confidence,
        }
    }
}

impl Devices for Hardware {
    fn camera(&self) -> &dyn CameraProvider {
        &self.camera
    }

    fn load_locator(&mut self) -> Result<Box<dyn FaceLocator>> {
        let locator = ScrfdLocator::load(&self.model_path, self.min_confidence)
            .with_context(|| format!("loading face detector from {}", self.model_path.display()))?;
        Ok(Box::new(locator))
    }

    fn open_surface(&mut self, hint: &str) -> Result<Box<dyn Surface>, SurfaceError> {
        Ok(Box::new(TerminalSurface::enter(hint)?))
    }
}

/// Stand-in when no detector could be loaded: never sees a face.
pub struct NoFaces;

impl FaceLocator for NoFaces {
    fn locate(&mut self, _frame: &Frame) -> Result<Vec<BoundingBox>, DetectError> {
        Ok(Vec::new())
    }
}

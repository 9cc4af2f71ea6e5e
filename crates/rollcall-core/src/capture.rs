//! Capabilities a session borrows from the outside world: a camera, a face
//! locator and a surface that shows frames and reports operator input.
//!
//! Each session opens its own [`FrameSource`] and drops it before returning,
//! which releases the device on every exit path.

use crate::types::{BoundingBox, Frame, Point, Rect};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("camera unavailable: {0}")]
    Unavailable(String),
    #[error("failed to grab frame: {0}")]
    FrameFailed(String),
}

#[derive(Error, Debug)]
#[error("face detection failed: {0}")]
pub struct DetectError(pub String);

#[derive(Error, Debug)]
pub enum SurfaceError {
    #[error("terminal i/o: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Other(String),
}

/// An open camera. Dropping it releases the device.
pub trait FrameSource {
    fn acquire_frame(&mut self) -> Result<Frame, CaptureError>;
}

/// Opens a fresh [`FrameSource`] for each session.
pub trait CameraProvider {
    fn open(&self) -> Result<Box<dyn FrameSource>, CaptureError>;
}

/// Locates face regions in a frame. Says nothing about whose face it is.
pub trait FaceLocator {
    fn locate(&mut self, frame: &Frame) -> Result<Vec<BoundingBox>, DetectError>;
}

/// Something drawn on top of a frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Overlay {
    /// A detected face region.
    Face(BoundingBox),
    /// A clickable roster entry.
    Button { rect: Rect, label: String },
    /// A line of text anchored at its top-left corner.
    Text { at: Point, text: String },
}

/// Raw operator input, in frame coordinates for clicks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorEvent {
    Key(char),
    Click(Point),
}

/// What a key press asks a session to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Capture,
    Quit,
}

impl Command {
    pub fn from_key(key: char) -> Option<Self> {
        match key {
            ' ' => Some(Command::Capture),
            'q' | 'Q' => Some(Command::Quit),
            _ => None,
        }
    }
}

/// Operator-facing display and input, entered once per session.
///
/// Pointer handling is set up when the surface is created, not per frame;
/// every [`Surface::render`] call is only a redraw.
pub trait Surface {
    fn render(&mut self, frame: &Frame, overlays: &[Overlay]) -> Result<(), SurfaceError>;

    /// Next pending event, without blocking.
    fn poll_event(&mut self) -> Result<Option<OperatorEvent>, SurfaceError>;
}

/// Run the locator, degrading to "no faces" when it fails.
///
/// Detection only drives feedback and the capture guard; a failing model
/// must not end the session.
pub fn locate_or_empty(locator: &mut dyn FaceLocator, frame: &Frame) -> Vec<BoundingBox> {
    match locator.locate(frame) {
        Ok(faces) => faces,
        Err(e) => {
            tracing::warn!(error = %e, seq = frame.sequence, "face detection failed; treating frame as faceless");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_from_key() {
        assert_eq!(Command::from_key(' '), Some(Command::Capture));
        assert_eq!(Command::from_key('q'), Some(Command::Quit));
        assert_eq!(Command::from_key('Q'), Some(Command::Quit));
        assert_eq!(Command::from_key('x'), None);
    }

    struct Broken;

    impl FaceLocator for Broken {
        fn locate(&mut self, _frame: &Frame) -> Result<Vec<BoundingBox>, DetectError> {
            Err(DetectError("model exploded".into()))
        }
    }

    #[test]
    fn test_locate_or_empty_swallows_errors() {
        let frame = Frame::filled(4, 4, 0);
        assert!(locate_or_empty(&mut Broken, &frame).is_empty());
    }
}

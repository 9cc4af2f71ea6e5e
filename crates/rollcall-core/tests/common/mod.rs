#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use rollcall_core::{
    BoundingBox, CameraProvider, CaptureError, DetectError, FaceLocator, Frame, FrameSource,
    OperatorEvent, Overlay, Surface, SurfaceError,
};
use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;

pub const FRAME_WIDTH: u32 = 320;
pub const FRAME_HEIGHT: u32 = 240;

pub fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(h, min, s)
        .unwrap()
}

/// Camera that yields `frames` frames, then fails.
pub struct FakeCamera {
    pub frames: usize,
    pub fail_open: bool,
    pub opened: Rc<Cell<usize>>,
    pub released: Rc<Cell<usize>>,
}

impl FakeCamera {
    pub fn new(frames: usize) -> Self {
        Self {
            frames,
            fail_open: false,
            opened: Rc::new(Cell::new(0)),
            released: Rc::new(Cell::new(0)),
        }
    }

    pub fn broken() -> Self {
        Self {
            fail_open: true,
            ..Self::new(0)
        }
    }

    /// Every opened source has been dropped.
    pub fn all_released(&self) -> bool {
        self.opened.get() == self.released.get()
    }
}

impl CameraProvider for FakeCamera {
    fn open(&self) -> Result<Box<dyn FrameSource>, CaptureError> {
        if self.fail_open {
            return Err(CaptureError::Unavailable("no such device".into()));
        }
        self.opened.set(self.opened.get() + 1);
        Ok(Box::new(FakeSource {
            remaining: self.frames,
            sequence: 0,
            released: Rc::clone(&self.released),
        }))
    }
}

struct FakeSource {
    remaining: usize,
    sequence: u32,
    released: Rc<Cell<usize>>,
}

impl FrameSource for FakeSource {
    fn acquire_frame(&mut self) -> Result<Frame, CaptureError> {
        if self.remaining == 0 {
            return Err(CaptureError::FrameFailed("device unplugged".into()));
        }
        self.remaining -= 1;
        self.sequence += 1;
        let mut frame = Frame::filled(FRAME_WIDTH, FRAME_HEIGHT, 128);
        frame.sequence = self.sequence;
        Ok(frame)
    }
}

impl Drop for FakeSource {
    fn drop(&mut self) {
        self.released.set(self.released.get() + 1);
    }
}

/// Locator reporting a fixed set of faces on every frame.
pub struct FakeLocator {
    pub faces: Vec<BoundingBox>,
}

impl FakeLocator {
    pub fn one_face() -> Self {
        Self {
            faces: vec![BoundingBox {
                x: 220.0,
                y: 100.0,
                width: 60.0,
                height: 80.0,
                confidence: 0.92,
            }],
        }
    }

    pub fn no_faces() -> Self {
        Self { faces: Vec::new() }
    }
}

impl FaceLocator for FakeLocator {
    fn locate(&mut self, _frame: &Frame) -> Result<Vec<BoundingBox>, DetectError> {
        Ok(self.faces.clone())
    }
}

/// Surface that feeds one batch of events per rendered frame.
pub struct ScriptedSurface {
    script: VecDeque<Vec<OperatorEvent>>,
    pending: VecDeque<OperatorEvent>,
    pub renders: usize,
    pub last_overlays: Vec<Overlay>,
}

impl ScriptedSurface {
    pub fn new(script: Vec<Vec<OperatorEvent>>) -> Self {
        Self {
            script: script.into(),
            pending: VecDeque::new(),
            renders: 0,
            last_overlays: Vec::new(),
        }
    }
}

impl Surface for ScriptedSurface {
    fn render(&mut self, _frame: &Frame, overlays: &[Overlay]) -> Result<(), SurfaceError> {
        self.renders += 1;
        self.last_overlays = overlays.to_vec();
        if let Some(batch) = self.script.pop_front() {
            self.pending.extend(batch);
        }
        Ok(())
    }

    fn poll_event(&mut self) -> Result<Option<OperatorEvent>, SurfaceError> {
        Ok(self.pending.pop_front())
    }
}

pub fn key(c: char) -> OperatorEvent {
    OperatorEvent::Key(c)
}

pub fn click(x: u32, y: u32) -> OperatorEvent {
    OperatorEvent::Click(rollcall_core::Point::new(x, y))
}

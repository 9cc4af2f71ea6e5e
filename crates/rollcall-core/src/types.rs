use chrono::{NaiveDate, NaiveTime};
use image::GrayImage;
use serde::{Deserialize, Serialize};

/// Date format used in the ledger (`YYYY-MM-DD`).
pub const DATE_FORMAT: &str = "%Y-%m-%d";
/// Local clock format used in the ledger (`HH:MM:SS`).
pub const TIME_FORMAT: &str = "%H:%M:%S";

/// A captured grayscale camera frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Grayscale pixel data (width * height bytes).
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub sequence: u32,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, sequence: u32) -> Self {
        Self {
            data,
            width,
            height,
            sequence,
        }
    }

    /// Uniform frame, handy for tests and placeholder feeds.
    pub fn filled(width: u32, height: u32, value: u8) -> Self {
        Self::new(vec![value; (width * height) as usize], width, height, 0)
    }

    /// Pixel at `(x, y)`, or `None` outside the frame.
    pub fn pixel(&self, x: u32, y: u32) -> Option<u8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.data.get((y * self.width + x) as usize).copied()
    }

    /// View the frame as an `image` buffer for encoding.
    ///
    /// Returns `None` when the data length does not match the dimensions.
    pub fn to_image(&self) -> Option<GrayImage> {
        GrayImage::from_raw(self.width, self.height, self.data.clone())
    }
}

/// Bounding box for a detected face, in frame pixel coordinates.
///
/// Carries no identity: it only says where a face is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
}

impl BoundingBox {
    /// Clamp to the frame and convert to an integer rectangle.
    pub fn to_rect(&self, frame_width: u32, frame_height: u32) -> Rect {
        let x0 = self.x.max(0.0).min(frame_width as f32) as u32;
        let y0 = self.y.max(0.0).min(frame_height as f32) as u32;
        let x1 = (self.x + self.width).max(0.0).min(frame_width as f32) as u32;
        let y1 = (self.y + self.height).max(0.0).min(frame_height as f32) as u32;
        Rect {
            x: x0,
            y: y0,
            width: x1.saturating_sub(x0),
            height: y1.saturating_sub(y0),
        }
    }
}

/// A pointer position in frame coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Point {
    pub x: u32,
    pub y: u32,
}

impl Point {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle in frame coordinates.
///
/// Containment is inclusive on every edge: a rectangle at `y = 10` with
/// height 30 contains both `y = 10` and `y = 40`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x
            && point.x <= self.x + self.width
            && point.y >= self.y
            && point.y <= self.y + self.height
    }
}

/// One attendance mark. Immutable once written to the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub name: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
}

impl AttendanceRecord {
    pub fn date_string(&self) -> String {
        self.date.format(DATE_FORMAT).to_string()
    }

    pub fn time_string(&self) -> String {
        self.time.format(TIME_FORMAT).to_string()
    }
}

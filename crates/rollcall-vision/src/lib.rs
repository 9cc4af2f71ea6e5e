//! rollcall-vision — Face-presence detection.
//!
//! Runs the SCRFD detector through ONNX Runtime on CPU. It only reports
//! where faces are; nothing here tells one person from another.

pub mod detector;

pub use detector::{DetectorError, ScrfdLocator, MODEL_FILE};

//! SCRFD face locator via ONNX Runtime.
//!
//! Letterboxes the grayscale frame to 640x640, runs the model, decodes the
//! anchor-free boxes at strides 8/16/32 and suppresses overlaps.

use image::imageops::{self, FilterType};
use image::GrayImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use rollcall_core::{BoundingBox, DetectError, FaceLocator, Frame};
use std::path::Path;
use thiserror::Error;

/// File name of the SCRFD model inside the model directory.
pub const MODEL_FILE: &str = "det_10g.onnx";

const INPUT_SIZE: usize = 640;
const PIXEL_MEAN: f32 = 127.5;
const PIXEL_STD: f32 = 128.0;
const NMS_THRESHOLD: f32 = 0.4;
const STRIDES: [usize; 3] = [8, 16, 32];
const ANCHORS_PER_CELL: usize = 2;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("model file not found: {0}; download det_10g.onnx from insightface into the model directory")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Scale and padding applied when fitting a frame into the model input.
#[derive(Debug, Clone, Copy)]
struct Letterbox {
    scale: f32,
    pad_x: f32,
    pad_y: f32,
}

impl Letterbox {
    fn fit(width: usize, height: usize, target: usize) -> Self {
        let scale = (target as f32 / width as f32).min(target as f32 / height as f32);
        let new_w = (width as f32 * scale).round();
        let new_h = (height as f32 * scale).round();
        Self {
            scale,
            pad_x: ((target as f32 - new_w) / 2.0).floor(),
            pad_y: ((target as f32 - new_h) / 2.0).floor(),
        }
    }

    /// Map a point from model input space back to frame space.
    fn unmap(&self, x: f32, y: f32) -> (f32, f32) {
        ((x - self.pad_x) / self.scale, (y - self.pad_y) / self.scale)
    }
}

/// Output tensor indices for one stride: (score, bbox).
type StrideOutputs = (usize, usize);

/// SCRFD-backed [`FaceLocator`].
pub struct ScrfdLocator {
    session: Session,
    outputs: [StrideOutputs; 3],
    min_confidence: f32,
}

impl ScrfdLocator {
    /// Load the SCRFD model from `model_path`.
    pub fn load(model_path: &Path, min_confidence: f32) -> Result<Self, DetectorError> {
        if !model_path.exists() {
            return Err(DetectorError::ModelNotFound(model_path.display().to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        let names: Vec<String> = session
            .outputs()
            .iter()
            .map(|o| o.name().to_string())
            .collect();
        if names.len() < 6 {
            return Err(DetectorError::InferenceFailed(format!(
                "SCRFD model needs score and bbox outputs for 3 strides, got {} outputs",
                names.len()
            )));
        }

        let outputs = map_outputs(&names);
        tracing::info!(
            path = %model_path.display(),
            ?outputs,
            min_confidence,
            "loaded SCRFD face locator"
        );

        Ok(Self {
            session,
            outputs,
            min_confidence,
        })
    }

    /// Detect faces, sorted by descending confidence.
    pub fn detect(&mut self, frame: &Frame) -> Result<Vec<BoundingBox>, DetectorError> {
        let (input, letterbox) = preprocess(frame)?;
        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let mut candidates = Vec::new();
        for (slot, &stride) in STRIDES.iter().enumerate() {
            let (score_idx, bbox_idx) = self.outputs[slot];
            let (_, scores) = outputs[score_idx].try_extract_tensor::<f32>().map_err(|e| {
                DetectorError::InferenceFailed(format!("scores stride {stride}: {e}"))
            })?;
            let (_, boxes) = outputs[bbox_idx].try_extract_tensor::<f32>().map_err(|e| {
                DetectorError::InferenceFailed(format!("boxes stride {stride}: {e}"))
            })?;
            candidates.extend(decode_stride(
                scores,
                boxes,
                stride,
                &letterbox,
                self.min_confidence,
            ));
        }

        let faces = nms(candidates, NMS_THRESHOLD);
        tracing::trace!(faces = faces.len(), seq = frame.sequence, "scrfd pass");
        Ok(faces)
    }
}

impl FaceLocator for ScrfdLocator {
    fn locate(&mut self, frame: &Frame) -> Result<Vec<BoundingBox>, DetectError> {
        self.detect(frame).map_err(|e| DetectError(e.to_string()))
    }
}

/// Letterbox the frame into a normalized NCHW tensor (gray replicated to 3 channels).
fn preprocess(frame: &Frame) -> Result<(Array4<f32>, Letterbox), DetectorError> {
    let image = frame.to_image().ok_or_else(|| {
        DetectorError::InferenceFailed(format!(
            "frame is {}x{} but holds {} bytes",
            frame.width,
            frame.height,
            frame.data.len()
        ))
    })?;
    if frame.width == 0 || frame.height == 0 {
        return Err(DetectorError::InferenceFailed("empty frame".into()));
    }

    let letterbox = Letterbox::fit(frame.width as usize, frame.height as usize, INPUT_SIZE);
    let new_w = ((frame.width as f32 * letterbox.scale).round() as u32).clamp(1, INPUT_SIZE as u32);
    let new_h = ((frame.height as f32 * letterbox.scale).round() as u32).clamp(1, INPUT_SIZE as u32);
    let resized: GrayImage = imageops::resize(&image, new_w, new_h, FilterType::Triangle);

    // Padding at the mean normalizes to 0.0.
    let mut tensor = Array4::<f32>::zeros((1, 3, INPUT_SIZE, INPUT_SIZE));
    let (off_x, off_y) = (letterbox.pad_x as usize, letterbox.pad_y as usize);
    for (x, y, pixel) in resized.enumerate_pixels() {
        let tx = off_x + x as usize;
        let ty = off_y + y as usize;
        if tx >= INPUT_SIZE || ty >= INPUT_SIZE {
            continue;
        }
        let value = (pixel.0[0] as f32 - PIXEL_MEAN) / PIXEL_STD;
        for channel in 0..3 {
            tensor[[0, channel, ty, tx]] = value;
        }
    }

    Ok((tensor, letterbox))
}

/// Pick score/bbox tensors for each stride.
///
/// Exports that name their outputs `score_8`, `bbox_8`, ... are mapped by
/// name; anything else uses the standard order (scores 0–2, boxes 3–5).
fn map_outputs(names: &[String]) -> [StrideOutputs; 3] {
    let find = |prefix: &str, stride: usize| {
        let target = format!("{prefix}_{stride}");
        names.iter().position(|n| *n == target)
    };

    let by_name: Option<Vec<StrideOutputs>> = STRIDES
        .iter()
        .map(|&stride| Some((find("score", stride)?, find("bbox", stride)?)))
        .collect();

    match by_name {
        Some(found) => [found[0], found[1], found[2]],
        None => {
            tracing::debug!(?names, "SCRFD output names not recognized; using positional mapping");
            [(0, 3), (1, 4), (2, 5)]
        }
    }
}

/// Decode the boxes for one stride, keeping scores above `threshold`.
fn decode_stride(
    scores: &[f32],
    boxes: &[f32],
    stride: usize,
    letterbox: &Letterbox,
    threshold: f32,
) -> Vec<BoundingBox> {
    let grid = INPUT_SIZE / stride;
    let anchors = grid * grid * ANCHORS_PER_CELL;
    let step = stride as f32;

    (0..anchors)
        .filter_map(|idx| {
            let score = *scores.get(idx)?;
            if score <= threshold {
                return None;
            }
            let deltas = boxes.get(idx * 4..idx * 4 + 4)?;

            let cell = idx / ANCHORS_PER_CELL;
            let cx = (cell % grid) as f32 * step;
            let cy = (cell / grid) as f32 * step;

            let (x1, y1) = letterbox.unmap(cx - deltas[0] * step, cy - deltas[1] * step);
            let (x2, y2) = letterbox.unmap(cx + deltas[2] * step, cy + deltas[3] * step);
            Some(BoundingBox {
                x: x1,
                y: y1,
                width: x2 - x1,
                height: y2 - y1,
                confidence: score,
            })
        })
        .collect()
}

/// Greedy non-maximum suppression; output is sorted by confidence.
fn nms(mut candidates: Vec<BoundingBox>, iou_threshold: f32) -> Vec<BoundingBox> {
    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut kept: Vec<BoundingBox> = Vec::new();
    for candidate in candidates {
        if kept.iter().all(|k| iou(k, &candidate) <= iou_threshold) {
            kept.push(candidate);
        }
    }
    kept
}

/// Intersection-over-union of two boxes.
fn iou(a: &BoundingBox, b: &BoundingBox) -> f32 {
    let inter_w = ((a.x + a.width).min(b.x + b.width) - a.x.max(b.x)).max(0.0);
    let inter_h = ((a.y + a.height).min(b.y + b.height) - a.y.max(b.y)).max(0.0);
    let inter = inter_w * inter_h;
    let union = a.width * a.height + b.width * b.height - inter;
    if union > 0.0 {
        inter / union
    } else {
        0.0
    }
}

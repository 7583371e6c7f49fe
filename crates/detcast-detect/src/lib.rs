// detcast-detect/src/lib.rs
// ============================================================
// detcast-detect  –  Object-detection stage
// Runs an SSD-style detector (boxes / classes / scores / count
// heads, the TFLite detection-postprocess layout) via Tract.
// ------------------------------------------------------------
// Pipeline: RgbFrame → resize → Tensor<u8> → Vec<Detection>
// ------------------------------------------------------------
// Public API
//   * TractSsd::load(path, &DetectorConfig) – load & optimise ONNX
//   * Detector::detect(frame, threshold)    – returns Vec<Detection>
//   * LabelTable::load(path)                – class id → name
// ============================================================

//! detcast – detection layer
//!
//! A backend-agnostic [`Detector`] trait plus the **`TractSsd`**
//! implementation. Boxes stay in relative `(ymin, xmin, ymax, xmax)`
//! coordinates; turning them into pixels is the annotator's job since only
//! it knows the size of the frame being drawn on.
//!
//! Thresholding is the only post-processing done here. The SSD graph already
//! contains its own NMS, so detections are returned in model order.

use detcast_camera::RgbFrame;
use detcast_preprocess::PreprocessError;
use thiserror::Error;
use tract_onnx::prelude::TractError;

mod labels;
mod ssd;

pub use labels::{LabelError, LabelTable};
pub use ssd::{DetectorConfig, OutputLayout, TractSsd};

#[derive(Debug, Error)]
pub enum DetectError {
    #[error("Model load or inference error: {0}")]
    Tract(#[from] TractError),
    #[error("Preprocess failed: {0}")]
    Preprocess(#[from] PreprocessError),
    #[error("Model exposes {0} outputs, an SSD head needs at least 3")]
    InvalidOutputs(usize),
    #[error("Model output #{0} is missing")]
    MissingOutput(usize),
    #[error("Invalid output shape: {boxes} box values for {scores} scores")]
    InvalidOutputShape { boxes: usize, scores: usize },
}

pub type Result<T> = std::result::Result<T, DetectError>;

/// Relative box corners, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub ymin: f32,
    pub xmin: f32,
    pub ymax: f32,
    pub xmax: f32,
}

impl BoundingBox {
    pub fn new(ymin: f32, xmin: f32, ymax: f32, xmax: f32) -> Self {
        Self { ymin, xmin, ymax, xmax }
    }
}

/// A single detection: relative bounding box, class index and score.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub class_id: u32,
    pub score: f32,
}

/// Trait for object detectors.
pub trait Detector {
    /// Run the model on `frame` and keep detections scoring `>= threshold`.
    fn detect(&self, frame: &RgbFrame, threshold: f32) -> Result<Vec<Detection>>;
}

impl<D: Detector + ?Sized> Detector for Box<D> {
    fn detect(&self, frame: &RgbFrame, threshold: f32) -> Result<Vec<Detection>> {
        (**self).detect(frame, threshold)
    }
}

/// Turn raw SSD head outputs into detections.
///
/// `boxes` is the flattened `[N, 4]` tensor in `(ymin, xmin, ymax, xmax)`
/// order. Only the first `count` rows are looked at. Rows scoring below
/// `threshold` are dropped, the rest keep their original order.
pub fn filter_detections(
    boxes: &[f32],
    classes: &[f32],
    scores: &[f32],
    count: usize,
    threshold: f32,
) -> Vec<Detection> {
    let rows = count
        .min(scores.len())
        .min(classes.len())
        .min(boxes.len() / 4);

    (0..rows)
        .filter(|&i| scores[i] >= threshold)
        .map(|i| {
            let b = &boxes[i * 4..i * 4 + 4];
            Detection {
                bbox: BoundingBox::new(b[0], b[1], b[2], b[3]),
                // float → int `as` saturates, NaN and negatives land on 0
                class_id: classes[i] as u32,
                score: scores[i],
            }
        })
        .collect()
}

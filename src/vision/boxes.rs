//! Bounding box geometry and detection head decoding
//!
//! Boxes are axis-aligned corner pairs in normalized image coordinates
//! (0.0 at the top-left, 1.0 at the bottom-right), independent of both the
//! network input size and the frame being annotated.

use ndarray::Array4;
use serde::{Deserialize, Serialize};

use crate::error::{LookoutError, Result};

/// Axis-aligned box in normalized coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Build from a center point and dimensions
    pub fn from_center(cx: f32, cy: f32, w: f32, h: f32) -> Self {
        Self {
            x1: cx - w / 2.0,
            y1: cy - h / 2.0,
            x2: cx + w / 2.0,
            y2: cy + h / 2.0,
        }
    }

    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    pub fn center(&self) -> (f32, f32) {
        ((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    /// Intersection area with another box
    pub fn intersection(&self, other: &BoundingBox) -> f32 {
        let w = (self.x2.min(other.x2) - self.x1.max(other.x1)).max(0.0);
        let h = (self.y2.min(other.y2) - self.y1.max(other.y1)).max(0.0);
        w * h
    }

    /// Intersection over union; 0.0 when both boxes are degenerate
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let inter = self.intersection(other);
        let union = self.area() + other.area() - inter;
        if union <= 0.0 {
            0.0
        } else {
            inter / union
        }
    }

    /// Clip each corner into the unit square
    pub fn clamp_unit(&self) -> Self {
        Self {
            x1: self.x1.clamp(0.0, 1.0),
            y1: self.y1.clamp(0.0, 1.0),
            x2: self.x2.clamp(0.0, 1.0),
            y2: self.y2.clamp(0.0, 1.0),
        }
    }

    /// Map onto an image of the given dimensions, truncating and clamping
    pub fn to_pixels(&self, width: usize, height: usize) -> (usize, usize, usize, usize) {
        let clamp = |v: f32, max: usize| (v.max(0.0) as usize).min(max.saturating_sub(1));
        (
            clamp(self.x1 * width as f32, width),
            clamp(self.y1 * height as f32, height),
            clamp(self.x2 * width as f32, width),
            clamp(self.y2 * height as f32, height),
        )
    }
}

/// IoU of two boxes compared by dimensions alone, both anchored at origin
///
/// Used to match ground truth boxes against anchor shapes.
pub fn iou_wh(a: (f32, f32), b: (f32, f32)) -> f32 {
    let inter = a.0.min(b.0) * a.1.min(b.1);
    let union = a.0 * a.1 + b.0 * b.1 - inter;
    if union <= 0.0 {
        0.0
    } else {
        inter / union
    }
}

pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// One grid cell / anchor slot before non-max suppression
#[derive(Debug, Clone)]
pub struct Candidate {
    pub bbox: BoundingBox,
    pub objectness: f32,
    pub class_probs: Vec<f32>,
}

/// Decode one raw head tensor `[gy, gx, anchor, 5 + classes]` into candidates
///
/// Box centers are the cell offset plus a sigmoid shift; dimensions are the
/// anchor scaled by the exponentiated prediction. Objectness and per-class
/// probabilities are independent sigmoids.
pub fn decode_scale(raw: &Array4<f32>, anchors: &[(f32, f32)]) -> Result<Vec<Candidate>> {
    let (gy, gx, na, feat) = raw.dim();
    if na != anchors.len() {
        return Err(LookoutError::ShapeMismatch {
            expected: format!("{} anchor slots", anchors.len()),
            actual: format!("{}", na),
        });
    }
    if feat < 6 {
        return Err(LookoutError::ShapeMismatch {
            expected: "at least 6 features per anchor".to_string(),
            actual: format!("{}", feat),
        });
    }

    let num_classes = feat - 5;
    let mut candidates = Vec::with_capacity(gy * gx * na);
    for y in 0..gy {
        for x in 0..gx {
            for a in 0..na {
                let cx = (sigmoid(raw[[y, x, a, 0]]) + x as f32) / gx as f32;
                let cy = (sigmoid(raw[[y, x, a, 1]]) + y as f32) / gy as f32;
                let w = raw[[y, x, a, 2]].exp() * anchors[a].0;
                let h = raw[[y, x, a, 3]].exp() * anchors[a].1;
                let objectness = sigmoid(raw[[y, x, a, 4]]);
                let class_probs = (0..num_classes)
                    .map(|c| sigmoid(raw[[y, x, a, 5 + c]]))
                    .collect();
                candidates.push(Candidate {
                    bbox: BoundingBox::from_center(cx, cy, w, h),
                    objectness,
                    class_probs,
                });
            }
        }
    }
    Ok(candidates)
}

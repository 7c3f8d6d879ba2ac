//! Training loss for detection heads
//!
//! Operates on raw head tensors and the target grids from
//! [`assign_targets`](crate::vision::target::assign_targets). Box terms are
//! squared error in the network's own parameterization (cell-relative
//! sigmoid centers, log dimension ratios against the anchor), weighted so
//! small boxes count more. Objectness is binary cross-entropy, with
//! confident predictions over unlabelled objects forgiven when they overlap
//! any ground truth box beyond the ignore threshold.

use ndarray::Array4;

use crate::error::{LookoutError, Result};
use crate::vision::boxes::{sigmoid, BoundingBox};

/// Probability clamp for the cross-entropy terms
const EPSILON: f32 = 1e-7;

/// Overlap beyond which an unlabelled confident prediction is not penalized
pub const DEFAULT_IGNORE_THRESHOLD: f32 = 0.5;

/// Loss components, summed over all cells of one or more scales
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LossBreakdown {
    pub xy: f32,
    pub wh: f32,
    pub objectness: f32,
    pub class: f32,
}

impl LossBreakdown {
    pub fn total(&self) -> f32 {
        self.xy + self.wh + self.objectness + self.class
    }

    fn accumulate(&mut self, other: &LossBreakdown) {
        self.xy += other.xy;
        self.wh += other.wh;
        self.objectness += other.objectness;
        self.class += other.class;
    }
}

/// Loss for a single scale
///
/// `pred` is the raw `[gy, gx, anchor, 5 + classes]` head output, `target`
/// the matching `[gy, gx, anchor, 6]` grid, `anchors` the dimensions owned
/// by this head.
pub fn yolo_loss(
    pred: &Array4<f32>,
    target: &Array4<f32>,
    anchors: &[(f32, f32)],
    ignore_threshold: f32,
) -> Result<LossBreakdown> {
    let (gy, gx, na, feat) = pred.dim();
    let (ty_, tx_, tna, tfeat) = target.dim();
    if (ty_, tx_, tna) != (gy, gx, na) || tfeat != 6 {
        return Err(LookoutError::ShapeMismatch {
            expected: format!("target [{}, {}, {}, 6]", gy, gx, na),
            actual: format!("[{}, {}, {}, {}]", ty_, tx_, tna, tfeat),
        });
    }
    if na != anchors.len() {
        return Err(LookoutError::ShapeMismatch {
            expected: format!("{} anchors", na),
            actual: format!("{}", anchors.len()),
        });
    }
    if feat < 6 {
        return Err(LookoutError::ShapeMismatch {
            expected: "at least 6 features per anchor".to_string(),
            actual: format!("{}", feat),
        });
    }
    let num_classes = feat - 5;

    // Ground truth boxes on this scale, for the ignore mask
    let mut gt_boxes = Vec::new();
    for y in 0..gy {
        for x in 0..gx {
            for a in 0..na {
                if target[[y, x, a, 4]] > 0.0 {
                    gt_boxes.push(truth_box(target, y, x, a));
                }
            }
        }
    }

    let mut loss = LossBreakdown::default();
    for y in 0..gy {
        for x in 0..gx {
            for a in 0..na {
                let raw_xy = (pred[[y, x, a, 0]], pred[[y, x, a, 1]]);
                let raw_wh = (pred[[y, x, a, 2]], pred[[y, x, a, 3]]);
                let pred_xy = (sigmoid(raw_xy.0), sigmoid(raw_xy.1));
                let pred_obj = sigmoid(pred[[y, x, a, 4]]);

                let objectness = target[[y, x, a, 4]];
                let obj_bce = bce(objectness, pred_obj);

                if objectness > 0.0 {
                    let tb = truth_box(target, y, x, a);
                    let (cx, cy) = tb.center();
                    let rel = (cx * gx as f32 - x as f32, cy * gy as f32 - y as f32);
                    let scale = 2.0 - tb.width() * tb.height();

                    loss.xy += scale
                        * ((rel.0 - pred_xy.0).powi(2) + (rel.1 - pred_xy.1).powi(2));

                    let lw = log_ratio(tb.width(), anchors[a].0);
                    let lh = log_ratio(tb.height(), anchors[a].1);
                    loss.wh +=
                        scale * ((lw - raw_wh.0).powi(2) + (lh - raw_wh.1).powi(2));

                    loss.objectness += obj_bce;

                    let class_id = target[[y, x, a, 5]] as usize;
                    if class_id >= num_classes {
                        return Err(LookoutError::InvalidConfig {
                            reason: format!(
                                "target class {} outside {} classes",
                                class_id, num_classes
                            ),
                        });
                    }
                    loss.class += class_cross_entropy(pred, y, x, a, class_id, num_classes);
                } else {
                    let pred_box = BoundingBox::from_center(
                        (pred_xy.0 + x as f32) / gx as f32,
                        (pred_xy.1 + y as f32) / gy as f32,
                        raw_wh.0.exp() * anchors[a].0,
                        raw_wh.1.exp() * anchors[a].1,
                    );
                    let best_iou = gt_boxes
                        .iter()
                        .map(|b| pred_box.iou(b))
                        .fold(0.0_f32, f32::max);
                    if best_iou < ignore_threshold {
                        loss.objectness += obj_bce;
                    }
                }
            }
        }
    }
    Ok(loss)
}

/// Loss summed over every scale of a network's output
pub fn total_loss(
    preds: &[Array4<f32>],
    targets: &[Array4<f32>],
    anchors: &[(f32, f32)],
    masks: &[[usize; 3]],
    ignore_threshold: f32,
) -> Result<LossBreakdown> {
    if preds.len() != masks.len() || targets.len() != masks.len() {
        return Err(LookoutError::ShapeMismatch {
            expected: format!("{} scales", masks.len()),
            actual: format!("{} preds, {} targets", preds.len(), targets.len()),
        });
    }
    let mut total = LossBreakdown::default();
    for (scale, mask) in masks.iter().enumerate() {
        let mut scale_anchors = Vec::with_capacity(mask.len());
        for &idx in mask {
            let anchor = anchors.get(idx).ok_or_else(|| LookoutError::InvalidConfig {
                reason: format!("anchor index {} outside table of {}", idx, anchors.len()),
            })?;
            scale_anchors.push(*anchor);
        }
        let part = yolo_loss(&preds[scale], &targets[scale], &scale_anchors, ignore_threshold)?;
        total.accumulate(&part);
    }
    Ok(total)
}

fn truth_box(target: &Array4<f32>, y: usize, x: usize, a: usize) -> BoundingBox {
    BoundingBox::new(
        target[[y, x, a, 0]],
        target[[y, x, a, 1]],
        target[[y, x, a, 2]],
        target[[y, x, a, 3]],
    )
}

fn bce(y: f32, p: f32) -> f32 {
    let p = p.clamp(EPSILON, 1.0 - EPSILON);
    -(y * p.ln() + (1.0 - y) * (1.0 - p).ln())
}

/// `ln(v / anchor)`, zeroed when infinite (degenerate truth rows)
fn log_ratio(v: f32, anchor: f32) -> f32 {
    let r = (v / anchor).ln();
    if r.is_finite() {
        r
    } else {
        0.0
    }
}

/// Cross-entropy of the labelled class against the sigmoid probabilities,
/// normalized over classes
fn class_cross_entropy(
    pred: &Array4<f32>,
    y: usize,
    x: usize,
    a: usize,
    class_id: usize,
    num_classes: usize,
) -> f32 {
    let mut sum = 0.0;
    let mut p_true = EPSILON;
    for c in 0..num_classes {
        let p = sigmoid(pred[[y, x, a, 5 + c]]).clamp(EPSILON, 1.0 - EPSILON);
        sum += p;
        if c == class_id {
            p_true = p;
        }
    }
    sum.ln() - p_true.ln()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::Array4;

    /// Inverse sigmoid
    fn logit(p: f32) -> f32 {
        (p / (1.0 - p)).ln()
    }

    /// Target grid with a single box centered in cell (0, 0) of a 2x2 grid
    fn single_truth_target(na: usize) -> Array4<f32> {
        let mut t = Array4::zeros((2, 2, na, 6));
        let b = BoundingBox::from_center(0.25, 0.25, 0.2, 0.2);
        t[[0, 0, 0, 0]] = b.x1;
        t[[0, 0, 0, 1]] = b.y1;
        t[[0, 0, 0, 2]] = b.x2;
        t[[0, 0, 0, 3]] = b.y2;
        t[[0, 0, 0, 4]] = 1.0;
        t[[0, 0, 0, 5]] = 1.0;
        t
    }

    #[test]
    fn test_perfect_prediction_near_zero_loss() {
        let target = single_truth_target(1);
        // The anchor matches the box exactly and the box sits mid-cell, so
        // zero logits are the exact box prediction
        let mut pred = Array4::zeros((2, 2, 1, 7));
        for y in 0..2 {
            for x in 0..2 {
                pred[[y, x, 0, 4]] = -10.0;
            }
        }
        pred[[0, 0, 0, 4]] = 10.0;
        pred[[0, 0, 0, 5]] = -10.0;
        pred[[0, 0, 0, 6]] = 10.0;

        let loss = yolo_loss(&pred, &target, &[(0.2, 0.2)], DEFAULT_IGNORE_THRESHOLD).unwrap();
        assert_relative_eq!(loss.xy, 0.0, epsilon = 1e-6);
        assert_relative_eq!(loss.wh, 0.0, epsilon = 1e-6);
        assert!(loss.objectness < 0.01, "objectness {}", loss.objectness);
        assert!(loss.class < 0.01, "class {}", loss.class);
    }

    #[test]
    fn test_ignore_mask_forgives_overlapping_predictions() {
        // Slot 1 in the truth cell predicts a box almost identical to the
        // ground truth (IoU 0.81) with high confidence
        let target = single_truth_target(2);
        let mut pred = Array4::zeros((2, 2, 2, 7));
        for y in 0..2 {
            for x in 0..2 {
                for a in 0..2 {
                    pred[[y, x, a, 4]] = -10.0;
                }
            }
        }
        pred[[0, 0, 0, 4]] = 10.0;
        pred[[0, 0, 0, 6]] = 10.0;
        pred[[0, 0, 1, 4]] = 10.0;

        let anchors = [(0.2, 0.2), (0.18, 0.18)];
        let relaxed = yolo_loss(&pred, &target, &anchors, 0.5).unwrap();
        let strict = yolo_loss(&pred, &target, &anchors, 0.9).unwrap();
        assert!(relaxed.objectness < 0.01, "relaxed {}", relaxed.objectness);
        assert!(strict.objectness > 5.0, "strict {}", strict.objectness);
    }

    #[test]
    fn test_box_scale_weights_small_boxes_harder() {
        let offset_loss = |size: f32| {
            let mut target = Array4::zeros((1, 1, 1, 6));
            let b = BoundingBox::from_center(0.5, 0.5, size, size);
            target[[0, 0, 0, 0]] = b.x1;
            target[[0, 0, 0, 1]] = b.y1;
            target[[0, 0, 0, 2]] = b.x2;
            target[[0, 0, 0, 3]] = b.y2;
            target[[0, 0, 0, 4]] = 1.0;

            let mut pred = Array4::zeros((1, 1, 1, 6));
            pred[[0, 0, 0, 0]] = logit(0.3);
            pred[[0, 0, 0, 1]] = logit(0.3);
            pred[[0, 0, 0, 4]] = 10.0;
            yolo_loss(&pred, &target, &[(size, size)], DEFAULT_IGNORE_THRESHOLD)
                .unwrap()
                .xy
        };

        let small = offset_loss(0.1);
        let large = offset_loss(0.9);
        let err = 2.0 * (0.5f32 - 0.3).powi(2);
        assert_relative_eq!(small, (2.0 - 0.01) * err, epsilon = 1e-4);
        assert_relative_eq!(large, (2.0 - 0.81) * err, epsilon = 1e-4);
        assert!(small > large);
    }

    #[test]
    fn test_degenerate_truth_row_stays_finite() {
        // An obj=1 row with a zero-area box would take ln(0) in the wh term
        let mut target = Array4::zeros((1, 1, 1, 6));
        target[[0, 0, 0, 0]] = 0.5;
        target[[0, 0, 0, 2]] = 0.5;
        target[[0, 0, 0, 1]] = 0.4;
        target[[0, 0, 0, 3]] = 0.4;
        target[[0, 0, 0, 4]] = 1.0;

        let pred = Array4::zeros((1, 1, 1, 6));
        let loss = yolo_loss(&pred, &target, &[(0.2, 0.2)], DEFAULT_IGNORE_THRESHOLD).unwrap();
        assert!(loss.total().is_finite());
        assert_relative_eq!(loss.wh, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_class_mismatch_penalized() {
        let target = single_truth_target(1);
        let mut pred = Array4::zeros((2, 2, 1, 7));
        pred[[0, 0, 0, 4]] = 10.0;
        // Confidently the wrong class
        pred[[0, 0, 0, 5]] = 10.0;
        pred[[0, 0, 0, 6]] = -10.0;
        for y in 0..2 {
            for x in 0..2 {
                if (y, x) != (0, 0) {
                    pred[[y, x, 0, 4]] = -10.0;
                }
            }
        }
        let loss = yolo_loss(&pred, &target, &[(0.2, 0.2)], DEFAULT_IGNORE_THRESHOLD).unwrap();
        assert!(loss.class > 5.0, "class {}", loss.class);
    }

    #[test]
    fn test_out_of_range_class_rejected() {
        let mut target = single_truth_target(1);
        target[[0, 0, 0, 5]] = 9.0;
        let pred = Array4::zeros((2, 2, 1, 7));
        let err =
            yolo_loss(&pred, &target, &[(0.2, 0.2)], DEFAULT_IGNORE_THRESHOLD).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_CONFIG");
    }

    #[test]
    fn test_shape_validation() {
        let pred = Array4::<f32>::zeros((2, 2, 1, 7));
        let target = Array4::<f32>::zeros((2, 2, 2, 6));
        assert!(yolo_loss(&pred, &target, &[(0.2, 0.2)], 0.5).is_err());

        let target = Array4::<f32>::zeros((2, 2, 1, 5));
        assert!(yolo_loss(&pred, &target, &[(0.2, 0.2)], 0.5).is_err());
    }

    #[test]
    fn test_total_loss_sums_scales() {
        use crate::vision::network::{YOLO_V3_TINY_ANCHORS, YOLO_V3_TINY_MASKS};
        use crate::vision::target::{assign_targets, GroundTruth};

        // Center off the cell midpoint so the xy term is nonzero
        let truths = [GroundTruth {
            bbox: BoundingBox::from_center(0.52, 0.5, 344.0 / 416.0, 319.0 / 416.0),
            class_id: 0,
        }];
        let targets =
            assign_targets(&truths, &YOLO_V3_TINY_ANCHORS, &YOLO_V3_TINY_MASKS, 416).unwrap();
        let preds = vec![
            Array4::<f32>::zeros((13, 13, 3, 6)),
            Array4::<f32>::zeros((26, 26, 3, 6)),
        ];
        let total = total_loss(
            &preds,
            &targets,
            &YOLO_V3_TINY_ANCHORS,
            &YOLO_V3_TINY_MASKS,
            DEFAULT_IGNORE_THRESHOLD,
        )
        .unwrap();

        let coarse_anchors: Vec<(f32, f32)> =
            YOLO_V3_TINY_MASKS[0].iter().map(|&i| YOLO_V3_TINY_ANCHORS[i]).collect();
        let fine_anchors: Vec<(f32, f32)> =
            YOLO_V3_TINY_MASKS[1].iter().map(|&i| YOLO_V3_TINY_ANCHORS[i]).collect();
        let coarse = yolo_loss(&preds[0], &targets[0], &coarse_anchors, DEFAULT_IGNORE_THRESHOLD)
            .unwrap();
        let fine = yolo_loss(&preds[1], &targets[1], &fine_anchors, DEFAULT_IGNORE_THRESHOLD)
            .unwrap();

        assert_relative_eq!(total.objectness, coarse.objectness + fine.objectness);
        assert_relative_eq!(total.xy, coarse.xy + fine.xy);
        assert_relative_eq!(total.total(), coarse.total() + fine.total());
        assert!(total.xy > 0.0);
    }
}

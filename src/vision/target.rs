//! Ground truth placement onto detection head grids
//!
//! Each labelled box is matched to the anchor with the best dimensions-only
//! IoU, then written into the grid of whichever head owns that anchor, at
//! the cell containing the box center. Rows are `[x1, y1, x2, y2, 1, class]`;
//! when two boxes land on the same cell and anchor slot the later one wins.

use ndarray::Array4;

use crate::error::{LookoutError, Result};
use crate::vision::boxes::{iou_wh, BoundingBox};

/// A labelled training box in normalized coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroundTruth {
    pub bbox: BoundingBox,
    pub class_id: usize,
}

/// Build per-scale target tensors `[grid, grid, anchor, 6]`
///
/// Grids are derived from the input size: the coarsest is `input_size / 32`
/// and each following scale doubles it. Boxes with no area are skipped.
pub fn assign_targets(
    truths: &[GroundTruth],
    anchors: &[(f32, f32)],
    masks: &[[usize; 3]],
    input_size: usize,
) -> Result<Vec<Array4<f32>>> {
    if input_size == 0 || input_size % 32 != 0 {
        return Err(LookoutError::InvalidConfig {
            reason: format!("input size {} is not a multiple of 32", input_size),
        });
    }
    let base_grid = input_size / 32;

    let mut targets: Vec<Array4<f32>> = masks
        .iter()
        .enumerate()
        .map(|(scale, _)| {
            let grid = base_grid << scale;
            Array4::zeros((grid, grid, 3, 6))
        })
        .collect();

    for truth in truths {
        let dims = (truth.bbox.width(), truth.bbox.height());
        if dims.0 <= 0.0 || dims.1 <= 0.0 {
            continue;
        }

        let best = best_anchor(dims, anchors);
        for (scale, mask) in masks.iter().enumerate() {
            let slot = match mask.iter().position(|&a| a == best) {
                Some(slot) => slot,
                None => continue,
            };
            let grid = base_grid << scale;
            let (cx, cy) = truth.bbox.center();
            let cell_x = cell_index(cx, grid);
            let cell_y = cell_index(cy, grid);

            let t = &mut targets[scale];
            t[[cell_y, cell_x, slot, 0]] = truth.bbox.x1;
            t[[cell_y, cell_x, slot, 1]] = truth.bbox.y1;
            t[[cell_y, cell_x, slot, 2]] = truth.bbox.x2;
            t[[cell_y, cell_x, slot, 3]] = truth.bbox.y2;
            t[[cell_y, cell_x, slot, 4]] = 1.0;
            t[[cell_y, cell_x, slot, 5]] = truth.class_id as f32;
            break;
        }
    }
    Ok(targets)
}

fn best_anchor(dims: (f32, f32), anchors: &[(f32, f32)]) -> usize {
    let mut best = 0;
    let mut best_iou = f32::MIN;
    for (i, anchor) in anchors.iter().enumerate() {
        let iou = iou_wh(dims, *anchor);
        if iou > best_iou {
            best_iou = iou;
            best = i;
        }
    }
    best
}

/// Cell containing a normalized coordinate, clamped onto the grid
fn cell_index(v: f32, grid: usize) -> usize {
    ((v * grid as f32).floor().max(0.0) as usize).min(grid - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::network::{Architecture, YOLO_V3_ANCHORS, YOLO_V3_MASKS};

    fn truth(cx: f32, cy: f32, w: f32, h: f32, class_id: usize) -> GroundTruth {
        GroundTruth {
            bbox: BoundingBox::from_center(cx, cy, w, h),
            class_id,
        }
    }

    #[test]
    fn test_small_box_assigned_to_finest_grid() {
        let t = truth(0.5, 0.5, 10.0 / 416.0, 13.0 / 416.0, 7);
        let targets =
            assign_targets(&[t], &YOLO_V3_ANCHORS, &YOLO_V3_MASKS, 416).unwrap();
        assert_eq!(targets.len(), 3);
        assert_eq!(targets[2].dim(), (52, 52, 3, 6));
        // Anchor 0 belongs to the finest scale, slot 0
        assert_eq!(targets[2][[26, 26, 0, 4]], 1.0);
        assert_eq!(targets[2][[26, 26, 0, 5]], 7.0);
        // Nothing written on the other scales
        assert_eq!(targets[0].sum(), 0.0);
        assert_eq!(targets[1].sum(), 0.0);
    }

    #[test]
    fn test_large_box_assigned_to_coarsest_grid() {
        let t = truth(0.5, 0.5, 373.0 / 416.0, 326.0 / 416.0, 0);
        let targets =
            assign_targets(&[t], &YOLO_V3_ANCHORS, &YOLO_V3_MASKS, 416).unwrap();
        // Anchor 8 belongs to the coarsest scale, slot 2
        assert_eq!(targets[0][[6, 6, 2, 4]], 1.0);
        assert_eq!(targets[1].sum(), 0.0);
        assert_eq!(targets[2].sum(), 0.0);
    }

    #[test]
    fn test_corner_row_written() {
        let t = truth(0.25, 0.75, 116.0 / 416.0, 90.0 / 416.0, 3);
        let targets =
            assign_targets(&[t], &YOLO_V3_ANCHORS, &YOLO_V3_MASKS, 416).unwrap();
        // Anchor 6 -> coarsest scale slot 0; 13-cell grid
        let row = &targets[0];
        let (cy, cx) = (9, 3); // floor(0.75 * 13), floor(0.25 * 13)
        assert_eq!(row[[cy, cx, 0, 4]], 1.0);
        assert!((row[[cy, cx, 0, 0]] - t.bbox.x1).abs() < 1e-6);
        assert!((row[[cy, cx, 0, 3]] - t.bbox.y2).abs() < 1e-6);
    }

    #[test]
    fn test_zero_size_box_skipped() {
        let t = truth(0.5, 0.5, 0.0, 0.0, 1);
        let targets =
            assign_targets(&[t], &YOLO_V3_ANCHORS, &YOLO_V3_MASKS, 416).unwrap();
        assert!(targets.iter().all(|t| t.sum() == 0.0));
    }

    #[test]
    fn test_edge_center_clamped_to_last_cell() {
        let t = truth(1.0, 1.0, 373.0 / 416.0, 326.0 / 416.0, 2);
        let targets =
            assign_targets(&[t], &YOLO_V3_ANCHORS, &YOLO_V3_MASKS, 416).unwrap();
        assert_eq!(targets[0][[12, 12, 2, 4]], 1.0);
    }

    #[test]
    fn test_last_writer_wins_on_collision() {
        let a = truth(0.5, 0.5, 10.0 / 416.0, 13.0 / 416.0, 1);
        let b = truth(0.5, 0.5, 10.0 / 416.0, 13.0 / 416.0, 9);
        let targets =
            assign_targets(&[a, b], &YOLO_V3_ANCHORS, &YOLO_V3_MASKS, 416).unwrap();
        assert_eq!(targets[2][[26, 26, 0, 5]], 9.0);
    }

    #[test]
    fn test_tiny_architecture_grids() {
        let arch = Architecture::V3Tiny;
        let t = truth(0.5, 0.5, 344.0 / 416.0, 319.0 / 416.0, 0);
        let targets = assign_targets(&[t], arch.anchors(), arch.masks(), 416).unwrap();
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].dim(), (13, 13, 3, 6));
        assert_eq!(targets[1].dim(), (26, 26, 3, 6));
        assert_eq!(targets[0][[6, 6, 2, 4]], 1.0);
    }

    #[test]
    fn test_unaligned_input_size_rejected() {
        let err = assign_targets(&[], &YOLO_V3_ANCHORS, &YOLO_V3_MASKS, 100).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_CONFIG");
    }
}

//! Score thresholding and non-max suppression
//!
//! Suppression runs per class over the combined candidates of every scale:
//! candidates are scored as objectness times class probability, sorted, and
//! greedily kept while their overlap with already-kept boxes stays at or
//! below the IoU threshold. Surviving boxes are clipped to the unit square.

use serde::{Deserialize, Serialize};

use crate::vision::boxes::{BoundingBox, Candidate};

/// Thresholds and caps for suppression
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NmsConfig {
    pub score_threshold: f32,
    pub iou_threshold: f32,
    pub max_per_class: usize,
    pub max_total: usize,
}

impl Default for NmsConfig {
    fn default() -> Self {
        Self {
            score_threshold: 0.5,
            iou_threshold: 0.5,
            max_per_class: 100,
            max_total: 100,
        }
    }
}

/// A suppressed, scored detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub score: f32,
    pub class_id: usize,
}

/// Reduce raw candidates to final detections
pub fn non_max_suppression(candidates: &[Candidate], config: &NmsConfig) -> Vec<Detection> {
    let num_classes = match candidates.first() {
        Some(c) => c.class_probs.len(),
        None => return Vec::new(),
    };

    let mut detections = Vec::new();
    for class_id in 0..num_classes {
        let mut scored: Vec<(f32, &BoundingBox)> = candidates
            .iter()
            .map(|c| (c.objectness * c.class_probs[class_id], &c.bbox))
            .filter(|(score, _)| *score >= config.score_threshold)
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));

        let mut kept: Vec<Detection> = Vec::new();
        for (score, bbox) in scored {
            if kept.len() >= config.max_per_class {
                break;
            }
            if kept
                .iter()
                .all(|d| d.bbox.iou(bbox) <= config.iou_threshold)
            {
                kept.push(Detection {
                    bbox: *bbox,
                    score,
                    class_id,
                });
            }
        }
        detections.extend(kept);
    }

    detections.sort_by(|a, b| b.score.total_cmp(&a.score));
    detections.truncate(config.max_total);
    // IoU runs on the raw boxes; only the survivors are clipped.
    for det in &mut detections {
        det.bbox = det.bbox.clamp_unit();
    }
    detections
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn candidate(x1: f32, y1: f32, x2: f32, y2: f32, obj: f32, probs: &[f32]) -> Candidate {
        Candidate {
            bbox: BoundingBox::new(x1, y1, x2, y2),
            objectness: obj,
            class_probs: probs.to_vec(),
        }
    }

    #[test]
    fn test_overlapping_same_class_suppressed() {
        let candidates = vec![
            candidate(0.1, 0.1, 0.5, 0.5, 0.9, &[0.9]),
            candidate(0.12, 0.12, 0.52, 0.52, 0.9, &[0.8]),
            candidate(0.7, 0.7, 0.9, 0.9, 0.9, &[0.7]),
        ];
        let dets = non_max_suppression(&candidates, &NmsConfig::default());
        assert_eq!(dets.len(), 2);
        assert_relative_eq!(dets[0].score, 0.81, epsilon = 1e-6);
        assert_relative_eq!(dets[1].score, 0.63, epsilon = 1e-6);
    }

    #[test]
    fn test_overlapping_different_classes_both_kept() {
        let candidates = vec![
            candidate(0.1, 0.1, 0.5, 0.5, 1.0, &[0.9, 0.0]),
            candidate(0.1, 0.1, 0.5, 0.5, 1.0, &[0.0, 0.8]),
        ];
        let dets = non_max_suppression(&candidates, &NmsConfig::default());
        assert_eq!(dets.len(), 2);
        let classes: Vec<usize> = dets.iter().map(|d| d.class_id).collect();
        assert!(classes.contains(&0) && classes.contains(&1));
    }

    #[test]
    fn test_score_threshold_filters() {
        let candidates = vec![
            candidate(0.1, 0.1, 0.3, 0.3, 0.6, &[0.6]), // 0.36, below 0.5
            candidate(0.6, 0.6, 0.8, 0.8, 0.9, &[0.9]), // 0.81
        ];
        let dets = non_max_suppression(&candidates, &NmsConfig::default());
        assert_eq!(dets.len(), 1);
        assert_relative_eq!(dets[0].score, 0.81, epsilon = 1e-6);
    }

    #[test]
    fn test_results_sorted_and_capped() {
        let mut candidates = Vec::new();
        for i in 0..30 {
            let x = (i % 6) as f32 * 0.15;
            let y = (i / 6) as f32 * 0.18;
            candidates.push(candidate(x, y, x + 0.1, y + 0.1, 0.9, &[0.6 + (i as f32) * 0.01]));
        }
        let config = NmsConfig {
            max_total: 10,
            ..NmsConfig::default()
        };
        let dets = non_max_suppression(&candidates, &config);
        assert_eq!(dets.len(), 10);
        assert!(dets.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn test_detections_clipped_to_unit_square() {
        let candidates = vec![candidate(-0.05, 0.7, 0.3, 1.2, 0.9, &[0.9])];
        let dets = non_max_suppression(&candidates, &NmsConfig::default());
        assert_eq!(dets.len(), 1);
        assert_relative_eq!(dets[0].bbox.x1, 0.0);
        assert_relative_eq!(dets[0].bbox.y1, 0.7);
        assert_relative_eq!(dets[0].bbox.x2, 0.3);
        assert_relative_eq!(dets[0].bbox.y2, 1.0);
    }

    #[test]
    fn test_empty_input() {
        assert!(non_max_suppression(&[], &NmsConfig::default()).is_empty());
    }
}

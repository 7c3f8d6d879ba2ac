//! Object detection: YOLOv3 networks, weights, decoding, suppression
//!
//! This module provides:
//! - `Network` building and forward pass for YOLOv3 and YOLOv3-tiny
//! - Darknet weights file loading
//! - Raw head decoding into scored candidates
//! - Non-max suppression into final detections
//! - Ground truth assignment and the training loss, for evaluation

mod boxes;
mod layers;
mod loss;
mod names;
mod network;
mod nms;
mod target;
mod weights;

pub use boxes::{decode_scale, iou_wh, sigmoid, BoundingBox, Candidate};
pub use layers::{concat_channels, max_pool, upsample2, Activation, BatchNorm, ConvLayer};
pub use loss::{total_loss, yolo_loss, LossBreakdown, DEFAULT_IGNORE_THRESHOLD};
pub use names::{coco_names, load_names, COCO_NAMES};
pub use network::{
    Architecture, Network, YOLO_V3_ANCHORS, YOLO_V3_MASKS, YOLO_V3_TINY_ANCHORS,
    YOLO_V3_TINY_MASKS,
};
pub use nms::{non_max_suppression, Detection, NmsConfig};
pub use target::{assign_targets, GroundTruth};
pub use weights::{load_weights, load_weights_from_bytes, sha256_hex, WeightsInfo};

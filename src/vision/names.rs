//! Class name tables
//!
//! The built-in table matches the class order of the publicly distributed
//! pretrained weights. Custom models ship a `.names` file, one label per
//! line in class-id order.

use std::fs;
use std::path::Path;

use crate::error::{LookoutError, Result};

/// The 80 class labels the reference pretrained weights were trained on
pub const COCO_NAMES: [&str; 80] = [
    "person",
    "bicycle",
    "car",
    "motorbike",
    "aeroplane",
    "bus",
    "train",
    "truck",
    "boat",
    "traffic light",
    "fire hydrant",
    "stop sign",
    "parking meter",
    "bench",
    "bird",
    "cat",
    "dog",
    "horse",
    "sheep",
    "cow",
    "elephant",
    "bear",
    "zebra",
    "giraffe",
    "backpack",
    "umbrella",
    "handbag",
    "tie",
    "suitcase",
    "frisbee",
    "skis",
    "snowboard",
    "sports ball",
    "kite",
    "baseball bat",
    "baseball glove",
    "skateboard",
    "surfboard",
    "tennis racket",
    "bottle",
    "wine glass",
    "cup",
    "fork",
    "knife",
    "spoon",
    "bowl",
    "banana",
    "apple",
    "sandwich",
    "orange",
    "broccoli",
    "carrot",
    "hot dog",
    "pizza",
    "donut",
    "cake",
    "chair",
    "sofa",
    "pottedplant",
    "bed",
    "diningtable",
    "toilet",
    "tvmonitor",
    "laptop",
    "mouse",
    "remote",
    "keyboard",
    "cell phone",
    "microwave",
    "oven",
    "toaster",
    "sink",
    "refrigerator",
    "book",
    "clock",
    "vase",
    "scissors",
    "teddy bear",
    "hair drier",
    "toothbrush",
];

/// Owned copy of the built-in COCO table
pub fn coco_names() -> Vec<String> {
    COCO_NAMES.iter().map(|s| s.to_string()).collect()
}

/// Load class names from a `.names` file
///
/// Blank lines and `#` comment lines are skipped.
pub fn load_names<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(LookoutError::FileNotFound {
            path: path.display().to_string(),
            source: None,
        });
    }
    let text = fs::read_to_string(path)?;
    let names: Vec<String> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect();
    if names.is_empty() {
        return Err(LookoutError::InvalidConfig {
            reason: format!("no class names in {}", path.display()),
        });
    }
    Ok(names)
}

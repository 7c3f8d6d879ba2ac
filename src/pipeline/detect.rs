//! End-to-end object detection
//!
//! Wires weight loading, preprocessing, the forward pass, decoding and
//! suppression into one `Detector`, and wraps single-image runs in a
//! serializable report for the CLI.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{LookoutError, Result};
use crate::image::{draw, io as image_io, transform, ImageBuffer};
use crate::vision::{
    decode_scale, load_weights, load_weights_from_bytes, non_max_suppression, Architecture,
    BoundingBox, Detection, Network, NmsConfig, WeightsInfo,
};

/// Detector settings
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    pub architecture: Architecture,
    /// Square network input edge, must be a multiple of 32
    pub input_size: usize,
    pub nms: NmsConfig,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            architecture: Architecture::V3,
            input_size: 416,
            nms: NmsConfig::default(),
        }
    }
}

/// A detection with its class name resolved
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabeledDetection {
    pub class_id: usize,
    pub class_name: String,
    pub score: f32,
    /// Box in normalized image coordinates
    pub bbox: BoundingBox,
}

/// Serializable record of one detection run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectReport {
    pub run_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub architecture: String,
    pub weights_sha256: String,
    pub image_path: String,
    pub image_width: usize,
    pub image_height: usize,
    pub detections: Vec<LabeledDetection>,
}

/// Object detector with loaded weights and class names
pub struct Detector {
    network: Network,
    config: DetectorConfig,
    names: Vec<String>,
    weights: WeightsInfo,
}

impl Detector {
    /// Build a detector from a darknet weights file
    ///
    /// The number of classes is taken from `names`.
    pub fn from_weights_file<P: AsRef<Path>>(
        config: DetectorConfig,
        names: Vec<String>,
        weights_path: P,
    ) -> Result<Self> {
        let mut network = Self::build_network(&config, &names)?;
        let weights = load_weights(&mut network, weights_path)?;
        Ok(Self::assemble(network, config, names, weights))
    }

    /// Build a detector from weights already in memory
    pub fn from_weights_bytes(
        config: DetectorConfig,
        names: Vec<String>,
        bytes: &[u8],
    ) -> Result<Self> {
        let mut network = Self::build_network(&config, &names)?;
        let weights = load_weights_from_bytes(&mut network, bytes)?;
        Ok(Self::assemble(network, config, names, weights))
    }

    fn build_network(config: &DetectorConfig, names: &[String]) -> Result<Network> {
        if config.input_size == 0 || config.input_size % 32 != 0 {
            return Err(LookoutError::InvalidConfig {
                reason: format!(
                    "input size must be a positive multiple of 32, got {}",
                    config.input_size
                ),
            });
        }
        Network::new(config.architecture, names.len())
    }

    fn assemble(
        network: Network,
        config: DetectorConfig,
        names: Vec<String>,
        weights: WeightsInfo,
    ) -> Self {
        log::info!(
            "detector ready: {} with {} classes, {} weight params, sha256 {}",
            config.architecture.name(),
            names.len(),
            weights.params,
            weights.sha256
        );
        Self {
            network,
            config,
            names,
            weights,
        }
    }

    pub fn architecture(&self) -> Architecture {
        self.config.architecture
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn weights_info(&self) -> &WeightsInfo {
        &self.weights
    }

    /// Run the network on one image and return suppressed detections
    pub fn detect(&self, image: &ImageBuffer) -> Result<Vec<Detection>> {
        let input = transform::to_model_input(image, self.config.input_size);
        let heads = self.network.forward(&input)?;

        let anchors = self.config.architecture.anchors();
        let masks = self.config.architecture.masks();

        let mut candidates = Vec::new();
        for (head, mask) in heads.iter().zip(masks) {
            let scale_anchors: Vec<(f32, f32)> = mask.iter().map(|&m| anchors[m]).collect();
            candidates.extend(decode_scale(head, &scale_anchors)?);
        }

        let detections = non_max_suppression(&candidates, &self.config.nms);
        log::debug!(
            "{} candidates reduced to {} detections",
            candidates.len(),
            detections.len()
        );
        Ok(detections)
    }

    /// Attach class names to raw detections
    pub fn label(&self, detections: Vec<Detection>) -> Vec<LabeledDetection> {
        detections
            .into_iter()
            .map(|d| LabeledDetection {
                class_name: self
                    .names
                    .get(d.class_id)
                    .cloned()
                    .unwrap_or_else(|| format!("class-{}", d.class_id)),
                class_id: d.class_id,
                score: d.score,
                bbox: d.bbox,
            })
            .collect()
    }

    /// Detect objects in an image file and build a run report
    ///
    /// When `annotated_out` is given, a copy of the image with boxes and
    /// labels drawn on it is written there.
    pub fn detect_file<P: AsRef<Path>>(
        &self,
        image_path: P,
        annotated_out: Option<&Path>,
    ) -> Result<DetectReport> {
        let image_path = image_path.as_ref();
        let image = image_io::load_ppm(image_path)?;
        let detections = self.detect(&image)?;
        log::info!(
            "{}: {} objects detected",
            image_path.display(),
            detections.len()
        );

        if let Some(out) = annotated_out {
            let mut annotated = image.clone();
            draw::draw_detections(&mut annotated, &detections, &self.names);
            image_io::save_ppm(out, &annotated)?;
            log::info!("annotated image written to {}", out.display());
        }

        Ok(DetectReport {
            run_id: Uuid::new_v4(),
            created_at: Utc::now(),
            architecture: self.config.architecture.name().to_string(),
            weights_sha256: self.weights.sha256.clone(),
            image_path: image_path.display().to_string(),
            image_width: image.width(),
            image_height: image.height(),
            detections: self.label(detections),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    /// Well-formed weights for the given network, all values zero
    fn zero_weights(network: &Network) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&0i32.to_le_bytes());
        bytes.extend_from_slice(&2i32.to_le_bytes());
        bytes.extend_from_slice(&0i32.to_le_bytes());
        bytes.extend_from_slice(&0u64.to_le_bytes());
        bytes.extend_from_slice(&vec![0u8; network.num_params() * 4]);
        bytes
    }

    fn tiny_config() -> DetectorConfig {
        DetectorConfig {
            architecture: Architecture::V3Tiny,
            input_size: 32,
            nms: NmsConfig::default(),
        }
    }

    fn tiny_detector() -> Detector {
        let config = tiny_config();
        let names = vec!["widget".to_string()];
        let network = Network::new(config.architecture, 1).unwrap();
        let bytes = zero_weights(&network);
        Detector::from_weights_bytes(config, names, &bytes).unwrap()
    }

    #[test]
    fn test_zero_weights_detect_nothing() {
        // All-zero weights leave every logit at zero, so each candidate
        // scores 0.5 * 0.5 and falls below the default threshold
        let detector = tiny_detector();
        let image = ImageBuffer::new(8, 8);
        let detections = detector.detect(&image).unwrap();
        assert!(detections.is_empty());
    }

    #[test]
    fn test_input_size_validation() {
        let config = DetectorConfig {
            architecture: Architecture::V3Tiny,
            input_size: 100,
            nms: NmsConfig::default(),
        };
        let result = Detector::from_weights_bytes(config, vec!["a".to_string()], &[]);
        assert!(matches!(result, Err(LookoutError::InvalidConfig { .. })));
    }

    #[test]
    fn test_truncated_weights_rejected() {
        let config = tiny_config();
        let network = Network::new(config.architecture, 1).unwrap();
        let mut bytes = zero_weights(&network);
        bytes.truncate(bytes.len() - 4);

        let result = Detector::from_weights_bytes(config, vec!["a".to_string()], &bytes);
        assert!(matches!(result, Err(LookoutError::WeightsError { .. })));
    }

    #[test]
    fn test_detect_file_report() {
        let dir = tempdir().unwrap();
        let image_path = dir.path().join("scene.ppm");
        let annotated_path = dir.path().join("scene_annotated.ppm");

        let image = ImageBuffer::new(16, 12);
        image_io::save_ppm(&image_path, &image).unwrap();

        let detector = tiny_detector();
        let report = detector
            .detect_file(&image_path, Some(&annotated_path))
            .unwrap();

        assert_eq!(report.architecture, "yolov3-tiny");
        assert_eq!(report.image_width, 16);
        assert_eq!(report.image_height, 12);
        assert!(report.detections.is_empty());
        assert_eq!(report.weights_sha256.len(), 64);
        assert!(annotated_path.exists());

        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"yolov3-tiny\""));
    }

    #[test]
    fn test_label_resolves_names() {
        let detector = tiny_detector();
        let labeled = detector.label(vec![
            Detection {
                bbox: BoundingBox::new(0.1, 0.1, 0.4, 0.4),
                score: 0.9,
                class_id: 0,
            },
            Detection {
                bbox: BoundingBox::new(0.5, 0.5, 0.8, 0.8),
                score: 0.7,
                class_id: 42,
            },
        ]);

        assert_eq!(labeled[0].class_name, "widget");
        assert_eq!(labeled[1].class_name, "class-42");
    }
}

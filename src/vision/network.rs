//! YOLOv3 network assembly and forward pass
//!
//! The network is a flat list of layer operations, darknet style: each
//! operation consumes the previous output, routes jump the stream to
//! earlier outputs (concatenating when more than one is named), shortcuts
//! add an earlier output back in. Convolution order matches the weights
//! file exactly, so the loader can walk `convs` front to back.

use std::fmt;
use std::str::FromStr;

use ndarray::{Array3, Array4};

use crate::error::{LookoutError, Result};
use crate::vision::layers::{concat_channels, max_pool, upsample2, ConvLayer};

/// YOLOv3 anchor dimensions, normalized to the 416px reference input
pub const YOLO_V3_ANCHORS: [(f32, f32); 9] = [
    (10.0 / 416.0, 13.0 / 416.0),
    (16.0 / 416.0, 30.0 / 416.0),
    (33.0 / 416.0, 23.0 / 416.0),
    (30.0 / 416.0, 61.0 / 416.0),
    (62.0 / 416.0, 45.0 / 416.0),
    (59.0 / 416.0, 119.0 / 416.0),
    (116.0 / 416.0, 90.0 / 416.0),
    (156.0 / 416.0, 198.0 / 416.0),
    (373.0 / 416.0, 326.0 / 416.0),
];

/// Anchor indices per detection head, coarsest grid first
pub const YOLO_V3_MASKS: [[usize; 3]; 3] = [[6, 7, 8], [3, 4, 5], [0, 1, 2]];

pub const YOLO_V3_TINY_ANCHORS: [(f32, f32); 6] = [
    (10.0 / 416.0, 14.0 / 416.0),
    (23.0 / 416.0, 27.0 / 416.0),
    (37.0 / 416.0, 58.0 / 416.0),
    (81.0 / 416.0, 82.0 / 416.0),
    (135.0 / 416.0, 169.0 / 416.0),
    (344.0 / 416.0, 319.0 / 416.0),
];

pub const YOLO_V3_TINY_MASKS: [[usize; 3]; 2] = [[3, 4, 5], [0, 1, 2]];

/// Supported network variants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Architecture {
    V3,
    V3Tiny,
}

impl Architecture {
    pub fn name(&self) -> &'static str {
        match self {
            Architecture::V3 => "yolov3",
            Architecture::V3Tiny => "yolov3-tiny",
        }
    }

    pub fn anchors(&self) -> &'static [(f32, f32)] {
        match self {
            Architecture::V3 => &YOLO_V3_ANCHORS,
            Architecture::V3Tiny => &YOLO_V3_TINY_ANCHORS,
        }
    }

    pub fn masks(&self) -> &'static [[usize; 3]] {
        match self {
            Architecture::V3 => &YOLO_V3_MASKS,
            Architecture::V3Tiny => &YOLO_V3_TINY_MASKS,
        }
    }

    /// Number of detection heads (and output grid scales)
    pub fn head_count(&self) -> usize {
        self.masks().len()
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Architecture {
    type Err = LookoutError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "yolov3" | "v3" => Ok(Architecture::V3),
            "yolov3-tiny" | "tiny" => Ok(Architecture::V3Tiny),
            other => Err(LookoutError::InvalidConfig {
                reason: format!(
                    "unknown architecture '{}' (expected 'yolov3' or 'yolov3-tiny')",
                    other
                ),
            }),
        }
    }
}

/// One step of the forward pass
#[derive(Debug, Clone)]
enum Op {
    /// Apply `convs[i]` to the previous output
    Conv(usize),
    MaxPool { size: usize, stride: usize },
    Upsample,
    /// Jump to an earlier output, concatenating channels when several are named
    Route(Vec<usize>),
    /// Add an earlier output to the previous one
    Shortcut(usize),
    /// Previous output is a raw detection head
    Head,
}

/// A YOLOv3 or YOLOv3-tiny network with dense weights in memory
#[derive(Debug, Clone)]
pub struct Network {
    architecture: Architecture,
    num_classes: usize,
    convs: Vec<ConvLayer>,
    ops: Vec<Op>,
}

impl Network {
    /// Build a zero-initialized network for the given class count
    pub fn new(architecture: Architecture, num_classes: usize) -> Result<Self> {
        if num_classes == 0 {
            return Err(LookoutError::InvalidConfig {
                reason: "num_classes must be at least 1".to_string(),
            });
        }
        let head_channels = 3 * (5 + num_classes);
        let mut b = Builder::new(3);
        match architecture {
            Architecture::V3 => build_v3(&mut b, head_channels),
            Architecture::V3Tiny => build_v3_tiny(&mut b, head_channels),
        }
        Ok(Self {
            architecture,
            num_classes,
            convs: b.convs,
            ops: b.ops,
        })
    }

    pub fn architecture(&self) -> Architecture {
        self.architecture
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// Convolution layer count
    pub fn conv_count(&self) -> usize {
        self.convs.len()
    }

    /// Total parameter count, equal to the float count of a weights file
    pub fn num_params(&self) -> usize {
        self.convs.iter().map(ConvLayer::num_params).sum()
    }

    /// Convolutions in weights-file order, for the loader
    pub(crate) fn convs_mut(&mut self) -> impl Iterator<Item = &mut ConvLayer> {
        self.convs.iter_mut()
    }

    /// Run the network on a `[3, h, w]` input with both dimensions
    /// divisible by 32. Returns one raw `[gy, gx, anchor, 5 + classes]`
    /// tensor per detection head, coarsest grid first.
    pub fn forward(&self, input: &Array3<f32>) -> Result<Vec<Array4<f32>>> {
        let (c, h, w) = input.dim();
        if c != 3 {
            return Err(LookoutError::ShapeMismatch {
                expected: "3 input channels".to_string(),
                actual: format!("{}", c),
            });
        }
        if h == 0 || w == 0 || h % 32 != 0 || w % 32 != 0 {
            return Err(LookoutError::ShapeMismatch {
                expected: "input dimensions divisible by 32".to_string(),
                actual: format!("{}x{}", h, w),
            });
        }

        let mut outputs: Vec<Array3<f32>> = Vec::with_capacity(self.ops.len());
        let mut heads = Vec::with_capacity(self.architecture.head_count());
        for (i, op) in self.ops.iter().enumerate() {
            let produced = match op {
                Op::Conv(ci) => {
                    let src = if i == 0 { input } else { &outputs[i - 1] };
                    self.convs[*ci].forward(src)?
                }
                Op::MaxPool { size, stride } => max_pool(&outputs[i - 1], *size, *stride),
                Op::Upsample => upsample2(&outputs[i - 1]),
                Op::Route(from) => {
                    let mut merged = outputs[from[0]].clone();
                    for &idx in &from[1..] {
                        merged = concat_channels(&merged, &outputs[idx])?;
                    }
                    merged
                }
                Op::Shortcut(from) => &outputs[i - 1] + &outputs[*from],
                Op::Head => {
                    heads.push(self.head_tensor(&outputs[i - 1])?);
                    outputs[i - 1].clone()
                }
            };
            outputs.push(produced);
        }
        Ok(heads)
    }

    /// Reorder a head feature map into `[gy, gx, anchor, 5 + classes]`
    fn head_tensor(&self, feat: &Array3<f32>) -> Result<Array4<f32>> {
        let per_anchor = 5 + self.num_classes;
        let (c, gy, gx) = feat.dim();
        if c != 3 * per_anchor {
            return Err(LookoutError::ShapeMismatch {
                expected: format!("{} head channels", 3 * per_anchor),
                actual: format!("{}", c),
            });
        }
        let hwc = feat.view().permuted_axes([1, 2, 0]);
        let owned = hwc.as_standard_layout().into_owned();
        owned
            .into_shape((gy, gx, 3, per_anchor))
            .map_err(|e| LookoutError::ShapeMismatch {
                expected: format!("[{}, {}, 3, {}]", gy, gx, per_anchor),
                actual: e.to_string(),
            })
    }
}

/// Tracks node outputs and channel counts while the graph is laid down
struct Builder {
    convs: Vec<ConvLayer>,
    ops: Vec<Op>,
    channels: Vec<usize>,
    current: usize,
}

impl Builder {
    fn new(input_channels: usize) -> Self {
        Self {
            convs: Vec::new(),
            ops: Vec::new(),
            channels: Vec::new(),
            current: input_channels,
        }
    }

    fn last(&self) -> usize {
        self.ops.len() - 1
    }

    fn push(&mut self, op: Op, out_channels: usize) -> usize {
        self.ops.push(op);
        self.channels.push(out_channels);
        self.current = out_channels;
        self.last()
    }

    /// Batch-normalized leaky convolution
    fn conv(&mut self, filters: usize, kernel: usize, stride: usize) -> usize {
        let layer = ConvLayer::new(
            format!("conv_{}", self.convs.len()),
            self.current,
            filters,
            kernel,
            stride,
            true,
        );
        self.convs.push(layer);
        self.push(Op::Conv(self.convs.len() - 1), filters)
    }

    /// Linear biased 1x1 convolution producing raw head channels
    fn head_conv(&mut self, filters: usize) -> usize {
        let layer = ConvLayer::new(
            format!("conv_{}", self.convs.len()),
            self.current,
            filters,
            1,
            1,
            false,
        );
        self.convs.push(layer);
        self.push(Op::Conv(self.convs.len() - 1), filters)
    }

    /// Two convolutions plus a shortcut back to the block input
    fn residual(&mut self, filters: usize) {
        let from = self.last();
        self.conv(filters / 2, 1, 1);
        self.conv(filters, 3, 1);
        self.push(Op::Shortcut(from), self.current);
    }

    fn max_pool(&mut self, size: usize, stride: usize) -> usize {
        self.push(Op::MaxPool { size, stride }, self.current)
    }

    fn upsample(&mut self) -> usize {
        self.push(Op::Upsample, self.current)
    }

    fn route(&mut self, from: Vec<usize>) -> usize {
        let merged: usize = from.iter().map(|&i| self.channels[i]).sum();
        self.push(Op::Route(from), merged)
    }

    fn head(&mut self) -> usize {
        self.push(Op::Head, self.current)
    }
}

fn build_v3(b: &mut Builder, head_channels: usize) {
    // Darknet-53 backbone
    b.conv(32, 3, 1);
    let mut taps = Vec::new();
    for (filters, blocks) in [(64, 1), (128, 2), (256, 8), (512, 8), (1024, 4)] {
        b.conv(filters, 3, 2);
        for _ in 0..blocks {
            b.residual(filters);
        }
        taps.push(b.last());
    }
    let tap_256 = taps[2];
    let tap_512 = taps[3];

    // 13x13 head
    for _ in 0..2 {
        b.conv(512, 1, 1);
        b.conv(1024, 3, 1);
    }
    let neck_0 = b.conv(512, 1, 1);
    b.conv(1024, 3, 1);
    b.head_conv(head_channels);
    b.head();

    // 26x26 head
    b.route(vec![neck_0]);
    b.conv(256, 1, 1);
    let up_0 = b.upsample();
    b.route(vec![up_0, tap_512]);
    for _ in 0..2 {
        b.conv(256, 1, 1);
        b.conv(512, 3, 1);
    }
    let neck_1 = b.conv(256, 1, 1);
    b.conv(512, 3, 1);
    b.head_conv(head_channels);
    b.head();

    // 52x52 head
    b.route(vec![neck_1]);
    b.conv(128, 1, 1);
    let up_1 = b.upsample();
    b.route(vec![up_1, tap_256]);
    for _ in 0..2 {
        b.conv(128, 1, 1);
        b.conv(256, 3, 1);
    }
    b.conv(128, 1, 1);
    b.conv(256, 3, 1);
    b.head_conv(head_channels);
    b.head();
}

fn build_v3_tiny(b: &mut Builder, head_channels: usize) {
    b.conv(16, 3, 1);
    b.max_pool(2, 2);
    b.conv(32, 3, 1);
    b.max_pool(2, 2);
    b.conv(64, 3, 1);
    b.max_pool(2, 2);
    b.conv(128, 3, 1);
    b.max_pool(2, 2);
    let tap = b.conv(256, 3, 1);
    b.max_pool(2, 2);
    b.conv(512, 3, 1);
    b.max_pool(2, 1);
    b.conv(1024, 3, 1);

    // 13x13 head
    let neck = b.conv(256, 1, 1);
    b.conv(512, 3, 1);
    b.head_conv(head_channels);
    b.head();

    // 26x26 head
    b.route(vec![neck]);
    b.conv(128, 1, 1);
    let up = b.upsample();
    b.route(vec![up, tap]);
    b.conv(256, 3, 1);
    b.head_conv(head_channels);
    b.head();
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    #[test]
    fn test_v3_layer_inventory() {
        let net = Network::new(Architecture::V3, 80).unwrap();
        assert_eq!(net.conv_count(), 75);
        // Float count of the published pretrained weights file
        assert_eq!(net.num_params(), 62_001_757);
    }

    #[test]
    fn test_tiny_layer_inventory() {
        let net = Network::new(Architecture::V3Tiny, 80).unwrap();
        assert_eq!(net.conv_count(), 13);
        assert_eq!(net.num_params(), 8_858_734);
    }

    #[test]
    fn test_num_params_scales_with_classes() {
        let one = Network::new(Architecture::V3Tiny, 1).unwrap();
        let eighty = Network::new(Architecture::V3Tiny, 80).unwrap();
        // Only the two head convolutions depend on the class count; their
        // inputs are 512 and 256 channels wide
        let per_class = 3 * ((512 + 1) + (256 + 1));
        assert_eq!(eighty.num_params() - one.num_params(), 79 * per_class);
    }

    #[test]
    fn test_zero_classes_rejected() {
        assert!(Network::new(Architecture::V3, 0).is_err());
    }

    #[test]
    fn test_tiny_forward_shapes() {
        let net = Network::new(Architecture::V3Tiny, 4).unwrap();
        let input = Array3::<f32>::zeros((3, 32, 32));
        let heads = net.forward(&input).unwrap();
        assert_eq!(heads.len(), 2);
        assert_eq!(heads[0].dim(), (1, 1, 3, 9));
        assert_eq!(heads[1].dim(), (2, 2, 3, 9));
    }

    #[test]
    fn test_forward_rejects_unaligned_input() {
        let net = Network::new(Architecture::V3Tiny, 1).unwrap();
        let input = Array3::<f32>::zeros((3, 33, 33));
        assert!(net.forward(&input).is_err());
        let input = Array3::<f32>::zeros((1, 32, 32));
        assert!(net.forward(&input).is_err());
    }

    #[test]
    fn test_architecture_parsing() {
        assert_eq!("yolov3".parse::<Architecture>().unwrap(), Architecture::V3);
        assert_eq!(
            "yolov3-tiny".parse::<Architecture>().unwrap(),
            Architecture::V3Tiny
        );
        assert!("yolov5".parse::<Architecture>().is_err());
    }

    #[test]
    fn test_anchor_tables() {
        assert_eq!(Architecture::V3.anchors().len(), 9);
        assert_eq!(Architecture::V3.masks().len(), 3);
        assert_eq!(Architecture::V3Tiny.anchors().len(), 6);
        assert_eq!(Architecture::V3Tiny.masks().len(), 2);
        // Coarsest grid takes the largest anchors
        assert_eq!(Architecture::V3.masks()[0], [6, 7, 8]);
    }
}

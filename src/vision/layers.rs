//! Network building blocks
//!
//! Feature maps are `[channels, height, width]` f32 tensors. Convolution is
//! im2col plus a matrix product, parallelized over output channels with
//! rayon. Batch normalization is applied in inference form, one scale and
//! shift per channel.

use ndarray::{Array1, Array2, Array3, Array4, Axis};
use rayon::prelude::*;

use crate::error::{LookoutError, Result};

/// Epsilon added to the running variance, matching the framework the
/// pretrained weights were exported from.
pub const BN_EPSILON: f32 = 1e-3;

/// Per-channel batch normalization statistics
#[derive(Debug, Clone)]
pub struct BatchNorm {
    pub gamma: Vec<f32>,
    pub beta: Vec<f32>,
    pub mean: Vec<f32>,
    pub variance: Vec<f32>,
}

impl BatchNorm {
    /// Identity transform for the given channel count
    pub fn identity(channels: usize) -> Self {
        Self {
            gamma: vec![1.0; channels],
            beta: vec![0.0; channels],
            mean: vec![0.0; channels],
            variance: vec![1.0; channels],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    Linear,
    Leaky,
}

/// 2D convolution with optional batch normalization
///
/// Weights are OIHW. Stride-1 convolutions use symmetric same padding;
/// stride-2 convolutions pad one row on top and one column on the left
/// only, which keeps grid alignment identical to the darknet downsampling
/// layers the pretrained weights assume.
#[derive(Debug, Clone)]
pub struct ConvLayer {
    pub name: String,
    pub in_channels: usize,
    pub out_channels: usize,
    pub kernel_size: usize,
    pub stride: usize,
    pub weights: Array4<f32>,
    pub bias: Option<Array1<f32>>,
    pub batch_norm: Option<BatchNorm>,
    pub activation: Activation,
}

impl ConvLayer {
    /// Zero-initialized layer; weights come from a darknet file later
    ///
    /// Layers with batch normalization have no bias and a leaky activation.
    /// Layers without it (the detection heads) are linear with a bias.
    pub fn new(
        name: impl Into<String>,
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        stride: usize,
        batch_norm: bool,
    ) -> Self {
        Self {
            name: name.into(),
            in_channels,
            out_channels,
            kernel_size,
            stride,
            weights: Array4::zeros((out_channels, in_channels, kernel_size, kernel_size)),
            bias: if batch_norm {
                None
            } else {
                Some(Array1::zeros(out_channels))
            },
            batch_norm: if batch_norm {
                Some(BatchNorm::identity(out_channels))
            } else {
                None
            },
            activation: if batch_norm {
                Activation::Leaky
            } else {
                Activation::Linear
            },
        }
    }

    /// Parameter count as stored in a weights file
    pub fn num_params(&self) -> usize {
        let kernel = self.out_channels * self.in_channels * self.kernel_size * self.kernel_size;
        let per_channel = if self.batch_norm.is_some() { 4 } else { 1 };
        kernel + per_channel * self.out_channels
    }

    pub fn forward(&self, input: &Array3<f32>) -> Result<Array3<f32>> {
        let (c, h, w) = input.dim();
        if c != self.in_channels {
            return Err(LookoutError::ShapeMismatch {
                expected: format!("{} input channels for {}", self.in_channels, self.name),
                actual: format!("{}", c),
            });
        }

        let k = self.kernel_size;
        let (pad_top, pad_bottom, pad_left, pad_right) = if self.stride == 1 {
            let p = (k - 1) / 2;
            (p, p, p, p)
        } else {
            (1, 0, 1, 0)
        };
        let padded_h = h + pad_top + pad_bottom;
        let padded_w = w + pad_left + pad_right;
        if padded_h < k || padded_w < k {
            return Err(LookoutError::ShapeMismatch {
                expected: format!("input of at least {}x{} for {}", k, k, self.name),
                actual: format!("{}x{}", h, w),
            });
        }
        let out_h = (padded_h - k) / self.stride + 1;
        let out_w = (padded_w - k) / self.stride + 1;
        let n = out_h * out_w;

        let cols = im2col(input, k, self.stride, pad_top, pad_left, out_h, out_w);
        let cols_t = cols.t();
        let flat = self
            .weights
            .view()
            .into_shape((self.out_channels, self.in_channels * k * k))
            .map_err(|e| LookoutError::ShapeMismatch {
                expected: "contiguous OIHW weights".to_string(),
                actual: e.to_string(),
            })?;

        let mut out = vec![0.0f32; self.out_channels * n];
        out.par_chunks_mut(n).enumerate().for_each(|(oc, dst)| {
            let product = cols_t.dot(&flat.row(oc));
            for (d, v) in dst.iter_mut().zip(product.iter()) {
                *d = *v;
            }
            if let Some(bn) = &self.batch_norm {
                let scale = bn.gamma[oc] / (bn.variance[oc] + BN_EPSILON).sqrt();
                let shift = bn.beta[oc] - bn.mean[oc] * scale;
                for d in dst.iter_mut() {
                    *d = *d * scale + shift;
                }
            } else if let Some(bias) = &self.bias {
                let b = bias[oc];
                for d in dst.iter_mut() {
                    *d += b;
                }
            }
            if self.activation == Activation::Leaky {
                for d in dst.iter_mut() {
                    if *d < 0.0 {
                        *d *= 0.1;
                    }
                }
            }
        });

        Array3::from_shape_vec((self.out_channels, out_h, out_w), out).map_err(|e| {
            LookoutError::ShapeMismatch {
                expected: format!("[{}, {}, {}]", self.out_channels, out_h, out_w),
                actual: e.to_string(),
            }
        })
    }
}

/// Unroll convolution windows into a `[c * k * k, out_h * out_w]` matrix
fn im2col(
    input: &Array3<f32>,
    k: usize,
    stride: usize,
    pad_top: usize,
    pad_left: usize,
    out_h: usize,
    out_w: usize,
) -> Array2<f32> {
    let (c, h, w) = input.dim();
    let mut cols = Array2::zeros((c * k * k, out_h * out_w));
    for ci in 0..c {
        for ky in 0..k {
            for kx in 0..k {
                let row = (ci * k + ky) * k + kx;
                for oy in 0..out_h {
                    let iy = (oy * stride + ky) as isize - pad_top as isize;
                    if iy < 0 || iy >= h as isize {
                        continue;
                    }
                    for ox in 0..out_w {
                        let ix = (ox * stride + kx) as isize - pad_left as isize;
                        if ix < 0 || ix >= w as isize {
                            continue;
                        }
                        cols[[row, oy * out_w + ox]] = input[[ci, iy as usize, ix as usize]];
                    }
                }
            }
        }
    }
    cols
}

/// Max pooling; `stride == 1` pads bottom/right so dimensions are preserved
pub fn max_pool(input: &Array3<f32>, size: usize, stride: usize) -> Array3<f32> {
    let (c, h, w) = input.dim();
    let pad = if stride == 1 { size - 1 } else { 0 };
    let out_h = (h + pad - size) / stride + 1;
    let out_w = (w + pad - size) / stride + 1;
    let mut out = Array3::zeros((c, out_h, out_w));
    for ci in 0..c {
        for oy in 0..out_h {
            for ox in 0..out_w {
                let mut best = f32::NEG_INFINITY;
                for ky in 0..size {
                    for kx in 0..size {
                        let iy = oy * stride + ky;
                        let ix = ox * stride + kx;
                        if iy < h && ix < w {
                            best = best.max(input[[ci, iy, ix]]);
                        }
                    }
                }
                out[[ci, oy, ox]] = best;
            }
        }
    }
    out
}

/// Nearest-neighbour 2x upsample
pub fn upsample2(input: &Array3<f32>) -> Array3<f32> {
    let (c, h, w) = input.dim();
    let mut out = Array3::zeros((c, h * 2, w * 2));
    for ci in 0..c {
        for y in 0..h {
            for x in 0..w {
                let v = input[[ci, y, x]];
                out[[ci, y * 2, x * 2]] = v;
                out[[ci, y * 2, x * 2 + 1]] = v;
                out[[ci, y * 2 + 1, x * 2]] = v;
                out[[ci, y * 2 + 1, x * 2 + 1]] = v;
            }
        }
    }
    out
}

/// Concatenate feature maps along the channel axis
pub fn concat_channels(a: &Array3<f32>, b: &Array3<f32>) -> Result<Array3<f32>> {
    let (_, ah, aw) = a.dim();
    let (_, bh, bw) = b.dim();
    if ah != bh || aw != bw {
        return Err(LookoutError::ShapeMismatch {
            expected: format!("{}x{} spatial dimensions", ah, aw),
            actual: format!("{}x{}", bh, bw),
        });
    }
    ndarray::concatenate(Axis(0), &[a.view(), b.view()]).map_err(|e| {
        LookoutError::ShapeMismatch {
            expected: "concatenable feature maps".to_string(),
            actual: e.to_string(),
        }
    })
}

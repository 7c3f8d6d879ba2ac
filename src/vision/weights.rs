//! Darknet weights file parsing
//!
//! The format is a small header followed by raw little-endian f32 blocks,
//! one per convolution in network order. Batch-normalized layers store
//! `[beta, gamma, mean, variance]` per channel before the kernel; head
//! layers store a plain bias. The kernel itself is OIHW row-major, which
//! is exactly how [`ConvLayer`](crate::vision::layers::ConvLayer) holds it.

use std::path::Path;

use log::info;
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{LookoutError, Result};
use crate::vision::layers::BatchNorm;
use crate::vision::network::Network;

/// Header fields and provenance of a loaded weights file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightsInfo {
    pub major: i32,
    pub minor: i32,
    pub revision: i32,
    /// Training images seen, as recorded by the exporter
    pub images_seen: u64,
    /// Convolution layers populated
    pub layers: usize,
    /// Parameters (f32 values) read after the header
    pub params: usize,
    /// SHA-256 of the entire file
    pub sha256: String,
}

impl WeightsInfo {
    /// Compare the file digest against an expected hex string
    pub fn matches_digest(&self, expected: &str) -> bool {
        self.sha256.eq_ignore_ascii_case(expected.trim())
    }
}

/// Load a darknet weights file into the network
///
/// The file must match the architecture exactly; both a premature end of
/// file and trailing bytes are errors. On error the network's weights are
/// left partially written and it should be rebuilt before another attempt.
pub fn load_weights<P: AsRef<Path>>(network: &mut Network, path: P) -> Result<WeightsInfo> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(LookoutError::FileNotFound {
            path: path.display().to_string(),
            source: None,
        });
    }
    let bytes = std::fs::read(path)?;
    let info = load_weights_from_bytes(network, &bytes)?;
    info!(
        "loaded {} ({} layers, {} parameters, sha256 {})",
        path.display(),
        info.layers,
        info.params,
        &info.sha256[..12]
    );
    Ok(info)
}

/// Load darknet weights from an in-memory buffer
pub fn load_weights_from_bytes(network: &mut Network, bytes: &[u8]) -> Result<WeightsInfo> {
    let sha256 = sha256_hex(bytes);
    let mut r = Reader { bytes, pos: 0 };

    let major = r.read_i32("header major")?;
    let minor = r.read_i32("header minor")?;
    let revision = r.read_i32("header revision")?;
    // Newer exporters widened the image counter to 64 bits
    let images_seen = if major * 10 + minor >= 2 {
        r.read_u64("images seen")?
    } else {
        r.read_u32("images seen")? as u64
    };

    let mut layers = 0;
    let mut params = 0;
    for conv in network.convs_mut() {
        let out = conv.out_channels;
        if conv.batch_norm.is_some() {
            let beta = r.read_f32_vec(out, &conv.name, "bn beta")?;
            let gamma = r.read_f32_vec(out, &conv.name, "bn gamma")?;
            let mean = r.read_f32_vec(out, &conv.name, "bn mean")?;
            let variance = r.read_f32_vec(out, &conv.name, "bn variance")?;
            conv.batch_norm = Some(BatchNorm {
                gamma,
                beta,
                mean,
                variance,
            });
            params += 4 * out;
        } else {
            let bias = r.read_f32_vec(out, &conv.name, "bias")?;
            conv.bias = Some(Array1::from_vec(bias));
            params += out;
        }

        let k = conv.kernel_size;
        let count = out * conv.in_channels * k * k;
        let kernel = r.read_f32_vec(count, &conv.name, "kernel")?;
        conv.weights = ndarray::Array4::from_shape_vec((out, conv.in_channels, k, k), kernel)
            .map_err(|e| LookoutError::WeightsError {
                reason: format!("kernel shape for {}: {}", conv.name, e),
            })?;
        params += count;
        layers += 1;
    }

    if r.remaining() != 0 {
        return Err(LookoutError::WeightsError {
            reason: format!(
                "{} trailing bytes; file does not match the selected architecture",
                r.remaining()
            ),
        });
    }

    Ok(WeightsInfo {
        major,
        minor,
        revision,
        images_seen,
        layers,
        params,
        sha256,
    })
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn take(&mut self, n: usize, what: &str) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(LookoutError::WeightsError {
                reason: format!(
                    "unexpected end of file reading {} ({} bytes left, {} needed)",
                    what,
                    self.remaining(),
                    n
                ),
            });
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_i32(&mut self, what: &str) -> Result<i32> {
        let b = self.take(4, what)?;
        Ok(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn read_u32(&mut self, what: &str) -> Result<u32> {
        let b = self.take(4, what)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn read_u64(&mut self, what: &str) -> Result<u64> {
        let b = self.take(8, what)?;
        Ok(u64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    fn read_f32_vec(&mut self, n: usize, layer: &str, what: &str) -> Result<Vec<f32>> {
        let b = self.take(n * 4, &format!("{} {}", layer, what))?;
        Ok(b.chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }
}

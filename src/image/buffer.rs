//! In-memory RGB image representation
//!
//! All detection and drawing code operates on [`ImageBuffer`]: 8-bit RGB,
//! interleaved, row-major. Conversion to the network's planar float layout
//! happens in [`crate::image::transform`].

use crate::error::{LookoutError, Result};

/// Owned 8-bit RGB image, row-major with interleaved channels
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBuffer {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl ImageBuffer {
    /// Create a black image of the given dimensions
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0; width * height * 3],
        }
    }

    /// Wrap raw interleaved RGB bytes
    ///
    /// Fails if `width * height * 3` overflows or does not match the byte
    /// count.
    pub fn from_raw(width: usize, height: usize, data: Vec<u8>) -> Result<Self> {
        let expected = width
            .checked_mul(height)
            .and_then(|px| px.checked_mul(3))
            .ok_or_else(|| LookoutError::InvalidImage {
                reason: format!("image size {}x{} overflows", width, height),
            })?;
        if data.len() != expected {
            return Err(LookoutError::InvalidImage {
                reason: format!(
                    "{}x{} image needs {} bytes, got {}",
                    width,
                    height,
                    expected,
                    data.len()
                ),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Raw interleaved RGB bytes
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Read one pixel; panics if out of bounds
    pub fn pixel(&self, x: usize, y: usize) -> [u8; 3] {
        let i = self.index(x, y);
        [self.data[i], self.data[i + 1], self.data[i + 2]]
    }

    /// Write one pixel; panics if out of bounds
    pub fn set_pixel(&mut self, x: usize, y: usize, rgb: [u8; 3]) {
        let i = self.index(x, y);
        self.data[i] = rgb[0];
        self.data[i + 1] = rgb[1];
        self.data[i + 2] = rgb[2];
    }

    /// Set every pixel to one colour
    pub fn fill(&mut self, rgb: [u8; 3]) {
        for px in self.data.chunks_exact_mut(3) {
            px.copy_from_slice(&rgb);
        }
    }

    fn index(&self, x: usize, y: usize) -> usize {
        assert!(
            x < self.width && y < self.height,
            "pixel ({}, {}) outside {}x{} image",
            x,
            y,
            self.width,
            self.height
        );
        (y * self.width + x) * 3
    }
}

//! Image handling
//!
//! This module provides:
//! - `ImageBuffer` for 8-bit RGB frames
//! - Binary PPM reading and writing
//! - Bilinear resizing and conversion to network input tensors
//! - Detection annotation (boxes, labels, per-class colours)

mod buffer;

pub mod draw;
pub mod io;
pub mod transform;

pub use buffer::ImageBuffer;

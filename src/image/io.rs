//! PPM image file I/O
//!
//! Only binary PPM (P6) is supported. It is trivial to produce from any
//! image tool (`convert photo.jpg photo.ppm`) and keeps the crate free of
//! compressed-codec dependencies.

use std::fs;
use std::path::Path;

use crate::error::{LookoutError, Result};
use crate::image::ImageBuffer;

/// Load a binary PPM file from disk
pub fn load_ppm<P: AsRef<Path>>(path: P) -> Result<ImageBuffer> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(LookoutError::FileNotFound {
            path: path.display().to_string(),
            source: None,
        });
    }
    let bytes = fs::read(path)?;
    decode_ppm(&bytes)
}

/// Save an image as binary PPM
pub fn save_ppm<P: AsRef<Path>>(path: P, image: &ImageBuffer) -> Result<()> {
    fs::write(path, encode_ppm(image))?;
    Ok(())
}

/// Decode binary PPM bytes
pub fn decode_ppm(bytes: &[u8]) -> Result<ImageBuffer> {
    let mut pos = 0;

    let magic = next_token(bytes, &mut pos)?;
    match magic.as_str() {
        "P6" => {}
        "P3" => {
            return Err(LookoutError::UnsupportedFormat {
                format: "ASCII PPM (P3)".to_string(),
            })
        }
        other => {
            return Err(LookoutError::InvalidImage {
                reason: format!("not a PPM file (magic '{}')", other),
            })
        }
    }

    let width = parse_dim(&next_token(bytes, &mut pos)?, "width")?;
    let height = parse_dim(&next_token(bytes, &mut pos)?, "height")?;
    let maxval: usize = next_token(bytes, &mut pos)?.parse().map_err(|_| {
        LookoutError::InvalidImage {
            reason: "invalid maxval".to_string(),
        }
    })?;
    if maxval == 0 || maxval > 255 {
        return Err(LookoutError::UnsupportedFormat {
            format: format!("PPM with maxval {}", maxval),
        });
    }

    // Exactly one whitespace byte separates the header from the pixel data.
    match bytes.get(pos) {
        Some(b) if b.is_ascii_whitespace() => pos += 1,
        _ => {
            return Err(LookoutError::InvalidImage {
                reason: "missing separator after maxval".to_string(),
            })
        }
    }

    let expected = width
        .checked_mul(height)
        .and_then(|px| px.checked_mul(3))
        .ok_or_else(|| LookoutError::InvalidImage {
            reason: format!("image size {}x{} overflows", width, height),
        })?;
    if bytes.len() - pos < expected {
        return Err(LookoutError::InvalidImage {
            reason: format!(
                "unexpected end of pixel data ({} of {} bytes)",
                bytes.len() - pos,
                expected
            ),
        });
    }

    let mut data = bytes[pos..pos + expected].to_vec();
    if maxval != 255 {
        for b in &mut data {
            *b = (*b as usize * 255 / maxval) as u8;
        }
    }
    ImageBuffer::from_raw(width, height, data)
}

/// Encode an image as binary PPM bytes
pub fn encode_ppm(image: &ImageBuffer) -> Vec<u8> {
    let header = format!("P6\n{} {}\n255\n", image.width(), image.height());
    let mut out = Vec::with_capacity(header.len() + image.data().len());
    out.extend_from_slice(header.as_bytes());
    out.extend_from_slice(image.data());
    out
}

/// Next header token, skipping whitespace and '#' comments
fn next_token(bytes: &[u8], pos: &mut usize) -> Result<String> {
    loop {
        while *pos < bytes.len() && bytes[*pos].is_ascii_whitespace() {
            *pos += 1;
        }
        if *pos < bytes.len() && bytes[*pos] == b'#' {
            while *pos < bytes.len() && bytes[*pos] != b'\n' {
                *pos += 1;
            }
            continue;
        }
        break;
    }
    let start = *pos;
    while *pos < bytes.len() && !bytes[*pos].is_ascii_whitespace() {
        *pos += 1;
    }
    if start == *pos {
        return Err(LookoutError::InvalidImage {
            reason: "truncated header".to_string(),
        });
    }
    String::from_utf8(bytes[start..*pos].to_vec()).map_err(|_| LookoutError::InvalidImage {
        reason: "non-ASCII header".to_string(),
    })
}

fn parse_dim(token: &str, name: &str) -> Result<usize> {
    let value: usize = token.parse().map_err(|_| LookoutError::InvalidImage {
        reason: format!("invalid {}: '{}'", name, token),
    })?;
    if value == 0 {
        return Err(LookoutError::InvalidImage {
            reason: format!("{} must be non-zero", name),
        });
    }
    Ok(value)
}

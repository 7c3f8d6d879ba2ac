//! Geometric transforms between images and network tensors
//!
//! The network sees a square bilinear resize of the frame, scaled to the
//! 0..1 range. No letterboxing: aspect ratio is not preserved, matching the
//! preprocessing the pretrained weights were validated with.

use ndarray::Array3;

use crate::image::ImageBuffer;

/// Bilinear resize with half-pixel centers
pub fn resize_bilinear(img: &ImageBuffer, out_w: usize, out_h: usize) -> ImageBuffer {
    let mut out = ImageBuffer::new(out_w, out_h);
    for y in 0..out_h {
        for x in 0..out_w {
            let mut rgb = [0u8; 3];
            for c in 0..3 {
                let v = sample(img, c, x, y, out_w, out_h);
                rgb[c] = (v + 0.5) as u8;
            }
            out.set_pixel(x, y, rgb);
        }
    }
    out
}

/// Resize to `size`x`size` and normalize into a planar `[3, size, size]` tensor
pub fn to_model_input(img: &ImageBuffer, size: usize) -> Array3<f32> {
    let mut out = Array3::zeros((3, size, size));
    for y in 0..size {
        for x in 0..size {
            for c in 0..3 {
                out[[c, y, x]] = sample(img, c, x, y, size, size) / 255.0;
            }
        }
    }
    out
}

/// Bilinear sample of one channel at the output pixel's source position
fn sample(img: &ImageBuffer, c: usize, x: usize, y: usize, out_w: usize, out_h: usize) -> f32 {
    let (w, h) = (img.width(), img.height());
    let sx = src_coord(x, out_w, w);
    let sy = src_coord(y, out_h, h);

    let x0 = sx.floor() as usize;
    let y0 = sy.floor() as usize;
    let x1 = (x0 + 1).min(w - 1);
    let y1 = (y0 + 1).min(h - 1);
    let fx = sx - x0 as f32;
    let fy = sy - y0 as f32;

    let p00 = img.pixel(x0, y0)[c] as f32;
    let p10 = img.pixel(x1, y0)[c] as f32;
    let p01 = img.pixel(x0, y1)[c] as f32;
    let p11 = img.pixel(x1, y1)[c] as f32;

    let top = p00 + (p10 - p00) * fx;
    let bottom = p01 + (p11 - p01) * fx;
    top + (bottom - top) * fy
}

fn src_coord(dst: usize, dst_len: usize, src_len: usize) -> f32 {
    let scale = src_len as f32 / dst_len as f32;
    ((dst as f32 + 0.5) * scale - 0.5).clamp(0.0, (src_len - 1) as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn solid(width: usize, height: usize, rgb: [u8; 3]) -> ImageBuffer {
        let mut img = ImageBuffer::new(width, height);
        for y in 0..height {
            for x in 0..width {
                img.set_pixel(x, y, rgb);
            }
        }
        img
    }

    #[test]
    fn test_resize_constant_image_stays_constant() {
        let img = solid(10, 6, [40, 80, 120]);
        let out = resize_bilinear(&img, 4, 4);
        for y in 0..4 {
            for x in 0..4 {
                assert_eq!(out.pixel(x, y), [40, 80, 120]);
            }
        }
    }

    #[test]
    fn test_resize_identity_dimensions() {
        let mut img = ImageBuffer::new(3, 3);
        img.set_pixel(1, 1, [200, 100, 50]);
        let out = resize_bilinear(&img, 3, 3);
        assert_eq!(out, img);
    }

    #[test]
    fn test_upscale_interpolates_between_pixels() {
        let mut img = ImageBuffer::new(2, 1);
        img.set_pixel(0, 0, [0, 0, 0]);
        img.set_pixel(1, 0, [200, 200, 200]);
        let out = resize_bilinear(&img, 4, 1);
        let values: Vec<u8> = (0..4).map(|x| out.pixel(x, 0)[0]).collect();
        assert!(values.windows(2).all(|w| w[0] <= w[1]), "{:?}", values);
        assert_eq!(values[0], 0);
        assert_eq!(values[3], 200);
    }

    #[test]
    fn test_model_input_is_normalized_chw() {
        let img = solid(8, 8, [255, 0, 128]);
        let tensor = to_model_input(&img, 4);
        assert_eq!(tensor.dim(), (3, 4, 4));
        assert_relative_eq!(tensor[[0, 2, 2]], 1.0);
        assert_relative_eq!(tensor[[1, 2, 2]], 0.0);
        assert_relative_eq!(tensor[[2, 2, 2]], 128.0 / 255.0, epsilon = 1e-6);
    }
}

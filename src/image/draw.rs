//! Annotation drawing: boxes, labels, per-class colours
//!
//! Rendering is deliberately primitive. A 5x7 bitmap font covers upper-case
//! letters, digits and the punctuation that appears in detection labels;
//! lower-case input is folded to upper-case before lookup.

use crate::image::ImageBuffer;
use crate::vision::Detection;

/// Pixel scale applied to the 5x7 font when labelling detections
const LABEL_SCALE: usize = 2;

/// Deterministic colour for a class index
///
/// Cycles three base colours and walks each away from its base every third
/// class, so neighbouring class ids stay visually distinct.
pub fn class_color(class_id: usize) -> [u8; 3] {
    const BASE: [[i64; 3]; 3] = [[255, 0, 0], [0, 255, 0], [0, 0, 255]];
    const INCREMENT: [[i64; 3]; 3] = [[1, -2, 1], [-2, 1, -1], [1, -1, 2]];

    let family = class_id % 3;
    let step = (class_id / 3) as i64;
    let mut rgb = [0u8; 3];
    for ch in 0..3 {
        let offset = (INCREMENT[family][ch] * step).rem_euclid(256);
        rgb[ch] = (BASE[family][ch] + offset).min(255) as u8;
    }
    rgb
}

/// Draw a rectangle outline, clipped to the image
///
/// `thickness` rings are drawn growing inward from the given corners.
/// Coordinates may lie outside the image or be swapped.
pub fn draw_rect(
    img: &mut ImageBuffer,
    x1: i64,
    y1: i64,
    x2: i64,
    y2: i64,
    color: [u8; 3],
    thickness: usize,
) {
    let (x1, x2) = (x1.min(x2), x1.max(x2));
    let (y1, y2) = (y1.min(y2), y1.max(y2));
    for t in 0..thickness as i64 {
        let (l, r) = (x1 + t, x2 - t);
        let (top, bottom) = (y1 + t, y2 - t);
        if l > r || top > bottom {
            break;
        }
        hline(img, l, r, top, color);
        hline(img, l, r, bottom, color);
        vline(img, top, bottom, l, color);
        vline(img, top, bottom, r, color);
    }
}

/// Draw text with the built-in font, top-left anchored, clipped to the image
pub fn draw_text(img: &mut ImageBuffer, x: i64, y: i64, text: &str, color: [u8; 3], scale: usize) {
    let scale = scale.max(1) as i64;
    let mut cursor = x;
    for c in text.chars() {
        let columns = glyph(c);
        for (col, bits) in columns.iter().enumerate() {
            for row in 0..7 {
                if bits & (1 << row) == 0 {
                    continue;
                }
                for dx in 0..scale {
                    for dy in 0..scale {
                        put(
                            img,
                            cursor + col as i64 * scale + dx,
                            y + row as i64 * scale + dy,
                            color,
                        );
                    }
                }
            }
        }
        cursor += 6 * scale;
    }
}

/// Draw boxes and `name confidence%` labels for a set of detections
///
/// Box coordinates are normalized; they are mapped onto this image's
/// dimensions, so the same detections can annotate the original frame
/// rather than the resized network input.
pub fn draw_detections(img: &mut ImageBuffer, detections: &[Detection], names: &[String]) {
    for det in detections {
        let color = class_color(det.class_id);
        let (x1, y1, x2, y2) = det.bbox.to_pixels(img.width(), img.height());
        draw_rect(img, x1 as i64, y1 as i64, x2 as i64, y2 as i64, color, 2);

        let name = names
            .get(det.class_id)
            .map(String::as_str)
            .unwrap_or("object");
        let label = format!("{} {:.2}%", name, det.score * 100.0);
        let text_h = (7 * LABEL_SCALE) as i64;
        let ty = (y1 as i64 - 10 - text_h).max(0);
        draw_text(img, x1 as i64, ty, &label, color, LABEL_SCALE);
    }
}

fn put(img: &mut ImageBuffer, x: i64, y: i64, color: [u8; 3]) {
    if x >= 0 && y >= 0 && (x as usize) < img.width() && (y as usize) < img.height() {
        img.set_pixel(x as usize, y as usize, color);
    }
}

fn hline(img: &mut ImageBuffer, x1: i64, x2: i64, y: i64, color: [u8; 3]) {
    if y < 0 || y >= img.height() as i64 {
        return;
    }
    let a = x1.max(0);
    let b = x2.min(img.width() as i64 - 1);
    for x in a..=b {
        img.set_pixel(x as usize, y as usize, color);
    }
}

fn vline(img: &mut ImageBuffer, y1: i64, y2: i64, x: i64, color: [u8; 3]) {
    if x < 0 || x >= img.width() as i64 {
        return;
    }
    let a = y1.max(0);
    let b = y2.min(img.height() as i64 - 1);
    for y in a..=b {
        img.set_pixel(x as usize, y as usize, color);
    }
}

/// 5x7 glyph as column bytes, bit 0 = top row
fn glyph(c: char) -> [u8; 5] {
    match c.to_ascii_uppercase() {
        ' ' => [0x00, 0x00, 0x00, 0x00, 0x00],
        '.' => [0x00, 0x60, 0x60, 0x00, 0x00],
        '%' => [0x23, 0x13, 0x08, 0x64, 0x62],
        '-' => [0x08, 0x08, 0x08, 0x08, 0x08],
        ':' => [0x00, 0x36, 0x36, 0x00, 0x00],
        '/' => [0x20, 0x10, 0x08, 0x04, 0x02],
        '0' => [0x3E, 0x51, 0x49, 0x45, 0x3E],
        '1' => [0x00, 0x42, 0x7F, 0x40, 0x00],
        '2' => [0x42, 0x61, 0x51, 0x49, 0x46],
        '3' => [0x21, 0x41, 0x45, 0x4B, 0x31],
        '4' => [0x18, 0x14, 0x12, 0x7F, 0x10],
        '5' => [0x27, 0x45, 0x45, 0x45, 0x39],
        '6' => [0x3C, 0x4A, 0x49, 0x49, 0x30],
        '7' => [0x01, 0x71, 0x09, 0x05, 0x03],
        '8' => [0x36, 0x49, 0x49, 0x49, 0x36],
        '9' => [0x06, 0x49, 0x49, 0x29, 0x1E],
        'A' => [0x7E, 0x11, 0x11, 0x11, 0x7E],
        'B' => [0x7F, 0x49, 0x49, 0x49, 0x36],
        'C' => [0x3E, 0x41, 0x41, 0x41, 0x22],
        'D' => [0x7F, 0x41, 0x41, 0x22, 0x1C],
        'E' => [0x7F, 0x49, 0x49, 0x49, 0x41],
        'F' => [0x7F, 0x09, 0x09, 0x09, 0x01],
        'G' => [0x3E, 0x41, 0x49, 0x49, 0x7A],
        'H' => [0x7F, 0x08, 0x08, 0x08, 0x7F],
        'I' => [0x00, 0x41, 0x7F, 0x41, 0x00],
        'J' => [0x20, 0x40, 0x41, 0x3F, 0x01],
        'K' => [0x7F, 0x08, 0x14, 0x22, 0x41],
        'L' => [0x7F, 0x40, 0x40, 0x40, 0x40],
        'M' => [0x7F, 0x02, 0x0C, 0x02, 0x7F],
        'N' => [0x7F, 0x04, 0x08, 0x10, 0x7F],
        'O' => [0x3E, 0x41, 0x41, 0x41, 0x3E],
        'P' => [0x7F, 0x09, 0x09, 0x09, 0x06],
        'Q' => [0x3E, 0x41, 0x51, 0x21, 0x5E],
        'R' => [0x7F, 0x09, 0x19, 0x29, 0x46],
        'S' => [0x46, 0x49, 0x49, 0x49, 0x31],
        'T' => [0x01, 0x01, 0x7F, 0x01, 0x01],
        'U' => [0x3F, 0x40, 0x40, 0x40, 0x3F],
        'V' => [0x1F, 0x20, 0x40, 0x20, 0x1F],
        'W' => [0x3F, 0x40, 0x38, 0x40, 0x3F],
        'X' => [0x63, 0x14, 0x08, 0x14, 0x63],
        'Y' => [0x07, 0x08, 0x70, 0x08, 0x07],
        'Z' => [0x61, 0x51, 0x49, 0x45, 0x43],
        // Hollow box for anything the font does not cover
        _ => [0x7F, 0x41, 0x41, 0x41, 0x7F],
    }
}

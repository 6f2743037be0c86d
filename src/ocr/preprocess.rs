//! Raster clean-up before recognition.
//!
//! Recognizers do markedly better on crisp black-on-white input, so scans
//! and photos are pushed through three passes: a global threshold estimate,
//! a contrast stretch followed by binarization, and a 3×3 sharpen.

use crate::error::ConvertError;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;
use tracing::debug;

/// Default contrast stretch factor.
pub const DEFAULT_CONTRAST: f32 = 1.2;

const SHARPEN_KERNEL: [[i32; 3]; 3] = [[0, -1, 0], [-1, 5, -1], [0, -1, 0]];

#[inline]
fn luminance(r: u8, g: u8, b: u8) -> f32 {
    0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32
}

/// Mean luminance of the image, rounded. 128 for an empty buffer.
pub fn estimate_threshold(image: &RgbaImage) -> u8 {
    let count = image.pixels().len();
    if count == 0 {
        return 128;
    }
    let sum: f64 = image
        .pixels()
        .map(|p| luminance(p[0], p[1], p[2]) as f64)
        .sum();
    (sum / count as f64).round().clamp(0.0, 255.0) as u8
}

/// Stretch every colour channel around 128 by `contrast`, then binarize at
/// `threshold`: luminance at or above it becomes white, the rest black.
/// Alpha is left untouched.
pub fn apply_contrast_and_threshold(image: &mut RgbaImage, contrast: f32, threshold: u8) {
    let stretch = |c: u8| ((c as f32 - 128.0) * contrast + 128.0).clamp(0.0, 255.0) as u8;
    for pixel in image.pixels_mut() {
        let [r, g, b, a] = pixel.0;
        let lum = luminance(stretch(r), stretch(g), stretch(b));
        let v = if lum >= threshold as f32 { 255 } else { 0 };
        pixel.0 = [v, v, v, a];
    }
}

/// 3×3 sharpen with edge-clamped sampling.
pub fn sharpen(image: &RgbaImage) -> RgbaImage {
    let (w, h) = image.dimensions();
    let mut out = RgbaImage::new(w, h);
    if w == 0 || h == 0 {
        return out;
    }
    for y in 0..h {
        for x in 0..w {
            let mut acc = [0i32; 3];
            for (ky, row) in SHARPEN_KERNEL.iter().enumerate() {
                for (kx, weight) in row.iter().enumerate() {
                    if *weight == 0 {
                        continue;
                    }
                    let sx = (x as i64 + kx as i64 - 1).clamp(0, w as i64 - 1) as u32;
                    let sy = (y as i64 + ky as i64 - 1).clamp(0, h as i64 - 1) as u32;
                    let p = image.get_pixel(sx, sy);
                    for c in 0..3 {
                        acc[c] += weight * p[c] as i32;
                    }
                }
            }
            let alpha = image.get_pixel(x, y)[3];
            let clamp = |v: i32| v.clamp(0, 255) as u8;
            out.put_pixel(x, y, Rgba([clamp(acc[0]), clamp(acc[1]), clamp(acc[2]), alpha]));
        }
    }
    out
}

/// Full clean-up of a decoded image.
pub fn preprocess_image(image: &DynamicImage, contrast: f32) -> RgbaImage {
    let mut rgba = image.to_rgba8();
    let threshold = estimate_threshold(&rgba);
    debug!(
        "OCR preprocess: {}x{}, threshold {}, contrast {}",
        rgba.width(),
        rgba.height(),
        threshold,
        contrast
    );
    apply_contrast_and_threshold(&mut rgba, contrast, threshold);
    sharpen(&rgba)
}

/// PNG-encode an RGBA raster.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, ConvertError> {
    let mut buf = Cursor::new(Vec::new());
    image
        .write_to(&mut buf, ImageFormat::Png)
        .map_err(|e| ConvertError::encode("PNG", e))?;
    Ok(buf.into_inner())
}

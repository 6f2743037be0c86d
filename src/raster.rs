//! Image transform strategy: raster decode/re-encode and image → PDF.
//!
//! Decoding always lands in an RGBA raster at the image's natural size.
//! JPEG has no alpha channel, so JPEG targets are composited onto opaque
//! white first; otherwise transparent pixels would turn black. Animated
//! GIF/WebP inputs contribute their first frame only.

use crate::document::pdf::{write_image_pdf, PdfImage};
use crate::error::ConvertError;
use crate::format::FileFormat;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, RgbImage, RgbaImage};
use std::io::Cursor;
use tracing::debug;

/// JPEG quality used for every JPEG we produce.
pub const JPEG_QUALITY: u8 = 92;

/// Decode any supported raster format.
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage, ConvertError> {
    image::load_from_memory(bytes).map_err(|e| ConvertError::decode("image", e))
}

/// Flatten `image` onto an opaque white background.
pub fn composite_on_white(image: &DynamicImage) -> RgbImage {
    let rgba = image.to_rgba8();
    let (w, h) = rgba.dimensions();
    let mut out = RgbImage::new(w, h);
    for (src, dst) in rgba.pixels().zip(out.pixels_mut()) {
        let [r, g, b, a] = src.0;
        let alpha = a as u32;
        let blend = |c: u8| ((c as u32 * alpha + 255 * (255 - alpha) + 127) / 255) as u8;
        dst.0 = [blend(r), blend(g), blend(b)];
    }
    out
}

fn image_format(target: FileFormat) -> Result<ImageFormat, ConvertError> {
    match target {
        FileFormat::Png => Ok(ImageFormat::Png),
        FileFormat::Jpg | FileFormat::Jpeg => Ok(ImageFormat::Jpeg),
        FileFormat::Webp => Ok(ImageFormat::WebP),
        FileFormat::Gif => Ok(ImageFormat::Gif),
        FileFormat::Bmp => Ok(ImageFormat::Bmp),
        FileFormat::Tiff => Ok(ImageFormat::Tiff),
        other => Err(ConvertError::encode(
            other.to_string(),
            "not a raster image format",
        )),
    }
}

/// Encode a raster as `target`.
pub fn encode_image(image: &DynamicImage, target: FileFormat) -> Result<Vec<u8>, ConvertError> {
    let format = image_format(target)?;
    let mut buf = Cursor::new(Vec::new());

    if target.is_jpeg() {
        let flat = composite_on_white(image);
        JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY)
            .encode_image(&flat)
            .map_err(|e| ConvertError::encode("JPEG", e))?;
    } else {
        DynamicImage::ImageRgba8(image.to_rgba8())
            .write_to(&mut buf, format)
            .map_err(|e| ConvertError::encode(target.to_string().to_uppercase(), e))?;
    }
    Ok(buf.into_inner())
}

/// Decode `bytes` and re-encode as `target`. Blocking.
pub fn convert_image_blocking(bytes: &[u8], target: FileFormat) -> Result<Vec<u8>, ConvertError> {
    let image = decode_image(bytes)?;
    debug!(
        "Decoded image {}x{} → {}",
        image.width(),
        image.height(),
        target
    );
    encode_image(&image, target)
}

/// Raster-to-raster conversion.
pub async fn convert_image(bytes: Vec<u8>, target: FileFormat) -> Result<Vec<u8>, ConvertError> {
    tokio::task::spawn_blocking(move || convert_image_blocking(&bytes, target))
        .await
        .map_err(|e| ConvertError::Internal(format!("Image task panicked: {}", e)))?
}

/// Channel count from the first SOF header of a JPEG stream.
///
/// `None` when the bytes are not a JPEG or the frame type is not one PDF
/// readers decode through `DCTDecode` (baseline, extended, progressive).
pub fn jpeg_components(bytes: &[u8]) -> Option<u8> {
    if !matches!(image::guess_format(bytes), Ok(ImageFormat::Jpeg)) {
        return None;
    }
    let mut pos = 2;
    while pos + 4 <= bytes.len() {
        if bytes[pos] != 0xFF {
            return None;
        }
        let marker = bytes[pos + 1];
        if marker == 0xFF {
            pos += 1;
            continue;
        }
        let len = u16::from_be_bytes([bytes[pos + 2], bytes[pos + 3]]) as usize;
        match marker {
            0xC0..=0xC2 => return bytes.get(pos + 9).copied(),
            // Lossless, hierarchical and arithmetic-coded frames.
            0xC3 | 0xC5..=0xC7 | 0xC9..=0xCB | 0xCD..=0xCF => return None,
            0xD9 | 0xDA => return None,
            _ => pos += 2 + len,
        }
    }
    None
}

/// Single-page PDF whose page is exactly the image's pixel size. Blocking.
///
/// Real JPEG bytes with one or three channels are embedded without
/// re-encoding, whatever `source` claims. Everything else (including CMYK
/// JPEG) goes through the raster pipeline and is stored losslessly.
pub fn image_to_pdf_blocking(bytes: &[u8], source: FileFormat) -> Result<Vec<u8>, ConvertError> {
    let image = decode_image(bytes)?;
    let (width, height) = (image.width(), image.height());

    let passthrough = match jpeg_components(bytes) {
        Some(1) => Some(true),
        Some(3) => Some(false),
        _ => None,
    };
    if source.is_jpeg() && passthrough.is_none() {
        debug!("{} source is not an embeddable JPEG, re-encoding", source);
    }

    let pdf = match passthrough {
        Some(grayscale) => write_image_pdf(PdfImage::Jpeg {
            bytes,
            width,
            height,
            grayscale,
        })?,
        None => {
            let rgba: RgbaImage = image.to_rgba8();
            write_image_pdf(PdfImage::Raster(&rgba))?
        }
    };
    debug!("Image {}x{} → {} byte PDF", width, height, pdf.len());
    Ok(pdf)
}

/// Image → PDF.
pub async fn image_to_pdf(bytes: Vec<u8>, source: FileFormat) -> Result<Vec<u8>, ConvertError> {
    tokio::task::spawn_blocking(move || image_to_pdf_blocking(&bytes, source))
        .await
        .map_err(|e| ConvertError::Internal(format!("Image task panicked: {}", e)))?
}

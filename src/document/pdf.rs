//! PDF writing (lopdf) and helpers for turning extracted text back into lines.

use crate::backend::TextRun;
use crate::config::LayoutConfig;
use crate::document::sanitize::to_win_ansi;
use crate::error::ConvertError;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::RgbaImage;
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use std::io::Write;

/// Vertical distance (points) beyond which two runs are on different lines.
pub const LINE_Y_TOLERANCE: f32 = 5.0;

/// Incremental single-file PDF builder.
pub(crate) struct PdfWriter {
    doc: Document,
    pages_id: ObjectId,
    kids: Vec<Object>,
    font_id: Option<ObjectId>,
}

impl PdfWriter {
    pub fn new() -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        Self {
            doc,
            pages_id,
            kids: Vec::new(),
            font_id: None,
        }
    }

    /// The standard Helvetica font, added on first use.
    pub fn helvetica(&mut self) -> ObjectId {
        if let Some(id) = self.font_id {
            return id;
        }
        let id = self.doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });
        self.font_id = Some(id);
        id
    }

    pub fn add_object(&mut self, object: impl Into<Object>) -> ObjectId {
        self.doc.add_object(object)
    }

    /// Append a page of `width × height` units drawing `content`.
    pub fn add_page(&mut self, width: u32, height: u32, content: Vec<u8>, resources: Dictionary) {
        let content_id = self.doc.add_object(Stream::new(dictionary! {}, content));
        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![0.into(), 0.into(), (width as i64).into(), (height as i64).into()],
            "Contents" => content_id,
            "Resources" => resources,
        });
        self.kids.push(page_id.into());
    }

    pub fn page_count(&self) -> usize {
        self.kids.len()
    }

    /// Serialise the document.
    pub fn finish(mut self) -> Result<Vec<u8>, ConvertError> {
        let count = self.kids.len() as i64;
        self.doc.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => self.kids,
                "Count" => count,
            }),
        );
        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);
        self.doc.compress();

        let mut buf = Vec::new();
        self.doc
            .save_to(&mut buf)
            .map_err(|e| ConvertError::encode("PDF", e))?;
        Ok(buf)
    }
}

// ── Text → PDF ───────────────────────────────────────────────────────────

/// Escape a byte string for a PDF literal `( … )`.
fn escape_literal(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len() + 2);
    for &b in bytes {
        if matches!(b, b'\\' | b'(' | b')') {
            out.push(b'\\');
        }
        out.push(b);
    }
    out
}

/// Content stream for one page of already-wrapped lines.
fn text_page_content(lines: &[String], layout: &LayoutConfig) -> Vec<u8> {
    let top = layout.page_height - layout.margin - layout.font_size;
    let mut content = format!(
        "BT\n/F1 {:.2} Tf\n{:.2} TL\n{:.2} {:.2} Td\n",
        layout.font_size,
        layout.line_advance(),
        layout.margin,
        top
    )
    .into_bytes();
    for (i, line) in lines.iter().enumerate() {
        if i > 0 {
            content.extend_from_slice(b"T*\n");
        }
        if line.is_empty() {
            continue;
        }
        content.push(b'(');
        content.extend(escape_literal(&to_win_ansi(line)));
        content.extend_from_slice(b") Tj\n");
    }
    content.extend_from_slice(b"ET\n");
    content
}

/// Write paginated lines as a Helvetica PDF.
///
/// Lines must already be sanitized and wrapped to the layout's width.
pub fn write_text_pdf(pages: &[Vec<String>], layout: &LayoutConfig) -> Result<Vec<u8>, ConvertError> {
    let mut writer = PdfWriter::new();
    let font_id = writer.helvetica();
    let width = layout.page_width.round() as u32;
    let height = layout.page_height.round() as u32;
    for lines in pages {
        let resources = dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        };
        writer.add_page(width, height, text_page_content(lines, layout), resources);
    }
    if writer.page_count() == 0 {
        writer.add_page(width, height, Vec::new(), dictionary! {});
    }
    writer.finish()
}

// ── Image → PDF ──────────────────────────────────────────────────────────

fn zlib(data: &[u8]) -> Result<Vec<u8>, ConvertError> {
    let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
    enc.write_all(data)
        .and_then(|_| enc.finish())
        .map_err(|e| ConvertError::encode("PDF image stream", e))
}

/// Image XObject stream, not recompressed by lopdf.
fn image_stream(dict: Dictionary, data: Vec<u8>) -> Stream {
    let mut stream = Stream::new(dict, data);
    stream.allows_compression = false;
    stream
}

/// The pixel data to embed in a one-page image PDF.
pub(crate) enum PdfImage<'a> {
    /// JPEG bytes embedded as-is (`DCTDecode`).
    Jpeg {
        bytes: &'a [u8],
        width: u32,
        height: u32,
        grayscale: bool,
    },
    /// Decoded raster, stored as Flate RGB plus an alpha soft mask when needed.
    Raster(&'a RgbaImage),
}

/// One page exactly the size of the image (1 unit = 1 pixel), image drawn full-bleed.
pub(crate) fn write_image_pdf(image: PdfImage<'_>) -> Result<Vec<u8>, ConvertError> {
    let mut writer = PdfWriter::new();

    let (image_id, width, height) = match image {
        PdfImage::Jpeg {
            bytes,
            width,
            height,
            grayscale,
        } => {
            let color_space = if grayscale { "DeviceGray" } else { "DeviceRGB" };
            let stream = image_stream(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => width as i64,
                    "Height" => height as i64,
                    "ColorSpace" => color_space,
                    "BitsPerComponent" => 8,
                    "Filter" => "DCTDecode",
                },
                bytes.to_vec(),
            );
            (writer.add_object(stream), width, height)
        }
        PdfImage::Raster(rgba) => {
            let (width, height) = rgba.dimensions();
            let pixels = rgba.as_raw();
            let mut rgb = Vec::with_capacity(pixels.len() / 4 * 3);
            let mut alpha = Vec::with_capacity(pixels.len() / 4);
            for px in pixels.chunks_exact(4) {
                rgb.extend_from_slice(&px[..3]);
                alpha.push(px[3]);
            }

            let mut dict = dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width as i64,
                "Height" => height as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "FlateDecode",
            };
            if alpha.iter().any(|&a| a != 255) {
                let mask = image_stream(
                    dictionary! {
                        "Type" => "XObject",
                        "Subtype" => "Image",
                        "Width" => width as i64,
                        "Height" => height as i64,
                        "ColorSpace" => "DeviceGray",
                        "BitsPerComponent" => 8,
                        "Filter" => "FlateDecode",
                    },
                    zlib(&alpha)?,
                );
                let mask_id = writer.add_object(mask);
                dict.set("SMask", mask_id);
            }
            let stream = image_stream(dict, zlib(&rgb)?);
            (writer.add_object(stream), width, height)
        }
    };

    let content = format!("q\n{width} 0 0 {height} 0 0 cm\n/Im0 Do\nQ\n").into_bytes();
    let resources = dictionary! {
        "XObject" => dictionary! { "Im0" => image_id },
    };
    writer.add_page(width, height, content, resources);
    writer.finish()
}

// ── Extracted text → lines ───────────────────────────────────────────────

/// Join per-page text with a blank line between pages.
pub fn join_pages(pages: &[String]) -> String {
    pages
        .iter()
        .map(|p| p.trim_end_matches('\n'))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Group a page's runs into visual lines.
///
/// Runs are taken in content order. A run whose baseline differs from the
/// previous one by more than [`LINE_Y_TOLERANCE`] starts a new line. Within
/// a line, a space is inserted where a horizontal gap separates two runs
/// that do not already carry one.
pub fn group_runs_into_lines(runs: &[TextRun]) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut prev: Option<&TextRun> = None;

    for run in runs {
        if run.text.is_empty() {
            continue;
        }
        match prev {
            Some(p) if (run.y - p.y).abs() > LINE_Y_TOLERANCE => {
                lines.push(std::mem::take(&mut current).trim_end().to_string());
            }
            Some(p) => {
                let gap = run.x - (p.x + p.width);
                let has_space = current.ends_with(char::is_whitespace)
                    || run.text.starts_with(char::is_whitespace);
                if gap > 1.0 && !has_space {
                    current.push(' ');
                }
            }
            None => {}
        }
        current.push_str(&run.text);
        prev = Some(run);
    }
    if prev.is_some() {
        lines.push(current.trim_end().to_string());
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(text: &str, x: f32, y: f32, width: f32) -> TextRun {
        TextRun {
            text: text.into(),
            x,
            y,
            width,
        }
    }

    #[test]
    fn runs_split_on_y_change() {
        let runs = vec![
            run("Hello", 50.0, 700.0, 30.0),
            run("world", 85.0, 701.5, 30.0),
            run("Next line", 50.0, 686.0, 50.0),
        ];
        assert_eq!(group_runs_into_lines(&runs), vec!["Hello world", "Next line"]);
    }

    #[test]
    fn adjacent_runs_are_glued() {
        let runs = vec![run("Hel", 50.0, 700.0, 18.0), run("lo", 68.0, 700.0, 10.0)];
        assert_eq!(group_runs_into_lines(&runs), vec!["Hello"]);
    }

    #[test]
    fn no_runs_no_lines() {
        assert!(group_runs_into_lines(&[]).is_empty());
    }

    #[test]
    fn pages_joined_by_blank_line() {
        let pages = vec!["one\n".to_string(), "two".to_string(), "three".to_string()];
        assert_eq!(join_pages(&pages), "one\n\ntwo\n\nthree");
    }

    #[test]
    fn literal_escaping() {
        assert_eq!(escape_literal(b"a(b)c\\"), b"a\\(b\\)c\\\\".to_vec());
    }

    #[test]
    fn text_pdf_has_one_page_per_chunk() {
        let layout = LayoutConfig::default();
        let pages = vec![vec!["first".to_string()], vec!["second (page)".to_string()]];
        let bytes = write_text_pdf(&pages, &layout).unwrap();
        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 2);
    }

    #[test]
    fn image_pdf_page_matches_pixels() {
        let img = RgbaImage::from_pixel(64, 32, image::Rgba([10, 20, 30, 128]));
        let bytes = write_image_pdf(PdfImage::Raster(&img)).unwrap();
        let doc = Document::load_mem(&bytes).unwrap();
        let pages = doc.get_pages();
        assert_eq!(pages.len(), 1);
        let page_id = *pages.values().next().unwrap();
        let page = doc.get_dictionary(page_id).unwrap();
        let media_box = page.get(b"MediaBox").unwrap().as_array().unwrap();
        assert_eq!(media_box[2].as_i64().unwrap(), 64);
        assert_eq!(media_box[3].as_i64().unwrap(), 32);
    }
}

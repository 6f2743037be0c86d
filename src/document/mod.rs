//! Document transform strategy: PDF, DOCX and plain text.
//!
//! | Operation | Path |
//! |-----------|------|
//! | PDF → image | render page 1 at 2×, encode through [`crate::raster`] |
//! | PDF → text | per-page text layer, pages joined by a blank line |
//! | PDF → DOCX | positioned runs → lines → one paragraph per line, page breaks between pages |
//! | text → PDF | sanitize → greedy wrap → paginate → Helvetica PDF |
//! | DOCX → PDF | DOCX → HTML → text → as text → PDF |
//! | DOCX → text | DOCX → HTML → text |
//! | text → DOCX | one paragraph per line |
//!
//! PDF reading goes through the injected [`PdfEngine`] on a blocking thread.

pub mod docx;
pub mod layout;
pub mod pdf;
pub mod sanitize;

use crate::backend::PdfEngine;
use crate::config::LayoutConfig;
use crate::error::ConvertError;
use crate::format::FileFormat;
use crate::raster;
use std::sync::Arc;
use tracing::debug;

/// Run a blocking closure against the PDF engine.
async fn with_engine<T, F>(engine: &Arc<dyn PdfEngine>, f: F) -> Result<T, ConvertError>
where
    T: Send + 'static,
    F: FnOnce(&dyn PdfEngine) -> Result<T, ConvertError> + Send + 'static,
{
    let engine = Arc::clone(engine);
    tokio::task::spawn_blocking(move || f(engine.as_ref()))
        .await
        .map_err(|e| ConvertError::Internal(format!("PDF task panicked: {}", e)))?
}

/// Plain text, decoded leniently.
fn decode_text(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    text.strip_prefix('\u{feff}').unwrap_or(&text[..]).to_string()
}

/// First page of a PDF as an image.
pub async fn pdf_to_image(
    engine: &Arc<dyn PdfEngine>,
    pdf: Vec<u8>,
    target: FileFormat,
    scale: f32,
) -> Result<Vec<u8>, ConvertError> {
    with_engine(engine, move |engine| {
        let mut pages = engine.render_pages(&pdf, 1, scale)?;
        if pages.is_empty() {
            return Err(ConvertError::decode("PDF", "the document has no pages"));
        }
        let first = pages.swap_remove(0);
        debug!("Rendered first page at {}x: {}x{}", scale, first.width(), first.height());
        raster::encode_image(&first, target)
    })
    .await
}

/// Text layer of every page, joined by a blank line. Empty when there is none.
pub async fn pdf_to_text(engine: &Arc<dyn PdfEngine>, pdf: Vec<u8>) -> Result<String, ConvertError> {
    let pages = with_engine(engine, move |engine| engine.extract_pages(&pdf)).await?;
    Ok(pdf::join_pages(&pages))
}

/// Positioned text → DOCX paragraphs, with a page break between source pages.
pub async fn pdf_to_docx(engine: &Arc<dyn PdfEngine>, pdf: Vec<u8>) -> Result<Vec<u8>, ConvertError> {
    let pages = with_engine(engine, move |engine| engine.extract_runs(&pdf)).await?;
    let lines: Vec<Vec<String>> = pages
        .iter()
        .map(|runs| pdf::group_runs_into_lines(runs))
        .collect();
    debug!(
        "PDF → DOCX: {} pages, {} lines",
        lines.len(),
        lines.iter().map(Vec::len).sum::<usize>()
    );
    docx::write_docx(&lines)
}

/// Lay `text` out on pages and write it as a PDF. Blocking.
pub fn text_to_pdf_blocking(text: &str, layout: &LayoutConfig) -> Result<Vec<u8>, ConvertError> {
    let clean = sanitize::sanitize_for_pdf(text);
    let pages = layout::layout_text(&clean, layout);
    debug!("Text → PDF: {} pages", pages.len());
    pdf::write_text_pdf(&pages, layout)
}

/// Plain text bytes → PDF.
pub async fn text_to_pdf(bytes: Vec<u8>, layout: LayoutConfig) -> Result<Vec<u8>, ConvertError> {
    tokio::task::spawn_blocking(move || text_to_pdf_blocking(&decode_text(&bytes), &layout))
        .await
        .map_err(|e| ConvertError::Internal(format!("PDF task panicked: {}", e)))?
}

/// DOCX → PDF, through the DOCX → HTML → text path.
pub async fn docx_to_pdf(bytes: Vec<u8>, layout: LayoutConfig) -> Result<Vec<u8>, ConvertError> {
    tokio::task::spawn_blocking(move || {
        let text = docx::docx_to_text(&bytes)?;
        text_to_pdf_blocking(&text, &layout)
    })
    .await
    .map_err(|e| ConvertError::Internal(format!("PDF task panicked: {}", e)))?
}

/// DOCX → plain text.
pub async fn docx_to_text(bytes: Vec<u8>) -> Result<String, ConvertError> {
    tokio::task::spawn_blocking(move || docx::docx_to_text(&bytes))
        .await
        .map_err(|e| ConvertError::Internal(format!("DOCX task panicked: {}", e)))?
}

/// Plain text → DOCX.
pub fn text_to_docx(bytes: &[u8]) -> Result<Vec<u8>, ConvertError> {
    docx::text_to_docx(&decode_text(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::TextRun;
    use image::DynamicImage;

    /// Engine serving canned pages.
    struct CannedEngine {
        pages: Vec<String>,
    }

    impl PdfEngine for CannedEngine {
        fn page_count(&self, _pdf: &[u8]) -> Result<usize, ConvertError> {
            Ok(self.pages.len())
        }

        fn extract_pages(&self, _pdf: &[u8]) -> Result<Vec<String>, ConvertError> {
            Ok(self.pages.clone())
        }

        fn extract_runs(&self, _pdf: &[u8]) -> Result<Vec<Vec<TextRun>>, ConvertError> {
            Ok(self
                .pages
                .iter()
                .map(|p| {
                    p.lines()
                        .enumerate()
                        .map(|(i, line)| TextRun {
                            text: line.to_string(),
                            x: 50.0,
                            y: 700.0 - 14.0 * i as f32,
                            width: 100.0,
                        })
                        .collect()
                })
                .collect())
        }

        fn render_pages(
            &self,
            _pdf: &[u8],
            max_pages: usize,
            scale: f32,
        ) -> Result<Vec<DynamicImage>, ConvertError> {
            let side = (10.0 * scale) as u32;
            Ok(self
                .pages
                .iter()
                .take(max_pages)
                .map(|_| DynamicImage::new_rgba8(side, side))
                .collect())
        }
    }

    fn engine(pages: &[&str]) -> Arc<dyn PdfEngine> {
        Arc::new(CannedEngine {
            pages: pages.iter().map(|s| s.to_string()).collect(),
        })
    }

    #[tokio::test]
    async fn pdf_text_is_idempotent_and_joined() {
        let e = engine(&["Alpha", "Beta", "Gamma"]);
        let first = pdf_to_text(&e, b"%PDF".to_vec()).await.unwrap();
        let second = pdf_to_text(&e, b"%PDF".to_vec()).await.unwrap();
        assert_eq!(first, "Alpha\n\nBeta\n\nGamma");
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn pdf_without_text_layer_is_empty() {
        let e = engine(&[""]);
        assert_eq!(pdf_to_text(&e, Vec::new()).await.unwrap(), "");
    }

    #[tokio::test]
    async fn pdf_to_image_renders_first_page_only_at_scale() {
        let e = engine(&["a", "b"]);
        let png = pdf_to_image(&e, Vec::new(), FileFormat::Png, 2.0).await.unwrap();
        let img = raster::decode_image(&png).unwrap();
        assert_eq!((img.width(), img.height()), (20, 20));
    }

    #[tokio::test]
    async fn empty_pdf_cannot_become_an_image() {
        let e = engine(&[]);
        let err = pdf_to_image(&e, Vec::new(), FileFormat::Jpg, 2.0).await.unwrap_err();
        assert!(matches!(err, ConvertError::DecodeFailure { .. }));
    }

    #[tokio::test]
    async fn pdf_to_docx_keeps_lines_and_pages() {
        let e = engine(&["line one\nline two", "page two"]);
        let bytes = pdf_to_docx(&e, Vec::new()).await.unwrap();
        let text = docx::docx_to_text(&bytes).unwrap();
        assert_eq!(text, "line one\nline two\n\npage two");
    }

    #[tokio::test]
    async fn text_to_pdf_paginates_long_input() {
        let layout = LayoutConfig::default();
        let text = (0..layout.lines_per_page() + 5)
            .map(|i| format!("line {i}"))
            .collect::<Vec<_>>()
            .join("\n");
        let pdf = text_to_pdf(text.into_bytes(), layout).await.unwrap();
        let doc = lopdf::Document::load_mem(&pdf).unwrap();
        assert_eq!(doc.get_pages().len(), 2);
    }

    #[tokio::test]
    async fn docx_round_trip_through_pdf() {
        let docx_bytes = text_to_docx(b"Hello\nWorld").unwrap();
        assert_eq!(docx_to_text(docx_bytes.clone()).await.unwrap(), "Hello\nWorld");
        let pdf = docx_to_pdf(docx_bytes, LayoutConfig::default()).await.unwrap();
        assert!(pdf.starts_with(b"%PDF"));
    }

    #[test]
    fn bom_is_stripped() {
        assert_eq!(decode_text("\u{feff}hi".as_bytes()), "hi");
    }
}
